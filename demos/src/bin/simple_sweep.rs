//! Speed limited servo sweep example.
//!
//! Two servos share timer 0 and sweep between 0° and 180° with hardware
//! fades. The fade end callback flags the arrival, the main loop polls the
//! LEDC for finished fades.
//!
//! # Build and Flash
//!
//! ```bash
//! cargo run -p demos --bin simple_sweep --target riscv32imc-unknown-none-elf --release
//! ```

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use esp_backtrace as _;
use esp_bootloader_esp_idf::esp_app_desc;
use esp_hal::{
    Config,
    delay::Delay,
    gpio::Pin,
    ledc::{LowSpeed, Ledc, timer},
};
use esp_hal_fade_servo::{
    FadeEvents, LedcResources, Servo, ServoConfig, SpeedMode,
    driver::TIMER_COUNT,
    esp::{EspLedc, TimerSlots},
};
use log::info;

esp_app_desc!();

static FADE_EVENTS: FadeEvents<'static> = FadeEvents::new();
static ARRIVALS: AtomicU32 = AtomicU32::new(0);

fn on_arrival() {
    ARRIVALS.fetch_add(1, Ordering::Relaxed);
}

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(Config::default());
    esp_println::logger::init_logger(log::LevelFilter::Info);

    info!("Starting servo sweep example");

    let ledc = Ledc::new(peripherals.LEDC);
    let mut slots: TimerSlots<'_, LowSpeed> = [const { None }; TIMER_COUNT];
    let driver = EspLedc::new(ledc, timer::LSClockSource::APBClk, &mut slots);
    let resources = LedcResources::with_mode(driver, &FADE_EVENTS, SpeedMode::LowSpeed);

    // esp32c3 timers top out at 14 bits
    let config = ServoConfig::sg90(14);
    let mut pan = Servo::new("pan", &resources, peripherals.GPIO2.degrade(), config.clone())
        .expect("failed to create pan servo");
    let mut tilt = Servo::new("tilt", &resources, peripherals.GPIO3.degrade(), config)
        .expect("failed to create tilt servo");

    pan.set_fading_callback(Some(&on_arrival));
    tilt.set_fading_callback(Some(&on_arrival));
    pan.set_speed(90.0);
    tilt.set_speed(45.0);

    // start from a known position
    pan.force_write(0.0).expect("failed to home pan");
    tilt.force_write(0.0).expect("failed to home tilt");

    let delay = Delay::new();
    let mut target = 180.0;
    loop {
        info!("Moving to {target}°");
        let expected = ARRIVALS.load(Ordering::Relaxed) + 2;
        pan.write(target).expect("pan fade failed");
        tilt.write(target).expect("tilt fade failed");

        while ARRIVALS.load(Ordering::Relaxed) < expected {
            resources.poll_fades();
            delay.delay_millis(20);
        }
        info!(
            "Reached pan={:.2}°, tilt={:.2}°",
            pan.get_angle(),
            tilt.get_angle()
        );

        delay.delay_millis(500);
        target = if target > 90.0 { 0.0 } else { 180.0 };
    }
}
