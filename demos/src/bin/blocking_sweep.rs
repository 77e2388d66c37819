//! Blocking servo sweep example.
//!
//! Moves one servo with fixed duration fades that return once the hardware
//! finished them.
//!
//! # Build and Flash
//!
//! ```bash
//! cargo run -p demos --bin blocking_sweep --target riscv32imc-unknown-none-elf --release
//! ```

#![no_std]
#![no_main]

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

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(Config::default());
    esp_println::logger::init_logger(log::LevelFilter::Info);

    info!("Starting blocking sweep example");

    let ledc = Ledc::new(peripherals.LEDC);
    let mut slots: TimerSlots<'_, LowSpeed> = [const { None }; TIMER_COUNT];
    let driver = EspLedc::new(ledc, timer::LSClockSource::APBClk, &mut slots);
    let resources = LedcResources::with_mode(driver, &FADE_EVENTS, SpeedMode::LowSpeed);

    let mut servo = Servo::new(
        "sweep",
        &resources,
        peripherals.GPIO2.degrade(),
        ServoConfig::mg995(14),
    )
    .expect("failed to create servo");
    servo.force_write(90.0).expect("failed to center servo");

    let delay = Delay::new();
    let mut fade_time_ms = 250;
    loop {
        for angle in [0.0, 180.0, 90.0] {
            servo
                .write_blocking(angle, fade_time_ms)
                .expect("fade failed");
            info!("At {:.2}° after {fade_time_ms}ms", servo.get_angle());
            delay.delay_millis(300);
        }
        fade_time_ms += 250;
        if fade_time_ms > 2_000 {
            fade_time_ms = 250;
        }
    }
}
