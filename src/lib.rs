//! Servo driver with speed limited motion on the LEDC peripheral of ESP32 chips.
//!
//! Servos share one [`LedcResources`], which hands out LEDC channels in order
//! and configures each timer once. A [`Servo`] moves to a new angle with a
//! hardware fade whose length follows its speed, and reports the end of the
//! fade through an optional [`FadeCallback`].
//!
//! The peripheral is reached through the [`LedcDriver`] trait. Enable one of
//! the `esp32`, `esp32c3` or `esp32s3` features for `esp::EspLedc`, the
//! implementation on top of [`esp-hal`](https://docs.rs/esp-hal/1.0.0/esp_hal/).
//!
//! # Example
//!
//! ```ignore
//! static FADE_EVENTS: FadeEvents<'static> = FadeEvents::new();
//! static ARRIVED: AtomicBool = AtomicBool::new(false);
//!
//! let resources = LedcResources::with_mode(driver, &FADE_EVENTS, SpeedMode::LowSpeed);
//! let mut servo = Servo::new("pan", &resources, pin, ServoConfig::sg90(14))?;
//! servo.set_fading_callback(Some(&|| ARRIVED.store(true, Ordering::Relaxed)));
//! servo.set_speed(90.0);
//! servo.write(90.0)?;
//! ```

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "async")]
pub mod async_servo;
pub mod driver;
#[cfg(feature = "esp")]
pub mod esp;
pub mod fade;
pub mod fade_events;
pub mod resources;
pub mod servo;
pub mod servo_config;
#[cfg(test)]
mod test_support;
pub mod utils;

pub use driver::{ChannelId, FadeWait, LedcDriver, SpeedMode, TimerId};
pub use fade::FadeParams;
pub use fade_events::{FadeCallback, FadeEvents};
pub use resources::LedcResources;
pub use servo::Servo;
pub use servo_config::ServoConfig;

/// Duty for angle 0: a 0.5ms pulse at 50Hz with 20-bit resolution.
pub const DUTY_MIN: u32 = 26_214;

/// Duty for angle 180: a 2.5ms pulse at 50Hz with 20-bit resolution.
pub const DUTY_MAX: u32 = 131_072;
