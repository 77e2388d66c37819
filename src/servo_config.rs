//! Servo motor configuration.
//!
//! This module provides the [`ServoConfig`] struct for configuring servo motors,
//! including timer, frequency, duty range, rotation speed, and pre-configured
//! settings for common servo models like SG90 and MG995.

use core::ops::Range;

use crate::{DUTY_MAX, DUTY_MIN, driver::TimerId, utils};

/// Servo refresh rate expected by hobby servos.
pub const DEFAULT_FREQUENCY_HZ: u32 = 50;

/// Speed used until [`Servo::set_speed`](crate::Servo::set_speed) is called.
pub const DEFAULT_SPEED_DEG_PER_SEC: f32 = 5.0;

/// Configuration for a servo motor.
#[derive(Debug, Clone, PartialEq)]
pub struct ServoConfig {
    /// Max angle that servo can be turned, mostly 180.
    pub max_angle: f32,
    /// LEDC timer driving the servo. Servos on the same timer share its frequency.
    pub timer: TimerId,
    /// Frequency used when the timer is not configured yet.
    pub frequency_hz: u32,
    /// Duty values for angle 0 and `max_angle`, in timer resolution units.
    pub duty_range: Range<u32>,
    /// Servo rotation speed in degrees per second.
    pub speed_deg_per_sec: f32,
}

impl ServoConfig {
    /// 50Hz servo on `timer` with a 0.5-2.5ms pulse at 20-bit resolution,
    /// that is [`DUTY_MIN`]..[`DUTY_MAX`].
    pub fn default_servo(timer: TimerId, max_angle: f32, speed_deg_per_sec: f32) -> Self {
        ServoConfig {
            max_angle,
            timer,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            duty_range: DUTY_MIN..DUTY_MAX,
            speed_deg_per_sec,
        }
    }

    /// Half turn servo on timer 0 moving at 5 deg/s.
    pub fn hp_default() -> Self {
        Self::default_servo(TimerId::Timer0, 180.0, DEFAULT_SPEED_DEG_PER_SEC)
    }

    /// Config for [SG90](https://www.friendlywire.com/projects/ne555-servo-safe/SG90-datasheet.pdf).
    /// `resolution_bits` must match the resolution the timer ends up with.
    pub fn sg90(resolution_bits: u8) -> Self {
        Self {
            speed_deg_per_sec: 60.0,
            ..Self::from_pulse_width(500_000..2_400_000, resolution_bits)
        }
    }

    /// Config for [MG995](https://www.electronicoscaldas.com/datasheet/MG995_Tower-Pro.pdf).
    /// Can be used for MG996, MG996R as well.
    pub fn mg995(resolution_bits: u8) -> Self {
        Self {
            speed_deg_per_sec: 100.0,
            ..Self::from_pulse_width(500_000..2_500_000, resolution_bits)
        }
    }

    /// Half turn 50Hz servo with the duty range computed from a pulse width
    /// range in nanoseconds and the timer resolution.
    pub fn from_pulse_width(pulse_width_ns: Range<u32>, resolution_bits: u8) -> Self {
        let max_duty = max_duty(resolution_bits);
        Self {
            duty_range: utils::calc_duty_range(
                pulse_width_ns,
                f64::from(DEFAULT_FREQUENCY_HZ),
                max_duty,
            ),
            ..Self::hp_default()
        }
    }

    /// Uses `timer` instead of timer 0.
    pub fn with_timer(self, timer: TimerId) -> Self {
        Self { timer, ..self }
    }

    /// Whether the duty range stays within a timer of `resolution_bits`.
    pub fn fits_resolution(&self, resolution_bits: u8) -> bool {
        self.duty_range.end <= max_duty(resolution_bits)
    }

    /// Transforms angle in degrees to absolute duty value.
    pub fn angle_to_duty(&self, angle: f32) -> u32 {
        utils::angle_to_duty(angle, self.max_angle, &self.duty_range)
    }

    /// Transforms absolute duty value to angle in degrees.
    pub fn duty_to_angle(&self, duty: u32) -> f32 {
        utils::duty_to_angle(duty, self.max_angle, &self.duty_range)
    }
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self::hp_default()
    }
}

/// Largest duty value of a timer with `resolution_bits`.
fn max_duty(resolution_bits: u8) -> u32 {
    match resolution_bits {
        0 => 0,
        bits if bits >= 32 => u32::MAX,
        bits => (1u32 << bits) - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_duty_constants() {
        let config = ServoConfig::default();
        assert_eq!(config.duty_range, DUTY_MIN..DUTY_MAX);
        assert_eq!(config.timer, TimerId::Timer0);
        assert_eq!(config.frequency_hz, 50);
        assert_eq!(config.angle_to_duty(0.0), DUTY_MIN);
        assert_eq!(config.angle_to_duty(180.0), DUTY_MAX);
    }

    #[test]
    fn mg995_at_20_bits_matches_default_range() {
        let config = ServoConfig::mg995(20);
        assert_eq!(config.duty_range, DUTY_MIN..DUTY_MAX);
        assert_eq!(config.speed_deg_per_sec, 100.0);
    }

    #[test]
    fn sg90_at_14_bits() {
        let config = ServoConfig::sg90(14).with_timer(TimerId::Timer1);
        // 0.5ms and 2.4ms of a 20ms period with 16383 steps
        assert_eq!(config.duty_range, 410..1966);
        assert_eq!(config.timer, TimerId::Timer1);
    }

    #[test]
    fn default_range_needs_a_wide_timer() {
        let config = ServoConfig::default();
        assert!(config.fits_resolution(20));
        assert!(config.fits_resolution(18));
        assert!(!config.fits_resolution(17));
        assert!(!config.fits_resolution(14));
        assert!(ServoConfig::sg90(14).fits_resolution(14));
        assert!(ServoConfig::mg995(12).fits_resolution(12));
    }

    #[test]
    fn max_duty_per_resolution() {
        assert_eq!(max_duty(0), 0);
        assert_eq!(max_duty(12), 4095);
        assert_eq!(max_duty(20), 1_048_575);
    }
}
