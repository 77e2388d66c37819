//! Utility functions for servo calculations.
//! These functions are independent of `Servo` and can be tested in isolation.

use core::ops::Range;

const NANOS_IS_SEC: f64 = 1_000_000_000.0;

/// Widest duty resolution a LEDC timer supports, in bits.
pub const MAX_DUTY_RESOLUTION: u8 = 20;

/// Tolerance used when comparing angles.
pub const EPSILON: f32 = 1e-4;

/// Compares two floats with [`EPSILON`] tolerance.
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// Maps pulse width in nanoseconds to absolute duty value (not percentage).
///
/// # Arguments
///
/// * `pulse_ns` - Pulse width in nanoseconds
/// * `frequency_hz` - PWM frequency in Hz
/// * `max_duty` - Maximum duty value (e.g., 1048575 for 20-bit resolution)
pub fn pulse_to_duty(pulse_ns: u32, frequency_hz: f64, max_duty: u32) -> u32 {
    let duty_f = pulse_ns as f64 * frequency_hz * max_duty as f64 / NANOS_IS_SEC;
    (duty_f + 0.5) as u32
}

/// Calculates duty range in absolute values for a pulse width range.
///
/// # Arguments
///
/// * `pulse_width_ns` - Pulse width range in nanoseconds (min..max)
/// * `frequency_hz` - PWM frequency in Hz
/// * `max_duty` - Maximum duty value (e.g., 1048575 for 20-bit resolution)
pub fn calc_duty_range(pulse_width_ns: Range<u32>, frequency_hz: f64, max_duty: u32) -> Range<u32> {
    let min_duty = pulse_to_duty(pulse_width_ns.start, frequency_hz, max_duty).min(max_duty);
    let max_duty_val = pulse_to_duty(pulse_width_ns.end, frequency_hz, max_duty).min(max_duty);

    // Ensure valid range (min < max)
    let min_duty = min_duty.min(max_duty_val.saturating_sub(1));
    let max_duty_val = max_duty_val.max(min_duty + 1);

    min_duty..max_duty_val
}

/// Linear map of `angle` in `0..=max_angle` onto `duty_range`.
///
/// Angles outside of `0..=max_angle` are extrapolated, not clamped. Results
/// below zero saturate at zero.
pub fn angle_to_duty(angle: f32, max_angle: f32, duty_range: &Range<u32>) -> u32 {
    let span = duty_range.end.saturating_sub(duty_range.start) as f64;
    let duty = duty_range.start as f64 + angle as f64 * span / max_angle as f64;
    duty as u32
}

/// Inverse of [`angle_to_duty`].
pub fn duty_to_angle(duty: u32, max_angle: f32, duty_range: &Range<u32>) -> f32 {
    let span = duty_range.end.saturating_sub(duty_range.start) as f64;
    // Prevent division by zero
    if span <= 0.0 {
        return 0.0;
    }
    ((duty as f64 - duty_range.start as f64) * max_angle as f64 / span) as f32
}

/// Highest duty resolution in bits for a timer running at `frequency_hz`
/// from a `clock_hz` source. Returns 0 if the divider would be below 2.
pub fn find_suitable_duty_resolution(clock_hz: u32, frequency_hz: u32) -> u8 {
    if frequency_hz == 0 {
        return 0;
    }
    let clock_hz = u64::from(clock_hz);
    let frequency_hz = u64::from(frequency_hz);
    // rounded divider
    let div = (clock_hz + frequency_hz / 2) / frequency_hz;
    if div <= 1 {
        return 0;
    }
    (div.ilog2() as u8).min(MAX_DUTY_RESOLUTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DUTY_MAX, DUTY_MIN};

    const RANGE: Range<u32> = DUTY_MIN..DUTY_MAX;

    #[test]
    fn angle_to_duty_hits_range_ends() {
        assert_eq!(angle_to_duty(0.0, 180.0, &RANGE), DUTY_MIN);
        assert_eq!(angle_to_duty(180.0, 180.0, &RANGE), DUTY_MAX);
        assert_eq!(angle_to_duty(90.0, 180.0, &RANGE), 78_643);
        // 104858 / 180 = 582.54..
        assert_eq!(angle_to_duty(1.0, 180.0, &RANGE), 26_796);
    }

    #[test]
    fn angle_to_duty_is_monotonic() {
        let mut previous = angle_to_duty(0.0, 180.0, &RANGE);
        for tenth in 1..=1800u16 {
            let duty = angle_to_duty(f32::from(tenth) / 10.0, 180.0, &RANGE);
            assert!(duty >= previous, "duty dropped at {tenth}");
            previous = duty;
        }
    }

    #[test]
    fn angle_to_duty_extrapolates_outside_range() {
        assert!(angle_to_duty(200.0, 180.0, &RANGE) > DUTY_MAX);
        assert_eq!(angle_to_duty(-1000.0, 180.0, &RANGE), 0);
    }

    #[test]
    fn duty_to_angle_inverts_mapping() {
        assert!(approx_eq(duty_to_angle(DUTY_MIN, 180.0, &RANGE), 0.0));
        assert!(approx_eq(duty_to_angle(DUTY_MAX, 180.0, &RANGE), 180.0));
        assert!((duty_to_angle(78_643, 180.0, &RANGE) - 90.0).abs() < 0.01);
    }

    #[test]
    fn default_pulse_widths_match_duty_constants() {
        let range = calc_duty_range(500_000..2_500_000, 50.0, (1 << 20) - 1);
        assert_eq!(range, DUTY_MIN..DUTY_MAX);
    }

    #[test]
    fn calc_duty_range_keeps_min_below_max() {
        let range = calc_duty_range(2_000_000..2_000_000, 50.0, 4095);
        assert!(range.start < range.end);
    }

    #[test]
    fn duty_resolution_for_servo_frequency() {
        assert_eq!(find_suitable_duty_resolution(APB, 50), 20);
        assert_eq!(find_suitable_duty_resolution(APB, 5_000), 13);
        assert_eq!(find_suitable_duty_resolution(APB, 40_000_000), 1);
        assert_eq!(find_suitable_duty_resolution(APB, 1), MAX_DUTY_RESOLUTION);
    }

    #[test]
    fn duty_resolution_zero_when_unreachable() {
        assert_eq!(find_suitable_duty_resolution(APB, APB), 0);
        assert_eq!(find_suitable_duty_resolution(APB, 0), 0);
    }

    const APB: u32 = crate::driver::APB_CLK_HZ;
}
