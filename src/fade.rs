//! Translation of an angular speed into LEDC fade parameters.
//!
//! The fade engine moves the duty by `scale` units every `cycles_per_step`
//! timer periods until `target_duty` is reached. A servo timer runs at 50Hz,
//! so one period is [`FADE_TICK_MS`].

use log::{debug, info};

/// Duration of one fade tick (one PWM period at 50Hz).
pub const FADE_TICK_MS: f32 = 20.0;

/// Widest value of the hardware fade scale field.
pub const MAX_FADE_SCALE: u32 = 1023;

/// Widest value of the hardware fade cycle field.
pub const MAX_FADE_CYCLES: u32 = 1023;

/// Most steps the hardware fade counter runs.
pub const MAX_FADE_STEPS: u32 = 1023;

/// Hardware fade parameters for one move.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct FadeParams {
    /// Duty value the fade stops at.
    pub target_duty: u32,
    /// Duty change per step, `1..=MAX_FADE_SCALE`.
    pub scale: u16,
    /// Timer periods per step, `1..=MAX_FADE_CYCLES`.
    pub cycles_per_step: u16,
}

impl FadeParams {
    /// Fade parameters for moving `distance_deg` degrees at `speed_deg_per_sec`.
    pub fn for_speed(
        current_duty: u32,
        target_duty: u32,
        distance_deg: f32,
        speed_deg_per_sec: f32,
    ) -> Self {
        let time_ms = distance_deg / speed_deg_per_sec * 1000.0;
        Self::for_duration(current_duty, target_duty, time_ms)
    }

    /// Fade parameters for reaching `target_duty` in about `time_ms`.
    ///
    /// With more ticks than duty steps the fade runs with a scale of 1 and
    /// several ticks per step. With fewer ticks the scale grows instead. A
    /// duration shorter than one tick jumps by the whole distance.
    ///
    /// Long moves are split into at most [`MAX_FADE_STEPS`] steps: the scale
    /// grows and the ticks per step are spread again over the duration.
    pub fn for_duration(current_duty: u32, target_duty: u32, time_ms: f32) -> Self {
        let steps = target_duty.abs_diff(current_duty);
        // saturating float cast, NaN becomes 0
        let nb_cycle = (time_ms / FADE_TICK_MS) as u32;

        let (mut scale, mut cycles_per_step) = if nb_cycle > steps && steps > 0 {
            (1, nb_cycle / steps)
        } else if nb_cycle > 0 {
            (steps / nb_cycle, 1)
        } else {
            (steps, 1)
        };

        let min_scale = steps.div_ceil(MAX_FADE_STEPS);
        if scale < min_scale {
            scale = min_scale;
            cycles_per_step = (nb_cycle / (steps / scale).max(1)).max(1);
            debug!("fade of {steps} steps needs scale {scale}, {cycles_per_step} cycles per step");
        }

        let scale = if scale > MAX_FADE_SCALE {
            info!("fade scale {scale} clamped to {MAX_FADE_SCALE}");
            MAX_FADE_SCALE
        } else {
            scale.max(1)
        };

        let cycles_per_step = if cycles_per_step > MAX_FADE_CYCLES {
            info!("fade cycles {cycles_per_step} clamped to {MAX_FADE_CYCLES}");
            MAX_FADE_CYCLES
        } else {
            cycles_per_step
        };

        debug!(
            "fade {current_duty} -> {target_duty}: steps={steps}, ticks={nb_cycle}, scale={scale}, cycles={cycles_per_step}"
        );

        FadeParams {
            target_duty,
            // both are at most 1023
            scale: scale as u16,
            cycles_per_step: cycles_per_step as u16,
        }
    }

    /// Number of whole steps of `scale` between `from` and the target.
    pub fn duty_steps(&self, from: u32) -> u32 {
        self.target_duty.abs_diff(from) / u32::from(self.scale.max(1))
    }
}
