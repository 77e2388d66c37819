//! Servo motor driver implementation.
//!
//! This module provides the [`Servo`] struct. A servo moves towards a new
//! angle either at once ([`Servo::force_write`]) or with a hardware fade whose
//! length follows the configured speed ([`Servo::write`]).

use log::{info, trace, warn};

use crate::{
    driver::{ChannelId, FadeWait, LedcDriver, TimerId},
    fade::FadeParams,
    fade_events::FadeCallback,
    resources::LedcResources,
    servo_config::ServoConfig,
};

/// Speed used instead of zero or negative speeds, in degrees per second.
pub const SPEED_EPSILON: f32 = 0.001;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
struct Binding {
    channel: ChannelId,
    timer: TimerId,
}

/// Servo motor driven by one LEDC channel.
///
/// A servo created after the channel pool ran out has no hardware binding:
/// every operation on it is a no-op. Use [`is_bound`](Self::is_bound) to
/// check.
///
/// The angle and duty reported by a servo are the commanded ones. While a
/// fade is running the horn is still on its way.
pub struct Servo<'r, 'l, D: LedcDriver> {
    name: &'static str,
    resources: &'r LedcResources<'l, D>,
    binding: Option<Binding>,
    config: ServoConfig,
    /// Current angle in degrees.
    angle: f32,
    /// Current duty in absolute value.
    duty: u32,
    speed_deg_per_sec: f32,
    callback: Option<&'l dyn FadeCallback>,
}

impl<'r, 'l, D: LedcDriver> Servo<'r, 'l, D> {
    /// Creates new servo driver instance on the next free LEDC channel.
    ///
    /// The timer named by `config` is configured on first use. The servo
    /// starts at angle 0 without touching the output.
    ///
    /// # Arguments
    ///
    /// * `name` - Name identifier for the servo (for logging)
    /// * `resources` - LEDC resource manager shared by all servos
    /// * `pin` - GPIO pin to use for PWM output
    /// * `config` - Servo configuration
    pub fn new(
        name: &'static str,
        resources: &'r LedcResources<'l, D>,
        pin: D::Pin,
        config: ServoConfig,
    ) -> Result<Self, D::Error> {
        let mut servo = Servo {
            name,
            resources,
            binding: None,
            angle: 0.0,
            duty: config.angle_to_duty(0.0),
            speed_deg_per_sec: clamp_speed(config.speed_deg_per_sec),
            config,
            callback: None,
        };

        let Some(channel) = resources.acquire_channel() else {
            warn!("{name} servo: out of channel");
            return Ok(servo);
        };
        let timer = servo.config.timer;
        resources.ensure_timer_initialised(timer, servo.config.frequency_hz)?;
        if let Some(bits) = resources.timer_resolution(timer)
            && !servo.config.fits_resolution(bits)
        {
            warn!(
                "{name} servo: duty range {:?} exceeds the {bits}-bit resolution of {timer:?}",
                servo.config.duty_range
            );
        }

        let mode = resources.mode();
        resources.with_driver(|driver| {
            driver.configure_channel(mode, channel, pin, timer)?;
            driver.register_fade_end(mode, channel)
        })?;
        servo.binding = Some(Binding { channel, timer });

        info!(
            "{name} servo: channel={channel:?}, timer={timer:?}, duty_range={duty_range:?}",
            duty_range = servo.config.duty_range,
        );
        Ok(servo)
    }

    /// Moves to `angle` at the configured speed.
    ///
    /// Returns as soon as the fade is started. When the fade ends the fading
    /// callback runs from interrupt context. Writing the current angle again
    /// runs the fading callback right away, without touching the hardware.
    /// Angles are compared exactly, any other angle starts a fade.
    pub fn write(&mut self, angle: f32) -> Result<(), D::Error> {
        self.write_angle(angle, false)
    }

    /// Sets the duty for `angle` at once, without fading and without callback.
    /// A fade still running is superseded.
    pub fn force_write(&mut self, angle: f32) -> Result<(), D::Error> {
        self.write_angle(angle, true)
    }

    fn write_angle(&mut self, angle: f32, force: bool) -> Result<(), D::Error> {
        let Some(Binding { channel, .. }) = self.binding else {
            trace!("{} servo has no channel, write({angle}) ignored", self.name);
            return Ok(());
        };

        if force {
            let duty = self.config.angle_to_duty(angle);
            self.set_duty_now(channel, duty)?;
            self.resources.fade_events().disarm(channel);
            self.angle = angle;
            self.duty = duty;
            trace!("{} servo forced to {angle} (duty={duty})", self.name);
            return Ok(());
        }

        if angle == self.angle {
            // already there
            self.fading_callback();
            return Ok(());
        }

        let target = self.config.angle_to_duty(angle);
        let distance = (self.angle - angle).abs();
        let fade = FadeParams::for_speed(self.duty, target, distance, self.speed_deg_per_sec);

        let events = self.resources.fade_events();
        // armed first, the fade may end before start_fade returns
        events.arm(channel);
        let mode = self.resources.mode();
        self.resources
            .with_driver(|driver| driver.start_fade(mode, channel, &fade, FadeWait::NoWait))
            .inspect_err(|_| events.disarm(channel))?;

        trace!(
            "{} servo fading {} -> {angle} ({distance} deg at {} deg/s)",
            self.name, self.angle, self.speed_deg_per_sec
        );
        self.angle = angle;
        self.duty = target;
        Ok(())
    }

    /// Moves to `angle` with a fade lasting about `fade_time_ms` and returns
    /// once the hardware finished it. No fading callback runs.
    ///
    /// Writing the current angle does nothing. A zero `fade_time_ms` sets the
    /// duty at once.
    pub fn write_blocking(&mut self, angle: f32, fade_time_ms: u32) -> Result<(), D::Error> {
        let Some(Binding { channel, .. }) = self.binding else {
            return Ok(());
        };
        if angle == self.angle {
            return Ok(());
        }

        let target = self.config.angle_to_duty(angle);
        self.resources.fade_events().disarm(channel);
        if fade_time_ms == 0 {
            self.set_duty_now(channel, target)?;
        } else {
            let fade = FadeParams::for_duration(self.duty, target, fade_time_ms as f32);
            let mode = self.resources.mode();
            self.resources
                .with_driver(|driver| driver.start_fade(mode, channel, &fade, FadeWait::Done))?;
        }

        self.angle = angle;
        self.duty = target;
        Ok(())
    }

    fn set_duty_now(&self, channel: ChannelId, duty: u32) -> Result<(), D::Error> {
        let mode = self.resources.mode();
        self.resources.with_driver(|driver| {
            driver.set_duty(mode, channel, duty)?;
            driver.update_duty(mode, channel)
        })
    }

    /// Sets the servo rotation speed in degrees per second.
    /// Zero, negative and NaN speeds become [`SPEED_EPSILON`].
    pub fn set_speed(&mut self, speed_deg_per_sec: f32) {
        self.speed_deg_per_sec = clamp_speed(speed_deg_per_sec);
    }

    /// Returns the servo rotation speed in degrees per second.
    pub fn speed(&self) -> f32 {
        self.speed_deg_per_sec
    }

    /// Installs the handler run at the end of each fade, `None` removes it.
    pub fn set_fading_callback(&mut self, callback: Option<&'l dyn FadeCallback>) {
        self.callback = callback;
        if let Some(Binding { channel, .. }) = self.binding {
            self.resources.fade_events().register(channel, callback);
        }
    }

    /// Runs the fading callback, if any.
    pub fn fading_callback(&self) {
        if let Some(callback) = self.callback {
            callback.on_fade_end();
        }
    }

    /// Returns current angle value in degrees.
    pub fn get_angle(&self) -> f32 {
        self.angle
    }

    /// Returns current duty in absolute value.
    pub fn duty(&self) -> u32 {
        self.duty
    }

    /// Whether a fade started by [`write`](Self::write) has not ended yet.
    pub fn is_fading(&self) -> bool {
        self.binding
            .is_some_and(|binding| self.resources.fade_events().is_armed(binding.channel))
    }

    /// False for a servo created after the channel pool ran out.
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.binding.map(|binding| binding.channel)
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.binding.map(|binding| binding.timer)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &ServoConfig {
        &self.config
    }

    /// Resource manager the servo was created from.
    pub fn resources(&self) -> &'r LedcResources<'l, D> {
        self.resources
    }

    /// Util method for calculating the time in milliseconds a move of
    /// `angle_deg` takes at the current speed.
    pub fn calc_delay_ms(&self, angle_deg: f32) -> u32 {
        let delay_sec = angle_deg.abs() / self.speed_deg_per_sec;
        (delay_sec * 1000.0) as u32
    }
}

fn clamp_speed(speed_deg_per_sec: f32) -> f32 {
    if speed_deg_per_sec > 0.0 {
        speed_deg_per_sec
    } else {
        SPEED_EPSILON
    }
}
