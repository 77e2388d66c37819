//! Wrapper that makes [`Servo`] asynchronous by using async delays.
//! Enable the `async` feature to use these types and methods.
//!
//! # Example
//!
//! ```ignore
//! use esp_hal_fade_servo::{Servo, ServoConfig, async_servo::AsyncServo};
//!
//! // resources, pin and delay are created elsewhere
//! let servo = Servo::new("servo", &resources, pin, ServoConfig::sg90(14))?;
//! let mut async_servo = AsyncServo::new(servo, delay);
//!
//! // Returns once the move should be over, based on the servo speed
//! async_servo.write(90.0).await?;
//! ```

use core::ops::{Deref, DerefMut};

use embedded_hal_async::delay::DelayNs;

use crate::{LedcDriver, Servo, fade::FADE_TICK_MS};

/// Async wrapper around [`Servo`] that provides async versions of control methods.
///
/// The `Dl` generic parameter represents any type that implements [`DelayNs`] trait,
/// allowing you to use any async delay implementation (e.g., Embassy timer, RTOS delay, etc.).
pub struct AsyncServo<'r, 'l, D: LedcDriver, Dl: DelayNs> {
    servo: Servo<'r, 'l, D>,
    delay: Dl,
}

impl<'r, 'l, D: LedcDriver, Dl: DelayNs> AsyncServo<'r, 'l, D, Dl> {
    /// Creates a new async servo wrapper from a synchronous servo and a delay implementation.
    pub fn new(servo: Servo<'r, 'l, D>, delay: Dl) -> Self {
        Self { servo, delay }
    }

    /// Starts a fade to `angle` and waits for the time the move takes at the
    /// servo speed.
    pub async fn write(&mut self, angle: f32) -> Result<(), D::Error> {
        let angle_before = self.servo.get_angle();
        self.servo.write(angle)?;
        self.wait_for_movement(angle_before, angle).await;
        Ok(())
    }

    /// Starts a fade to `angle` and waits `delay_ms` milliseconds.
    pub async fn write_with_delay(&mut self, angle: f32, delay_ms: u32) -> Result<(), D::Error> {
        self.servo.write(angle)?;
        if delay_ms > 0 {
            self.delay.delay_ms(delay_ms).await;
        }
        Ok(())
    }

    /// Waits until the running fade was reported finished, polling the
    /// driver once per fade tick.
    pub async fn wait_fade_end(&mut self) {
        loop {
            self.servo.resources().poll_fades();
            if !self.servo.is_fading() {
                return;
            }
            self.delay.delay_ms(FADE_TICK_MS as u32).await;
        }
    }

    /// Returns a reference to the underlying synchronous servo.
    pub fn sync_servo(&self) -> &Servo<'r, 'l, D> {
        &self.servo
    }

    /// Returns a mutable reference to the underlying synchronous servo.
    pub fn sync_servo_mut(&mut self) -> &mut Servo<'r, 'l, D> {
        &mut self.servo
    }

    /// Gives back the wrapped servo and delay.
    pub fn into_inner(self) -> (Servo<'r, 'l, D>, Dl) {
        (self.servo, self.delay)
    }

    async fn wait_for_movement(&mut self, angle_before: f32, angle_after: f32) {
        let delay_ms = self.servo.calc_delay_ms(angle_after - angle_before);
        if delay_ms > 0 {
            self.delay.delay_ms(delay_ms).await;
        }
    }
}

impl<'r, 'l, D: LedcDriver, Dl: DelayNs> Deref for AsyncServo<'r, 'l, D, Dl> {
    type Target = Servo<'r, 'l, D>;

    fn deref(&self) -> &Self::Target {
        &self.servo
    }
}

impl<D: LedcDriver, Dl: DelayNs> DerefMut for AsyncServo<'_, '_, D, Dl> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.servo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FadeEvents, LedcResources, ServoConfig, test_support::RecordingDriver};
    use core::sync::atomic::{AtomicU32, Ordering};
    use embassy_futures::block_on;

    #[derive(Default)]
    struct RecordingDelay {
        total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    #[test]
    fn write_waits_for_the_move() {
        let events = FadeEvents::new();
        let resources = LedcResources::new(RecordingDriver::new(), &events);
        let mut servo = Servo::new("pan", &resources, 18, ServoConfig::default()).unwrap();
        servo.set_speed(90.0);
        let mut servo = AsyncServo::new(servo, RecordingDelay::default());

        block_on(servo.write(45.0)).unwrap();
        assert_eq!(servo.get_angle(), 45.0);
        block_on(servo.write(0.0)).unwrap();

        let (_, delay) = servo.into_inner();
        assert_eq!(delay.total_ns, 1_000_000_000);
    }

    #[test]
    fn custom_delay_is_used_as_is() {
        let events = FadeEvents::new();
        let resources = LedcResources::new(RecordingDriver::new(), &events);
        let servo = Servo::new("pan", &resources, 18, ServoConfig::default()).unwrap();
        let mut servo = AsyncServo::new(servo, RecordingDelay::default());

        block_on(servo.write_with_delay(90.0, 250)).unwrap();
        let (_, delay) = servo.into_inner();
        assert_eq!(delay.total_ns, 250_000_000);
    }

    #[test]
    fn wait_fade_end_dispatches_the_callback() {
        let hits = AtomicU32::new(0);
        let on_end = || {
            hits.fetch_add(1, Ordering::Relaxed);
        };
        let events = FadeEvents::new();
        let resources = LedcResources::new(RecordingDriver::new(), &events);
        let mut servo = Servo::new("pan", &resources, 18, ServoConfig::default()).unwrap();
        servo.set_fading_callback(Some(&on_end));
        let mut servo = AsyncServo::new(servo, RecordingDelay::default());

        servo.sync_servo_mut().write(30.0).unwrap();
        assert!(servo.is_fading());
        block_on(servo.wait_fade_end());

        assert!(!servo.is_fading());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
