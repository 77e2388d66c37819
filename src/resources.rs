//! Allocation of the shared LEDC resources.
//!
//! [`LedcResources`] owns the [`LedcDriver`] and hands out channels to
//! [`Servo`](crate::Servo)s. Channels are given out in order and never taken
//! back. Each timer is configured by the first servo using it, and the fade
//! engine is enabled together with the first timer.

use core::cell::{Cell, RefCell};

use log::{debug, info, warn};

use crate::driver::{
    APB_CLK_HZ, ChannelId, ClockSource, LedcDriver, MAX_CHANNELS, SpeedMode, TIMER_COUNT,
    TimerConfig, TimerId,
};
use crate::fade_events::FadeEvents;

/// Number of duty resolution values a timer accepts, 1 to 20 bits.
pub const TIMER_BIT_MAX: u8 = 21;

/// Hardware resource manager shared by all servos of one LEDC peripheral.
///
/// Meant to be used from a single thread: servos borrow it immutably and the
/// state lives in cells. Only the [`FadeEvents`] table is touched from
/// interrupt context.
pub struct LedcResources<'l, D: LedcDriver> {
    driver: RefCell<D>,
    mode: SpeedMode,
    events: &'l FadeEvents<'l>,
    next_channel: Cell<u8>,
    initialised_timers: Cell<u8>,
    resolutions: Cell<[u8; TIMER_COUNT]>,
    fade_installed: Cell<bool>,
}

impl<'l, D: LedcDriver> LedcResources<'l, D> {
    /// Creates the manager for the high speed group.
    pub fn new(driver: D, events: &'l FadeEvents<'l>) -> Self {
        Self::with_mode(driver, events, SpeedMode::HighSpeed)
    }

    pub fn with_mode(driver: D, events: &'l FadeEvents<'l>, mode: SpeedMode) -> Self {
        LedcResources {
            driver: RefCell::new(driver),
            mode,
            events,
            next_channel: Cell::new(0),
            initialised_timers: Cell::new(0),
            resolutions: Cell::new([0; TIMER_COUNT]),
            fade_installed: Cell::new(false),
        }
    }

    pub fn mode(&self) -> SpeedMode {
        self.mode
    }

    pub fn fade_events(&self) -> &'l FadeEvents<'l> {
        self.events
    }

    /// Size of the channel pool.
    pub fn channel_count(&self) -> u8 {
        D::CHANNEL_COUNT.min(MAX_CHANNELS as u8)
    }

    /// Number of channels handed out so far.
    pub fn channels_in_use(&self) -> u8 {
        self.next_channel.get()
    }

    /// Claims the next free channel, `None` once the pool is exhausted.
    pub fn acquire_channel(&self) -> Option<ChannelId> {
        let next = self.next_channel.get();
        if next >= self.channel_count() {
            return None;
        }
        let channel = ChannelId::new(next)?;
        self.next_channel.set(next + 1);
        Some(channel)
    }

    /// Whether `timer` went through its one-time configuration.
    pub fn is_timer_initialised(&self, timer: TimerId) -> bool {
        self.initialised_timers.get() & timer.mask() != 0
    }

    /// Duty resolution in bits `timer` was configured with.
    pub fn timer_resolution(&self, timer: TimerId) -> Option<u8> {
        if !self.is_timer_initialised(timer) {
            return None;
        }
        self.resolutions.get().get(timer.index()).copied()
    }

    /// Configures `timer` for `frequency_hz` with the widest resolution the
    /// APB clock allows, unless it is already configured.
    ///
    /// Returns `Ok(true)` if the timer got configured by this call. When no
    /// resolution fits the frequency the timer stays unconfigured and
    /// `Ok(false)` is returned.
    pub fn ensure_timer_initialised(
        &self,
        timer: TimerId,
        frequency_hz: u32,
    ) -> Result<bool, D::Error> {
        if self.is_timer_initialised(timer) {
            debug!("{timer:?} is already initialised");
            return Ok(false);
        }

        let mut driver = self.driver.borrow_mut();
        let max_resolution = driver.find_max_duty_resolution(APB_CLK_HZ, frequency_hz);
        if max_resolution == 0 {
            warn!("{timer:?}: no duty resolution is possible for {frequency_hz}Hz");
            return Ok(false);
        }
        info!("{timer:?}: max duty resolution is {max_resolution} bits");

        let duty_resolution_bits = if max_resolution < TIMER_BIT_MAX {
            max_resolution
        } else {
            TIMER_BIT_MAX - 1
        };

        driver.configure_timer(&TimerConfig {
            mode: self.mode,
            timer,
            frequency_hz,
            duty_resolution_bits,
            clock: ClockSource::ApbClk,
        })?;

        self.initialised_timers
            .set(self.initialised_timers.get() | timer.mask());
        let mut resolutions = self.resolutions.get();
        if let Some(slot) = resolutions.get_mut(timer.index()) {
            *slot = duty_resolution_bits;
        }
        self.resolutions.set(resolutions);

        if !self.fade_installed.get() {
            driver.install_fade()?;
            self.fade_installed.set(true);
        }
        Ok(true)
    }

    /// Runs `f` with exclusive access to the driver.
    ///
    /// # Panics
    ///
    /// If called again from inside `f`.
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut self.driver.borrow_mut())
    }

    /// Reports finished fades for drivers without a fade end interrupt.
    ///
    /// Every channel with a fade in flight whose hardware fade stopped is
    /// passed to [`FadeEvents::on_fade_end`]. Returns the number of fades
    /// reported.
    pub fn poll_fades(&self) -> u8 {
        let armed = self.events.armed_mask();
        if armed == 0 {
            return 0;
        }

        let mut finished = 0u8;
        {
            let driver = self.driver.borrow();
            for index in 0..self.channel_count() {
                if let Some(channel) = ChannelId::new(index)
                    && armed & channel.mask() != 0
                    && !driver.is_fading(self.mode, channel)
                {
                    finished |= channel.mask();
                }
            }
        }

        // callbacks run without the driver borrowed
        let mut reported = 0;
        for index in 0..self.channel_count() {
            if let Some(channel) = ChannelId::new(index)
                && finished & channel.mask() != 0
                && self.events.on_fade_end(channel)
            {
                reported += 1;
            }
        }
        reported
    }
}
