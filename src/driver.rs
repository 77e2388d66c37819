//! Capability surface of the LEDC peripheral.
//!
//! [`LedcDriver`] is everything the servo layer needs from a PWM peripheral:
//! timer and channel configuration, immediate duty writes, hardware fades and
//! fade completion reporting. `esp::EspLedc` implements it on top of
//! `esp-hal`; tests implement it with a recorder.

use core::fmt::Debug;

use crate::fade::FadeParams;
use crate::utils;

/// Max number of LEDC channels per speed mode on any supported chip.
pub const MAX_CHANNELS: usize = 8;

/// Number of LEDC timers per speed mode.
pub const TIMER_COUNT: usize = 4;

/// Frequency of the APB clock feeding the LEDC timers.
pub const APB_CLK_HZ: u32 = 80_000_000;

/// LEDC channel identifier, always below [`MAX_CHANNELS`].
#[derive(PartialEq, Eq, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Returns `None` when `index` is not a valid channel.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_CHANNELS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Zero based channel index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn mask(self) -> u8 {
        1 << self.0
    }
}

/// LEDC timer identifier.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum TimerId {
    Timer0,
    Timer1,
    Timer2,
    Timer3,
}

impl TimerId {
    /// Zero based timer index.
    pub const fn index(self) -> usize {
        match self {
            TimerId::Timer0 => 0,
            TimerId::Timer1 => 1,
            TimerId::Timer2 => 2,
            TimerId::Timer3 => 3,
        }
    }

    pub(crate) const fn mask(self) -> u8 {
        1 << self.index()
    }
}

/// LEDC speed mode. Only the original ESP32 has the high speed group.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum SpeedMode {
    #[default]
    HighSpeed,
    LowSpeed,
}

/// Clock source of a LEDC timer.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum ClockSource {
    #[default]
    ApbClk,
}

/// Whether starting a fade returns immediately or once the fade is done.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum FadeWait {
    /// Return right away, completion is reported later.
    NoWait,
    /// Block until the hardware fade finished.
    Done,
}

/// Parameters of a one-time timer configuration.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct TimerConfig {
    pub mode: SpeedMode,
    pub timer: TimerId,
    pub frequency_hz: u32,
    /// PWM resolution in bits.
    pub duty_resolution_bits: u8,
    pub clock: ClockSource,
}

/// LEDC peripheral operations used by [`Servo`](crate::Servo).
///
/// Every fallible call is treated as fatal by the servo layer: errors are
/// returned to the caller unchanged and the servo state is not updated.
pub trait LedcDriver {
    /// Driver specific failure.
    type Error: Debug;
    /// Output pin handed to [`configure_channel`](Self::configure_channel).
    type Pin;

    /// Channels available in one speed mode.
    const CHANNEL_COUNT: u8 = MAX_CHANNELS as u8;

    /// Configures frequency and resolution of a timer.
    fn configure_timer(&mut self, config: &TimerConfig) -> Result<(), Self::Error>;

    /// Highest duty resolution in bits reachable for `frequency_hz` when the
    /// timer is clocked by `clock_hz`. Zero means the frequency is not
    /// reachable at all.
    fn find_max_duty_resolution(&self, clock_hz: u32, frequency_hz: u32) -> u8 {
        utils::find_suitable_duty_resolution(clock_hz, frequency_hz)
    }

    /// Binds `channel` to an output pin and a configured timer.
    fn configure_channel(
        &mut self,
        mode: SpeedMode,
        channel: ChannelId,
        pin: Self::Pin,
        timer: TimerId,
    ) -> Result<(), Self::Error>;

    /// Latches a new duty value, applied by [`update_duty`](Self::update_duty).
    fn set_duty(&mut self, mode: SpeedMode, channel: ChannelId, duty: u32)
    -> Result<(), Self::Error>;

    /// Applies the latched duty value.
    fn update_duty(&mut self, mode: SpeedMode, channel: ChannelId) -> Result<(), Self::Error>;

    /// Starts a hardware fade towards `fade.target_duty`.
    fn start_fade(
        &mut self,
        mode: SpeedMode,
        channel: ChannelId,
        fade: &FadeParams,
        wait: FadeWait,
    ) -> Result<(), Self::Error>;

    /// Enables fade end notification for `channel`. Drivers with an interrupt
    /// call [`FadeEvents::on_fade_end`](crate::FadeEvents::on_fade_end) from it.
    fn register_fade_end(&mut self, mode: SpeedMode, channel: ChannelId)
    -> Result<(), Self::Error>;

    /// Enables the fade engine. Called once per [`LedcResources`](crate::LedcResources).
    fn install_fade(&mut self) -> Result<(), Self::Error>;

    /// Whether a hardware fade is still running on `channel`.
    /// Used by [`LedcResources::poll_fades`](crate::LedcResources::poll_fades).
    fn is_fading(&self, _mode: SpeedMode, _channel: ChannelId) -> bool {
        false
    }
}
