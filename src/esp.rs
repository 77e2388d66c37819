//! [`LedcDriver`] on top of the LEDC driver of
//! [`esp-hal`](https://docs.rs/esp-hal/1.0.0/esp_hal/ledc/index.html).
//!
//! `esp-hal` has no fade end interrupt, so fade completion is polled: call
//! [`LedcResources::poll_fades`](crate::LedcResources::poll_fades) from the
//! main loop.
//!
//! Timers are created lazily but channels keep a reference to their timer,
//! so the timers live in caller provided [`TimerSlots`].

use esp_hal::{
    gpio::{AnyPin, DriveMode},
    ledc::{
        LSGlobalClkSource, Ledc,
        channel::{self, Channel, ChannelHW, ChannelIFace},
        timer::{self, Timer, TimerHW, TimerIFace, TimerSpeed, config::Duty},
    },
    time::Rate,
};
use log::{debug, trace};

use crate::{
    driver::{
        ChannelId, FadeWait, LedcDriver, MAX_CHANNELS, SpeedMode, TIMER_COUNT, TimerConfig,
        TimerId,
    },
    fade::{FadeParams, MAX_FADE_STEPS},
    utils,
};

#[cfg(feature = "esp32")]
const MAX_DUTY_BITS: u8 = 20;
#[cfg(not(feature = "esp32"))]
const MAX_DUTY_BITS: u8 = 14;

#[cfg(feature = "esp32c3")]
const CHANNELS: u8 = 6;
#[cfg(not(feature = "esp32c3"))]
const CHANNELS: u8 = 8;

/// Storage for the timers created by [`EspLedc`].
pub type TimerSlots<'d, S> = [Option<Timer<'d, S>>; TIMER_COUNT];

/// Failures of [`EspLedc`].
#[derive(Debug)]
pub enum EspLedcError {
    Timer(timer::Error),
    Channel(channel::Error),
    /// Channel bound to a timer that was never configured.
    TimerNotConfigured,
    /// The timer was configured before.
    TimerInUse,
    ChannelNotConfigured,
    /// Duty resolution not supported by the chip.
    Resolution(u8),
    /// Channel index not available on the chip.
    NoSuchChannel(usize),
}

/// LEDC peripheral of one speed group.
pub struct EspLedc<'d, S: TimerSpeed + 'static> {
    ledc: Ledc<'d>,
    clock_source: S::ClockSourceType,
    free_slots: [Option<&'d mut Option<Timer<'d, S>>>; TIMER_COUNT],
    timers: [Option<&'d Timer<'d, S>>; TIMER_COUNT],
    channels: [Option<Channel<'d, S>>; MAX_CHANNELS],
    /// Last duty written or faded to, per channel.
    duties: [u32; MAX_CHANNELS],
}

impl<'d, S: TimerSpeed + 'static> EspLedc<'d, S> {
    /// Creates the driver. Timers are clocked from `clock_source`, usually
    /// the APB clock of the speed group.
    pub fn new(
        mut ledc: Ledc<'d>,
        clock_source: S::ClockSourceType,
        slots: &'d mut TimerSlots<'d, S>,
    ) -> Self {
        ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
        EspLedc {
            ledc,
            clock_source,
            free_slots: slots.each_mut().map(Some),
            timers: [None; TIMER_COUNT],
            channels: [const { None }; MAX_CHANNELS],
            duties: [0; MAX_CHANNELS],
        }
    }

    fn channel(&self, channel: ChannelId) -> Result<&Channel<'d, S>, EspLedcError> {
        self.channels
            .get(channel.index())
            .and_then(Option::as_ref)
            .ok_or(EspLedcError::ChannelNotConfigured)
    }

    fn record_duty(&mut self, channel: ChannelId, duty: u32) {
        if let Some(slot) = self.duties.get_mut(channel.index()) {
            *slot = duty;
        }
    }

    fn last_duty(&self, channel: ChannelId) -> u32 {
        self.duties.get(channel.index()).copied().unwrap_or(0)
    }
}

impl<'d, S> LedcDriver for EspLedc<'d, S>
where
    S: TimerSpeed + 'static,
    S::ClockSourceType: Copy,
    Timer<'d, S>: TimerHW<S> + TimerIFace<S>,
    Channel<'d, S>: ChannelHW + ChannelIFace<'d, S>,
{
    type Error = EspLedcError;
    type Pin = AnyPin<'d>;

    const CHANNEL_COUNT: u8 = CHANNELS;

    fn configure_timer(&mut self, config: &TimerConfig) -> Result<(), EspLedcError> {
        let index = config.timer.index();
        let duty = duty_from_bits(config.duty_resolution_bits)
            .ok_or(EspLedcError::Resolution(config.duty_resolution_bits))?;
        let slot = self
            .free_slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(EspLedcError::TimerInUse)?;

        let timer = slot.insert(self.ledc.timer::<S>(timer_number(config.timer)));
        timer
            .configure(timer::config::Config {
                duty,
                clock_source: self.clock_source,
                frequency: Rate::from_hz(config.frequency_hz),
            })
            .map_err(EspLedcError::Timer)?;

        let timer: &'d Timer<'d, S> = timer;
        if let Some(entry) = self.timers.get_mut(index) {
            *entry = Some(timer);
        }
        debug!(
            "{:?}: {}Hz, {} bits",
            config.timer, config.frequency_hz, config.duty_resolution_bits
        );
        Ok(())
    }

    fn find_max_duty_resolution(&self, clock_hz: u32, frequency_hz: u32) -> u8 {
        utils::find_suitable_duty_resolution(clock_hz, frequency_hz).min(MAX_DUTY_BITS)
    }

    fn configure_channel(
        &mut self,
        _mode: SpeedMode,
        channel: ChannelId,
        pin: AnyPin<'d>,
        timer: TimerId,
    ) -> Result<(), EspLedcError> {
        let timer = self
            .timers
            .get(timer.index())
            .copied()
            .flatten()
            .ok_or(EspLedcError::TimerNotConfigured)?;

        let mut ledc_channel = self.ledc.channel(channel_number(channel)?, pin);
        ledc_channel
            .configure(channel::config::Config {
                timer,
                duty_pct: 0,
                drive_mode: DriveMode::PushPull,
            })
            .map_err(EspLedcError::Channel)?;

        let slot = self
            .channels
            .get_mut(channel.index())
            .ok_or(EspLedcError::NoSuchChannel(channel.index()))?;
        *slot = Some(ledc_channel);
        self.record_duty(channel, 0);
        Ok(())
    }

    fn set_duty(
        &mut self,
        _mode: SpeedMode,
        channel: ChannelId,
        duty: u32,
    ) -> Result<(), EspLedcError> {
        // hardware method has better resolution than percentages
        self.channel(channel)?.set_duty_hw(duty);
        self.record_duty(channel, duty);
        Ok(())
    }

    fn update_duty(&mut self, _mode: SpeedMode, channel: ChannelId) -> Result<(), EspLedcError> {
        // set_duty_hw already latches the new value
        self.channel(channel).map(|_| ())
    }

    fn start_fade(
        &mut self,
        _mode: SpeedMode,
        channel: ChannelId,
        fade: &FadeParams,
        wait: FadeWait,
    ) -> Result<(), EspLedcError> {
        let current = self.last_duty(channel);
        let target = fade.target_duty;
        let scale = u32::from(fade.scale);
        let duty_steps = fade.duty_steps(current).min(MAX_FADE_STEPS);
        let ledc_channel = self.channel(channel)?;

        if duty_steps == 0 {
            ledc_channel.set_duty_hw(target);
        } else {
            // start where whole steps end exactly on the target
            let duty_inc = target > current;
            let span = duty_steps * scale;
            let start = if duty_inc {
                target.saturating_sub(span)
            } else {
                target.saturating_add(span)
            };
            trace!(
                "{channel:?} fade {start} -> {target}: {duty_steps} steps of {scale} every {} cycles",
                fade.cycles_per_step
            );
            ledc_channel.start_duty_fade_hw(
                start,
                duty_inc,
                duty_steps as u16,
                fade.cycles_per_step,
                fade.scale,
            );
            if wait == FadeWait::Done {
                while ledc_channel.is_duty_fade_running_hw() {
                    core::hint::spin_loop();
                }
            }
        }

        self.record_duty(channel, target);
        Ok(())
    }

    fn register_fade_end(&mut self, _mode: SpeedMode, channel: ChannelId) -> Result<(), EspLedcError> {
        // completion is polled through is_fading
        self.channel(channel).map(|_| ())
    }

    fn install_fade(&mut self) -> Result<(), EspLedcError> {
        trace!("LEDC fade engine needs no installation");
        Ok(())
    }

    fn is_fading(&self, _mode: SpeedMode, channel: ChannelId) -> bool {
        self.channel(channel)
            .is_ok_and(|ledc_channel| ledc_channel.is_duty_fade_running_hw())
    }
}

fn timer_number(timer: TimerId) -> timer::Number {
    match timer {
        TimerId::Timer0 => timer::Number::Timer0,
        TimerId::Timer1 => timer::Number::Timer1,
        TimerId::Timer2 => timer::Number::Timer2,
        TimerId::Timer3 => timer::Number::Timer3,
    }
}

fn channel_number(channel: ChannelId) -> Result<channel::Number, EspLedcError> {
    Ok(match channel.index() {
        0 => channel::Number::Channel0,
        1 => channel::Number::Channel1,
        2 => channel::Number::Channel2,
        3 => channel::Number::Channel3,
        4 => channel::Number::Channel4,
        5 => channel::Number::Channel5,
        #[cfg(not(feature = "esp32c3"))]
        6 => channel::Number::Channel6,
        #[cfg(not(feature = "esp32c3"))]
        7 => channel::Number::Channel7,
        index => return Err(EspLedcError::NoSuchChannel(index)),
    })
}

fn duty_from_bits(bits: u8) -> Option<Duty> {
    Some(match bits {
        1 => Duty::Duty1Bit,
        2 => Duty::Duty2Bit,
        3 => Duty::Duty3Bit,
        4 => Duty::Duty4Bit,
        5 => Duty::Duty5Bit,
        6 => Duty::Duty6Bit,
        7 => Duty::Duty7Bit,
        8 => Duty::Duty8Bit,
        9 => Duty::Duty9Bit,
        10 => Duty::Duty10Bit,
        11 => Duty::Duty11Bit,
        12 => Duty::Duty12Bit,
        13 => Duty::Duty13Bit,
        14 => Duty::Duty14Bit,
        #[cfg(feature = "esp32")]
        15 => Duty::Duty15Bit,
        #[cfg(feature = "esp32")]
        16 => Duty::Duty16Bit,
        #[cfg(feature = "esp32")]
        17 => Duty::Duty17Bit,
        #[cfg(feature = "esp32")]
        18 => Duty::Duty18Bit,
        #[cfg(feature = "esp32")]
        19 => Duty::Duty19Bit,
        #[cfg(feature = "esp32")]
        20 => Duty::Duty20Bit,
        _ => return None,
    })
}
