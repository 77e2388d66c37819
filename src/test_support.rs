//! Host side [`LedcDriver`] recording every call.

use crate::driver::{ChannelId, FadeWait, LedcDriver, SpeedMode, TimerConfig, TimerId};
use crate::fade::FadeParams;
use crate::utils;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ConfigureTimer(TimerConfig),
    ConfigureChannel {
        channel: usize,
        pin: u8,
        timer: TimerId,
    },
    SetDuty {
        channel: usize,
        duty: u32,
    },
    UpdateDuty {
        channel: usize,
    },
    StartFade {
        channel: usize,
        fade: FadeParams,
        wait: FadeWait,
    },
    RegisterFadeEnd {
        channel: usize,
    },
    InstallFade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refused;

pub struct RecordingDriver<const N: u8 = 8> {
    pub calls: Vec<Call>,
    /// Overrides the computed resolution when set.
    pub max_resolution: Option<u8>,
    /// Bit `n` keeps channel `n` reporting a running fade.
    pub fading: u8,
    pub fail_timer: bool,
    pub fail_fade: bool,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<const N: u8> Default for RecordingDriver<N> {
    fn default() -> Self {
        RecordingDriver {
            calls: Vec::new(),
            max_resolution: None,
            fading: 0,
            fail_timer: false,
            fail_fade: false,
        }
    }
}

impl<const N: u8> RecordingDriver<N> {
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn fades(&self) -> Vec<FadeParams> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::StartFade { fade, .. } => Some(*fade),
                _ => None,
            })
            .collect()
    }
}

impl<const N: u8> LedcDriver for RecordingDriver<N> {
    type Error = Refused;
    type Pin = u8;

    const CHANNEL_COUNT: u8 = N;

    fn configure_timer(&mut self, config: &TimerConfig) -> Result<(), Refused> {
        if self.fail_timer {
            return Err(Refused);
        }
        self.calls.push(Call::ConfigureTimer(*config));
        Ok(())
    }

    fn find_max_duty_resolution(&self, clock_hz: u32, frequency_hz: u32) -> u8 {
        self.max_resolution
            .unwrap_or_else(|| utils::find_suitable_duty_resolution(clock_hz, frequency_hz))
    }

    fn configure_channel(
        &mut self,
        _mode: SpeedMode,
        channel: ChannelId,
        pin: u8,
        timer: TimerId,
    ) -> Result<(), Refused> {
        self.calls.push(Call::ConfigureChannel {
            channel: channel.index(),
            pin,
            timer,
        });
        Ok(())
    }

    fn set_duty(&mut self, _mode: SpeedMode, channel: ChannelId, duty: u32) -> Result<(), Refused> {
        self.calls.push(Call::SetDuty {
            channel: channel.index(),
            duty,
        });
        Ok(())
    }

    fn update_duty(&mut self, _mode: SpeedMode, channel: ChannelId) -> Result<(), Refused> {
        self.calls.push(Call::UpdateDuty {
            channel: channel.index(),
        });
        Ok(())
    }

    fn start_fade(
        &mut self,
        _mode: SpeedMode,
        channel: ChannelId,
        fade: &FadeParams,
        wait: FadeWait,
    ) -> Result<(), Refused> {
        if self.fail_fade {
            return Err(Refused);
        }
        self.calls.push(Call::StartFade {
            channel: channel.index(),
            fade: *fade,
            wait,
        });
        Ok(())
    }

    fn register_fade_end(&mut self, _mode: SpeedMode, channel: ChannelId) -> Result<(), Refused> {
        self.calls.push(Call::RegisterFadeEnd {
            channel: channel.index(),
        });
        Ok(())
    }

    fn install_fade(&mut self) -> Result<(), Refused> {
        self.calls.push(Call::InstallFade);
        Ok(())
    }

    fn is_fading(&self, _mode: SpeedMode, channel: ChannelId) -> bool {
        self.fading & channel.mask() != 0
    }
}
