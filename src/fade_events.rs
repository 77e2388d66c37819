//! Fade completion dispatch.
//!
//! [`FadeEvents`] maps each LEDC channel to the callback of the servo bound to
//! it. The driver reports the end of a hardware fade through
//! [`FadeEvents::on_fade_end`], usually from an interrupt handler, so the
//! table lives behind a [`critical_section::Mutex`] and can be a `static`.
//!
//! ```
//! use esp_hal_fade_servo::FadeEvents;
//!
//! static FADE_EVENTS: FadeEvents<'static> = FadeEvents::new();
//! # let _ = &FADE_EVENTS;
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use log::trace;

use crate::driver::{ChannelId, MAX_CHANNELS};

/// Handler run when a fade finished. It runs in interrupt context and must
/// not block.
pub trait FadeCallback: Sync {
    fn on_fade_end(&self);
}

impl<F: Fn() + Sync> FadeCallback for F {
    fn on_fade_end(&self) {
        self()
    }
}

struct Table<'l> {
    callbacks: [Option<&'l dyn FadeCallback>; MAX_CHANNELS],
    /// Channels with a fade in flight.
    armed: u8,
}

/// Channel to callback registration table shared with the fade interrupt.
pub struct FadeEvents<'l> {
    table: Mutex<RefCell<Table<'l>>>,
}

impl<'l> FadeEvents<'l> {
    pub const fn new() -> Self {
        FadeEvents {
            table: Mutex::new(RefCell::new(Table {
                callbacks: [None; MAX_CHANNELS],
                armed: 0,
            })),
        }
    }

    /// Installs or removes the callback for `channel`.
    pub fn register(&self, channel: ChannelId, callback: Option<&'l dyn FadeCallback>) {
        critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            if let Some(slot) = table.callbacks.get_mut(channel.index()) {
                *slot = callback;
            }
        });
    }

    /// Marks a fade as started on `channel`.
    pub fn arm(&self, channel: ChannelId) {
        critical_section::with(|cs| {
            self.table.borrow_ref_mut(cs).armed |= channel.mask();
        });
    }

    /// Forgets the fade in flight on `channel`, its end will not be reported.
    pub fn disarm(&self, channel: ChannelId) {
        critical_section::with(|cs| {
            self.table.borrow_ref_mut(cs).armed &= !channel.mask();
        });
    }

    /// Whether a fade started on `channel` has not been reported finished yet.
    pub fn is_armed(&self, channel: ChannelId) -> bool {
        self.armed_mask() & channel.mask() != 0
    }

    /// Bit `n` is set when channel `n` has a fade in flight.
    pub fn armed_mask(&self) -> u8 {
        critical_section::with(|cs| self.table.borrow_ref(cs).armed)
    }

    /// Fade end trampoline.
    ///
    /// Runs the callback of `channel` once per armed fade and ignores
    /// completions nobody waits for. Returns whether a fade was pending.
    pub fn on_fade_end(&self, channel: ChannelId) -> bool {
        let (pending, callback) = critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            let pending = table.armed & channel.mask() != 0;
            table.armed &= !channel.mask();
            let callback = table.callbacks.get(channel.index()).copied().flatten();
            (pending, callback)
        });

        trace!("fade end on {channel:?}, pending={pending}");
        // called outside of the critical section
        if pending && let Some(callback) = callback {
            callback.on_fade_end();
        }
        pending
    }
}

impl Default for FadeEvents<'_> {
    fn default() -> Self {
        Self::new()
    }
}
