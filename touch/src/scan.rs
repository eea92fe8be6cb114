//! Scan cycle state shared between the foreground and the CTSU interrupts.
//!
//! The interrupt side is the only writer of `Done`; the foreground is the only
//! writer of the free-running flag. Both are plain atomics, so readiness can be
//! polled without entering a critical section.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScanState {
    /// No scan has been requested yet
    Idle = 0,
    /// A cycle is armed and the hardware is executing it
    Busy = 1,
    /// The latest cycle's results are valid
    Done = 2,
}

impl ScanState {
    const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Busy,
            2 => Self::Done,
            _ => Self::Idle,
        }
    }
}

pub struct ScanControl {
    state: AtomicU8,
    free_running: AtomicBool,
}

impl ScanControl {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ScanState::Idle as u8),
            free_running: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_bits(self.state.load(Ordering::Acquire))
    }

    pub fn is_done(&self) -> bool {
        self.state() == ScanState::Done
    }

    pub fn is_free_running(&self) -> bool {
        self.free_running.load(Ordering::Acquire)
    }

    pub fn set_free_running(&self, free_running: bool) {
        self.free_running.store(free_running, Ordering::Release);
    }

    /// Results may be read.
    ///
    /// In free-running mode this is always true, even mid-cycle: the buffers
    /// then hold the previous cycle's values, at most one scan period old.
    pub fn is_ready(&self) -> bool {
        self.is_free_running() || self.is_done()
    }

    /// A new cycle may be armed if the last one finished, or the hardware
    /// reports nothing in flight.
    pub fn can_start(&self, measuring: bool) -> bool {
        self.is_done() || !measuring
    }

    pub fn mark_busy(&self) {
        self.state.store(ScanState::Busy as u8, Ordering::Release);
    }

    /// Returns the state the cycle was in before completing
    pub fn mark_done(&self) -> ScanState {
        ScanState::from_bits(self.state.swap(ScanState::Done as u8, Ordering::AcqRel))
    }
}

impl Default for ScanControl {
    fn default() -> Self {
        Self::new()
    }
}
