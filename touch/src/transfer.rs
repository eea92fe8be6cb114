//! DTC transfers that feed and drain the CTSU during a scan.
//!
//! Before measuring each channel the CTSU raises a write request, and the DTC
//! copies that channel's three settings words into `CTSUSSC`, `CTSUSO0` and
//! `CTSUSO1`. After the measurement it raises a read request, and the DTC copies
//! `CTSUSC` and `CTSURC` into the channel's result slot. Both transfers run in
//! block mode with the register side repeating, one block per channel.
//!
//! The DTC consumes its descriptors, so they are reloaded before every cycle.

use core::sync::atomic::{AtomicU16, Ordering};

use crate::hw::CtsuPeripheral;

/// 16-bit words per settings block
pub const SETTINGS_BLOCK_LEN: u16 = 3;
/// 16-bit words per result block
pub const RESULTS_BLOCK_LEN: u16 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferChannel {
    SettingsOut,
    ResultsIn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    /// Settings blocks from memory into the CTSU setup registers
    SettingsOut { src: *const u16, blocks: u16 },
    /// CTSU counter registers into result blocks in memory
    ResultsIn { dst: *mut u16, blocks: u16 },
}

// A descriptor only carries addresses; it is dereferenced by the DTC, never by Rust code
unsafe impl Send for Transfer {}

impl Transfer {
    pub const fn channel(&self) -> TransferChannel {
        match self {
            Self::SettingsOut { .. } => TransferChannel::SettingsOut,
            Self::ResultsIn { .. } => TransferChannel::ResultsIn,
        }
    }

    pub const fn block_len(&self) -> u16 {
        match self {
            Self::SettingsOut { .. } => SETTINGS_BLOCK_LEN,
            Self::ResultsIn { .. } => RESULTS_BLOCK_LEN,
        }
    }

    pub const fn blocks(&self) -> u16 {
        match self {
            Self::SettingsOut { blocks, .. } | Self::ResultsIn { blocks, .. } => *blocks,
        }
    }

    /// Total 16-bit words moved by the transfer
    pub const fn words(&self) -> usize {
        self.block_len() as usize * self.blocks() as usize
    }
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: [AtomicU16; 2] = [AtomicU16::new(0), AtomicU16::new(0)];

/// Result slots filled by the DTC, one `[sensor count, reference count]` pair
/// per data index.
///
/// The cells are atomics so the foreground never observes a torn value while
/// the DTC or the interrupt side is active.
#[repr(transparent)]
pub struct ScanBuffers<const N: usize> {
    slots: [[AtomicU16; 2]; N],
}

impl<const N: usize> ScanBuffers<N> {
    pub const fn new() -> Self {
        Self {
            slots: [EMPTY_SLOT; N],
        }
    }

    /// Sensor counter of the last completed measurement
    pub fn count(&self, data_index: u8) -> Option<u16> {
        let slot = self.slots.get(data_index as usize)?;
        Some(slot[0].load(Ordering::Acquire))
    }

    /// Reference counter of the last completed measurement
    pub fn reference(&self, data_index: u8) -> Option<u16> {
        let slot = self.slots.get(data_index as usize)?;
        Some(slot[1].load(Ordering::Acquire))
    }

    /// Start of the result area as the DTC addresses it.
    ///
    /// `AtomicU16` has the layout of `u16`, and the cells are interior-mutable,
    /// so writes through this pointer are permitted while `self` is shared.
    pub fn dma_ptr(&self) -> *mut u16 {
        self.slots.as_ptr() as *mut u16
    }
}

impl<const N: usize> Default for ScanBuffers<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reload both descriptors for the registered channels, enable them and start the scan.
///
/// `settings` is the registry's settings storage in data index order. The
/// trigger is only issued after both transfers are enabled.
pub fn arm<P: CtsuPeripheral, const N: usize>(
    hw: &mut P,
    settings: &[[u16; 3]],
    results: &ScanBuffers<N>,
) {
    debug_assert!(settings.len() <= N);
    let blocks = settings.len() as u16;

    let out = Transfer::SettingsOut {
        src: settings.as_ptr().cast(),
        blocks,
    };
    let inp = Transfer::ResultsIn {
        dst: results.dma_ptr(),
        blocks,
    };

    hw.arm_transfer(&out);
    hw.arm_transfer(&inp);
    hw.enable_transfer(TransferChannel::SettingsOut);
    hw.enable_transfer(TransferChannel::ResultsIn);
    trace!("ctsu: armed {} channels", blocks);
    hw.trigger();
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::mock::{Call, FakeCtsu};
    use crate::registry::CHANNEL_SETTINGS;

    #[test]
    fn test_descriptors() {
        let settings = [CHANNEL_SETTINGS; 3];
        let results: ScanBuffers<4> = ScanBuffers::new();
        let mut hw = FakeCtsu::new();

        arm(&mut hw, &settings, &results);

        let out = hw.transfer(TransferChannel::SettingsOut).unwrap();
        assert_eq!(out.blocks(), 3);
        assert_eq!(out.block_len(), 3);
        assert_eq!(out.words(), 9);
        assert_eq!(out, Transfer::SettingsOut { src: settings.as_ptr().cast(), blocks: 3 });

        let inp = hw.transfer(TransferChannel::ResultsIn).unwrap();
        assert_eq!(inp.words(), 6);
        assert_eq!(inp, Transfer::ResultsIn { dst: results.dma_ptr(), blocks: 3 });
    }

    #[test]
    fn test_arm_before_trigger() {
        let settings = [CHANNEL_SETTINGS; 1];
        let results: ScanBuffers<1> = ScanBuffers::new();
        let mut hw = FakeCtsu::new();

        arm(&mut hw, &settings, &results);
        arm(&mut hw, &settings, &results);

        let sequence: std::vec::Vec<_> = hw
            .calls
            .iter()
            .filter(|c| !matches!(c, Call::Arm(_)))
            .collect();
        assert_eq!(
            sequence,
            [
                &Call::Enable(TransferChannel::SettingsOut),
                &Call::Enable(TransferChannel::ResultsIn),
                &Call::Trigger,
                &Call::Enable(TransferChannel::SettingsOut),
                &Call::Enable(TransferChannel::ResultsIn),
                &Call::Trigger,
            ]
        );
        assert!(matches!(hw.calls[0], Call::Arm(Transfer::SettingsOut { .. })));
        assert!(matches!(hw.calls[1], Call::Arm(Transfer::ResultsIn { .. })));
    }

    #[test]
    fn test_buffers_follow_dma_writes() {
        let results: ScanBuffers<2> = ScanBuffers::new();
        let words = [310u16, 40, 520, 41];
        // Stand in for the DTC
        unsafe {
            let dst = results.dma_ptr() as *const AtomicU16;
            for (i, w) in words.iter().enumerate() {
                (*dst.add(i)).store(*w, Ordering::Release);
            }
        }
        assert_eq!(results.count(0), Some(310));
        assert_eq!(results.reference(0), Some(40));
        assert_eq!(results.count(1), Some(520));
        assert_eq!(results.reference(1), Some(41));
        assert_eq!(results.count(2), None);
    }
}
