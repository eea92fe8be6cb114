//! What the engine needs from the chip.
//!
//! Everything register-level sits behind [`CtsuPeripheral`]: power-up, pin
//! routing, the cumulative channel enable registers, interrupt plumbing for the
//! three CTSU events, and the two DTC channels. [`crate::ctsu::Ra4m1Ctsu`]
//! implements it for the real part; tests substitute a recording fake.

use crate::pins::{PinMapping, CHAC_REGISTERS};
use crate::transfer::{Transfer, TransferChannel};

/// Interrupt sources of one scan cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanEvent {
    /// Settings transfer for the last channel finished
    WriteComplete,
    /// Result transfer for the last channel finished
    ReadComplete,
    /// The CTSU finished measuring every enabled channel
    ScanComplete,
}

impl ScanEvent {
    pub const ALL: [ScanEvent; 3] = [Self::WriteComplete, Self::ReadComplete, Self::ScanComplete];
}

pub trait CtsuPeripheral {
    /// One-time bring-up of the CTSU and DTC. Repeated calls are no-ops.
    fn init(&mut self);

    /// Hand the board pin over to the CTSU
    fn route_pin(&mut self, mapping: &PinMapping);

    /// Write the full `CTSUCHAC0..4` image
    fn set_channel_enable(&mut self, mask: &[u8; CHAC_REGISTERS]);

    /// Route `event` to the CPU. The application's vector table is expected to
    /// forward it to [`crate::TouchEngine::on_event`].
    fn listen(&mut self, event: ScanEvent);

    /// Acknowledge `event` so it does not fire again
    fn clear_pending(&mut self, event: ScanEvent);

    /// Load a transfer descriptor. The transfer stays idle until enabled.
    fn arm_transfer(&mut self, transfer: &Transfer);

    fn enable_transfer(&mut self, channel: TransferChannel);

    /// Start a measurement cycle
    fn trigger(&mut self);

    /// Whether the CTSU status counter reports a measurement in progress
    fn is_measuring(&self) -> bool;
}
