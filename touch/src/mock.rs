//! Recording stand-ins for the CTSU and a delay that plays the hardware.

use std::collections::VecDeque;

use core::sync::atomic::{AtomicU16, Ordering};
use embedded_hal::delay::DelayNs;

use crate::engine::TouchEngine;
use crate::hw::{CtsuPeripheral, ScanEvent};
use crate::pins::{PinMapping, CHAC_REGISTERS};
use crate::transfer::{Transfer, TransferChannel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Arm(Transfer),
    Enable(TransferChannel),
    Trigger,
}

#[derive(Default)]
pub struct FakeCtsu {
    pub inits: usize,
    pub routed: Vec<u8>,
    pub chac: [u8; CHAC_REGISTERS],
    pub listening: Vec<ScanEvent>,
    pub cleared: Vec<ScanEvent>,
    pub calls: Vec<Call>,
    pub measuring: bool,
}

impl FakeCtsu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triggers(&self) -> usize {
        self.calls.iter().filter(|c| **c == Call::Trigger).count()
    }

    /// Most recently armed transfer for `channel`
    pub fn transfer(&self, channel: TransferChannel) -> Option<Transfer> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Arm(t) if t.channel() == channel => Some(*t),
            _ => None,
        })
    }
}

impl CtsuPeripheral for FakeCtsu {
    fn init(&mut self) {
        self.inits += 1;
    }

    fn route_pin(&mut self, mapping: &PinMapping) {
        self.routed.push(mapping.board_pin);
    }

    fn set_channel_enable(&mut self, mask: &[u8; CHAC_REGISTERS]) {
        self.chac = *mask;
    }

    fn listen(&mut self, event: ScanEvent) {
        self.listening.push(event);
    }

    fn clear_pending(&mut self, event: ScanEvent) {
        self.cleared.push(event);
    }

    fn arm_transfer(&mut self, transfer: &Transfer) {
        self.calls.push(Call::Arm(*transfer));
    }

    fn enable_transfer(&mut self, channel: TransferChannel) {
        self.calls.push(Call::Enable(channel));
    }

    fn trigger(&mut self) {
        self.calls.push(Call::Trigger);
        self.measuring = true;
    }

    fn is_measuring(&self) -> bool {
        self.measuring
    }
}

/// Finish the cycle in flight the way the CTSU and DTC would: write one count
/// per channel into the armed result area, then raise the three interrupts.
pub fn complete_scan<const N: usize>(engine: &TouchEngine<'_, FakeCtsu, N>, counts: &[u16]) {
    let dst = engine.with_peripheral(|hw| {
        assert!(hw.measuring, "no scan in flight");
        hw.measuring = false;
        match hw.transfer(TransferChannel::ResultsIn) {
            Some(Transfer::ResultsIn { dst, blocks }) => {
                assert!(counts.len() <= blocks as usize, "more counts than armed blocks");
                dst
            }
            _ => panic!("result transfer never armed"),
        }
    });

    let cells = dst as *const AtomicU16;
    for (i, count) in counts.iter().enumerate() {
        // SAFETY: the engine armed `blocks` result slots at `dst` and is still borrowed
        unsafe {
            (*cells.add(2 * i)).store(*count, Ordering::Release);
            (*cells.add(2 * i + 1)).store(0, Ordering::Release);
        }
    }

    engine.on_event(ScanEvent::WriteComplete);
    engine.on_event(ScanEvent::ReadComplete);
    engine.on_event(ScanEvent::ScanComplete);
}

/// Delay that completes the pending scan, if any, with the next queued frame
/// of counts. Once the queue is empty the hardware stops responding.
pub struct ScanSim<'e, 'a, const N: usize> {
    engine: &'e TouchEngine<'a, FakeCtsu, N>,
    frames: VecDeque<Vec<u16>>,
    pub elapsed_ns: u64,
    pub scans: usize,
}

impl<'e, 'a, const N: usize> ScanSim<'e, 'a, N> {
    pub fn new(engine: &'e TouchEngine<'a, FakeCtsu, N>) -> Self {
        Self {
            engine,
            frames: VecDeque::new(),
            elapsed_ns: 0,
            scans: 0,
        }
    }

    /// Queue one frame of counts, in data index order
    pub fn push(&mut self, counts: &[u16]) -> &mut Self {
        self.frames.push_back(counts.to_vec());
        self
    }

    /// Queue the same single-channel count for `n` scans
    pub fn repeat(&mut self, count: u16, n: usize) -> &mut Self {
        for _ in 0..n {
            self.push(&[count]);
        }
        self
    }

    fn step(&mut self, ns: u64) {
        self.elapsed_ns += ns;
        if !self.engine.with_peripheral(|hw| hw.measuring) {
            return;
        }
        if let Some(frame) = self.frames.pop_front() {
            complete_scan(self.engine, &frame);
            self.scans += 1;
        }
    }
}

impl<const N: usize> DelayNs for ScanSim<'_, '_, N> {
    fn delay_ns(&mut self, ns: u32) {
        self.step(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.step(us as u64 * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.step(ms as u64 * 1_000_000);
    }
}
