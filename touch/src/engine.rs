//! The scanning engine: registry, result buffers and scan state in one object.
//!
//! A `TouchEngine` is meant to live in a `static` so that the CTSU interrupt
//! handlers can reach it:
//!
//! ```ignore
//! static ENGINE: TouchEngine<'static, Ra4m1Ctsu, 12> =
//!     TouchEngine::new(Ra4m1Ctsu::new(BOARD, SYSCLK_HZ), BOARD_PINS);
//!
//! #[interrupt]
//! fn IEL10() {
//!     ENGINE.on_event(ScanEvent::ScanComplete);
//! }
//! ```
//!
//! Registration and arming go through a critical section. Readiness and result
//! reads are lock-free.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;

use crate::error::Error;
use crate::hw::{CtsuPeripheral, ScanEvent};
use crate::pins::PinMapping;
use crate::registry::Registry;
use crate::scan::{ScanControl, ScanState};
use crate::transfer::{self, ScanBuffers};

/// Notified from interrupt context each time a scan cycle completes
pub trait ScanCallback: Sync {
    fn scan_complete(&self);
}

impl<F: Fn() + Sync> ScanCallback for F {
    fn scan_complete(&self) {
        self()
    }
}

struct Scanner<P, const N: usize> {
    hw: P,
    registry: Registry<N>,
    initialized: bool,
}

impl<P: CtsuPeripheral, const N: usize> Scanner<P, N> {
    fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.hw.init();
        for event in ScanEvent::ALL {
            self.hw.listen(event);
        }
        self.initialized = true;
        debug!("ctsu: initialized");
    }
}

pub struct TouchEngine<'a, P, const N: usize> {
    control: ScanControl,
    results: ScanBuffers<N>,
    callback: Mutex<Cell<Option<&'a dyn ScanCallback>>>,
    scanner: Mutex<RefCell<Scanner<P, N>>>,
}

impl<'a, P: CtsuPeripheral, const N: usize> TouchEngine<'a, P, N> {
    /// Create an engine with room for `N` channels, resolving pins with `table`
    pub const fn new(hw: P, table: &'static [PinMapping]) -> Self {
        Self {
            control: ScanControl::new(),
            results: ScanBuffers::new(),
            callback: Mutex::new(Cell::new(None)),
            scanner: Mutex::new(RefCell::new(Scanner {
                hw,
                registry: Registry::new(table),
                initialized: false,
            })),
        }
    }

    /// Bring up the peripheral and route its interrupts. Called implicitly by
    /// the first registration.
    pub fn init(&self) {
        critical_section::with(|cs| self.scanner.borrow_ref_mut(cs).init());
    }

    /// Activate the channel behind `board_pin`, returning its data index.
    ///
    /// Channels must be registered before free-running starts: an armed cycle
    /// reads the settings storage this shifts.
    pub fn register_pin(&self, board_pin: u8) -> Result<u8, Error> {
        if self.control.state() == ScanState::Busy {
            warn!("ctsu: registering pin {} during a scan", board_pin);
        }
        critical_section::with(|cs| {
            let mut scanner = self.scanner.borrow_ref_mut(cs);
            let scanner = &mut *scanner;
            scanner.registry.check(board_pin)?;
            scanner.init();

            let (data_index, mapping) = scanner.registry.register(board_pin)?;
            scanner.hw.route_pin(&mapping);
            scanner.hw.set_channel_enable(scanner.registry.enable_mask());
            info!(
                "ctsu: pin {} -> TS{} at data index {}",
                board_pin,
                mapping.channel,
                data_index
            );
            Ok(data_index)
        })
    }

    /// Request a scan cycle.
    ///
    /// The free-running flag is always updated. A new cycle is armed only if
    /// none is in flight; otherwise the call is a no-op and the in-flight cycle
    /// completes (and, if the flag was just cleared, does not re-arm).
    pub fn start(&self, free_running: bool) {
        self.control.set_free_running(free_running);
        critical_section::with(|cs| {
            let mut scanner = self.scanner.borrow_ref_mut(cs);
            if self.control.can_start(scanner.hw.is_measuring()) {
                self.arm(&mut scanner);
            }
        });
    }

    /// Leave free-running mode. The cycle in flight runs to completion.
    pub fn stop(&self) {
        self.control.set_free_running(false);
    }

    fn arm(&self, scanner: &mut Scanner<P, N>) {
        if scanner.registry.is_empty() {
            warn!("ctsu: scan requested with no channels registered");
            return;
        }
        self.control.mark_busy();
        transfer::arm(&mut scanner.hw, scanner.registry.settings(), &self.results);
    }

    pub fn is_ready(&self) -> bool {
        self.control.is_ready()
    }

    pub fn state(&self) -> ScanState {
        self.control.state()
    }

    pub fn is_free_running(&self) -> bool {
        self.control.is_free_running()
    }

    /// Most channels this engine can hold
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Install or remove the completion callback
    pub fn set_callback(&self, callback: Option<&'a dyn ScanCallback>) {
        critical_section::with(|cs| self.callback.borrow(cs).set(callback));
    }

    /// Dispatch a CTSU interrupt. Call this from the vector bound to `event`.
    pub fn on_event(&self, event: ScanEvent) {
        match event {
            ScanEvent::WriteComplete => self.on_write_complete(),
            ScanEvent::ReadComplete => self.on_read_complete(),
            ScanEvent::ScanComplete => self.on_scan_complete(),
        }
    }

    pub fn on_write_complete(&self) {
        self.clear_pending(ScanEvent::WriteComplete);
    }

    pub fn on_read_complete(&self) {
        self.clear_pending(ScanEvent::ReadComplete);
    }

    /// Publish the cycle's results, notify the callback, and re-arm when free-running.
    pub fn on_scan_complete(&self) {
        self.clear_pending(ScanEvent::ScanComplete);

        let previous = self.control.mark_done();
        if previous != ScanState::Busy {
            trace!("ctsu: scan complete while {}", previous as u8);
        }

        if let Some(callback) = critical_section::with(|cs| self.callback.borrow(cs).get()) {
            callback.scan_complete();
        }

        if self.control.is_free_running() {
            critical_section::with(|cs| self.arm(&mut self.scanner.borrow_ref_mut(cs)));
        }
    }

    fn clear_pending(&self, event: ScanEvent) {
        critical_section::with(|cs| self.scanner.borrow_ref_mut(cs).hw.clear_pending(event));
    }

    /// Sensor counter for `data_index` from the last completed cycle
    pub fn raw_count(&self, data_index: u8) -> Option<u16> {
        if (data_index as usize) >= self.len() {
            return None;
        }
        self.results.count(data_index)
    }

    /// Reference counter for `data_index` from the last completed cycle
    pub fn reference_count(&self, data_index: u8) -> Option<u16> {
        if (data_index as usize) >= self.len() {
            return None;
        }
        self.results.reference(data_index)
    }

    /// Current data index of a registered pin. Later registrations may move it.
    pub fn data_index(&self, board_pin: u8) -> Option<u8> {
        critical_section::with(|cs| self.scanner.borrow_ref(cs).registry.data_index(board_pin))
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.scanner.borrow_ref(cs).registry.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered channel numbers in data index order
    pub fn channels(&self) -> heapless::Vec<u8, N> {
        critical_section::with(|cs| {
            self.scanner
                .borrow_ref(cs)
                .registry
                .channels()
                .iter()
                .copied()
                .collect()
        })
    }

    pub fn table(&self) -> &'static [PinMapping] {
        critical_section::with(|cs| self.scanner.borrow_ref(cs).registry.table())
    }

    /// Run `f` with exclusive access to the peripheral
    pub fn with_peripheral<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        critical_section::with(|cs| f(&mut self.scanner.borrow_ref_mut(cs).hw))
    }
}
