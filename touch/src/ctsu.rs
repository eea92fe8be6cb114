//! [`CtsuPeripheral`] for the Renesas RA4M1, on top of the `ra4m1` PAC.
//!
//! The three CTSU events are linked to fixed ICU slots:
//!
//! | Event          | Interrupt | DTC |
//! |----------------|-----------|-----|
//! | `CTSU_WRITE`   | `IEL8`    | settings out |
//! | `CTSU_READ`    | `IEL9`    | results in |
//! | `CTSU_END`     | `IEL10`   | - |
//!
//! The application binds those interrupts and forwards them to
//! [`TouchEngine::on_event`](crate::TouchEngine::on_event).

use core::sync::atomic::{compiler_fence, AtomicU32, Ordering};

use ra4m1 as pac;

use crate::hw::{CtsuPeripheral, ScanEvent};
use crate::pins::{Board, PinMapping, CHAC_REGISTERS};
use crate::transfer::{Transfer, TransferChannel, RESULTS_BLOCK_LEN, SETTINGS_BLOCK_LEN};

pub const IRQ_WRITE: pac::Interrupt = pac::Interrupt::IEL8;
pub const IRQ_READ: pac::Interrupt = pac::Interrupt::IEL9;
pub const IRQ_END: pac::Interrupt = pac::Interrupt::IEL10;

/// ICU event numbers of the CTSU
const EVENT_CTSU_WRITE: u8 = 0x42;
const EVENT_CTSU_READ: u8 = 0x43;
const EVENT_CTSU_END: u8 = 0x44;

/// Upper four bits are implemented
const IRQ_PRIORITY: u8 = 12 << (8 - pac::NVIC_PRIO_BITS);

const PFS_PDR: u32 = 1 << 2;
const PFS_PMR: u32 = 1 << 16;
const PSEL_CTSU: u32 = 12 << 24;

/// Block mode, 16-bit units, incrementing source
const MRA: u32 = 0x98;
/// Destination is the block area, incrementing
const MRB_WRITE: u32 = 0x08;
/// Source is the block area, incrementing destination
const MRB_READ: u32 = 0x18;

const IRQ_SLOTS: usize = 32;

/// DTC transfer information, laid out as the DTC reads it
#[repr(C, align(4))]
struct TransferInfo {
    mode: AtomicU32,
    sar: AtomicU32,
    dar: AtomicU32,
    count: AtomicU32,
}

impl TransferInfo {
    const fn new() -> Self {
        Self {
            mode: AtomicU32::new(0),
            sar: AtomicU32::new(0),
            dar: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    fn load(&self, mrb: u32, sar: usize, dar: usize, block_len: u16, blocks: u16) {
        let cra = ((block_len as u32) << 8) | block_len as u32;
        self.mode.store((MRA << 24) | (mrb << 16), Ordering::Relaxed);
        self.sar.store(sar as u32, Ordering::Relaxed);
        self.dar.store(dar as u32, Ordering::Relaxed);
        self.count.store((cra << 16) | blocks as u32, Ordering::Relaxed);
    }
}

/// DTC vector table, indexed by ICU slot
#[repr(C, align(1024))]
struct DtcVectors([AtomicU32; IRQ_SLOTS]);

static DTC_VECTORS: DtcVectors = DtcVectors([const { AtomicU32::new(0) }; IRQ_SLOTS]);
static WRITE_INFO: TransferInfo = TransferInfo::new();
static READ_INFO: TransferInfo = TransferInfo::new();

/// Port pins that carry a touch channel on either board
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PortPin {
    P000,
    P001,
    P104,
    P105,
    P109,
    P111,
    /// TSCAP, the CTSU's smoothing capacitor
    P112,
    P113,
    P204,
    P301,
    P302,
    P303,
    P304,
    P410,
    P411,
}

fn port_pin(board: Board, board_pin: u8) -> Option<PortPin> {
    let pp = match (board, board_pin) {
        (_, 0) => PortPin::P301,
        (_, 1) => PortPin::P302,
        (Board::UnoR4Minima, 2) | (Board::UnoR4Wifi, 3) => PortPin::P105,
        (Board::UnoR4Minima, 3) | (Board::UnoR4Wifi, 2) => PortPin::P104,
        (Board::UnoR4Wifi, 6) => PortPin::P111,
        (_, 8) => PortPin::P304,
        (_, 9) => PortPin::P303,
        (Board::UnoR4Minima, 11) => PortPin::P109,
        (Board::UnoR4Wifi, 11) => PortPin::P411,
        (Board::UnoR4Wifi, 12) => PortPin::P410,
        (Board::UnoR4Minima, 13) => PortPin::P111,
        (_, 15) => PortPin::P000,
        (_, 16) => PortPin::P001,
        (Board::UnoR4Minima, 20) => PortPin::P204,
        (Board::UnoR4Wifi, 20) => PortPin::P113,
        _ => return None,
    };
    Some(pp)
}

/// Write a pin function register with the PFS write protection lifted
fn write_pfs(pin: PortPin, bits: u32) {
    let pfs = unsafe { &*pac::PFS::ptr() };
    let pwpr = unsafe { &(*pac::PMISC::ptr()).pwpr };

    pwpr.modify(|_, w| w.b0wi().clear_bit());
    pwpr.modify(|_, w| w.pfswe().set_bit());

    macro_rules! set {
        ($reg:expr) => {
            $reg.write(|w| unsafe { w.bits(bits) })
        };
    }
    match pin {
        PortPin::P000 => set!(pfs.p000pfs()),
        PortPin::P001 => set!(pfs.p001pfs()),
        PortPin::P104 => set!(pfs.p100pfs()[4]),
        PortPin::P105 => set!(pfs.p100pfs()[5]),
        PortPin::P109 => set!(pfs.p109pfs()),
        PortPin::P111 => set!(pfs.p111pfs()),
        PortPin::P112 => set!(pfs.p112pfs()),
        PortPin::P113 => set!(pfs.p113pfs()),
        PortPin::P204 => set!(pfs.p204pfs()),
        PortPin::P301 => set!(pfs.p301pfs()),
        PortPin::P302 => set!(pfs.p302pfs()),
        PortPin::P303 => set!(pfs.p303pfs()),
        PortPin::P304 => set!(pfs.p304pfs()),
        PortPin::P410 => set!(pfs.p410pfs()),
        PortPin::P411 => set!(pfs.p411pfs()),
    }

    pwpr.modify(|_, w| w.pfswe().clear_bit());
    pwpr.modify(|_, w| w.b0wi().set_bit());
}

const fn interrupt(event: ScanEvent) -> pac::Interrupt {
    match event {
        ScanEvent::WriteComplete => IRQ_WRITE,
        ScanEvent::ReadComplete => IRQ_READ,
        ScanEvent::ScanComplete => IRQ_END,
    }
}

const fn event_number(event: ScanEvent) -> u8 {
    match event {
        ScanEvent::WriteComplete => EVENT_CTSU_WRITE,
        ScanEvent::ReadComplete => EVENT_CTSU_READ,
        ScanEvent::ScanComplete => EVENT_CTSU_END,
    }
}

pub struct Ra4m1Ctsu {
    board: Board,
    sysclk_hz: u32,
    initialized: bool,
}

impl Ra4m1Ctsu {
    pub const fn new(board: Board, sysclk_hz: u32) -> Self {
        Self {
            board,
            sysclk_hz,
            initialized: false,
        }
    }

    fn delay_ms(&self, ms: u32) {
        cortex_m::asm::delay(self.sysclk_hz / 1000 * ms);
    }
}

impl CtsuPeripheral for Ra4m1Ctsu {
    fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        // Discharge TSCAP before handing it to the CTSU
        write_pfs(PortPin::P112, PFS_PDR);
        self.delay_ms(100);
        write_pfs(PortPin::P112, PFS_PMR | PSEL_CTSU);

        let mstp = unsafe { &*pac::MSTP::ptr() };
        mstp.mstpcrc.modify(|_, w| w.mstpc3().clear_bit());

        let ctsu = unsafe { &*pac::CTSU::ptr() };
        ctsu.ctsucr0.write(|w| unsafe { w.bits(0) });
        ctsu.ctsucr0.write(|w| w.ctsuinit().set_bit());
        ctsu.ctsucr1.write(|w| unsafe { w.bits(0) });
        ctsu.ctsuso1.write(|w| unsafe { w.bits(0x0F00) });
        // Power on, then self-capacitance multi-scan
        ctsu.ctsucr1.write(|w| unsafe { w.bits(0x03) });
        ctsu.ctsucr1.modify(|r, w| unsafe { w.bits(r.bits() | 0x40) });
        self.delay_ms(100);

        ctsu.ctsusdprs.write(|w| unsafe { w.bits(0x23) });
        ctsu.ctsusst.write(|w| unsafe { w.bits(0x10) });
        ctsu.ctsudclkc.write(|w| unsafe { w.bits(0x30) });

        let dtc = unsafe { &*pac::DTC::ptr() };
        dtc.dtcvbr
            .write(|w| unsafe { w.bits(DTC_VECTORS.0.as_ptr() as u32) });
        dtc.dtcst.write(|w| w.dtcst().set_bit());
    }

    fn route_pin(&mut self, mapping: &PinMapping) {
        match port_pin(self.board, mapping.board_pin) {
            Some(pin) => write_pfs(pin, PFS_PMR | PSEL_CTSU),
            None => warn!("ctsu: no port for board pin {}", mapping.board_pin),
        }
    }

    fn set_channel_enable(&mut self, mask: &[u8; CHAC_REGISTERS]) {
        let ctsu = unsafe { &*pac::CTSU::ptr() };
        let [c0, c1, c2, c3, c4] = *mask;
        ctsu.ctsuchac0.write(|w| unsafe { w.bits(c0) });
        ctsu.ctsuchac1.write(|w| unsafe { w.bits(c1) });
        ctsu.ctsuchac2.write(|w| unsafe { w.bits(c2) });
        ctsu.ctsuchac3.write(|w| unsafe { w.bits(c3) });
        ctsu.ctsuchac4.write(|w| unsafe { w.bits(c4) });
    }

    fn listen(&mut self, event: ScanEvent) {
        let irq = interrupt(event);
        let icu = unsafe { &*pac::ICU::ptr() };
        icu.ielsr[irq as usize].write(|w| unsafe { w.iels().bits(event_number(event)) });

        let mut core = unsafe { pac::CorePeripherals::steal() };
        unsafe { core.NVIC.set_priority(irq, IRQ_PRIORITY) };
        pac::NVIC::unpend(irq);
        unsafe { pac::NVIC::unmask(irq) };
    }

    fn clear_pending(&mut self, event: ScanEvent) {
        let icu = unsafe { &*pac::ICU::ptr() };
        icu.ielsr[interrupt(event) as usize].modify(|_, w| w.ir().clear_bit());
    }

    fn arm_transfer(&mut self, transfer: &Transfer) {
        let ctsu = unsafe { &*pac::CTSU::ptr() };
        let (info, irq) = match *transfer {
            Transfer::SettingsOut { src, blocks } => {
                let dar = ctsu.ctsussc.as_ptr() as usize;
                WRITE_INFO.load(MRB_WRITE, src as usize, dar, SETTINGS_BLOCK_LEN, blocks);
                (&WRITE_INFO, IRQ_WRITE)
            }
            Transfer::ResultsIn { dst, blocks } => {
                let sar = ctsu.ctsusc.as_ptr() as usize;
                READ_INFO.load(MRB_READ, sar, dst as usize, RESULTS_BLOCK_LEN, blocks);
                (&READ_INFO, IRQ_READ)
            }
        };
        DTC_VECTORS.0[irq as usize].store(info as *const TransferInfo as u32, Ordering::Relaxed);
        compiler_fence(Ordering::SeqCst);
        cortex_m::asm::dsb();
    }

    fn enable_transfer(&mut self, channel: TransferChannel) {
        let irq = match channel {
            TransferChannel::SettingsOut => IRQ_WRITE,
            TransferChannel::ResultsIn => IRQ_READ,
        };
        let icu = unsafe { &*pac::ICU::ptr() };
        icu.ielsr[irq as usize].modify(|_, w| w.dtce().set_bit());
    }

    fn trigger(&mut self) {
        let ctsu = unsafe { &*pac::CTSU::ptr() };
        ctsu.ctsucr0.write(|w| w.ctsustrt().set_bit());
    }

    fn is_measuring(&self) -> bool {
        let ctsu = unsafe { &*pac::CTSU::ptr() };
        ctsu.ctsust.read().ctsustc().bits() != 0
    }
}
