#![no_main]
#![no_std]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use defmt_rtt as _;
use embedded_hal::delay::DelayNs;
use panic_halt as _;
use ra4m1::interrupt;

use touch::ctsu::Ra4m1Ctsu;
use touch::pins::{BOARD, BOARD_PINS, LOVE_BUTTON};
use touch::{ScanEvent, TouchConfig, TouchEngine, TouchSensor, DEFAULT_TOUCH_CONFIG};

/// Core clock as left by the bootloader
const SYSCLK_HZ: u32 = 48_000_000;

/// Largest channel count of either board
const MAX_CHANNELS: usize = 12;

static ENGINE: TouchEngine<'static, Ra4m1Ctsu, MAX_CHANNELS> =
    TouchEngine::new(Ra4m1Ctsu::new(BOARD, SYSCLK_HZ), BOARD_PINS);

static PAD_CONFIG: TouchConfig = TouchConfig {
    threshold: 300,
    calibration_samples: 8,
    ..DEFAULT_TOUCH_CONFIG
};

static SCANS: AtomicU32 = AtomicU32::new(0);

fn count_scan() {
    SCANS.fetch_add(1, Ordering::Relaxed);
}

#[interrupt]
fn IEL8() {
    ENGINE.on_event(ScanEvent::WriteComplete);
}

#[interrupt]
fn IEL9() {
    ENGINE.on_event(ScanEvent::ReadComplete);
}

#[interrupt]
fn IEL10() {
    ENGINE.on_event(ScanEvent::ScanComplete);
}

struct CycleDelay {
    cycles_per_us: u32,
}

impl CycleDelay {
    fn new(sysclk_hz: u32) -> Self {
        Self {
            cycles_per_us: sysclk_hz / 1_000_000,
        }
    }
}

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        cortex_m::asm::delay((ns / 1000).max(1) * self.cycles_per_us);
    }

    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(us * self.cycles_per_us);
    }
}

#[entry]
fn main() -> ! {
    defmt::info!("touch demo on {}", BOARD);

    let mut delay = CycleDelay::new(SYSCLK_HZ);

    let mut love = TouchSensor::new(&ENGINE, LOVE_BUTTON);
    if let Err(e) = love.begin(&mut delay) {
        defmt::error!("love button: {}", e);
    }

    let mut pad = TouchSensor::with_config(&ENGINE, 2, &PAD_CONFIG);
    if let Err(e) = pad.begin(&mut delay) {
        defmt::error!("pin 2: {}", e);
    }
    // Pin 2 may sort ahead of the love button, so report where both landed
    defmt::info!(
        "{} of {} channels {} love at {} pad at {}",
        ENGINE.len(),
        ENGINE.capacity(),
        ENGINE.channels().as_slice(),
        love.data_index(),
        pad.data_index()
    );

    let mut was_touched = [false; 2];
    for _ in 0..500 {
        for (i, sensor) in [&love, &pad].into_iter().enumerate() {
            match sensor.is_touched(&mut delay) {
                Ok(touched) if touched != was_touched[i] => {
                    was_touched[i] = touched;
                    defmt::info!("pin {} touched: {}", sensor.pin(), touched);
                }
                Ok(_) => (),
                Err(e) => defmt::warn!("pin {}: {}", sensor.pin(), e),
            }
        }
        delay.delay_ms(20);
    }

    // Hand scanning over to the interrupt side
    ENGINE.set_callback(Some(&count_scan));
    ENGINE.start(true);

    loop {
        delay.delay_ms(500);
        for sensor in [&love, &pad] {
            let raw = sensor
                .data_index()
                .and_then(|i| ENGINE.raw_count(i))
                .unwrap_or(0);
            defmt::info!(
                "pin {} raw {} delta {}",
                sensor.pin(),
                raw,
                (raw as i32 - sensor.baseline()).max(0)
            );
        }
        defmt::info!("{} scans", SCANS.load(Ordering::Relaxed));
    }
}
