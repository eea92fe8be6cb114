//! Capacitive touch sensing on the Renesas RA4M1 Capacitive Touch Sensing Unit.
//!
//! Board pins are resolved to CTSU channels with the tables in [`pins`],
//! registered with a shared [`TouchEngine`], and read through per-pin
//! [`TouchSensor`] objects. The engine keeps the active channels in the order
//! the CTSU scans them, reloads the DTC descriptors feeding and draining the
//! peripheral each cycle, and tracks the cycle through the CTSU's write, read
//! and end interrupts.
//!
//! The chip itself sits behind [`hw::CtsuPeripheral`]. With the `ra4m1`
//! feature, [`ctsu::Ra4m1Ctsu`] drives the real registers.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to the other modules
mod fmt;

pub mod engine;
pub mod error;
pub mod hw;
pub mod pins;
pub mod registry;
pub mod scan;
pub mod sensor;
pub mod transfer;

#[cfg(feature = "ra4m1")]
pub mod ctsu;

#[cfg(test)]
mod mock;

pub use engine::{ScanCallback, TouchEngine};
pub use error::Error;
pub use hw::{CtsuPeripheral, ScanEvent};
pub use scan::ScanState;
pub use sensor::TouchSensor;

/// Configuration shared by touch sensors
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchConfig {
    /// Counts above the baseline at which a pin reads as touched
    pub threshold: i32,
    /// Number of samples averaged into the baseline
    pub calibration_samples: u16,
    /// Pause between calibration samples
    pub calibration_interval_ms: u32,
    /// Pause between readiness polls while waiting for a scan
    pub poll_interval_ms: u32,
    /// Give up on a scan after this long
    pub scan_timeout_ms: u32,
}

impl TouchConfig {
    const fn default() -> Self {
        Self {
            threshold: 500,
            calibration_samples: 5,
            calibration_interval_ms: 5,
            poll_interval_ms: 1,
            scan_timeout_ms: 100,
        }
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        DEFAULT_TOUCH_CONFIG
    }
}

pub const DEFAULT_TOUCH_CONFIG: TouchConfig = TouchConfig::default();
