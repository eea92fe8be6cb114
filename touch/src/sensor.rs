//! Per-pin touch sensors on top of a shared [`TouchEngine`].

use embedded_hal::delay::DelayNs;

use crate::engine::TouchEngine;
use crate::error::Error;
use crate::hw::CtsuPeripheral;
use crate::pins;
use crate::{TouchConfig, DEFAULT_TOUCH_CONFIG};

/// One board pin read in single-shot scans.
///
/// The sensor does not cache its data index: registering another pin with a
/// lower channel number moves it, so the index is looked up on every read.
pub struct TouchSensor<'e, 'a, P, const N: usize> {
    engine: &'e TouchEngine<'a, P, N>,
    config: &'e TouchConfig,
    pin: u8,
    started: bool,
    baseline: i32,
    threshold: i32,
}

impl<'e, 'a, P: CtsuPeripheral, const N: usize> TouchSensor<'e, 'a, P, N> {
    pub fn new(engine: &'e TouchEngine<'a, P, N>, pin: u8) -> Self {
        Self::with_config(engine, pin, &DEFAULT_TOUCH_CONFIG)
    }

    pub fn with_config(engine: &'e TouchEngine<'a, P, N>, pin: u8, config: &'e TouchConfig) -> Self {
        Self {
            engine,
            config,
            pin,
            started: false,
            baseline: 0,
            threshold: config.threshold,
        }
    }

    /// Register the pin with the engine and calibrate its baseline.
    ///
    /// If calibration times out the pin stays registered; calling
    /// [`recalibrate`](Self::recalibrate) later completes the setup.
    pub fn begin(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        pins::lookup(self.engine.table(), self.pin)?;
        self.engine.register_pin(self.pin)?;
        self.started = true;
        self.recalibrate(delay)?;
        Ok(())
    }

    /// Replace the baseline with the mean of a fresh set of samples
    pub fn recalibrate(&mut self, delay: &mut impl DelayNs) -> Result<i32, Error> {
        let samples = self.config.calibration_samples.max(1);
        let mut sum: i64 = 0;
        for _ in 0..samples {
            sum += self.read_raw(delay)? as i64;
            delay.delay_ms(self.config.calibration_interval_ms);
        }
        self.baseline = (sum / samples as i64) as i32;
        debug!("touch: pin {} baseline {}", self.pin, self.baseline);
        Ok(self.baseline)
    }

    /// Run one single-shot scan and return this pin's sensor count
    pub fn read_raw(&self, delay: &mut impl DelayNs) -> Result<u16, Error> {
        if !self.started {
            return Err(Error::NotConfigured);
        }
        let data_index = self.data_index().ok_or(Error::NotConfigured)?;

        self.engine.start(false);

        let poll = self.config.poll_interval_ms.max(1);
        let mut waited: u32 = 0;
        while !self.engine.is_ready() {
            if waited >= self.config.scan_timeout_ms {
                warn!("touch: pin {} scan timed out", self.pin);
                return Err(Error::ScanTimeout);
            }
            delay.delay_ms(poll);
            waited = waited.saturating_add(poll);
        }

        self.engine.raw_count(data_index).ok_or(Error::NotConfigured)
    }

    /// Counts above the baseline, never negative
    pub fn read(&self, delay: &mut impl DelayNs) -> Result<i32, Error> {
        let raw = self.read_raw(delay)? as i32;
        Ok((raw - self.baseline).max(0))
    }

    pub fn is_touched(&self, delay: &mut impl DelayNs) -> Result<bool, Error> {
        let delta = self.read(delay)?;
        // `delta` is clamped at zero, so the lower bound only matters for a negative threshold
        Ok(delta > self.threshold || delta < self.threshold.saturating_neg())
    }

    pub fn set_threshold(&mut self, threshold: i32) {
        self.threshold = threshold;
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn baseline(&self) -> i32 {
        self.baseline
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Where this pin's results currently sit in the scan buffers
    pub fn data_index(&self) -> Option<u8> {
        self.engine.data_index(self.pin)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::mock::{FakeCtsu, ScanSim};
    use crate::pins::{PinMapping, LOVE_BUTTON, MINIMA_PINS};

    type Engine<'a> = TouchEngine<'a, FakeCtsu, 4>;

    // Pin 0 on TS05, pin 1 on TS02
    static SPARSE_PINS: [PinMapping; 3] = [
        PinMapping::touch(0, 5, 0, 1 << 5),
        PinMapping::touch(1, 2, 0, 1 << 2),
        PinMapping::none(2),
    ];

    fn calibrated<'e, 'a>(
        engine: &'e Engine<'a>,
        pin: u8,
        samples: &[u16],
    ) -> TouchSensor<'e, 'a, FakeCtsu, 4> {
        let mut sim = ScanSim::new(engine);
        for s in samples {
            sim.push(&[*s]);
        }
        let mut sensor = TouchSensor::new(engine, pin);
        sensor.begin(&mut sim).unwrap();
        assert_eq!(sim.scans, samples.len());
        sensor
    }

    #[test]
    fn test_calibration_mean() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let sensor = calibrated(&engine, LOVE_BUTTON, &[100, 102, 98, 100, 100]);
        assert_eq!(sensor.baseline(), 100);
        assert_eq!(sensor.threshold(), 500);
        assert_eq!(sensor.data_index(), Some(0));
    }

    #[test]
    fn test_read_is_clamped() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let sensor = calibrated(&engine, LOVE_BUTTON, &[100; 5]);

        let mut sim = ScanSim::new(&engine);
        sim.push(&[80]);
        assert_eq!(sensor.read(&mut sim), Ok(0));
    }

    #[test]
    fn test_touch_decision() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let mut sensor = calibrated(&engine, LOVE_BUTTON, &[100; 5]);
        sensor.set_threshold(50);

        let mut sim = ScanSim::new(&engine);
        sim.push(&[200]).push(&[200]);
        assert_eq!(sensor.read(&mut sim), Ok(100));
        assert_eq!(sensor.is_touched(&mut sim), Ok(true));

        sim.push(&[120]).push(&[120]);
        assert_eq!(sensor.read(&mut sim), Ok(20));
        assert_eq!(sensor.is_touched(&mut sim), Ok(false));

        // Exactly at the threshold is not a touch
        sim.push(&[150]);
        assert_eq!(sensor.is_touched(&mut sim), Ok(false));
    }

    #[test]
    fn test_negative_threshold() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let mut sensor = calibrated(&engine, LOVE_BUTTON, &[100; 5]);
        sensor.set_threshold(-10);

        let mut sim = ScanSim::new(&engine);
        sim.push(&[100]);
        assert_eq!(sensor.is_touched(&mut sim), Ok(true));
    }

    #[test]
    fn test_extreme_threshold() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let mut sensor = calibrated(&engine, LOVE_BUTTON, &[100; 5]);

        let mut sim = ScanSim::new(&engine);
        sensor.set_threshold(i32::MIN);
        sim.push(&[100]);
        assert_eq!(sensor.is_touched(&mut sim), Ok(true));

        sensor.set_threshold(i32::MAX);
        sim.push(&[u16::MAX]);
        assert_eq!(sensor.is_touched(&mut sim), Ok(false));
    }

    #[test]
    fn test_long_poll_interval_times_out() {
        let config = TouchConfig {
            calibration_samples: 1,
            poll_interval_ms: 1 << 31,
            scan_timeout_ms: u32::MAX,
            ..DEFAULT_TOUCH_CONFIG
        };
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let mut sim = ScanSim::new(&engine);
        sim.push(&[100]);
        let mut sensor = TouchSensor::with_config(&engine, LOVE_BUTTON, &config);
        sensor.begin(&mut sim).unwrap();

        // The second poll would wrap the wait counter past the timeout
        assert_eq!(sensor.read_raw(&mut sim), Err(Error::ScanTimeout));
    }

    #[test]
    fn test_scan_timeout() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let sensor = calibrated(&engine, LOVE_BUTTON, &[100; 5]);

        let mut sim = ScanSim::new(&engine);
        let before = sim.elapsed_ns;
        assert_eq!(sensor.read_raw(&mut sim), Err(Error::ScanTimeout));
        assert_eq!(
            sim.elapsed_ns - before,
            DEFAULT_TOUCH_CONFIG.scan_timeout_ms as u64 * 1_000_000
        );
    }

    #[test]
    fn test_calibration_timeout_keeps_registration() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let mut sim = ScanSim::new(&engine);
        sim.repeat(100, 2);

        let mut sensor = TouchSensor::new(&engine, 9);
        assert_eq!(sensor.begin(&mut sim), Err(Error::ScanTimeout));
        assert_eq!(engine.data_index(9), Some(0));
    }

    #[test]
    fn test_not_started() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let sensor = TouchSensor::new(&engine, 9);
        let mut sim = ScanSim::new(&engine);
        sim.push(&[100]);
        assert_eq!(sensor.read_raw(&mut sim), Err(Error::NotConfigured));
        assert_eq!(sim.scans, 0);
    }

    #[test]
    fn test_unsupported_pin() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let mut sim = ScanSim::new(&engine);
        let mut sensor = TouchSensor::new(&engine, 4);
        assert_eq!(sensor.begin(&mut sim), Err(Error::Unsupported));
        assert!(engine.is_empty());
        engine.with_peripheral(|hw| assert_eq!(hw.inits, 0));
    }

    #[test]
    fn test_duplicate_pin() {
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let first = calibrated(&engine, 9, &[100; 5]);
        let mut sim = ScanSim::new(&engine);
        let mut second = TouchSensor::new(&engine, 9);
        assert_eq!(second.begin(&mut sim), Err(Error::AlreadyConfigured));
        assert_eq!(first.data_index(), Some(0));
    }

    #[test]
    fn test_sensors_follow_insertion() {
        let engine = Engine::new(FakeCtsu::new(), &SPARSE_PINS);

        // A on TS05 first, then B on TS02 takes data index 0
        let a = calibrated(&engine, 0, &[300; 5]);
        assert_eq!(a.data_index(), Some(0));

        let mut sim = ScanSim::new(&engine);
        for _ in 0..5 {
            sim.push(&[40, 300]);
        }
        let mut b = TouchSensor::new(&engine, 1);
        b.begin(&mut sim).unwrap();

        assert_eq!(b.data_index(), Some(0));
        assert_eq!(a.data_index(), Some(1));
        assert_eq!(engine.channels().as_slice(), &[2, 5]);
        assert_eq!(b.baseline(), 40);

        // Each sensor still reads its own slot
        sim.push(&[45, 900]).push(&[45, 900]);
        assert_eq!(a.read(&mut sim), Ok(600));
        assert_eq!(b.read(&mut sim), Ok(5));
    }

    #[test]
    fn test_custom_config() {
        let config = TouchConfig {
            threshold: 20,
            calibration_samples: 2,
            calibration_interval_ms: 10,
            ..DEFAULT_TOUCH_CONFIG
        };
        let engine = Engine::new(FakeCtsu::new(), &MINIMA_PINS);
        let mut sim = ScanSim::new(&engine);
        sim.push(&[90]).push(&[110]);

        let mut sensor = TouchSensor::with_config(&engine, 15, &config);
        sensor.begin(&mut sim).unwrap();
        assert_eq!(sensor.baseline(), 100);
        assert_eq!(sensor.threshold(), 20);
        assert_eq!(sim.scans, 2);

        sim.push(&[125]);
        assert_eq!(sensor.is_touched(&mut sim), Ok(true));
    }
}
