//! Ordered set of active CTSU channels.
//!
//! The CTSU measures the enabled channels in ascending TS order and requests
//! one settings block and one result block per channel as it goes. The DTC
//! feeds and drains those blocks from flat arrays, so the registry keeps its
//! settings storage contiguous and sorted by channel, and inserts new channels
//! in place rather than appending.

use heapless::Vec;

use crate::error::Error;
use crate::pins::{self, PinMapping, BOARD_PIN_COUNT, CHAC_REGISTERS};

/// Words written to `CTSUSSC`, `CTSUSO0` and `CTSUSO1` before each channel is measured
pub const CHANNEL_SETTINGS: [u16; 3] = [0x0200, 0x0000, 0x0F00];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelRegistration {
    /// Position of the channel's results in the scan buffers
    pub data_index: u8,
    pub channel: u8,
    pub settings: [u16; 3],
}

pub struct Registry<const N: usize> {
    table: &'static [PinMapping],
    channels: Vec<u8, N>,
    settings: Vec<[u16; 3], N>,
    pin_index: [Option<u8>; BOARD_PIN_COUNT],
    enable: [u8; CHAC_REGISTERS],
}

impl<const N: usize> Registry<N> {
    pub const fn new(table: &'static [PinMapping]) -> Self {
        Self {
            table,
            channels: Vec::new(),
            settings: Vec::new(),
            pin_index: [None; BOARD_PIN_COUNT],
            enable: [0; CHAC_REGISTERS],
        }
    }

    /// Whether `board_pin` could be registered now, without changing anything
    pub fn check(&self, board_pin: u8) -> Result<PinMapping, Error> {
        if self.data_index(board_pin).is_some() {
            return Err(Error::AlreadyConfigured);
        }
        let mapping = pins::lookup(self.table, board_pin)?;
        if (board_pin as usize) >= BOARD_PIN_COUNT
            || (mapping.chac_index as usize) >= CHAC_REGISTERS
        {
            return Err(Error::Unsupported);
        }
        if self.len() >= self.capacity() {
            return Err(Error::CapacityExceeded);
        }
        Ok(mapping)
    }

    /// Add a board pin, keeping channels sorted.
    ///
    /// Returns the data index assigned to the pin along with its mapping. Pins
    /// registered earlier with a higher channel number move up one data index.
    pub fn register(&mut self, board_pin: u8) -> Result<(u8, PinMapping), Error> {
        let mapping = self.check(board_pin)?;

        // First slot above the highest channel that sorts before this one
        let di = self
            .channels
            .iter()
            .rposition(|&ch| ch < mapping.channel)
            .map_or(0, |i| i + 1);

        // Capacity was checked above
        let inserted = self.channels.insert(di, mapping.channel);
        debug_assert!(inserted.is_ok());
        let inserted = self.settings.insert(di, CHANNEL_SETTINGS);
        debug_assert!(inserted.is_ok());

        let di = di as u8;
        for index in self.pin_index.iter_mut().flatten() {
            if *index >= di {
                *index += 1;
            }
        }
        self.pin_index[board_pin as usize] = Some(di);
        self.enable[mapping.chac_index as usize] |= mapping.chac_mask;

        Ok((di, mapping))
    }

    pub fn data_index(&self, board_pin: u8) -> Option<u8> {
        self.pin_index.get(board_pin as usize).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Channel numbers in data index order
    pub fn channels(&self) -> &[u8] {
        &self.channels
    }

    pub fn get(&self, data_index: u8) -> Option<ChannelRegistration> {
        let i = data_index as usize;
        Some(ChannelRegistration {
            data_index,
            channel: *self.channels.get(i)?,
            settings: *self.settings.get(i)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ChannelRegistration> + '_ {
        (0..self.len() as u8).filter_map(|i| self.get(i))
    }

    /// Settings blocks in data index order, laid out as the DTC reads them
    pub fn settings(&self) -> &[[u16; 3]] {
        &self.settings
    }

    /// Cumulative `CTSUCHAC0..4` image for every registered channel
    pub fn enable_mask(&self) -> &[u8; CHAC_REGISTERS] {
        &self.enable
    }

    pub fn table(&self) -> &'static [PinMapping] {
        self.table
    }
}
