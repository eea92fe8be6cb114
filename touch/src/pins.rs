//! Board pin to CTSU channel tables for the Arduino UNO R4 boards.
//!
//! The CTSU identifies its inputs by TS number, which has nothing to do with the
//! board's pin numbering. Each supported pin also names the `CTSUCHACn` register
//! and bit that enables its channel. Unsupported pins keep a placeholder entry
//! so that a table is indexable by board pin.

use crate::error::Error;

/// Board pin number of the heart-shaped pad on both boards
pub const LOVE_BUTTON: u8 = 20;

/// Number of board pins covered by each table
pub const BOARD_PIN_COUNT: usize = 21;

/// Number of `CTSUCHACn` channel enable registers
pub const CHAC_REGISTERS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinMapping {
    pub board_pin: u8,
    pub supported: bool,
    /// TS channel number. The CTSU scans enabled channels in ascending order.
    pub channel: u8,
    /// Index of the `CTSUCHACn` register holding this channel's enable bit
    pub chac_index: u8,
    /// Enable bit within `CTSUCHACn`
    pub chac_mask: u8,
}

impl PinMapping {
    pub const fn touch(board_pin: u8, channel: u8, chac_index: u8, chac_mask: u8) -> Self {
        Self {
            board_pin,
            supported: true,
            channel,
            chac_index,
            chac_mask,
        }
    }

    pub const fn none(board_pin: u8) -> Self {
        Self {
            board_pin,
            supported: false,
            channel: 0,
            chac_index: 0,
            chac_mask: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Board {
    UnoR4Minima,
    UnoR4Wifi,
}

impl Board {
    pub const fn mappings(&self) -> &'static [PinMapping] {
        match self {
            Self::UnoR4Minima => &MINIMA_PINS,
            Self::UnoR4Wifi => &WIFI_PINS,
        }
    }
}

/// Board selected at build time
#[cfg(feature = "board-wifi")]
pub const BOARD: Board = Board::UnoR4Wifi;
#[cfg(not(feature = "board-wifi"))]
pub const BOARD: Board = Board::UnoR4Minima;

/// Pin table of the board selected at build time
pub const BOARD_PINS: &[PinMapping] = BOARD.mappings();

pub const MINIMA_PINS: [PinMapping; BOARD_PIN_COUNT] = [
    PinMapping::touch(0, 9, 1, 1 << 1),
    PinMapping::touch(1, 8, 1, 1 << 0),
    PinMapping::touch(2, 34, 4, 1 << 2),
    PinMapping::touch(3, 13, 1, 1 << 5),
    PinMapping::none(4),
    PinMapping::none(5),
    PinMapping::none(6),
    PinMapping::none(7),
    PinMapping::touch(8, 11, 1, 1 << 3),
    PinMapping::touch(9, 2, 0, 1 << 2),
    PinMapping::none(10),
    PinMapping::touch(11, 10, 1, 1 << 2),
    PinMapping::none(12),
    PinMapping::touch(13, 12, 1, 1 << 4),
    PinMapping::none(14), // A0
    PinMapping::touch(15, 21, 2, 1 << 5), // A1
    PinMapping::touch(16, 22, 2, 1 << 6), // A2
    PinMapping::none(17), // A3
    PinMapping::none(18), // A4
    PinMapping::none(19), // A5
    PinMapping::touch(LOVE_BUTTON, 0, 0, 1 << 0),
];

pub const WIFI_PINS: [PinMapping; BOARD_PIN_COUNT] = [
    PinMapping::touch(0, 9, 1, 1 << 1),
    PinMapping::touch(1, 8, 1, 1 << 0),
    PinMapping::touch(2, 13, 1, 1 << 5),
    PinMapping::touch(3, 34, 4, 1 << 2),
    PinMapping::none(4),
    PinMapping::none(5),
    PinMapping::touch(6, 12, 1, 1 << 4),
    PinMapping::none(7),
    PinMapping::touch(8, 11, 1, 1 << 3),
    PinMapping::touch(9, 2, 0, 1 << 2),
    PinMapping::none(10),
    PinMapping::touch(11, 7, 0, 1 << 7),
    PinMapping::touch(12, 6, 0, 1 << 6),
    PinMapping::none(13),
    PinMapping::none(14), // A0
    PinMapping::touch(15, 21, 2, 1 << 5), // A1
    PinMapping::touch(16, 22, 2, 1 << 6), // A2
    PinMapping::none(17), // A3
    PinMapping::none(18), // A4
    PinMapping::none(19), // A5
    PinMapping::touch(LOVE_BUTTON, 27, 3, 1 << 3),
];

/// Find the sensing channel for a board pin
pub fn lookup(table: &[PinMapping], board_pin: u8) -> Result<PinMapping, Error> {
    table
        .iter()
        .find(|m| m.board_pin == board_pin)
        .filter(|m| m.supported)
        .copied()
        .ok_or(Error::Unsupported)
}
