//! Per-chip header slots
//!
//! Every chip has a 32-bit little-endian clock at a fixed header position. Bit 30
//! flags a second instance of the chip, bit 31 is chip specific, the low 30 bits
//! are the clock in Hz. A raw value of zero means the chip is not used.

use crate::errors::{check_range, VgmResult};
use crate::systems::ChipName;
use crate::utils::{
    read_u16_le_at, read_u32_le_at, read_u8_at, write_u16_le_at, write_u32_le_at, write_u8_at,
};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DUAL_CHIP_BIT: u32 = 0x4000_0000;
pub const HIGH_BIT: u32 = 0x8000_0000;
pub const CLOCK_MASK: u32 = 0x3FFF_FFFF;

/// Chip model variant selected by a header bit or type byte
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipType {
    pub value: u8,
    pub name: String,
}

impl ChipType {
    /// Name the variant `value` of `chip` the way the VGM documentation does.
    pub fn for_chip(chip: ChipName, value: u8) -> ChipType {
        let name = match (chip, value) {
            (ChipName::YM2151, 0) => "YM2151",
            (ChipName::YM2151, _) => "YM2164",
            (ChipName::YM2612, 0) => "YM2612",
            (ChipName::YM2612, _) => "YM3438",
            (ChipName::YM2610, 0) => "YM2610",
            (ChipName::YM2610, _) => "YM2610B",
            (ChipName::ES5506, 0) => "ES5505",
            (ChipName::ES5506, _) => "ES5506",
            (ChipName::K051649, 0) => "K051649",
            (ChipName::K051649, _) => "K052539",
            (ChipName::AY8910, 0x00) => "AY8910",
            (ChipName::AY8910, 0x01) => "AY8912",
            (ChipName::AY8910, 0x02) => "AY8913",
            (ChipName::AY8910, 0x03) => "AY8930",
            (ChipName::AY8910, 0x10) => "YM2149",
            (ChipName::AY8910, 0x11) => "YM3439",
            (ChipName::AY8910, 0x12) => "YMZ284",
            (ChipName::AY8910, 0x13) => "YMZ294",
            (ChipName::C140, 0) => "C140, Namco System 2",
            (ChipName::C140, 1) => "C140, Namco System 21",
            (ChipName::C140, 2) => "219 ASIC, Namco NA-1/2",
            _ => "UNKNOWN",
        };
        ChipType {
            value,
            name: name.to_string(),
        }
    }
}

/// Decoded header parameters of one chip
///
/// Only the fields that exist for the chip's slot are populated on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipParams {
    pub clock: u32,
    pub dual: bool,
    pub chip_type: Option<ChipType>,
    pub flags: Option<u8>,
    // sn76489
    pub feedback: Option<u16>,
    pub shift_register_width: Option<u8>,
    pub t6w28: Option<bool>,
    // nes apu
    pub fds: Option<bool>,
    // sega pcm
    pub interface_register: Option<u32>,
    // ym2203 / ym2608
    pub ssg_flags: Option<u8>,
    // es5503 / es5506
    pub number_of_channels: Option<u8>,
    // c352
    pub clock_divider: Option<u8>,
    /// Bit 31 of the clock for chips that give it no documented meaning
    pub high_bit: bool,
}

impl ChipParams {
    pub fn new(clock: u32) -> Self {
        Self {
            clock,
            ..Default::default()
        }
    }

    pub fn dual(mut self) -> Self {
        self.dual = true;
        self
    }

    pub fn with_chip_type(mut self, chip: ChipName, value: u8) -> Self {
        self.chip_type = Some(ChipType::for_chip(chip, value));
        self
    }
}

/// Meaning of clock bit 31 for a chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighBit {
    /// Stored verbatim in `ChipParams::high_bit`
    Raw,
    /// Chip variant, exposed as `chip_type` with value 0 or 1
    ChipType,
    T6w28,
    Fds,
}

/// Secondary field of a chip stored away from its clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extra {
    Feedback(usize),
    ShiftRegisterWidth(usize),
    Flags(usize),
    InterfaceRegister(usize),
    SsgFlags(usize),
    TypeByte(usize),
    Channels(usize),
    ClockDivider(usize),
}

/// Header slot of one chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipSlot {
    pub chip: ChipName,
    pub clock_at: usize,
    pub high_bit: HighBit,
    pub extras: &'static [Extra],
}

const fn slot(chip: ChipName, clock_at: usize) -> ChipSlot {
    ChipSlot {
        chip,
        clock_at,
        high_bit: HighBit::Raw,
        extras: &[],
    }
}

const fn typed_slot(chip: ChipName, clock_at: usize) -> ChipSlot {
    ChipSlot {
        chip,
        clock_at,
        high_bit: HighBit::ChipType,
        extras: &[],
    }
}

const fn slot_with(chip: ChipName, clock_at: usize, extras: &'static [Extra]) -> ChipSlot {
    ChipSlot {
        chip,
        clock_at,
        high_bit: HighBit::Raw,
        extras,
    }
}

pub const CHIP_SLOTS: [ChipSlot; 41] = [
    ChipSlot {
        chip: ChipName::SN76489,
        clock_at: 0x0C,
        high_bit: HighBit::T6w28,
        extras: &[
            Extra::Feedback(0x28),
            Extra::ShiftRegisterWidth(0x2A),
            Extra::Flags(0x2B),
        ],
    },
    slot(ChipName::YM2413, 0x10),
    typed_slot(ChipName::YM2612, 0x2C),
    typed_slot(ChipName::YM2151, 0x30),
    slot_with(ChipName::SegaPcm, 0x38, &[Extra::InterfaceRegister(0x3C)]),
    slot(ChipName::RF5C68, 0x40),
    slot_with(ChipName::YM2203, 0x44, &[Extra::SsgFlags(0x7A)]),
    slot_with(ChipName::YM2608, 0x48, &[Extra::SsgFlags(0x7B)]),
    typed_slot(ChipName::YM2610, 0x4C),
    slot(ChipName::YM3812, 0x50),
    slot(ChipName::YM3526, 0x54),
    slot(ChipName::Y8950, 0x58),
    slot(ChipName::YMF262, 0x5C),
    slot(ChipName::YMF278B, 0x60),
    slot(ChipName::YMF271, 0x64),
    slot(ChipName::YMZ280B, 0x68),
    slot(ChipName::RF5C164, 0x6C),
    slot(ChipName::Pwm, 0x70),
    slot_with(
        ChipName::AY8910,
        0x74,
        &[Extra::TypeByte(0x78), Extra::Flags(0x79)],
    ),
    slot(ChipName::GameboyDmg, 0x80),
    ChipSlot {
        chip: ChipName::NesApu,
        clock_at: 0x84,
        high_bit: HighBit::Fds,
        extras: &[],
    },
    slot(ChipName::MultiPcm, 0x88),
    slot(ChipName::UPD7759, 0x8C),
    slot_with(ChipName::OKIM6258, 0x90, &[Extra::Flags(0x94)]),
    slot(ChipName::OKIM6295, 0x98),
    typed_slot(ChipName::K051649, 0x9C),
    slot_with(ChipName::K054539, 0xA0, &[Extra::Flags(0x95)]),
    slot(ChipName::HuC6280, 0xA4),
    slot_with(ChipName::C140, 0xA8, &[Extra::TypeByte(0x96)]),
    slot(ChipName::K053260, 0xAC),
    slot(ChipName::Pokey, 0xB0),
    slot(ChipName::QSound, 0xB4),
    slot(ChipName::SCSP, 0xB8),
    slot(ChipName::WonderSwan, 0xC0),
    slot(ChipName::VSU, 0xC4),
    slot(ChipName::SAA1099, 0xC8),
    slot_with(ChipName::ES5503, 0xCC, &[Extra::Channels(0xD4)]),
    ChipSlot {
        chip: ChipName::ES5506,
        clock_at: 0xD0,
        high_bit: HighBit::ChipType,
        extras: &[Extra::Channels(0xD5)],
    },
    slot(ChipName::X1_010, 0xD8),
    slot_with(ChipName::C352, 0xDC, &[Extra::ClockDivider(0xD6)]),
    slot(ChipName::GA20, 0xE0),
];

lazy_static! {
    static ref SLOTS_BY_CHIP: HashMap<ChipName, &'static ChipSlot> =
        CHIP_SLOTS.iter().map(|slot| (slot.chip, slot)).collect();
}

impl ChipSlot {
    pub fn for_chip(chip: ChipName) -> Option<&'static ChipSlot> {
        SLOTS_BY_CHIP.get(&chip).copied()
    }

    /// Read this chip's parameters; `None` when the raw clock is zero.
    pub fn decode(&self, buf: &[u8]) -> VgmResult<Option<ChipParams>> {
        let raw = read_u32_le_at(buf, self.clock_at)?;
        if raw == 0 {
            return Ok(None);
        }

        let high = raw & HIGH_BIT != 0;
        let mut params = ChipParams {
            clock: raw & CLOCK_MASK,
            dual: raw & DUAL_CHIP_BIT != 0,
            ..Default::default()
        };
        match self.high_bit {
            HighBit::Raw => params.high_bit = high,
            HighBit::ChipType => {
                params.chip_type = Some(ChipType::for_chip(self.chip, high as u8))
            }
            HighBit::T6w28 => params.t6w28 = Some(high),
            HighBit::Fds => params.fds = Some(high),
        }

        for extra in self.extras {
            match *extra {
                Extra::Feedback(at) => params.feedback = Some(read_u16_le_at(buf, at)?),
                Extra::ShiftRegisterWidth(at) => {
                    params.shift_register_width = Some(read_u8_at(buf, at)?)
                }
                Extra::Flags(at) => params.flags = Some(read_u8_at(buf, at)?),
                Extra::InterfaceRegister(at) => {
                    params.interface_register = Some(read_u32_le_at(buf, at)?)
                }
                Extra::SsgFlags(at) => params.ssg_flags = Some(read_u8_at(buf, at)?),
                Extra::TypeByte(at) => {
                    params.chip_type = Some(ChipType::for_chip(self.chip, read_u8_at(buf, at)?))
                }
                Extra::Channels(at) => params.number_of_channels = Some(read_u8_at(buf, at)?),
                Extra::ClockDivider(at) => params.clock_divider = Some(read_u8_at(buf, at)?),
            }
        }

        Ok(Some(params))
    }

    /// Write this chip's parameters. Absent chips leave the buffer untouched.
    pub fn encode(&self, buf: &mut [u8], params: Option<&ChipParams>) -> VgmResult<()> {
        let Some(params) = params else {
            return Ok(());
        };
        check_range("clock", params.clock as u64, CLOCK_MASK as u64)?;

        let high = match self.high_bit {
            HighBit::Raw => params.high_bit,
            HighBit::ChipType => params.chip_type.as_ref().map_or(false, |t| t.value != 0),
            HighBit::T6w28 => params.t6w28.unwrap_or(false),
            HighBit::Fds => params.fds.unwrap_or(false),
        };
        let mut raw = params.clock;
        if params.dual {
            raw |= DUAL_CHIP_BIT;
        }
        if high {
            raw |= HIGH_BIT;
        }
        write_u32_le_at(buf, self.clock_at, raw)?;

        for extra in self.extras {
            match *extra {
                Extra::Feedback(at) => write_u16_le_at(buf, at, params.feedback.unwrap_or(0))?,
                Extra::ShiftRegisterWidth(at) => {
                    write_u8_at(buf, at, params.shift_register_width.unwrap_or(0))?
                }
                Extra::Flags(at) => write_u8_at(buf, at, params.flags.unwrap_or(0))?,
                Extra::InterfaceRegister(at) => {
                    write_u32_le_at(buf, at, params.interface_register.unwrap_or(0))?
                }
                Extra::SsgFlags(at) => write_u8_at(buf, at, params.ssg_flags.unwrap_or(0))?,
                Extra::TypeByte(at) => {
                    let value = params.chip_type.as_ref().map_or(0, |t| t.value);
                    write_u8_at(buf, at, value)?
                }
                Extra::Channels(at) => {
                    write_u8_at(buf, at, params.number_of_channels.unwrap_or(0))?
                }
                Extra::ClockDivider(at) => {
                    write_u8_at(buf, at, params.clock_divider.unwrap_or(0))?
                }
            }
        }
        Ok(())
    }
}
