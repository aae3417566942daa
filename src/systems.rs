//! Chip identifiers and the static lookup tables keyed on them
//!
//! Variant order follows the chip id numbering used by the extra header tables,
//! so `ChipName as u8` is the chip id for every real chip.

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ChipName {
    SN76489,
    YM2413,
    YM2612,
    YM2151,
    SegaPcm,
    RF5C68,
    YM2203,
    YM2608,
    YM2610,
    YM3812,
    YM3526,
    Y8950,
    YMF262,
    YMF278B,
    YMF271,
    YMZ280B,
    RF5C164,
    Pwm,
    AY8910,
    GameboyDmg,
    NesApu,
    MultiPcm,
    UPD7759,
    OKIM6258,
    OKIM6295,
    K051649,
    K054539,
    HuC6280,
    C140,
    K053260,
    Pokey,
    QSound,
    SCSP,
    WonderSwan,
    VSU,
    SAA1099,
    ES5503,
    ES5506,
    X1_010,
    C352,
    GA20,
    /// Game Gear PSG stereo register, addressed by its own write opcodes
    GameGearStereo,
    Unknown,
}

/// Chips in chip id order (id = index)
pub const CHIP_IDS: [ChipName; 41] = [
    ChipName::SN76489,
    ChipName::YM2413,
    ChipName::YM2612,
    ChipName::YM2151,
    ChipName::SegaPcm,
    ChipName::RF5C68,
    ChipName::YM2203,
    ChipName::YM2608,
    ChipName::YM2610,
    ChipName::YM3812,
    ChipName::YM3526,
    ChipName::Y8950,
    ChipName::YMF262,
    ChipName::YMF278B,
    ChipName::YMF271,
    ChipName::YMZ280B,
    ChipName::RF5C164,
    ChipName::Pwm,
    ChipName::AY8910,
    ChipName::GameboyDmg,
    ChipName::NesApu,
    ChipName::MultiPcm,
    ChipName::UPD7759,
    ChipName::OKIM6258,
    ChipName::OKIM6295,
    ChipName::K051649,
    ChipName::K054539,
    ChipName::HuC6280,
    ChipName::C140,
    ChipName::K053260,
    ChipName::Pokey,
    ChipName::QSound,
    ChipName::SCSP,
    ChipName::WonderSwan,
    ChipName::VSU,
    ChipName::SAA1099,
    ChipName::ES5503,
    ChipName::ES5506,
    ChipName::X1_010,
    ChipName::C352,
    ChipName::GA20,
];

impl ChipName {
    /// Resolve an extra-header chip id; ids outside the table map to `Unknown`.
    pub fn from_id(chip_id: u8) -> ChipName {
        CHIP_IDS
            .get(chip_id as usize)
            .copied()
            .unwrap_or(ChipName::Unknown)
    }

    /// Chip id for header chips, `None` for the pseudo entries.
    pub fn id(&self) -> Option<u8> {
        CHIP_IDS.iter().position(|c| c == self).map(|i| i as u8)
    }

    /// Field name of the chip in the VGM documentation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SN76489 => "sn76489",
            Self::YM2413 => "ym2413",
            Self::YM2612 => "ym2612",
            Self::YM2151 => "ym2151",
            Self::SegaPcm => "segaPcm",
            Self::RF5C68 => "rf5c68",
            Self::YM2203 => "ym2203",
            Self::YM2608 => "ym2608",
            Self::YM2610 => "ym2610",
            Self::YM3812 => "ym3812",
            Self::YM3526 => "ym3526",
            Self::Y8950 => "y8950",
            Self::YMF262 => "ymf262",
            Self::YMF278B => "ymf278b",
            Self::YMF271 => "ymf271",
            Self::YMZ280B => "ymz280b",
            Self::RF5C164 => "rf5c164",
            Self::Pwm => "pwm",
            Self::AY8910 => "ay8910",
            Self::GameboyDmg => "gameBoyDmg",
            Self::NesApu => "nesApu",
            Self::MultiPcm => "multiPcm",
            Self::UPD7759 => "upd7759",
            Self::OKIM6258 => "okim6258",
            Self::OKIM6295 => "okim6295",
            Self::K051649 => "k051649",
            Self::K054539 => "k054539",
            Self::HuC6280 => "huc6280",
            Self::C140 => "c140",
            Self::K053260 => "k053260",
            Self::Pokey => "pokey",
            Self::QSound => "qsound",
            Self::SCSP => "scsp",
            Self::WonderSwan => "wonderSwan",
            Self::VSU => "vsu",
            Self::SAA1099 => "saa1099",
            Self::ES5503 => "es5503",
            Self::ES5506 => "es5506",
            Self::X1_010 => "x1_010",
            Self::C352 => "c352",
            Self::GA20 => "ga20",
            Self::GameGearStereo => "gameGearStereo",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChipName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Register-write opcode to target chip. Opcodes missing here are not write commands.
pub static OPCODE_CHIPS: phf::Map<u8, ChipName> = phf_map! {
    0x30u8 => ChipName::SN76489,
    0x50u8 => ChipName::SN76489,
    0x3Fu8 => ChipName::GameGearStereo,
    0x4Fu8 => ChipName::GameGearStereo,
    0x51u8 => ChipName::YM2413,
    0xA1u8 => ChipName::YM2413,
    0x52u8 => ChipName::YM2612,
    0x53u8 => ChipName::YM2612,
    0xA2u8 => ChipName::YM2612,
    0xA3u8 => ChipName::YM2612,
    0x54u8 => ChipName::YM2151,
    0xA4u8 => ChipName::YM2151,
    0x55u8 => ChipName::YM2203,
    0xA5u8 => ChipName::YM2203,
    0x56u8 => ChipName::YM2608,
    0x57u8 => ChipName::YM2608,
    0xA6u8 => ChipName::YM2608,
    0xA7u8 => ChipName::YM2608,
    0x58u8 => ChipName::YM2610,
    0x59u8 => ChipName::YM2610,
    0xA8u8 => ChipName::YM2610,
    0xA9u8 => ChipName::YM2610,
    0x5Au8 => ChipName::YM3812,
    0xAAu8 => ChipName::YM3812,
    0x5Bu8 => ChipName::YM3526,
    0xABu8 => ChipName::YM3526,
    0x5Cu8 => ChipName::Y8950,
    0xACu8 => ChipName::Y8950,
    0x5Du8 => ChipName::YMZ280B,
    0xADu8 => ChipName::YMZ280B,
    0x5Eu8 => ChipName::YMF262,
    0x5Fu8 => ChipName::YMF262,
    0xAEu8 => ChipName::YMF262,
    0xAFu8 => ChipName::YMF262,
    0xA0u8 => ChipName::AY8910,
    0xB0u8 => ChipName::RF5C68,
    0xB1u8 => ChipName::RF5C164,
    0xB2u8 => ChipName::Pwm,
    0xB3u8 => ChipName::GameboyDmg,
    0xB4u8 => ChipName::NesApu,
    0xB5u8 => ChipName::MultiPcm,
    0xB6u8 => ChipName::UPD7759,
    0xB7u8 => ChipName::OKIM6258,
    0xB8u8 => ChipName::OKIM6295,
    0xB9u8 => ChipName::HuC6280,
    0xBAu8 => ChipName::K053260,
    0xBBu8 => ChipName::Pokey,
    0xBCu8 => ChipName::WonderSwan,
    0xBDu8 => ChipName::SAA1099,
    0xBEu8 => ChipName::ES5506,
    0xBFu8 => ChipName::GA20,
    0xC0u8 => ChipName::SegaPcm,
    0xC1u8 => ChipName::RF5C68,
    0xC2u8 => ChipName::RF5C164,
    0xC3u8 => ChipName::MultiPcm,
    0xC4u8 => ChipName::QSound,
    0xC5u8 => ChipName::SCSP,
    0xC6u8 => ChipName::WonderSwan,
    0xC7u8 => ChipName::VSU,
    0xC8u8 => ChipName::X1_010,
    0xD0u8 => ChipName::YMF278B,
    0xD1u8 => ChipName::YMF271,
    0xD2u8 => ChipName::K051649,
    0xD3u8 => ChipName::K054539,
    0xD4u8 => ChipName::C140,
    0xD5u8 => ChipName::ES5503,
    0xD6u8 => ChipName::ES5506,
    0xE1u8 => ChipName::C352,
};

/// Data block type byte to owning chip.
pub static BLOCK_TYPE_CHIPS: phf::Map<u8, ChipName> = phf_map! {
    // uncompressed / compressed streams
    0x00u8 => ChipName::YM2612,
    0x40u8 => ChipName::YM2612,
    0x01u8 => ChipName::RF5C68,
    0x41u8 => ChipName::RF5C68,
    0x02u8 => ChipName::RF5C164,
    0x42u8 => ChipName::RF5C164,
    0x03u8 => ChipName::Pwm,
    0x43u8 => ChipName::Pwm,
    0x04u8 => ChipName::OKIM6258,
    0x44u8 => ChipName::OKIM6258,
    0x05u8 => ChipName::HuC6280,
    0x45u8 => ChipName::HuC6280,
    0x06u8 => ChipName::SCSP,
    0x46u8 => ChipName::SCSP,
    0x07u8 => ChipName::NesApu,
    0x47u8 => ChipName::NesApu,
    // ROM/RAM dumps
    0x80u8 => ChipName::SegaPcm,
    0x81u8 => ChipName::YM2608,
    0x82u8 => ChipName::YM2610,
    0x83u8 => ChipName::YM2610,
    0x84u8 => ChipName::YMF278B,
    0x85u8 => ChipName::YMF271,
    0x86u8 => ChipName::YMZ280B,
    0x87u8 => ChipName::YMF278B,
    0x88u8 => ChipName::Y8950,
    0x89u8 => ChipName::MultiPcm,
    0x8Au8 => ChipName::UPD7759,
    0x8Bu8 => ChipName::OKIM6295,
    0x8Cu8 => ChipName::K054539,
    0x8Du8 => ChipName::C140,
    0x8Eu8 => ChipName::K053260,
    0x8Fu8 => ChipName::QSound,
    0x90u8 => ChipName::ES5506,
    0x91u8 => ChipName::X1_010,
    0x92u8 => ChipName::C352,
    0x93u8 => ChipName::GA20,
    // RAM writes
    0xC0u8 => ChipName::RF5C68,
    0xC1u8 => ChipName::RF5C164,
    0xC2u8 => ChipName::NesApu,
    0xE0u8 => ChipName::SCSP,
    0xE1u8 => ChipName::ES5503,
};

pub fn chip_for_opcode(opcode: u8) -> Option<ChipName> {
    OPCODE_CHIPS.get(&opcode).copied()
}

pub fn chip_for_block_type(block_type: u8) -> ChipName {
    BLOCK_TYPE_CHIPS
        .get(&block_type)
        .copied()
        .unwrap_or(ChipName::Unknown)
}
