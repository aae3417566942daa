//! VGM Header Codec
//!
//! The fixed header grew one field cluster per format revision. Whether a
//! cluster exists in a file depends on the version code and on whether the
//! data offset leaves room for it, so the layout is kept as an ordered table
//! that both the decoder and the encoder walk.

pub mod chip_params;
pub mod extra_header;

pub use chip_params::{ChipParams, ChipSlot, ChipType};
pub use extra_header::{ExtraChipClock, ExtraChipVolume, ExtraHeader};

use crate::errors::{check_range, VgmError, VgmResult};
use crate::systems::ChipName;
use crate::utils::{is_vgm, read_u32_le_at, read_u8_at, write_u32_le_at, write_u8_at};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// "Vgm " read as a little-endian u32
pub const VGM_IDENT: u32 = 0x206d6756;

/// Size of the version 1.00 header, the smallest header a file can carry
pub const LEGACY_HEADER_SIZE: usize = 0x40;

/// Header size from version 1.71 on, which is also where its extra header starts
pub const V171_HEADER_SIZE: usize = 0x100;

pub type Chips = BTreeMap<ChipName, ChipParams>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub code: u32,
}

impl Version {
    pub const fn new(code: u32) -> Self {
        Self { code }
    }

    /// Major version as printed by VGM tools, e.g. "1"
    pub fn major(&self) -> String {
        format!("{:x}", self.code >> 8)
    }

    /// Two-digit minor version, e.g. "71"
    pub fn minor(&self) -> String {
        format!("{:02x}", self.code & 0xFF)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0x171)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Absolute byte offsets from the start of the file. Zero marks an absent section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offsets {
    pub eof: usize,
    pub gd3: usize,
    pub loop_point: usize,
    pub data: usize,
    pub extra_header: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Samples {
    pub total: u64,
    /// Samples from the loop point to the end of the stream, 0 without a loop
    pub loop_samples: u64,
}

/// One decodable header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    EofOffset,
    Gd3Offset,
    TotalSamples,
    LoopOffset,
    LoopSamples,
    Rate,
    DataOffset,
    Chip(ChipName),
    VolumeModifier,
    LoopBase,
    LoopModifier,
    ExtraHeaderOffset,
}

impl HeaderField {
    /// Header position of a field, or the clock position for chips.
    pub fn position(&self) -> usize {
        match self {
            Self::EofOffset => 0x04,
            Self::Gd3Offset => 0x14,
            Self::TotalSamples => 0x18,
            Self::LoopOffset => 0x1C,
            Self::LoopSamples => 0x20,
            Self::Rate => 0x24,
            Self::DataOffset => 0x34,
            Self::Chip(chip) => ChipSlot::for_chip(*chip).map_or(0, |slot| slot.clock_at),
            Self::VolumeModifier => 0x7C,
            Self::LoopBase => 0x7E,
            Self::LoopModifier => 0x7F,
            Self::ExtraHeaderOffset => 0xBC,
        }
    }
}

/// Fields introduced together by one format revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCluster {
    pub since: u32,
    /// The data offset must be at least this large for the cluster to exist
    pub min_data_offset: usize,
    pub fields: &'static [HeaderField],
}

impl FieldCluster {
    pub fn is_present(&self, version: Version, data_offset: usize) -> bool {
        version.code >= self.since && data_offset >= self.min_data_offset
    }
}

use HeaderField::{Chip, DataOffset, ExtraHeaderOffset, LoopBase, LoopModifier, VolumeModifier};

pub const HEADER_LAYOUT: &[FieldCluster] = &[
    FieldCluster {
        since: 0x100,
        min_data_offset: 0,
        fields: &[
            HeaderField::EofOffset,
            Chip(ChipName::SN76489),
            Chip(ChipName::YM2413),
            HeaderField::Gd3Offset,
            HeaderField::TotalSamples,
            HeaderField::LoopOffset,
            HeaderField::LoopSamples,
            HeaderField::Rate,
        ],
    },
    FieldCluster {
        since: 0x110,
        min_data_offset: 0,
        fields: &[Chip(ChipName::YM2612), Chip(ChipName::YM2151)],
    },
    FieldCluster {
        since: 0x150,
        min_data_offset: 0,
        fields: &[DataOffset],
    },
    FieldCluster {
        since: 0x151,
        min_data_offset: 0,
        fields: &[Chip(ChipName::SegaPcm)],
    },
    FieldCluster {
        since: 0x151,
        min_data_offset: 0x80,
        fields: &[
            Chip(ChipName::RF5C68),
            Chip(ChipName::YM2203),
            Chip(ChipName::YM2608),
            Chip(ChipName::YM2610),
            Chip(ChipName::YM3812),
            Chip(ChipName::YM3526),
            Chip(ChipName::Y8950),
            Chip(ChipName::YMF262),
            Chip(ChipName::YMF278B),
            Chip(ChipName::YMF271),
            Chip(ChipName::YMZ280B),
            Chip(ChipName::RF5C164),
            Chip(ChipName::Pwm),
            Chip(ChipName::AY8910),
            LoopModifier,
        ],
    },
    FieldCluster {
        since: 0x160,
        min_data_offset: 0x80,
        fields: &[VolumeModifier, LoopBase],
    },
    FieldCluster {
        since: 0x161,
        min_data_offset: 0xB8,
        fields: &[
            Chip(ChipName::GameboyDmg),
            Chip(ChipName::NesApu),
            Chip(ChipName::MultiPcm),
            Chip(ChipName::UPD7759),
            Chip(ChipName::OKIM6258),
            Chip(ChipName::C140),
            Chip(ChipName::OKIM6295),
            Chip(ChipName::K051649),
            Chip(ChipName::K054539),
            Chip(ChipName::HuC6280),
            Chip(ChipName::K053260),
            Chip(ChipName::Pokey),
            Chip(ChipName::QSound),
        ],
    },
    FieldCluster {
        since: 0x170,
        min_data_offset: 0xC0,
        fields: &[ExtraHeaderOffset],
    },
    FieldCluster {
        since: 0x171,
        min_data_offset: 0xE8,
        fields: &[
            Chip(ChipName::SCSP),
            Chip(ChipName::WonderSwan),
            Chip(ChipName::VSU),
            Chip(ChipName::SAA1099),
            Chip(ChipName::ES5506),
            Chip(ChipName::ES5503),
            Chip(ChipName::X1_010),
            Chip(ChipName::C352),
            Chip(ChipName::GA20),
        ],
    },
];

/// Everything stored in the fixed header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: Version,
    pub offsets: Offsets,
    pub samples: Samples,
    pub rate: u32,
    pub loop_modifier: u8,
    pub loop_base: u8,
    pub volume_modifier: u8,
    pub chips: Chips,
}

fn read_relative(buf: &[u8], position: usize) -> VgmResult<usize> {
    let rel = read_u32_le_at(buf, position)? as usize;
    Ok(if rel == 0 { 0 } else { position + rel })
}

fn write_relative(
    buf: &mut [u8],
    field: &'static str,
    position: usize,
    absolute: usize,
) -> VgmResult<()> {
    if absolute == 0 {
        return Ok(());
    }
    let rel = absolute
        .checked_sub(position)
        .filter(|rel| *rel > 0)
        .ok_or(VgmError::InvalidRange {
            field,
            value: absolute as u64,
            min: position as u64 + 1,
            max: u32::MAX as u64,
        })?;
    check_range(field, rel as u64, u32::MAX as u64)?;
    write_u32_le_at(buf, position, rel as u32)
}

/// Decode the fixed header, failing with `Format` on a bad signature.
pub fn decode_header(buf: &[u8]) -> VgmResult<Header> {
    if !is_vgm(buf) {
        let found = String::from_utf8_lossy(&buf[..buf.len().min(4)]).into_owned();
        return Err(VgmError::Format {
            reason: format!("expected 'Vgm ' signature, found '{}'", found),
            offset: 0,
        });
    }
    if buf.len() < LEGACY_HEADER_SIZE {
        return Err(VgmError::Format {
            reason: format!(
                "header needs {} bytes, buffer has {}",
                LEGACY_HEADER_SIZE,
                buf.len()
            ),
            offset: buf.len(),
        });
    }

    let mut header = Header {
        version: Version::new(read_u32_le_at(buf, 0x08)?),
        ..Default::default()
    };
    header.offsets.data = LEGACY_HEADER_SIZE;

    for cluster in HEADER_LAYOUT {
        if !cluster.is_present(header.version, header.offsets.data) {
            continue;
        }
        for field in cluster.fields {
            decode_field(buf, field, &mut header)?;
        }
    }

    tracing::trace!(
        version = %header.version,
        data = header.offsets.data,
        chips = header.chips.len(),
        "decoded header"
    );
    Ok(header)
}

fn decode_field(buf: &[u8], field: &HeaderField, header: &mut Header) -> VgmResult<()> {
    let position = field.position();
    match field {
        HeaderField::EofOffset => header.offsets.eof = read_relative(buf, position)?,
        HeaderField::Gd3Offset => header.offsets.gd3 = read_relative(buf, position)?,
        HeaderField::LoopOffset => header.offsets.loop_point = read_relative(buf, position)?,
        HeaderField::ExtraHeaderOffset => {
            header.offsets.extra_header = read_relative(buf, position)?
        }
        HeaderField::DataOffset => {
            let data = read_relative(buf, position)?;
            if data != 0 {
                header.offsets.data = data;
            }
        }
        HeaderField::TotalSamples => header.samples.total = read_u32_le_at(buf, position)? as u64,
        HeaderField::LoopSamples => {
            header.samples.loop_samples = read_u32_le_at(buf, position)? as u64
        }
        HeaderField::Rate => header.rate = read_u32_le_at(buf, position)?,
        HeaderField::VolumeModifier => header.volume_modifier = read_u8_at(buf, position)?,
        HeaderField::LoopBase => header.loop_base = read_u8_at(buf, position)?,
        HeaderField::LoopModifier => header.loop_modifier = read_u8_at(buf, position)?,
        HeaderField::Chip(chip) => {
            if let Some(slot) = ChipSlot::for_chip(*chip) {
                if let Some(params) = slot.decode(buf)? {
                    header.chips.insert(*chip, params);
                }
            }
        }
    }
    Ok(())
}

/// Encode the fixed header into a zeroed buffer at least `offsets.data` bytes long.
///
/// Chips whose cluster is absent for this version and data offset are not written.
pub fn encode_header(buf: &mut [u8], header: &Header) -> VgmResult<()> {
    write_u32_le_at(buf, 0x00, VGM_IDENT)?;
    write_u32_le_at(buf, 0x08, header.version.code)?;

    for cluster in HEADER_LAYOUT {
        if !cluster.is_present(header.version, header.offsets.data) {
            let dropped: Vec<ChipName> = cluster
                .fields
                .iter()
                .filter_map(|f| match f {
                    Chip(chip) if header.chips.contains_key(chip) => Some(*chip),
                    _ => None,
                })
                .collect();
            if !dropped.is_empty() {
                tracing::warn!(
                    version = %header.version,
                    data = header.offsets.data,
                    ?dropped,
                    "chips not representable in this header layout"
                );
            }
            continue;
        }
        for field in cluster.fields {
            encode_field(buf, field, header)?;
        }
    }
    Ok(())
}

fn encode_field(buf: &mut [u8], field: &HeaderField, header: &Header) -> VgmResult<()> {
    let position = field.position();
    match field {
        HeaderField::EofOffset => write_relative(buf, "offsets.eof", position, header.offsets.eof),
        HeaderField::Gd3Offset => write_relative(buf, "offsets.gd3", position, header.offsets.gd3),
        HeaderField::LoopOffset => {
            write_relative(buf, "offsets.loop", position, header.offsets.loop_point)
        }
        HeaderField::DataOffset => {
            write_relative(buf, "offsets.data", position, header.offsets.data)
        }
        HeaderField::ExtraHeaderOffset => write_relative(
            buf,
            "offsets.extra_header",
            position,
            header.offsets.extra_header,
        ),
        HeaderField::TotalSamples => {
            check_range("samples.total", header.samples.total, u32::MAX as u64)?;
            write_u32_le_at(buf, position, header.samples.total as u32)
        }
        HeaderField::LoopSamples => {
            check_range("samples.loop", header.samples.loop_samples, u32::MAX as u64)?;
            write_u32_le_at(buf, position, header.samples.loop_samples as u32)
        }
        HeaderField::Rate => write_u32_le_at(buf, position, header.rate),
        HeaderField::VolumeModifier => write_u8_at(buf, position, header.volume_modifier),
        HeaderField::LoopBase => write_u8_at(buf, position, header.loop_base),
        HeaderField::LoopModifier => write_u8_at(buf, position, header.loop_modifier),
        HeaderField::Chip(chip) => match ChipSlot::for_chip(*chip) {
            Some(slot) => slot.encode(buf, header.chips.get(chip)),
            None => Ok(()),
        },
    }
}

/// Where an extra header is placed for a given version.
pub fn minimum_extra_header_offset(version: Version) -> VgmResult<usize> {
    if version.code < 0x170 {
        return Err(VgmError::FeatureNotSupported {
            feature: "extra header".to_string(),
            version: version.code,
            min_version: 0x170,
        });
    }
    Ok(if version.code < 0x171 { 0xC0 } else { V171_HEADER_SIZE })
}

/// Smallest data offset that holds every header field of `version`.
pub fn minimum_header_size(
    version: Version,
    data_offset: usize,
    extra_header: Option<&ExtraHeader>,
) -> VgmResult<usize> {
    let size = match version.code {
        code if code < 0x150 => LEGACY_HEADER_SIZE,
        code if code < 0x151 => data_offset.max(LEGACY_HEADER_SIZE),
        code if code < 0x160 => data_offset.max(0x80),
        code if code < 0x170 => data_offset.max(0xC0),
        _ => {
            let extra_size = extra_header.map_or(0, ExtraHeader::byte_size);
            minimum_extra_header_offset(version)? + extra_size
        }
    };
    Ok(size)
}
