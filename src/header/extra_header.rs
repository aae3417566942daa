//! Extra header (VGM 1.70+)
//!
//! A small block inside the header area that overrides chip clocks and volumes.
//! Layout, relative to the start of the block:
//!
//! ```text
//! 0x00  header size
//! 0x04  offset of the clock table, relative to 0x04 (if header size >= 8)
//! 0x08  offset of the volume table, relative to 0x08 (if header size >= 12)
//! ```
//!
//! Each table starts with an entry count byte. Clock entries are 5 bytes
//! (chip id, u32 clock), volume entries 4 bytes (chip id with the paired flag
//! in bit 7, flags, u16 volume with the absolute flag in bit 15).

use crate::errors::{check_range, check_range_between, VgmResult};
use crate::systems::ChipName;
use crate::traits::{VgmParser, VgmWriter};
use crate::utils::{read_u16_le_at, read_u32_le_at, read_u8_at};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXTRA_HEADER_SIZE: u32 = 12;
const CLOCK_ENTRY_SIZE: usize = 5;
const VOLUME_ENTRY_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraChipClock {
    pub chip: ChipName,
    pub chip_id: u8,
    pub clock: u32,
}

impl ExtraChipClock {
    pub fn new(chip_id: u8, clock: u32) -> Self {
        Self {
            chip: ChipName::from_id(chip_id),
            chip_id,
            clock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraChipVolume {
    pub chip: ChipName,
    /// Chip id without the paired flag
    pub chip_id: u8,
    /// Applies to the paired chip (e.g. the SSG part of an OPN)
    pub paired: bool,
    pub flags: u8,
    /// Volume without the absolute flag
    pub volume: u16,
    pub absolute: bool,
}

impl ExtraChipVolume {
    pub fn new(chip_id: u8, paired: bool, flags: u8, volume: u16, absolute: bool) -> Self {
        Self {
            chip: ChipName::from_id(chip_id),
            chip_id,
            paired,
            flags,
            volume,
            absolute,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraHeader {
    /// Declared size of the offset block preceding the tables
    pub header_size: u32,
    pub clocks: Option<Vec<ExtraChipClock>>,
    pub volumes: Option<Vec<ExtraChipVolume>>,
}

impl ExtraHeader {
    pub fn new(
        clocks: Option<Vec<ExtraChipClock>>,
        volumes: Option<Vec<ExtraChipVolume>>,
    ) -> Self {
        Self {
            header_size: DEFAULT_EXTRA_HEADER_SIZE,
            clocks,
            volumes,
        }
    }

    fn clocks_size(&self) -> usize {
        self.clocks
            .as_ref()
            .map_or(0, |c| 1 + c.len() * CLOCK_ENTRY_SIZE)
    }

    fn volumes_size(&self) -> usize {
        self.volumes
            .as_ref()
            .map_or(0, |v| 1 + v.len() * VOLUME_ENTRY_SIZE)
    }

    /// Encoded size of the whole block
    pub fn byte_size(&self) -> usize {
        self.header_size as usize + self.clocks_size() + self.volumes_size()
    }

    pub fn clock_entry_count(&self) -> usize {
        self.clocks.as_ref().map_or(0, Vec::len)
    }

    pub fn volume_entry_count(&self) -> usize {
        self.volumes.as_ref().map_or(0, Vec::len)
    }
}

impl VgmParser for ExtraHeader {
    /// `data` starts at the extra header and may run to the end of the file.
    fn from_bytes(data: &mut Bytes) -> VgmResult<Self> {
        let buf: &[u8] = data;
        let header_size = read_u32_le_at(buf, 0x00)?;
        let mut clocks = None;
        let mut volumes = None;

        if header_size >= 8 {
            let rel = read_u32_le_at(buf, 0x04)? as usize;
            if rel > 0 {
                let base = 0x04 + rel;
                let count = read_u8_at(buf, base)? as usize;
                let mut entries = Vec::with_capacity(count);
                for i in 0..count {
                    let at = base + 1 + i * CLOCK_ENTRY_SIZE;
                    let chip_id = read_u8_at(buf, at)?;
                    let clock = read_u32_le_at(buf, at + 1)?;
                    entries.push(ExtraChipClock::new(chip_id, clock));
                }
                clocks = Some(entries);
            }
        }

        if header_size >= 12 {
            let rel = read_u32_le_at(buf, 0x08)? as usize;
            if rel > 0 {
                let base = 0x08 + rel;
                let count = read_u8_at(buf, base)? as usize;
                let mut entries = Vec::with_capacity(count);
                for i in 0..count {
                    let at = base + 1 + i * VOLUME_ENTRY_SIZE;
                    let raw_id = read_u8_at(buf, at)?;
                    let flags = read_u8_at(buf, at + 1)?;
                    let raw_volume = read_u16_le_at(buf, at + 2)?;
                    entries.push(ExtraChipVolume::new(
                        raw_id & 0x7F,
                        raw_id & 0x80 != 0,
                        flags,
                        raw_volume & 0x7FFF,
                        raw_volume & 0x8000 != 0,
                    ));
                }
                volumes = Some(entries);
            }
        }

        Ok(ExtraHeader {
            header_size,
            clocks,
            volumes,
        })
    }
}

impl VgmWriter for ExtraHeader {
    /// Writes the offset block, then the clock table, then the volume table.
    fn to_bytes(&self, buffer: &mut BytesMut) -> VgmResult<()> {
        let min_size = match (&self.clocks, &self.volumes) {
            (_, Some(_)) => 12,
            (Some(_), None) => 8,
            (None, None) => 4,
        };
        check_range_between(
            "extra_header.header_size",
            self.header_size as u64,
            min_size,
            u16::MAX as u64,
        )?;
        check_range("extra_header.clocks", self.clock_entry_count() as u64, 0xFF)?;
        check_range("extra_header.volumes", self.volume_entry_count() as u64, 0xFF)?;
        for entry in self.volumes.iter().flatten() {
            check_range("extra_header.volume.chip_id", entry.chip_id as u64, 0x7F)?;
            check_range("extra_header.volume.volume", entry.volume as u64, 0x7FFF)?;
        }

        let header_size = self.header_size as usize;
        let start = buffer.len();
        buffer.put_u32_le(self.header_size);
        if header_size >= 8 {
            let rel = if self.clocks.is_some() { header_size - 0x04 } else { 0 };
            buffer.put_u32_le(rel as u32);
        }
        if header_size >= 12 {
            let rel = if self.volumes.is_some() {
                header_size + self.clocks_size() - 0x08
            } else {
                0
            };
            buffer.put_u32_le(rel as u32);
        }
        buffer.resize(start + header_size, 0);

        if let Some(clocks) = &self.clocks {
            buffer.put_u8(clocks.len() as u8);
            for entry in clocks {
                buffer.put_u8(entry.chip_id);
                buffer.put_u32_le(entry.clock);
            }
        }
        if let Some(volumes) = &self.volumes {
            buffer.put_u8(volumes.len() as u8);
            for entry in volumes {
                buffer.put_u8(entry.chip_id | if entry.paired { 0x80 } else { 0 });
                buffer.put_u8(entry.flags);
                buffer.put_u16_le(entry.volume | if entry.absolute { 0x8000 } else { 0 });
            }
        }
        Ok(())
    }
}
