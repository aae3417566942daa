//! VGM Command Definitions
//!
//! The closed set of command kinds found in a VGM stream, their wire sizes and
//! the register-write addressing layouts.

use crate::errors::{check_range, check_range_between, VgmError, VgmResult};
use crate::systems::{chip_for_block_type, chip_for_opcode, ChipName};
use serde::{Deserialize, Serialize};

pub const OP_END: u8 = 0x66;
pub const OP_WAIT_WORD: u8 = 0x61;
pub const OP_WAIT_735: u8 = 0x62;
pub const OP_WAIT_882: u8 = 0x63;
pub const OP_DATA_BLOCK: u8 = 0x67;
pub const OP_PCM_RAM_WRITE: u8 = 0x68;
pub const OP_SETUP_STREAM: u8 = 0x90;
pub const OP_SET_STREAM_DATA: u8 = 0x91;
pub const OP_SET_STREAM_FREQUENCY: u8 = 0x92;
pub const OP_START_STREAM: u8 = 0x93;
pub const OP_STOP_STREAM: u8 = 0x94;
pub const OP_START_STREAM_FAST: u8 = 0x95;
pub const OP_SEEK_PCM: u8 = 0xE0;

/// Second byte of DataBlock and PCM RAM write commands
pub const COMPAT_MARKER: u8 = 0x66;

pub const NTSC_FRAME_SAMPLES: u16 = 735;
pub const PAL_FRAME_SAMPLES: u16 = 882;

/// Largest DataBlock payload; bit 31 of the size field is the instance flag
pub const MAX_DATA_BLOCK_PAYLOAD: usize = 0x7FFF_FFFF;
const DATA_BLOCK_INSTANCE_BIT: u32 = 0x8000_0000;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub enum Command {
    End,
    WaitWord {
        count: u16,
    },
    /// 0x70-0x7F, waits `count` (1-16) samples
    WaitNibble {
        count: u8,
    },
    Wait735,
    Wait882,
    /// 0x80-0x8F, YM2612 DAC write from the PCM bank then wait `count` (0-15)
    Write2A {
        count: u8,
    },
    WriteData(WriteData),
    DataBlock(DataBlock),
    PcmRamWrite(PcmRamWrite),
    // DAC stream control (0x90-0x95)
    SetupStream {
        stream_id: u8,
        chip_type: u8,
        port: u8,
        channel: u8,
    },
    SetStreamData {
        stream_id: u8,
        data_bank_id: u8,
        step_size: u8,
        step_base: u8,
    },
    SetStreamFrequency {
        stream_id: u8,
        frequency: u32,
    },
    StartStream {
        stream_id: u8,
        offset: u32,
        length_mode: u8,
        data_length: u32,
    },
    StopStream {
        stream_id: u8,
    },
    StartStreamFast {
        stream_id: u8,
        block_id: u16,
        flags: u8,
    },
    SeekPcm {
        offset: u32,
    },
}

impl Command {
    /// Wait of 1-16 samples encoded in the opcode
    pub fn wait_nibble(count: u8) -> VgmResult<Command> {
        check_range_between("count", count as u64, 1, 16)?;
        Ok(Command::WaitNibble { count })
    }

    pub fn write_2a(count: u8) -> VgmResult<Command> {
        check_range("count", count as u64, 15)?;
        Ok(Command::Write2A { count })
    }

    /// Leading opcode byte
    pub fn opcode(&self) -> u8 {
        match self {
            Command::End => OP_END,
            Command::WaitWord { .. } => OP_WAIT_WORD,
            Command::WaitNibble { count } => 0x70 | (count.wrapping_sub(1) & 0x0F),
            Command::Wait735 => OP_WAIT_735,
            Command::Wait882 => OP_WAIT_882,
            Command::Write2A { count } => 0x80 | (count & 0x0F),
            Command::WriteData(write) => write.opcode,
            Command::DataBlock(_) => OP_DATA_BLOCK,
            Command::PcmRamWrite(_) => OP_PCM_RAM_WRITE,
            Command::SetupStream { .. } => OP_SETUP_STREAM,
            Command::SetStreamData { .. } => OP_SET_STREAM_DATA,
            Command::SetStreamFrequency { .. } => OP_SET_STREAM_FREQUENCY,
            Command::StartStream { .. } => OP_START_STREAM,
            Command::StopStream { .. } => OP_STOP_STREAM,
            Command::StartStreamFast { .. } => OP_START_STREAM_FAST,
            Command::SeekPcm { .. } => OP_SEEK_PCM,
        }
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        match self {
            Command::End
            | Command::WaitNibble { .. }
            | Command::Wait735
            | Command::Wait882
            | Command::Write2A { .. } => 1,
            Command::WaitWord { .. } => 3,
            Command::WriteData(write) => write.size(),
            Command::DataBlock(block) => 7 + block.data.len(),
            Command::PcmRamWrite(_) => 12,
            Command::SetupStream { .. } => 5,
            Command::SetStreamData { .. } => 5,
            Command::SetStreamFrequency { .. } => 6,
            Command::StartStream { .. } => 11,
            Command::StopStream { .. } => 2,
            Command::StartStreamFast { .. } => 5,
            Command::SeekPcm { .. } => 5,
        }
    }

    /// Samples elapsed by this command
    pub fn samples(&self) -> u64 {
        match self {
            Command::WaitWord { count } => *count as u64,
            Command::WaitNibble { count } => *count as u64,
            Command::Wait735 => NTSC_FRAME_SAMPLES as u64,
            Command::Wait882 => PAL_FRAME_SAMPLES as u64,
            Command::Write2A { count } => *count as u64,
            _ => 0,
        }
    }

    /// Chip addressed by this command, if any
    pub fn chip(&self) -> Option<ChipName> {
        match self {
            Command::WriteData(write) => Some(write.chip()),
            Command::DataBlock(block) => Some(block.chip()),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::End => "End",
            Command::WaitWord { .. } => "WaitWord",
            Command::WaitNibble { .. } => "WaitNibble",
            Command::Wait735 => "Wait735",
            Command::Wait882 => "Wait882",
            Command::Write2A { .. } => "Write2A",
            Command::WriteData(_) => "WriteData",
            Command::DataBlock(_) => "DataBlock",
            Command::PcmRamWrite(_) => "PcmRamWrite",
            Command::SetupStream { .. } => "SetupStream",
            Command::SetStreamData { .. } => "SetStreamData",
            Command::SetStreamFrequency { .. } => "SetStreamFrequency",
            Command::StartStream { .. } => "StartStream",
            Command::StopStream { .. } => "StopStream",
            Command::StartStreamFast { .. } => "StartStreamFast",
            Command::SeekPcm { .. } => "SeekPcm",
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Command::End)
    }

    /// Check that every field fits its wire representation
    pub fn validate(&self) -> VgmResult<()> {
        match self {
            Command::WaitNibble { count } => check_range_between("count", *count as u64, 1, 16),
            Command::Write2A { count } => check_range("count", *count as u64, 15),
            Command::WriteData(write) => write.validate(),
            Command::DataBlock(block) => block.validate(),
            Command::PcmRamWrite(write) => write.validate(),
            _ => Ok(()),
        }
    }
}

/// Byte layout of a register write, selected by opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteLayout {
    /// `dd`
    Data,
    /// `aa dd`, instance and port implied by the opcode
    Register,
    /// `aa dd`, bit 7 of `aa` selects the second instance
    IndexedRegister,
    /// `aaaa dd`, little-endian address, bit 15 instance
    Address16Le,
    /// `cc dddd`, 7-bit channel with instance bit, little-endian data
    ChannelWord16Le,
    /// `dddd aa`, big-endian data then register
    Word16BeRegister,
    /// `aaaa dd`, big-endian address, bit 15 instance
    Address16Be,
    /// `pp aa dd`, bit 7 of `pp` instance
    PortRegister,
    /// `aa dddd`, 7-bit register with instance bit, big-endian data
    RegisterWord16Be,
    /// `aaaa dddd`, both big-endian, bit 15 of the address instance
    Address16BeWord16Be,
}

impl WriteLayout {
    /// Layout for a register-write opcode; `None` for opcodes that are not writes
    pub fn for_opcode(opcode: u8) -> Option<WriteLayout> {
        chip_for_opcode(opcode)?;
        let layout = match opcode {
            0x30..=0x3F | 0x4F | 0x50 => WriteLayout::Data,
            0x51..=0x5F | 0xA1..=0xAF => WriteLayout::Register,
            0xA0 | 0xB0..=0xBF => WriteLayout::IndexedRegister,
            0xC0..=0xC2 => WriteLayout::Address16Le,
            0xC3 => WriteLayout::ChannelWord16Le,
            0xC4 => WriteLayout::Word16BeRegister,
            0xC5..=0xC8 | 0xD3..=0xD5 => WriteLayout::Address16Be,
            0xD0..=0xD2 => WriteLayout::PortRegister,
            0xD6 => WriteLayout::RegisterWord16Be,
            0xE1 => WriteLayout::Address16BeWord16Be,
            _ => return None,
        };
        Some(layout)
    }

    /// Encoded size including the opcode
    pub fn size(&self) -> usize {
        match self {
            WriteLayout::Data => 2,
            WriteLayout::Register | WriteLayout::IndexedRegister => 3,
            WriteLayout::Address16BeWord16Be => 5,
            _ => 4,
        }
    }

    pub fn max_addr(&self) -> u16 {
        match self {
            WriteLayout::Data => 0,
            WriteLayout::Register | WriteLayout::Word16BeRegister | WriteLayout::PortRegister => {
                0xFF
            }
            WriteLayout::IndexedRegister
            | WriteLayout::ChannelWord16Le
            | WriteLayout::RegisterWord16Be => 0x7F,
            WriteLayout::Address16Le
            | WriteLayout::Address16Be
            | WriteLayout::Address16BeWord16Be => 0x7FFF,
        }
    }

    pub fn max_data(&self) -> u16 {
        match self {
            WriteLayout::ChannelWord16Le
            | WriteLayout::Word16BeRegister
            | WriteLayout::RegisterWord16Be
            | WriteLayout::Address16BeWord16Be => 0xFFFF,
            _ => 0xFF,
        }
    }

    pub fn max_port(&self) -> u8 {
        match self {
            WriteLayout::PortRegister => 0x7F,
            WriteLayout::Register => 1,
            _ => 0,
        }
    }

    /// Whether the layout has room for a second-instance flag
    pub fn has_index_bit(&self) -> bool {
        !matches!(self, WriteLayout::Word16BeRegister)
    }

    /// Instance index fixed by the opcode itself
    pub fn implied_index(&self, opcode: u8) -> Option<u8> {
        match self {
            WriteLayout::Data => Some(if opcode == 0x30 || opcode == 0x3F { 1 } else { 0 }),
            WriteLayout::Register => Some(if opcode & 0xF0 == 0x50 { 0 } else { 1 }),
            WriteLayout::Word16BeRegister => Some(0),
            _ => None,
        }
    }

    /// Port fixed by the opcode itself
    pub fn implied_port(&self, opcode: u8) -> Option<u8> {
        match self {
            WriteLayout::Register => Some(match opcode & 0x0F {
                0x3 | 0x7 | 0x9 | 0xF => 1,
                _ => 0,
            }),
            WriteLayout::PortRegister => None,
            _ => Some(0),
        }
    }
}

/// A chip register write
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub struct WriteData {
    pub opcode: u8,
    /// 0 for the first chip, 1 for the second instance
    pub index: u8,
    pub port: u8,
    pub addr: u16,
    pub data: u16,
}

impl WriteData {
    /// Build a validated write; index and port fixed by the opcode must match.
    pub fn new(opcode: u8, index: u8, port: u8, addr: u16, data: u16) -> VgmResult<WriteData> {
        let write = WriteData {
            opcode,
            index,
            port,
            addr,
            data,
        };
        write.validate()?;
        Ok(write)
    }

    /// Write for layouts where the opcode implies instance and port
    pub fn with_opcode(opcode: u8, addr: u16, data: u16) -> VgmResult<WriteData> {
        let layout = Self::layout_of(opcode)?;
        let index = layout.implied_index(opcode).unwrap_or(0);
        let port = layout.implied_port(opcode).unwrap_or(0);
        WriteData::new(opcode, index, port, addr, data)
    }

    pub(crate) fn layout_of(opcode: u8) -> VgmResult<WriteLayout> {
        WriteLayout::for_opcode(opcode).ok_or(VgmError::UnrecognizedOpcode { opcode, offset: 0 })
    }

    pub fn layout(&self) -> VgmResult<WriteLayout> {
        Self::layout_of(self.opcode)
    }

    pub fn chip(&self) -> ChipName {
        chip_for_opcode(self.opcode).unwrap_or(ChipName::Unknown)
    }

    /// Encoded size; unknown opcodes count as a bare opcode byte
    pub fn size(&self) -> usize {
        WriteLayout::for_opcode(self.opcode).map_or(1, |layout| layout.size())
    }

    pub fn validate(&self) -> VgmResult<()> {
        let layout = self.layout()?;
        match layout.implied_index(self.opcode) {
            Some(index) => check_range_between("index", self.index as u64, index as u64, index as u64)?,
            None => check_range("index", self.index as u64, layout.has_index_bit() as u64)?,
        }
        match layout.implied_port(self.opcode) {
            Some(port) => check_range_between("port", self.port as u64, port as u64, port as u64)?,
            None => check_range("port", self.port as u64, layout.max_port() as u64)?,
        }
        check_range("addr", self.addr as u64, layout.max_addr() as u64)?;
        check_range("data", self.data as u64, layout.max_data() as u64)
    }
}

/// Embedded binary payload (sample ROM, PCM stream, RAM image)
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub struct DataBlock {
    pub block_type: u8,
    /// Set from bit 31 of the size field: the payload targets the second chip
    pub index: u8,
    pub data: Vec<u8>,
}

impl DataBlock {
    pub fn new(block_type: u8, data: Vec<u8>) -> DataBlock {
        DataBlock {
            block_type,
            index: 0,
            data,
        }
    }

    pub fn chip(&self) -> ChipName {
        chip_for_block_type(self.block_type)
    }

    /// Raw size field as written to the stream
    pub fn size_field(&self) -> u32 {
        let len = (self.data.len() & MAX_DATA_BLOCK_PAYLOAD) as u32;
        if self.index != 0 {
            len | DATA_BLOCK_INSTANCE_BIT
        } else {
            len
        }
    }

    /// Split a raw size field into (instance index, payload length)
    pub fn split_size_field(raw: u32) -> (u8, usize) {
        (
            (raw & DATA_BLOCK_INSTANCE_BIT != 0) as u8,
            (raw & !DATA_BLOCK_INSTANCE_BIT) as usize,
        )
    }

    pub fn validate(&self) -> VgmResult<()> {
        check_range("index", self.index as u64, 1)?;
        check_range(
            "block_data",
            self.data.len() as u64,
            MAX_DATA_BLOCK_PAYLOAD as u64,
        )
    }
}

/// Copy part of a loaded data block into chip RAM (0x68)
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub struct PcmRamWrite {
    /// Block type of the source data
    pub chip_type: u8,
    pub read_offset: u32,
    pub write_offset: u32,
    /// Bytes to copy; 0 means 0x1000000
    pub write_size: u32,
}

pub const MAX_U24: u32 = 0x00FF_FFFF;

impl PcmRamWrite {
    pub fn validate(&self) -> VgmResult<()> {
        check_range("read_offset", self.read_offset as u64, MAX_U24 as u64)?;
        check_range("write_offset", self.write_offset as u64, MAX_U24 as u64)?;
        check_range("write_size", self.write_size as u64, MAX_U24 as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sizes_match_wire_format() {
        assert_eq!(Command::End.size(), 1);
        assert_eq!(Command::WaitWord { count: 1 }.size(), 3);
        assert_eq!(Command::SetupStream { stream_id: 0, chip_type: 2, port: 0, channel: 0x2A }.size(), 5);
        assert_eq!(Command::SetStreamFrequency { stream_id: 0, frequency: 22050 }.size(), 6);
        assert_eq!(
            Command::StartStream { stream_id: 0, offset: 0, length_mode: 1, data_length: 10 }.size(),
            11
        );
        assert_eq!(Command::StopStream { stream_id: 0 }.size(), 2);
        assert_eq!(Command::StartStreamFast { stream_id: 0, block_id: 3, flags: 0 }.size(), 5);
        assert_eq!(Command::SeekPcm { offset: 0 }.size(), 5);
        assert_eq!(Command::DataBlock(DataBlock::new(0, vec![1, 2, 3])).size(), 10);
        assert_eq!(
            Command::PcmRamWrite(PcmRamWrite { chip_type: 0xC0, read_offset: 0, write_offset: 0, write_size: 1 })
                .size(),
            12
        );
    }

    #[test]
    fn test_samples() {
        assert_eq!(Command::Wait735.samples(), 735);
        assert_eq!(Command::Wait882.samples(), 882);
        assert_eq!(Command::WaitWord { count: 300 }.samples(), 300);
        assert_eq!(Command::wait_nibble(16).unwrap().samples(), 16);
        assert_eq!(Command::write_2a(7).unwrap().samples(), 7);
        assert_eq!(Command::End.samples(), 0);
        assert_eq!(Command::SeekPcm { offset: 100 }.samples(), 0);
    }

    #[test]
    fn test_wait_nibble_range() {
        assert!(Command::wait_nibble(1).is_ok());
        assert!(Command::wait_nibble(16).is_ok());
        assert!(matches!(
            Command::wait_nibble(0),
            Err(VgmError::InvalidRange { min: 1, max: 16, .. })
        ));
        assert!(Command::wait_nibble(17).is_err());
        assert!(Command::write_2a(16).is_err());
        assert_eq!(Command::write_2a(0).unwrap().opcode(), 0x80);
    }

    #[test]
    fn test_write_layouts() {
        assert_eq!(WriteLayout::for_opcode(0x50), Some(WriteLayout::Data));
        assert_eq!(WriteLayout::for_opcode(0xA0), Some(WriteLayout::IndexedRegister));
        assert_eq!(WriteLayout::for_opcode(0xA1), Some(WriteLayout::Register));
        assert_eq!(WriteLayout::for_opcode(0xE1), Some(WriteLayout::Address16BeWord16Be));
        // reserved opcodes inside write ranges are not writes
        assert_eq!(WriteLayout::for_opcode(0x31), None);
        assert_eq!(WriteLayout::for_opcode(0xC9), None);
        assert_eq!(WriteLayout::for_opcode(0x66), None);
    }

    #[test]
    fn test_implied_index_and_port() {
        let write = WriteData::with_opcode(0x53, 0x2A, 0x80).unwrap();
        assert_eq!((write.index, write.port), (0, 1));
        assert_eq!(write.chip(), ChipName::YM2612);

        let write = WriteData::with_opcode(0xA2, 0x28, 0xF0).unwrap();
        assert_eq!((write.index, write.port), (1, 0));

        let write = WriteData::with_opcode(0x30, 0, 0x9F).unwrap();
        assert_eq!(write.index, 1);
        assert_eq!(write.chip(), ChipName::SN76489);

        // contradicting the opcode is rejected
        assert!(matches!(
            WriteData::new(0x52, 1, 0, 0x28, 0),
            Err(VgmError::InvalidRange { field: "index", .. })
        ));
        assert!(matches!(
            WriteData::new(0x52, 0, 1, 0x28, 0),
            Err(VgmError::InvalidRange { field: "port", .. })
        ));
    }

    #[test]
    fn test_write_field_ranges() {
        assert!(WriteData::new(0xB4, 1, 0, 0x7F, 0xFF).is_ok());
        assert!(WriteData::new(0xB4, 0, 0, 0x80, 0).is_err());
        assert!(WriteData::new(0xB4, 0, 0, 0, 0x100).is_err());
        assert!(WriteData::new(0xC0, 1, 0, 0x7FFF, 0xFF).is_ok());
        assert!(WriteData::new(0xC4, 1, 0, 0, 0).is_err());
        assert!(WriteData::new(0xD0, 1, 0x7F, 0xFF, 0xFF).is_ok());
        assert!(WriteData::new(0xD0, 0, 0x80, 0, 0).is_err());
        assert!(matches!(
            WriteData::new(0x31, 0, 0, 0, 0),
            Err(VgmError::UnrecognizedOpcode { opcode: 0x31, .. })
        ));
    }

    #[test]
    fn test_data_block_size_field() {
        let mut block = DataBlock::new(0x00, vec![0; 4]);
        assert_eq!(block.size_field(), 4);
        block.index = 1;
        assert_eq!(block.size_field(), 0x8000_0004);
        assert_eq!(DataBlock::split_size_field(0x8000_0004), (1, 4));
        assert_eq!(block.chip(), ChipName::YM2612);
        block.index = 2;
        assert!(block.validate().is_err());
    }

    #[test]
    fn test_pcm_ram_write_is_24_bit() {
        let write = PcmRamWrite { chip_type: 0xC0, read_offset: MAX_U24, write_offset: 0, write_size: 0 };
        assert!(write.validate().is_ok());
        let write = PcmRamWrite { read_offset: MAX_U24 + 1, ..write };
        assert!(write.validate().is_err());
    }

    proptest! {
        #[test]
        fn test_wait_nibble_opcode(n in 1u8..=16) {
            let cmd = Command::wait_nibble(n).unwrap();
            prop_assert_eq!(cmd.opcode(), 0x70 | (n - 1));
            prop_assert_eq!(cmd.samples(), n as u64);
        }
    }
}
