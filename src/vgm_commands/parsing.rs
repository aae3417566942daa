//! VGM Command Parsing
//!
//! One parser per command kind. Each returns `Ok(None)` when the opcode at
//! `offset` is not its own, so the stream codec can try them in a fixed order.

use super::commands::*;
use crate::errors::{VgmError, VgmResult};
use crate::traits::VgmParser;
use crate::utils::{read_u16_le_at, read_u32_le_at, read_u8_at, take};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::{Buf, Bytes};

type CommandParser = fn(&[u8], usize) -> VgmResult<Option<Command>>;

/// Parsers in tie-breaking order; the first to accept the opcode wins.
pub const PARSE_ORDER: [(&str, CommandParser); 11] = [
    ("Write2A", parse_write_2a),
    ("WriteData", parse_write_data),
    ("WaitNibble", parse_wait_nibble),
    ("WaitWord", parse_wait_word),
    ("Wait735", parse_wait_735),
    ("Wait882", parse_wait_882),
    ("SeekPcm", parse_seek_pcm),
    ("DataBlock", parse_data_block),
    ("PcmRamWrite", parse_pcm_ram_write),
    ("Stream", parse_stream_control),
    ("End", parse_end),
];

/// Parse the command starting at `offset`.
pub fn parse_command(buf: &[u8], offset: usize) -> VgmResult<Command> {
    if offset >= buf.len() {
        return Err(VgmError::TruncatedStream {
            offset,
            needed: 1,
            available: 0,
        });
    }
    for (_, parser) in PARSE_ORDER.iter() {
        if let Some(command) = parser(buf, offset)? {
            return Ok(command);
        }
    }
    Err(VgmError::UnrecognizedOpcode {
        opcode: buf[offset],
        offset,
    })
}

fn read_u24_le_at(buf: &[u8], offset: usize) -> VgmResult<u32> {
    Ok(LittleEndian::read_u24(take(buf, offset, 3)?))
}

fn split_bit7(value: u8) -> (u8, u8) {
    ((value >> 7) & 1, value & 0x7F)
}

fn split_bit15(value: u16) -> (u8, u16) {
    ((value >> 15) as u8 & 1, value & 0x7FFF)
}

pub fn parse_write_2a(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    let opcode = buf[offset];
    if !(0x80..=0x8F).contains(&opcode) {
        return Ok(None);
    }
    Ok(Some(Command::Write2A {
        count: opcode & 0x0F,
    }))
}

pub fn parse_write_data(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    let opcode = buf[offset];
    let layout = match WriteLayout::for_opcode(opcode) {
        Some(layout) => layout,
        None => return Ok(None),
    };
    // whole command must be present before any field is read
    let body = take(buf, offset, layout.size())?;
    let (b1, b2) = (body[1], body.get(2).copied().unwrap_or(0));

    let (index, port, addr, data) = match layout {
        WriteLayout::Data => (
            layout.implied_index(opcode).unwrap_or(0),
            0,
            0,
            b1 as u16,
        ),
        WriteLayout::Register => (
            layout.implied_index(opcode).unwrap_or(0),
            layout.implied_port(opcode).unwrap_or(0),
            b1 as u16,
            b2 as u16,
        ),
        WriteLayout::IndexedRegister => {
            let (index, addr) = split_bit7(b1);
            (index, 0, addr as u16, b2 as u16)
        }
        WriteLayout::Address16Le => {
            let (index, addr) = split_bit15(LittleEndian::read_u16(&body[1..3]));
            (index, 0, addr, body[3] as u16)
        }
        WriteLayout::ChannelWord16Le => {
            let (index, channel) = split_bit7(b1);
            (index, 0, channel as u16, LittleEndian::read_u16(&body[2..4]))
        }
        WriteLayout::Word16BeRegister => (0, 0, body[3] as u16, BigEndian::read_u16(&body[1..3])),
        WriteLayout::Address16Be => {
            let (index, addr) = split_bit15(BigEndian::read_u16(&body[1..3]));
            (index, 0, addr, body[3] as u16)
        }
        WriteLayout::PortRegister => {
            let (index, port) = split_bit7(b1);
            (index, port, b2 as u16, body[3] as u16)
        }
        WriteLayout::RegisterWord16Be => {
            let (index, addr) = split_bit7(b1);
            (index, 0, addr as u16, BigEndian::read_u16(&body[2..4]))
        }
        WriteLayout::Address16BeWord16Be => {
            let (index, addr) = split_bit15(BigEndian::read_u16(&body[1..3]));
            (index, 0, addr, BigEndian::read_u16(&body[3..5]))
        }
    };

    Ok(Some(Command::WriteData(WriteData {
        opcode,
        index,
        port,
        addr,
        data,
    })))
}

pub fn parse_wait_nibble(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    let opcode = buf[offset];
    if !(0x70..=0x7F).contains(&opcode) {
        return Ok(None);
    }
    Ok(Some(Command::WaitNibble {
        count: (opcode & 0x0F) + 1,
    }))
}

pub fn parse_wait_word(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    if buf[offset] != OP_WAIT_WORD {
        return Ok(None);
    }
    Ok(Some(Command::WaitWord {
        count: read_u16_le_at(buf, offset + 1)?,
    }))
}

pub fn parse_wait_735(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    Ok((buf[offset] == OP_WAIT_735).then_some(Command::Wait735))
}

pub fn parse_wait_882(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    Ok((buf[offset] == OP_WAIT_882).then_some(Command::Wait882))
}

pub fn parse_seek_pcm(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    if buf[offset] != OP_SEEK_PCM {
        return Ok(None);
    }
    Ok(Some(Command::SeekPcm {
        offset: read_u32_le_at(buf, offset + 1)?,
    }))
}

fn check_compat_marker(buf: &[u8], offset: usize) -> VgmResult<()> {
    let marker = read_u8_at(buf, offset + 1)?;
    if marker != COMPAT_MARKER {
        return Err(VgmError::Format {
            reason: format!(
                "expected 0x66 after opcode 0x{:02X}, found 0x{:02X}",
                buf[offset], marker
            ),
            offset: offset + 1,
        });
    }
    Ok(())
}

pub fn parse_data_block(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    if buf[offset] != OP_DATA_BLOCK {
        return Ok(None);
    }
    check_compat_marker(buf, offset)?;
    let block_type = read_u8_at(buf, offset + 2)?;
    let (index, len) = DataBlock::split_size_field(read_u32_le_at(buf, offset + 3)?);
    let data = take(buf, offset + 7, len)?.to_vec();
    Ok(Some(Command::DataBlock(DataBlock {
        block_type,
        index,
        data,
    })))
}

pub fn parse_pcm_ram_write(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    if buf[offset] != OP_PCM_RAM_WRITE {
        return Ok(None);
    }
    check_compat_marker(buf, offset)?;
    Ok(Some(Command::PcmRamWrite(PcmRamWrite {
        chip_type: read_u8_at(buf, offset + 2)?,
        read_offset: read_u24_le_at(buf, offset + 3)?,
        write_offset: read_u24_le_at(buf, offset + 6)?,
        write_size: read_u24_le_at(buf, offset + 9)?,
    })))
}

pub fn parse_stream_control(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    let command = match buf[offset] {
        OP_SETUP_STREAM => {
            let b = take(buf, offset, 5)?;
            Command::SetupStream {
                stream_id: b[1],
                chip_type: b[2],
                port: b[3],
                channel: b[4],
            }
        }
        OP_SET_STREAM_DATA => {
            let b = take(buf, offset, 5)?;
            Command::SetStreamData {
                stream_id: b[1],
                data_bank_id: b[2],
                step_size: b[3],
                step_base: b[4],
            }
        }
        OP_SET_STREAM_FREQUENCY => Command::SetStreamFrequency {
            stream_id: read_u8_at(buf, offset + 1)?,
            frequency: read_u32_le_at(buf, offset + 2)?,
        },
        OP_START_STREAM => Command::StartStream {
            stream_id: read_u8_at(buf, offset + 1)?,
            offset: read_u32_le_at(buf, offset + 2)?,
            length_mode: read_u8_at(buf, offset + 6)?,
            data_length: read_u32_le_at(buf, offset + 7)?,
        },
        OP_STOP_STREAM => Command::StopStream {
            stream_id: read_u8_at(buf, offset + 1)?,
        },
        OP_START_STREAM_FAST => Command::StartStreamFast {
            stream_id: read_u8_at(buf, offset + 1)?,
            block_id: read_u16_le_at(buf, offset + 2)?,
            flags: read_u8_at(buf, offset + 4)?,
        },
        _ => return Ok(None),
    };
    Ok(Some(command))
}

pub fn parse_end(buf: &[u8], offset: usize) -> VgmResult<Option<Command>> {
    Ok((buf[offset] == OP_END).then_some(Command::End))
}

impl VgmParser for Command {
    /// Parse one command from the front of `data` and advance past it.
    fn from_bytes(data: &mut Bytes) -> VgmResult<Self> {
        let command = parse_command(data, 0)?;
        data.advance(command.size());
        Ok(command)
    }
}
