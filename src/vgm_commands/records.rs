//! Plain field records for commands
//!
//! A [`CommandRecord`] is the flat, serde-friendly view of a command: the opcode
//! plus whichever fields the command kind uses. Records can be loaded from JSON
//! and turned back into validated commands.

use super::commands::*;
use crate::errors::{check_range, check_range_between, VgmError, VgmResult};
use crate::systems::ChipName;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub cmd: u8,
    /// Encoded size; informative, ignored when building a command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    /// Target chip; informative, the opcode or block type decides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip: Option<ChipName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<u32>,
    /// Stream chip type (0x90)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chip_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_bank_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_base: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
}

impl CommandRecord {
    pub fn new(cmd: u8) -> Self {
        CommandRecord {
            cmd,
            ..Default::default()
        }
    }
}

fn require<T: Copy>(command: &'static str, field: &'static str, value: Option<T>) -> VgmResult<T> {
    value.ok_or(VgmError::MissingField { command, field })
}

fn narrow_u8(field: &'static str, value: u32) -> VgmResult<u8> {
    check_range(field, value as u64, u8::MAX as u64)?;
    Ok(value as u8)
}

fn narrow_u16(field: &'static str, value: u32) -> VgmResult<u16> {
    check_range(field, value as u64, u16::MAX as u64)?;
    Ok(value as u16)
}

/// Required u8 field
fn req_u8(command: &'static str, field: &'static str, value: Option<u32>) -> VgmResult<u8> {
    narrow_u8(field, require(command, field, value)?)
}

type RecordBuilder = fn(&CommandRecord) -> VgmResult<Option<Command>>;

/// Same tie-breaking order as the stream parser
const BUILD_ORDER: [RecordBuilder; 11] = [
    build_write_2a,
    build_write_data,
    build_wait_nibble,
    build_wait_word,
    build_wait_735,
    build_wait_882,
    build_seek_pcm,
    build_data_block,
    build_pcm_ram_write,
    build_stream_control,
    build_end,
];

fn build_write_2a(record: &CommandRecord) -> VgmResult<Option<Command>> {
    if !(0x80..=0x8F).contains(&record.cmd) {
        return Ok(None);
    }
    let count = match record.count {
        Some(count) => {
            check_range("count", count as u64, 15)?;
            count as u8
        }
        None => record.cmd & 0x0F,
    };
    Ok(Some(Command::Write2A { count }))
}

fn build_write_data(record: &CommandRecord) -> VgmResult<Option<Command>> {
    const NAME: &str = "WriteData";
    let layout = match WriteLayout::for_opcode(record.cmd) {
        Some(layout) => layout,
        None => return Ok(None),
    };
    let data = narrow_u16("data", require(NAME, "data", record.data)?)?;
    let addr = match layout {
        WriteLayout::Data => record.addr.unwrap_or(0),
        _ => require(NAME, "addr", record.addr)?,
    };
    let port = match layout.implied_port(record.cmd) {
        Some(port) => record.port.unwrap_or(port as u32),
        None => require(NAME, "port", record.port)?,
    };
    let index = record
        .index
        .or(layout.implied_index(record.cmd).map(u32::from))
        .unwrap_or(0);
    let write = WriteData::new(
        record.cmd,
        narrow_u8("index", index)?,
        narrow_u8("port", port)?,
        narrow_u16("addr", addr)?,
        data,
    )?;
    Ok(Some(Command::WriteData(write)))
}

fn build_wait_nibble(record: &CommandRecord) -> VgmResult<Option<Command>> {
    if !(0x70..=0x7F).contains(&record.cmd) {
        return Ok(None);
    }
    let count = match record.count {
        Some(count) => {
            check_range_between("count", count as u64, 1, 16)?;
            count as u8
        }
        None => (record.cmd & 0x0F) + 1,
    };
    Ok(Some(Command::WaitNibble { count }))
}

fn build_wait_word(record: &CommandRecord) -> VgmResult<Option<Command>> {
    if record.cmd != OP_WAIT_WORD {
        return Ok(None);
    }
    let count = require("WaitWord", "count", record.count)?;
    Ok(Some(Command::WaitWord {
        count: narrow_u16("count", count)?,
    }))
}

fn fixed_wait(record: &CommandRecord, samples: u16, command: Command) -> VgmResult<Option<Command>> {
    if let Some(count) = record.count {
        check_range_between("count", count as u64, samples as u64, samples as u64)?;
    }
    Ok(Some(command))
}

fn build_wait_735(record: &CommandRecord) -> VgmResult<Option<Command>> {
    if record.cmd != OP_WAIT_735 {
        return Ok(None);
    }
    fixed_wait(record, NTSC_FRAME_SAMPLES, Command::Wait735)
}

fn build_wait_882(record: &CommandRecord) -> VgmResult<Option<Command>> {
    if record.cmd != OP_WAIT_882 {
        return Ok(None);
    }
    fixed_wait(record, PAL_FRAME_SAMPLES, Command::Wait882)
}

fn build_seek_pcm(record: &CommandRecord) -> VgmResult<Option<Command>> {
    if record.cmd != OP_SEEK_PCM {
        return Ok(None);
    }
    Ok(Some(Command::SeekPcm {
        offset: require("SeekPcm", "offset", record.offset)?,
    }))
}

fn build_data_block(record: &CommandRecord) -> VgmResult<Option<Command>> {
    const NAME: &str = "DataBlock";
    if record.cmd != OP_DATA_BLOCK {
        return Ok(None);
    }
    let block_type = req_u8(NAME, "blockType", record.block_type)?;
    let data = record
        .block_data
        .clone()
        .ok_or(VgmError::MissingField {
            command: NAME,
            field: "blockData",
        })?;
    let block = DataBlock {
        block_type,
        index: narrow_u8("index", record.index.unwrap_or(0))?,
        data,
    };
    block.validate()?;
    Ok(Some(Command::DataBlock(block)))
}

fn build_pcm_ram_write(record: &CommandRecord) -> VgmResult<Option<Command>> {
    const NAME: &str = "PcmRamWrite";
    if record.cmd != OP_PCM_RAM_WRITE {
        return Ok(None);
    }
    let write = PcmRamWrite {
        chip_type: req_u8(NAME, "blockType", record.block_type)?,
        read_offset: require(NAME, "readOffset", record.read_offset)?,
        write_offset: require(NAME, "writeOffset", record.write_offset)?,
        write_size: require(NAME, "writeSize", record.write_size)?,
    };
    write.validate()?;
    Ok(Some(Command::PcmRamWrite(write)))
}

fn build_stream_control(record: &CommandRecord) -> VgmResult<Option<Command>> {
    let command = match record.cmd {
        OP_SETUP_STREAM => {
            const NAME: &str = "SetupStream";
            Command::SetupStream {
                stream_id: req_u8(NAME, "streamId", record.stream_id)?,
                chip_type: req_u8(NAME, "type", record.chip_type)?,
                port: req_u8(NAME, "port", record.port)?,
                channel: req_u8(NAME, "channel", record.channel)?,
            }
        }
        OP_SET_STREAM_DATA => {
            const NAME: &str = "SetStreamData";
            Command::SetStreamData {
                stream_id: req_u8(NAME, "streamId", record.stream_id)?,
                data_bank_id: req_u8(NAME, "dataBankId", record.data_bank_id)?,
                step_size: req_u8(NAME, "stepSize", record.step_size)?,
                step_base: req_u8(NAME, "stepBase", record.step_base)?,
            }
        }
        OP_SET_STREAM_FREQUENCY => {
            const NAME: &str = "SetStreamFrequency";
            Command::SetStreamFrequency {
                stream_id: req_u8(NAME, "streamId", record.stream_id)?,
                frequency: require(NAME, "frequency", record.frequency)?,
            }
        }
        OP_START_STREAM => {
            const NAME: &str = "StartStream";
            Command::StartStream {
                stream_id: req_u8(NAME, "streamId", record.stream_id)?,
                offset: require(NAME, "offset", record.offset)?,
                length_mode: req_u8(NAME, "lengthMode", record.length_mode)?,
                data_length: require(NAME, "dataLength", record.data_length)?,
            }
        }
        OP_STOP_STREAM => Command::StopStream {
            stream_id: req_u8("StopStream", "streamId", record.stream_id)?,
        },
        OP_START_STREAM_FAST => {
            const NAME: &str = "StartStreamFast";
            Command::StartStreamFast {
                stream_id: req_u8(NAME, "streamId", record.stream_id)?,
                block_id: narrow_u16("blockId", require(NAME, "blockId", record.block_id)?)?,
                flags: req_u8(NAME, "flags", record.flags)?,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn build_end(record: &CommandRecord) -> VgmResult<Option<Command>> {
    Ok((record.cmd == OP_END).then_some(Command::End))
}

impl Command {
    /// Build a validated command from a field record.
    pub fn from_record(record: &CommandRecord) -> VgmResult<Command> {
        for builder in BUILD_ORDER.iter() {
            if let Some(command) = builder(record)? {
                return Ok(command);
            }
        }
        Err(VgmError::UnrecognizedOpcode {
            opcode: record.cmd,
            offset: 0,
        })
    }

    /// Flat record holding every field of this command
    pub fn to_record(&self) -> CommandRecord {
        let mut record = CommandRecord {
            cmd: self.opcode(),
            size: Some(self.size()),
            chip: self.chip(),
            ..Default::default()
        };
        match self {
            Command::End => {}
            Command::WaitWord { .. }
            | Command::WaitNibble { .. }
            | Command::Wait735
            | Command::Wait882
            | Command::Write2A { .. } => record.count = Some(self.samples() as u32),
            Command::WriteData(write) => {
                record.index = Some(write.index as u32);
                record.port = Some(write.port as u32);
                record.addr = Some(write.addr as u32);
                record.data = Some(write.data as u32);
            }
            Command::DataBlock(block) => {
                record.block_type = Some(block.block_type as u32);
                record.index = Some(block.index as u32);
                record.block_data = Some(block.data.clone());
            }
            Command::PcmRamWrite(write) => {
                record.block_type = Some(write.chip_type as u32);
                record.read_offset = Some(write.read_offset);
                record.write_offset = Some(write.write_offset);
                record.write_size = Some(write.write_size);
            }
            Command::SetupStream {
                stream_id,
                chip_type,
                port,
                channel,
            } => {
                record.stream_id = Some(*stream_id as u32);
                record.chip_type = Some(*chip_type as u32);
                record.port = Some(*port as u32);
                record.channel = Some(*channel as u32);
            }
            Command::SetStreamData {
                stream_id,
                data_bank_id,
                step_size,
                step_base,
            } => {
                record.stream_id = Some(*stream_id as u32);
                record.data_bank_id = Some(*data_bank_id as u32);
                record.step_size = Some(*step_size as u32);
                record.step_base = Some(*step_base as u32);
            }
            Command::SetStreamFrequency {
                stream_id,
                frequency,
            } => {
                record.stream_id = Some(*stream_id as u32);
                record.frequency = Some(*frequency);
            }
            Command::StartStream {
                stream_id,
                offset,
                length_mode,
                data_length,
            } => {
                record.stream_id = Some(*stream_id as u32);
                record.offset = Some(*offset);
                record.length_mode = Some(*length_mode as u32);
                record.data_length = Some(*data_length);
            }
            Command::StopStream { stream_id } => record.stream_id = Some(*stream_id as u32),
            Command::StartStreamFast {
                stream_id,
                block_id,
                flags,
            } => {
                record.stream_id = Some(*stream_id as u32);
                record.block_id = Some(*block_id as u32);
                record.flags = Some(*flags as u32);
            }
            Command::SeekPcm { offset } => record.offset = Some(*offset),
        }
        record
    }

    /// Copy with some fields replaced; the edited record is validated like any other.
    ///
    /// Changing the count of a nibble-encoded wait also changes its opcode.
    pub fn copy_with<F>(&self, edit: F) -> VgmResult<Command>
    where
        F: FnOnce(&mut CommandRecord),
    {
        let mut record = self.to_record();
        edit(&mut record);
        Command::from_record(&record)
    }
}
