//! VGM Command Serialization
//!
//! Converts commands back to their wire bytes. Every command is validated
//! before its first byte is written, so a failed write leaves the buffer as it was.

use super::commands::*;
use crate::errors::VgmResult;
use crate::traits::VgmWriter;
use bytes::{BufMut, BytesMut};

fn put_u24_le(buffer: &mut BytesMut, value: u32) {
    buffer.put_uint_le(value as u64, 3);
}

fn bit7(index: u8) -> u8 {
    if index != 0 {
        0x80
    } else {
        0
    }
}

fn bit15(index: u8) -> u16 {
    if index != 0 {
        0x8000
    } else {
        0
    }
}

impl VgmWriter for WriteData {
    fn to_bytes(&self, buffer: &mut BytesMut) -> VgmResult<()> {
        self.validate()?;
        let layout = self.layout()?;
        buffer.put_u8(self.opcode);
        match layout {
            WriteLayout::Data => buffer.put_u8(self.data as u8),
            WriteLayout::Register => {
                buffer.put_u8(self.addr as u8);
                buffer.put_u8(self.data as u8);
            }
            WriteLayout::IndexedRegister => {
                buffer.put_u8(self.addr as u8 | bit7(self.index));
                buffer.put_u8(self.data as u8);
            }
            WriteLayout::Address16Le => {
                buffer.put_u16_le(self.addr | bit15(self.index));
                buffer.put_u8(self.data as u8);
            }
            WriteLayout::ChannelWord16Le => {
                buffer.put_u8(self.addr as u8 | bit7(self.index));
                buffer.put_u16_le(self.data);
            }
            WriteLayout::Word16BeRegister => {
                buffer.put_u16(self.data);
                buffer.put_u8(self.addr as u8);
            }
            WriteLayout::Address16Be => {
                buffer.put_u16(self.addr | bit15(self.index));
                buffer.put_u8(self.data as u8);
            }
            WriteLayout::PortRegister => {
                buffer.put_u8(self.port | bit7(self.index));
                buffer.put_u8(self.addr as u8);
                buffer.put_u8(self.data as u8);
            }
            WriteLayout::RegisterWord16Be => {
                buffer.put_u8(self.addr as u8 | bit7(self.index));
                buffer.put_u16(self.data);
            }
            WriteLayout::Address16BeWord16Be => {
                buffer.put_u16(self.addr | bit15(self.index));
                buffer.put_u16(self.data);
            }
        }
        Ok(())
    }
}

impl VgmWriter for Command {
    fn to_bytes(&self, buffer: &mut BytesMut) -> VgmResult<()> {
        self.validate()?;
        match self {
            Command::WriteData(write) => return write.to_bytes(buffer),
            Command::End
            | Command::WaitNibble { .. }
            | Command::Wait735
            | Command::Wait882
            | Command::Write2A { .. } => buffer.put_u8(self.opcode()),
            Command::WaitWord { count } => {
                buffer.put_u8(OP_WAIT_WORD);
                buffer.put_u16_le(*count);
            }
            Command::DataBlock(block) => {
                buffer.put_u8(OP_DATA_BLOCK);
                buffer.put_u8(COMPAT_MARKER);
                buffer.put_u8(block.block_type);
                buffer.put_u32_le(block.size_field());
                buffer.put_slice(&block.data);
            }
            Command::PcmRamWrite(write) => {
                buffer.put_u8(OP_PCM_RAM_WRITE);
                buffer.put_u8(COMPAT_MARKER);
                buffer.put_u8(write.chip_type);
                put_u24_le(buffer, write.read_offset);
                put_u24_le(buffer, write.write_offset);
                put_u24_le(buffer, write.write_size);
            }
            Command::SetupStream {
                stream_id,
                chip_type,
                port,
                channel,
            } => {
                buffer.put_slice(&[OP_SETUP_STREAM, *stream_id, *chip_type, *port, *channel]);
            }
            Command::SetStreamData {
                stream_id,
                data_bank_id,
                step_size,
                step_base,
            } => {
                buffer.put_slice(&[
                    OP_SET_STREAM_DATA,
                    *stream_id,
                    *data_bank_id,
                    *step_size,
                    *step_base,
                ]);
            }
            Command::SetStreamFrequency {
                stream_id,
                frequency,
            } => {
                buffer.put_u8(OP_SET_STREAM_FREQUENCY);
                buffer.put_u8(*stream_id);
                buffer.put_u32_le(*frequency);
            }
            Command::StartStream {
                stream_id,
                offset,
                length_mode,
                data_length,
            } => {
                buffer.put_u8(OP_START_STREAM);
                buffer.put_u8(*stream_id);
                buffer.put_u32_le(*offset);
                buffer.put_u8(*length_mode);
                buffer.put_u32_le(*data_length);
            }
            Command::StopStream { stream_id } => {
                buffer.put_u8(OP_STOP_STREAM);
                buffer.put_u8(*stream_id);
            }
            Command::StartStreamFast {
                stream_id,
                block_id,
                flags,
            } => {
                buffer.put_u8(OP_START_STREAM_FAST);
                buffer.put_u8(*stream_id);
                buffer.put_u16_le(*block_id);
                buffer.put_u8(*flags);
            }
            Command::SeekPcm { offset } => {
                buffer.put_u8(OP_SEEK_PCM);
                buffer.put_u32_le(*offset);
            }
        }
        Ok(())
    }
}

impl Command {
    /// Encode into a fresh vector
    pub fn to_vec(&self) -> VgmResult<Vec<u8>> {
        let mut buffer = BytesMut::with_capacity(self.size());
        self.to_bytes(&mut buffer)?;
        Ok(buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VgmError;
    use crate::vgm_commands::parsing::parse_command;
    use proptest::prelude::*;

    fn encode(command: &Command) -> Vec<u8> {
        command.to_vec().unwrap()
    }

    #[test]
    fn test_wait_serialization() {
        assert_eq!(encode(&Command::WaitWord { count: 300 }), vec![0x61, 0x2C, 0x01]);
        assert_eq!(encode(&Command::Wait735), vec![0x62]);
        assert_eq!(encode(&Command::Wait882), vec![0x63]);
        assert_eq!(encode(&Command::WaitNibble { count: 1 }), vec![0x70]);
        assert_eq!(encode(&Command::WaitNibble { count: 16 }), vec![0x7F]);
        assert_eq!(encode(&Command::Write2A { count: 15 }), vec![0x8F]);
        assert_eq!(encode(&Command::End), vec![0x66]);
    }

    #[test]
    fn test_invalid_commands_write_nothing() {
        let mut buffer = BytesMut::new();
        buffer.put_u8(0xAA);
        let bad = Command::WaitNibble { count: 17 };
        assert!(matches!(bad.to_bytes(&mut buffer), Err(VgmError::InvalidRange { .. })));

        let bad = Command::WriteData(WriteData { opcode: 0xB4, index: 0, port: 0, addr: 0x100, data: 0 });
        assert!(bad.to_bytes(&mut buffer).is_err());
        assert_eq!(&buffer[..], &[0xAA]);
    }

    #[test]
    fn test_dual_chip_write_serialization() {
        let write = |opcode, index, port, addr, data| {
            encode(&Command::WriteData(WriteData::new(opcode, index, port, addr, data).unwrap()))
        };
        assert_eq!(write(0x50, 0, 0, 0, 0xAB), vec![0x50, 0xAB]);
        assert_eq!(write(0x30, 1, 0, 0, 0xCD), vec![0x30, 0xCD]);
        assert_eq!(write(0xA3, 1, 1, 0x2A, 0x80), vec![0xA3, 0x2A, 0x80]);
        assert_eq!(write(0xA0, 1, 0, 0x07, 0x3F), vec![0xA0, 0x87, 0x3F]);
        assert_eq!(write(0xC0, 1, 0, 0x1234, 0x55), vec![0xC0, 0x34, 0x92, 0x55]);
        assert_eq!(write(0xC3, 1, 0, 0x05, 0x1234), vec![0xC3, 0x85, 0x34, 0x12]);
        assert_eq!(write(0xC4, 0, 0, 0x07, 0x1234), vec![0xC4, 0x12, 0x34, 0x07]);
        assert_eq!(write(0xC5, 1, 0, 0x1234, 0x55), vec![0xC5, 0x92, 0x34, 0x55]);
        assert_eq!(write(0xD0, 1, 1, 0x20, 0x30), vec![0xD0, 0x81, 0x20, 0x30]);
        assert_eq!(write(0xD6, 0, 0, 0x05, 0x1234), vec![0xD6, 0x05, 0x12, 0x34]);
        assert_eq!(write(0xE1, 1, 0, 0x10, 0xABCD), vec![0xE1, 0x80, 0x10, 0xAB, 0xCD]);
    }

    #[test]
    fn test_block_and_stream_serialization() {
        let mut block = DataBlock::new(0x82, vec![1, 2, 3]);
        block.index = 1;
        assert_eq!(
            encode(&Command::DataBlock(block)),
            vec![0x67, 0x66, 0x82, 0x03, 0x00, 0x00, 0x80, 1, 2, 3]
        );
        assert_eq!(
            encode(&Command::PcmRamWrite(PcmRamWrite {
                chip_type: 0xC0,
                read_offset: 0x030201,
                write_offset: 0x060504,
                write_size: 0,
            })),
            vec![0x68, 0x66, 0xC0, 1, 2, 3, 4, 5, 6, 0, 0, 0]
        );
        assert_eq!(
            encode(&Command::StartStream { stream_id: 1, offset: 0x10, length_mode: 1, data_length: 0x20 }),
            vec![0x93, 0x01, 0x10, 0x00, 0x00, 0x00, 0x01, 0x20, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode(&Command::StartStreamFast { stream_id: 0, block_id: 0x0103, flags: 0x10 }),
            vec![0x95, 0x00, 0x03, 0x01, 0x10]
        );
    }

    fn any_command() -> impl Strategy<Value = Command> {
        let opcodes: Vec<u8> = crate::systems::OPCODE_CHIPS.keys().copied().collect();
        prop_oneof![
            Just(Command::End),
            Just(Command::Wait735),
            Just(Command::Wait882),
            any::<u16>().prop_map(|count| Command::WaitWord { count }),
            (1u8..=16).prop_map(|count| Command::WaitNibble { count }),
            (0u8..=15).prop_map(|count| Command::Write2A { count }),
            (prop::sample::select(opcodes), any::<u8>(), any::<u16>(), any::<u16>(), any::<u8>())
                .prop_filter_map("write fields out of range", |(opcode, index, addr, data, port)| {
                    let layout = WriteLayout::for_opcode(opcode)?;
                    let index = layout.implied_index(opcode).unwrap_or(index & 1);
                    let port = layout.implied_port(opcode).unwrap_or(port & layout.max_port());
                    WriteData::new(opcode, index, port, addr & layout.max_addr(), data & layout.max_data())
                        .ok()
                        .map(Command::WriteData)
                }),
            (any::<u8>(), 0u8..=1, prop::collection::vec(any::<u8>(), 0..32))
                .prop_map(|(block_type, index, data)| Command::DataBlock(DataBlock { block_type, index, data })),
            (any::<u8>(), any::<u32>(), any::<u8>(), any::<u32>()).prop_map(
                |(stream_id, offset, length_mode, data_length)| Command::StartStream {
                    stream_id,
                    offset,
                    length_mode,
                    data_length
                }
            ),
            any::<u32>().prop_map(|offset| Command::SeekPcm { offset }),
        ]
    }

    proptest! {
        #[test]
        fn test_encoded_size_matches_and_parses_back(command in any_command()) {
            let bytes = encode(&command);
            prop_assert_eq!(bytes.len(), command.size());
            prop_assert_eq!(parse_command(&bytes, 0).unwrap(), command);
        }
    }
}
