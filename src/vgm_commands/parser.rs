//! VGM Command Stream Codec
//!
//! Parses a whole command stream with resource tracking, and writes one back.

use super::commands::Command;
use super::parsing::parse_command;
use crate::errors::VgmResult;
use crate::traits::VgmWriter;
use crate::{ParserConfig, ResourceTracker};
use bytes::BytesMut;

/// Result of parsing a command stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommands {
    pub commands: Vec<Command>,
    /// Index of the command starting at the loop offset, if one does
    pub loop_index: Option<usize>,
    /// Absolute offset just past the last parsed command
    pub end: usize,
}

/// Parse commands with the default configuration
pub fn parse_commands(buf: &[u8], start: usize, loop_offset: usize) -> VgmResult<ParsedCommands> {
    let config = ParserConfig::default();
    let mut tracker = ResourceTracker::new();
    parse_commands_with_config(buf, start, loop_offset, &config, &mut tracker)
}

/// Parse from `start` up to and including the first End command.
///
/// `loop_offset` is absolute, 0 for no loop. Running out of bytes before an End
/// command is a `TruncatedStream` error.
pub fn parse_commands_with_config(
    buf: &[u8],
    start: usize,
    loop_offset: usize,
    config: &ParserConfig,
    tracker: &mut ResourceTracker,
) -> VgmResult<ParsedCommands> {
    let mut commands = Vec::new();
    let mut loop_index = None;
    let mut position = start;

    loop {
        tracker.track_command(config)?;

        if loop_offset != 0 && position == loop_offset {
            loop_index = Some(commands.len());
        }

        let command = parse_command(buf, position)?;
        if let Command::DataBlock(block) = &command {
            tracker.track_data_block(config, block.data.len() as u32)?;
        }
        position += command.size();

        let end = command.is_end();
        commands.push(command);
        if end {
            break;
        }
    }

    tracing::debug!(
        start,
        end = position,
        commands = commands.len(),
        ?loop_index,
        "parsed command stream"
    );

    Ok(ParsedCommands {
        commands,
        loop_index,
        end: position,
    })
}

/// Write commands to byte buffer
pub fn write_commands(buffer: &mut BytesMut, commands: &[Command]) -> VgmResult<()> {
    for command in commands {
        command.to_bytes(buffer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VgmError;
    use crate::vgm_commands::commands::{DataBlock, WriteData};

    #[test]
    fn test_stops_at_first_end() {
        let buf = [0x61, 0x2C, 0x01, 0x66, 0x62, 0x66];
        let parsed = parse_commands(&buf, 0, 0).unwrap();
        assert_eq!(parsed.commands, vec![Command::WaitWord { count: 300 }, Command::End]);
        assert_eq!(parsed.end, 4);
        assert_eq!(parsed.loop_index, None);
    }

    #[test]
    fn test_loop_index_on_command_boundary() {
        // header bytes before the stream are skipped via `start`
        let buf = [0xFF, 0xFF, 0x62, 0x52, 0x28, 0x00, 0x63, 0x66];
        let parsed = parse_commands(&buf, 2, 6).unwrap();
        assert_eq!(parsed.loop_index, Some(2));
        assert_eq!(parsed.commands[2], Command::Wait882);

        // loop offset inside a command never matches
        let parsed = parse_commands(&buf, 2, 4).unwrap();
        assert_eq!(parsed.loop_index, None);
    }

    #[test]
    fn test_missing_end_is_truncated() {
        let buf = [0x62, 0x63];
        assert_eq!(
            parse_commands(&buf, 0, 0),
            Err(VgmError::TruncatedStream {
                offset: 2,
                needed: 1,
                available: 0
            })
        );
    }

    #[test]
    fn test_unrecognized_opcode_carries_offset() {
        let buf = [0x62, 0x62, 0x31, 0x00, 0x66];
        assert_eq!(
            parse_commands(&buf, 0, 0),
            Err(VgmError::UnrecognizedOpcode {
                opcode: 0x31,
                offset: 2
            })
        );
    }

    #[test]
    fn test_limits() {
        let config = ParserConfig {
            max_commands: 2,
            ..ParserConfig::default()
        };
        let mut tracker = ResourceTracker::new();
        let buf = [0x62, 0x62, 0x62, 0x66];
        assert!(matches!(
            parse_commands_with_config(&buf, 0, 0, &config, &mut tracker),
            Err(VgmError::DataSizeExceedsLimit { .. })
        ));

        let config = ParserConfig {
            max_data_block_size: 2,
            ..ParserConfig::default()
        };
        let mut tracker = ResourceTracker::new();
        let buf = [0x67, 0x66, 0x00, 0x03, 0x00, 0x00, 0x00, 1, 2, 3, 0x66];
        assert!(matches!(
            parse_commands_with_config(&buf, 0, 0, &config, &mut tracker),
            Err(VgmError::DataSizeExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_write_commands() {
        let commands = vec![
            Command::WriteData(WriteData::with_opcode(0x50, 0, 0x9F).unwrap()),
            Command::DataBlock(DataBlock::new(0x00, vec![0x80])),
            Command::WaitNibble { count: 2 },
            Command::End,
        ];
        let mut buffer = BytesMut::new();
        write_commands(&mut buffer, &commands).unwrap();
        assert_eq!(
            &buffer[..],
            &[0x50, 0x9F, 0x67, 0x66, 0x00, 0x01, 0x00, 0x00, 0x00, 0x80, 0x71, 0x66]
        );
        assert_eq!(parse_commands(&buffer, 0, 0).unwrap().commands, commands);
    }
}
