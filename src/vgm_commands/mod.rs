//! VGM Commands Module
//!
//! Command kinds, their byte layouts, the per-kind parsers and writers, plain
//! field records, and the stream codec built on top of them.

pub mod commands;
pub mod parser;
pub mod parsing;
pub mod records;
pub mod serialization;

pub use commands::{Command, DataBlock, PcmRamWrite, WriteData, WriteLayout};
pub use parser::{parse_commands, parse_commands_with_config, write_commands, ParsedCommands};
pub use parsing::parse_command;
pub use records::CommandRecord;
