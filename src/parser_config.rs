use crate::errors::{VgmError, VgmResult};
use crate::vgm_commands::commands::MAX_DATA_BLOCK_PAYLOAD;

/// Resource limits and checks applied while decoding a VGM file
///
/// The default accepts everything the format can express, so any valid file
/// decodes. [`ParserConfig::security_focused`] bounds what a hostile or
/// corrupt file can make the decoder allocate. `verify_round_trip`
/// additionally re-encodes every decoded file and fails the decode when the
/// bytes differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum number of commands in one stream
    pub max_commands: usize,

    /// Maximum payload of a single DataBlock (bytes)
    pub max_data_block_size: u32,

    /// Maximum payload of all DataBlocks in one file (bytes)
    pub max_total_data_block_memory: usize,

    /// Maximum declared GD3 body size (bytes)
    pub max_metadata_size: usize,

    /// Maximum number of chip clock entries allowed per extra header
    pub max_chip_clock_entries: u8,

    /// Maximum number of chip volume entries allowed per extra header
    pub max_chip_volume_entries: u8,

    /// Re-encode after decoding and compare against the input
    pub verify_round_trip: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_commands: usize::MAX,
            max_data_block_size: MAX_DATA_BLOCK_PAYLOAD as u32, // 31-bit size field
            max_total_data_block_memory: usize::MAX,
            max_metadata_size: u32::MAX as usize,
            max_chip_clock_entries: u8::MAX,
            max_chip_volume_entries: u8::MAX,
            verify_round_trip: false,
        }
    }
}

impl ParserConfig {
    /// Strict limits for untrusted input
    pub fn security_focused() -> Self {
        Self {
            max_commands: 100_000,
            max_data_block_size: 1024 * 1024,
            max_total_data_block_memory: 8 * 1024 * 1024,
            max_metadata_size: 64 * 1024,
            max_chip_clock_entries: 16,
            max_chip_volume_entries: 16,
            verify_round_trip: true,
        }
    }

    pub fn check_command_count(&self, count: usize) -> VgmResult<()> {
        if count > self.max_commands {
            return Err(VgmError::DataSizeExceedsLimit {
                field: "command_count".to_string(),
                size: count,
                limit: self.max_commands,
            });
        }
        Ok(())
    }

    pub fn check_data_block_size(&self, size: u32) -> VgmResult<()> {
        if size > self.max_data_block_size {
            return Err(VgmError::DataSizeExceedsLimit {
                field: "data_block_size".to_string(),
                size: size as usize,
                limit: self.max_data_block_size as usize,
            });
        }
        Ok(())
    }

    /// Check the declared GD3 size before the strings are decoded
    pub fn check_metadata_size(&self, size: usize) -> VgmResult<()> {
        if size > self.max_metadata_size {
            return Err(VgmError::DataSizeExceedsLimit {
                field: "metadata_size".to_string(),
                size,
                limit: self.max_metadata_size,
            });
        }
        Ok(())
    }

    pub fn check_chip_entries(&self, clock_entries: usize, volume_entries: usize) -> VgmResult<()> {
        if clock_entries > self.max_chip_clock_entries as usize {
            return Err(VgmError::DataSizeExceedsLimit {
                field: "chip_clock_entries".to_string(),
                size: clock_entries,
                limit: self.max_chip_clock_entries as usize,
            });
        }

        if volume_entries > self.max_chip_volume_entries as usize {
            return Err(VgmError::DataSizeExceedsLimit {
                field: "chip_volume_entries".to_string(),
                size: volume_entries,
                limit: self.max_chip_volume_entries as usize,
            });
        }

        Ok(())
    }
}

/// Running totals for one decode, checked against a [`ParserConfig`]
#[derive(Debug, Default)]
pub struct ResourceTracker {
    /// Commands parsed so far
    pub command_count: usize,

    /// Payload bytes of all DataBlocks parsed so far
    pub data_block_memory: usize,

    /// Number of DataBlocks encountered
    pub data_block_count: usize,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one more command
    pub fn track_command(&mut self, config: &ParserConfig) -> VgmResult<()> {
        self.command_count += 1;
        config.check_command_count(self.command_count)
    }

    /// Account for a DataBlock payload
    pub fn track_data_block(&mut self, config: &ParserConfig, size: u32) -> VgmResult<()> {
        config.check_data_block_size(size)?;

        let new_total = self.data_block_memory.saturating_add(size as usize);
        if new_total > config.max_total_data_block_memory {
            return Err(VgmError::DataSizeExceedsLimit {
                field: "total_data_block_memory".to_string(),
                size: new_total,
                limit: config.max_total_data_block_memory,
            });
        }

        self.data_block_memory = new_total;
        self.data_block_count += 1;

        Ok(())
    }

    pub fn get_usage_summary(&self) -> ResourceUsageSummary {
        ResourceUsageSummary {
            command_count: self.command_count,
            data_block_memory_mb: self.data_block_memory as f64 / (1024.0 * 1024.0),
            data_block_count: self.data_block_count,
        }
    }
}

/// Snapshot of a tracker, logged at the end of a decode
#[derive(Debug, Clone)]
pub struct ResourceUsageSummary {
    pub command_count: usize,
    pub data_block_memory_mb: f64,
    pub data_block_count: usize,
}

impl std::fmt::Display for ResourceUsageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Commands: {}, DataBlocks: {} ({:.1}MB)",
            self.command_count, self.data_block_count, self.data_block_memory_mb,
        )
    }
}
