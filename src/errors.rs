use std::fmt;
use thiserror::Error;

/// Error type for every VGM decode, encode and mutation operation
///
/// Each variant carries enough context to locate the problem in the input buffer
/// or in the offending command record, plus a machine-readable error code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VgmError {
    // ========== FORMAT ERRORS (2000-2099) ==========
    /// Bad file signature or structurally impossible container
    #[error("Invalid VGM data: {reason} at offset {offset}")]
    Format { reason: String, offset: usize },

    /// Gzip transport could not be inflated
    #[error("Failed to decompress gzip data: {details}")]
    Decompression { details: String },

    // ========== COMMAND ERRORS (4000-4099) ==========
    /// No command variant accepts the byte at this position
    #[error("Unrecognized command opcode 0x{opcode:02X} at offset {offset}")]
    UnrecognizedOpcode { opcode: u8, offset: usize },

    /// The command stream ran past the end of the buffer
    #[error("Truncated command stream at offset {offset}: needed {needed} bytes, only {available} available")]
    TruncatedStream {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A command record omitted a field its variant requires
    #[error("Missing field '{field}' for {command} command")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    /// A value does not fit the wire representation of its field
    #[error("Value {value} out of range for {field}: expected {min}..={max}")]
    InvalidRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    // ========== VERSION COMPATIBILITY ERRORS (5000-5099) ==========
    /// Feature not representable in this VGM version
    #[error("Feature '{feature}' not supported in VGM version 0x{version:03X}: requires version 0x{min_version:03X} or higher")]
    FeatureNotSupported {
        feature: String,
        version: u32,
        min_version: u32,
    },

    // ========== RESOURCE ERRORS (6000-6099) ==========
    /// Data size exceeds configured limits
    #[error("Data size exceeds limit for {field}: {size} (limit: {limit})")]
    DataSizeExceedsLimit {
        field: String,
        size: usize,
        limit: usize,
    },

    // ========== ROUND-TRIP ERRORS (7000-7099) ==========
    /// Re-encoding an unmodified container did not reproduce the decoded bytes
    #[error("Round-trip mismatch at offset 0x{offset:X}: original {expected:?}, rebuilt {found:?}")]
    RoundTripMismatch {
        offset: usize,
        expected: Option<u8>,
        found: Option<u8>,
    },
}

impl VgmError {
    /// Get the error code for machine-readable processing
    pub fn code(&self) -> u16 {
        match self {
            Self::Format { .. } => 2001,
            Self::Decompression { .. } => 2002,

            Self::UnrecognizedOpcode { .. } => 4001,
            Self::TruncatedStream { .. } => 4002,
            Self::MissingField { .. } => 4003,
            Self::InvalidRange { .. } => 4004,

            Self::FeatureNotSupported { .. } => 5001,

            Self::DataSizeExceedsLimit { .. } => 6001,

            Self::RoundTripMismatch { .. } => 7001,
        }
    }

    /// Get the error category for grouping related errors
    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            2000..=2099 => ErrorCategory::FormatValidation,
            4000..=4099 => ErrorCategory::CommandParsing,
            5000..=5099 => ErrorCategory::VersionCompatibility,
            6000..=6099 => ErrorCategory::MemoryResource,
            7000..=7099 => ErrorCategory::RoundTrip,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether the caller can fix the input and retry the same operation
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::MissingField { .. }
            | Self::InvalidRange { .. }
            | Self::FeatureNotSupported { .. } => true,

            Self::Format { .. }
            | Self::Decompression { .. }
            | Self::UnrecognizedOpcode { .. }
            | Self::TruncatedStream { .. } => false,

            _ => false,
        }
    }

    /// Get suggested action for handling this error
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Format { .. } => "Verify this is a valid VGM file",
            Self::Decompression { .. } => "The gzip container is damaged, re-export the VGZ file",
            Self::UnrecognizedOpcode { .. } => "File may use commands from a newer VGM specification",
            Self::TruncatedStream { .. } => "File appears to be truncated or is missing its end command",
            Self::MissingField { .. } => "Supply the missing field in the command record",
            Self::InvalidRange { .. } => "Clamp the value to the range the field can encode",
            Self::FeatureNotSupported { .. } => "Raise the file version before using this feature",
            Self::RoundTripMismatch { .. } => "Report the file, the encoder lost information",
            _ => "Check file integrity and VGM specification compliance",
        }
    }
}

/// Error categories for grouping related error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    FormatValidation,
    CommandParsing,
    VersionCompatibility,
    MemoryResource,
    RoundTrip,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormatValidation => write!(f, "Format Validation"),
            Self::CommandParsing => write!(f, "Command Parsing"),
            Self::VersionCompatibility => write!(f, "Version Compatibility"),
            Self::MemoryResource => write!(f, "Memory/Resource"),
            Self::RoundTrip => write!(f, "Round Trip"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result type alias for VGM operations
pub type VgmResult<T> = Result<T, VgmError>;

/// Shorthand for range failures on fields with a fixed bit width
pub(crate) fn check_range(field: &'static str, value: u64, max: u64) -> VgmResult<()> {
    check_range_between(field, value, 0, max)
}

pub(crate) fn check_range_between(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> VgmResult<()> {
    if value < min || value > max {
        return Err(VgmError::InvalidRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
