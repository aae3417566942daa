use crate::errors::VgmResult;
use bytes::{Bytes, BytesMut};

/// Decode a section of a VGM file from a buffer positioned at the start of that section.
pub trait VgmParser {
    fn from_bytes(data: &mut Bytes) -> VgmResult<Self>
    where
        Self: Sized;
}

/// Append the wire representation of a value to `buffer`.
pub trait VgmWriter {
    fn to_bytes(&self, buffer: &mut BytesMut) -> VgmResult<()>;
}
