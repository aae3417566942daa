use crate::errors::{VgmError, VgmResult};
use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, BytesMut};
use flate2::read::GzDecoder;
use std::io::Read;

/// Gzip magic bytes (RFC 1952)
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// VGM magic bytes
pub const VGM_MAGIC: [u8; 4] = [0x56, 0x67, 0x6d, 0x20]; // "Vgm "

pub fn write_string_as_u16_bytes(buffer: &mut BytesMut, value: &str) {
    for unit in value.encode_utf16() {
        buffer.put_u16_le(unit);
    }
}

/// Number of UTF-16 code units needed to store `value`
pub fn utf16_len(value: &str) -> usize {
    value.encode_utf16().count()
}

/// Borrow `len` bytes at `offset`, failing with `TruncatedStream` past the end of `buf`.
pub fn take(buf: &[u8], offset: usize, len: usize) -> VgmResult<&[u8]> {
    match offset.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(&buf[offset..end]),
        _ => Err(VgmError::TruncatedStream {
            offset,
            needed: len,
            available: buf.len().saturating_sub(offset),
        }),
    }
}

pub fn read_u8_at(buf: &[u8], offset: usize) -> VgmResult<u8> {
    Ok(take(buf, offset, 1)?[0])
}

pub fn read_u16_le_at(buf: &[u8], offset: usize) -> VgmResult<u16> {
    Ok(LittleEndian::read_u16(take(buf, offset, 2)?))
}

pub fn read_u32_le_at(buf: &[u8], offset: usize) -> VgmResult<u32> {
    Ok(LittleEndian::read_u32(take(buf, offset, 4)?))
}

/// Mutable counterpart of [`take`] used by the fixed-position encoders.
pub fn take_mut(buf: &mut [u8], offset: usize, len: usize) -> VgmResult<&mut [u8]> {
    let available = buf.len().saturating_sub(offset);
    match offset.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(&mut buf[offset..end]),
        _ => Err(VgmError::TruncatedStream {
            offset,
            needed: len,
            available,
        }),
    }
}

pub fn write_u8_at(buf: &mut [u8], offset: usize, value: u8) -> VgmResult<()> {
    take_mut(buf, offset, 1)?[0] = value;
    Ok(())
}

pub fn write_u16_le_at(buf: &mut [u8], offset: usize, value: u16) -> VgmResult<()> {
    LittleEndian::write_u16(take_mut(buf, offset, 2)?, value);
    Ok(())
}

pub fn write_u32_le_at(buf: &mut [u8], offset: usize, value: u32) -> VgmResult<()> {
    LittleEndian::write_u32(take_mut(buf, offset, 4)?, value);
    Ok(())
}

/// Detect if data is gzipped by checking magic bytes
pub fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0..2] == GZIP_MAGIC
}

/// Detect if data is a VGM file by checking magic bytes
pub fn is_vgm(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..4] == VGM_MAGIC
}

/// Decompress gzipped data
pub fn decompress_gzip(compressed_data: &[u8]) -> VgmResult<Vec<u8>> {
    if !is_gzipped(compressed_data) {
        return Err(VgmError::Decompression {
            details: "data does not have valid gzip magic bytes".to_string(),
        });
    }

    let mut decoder = GzDecoder::new(compressed_data);
    let mut decompressed = Vec::new();

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| VgmError::Decompression {
            details: e.to_string(),
        })?;

    tracing::debug!(
        compressed = compressed_data.len(),
        decompressed = decompressed.len(),
        "inflated gzip transport"
    );

    Ok(decompressed)
}

/// Strip the gzip transport if present.
///
/// Plain input is returned unchanged; signature validation is left to the header codec.
pub fn detect_and_decompress(data: &[u8]) -> VgmResult<Vec<u8>> {
    if is_gzipped(data) {
        return decompress_gzip(data);
    }
    Ok(data.to_vec())
}
