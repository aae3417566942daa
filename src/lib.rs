pub mod command_list;
pub mod errors;
pub mod header;
pub mod metadata;
pub mod parser_config;
pub mod systems;
pub mod traits;
pub mod utils;
pub mod vgm_commands;

pub use command_list::CommandList;
pub use errors::*;
pub use header::*;
pub use metadata::*;
pub use parser_config::*;
pub use systems::*;
pub use traits::*;
pub use vgm_commands::*;

use bytes::{Buf, Bytes, BytesMut};
use utils::{detect_and_decompress, read_u32_le_at, take_mut};

/// A decoded VGM file
///
/// Header scalars, chips, the optional extra header and GD3 tag are stored
/// directly; sample totals are derived from the command list. Every mutator
/// marks the container as modified, which makes the next [`VgmFile::build`]
/// recompute the offsets instead of checking the output against the decoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct VgmFile {
    raw: Option<Bytes>,
    version: Version,
    offsets: Offsets,
    rate: u32,
    loop_modifier: u8,
    loop_base: u8,
    volume_modifier: u8,
    chips: Chips,
    extra_header: Option<ExtraHeader>,
    gd3: Option<Gd3Tag>,
    commands: CommandList,
    /// Decoded loop offset, relative to the data offset, that starts no command
    unaligned_loop: Option<usize>,
    modified: bool,
}

impl Default for VgmFile {
    fn default() -> Self {
        Self::new()
    }
}

impl VgmFile {
    /// Empty version 1.71 file at 60 Hz with offsets computed for an empty stream.
    pub fn new() -> Self {
        VgmFile {
            raw: None,
            version: Version::default(),
            offsets: Offsets {
                data: V171_HEADER_SIZE,
                eof: V171_HEADER_SIZE,
                ..Offsets::default()
            },
            rate: 60,
            loop_modifier: 0,
            loop_base: 0,
            volume_modifier: 0,
            chips: Chips::new(),
            extra_header: None,
            gd3: None,
            commands: CommandList::new(),
            unaligned_loop: None,
            modified: true,
        }
    }

    /// Decode with explicit resource limits. `data` may be gzip-compressed.
    ///
    /// Nothing is returned unless every section decodes.
    pub fn from_bytes_with_config(data: &mut Bytes, config: ParserConfig) -> VgmResult<Self> {
        let buf = detect_and_decompress(&data[..])?;
        let mut tracker = ResourceTracker::new();
        let header = decode_header(&buf)?;

        let extra_header = match header.offsets.extra_header {
            0 => None,
            start if start + 4 <= buf.len() => {
                let extra = ExtraHeader::from_bytes(&mut Bytes::copy_from_slice(&buf[start..]))?;
                config.check_chip_entries(extra.clock_entry_count(), extra.volume_entry_count())?;
                Some(extra)
            }
            start => {
                tracing::warn!(offset = start, len = buf.len(), "extra header offset past end of file");
                None
            }
        };

        let gd3 = match header.offsets.gd3 {
            0 => None,
            start if start < buf.len() => {
                if let Ok(size) = read_u32_le_at(&buf, start + 8) {
                    config.check_metadata_size(size as usize)?;
                }
                Some(Gd3Tag::from_bytes(&mut Bytes::copy_from_slice(&buf[start..]))?)
            }
            start => {
                tracing::warn!(offset = start, len = buf.len(), "GD3 offset past end of file");
                None
            }
        };

        let parsed = parse_commands_with_config(
            &buf,
            header.offsets.data,
            header.offsets.loop_point,
            &config,
            &mut tracker,
        )?;
        let unaligned_loop = match (header.offsets.loop_point, parsed.loop_index) {
            (0, _) | (_, Some(_)) => None,
            (loop_point, None) => {
                let relative = loop_point.checked_sub(header.offsets.data);
                tracing::warn!(
                    loop_offset = loop_point,
                    kept = relative.is_some(),
                    "loop offset does not start a command"
                );
                relative
            }
        };
        let commands = CommandList::from_commands(parsed.commands, parsed.loop_index)?;

        if header.samples.total != commands.total_samples()
            || header.samples.loop_samples != commands.loop_samples()
        {
            tracing::warn!(
                declared_total = header.samples.total,
                counted_total = commands.total_samples(),
                declared_loop = header.samples.loop_samples,
                counted_loop = commands.loop_samples(),
                "header sample counts disagree with the command stream"
            );
        }
        let stream_end = header.offsets.data + commands.byte_length();
        if header.offsets.gd3 != 0 && header.offsets.gd3 != stream_end {
            tracing::warn!(
                gd3 = header.offsets.gd3,
                stream_end,
                "GD3 tag does not follow the command stream"
            );
        }

        tracing::debug!(
            version = %header.version,
            commands = commands.len(),
            stream_bytes = commands.byte_length(),
            usage = %tracker.get_usage_summary(),
            "decoded VGM file"
        );

        let file = VgmFile {
            raw: Some(Bytes::from(buf)),
            version: header.version,
            offsets: header.offsets,
            rate: header.rate,
            loop_modifier: header.loop_modifier,
            loop_base: header.loop_base,
            volume_modifier: header.volume_modifier,
            chips: header.chips,
            extra_header,
            gd3,
            commands,
            unaligned_loop,
            modified: false,
        };
        if config.verify_round_trip {
            file.verify_round_trip()?;
        }

        data.advance(data.len());
        Ok(file)
    }

    /// Replace the whole container with a decode of `data`. On error `self` is left untouched.
    pub fn update_from_data(&mut self, data: &[u8]) -> VgmResult<()> {
        self.update_from_data_with_config(data, ParserConfig::default())
    }

    pub fn update_from_data_with_config(
        &mut self,
        data: &[u8],
        config: ParserConfig,
    ) -> VgmResult<()> {
        let decoded = Self::from_bytes_with_config(&mut Bytes::copy_from_slice(data), config)?;
        *self = decoded;
        Ok(())
    }

    /// Bytes from the last decode or successful build
    pub fn raw(&self) -> Option<&Bytes> {
        self.raw.as_ref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
        self.modified = true;
    }

    pub fn offsets(&self) -> Offsets {
        self.offsets
    }

    pub fn samples(&self) -> Samples {
        Samples {
            total: self.commands.total_samples(),
            loop_samples: self.commands.loop_samples(),
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
        self.modified = true;
    }

    pub fn loop_modifier(&self) -> u8 {
        self.loop_modifier
    }

    pub fn set_loop_modifier(&mut self, value: u8) {
        self.loop_modifier = value;
        self.modified = true;
    }

    pub fn loop_base(&self) -> u8 {
        self.loop_base
    }

    pub fn set_loop_base(&mut self, value: u8) {
        self.loop_base = value;
        self.modified = true;
    }

    pub fn volume_modifier(&self) -> u8 {
        self.volume_modifier
    }

    pub fn set_volume_modifier(&mut self, value: u8) {
        self.volume_modifier = value;
        self.modified = true;
    }

    pub fn chips(&self) -> &Chips {
        &self.chips
    }

    pub fn chips_mut(&mut self) -> &mut Chips {
        self.modified = true;
        &mut self.chips
    }

    pub fn extra_header(&self) -> Option<&ExtraHeader> {
        self.extra_header.as_ref()
    }

    /// Offsets move with the extra header size; call [`VgmFile::recompute_offsets`] or build.
    pub fn set_extra_header(&mut self, extra_header: Option<ExtraHeader>) {
        self.extra_header = extra_header;
        self.modified = true;
    }

    pub fn gd3(&self) -> Option<&Gd3Tag> {
        self.gd3.as_ref()
    }

    pub fn gd3_mut(&mut self) -> Option<&mut Gd3Tag> {
        self.modified = true;
        self.gd3.as_mut()
    }

    pub fn set_gd3(&mut self, gd3: Option<Gd3Tag>) {
        self.gd3 = gd3;
        self.modified = true;
    }

    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    /// Loop offset from the start of the stream that was decoded without
    /// landing on a command. It moves with the data offset and is only
    /// written while the command list has no loop point.
    pub fn unaligned_loop_offset(&self) -> Option<usize> {
        self.unaligned_loop
    }

    pub fn clear_unaligned_loop(&mut self) {
        self.unaligned_loop = None;
        self.modified = true;
    }

    pub fn commands_mut(&mut self) -> &mut CommandList {
        self.modified = true;
        &mut self.commands
    }

    pub fn has_data_block(&self) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c, Command::DataBlock(_)))
    }

    pub fn has_pcm_write(&self) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c, Command::PcmRamWrite(_)))
    }

    /// Snapshot of the fixed header fields as they would be written
    pub fn header(&self) -> Header {
        Header {
            version: self.version,
            offsets: self.offsets,
            samples: self.samples(),
            rate: self.rate,
            loop_modifier: self.loop_modifier,
            loop_base: self.loop_base,
            volume_modifier: self.volume_modifier,
            chips: self.chips.clone(),
        }
    }

    /// Re-derive every offset from the version, extra header, stream length and GD3 size.
    ///
    /// The data offset never shrinks below its current value except for
    /// versions before 1.50, which have no data offset field.
    pub fn recompute_offsets(&mut self) -> VgmResult<()> {
        let extra_offset = match self.extra_header {
            Some(_) => minimum_extra_header_offset(self.version)?,
            None => 0,
        };
        let floor = minimum_header_size(self.version, self.offsets.data, self.extra_header.as_ref())?;
        let data = if self.version.code < 0x150 {
            LEGACY_HEADER_SIZE
        } else {
            self.offsets.data.max(floor)
        };

        let stream_end = data + self.commands.byte_length();
        if let Some(tag) = self.gd3.as_mut() {
            tag.sync_size();
        }
        let (gd3, eof) = match &self.gd3 {
            Some(tag) => (stream_end, stream_end + GD3_PREAMBLE_SIZE + tag.size as usize),
            None => (0, stream_end),
        };

        let offsets = Offsets {
            eof,
            gd3,
            loop_point: self
                .commands
                .loop_byte_offset()
                .or(self.unaligned_loop)
                .map_or(0, |offset| data + offset),
            data,
            extra_header: extra_offset,
        };
        if offsets != self.offsets {
            tracing::debug!(old = ?self.offsets, new = ?offsets, "recomputed offsets");
        }
        self.offsets = offsets;
        Ok(())
    }

    /// Encode the current state at the current offsets.
    fn encode(&self) -> VgmResult<Vec<u8>> {
        let header = self.header();
        let offsets = self.offsets;

        let mut stream = BytesMut::with_capacity(self.commands.byte_length());
        write_commands(&mut stream, self.commands.as_slice())?;

        let mut extra = BytesMut::new();
        if let Some(extra_header) = &self.extra_header {
            if offsets.extra_header != 0 {
                extra_header.to_bytes(&mut extra)?;
            }
        }

        let mut tag = BytesMut::new();
        if let Some(gd3) = &self.gd3 {
            if offsets.gd3 != 0 {
                gd3.to_bytes(&mut tag)?;
            }
        }

        let size = [
            offsets.eof,
            offsets.data + stream.len(),
            offsets.extra_header + extra.len(),
            offsets.gd3 + tag.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or_default();

        let mut out = vec![0u8; size];
        encode_header(&mut out, &header)?;
        if !extra.is_empty() {
            take_mut(&mut out, offsets.extra_header, extra.len())?.copy_from_slice(&extra);
        }
        take_mut(&mut out, offsets.data, stream.len())?.copy_from_slice(&stream);
        if !tag.is_empty() {
            take_mut(&mut out, offsets.gd3, tag.len())?.copy_from_slice(&tag);
        }
        Ok(out)
    }

    /// Encode the container into a fresh buffer.
    ///
    /// A modified container has its offsets recomputed first. An unmodified
    /// one that came from decoded bytes must reproduce them exactly, otherwise
    /// the build fails with `RoundTripMismatch` at the first differing offset.
    pub fn build(&mut self) -> VgmResult<Bytes> {
        if self.modified {
            self.recompute_offsets()?;
        }
        let out = self.encode()?;
        if !self.modified {
            if let Some(raw) = &self.raw {
                compare(raw, &out)?;
            }
        }

        tracing::debug!(
            size = out.len(),
            commands = self.commands.len(),
            modified = self.modified,
            "built VGM file"
        );
        let out = Bytes::from(out);
        self.raw = Some(out.clone());
        self.modified = false;
        Ok(out)
    }

    /// Check that encoding the current state reproduces the decoded bytes.
    ///
    /// Passes trivially for a container that was never decoded or built.
    pub fn verify_round_trip(&self) -> VgmResult<()> {
        match &self.raw {
            Some(raw) => compare(raw, &self.encode()?),
            None => Ok(()),
        }
    }
}

fn compare(expected: &[u8], found: &[u8]) -> VgmResult<()> {
    let first_difference = expected
        .iter()
        .zip(found)
        .position(|(a, b)| a != b)
        .or_else(|| (expected.len() != found.len()).then(|| expected.len().min(found.len())));
    match first_difference {
        Some(offset) => {
            tracing::warn!(offset, "rebuilt bytes differ from the decoded input");
            Err(VgmError::RoundTripMismatch {
                offset,
                expected: expected.get(offset).copied(),
                found: found.get(offset).copied(),
            })
        }
        None => Ok(()),
    }
}

impl VgmParser for VgmFile {
    fn from_bytes(data: &mut Bytes) -> VgmResult<Self> {
        Self::from_bytes_with_config(data, ParserConfig::default())
    }
}

impl VgmWriter for VgmFile {
    /// Appends the current state without recomputing offsets or checking the round trip.
    fn to_bytes(&self, buffer: &mut BytesMut) -> VgmResult<()> {
        buffer.extend_from_slice(&self.encode()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// v1.71 file: data at 0x100, WaitWord 300 then End, no GD3
    fn minimal_file() -> Vec<u8> {
        let mut buf = vec![0u8; 0x104];
        buf[0..4].copy_from_slice(b"Vgm ");
        buf[0x04..0x08].copy_from_slice(&0x100u32.to_le_bytes());
        buf[0x08..0x0C].copy_from_slice(&0x171u32.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&300u32.to_le_bytes());
        buf[0x34..0x38].copy_from_slice(&0xCCu32.to_le_bytes());
        buf[0x100..0x104].copy_from_slice(&[0x61, 0x2C, 0x01, 0x66]);
        buf
    }

    #[test]
    fn test_decode_minimal_file() {
        let vgm = VgmFile::from_bytes(&mut Bytes::from(minimal_file())).unwrap();
        assert_eq!(vgm.version().code, 0x171);
        assert_eq!(vgm.offsets().data, 0x100);
        assert_eq!(vgm.offsets().eof, 0x104);
        assert_eq!(
            vgm.commands().as_slice(),
            &[Command::WaitWord { count: 300 }, Command::End]
        );
        assert_eq!(vgm.samples().total, 300);
        assert!(!vgm.is_modified());
    }

    #[test]
    fn test_unmodified_build_is_identical() {
        let original = minimal_file();
        let mut vgm = VgmFile::from_bytes(&mut Bytes::from(original.clone())).unwrap();
        let built = vgm.build().unwrap();
        assert_eq!(&built[..], &original[..]);
        assert!(vgm.verify_round_trip().is_ok());
    }

    #[test]
    fn test_mismatch_is_reported() {
        let mut original = minimal_file();
        // wrong declared total, rebuilt from the stream as 300
        original[0x18] = 0x2D;
        let mut vgm = VgmFile::from_bytes(&mut Bytes::from(original)).unwrap();
        match vgm.build() {
            Err(VgmError::RoundTripMismatch {
                offset,
                expected,
                found,
            }) => {
                assert_eq!(offset, 0x18);
                assert_eq!(expected, Some(0x2D));
                assert_eq!(found, Some(0x2C));
            }
            other => panic!("expected round-trip mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_on_decode() {
        let mut original = minimal_file();
        original[0x18] = 0x2D;
        let result =
            VgmFile::from_bytes_with_config(&mut Bytes::from(original), ParserConfig::security_focused());
        assert!(matches!(result, Err(VgmError::RoundTripMismatch { .. })));
    }

    #[test]
    fn test_new_file_offsets() {
        let mut vgm = VgmFile::new();
        assert_eq!(vgm.version().code, 0x171);
        assert_eq!(vgm.rate(), 60);
        assert_eq!(vgm.offsets().data, 0x100);
        assert_eq!(vgm.offsets().eof, 0x100);
        let initial = vgm.offsets();
        vgm.recompute_offsets().unwrap();
        assert_eq!(vgm.offsets(), initial);

        vgm.commands_mut().push(Command::Wait735);
        vgm.commands_mut().push(Command::End);
        let built = vgm.build().unwrap();
        assert_eq!(built.len(), 0x102);
        assert_eq!(&built[0x100..], &[0x62, 0x66]);
        assert_eq!(read_u32_le_at(&built, 0x18).unwrap(), 735);
        assert!(!vgm.is_modified());
    }

    #[test]
    fn test_unaligned_loop_follows_data_offset() {
        let mut original = minimal_file();
        // 0x101 is inside the WaitWord
        original[0x1C..0x20].copy_from_slice(&(0x101u32 - 0x1C).to_le_bytes());
        let mut vgm = VgmFile::from_bytes(&mut Bytes::from(original.clone())).unwrap();
        assert_eq!(vgm.commands().loop_index(), None);
        assert_eq!(vgm.unaligned_loop_offset(), Some(1));
        assert_eq!(&vgm.build().unwrap()[..], &original[..]);

        vgm.set_extra_header(Some(ExtraHeader::new(None, None)));
        vgm.build().unwrap();
        assert!(vgm.offsets().data > 0x100);
        assert_eq!(vgm.offsets().loop_point, vgm.offsets().data + 1);

        vgm.commands_mut().set_loop_index(Some(1)).unwrap();
        vgm.recompute_offsets().unwrap();
        assert_eq!(vgm.offsets().loop_point, vgm.offsets().data + 3);

        vgm.commands_mut().set_loop_index(None).unwrap();
        vgm.clear_unaligned_loop();
        vgm.recompute_offsets().unwrap();
        assert_eq!(vgm.offsets().loop_point, 0);
    }

    #[test]
    fn test_failed_update_leaves_container() {
        let mut vgm = VgmFile::from_bytes(&mut Bytes::from(minimal_file())).unwrap();
        let before = vgm.clone();
        assert!(matches!(
            vgm.update_from_data(b"Nope this is not a vgm file at all"),
            Err(VgmError::Format { .. })
        ));
        assert_eq!(vgm, before);
    }

    #[test]
    fn test_extra_header_needs_v170() {
        let mut vgm = VgmFile::new();
        vgm.set_version(Version::new(0x161));
        vgm.set_extra_header(Some(ExtraHeader::new(None, None)));
        assert!(matches!(
            vgm.recompute_offsets(),
            Err(VgmError::FeatureNotSupported { .. })
        ));
    }

    #[test]
    fn test_scalar_setters_and_gd3() {
        let mut vgm = VgmFile::from_bytes(&mut Bytes::from(minimal_file())).unwrap();
        vgm.set_rate(50);
        vgm.set_volume_modifier(0x10);
        vgm.set_loop_base(0x02);
        vgm.set_loop_modifier(0x20);
        vgm.set_gd3(Some(Gd3Tag::empty()));
        assert!(vgm.is_modified());

        let built = vgm.build().unwrap();
        assert_eq!(read_u32_le_at(&built, 0x24).unwrap(), 50);
        assert_eq!(&built[0x7C..0x80], &[0x10, 0x00, 0x02, 0x20]);
        assert_eq!(vgm.offsets().gd3, 0x104);
        assert_eq!(vgm.offsets().eof, 0x104 + 12 + 22);
        assert_eq!(built.len(), vgm.offsets().eof);

        let again = VgmFile::from_bytes(&mut built.clone()).unwrap();
        assert_eq!(again.rate(), 50);
        assert_eq!(again.loop_modifier(), 0x20);
        assert_eq!(again.gd3(), Some(&Gd3Tag::empty()));
    }

    #[test]
    fn test_writer_appends() {
        let vgm = VgmFile::from_bytes(&mut Bytes::from(minimal_file())).unwrap();
        let mut buffer = BytesMut::from(&b"xx"[..]);
        vgm.to_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[2..], &minimal_file()[..]);
    }
}
