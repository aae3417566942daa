//! VGM Test Data Builders
//!
//! Produces raw VGM bytes field by field, independently of the crate's own
//! encoder, so decode and build can be checked against hand-laid files.

use flate2::{write::GzEncoder, Compression};
use std::io::Write;

/// One encoded command and the samples it waits
#[derive(Debug, Clone)]
struct RawCommand {
    bytes: Vec<u8>,
    samples: u32,
}

/// Main builder for creating VGM test files with fluent API
#[derive(Debug, Clone)]
pub struct VgmBuilder {
    header: HeaderBuilder,
    commands: CommandsBuilder,
    metadata: Option<MetadataBuilder>,
    extra_header: Option<Vec<u8>>,
}

impl Default for VgmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VgmBuilder {
    pub fn new() -> Self {
        Self {
            header: HeaderBuilder::default(),
            commands: CommandsBuilder::default(),
            metadata: None,
            extra_header: None,
        }
    }

    /// Set VGM version code, e.g. 0x171
    pub fn version(mut self, version: u32) -> Self {
        self.header.version = version;
        self
    }

    pub fn header<F>(mut self, f: F) -> Self
    where
        F: FnOnce(HeaderBuilder) -> HeaderBuilder,
    {
        self.header = f(self.header);
        self
    }

    pub fn commands<F>(mut self, f: F) -> Self
    where
        F: FnOnce(CommandsBuilder) -> CommandsBuilder,
    {
        self.commands = f(self.commands);
        self
    }

    pub fn metadata<F>(mut self, f: F) -> Self
    where
        F: FnOnce(MetadataBuilder) -> MetadataBuilder,
    {
        self.metadata = Some(f(self.metadata.unwrap_or_default()));
        self
    }

    /// Raw extra header block, placed right after the fixed header
    pub fn extra_header(mut self, block: Vec<u8>) -> Self {
        self.extra_header = Some(block);
        self
    }

    fn default_data_offset(&self) -> usize {
        let version = self.header.version;
        if let Some(block) = &self.extra_header {
            return self.extra_header_offset() + block.len();
        }
        match version {
            v if v < 0x151 => 0x40,
            v if v < 0x161 => 0x80,
            v if v < 0x171 => 0xC0,
            _ => 0x100,
        }
    }

    fn extra_header_offset(&self) -> usize {
        if self.header.version < 0x171 {
            0xC0
        } else {
            0x100
        }
    }

    /// Lay out header, extra header, commands and GD3 tag into one buffer.
    pub fn build_bytes(self) -> Vec<u8> {
        let data = if self.header.version < 0x150 {
            0x40
        } else {
            self.header.data_offset.unwrap_or_else(|| self.default_data_offset())
        };

        let stream: Vec<u8> = self
            .commands
            .commands
            .iter()
            .flat_map(|c| c.bytes.iter().copied())
            .collect();
        let total: u32 = self.commands.commands.iter().map(|c| c.samples).sum();
        let loop_point = self.commands.loop_at.map(|index| {
            let before: usize = self.commands.commands[..index]
                .iter()
                .map(|c| c.bytes.len())
                .sum();
            let samples: u32 = self.commands.commands[index..]
                .iter()
                .map(|c| c.samples)
                .sum();
            (data + before, samples)
        });

        let gd3 = self.metadata.as_ref().map(MetadataBuilder::to_bytes);
        let stream_end = data + stream.len();
        let eof = stream_end + gd3.as_ref().map_or(0, Vec::len);

        let mut buf = vec![0u8; eof];
        buf[0..4].copy_from_slice(b"Vgm ");
        put_u32(&mut buf, 0x04, (eof - 0x04) as u32);
        put_u32(&mut buf, 0x08, self.header.version);
        put_u32(&mut buf, 0x18, self.header.total_samples.unwrap_or(total));
        put_u32(&mut buf, 0x24, self.header.rate);
        if gd3.is_some() {
            put_u32(&mut buf, 0x14, (stream_end - 0x14) as u32);
        }
        if let Some((offset, samples)) = loop_point {
            put_u32(&mut buf, 0x1C, (offset - 0x1C) as u32);
            put_u32(&mut buf, 0x20, samples);
        }
        if self.header.version >= 0x150 {
            put_u32(&mut buf, 0x34, (data - 0x34) as u32);
        }
        if let Some(block) = &self.extra_header {
            let at = self.extra_header_offset();
            put_u32(&mut buf, 0xBC, (at - 0xBC) as u32);
            buf[at..at + block.len()].copy_from_slice(block);
        }
        for (position, bytes) in &self.header.fields {
            if position + bytes.len() <= data {
                buf[*position..position + bytes.len()].copy_from_slice(bytes);
            }
        }

        buf[data..stream_end].copy_from_slice(&stream);
        if let Some(tag) = gd3 {
            buf[stream_end..].copy_from_slice(&tag);
        }
        buf
    }

    /// Same file wrapped in gzip, as found in .vgz files
    pub fn build_gzip(self) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.build_bytes()).unwrap();
        encoder.finish().unwrap()
    }
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Fixed header fields beyond the offsets the builder derives itself
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    version: u32,
    rate: u32,
    data_offset: Option<usize>,
    total_samples: Option<u32>,
    fields: Vec<(usize, Vec<u8>)>,
}

impl Default for HeaderBuilder {
    fn default() -> Self {
        Self {
            version: 0x171,
            rate: 60,
            data_offset: None,
            total_samples: None,
            fields: Vec::new(),
        }
    }
}

impl HeaderBuilder {
    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Absolute data offset, ignored below version 1.50
    pub fn data_offset(mut self, offset: usize) -> Self {
        self.data_offset = Some(offset);
        self
    }

    /// Override the sample count derived from the commands
    pub fn total_samples(mut self, samples: u32) -> Self {
        self.total_samples = Some(samples);
        self
    }

    /// Raw 32-bit value at a header position; dropped if the header is too short to hold it
    pub fn u32_at(mut self, position: usize, value: u32) -> Self {
        self.fields.push((position, value.to_le_bytes().to_vec()));
        self
    }

    pub fn u8_at(mut self, position: usize, value: u8) -> Self {
        self.fields.push((position, vec![value]));
        self
    }

    pub fn psg_clock(self, clock: u32) -> Self {
        self.u32_at(0x0C, clock)
    }

    pub fn ym2413_clock(self, clock: u32) -> Self {
        self.u32_at(0x10, clock)
    }

    pub fn ym2612_clock(self, clock: u32) -> Self {
        self.u32_at(0x2C, clock)
    }

    pub fn ym2151_clock(self, clock: u32) -> Self {
        self.u32_at(0x30, clock)
    }

    pub fn ay8910(self, clock: u32, chip_type: u8, flags: u8) -> Self {
        self.u32_at(0x74, clock).u8_at(0x78, chip_type).u8_at(0x79, flags)
    }

    pub fn gameboy_clock(self, clock: u32) -> Self {
        self.u32_at(0x80, clock)
    }

    pub fn ga20_clock(self, clock: u32) -> Self {
        self.u32_at(0xE0, clock)
    }
}

/// Command stream laid out byte by byte
#[derive(Debug, Clone, Default)]
pub struct CommandsBuilder {
    commands: Vec<RawCommand>,
    loop_at: Option<usize>,
}

impl CommandsBuilder {
    pub fn raw(mut self, bytes: &[u8], samples: u32) -> Self {
        self.commands.push(RawCommand {
            bytes: bytes.to_vec(),
            samples,
        });
        self
    }

    pub fn wait(self, samples: u16) -> Self {
        let [lo, hi] = samples.to_le_bytes();
        self.raw(&[0x61, lo, hi], samples as u32)
    }

    pub fn wait_60hz(self) -> Self {
        self.raw(&[0x62], 735)
    }

    pub fn wait_50hz(self) -> Self {
        self.raw(&[0x63], 882)
    }

    /// Short wait of 1 to 16 samples
    pub fn wait_short(self, samples: u8) -> Self {
        self.raw(&[0x70 | (samples - 1)], samples as u32)
    }

    pub fn psg_write(self, value: u8) -> Self {
        self.raw(&[0x50, value], 0)
    }

    pub fn ym2612_write(self, port: u8, register: u8, value: u8) -> Self {
        self.raw(&[0x52 + port, register, value], 0)
    }

    /// YM2612 DAC write from the data bank followed by a short wait
    pub fn ym2612_dac(self, wait: u8) -> Self {
        self.raw(&[0x80 | wait], wait as u32)
    }

    pub fn data_block(self, block_type: u8, data: &[u8]) -> Self {
        let mut bytes = vec![0x67, 0x66, block_type];
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
        self.raw(&bytes, 0)
    }

    pub fn seek_pcm(self, offset: u32) -> Self {
        let mut bytes = vec![0xE0];
        bytes.extend_from_slice(&offset.to_le_bytes());
        self.raw(&bytes, 0)
    }

    pub fn start_stream(self, stream_id: u8, block_id: u16) -> Self {
        let [lo, hi] = block_id.to_le_bytes();
        self.raw(&[0x95, stream_id, lo, hi, 0x00], 0)
    }

    /// Loop back to the next command added
    pub fn loop_here(mut self) -> Self {
        self.loop_at = Some(self.commands.len());
        self
    }

    pub fn with_end(self) -> Self {
        self.raw(&[0x66], 0)
    }
}

/// GD3 tag strings in wire order
#[derive(Debug, Clone, Default)]
pub struct MetadataBuilder {
    fields: [String; 11],
}

impl MetadataBuilder {
    fn set(mut self, index: usize, value: &str) -> Self {
        self.fields[index] = value.to_string();
        self
    }

    pub fn english_track(self, value: &str) -> Self {
        self.set(0, value)
    }

    pub fn japanese_track(self, value: &str) -> Self {
        self.set(1, value)
    }

    pub fn english_game(self, value: &str) -> Self {
        self.set(2, value)
    }

    pub fn english_system(self, value: &str) -> Self {
        self.set(4, value)
    }

    pub fn english_composer(self, value: &str) -> Self {
        self.set(6, value)
    }

    pub fn release_date(self, value: &str) -> Self {
        self.set(8, value)
    }

    pub fn vgm_by(self, value: &str) -> Self {
        self.set(9, value)
    }

    pub fn notes(self, value: &str) -> Self {
        self.set(10, value)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for field in &self.fields {
            for unit in field.encode_utf16() {
                body.extend_from_slice(&unit.to_le_bytes());
            }
            body.extend_from_slice(&[0, 0]);
        }
        let mut out = b"Gd3 ".to_vec();
        out.extend_from_slice(&0x100u32.to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }
}

/// Canned files for common version layouts
pub struct VgmVersionGenerators;

impl VgmVersionGenerators {
    pub fn vgm_v100_basic() -> VgmBuilder {
        VgmBuilder::new()
            .version(0x100)
            .header(|h| h.psg_clock(3_579_545))
            .commands(|c| c.psg_write(0x9F).wait_60hz().with_end())
    }

    pub fn vgm_v150_genesis() -> VgmBuilder {
        VgmBuilder::new()
            .version(0x150)
            .header(|h| h.psg_clock(3_579_545).ym2612_clock(7_670_453))
            .commands(|c| {
                c.ym2612_write(0, 0x28, 0xF0)
                    .loop_here()
                    .wait(1000)
                    .psg_write(0x90)
                    .wait_short(5)
                    .with_end()
            })
            .metadata(|m| m.english_track("Title").english_game("Game"))
    }

    pub fn vgm_v161_gameboy() -> VgmBuilder {
        VgmBuilder::new()
            .version(0x161)
            .header(|h| h.gameboy_clock(4_194_304))
            .commands(|c| c.raw(&[0xB3, 0x12, 0x80], 0).wait_50hz().with_end())
    }

    pub fn vgm_v171_full() -> VgmBuilder {
        VgmBuilder::new()
            .version(0x171)
            .header(|h| {
                h.psg_clock(3_579_545)
                    .ym2612_clock(0x4000_0000 | 7_670_453)
                    .ay8910(1_789_772, 0x10, 0x01)
                    .ga20_clock(3_579_545)
            })
            .commands(|c| {
                c.data_block(0x00, &[0x80, 0x81, 0x82, 0x83])
                    .seek_pcm(0)
                    .loop_here()
                    .ym2612_dac(3)
                    .start_stream(0, 1)
                    .wait(300)
                    .with_end()
            })
            .metadata(|m| {
                m.english_track("Stage 1")
                    .japanese_track("ステージ1")
                    .english_game("Game")
                    .english_system("Sega Mega Drive")
                    .english_composer("Composer")
                    .release_date("1992")
                    .vgm_by("ripper")
                    .notes("test notes")
            })
    }
}
