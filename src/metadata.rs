use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{check_range, VgmResult},
    traits::{VgmParser, VgmWriter},
    utils::{read_u32_le_at, utf16_len, write_string_as_u16_bytes},
};

/// "Gd3 " read as a little-endian u32
pub const GD3_IDENT: u32 = 0x20336447;
pub const GD3_DEFAULT_VERSION: u32 = 0x100;
/// Size of the magic, version and size fields preceding the strings
pub const GD3_PREAMBLE_SIZE: usize = 12;
const GD3_FIELD_COUNT: usize = 11;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gd3LocaleData {
    pub track_title: String,
    pub game_name: String,
    pub system: String,
    pub composer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gd3Tag {
    pub version: u32,
    /// Declared body size in bytes, kept as read so unmodified tags re-encode verbatim
    pub size: u32,
    pub english: Gd3LocaleData,
    pub japanese: Gd3LocaleData,
    pub release_date: String,
    pub vgm_by: String,
    pub notes: String,
}

impl Default for Gd3Tag {
    fn default() -> Self {
        Self::empty()
    }
}

impl Gd3Tag {
    /// Tag with every field empty; the declared size covers the 11 terminators.
    pub fn empty() -> Self {
        Self {
            version: GD3_DEFAULT_VERSION,
            size: (GD3_FIELD_COUNT * 2) as u32,
            english: Gd3LocaleData::default(),
            japanese: Gd3LocaleData::default(),
            release_date: String::new(),
            vgm_by: String::new(),
            notes: String::new(),
        }
    }

    /// Fields in wire order
    fn fields(&self) -> [&str; GD3_FIELD_COUNT] {
        [
            &self.english.track_title,
            &self.japanese.track_title,
            &self.english.game_name,
            &self.japanese.game_name,
            &self.english.system,
            &self.japanese.system,
            &self.english.composer,
            &self.japanese.composer,
            &self.release_date,
            &self.vgm_by,
            &self.notes,
        ]
    }

    /// Body size implied by the current strings, terminators included
    pub fn body_size(&self) -> usize {
        let units: usize = self.fields().iter().map(|f| utf16_len(f)).sum();
        (units + GD3_FIELD_COUNT) * 2
    }

    /// Bring the declared size in line with the strings
    pub fn sync_size(&mut self) {
        self.size = self.body_size() as u32;
    }
}

const FIELD_NAMES: [&str; GD3_FIELD_COUNT] = [
    "track_title",
    "track_title_jp",
    "game_name",
    "game_name_jp",
    "system",
    "system_jp",
    "composer",
    "composer_jp",
    "release_date",
    "vgm_by",
    "notes",
];

impl VgmParser for Gd3Tag {
    /// `data` starts at the tag. A missing signature yields [`Gd3Tag::empty`].
    fn from_bytes(data: &mut Bytes) -> VgmResult<Self> {
        let buf: &[u8] = data;
        match read_u32_le_at(buf, 0x00) {
            Ok(GD3_IDENT) => {}
            _ => {
                tracing::warn!(len = buf.len(), "GD3 signature missing, using an empty tag");
                return Ok(Gd3Tag::empty());
            }
        }

        let version = read_u32_le_at(buf, 0x04)?;
        let size = read_u32_le_at(buf, 0x08)?;

        let body_end = GD3_PREAMBLE_SIZE
            .saturating_add(size as usize)
            .min(buf.len());
        let body = &buf[GD3_PREAMBLE_SIZE.min(body_end)..body_end];

        let mut texts: Vec<String> = Vec::with_capacity(GD3_FIELD_COUNT);
        let mut current: Vec<u16> = vec![];
        for unit in body
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        {
            if texts.len() == GD3_FIELD_COUNT {
                break;
            }
            if unit == 0 {
                let text = String::from_utf16(&current).unwrap_or_else(|e| {
                    tracing::warn!(field = FIELD_NAMES[texts.len()], error = %e, "invalid UTF-16 in GD3 string");
                    String::from_utf16_lossy(&current)
                });
                texts.push(text);
                current.clear();
                continue;
            }
            current.push(unit);
        }
        if texts.len() < GD3_FIELD_COUNT {
            tracing::debug!(found = texts.len(), "GD3 tag has fewer than 11 strings");
        }

        let mut texts = texts.into_iter();
        let mut next = || texts.next().unwrap_or_default();
        let (track, track_jp) = (next(), next());
        let (game, game_jp) = (next(), next());
        let (system, system_jp) = (next(), next());
        let (composer, composer_jp) = (next(), next());

        Ok(Gd3Tag {
            version,
            size,
            english: Gd3LocaleData {
                track_title: track,
                game_name: game,
                system,
                composer,
            },
            japanese: Gd3LocaleData {
                track_title: track_jp,
                game_name: game_jp,
                system: system_jp,
                composer: composer_jp,
            },
            release_date: next(),
            vgm_by: next(),
            notes: next(),
        })
    }
}

impl VgmWriter for Gd3Tag {
    fn to_bytes(&self, buffer: &mut BytesMut) -> VgmResult<()> {
        check_range("gd3.size", self.body_size() as u64, u32::MAX as u64)?;

        buffer.put_u32_le(GD3_IDENT);
        buffer.put_u32_le(self.version);
        buffer.put_u32_le(self.size);

        // strings and terminators
        for field in self.fields() {
            write_string_as_u16_bytes(buffer, field);
            buffer.put_u16_le(0);
        }
        Ok(())
    }
}
