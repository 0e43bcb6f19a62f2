//! Extraction of glyph fingerprint tables from fonts.

use std::fmt;

use indexmap::{map::Entry, IndexMap};
use serde::{Deserialize, Serialize};
use skrifa::{
    instance::{LocationRef, Size},
    outline::{DrawError, DrawSettings},
    FontRef, GlyphId, MetadataProvider,
};

use crate::{
    container::{FontBlob, FontLoadError},
    fingerprint::Fingerprint,
    pen::OutlineProgram,
};

/// Mapping from glyph fingerprint to the codepoint a font assigns it.
///
/// Entries keep the order in which they were first inserted, which for an
/// extracted table is ascending codepoint order. When two codepoints share a
/// fingerprint only the first one is kept.
#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintTable {
    entries: IndexMap<Fingerprint, u32>,
}

impl FingerprintTable {
    /// Returns the codepoint recorded for the given fingerprint.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<u32> {
        self.entries.get(fingerprint).copied()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over (fingerprint, codepoint) pairs in insertion
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, u32)> + '_ {
        self.entries.iter().map(|(fp, cp)| (fp, *cp))
    }

    /// Inserts unless the fingerprint is already present.
    ///
    /// Returns the codepoint that was kept.
    fn insert_first(&mut self, fingerprint: Fingerprint, codepoint: u32) -> u32 {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => *entry.insert(codepoint),
        }
    }
}

/// Collects with first-write-wins semantics.
impl FromIterator<(Fingerprint, u32)> for FingerprintTable {
    fn from_iter<T: IntoIterator<Item = (Fingerprint, u32)>>(iter: T) -> Self {
        let mut table = Self::default();
        for (fingerprint, codepoint) in iter {
            table.insert_first(fingerprint, codepoint);
        }
        table
    }
}

/// Errors that abort the extraction of a fingerprint table.
#[derive(Debug)]
pub enum ExtractError {
    /// The font data could not be loaded.
    FontLoad(FontLoadError),
    /// The font has no usable Unicode character map.
    NoCharmap,
    /// A mapped glyph failed to draw.
    Draw {
        codepoint: u32,
        glyph_id: GlyphId,
        source: DrawError,
    },
}

impl From<FontLoadError> for ExtractError {
    fn from(e: FontLoadError) -> Self {
        Self::FontLoad(e)
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FontLoad(e) => write!(f, "failed to load font: {e}"),
            Self::NoCharmap => write!(f, "font has no Unicode character map"),
            Self::Draw {
                codepoint,
                glyph_id,
                source,
            } => write!(
                f,
                "failed to draw glyph {} for U+{codepoint:04X}: {source}",
                glyph_id.to_u32()
            ),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FontLoad(e) => Some(e),
            _ => None,
        }
    }
}

/// Builds the fingerprint table of a font.
///
/// Every codepoint of the font's preferred Unicode character map is visited
/// in ascending order. Glyphs without an outline, or whose outline has no
/// drawing commands (spaces, empty `.notdef`), are skipped. Glyphs are drawn
/// unscaled, unhinted and at the default variation location so the recorded
/// program is the raw design-unit outline.
///
/// Any failure aborts the whole table: a partial table would be
/// indistinguishable from glyphs that are legitimately absent.
pub fn extract(font: &FontRef) -> Result<FingerprintTable, ExtractError> {
    let charmap = font.charmap();
    if !charmap.has_map() {
        return Err(ExtractError::NoCharmap);
    }
    let outlines = font.outline_glyphs();
    let mut table = FingerprintTable::default();
    let mut program = OutlineProgram::new();
    let mut skipped = 0usize;
    let mut collisions = 0usize;
    for (codepoint, glyph_id) in charmap.mappings() {
        let Some(glyph) = outlines.get(glyph_id) else {
            skipped += 1;
            continue;
        };
        program.clear();
        glyph
            .draw(
                DrawSettings::unhinted(Size::unscaled(), LocationRef::default()),
                &mut program,
            )
            .map_err(|source| ExtractError::Draw {
                codepoint,
                glyph_id,
                source,
            })?;
        if program.is_empty() {
            skipped += 1;
            continue;
        }
        let kept = table.insert_first(Fingerprint::of_outline(&program), codepoint);
        if kept != codepoint {
            log::debug!("U+{codepoint:04X} has the same outline as U+{kept:04X}, skipping");
            collisions += 1;
        }
    }
    log::info!(
        "extracted {} fingerprints ({skipped} glyphs without outlines, {collisions} duplicate outlines)",
        table.len()
    );
    Ok(table)
}

/// Loads font data in any supported container and extracts the table of
/// the font at `index`.
pub fn extract_bytes(data: &[u8], index: u32) -> Result<FingerprintTable, ExtractError> {
    let blob = FontBlob::new(data)?;
    log::debug!("loaded {} font data ({} bytes)", blob.format(), data.len());
    let font = blob.font(index)?;
    extract(&font)
}
