//! Correction mappings from scrambled codepoints back to real ones.

use std::{
    collections::BTreeMap,
    io::{Read, Write},
};

use serde::{Deserialize, Serialize};

use crate::{
    extract::{extract_bytes, ExtractError, FingerprintTable},
    font::JsonStyle,
};

/// Mapping from a codepoint used by a scrambled font to the codepoint the
/// reference font assigns to the same glyph.
///
/// Serializes as a JSON object with decimal string keys, sorted
/// numerically: `{"9731": 65, "9732": 66}`.
#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectionMapping {
    entries: BTreeMap<u32, u32>,
}

impl CorrectionMapping {
    /// Joins two fingerprint tables on their fingerprints.
    ///
    /// For each fingerprint present in both tables the result maps the
    /// obfuscated codepoint to the reference codepoint. Fingerprints known
    /// to only one side produce no entry.
    pub fn build(reference: &FingerprintTable, obfuscated: &FingerprintTable) -> Self {
        let entries = if obfuscated.len() <= reference.len() {
            obfuscated
                .iter()
                .filter_map(|(fp, from)| Some((from, reference.get(fp)?)))
                .collect()
        } else {
            reference
                .iter()
                .filter_map(|(fp, to)| Some((obfuscated.get(fp)?, to)))
                .collect()
        };
        let mapping = Self { entries };
        log::info!(
            "built {} corrections from {} reference and {} obfuscated glyphs",
            mapping.len(),
            reference.len(),
            obfuscated.len()
        );
        mapping
    }

    /// Returns the reference codepoint for an obfuscated one.
    pub fn get(&self, codepoint: u32) -> Option<u32> {
        self.entries.get(&codepoint).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over (obfuscated, reference) pairs in ascending
    /// order of the obfuscated codepoint.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.entries.iter().map(|(from, to)| (*from, *to))
    }

    /// Maps a single character, returning it unchanged when there is no
    /// correction for it.
    pub fn decode_char(&self, ch: char) -> char {
        self.get(ch as u32)
            .and_then(char::from_u32)
            .unwrap_or(ch)
    }

    /// Replaces every character that has a correction.
    ///
    /// This never fails: characters without a correction (or whose
    /// correction is not a valid scalar value) are passed through.
    pub fn decode(&self, text: &str) -> String {
        text.chars().map(|ch| self.decode_char(ch)).collect()
    }

    /// Reads a mapping from its JSON form.
    pub fn from_reader(reader: impl Read) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    /// Writes the mapping as JSON.
    pub fn to_writer(&self, writer: impl Write, style: JsonStyle) -> Result<(), serde_json::Error> {
        style.to_writer(writer, self)
    }
}

impl FromIterator<(u32, u32)> for CorrectionMapping {
    fn from_iter<T: IntoIterator<Item = (u32, u32)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Extracts both fonts, in parallel, and joins their tables.
///
/// An extraction failure on either side is returned before any join is
/// attempted; the reference error wins if both fail.
pub fn build_from_fonts(
    reference: &[u8],
    obfuscated: &[u8],
) -> Result<CorrectionMapping, ExtractError> {
    let (reference, obfuscated) = rayon::join(
        || extract_bytes(reference, 0),
        || extract_bytes(obfuscated, 0),
    );
    Ok(CorrectionMapping::build(&reference?, &obfuscated?))
}
