//! Recovery of text hidden behind codepoint-scrambled web fonts.
//!
//! Some sites render text with a font whose glyphs are ordinary but whose
//! character map has been shuffled, so the characters in the page source
//! are not the ones a reader sees. Because the outlines themselves are
//! left intact, a glyph can be identified by its shape alone:
//!
//! 1. [`extract`] draws every mapped glyph of a font and records a
//!    [`Fingerprint`] of its outline in a [`FingerprintTable`].
//! 2. [`CorrectionMapping::build`] joins the table of a scrambled font with
//!    the table of an unscrambled reference font.
//! 3. [`CorrectionMapping::decode`] and [`decode_markup`] substitute the
//!    recovered characters into text.
//!
//! The [`problem`] module applies all of this to scraped quiz payloads.

mod container;
mod error;
mod extract;
mod fingerprint;
mod font;
mod mapping;
mod markup;
mod pen;
pub mod problem;

#[cfg(test)]
mod testdata;

pub use container::{ContainerFormat, FontBlob, FontLoadError};
pub use error::Error;
pub use extract::{extract, extract_bytes, ExtractError, FingerprintTable};
pub use fingerprint::{Fingerprint, ParseFingerprintError, FINGERPRINT_LEN};
pub use font::{load_fingerprints, read_json, write_json, FontFile, JsonStyle};
pub use mapping::{build_from_fonts, CorrectionMapping};
pub use markup::{decode_markup, decode_references, to_plain_text, Marker};
pub use pen::{Command, OutlineProgram, Point};
