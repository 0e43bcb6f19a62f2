//! Content based identity of glyph outlines.

use core::{fmt, str::FromStr};
use std::io::Write;

use data_encoding::HEXLOWER;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};

use crate::pen::OutlineProgram;

/// Length in bytes of a fingerprint digest.
pub const FINGERPRINT_LEN: usize = 20;

/// SHA-1 digest of the canonical serialization of an [`OutlineProgram`].
///
/// Two glyphs drawn with the same commands, points and order always have
/// the same fingerprint regardless of the codepoint the font assigns them.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Computes the fingerprint of the given outline program.
    pub fn of_outline(program: &OutlineProgram) -> Self {
        let mut hasher = HashWriter(Sha1::new());
        // writing into a hasher cannot fail
        let _ = write!(hasher, "{program}");
        Self(hasher.0.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

/// Streams formatted output straight into the digest.
struct HashWriter(Sha1);

impl Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// An error returned when parsing a fingerprint from text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseFingerprintError {
    /// Input was not 40 hex digits.
    InvalidLength(usize),
    /// Input contained a non hex digit.
    InvalidDigit,
}

impl fmt::Display for ParseFingerprintError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidLength(len) => write!(
                f,
                "expected {} hex digits, found {len}",
                FINGERPRINT_LEN * 2
            ),
            Self::InvalidDigit => write!(f, "fingerprint contains a non hex digit"),
        }
    }
}

impl std::error::Error for ParseFingerprintError {}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != FINGERPRINT_LEN * 2 {
            return Err(ParseFingerprintError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; FINGERPRINT_LEN];
        HEXLOWER
            .decode_mut(s.to_ascii_lowercase().as_bytes(), &mut bytes)
            .map_err(|_| ParseFingerprintError::InvalidDigit)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
