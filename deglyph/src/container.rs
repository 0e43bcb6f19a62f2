//! Unwrapping of font containers into parseable sfnt data.
//!
//! Reference fonts are usually installed desktop fonts (TrueType, OpenType
//! or a collection) while the scrambled fonts are served as WOFF. Both end
//! up as plain sfnt bytes that [`skrifa`] can read.

use std::{borrow::Cow, fmt, io::Read};

use flate2::read::ZlibDecoder;
use skrifa::{
    raw::{FontData, ReadError},
    FontRef,
};
use write_fonts::{types::Tag, FontBuilder};

const WOFF_HEADER_LEN: usize = 44;
const WOFF_TABLE_RECORD_LEN: usize = 20;

/// The kinds of font container we know how to recognise.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ContainerFormat {
    /// A single TrueType or OpenType font.
    Sfnt,
    /// A TrueType/OpenType collection.
    Collection,
    /// WOFF 1.0.
    Woff,
    /// WOFF 2.0, recognised but not decoded.
    Woff2,
}

impl ContainerFormat {
    /// Determines the container format from the leading signature.
    pub fn sniff(data: &[u8]) -> Result<Self, FontLoadError> {
        let signature = FontData::new(data)
            .read_at::<u32>(0)
            .map_err(|_| FontLoadError::Truncated)?;
        match &signature.to_be_bytes() {
            [0x00, 0x01, 0x00, 0x00] | b"OTTO" | b"true" => Ok(Self::Sfnt),
            b"ttcf" => Ok(Self::Collection),
            b"wOFF" => Ok(Self::Woff),
            b"wOF2" => Ok(Self::Woff2),
            _ => Err(FontLoadError::UnknownFormat(signature)),
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sfnt => "sfnt",
            Self::Collection => "font collection",
            Self::Woff => "WOFF",
            Self::Woff2 => "WOFF2",
        };
        f.write_str(name)
    }
}

/// Errors that may occur when loading font data.
#[derive(Debug)]
pub enum FontLoadError {
    /// The data is too short to contain a signature.
    Truncated,
    /// The leading signature is not a known font container.
    UnknownFormat(u32),
    /// WOFF2 data requires table transforms that are not supported.
    Woff2Unsupported,
    /// The WOFF header or table directory is malformed.
    MalformedWoff(&'static str),
    /// A compressed WOFF table failed to inflate.
    Inflate { tag: Tag, source: std::io::Error },
    /// An inflated WOFF table did not have the declared length.
    TableLength { tag: Tag, expected: u32, actual: usize },
    /// The sfnt data could not be parsed.
    Read(ReadError),
}

impl From<ReadError> for FontLoadError {
    fn from(e: ReadError) -> Self {
        Self::Read(e)
    }
}

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "font data is too short"),
            Self::UnknownFormat(sig) => write!(f, "unknown font signature 0x{sig:08X}"),
            Self::Woff2Unsupported => write!(f, "WOFF2 fonts are not supported"),
            Self::MalformedWoff(what) => write!(f, "malformed WOFF data: {what}"),
            Self::Inflate { tag, source } => {
                write!(f, "failed to inflate WOFF table '{tag}': {source}")
            }
            Self::TableLength {
                tag,
                expected,
                actual,
            } => write!(
                f,
                "WOFF table '{tag}' inflated to {actual} bytes, expected {expected}"
            ),
            Self::Read(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FontLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inflate { source, .. } => Some(source),
            Self::Read(e) => Some(e),
            _ => None,
        }
    }
}

/// Font bytes in a form that can be handed to [`FontRef`].
///
/// Sfnt data and collections are borrowed as is; WOFF data is decoded into
/// an owned sfnt.
#[derive(Clone, Debug)]
pub struct FontBlob<'a> {
    format: ContainerFormat,
    data: Cow<'a, [u8]>,
}

impl<'a> FontBlob<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, FontLoadError> {
        let format = ContainerFormat::sniff(data)?;
        let data = match format {
            ContainerFormat::Sfnt | ContainerFormat::Collection => Cow::Borrowed(data),
            ContainerFormat::Woff => Cow::Owned(decode_woff(data)?),
            ContainerFormat::Woff2 => return Err(FontLoadError::Woff2Unsupported),
        };
        Ok(Self { format, data })
    }

    /// The container format the data was loaded from.
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// The sfnt (or collection) bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the font at `index`; single fonts only have index 0.
    pub fn font(&self, index: u32) -> Result<FontRef<'_>, FontLoadError> {
        Ok(FontRef::from_index(&self.data, index)?)
    }
}

/// Rebuilds an sfnt from WOFF 1.0 data.
///
/// See <https://www.w3.org/TR/WOFF/#OverallStructure>
fn decode_woff(data: &[u8]) -> Result<Vec<u8>, FontLoadError> {
    let font_data = FontData::new(data);
    let read_u32 = |offset: usize| {
        font_data
            .read_at::<u32>(offset)
            .map_err(|_| FontLoadError::MalformedWoff("truncated header"))
    };
    if data.len() < WOFF_HEADER_LEN {
        return Err(FontLoadError::MalformedWoff("truncated header"));
    }
    let declared_len = read_u32(8)?;
    if declared_len as usize != data.len() {
        log::warn!(
            "WOFF header declares {declared_len} bytes but {} are present",
            data.len()
        );
    }
    let num_tables = font_data
        .read_at::<u16>(12)
        .map_err(|_| FontLoadError::MalformedWoff("truncated header"))?;
    let mut builder = FontBuilder::new();
    for i in 0..num_tables as usize {
        let record = WOFF_HEADER_LEN + i * WOFF_TABLE_RECORD_LEN;
        let read = |offset: usize| {
            font_data
                .read_at::<u32>(record + offset)
                .map_err(|_| FontLoadError::MalformedWoff("truncated table directory"))
        };
        let tag = Tag::new(&read(0)?.to_be_bytes());
        let offset = read(4)? as usize;
        let comp_length = read(8)? as usize;
        let orig_length = read(12)?;
        let stored = offset
            .checked_add(comp_length)
            .and_then(|end| data.get(offset..end))
            .ok_or(FontLoadError::MalformedWoff("table data out of bounds"))?;
        let table = match comp_length.cmp(&(orig_length as usize)) {
            std::cmp::Ordering::Equal => stored.to_vec(),
            std::cmp::Ordering::Less => inflate(tag, stored, orig_length)?,
            std::cmp::Ordering::Greater => {
                return Err(FontLoadError::MalformedWoff(
                    "compressed table is larger than the original",
                ))
            }
        };
        log::debug!("WOFF table '{tag}': {comp_length} -> {orig_length} bytes");
        builder.add_raw(tag, table);
    }
    Ok(builder.build())
}

fn inflate(tag: Tag, stored: &[u8], orig_length: u32) -> Result<Vec<u8>, FontLoadError> {
    let mut table = Vec::with_capacity(orig_length as usize);
    ZlibDecoder::new(stored)
        .read_to_end(&mut table)
        .map_err(|source| FontLoadError::Inflate { tag, source })?;
    if table.len() != orig_length as usize {
        return Err(FontLoadError::TableLength {
            tag,
            expected: orig_length,
            actual: table.len(),
        });
    }
    Ok(table)
}
