//! Font and table files on disk.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::{
    error::Error,
    extract::{extract_bytes, FingerprintTable},
};

/// A memory mapped font file.
pub struct FontFile {
    path: PathBuf,
    data: memmap2::Mmap,
}

impl FontFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path).map_err(Error::io(&path))?;
        // SAFETY: the mapping is read only and font files are not expected to
        // change while a command runs.
        let data = unsafe { memmap2::Mmap::map(&file) }.map_err(Error::io(&path))?;
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Extracts the fingerprint table of the font at `index`.
    pub fn fingerprints(&self, index: u32) -> Result<FingerprintTable, Error> {
        extract_bytes(self.data(), index).map_err(Error::extract(&self.path))
    }
}

/// Loads a fingerprint table from a font, or from a table previously saved
/// as JSON (any path with a `.json` extension).
pub fn load_fingerprints(path: &Path, index: u32) -> Result<FingerprintTable, Error> {
    if is_json(path) {
        let table: FingerprintTable = read_json(path)?;
        log::info!("loaded {} cached fingerprints", table.len());
        Ok(table)
    } else {
        FontFile::open(path)?.fingerprints(index)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Reads a JSON document from a file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let file = File::open(path).map_err(Error::io(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(Error::json(path))
}

/// Layout of written JSON documents.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum JsonStyle {
    /// Indented with four spaces.
    #[default]
    Pretty,
    /// Everything on one line.
    Compact,
}

impl JsonStyle {
    /// Serializes `value` in this style. Non-ASCII text is written as is.
    pub fn to_writer<T: Serialize + ?Sized>(
        self,
        writer: impl Write,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        match self {
            Self::Pretty => {
                let mut ser = serde_json::Serializer::with_formatter(
                    writer,
                    PrettyFormatter::with_indent(b"    "),
                );
                value.serialize(&mut ser)
            }
            Self::Compact => serde_json::to_writer(writer, value),
        }
    }
}

/// Writes a value to a JSON file.
pub fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    style: JsonStyle,
) -> Result<(), Error> {
    let file = File::create(path).map_err(Error::io(path))?;
    let mut writer = BufWriter::new(file);
    style.to_writer(&mut writer, value).map_err(Error::json(path))?;
    writer.flush().map_err(Error::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{self, square, triangle};
    use pretty_assertions::assert_eq;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("deglyph-{}-{name}", std::process::id()))
    }

    #[test]
    fn fingerprints_from_font_and_cache() {
        let font_path = temp_path("font.ttf");
        let json_path = temp_path("table.json");
        let font = testdata::font_with_glyphs(&[('A', square(100)), ('B', triangle(100))]);
        std::fs::write(&font_path, &font).unwrap();

        let file = FontFile::open(&font_path).unwrap();
        assert_eq!(file.data(), &font[..]);
        let table = load_fingerprints(&font_path, 0).unwrap();
        assert_eq!(table.len(), 2);

        write_json(&json_path, &table, JsonStyle::Compact).unwrap();
        let written = std::fs::read_to_string(&json_path).unwrap();
        assert!(!written.contains('\n'));
        assert_eq!(load_fingerprints(&json_path, 0).unwrap(), table);

        std::fs::remove_file(font_path).unwrap();
        std::fs::remove_file(json_path).unwrap();
    }

    #[test]
    fn pretty_json_is_indented_with_four_spaces() {
        let value = serde_json::json!([{"text": "中文"}, [1]]);
        let mut out = Vec::new();
        JsonStyle::default().to_writer(&mut out, &value).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[\n    {\n        \"text\": \"中文\"\n    },\n    [\n        1\n    ]\n]"
        );
        let mut out = Vec::new();
        JsonStyle::Compact.to_writer(&mut out, &value).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[{\"text\":\"中文\"},[1]]");
    }

    #[test]
    fn errors_carry_path() {
        let missing = temp_path("missing.ttf");
        let err = FontFile::open(&missing).err().unwrap();
        assert!(matches!(err, Error::Io { ref path, .. } if *path == missing));

        let junk = temp_path("junk.otf");
        std::fs::write(&junk, b"definitely not a font").unwrap();
        let err = load_fingerprints(&junk, 0).unwrap_err();
        assert!(matches!(err, Error::Extract { .. }));
        assert!(err.to_string().starts_with(&junk.display().to_string()));
        std::fs::remove_file(junk).unwrap();

        let bad_json = temp_path("bad.JSON");
        std::fs::write(&bad_json, b"{\"zz\": 1}").unwrap();
        assert!(matches!(
            load_fingerprints(&bad_json, 0),
            Err(Error::Json { .. })
        ));
        std::fs::remove_file(bad_json).unwrap();
    }
}
