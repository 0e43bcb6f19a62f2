//! Fonts synthesized in memory for tests.
//!
//! Glyph data is encoded by hand so the shapes (and therefore the outline
//! programs skrifa emits for them) are fully under the test's control.

use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};
use skrifa::{raw::TableProvider, FontRef};
use write_fonts::{
    tables::{
        cmap::Cmap,
        head::Head,
        hhea::Hhea,
        hmtx::{Hmtx, LongMetric},
        maxp::Maxp,
    },
    types::{GlyphId, Tag},
    FontBuilder,
};

/// A contour as (x, y, on_curve) points.
pub type Contour = Vec<(i16, i16, bool)>;

/// A simple glyph; no contours means an empty glyph such as a space.
pub type Shape = Vec<Contour>;

pub fn square(size: i16) -> Shape {
    rect(0, 0, size, size)
}

pub fn rect(x0: i16, y0: i16, x1: i16, y1: i16) -> Shape {
    vec![vec![
        (x0, y0, true),
        (x1, y0, true),
        (x1, y1, true),
        (x0, y1, true),
    ]]
}

pub fn triangle(size: i16) -> Shape {
    vec![vec![(0, 0, true), (size, 0, true), (size / 2, size, true)]]
}

/// A contour with an off-curve point.
pub fn drop_shape(size: i16) -> Shape {
    vec![vec![
        (0, 0, true),
        (size, 0, false),
        (size, size, true),
        (0, size, true),
    ]]
}

pub fn empty() -> Shape {
    Vec::new()
}

fn encode_glyph(shape: &Shape) -> Vec<u8> {
    let mut data = Vec::new();
    if shape.is_empty() {
        return data;
    }
    let points = || shape.iter().flatten();
    let x_min = points().map(|p| p.0).min().unwrap_or_default();
    let y_min = points().map(|p| p.1).min().unwrap_or_default();
    let x_max = points().map(|p| p.0).max().unwrap_or_default();
    let y_max = points().map(|p| p.1).max().unwrap_or_default();
    data.extend((shape.len() as i16).to_be_bytes());
    for value in [x_min, y_min, x_max, y_max] {
        data.extend(value.to_be_bytes());
    }
    let mut end = 0u16;
    for contour in shape {
        end += contour.len() as u16;
        data.extend((end - 1).to_be_bytes());
    }
    // no instructions
    data.extend(0u16.to_be_bytes());
    for (_, _, on_curve) in points() {
        data.push(*on_curve as u8);
    }
    // flags leave the short and same bits clear: every coordinate is an
    // explicit i16 delta
    let mut last = 0i16;
    for (x, _, _) in points() {
        data.extend((x - last).to_be_bytes());
        last = *x;
    }
    let mut last = 0i16;
    for (_, y, _) in points() {
        data.extend((y - last).to_be_bytes());
        last = *y;
    }
    while data.len() % 4 != 0 {
        data.push(0);
    }
    data
}

/// Builds a TrueType font where each entry maps a character to its own
/// glyph.
///
/// Glyph 0 is an empty `.notdef`; entry `i` becomes glyph `i + 1`.
pub fn font_with_glyphs(glyphs: &[(char, Shape)]) -> Vec<u8> {
    let num_glyphs = glyphs.len() as u16 + 1;
    let mut glyf = Vec::new();
    // the notdef glyph is empty: it starts and ends at offset 0
    let mut loca = vec![0u32, 0];
    for (_, shape) in glyphs {
        glyf.extend(encode_glyph(shape));
        loca.push(glyf.len() as u32);
    }
    let loca: Vec<u8> = loca.iter().flat_map(|offset| offset.to_be_bytes()).collect();

    let cmap = Cmap::from_mappings(
        glyphs
            .iter()
            .enumerate()
            .map(|(i, (ch, _))| (*ch, GlyphId::new(i as u32 + 1))),
    )
    .unwrap();
    let head = Head {
        units_per_em: 1000,
        // long offsets
        index_to_loc_format: 1,
        ..Default::default()
    };
    let maxp = Maxp {
        num_glyphs,
        ..Default::default()
    };
    let hhea = Hhea {
        number_of_h_metrics: num_glyphs,
        ..Default::default()
    };
    let hmtx = Hmtx {
        h_metrics: (0..num_glyphs)
            .map(|_| LongMetric {
                advance: 1000,
                side_bearing: 0,
            })
            .collect(),
        left_side_bearings: vec![],
    };

    let mut builder = FontBuilder::new();
    builder.add_table(&head).unwrap();
    builder.add_table(&maxp).unwrap();
    builder.add_table(&hhea).unwrap();
    builder.add_table(&hmtx).unwrap();
    builder.add_table(&cmap).unwrap();
    builder.add_raw(Tag::new(b"loca"), loca);
    builder.add_raw(Tag::new(b"glyf"), glyf);
    builder.build()
}

/// Wraps an sfnt in a WOFF 1.0 container, compressing every table that
/// gets smaller.
pub fn woff_from_sfnt(sfnt: &[u8]) -> Vec<u8> {
    let font = FontRef::new(sfnt).unwrap();
    let records = font.table_directory.table_records();
    let mut entries = Vec::new();
    let mut blobs = Vec::new();
    let mut offset = 44 + records.len() * 20;
    for record in records {
        let tag = record.tag();
        let table = font.data_for_tag(tag).unwrap().as_bytes();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(table).unwrap();
        let compressed = encoder.finish().unwrap();
        let stored = if compressed.len() < table.len() {
            compressed
        } else {
            table.to_vec()
        };
        entries.push((
            tag.to_be_bytes(),
            offset as u32,
            stored.len() as u32,
            table.len() as u32,
            record.checksum(),
        ));
        offset += (stored.len() + 3) & !3;
        blobs.push(stored);
    }

    let mut woff = Vec::new();
    woff.extend(b"wOFF");
    woff.extend(0x0001_0000u32.to_be_bytes());
    woff.extend((offset as u32).to_be_bytes());
    woff.extend((records.len() as u16).to_be_bytes());
    woff.extend(0u16.to_be_bytes());
    woff.extend((sfnt.len() as u32).to_be_bytes());
    woff.extend(1u16.to_be_bytes());
    woff.extend(0u16.to_be_bytes());
    // metadata and private blocks
    woff.extend([0u8; 20]);
    for (tag, offset, comp_length, orig_length, checksum) in entries {
        woff.extend(tag);
        woff.extend(offset.to_be_bytes());
        woff.extend(comp_length.to_be_bytes());
        woff.extend(orig_length.to_be_bytes());
        woff.extend(checksum.to_be_bytes());
    }
    for blob in blobs {
        let padding = ((blob.len() + 3) & !3) - blob.len();
        woff.extend(blob);
        woff.extend(std::iter::repeat_n(0u8, padding));
    }
    woff
}

/// Packs complete sfnt fonts into a TrueType collection.
///
/// Every table directory comes first, followed by all table data; table
/// offsets are absolute within the collection.
pub fn collection(sfnts: &[Vec<u8>]) -> Vec<u8> {
    let fonts: Vec<_> = sfnts.iter().map(|data| FontRef::new(data).unwrap()).collect();
    let header_len = 12 + fonts.len() * 4;
    let directory_lens: Vec<_> = fonts
        .iter()
        .map(|font| 12 + font.table_directory.table_records().len() * 16)
        .collect();

    let mut ttc = Vec::new();
    ttc.extend(b"ttcf");
    ttc.extend(0x0001_0000u32.to_be_bytes());
    ttc.extend((fonts.len() as u32).to_be_bytes());
    let mut directory_offset = header_len;
    for len in &directory_lens {
        ttc.extend((directory_offset as u32).to_be_bytes());
        directory_offset += len;
    }

    let mut tables = Vec::new();
    let mut table_offset = directory_offset;
    for (font, sfnt) in fonts.iter().zip(sfnts) {
        // sfnt version, table count and search fields
        ttc.extend(&sfnt[..12]);
        for record in font.table_directory.table_records() {
            let table = font.data_for_tag(record.tag()).unwrap().as_bytes();
            ttc.extend(record.tag().to_be_bytes());
            ttc.extend(record.checksum().to_be_bytes());
            ttc.extend((table_offset as u32).to_be_bytes());
            ttc.extend((table.len() as u32).to_be_bytes());
            tables.extend(table);
            while tables.len() % 4 != 0 {
                tables.push(0);
            }
            table_offset = directory_offset + tables.len();
        }
    }
    ttc.extend(tables);
    ttc
}
