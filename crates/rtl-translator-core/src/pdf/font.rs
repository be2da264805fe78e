//! TrueType font loading, measurement and embedding for the translated text.
//!
//! The target-script font is embedded once per output document as a
//! composite font:
//! - **Type0 font** with `Identity-H` encoding, referencing
//!   - **CIDFontType2** with a `W` array for every glyph we can draw, and a
//!     **FontDescriptor** pointing at the raw **FontFile2** program
//!   - **ToUnicode CMap** with one `bfchar` entry per glyph actually drawn,
//!     so text copied out of the result maps back to real code points

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::{Face, GlyphId, name_id};

use crate::error::{Error, Result};
use crate::text::TextMeasure;

/// Code point ranges whose glyphs are resolved when the font is loaded.
const COVERED_RANGES: &[(u32, u32)] = &[
    (0x0020, 0x007E), // Basic Latin
    (0x00A0, 0x024F), // Latin-1 Supplement, Latin Extended-A/B
    (0x0600, 0x06FF), // Arabic
    (0x0750, 0x077F), // Arabic Supplement
    (0x2000, 0x206F), // General Punctuation (ellipsis, dashes, quotes)
    (0x20AC, 0x20AC), // Euro sign
    (0xFB50, 0xFDFF), // Arabic Presentation Forms-A
    (0xFE70, 0xFEFF), // Arabic Presentation Forms-B
];

#[derive(Debug, Clone, Copy)]
struct Glyph {
    id: u16,
    advance: u16,
}

/// A parsed TrueType font: metrics for layout plus the program for embedding.
pub struct FontResource {
    path: PathBuf,
    data: Vec<u8>,
    base_name: String,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    notdef_advance: u16,
    glyphs: HashMap<char, Glyph>,
}

impl FontResource {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::FontLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(data, path)
    }

    /// Parse font bytes; `path` is only used for messages.
    pub fn from_bytes(data: Vec<u8>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let face = Face::parse(&data, 0).map_err(|e| Error::FontLoad {
            path: path.clone(),
            reason: format!("not a usable TrueType font: {e}"),
        })?;

        let mut glyphs = HashMap::new();
        for &(start, end) in COVERED_RANGES {
            for c in (start..=end).filter_map(char::from_u32) {
                if let Some(gid) = face.glyph_index(c) {
                    glyphs.insert(
                        c,
                        Glyph {
                            id: gid.0,
                            advance: face.glyph_hor_advance(gid).unwrap_or(0),
                        },
                    );
                }
            }
        }

        let base_name = face
            .names()
            .into_iter()
            .find(|n| n.name_id == name_id::POST_SCRIPT_NAME)
            .and_then(|n| n.to_string())
            .map(|n| n.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "RtlFont".to_string());

        let bbox = face.global_bounding_box();
        let units_per_em = face.units_per_em().max(1);
        let ascender = face.ascender();
        let descender = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascender);
        let notdef_advance = face.glyph_hor_advance(GlyphId(0)).unwrap_or(0);

        let font = Self {
            path,
            data,
            base_name,
            units_per_em,
            ascender,
            descender,
            cap_height,
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            notdef_advance,
            glyphs,
        };

        if !font.covers_arabic() {
            tracing::warn!(
                "Font {} has no Arabic glyphs; translated text will not render",
                font.path.display()
            );
        }

        Ok(font)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    fn covers_arabic(&self) -> bool {
        self.glyphs.contains_key(&'\u{0627}') || self.glyphs.contains_key(&'\u{FE8D}')
    }

    /// Glyph id for `c`, `0` (.notdef) when the font lacks it.
    pub fn glyph_id(&self, c: char) -> u16 {
        self.glyphs.get(&c).map_or(0, |g| g.id)
    }

    fn advance(&self, c: char) -> u16 {
        self.glyphs.get(&c).map_or(self.notdef_advance, |g| g.advance)
    }

    /// Scale a font-unit width to the PDF 1000-unit glyph space.
    fn scale_width(&self, width: u16) -> i64 {
        i64::from(width) * 1000 / i64::from(self.units_per_em)
    }

    /// Embed the font program and dictionaries; returns the Type0 font object.
    ///
    /// `used` maps every glyph id drawn to the character it came from and
    /// feeds the ToUnicode CMap.
    pub fn embed(&self, doc: &mut Document, used: &BTreeMap<u16, char>) -> ObjectId {
        let font_file_id = self.create_font_file(doc);
        let descriptor_id = self.create_font_descriptor(doc, font_file_id);
        let cid_font_id = self.create_cid_font(doc, descriptor_id);
        let to_unicode_id = create_to_unicode_cmap(doc, used);

        let type0 = Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(self.base_name.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            (
                "DescendantFonts",
                Object::Array(vec![Object::Reference(cid_font_id)]),
            ),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ]);
        doc.add_object(Object::Dictionary(type0))
    }

    #[allow(clippy::cast_possible_wrap)]
    fn create_font_file(&self, doc: &mut Document) -> ObjectId {
        let mut dict = Dictionary::new();
        dict.set("Length1", Object::Integer(self.data.len() as i64));
        let stream = Stream::new(dict, self.data.clone()).with_compression(true);
        doc.add_object(Object::Stream(stream))
    }

    fn create_font_descriptor(&self, doc: &mut Document, font_file_id: ObjectId) -> ObjectId {
        let dict = Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(self.base_name.as_bytes().to_vec())),
            // Nonsymbolic
            ("Flags", Object::Integer(32)),
            (
                "FontBBox",
                Object::Array(self.bbox.iter().map(|v| Object::Integer(i64::from(*v))).collect()),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(i64::from(self.ascender))),
            ("Descent", Object::Integer(i64::from(self.descender))),
            ("CapHeight", Object::Integer(i64::from(self.cap_height))),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(font_file_id)),
        ]);
        doc.add_object(Object::Dictionary(dict))
    }

    fn create_cid_font(&self, doc: &mut Document, descriptor_id: ObjectId) -> ObjectId {
        let dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(self.base_name.as_bytes().to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter([
                    ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
                    ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("DW", Object::Integer(self.scale_width(self.advance(' ')))),
            ("W", Object::Array(self.widths_array())),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]);
        doc.add_object(Object::Dictionary(dict))
    }

    /// `[gid [w1 w2 ...] gid [..] ...]`, grouping runs of consecutive glyph ids.
    fn widths_array(&self) -> Vec<Object> {
        let by_gid: BTreeMap<u16, i64> = self
            .glyphs
            .values()
            .filter(|g| g.id != 0)
            .map(|g| (g.id, self.scale_width(g.advance)))
            .collect();

        let mut result = Vec::new();
        let mut iter = by_gid.into_iter().peekable();
        while let Some((first, width)) = iter.next() {
            let mut run = vec![Object::Integer(width)];
            let mut next_gid = first.saturating_add(1);
            while let Some(&(gid, w)) = iter.peek() {
                if gid != next_gid {
                    break;
                }
                run.push(Object::Integer(w));
                next_gid = next_gid.saturating_add(1);
                iter.next();
            }
            result.push(Object::Integer(i64::from(first)));
            result.push(Object::Array(run));
        }
        result
    }
}

impl TextMeasure for FontResource {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.advance(c))).sum();
        #[allow(clippy::cast_precision_loss)]
        let units = units as f32;
        units * font_size / f32::from(self.units_per_em)
    }
}

impl std::fmt::Debug for FontResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontResource")
            .field("path", &self.path)
            .field("base_name", &self.base_name)
            .field("glyphs", &self.glyphs.len())
            .finish_non_exhaustive()
    }
}

/// ToUnicode CMap body with one `bfchar` per glyph.
pub fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = used.iter().filter(|(gid, _)| **gid != 0).collect();
    // bfchar sections hold at most 100 entries
    for section in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", section.len());
        for (gid, c) in section {
            let mut units = [0u16; 2];
            let utf16: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{gid:04X}> <{utf16}>");
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}

fn create_to_unicode_cmap(doc: &mut Document, used: &BTreeMap<u16, char>) -> ObjectId {
    let stream = Stream::new(Dictionary::new(), to_unicode_cmap(used).into_bytes());
    doc.add_object(Object::Stream(stream))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_font_file_is_font_error() {
        let err = FontResource::from_file("/definitely/not/here.ttf").unwrap_err();
        assert!(matches!(err, Error::FontLoad { .. }));
        assert_eq!(err.kind(), "font");
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = FontResource::from_bytes(b"not a font".to_vec(), "junk.ttf").unwrap_err();
        assert!(matches!(err, Error::FontLoad { .. }));
    }

    #[test]
    fn test_to_unicode_cmap_entries() {
        let used = BTreeMap::from([(0x0012, 'A'), (0x0340, '\u{FEFB}'), (0, 'x')]);
        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0012> <0041>"));
        assert!(cmap.contains("<0340> <FEFB>"));
        assert!(!cmap.contains("<0000> <0078>"));
    }

    #[test]
    fn test_to_unicode_cmap_splits_sections() {
        let used: BTreeMap<u16, char> = (1..=150u16)
            .map(|g| (g, char::from_u32(0x0600 + u32::from(g)).unwrap()))
            .collect();
        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
    }
}
