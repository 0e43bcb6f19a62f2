//! Decoding of scrambled text inside HTML fragments and conversion of
//! fragments to plain text.
//!
//! The fragments served by the quiz platform are small and not always well
//! formed, so this works on a flat stream of quick-xml events rather than a
//! document tree. Anything that is not decoded is copied through byte for
//! byte.

use std::borrow::Cow;

use quick_xml::{
    escape::{partial_escape, unescape},
    events::{BytesStart, Event},
    Reader,
};

use crate::mapping::CorrectionMapping;

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text rather than markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Identifies the elements whose text is rendered with the scrambled font.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Marker {
    /// Element name to match, any element when `None`.
    pub element: Option<String>,
    /// Name of the attribute that carries the marker.
    pub attribute: String,
    /// Marker value; matches the whole attribute value or any of its
    /// whitespace separated tokens.
    pub value: String,
}

impl Marker {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            element: None,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    fn matches(&self, tag: &StartTag) -> bool {
        if let Some(element) = &self.element {
            if !element.eq_ignore_ascii_case(&tag.name) {
                return false;
            }
        }
        tag.attributes.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case(&self.attribute)
                && (*value == self.value
                    || value.split_ascii_whitespace().any(|token| token == self.value))
        })
    }
}

impl Default for Marker {
    /// The convention used by the platform: `<span class="xuetangx-com-encrypted-font">`.
    fn default() -> Self {
        Self::new("class", "xuetangx-com-encrypted-font").with_element("span")
    }
}

/// Replaces the scrambled text of every marked element.
///
/// Only text nested (at any depth) inside an element matching `marker` is
/// decoded. Character references inside that text are resolved before
/// decoding. Markup outside marked elements is returned unchanged.
pub fn decode_markup(html: &str, mapping: &CorrectionMapping, marker: &Marker) -> String {
    let mut out = String::with_capacity(html.len());
    let mut open: Vec<(String, bool)> = Vec::new();
    let mut marked_depth = 0usize;
    for token in Tokenizer::new(html) {
        match token {
            Token::Text(text) if marked_depth > 0 => decode_text(text, mapping, &mut out),
            Token::StartTag(tag) => {
                out.push_str(tag.raw);
                if !tag.self_closing && !VOID_ELEMENTS.contains(&tag.name.as_str()) {
                    let marked = marker.matches(&tag);
                    marked_depth += marked as usize;
                    open.push((tag.name, marked));
                }
            }
            Token::EndTag { name, raw } => {
                out.push_str(raw);
                // an unmatched end tag is ignored; a matched one closes
                // everything opened after it
                if let Some(pos) = open.iter().rposition(|(open_name, _)| *open_name == name) {
                    marked_depth -= open.drain(pos..).filter(|(_, marked)| *marked).count();
                }
            }
            other => out.push_str(other.raw()),
        }
    }
    out
}

/// Decodes text, resolving character references first.
///
/// Decoded characters that are markup significant are escaped again, so the
/// output stays well formed.
fn decode_text(text: &str, mapping: &CorrectionMapping, out: &mut String) {
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            if let Some((len, resolved)) = resolve_reference(rest) {
                let decoded: String = resolved.chars().map(|c| mapping.decode_char(c)).collect();
                out.push_str(&partial_escape(&decoded));
                rest = &rest[len..];
                continue;
            }
        }
        match mapping.decode_char(ch) {
            decoded if decoded == ch => out.push(ch),
            decoded => out.push_str(&partial_escape(&*decoded.encode_utf8(&mut [0; 4]))),
        }
        rest = &rest[ch.len_utf8()..];
    }
}

/// Extracts the readable text of a fragment.
///
/// `script` and `style` elements are dropped with their content, character
/// references are resolved, and the result is split into lines that are
/// trimmed, with blank lines removed.
pub fn to_plain_text(html: &str) -> String {
    let mut text = String::new();
    let mut hidden: Option<String> = None;
    for token in Tokenizer::new(html) {
        match token {
            Token::Text(raw) if hidden.is_none() => text.push_str(&decode_references(raw)),
            Token::StartTag(tag)
                if hidden.is_none()
                    && !tag.self_closing
                    && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) =>
            {
                hidden = Some(tag.name);
            }
            Token::EndTag { name, .. } if hidden.as_ref() == Some(&name) => hidden = None,
            _ => (),
        }
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolves the character references in a run of text.
///
/// Numeric references and the HTML named entities are resolved; anything
/// that does not parse as a reference is kept as written.
pub fn decode_references(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match resolve_reference(rest) {
            Some((len, resolved)) => {
                out.push_str(&resolved);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Resolves the `;` terminated reference at the start of `text`.
///
/// Returns the byte length of the reference and its replacement text.
fn resolve_reference(text: &str) -> Option<(usize, Cow<'_, str>)> {
    let end = text
        .get(1..)?
        .find(|c: char| matches!(c, ';' | '&' | '<') || c.is_whitespace())?
        + 1;
    if text.as_bytes()[end] != b';' {
        return None;
    }
    match unescape(&text[..=end]) {
        Ok(resolved) => Some((end + 1, resolved)),
        Err(e) => {
            log::trace!("kept unresolved reference {}: {e}", &text[..=end]);
            None
        }
    }
}

/// A start tag with its source text.
#[derive(Clone, Debug, PartialEq)]
struct StartTag<'a> {
    /// Lowercased element name.
    name: String,
    /// Attribute names and values, with references in values resolved.
    attributes: Vec<(String, String)>,
    self_closing: bool,
    /// Complete source of the tag.
    raw: &'a str,
}

impl<'a> StartTag<'a> {
    fn new(start: &BytesStart<'_>, raw: &'a str, self_closing: bool) -> Self {
        let attributes = start
            .html_attributes()
            .flatten()
            .map(|attr| {
                let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = decode_references(&String::from_utf8_lossy(&attr.value)).into_owned();
                (name, value)
            })
            .collect();
        Self {
            name: lowercase_name(start.name().as_ref()),
            attributes,
            self_closing,
            raw,
        }
    }
}

fn lowercase_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

#[derive(Clone, Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    StartTag(StartTag<'a>),
    EndTag { name: String, raw: &'a str },
    /// Comments, doctypes and processing instructions.
    Other(&'a str),
}

impl<'a> Token<'a> {
    fn raw(&self) -> &'a str {
        match self {
            Self::Text(raw) | Self::Other(raw) | Self::EndTag { raw, .. } => raw,
            Self::StartTag(tag) => tag.raw,
        }
    }
}

/// A reader configured for HTML: end tags need not match, and text is kept
/// exactly as written.
fn html_reader(html: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

/// Splits HTML source into tokens whose raw text, concatenated, is exactly
/// the input.
///
/// Events come from a quick-xml reader; the source of each event is sliced
/// from the input by position. Content of raw text elements is skipped over
/// by restarting the reader at the matching end tag. Input the reader
/// rejects ends the token stream with a single text token.
struct Tokenizer<'a> {
    html: &'a str,
    reader: Reader<&'a [u8]>,
    /// Offset of the reader's input within `html`.
    base: usize,
    /// End of the last token.
    cursor: usize,
    /// Set after the start tag of a raw text element.
    raw_text_end: Option<String>,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    fn new(html: &'a str) -> Self {
        Self {
            html,
            reader: html_reader(html),
            base: 0,
            cursor: 0,
            raw_text_end: None,
            done: false,
        }
    }

    /// Byte offset in `html` up to which the reader has consumed input.
    fn position(&self) -> usize {
        let pos = usize::try_from(self.reader.buffer_position()).unwrap_or(usize::MAX);
        self.base.saturating_add(pos).min(self.html.len())
    }

    fn take(&mut self, end: usize) -> &'a str {
        let html = self.html;
        let start = self.cursor;
        self.cursor = end.max(start);
        &html[start..self.cursor]
    }

    /// Takes the content of a raw text element and restarts the reader at
    /// its end tag.
    fn raw_text(&mut self, name: &str) -> Option<Token<'a>> {
        let html = self.html;
        self.base = self.cursor + raw_text_len(&html[self.cursor..], name);
        self.reader = html_reader(&html[self.base..]);
        let text = self.take(self.base);
        (!text.is_empty()).then_some(Token::Text(text))
    }

    /// Ends the stream with whatever input is left.
    fn finish(&mut self) -> Option<Token<'a>> {
        self.done = true;
        let text = self.take(self.html.len());
        (!text.is_empty()).then_some(Token::Text(text))
    }
}

/// Length of raw text content up to the matching end tag.
fn raw_text_len(rest: &str, name: &str) -> usize {
    let closing = format!("</{name}");
    rest.to_ascii_lowercase()
        .find(&closing)
        .unwrap_or(rest.len())
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.done {
            return None;
        }
        if let Some(name) = self.raw_text_end.take() {
            if let Some(token) = self.raw_text(&name) {
                return Some(token);
            }
        }
        let token = match self.reader.read_event() {
            Ok(Event::Text(text)) => {
                let end = self.cursor + text.len();
                Token::Text(self.take(end))
            }
            Ok(Event::Start(start)) => {
                let end = Tokenizer::position(self);
                let tag = StartTag::new(&start, self.take(end), false);
                if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                    self.raw_text_end = Some(tag.name.clone());
                }
                Token::StartTag(tag)
            }
            Ok(Event::Empty(start)) => {
                let end = Tokenizer::position(self);
                Token::StartTag(StartTag::new(&start, self.take(end), true))
            }
            Ok(Event::End(end_tag)) => {
                let end = Tokenizer::position(self);
                Token::EndTag {
                    name: lowercase_name(end_tag.name().as_ref()),
                    raw: self.take(end),
                }
            }
            Ok(Event::Eof) => return self.finish(),
            Ok(_) => {
                let end = Tokenizer::position(self);
                Token::Other(self.take(end))
            }
            Err(e) => {
                log::debug!("markup after byte {} kept as text: {e}", self.cursor);
                return self.finish();
            }
        };
        Some(token)
    }
}
