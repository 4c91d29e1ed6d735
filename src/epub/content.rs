use crate::util::collapse_whitespace;
use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

/// Plain text of one XHTML content document.
///
/// Paragraphs are separated by `'\n'`. `anchors` maps element ids to the
/// character offset (not byte offset) where the element's text starts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DocumentText {
    pub text: String,
    pub anchors: HashMap<String, usize>,
}

impl DocumentText {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

fn is_block(name: &[u8]) -> bool {
    matches!(
        name,
        b"p" | b"div"
            | b"h1"
            | b"h2"
            | b"h3"
            | b"h4"
            | b"h5"
            | b"h6"
            | b"li"
            | b"blockquote"
            | b"section"
            | b"article"
            | b"pre"
            | b"tr"
            | b"dt"
            | b"dd"
            | b"figcaption"
            | b"br"
            | b"hr"
    )
}

fn is_skipped(name: &[u8]) -> bool {
    matches!(name, b"head" | b"script" | b"style")
}

struct TextBuilder {
    paragraphs: Vec<String>,
    pending: String,
    /// Characters already committed, including separators.
    committed: usize,
    anchors: HashMap<String, usize>,
}

impl TextBuilder {
    fn new() -> Self {
        Self {
            paragraphs: Vec::new(),
            pending: String::new(),
            committed: 0,
            anchors: HashMap::new(),
        }
    }

    fn break_paragraph(&mut self) {
        let paragraph = collapse_whitespace(&self.pending);
        self.pending.clear();
        if paragraph.is_empty() {
            return;
        }
        if !self.paragraphs.is_empty() {
            self.committed += 1;
        }
        self.committed += paragraph.chars().count();
        self.paragraphs.push(paragraph);
    }

    /// Offset the next committed text will start at.
    fn next_offset(&self) -> usize {
        let pending = collapse_whitespace(&self.pending).chars().count();
        let separator = usize::from(!self.paragraphs.is_empty());
        if pending == 0 {
            self.committed + separator
        } else {
            self.committed + separator + pending + 1
        }
    }

    fn mark_anchor(&mut self, e: &BytesStart) {
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"id" {
                let id = String::from_utf8_lossy(&attr.value).into_owned();
                let offset = self.next_offset();
                self.anchors.entry(id).or_insert(offset);
            }
        }
    }

    fn finish(mut self) -> DocumentText {
        self.break_paragraph();
        let text = self.paragraphs.join("\n");
        let len = text.chars().count();
        let anchors = self
            .anchors
            .into_iter()
            .map(|(id, offset)| (id, offset.min(len)))
            .collect();
        DocumentText { text, anchors }
    }
}

/// Extract readable text from an XHTML document.
///
/// Malformed markup ends extraction early; whatever was read so far is kept.
pub fn extract_text(xhtml: &str) -> DocumentText {
    let mut reader = Reader::from_str(xhtml);
    reader.config_mut().check_end_names = false;
    let mut buf = Vec::new();
    let mut builder = TextBuilder::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                if is_skipped(local.as_ref()) {
                    skip_depth += 1;
                } else if skip_depth == 0 {
                    if is_block(local.as_ref()) {
                        builder.break_paragraph();
                    }
                    builder.mark_anchor(e);
                }
            }
            Ok(Event::Empty(ref e)) => {
                if skip_depth == 0 {
                    if is_block(e.local_name().as_ref()) {
                        builder.break_paragraph();
                    }
                    builder.mark_anchor(e);
                }
            }
            Ok(Event::End(ref e)) => {
                let local = e.local_name();
                if is_skipped(local.as_ref()) {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if skip_depth == 0 && is_block(local.as_ref()) {
                    builder.break_paragraph();
                }
            }
            Ok(Event::Text(ref e)) => {
                if skip_depth == 0 {
                    match e.unescape() {
                        Ok(text) => builder.pending.push_str(&text),
                        // HTML entities such as &nbsp; are unknown to XML
                        Err(_) => builder.pending.push_str(&String::from_utf8_lossy(e)),
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if skip_depth == 0 {
                    builder.pending.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("stopping text extraction at position {}: {e}", reader.buffer_position());
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    builder.finish()
}
