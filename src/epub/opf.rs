use crate::epub::{EpubMetadata, ManifestItem, SpineItem};
use crate::error::{BookracyError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

pub struct OpfData {
    pub metadata: EpubMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    /// `toc` attribute of `<spine>` (EPUB 2 NCX reference), if any.
    pub spine_toc: Option<String>,
}

fn attr_string(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn manifest_item(e: &BytesStart) -> ManifestItem {
    let mut item = ManifestItem {
        id: String::new(),
        href: String::new(),
        media_type: String::new(),
        properties: None,
    };
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"id" => item.id = attr_string(&attr.value),
            b"href" => item.href = attr_string(&attr.value),
            b"media-type" => item.media_type = attr_string(&attr.value),
            b"properties" => item.properties = Some(attr_string(&attr.value)),
            _ => {}
        }
    }
    item
}

fn spine_item(e: &BytesStart) -> SpineItem {
    let mut item = SpineItem {
        idref: String::new(),
        linear: true,
    };
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"idref" => item.idref = attr_string(&attr.value),
            b"linear" => item.linear = attr.value.as_ref() != b"no",
            _ => {}
        }
    }
    item
}

pub fn parse_opf(xml: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut metadata = EpubMetadata::default();
    let mut manifest = Vec::new();
    let mut spine = Vec::new();
    let mut spine_toc = None;

    let mut in_metadata = false;
    let mut current_element = String::new();
    let mut current_text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match local.as_str() {
                    "metadata" => in_metadata = true,
                    "spine" => spine_toc = spine_toc_attr(e),
                    "item" => manifest.push(manifest_item(e)),
                    "itemref" => spine.push(spine_item(e)),
                    _ if in_metadata => {
                        current_element = local.clone();
                        current_text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"item" => manifest.push(manifest_item(e)),
                b"itemref" => spine.push(spine_item(e)),
                b"spine" => spine_toc = spine_toc_attr(e),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_metadata && !current_element.is_empty() {
                    current_text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => {
                let local = e.local_name();
                if local.as_ref() == b"metadata" {
                    in_metadata = false;
                } else if in_metadata && !current_element.is_empty() {
                    let text = current_text.trim().to_string();
                    if !text.is_empty() && current_element == "title" {
                        metadata.titles.push(text);
                    }
                    current_text.clear();
                    current_element.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(BookracyError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(OpfData {
        metadata,
        manifest,
        spine,
        spine_toc,
    })
}

fn spine_toc_attr(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"toc")
        .map(|attr| attr_string(&attr.value))
}
