use crate::epub::{ManifestItem, TocEntry};
use crate::error::{BookracyError, Result};
use log::debug;
use quick_xml::Reader;
use quick_xml::events::Event;

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Table of contents as found in the package, before href resolution.
#[derive(Debug, Default)]
pub struct Navigation {
    pub toc: Vec<TocEntry>,
    /// Manifest href of the document the entries were read from. Entry hrefs
    /// are relative to it.
    pub document_href: Option<String>,
}

/// Parse navigation from manifest items and content.
/// Prefers the EPUB 3 nav document, falls back to the NCX named by the spine
/// (or the first NCX in the manifest).
pub fn parse_navigation(
    manifest: &[ManifestItem],
    spine_toc: Option<&str>,
    get_content: &dyn Fn(&str) -> Option<String>,
) -> Result<Navigation> {
    if let Some(nav_item) = manifest.iter().find(|item| {
        item.properties
            .as_deref()
            .is_some_and(|p| p.split_whitespace().any(|prop| prop == "nav"))
    }) && let Some(content) = get_content(&nav_item.href)
    {
        match parse_nav_xhtml(&content) {
            Ok(toc) if !toc.is_empty() => {
                return Ok(Navigation {
                    toc,
                    document_href: Some(nav_item.href.clone()),
                });
            }
            Ok(_) => debug!("nav document {} has no toc entries", nav_item.href),
            Err(e) => debug!("nav document {} unreadable: {e}", nav_item.href),
        }
    }

    let ncx_item = spine_toc
        .and_then(|id| manifest.iter().find(|item| item.id == id))
        .or_else(|| manifest.iter().find(|item| item.media_type == NCX_MEDIA_TYPE));
    if let Some(ncx_item) = ncx_item
        && let Some(content) = get_content(&ncx_item.href)
    {
        let toc = parse_ncx(&content)?;
        return Ok(Navigation {
            toc,
            document_href: Some(ncx_item.href.clone()),
        });
    }

    Ok(Navigation::default())
}

/// Extract the `nav[epub:type="toc"]` tree from an XHTML nav document.
fn parse_nav_xhtml(html: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().check_end_names = false;
    let mut buf = Vec::new();

    let mut toc = Vec::new();
    let mut in_nav_toc = false;
    let mut in_anchor = false;
    let mut stack: Vec<Vec<TocEntry>> = Vec::new();
    let mut label: Option<String> = None;
    let mut href = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                if local.as_ref() == b"nav" {
                    in_nav_toc = e.attributes().flatten().any(|attr| {
                        attr.key.local_name().as_ref() == b"type"
                            && attr.value.split(|b| *b == b' ').any(|v| v == b"toc")
                    });
                } else if in_nav_toc {
                    match local.as_ref() {
                        b"ol" => stack.push(Vec::new()),
                        b"a" => {
                            in_anchor = true;
                            label = Some(String::new());
                            href.clear();
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() == b"href" {
                                    href = String::from_utf8_lossy(&attr.value).into_owned();
                                }
                            }
                        }
                        // Heading without a link, e.g. `<li><span>Part 1</span><ol>`
                        b"span" if !in_anchor => {
                            label = Some(String::new());
                            href.clear();
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_nav_toc && let Some(current) = label.as_mut() {
                    current.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) if in_nav_toc => {
                let local = e.local_name();
                if local.as_ref() == b"a" {
                    in_anchor = false;
                }
                match local.as_ref() {
                    b"nav" => in_nav_toc = false,
                    b"a" | b"span" if !in_anchor => {
                        if let Some(text) = label.take()
                            && let Some(current) = stack.last_mut()
                        {
                            current.push(TocEntry::new(
                                crate::util::collapse_whitespace(&text),
                                std::mem::take(&mut href),
                            ));
                        }
                    }
                    b"ol" => {
                        let items = stack.pop().unwrap_or_default();
                        match stack.last_mut() {
                            Some(parent) => match parent.last_mut() {
                                Some(entry) => entry.children.extend(items),
                                None => parent.extend(items),
                            },
                            None => toc.extend(items),
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(BookracyError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(toc)
}

fn parse_ncx(xml: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut nav_points = Vec::new();
    let mut stack: Vec<TocEntry> = Vec::new();
    let mut in_text = false;
    let mut current_label = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"navPoint" => stack.push(TocEntry::new("", "")),
                b"text" => {
                    in_text = true;
                    current_label.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"content"
                    && let Some(current) = stack.last_mut()
                {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src" {
                            current.href = String::from_utf8_lossy(&attr.value).into_owned();
                        }
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text {
                    current_label.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"text" => {
                    in_text = false;
                    if let Some(current) = stack.last_mut()
                        && current.label.is_empty()
                    {
                        current.label = crate::util::collapse_whitespace(&current_label);
                    }
                }
                b"navPoint" => {
                    if let Some(point) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(point),
                            None => nav_points.push(point),
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(BookracyError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(nav_points)
}
