use crate::epub::{EpubBook, TocEntry, container, navigation, opf, zip_utils};
use crate::error::{BookracyError, Result};
use crate::util::{parent_dir, resolve_relative};
use log::debug;
use std::collections::HashMap;

/// Parse an in-memory EPUB archive into an EpubBook model.
///
/// Fails when the archive is not a zip, lacks container.xml or the OPF, or
/// has nothing to read (empty spine).
pub fn parse_epub(bytes: Vec<u8>) -> Result<EpubBook> {
    let mut archive = zip_utils::open_epub_bytes(bytes)?;
    zip_utils::validate_mimetype(&mut archive)?;

    let container_xml = zip_utils::read_entry_string(&mut archive, "META-INF/container.xml")?;
    let opf_path = container::parse_container(&container_xml)?;
    let opf_dir = parent_dir(&opf_path).to_string();

    let opf_xml = zip_utils::read_entry_string(&mut archive, &opf_path)?;
    let opf_data = opf::parse_opf(&opf_xml)?;
    if opf_data.spine.is_empty() {
        return Err(BookracyError::InvalidEpub("spine is empty".into()));
    }

    let mut resources = HashMap::new();
    for entry_name in zip_utils::list_entries(&archive) {
        if entry_name == "mimetype"
            || entry_name.starts_with("META-INF/")
            || entry_name.ends_with('/')
        {
            continue;
        }
        match zip_utils::read_entry(&mut archive, &entry_name) {
            Ok(data) => {
                resources.insert(entry_name, data);
            }
            Err(e) => debug!("skipping unreadable entry {entry_name}: {e}"),
        }
    }

    let read_document = |href: &str| {
        let full_path = crate::util::normalize_path(&format!("{opf_dir}{href}"));
        resources
            .get(&full_path)
            .and_then(|bytes| String::from_utf8(bytes.clone()).ok())
    };
    let nav = navigation::parse_navigation(
        &opf_data.manifest,
        opf_data.spine_toc.as_deref(),
        &read_document,
    )?;

    let toc = match nav.document_href {
        Some(doc_href) => {
            let doc_path = format!("{opf_dir}{doc_href}");
            resolve_toc(nav.toc, &doc_path)
        }
        None => Vec::new(),
    };

    let book = EpubBook {
        metadata: opf_data.metadata,
        manifest: opf_data.manifest,
        spine: opf_data.spine,
        toc,
        opf_dir,
        resources,
    };

    if book.spine_documents().is_empty() {
        return Err(BookracyError::InvalidEpub(
            "spine references no manifest items".into(),
        ));
    }

    Ok(book)
}

/// Rewrite entry hrefs from nav-document-relative to archive paths.
fn resolve_toc(entries: Vec<TocEntry>, doc_path: &str) -> Vec<TocEntry> {
    entries
        .into_iter()
        .map(|entry| TocEntry {
            href: if entry.href.is_empty() {
                entry.href
            } else {
                resolve_relative(doc_path, &entry.href)
            },
            children: resolve_toc(entry.children, doc_path),
            label: entry.label,
        })
        .collect()
}
