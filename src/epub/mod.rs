pub mod container;
pub mod content;
pub mod navigation;
pub mod opf;
pub mod reader;
pub mod zip_utils;

use crate::util::normalize_path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents a parsed EPUB book
#[derive(Debug, Default)]
pub struct EpubBook {
    pub metadata: EpubMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub toc: Vec<TocEntry>,
    /// Directory of the OPF inside the archive, with a trailing slash (or empty).
    pub opf_dir: String,
    pub resources: HashMap<String, Vec<u8>>,
}

/// Dublin Core metadata fields the reader cares about
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EpubMetadata {
    pub titles: Vec<String>,
}

/// An item in the EPUB manifest
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// A spine item reference
#[derive(Debug, Clone)]
pub struct SpineItem {
    pub idref: String,
    pub linear: bool,
}

/// A node in the book's navigation tree.
///
/// `href` is an archive path (already resolved against the navigation
/// document) and may carry a `#fragment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub label: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

/// A spine entry resolved to its archive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineDocument {
    pub path: String,
    /// `false` for `linear="no"` items (notes, pop-ups) that paging skips.
    pub linear: bool,
}

impl EpubBook {
    pub fn title(&self) -> Option<&str> {
        self.metadata.titles.first().map(String::as_str)
    }

    /// Resolve a manifest href (relative to the OPF) to an archive path.
    pub fn resolve_href(&self, href: &str) -> String {
        normalize_path(&format!("{}{}", self.opf_dir, href))
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|m| m.id == id)
    }

    /// Spine documents in reading order.
    ///
    /// Spine entries pointing at missing manifest items are skipped.
    pub fn spine_documents(&self) -> Vec<SpineDocument> {
        self.spine
            .iter()
            .filter_map(|item| {
                let manifest = self.manifest_item(&item.idref)?;
                Some(SpineDocument {
                    path: self.resolve_href(&manifest.href),
                    linear: item.linear,
                })
            })
            .collect()
    }
}

impl TocEntry {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    /// Total number of entries in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TocEntry::count).sum::<usize>()
    }

    /// Depth-first listing of a ToC tree.
    pub fn flatten(entries: &[TocEntry]) -> Vec<&TocEntry> {
        let mut out = Vec::new();
        let mut stack: Vec<&TocEntry> = entries.iter().rev().collect();
        while let Some(entry) = stack.pop() {
            out.push(entry);
            stack.extend(entry.children.iter().rev());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with_opf_dir(opf_dir: &str) -> EpubBook {
        EpubBook {
            opf_dir: opf_dir.to_string(),
            manifest: vec![
                ManifestItem {
                    id: "ch1".to_string(),
                    href: "text/ch1.xhtml".to_string(),
                    media_type: "application/xhtml+xml".to_string(),
                    properties: None,
                },
                ManifestItem {
                    id: "ch2".to_string(),
                    href: "../shared/ch2.xhtml".to_string(),
                    media_type: "application/xhtml+xml".to_string(),
                    properties: None,
                },
            ],
            spine: vec![
                SpineItem {
                    idref: "ch1".to_string(),
                    linear: true,
                },
                SpineItem {
                    idref: "missing".to_string(),
                    linear: true,
                },
                SpineItem {
                    idref: "ch2".to_string(),
                    linear: false,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn resolve_href_joins_opf_dir() {
        let book = book_with_opf_dir("OEBPS/");
        assert_eq!(book.resolve_href("ch1.xhtml"), "OEBPS/ch1.xhtml");
    }

    #[test]
    fn resolve_href_root_level() {
        let book = book_with_opf_dir("");
        assert_eq!(book.resolve_href("ch1.xhtml"), "ch1.xhtml");
    }

    #[test]
    fn spine_documents_skip_missing_items() {
        let book = book_with_opf_dir("OEBPS/");
        let spine = book.spine_documents();
        let paths: Vec<&str> = spine.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["OEBPS/text/ch1.xhtml", "shared/ch2.xhtml"]);
        assert!(spine[0].linear);
        assert!(!spine[1].linear);
    }

    #[test]
    fn toc_entry_count_includes_children() {
        let mut part = TocEntry::new("Part 1", "p1.xhtml");
        part.children.push(TocEntry::new("Chapter 1", "ch1.xhtml"));
        part.children.push(TocEntry::new("Chapter 2", "ch2.xhtml"));
        assert_eq!(part.count(), 3);
    }

    #[test]
    fn toc_flatten_is_depth_first() {
        let mut part = TocEntry::new("Part 1", "p1.xhtml");
        part.children.push(TocEntry::new("Chapter 1", "ch1.xhtml"));
        let toc = vec![part, TocEntry::new("Part 2", "p2.xhtml")];
        let labels: Vec<&str> = TocEntry::flatten(&toc).iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Part 1", "Chapter 1", "Part 2"]);
    }
}
