//! Catalog API client: look books up by query or MD5.

use crate::engine::BookSource;
use crate::error::{BookracyError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata for one downloadable book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Identifies the same file across searches.
    pub md5: String,
    pub link: String,
    /// File type, e.g. `epub` or `pdf`.
    pub extension: String,
}

impl BookRecord {
    pub fn is_epub(&self) -> bool {
        self.extension.trim_start_matches('.').eq_ignore_ascii_case("epub")
    }

    /// Reader source for this record. Only EPUB files can be read.
    pub fn book_source(&self) -> Result<BookSource> {
        if !self.is_epub() {
            return Err(BookracyError::UnsupportedFormat(self.extension.clone()));
        }
        Ok(BookSource::new(&self.link, &self.title))
    }
}

pub struct CatalogClient {
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn books_url(&self) -> String {
        format!("{}/books", self.base_url)
    }

    fn book_url(&self, md5: &str) -> String {
        format!("{}/books/{}", self.base_url, md5.to_ascii_lowercase())
    }

    pub fn search(&self, query: &str) -> Result<Vec<BookRecord>> {
        let url = self.books_url();
        debug!("GET {url}?query={query}");
        let records = ureq::get(&url)
            .query("query", query)
            .timeout(REQUEST_TIMEOUT)
            .call()?
            .into_json()?;
        Ok(records)
    }

    pub fn book(&self, md5: &str) -> Result<BookRecord> {
        let url = self.book_url(md5);
        debug!("GET {url}");
        let record = ureq::get(&url).timeout(REQUEST_TIMEOUT).call()?.into_json()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(extension: &str) -> BookRecord {
        BookRecord {
            title: "Dune".to_string(),
            authors: vec!["Frank Herbert".to_string()],
            md5: "0123abcd".to_string(),
            link: "https://cdn.example/dune".to_string(),
            extension: extension.to_string(),
        }
    }

    #[test]
    fn only_epub_records_open_in_the_reader() {
        let source = record("EPUB").book_source().unwrap();
        assert_eq!(source, BookSource::new("https://cdn.example/dune", "Dune"));
        assert!(matches!(
            record("pdf").book_source(),
            Err(BookracyError::UnsupportedFormat(ext)) if ext == "pdf"
        ));
    }

    #[test]
    fn urls_are_built_from_base() {
        let client = CatalogClient::new("https://api.example/v1/");
        assert_eq!(client.books_url(), "https://api.example/v1/books");
        assert_eq!(client.book_url("ABCD"), "https://api.example/v1/books/abcd");
    }

    #[test]
    fn records_parse_without_authors() {
        let parsed: BookRecord = serde_json::from_str(
            r#"{"title":"T","md5":"m","link":"l","extension":"epub"}"#,
        )
        .unwrap();
        assert!(parsed.authors.is_empty());
        assert!(parsed.is_epub());
    }
}
