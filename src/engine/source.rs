use crate::error::{BookracyError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

const CHUNK_SIZE: usize = 64 * 1024;
const MEMORY_SCHEME: &str = "memory:";

/// The content to read: where the EPUB bytes live and what to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSource {
    pub url: String,
    pub title: String,
}

impl BookSource {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// Byte-loading primitive used by the engine's load worker.
///
/// `progress` receives `(loaded_bytes, total_bytes)` as data arrives; the
/// total is `None` when the transport does not announce it.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str, progress: &mut dyn FnMut(u64, Option<u64>)) -> Result<Vec<u8>>;
}

fn read_with_progress<R: Read>(
    mut reader: R,
    total: Option<u64>,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        progress(data.len() as u64, total);
    }
    Ok(data)
}

/// Fetches `http(s)://` URLs over the network and everything else from the
/// filesystem (`file://` URLs or plain paths).
#[derive(Debug, Default, Clone)]
pub struct DefaultFetcher;

impl DefaultFetcher {
    fn fetch_http(url: &str, progress: &mut dyn FnMut(u64, Option<u64>)) -> Result<Vec<u8>> {
        let response = ureq::get(url).call().map_err(|e| BookracyError::load(url, e))?;
        let total = response
            .header("Content-Length")
            .and_then(|len| len.parse::<u64>().ok());
        debug!("downloading {url} ({total:?} bytes)");
        read_with_progress(response.into_reader(), total, progress)
            .map_err(|e| BookracyError::load(url, e))
    }

    fn fetch_file(
        url: &str,
        path: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Vec<u8>> {
        let file = std::fs::File::open(path).map_err(|e| BookracyError::load(url, e))?;
        let total = file.metadata().ok().map(|m| m.len());
        read_with_progress(file, total, progress).map_err(|e| BookracyError::load(url, e))
    }
}

impl Fetch for DefaultFetcher {
    fn fetch(&self, url: &str, progress: &mut dyn FnMut(u64, Option<u64>)) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Self::fetch_http(url, progress)
        } else if url.starts_with(MEMORY_SCHEME) {
            Err(BookracyError::load(url, "in-memory sources need a MemoryFetcher"))
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Self::fetch_file(url, Path::new(path), progress)
        }
    }
}

/// Serves byte buffers registered under `memory:` keys (blob handles).
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    entries: Arc<Mutex<HashMap<String, Arc<Vec<u8>>>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return the URL that resolves to them.
    pub fn insert(&self, key: &str, bytes: Vec<u8>) -> String {
        let url = format!("{MEMORY_SCHEME}{key}");
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.clone(), Arc::new(bytes));
        url
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, url: &str, progress: &mut dyn FnMut(u64, Option<u64>)) -> Result<Vec<u8>> {
        let bytes = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .cloned()
            .ok_or_else(|| BookracyError::load(url, "no such in-memory source"))?;
        let total = bytes.len() as u64;
        progress(total, Some(total));
        Ok(bytes.as_ref().clone())
    }
}
