use crate::error::{BookracyError, Result};
use log::warn;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

pub fn open_epub_bytes(bytes: Vec<u8>) -> Result<ZipArchive<Cursor<Vec<u8>>>> {
    let archive = ZipArchive::new(Cursor::new(bytes))?;
    Ok(archive)
}

/// Check the `mimetype` entry.
///
/// A wrong mimetype is rejected. A missing one, or one that is not the first
/// entry, is tolerated with a warning since many readers accept such files.
pub fn validate_mimetype<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<()> {
    let first_is_mimetype = archive
        .name_for_index(0)
        .is_some_and(|name| name == "mimetype");

    let mut entry = match archive.by_name("mimetype") {
        Ok(entry) => entry,
        Err(_) => {
            warn!("archive has no mimetype entry");
            return Ok(());
        }
    };
    if !first_is_mimetype {
        warn!("mimetype is not the first archive entry");
    }

    let mut content = String::new();
    entry.read_to_string(&mut content)?;

    if content.trim() != "application/epub+zip" {
        return Err(BookracyError::InvalidEpub(format!(
            "invalid mimetype: {}",
            content.trim()
        )));
    }

    Ok(())
}

pub fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| BookracyError::InvalidEpub(format!("missing entry: {name}")))?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn read_entry_string<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String> {
    let bytes = read_entry(archive, name)?;
    String::from_utf8(bytes)
        .map_err(|e| BookracyError::InvalidEpub(format!("invalid UTF-8 in {name}: {e}")))
}

pub fn list_entries<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    (0..archive.len())
        .filter_map(|i| archive.name_for_index(i).map(|s| s.to_string()))
        .collect()
}
