use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

/// Normalize an archive path: drops `.` and empty components and folds `..`.
///
/// Archive paths always use `/`, whatever the host platform.
pub fn normalize_path(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "." | "" => {}
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }
    components.join("/")
}

/// Directory part of an archive path, with a trailing slash (or empty).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

/// Resolve `href` as written inside the document at `base_path`.
///
/// The fragment, if any, is preserved. Absolute URLs are returned as-is.
pub fn resolve_relative(base_path: &str, href: &str) -> String {
    if href.contains("://") {
        return href.to_string();
    }
    let (path, fragment) = split_fragment(href);
    let resolved = if path.is_empty() {
        base_path.to_string()
    } else {
        normalize_path(&format!("{}{}", parent_dir(base_path), path))
    };
    match fragment {
        Some(frag) => format!("{resolved}#{frag}"),
        None => resolved,
    }
}

/// Split `chapter.xhtml#anchor` into the path and the optional fragment.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, frag)) if !frag.is_empty() => (path, Some(frag)),
        Some((path, _)) => (path, None),
        None => (href, None),
    }
}

/// Format a byte count as a human-readable size string.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
