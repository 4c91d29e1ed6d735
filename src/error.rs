use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookracyError {
    #[error("invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },

    /// Page numbers were requested before the location index was built.
    #[error("page index not ready")]
    IndexNotReady,

    #[error("book is not loaded yet")]
    NotReady,

    #[error("failed to persist {key}: {reason}")]
    PersistenceWrite { key: String, reason: String },

    #[error("no section matches {0}")]
    UnknownTarget(String),

    #[error("engine used after destroy")]
    Destroyed,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BookracyError {
    pub fn load(url: &str, reason: impl std::fmt::Display) -> Self {
        BookracyError::Load {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ureq::Error> for BookracyError {
    fn from(err: ureq::Error) -> Self {
        BookracyError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BookracyError>;
