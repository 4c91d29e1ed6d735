use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Opaque position inside a book.
///
/// Outside the engine a location is only an equality-comparable, serializable
/// token. Its textual form is `epubcfi(/6/{step}!:{offset})`, where `step` is
/// the even CFI step of the spine item and `offset` a character offset into
/// that item's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    spine: usize,
    offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLocationError(String);

impl fmt::Display for ParseLocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed location: {}", self.0)
    }
}

impl std::error::Error for ParseLocationError {}

impl Location {
    pub(crate) fn new(spine: usize, offset: usize) -> Self {
        Self { spine, offset }
    }

    pub(crate) fn spine(&self) -> usize {
        self.spine
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Reading-order comparison. Only the engine resolves order.
    pub(crate) fn reading_order(&self, other: &Location) -> Ordering {
        (self.spine, self.offset).cmp(&(other.spine, other.offset))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi(/6/{}!:{})", (self.spine + 1) * 2, self.offset)
    }
}

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseLocationError(s.to_string());
        let body = s
            .strip_prefix("epubcfi(/6/")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;
        let (step, offset) = body.split_once("!:").ok_or_else(malformed)?;
        let step: usize = step.parse().map_err(|_| malformed())?;
        let offset: usize = offset.parse().map_err(|_| malformed())?;
        if step < 2 || step % 2 != 0 {
            return Err(malformed());
        }
        Ok(Location::new(step / 2 - 1, offset))
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
