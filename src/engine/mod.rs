//! Container engine: opens an EPUB, paginates it into a viewport and reports
//! what it is doing through a typed event stream.

pub mod epub_engine;
pub mod layout;
pub mod location;
pub mod source;

pub use epub_engine::{EpubEngine, Screen};
pub use location::Location;
pub use source::{BookSource, DefaultFetcher, Fetch, MemoryFetcher};

use crate::epub::TocEntry;
use crate::error::Result;
use std::time::Duration;

/// Characters per location-index boundary used when no other hint is given.
pub const DEFAULT_LOCATION_GRANULARITY: usize = 1024;

/// Lifecycle milestones some books emit instead of a full render signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    /// The loaded book met its first rendition.
    Started,
    /// Sections were laid out for the current viewport and style.
    Layout,
    /// A section was displayed.
    Displayed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    NavigationReady(Vec<TocEntry>),
    Relocated(Location),
    RenderComplete,
    RenderError(String),
    LoadProgress { loaded: u64, total: Option<u64> },
    Milestone(Milestone),
}

/// What `display` should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTarget {
    Location(Location),
    /// A table-of-contents href (archive path, optional `#fragment`).
    Href(String),
    /// First table-of-contents entry, or the document start without one.
    Default,
}

impl From<Option<Location>> for DisplayTarget {
    fn from(location: Option<Location>) -> Self {
        location.map_or(DisplayTarget::Default, DisplayTarget::Location)
    }
}

/// Size of the host surface a rendition is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Px(u32),
    Percent(u8),
}

impl Length {
    fn resolve(self, available: u32) -> u32 {
        match self {
            Length::Px(px) => px.min(available),
            Length::Percent(pct) => available * u32::from(pct.min(100)) / 100,
        }
    }
}

/// Rendition size, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: Length,
    pub height: Length,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: Length::Percent(100),
            height: Length::Percent(100),
        }
    }
}

impl Dimensions {
    /// Pixel size inside `viewport`.
    pub fn resolve(&self, viewport: Viewport) -> (u32, u32) {
        (
            self.width.resolve(viewport.width_px),
            self.height.resolve(viewport.height_px),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeColors {
    pub background: String,
    pub text: String,
}

/// Operations the view adapter drives. One engine value is one open book.
pub trait ContainerEngine {
    /// Start loading `source`. Completion is reported through events.
    fn open(&mut self, source: &BookSource) -> Result<()>;

    /// Attach (or re-attach) the rendition to a viewport.
    fn render_into(&mut self, viewport: Viewport, dimensions: Dimensions) -> Result<()>;

    fn display(&mut self, target: DisplayTarget) -> Result<()>;

    /// Advance one screen. A no-op on the last screen.
    fn next(&mut self) -> Result<()>;

    /// Go back one screen. A no-op on the first screen.
    fn prev(&mut self) -> Result<()>;

    /// Build the location index and return the (approximate) page total.
    fn compute_page_count(&mut self, granularity: usize) -> Result<usize>;

    /// 1-based page of `location`; `IndexNotReady` before the index exists.
    fn location_to_page(&self, location: &Location) -> Result<usize>;

    fn apply_theme(&mut self, colors: ThemeColors);

    fn apply_font_size(&mut self, size_px: u32);

    /// Drain pending events without blocking.
    fn poll_events(&mut self) -> Vec<EngineEvent>;

    /// Like `poll_events`, but waits up to `timeout` for the first event.
    fn wait_events(&mut self, timeout: Duration) -> Vec<EngineEvent> {
        let _ = timeout;
        self.poll_events()
    }

    /// Release everything. Safe to call repeatedly.
    fn destroy(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_resolve_percent_and_pixels() {
        let viewport = Viewport {
            width_px: 800,
            height_px: 600,
        };
        assert_eq!(Dimensions::default().resolve(viewport), (800, 600));
        let dims = Dimensions {
            width: Length::Percent(50),
            height: Length::Px(900),
        };
        assert_eq!(dims.resolve(viewport), (400, 600));
    }

    #[test]
    fn display_target_from_saved_location() {
        assert_eq!(DisplayTarget::from(None), DisplayTarget::Default);
        let loc: Location = "epubcfi(/6/2!:0)".parse().unwrap();
        assert_eq!(DisplayTarget::from(Some(loc)), DisplayTarget::Location(loc));
    }
}
