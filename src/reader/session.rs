//! Reader session: open and close, styling, the loading indicator and
//! position persistence.

use crate::engine::{BookSource, ContainerEngine, Dimensions, Location, ThemeColors, Viewport};
use crate::epub::TocEntry;
use crate::reader::adapter::{AdapterState, PagePosition, ViewAdapter, ViewEvent};
use crate::reader::input::{Key, Swipe};
use crate::reader::theme::{FONT_SIZE_STEP_PX, ThemeId, clamp_font_size};
use crate::settings::SettingsProvider;
use crate::store::{Fingerprint, KeyValueStore, PositionStore, ReadingPosition};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Collaborators a session is built with.
#[derive(Clone)]
pub struct ReaderContext {
    pub store: Arc<dyn KeyValueStore>,
    pub settings: Arc<dyn SettingsProvider>,
    pub viewport: Viewport,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderSessionState {
    pub is_loading: bool,
    /// Percent of the archive downloaded, 0..=100.
    pub load_progress: u8,
    pub current_location: Option<Location>,
    pub current_page: Option<usize>,
    pub total_pages: Option<usize>,
    pub font_size_px: u32,
    pub theme: ThemeId,
}

pub struct ReaderSession<E: ContainerEngine> {
    source: BookSource,
    fingerprint: Fingerprint,
    positions: PositionStore,
    adapter: ViewAdapter<E>,
    state: ReaderSessionState,
    toc: Arc<[TocEntry]>,
    failure: Option<String>,
    restored: Option<Location>,
}

impl<E: ContainerEngine> ReaderSession<E> {
    /// Open `source` in `engine`, resuming from the stored position if any.
    pub fn open(engine: E, source: BookSource, context: &ReaderContext) -> Self {
        let fingerprint = Fingerprint::of_url(&source.url);
        let positions = PositionStore::new(Arc::clone(&context.store));
        let restored = match positions.load(&fingerprint) {
            Ok(position) => position.map(|p| p.location),
            Err(e) => {
                warn!("cannot read saved position for {}: {e}", source.url);
                None
            }
        };
        match restored {
            Some(location) => info!("resuming {} at {location}", source.title),
            None => info!("opening {} from the start", source.title),
        }

        let theme = context.settings.theme();
        let font_size_px = context.settings.font_size_px();
        let mut adapter = ViewAdapter::new(engine);
        adapter.set_theme(theme.colors());
        adapter.set_font_size(font_size_px);
        adapter.mount(&source, context.viewport, context.dimensions, restored);

        Self {
            source,
            fingerprint,
            positions,
            adapter,
            state: ReaderSessionState {
                is_loading: true,
                load_progress: 0,
                current_location: None,
                current_page: None,
                total_pages: None,
                font_size_px,
                theme,
            },
            toc: Arc::from(Vec::new()),
            failure: None,
            restored,
        }
    }

    pub fn source(&self) -> &BookSource {
        &self.source
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn state(&self) -> &ReaderSessionState {
        &self.state
    }

    /// Location the session was resumed from, if a position was stored.
    pub fn restored_location(&self) -> Option<Location> {
        self.restored
    }

    pub fn adapter_state(&self) -> AdapterState {
        self.adapter.state()
    }

    pub fn engine(&self) -> Option<&E> {
        self.adapter.engine()
    }

    /// Read-only snapshot of the table of contents.
    pub fn toc(&self) -> Arc<[TocEntry]> {
        Arc::clone(&self.toc)
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Colors for reader chrome; the document uses the same ones.
    pub fn palette(&self) -> ThemeColors {
        self.state.theme.colors()
    }

    pub fn pump(&mut self) -> Vec<ViewEvent> {
        let events = self.adapter.pump();
        self.apply(&events);
        events
    }

    pub fn wait(&mut self, timeout: Duration) -> Vec<ViewEvent> {
        let events = self.adapter.wait(timeout);
        self.apply(&events);
        events
    }

    fn apply(&mut self, events: &[ViewEvent]) {
        for event in events {
            match event {
                ViewEvent::NavigationReady(toc) => {
                    self.toc = Arc::from(toc.as_slice());
                    if let Some(total) = self.adapter.total_pages() {
                        self.state.total_pages = Some(total);
                    }
                }
                ViewEvent::Relocated { location, page } => {
                    self.on_relocated(*location, *page);
                    self.loaded();
                }
                ViewEvent::Rendered | ViewEvent::Milestone(_) => self.loaded(),
                ViewEvent::Progress { loaded, total } => {
                    if let Some(total) = total.filter(|t| *t > 0) {
                        self.state.load_progress =
                            (loaded.saturating_mul(100) / total).min(100) as u8;
                    }
                }
                ViewEvent::Failed(reason) => {
                    self.failure = Some(reason.clone());
                    self.loaded();
                }
            }
        }
    }

    fn loaded(&mut self) {
        if self.state.is_loading {
            debug!("{} finished loading", self.source.title);
            self.state.is_loading = false;
        }
    }

    fn on_relocated(&mut self, location: Location, page: Option<PagePosition>) {
        self.state.current_location = Some(location);
        self.state.current_page = page.map(|p| p.current);
        if let Some(p) = page {
            self.state.total_pages = Some(p.total);
        }

        let position = ReadingPosition::new(
            &self.source.title,
            &self.source.url,
            location,
            page.map(|p| (p.current, p.total)),
        );
        if let Err(e) = self.positions.save(&position) {
            warn!("position not saved: {e}");
        }
    }

    pub fn set_theme(&mut self, theme: ThemeId) {
        if self.state.theme == theme {
            return;
        }
        self.state.theme = theme;
        self.adapter.set_theme(theme.colors());
    }

    /// Clamped to the supported range; unchanged sizes are not re-applied.
    pub fn set_font_size(&mut self, size_px: u32) {
        let size_px = clamp_font_size(size_px);
        if self.state.font_size_px == size_px {
            return;
        }
        self.state.font_size_px = size_px;
        self.adapter.set_font_size(size_px);
    }

    pub fn increase_font_size(&mut self) {
        self.set_font_size(self.state.font_size_px.saturating_add(FONT_SIZE_STEP_PX));
    }

    pub fn decrease_font_size(&mut self) {
        self.set_font_size(self.state.font_size_px.saturating_sub(FONT_SIZE_STEP_PX));
    }

    pub fn next_page(&mut self) {
        self.adapter.next_page();
    }

    pub fn prev_page(&mut self) {
        self.adapter.prev_page();
    }

    pub fn jump_to(&mut self, location: Location) {
        self.adapter.jump_to(location);
    }

    pub fn jump_to_entry(&mut self, entry: &TocEntry) {
        if entry.href.is_empty() {
            debug!("toc entry '{}' has no target", entry.label);
            return;
        }
        self.adapter.jump_to_href(&entry.href);
    }

    pub fn handle_key(&mut self, key: Key) -> bool {
        self.adapter.handle_key(key)
    }

    pub fn handle_swipe(&mut self, swipe: Swipe) -> bool {
        self.adapter.handle_swipe(swipe)
    }

    /// Tear down the view. The stored position stays.
    pub fn close(mut self) {
        info!("closing {}", self.source.title);
        self.adapter.destroy();
    }
}
