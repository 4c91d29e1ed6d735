//! Binds one container engine to one viewport.
//!
//! The adapter owns its engine for the engine's whole life: mounting opens
//! it, unmounting (or dropping the adapter) destroys it. Engine failures stop
//! here and come back out as [`ViewEvent::Failed`].

use crate::engine::{
    BookSource, ContainerEngine, DEFAULT_LOCATION_GRANULARITY, Dimensions, DisplayTarget,
    EngineEvent, Location, Milestone, ThemeColors, Viewport,
};
use crate::epub::TocEntry;
use crate::reader::input::{InputAction, Key, Swipe};
use log::{debug, warn};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    Opening,
    Ready,
    Error,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePosition {
    pub current: usize,
    pub total: usize,
}

/// Engine events after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    NavigationReady(Vec<TocEntry>),
    /// `page` is `None` until the location index exists.
    Relocated {
        location: Location,
        page: Option<PagePosition>,
    },
    Rendered,
    Milestone(Milestone),
    Progress { loaded: u64, total: Option<u64> },
    Failed(String),
}

pub struct ViewAdapter<E: ContainerEngine> {
    /// `None` once destroyed; nothing touches the engine after that.
    engine: Option<E>,
    state: AdapterState,
    attached: bool,
    total_pages: Option<usize>,
    /// Failures raised by our own calls, reported on the next pump.
    pending: Vec<ViewEvent>,
}

impl<E: ContainerEngine> ViewAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Some(engine),
            state: AdapterState::Uninitialized,
            attached: false,
            total_pages: None,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn total_pages(&self) -> Option<usize> {
        self.total_pages
    }

    /// Open `source`, attach it to `viewport` and show `initial` (or the
    /// book's default entry point).
    pub fn mount(
        &mut self,
        source: &BookSource,
        viewport: Viewport,
        dimensions: Dimensions,
        initial: Option<Location>,
    ) {
        if self.state != AdapterState::Uninitialized {
            warn!("ignoring mount of {} in state {:?}", source.url, self.state);
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        self.state = AdapterState::Opening;

        let result = engine
            .open(source)
            .and_then(|()| engine.render_into(viewport, dimensions))
            .and_then(|()| engine.display(DisplayTarget::from(initial)));
        match result {
            Ok(()) => self.attached = true,
            Err(e) => self.fail(format!("cannot open {}: {e}", source.url)),
        }
    }

    fn fail(&mut self, reason: String) {
        warn!("{reason}");
        if matches!(self.state, AdapterState::Opening | AdapterState::Ready) {
            self.state = AdapterState::Error;
        }
        self.pending.push(ViewEvent::Failed(reason));
    }

    /// Drain engine events without blocking.
    pub fn pump(&mut self) -> Vec<ViewEvent> {
        let raw = match self.engine.as_mut() {
            Some(engine) => engine.poll_events(),
            None => return Vec::new(),
        };
        self.translate(raw)
    }

    /// Wait up to `timeout` for engine events.
    pub fn wait(&mut self, timeout: Duration) -> Vec<ViewEvent> {
        if !self.pending.is_empty() {
            return self.pump();
        }
        let raw = match self.engine.as_mut() {
            Some(engine) => engine.wait_events(timeout),
            None => return Vec::new(),
        };
        self.translate(raw)
    }

    fn translate(&mut self, raw: Vec<EngineEvent>) -> Vec<ViewEvent> {
        let mut out = std::mem::take(&mut self.pending);
        for event in raw {
            let view_event = match event {
                EngineEvent::NavigationReady(toc) => {
                    self.on_navigation_ready();
                    ViewEvent::NavigationReady(toc)
                }
                EngineEvent::Relocated(location) => ViewEvent::Relocated {
                    location,
                    page: self.page_of(&location),
                },
                EngineEvent::RenderComplete => ViewEvent::Rendered,
                EngineEvent::RenderError(reason) => {
                    self.fail(reason);
                    out.append(&mut self.pending);
                    continue;
                }
                EngineEvent::LoadProgress { loaded, total } => {
                    ViewEvent::Progress { loaded, total }
                }
                EngineEvent::Milestone(milestone) => ViewEvent::Milestone(milestone),
            };
            out.push(view_event);
        }
        out
    }

    fn on_navigation_ready(&mut self) {
        if self.state != AdapterState::Opening {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match engine.compute_page_count(DEFAULT_LOCATION_GRANULARITY) {
            Ok(total) => self.total_pages = Some(total),
            Err(e) => debug!("page index unavailable: {e}"),
        }
        if self.attached {
            self.state = AdapterState::Ready;
        }
    }

    fn page_of(&self, location: &Location) -> Option<PagePosition> {
        let total = self.total_pages?;
        let engine = self.engine.as_ref()?;
        match engine.location_to_page(location) {
            Ok(current) => Some(PagePosition { current, total }),
            Err(e) => {
                debug!("page number for {location} deferred: {e}");
                None
            }
        }
    }

    fn ready_engine(&mut self) -> Option<&mut E> {
        if self.state == AdapterState::Ready {
            self.engine.as_mut()
        } else {
            None
        }
    }

    pub fn next_page(&mut self) {
        if let Some(engine) = self.ready_engine()
            && let Err(e) = engine.next()
        {
            warn!("next page failed: {e}");
        }
    }

    pub fn prev_page(&mut self) {
        if let Some(engine) = self.ready_engine()
            && let Err(e) = engine.prev()
        {
            warn!("previous page failed: {e}");
        }
    }

    fn display(&mut self, target: DisplayTarget) {
        if !matches!(self.state, AdapterState::Opening | AdapterState::Ready) {
            return;
        }
        if let Some(engine) = self.engine.as_mut()
            && let Err(e) = engine.display(target)
        {
            warn!("display failed: {e}");
        }
    }

    pub fn jump_to(&mut self, location: Location) {
        self.display(DisplayTarget::Location(location));
    }

    pub fn jump_to_href(&mut self, href: &str) {
        self.display(DisplayTarget::Href(href.to_string()));
    }

    pub fn set_font_size(&mut self, size_px: u32) {
        if let Some(engine) = self.engine.as_mut() {
            engine.apply_font_size(size_px);
        }
    }

    pub fn set_theme(&mut self, colors: ThemeColors) {
        if let Some(engine) = self.engine.as_mut() {
            engine.apply_theme(colors);
        }
    }

    fn perform(&mut self, action: Option<InputAction>) -> bool {
        match action {
            Some(InputAction::Next) => self.next_page(),
            Some(InputAction::Prev) => self.prev_page(),
            None => return false,
        }
        true
    }

    /// Returns whether the key turned a page.
    pub fn handle_key(&mut self, key: Key) -> bool {
        self.perform(key.action())
    }

    pub fn handle_swipe(&mut self, swipe: Swipe) -> bool {
        self.perform(swipe.action())
    }

    /// Destroy the engine. Reachable from every state; later calls do nothing.
    pub fn destroy(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
        self.pending.clear();
        self.state = AdapterState::Destroyed;
    }
}

impl<E: ContainerEngine> Drop for ViewAdapter<E> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedEngine;

    const VIEWPORT: Viewport = Viewport {
        width_px: 800,
        height_px: 600,
    };

    fn source() -> BookSource {
        BookSource::new("memory:book", "Book")
    }

    fn mounted(engine: &ScriptedEngine) -> ViewAdapter<ScriptedEngine> {
        let mut adapter = ViewAdapter::new(engine.clone());
        adapter.mount(&source(), VIEWPORT, Dimensions::default(), None);
        adapter
    }

    fn ready(engine: &ScriptedEngine) -> ViewAdapter<ScriptedEngine> {
        engine.0.borrow_mut().page_total = Some(10);
        let mut adapter = mounted(engine);
        engine.push(EngineEvent::NavigationReady(vec![TocEntry::new("One", "a.xhtml")]));
        adapter.pump();
        adapter
    }

    #[test]
    fn mount_opens_and_displays_default() {
        let engine = ScriptedEngine::new();
        let adapter = mounted(&engine);
        assert_eq!(adapter.state(), AdapterState::Opening);
        assert_eq!(engine.script().opened, vec![source()]);
        assert_eq!(engine.script().displayed, vec![DisplayTarget::Default]);
    }

    #[test]
    fn mount_with_saved_location_displays_it() {
        let engine = ScriptedEngine::new();
        let mut adapter = ViewAdapter::new(engine.clone());
        let saved = Location::new(3, 200);
        adapter.mount(&source(), VIEWPORT, Dimensions::default(), Some(saved));
        assert_eq!(engine.script().displayed, vec![DisplayTarget::Location(saved)]);
    }

    #[test]
    fn navigation_ready_builds_index_and_becomes_ready() {
        let engine = ScriptedEngine::new();
        let adapter = ready(&engine);
        assert_eq!(adapter.state(), AdapterState::Ready);
        assert_eq!(adapter.total_pages(), Some(10));
        assert!(engine.script().index_built);
    }

    #[test]
    fn relocation_carries_page_number() {
        let engine = ScriptedEngine::new();
        let mut adapter = ready(&engine);
        engine.push(EngineEvent::Relocated(Location::new(2, 0)));
        assert_eq!(
            adapter.pump(),
            vec![ViewEvent::Relocated {
                location: Location::new(2, 0),
                page: Some(PagePosition { current: 3, total: 10 }),
            }]
        );
    }

    #[test]
    fn relocation_without_index_defers_page() {
        let engine = ScriptedEngine::new();
        let mut adapter = mounted(&engine);
        engine.push(EngineEvent::NavigationReady(Vec::new()));
        engine.push(EngineEvent::Relocated(Location::new(0, 0)));
        let events = adapter.pump();
        assert_eq!(adapter.state(), AdapterState::Ready);
        assert_eq!(
            events[1],
            ViewEvent::Relocated {
                location: Location::new(0, 0),
                page: None
            }
        );
    }

    #[test]
    fn render_error_while_opening_is_terminal() {
        let engine = ScriptedEngine::new();
        let mut adapter = mounted(&engine);
        engine.push(EngineEvent::RenderError("corrupt archive".to_string()));
        assert_eq!(adapter.pump(), vec![ViewEvent::Failed("corrupt archive".to_string())]);
        assert_eq!(adapter.state(), AdapterState::Error);
        adapter.next_page();
        assert!(engine.script().turns.is_empty());
    }

    #[test]
    fn failed_attach_reports_on_next_pump() {
        let engine = ScriptedEngine::new();
        engine.0.borrow_mut().fail_render = true;
        let mut adapter = mounted(&engine);
        assert_eq!(adapter.state(), AdapterState::Error);
        assert!(matches!(adapter.pump().as_slice(), [ViewEvent::Failed(_)]));
    }

    #[test]
    fn navigation_is_a_noop_until_ready() {
        let engine = ScriptedEngine::new();
        let mut adapter = mounted(&engine);
        adapter.next_page();
        adapter.prev_page();
        assert!(engine.script().turns.is_empty());
    }

    #[test]
    fn keys_swipes_and_buttons_share_one_path() {
        let engine = ScriptedEngine::new();
        let mut adapter = ready(&engine);
        adapter.next_page();
        assert!(adapter.handle_key(Key::ArrowRight));
        assert!(adapter.handle_swipe(Swipe::new((400.0, 10.0), (100.0, 20.0))));
        assert!(adapter.handle_key(Key::ArrowLeft));
        assert!(!adapter.handle_key(Key::Other));
        assert!(!adapter.handle_swipe(Swipe::new((0.0, 0.0), (10.0, 200.0))));
        assert_eq!(engine.script().turns, vec!["next", "next", "next", "prev"]);
    }

    #[test]
    fn destroy_from_any_state_is_idempotent() {
        for make_ready in [false, true] {
            let engine = ScriptedEngine::new();
            let mut adapter = if make_ready { ready(&engine) } else { mounted(&engine) };
            adapter.destroy();
            adapter.destroy();
            assert_eq!(adapter.state(), AdapterState::Destroyed);
            assert_eq!(engine.script().destroy_count, 1);
        }

        let engine = ScriptedEngine::new();
        let mut adapter = ViewAdapter::new(engine.clone());
        adapter.destroy();
        assert_eq!(engine.script().destroy_count, 1);
    }

    #[test]
    fn destroy_after_failed_load_releases_engine() {
        let engine = ScriptedEngine::new();
        let mut adapter = mounted(&engine);
        engine.push(EngineEvent::RenderError("not a zip archive".to_string()));
        adapter.pump();
        assert_eq!(adapter.state(), AdapterState::Error);

        adapter.destroy();
        adapter.destroy();
        assert_eq!(adapter.state(), AdapterState::Destroyed);
        assert_eq!(engine.script().destroy_count, 1);
    }

    #[test]
    fn late_events_are_ignored_after_destroy() {
        let engine = ScriptedEngine::new();
        let mut adapter = ready(&engine);
        adapter.destroy();
        engine.push(EngineEvent::Relocated(Location::new(1, 0)));
        assert!(adapter.pump().is_empty());
        assert!(adapter.wait(Duration::from_millis(1)).is_empty());
        adapter.next_page();
        adapter.set_font_size(20);
        assert!(engine.script().turns.is_empty());
        assert!(engine.script().font_sizes.is_empty());
    }

    #[test]
    fn drop_destroys_engine() {
        let engine = ScriptedEngine::new();
        drop(mounted(&engine));
        assert_eq!(engine.script().destroy_count, 1);
    }
}
