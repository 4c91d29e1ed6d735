use crate::engine::layout::{self, PageIndex, ScreenMetrics, Section};
use crate::engine::source::{DefaultFetcher, Fetch};
use crate::engine::{
    BookSource, ContainerEngine, Dimensions, DisplayTarget, EngineEvent, Location, Milestone,
    ThemeColors, Viewport,
};
use crate::epub::{EpubBook, TocEntry, content, reader};
use crate::error::{BookracyError, Result};
use crate::util::split_fragment;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

const DEFAULT_FONT_SIZE_PX: u32 = 16;

enum LoadMessage {
    Progress { loaded: u64, total: Option<u64> },
    Loaded(Box<LoadedBook>),
    Failed(String),
}

/// A parsed book reduced to what the rendition needs.
struct LoadedBook {
    sections: Vec<Section>,
    /// Per section: whether paging walks through it.
    linear: Vec<bool>,
    toc: Vec<TocEntry>,
}

impl LoadedBook {
    fn from_epub(book: EpubBook) -> Self {
        let spine = book.spine_documents();
        let mut linear: Vec<bool> = spine.iter().map(|d| d.linear).collect();
        if !linear.contains(&true) {
            linear.fill(true);
        }
        let sections = spine
            .into_iter()
            .map(|doc| {
                let document = match book.resources.get(&doc.path) {
                    Some(bytes) => content::extract_text(&String::from_utf8_lossy(bytes)),
                    None => {
                        warn!("spine document {} is missing from the archive", doc.path);
                        Default::default()
                    }
                };
                Section::new(doc.path, document)
            })
            .collect();
        Self {
            sections,
            linear,
            toc: book.toc,
        }
    }

    fn first_linear(&self) -> usize {
        self.linear.iter().position(|&l| l).unwrap_or(0)
    }

    /// Next section that paging enters after `section`.
    fn linear_after(&self, section: usize) -> Option<usize> {
        (section + 1..self.sections.len()).find(|&i| self.linear[i])
    }

    fn linear_before(&self, section: usize) -> Option<usize> {
        (0..section).rev().find(|&i| self.linear[i])
    }

    fn load(fetcher: &dyn Fetch, url: &str, tx: &Sender<LoadMessage>) -> Result<Self> {
        let bytes = fetcher.fetch(url, &mut |loaded, total| {
            let _ = tx.send(LoadMessage::Progress { loaded, total });
        })?;
        let book = reader::parse_epub(bytes).map_err(|e| BookracyError::load(url, e))?;
        Ok(Self::from_epub(book))
    }

    /// Section index and character offset for a table-of-contents href.
    fn resolve_href(&self, href: &str) -> Option<(usize, usize)> {
        let (path, fragment) = split_fragment(href);
        let index = self
            .sections
            .iter()
            .position(|s| s.path == path)
            .or_else(|| {
                let suffix = format!("/{}", path.trim_start_matches('/'));
                self.sections.iter().position(|s| s.path.ends_with(&suffix))
            })?;
        let offset = fragment
            .and_then(|id| self.sections[index].anchor(id))
            .unwrap_or(0);
        Some((index, offset))
    }
}

fn first_toc_href(entries: &[TocEntry]) -> Option<&str> {
    entries.iter().find_map(|entry| {
        if entry.href.is_empty() {
            first_toc_href(&entry.children)
        } else {
            Some(entry.href.as_str())
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading,
    Loaded,
    Failed,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RenditionStyle {
    colors: ThemeColors,
    font_size_px: u32,
}

impl Default for RenditionStyle {
    fn default() -> Self {
        Self {
            colors: ThemeColors {
                background: "#ffffff".to_string(),
                text: "#000000".to_string(),
            },
            font_size_px: DEFAULT_FONT_SIZE_PX,
        }
    }
}

struct Rendition {
    viewport: Viewport,
    dimensions: Dimensions,
    /// Screen start offsets, per section.
    screens: Vec<Vec<usize>>,
    /// `(section, screen)` currently shown.
    position: Option<(usize, usize)>,
}

/// The visible screen, ready to be drawn by a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub location: Location,
    pub section_path: String,
    pub text: String,
    pub colors: ThemeColors,
    pub font_size_px: u32,
    /// 0-based screen index within the section.
    pub screen: usize,
    pub screens_in_section: usize,
}

/// EPUB implementation of [`ContainerEngine`].
///
/// Loading runs on a worker thread that reports back over a channel; every
/// other operation happens on the owner's thread when it polls for events.
pub struct EpubEngine {
    fetcher: Arc<dyn Fetch>,
    phase: Phase,
    source_url: Option<String>,
    loader: Option<Receiver<LoadMessage>>,
    book: Option<LoadedBook>,
    rendition: Option<Rendition>,
    style: RenditionStyle,
    pending_display: Option<DisplayTarget>,
    index: Option<PageIndex>,
    started: bool,
    events: VecDeque<EngineEvent>,
}

impl Default for EpubEngine {
    fn default() -> Self {
        Self::new(Arc::new(DefaultFetcher))
    }
}

impl EpubEngine {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            phase: Phase::Idle,
            source_url: None,
            loader: None,
            book: None,
            rendition: None,
            style: RenditionStyle::default(),
            pending_display: None,
            index: None,
            started: false,
            events: VecDeque::new(),
        }
    }

    pub fn toc(&self) -> &[TocEntry] {
        self.book.as_ref().map_or(&[], |b| b.toc.as_slice())
    }

    pub fn current_location(&self) -> Option<Location> {
        let rendition = self.rendition.as_ref()?;
        let (section, screen) = rendition.position?;
        Some(Location::new(section, rendition.screens[section][screen]))
    }

    pub fn current_screen(&self) -> Option<Screen> {
        let book = self.book.as_ref()?;
        let rendition = self.rendition.as_ref()?;
        let (section, screen) = rendition.position?;
        let starts = &rendition.screens[section];
        let start = starts[screen];
        let end = starts.get(screen + 1).copied().unwrap_or(usize::MAX);
        let section_data = &book.sections[section];
        Some(Screen {
            location: Location::new(section, start),
            section_path: section_data.path.clone(),
            text: section_data.slice(start, end).trim_end().to_string(),
            colors: self.style.colors.clone(),
            font_size_px: self.style.font_size_px,
            screen,
            screens_in_section: starts.len(),
        })
    }

    fn spawn_loader(&self, url: String) -> Result<Receiver<LoadMessage>> {
        let (tx, rx) = mpsc::channel();
        let fetcher = Arc::clone(&self.fetcher);
        thread::Builder::new()
            .name("bookracy-loader".to_string())
            .spawn(move || {
                let message = match LoadedBook::load(fetcher.as_ref(), &url, &tx) {
                    Ok(book) => LoadMessage::Loaded(Box::new(book)),
                    Err(e) => LoadMessage::Failed(e.to_string()),
                };
                // The engine may have been destroyed meanwhile.
                let _ = tx.send(message);
            })
            .map_err(|e| BookracyError::load("", e))?;
        Ok(rx)
    }

    fn handle_message(&mut self, message: LoadMessage) {
        match message {
            LoadMessage::Progress { loaded, total } => {
                self.events.push_back(EngineEvent::LoadProgress { loaded, total });
            }
            LoadMessage::Loaded(book) => {
                self.loader = None;
                self.adopt(*book);
            }
            LoadMessage::Failed(reason) => {
                self.loader = None;
                self.fail(reason);
            }
        }
    }

    fn fail(&mut self, reason: String) {
        warn!("load failed: {reason}");
        self.phase = Phase::Failed;
        self.events.push_back(EngineEvent::RenderError(reason));
    }

    fn loader_disconnected(&mut self) {
        self.loader = None;
        if self.phase == Phase::Loading {
            self.fail("load worker exited without a result".to_string());
        }
    }

    fn drain_loader(&mut self) {
        while let Some(rx) = &self.loader {
            match rx.try_recv() {
                Ok(message) => self.handle_message(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.loader_disconnected(),
            }
        }
    }

    fn adopt(&mut self, book: LoadedBook) {
        info!(
            "loaded {} ({} sections, {} toc entries)",
            self.source_url.as_deref().unwrap_or("book"),
            book.sections.len(),
            book.toc.len()
        );
        self.phase = Phase::Loaded;
        self.events.push_back(EngineEvent::NavigationReady(book.toc.clone()));
        self.book = Some(book);
        self.mark_started();
        if self.relayout() {
            self.display_pending();
        }
    }

    /// `Started` fires once, when a loaded book first meets a rendition.
    fn mark_started(&mut self) {
        if !self.started && self.book.is_some() && self.rendition.is_some() {
            self.started = true;
            self.events.push_back(EngineEvent::Milestone(Milestone::Started));
        }
    }

    /// Lay every section out for the current viewport and style.
    /// Returns false when there is nothing to lay out yet.
    fn relayout(&mut self) -> bool {
        let (Some(book), Some(rendition)) = (&self.book, &mut self.rendition) else {
            return false;
        };
        let (width, height) = rendition.dimensions.resolve(rendition.viewport);
        let metrics = ScreenMetrics::for_viewport(width, height, self.style.font_size_px);
        rendition.screens = book
            .sections
            .iter()
            .map(|section| layout::layout_section(section, metrics))
            .collect();
        debug!("layout {}x{} px -> {metrics:?}", width, height);
        self.events.push_back(EngineEvent::Milestone(Milestone::Layout));
        true
    }

    fn resolve_target(&self, target: &DisplayTarget) -> Result<(usize, usize)> {
        let book = self.book.as_ref().ok_or(BookracyError::NotReady)?;
        match target {
            DisplayTarget::Location(location) => {
                let section = location.spine().min(book.sections.len().saturating_sub(1));
                let offset = location.offset().min(book.sections[section].char_len());
                Ok((section, offset))
            }
            DisplayTarget::Href(href) => book
                .resolve_href(href)
                .ok_or_else(|| BookracyError::UnknownTarget(href.clone())),
            DisplayTarget::Default => Ok(first_toc_href(&book.toc)
                .and_then(|href| book.resolve_href(href))
                .unwrap_or((book.first_linear(), 0))),
        }
    }

    fn display_pending(&mut self) {
        let Some(target) = self.pending_display.take() else {
            return;
        };
        let resolved = self.resolve_target(&target).or_else(|e| {
            warn!("cannot display {target:?}: {e}; showing the default entry point");
            self.resolve_target(&DisplayTarget::Default)
        });
        if let Ok((section, offset)) = resolved {
            self.show(section, offset);
        }
    }

    fn show(&mut self, section: usize, offset: usize) {
        let Some(rendition) = self.rendition.as_mut() else {
            return;
        };
        let Some(starts) = rendition.screens.get(section) else {
            return;
        };
        let screen = layout::screen_containing(starts, offset);
        let start = starts[screen];
        let section_changed = rendition.position.map(|(s, _)| s) != Some(section);
        rendition.position = Some((section, screen));

        if section_changed {
            self.events.push_back(EngineEvent::Milestone(Milestone::Displayed));
        }
        self.events.push_back(EngineEvent::RenderComplete);
        self.events
            .push_back(EngineEvent::Relocated(Location::new(section, start)));
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.phase == Phase::Destroyed {
            Err(BookracyError::Destroyed)
        } else {
            Ok(())
        }
    }
}

impl ContainerEngine for EpubEngine {
    fn open(&mut self, source: &BookSource) -> Result<()> {
        self.ensure_alive()?;
        if self.phase != Phase::Idle {
            return Err(BookracyError::load(&source.url, "engine already opened"));
        }
        info!("opening {} ({})", source.title, source.url);
        self.loader = Some(self.spawn_loader(source.url.clone())?);
        self.source_url = Some(source.url.clone());
        self.phase = Phase::Loading;
        Ok(())
    }

    fn render_into(&mut self, viewport: Viewport, dimensions: Dimensions) -> Result<()> {
        self.ensure_alive()?;
        let current = self.current_location();
        match self.rendition.as_mut() {
            Some(rendition) => {
                debug!("re-attaching rendition to {viewport:?}");
                rendition.viewport = viewport;
                rendition.dimensions = dimensions;
            }
            None => {
                self.rendition = Some(Rendition {
                    viewport,
                    dimensions,
                    screens: Vec::new(),
                    position: None,
                });
                self.mark_started();
            }
        }
        if self.relayout() {
            match current {
                Some(location) => self.show(location.spine(), location.offset()),
                None => self.display_pending(),
            }
        }
        Ok(())
    }

    fn display(&mut self, target: DisplayTarget) -> Result<()> {
        self.ensure_alive()?;
        match self.phase {
            Phase::Idle | Phase::Loading => {
                self.pending_display = Some(target);
                return Ok(());
            }
            Phase::Failed => return Err(BookracyError::NotReady),
            Phase::Loaded | Phase::Destroyed => {}
        }
        if self.rendition.is_none() {
            self.pending_display = Some(target);
            return Ok(());
        }
        let (section, offset) = self.resolve_target(&target)?;
        self.show(section, offset);
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        self.ensure_alive()?;
        let (Some(book), Some(rendition)) = (self.book.as_ref(), self.rendition.as_ref()) else {
            return Ok(());
        };
        let Some((section, screen)) = rendition.position else {
            return Ok(());
        };
        let target = if screen + 1 < rendition.screens[section].len() {
            Some((section, screen + 1))
        } else {
            book.linear_after(section).map(|next| (next, 0))
        };
        if let Some((section, screen)) = target {
            let offset = rendition.screens[section][screen];
            self.show(section, offset);
        }
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        self.ensure_alive()?;
        let (Some(book), Some(rendition)) = (self.book.as_ref(), self.rendition.as_ref()) else {
            return Ok(());
        };
        let Some((section, screen)) = rendition.position else {
            return Ok(());
        };
        let target = if screen > 0 {
            Some((section, screen - 1))
        } else {
            book.linear_before(section)
                .map(|prev| (prev, rendition.screens[prev].len().saturating_sub(1)))
        };
        if let Some((section, screen)) = target {
            let offset = rendition.screens[section][screen];
            self.show(section, offset);
        }
        Ok(())
    }

    fn compute_page_count(&mut self, granularity: usize) -> Result<usize> {
        self.ensure_alive()?;
        let book = self.book.as_ref().ok_or(BookracyError::NotReady)?;
        let index = PageIndex::build(&book.sections, granularity);
        let total = index.total_pages();
        debug!("location index: {total} pages at {} chars", index.granularity());
        self.index = Some(index);
        Ok(total)
    }

    fn location_to_page(&self, location: &Location) -> Result<usize> {
        self.index
            .as_ref()
            .map(|index| index.page_of(location))
            .ok_or(BookracyError::IndexNotReady)
    }

    fn apply_theme(&mut self, colors: ThemeColors) {
        if self.phase == Phase::Destroyed || self.style.colors == colors {
            return;
        }
        self.style.colors = colors;
        if self.current_location().is_some() {
            self.events.push_back(EngineEvent::RenderComplete);
        }
    }

    fn apply_font_size(&mut self, size_px: u32) {
        let size_px = size_px.max(1);
        if self.phase == Phase::Destroyed || self.style.font_size_px == size_px {
            return;
        }
        self.style.font_size_px = size_px;
        let current = self.current_location();
        if self.relayout()
            && let Some(location) = current
        {
            self.show(location.spine(), location.offset());
        }
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        if self.phase == Phase::Destroyed {
            return Vec::new();
        }
        self.drain_loader();
        self.events.drain(..).collect()
    }

    fn wait_events(&mut self, timeout: Duration) -> Vec<EngineEvent> {
        if self.events.is_empty()
            && let Some(rx) = &self.loader
        {
            match rx.recv_timeout(timeout) {
                Ok(message) => self.handle_message(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.loader_disconnected(),
            }
        }
        self.poll_events()
    }

    fn destroy(&mut self) {
        if self.phase != Phase::Destroyed {
            debug!(
                "destroying engine for {}",
                self.source_url.as_deref().unwrap_or("(unopened)")
            );
        }
        self.phase = Phase::Destroyed;
        self.loader = None;
        self.book = None;
        self.rendition = None;
        self.pending_display = None;
        self.index = None;
        self.started = false;
        self.events.clear();
    }
}
