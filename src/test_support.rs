//! In-memory EPUB archives and an engine double for unit tests.

use crate::engine::{
    BookSource, ContainerEngine, Dimensions, DisplayTarget, EngineEvent, Fetch, Location,
    ThemeColors, Viewport,
};
use crate::error::{BookracyError, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::rc::Rc;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const XHTML_PROLOGUE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">"#;

/// `count` words of filler text.
pub fn words(count: usize) -> String {
    const WORDS: [&str; 8] = [
        "lorem",
        "ipsum",
        "dolor",
        "sit",
        "amet",
        "consectetur",
        "adipiscing",
        "elit",
    ];
    (0..count)
        .map(|i| WORDS[i % WORDS.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build an EPUB 3 archive. `chapters` are `(file name, body xhtml)` pairs
/// placed under `OEBPS/`; `toc` entries are `(label, href)` pairs written to a
/// nav document (omitted when `toc` is empty).
pub fn build_epub(chapters: &[(&str, &str)], toc: &[(&str, &str)]) -> Vec<u8> {
    build_epub_with_non_linear(chapters, toc, &[])
}

/// Like [`build_epub`], with the chapters named in `non_linear` marked
/// `linear="no"` in the spine.
pub fn build_epub_with_non_linear(
    chapters: &[(&str, &str)],
    toc: &[(&str, &str)],
    non_linear: &[&str],
) -> Vec<u8> {
    let mut manifest = String::new();
    let mut spine = String::new();
    for (i, (name, _)) in chapters.iter().enumerate() {
        manifest.push_str(&format!(
            r#"<item id="c{i}" href="{name}" media-type="application/xhtml+xml"/>"#
        ));
        let linear = if non_linear.contains(name) { r#" linear="no""# } else { "" };
        spine.push_str(&format!(r#"<itemref idref="c{i}"{linear}/>"#));
    }
    if !toc.is_empty() {
        manifest.push_str(
            r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
        );
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:fixture</dc:identifier>
    <dc:title>Fixture Book</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>{manifest}</manifest>
  <spine>{spine}</spine>
</package>"#
    );

    let nav_items: String = toc
        .iter()
        .map(|(label, href)| format!(r#"<li><a href="{href}">{label}</a></li>"#))
        .collect();
    let nav = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body><nav epub:type="toc"><ol>{nav_items}</ol></nav></body></html>"#
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflate = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", deflate).unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
    )
    .unwrap();
    zip.start_file("OEBPS/content.opf", deflate).unwrap();
    zip.write_all(opf.as_bytes()).unwrap();
    if !toc.is_empty() {
        zip.start_file("OEBPS/nav.xhtml", deflate).unwrap();
        zip.write_all(nav.as_bytes()).unwrap();
    }
    for (name, body) in chapters {
        zip.start_file(format!("OEBPS/{name}"), deflate).unwrap();
        let document = format!("{XHTML_PROLOGUE}<body>{body}</body></html>");
        zip.write_all(document.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A fetcher that reports half of its bytes, then holds the rest back until
/// [`GatedFetcher::release`] is called (or the gate is dropped).
pub struct GatedFetcher {
    bytes: Vec<u8>,
    gate: Mutex<Receiver<()>>,
}

pub struct Gate(Sender<()>);

impl Gate {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

impl GatedFetcher {
    pub fn new(bytes: Vec<u8>) -> (Self, Gate) {
        let (tx, rx) = mpsc::channel();
        let fetcher = Self {
            bytes,
            gate: Mutex::new(rx),
        };
        (fetcher, Gate(tx))
    }
}

impl Fetch for GatedFetcher {
    fn fetch(&self, url: &str, progress: &mut dyn FnMut(u64, Option<u64>)) -> Result<Vec<u8>> {
        let total = self.bytes.len() as u64;
        progress(total / 2, Some(total));
        let gate = self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        gate.recv()
            .map_err(|_| BookracyError::load(url, "transfer abandoned"))?;
        progress(total, Some(total));
        Ok(self.bytes.clone())
    }
}

/// What a [`ScriptedEngine`] was asked to do, and what it will emit next.
#[derive(Debug, Default)]
pub struct Script {
    pub events: VecDeque<EngineEvent>,
    pub opened: Vec<BookSource>,
    pub displayed: Vec<DisplayTarget>,
    pub turns: Vec<&'static str>,
    pub font_sizes: Vec<u32>,
    pub themes: Vec<ThemeColors>,
    pub destroy_count: usize,
    /// Page total reported once the index is requested; `None` fails.
    pub page_total: Option<usize>,
    pub index_built: bool,
    pub fail_render: bool,
}

/// Engine double that replays queued events and records every call.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine(pub Rc<RefCell<Script>>);

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: EngineEvent) {
        self.0.borrow_mut().events.push_back(event);
    }

    pub fn script(&self) -> std::cell::Ref<'_, Script> {
        self.0.borrow()
    }
}

impl ContainerEngine for ScriptedEngine {
    fn open(&mut self, source: &BookSource) -> Result<()> {
        self.0.borrow_mut().opened.push(source.clone());
        Ok(())
    }

    fn render_into(&mut self, _viewport: Viewport, _dimensions: Dimensions) -> Result<()> {
        if self.0.borrow().fail_render {
            return Err(BookracyError::NotReady);
        }
        Ok(())
    }

    fn display(&mut self, target: DisplayTarget) -> Result<()> {
        self.0.borrow_mut().displayed.push(target);
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        self.0.borrow_mut().turns.push("next");
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        self.0.borrow_mut().turns.push("prev");
        Ok(())
    }

    fn compute_page_count(&mut self, _granularity: usize) -> Result<usize> {
        let mut script = self.0.borrow_mut();
        let total = script.page_total.ok_or(BookracyError::NotReady)?;
        script.index_built = true;
        Ok(total)
    }

    fn location_to_page(&self, location: &Location) -> Result<usize> {
        let script = self.0.borrow();
        match script.page_total {
            Some(total) if script.index_built => Ok((location.spine() + 1).min(total)),
            _ => Err(BookracyError::IndexNotReady),
        }
    }

    fn apply_theme(&mut self, colors: ThemeColors) {
        self.0.borrow_mut().themes.push(colors);
    }

    fn apply_font_size(&mut self, size_px: u32) {
        self.0.borrow_mut().font_sizes.push(size_px);
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        let mut script = self.0.borrow_mut();
        if script.destroy_count > 0 {
            return Vec::new();
        }
        script.events.drain(..).collect()
    }

    fn destroy(&mut self) {
        self.0.borrow_mut().destroy_count += 1;
    }
}
