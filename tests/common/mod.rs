#![allow(dead_code)]

use assert_cmd::Command;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub fn bookracy(store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bookracy").unwrap();
    cmd.env("BOOKRACY_STORE", store).env_remove("RUST_LOG");
    cmd
}

/// `count` words of filler text.
pub fn words(count: usize) -> String {
    const WORDS: [&str; 6] = ["the", "spice", "must", "flow", "across", "arrakis"];
    (0..count)
        .map(|i| WORDS[i % WORDS.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builder for small EPUB archives.
pub struct EpubFixture {
    title: String,
    chapters: Vec<(String, String)>,
    toc: Vec<(String, String)>,
    ncx: bool,
}

impl EpubFixture {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            chapters: Vec::new(),
            toc: Vec::new(),
            ncx: false,
        }
    }

    /// Add a spine document `name` with the given body markup.
    pub fn chapter(mut self, name: &str, body: &str) -> Self {
        self.chapters.push((name.to_string(), body.to_string()));
        self
    }

    pub fn toc_entry(mut self, label: &str, href: &str) -> Self {
        self.toc.push((label.to_string(), href.to_string()));
        self
    }

    /// Write the ToC as an EPUB 2 NCX instead of a nav document.
    pub fn ncx(mut self) -> Self {
        self.ncx = true;
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut manifest = String::new();
        let mut spine = String::new();
        for (i, (name, _)) in self.chapters.iter().enumerate() {
            manifest.push_str(&format!(
                r#"<item id="c{i}" href="text/{name}" media-type="application/xhtml+xml"/>"#
            ));
            spine.push_str(&format!(r#"<itemref idref="c{i}"/>"#));
        }
        let has_toc = !self.toc.is_empty();
        let (version, spine_attr) = if self.ncx { ("2.0", r#" toc="ncx""#) } else { ("3.0", "") };
        if has_toc && self.ncx {
            manifest.push_str(
                r#"<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
            );
        } else if has_toc {
            manifest.push_str(
                r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
            );
        }
        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="{version}" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:fixture</dc:identifier>
    <dc:title>{}</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>{manifest}</manifest>
  <spine{spine_attr}>{spine}</spine>
</package>"#,
            self.title
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflate =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        zip.start_file("META-INF/container.xml", deflate).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OPS/package.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#,
        )
        .unwrap();
        zip.start_file("OPS/package.opf", deflate).unwrap();
        zip.write_all(opf.as_bytes()).unwrap();

        if has_toc && self.ncx {
            let points: String = self
                .toc
                .iter()
                .enumerate()
                .map(|(i, (label, href))| {
                    format!(
                        r#"<navPoint id="p{i}" playOrder="{}"><navLabel><text>{label}</text></navLabel><content src="{href}"/></navPoint>"#,
                        i + 1
                    )
                })
                .collect();
            zip.start_file("OPS/toc.ncx", deflate).unwrap();
            zip.write_all(
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1"><navMap>{points}</navMap></ncx>"#
                )
                .as_bytes(),
            )
            .unwrap();
        } else if has_toc {
            let items: String = self
                .toc
                .iter()
                .map(|(label, href)| format!(r#"<li><a href="{href}">{label}</a></li>"#))
                .collect();
            zip.start_file("OPS/nav.xhtml", deflate).unwrap();
            zip.write_all(
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body><nav epub:type="toc"><h1>Contents</h1><ol>{items}</ol></nav></body></html>"#
                )
                .as_bytes(),
            )
            .unwrap();
        }

        for (name, body) in &self.chapters {
            zip.start_file(format!("OPS/text/{name}"), deflate).unwrap();
            zip.write_all(
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>{name}</title></head><body>{body}</body></html>"#
                )
                .as_bytes(),
            )
            .unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.bytes()).unwrap();
        path
    }
}

/// Cover page, then two long chapters listed in a nav document.
pub fn novel() -> EpubFixture {
    EpubFixture::new("Dune")
        .chapter("cover.xhtml", "<p>Cover</p>")
        .chapter("ch1.xhtml", &format!("<h1>Book One</h1><p>{}</p>", words(900)))
        .chapter(
            "ch2.xhtml",
            &format!(
                r#"<h1>Book Two</h1><p>{}</p><h2 id="muaddib">Muad'Dib</h2><p>{}</p>"#,
                words(500),
                words(500)
            ),
        )
        .toc_entry("Book One", "text/ch1.xhtml")
        .toc_entry("Book Two", "text/ch2.xhtml")
        .toc_entry("Muad'Dib", "text/ch2.xhtml#muaddib")
}
