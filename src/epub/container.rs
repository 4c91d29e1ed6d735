use crate::error::{BookracyError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// Parse META-INF/container.xml and return the path of the OPF package.
///
/// When several rootfiles are listed, the first one declaring the OPF media
/// type wins; otherwise the first rootfile is used.
pub fn parse_container(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut fallback: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                let mut path = None;
                let mut media_type = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"full-path" => {
                            path = Some(String::from_utf8_lossy(&attr.value).into_owned())
                        }
                        b"media-type" => {
                            media_type = Some(String::from_utf8_lossy(&attr.value).into_owned())
                        }
                        _ => {}
                    }
                }
                if let Some(path) = path.filter(|p| !p.is_empty()) {
                    if media_type.as_deref() == Some(OPF_MEDIA_TYPE) {
                        return Ok(path);
                    }
                    fallback.get_or_insert(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(BookracyError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    fallback.ok_or_else(|| BookracyError::InvalidEpub("no rootfile found in container.xml".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_container_nested_opf() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;
        assert_eq!(parse_container(xml).unwrap(), "OEBPS/content.opf");
    }

    #[test]
    fn parse_container_prefers_opf_media_type() {
        let xml = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="book.pdf" media-type="application/pdf"/>
    <rootfile full-path="content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;
        assert_eq!(parse_container(xml).unwrap(), "content.opf");
    }

    #[test]
    fn parse_container_missing_rootfile() {
        let xml = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
  </rootfiles>
</container>"#;
        assert!(parse_container(xml).is_err());
    }

    #[test]
    fn parse_container_malformed_xml() {
        let xml = "<container><rootfiles></container>";
        assert!(parse_container(xml).is_err());
    }
}
