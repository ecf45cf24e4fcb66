//! Hyperlink recovery.
//!
//! PDF links are read per page by the page source (annotation rectangles are
//! available there); DOCX links come from the relationship part of the main
//! document. Every path funnels through `LinkRecoverer`, which keeps the first
//! occurrence of each URL.

use crate::error::{ExtractError, Result};
use crate::types::Link;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::io::{Read, Seek};

const DOCX_RELATIONSHIPS: &str = "word/_rels/document.xml.rels";
const HYPERLINK_TYPE_SUFFIX: &str = "/hyperlink";

#[derive(Debug, Default)]
pub struct LinkRecoverer {
    links: Vec<Link>,
    seen: HashSet<String>,
}

impl LinkRecoverer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link unless its URL was already recorded. Returns whether it was added.
    pub fn add(&mut self, mut link: Link) -> bool {
        let url = link.url.trim();
        if url.is_empty() || self.seen.contains(url) {
            return false;
        }
        link.url = url.to_string();
        self.seen.insert(link.url.clone());
        self.links.push(link);
        true
    }

    pub fn extend(&mut self, links: impl IntoIterator<Item = Link>) {
        for link in links {
            self.add(link);
        }
    }

    /// Record links from a recovery attempt. Failures are logged and absorbed.
    pub fn absorb(&mut self, attempt: Result<Vec<Link>>) {
        match attempt {
            Ok(links) => self.extend(links),
            Err(err) => {
                let err = match err {
                    err @ ExtractError::LinkRecoveryFailed(_) => err,
                    other => ExtractError::LinkRecoveryFailed(other.to_string()),
                };
                log::debug!("{err}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn finish(self) -> Vec<Link> {
        self.links
    }
}

/// Deduplicate an arbitrary link list by URL, first occurrence wins
pub fn dedup_links(links: Vec<Link>) -> Vec<Link> {
    let mut recoverer = LinkRecoverer::new();
    recoverer.extend(links);
    recoverer.finish()
}

/// Hyperlink targets of a DOCX package. DOCX carries no geometry, so `rect`
/// is absent and every link is attributed to page 1.
pub fn docx_hyperlinks<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<Vec<Link>> {
    let mut part = match archive.by_name(DOCX_RELATIONSHIPS) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(Vec::new()),
        Err(e) => return Err(ExtractError::LinkRecoveryFailed(e.to_string())),
    };
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| ExtractError::LinkRecoveryFailed(e.to_string()))?;
    parse_relationships(&xml)
}

/// Extract hyperlink relationship targets from a `.rels` part
pub fn parse_relationships(xml: &str) -> Result<Vec<Link>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut links = Vec::new();
    loop {
        let event = reader
            .read_event()
            .map_err(|e| ExtractError::LinkRecoveryFailed(e.to_string()))?;
        match event {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut rel_type = None;
                let mut target = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| ExtractError::LinkRecoveryFailed(e.to_string()))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| ExtractError::LinkRecoveryFailed(e.to_string()))?
                        .into_owned();
                    match attr.key.as_ref() {
                        b"Type" => rel_type = Some(value),
                        b"Target" => target = Some(value),
                        _ => {}
                    }
                }
                if let (Some(rel_type), Some(target)) = (rel_type, target) {
                    if rel_type.ends_with(HYPERLINK_TYPE_SUFFIX) {
                        links.push(Link {
                            url: target,
                            page: 1,
                            rect: None,
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn link(url: &str, page: u32) -> Link {
        Link {
            url: url.to_string(),
            page,
            rect: Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
        }
    }

    #[test]
    fn same_url_on_two_pages_is_kept_once() {
        let links = dedup_links(vec![link("https://github.com/x", 1), link("https://github.com/x", 2)]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].page, 1);
    }

    #[test]
    fn whitespace_around_url_is_ignored() {
        let mut recoverer = LinkRecoverer::new();
        assert!(recoverer.add(link(" https://a.dev ", 1)));
        assert!(!recoverer.add(link("https://a.dev", 2)));
        assert!(!recoverer.add(link("   ", 2)));
        assert_eq!(recoverer.finish()[0].url, "https://a.dev");
    }

    #[test]
    fn failed_attempts_are_absorbed() {
        let mut recoverer = LinkRecoverer::new();
        recoverer.absorb(Ok(vec![link("https://a.dev", 1)]));
        recoverer.absorb(Err(ExtractError::PageCorrupt {
            page: 2,
            reason: "bad annotation".to_string(),
        }));
        assert_eq!(recoverer.len(), 1);
    }

    #[test]
    fn parses_hyperlink_relationships_only() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://github.com/jane?tab=repositories&amp;q=rust" TargetMode="External"/>
  <Relationship Id="rId6" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="mailto:jane@example.com" TargetMode="External"/>
</Relationships>"#;
        let links = parse_relationships(xml).unwrap();
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://github.com/jane?tab=repositories&q=rust", "mailto:jane@example.com"]);
        assert!(links.iter().all(|l| l.rect.is_none() && l.page == 1));
    }
}
