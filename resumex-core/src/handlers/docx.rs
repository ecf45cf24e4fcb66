//! DOCX Handler
//!
//! Reads `word/document.xml` straight from the OOXML package. Word documents
//! carry no layout geometry, so positions are synthetic: each body line gets
//! its own row `(0, i, 100, i + 1)` and table cells are shifted right by
//! `100 × column`, which lets table-based two-column resumes go through the
//! same column reconstruction as PDFs.

use crate::error::{ExtractError, Result};
use crate::handlers::{DocumentContent, DocumentHandler, ExtractionContext};
use crate::links::{docx_hyperlinks, LinkRecoverer};
use crate::types::{Block, BoundingBox, ExtractionMethod};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const APP_PROPERTIES_PART: &str = "docProps/app.xml";

/// Width of one synthetic column
const CELL_WIDTH: f32 = 100.0;

/// Stands in for the numbering glyph Word draws before list paragraphs
const LIST_MARKER: &str = "• ";

#[derive(Debug, Default)]
pub struct DocxHandler;

impl DocxHandler {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentHandler for DocxHandler {
    fn process(&self, bytes: &[u8], _ctx: &ExtractionContext) -> Result<DocumentContent> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let document_xml = read_part(&mut archive, DOCUMENT_PART)?
            .ok_or_else(|| ExtractError::Archive(format!("missing {DOCUMENT_PART}")))?;
        let blocks = parse_document(&document_xml)?;

        let pages = match read_part(&mut archive, APP_PROPERTIES_PART) {
            Ok(Some(xml)) => page_count(&xml).unwrap_or(1),
            _ => 1,
        };

        let mut links = LinkRecoverer::new();
        links.absorb(docx_hyperlinks(&mut archive));

        let mut content = DocumentContent::empty(pages);
        content.page_width = blocks
            .iter()
            .map(|b| b.bbox.x1)
            .fold(CELL_WIDTH, f32::max);
        content.method = if blocks.is_empty() {
            ExtractionMethod::Error
        } else {
            ExtractionMethod::NativeText
        };
        content.blocks = blocks;
        content.links = links.finish();
        Ok(content)
    }

    fn name(&self) -> &str {
        "docx"
    }

    fn extensions(&self) -> &[&'static str] {
        &["docx"]
    }

    fn mime_types(&self) -> &[&'static str] {
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
    }
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// `<Pages>` from the extended properties part
pub fn page_count(xml: &str) -> Option<u32> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut in_pages = false;
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) if e.local_name().as_ref() == b"Pages" => in_pages = true,
            Event::Text(text) if in_pages => {
                return text.unescape().ok()?.trim().parse::<u32>().ok().filter(|n| *n > 0);
            }
            Event::End(e) if e.local_name().as_ref() == b"Pages" => in_pages = false,
            Event::Eof => return None,
            _ => {}
        }
    }
}

/// Where the next line of text goes
#[derive(Default)]
struct Placement {
    /// Next free body row
    line: usize,
    table_depth: usize,
    row_top: usize,
    row_height: usize,
    column: usize,
    cell_line: usize,
}

#[derive(Default)]
struct Paragraph {
    text: String,
    font_name: Option<String>,
    font_size: Option<f32>,
    /// Word list item (`w:numPr`); its marker is rendered, not stored as text
    list_item: bool,
    lines: usize,
}

struct DocumentWalker {
    placement: Placement,
    paragraph: Paragraph,
    in_text: bool,
    blocks: Vec<Block>,
}

impl DocumentWalker {
    fn new() -> Self {
        Self {
            placement: Placement::default(),
            paragraph: Paragraph::default(),
            in_text: false,
            blocks: Vec::new(),
        }
    }

    fn in_table(&self) -> bool {
        self.placement.table_depth > 0
    }

    /// Emit the accumulated text as one Block and move to the next row
    fn flush_line(&mut self) {
        let mut text = std::mem::take(&mut self.paragraph.text);
        if text.trim().is_empty() {
            return;
        }
        if self.paragraph.list_item && self.paragraph.lines == 0 {
            text.insert_str(0, LIST_MARKER);
        }
        self.paragraph.lines += 1;

        let (x0, y) = if self.in_table() {
            let y = self.placement.row_top + self.placement.cell_line;
            self.placement.cell_line += 1;
            (self.placement.column as f32 * CELL_WIDTH, y)
        } else {
            let y = self.placement.line;
            self.placement.line += 1;
            (0.0, y)
        };

        let bbox = BoundingBox::new(x0, y as f32, x0 + CELL_WIDTH, y as f32 + 1.0);
        if let Some(block) = Block::native(&text, bbox, 1) {
            self.blocks.push(block.with_font(
                self.paragraph.font_name.clone(),
                self.paragraph.font_size,
            ));
        }
    }

    fn run_property(&mut self, element: &BytesStart) -> Result<()> {
        match element.local_name().as_ref() {
            b"rFonts" if self.paragraph.font_name.is_none() => {
                self.paragraph.font_name = attribute(element, &["ascii", "hAnsi", "cs"])?;
            }
            b"sz" if self.paragraph.font_size.is_none() => {
                // Half-points
                self.paragraph.font_size = attribute(element, &["val"])?
                    .and_then(|v| v.parse::<f32>().ok())
                    .map(|half_points| half_points / 2.0);
            }
            _ => {}
        }
        Ok(())
    }

    fn start(&mut self, element: &BytesStart) -> Result<()> {
        let nested = self.placement.table_depth > 1;
        match element.local_name().as_ref() {
            b"p" => self.paragraph = Paragraph::default(),
            b"t" => self.in_text = true,
            b"tbl" => self.placement.table_depth += 1,
            b"tr" if !nested => {
                self.placement.row_top = self.placement.line;
                self.placement.row_height = 1;
                self.placement.column = 0;
            }
            b"tc" if !nested => self.placement.cell_line = 0,
            b"numPr" => self.paragraph.list_item = true,
            _ => self.run_property(element)?,
        }
        Ok(())
    }

    fn empty(&mut self, element: &BytesStart) -> Result<()> {
        match element.local_name().as_ref() {
            b"tab" => self.paragraph.text.push(' '),
            b"br" | b"cr" => self.flush_line(),
            _ => self.run_property(element)?,
        }
        Ok(())
    }

    fn end(&mut self, local_name: &[u8]) {
        let nested = self.placement.table_depth > 1;
        match local_name {
            b"t" => self.in_text = false,
            b"p" => self.flush_line(),
            b"tc" if !nested => {
                self.placement.row_height = self.placement.row_height.max(self.placement.cell_line);
                self.placement.column += 1;
            }
            b"tr" if !nested => {
                self.placement.line = self.placement.row_top + self.placement.row_height;
            }
            b"tbl" => self.placement.table_depth = self.placement.table_depth.saturating_sub(1),
            _ => {}
        }
    }
}

/// First attribute whose local name is in `keys`
fn attribute(element: &BytesStart, keys: &[&str]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| ExtractError::Archive(e.to_string()))?;
        let name = attr.key.local_name();
        if keys.iter().any(|key| key.as_bytes() == name.as_ref()) {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Body paragraphs and table cells of `word/document.xml` as Blocks
pub fn parse_document(xml: &str) -> Result<Vec<Block>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut walker = DocumentWalker::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => walker.start(&e)?,
            Event::Empty(e) => walker.empty(&e)?,
            Event::End(e) => walker.end(e.local_name().as_ref()),
            Event::Text(text) if walker.in_text => {
                walker.paragraph.text.push_str(&text.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(walker.blocks)
}
