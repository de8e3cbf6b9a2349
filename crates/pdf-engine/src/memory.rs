//! In-memory backend.
//!
//! A document is a list of pages, each with its own word boxes, font runs
//! and annotations, serialised as JSON. Rendering paints word boxes as solid
//! ink blocks so pixel tests can tell text from blank paper.

use crate::{
    page_out_of_range, DocumentHandle, OpenSource, PageSize, PdfEngine, PdfEngineError,
    RenderRequest, RgbaImage, TextInsertion,
};
use doc_model::{Annotation, AnnotationKind, Rect, TextSpan, Word};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([48, 48, 48, 255]);
const ANNOTATION_OUTLINE: Rgba<u8> = Rgba([240, 180, 0, 255]);

/// Average glyph advance as a share of the font size.
const ADVANCE_RATIO: f32 = 0.5;
const ASCENT_RATIO: f32 = 0.79;
const DESCENT_RATIO: f32 = 0.21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAnnotation {
    pub kind: AnnotationKind,
    pub rect: Rect,
    #[serde(default)]
    pub contents: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPage {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub spans: Vec<TextSpan>,
    #[serde(default)]
    pub annotations: Vec<MemoryAnnotation>,
}

impl MemoryPage {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height, words: Vec::new(), spans: Vec::new(), annotations: Vec::new() }
    }

    /// Add a line of words starting at `(x, y)` set in `font` at `size`.
    ///
    /// Word boxes follow the same advance metrics used for inserted text.
    pub fn with_line(mut self, x: f32, y: f32, text: &str, font: &str, size: f32) -> Self {
        let line_no = self.words.iter().map(|word| word.line_no + 1).max().unwrap_or(0);
        let mut cursor = x;
        let mut line_rect: Option<Rect> = None;

        for (word_no, token) in text.split_whitespace().enumerate() {
            let rect = Rect::new(cursor, y, cursor + advance(token, size), y + size);
            self.words.push(Word::new(rect, token).at_position(0, line_no, word_no as u32));
            line_rect = Some(line_rect.map_or(rect, |acc| acc.union(&rect)));
            cursor = rect.x1 + advance(" ", size);
        }

        if let Some(rect) = line_rect {
            self.spans.push(TextSpan { rect, text: text.to_owned(), font: font.to_owned(), size });
        }

        self
    }

    pub fn with_annotation(mut self, kind: AnnotationKind, rect: Rect, contents: Option<&str>) -> Self {
        self.annotations.push(MemoryAnnotation {
            kind,
            rect,
            contents: contents.map(str::to_owned),
        });
        self
    }

    fn size(&self) -> PageSize {
        PageSize { width_pt: self.width, height_pt: self.height }
    }

    /// Put an inserted word on the line it vertically overlaps and renumber
    /// that line left to right.
    fn place_word(&mut self, mut word: Word) {
        let center_y = word.rect.center().y;
        let line = self
            .words
            .iter()
            .find(|other| center_y >= other.rect.y0 && center_y <= other.rect.y1)
            .map(|other| (other.block_no, other.line_no));

        let (block_no, line_no) = match line {
            Some(found) => found,
            None => (0, self.words.iter().map(|other| other.line_no + 1).max().unwrap_or(0)),
        };

        word.block_no = block_no;
        word.line_no = line_no;
        self.words.push(word);

        let mut on_line: Vec<usize> = (0..self.words.len())
            .filter(|&i| self.words[i].block_no == block_no && self.words[i].line_no == line_no)
            .collect();
        on_line.sort_by(|&a, &b| self.words[a].rect.x0.total_cmp(&self.words[b].rect.x0));

        for (word_no, index) in on_line.into_iter().enumerate() {
            self.words[index].word_no = word_no as u32;
        }

        self.words.sort_by_key(|word| (word.block_no, word.line_no, word.word_no));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub pages: Vec<MemoryPage>,
}

impl MemoryDocument {
    pub fn new(pages: Vec<MemoryPage>) -> Self {
        Self { pages }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, PdfEngineError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        let document: MemoryDocument = serde_json::from_slice(bytes)?;
        if document.pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }
        Ok(document)
    }
}

fn advance(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * ADVANCE_RATIO
}

#[derive(Debug, Default)]
pub struct MemoryEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, MemoryDocument>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already built document.
    pub fn insert(&mut self, document: MemoryDocument) -> DocumentHandle {
        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, document);
        handle
    }

    pub fn document(&self, handle: DocumentHandle) -> Result<&MemoryDocument, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page(&self, handle: DocumentHandle, page_index: u32) -> Result<&MemoryPage, PdfEngineError> {
        let document = self.document(handle)?;
        document
            .pages
            .get(page_index as usize)
            .ok_or_else(|| page_out_of_range(page_index, document.pages.len() as u32))
    }

    fn page_mut(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<&mut MemoryPage, PdfEngineError> {
        let document =
            self.docs.get_mut(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))?;
        let page_count = document.pages.len() as u32;
        document.pages.get_mut(page_index as usize).ok_or_else(|| page_out_of_range(page_index, page_count))
    }
}

fn fill(image: &mut RgbaImage, rect: &Rect, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    let x0 = rect.x0.floor().max(0.0) as u32;
    let y0 = rect.y0.floor().max(0.0) as u32;
    let x1 = (rect.x1.ceil().max(0.0) as u32).min(width);
    let y1 = (rect.y1.ceil().max(0.0) as u32).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x, y, color);
        }
    }
}

fn outline(image: &mut RgbaImage, rect: &Rect, color: Rgba<u8>) {
    fill(image, &Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + 1.0), color);
    fill(image, &Rect::new(rect.x0, rect.y1 - 1.0, rect.x1, rect.y1), color);
    fill(image, &Rect::new(rect.x0, rect.y0, rect.x0 + 1.0, rect.y1), color);
    fill(image, &Rect::new(rect.x1 - 1.0, rect.y0, rect.x1, rect.y1), color);
}

impl PdfEngine for MemoryEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let document = MemoryDocument::from_json(&source.into_bytes()?)?;
        debug!(pages = document.pages.len(), "opened memory document");
        Ok(self.insert(document))
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.document(handle)?.pages.len() as u32)
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, PdfEngineError> {
        Ok(self.page(handle, page_index)?.size())
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = self.page(handle, request.page_index)?;
        let scale = request.effective_scale();

        let region = match request.clip {
            Some(clip) => clip.intersection(&page.size().bounds()).unwrap_or(Rect::new(
                clip.x0,
                clip.y0,
                clip.x0,
                clip.y0,
            )),
            None => page.size().bounds(),
        };

        let (width, height) = request.pixel_size(&region)?;
        let mut image = RgbaImage::from_pixel(width, height, PAPER);

        let to_pixels = |rect: &Rect| rect.translate(-region.x0, -region.y0).scale(scale);

        for word in &page.words {
            fill(&mut image, &to_pixels(&word.rect), INK);
        }
        for annotation in &page.annotations {
            outline(&mut image, &to_pixels(&annotation.rect), ANNOTATION_OUTLINE);
        }

        Ok(image)
    }

    fn words(&self, handle: DocumentHandle, page_index: u32) -> Result<Vec<Word>, PdfEngineError> {
        Ok(self.page(handle, page_index)?.words.clone())
    }

    fn text_spans(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextSpan>, PdfEngineError> {
        Ok(self.page(handle, page_index)?.spans.clone())
    }

    fn redact(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        area: Rect,
    ) -> Result<(), PdfEngineError> {
        let page = self.page_mut(handle, page_index)?;
        let before = page.words.len();
        page.words.retain(|word| !word.rect.intersects(&area));
        // Runs only disappear once nothing of them is left; a partly
        // redacted run still describes the style of its remaining words.
        page.spans.retain(|span| span.rect.intersection(&area) != Some(span.rect));
        debug!(page = page_index, removed = before - page.words.len(), "redacted area");
        Ok(())
    }

    fn insert_text(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        insertion: &TextInsertion,
    ) -> Result<(), PdfEngineError> {
        let page = self.page_mut(handle, page_index)?;
        let size = insertion.size;
        let top = insertion.origin.y - size * ASCENT_RATIO;
        let bottom = insertion.origin.y + size * DESCENT_RATIO;
        let mut cursor = insertion.origin.x;

        for token in insertion.text.split_whitespace() {
            let rect = Rect::new(cursor, top, cursor + advance(token, size), bottom);
            page.spans.push(TextSpan {
                rect,
                text: token.to_owned(),
                font: insertion.font.postscript_name().to_owned(),
                size,
            });
            page.place_word(Word::new(rect, token));
            cursor = rect.x1 + advance(" ", size);
        }

        Ok(())
    }

    fn annotations(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<Annotation>, PdfEngineError> {
        let page = self.page(handle, page_index)?;
        Ok(page
            .annotations
            .iter()
            .enumerate()
            .map(|(index, annotation)| Annotation {
                index,
                kind: annotation.kind,
                rect: annotation.rect,
                contents: annotation.contents.clone(),
            })
            .collect())
    }

    fn move_annotation(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        index: usize,
        dx: f32,
        dy: f32,
    ) -> Result<(), PdfEngineError> {
        let page = self.page_mut(handle, page_index)?;
        let annotation = page
            .annotations
            .get_mut(index)
            .ok_or(PdfEngineError::AnnotationOutOfRange { page: page_index, index })?;
        annotation.rect = annotation.rect.translate(dx, dy);
        Ok(())
    }

    fn delete_annotation(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        index: usize,
    ) -> Result<(), PdfEngineError> {
        let page = self.page_mut(handle, page_index)?;
        if index >= page.annotations.len() {
            return Err(PdfEngineError::AnnotationOutOfRange { page: page_index, index });
        }
        page.annotations.remove(index);
        Ok(())
    }

    fn save(&self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError> {
        fs::write(path, self.document(handle)?.to_json()?)?;
        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}
