//! PDF engine abstraction.
//!
//! The editor talks to documents only through [`PdfEngine`]. Rasterising,
//! text extraction and page mutation are the backend's job:
//!
//! - [`PdfiumEngine`] (feature `pdfium`) drives PDFium through
//!   `pdfium-render` and works on real PDF files;
//! - [`MemoryEngine`] keeps documents as JSON-described pages and is used by
//!   tests and headless tooling;
//! - [`probe`] inspects a PDF with `lopdf` without loading a renderer.

use doc_model::{Annotation, BaseFont, Point, Rect, TextSpan, Word};
use image::{ImageBuffer, Rgba};
use std::path::{Path, PathBuf};

pub mod glyphs;
pub mod memory;
pub mod probe;

#[cfg(feature = "pdfium")]
pub mod pdfium;

pub use memory::{MemoryAnnotation, MemoryDocument, MemoryEngine, MemoryPage};
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumEngine;
pub use probe::{probe, probe_file, DocumentInfo};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width_pt, self.height_pt)
    }
}

/// Largest bitmap a backend will allocate, in pixels.
pub const MAX_RENDER_PIXELS: u64 = 100_000_000;

/// Render a page, or a clipped part of it, at `scale` pixels per point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
    /// Region in page space (top-left origin).
    pub clip: Option<Rect>,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0, clip: None }
    }
}

impl RenderRequest {
    pub fn effective_scale(&self) -> f32 {
        if self.scale > 0.0 && self.scale.is_finite() {
            self.scale
        } else {
            1.0
        }
    }

    /// Bitmap size for drawing `region` (page space) at the effective
    /// scale. Sizes above [`MAX_RENDER_PIXELS`] are refused before anything
    /// is allocated.
    pub fn pixel_size(&self, region: &Rect) -> Result<(u32, u32), PdfEngineError> {
        let scale = self.effective_scale();
        let width = (region.width() * scale).round().max(1.0) as u64;
        let height = (region.height() * scale).round().max(1.0) as u64;

        if width.saturating_mul(height) > MAX_RENDER_PIXELS {
            return Err(PdfEngineError::RenderTooLarge { width, height });
        }
        Ok((width as u32, height as u32))
    }
}

/// Text to draw onto a page with one of the built-in fonts.
#[derive(Debug, Clone, PartialEq)]
pub struct TextInsertion {
    /// Baseline start point in page space (top-left origin).
    pub origin: Point,
    pub text: String,
    pub font: BaseFont,
    pub size: f32,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl OpenSource {
    pub(crate) fn into_bytes(self) -> Result<Vec<u8>, PdfEngineError> {
        match self {
            OpenSource::Path(path) => Ok(std::fs::read(path)?),
            OpenSource::Bytes(bytes) => Ok(bytes),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("document description error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("annotation {index} out of range on page {page}")]
    AnnotationOutOfRange { page: u32, index: usize },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("render of {width}x{height} pixels exceeds the limit of {} pixels", MAX_RENDER_PIXELS)]
    RenderTooLarge { width: u64, height: u64 },
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32)
        -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;

    /// Words of a page in reading order, boxes in page space.
    fn words(&self, handle: DocumentHandle, page_index: u32) -> Result<Vec<Word>, PdfEngineError>;

    /// Font runs of a page, used to match the style of edited text.
    fn text_spans(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextSpan>, PdfEngineError>;

    /// Remove all text intersecting `area` and blank it out.
    ///
    /// Afterwards [`PdfEngine::words`] reports no word intersecting `area`.
    fn redact(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        area: Rect,
    ) -> Result<(), PdfEngineError>;

    fn insert_text(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        insertion: &TextInsertion,
    ) -> Result<(), PdfEngineError>;

    fn annotations(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<Annotation>, PdfEngineError>;

    /// Shift an annotation by a page-space delta.
    fn move_annotation(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        index: usize,
        dx: f32,
        dy: f32,
    ) -> Result<(), PdfEngineError>;

    fn delete_annotation(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        index: usize,
    ) -> Result<(), PdfEngineError>;

    fn save(&self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

/// Backends that can be picked at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Pdfium,
    Memory,
}

impl EngineKind {
    /// The richest backend compiled into this build.
    pub fn preferred() -> Self {
        if cfg!(feature = "pdfium") {
            Self::Pdfium
        } else {
            Self::Memory
        }
    }
}

pub fn create_engine(kind: EngineKind) -> Result<Box<dyn PdfEngine>, PdfEngineError> {
    match kind {
        EngineKind::Memory => Ok(Box::new(MemoryEngine::new())),
        #[cfg(feature = "pdfium")]
        EngineKind::Pdfium => Ok(Box::new(PdfiumEngine::bind()?)),
        #[cfg(not(feature = "pdfium"))]
        EngineKind::Pdfium => {
            Err(PdfEngineError::Backend("built without the `pdfium` feature".to_owned()))
        }
    }
}

pub fn default_engine() -> Result<Box<dyn PdfEngine>, PdfEngineError> {
    create_engine(EngineKind::preferred())
}

pub(crate) fn page_out_of_range(page: u32, page_count: u32) -> PdfEngineError {
    PdfEngineError::PageOutOfRange { page, page_count }
}
