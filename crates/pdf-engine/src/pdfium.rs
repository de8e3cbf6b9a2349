//! PDFium backend.
//!
//! PDFium reports geometry with a bottom-left origin; everything crossing
//! the trait boundary is flipped into the model's top-left page space.

use crate::glyphs::{group_spans, group_words, surviving_runs, touches_area, Glyph, PlacedGlyph, SurvivingRun};
use crate::{
    page_out_of_range, DocumentHandle, OpenSource, PageSize, PdfEngine, PdfEngineError,
    RenderRequest, RgbaImage, TextInsertion,
};
use doc_model::{Annotation, AnnotationKind, BaseFont, Point, Rect, TextSpan, Word};
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Environment variable naming a directory that holds the PDFium library.
pub const PDFIUM_DIR_ENV: &str = "VELLUM_PDFIUM_DIR";

/// The library is bound once per process; documents borrow it for their
/// whole lifetime.
static PDFIUM: OnceLock<Pdfium> = OnceLock::new();

pub struct PdfiumEngine {
    pdfium: &'static Pdfium,
    next_handle: u64,
    docs: HashMap<DocumentHandle, PdfDocument<'static>>,
}

fn backend(err: PdfiumError) -> PdfEngineError {
    PdfEngineError::Backend(err.to_string())
}

/// Directories searched for the shared library, most specific first.
fn library_dirs(env_dir: Option<PathBuf>, exe_dir: Option<PathBuf>) -> Vec<PathBuf> {
    env_dir.into_iter().chain(exe_dir).chain([PathBuf::from("./")]).collect()
}

fn bind_library() -> Result<Pdfium, PdfEngineError> {
    let exe_dir = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf));
    let candidates = library_dirs(std::env::var_os(PDFIUM_DIR_ENV).map(PathBuf::from), exe_dir);

    let bindings = candidates
        .iter()
        .find_map(|dir| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)).ok()
        })
        .map(Ok)
        .unwrap_or_else(Pdfium::bind_to_system_library)
        .map_err(backend)?;

    info!("bound PDFium library");
    Ok(Pdfium::new(bindings))
}

impl PdfiumEngine {
    /// Bind the PDFium shared library, or reuse the process-wide binding.
    ///
    /// Search order:
    /// 1. `VELLUM_PDFIUM_DIR`
    /// 2. Executable's directory (app bundles ship the library there)
    /// 3. Current working directory
    /// 4. System library paths
    pub fn bind() -> Result<Self, PdfEngineError> {
        let pdfium = match PDFIUM.get() {
            Some(pdfium) => pdfium,
            None => {
                let bound = bind_library()?;
                // A racing thread may have won; its binding is kept and ours dropped.
                let _ = PDFIUM.set(bound);
                PDFIUM
                    .get()
                    .ok_or_else(|| PdfEngineError::Backend("PDFium binding was not stored".to_owned()))?
            }
        };
        Ok(Self { pdfium, next_handle: 0, docs: HashMap::new() })
    }

    fn document(&self, handle: DocumentHandle) -> Result<&PdfDocument<'static>, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn document_mut(
        &mut self,
        handle: DocumentHandle,
    ) -> Result<&mut PdfDocument<'static>, PdfEngineError> {
        self.docs.get_mut(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

fn load_page(document: &PdfDocument<'static>, page_index: u32) -> Result<PdfPage<'static>, PdfEngineError> {
    let count = u32::from(document.pages().len());
    let index = u16::try_from(page_index).map_err(|_| page_out_of_range(page_index, count))?;
    if page_index >= count {
        return Err(page_out_of_range(page_index, count));
    }
    document.pages().get(index).map_err(backend)
}

fn to_model_rect(rect: &PdfRect, page_height: f32) -> Rect {
    Rect::new(rect.left().value, rect.bottom().value, rect.right().value, rect.top().value)
        .flip_y(page_height)
}

fn to_pdf_rect(rect: &Rect, page_height: f32) -> PdfRect {
    let flipped = rect.flip_y(page_height);
    PdfRect::new_from_values(flipped.y0, flipped.x0, flipped.y1, flipped.x1)
}

fn glyph(ch: &PdfPageTextChar, page_height: f32) -> Option<Glyph> {
    let character = ch.unicode_char()?;
    let bounds = ch.loose_bounds().ok()?;
    Some(Glyph {
        ch: character,
        rect: to_model_rect(&bounds, page_height),
        font: ch.font_name(),
        size: ch.scaled_font_size().value,
    })
}

/// Character plus the baseline origin PDFium reports for it, falling back
/// to the bottom-left corner of its box.
fn placed_glyph(ch: &PdfPageTextChar, page_height: f32) -> Option<PlacedGlyph> {
    let glyph = glyph(ch, page_height)?;
    let origin = match ch.origin() {
        Ok((x, y)) => Point::new(x.value, y.value),
        Err(_) => Point::new(glyph.rect.x0, page_height - glyph.rect.y1),
    };
    Some(PlacedGlyph { glyph, origin })
}

/// Characters of a page in content order.
fn page_glyphs(document: &PdfDocument<'static>, page_index: u32) -> Result<Vec<Glyph>, PdfEngineError> {
    let page = load_page(document, page_index)?;
    let height = page.height().value;
    let text_page = page.text().map_err(backend)?;
    Ok(text_page.chars().iter().filter_map(|ch| glyph(&ch, height)).collect())
}

/// New text object drawing `run` with the source object's font, size,
/// transform and colour. Fonts that cannot encode the text again (subset
/// fonts often cannot) fall back to `fallback`.
fn reemit<'a>(
    document: &PdfDocument<'a>,
    source: &PdfPageTextObject<'_>,
    run: &SurvivingRun,
    fallback: PdfFontToken,
) -> Result<PdfPageTextObject<'a>, PdfEngineError> {
    let size = source.unscaled_font_size();
    let mut object = match PdfPageTextObject::new(document, &run.text, &source.font(), size) {
        Ok(object) => object,
        Err(err) => {
            debug!(error = %err, text = %run.text, "re-emitting with fallback font");
            PdfPageTextObject::new(document, &run.text, fallback, size).map_err(backend)?
        }
    };

    let matrix = source.matrix().map_err(backend)?;
    object
        .set_matrix(PdfMatrix::new(
            matrix.a(),
            matrix.b(),
            matrix.c(),
            matrix.d(),
            run.origin.x,
            run.origin.y,
        ))
        .map_err(backend)?;
    if let Ok(color) = source.fill_color() {
        object.set_fill_color(color).map_err(backend)?;
    }
    Ok(object)
}

fn builtin(font: BaseFont) -> PdfFontBuiltin {
    match font {
        BaseFont::Helvetica => PdfFontBuiltin::Helvetica,
        BaseFont::HelveticaBold => PdfFontBuiltin::HelveticaBold,
        BaseFont::HelveticaOblique => PdfFontBuiltin::HelveticaOblique,
        BaseFont::HelveticaBoldOblique => PdfFontBuiltin::HelveticaBoldOblique,
        BaseFont::TimesRoman => PdfFontBuiltin::TimesRoman,
        BaseFont::TimesBold => PdfFontBuiltin::TimesBold,
        BaseFont::TimesItalic => PdfFontBuiltin::TimesItalic,
        BaseFont::TimesBoldItalic => PdfFontBuiltin::TimesBoldItalic,
        BaseFont::Courier => PdfFontBuiltin::Courier,
        BaseFont::CourierBold => PdfFontBuiltin::CourierBold,
        BaseFont::CourierOblique => PdfFontBuiltin::CourierOblique,
        BaseFont::CourierBoldOblique => PdfFontBuiltin::CourierBoldOblique,
    }
}

fn annotation_kind(kind: PdfPageAnnotationType) -> AnnotationKind {
    match kind {
        PdfPageAnnotationType::Text => AnnotationKind::Text,
        PdfPageAnnotationType::Link => AnnotationKind::Link,
        PdfPageAnnotationType::FreeText => AnnotationKind::FreeText,
        PdfPageAnnotationType::Square => AnnotationKind::Square,
        PdfPageAnnotationType::Circle => AnnotationKind::Circle,
        PdfPageAnnotationType::Highlight => AnnotationKind::Highlight,
        PdfPageAnnotationType::Underline => AnnotationKind::Underline,
        PdfPageAnnotationType::Strikeout => AnnotationKind::StrikeOut,
        PdfPageAnnotationType::Ink => AnnotationKind::Ink,
        _ => AnnotationKind::Other,
    }
}

impl PdfEngine for PdfiumEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = source.into_bytes()?;
        let document = self.pdfium.load_pdf_from_byte_vec(bytes, None).map_err(|err| match err {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                PdfEngineError::EncryptedUnsupported
            }
            other => backend(other),
        })?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        info!(handle = handle.raw(), pages = document.pages().len(), "opened document");
        self.docs.insert(handle, document);
        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(u32::from(self.document(handle)?.pages().len()))
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, PdfEngineError> {
        let page = load_page(self.document(handle)?, page_index)?;
        Ok(PageSize { width_pt: page.width().value, height_pt: page.height().value })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = load_page(self.document(handle)?, request.page_index)?;
        let scale = request.effective_scale();
        // The whole page is rasterised before any clip is applied.
        request.pixel_size(&Rect::new(0.0, 0.0, page.width().value, page.height().value))?;

        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(scale))
            .map_err(backend)?;
        let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
        let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| PdfEngineError::Backend("bitmap size mismatch".to_owned()))?;

        let Some(clip) = request.clip else {
            return Ok(image);
        };

        let clip = clip.scale(scale);
        let x = clip.x0.floor().clamp(0.0, width as f32) as u32;
        let y = clip.y0.floor().clamp(0.0, height as f32) as u32;
        let x1 = clip.x1.ceil().clamp(0.0, width as f32) as u32;
        let y1 = clip.y1.ceil().clamp(0.0, height as f32) as u32;
        Ok(image::imageops::crop_imm(&image, x, y, (x1 - x).max(1), (y1 - y).max(1)).to_image())
    }

    fn words(&self, handle: DocumentHandle, page_index: u32) -> Result<Vec<Word>, PdfEngineError> {
        Ok(group_words(&page_glyphs(self.document(handle)?, page_index)?))
    }

    fn text_spans(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextSpan>, PdfEngineError> {
        Ok(group_spans(&page_glyphs(self.document(handle)?, page_index)?))
    }

    fn redact(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        area: Rect,
    ) -> Result<(), PdfEngineError> {
        let document = self.document_mut(handle)?;
        let fallback = document.fonts_mut().new_built_in(PdfFontBuiltin::Helvetica);
        let document = &*document;
        let mut page = load_page(document, page_index)?;
        let height = page.height().value;

        // Every text object with a covered character goes; whatever it drew
        // outside the area is drawn again by fresh objects.
        let mut removed = Vec::new();
        let mut replacements = Vec::new();
        {
            let text_page = page.text().map_err(backend)?;
            for (index, object) in page.objects().iter().enumerate() {
                let Some(text_object) = object.as_text_object() else {
                    continue;
                };

                let glyphs: Vec<PlacedGlyph> = text_page
                    .chars_for_object(text_object)
                    .map_err(backend)?
                    .iter()
                    .filter_map(|ch| placed_glyph(&ch, height))
                    .collect();
                if !touches_area(&glyphs, &area) {
                    continue;
                }

                removed.push(index);
                for run in surviving_runs(&glyphs, &area) {
                    replacements.push(reemit(document, text_object, &run, fallback)?);
                }
            }
        }

        for &index in removed.iter().rev() {
            page.objects_mut().remove_object_at_index(index).map_err(backend)?;
        }

        page.objects_mut()
            .create_path_object_rect(to_pdf_rect(&area, height), None, None, Some(PdfColor::WHITE))
            .map_err(backend)?;

        let redrawn = replacements.len();
        for object in replacements {
            page.objects_mut().add_text_object(object).map_err(backend)?;
        }

        debug!(page = page_index, removed = removed.len(), redrawn, "redacted area");
        Ok(())
    }

    fn insert_text(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        insertion: &TextInsertion,
    ) -> Result<(), PdfEngineError> {
        let document = self.document_mut(handle)?;
        let font = document.fonts_mut().new_built_in(builtin(insertion.font));
        let mut page = load_page(document, page_index)?;
        let height = page.height().value;

        page.objects_mut()
            .create_text_object(
                PdfPoints::new(insertion.origin.x),
                PdfPoints::new(height - insertion.origin.y),
                &insertion.text,
                font,
                PdfPoints::new(insertion.size),
            )
            .map_err(backend)?;

        debug!(page = page_index, font = insertion.font.postscript_name(), "inserted text");
        Ok(())
    }

    fn annotations(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<Annotation>, PdfEngineError> {
        let page = load_page(self.document(handle)?, page_index)?;
        let height = page.height().value;

        Ok(page
            .annotations()
            .iter()
            .enumerate()
            .filter_map(|(index, annotation)| {
                let bounds = annotation.bounds().ok()?;
                Some(Annotation {
                    index,
                    kind: annotation_kind(annotation.annotation_type()),
                    rect: to_model_rect(&bounds, height),
                    contents: annotation.contents(),
                })
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
        let page = load_page(self.document(handle)?, page_index)?;
        let height = page.height().value;
        let mut annotation = annotation_at(&page, page_index, index)?;

        let bounds = to_model_rect(&annotation.bounds().map_err(backend)?, height);
        annotation.set_bounds(to_pdf_rect(&bounds.translate(dx, dy), height)).map_err(backend)?;
        Ok(())
    }

    fn delete_annotation(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        index: usize,
    ) -> Result<(), PdfEngineError> {
        let mut page = load_page(self.document(handle)?, page_index)?;
        let annotation = annotation_at(&page, page_index, index)?;
        page.annotations_mut().delete_annotation(annotation).map_err(backend)?;
        Ok(())
    }

    fn save(&self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError> {
        self.document(handle)?.save_to_file(path).map_err(backend)?;
        info!(path = %path.display(), "saved document");
        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

fn annotation_at<'a>(
    page: &PdfPage<'a>,
    page_index: u32,
    index: usize,
) -> Result<PdfPageAnnotation<'a>, PdfEngineError> {
    let annotations = page.annotations();
    let position = PdfPageAnnotationIndex::try_from(index)
        .ok()
        .filter(|&position| position < annotations.len())
        .ok_or(PdfEngineError::AnnotationOutOfRange { page: page_index, index })?;
    annotations.get(position).map_err(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_conversion_round_trips_through_pdf_space() {
        let rect = Rect::new(10.0, 20.0, 110.0, 60.0);
        let pdf = to_pdf_rect(&rect, 800.0);

        assert_eq!(pdf.bottom().value, 740.0);
        assert_eq!(pdf.top().value, 780.0);
        assert_eq!(to_model_rect(&pdf, 800.0), rect);
    }

    #[test]
    fn library_search_prefers_the_configured_directory() {
        let dirs = library_dirs(Some(PathBuf::from("/opt/pdfium")), Some(PathBuf::from("/app/bin")));
        assert_eq!(
            dirs,
            vec![PathBuf::from("/opt/pdfium"), PathBuf::from("/app/bin"), PathBuf::from("./")]
        );
        assert_eq!(library_dirs(None, None), vec![PathBuf::from("./")]);
    }

    #[test]
    #[ignore = "Requires the PDFium shared library"]
    fn binding_twice_reuses_the_library() {
        let first = PdfiumEngine::bind().expect("PDFium available");
        let second = PdfiumEngine::bind().expect("PDFium available");
        assert!(std::ptr::eq(first.pdfium, second.pdfium));
    }

    #[test]
    fn strikeout_maps_to_model_kind() {
        assert_eq!(annotation_kind(PdfPageAnnotationType::Strikeout), AnnotationKind::StrikeOut);
        assert_eq!(annotation_kind(PdfPageAnnotationType::Stamp), AnnotationKind::Other);
    }
}
