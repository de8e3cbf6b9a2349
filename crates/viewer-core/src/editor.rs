//! Document editing session.
//!
//! [`Editor`] owns one open document and everything the shells show about
//! it: the current page, zoom, the logical word index, selection, search
//! state and a cache of rendered pages. Shells only forward input and draw
//! what [`Editor::render_current`] returns.
//!
//! Scene coordinates are pixels of the rendered page image. The transform
//! between scene and page space depends on the effective zoom, so every
//! scene-space entry point goes through [`Editor::transform`].

use crate::overlay::{
    fill_rect, outline_rect, ANNOTATION_COLOR, CURRENT_HIT_COLOR, SEARCH_HIT_COLOR, SELECTION_COLOR,
};
use crate::cache::{RenderCache, RenderKey};
use crate::view::{fit_page_percent, fit_width_percent};
use doc_model::{
    annotation_at, apply_zoom_action, baseline_origin, clamp_zoom, font_for_rect, parse_zoom_percent,
    Annotation, BaseFont, FontStyle, LogicalDocument, Point, ReaderState, Rect, SearchHit,
    SearchOptions, Session, ViewTransform, Word, ZoomAction, ZoomMode,
};
use pdf_engine::{
    DocumentHandle, OpenSource, PageSize, PdfEngine, PdfEngineError, RenderRequest, RgbaImage,
    TextInsertion,
};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::Settings;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no document is open")]
    NoDocument,
    #[error("word {text:?} not found on page {page}")]
    WordNotFound { page: u32, text: String },
    #[error("no annotation selected")]
    NoAnnotationSelected,
    #[error("region does not overlap the page")]
    EmptyRegion,
    #[error("invalid zoom {0:?}")]
    InvalidZoom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Rendered pixels per point at 100% zoom.
    pub render_scale: f32,
    pub zoom_step_percent: u16,
    pub fallback_font: FontStyle,
    pub overlay_color: [u8; 4],
    pub render_cache_pages: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for EditorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            render_scale: settings.render_scale,
            zoom_step_percent: settings.zoom_step_percent,
            fallback_font: settings.fallback_style(),
            overlay_color: settings.overlay_color,
            render_cache_pages: settings.render_cache_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page_index: u32,
    pub image: Arc<RgbaImage>,
    /// Maps page points to pixels of `image`.
    pub transform: ViewTransform,
}

/// What [`Editor::edit_word`] did to the page.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub page_index: u32,
    pub removed: String,
    /// `None` when the word was deleted without replacement.
    pub inserted: Option<String>,
    pub font: BaseFont,
    pub size: f32,
}

struct OpenDocument {
    path: PathBuf,
    handle: DocumentHandle,
    page_sizes: Vec<PageSize>,
    logical: LogicalDocument,
    dirty: bool,
}

#[derive(Debug, Default)]
struct SearchState {
    hits: Vec<SearchHit>,
    current: Option<usize>,
    query: String,
    options: SearchOptions,
}

pub struct Editor {
    engine: Box<dyn PdfEngine>,
    config: EditorConfig,
    document: Option<OpenDocument>,
    page_index: u32,
    reader: ReaderState,
    viewport: Option<(f32, f32)>,
    debug_overlay: bool,
    selected_word: Option<(u32, Word)>,
    selected_annotation: Option<(u32, Annotation)>,
    search: SearchState,
    cache: RenderCache,
    /// Bumped whenever selection or search highlights change.
    overlay_generation: u64,
}

impl Editor {
    pub fn new(engine: Box<dyn PdfEngine>, config: EditorConfig) -> Self {
        let cache = RenderCache::new(config.render_cache_pages);
        Self {
            engine,
            config,
            document: None,
            page_index: 0,
            reader: ReaderState::default(),
            viewport: None,
            debug_overlay: false,
            selected_word: None,
            selected_annotation: None,
            search: SearchState::default(),
            cache,
            overlay_generation: 0,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    fn doc(&self) -> Result<&OpenDocument, EditorError> {
        self.document.as_ref().ok_or(EditorError::NoDocument)
    }

    fn doc_mut(&mut self) -> Result<&mut OpenDocument, EditorError> {
        self.document.as_mut().ok_or(EditorError::NoDocument)
    }

    fn reset_view_state(&mut self) {
        self.page_index = 0;
        self.selected_word = None;
        self.selected_annotation = None;
        self.search = SearchState::default();
        self.cache.clear();
        self.overlay_generation += 1;
    }

    /// Open `path`, replacing any open document, and index every page.
    pub fn open(&mut self, path: &Path) -> Result<u32, EditorError> {
        let handle = self.engine.open(OpenSource::from(path))?;

        match self.index_document(handle) {
            Ok((page_sizes, logical)) => {
                self.close();
                let page_count = logical.page_count();
                info!(path = %path.display(), pages = page_count, "document opened");

                self.document = Some(OpenDocument {
                    path: path.to_path_buf(),
                    handle,
                    page_sizes,
                    logical,
                    dirty: false,
                });
                self.reset_view_state();
                Ok(page_count)
            }
            Err(err) => {
                if let Err(close_err) = self.engine.close(handle) {
                    warn!(error = %close_err, "failed to release half-opened document");
                }
                Err(err)
            }
        }
    }

    fn index_document(
        &self,
        handle: DocumentHandle,
    ) -> Result<(Vec<PageSize>, LogicalDocument), EditorError> {
        let page_count = self.engine.page_count(handle)?;
        let mut sizes = Vec::with_capacity(page_count as usize);
        let mut pages = Vec::with_capacity(page_count as usize);

        for page_index in 0..page_count {
            sizes.push(self.engine.page_size(handle, page_index)?);
            pages.push(self.engine.words(handle, page_index)?);
        }

        Ok((sizes, LogicalDocument::from_pages(pages)))
    }

    pub fn close(&mut self) {
        if let Some(document) = self.document.take() {
            if let Err(err) = self.engine.close(document.handle) {
                warn!(error = %err, "failed to close document");
            }
            info!(path = %document.path.display(), "document closed");
        }
        self.reset_view_state();
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.document.as_ref().map(|document| document.path.as_path())
    }

    pub fn is_dirty(&self) -> bool {
        self.document.as_ref().is_some_and(|document| document.dirty)
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |document| document.logical.page_count())
    }

    /// Zero-based index of the page on screen.
    pub fn current_page(&self) -> u32 {
        self.page_index
    }

    pub fn page_size(&self, page_index: u32) -> Option<PageSize> {
        self.document.as_ref()?.page_sizes.get(page_index as usize).copied()
    }

    pub fn logical(&self) -> Option<&LogicalDocument> {
        self.document.as_ref().map(|document| &document.logical)
    }

    fn set_page(&mut self, page_index: u32) -> bool {
        if page_index == self.page_index {
            return false;
        }
        self.page_index = page_index;
        self.selected_word = None;
        self.selected_annotation = None;
        self.overlay_generation += 1;
        true
    }

    pub fn next_page(&mut self) -> bool {
        let count = self.page_count();
        if count == 0 || self.page_index + 1 >= count {
            return false;
        }
        self.set_page(self.page_index + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page_count() == 0 || self.page_index == 0 {
            return false;
        }
        self.set_page(self.page_index - 1)
    }

    /// Jump to a one-based page number, clamped into the document.
    pub fn goto_page(&mut self, page_number: u32) -> bool {
        let count = self.page_count();
        if count == 0 {
            return false;
        }
        self.set_page(page_number.clamp(1, count) - 1)
    }

    pub fn reader_state(&self) -> ReaderState {
        self.reader
    }

    /// Logical size of the area the page is shown in; used by fit modes.
    pub fn set_viewport(&mut self, width_px: f32, height_px: f32) {
        self.viewport = Some((width_px, height_px));
    }

    /// Zoom in effect, resolving fit modes against the viewport.
    pub fn zoom_percent(&self) -> u16 {
        let page = self.page_size(self.page_index);
        match (self.reader.zoom_mode, self.viewport, page) {
            (ZoomMode::FitWidth, Some((width, _)), Some(page)) => fit_width_percent(width, page),
            (ZoomMode::FitPage, Some((width, height)), Some(page)) => {
                fit_page_percent(width, height, page)
            }
            _ => self.reader.zoom_percent,
        }
    }

    pub fn set_zoom_percent(&mut self, percent: u16) {
        self.reader.zoom_mode = ZoomMode::Percent;
        self.reader.zoom_percent = clamp_zoom(percent);
    }

    pub fn apply_zoom(&mut self, action: ZoomAction) {
        // Stepping out of a fit mode starts from what is on screen.
        self.reader.zoom_percent = self.zoom_percent();
        apply_zoom_action(&mut self.reader, action);
    }

    pub fn zoom_in(&mut self) {
        self.apply_zoom(ZoomAction::In(self.config.zoom_step_percent));
    }

    pub fn zoom_out(&mut self) {
        self.apply_zoom(ZoomAction::Out(self.config.zoom_step_percent));
    }

    /// Apply zoom text typed by the user, e.g. `"150%"`.
    pub fn set_zoom_text(&mut self, text: &str) -> Result<u16, EditorError> {
        let percent =
            parse_zoom_percent(text).ok_or_else(|| EditorError::InvalidZoom(text.to_owned()))?;
        self.set_zoom_percent(percent);
        Ok(percent)
    }

    /// Pixels of the rendered image per page point.
    fn pixels_per_point(&self) -> f32 {
        f32::from(self.zoom_percent()) / 100.0 * self.config.render_scale
    }

    pub fn transform(&self) -> ViewTransform {
        ViewTransform::from_zoom(self.pixels_per_point())
    }

    pub fn debug_overlay(&self) -> bool {
        self.debug_overlay
    }

    pub fn toggle_debug(&mut self, enabled: bool) {
        self.debug_overlay = enabled;
    }

    pub fn session(&self) -> Session {
        Session {
            last_file: self.path().map(Path::to_path_buf),
            page: self.page_index,
            reader: self.reader,
            debug_overlay: self.debug_overlay,
        }
    }

    /// Restore page, zoom and overlay from a saved session. The document
    /// itself must already be open.
    pub fn restore_session(&mut self, session: &Session) {
        self.reader = ReaderState {
            zoom_mode: session.reader.zoom_mode,
            zoom_percent: clamp_zoom(session.reader.zoom_percent),
        };
        self.debug_overlay = session.debug_overlay;
        self.goto_page(session.page.saturating_add(1));
    }

    pub fn render_current(&mut self) -> Result<RenderedPage, EditorError> {
        self.render_page(self.page_index)
    }

    fn render_key(&self, page_index: u32) -> RenderKey {
        RenderKey {
            page_index,
            scale_bits: self.pixels_per_point().to_bits(),
            debug: self.debug_overlay,
            overlay_generation: self.overlay_generation,
        }
    }

    fn render_page(&mut self, page_index: u32) -> Result<RenderedPage, EditorError> {
        let scale = self.pixels_per_point();
        let key = self.render_key(page_index);

        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let document = self.doc()?;
        let mut image = self
            .engine
            .render_page(document.handle, RenderRequest { page_index, scale, clip: None })?;
        let transform = ViewTransform::from_zoom(scale);
        self.draw_overlays(&mut image, page_index, &transform);

        debug!(page = page_index, scale, "rendered page");
        let rendered = RenderedPage { page_index, image: Arc::new(image), transform };
        self.cache.insert(key, rendered.clone());
        Ok(rendered)
    }

    fn draw_overlays(&self, image: &mut RgbaImage, page_index: u32, transform: &ViewTransform) {
        let Some(document) = self.document.as_ref() else {
            return;
        };

        if self.debug_overlay {
            for word in document.logical.page_words(page_index) {
                outline_rect(image, &transform.rect_to_scene(&word.rect), self.config.overlay_color, 1);
            }
        }

        for (index, hit) in self.search.hits.iter().enumerate() {
            if hit.page_index != page_index {
                continue;
            }
            let rect = transform.rect_to_scene(&hit.rect);
            fill_rect(image, &rect, SEARCH_HIT_COLOR);
            if self.search.current == Some(index) {
                outline_rect(image, &rect, CURRENT_HIT_COLOR, 2);
            }
        }

        if let Some((page, annotation)) = &self.selected_annotation {
            if *page == page_index {
                outline_rect(image, &transform.rect_to_scene(&annotation.rect), ANNOTATION_COLOR, 2);
            }
        }

        if let Some((page, word)) = &self.selected_word {
            if *page == page_index {
                outline_rect(image, &transform.rect_to_scene(&word.rect), SELECTION_COLOR, 2);
            }
        }
    }

    /// Render the neighbours of the current page into the cache.
    pub fn warm_neighbours(&mut self, radius: u32) {
        let current = self.render_key(self.page_index);
        for page_index in self.cache.pages_to_warm(&current, self.page_count(), radius) {
            if let Err(err) = self.render_page(page_index) {
                warn!(page = page_index, error = %err, "prefetch render failed");
            }
        }
    }

    fn invalidate(&mut self) {
        self.cache.clear();
        self.overlay_generation += 1;
    }

    pub fn word_at_scene(&self, point: Point) -> Option<&Word> {
        let page_point = self.transform().scene_to_page(point);
        self.document.as_ref()?.logical.word_at(self.page_index, page_point)
    }

    pub fn select_word_at_scene(&mut self, point: Point) -> Option<Word> {
        let word = self.word_at_scene(point).cloned();
        self.selected_word = word.clone().map(|word| (self.page_index, word));
        self.overlay_generation += 1;
        word
    }

    pub fn selected_word(&self) -> Option<&Word> {
        self.selected_word.as_ref().map(|(_, word)| word)
    }

    /// Replace `word` on `page_index` with `new_text` in the font found
    /// under it. An empty replacement deletes the word.
    pub fn edit_word(
        &mut self,
        page_index: u32,
        word: &Word,
        new_text: &str,
    ) -> Result<EditOutcome, EditorError> {
        let document = self.doc()?;
        if !document.logical.contains_word(page_index, word) {
            return Err(EditorError::WordNotFound { page: page_index, text: word.text.clone() });
        }
        let handle = document.handle;

        let spans = self.engine.text_spans(handle, page_index)?;
        let style = font_for_rect(&spans, &word.rect, &self.config.fallback_font);
        let font = BaseFont::resolve(&style.name);

        self.engine.redact(handle, page_index, word.rect)?;

        let replacement = new_text.trim();
        let inserted = if replacement.is_empty() {
            Ok(None)
        } else {
            let insertion = TextInsertion {
                origin: baseline_origin(&word.rect, style.size),
                text: replacement.to_owned(),
                font,
                size: style.size,
            };
            self.engine
                .insert_text(handle, page_index, &insertion)
                .map(|()| Some(replacement.to_owned()))
        };

        // The redaction already changed the page, so the index must follow
        // it even when the insertion failed.
        self.resync_page(page_index)?;
        let inserted = inserted?;

        info!(
            page = page_index,
            from = %word.text,
            to = replacement,
            font = font.postscript_name(),
            size = style.size,
            "edited word"
        );

        Ok(EditOutcome { page_index, removed: word.text.clone(), inserted, font, size: style.size })
    }

    /// Refresh the logical page from the engine after a mutation.
    fn resync_page(&mut self, page_index: u32) -> Result<(), EditorError> {
        let handle = self.doc()?.handle;
        let words = self.engine.words(handle, page_index)?;

        let document = self.doc_mut()?;
        document.logical.replace_page(page_index, words);
        document.dirty = true;

        self.selected_word = None;
        self.rerun_search();
        self.invalidate();
        Ok(())
    }

    pub fn annotations(&self) -> Result<Vec<Annotation>, EditorError> {
        let handle = self.doc()?.handle;
        Ok(self.engine.annotations(handle, self.page_index)?)
    }

    pub fn select_annotation_at_scene(&mut self, point: Point) -> Result<Option<Annotation>, EditorError> {
        let annotations = self.annotations()?;
        let page_point = self.transform().scene_to_page(point);
        let selected = annotation_at(&annotations, page_point).cloned();

        self.selected_annotation = selected.clone().map(|annotation| (self.page_index, annotation));
        self.overlay_generation += 1;
        Ok(selected)
    }

    pub fn selected_annotation(&self) -> Option<&Annotation> {
        self.selected_annotation.as_ref().map(|(_, annotation)| annotation)
    }

    /// Move the selected annotation by a scene-space delta.
    pub fn move_selected_annotation(
        &mut self,
        scene_dx: f32,
        scene_dy: f32,
    ) -> Result<Annotation, EditorError> {
        let (page_index, index) = self
            .selected_annotation
            .as_ref()
            .map(|(page, annotation)| (*page, annotation.index))
            .ok_or(EditorError::NoAnnotationSelected)?;
        let handle = self.doc()?.handle;
        let (dx, dy) = self.transform().delta_to_page(scene_dx, scene_dy);

        self.engine.move_annotation(handle, page_index, index, dx, dy)?;

        // Moving keeps the annotation's position in the list.
        let moved = self
            .engine
            .annotations(handle, page_index)?
            .into_iter()
            .find(|annotation| annotation.index == index)
            .ok_or(PdfEngineError::AnnotationOutOfRange { page: page_index, index })?;

        self.doc_mut()?.dirty = true;
        self.selected_annotation = Some((page_index, moved.clone()));
        self.invalidate();
        Ok(moved)
    }

    pub fn delete_selected_annotation(&mut self) -> Result<Annotation, EditorError> {
        let (page_index, annotation) =
            self.selected_annotation.clone().ok_or(EditorError::NoAnnotationSelected)?;
        let handle = self.doc()?.handle;

        self.engine.delete_annotation(handle, page_index, annotation.index)?;
        info!(page = page_index, kind = annotation.kind.label(), "deleted annotation");

        self.doc_mut()?.dirty = true;
        self.selected_annotation = None;
        self.invalidate();
        Ok(annotation)
    }

    fn scene_region_on_page(&self, region: &Rect) -> Result<Rect, EditorError> {
        let page = self.page_size(self.page_index).ok_or(EditorError::NoDocument)?;
        self.transform()
            .rect_to_page(region)
            .intersection(&page.bounds())
            .ok_or(EditorError::EmptyRegion)
    }

    /// Text of the words intersecting a scene-space rectangle.
    pub fn text_in_scene_region(&self, region: &Rect) -> Result<String, EditorError> {
        let area = self.scene_region_on_page(region)?;
        Ok(self.doc()?.logical.text_in_region(self.page_index, &area))
    }

    /// Pixels of a scene-space rectangle, without any overlay.
    pub fn screenshot_scene_region(&self, region: &Rect) -> Result<RgbaImage, EditorError> {
        let area = self.scene_region_on_page(region)?;
        let request = RenderRequest {
            page_index: self.page_index,
            scale: self.pixels_per_point(),
            clip: Some(area),
        };
        Ok(self.engine.render_page(self.doc()?.handle, request)?)
    }

    /// Search the whole document and jump to the first hit at or after the
    /// current page. Returns the number of hits.
    pub fn search(&mut self, query: &str, case_sensitive: bool) -> Result<usize, EditorError> {
        let options = SearchOptions { case_sensitive };
        let hits = self.doc()?.logical.search(query, options);

        let current = hits
            .iter()
            .position(|hit| hit.page_index >= self.page_index)
            .or_else(|| (!hits.is_empty()).then_some(0));

        self.search = SearchState { hits, current, query: query.to_owned(), options };
        self.overlay_generation += 1;
        self.show_current_hit();
        Ok(self.search.hits.len())
    }

    fn rerun_search(&mut self) {
        if self.search.query.is_empty() {
            return;
        }
        let Some(document) = self.document.as_ref() else {
            return;
        };

        let hits = document.logical.search(&self.search.query, self.search.options);
        self.search.current = self.search.current.filter(|&index| index < hits.len());
        self.search.hits = hits;
    }

    pub fn clear_search(&mut self) {
        self.search = SearchState::default();
        self.overlay_generation += 1;
    }

    pub fn search_hits(&self) -> &[SearchHit] {
        &self.search.hits
    }

    pub fn current_hit(&self) -> Option<&SearchHit> {
        self.search.hits.get(self.search.current?)
    }

    pub fn current_hit_index(&self) -> Option<usize> {
        self.search.current
    }

    pub fn search_query(&self) -> &str {
        &self.search.query
    }

    fn show_current_hit(&mut self) {
        if let Some(page) = self.current_hit().map(|hit| hit.page_index) {
            self.set_page(page);
        }
    }

    pub fn next_hit(&mut self) -> Option<SearchHit> {
        let count = self.search.hits.len();
        if count == 0 {
            return None;
        }
        self.search.current = Some(self.search.current.map_or(0, |index| (index + 1) % count));
        self.overlay_generation += 1;
        self.show_current_hit();
        self.current_hit().cloned()
    }

    pub fn prev_hit(&mut self) -> Option<SearchHit> {
        let count = self.search.hits.len();
        if count == 0 {
            return None;
        }
        self.search.current =
            Some(self.search.current.map_or(count - 1, |index| (index + count - 1) % count));
        self.overlay_generation += 1;
        self.show_current_hit();
        self.current_hit().cloned()
    }

    pub fn save(&mut self) -> Result<(), EditorError> {
        let path = self.doc()?.path.clone();
        self.save_as(&path)
    }

    /// Write the document to `path` through a temp file and make `path`
    /// the document's location.
    pub fn save_as(&mut self, path: &Path) -> Result<(), EditorError> {
        let handle = self.doc()?.handle;

        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Err(err) = self.engine.save(handle, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        fs::rename(&tmp, path)?;

        let document = self.doc_mut()?;
        document.path = path.to_path_buf();
        document.dirty = false;
        info!(path = %path.display(), "document saved");
        Ok(())
    }
}
