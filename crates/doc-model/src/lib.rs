//! Document model shared by the engine, the editor and the shells.
//!
//! Everything here is plain data plus the arithmetic around it: page
//! geometry, the logical word index, font statistics, annotations and the
//! persisted session/bookmark state. No I/O happens in this crate.

pub mod annotation;
pub mod fonts;
pub mod geometry;
pub mod logical;
pub mod session;
pub mod words;

pub use annotation::{annotation_at, Annotation, AnnotationKind};
pub use fonts::{baseline_origin, font_for_rect, most_common_font, BaseFont, FontStyle, TextSpan};
pub use geometry::{Point, Rect, ViewTransform};
pub use logical::{LogicalDocument, SearchHit, SearchOptions};
pub use session::{
    apply_zoom_action, clamp_zoom, parse_zoom_percent, Bookmark, BookmarkSet, ReaderState, Session,
    ZoomAction, ZoomMode, MAX_ZOOM_PERCENT, MIN_ZOOM_PERCENT,
};
pub use words::{PageWords, Word};
