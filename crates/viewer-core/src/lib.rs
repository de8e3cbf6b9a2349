//! GUI-agnostic viewer and editor state.

mod cache;
pub mod editor;
pub mod overlay;
pub mod view;

pub use editor::{EditOutcome, Editor, EditorConfig, EditorError, RenderedPage};
pub use view::{fit_page_percent, fit_width_percent};
