use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MIN_ZOOM_PERCENT: u16 = 10;
pub const MAX_ZOOM_PERCENT: u16 = 1600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoomMode {
    Percent,
    FitPage,
    FitWidth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomAction {
    ActualSize100,
    FitPage,
    FitWidth,
    In(u16),
    Out(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderState {
    pub zoom_mode: ZoomMode,
    pub zoom_percent: u16,
}

impl Default for ReaderState {
    fn default() -> Self {
        Self { zoom_mode: ZoomMode::Percent, zoom_percent: 100 }
    }
}

pub fn clamp_zoom(percent: u16) -> u16 {
    percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT)
}

pub fn apply_zoom_action(state: &mut ReaderState, action: ZoomAction) {
    match action {
        ZoomAction::ActualSize100 => {
            state.zoom_mode = ZoomMode::Percent;
            state.zoom_percent = 100;
        }
        ZoomAction::FitPage => state.zoom_mode = ZoomMode::FitPage,
        ZoomAction::FitWidth => state.zoom_mode = ZoomMode::FitWidth,
        ZoomAction::In(step) => {
            state.zoom_mode = ZoomMode::Percent;
            state.zoom_percent = clamp_zoom(state.zoom_percent.saturating_add(step));
        }
        ZoomAction::Out(step) => {
            state.zoom_mode = ZoomMode::Percent;
            state.zoom_percent = clamp_zoom(state.zoom_percent.saturating_sub(step));
        }
    }
}

/// Parse user-entered zoom text such as `"150"`, `"150%"`, `" 75 % "` or
/// `"1.5x"`. The result is clamped to the supported zoom range.
pub fn parse_zoom_percent(input: &str) -> Option<u16> {
    let trimmed = input.trim();

    let percent = if let Some(factor) = trimmed.strip_suffix(['x', 'X']) {
        factor.trim().parse::<f32>().ok()? * 100.0
    } else {
        trimmed.trim_end_matches('%').trim().parse::<f32>().ok()?
    };

    if !percent.is_finite() || percent <= 0.0 {
        return None;
    }

    Some(clamp_zoom(percent.round().min(f32::from(MAX_ZOOM_PERCENT)) as u16))
}

/// What the viewer restores on the next launch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub last_file: Option<PathBuf>,
    /// Zero-based page index.
    pub page: u32,
    #[serde(default)]
    pub reader: ReaderState,
    #[serde(default)]
    pub debug_overlay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Zero-based page index.
    pub page: u32,
    pub label: String,
}

/// Bookmarks of every document the user has bookmarked, keyed by path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookmarkSet {
    documents: BTreeMap<String, Vec<Bookmark>>,
}

impl BookmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    /// Bookmarks of one document, sorted by page.
    pub fn for_document(&self, path: &Path) -> &[Bookmark] {
        self.documents.get(&Self::key(path)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add a bookmark; a bookmark already on that page gets the new label.
    pub fn add(&mut self, path: &Path, page: u32, label: impl Into<String>) {
        let label = label.into();
        let bookmarks = self.documents.entry(Self::key(path)).or_default();

        match bookmarks.iter_mut().find(|bookmark| bookmark.page == page) {
            Some(existing) => existing.label = label,
            None => {
                bookmarks.push(Bookmark { page, label });
                bookmarks.sort_by_key(|bookmark| bookmark.page);
            }
        }
    }

    pub fn remove(&mut self, path: &Path, page: u32) -> bool {
        let key = Self::key(path);
        let Some(bookmarks) = self.documents.get_mut(&key) else {
            return false;
        };

        let before = bookmarks.len();
        bookmarks.retain(|bookmark| bookmark.page != page);
        let removed = bookmarks.len() != before;

        if bookmarks.is_empty() {
            self.documents.remove(&key);
        }

        removed
    }

    pub fn rename(&mut self, path: &Path, page: u32, label: impl Into<String>) -> bool {
        let Some(bookmark) = self
            .documents
            .get_mut(&Self::key(path))
            .and_then(|bookmarks| bookmarks.iter_mut().find(|bookmark| bookmark.page == page))
        else {
            return false;
        };

        bookmark.label = label.into();
        true
    }

    pub fn is_bookmarked(&self, path: &Path, page: u32) -> bool {
        self.for_document(path).iter().any(|bookmark| bookmark.page == page)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actual_size_forces_manual_percent_at_100() {
        let mut state = ReaderState { zoom_mode: ZoomMode::FitWidth, zoom_percent: 66 };
        apply_zoom_action(&mut state, ZoomAction::ActualSize100);
        assert_eq!(state.zoom_mode, ZoomMode::Percent);
        assert_eq!(state.zoom_percent, 100);
    }

    #[test]
    fn zoom_steps_are_clamped() {
        let mut state = ReaderState { zoom_mode: ZoomMode::FitPage, zoom_percent: 1590 };
        apply_zoom_action(&mut state, ZoomAction::In(25));
        assert_eq!(state.zoom_mode, ZoomMode::Percent);
        assert_eq!(state.zoom_percent, 1600);

        state.zoom_percent = 15;
        apply_zoom_action(&mut state, ZoomAction::Out(25));
        assert_eq!(state.zoom_percent, 10);
    }

    #[test]
    fn parse_zoom_accepts_common_spellings() {
        assert_eq!(parse_zoom_percent("150"), Some(150));
        assert_eq!(parse_zoom_percent("150%"), Some(150));
        assert_eq!(parse_zoom_percent(" 75 % "), Some(75));
        assert_eq!(parse_zoom_percent("1.5x"), Some(150));
        assert_eq!(parse_zoom_percent("2X"), Some(200));
        assert_eq!(parse_zoom_percent("99.6"), Some(100));
    }

    #[test]
    fn parse_zoom_clamps_and_rejects() {
        assert_eq!(parse_zoom_percent("5"), Some(10));
        assert_eq!(parse_zoom_percent("100000"), Some(1600));
        assert_eq!(parse_zoom_percent(""), None);
        assert_eq!(parse_zoom_percent("%"), None);
        assert_eq!(parse_zoom_percent("-50"), None);
        assert_eq!(parse_zoom_percent("zoom"), None);
        assert_eq!(parse_zoom_percent("0"), None);
    }

    #[test]
    fn bookmarks_are_sorted_and_deduplicated_by_page() {
        let path = Path::new("/docs/report.pdf");
        let mut set = BookmarkSet::new();

        set.add(path, 7, "Appendix");
        set.add(path, 2, "Intro");
        set.add(path, 7, "Appendix A");

        let pages: Vec<_> = set.for_document(path).iter().map(|b| (b.page, b.label.as_str())).collect();
        assert_eq!(pages, vec![(2, "Intro"), (7, "Appendix A")]);
        assert!(set.is_bookmarked(path, 2));
        assert!(set.for_document(Path::new("/docs/other.pdf")).is_empty());
    }

    #[test]
    fn removing_last_bookmark_drops_document_entry() {
        let path = Path::new("/docs/report.pdf");
        let mut set = BookmarkSet::new();
        set.add(path, 0, "Cover");

        assert!(!set.remove(path, 3));
        assert!(set.remove(path, 0));
        assert!(set.is_empty());
        assert!(!set.remove(path, 0));
    }

    #[test]
    fn rename_updates_existing_bookmark_only() {
        let path = Path::new("/docs/report.pdf");
        let mut set = BookmarkSet::new();
        set.add(path, 4, "Old");

        assert!(set.rename(path, 4, "New"));
        assert!(!set.rename(path, 5, "Missing"));
        assert_eq!(set.for_document(path)[0].label, "New");
    }
}
