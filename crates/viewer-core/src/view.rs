//! Zoom fitting.
//!
//! Viewport sizes are in logical pixels; at 100% zoom one PDF point takes
//! one logical pixel.

use doc_model::{MAX_ZOOM_PERCENT, MIN_ZOOM_PERCENT};
use pdf_engine::PageSize;

fn percent_from_ratio(ratio: f32) -> u16 {
    (ratio * 100.0).round().clamp(f32::from(MIN_ZOOM_PERCENT), f32::from(MAX_ZOOM_PERCENT)) as u16
}

pub fn fit_width_percent(viewport_width_px: f32, page: PageSize) -> u16 {
    if viewport_width_px <= 0.0 || page.width_pt <= 0.0 {
        return 100;
    }

    percent_from_ratio(viewport_width_px / page.width_pt)
}

pub fn fit_page_percent(viewport_width_px: f32, viewport_height_px: f32, page: PageSize) -> u16 {
    if viewport_width_px <= 0.0
        || viewport_height_px <= 0.0
        || page.width_pt <= 0.0
        || page.height_pt <= 0.0
    {
        return 100;
    }

    let width = viewport_width_px / page.width_pt;
    let height = viewport_height_px / page.height_pt;
    percent_from_ratio(width.min(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    #[test]
    fn fit_width_scales_page_to_viewport() {
        assert_eq!(fit_width_percent(1224.0, LETTER), 200);
        assert_eq!(fit_width_percent(100_000.0, LETTER), 1600);
        assert_eq!(fit_width_percent(0.0, LETTER), 100);
    }

    #[test]
    fn fit_page_uses_tighter_dimension() {
        // Width allows 200%, height only 50%.
        assert_eq!(fit_page_percent(1224.0, 396.0, LETTER), 50);
        assert_eq!(fit_page_percent(10.0, 10.0, LETTER), 10);
    }
}
