//! Mapping between egui screen positions and scene pixels of the rendered
//! page.

use doc_model::{Point, Rect};
use eframe::egui;

/// Regions smaller than this many scene pixels on either side are treated
/// as stray clicks.
const MIN_REGION_PX: f32 = 3.0;

/// Size in egui points at which a page image is painted. The page is
/// rendered `render_scale` times denser than it is shown.
pub fn displayed_size((width, height): (u32, u32), render_scale: f32) -> egui::Vec2 {
    let scale = if render_scale > 0.0 { render_scale } else { 1.0 };
    egui::vec2(width as f32 / scale, height as f32 / scale)
}

/// Scene pixel under `pos`, given where the image is painted.
pub fn scene_point(pos: egui::Pos2, image_rect: egui::Rect, (width, height): (u32, u32)) -> Point {
    let sx = if image_rect.width() > 0.0 { width as f32 / image_rect.width() } else { 1.0 };
    let sy = if image_rect.height() > 0.0 { height as f32 / image_rect.height() } else { 1.0 };
    Point::new((pos.x - image_rect.min.x) * sx, (pos.y - image_rect.min.y) * sy)
}

/// Normalised scene rectangle spanned by a drag, or `None` for a drag too
/// small to mean anything.
pub fn drag_region(from: Point, to: Point) -> Option<Rect> {
    let region = Rect::from_points(from, to);
    (region.width() >= MIN_REGION_PX && region.height() >= MIN_REGION_PX).then_some(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displayed_size_divides_by_render_scale() {
        assert_eq!(displayed_size((1200, 800), 2.0), egui::vec2(600.0, 400.0));
        assert_eq!(displayed_size((300, 200), 0.0), egui::vec2(300.0, 200.0));
    }

    #[test]
    fn scene_point_accounts_for_offset_and_density() {
        let painted = egui::Rect::from_min_size(egui::pos2(100.0, 50.0), egui::vec2(600.0, 400.0));
        let point = scene_point(egui::pos2(130.0, 70.0), painted, (1200, 800));
        assert_eq!(point, Point::new(60.0, 40.0));
    }

    #[test]
    fn drags_are_normalised_and_filtered() {
        let region = drag_region(Point::new(50.0, 40.0), Point::new(10.0, 5.0)).expect("big enough");
        assert_eq!(region, Rect::new(10.0, 5.0, 50.0, 40.0));

        assert!(drag_region(Point::new(10.0, 10.0), Point::new(11.0, 40.0)).is_none());
    }
}
