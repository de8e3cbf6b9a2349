//! Page-space geometry and the zoom transform between page and scene.
//!
//! Page space is PDF user space in points with a top-left origin, which is
//! how word extraction reports boxes. Scene space is the pixel grid of the
//! rendered page image as shown on screen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle with `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Build a rectangle from two corners in any order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0: x0.min(x1), y0: y0.min(y1), x1: x0.max(x1), y1: y0.max(y1) }
    }

    pub fn from_points(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Edges are inclusive so a click on a word's border still hits it.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }

    /// Touching edges do not count as an intersection.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }

        Some(Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        })
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect { x0: self.x0 + dx, y0: self.y0 + dy, x1: self.x1 + dx, y1: self.y1 + dy }
    }

    pub fn scale(&self, factor: f32) -> Rect {
        Rect::new(self.x0 * factor, self.y0 * factor, self.x1 * factor, self.y1 * factor)
    }

    /// Mirror the rectangle vertically inside a page of `page_height`.
    ///
    /// Converts between the engine's bottom-left origin and the model's
    /// top-left origin; applying it twice returns the original rectangle.
    pub fn flip_y(&self, page_height: f32) -> Rect {
        Rect::new(self.x0, page_height - self.y1, self.x1, page_height - self.y0)
    }
}

/// Maps page points to scene pixels for a page shown at `zoom` pixels per
/// point, with its top-left corner at `origin` in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub zoom: f32,
    pub origin: Point,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { zoom: 1.0, origin: Point::default() }
    }
}

impl ViewTransform {
    pub fn new(zoom: f32, origin: Point) -> Self {
        Self { zoom, origin }
    }

    pub fn from_zoom(zoom: f32) -> Self {
        Self::new(zoom, Point::default())
    }

    fn factor(&self) -> f32 {
        if self.zoom > 0.0 && self.zoom.is_finite() {
            self.zoom
        } else {
            1.0
        }
    }

    pub fn page_to_scene(&self, point: Point) -> Point {
        let zoom = self.factor();
        Point::new(point.x * zoom + self.origin.x, point.y * zoom + self.origin.y)
    }

    pub fn scene_to_page(&self, point: Point) -> Point {
        let zoom = self.factor();
        Point::new((point.x - self.origin.x) / zoom, (point.y - self.origin.y) / zoom)
    }

    pub fn rect_to_scene(&self, rect: &Rect) -> Rect {
        Rect::from_points(
            self.page_to_scene(Point::new(rect.x0, rect.y0)),
            self.page_to_scene(Point::new(rect.x1, rect.y1)),
        )
    }

    pub fn rect_to_page(&self, rect: &Rect) -> Rect {
        Rect::from_points(
            self.scene_to_page(Point::new(rect.x0, rect.y0)),
            self.scene_to_page(Point::new(rect.x1, rect.y1)),
        )
    }

    /// Convert a scene-space drag delta into page units.
    pub fn delta_to_page(&self, dx: f32, dy: f32) -> (f32, f32) {
        let zoom = self.factor();
        (dx / zoom, dy / zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn new_normalizes_corners() {
        let rect = Rect::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(rect, Rect { x0: 0.0, y0: 5.0, x1: 10.0, y1: 20.0 });
        assert_eq!(rect.width(), 10.0);
        assert_eq!(rect.height(), 15.0);
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersection(&b).is_none());

        let c = Rect::new(5.0, 5.0, 15.0, 15.0);
        assert_eq!(a.intersection(&c), Some(Rect::new(5.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn contains_is_edge_inclusive() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(!rect.contains(Point::new(10.1, 5.0)));
    }

    #[test]
    fn flip_y_is_an_involution() {
        let rect = Rect::new(72.0, 100.0, 144.0, 112.0);
        let flipped = rect.flip_y(792.0);
        assert_eq!(flipped, Rect::new(72.0, 680.0, 144.0, 692.0));
        assert_eq!(flipped.flip_y(792.0), rect);
    }

    #[test]
    fn transform_maps_scene_back_to_page() {
        let transform = ViewTransform::new(2.5, Point::new(40.0, 12.0));
        let page = Point::new(100.0, 250.0);
        let scene = transform.page_to_scene(page);

        assert!(approx(scene.x, 290.0));
        assert!(approx(scene.y, 637.0));

        let back = transform.scene_to_page(scene);
        assert!(approx(back.x, page.x));
        assert!(approx(back.y, page.y));
    }

    #[test]
    fn non_positive_zoom_behaves_as_identity_scale() {
        let transform = ViewTransform::from_zoom(0.0);
        assert_eq!(transform.scene_to_page(Point::new(3.0, 4.0)), Point::new(3.0, 4.0));
        assert_eq!(transform.delta_to_page(6.0, 8.0), (6.0, 8.0));
    }

    #[test]
    fn rect_to_page_undoes_rect_to_scene() {
        let transform = ViewTransform::from_zoom(2.0);
        let rect = Rect::new(10.0, 20.0, 30.0, 25.0);
        let scene = transform.rect_to_scene(&rect);
        assert_eq!(scene, Rect::new(20.0, 40.0, 60.0, 50.0));
        assert_eq!(transform.rect_to_page(&scene), rect);
    }
}
