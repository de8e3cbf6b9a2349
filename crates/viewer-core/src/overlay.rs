//! Drawing on rendered page bitmaps.

use doc_model::Rect;
use image::Rgba;
use pdf_engine::RgbaImage;

pub const SELECTION_COLOR: [u8; 4] = [0, 0, 255, 255];
pub const ANNOTATION_COLOR: [u8; 4] = [0, 160, 60, 255];
pub const SEARCH_HIT_COLOR: [u8; 4] = [255, 210, 0, 90];
pub const CURRENT_HIT_COLOR: [u8; 4] = [255, 140, 0, 255];

fn blend(dst: &mut Rgba<u8>, color: [u8; 4]) {
    let alpha = u16::from(color[3]);
    for channel in 0..3 {
        let mixed = (u16::from(color[channel]) * alpha + u16::from(dst.0[channel]) * (255 - alpha)) / 255;
        dst.0[channel] = mixed as u8;
    }
    dst.0[3] = 255;
}

/// Pixel bounds of `rect` clipped to the image, or `None` when nothing of
/// it is visible.
fn pixel_bounds(image: &RgbaImage, rect: &Rect) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = image.dimensions();
    let x0 = rect.x0.floor().max(0.0) as u32;
    let y0 = rect.y0.floor().max(0.0) as u32;
    let x1 = (rect.x1.ceil().max(0.0) as u32).min(width);
    let y1 = (rect.y1.ceil().max(0.0) as u32).min(height);
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

pub fn fill_rect(image: &mut RgbaImage, rect: &Rect, color: [u8; 4]) {
    let Some((x0, y0, x1, y1)) = pixel_bounds(image, rect) else {
        return;
    };

    for y in y0..y1 {
        for x in x0..x1 {
            blend(image.get_pixel_mut(x, y), color);
        }
    }
}

/// Outline `rect` (in image pixels) with a border `thickness` pixels wide,
/// drawn inside the rectangle.
pub fn outline_rect(image: &mut RgbaImage, rect: &Rect, color: [u8; 4], thickness: u32) {
    let Some((x0, y0, x1, y1)) = pixel_bounds(image, rect) else {
        return;
    };
    let t = thickness.max(1);

    for y in y0..y1 {
        for x in x0..x1 {
            let border = x < x0 + t || x + t >= x1 || y < y0 + t || y + t >= y1;
            if border {
                blend(image.get_pixel_mut(x, y), color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn outline_leaves_interior_untouched() {
        let mut image = white(20, 20);
        outline_rect(&mut image, &Rect::new(2.0, 2.0, 12.0, 12.0), [255, 0, 0, 255], 1);

        assert_eq!(image.get_pixel(2, 5).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(11, 5).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(6, 6).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(15, 15).0, [255, 255, 255, 255]);
    }

    #[test]
    fn translucent_fill_blends() {
        let mut image = white(4, 4);
        fill_rect(&mut image, &Rect::new(0.0, 0.0, 4.0, 4.0), [0, 0, 0, 51]);
        // 255 * (255 - 51) / 255 = 204
        assert_eq!(image.get_pixel(1, 1).0, [204, 204, 204, 255]);
    }

    #[test]
    fn offscreen_rects_are_ignored() {
        let mut image = white(4, 4);
        fill_rect(&mut image, &Rect::new(10.0, 10.0, 20.0, 20.0), [0, 0, 0, 255]);
        outline_rect(&mut image, &Rect::new(-8.0, -8.0, -1.0, -1.0), [0, 0, 0, 255], 2);
        assert!(image.pixels().all(|pixel| pixel.0 == [255, 255, 255, 255]));
    }
}
