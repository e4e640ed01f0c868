use image::{imageops, Rgb, RgbImage};

use crate::frame::MotionBox;

pub const MOTION_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const VIEWPORT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Outline the rectangle `[x1, x2] × [y1, y2]` with the given stroke width.
///
/// Coordinates may lie outside the image; only the visible part is drawn.
#[allow(clippy::too_many_arguments)]
pub fn draw_rect(
    img: &mut RgbImage,
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
    color: Rgb<u8>,
    thickness: u32,
) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if w == 0 || h == 0 || x2 < x1 || y2 < y1 {
        return;
    }
    let t = thickness.max(1) as i64;
    let mut fill = |xa: i64, ya: i64, xb: i64, yb: i64| {
        for y in ya.max(0)..=yb.min(h - 1) {
            for x in xa.max(0)..=xb.min(w - 1) {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    };
    let half = (t - 1) / 2;
    fill(x1 - half, y1 - half, x2 + half, y1 - half + t - 1);
    fill(x1 - half, y2 - half, x2 + half, y2 - half + t - 1);
    fill(x1 - half, y1 - half, x1 - half + t - 1, y2 + half);
    fill(x2 - half, y1 - half, x2 - half + t - 1, y2 + half);
}

pub fn draw_motion_box(img: &mut RgbImage, b: &MotionBox) {
    let (x, y) = (b.x as i64, b.y as i64);
    draw_rect(
        img,
        x,
        y,
        x + b.width as i64,
        y + b.height as i64,
        MOTION_BOX_COLOR,
        1,
    );
}

/// Copy of the `[x1, x2) × [y1, y2)` region, clipped to the image.
pub fn crop_clipped(img: &RgbImage, x1: i64, y1: i64, x2: i64, y2: i64) -> RgbImage {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (cx1, cy1) = (x1.clamp(0, w), y1.clamp(0, h));
    let (cx2, cy2) = (x2.clamp(0, w), y2.clamp(0, h));
    if cx2 <= cx1 || cy2 <= cy1 {
        return RgbImage::new(0, 0);
    }
    imageops::crop_imm(
        img,
        cx1 as u32,
        cy1 as u32,
        (cx2 - cx1) as u32,
        (cy2 - cy1) as u32,
    )
    .to_image()
}
