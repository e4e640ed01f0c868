// imgops.rs: pixel operations behind the frame-difference detector.
//
// All operations work on row-major 8-bit planes. Masks are `Vec<bool>` of the
// same length as the plane they were derived from.
//
// BORDER HANDLING:
//   blur:   replicate edge pixels (clamp the sample index).
//   dilate: out-of-bounds neighbors are ignored, so the border never grows
//           foreground on its own.

use image::{imageops, GrayImage, RgbImage};
use std::collections::VecDeque;

use crate::frame::MotionBox;

/// Coerce a configured blur size to an odd kernel size of at least 3.
pub fn coerce_kernel_size(size: u32) -> usize {
    let mut k = size as usize;
    if k % 2 == 0 {
        k += 1;
    }
    k.max(3)
}

/// Normalized 1D Gaussian weights for a kernel of odd size `k`.
///
/// Sigma is derived from the size: σ = 0.3·((k−1)·0.5 − 1) + 0.8.
pub fn gaussian_kernel(k: usize) -> Vec<f32> {
    let sigma = 0.3 * ((k as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (k / 2) as f64;
    let weights: Vec<f64> = (0..k)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / total) as f32).collect()
}

/// Convert to single-channel intensity.
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    imageops::grayscale(frame)
}

/// Separable Gaussian blur with a square kernel of odd size `k`.
pub fn gaussian_blur(src: &GrayImage, k: usize) -> GrayImage {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let kernel = gaussian_kernel(k);
    let half = k / 2;
    let plane = src.as_raw();

    // Horizontal pass.
    let mut rows = vec![0f32; w * h];
    for y in 0..h {
        let line = &plane[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x + ki).saturating_sub(half).min(w - 1);
                acc += line[sx] as f32 * kv;
            }
            rows[y * w + x] = acc;
        }
    }

    // Vertical pass.
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y + ki).saturating_sub(half).min(h - 1);
                acc += rows[sy * w + x] * kv;
            }
            out[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }

    GrayImage::from_raw(w as u32, h as u32, out).unwrap_or_else(|| GrayImage::new(0, 0))
}

/// Pixels whose absolute difference is at least `threshold` become foreground.
pub fn diff_mask(prev: &GrayImage, current: &GrayImage, threshold: f64) -> Vec<bool> {
    prev.as_raw()
        .iter()
        .zip(current.as_raw())
        .map(|(&a, &b)| (a.abs_diff(b) as f64) >= threshold)
        .collect()
}

/// Grow foreground by one pixel in every direction (3×3 neighborhood), `iterations` times.
pub fn dilate(mask: &[bool], width: usize, height: usize, iterations: usize) -> Vec<bool> {
    let mut current = mask.to_vec();
    for _ in 0..iterations {
        let mut next = vec![false; current.len()];
        for y in 0..height {
            let y0 = y.saturating_sub(1);
            let y1 = (y + 1).min(height - 1);
            for x in 0..width {
                let x0 = x.saturating_sub(1);
                let x1 = (x + 1).min(width - 1);
                next[y * width + x] =
                    (y0..=y1).any(|ny| (x0..=x1).any(|nx| current[ny * width + nx]));
            }
        }
        current = next;
    }
    current
}

/// Bounding boxes of the external foreground regions of `mask`.
///
/// Foreground is 8-connected, background 4-connected. A region is external
/// when it touches the frame edge or borders the background that is connected
/// to the frame edge; regions sitting inside another region's hole are
/// skipped. Boxes come out in raster order of each region's first pixel.
pub fn external_regions(mask: &[bool], width: usize, height: usize) -> Vec<MotionBox> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let outer = outer_background(mask, width, height);
    let mut visited = vec![false; mask.len()];
    let mut boxes = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        let mut external = false;

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % width, idx / width);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                external = true;
            }

            for (nx, ny) in neighbors(x, y, width, height, true) {
                let n = ny * width + nx;
                if mask[n] {
                    if !visited[n] {
                        visited[n] = true;
                        queue.push_back(n);
                    }
                } else if !external && outer[n] && (nx == x || ny == y) {
                    external = true;
                }
            }
        }

        if external {
            boxes.push(MotionBox::new(
                min_x as u32,
                min_y as u32,
                (max_x - min_x + 1) as u32,
                (max_y - min_y + 1) as u32,
            ));
        }
    }
    boxes
}

/// Background pixels 4-connected to the frame edge.
fn outer_background(mask: &[bool], width: usize, height: usize) -> Vec<bool> {
    let mut outer = vec![false; mask.len()];
    let mut queue = VecDeque::new();
    let edge = (0..width)
        .flat_map(|x| [(x, 0), (x, height - 1)])
        .chain((0..height).flat_map(|y| [(0, y), (width - 1, y)]));
    for (x, y) in edge {
        let idx = y * width + x;
        if !mask[idx] && !outer[idx] {
            outer[idx] = true;
            queue.push_back(idx);
        }
    }
    while let Some(idx) = queue.pop_front() {
        let (x, y) = (idx % width, idx / width);
        for (nx, ny) in neighbors(x, y, width, height, false) {
            let n = ny * width + nx;
            if !mask[n] && !outer[n] {
                outer[n] = true;
                queue.push_back(n);
            }
        }
    }
    outer
}

fn neighbors(
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    diagonal: bool,
) -> impl Iterator<Item = (usize, usize)> {
    static OFFSETS: [(i64, i64); 8] = [
        (0, -1),
        (-1, 0),
        (1, 0),
        (0, 1),
        (-1, -1),
        (1, -1),
        (-1, 1),
        (1, 1),
    ];
    let count = if diagonal { 8 } else { 4 };
    OFFSETS[..count].iter().filter_map(move |&(dx, dy)| {
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        (nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64)
            .then_some((nx as usize, ny as usize))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> (Vec<bool>, usize, usize) {
        let width = rows[0].len();
        let mask = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        (mask, width, rows.len())
    }

    #[test]
    fn kernel_size_is_odd_and_at_least_three() {
        assert_eq!(coerce_kernel_size(0), 3);
        assert_eq!(coerce_kernel_size(1), 3);
        assert_eq!(coerce_kernel_size(2), 3);
        assert_eq!(coerce_kernel_size(4), 5);
        assert_eq!(coerce_kernel_size(5), 5);
        assert_eq!(coerce_kernel_size(21), 21);
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(5);
        let total: f32 = k.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!((k[0] - k[4]).abs() < 1e-6);
        assert!(k[2] > k[1] && k[1] > k[0]);
    }

    #[test]
    fn blur_keeps_flat_image_flat() {
        let flat = GrayImage::from_pixel(9, 7, image::Luma([80]));
        let blurred = gaussian_blur(&flat, 5);
        assert!(blurred.as_raw().iter().all(|&p| p == 80));
    }

    #[test]
    fn diff_mask_uses_inclusive_threshold() {
        let a = GrayImage::from_raw(3, 1, vec![10, 10, 10]).unwrap();
        let b = GrayImage::from_raw(3, 1, vec![34, 35, 36]).unwrap();
        assert_eq!(diff_mask(&a, &b, 25.0), vec![false, true, true]);
    }

    #[test]
    fn dilate_grows_three_pixels_in_three_iterations() {
        let (mask, w, h) = mask_from(&[
            "...........",
            "...........",
            "...........",
            "...........",
            ".....#.....",
            "...........",
            "...........",
            "...........",
            "...........",
        ]);
        let grown = dilate(&mask, w, h, 3);
        let boxes = external_regions(&grown, w, h);
        assert_eq!(boxes, vec![MotionBox::new(2, 1, 7, 7)]);
    }

    #[test]
    fn regions_are_eight_connected_in_raster_order() {
        let (mask, w, h) = mask_from(&[
            "......##",
            ".#....##",
            "..#.....",
            "........",
        ]);
        let boxes = external_regions(&mask, w, h);
        assert_eq!(
            boxes,
            vec![MotionBox::new(6, 0, 2, 2), MotionBox::new(1, 1, 2, 2)]
        );
    }

    #[test]
    fn regions_inside_holes_are_not_external() {
        let (mask, w, h) = mask_from(&[
            ".........",
            ".#######.",
            ".#.....#.",
            ".#..#..#.",
            ".#.....#.",
            ".#######.",
            ".........",
        ]);
        let boxes = external_regions(&mask, w, h);
        assert_eq!(boxes, vec![MotionBox::new(1, 1, 7, 5)]);
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let (mask, w, h) = mask_from(&["....", "...."]);
        assert!(external_regions(&mask, w, h).is_empty());
    }
}
