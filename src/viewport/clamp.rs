use crate::frame::{Point, Size};

/// Keep a viewport of `viewport` size centered at `target` inside `frame`.
///
/// Each axis is clamped to `[v/2, F − v/2]` (integer floor division). When the
/// viewport is larger than the frame on an axis the range is empty; that axis
/// is pinned to the frame's center instead.
pub fn clamp_center(target: Point, frame: Size, viewport: Size) -> Point {
    Point::new(
        clamp_axis(target.x, frame.width, viewport.width),
        clamp_axis(target.y, frame.height, viewport.height),
    )
}

fn clamp_axis(value: i64, frame: u32, viewport: u32) -> i64 {
    let half = viewport as i64 / 2;
    let lo = half;
    let hi = frame as i64 - half;
    if lo > hi {
        frame as i64 / 2
    } else {
        value.clamp(lo, hi)
    }
}
