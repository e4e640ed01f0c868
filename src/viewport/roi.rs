use crate::frame::{MotionBox, Point, Size};

const EPSILON: f64 = 1e-9;

/// Weights of the region-of-interest score.
///
/// `score = area/A − distance_weight·dist − bottom_weight·bottom_penalty`
/// where `area` is capped at `area_cap_fraction·A`, `dist` is the distance to
/// the previous center normalized by the frame diagonal, and the bottom
/// penalty ramps from 0 to 1 across the lowest `bottom_ignore_fraction` of
/// the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoiWeights {
    pub area_cap_fraction: f64,
    pub bottom_ignore_fraction: f64,
    pub distance_weight: f64,
    pub bottom_weight: f64,
}

impl Default for RoiWeights {
    fn default() -> Self {
        Self {
            area_cap_fraction: 0.08,
            bottom_ignore_fraction: 0.30,
            distance_weight: 0.6,
            bottom_weight: 2.5,
        }
    }
}

impl RoiWeights {
    /// Score one candidate against the previous center `prev`.
    pub fn score(&self, candidate: &MotionBox, frame: Size, prev: Point) -> f64 {
        let (w, h) = (frame.width as f64, frame.height as f64);
        let frame_area = w * h;
        let diagonal = w.hypot(h);

        let area = (candidate.area() as f64).min(self.area_cap_fraction * frame_area);
        let (cx, cy) = candidate.center();
        let dist = (cx - prev.x as f64).hypot(cy - prev.y as f64) / (diagonal + EPSILON);

        let bottom_zone_start = (1.0 - self.bottom_ignore_fraction) * h;
        let bottom_penalty = if cy > bottom_zone_start {
            (cy - bottom_zone_start) / (h * self.bottom_ignore_fraction + EPSILON)
        } else {
            0.0
        };

        area / frame_area - self.distance_weight * dist - self.bottom_weight * bottom_penalty
    }

    /// Pick the center of the best-scoring box.
    ///
    /// Without candidates the previous center is kept (frame center when there
    /// is none). Ties go to the earliest box. The chosen center is truncated
    /// to whole pixels.
    pub fn select(&self, boxes: &[MotionBox], frame: Size, previous: Option<Point>) -> Point {
        let prev = previous.unwrap_or_else(|| frame.center());
        let mut best: Option<(f64, Point)> = None;
        for candidate in boxes {
            let score = self.score(candidate, frame, prev);
            if best.map_or(true, |(best_score, _)| score > best_score) {
                let (cx, cy) = candidate.center();
                best = Some((score, Point::new(cx as i64, cy as i64)));
            }
        }
        best.map_or(prev, |(_, center)| center)
    }
}

/// `RoiWeights::default().select(..)`.
pub fn select_roi(boxes: &[MotionBox], frame: Size, previous: Option<Point>) -> Point {
    RoiWeights::default().select(boxes, frame, previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VGA: Size = Size {
        width: 640,
        height: 480,
    };

    #[test]
    fn no_boxes_keeps_previous_or_frame_center() {
        assert_eq!(select_roi(&[], VGA, None), Point::new(320, 240));
        assert_eq!(
            select_roi(&[], VGA, Some(Point::new(10, 20))),
            Point::new(10, 20)
        );
    }

    #[test]
    fn single_box_matches_hand_computed_score() {
        let b = MotionBox::new(100, 100, 50, 50);
        let score = RoiWeights::default().score(&b, VGA, VGA.center());
        // 2500/307200 − 0.6·hypot(195, 115)/800
        let expected = 2500.0 / 307_200.0 - 0.6 * (195f64).hypot(115.0) / 800.0;
        assert!((score - expected).abs() < 1e-9);
        assert!((score - (-0.16165)).abs() < 1e-4);
        assert_eq!(select_roi(&[b], VGA, None), Point::new(125, 125));
    }

    #[test]
    fn equal_scores_keep_first_box() {
        // Mirror images around the previous center score identically.
        let left = MotionBox::new(200, 200, 40, 40);
        let right = MotionBox::new(400, 200, 40, 40);
        let weights = RoiWeights::default();
        assert_eq!(
            weights.score(&left, VGA, VGA.center()),
            weights.score(&right, VGA, VGA.center())
        );
        assert_eq!(select_roi(&[left, right], VGA, None), Point::new(220, 220));
        assert_eq!(select_roi(&[right, left], VGA, None), Point::new(420, 220));
    }

    #[test]
    fn larger_area_scores_higher_at_equal_distance() {
        let weights = RoiWeights::default();
        let small = MotionBox::new(300, 200, 20, 20);
        let large = MotionBox::new(280, 180, 60, 60);
        assert_eq!(small.center(), large.center());
        assert!(weights.score(&large, VGA, VGA.center()) > weights.score(&small, VGA, VGA.center()));
    }

    #[test]
    fn area_is_capped() {
        let weights = RoiWeights::default();
        let huge = MotionBox::new(0, 0, 640, 330);
        let (cx, cy) = huge.center();
        let dist = (cx - 320.0).hypot(cy - 240.0) / 800.0;
        let score = weights.score(&huge, VGA, VGA.center());
        assert!((score - (0.08 - 0.6 * dist)).abs() < 1e-9);
    }

    #[test]
    fn bottom_zone_blobs_are_penalized() {
        let weights = RoiWeights::default();
        // Center y = 456, 120 px into the 144 px bottom zone.
        let low = MotionBox::new(300, 436, 40, 40);
        let (_, cy) = low.center();
        assert_eq!(cy, 456.0);
        let no_penalty = weights.score(&MotionBox::new(300, 0, 40, 40), VGA, Point::new(320, 240));
        let penalized = weights.score(&low, VGA, Point::new(320, 240));
        assert!(penalized < no_penalty);

        let higher = MotionBox::new(300, 300, 40, 40);
        assert_eq!(select_roi(&[low, higher], VGA, None), Point::new(320, 320));
    }

    #[test]
    fn continuity_prefers_nearby_motion() {
        let near = MotionBox::new(500, 100, 30, 30);
        let far = MotionBox::new(50, 100, 30, 30);
        let prev = Some(Point::new(520, 110));
        assert_eq!(select_roi(&[far, near], VGA, prev), Point::new(515, 115));
    }

    #[test]
    fn centers_truncate() {
        let b = MotionBox::new(10, 10, 5, 7);
        assert_eq!(select_roi(&[b], VGA, None), Point::new(12, 13));
    }
}
