use std::collections::VecDeque;

use crate::frame::Point;

/// Sliding-window moving average over viewport centers.
///
/// Holds at most `capacity` samples; the oldest is evicted when a new one
/// arrives at capacity.
#[derive(Clone, Debug)]
pub struct SmoothingWindow {
    capacity: usize,
    samples: VecDeque<Point>,
}

impl SmoothingWindow {
    /// A zero capacity is treated as one, which disables smoothing.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Add a sample and return the smoothed value.
    ///
    /// With fewer than two samples the input is returned unchanged; otherwise
    /// the arithmetic mean of the window, truncated toward zero.
    pub fn push(&mut self, sample: Point) -> Point {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        if self.samples.len() < 2 {
            return sample;
        }
        let n = self.samples.len() as i64;
        let (sx, sy) = self
            .samples
            .iter()
            .fold((0i64, 0i64), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        let mut window = SmoothingWindow::new(5);
        assert_eq!(window.push(Point::new(11, 7)), Point::new(11, 7));
    }

    #[test]
    fn averages_prefix_then_last_n() {
        let inputs = [10, 20, 30, 40, 50];
        let mut window = SmoothingWindow::new(3);
        let outputs: Vec<i64> = inputs
            .iter()
            .map(|&v| window.push(Point::new(v, v * 2)).x)
            .collect();
        // K <= N: mean of the first K; K > N: mean of the last N.
        assert_eq!(outputs, vec![10, 15, 20, 30, 40]);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn mean_truncates() {
        let mut window = SmoothingWindow::new(4);
        window.push(Point::new(1, 0));
        assert_eq!(window.push(Point::new(2, 1)), Point::new(1, 0));
    }

    #[test]
    fn clear_restarts_smoothing() {
        let mut window = SmoothingWindow::new(4);
        window.push(Point::new(100, 100));
        window.push(Point::new(200, 200));
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.push(Point::new(7, 9)), Point::new(7, 9));
    }

    #[test]
    fn zero_capacity_disables_smoothing() {
        let mut window = SmoothingWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(Point::new(1, 1));
        assert_eq!(window.push(Point::new(9, 9)), Point::new(9, 9));
    }
}
