use std::collections::VecDeque;

/// Fixed-capacity sample window; the oldest sample falls off when full.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f32>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// 空なら 0
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    /// 母標準偏差。空なら 0
    pub fn std_dev(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f32>()
            / self.values.len() as f32;
        variance.sqrt()
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    pub fn latest(&self) -> Option<f32> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut w = RollingWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert!((w.mean() - 3.0).abs() < 1e-6);
        assert_eq!(w.max(), 4.0);
        assert_eq!(w.latest(), Some(4.0));
    }

    #[test]
    fn test_empty_window() {
        let w = RollingWindow::new(5);
        assert_eq!(w.mean(), 0.0);
        assert_eq!(w.max(), 0.0);
        assert!(w.latest().is_none());
    }

    #[test]
    fn test_std_dev() {
        let mut w = RollingWindow::new(8);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            w.push(v);
        }
        assert!((w.std_dev() - 2.0).abs() < 1e-5);
        assert_eq!(RollingWindow::new(3).std_dev(), 0.0);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut w = RollingWindow::new(0);
        w.push(1.0);
        w.push(2.0);
        assert_eq!(w.len(), 1);
        assert_eq!(w.latest(), Some(2.0));
    }
}
