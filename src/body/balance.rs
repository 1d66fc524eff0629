use nalgebra::Vector2;
use serde::Serialize;

use crate::config::BalanceConfig;
use crate::motion::history::RollingWindow;
use crate::pose::{KeypointIndex, PoseFrame};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BalanceMetrics {
    /// [0, 1]
    pub stability: f32,
    /// 両足首の水平距離（ピクセル）。足首が欠けていれば 0
    pub base_of_support: f32,
    pub com_within_base: bool,
    /// 重心 x の揺れ（ピクセル、母標準偏差）。Precise モードのみ
    pub sway: Option<f32>,
}

/// 支持基底に対する重心位置から安定度を求める。
///
/// 両足首が閾値以上でなければ安定度 0。
pub fn balance(
    frame: &PoseFrame,
    center: Option<Vector2<f32>>,
    threshold: f32,
    config: &BalanceConfig,
) -> BalanceMetrics {
    let left = frame.valid_keypoint(KeypointIndex::LeftAnkle, threshold);
    let right = frame.valid_keypoint(KeypointIndex::RightAnkle, threshold);
    let (Some(left), Some(right)) = (left, right) else {
        return BalanceMetrics::default();
    };

    let span = (left.x - right.x).abs();
    let min_x = left.x.min(right.x) - config.margin;
    let max_x = left.x.max(right.x) + config.margin;
    let within = center.is_some_and(|c| (min_x..=max_x).contains(&c.x));

    let stability = if within {
        (span / config.full_stability_span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    BalanceMetrics {
        stability,
        base_of_support: span,
        com_within_base: within,
        sway: None,
    }
}

/// 重心 x 座標の履歴から左右の揺れを測る
#[derive(Debug, Clone)]
pub struct SwayTracker {
    history: RollingWindow,
}

impl SwayTracker {
    pub fn new(window: usize) -> Self {
        Self {
            history: RollingWindow::new(window),
        }
    }

    pub fn from_config(config: &BalanceConfig) -> Self {
        Self::new(config.sway_window)
    }

    /// 観測を追加して現在の揺れを返す
    pub fn update(&mut self, center_x: f32) -> f32 {
        self.history.push(center_x);
        self.history.std_dev()
    }

    pub fn sway(&self) -> f32 {
        self.history.std_dev()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Default for SwayTracker {
    fn default() -> Self {
        Self::from_config(&BalanceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    fn feet(left_x: f32, right_x: f32, confidence: f32) -> PoseFrame {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[KeypointIndex::LeftAnkle as usize] = Keypoint::new(left_x, 400.0, confidence);
        keypoints[KeypointIndex::RightAnkle as usize] = Keypoint::new(right_x, 400.0, confidence);
        PoseFrame::new(keypoints, confidence, 0.0)
    }

    #[test]
    fn test_centered_stance() {
        let config = BalanceConfig::default();
        let m = balance(&feet(100.0, 160.0, 0.9), Some(Vector2::new(130.0, 200.0)), 0.3, &config);
        assert!(m.com_within_base);
        assert_eq!(m.base_of_support, 60.0);
        assert!((m.stability - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_wide_stance_clamped() {
        let config = BalanceConfig::default();
        let m = balance(&feet(0.0, 250.0, 0.9), Some(Vector2::new(125.0, 0.0)), 0.3, &config);
        assert_eq!(m.stability, 1.0);
    }

    #[test]
    fn test_margin_edges() {
        let config = BalanceConfig::default();
        let frame = feet(100.0, 160.0, 0.9);
        let m = balance(&frame, Some(Vector2::new(80.0, 0.0)), 0.3, &config);
        assert!(m.com_within_base);
        let m = balance(&frame, Some(Vector2::new(181.0, 0.0)), 0.3, &config);
        assert!(!m.com_within_base);
        assert_eq!(m.stability, 0.0);
    }

    #[test]
    fn test_missing_foot() {
        let config = BalanceConfig::default();
        let mut frame = feet(100.0, 160.0, 0.9);
        frame.keypoints[KeypointIndex::RightAnkle as usize].confidence = 0.1;
        let m = balance(&frame, Some(Vector2::new(130.0, 0.0)), 0.3, &config);
        assert_eq!(m, BalanceMetrics::default());
    }

    #[test]
    fn test_undefined_center() {
        let m = balance(&feet(100.0, 160.0, 0.9), None, 0.3, &BalanceConfig::default());
        assert!(!m.com_within_base);
        assert_eq!(m.stability, 0.0);
        assert_eq!(m.base_of_support, 60.0);
    }

    #[test]
    fn test_sway() {
        let mut tracker = SwayTracker::new(4);
        assert_eq!(tracker.update(100.0), 0.0);
        tracker.update(100.0);
        tracker.update(110.0);
        let sway = tracker.update(110.0);
        assert!((sway - 5.0).abs() < 1e-5);

        // 古い値は窓から落ちる
        tracker.update(110.0);
        tracker.update(110.0);
        assert!(tracker.sway().abs() < 1e-6);

        tracker.reset();
        assert!(tracker.is_empty());
    }
}
