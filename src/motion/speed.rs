use serde::Serialize;

use crate::pose::{Keypoint, KeypointIndex, PoseFrame};

/// 速度メトリクス (m/s)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedMetrics {
    pub instantaneous: f32,
    /// 直近ウィンドウの平均
    pub average: f32,
    /// セッション最大（reset まで単調増加）
    pub max: f32,
    /// 0〜1。フレーム落ちや外れ値で下がる
    pub confidence: f32,
    /// 平滑化後の速度ベクトル (m/s, 画像座標系)
    pub velocity: [f32; 2],
}

impl SpeedMetrics {
    /// 計算できなかったフレーム用。平均と最大は既存の状態を引き継ぐ
    pub fn zero(average: f32, max: f32) -> Self {
        Self {
            instantaneous: 0.0,
            average,
            max,
            confidence: 0.0,
            velocity: [0.0, 0.0],
        }
    }
}

/// 期待間隔に対する実際の dt の比。フレーム落ち直後ほど低い
pub fn frame_confidence(delta_time: f32, expected_interval: f32) -> f32 {
    if delta_time <= 0.0 {
        return 0.0;
    }
    (expected_interval / delta_time).min(1.0)
}

/// 手首・足首の速度 (m/s)。計算できない点は 0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LimbSpeeds {
    pub left_wrist: f32,
    pub right_wrist: f32,
    pub left_ankle: f32,
    pub right_ankle: f32,
}

impl LimbSpeeds {
    pub const KEYPOINTS: [KeypointIndex; 4] = [
        KeypointIndex::LeftWrist,
        KeypointIndex::RightWrist,
        KeypointIndex::LeftAnkle,
        KeypointIndex::RightAnkle,
    ];

    pub fn get(&self, index: KeypointIndex) -> Option<f32> {
        match index {
            KeypointIndex::LeftWrist => Some(self.left_wrist),
            KeypointIndex::RightWrist => Some(self.right_wrist),
            KeypointIndex::LeftAnkle => Some(self.left_ankle),
            KeypointIndex::RightAnkle => Some(self.right_ankle),
            _ => None,
        }
    }

    pub fn fastest(&self) -> f32 {
        [self.left_wrist, self.right_wrist, self.left_ankle, self.right_ankle]
            .into_iter()
            .fold(0.0, f32::max)
    }
}

/// 単一キーポイントの速度。どちらかの端点が閾値未満なら 0
pub fn point_speed(
    prev: &Keypoint,
    curr: &Keypoint,
    pixels_per_meter: f32,
    delta_time: f32,
    threshold: f32,
) -> f32 {
    if delta_time <= 0.0 || pixels_per_meter <= 0.0 {
        return 0.0;
    }
    if !prev.is_valid(threshold) || !curr.is_valid(threshold) {
        return 0.0;
    }
    prev.distance_to(curr) / pixels_per_meter / delta_time
}

pub fn limb_speeds(
    prev: &PoseFrame,
    curr: &PoseFrame,
    pixels_per_meter: f32,
    threshold: f32,
) -> LimbSpeeds {
    let dt = prev.delta_time(curr);
    let speed = |idx: KeypointIndex| {
        point_speed(prev.get(idx), curr.get(idx), pixels_per_meter, dt, threshold)
    };
    LimbSpeeds {
        left_wrist: speed(KeypointIndex::LeftWrist),
        right_wrist: speed(KeypointIndex::RightWrist),
        left_ankle: speed(KeypointIndex::LeftAnkle),
        right_ankle: speed(KeypointIndex::RightAnkle),
    }
}
