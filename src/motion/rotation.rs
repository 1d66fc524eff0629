use std::f32::consts::{PI, TAU};

use serde::Serialize;

use crate::pose::{KeypointIndex, PoseFrame};

/// 角度（ラジアン）とその時刻
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngleSample {
    pub angle: f32,
    /// 秒
    pub timestamp: f64,
}

impl AngleSample {
    pub fn new(angle: f32, timestamp: f64) -> Self {
        Self { angle, timestamp }
    }
}

/// (-π, π] に折り返す
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// 直近 3 サンプルから角加速度 (deg/s²)。
///
/// 2 つの角速度を不等間隔の dt で求め、その差を dt の平均で割る。
/// サンプル不足または dt が正でなければ 0。
pub fn rotational_acceleration(samples: &[AngleSample]) -> f32 {
    let [.., a0, a1, a2] = samples else {
        return 0.0;
    };
    let dt1 = (a1.timestamp - a0.timestamp) as f32;
    let dt2 = (a2.timestamp - a1.timestamp) as f32;
    if dt1 <= 0.0 || dt2 <= 0.0 {
        return 0.0;
    }

    let omega1 = wrap_angle(a1.angle - a0.angle) / dt1;
    let omega2 = wrap_angle(a2.angle - a1.angle) / dt2;
    let alpha = (omega2 - omega1) / ((dt1 + dt2) / 2.0);
    alpha.to_degrees()
}

/// 肩ラインの傾き（ラジアン）。体幹回旋の代理指標
pub fn shoulder_line_angle(frame: &PoseFrame, threshold: f32) -> Option<f32> {
    let left = frame.valid_keypoint(KeypointIndex::LeftShoulder, threshold)?;
    let right = frame.valid_keypoint(KeypointIndex::RightShoulder, threshold)?;
    let dx = right.x - left.x;
    let dy = right.y - left.y;
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(f32::atan2(dy, dx))
}
