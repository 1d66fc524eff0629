//! Joint angles from keypoint triads.
//!
//! The angle at the middle keypoint uses cos(θ) = (v1 · v2) / (|v1| |v2|)
//! with v1, v2 pointing from the joint to its neighbours. Depth is used when
//! the detector provides it.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use serde::Serialize;

use crate::pose::{Keypoint, KeypointIndex, PoseFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    LeftElbow,
    RightElbow,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
}

impl Joint {
    pub const ALL: [Joint; 8] = [
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
    ];

    /// (近位, 関節, 遠位)
    pub fn triad(self) -> (KeypointIndex, KeypointIndex, KeypointIndex) {
        use KeypointIndex::*;
        match self {
            Self::LeftElbow => (LeftShoulder, LeftElbow, LeftWrist),
            Self::RightElbow => (RightShoulder, RightElbow, RightWrist),
            Self::LeftShoulder => (LeftElbow, LeftShoulder, LeftHip),
            Self::RightShoulder => (RightElbow, RightShoulder, RightHip),
            Self::LeftHip => (LeftShoulder, LeftHip, LeftKnee),
            Self::RightHip => (RightShoulder, RightHip, RightKnee),
            Self::LeftKnee => (LeftHip, LeftKnee, LeftAnkle),
            Self::RightKnee => (RightHip, RightKnee, RightAnkle),
        }
    }

    /// 表示用の解剖学的重要度
    pub fn importance(self) -> f32 {
        match self {
            Self::LeftKnee | Self::RightKnee => 1.0,
            Self::LeftHip | Self::RightHip => 0.9,
            Self::LeftElbow | Self::RightElbow => 0.8,
            Self::LeftShoulder | Self::RightShoulder => 0.7,
        }
    }

    /// 肘と膝は蝶番関節で、過伸展チェックの対象
    pub fn is_hinge(self) -> bool {
        matches!(
            self,
            Self::LeftElbow | Self::RightElbow | Self::LeftKnee | Self::RightKnee
        )
    }
}

pub type JointAngles = BTreeMap<Joint, f32>;

/// Emphasis weighting for display. `raw` is the geometric angle and is what
/// threshold checks must use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedAngle {
    pub raw: f32,
    /// 3 点の平均信頼度
    pub confidence: f32,
    pub weighted: f32,
}

fn position(k: &Keypoint) -> Vector3<f32> {
    Vector3::new(k.x, k.y, k.z)
}

/// 頂点 `vertex` における角度（度）。長さ 0 の辺があれば `None`
pub fn angle_at(a: &Keypoint, vertex: &Keypoint, c: &Keypoint) -> Option<f32> {
    let v1 = position(a) - position(vertex);
    let v2 = position(c) - position(vertex);

    let mag1 = v1.norm();
    let mag2 = v2.norm();
    if mag1 < 1e-4 || mag2 < 1e-4 {
        return None;
    }

    let cos_angle = (v1.dot(&v2) / (mag1 * mag2)).clamp(-1.0, 1.0);
    Some(cos_angle.acos().to_degrees())
}

fn valid_triad(
    frame: &PoseFrame,
    joint: Joint,
    threshold: f32,
) -> Option<(&Keypoint, &Keypoint, &Keypoint)> {
    let (a, b, c) = joint.triad();
    Some((
        frame.valid_keypoint(a, threshold)?,
        frame.valid_keypoint(b, threshold)?,
        frame.valid_keypoint(c, threshold)?,
    ))
}

/// 3 点すべてが閾値以上の関節だけを返す
pub fn joint_angles(frame: &PoseFrame, threshold: f32) -> JointAngles {
    Joint::ALL
        .iter()
        .filter_map(|&joint| {
            let (a, b, c) = valid_triad(frame, joint, threshold)?;
            Some((joint, angle_at(a, b, c)?))
        })
        .collect()
}

pub fn weighted_joint_angles(frame: &PoseFrame, threshold: f32) -> BTreeMap<Joint, WeightedAngle> {
    Joint::ALL
        .iter()
        .filter_map(|&joint| {
            let (a, b, c) = valid_triad(frame, joint, threshold)?;
            let raw = angle_at(a, b, c)?;
            let confidence = (a.confidence + b.confidence + c.confidence) / 3.0;
            Some((
                joint,
                WeightedAngle {
                    raw,
                    confidence,
                    weighted: raw * confidence * joint.importance(),
                },
            ))
        })
        .collect()
}

/// 生角度が閾値を超えた蝶番関節
pub fn hyperextension_warnings(angles: &JointAngles, threshold_degrees: f32) -> Vec<Joint> {
    angles
        .iter()
        .filter(|(joint, angle)| joint.is_hinge() && **angle > threshold_degrees)
        .map(|(joint, _)| *joint)
        .collect()
}
