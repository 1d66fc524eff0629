use nalgebra::Vector2;

use crate::pose::{KeypointIndex as K, PoseFrame};

/// 体節と質量比。見えている体節だけで正規化する
const SEGMENTS: &[(&[K], f32)] = &[
    (&[K::Nose, K::LeftEye, K::RightEye, K::LeftEar, K::RightEar], 0.08),
    (&[K::LeftShoulder, K::RightShoulder], 0.16),
    (&[K::LeftElbow, K::RightElbow, K::LeftWrist, K::RightWrist], 0.04),
    (&[K::LeftHip, K::RightHip], 0.46),
    (&[K::LeftKnee, K::RightKnee], 0.14),
    (&[K::LeftAnkle, K::RightAnkle], 0.06),
];

/// 有効キーポイントの算術平均
///
/// 有効なキーポイントがなければ `None`（重心未定義）。
pub fn center_of_mass(frame: &PoseFrame, threshold: f32) -> Option<Vector2<f32>> {
    let (sum, count) = frame
        .keypoints
        .iter()
        .filter(|k| k.is_valid(threshold))
        .fold((Vector2::<f32>::zeros(), 0usize), |(sum, n), k| {
            (sum + Vector2::new(k.x, k.y), n + 1)
        });

    (count > 0).then(|| sum / count as f32)
}

/// 体節の質量比で重み付けした重心
pub fn segment_weighted_center(frame: &PoseFrame, threshold: f32) -> Option<Vector2<f32>> {
    let mut weighted = Vector2::<f32>::zeros();
    let mut total_weight = 0.0f32;

    for (indices, weight) in SEGMENTS {
        let (sum, count) = indices
            .iter()
            .filter_map(|&idx| frame.valid_keypoint(idx, threshold))
            .fold((Vector2::<f32>::zeros(), 0usize), |(sum, n), k| {
                (sum + Vector2::new(k.x, k.y), n + 1)
            });
        if count == 0 {
            continue;
        }
        weighted += (sum / count as f32) * *weight;
        total_weight += weight;
    }

    (total_weight > 0.0).then(|| weighted / total_weight)
}

/// 重心の求め方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CenterMethod {
    #[default]
    Arithmetic,
    SegmentWeighted,
}

impl CenterMethod {
    pub fn locate(self, frame: &PoseFrame, threshold: f32) -> Option<Vector2<f32>> {
        match self {
            Self::Arithmetic => center_of_mass(frame, threshold),
            Self::SegmentWeighted => segment_weighted_center(frame, threshold),
        }
    }
}
