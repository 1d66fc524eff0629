use serde::Serialize;

use crate::config::SymmetryConfig;
use crate::pose::{KeypointIndex, PoseFrame};

/// 左右ペア
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPair {
    Shoulders,
    Elbows,
    Wrists,
    Hips,
    Knees,
    Ankles,
}

impl BodyPair {
    pub const ALL: [BodyPair; 6] = [
        Self::Shoulders,
        Self::Elbows,
        Self::Wrists,
        Self::Hips,
        Self::Knees,
        Self::Ankles,
    ];

    pub fn keypoints(self) -> (KeypointIndex, KeypointIndex) {
        use KeypointIndex::*;
        match self {
            Self::Shoulders => (LeftShoulder, RightShoulder),
            Self::Elbows => (LeftElbow, RightElbow),
            Self::Wrists => (LeftWrist, RightWrist),
            Self::Hips => (LeftHip, RightHip),
            Self::Knees => (LeftKnee, RightKnee),
            Self::Ankles => (LeftAnkle, RightAnkle),
        }
    }

    /// 体幹に近いほど重い
    pub fn importance(self) -> f32 {
        match self {
            Self::Shoulders | Self::Hips => 1.0,
            Self::Knees => 0.9,
            Self::Ankles => 0.8,
            Self::Elbows => 0.7,
            Self::Wrists => 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairSymmetry {
    pub pair: BodyPair,
    /// [0, 1]
    pub similarity: f32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymmetryScore {
    /// [0, 1]。有効ペアが無いときは 1.0
    pub score: f32,
    pub pairs_used: usize,
    pub pairs: Vec<PairSymmetry>,
}

impl SymmetryScore {
    /// 1.0 が実測でなくデフォルトであることを示す
    pub fn is_insufficient(&self) -> bool {
        self.pairs_used == 0
    }

    pub fn percent(&self) -> f32 {
        self.score * 100.0
    }
}

/// `max(0, 1 - |Δy| / max_expected_difference)`
pub fn pair_similarity(left_y: f32, right_y: f32, max_expected_difference: f32) -> f32 {
    (1.0 - (left_y - right_y).abs() / max_expected_difference).max(0.0)
}

pub fn symmetry_score(frame: &PoseFrame, threshold: f32, config: &SymmetryConfig) -> SymmetryScore {
    let pairs: Vec<PairSymmetry> = BodyPair::ALL
        .iter()
        .filter_map(|&pair| {
            let (l, r) = pair.keypoints();
            let left = frame.valid_keypoint(l, threshold)?;
            let right = frame.valid_keypoint(r, threshold)?;
            let confidence = (left.confidence + right.confidence) / 2.0;
            Some(PairSymmetry {
                pair,
                similarity: pair_similarity(left.y, right.y, config.max_expected_difference),
                weight: confidence * pair.importance(),
            })
        })
        .collect();

    let total_weight: f32 = pairs.iter().map(|p| p.weight).sum();
    let score = if total_weight > 0.0 {
        pairs.iter().map(|p| p.similarity * p.weight).sum::<f32>() / total_weight
    } else {
        1.0
    };

    SymmetryScore {
        score,
        pairs_used: pairs.len(),
        pairs,
    }
}
