//! Detector output → validated `PoseFrame`.
//!
//! Every NaN / out-of-range value is rejected here so the math downstream
//! can assume finite coordinates and confidence in [0, 1].

use nalgebra::Vector2;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::keypoint::{Keypoint, KeypointIndex, PoseFrame};

/// Keypoint as emitted by TF.js / ONNX pose models.
#[derive(Debug, Clone, Deserialize)]
pub struct RawKeypoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: Option<f32>,
    /// MoveNet/PoseNet call it `score`, some wrappers `confidence`.
    #[serde(alias = "confidence", default)]
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPose {
    pub keypoints: Vec<RawKeypoint>,
    #[serde(default)]
    pub score: Option<f32>,
    /// 秒
    pub timestamp: f64,
    /// 累積カメラ位置（ピクセル）。パン補正用
    #[serde(default)]
    pub camera_offset: Option<[f32; 2]>,
}

impl RawPose {
    pub fn camera_offset(&self) -> Result<Option<Vector2<f32>>, IngestError> {
        match self.camera_offset {
            Some([x, y]) if x.is_finite() && y.is_finite() => Ok(Some(Vector2::new(x, y))),
            Some([x, y]) => Err(IngestError::NonFiniteCameraOffset(x, y)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("keypoint `{name}` has a non-finite coordinate")]
    NonFiniteCoordinate { name: String },
    #[error("keypoint `{name}` confidence {value} is outside [0, 1]")]
    ConfidenceOutOfRange { name: String, value: f32 },
    #[error("pose score {0} is outside [0, 1]")]
    ScoreOutOfRange(f32),
    #[error("timestamp {0} is not finite")]
    NonFiniteTimestamp(f64),
    #[error("keypoint `{0}` appears more than once")]
    DuplicateKeypoint(String),
    #[error("camera offset ({0}, {1}) is not finite")]
    NonFiniteCameraOffset(f32, f32),
}

fn check_confidence(name: &str, value: f32) -> Result<f32, IngestError> {
    // NaN fails the range check too
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(IngestError::ConfidenceOutOfRange {
            name: name.to_string(),
            value,
        })
    }
}

impl TryFrom<RawPose> for PoseFrame {
    type Error = IngestError;

    fn try_from(raw: RawPose) -> Result<Self, Self::Error> {
        if !raw.timestamp.is_finite() {
            return Err(IngestError::NonFiniteTimestamp(raw.timestamp));
        }

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        let mut seen = [false; KeypointIndex::COUNT];

        for kp in &raw.keypoints {
            let Some(index) = KeypointIndex::from_name(&kp.name) else {
                debug!(name = %kp.name, "ignoring keypoint outside the 17-point model");
                continue;
            };
            if seen[index as usize] {
                return Err(IngestError::DuplicateKeypoint(kp.name.clone()));
            }
            seen[index as usize] = true;

            let z = kp.z.unwrap_or(0.0);
            if !kp.x.is_finite() || !kp.y.is_finite() || !z.is_finite() {
                return Err(IngestError::NonFiniteCoordinate {
                    name: kp.name.clone(),
                });
            }
            // スコアなしは「検出なし」として扱う
            let confidence = match kp.score {
                Some(score) => check_confidence(&kp.name, score)?,
                None => 0.0,
            };

            keypoints[index as usize] = Keypoint::new(kp.x, kp.y, confidence).with_z(z);
        }

        let score = match raw.score {
            Some(s) if (0.0..=1.0).contains(&s) => s,
            Some(s) => return Err(IngestError::ScoreOutOfRange(s)),
            None => {
                let sum: f32 = keypoints.iter().map(|k| k.confidence).sum();
                sum / KeypointIndex::COUNT as f32
            }
        };

        Ok(PoseFrame::new(keypoints, score, raw.timestamp))
    }
}

/// JSON 1 行をパースして検証する
pub fn parse_pose_json(line: &str) -> anyhow::Result<PoseFrame> {
    let (frame, _) = parse_replay_line(line)?;
    Ok(frame)
}

/// リプレイ用の 1 行。カメラオフセットも返す
pub fn parse_replay_line(line: &str) -> anyhow::Result<(PoseFrame, Option<Vector2<f32>>)> {
    let raw: RawPose = serde_json::from_str(line)?;
    let offset = raw.camera_offset()?;
    Ok((PoseFrame::try_from(raw)?, offset))
}
