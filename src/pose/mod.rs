pub mod ingest;
pub mod keypoint;

pub use ingest::{parse_pose_json, parse_replay_line, IngestError, RawKeypoint, RawPose};
pub use keypoint::{Keypoint, KeypointIndex, PoseFrame};
