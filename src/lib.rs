pub mod analyzer;
pub mod body;
pub mod config;
pub mod diagnostics;
pub mod motion;
pub mod pose;
pub mod units;

pub use analyzer::{FrameMetrics, MotionAnalyzer, SessionSummary};
pub use config::{AnalysisMode, Config};
pub use motion::MotionCalculator;
pub use pose::{Keypoint, KeypointIndex, PoseFrame};
