//! Unified per-frame pipeline.
//!
//! `MotionAnalyzer` wires the centroid, filter, kinematics, body and zone
//! stages together behind one `process` call and keeps the session-level
//! accumulators (distance, zone time, frame counts) that the individual
//! calculators do not own. The amount of work per frame follows
//! [`AnalysisMode`].

use std::collections::{BTreeMap, VecDeque};

use nalgebra::Vector2;
use serde::Serialize;
use tracing::{debug, info};

use crate::body::{
    balance, hyperextension_warnings, joint_angles, symmetry_score, weighted_joint_angles,
    BalanceMetrics, Joint, JointAngles, SwayTracker, SymmetryScore, WeightedAngle,
};
use crate::config::{AnalysisMode, Config};
use crate::diagnostics::{DiagnosticsSink, SkipReason};
use crate::motion::distance::compensate;
use crate::motion::{
    rotational_acceleration, shoulder_line_angle, AccelerationMetrics, AngleSample,
    DistanceMetrics, LimbSpeeds, MotionCalculator, SpeedMetrics, SpeedZone, VelocitySample,
    ZoneDurations,
};
use crate::pose::PoseFrame;

/// 角加速度に必要なサンプル数
const ANGLE_SAMPLES: usize = 3;

/// 1 フレーム分の出力
#[derive(Debug, Clone, Serialize)]
pub struct FrameMetrics {
    pub timestamp: f64,
    /// 重心（ピクセル）。有効なキーポイントが無ければ `None`
    pub center: Option<[f32; 2]>,
    pub speed: SpeedMetrics,
    /// セッション累積
    pub distance: DistanceMetrics,
    pub acceleration: AccelerationMetrics,
    pub zone: SpeedZone,
    /// 以下は Fast モードでは計算しない
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limb_speeds: Option<LimbSpeeds>,
    /// 肩ラインの角加速度 (deg/s²)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotational_acceleration: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joint_angles: Option<JointAngles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_angles: Option<BTreeMap<Joint, WeightedAngle>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hyperextension: Vec<Joint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symmetry: Option<SymmetryScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceMetrics>,
}

/// セッション全体の集計
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    /// 秒
    pub duration: f64,
    pub distance: DistanceMetrics,
    pub max_speed: f32,
    /// 有効な速度サンプル全体の平均
    pub average_speed: f32,
    pub peak_acceleration: f32,
    pub zone_time: ZoneDurations,
    pub pixels_per_meter: f32,
}

pub struct MotionAnalyzer {
    config: Config,
    calculator: MotionCalculator,
    frames: VecDeque<PoseFrame>,
    /// 重心が定義できた直近フレーム。速度はこれとの差で求める
    last_tracked: Option<PoseFrame>,
    velocities: VecDeque<VelocitySample>,
    torso_angles: VecDeque<AngleSample>,
    sway: SwayTracker,
    zone_time: ZoneDurations,
    distance: DistanceMetrics,
    origin: Option<Vector2<f32>>,
    last_point: Option<Vector2<f32>>,
    /// 一度でもカメラオフセットを受け取ったか
    camera_tracked: bool,
    speed_sum: f64,
    speed_samples: u64,
    frames_processed: u64,
    frames_skipped: u64,
    first_timestamp: Option<f64>,
    last_timestamp: Option<f64>,
    auto_calibrated: bool,
}

impl MotionAnalyzer {
    pub fn new(config: Config) -> Self {
        let calculator = MotionCalculator::new(&config);
        Self::with_calculator(config, calculator)
    }

    pub fn with_diagnostics(config: Config, diagnostics: Box<dyn DiagnosticsSink>) -> Self {
        let calculator = MotionCalculator::with_diagnostics(&config, diagnostics);
        Self::with_calculator(config, calculator)
    }

    fn with_calculator(config: Config, calculator: MotionCalculator) -> Self {
        Self {
            frames: VecDeque::with_capacity(config.history.frames),
            last_tracked: None,
            velocities: VecDeque::with_capacity(config.history.velocities),
            torso_angles: VecDeque::with_capacity(ANGLE_SAMPLES),
            sway: SwayTracker::from_config(&config.balance),
            zone_time: ZoneDurations::default(),
            distance: DistanceMetrics::default(),
            origin: None,
            last_point: None,
            camera_tracked: false,
            speed_sum: 0.0,
            speed_samples: 0,
            frames_processed: 0,
            frames_skipped: 0,
            first_timestamp: None,
            last_timestamp: None,
            auto_calibrated: false,
            calculator,
            config,
        }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.config.analysis.mode
    }

    pub fn calculator(&self) -> &MotionCalculator {
        &self.calculator
    }

    pub fn calculator_mut(&mut self) -> &mut MotionCalculator {
        &mut self.calculator
    }

    /// 直近フレーム（古い順）
    pub fn history(&self) -> impl Iterator<Item = &PoseFrame> {
        self.frames.iter()
    }

    /// フレームを 1 枚処理する。
    ///
    /// `camera_offset` はこのフレーム時点の累積カメラ位置（ピクセル）。
    pub fn process(&mut self, frame: PoseFrame, camera_offset: Option<Vector2<f32>>) -> FrameMetrics {
        self.frames_processed += 1;
        self.first_timestamp.get_or_insert(frame.timestamp);
        self.last_timestamp = Some(frame.timestamp);

        self.try_auto_calibrate(&frame);

        let mode = self.mode();
        let threshold = self.calculator.confidence_threshold();
        let center = self.calculator.center(&frame);

        // 速度。検出が抜けたフレームは飛ばし、直前に追跡できたフレームとの間で求める
        let (speed, delta_time) = match (center, self.last_tracked.as_ref()) {
            (Some(_), Some(prev)) => (
                self.calculator.calculate_speed(prev, &frame),
                prev.delta_time(&frame),
            ),
            (None, _) => {
                self.calculator
                    .record_skip(frame.timestamp, SkipReason::NoValidKeypoints);
                (self.idle_speed(), 0.0)
            }
            (Some(_), None) => (self.idle_speed(), 0.0),
        };
        let out_of_order = center.is_some() && self.last_tracked.is_some() && delta_time <= 0.0;
        if center.is_none() || out_of_order {
            self.frames_skipped += 1;
        }

        let fresh_speed = delta_time > 0.0 && speed.confidence > 0.0;
        let acceleration = if fresh_speed {
            self.speed_sum += speed.instantaneous as f64;
            self.speed_samples += 1;
            push_bounded(
                &mut self.velocities,
                VelocitySample::new(speed.instantaneous, frame.timestamp),
                self.config.history.velocities,
            );
            self.calculator
                .calculate_acceleration(self.velocities.make_contiguous())
        } else {
            AccelerationMetrics::zero(self.calculator.max_acceleration())
        };

        let zone = self.calculator.classify_zone(speed.instantaneous);
        if fresh_speed {
            self.zone_time.add(zone, delta_time);
        }

        // 距離。オフセットを受け取り始めた後にオフセットの無いフレームは
        // 実空間の位置が分からないので経路に入れない
        if camera_offset.is_some() {
            self.camera_tracked = true;
        }
        match (center, camera_offset) {
            (Some(c), Some(_)) if !out_of_order => {
                self.accumulate_distance(compensate(c, camera_offset))
            }
            (Some(c), None) if !out_of_order && !self.camera_tracked => {
                self.accumulate_distance(c)
            }
            (Some(_), None) if !out_of_order => {
                debug!(timestamp = frame.timestamp, "no camera offset; frame left out of the path");
            }
            _ => {}
        }

        let mut metrics = FrameMetrics {
            timestamp: frame.timestamp,
            center: center.map(|c| [c.x, c.y]),
            speed,
            distance: self.distance,
            acceleration,
            zone,
            limb_speeds: None,
            rotational_acceleration: None,
            joint_angles: None,
            weighted_angles: None,
            hyperextension: Vec::new(),
            symmetry: None,
            balance: None,
        };

        if mode != AnalysisMode::Fast {
            metrics.limb_speeds = self
                .last_tracked
                .as_ref()
                .filter(|_| center.is_some())
                .map(|prev| self.calculator.calculate_limb_speeds(prev, &frame));

            if let Some(angle) = shoulder_line_angle(&frame, threshold) {
                push_bounded(
                    &mut self.torso_angles,
                    AngleSample::new(angle, frame.timestamp),
                    ANGLE_SAMPLES,
                );
            }
            metrics.rotational_acceleration =
                Some(rotational_acceleration(self.torso_angles.make_contiguous()));

            let angles = joint_angles(&frame, threshold);
            metrics.hyperextension =
                hyperextension_warnings(&angles, self.config.angles.hyperextension_threshold);
            metrics.joint_angles = Some(angles);
            metrics.symmetry = Some(symmetry_score(&frame, threshold, &self.config.symmetry));

            let mut balance_metrics = balance(&frame, center, threshold, &self.config.balance);
            if mode == AnalysisMode::Precise {
                balance_metrics.sway = center.map(|c| self.sway.update(c.x));
                metrics.weighted_angles = Some(weighted_joint_angles(&frame, threshold));
            }
            metrics.balance = Some(balance_metrics);
        }

        if center.is_some() && !out_of_order {
            self.last_tracked = Some(frame.clone());
        }
        push_bounded(&mut self.frames, frame, self.config.history.frames);
        metrics
    }

    fn idle_speed(&self) -> SpeedMetrics {
        SpeedMetrics::zero(self.calculator.average_speed(), self.calculator.max_speed())
    }

    fn try_auto_calibrate(&mut self, frame: &PoseFrame) {
        if self.auto_calibrated {
            return;
        }
        let Some(height) = self.config.calibration.athlete_height else {
            return;
        };
        if self.calculator.calibrate_from_pose(frame, height) {
            self.auto_calibrated = true;
            info!(
                pixels_per_meter = self.calculator.pixels_per_meter(),
                athlete_height = height,
                "calibrated from first upright pose"
            );
        }
    }

    fn accumulate_distance(&mut self, point: Vector2<f32>) {
        let ppm = self.calculator.pixels_per_meter();
        if let Some(last) = self.last_point {
            self.distance.accumulate(point - last, ppm);
        }
        let origin = *self.origin.get_or_insert(point);
        self.distance.displacement = (point - origin).norm() / ppm;
        self.last_point = Some(point);
    }

    pub fn summary(&self) -> SessionSummary {
        let duration = match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => (last - first).max(0.0),
            _ => 0.0,
        };
        let average_speed = if self.speed_samples > 0 {
            (self.speed_sum / self.speed_samples as f64) as f32
        } else {
            0.0
        };

        SessionSummary {
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
            duration,
            distance: self.distance,
            max_speed: self.calculator.max_speed(),
            average_speed,
            peak_acceleration: self.calculator.max_acceleration(),
            zone_time: self.zone_time,
            pixels_per_meter: self.calculator.pixels_per_meter(),
        }
    }

    /// セッション状態をすべて消去する。キャリブレーションは保持
    pub fn reset(&mut self) {
        debug!(frames = self.frames_processed, "resetting analyzer");
        self.calculator.reset();
        self.frames.clear();
        self.last_tracked = None;
        self.velocities.clear();
        self.torso_angles.clear();
        self.sway.reset();
        self.zone_time = ZoneDurations::default();
        self.distance = DistanceMetrics::default();
        self.origin = None;
        self.last_point = None;
        self.camera_tracked = false;
        self.speed_sum = 0.0;
        self.speed_samples = 0;
        self.frames_processed = 0;
        self.frames_skipped = 0;
        self.first_timestamp = None;
        self.last_timestamp = None;
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, capacity: usize) {
    while queue.len() >= capacity.max(1) {
        queue.pop_front();
    }
    queue.push_back(value);
}
