use nalgebra::Vector2;

use crate::config::{AccelerationConfig, AnalysisMode, Config, SpeedConfig, ZoneConfig};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink, SkipReason, TracingSink};
use crate::pose::{KeypointIndex, PoseFrame};

use super::acceleration::{latest_acceleration, AccelerationMetrics, VelocitySample};
use super::center_of_mass::CenterMethod;
use super::distance::{compensate, distance_along, DistanceMetrics};
use super::history::RollingWindow;
use super::kalman::DisplacementFilter;
use super::speed::{frame_confidence, limb_speeds, LimbSpeeds, SpeedMetrics};
use super::zone::SpeedZone;

/// 鼻〜足首の距離が身長に占める割合。鼻は頭頂の約 6% 下、足首は床の約 4% 上
const NOSE_TO_ANKLE_FRACTION: f32 = 0.9;

const HEAD_KEYPOINTS: [KeypointIndex; 5] = [
    KeypointIndex::Nose,
    KeypointIndex::LeftEye,
    KeypointIndex::RightEye,
    KeypointIndex::LeftEar,
    KeypointIndex::RightEar,
];

/// Per-session kinematics state.
///
/// Owns the rolling speed/acceleration windows, the running maxima, the
/// displacement filter and the pixel-to-meter calibration. One instance per
/// athlete session; it is `Send` but must not be shared between sessions.
pub struct MotionCalculator {
    confidence_threshold: f32,
    center_method: CenterMethod,
    pixels_per_meter: f32,
    speed_config: SpeedConfig,
    acceleration_config: AccelerationConfig,
    zones: ZoneConfig,
    filter: DisplacementFilter,
    speed_history: RollingWindow,
    max_speed: f32,
    last_speed: f32,
    acceleration_history: RollingWindow,
    max_acceleration: f32,
    diagnostics: Box<dyn DiagnosticsSink>,
}

impl MotionCalculator {
    pub fn new(config: &Config) -> Self {
        Self::with_diagnostics(config, Box::new(TracingSink))
    }

    pub fn with_diagnostics(config: &Config, diagnostics: Box<dyn DiagnosticsSink>) -> Self {
        let center_method = match config.analysis.mode {
            AnalysisMode::Precise => CenterMethod::SegmentWeighted,
            AnalysisMode::Fast | AnalysisMode::Balanced => CenterMethod::Arithmetic,
        };
        Self {
            confidence_threshold: config.analysis.confidence_threshold,
            center_method,
            pixels_per_meter: config.calibration.pixels_per_meter,
            speed_config: config.speed.clone(),
            acceleration_config: config.acceleration.clone(),
            zones: config.zones.clone(),
            filter: DisplacementFilter::from_config(&config.filter),
            speed_history: RollingWindow::new(config.speed.window),
            max_speed: 0.0,
            last_speed: 0.0,
            acceleration_history: RollingWindow::new(config.acceleration.window),
            max_acceleration: 0.0,
            diagnostics,
        }
    }

    pub fn pixels_per_meter(&self) -> f32 {
        self.pixels_per_meter
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn center_method(&self) -> CenterMethod {
        self.center_method
    }

    pub fn set_center_method(&mut self, method: CenterMethod) {
        self.center_method = method;
    }

    /// 正の有限値でなければ無視して false
    pub fn set_pixels_per_meter(&mut self, pixels_per_meter: f32) -> bool {
        if !pixels_per_meter.is_finite() || pixels_per_meter <= 0.0 {
            return false;
        }
        self.pixels_per_meter = pixels_per_meter;
        self.diagnostics
            .record(DiagnosticEvent::Calibrated { pixels_per_meter });
        true
    }

    /// 画像上の身長（ピクセル）と実身長（メートル）からキャリブレーション
    pub fn calibrate_from_height(&mut self, pixel_height: f32, real_height_meters: f32) -> bool {
        if !real_height_meters.is_finite() || real_height_meters <= 0.0 {
            return false;
        }
        self.set_pixels_per_meter(pixel_height / real_height_meters)
    }

    /// 直立ポーズの頭部キーポイント〜足首の高さからキャリブレーション
    pub fn calibrate_from_pose(&mut self, frame: &PoseFrame, real_height_meters: f32) -> bool {
        let threshold = self.confidence_threshold;
        let top = HEAD_KEYPOINTS
            .iter()
            .filter_map(|&idx| frame.valid_keypoint(idx, threshold))
            .map(|k| k.y)
            .reduce(f32::min);
        let bottom = [KeypointIndex::LeftAnkle, KeypointIndex::RightAnkle]
            .iter()
            .filter_map(|&idx| frame.valid_keypoint(idx, threshold))
            .map(|k| k.y)
            .reduce(f32::max);

        match (top, bottom) {
            (Some(top), Some(bottom)) if bottom > top => {
                self.calibrate_from_height((bottom - top) / NOSE_TO_ANKLE_FRACTION, real_height_meters)
            }
            _ => false,
        }
    }

    pub fn center(&self, frame: &PoseFrame) -> Option<Vector2<f32>> {
        self.center_method.locate(frame, self.confidence_threshold)
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn average_speed(&self) -> f32 {
        self.speed_history.mean()
    }

    pub fn max_acceleration(&self) -> f32 {
        self.max_acceleration
    }

    /// 計算を飛ばしたフレームを診断に残す
    pub fn record_skip(&mut self, timestamp: f64, reason: SkipReason) {
        self.diagnostics
            .record(DiagnosticEvent::FrameSkipped { timestamp, reason });
    }

    /// 2 フレーム間の重心速度
    pub fn calculate_speed(&mut self, prev: &PoseFrame, curr: &PoseFrame) -> SpeedMetrics {
        let dt = prev.delta_time(curr);
        if dt <= 0.0 {
            self.record_skip(curr.timestamp, SkipReason::NonPositiveDeltaTime);
            return SpeedMetrics::zero(self.average_speed(), self.max_speed);
        }
        let (Some(c0), Some(c1)) = (self.center(prev), self.center(curr)) else {
            self.record_skip(curr.timestamp, SkipReason::NoValidKeypoints);
            return SpeedMetrics::zero(self.average_speed(), self.max_speed);
        };

        let raw = c1 - c0;
        let raw_speed = raw.norm() / self.pixels_per_meter / dt;
        if raw_speed > self.speed_config.max_plausible_speed {
            // フィルタ状態を汚さないよう平滑化前に弾く
            self.diagnostics.record(DiagnosticEvent::OutlierRejected {
                timestamp: curr.timestamp,
                speed: raw_speed,
            });
            return SpeedMetrics {
                instantaneous: self.last_speed,
                average: self.average_speed(),
                max: self.max_speed,
                confidence: 0.0,
                velocity: [0.0, 0.0],
            };
        }

        let seeded = self.filter.is_seeded();
        let filtered = self.filter.apply(raw);
        if !seeded {
            self.diagnostics.record(DiagnosticEvent::FilterSeeded {
                dx: raw.x,
                dy: raw.y,
            });
        }

        let velocity = filtered / self.pixels_per_meter / dt;
        let speed = velocity.norm();

        let confidence = frame_confidence(dt, self.speed_config.expected_frame_interval);
        if confidence < 0.5 {
            self.diagnostics.record(DiagnosticEvent::FrameDrop {
                timestamp: curr.timestamp,
                delta_time: dt,
            });
        }

        self.speed_history.push(speed);
        self.max_speed = self.max_speed.max(speed);
        self.last_speed = speed;

        SpeedMetrics {
            instantaneous: speed,
            average: self.speed_history.mean(),
            max: self.max_speed,
            confidence,
            velocity: [velocity.x, velocity.y],
        }
    }

    /// 手首・足首の速度（平滑化なし）
    pub fn calculate_limb_speeds(&self, prev: &PoseFrame, curr: &PoseFrame) -> LimbSpeeds {
        limb_speeds(prev, curr, self.pixels_per_meter, self.confidence_threshold)
    }

    /// フレーム列の距離。`camera_offsets` はフレームごとの累積カメラ位置（ピクセル）。
    ///
    /// オフセットが与えられているとき、対応するオフセットの無いフレームは
    /// 実空間の位置が分からないので経路から外す。
    pub fn calculate_distance(
        &self,
        frames: &[PoseFrame],
        camera_offsets: Option<&[Vector2<f32>]>,
    ) -> DistanceMetrics {
        let points = frames.iter().enumerate().filter_map(|(i, frame)| {
            let center = self.center(frame)?;
            match camera_offsets {
                Some(offsets) => Some(compensate(center, Some(*offsets.get(i)?))),
                None => Some(center),
            }
        });
        distance_along(points, self.pixels_per_meter)
    }

    /// 外部から渡された速度履歴の直近 2 件から加速度
    pub fn calculate_acceleration(&mut self, velocities: &[VelocitySample]) -> AccelerationMetrics {
        let Some(current) = latest_acceleration(velocities) else {
            let (timestamp, reason) = match velocities.last() {
                Some(last) if velocities.len() >= 2 => {
                    (last.timestamp, SkipReason::NonPositiveDeltaTime)
                }
                Some(last) => (last.timestamp, SkipReason::InsufficientHistory),
                None => (0.0, SkipReason::InsufficientHistory),
            };
            self.record_skip(timestamp, reason);
            return AccelerationMetrics::zero(self.max_acceleration);
        };

        let magnitude = current.abs();
        self.acceleration_history.push(magnitude);
        self.max_acceleration = self.max_acceleration.max(magnitude);

        AccelerationMetrics {
            current,
            average: self.acceleration_history.mean(),
            max: self.max_acceleration,
            is_decelerating: current < 0.0,
            is_explosive: magnitude > self.acceleration_config.explosive_threshold,
        }
    }

    pub fn classify_zone(&self, speed: f32) -> SpeedZone {
        SpeedZone::classify(speed, &self.zones)
    }

    /// 履歴・最大値・フィルタ状態を消去する。キャリブレーションは保持
    pub fn reset(&mut self) {
        self.filter.reset();
        self.speed_history.clear();
        self.acceleration_history.clear();
        self.max_speed = 0.0;
        self.last_speed = 0.0;
        self.max_acceleration = 0.0;
        self.diagnostics.record(DiagnosticEvent::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::pose::Keypoint;
    use std::sync::{Arc, Mutex};

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    /// 両ヒップを (x, y) に置いたフレーム
    fn hips_at(x: f32, y: f32, timestamp: f64) -> PoseFrame {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[KeypointIndex::LeftHip as usize] = Keypoint::new(x, y, 0.9);
        keypoints[KeypointIndex::RightHip as usize] = Keypoint::new(x, y, 0.9);
        PoseFrame::new(keypoints, 0.9, timestamp)
    }

    fn calculator(pixels_per_meter: f32) -> MotionCalculator {
        let mut config = Config::default();
        config.calibration.pixels_per_meter = pixels_per_meter;
        MotionCalculator::new(&config)
    }

    fn recorded() -> (MotionCalculator, Arc<Mutex<MemorySink>>) {
        let sink = Arc::new(Mutex::new(MemorySink::new(64)));
        let mut config = Config::default();
        config.calibration.pixels_per_meter = 500.0;
        let calc = MotionCalculator::with_diagnostics(&config, Box::new(sink.clone()));
        (calc, sink)
    }

    #[test]
    fn test_first_sample_speed_is_exact() {
        // 50px / 0.1s / 500px/m = 1.0 m/s
        let mut calc = calculator(500.0);
        let m = calc.calculate_speed(&hips_at(0.0, 0.0, 0.0), &hips_at(30.0, 40.0, 0.1));
        assert!(approx_eq(m.instantaneous, 1.0, 1e-5), "{}", m.instantaneous);
        assert!(approx_eq(m.max, 1.0, 1e-5));
        assert!(approx_eq(m.average, 1.0, 1e-5));
        assert!(approx_eq(m.velocity[0], 0.6, 1e-5));
        assert!(approx_eq(m.velocity[1], 0.8, 1e-5));
    }

    #[test]
    fn test_speed_scales_with_calibration() {
        for &(d, c, dt) in &[(100.0_f32, 100.0_f32, 0.5_f64), (10.0, 50.0, 0.04), (240.0, 400.0, 0.2)] {
            let mut calc = calculator(c);
            let m = calc.calculate_speed(&hips_at(0.0, 0.0, 1.0), &hips_at(d, 0.0, 1.0 + dt));
            let expected = d / (c * dt as f32);
            assert!(approx_eq(m.instantaneous, expected, 1e-3), "{} vs {}", m.instantaneous, expected);
        }
    }

    #[test]
    fn test_second_sample_is_smoothed() {
        let mut calc = calculator(100.0);
        calc.calculate_speed(&hips_at(0.0, 0.0, 0.0), &hips_at(0.0, 0.0, 0.1));
        let m = calc.calculate_speed(&hips_at(0.0, 0.0, 0.1), &hips_at(10.0, 0.0, 0.2));
        // 生の値 1.0 m/s より小さい
        assert!(m.instantaneous < 1.0);
        assert!(m.instantaneous > 0.7);
    }

    #[test]
    fn test_non_positive_dt_short_circuits() {
        let mut calc = calculator(100.0);
        let m = calc.calculate_speed(&hips_at(0.0, 0.0, 1.0), &hips_at(50.0, 0.0, 1.0));
        assert_eq!(m.instantaneous, 0.0);
        assert_eq!(m.confidence, 0.0);
        let m = calc.calculate_speed(&hips_at(0.0, 0.0, 1.0), &hips_at(50.0, 0.0, 0.9));
        assert_eq!(m.instantaneous, 0.0);
        assert_eq!(calc.max_speed(), 0.0);
    }

    #[test]
    fn test_undefined_center_short_circuits() {
        let mut calc = calculator(100.0);
        let empty = PoseFrame { timestamp: 0.0, ..PoseFrame::default() };
        let m = calc.calculate_speed(&empty, &hips_at(50.0, 0.0, 0.1));
        assert_eq!(m.instantaneous, 0.0);
    }

    #[test]
    fn test_frame_drop_lowers_confidence() {
        let mut calc = calculator(100.0);
        let m = calc.calculate_speed(&hips_at(0.0, 0.0, 0.0), &hips_at(10.0, 0.0, 1.0 / 30.0));
        assert!(approx_eq(m.confidence, 1.0, 1e-4));
        let m = calc.calculate_speed(&hips_at(10.0, 0.0, 1.0 / 30.0), &hips_at(20.0, 0.0, 4.0 / 30.0));
        assert!(approx_eq(m.confidence, 1.0 / 3.0, 1e-3));
        assert!(m.instantaneous > 0.0);
    }

    #[test]
    fn test_max_is_monotonic() {
        let mut calc = calculator(100.0);
        calc.calculate_speed(&hips_at(0.0, 0.0, 0.0), &hips_at(300.0, 0.0, 1.0));
        let peak = calc.max_speed();
        calc.calculate_speed(&hips_at(300.0, 0.0, 1.0), &hips_at(301.0, 0.0, 2.0));
        assert_eq!(calc.max_speed(), peak);
    }

    #[test]
    fn test_reset_clears_max() {
        let mut calc = calculator(100.0);
        // 500px / 100px/m / 1s = 5 m/s
        let m = calc.calculate_speed(&hips_at(0.0, 0.0, 0.0), &hips_at(500.0, 0.0, 1.0));
        assert!(approx_eq(m.max, 5.0, 1e-4));

        calc.reset();
        let m = calc.calculate_speed(&hips_at(0.0, 0.0, 10.0), &hips_at(100.0, 0.0, 11.0));
        assert!(approx_eq(m.instantaneous, 1.0, 1e-5));
        assert!(approx_eq(m.max, 1.0, 1e-5));
        assert!(approx_eq(m.average, 1.0, 1e-5));
    }

    #[test]
    fn test_outlier_rejected_and_recorded() {
        let (mut calc, sink) = recorded();
        calc.calculate_speed(&hips_at(0.0, 0.0, 0.0), &hips_at(50.0, 0.0, 0.1));
        // 5000px / 500px/m / 0.1s = 100 m/s
        let m = calc.calculate_speed(&hips_at(50.0, 0.0, 0.1), &hips_at(5050.0, 0.0, 0.2));
        assert_eq!(m.confidence, 0.0);
        assert!(approx_eq(m.instantaneous, 1.0, 1e-5));
        assert!(approx_eq(calc.max_speed(), 1.0, 1e-5));

        let sink = sink.lock().unwrap();
        assert!(sink
            .events()
            .any(|e| matches!(e, DiagnosticEvent::OutlierRejected { .. })));
    }

    #[test]
    fn test_calibrate_from_height() {
        let mut calc = calculator(100.0);
        assert!(calc.calibrate_from_height(900.0, 1.8));
        assert!(approx_eq(calc.pixels_per_meter(), 500.0, 1e-4));

        assert!(!calc.calibrate_from_height(900.0, 0.0));
        assert!(!calc.calibrate_from_height(-5.0, 1.8));
        assert!(!calc.calibrate_from_height(f32::NAN, 1.8));
        assert!(approx_eq(calc.pixels_per_meter(), 500.0, 1e-4));
    }

    #[test]
    fn test_calibrate_from_pose() {
        let mut calc = calculator(100.0);
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[KeypointIndex::Nose as usize] = Keypoint::new(0.0, 100.0, 0.9);
        keypoints[KeypointIndex::LeftAnkle as usize] = Keypoint::new(0.0, 910.0, 0.9);
        keypoints[KeypointIndex::RightAnkle as usize] = Keypoint::new(0.0, 1000.0, 0.9);
        let frame = PoseFrame::new(keypoints, 0.9, 0.0);

        assert!(calc.calibrate_from_pose(&frame, 2.0));
        // 900px / 0.9 = 1000px tall, 2m
        assert!(approx_eq(calc.pixels_per_meter(), 500.0, 1e-3));

        assert!(!calc.calibrate_from_pose(&hips_at(0.0, 0.0, 0.0), 2.0));
    }

    #[test]
    fn test_distance_over_frames() {
        let calc = calculator(100.0);
        let frames = [
            hips_at(0.0, 0.0, 0.0),
            hips_at(300.0, 400.0, 0.1),
            PoseFrame { timestamp: 0.2, ..PoseFrame::default() },
            hips_at(300.0, 0.0, 0.3),
        ];
        let d = calc.calculate_distance(&frames, None);
        // 500 + 400 px, 欠損フレームは飛ばす
        assert!(approx_eq(d.total, 9.0, 1e-4));
        assert!(approx_eq(d.displacement, 3.0, 1e-4));
        assert!(approx_eq(d.horizontal, 3.0, 1e-4));
        assert!(approx_eq(d.vertical, 8.0, 1e-4));
    }

    #[test]
    fn test_distance_with_camera_offsets() {
        let calc = calculator(100.0);
        let frames = [hips_at(0.0, 0.0, 0.0), hips_at(100.0, 0.0, 0.1)];
        let offsets = [Vector2::new(0.0, 0.0), Vector2::new(100.0, 0.0)];
        let d = calc.calculate_distance(&frames, Some(&offsets[..]));
        assert!(approx_eq(d.total, 0.0, 1e-6));
    }

    #[test]
    fn test_distance_frames_past_offsets_are_left_out() {
        // 静止した選手をカメラが 100px/フレームでパン。3 枚目以降はオフセットなし
        let calc = calculator(100.0);
        let frames = [
            hips_at(100.0, 0.0, 0.0),
            hips_at(200.0, 0.0, 0.1),
            hips_at(300.0, 0.0, 0.2),
            hips_at(400.0, 0.0, 0.3),
        ];
        let offsets = [Vector2::new(100.0, 0.0), Vector2::new(200.0, 0.0)];
        let d = calc.calculate_distance(&frames, Some(&offsets[..]));
        assert!(d.total.abs() < 1e-6, "{}", d.total);
        assert!(d.displacement.abs() < 1e-6);
    }

    #[test]
    fn test_acceleration_requires_two_samples() {
        let mut calc = calculator(100.0);
        let m = calc.calculate_acceleration(&[VelocitySample::new(3.0, 0.0)]);
        assert_eq!(m, AccelerationMetrics::zero(0.0));
    }

    #[test]
    fn test_deceleration() {
        let mut calc = calculator(100.0);
        let samples = [
            VelocitySample::new(6.0, 0.0),
            VelocitySample::new(5.0, 0.1),
            VelocitySample::new(3.5, 0.2),
        ];
        let m = calc.calculate_acceleration(&samples[..2]);
        assert!(m.current < 0.0 && m.is_decelerating);
        let m = calc.calculate_acceleration(&samples);
        assert!(approx_eq(m.current, -15.0, 1e-3));
        assert!(m.is_decelerating);
        assert!(approx_eq(m.max, 15.0, 1e-3));
        assert!(!m.is_explosive);
    }

    #[test]
    fn test_explosive_and_peak_retained() {
        let mut calc = calculator(100.0);
        let m = calc.calculate_acceleration(&[
            VelocitySample::new(0.0, 0.0),
            VelocitySample::new(2.0, 0.1),
        ]);
        assert!(m.is_explosive);
        assert!(approx_eq(m.max, 20.0, 1e-3));

        // サンプル不足でも max はセッションのピーク
        let m = calc.calculate_acceleration(&[VelocitySample::new(2.0, 0.1)]);
        assert_eq!(m.current, 0.0);
        assert!(approx_eq(m.max, 20.0, 1e-3));

        calc.reset();
        assert_eq!(calc.max_acceleration(), 0.0);
    }

    #[test]
    fn test_precise_mode_uses_segment_weighting() {
        let mut config = Config::default();
        config.analysis.mode = AnalysisMode::Precise;
        let calc = MotionCalculator::new(&config);
        assert_eq!(calc.center_method(), CenterMethod::SegmentWeighted);
        assert_eq!(calculator(100.0).center_method(), CenterMethod::Arithmetic);
    }

    #[test]
    fn test_zone_from_config() {
        let calc = calculator(100.0);
        assert_eq!(calc.classify_zone(1.0), SpeedZone::Walking);
        assert_eq!(calc.classify_zone(0.2), SpeedZone::Stationary);
    }
}
