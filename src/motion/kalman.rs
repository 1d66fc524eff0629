use nalgebra::Vector2;

use crate::config::FilterConfig;

const INITIAL_COVARIANCE: f32 = 1.0;

/// Scalar Kalman filter over a random-walk state.
#[derive(Debug, Clone)]
struct ScalarKalman {
    estimate: f32,
    error_covariance: f32,
    has_prior: bool,
}

impl ScalarKalman {
    fn new() -> Self {
        Self {
            estimate: 0.0,
            error_covariance: INITIAL_COVARIANCE,
            has_prior: false,
        }
    }

    /// Returns the updated estimate. The first measurement seeds the state
    /// and is returned unchanged.
    fn update(&mut self, measurement: f32, process_noise: f32, measurement_noise: f32) -> f32 {
        if !self.has_prior {
            self.estimate = measurement;
            self.has_prior = true;
            return measurement;
        }

        let prediction_error = self.error_covariance + process_noise;
        let gain = prediction_error / (prediction_error + measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.error_covariance = (1.0 - gain) * prediction_error;
        self.estimate
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Damped Kalman smoothing for frame-to-frame centroid displacement.
///
/// Output = `raw_weight * raw + (1 - raw_weight) * estimate`, which keeps
/// most of the responsiveness of the raw signal while shaving jitter.
#[derive(Debug, Clone)]
pub struct DisplacementFilter {
    x: ScalarKalman,
    y: ScalarKalman,
    process_noise: f32,
    measurement_noise: f32,
    raw_weight: f32,
}

impl DisplacementFilter {
    pub fn new(process_noise: f32, measurement_noise: f32, raw_weight: f32) -> Self {
        Self {
            x: ScalarKalman::new(),
            y: ScalarKalman::new(),
            process_noise,
            measurement_noise,
            raw_weight: raw_weight.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.process_noise,
            config.measurement_noise,
            config.raw_weight,
        )
    }

    /// 最初の観測で初期化済みか
    pub fn is_seeded(&self) -> bool {
        self.x.has_prior && self.y.has_prior
    }

    pub fn apply(&mut self, raw: Vector2<f32>) -> Vector2<f32> {
        if !self.is_seeded() {
            self.x.update(raw.x, self.process_noise, self.measurement_noise);
            self.y.update(raw.y, self.process_noise, self.measurement_noise);
            return raw;
        }

        let ex = self.x.update(raw.x, self.process_noise, self.measurement_noise);
        let ey = self.y.update(raw.y, self.process_noise, self.measurement_noise);
        let w = self.raw_weight;
        Vector2::new(w * raw.x + (1.0 - w) * ex, w * raw.y + (1.0 - w) * ey)
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}

impl Default for DisplacementFilter {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}
