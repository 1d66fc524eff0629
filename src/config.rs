use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub speed: SpeedConfig,
    #[serde(default)]
    pub acceleration: AccelerationConfig,
    #[serde(default)]
    pub zones: ZoneConfig,
    #[serde(default)]
    pub angles: AngleConfig,
    #[serde(default)]
    pub symmetry: SymmetryConfig,
    #[serde(default)]
    pub balance: BalanceConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// 品質/性能モード
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// 速度・距離・加速度・ゾーンのみ
    Fast,
    #[default]
    Balanced,
    /// 体節重み付き重心、重み付き角度、スウェイ
    Precise,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub mode: AnalysisMode,
    /// この値未満のキーポイントは幾何計算から除外
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_confidence_threshold() -> f32 { 0.3 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    #[serde(default = "default_pixels_per_meter")]
    pub pixels_per_meter: f32,
    /// 指定時はポーズから身長キャリブレーションを行う（メートル）
    #[serde(default)]
    pub athlete_height: Option<f32>,
}

fn default_pixels_per_meter() -> f32 { 100.0 }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pixels_per_meter: default_pixels_per_meter(),
            athlete_height: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_process_noise")]
    pub process_noise: f32,
    #[serde(default = "default_measurement_noise")]
    pub measurement_noise: f32,
    /// 出力に占める生の変位の割合
    #[serde(default = "default_raw_weight")]
    pub raw_weight: f32,
}

fn default_process_noise() -> f32 { 0.01 }
fn default_measurement_noise() -> f32 { 5.0 }
fn default_raw_weight() -> f32 { 0.7 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            process_noise: default_process_noise(),
            measurement_noise: default_measurement_noise(),
            raw_weight: default_raw_weight(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeedConfig {
    #[serde(default = "default_window")]
    pub window: usize,
    /// 期待フレーム間隔（秒）。これより長い dt は信頼度を下げる
    #[serde(default = "default_expected_frame_interval")]
    pub expected_frame_interval: f32,
    /// これを超える瞬間速度は検出の外れ値として捨てる (m/s)
    #[serde(default = "default_max_plausible_speed")]
    pub max_plausible_speed: f32,
}

fn default_window() -> usize { 30 }
fn default_expected_frame_interval() -> f32 { 1.0 / 30.0 }
fn default_max_plausible_speed() -> f32 { 15.0 }

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            expected_frame_interval: default_expected_frame_interval(),
            max_plausible_speed: default_max_plausible_speed(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccelerationConfig {
    #[serde(default = "default_window")]
    pub window: usize,
    /// m/s²
    #[serde(default = "default_explosive_threshold")]
    pub explosive_threshold: f32,
}

fn default_explosive_threshold() -> f32 { 15.0 }

impl Default for AccelerationConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            explosive_threshold: default_explosive_threshold(),
        }
    }
}

/// スピードゾーン境界 (m/s)。各境界は上のゾーンに含まれる
#[derive(Debug, Deserialize, Clone)]
pub struct ZoneConfig {
    #[serde(default = "default_walking")]
    pub walking: f32,
    #[serde(default = "default_jogging")]
    pub jogging: f32,
    #[serde(default = "default_running")]
    pub running: f32,
    #[serde(default = "default_sprinting")]
    pub sprinting: f32,
}

fn default_walking() -> f32 { 1.0 }
fn default_jogging() -> f32 { 2.0 }
fn default_running() -> f32 { 3.5 }
fn default_sprinting() -> f32 { 5.5 }

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            walking: default_walking(),
            jogging: default_jogging(),
            running: default_running(),
            sprinting: default_sprinting(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AngleConfig {
    /// 肘・膝の生角度がこれを超えたら過伸展警告（度）
    #[serde(default = "default_hyperextension")]
    pub hyperextension_threshold: f32,
}

fn default_hyperextension() -> f32 { 175.0 }

impl Default for AngleConfig {
    fn default() -> Self {
        Self {
            hyperextension_threshold: default_hyperextension(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SymmetryConfig {
    /// 左右Y差の正規化幅（ピクセル）
    #[serde(default = "default_max_expected_difference")]
    pub max_expected_difference: f32,
}

fn default_max_expected_difference() -> f32 { 50.0 }

impl Default for SymmetryConfig {
    fn default() -> Self {
        Self {
            max_expected_difference: default_max_expected_difference(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BalanceConfig {
    /// 支持基底の左右マージン（ピクセル）
    #[serde(default = "default_margin")]
    pub margin: f32,
    /// 足幅がこの値で安定度 1.0（ピクセル）
    #[serde(default = "default_full_stability_span")]
    pub full_stability_span: f32,
    #[serde(default = "default_window")]
    pub sway_window: usize,
}

fn default_margin() -> f32 { 20.0 }
fn default_full_stability_span() -> f32 { 100.0 }

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            margin: default_margin(),
            full_stability_span: default_full_stability_span(),
            sway_window: default_window(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// 保持するフレーム数
    #[serde(default = "default_frames")]
    pub frames: usize,
    /// 保持する速度サンプル数
    #[serde(default = "default_frames")]
    pub velocities: usize,
}

fn default_frames() -> usize { 10 }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            frames: default_frames(),
            velocities: default_frames(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 読み込めなければデフォルト
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.analysis.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!("analysis.confidence_threshold must be in [0, 1], got {}", threshold);
        }
        if !(self.calibration.pixels_per_meter > 0.0) {
            bail!("calibration.pixels_per_meter must be positive");
        }
        if let Some(h) = self.calibration.athlete_height {
            if !(h > 0.0) {
                bail!("calibration.athlete_height must be positive");
            }
        }
        if !(0.0..=1.0).contains(&self.filter.raw_weight) {
            bail!("filter.raw_weight must be in [0, 1]");
        }
        if !(self.filter.measurement_noise > 0.0) || self.filter.process_noise < 0.0 {
            bail!("filter noise must be non-negative (measurement noise positive)");
        }
        if self.speed.window == 0 || self.acceleration.window == 0 {
            bail!("history windows must hold at least one sample");
        }
        if !(self.speed.expected_frame_interval > 0.0) {
            bail!("speed.expected_frame_interval must be positive");
        }
        let z = &self.zones;
        if !(z.walking < z.jogging && z.jogging < z.running && z.running < z.sprinting) {
            bail!(
                "zone thresholds must increase: {} < {} < {} < {}",
                z.walking, z.jogging, z.running, z.sprinting
            );
        }
        if !(self.symmetry.max_expected_difference > 0.0) {
            bail!("symmetry.max_expected_difference must be positive");
        }
        if !(self.balance.full_stability_span > 0.0) {
            bail!("balance.full_stability_span must be positive");
        }
        if self.history.frames < 2 {
            bail!("history.frames must be at least 2");
        }
        // 加速度は速度 2 点以上から
        if self.history.velocities < 2 {
            bail!("history.velocities must be at least 2");
        }
        if !(self.speed.max_plausible_speed > 0.0) {
            bail!(
                "speed.max_plausible_speed must be positive, got {}",
                self.speed.max_plausible_speed
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.analysis.mode, AnalysisMode::Balanced);
        assert_eq!(config.analysis.confidence_threshold, 0.3);
        assert_eq!(config.filter.process_noise, 0.01);
        assert_eq!(config.filter.measurement_noise, 5.0);
        assert_eq!(config.filter.raw_weight, 0.7);
        assert_eq!(config.speed.window, 30);
        assert_eq!(config.acceleration.explosive_threshold, 15.0);
        assert_eq!(config.zones.running, 3.5);
        assert_eq!(config.symmetry.max_expected_difference, 50.0);
        assert_eq!(config.balance.margin, 20.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.calibration.pixels_per_meter, 100.0);
        assert_eq!(config.history.frames, 10);
    }

    #[test]
    fn test_partial_override() {
        let config: Config = toml::from_str(
            r#"
            [analysis]
            mode = "precise"

            [zones]
            sprinting = 7.0

            [calibration]
            pixels_per_meter = 500.0
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.mode, AnalysisMode::Precise);
        assert_eq!(config.analysis.confidence_threshold, 0.3);
        assert_eq!(config.zones.sprinting, 7.0);
        assert_eq!(config.zones.walking, 1.0);
        assert_eq!(config.calibration.pixels_per_meter, 500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unordered_zones() {
        let mut config = Config::default();
        config.zones.jogging = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.analysis.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
        config.analysis.confidence_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_velocity_history() {
        let mut config = Config::default();
        config.history.velocities = 1;
        assert!(config.validate().is_err());
        config.history.velocities = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_plausible_speed() {
        let config: Config = toml::from_str("[speed]\nmax_plausible_speed = 0.0\n").unwrap();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.speed.max_plausible_speed = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.analysis.mode, AnalysisMode::Balanced);
        assert_eq!(config.zones.sprinting, 5.5);
        assert_eq!(config.balance.sway_window, 30);
        assert!(config.calibration.athlete_height.is_none());
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = Config::load_or_default("/nonexistent/kinemetrics.toml");
        assert_eq!(config.calibration.pixels_per_meter, 100.0);
    }
}
