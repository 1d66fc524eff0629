use serde::Serialize;

/// 速度の大きさとその時刻
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocitySample {
    /// m/s
    pub speed: f32,
    /// 秒
    pub timestamp: f64,
}

impl VelocitySample {
    pub fn new(speed: f32, timestamp: f64) -> Self {
        Self { speed, timestamp }
    }
}

/// 加速度メトリクス (m/s²)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AccelerationMetrics {
    /// 符号付き。負なら減速
    pub current: f32,
    /// 直近ウィンドウの |a| 平均
    pub average: f32,
    /// セッションのピーク |a|
    pub max: f32,
    pub is_decelerating: bool,
    pub is_explosive: bool,
}

impl AccelerationMetrics {
    pub fn zero(max: f32) -> Self {
        Self {
            max,
            ..Self::default()
        }
    }
}

/// 直近 2 サンプルから加速度。dt が正でなければ `None`
pub fn latest_acceleration(samples: &[VelocitySample]) -> Option<f32> {
    let [.., prev, curr] = samples else {
        return None;
    };
    let dt = (curr.timestamp - prev.timestamp) as f32;
    if dt <= 0.0 {
        return None;
    }
    Some((curr.speed - prev.speed) / dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_two_samples() {
        assert!(latest_acceleration(&[]).is_none());
        assert!(latest_acceleration(&[VelocitySample::new(1.0, 0.0)]).is_none());
    }

    #[test]
    fn test_uses_last_two() {
        let samples = [
            VelocitySample::new(9.0, 0.0),
            VelocitySample::new(1.0, 1.0),
            VelocitySample::new(2.0, 1.5),
        ];
        let a = latest_acceleration(&samples).unwrap();
        assert!((a - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_positive_dt() {
        let samples = [VelocitySample::new(1.0, 2.0), VelocitySample::new(3.0, 2.0)];
        assert!(latest_acceleration(&samples).is_none());
        let samples = [VelocitySample::new(1.0, 2.0), VelocitySample::new(3.0, 1.0)];
        assert!(latest_acceleration(&samples).is_none());
    }

    #[test]
    fn test_zero_keeps_max() {
        let m = AccelerationMetrics::zero(4.5);
        assert_eq!(m.max, 4.5);
        assert_eq!(m.current, 0.0);
        assert!(!m.is_decelerating && !m.is_explosive);
    }
}
