use serde::Serialize;

use crate::config::ZoneConfig;

/// スピードゾーン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedZone {
    Stationary,
    Walking,
    Jogging,
    Running,
    Sprinting,
}

impl SpeedZone {
    pub const ALL: [SpeedZone; 5] = [
        Self::Stationary,
        Self::Walking,
        Self::Jogging,
        Self::Running,
        Self::Sprinting,
    ];

    /// 境界値は上のゾーンに入る（`< threshold` 判定）
    pub fn classify(speed: f32, zones: &ZoneConfig) -> Self {
        if speed < zones.walking {
            Self::Stationary
        } else if speed < zones.jogging {
            Self::Walking
        } else if speed < zones.running {
            Self::Jogging
        } else if speed < zones.sprinting {
            Self::Running
        } else {
            Self::Sprinting
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Stationary => "stationary",
            Self::Walking => "walking",
            Self::Jogging => "jogging",
            Self::Running => "running",
            Self::Sprinting => "sprinting",
        }
    }
}

/// ゾーンごとの滞在時間（秒）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ZoneDurations {
    pub stationary: f32,
    pub walking: f32,
    pub jogging: f32,
    pub running: f32,
    pub sprinting: f32,
}

impl ZoneDurations {
    pub fn add(&mut self, zone: SpeedZone, seconds: f32) {
        if seconds <= 0.0 {
            return;
        }
        *self.slot(zone) += seconds;
    }

    pub fn get(&self, zone: SpeedZone) -> f32 {
        match zone {
            SpeedZone::Stationary => self.stationary,
            SpeedZone::Walking => self.walking,
            SpeedZone::Jogging => self.jogging,
            SpeedZone::Running => self.running,
            SpeedZone::Sprinting => self.sprinting,
        }
    }

    pub fn total(&self) -> f32 {
        SpeedZone::ALL.iter().map(|z| self.get(*z)).sum()
    }

    fn slot(&mut self, zone: SpeedZone) -> &mut f32 {
        match zone {
            SpeedZone::Stationary => &mut self.stationary,
            SpeedZone::Walking => &mut self.walking,
            SpeedZone::Jogging => &mut self.jogging,
            SpeedZone::Running => &mut self.running,
            SpeedZone::Sprinting => &mut self.sprinting,
        }
    }
}
