use nalgebra::Vector2;
use serde::Serialize;

use crate::units::DistanceUnit;

/// 距離メトリクス (メートル)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DistanceMetrics {
    /// 経路長（区間距離の合計）
    pub total: f32,
    /// 水平成分の絶対値の合計
    pub horizontal: f32,
    /// 垂直成分の絶対値の合計
    pub vertical: f32,
    /// 始点から終点への直線距離
    pub displacement: f32,
}

impl DistanceMetrics {
    pub fn total_in(&self, unit: DistanceUnit) -> f32 {
        unit.from_meters(self.total)
    }

    pub fn displacement_in(&self, unit: DistanceUnit) -> f32 {
        unit.from_meters(self.displacement)
    }

    /// 直線距離 / 経路長。動いていなければ 1
    pub fn path_efficiency(&self) -> f32 {
        if self.total <= f32::EPSILON {
            return 1.0;
        }
        (self.displacement / self.total).min(1.0)
    }

    /// 1 区間ぶんを加算する（displacement は呼び出し側が管理）
    pub fn accumulate(&mut self, segment: Vector2<f32>, pixels_per_meter: f32) {
        if pixels_per_meter <= 0.0 {
            return;
        }
        self.total += segment.norm() / pixels_per_meter;
        self.horizontal += segment.x.abs() / pixels_per_meter;
        self.vertical += segment.y.abs() / pixels_per_meter;
    }
}

/// カメラオフセット補正済みの位置。
///
/// 連続フレーム間のカメラ移動を区間から差し引くのは、各重心から累積カメラ位置を
/// 引いてから差分を取るのと同じ。
pub fn compensate(centroid: Vector2<f32>, camera_offset: Option<Vector2<f32>>) -> Vector2<f32> {
    match camera_offset {
        Some(offset) => centroid - offset,
        None => centroid,
    }
}

/// 順序付きの重心列から距離を計算する（ピクセル座標）
pub fn distance_along<I>(points: I, pixels_per_meter: f32) -> DistanceMetrics
where
    I: IntoIterator<Item = Vector2<f32>>,
{
    let mut metrics = DistanceMetrics::default();
    if pixels_per_meter <= 0.0 {
        return metrics;
    }

    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return metrics;
    };

    let mut prev = first;
    for point in iter {
        metrics.accumulate(point - prev, pixels_per_meter);
        prev = point;
    }
    metrics.displacement = (prev - first).norm() / pixels_per_meter;
    metrics
}
