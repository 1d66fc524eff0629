pub mod acceleration;
pub mod calculator;
pub mod center_of_mass;
pub mod distance;
pub mod history;
pub mod kalman;
pub mod rotation;
pub mod speed;
pub mod zone;

pub use acceleration::{AccelerationMetrics, VelocitySample};
pub use calculator::MotionCalculator;
pub use center_of_mass::{center_of_mass, segment_weighted_center, CenterMethod};
pub use distance::DistanceMetrics;
pub use kalman::DisplacementFilter;
pub use rotation::{rotational_acceleration, shoulder_line_angle, AngleSample};
pub use speed::{LimbSpeeds, SpeedMetrics};
pub use zone::{SpeedZone, ZoneDurations};
