pub mod angles;
pub mod balance;
pub mod symmetry;

pub use angles::{
    hyperextension_warnings, joint_angles, weighted_joint_angles, Joint, JointAngles, WeightedAngle,
};
pub use balance::{balance, BalanceMetrics, SwayTracker};
pub use symmetry::{symmetry_score, BodyPair, SymmetryScore};
