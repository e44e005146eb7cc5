//! 重定向流水线
//!
//! 关节位置 → 骨骼度量 → 世界旋转 → 局部旋转 → FK 重建 → 地面贴合
//!
//! 各阶段均为纯函数，引擎只负责持有一次性配置并串联它们。

mod engine;
mod fk;
mod ground;
mod local;
mod metrics;
mod orientation;
mod pose;
mod reference;

pub use engine::RetargetEngine;
pub use fk::{reconstruct_positions, BoneBasis, BoneLengthTable, ForwardKinematics};
pub use ground::clamp_to_ground;
pub use local::compute_local_rotations;
pub use metrics::{compute_bone_metrics, BoneMetrics};
pub use orientation::{look_rotation, role_frame, OrientationSolver, RotationMode};
pub use pose::{BoneDiagnostic, FallbackSource, Pose};
pub use reference::ReferencePose;
