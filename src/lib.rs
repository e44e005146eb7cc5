//! 动作重定向内核
//!
//! 把动捕 / 姿态估计得到的逐帧关节位置转换为骨骼旋转，
//! 并按任意比例的目标骨架重建关节位置。
//!
//! - skeleton: 拓扑（关节、骨骼、父子关系）与内置 16 / 17 关节骨架
//! - retarget: 骨骼度量、朝向求解、局部分解、FK、地面贴合及引擎
//! - config: 引擎配置
//!
//! ```
//! use pose_retarget::{RetargetConfig, RetargetEngine, RotationMode, Topology, TopologyId};
//!
//! let topology = Topology::shared(TopologyId::Mpii16)?;
//! let engine = RetargetEngine::new(
//!     topology,
//!     RotationMode::AbsoluteAlignment,
//!     RetargetConfig::default(),
//!     None,
//! )?;
//! assert_eq!(engine.topology().bone_count(), 15);
//! # Ok::<(), pose_retarget::RetargetError>(())
//! ```

pub mod config;
pub mod error;
pub mod retarget;
pub mod skeleton;

pub use config::{PipelineFlags, RetargetConfig};
pub use error::{DegenerateReason, RetargetError, Result};
pub use retarget::{
    clamp_to_ground, compute_bone_metrics, compute_local_rotations, reconstruct_positions,
    BoneDiagnostic, BoneLengthTable, BoneMetrics, FallbackSource, Pose, ReferencePose,
    RetargetEngine, RotationMode,
};
pub use skeleton::{BoneSpec, BoneTransform, Topology, TopologyBuilder, TopologyId};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
