//! 参考姿态
//!
//! 配置阶段一次性捕获的逐骨四元数表，之后只读，不随帧重算。
//! 存储内容取决于拓扑的组合约定：
//! - PostInverse：存 rest，rot = target * inverse(rest)
//! - PreMultiply：存 inverse(rest)，rot = reference * target

use glam::{Quat, Vec3};

use super::metrics::compute_bone_metrics;
use super::orientation::{OrientationSolver, RotationMode};
use crate::config::RetargetConfig;
use crate::skeleton::{ReferenceComposition, Topology};
use crate::{RetargetError, Result};

/// 参考姿态四元数表
#[derive(Clone, Debug, PartialEq)]
pub struct ReferencePose {
    composition: ReferenceComposition,
    rotations: Vec<Quat>,
}

impl ReferencePose {
    /// 从参考姿态（如 T-pose）的关节位置捕获
    ///
    /// 参考姿态中任一骨骼退化都视为配置错误。
    pub fn capture(topology: &Topology, config: &RetargetConfig, rest_positions: &[Vec3]) -> Result<Self> {
        config.validate()?;
        let solver = OrientationSolver::new(config, RotationMode::AbsoluteAlignment);
        let metrics = compute_bone_metrics(rest_positions, topology)?;

        let rest = solver
            .solve(topology, &metrics, rest_positions)?
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .map_err(|err| match err {
                RetargetError::DegenerateFrame { bone, name, reason } => {
                    RetargetError::configuration(format!(
                        "reference pose is degenerate at bone {bone} ({name}): {reason}"
                    ))
                }
                other => other,
            })?;

        Self::from_rest_rotations(topology, rest)
    }

    /// 使用外部捕获的 rest 旋转（世界空间，每骨一个）
    pub fn from_rest_rotations(topology: &Topology, rest: Vec<Quat>) -> Result<Self> {
        if rest.len() != topology.bone_count() {
            return Err(RetargetError::configuration(format!(
                "reference pose has {} rotations, topology '{}' has {} bones",
                rest.len(),
                topology.name(),
                topology.bone_count()
            )));
        }
        if let Some(bone) = rest.iter().position(|q| !q.is_finite() || !q.is_normalized()) {
            return Err(RetargetError::configuration(format!(
                "reference rotation for bone {bone} is not a unit quaternion"
            )));
        }

        let composition = topology.composition();
        let rotations = rest
            .into_iter()
            .map(|q| match composition {
                ReferenceComposition::PostInverse => q.normalize(),
                ReferenceComposition::PreMultiply => q.normalize().inverse(),
            })
            .collect();

        Ok(Self {
            composition,
            rotations,
        })
    }

    #[inline]
    pub fn composition(&self) -> ReferenceComposition {
        self.composition
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    /// 校验与拓扑的骨骼数量、组合约定一致
    pub fn check_topology(&self, topology: &Topology) -> Result<()> {
        if self.rotations.len() != topology.bone_count() {
            return Err(RetargetError::configuration(format!(
                "reference pose has {} bones, topology '{}' has {}",
                self.rotations.len(),
                topology.name(),
                topology.bone_count()
            )));
        }
        if self.composition != topology.composition() {
            return Err(RetargetError::configuration(format!(
                "reference pose uses {:?}, topology '{}' uses {:?}",
                self.composition,
                topology.name(),
                topology.composition()
            )));
        }
        Ok(())
    }

    /// 存储的参考四元数（按组合约定），越界返回 None
    #[inline]
    pub fn reference_rotation(&self, bone: usize) -> Option<Quat> {
        self.rotations.get(bone).copied()
    }

    /// 该骨骼在参考姿态下的世界旋转
    #[inline]
    pub fn rest_rotation(&self, bone: usize) -> Option<Quat> {
        let stored = self.reference_rotation(bone)?;
        Some(match self.composition {
            ReferenceComposition::PostInverse => stored,
            ReferenceComposition::PreMultiply => stored.inverse(),
        })
    }

    /// 把当前帧坐标系表达为相对参考姿态的旋转
    #[inline]
    pub fn compose(&self, bone: usize, target: Quat) -> Option<Quat> {
        let reference = self.reference_rotation(bone)?;
        Some(match self.composition {
            ReferenceComposition::PostInverse => (target * reference.inverse()).normalize(),
            ReferenceComposition::PreMultiply => (reference * target).normalize(),
        })
    }
}
