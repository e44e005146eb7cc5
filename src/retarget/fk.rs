//! 正向运动学重建
//!
//! 按父先子后的顺序遍历拓扑，累乘局部旋转得到世界旋转，
//! 沿骨骼轴放置目标骨长，得到目标比例的骨架关节位置。

use std::sync::Arc;

use glam::{Quat, Vec3};

use super::metrics::compute_bone_metrics;
use super::orientation::RotationMode;
use crate::skeleton::{ReferenceComposition, Topology};
use crate::{RetargetError, Result};

// ============================================================================
// 目标骨长表
// ============================================================================

/// 目标骨骼的逐骨长度（按拓扑骨骼顺序）
#[derive(Clone, Debug, PartialEq)]
pub struct BoneLengthTable {
    lengths: Vec<f32>,
}

impl BoneLengthTable {
    /// 创建并校验：数量与拓扑一致，每项为有限正数
    pub fn new(topology: &Topology, lengths: Vec<f32>) -> Result<Self> {
        validate_lengths(topology, &lengths)?;
        Ok(Self { lengths })
    }

    /// 从静止姿态的关节位置测量
    pub fn from_positions(topology: &Topology, rest_positions: &[Vec3]) -> Result<Self> {
        let lengths = compute_bone_metrics(rest_positions, topology)?
            .into_iter()
            .map(|m| m.length)
            .collect();
        Self::new(topology, lengths)
    }

    /// 全部骨长乘以同一系数
    pub fn scaled(&self, factor: f32) -> Result<Self> {
        if !(factor > 0.0 && factor.is_finite()) {
            return Err(RetargetError::configuration(format!(
                "bone length scale must be positive and finite, got {factor}"
            )));
        }
        Ok(Self {
            lengths: self.lengths.iter().map(|l| l * factor).collect(),
        })
    }

    #[inline]
    pub fn get(&self, bone: usize) -> Option<f32> {
        self.lengths.get(bone).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.lengths
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

/// 遍历前校验骨长，缺失或非正数时指出对应骨骼
fn validate_lengths(topology: &Topology, lengths: &[f32]) -> Result<()> {
    if lengths.is_empty() {
        return Err(RetargetError::EmptyInput("target bone lengths"));
    }
    if lengths.len() > topology.bone_count() {
        return Err(RetargetError::JointCountMismatch {
            expected: topology.bone_count(),
            actual: lengths.len(),
        });
    }
    for bone in topology.bones() {
        let value = lengths.get(bone.id).copied().unwrap_or(f32::NAN);
        if !(value > 0.0 && value.is_finite()) {
            return Err(RetargetError::MissingBoneLength {
                bone: bone.id,
                name: bone.name.clone(),
                value,
            });
        }
    }
    Ok(())
}

// ============================================================================
// 骨骼基
// ============================================================================

/// 单根骨骼的 FK 基：translation = pre * global * axis * length
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneBasis {
    pub pre: Quat,
    pub axis: Vec3,
}

impl BoneBasis {
    /// 按旋转模式生成每根骨骼的基
    ///
    /// 绝对模式下全骨架共用规范轴；相对模式下用参考姿态把旋转
    /// 映射回世界空间，使 FK 在任一约定下都还原骨骼方向。
    pub fn for_mode(mode: &RotationMode, canonical_axis: Vec3, bone_count: usize) -> Result<Vec<Self>> {
        (0..bone_count)
            .map(|bone| match mode {
                RotationMode::AbsoluteAlignment => Ok(Self {
                    pre: Quat::IDENTITY,
                    axis: canonical_axis,
                }),
                RotationMode::RelativeToReference(reference) => {
                    let rest = reference.rest_rotation(bone).ok_or_else(|| {
                        RetargetError::configuration(format!(
                            "reference pose has no rotation for bone {bone}"
                        ))
                    })?;
                    Ok(match reference.composition() {
                        ReferenceComposition::PostInverse => Self {
                            pre: Quat::IDENTITY,
                            axis: (rest * canonical_axis).normalize(),
                        },
                        ReferenceComposition::PreMultiply => Self {
                            pre: rest,
                            axis: canonical_axis,
                        },
                    })
                }
            })
            .collect()
    }
}

// ============================================================================
// FK 重建器
// ============================================================================

/// FK 重建器（配置一次，逐帧复用）
#[derive(Clone, Debug)]
pub struct ForwardKinematics {
    topology: Arc<Topology>,
    bases: Vec<BoneBasis>,
}

impl ForwardKinematics {
    pub fn new(topology: Arc<Topology>, mode: &RotationMode, canonical_axis: Vec3) -> Result<Self> {
        if let Some(reference) = mode.reference() {
            reference.check_topology(&topology)?;
        }
        let bases = BoneBasis::for_mode(mode, canonical_axis, topology.bone_count())?;
        Ok(Self { topology, bases })
    }

    #[inline]
    pub fn bases(&self) -> &[BoneBasis] {
        &self.bases
    }

    /// 由局部旋转与目标骨长重建关节位置，根关节位于 `root_position`
    pub fn reconstruct(
        &self,
        local_rotations: &[Quat],
        target_lengths: &[f32],
        root_position: Vec3,
    ) -> Result<Vec<Vec3>> {
        walk(&self.topology, &self.bases, local_rotations, target_lengths, root_position)
    }
}

/// 绝对模式下的 FK 重建（全骨架共用规范轴）
pub fn reconstruct_positions(
    local_rotations: &[Quat],
    target_lengths: &[f32],
    topology: &Topology,
    root_position: Vec3,
    canonical_axis: Vec3,
) -> Result<Vec<Vec3>> {
    let bases = BoneBasis::for_mode(
        &RotationMode::AbsoluteAlignment,
        canonical_axis,
        topology.bone_count(),
    )?;
    walk(topology, &bases, local_rotations, target_lengths, root_position)
}

fn walk(
    topology: &Topology,
    bases: &[BoneBasis],
    local_rotations: &[Quat],
    target_lengths: &[f32],
    root_position: Vec3,
) -> Result<Vec<Vec3>> {
    if local_rotations.len() != topology.bone_count() {
        return Err(RetargetError::JointCountMismatch {
            expected: topology.bone_count(),
            actual: local_rotations.len(),
        });
    }
    validate_lengths(topology, target_lengths)?;

    let root_world = topology.root_convention().world_rotation();
    let mut positions = vec![Vec3::ZERO; topology.joint_count()];
    let mut globals = vec![Quat::IDENTITY; topology.bone_count()];
    positions[topology.root_joint()] = root_position;

    for bone in topology.bones() {
        let parent_rot = match bone.parent_id() {
            Some(parent) => globals[parent],
            None => root_world,
        };
        let global = (parent_rot * local_rotations[bone.id]).normalize();
        globals[bone.id] = global;

        let basis = bases[bone.id];
        let translation = basis.pre * (global * basis.axis) * target_lengths[bone.id];
        positions[bone.end_joint] = positions[bone.start_joint] + translation;
    }

    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::TopologyId;

    fn topology() -> Topology {
        Topology::preset(TopologyId::Mpii16).unwrap()
    }

    #[test]
    fn test_identity_rotations_lay_bones_on_axis() {
        let topology = topology();
        let locals = vec![Quat::IDENTITY; topology.bone_count()];
        let lengths = vec![1.0; topology.bone_count()];
        let root = Vec3::new(0.0, 1.0, 0.0);
        let positions = reconstruct_positions(&locals, &lengths, &topology, root, Vec3::NEG_X).unwrap();

        assert_eq!(positions[topology.root_joint()], root);
        for bone in topology.bones() {
            let delta = positions[bone.end_joint] - positions[bone.start_joint];
            assert!(delta.abs_diff_eq(Vec3::NEG_X, 1e-6), "bone {}", bone.name);
        }
    }

    #[test]
    fn test_missing_length_names_bone() {
        let topology = topology();
        let locals = vec![Quat::IDENTITY; topology.bone_count()];
        let mut lengths = vec![1.0; topology.bone_count()];
        lengths[5] = 0.0;
        let err = reconstruct_positions(&locals, &lengths, &topology, Vec3::ZERO, Vec3::NEG_X).unwrap_err();
        match err {
            RetargetError::MissingBoneLength { bone, name, .. } => {
                assert_eq!(bone, 5);
                assert_eq!(name, "right_shin");
            }
            other => panic!("unexpected error: {other}"),
        }

        let short = vec![1.0; 4];
        let err = reconstruct_positions(&locals, &short, &topology, Vec3::ZERO, Vec3::NEG_X).unwrap_err();
        assert!(matches!(err, RetargetError::MissingBoneLength { bone: 4, .. }));

        let err = reconstruct_positions(&locals, &[], &topology, Vec3::ZERO, Vec3::NEG_X).unwrap_err();
        assert!(matches!(err, RetargetError::EmptyInput(_)));
    }

    #[test]
    fn test_relative_basis_needs_every_bone() {
        let t16 = Arc::new(topology());
        let t17 = Topology::preset(TopologyId::Mpii17).unwrap();
        let reference = crate::ReferencePose::from_rest_rotations(&t16, vec![Quat::IDENTITY; 15]).unwrap();
        let mode = RotationMode::RelativeToReference(reference);

        assert!(BoneBasis::for_mode(&mode, Vec3::NEG_X, 16).unwrap_err().is_configuration());
        assert_eq!(BoneBasis::for_mode(&mode, Vec3::NEG_X, 15).unwrap().len(), 15);
        assert!(ForwardKinematics::new(Arc::new(t17), &mode, Vec3::NEG_X)
            .unwrap_err()
            .is_configuration());
        assert!(ForwardKinematics::new(t16, &mode, Vec3::NEG_X).is_ok());
    }

    #[test]
    fn test_length_table() {
        let topology = topology();
        assert!(BoneLengthTable::new(&topology, vec![1.0; 3]).is_err());
        let table = BoneLengthTable::new(&topology, vec![0.5; 15]).unwrap();
        let doubled = table.scaled(2.0).unwrap();
        assert_eq!(doubled.get(0), Some(1.0));
        assert_eq!(doubled.len(), 15);
        assert!(table.scaled(0.0).is_err());
    }
}
