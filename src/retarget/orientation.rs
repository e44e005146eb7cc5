//! 骨骼朝向求解
//!
//! 每根骨骼由方向向量和参考向量构建正交坐标系，再按旋转模式
//! 直接作为世界旋转（绝对对齐）或相对参考姿态表达。
//!
//! 三种坐标轴角色：
//! - Limb:     forward = d,            up = d × ref
//! - Clavicle: forward = d,            up = ref
//! - Waist:    forward = ref ⊥ d,      up = forward × d
//!
//! 构建出的坐标系再右乘一个按角色固定的对齐旋转，使得所有骨骼的世界旋转
//! 都把同一个规范轴映射到骨骼方向上，FK 因此可以对全骨架使用同一根轴。

use glam::{Mat3, Quat, Vec3};

use super::metrics::{check_positions, BoneMetrics};
use super::reference::ReferencePose;
use crate::config::RetargetConfig;
use crate::error::DegenerateReason;
use crate::skeleton::{AxisRole, BoneSpec, Topology};
use crate::{RetargetError, Result};

// ============================================================================
// 旋转模式
// ============================================================================

/// 旋转求解约定
#[derive(Clone, Debug, PartialEq)]
pub enum RotationMode {
    /// 每帧由当前关节直接构建坐标系，不依赖存储的基准
    AbsoluteAlignment,
    /// 相对一次性捕获的参考姿态（如 T-pose）
    RelativeToReference(ReferencePose),
}

impl RotationMode {
    #[inline]
    pub fn reference(&self) -> Option<&ReferencePose> {
        match self {
            Self::AbsoluteAlignment => None,
            Self::RelativeToReference(reference) => Some(reference),
        }
    }
}

// ============================================================================
// 坐标系构建
// ============================================================================

/// 构建 Z 轴朝向 `forward`、Y 轴尽量贴近 `up` 的旋转
///
/// `forward` 为零或与 `up` 平行时返回 None。
pub fn look_rotation(forward: Vec3, up: Vec3, epsilon: f32) -> Option<Quat> {
    if forward.length() < epsilon {
        return None;
    }
    let f = forward.normalize();
    let right = up.cross(f);
    if right.length() < epsilon {
        return None;
    }
    let r = right.normalize();
    let u = f.cross(r);
    Some(Quat::from_mat3(&Mat3::from_cols(r, u, f)).normalize())
}

/// 按坐标轴角色构建骨骼坐标系（未对齐规范轴）
pub fn role_frame(
    role: AxisRole,
    direction: Vec3,
    reference: Vec3,
    epsilon: f32,
) -> std::result::Result<Quat, DegenerateReason> {
    if !direction.is_finite() || !reference.is_finite() {
        return Err(DegenerateReason::NonFinite);
    }
    let length = direction.length();
    if length < epsilon {
        return Err(DegenerateReason::ZeroDirection);
    }
    let ref_length = reference.length();
    if ref_length < epsilon {
        return Err(DegenerateReason::ZeroReference);
    }

    let d = direction / length;
    let r = reference / ref_length;
    let (forward, up) = match role {
        AxisRole::Limb => (d, d.cross(r)),
        AxisRole::Clavicle => (d, r),
        AxisRole::Waist => {
            let forward = r - d * r.dot(d);
            (forward, forward.cross(d))
        }
    };

    look_rotation(forward, up, epsilon).ok_or(DegenerateReason::ParallelReference)
}

// ============================================================================
// 求解器
// ============================================================================

/// 朝向求解器
#[derive(Clone, Debug)]
pub struct OrientationSolver {
    mode: RotationMode,
    epsilon: f32,
    /// 每个角色的规范轴对齐旋转（按 AxisRole::index 索引）
    alignments: [Quat; 3],
}

impl OrientationSolver {
    pub fn new(config: &RetargetConfig, mode: RotationMode) -> Self {
        let alignments =
            AxisRole::ALL.map(|role| Quat::from_rotation_arc(config.canonical_axis, role.bone_axis()));
        Self {
            mode,
            epsilon: config.degenerate_epsilon,
            alignments,
        }
    }

    #[inline]
    pub fn mode(&self) -> &RotationMode {
        &self.mode
    }

    /// 绝对坐标系：把规范轴映射到骨骼方向
    ///
    /// `positions` 必须覆盖骨骼端点与参考向量用到的全部关节。
    pub fn bone_frame(&self, bone: &BoneSpec, metrics: &BoneMetrics, positions: &[Vec3]) -> Result<Quat> {
        let needed = bone
            .reference
            .joints()
            .into_iter()
            .chain([bone.start_joint, bone.end_joint])
            .max()
            .unwrap_or(0);
        if needed >= positions.len() {
            return Err(RetargetError::JointCountMismatch {
                expected: needed + 1,
                actual: positions.len(),
            });
        }

        let reference = bone.reference.evaluate(positions);
        let frame = role_frame(bone.role, metrics.direction, reference, self.epsilon).map_err(
            |reason| RetargetError::DegenerateFrame {
                bone: bone.id,
                name: bone.name.clone(),
                reason,
            },
        )?;
        Ok((frame * self.alignments[bone.role.index()]).normalize())
    }

    /// 求单根骨骼的世界旋转
    pub fn solve_bone(
        &self,
        topology: &Topology,
        bone: usize,
        metrics: &BoneMetrics,
        positions: &[Vec3],
    ) -> Result<Quat> {
        let spec = topology.bone(bone).ok_or_else(|| {
            RetargetError::configuration(format!("bone index {bone} out of range"))
        })?;
        let frame = self.bone_frame(spec, metrics, positions)?;
        Ok(match &self.mode {
            RotationMode::AbsoluteAlignment => frame,
            RotationMode::RelativeToReference(reference) => {
                reference.compose(bone, frame).ok_or_else(|| {
                    RetargetError::configuration(format!(
                        "reference pose has no rotation for bone {bone}"
                    ))
                })?
            }
        })
    }

    /// 求全部骨骼，逐骨返回结果，退化骨骼不影响其它骨骼
    ///
    /// 输入形状错误作为外层错误返回。
    pub fn solve(
        &self,
        topology: &Topology,
        metrics: &[BoneMetrics],
        positions: &[Vec3],
    ) -> Result<Vec<Result<Quat>>> {
        check_positions(positions, topology)?;
        if metrics.len() != topology.bone_count() {
            return Err(RetargetError::JointCountMismatch {
                expected: topology.bone_count(),
                actual: metrics.len(),
            });
        }

        Ok(metrics
            .iter()
            .enumerate()
            .map(|(bone, m)| self.solve_bone(topology, bone, m, positions))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retarget::metrics::compute_bone_metrics;
    use crate::skeleton::{JointSpan, ReferenceVector, TopologyId};

    const EPS: f32 = 1e-6;

    #[test]
    fn test_look_rotation_axes() {
        let q = look_rotation(Vec3::X, Vec3::Y, EPS).unwrap();
        assert!((q * Vec3::Z).abs_diff_eq(Vec3::X, 1e-5));
        assert!((q * Vec3::Y).abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn test_look_rotation_orthogonalizes_up() {
        let q = look_rotation(Vec3::Z, Vec3::new(0.0, 1.0, 1.0), EPS).unwrap();
        assert!((q * Vec3::Y).abs_diff_eq(Vec3::Y, 1e-5));
        assert!(q.abs_diff_eq(Quat::IDENTITY, 1e-5));
    }

    #[test]
    fn test_look_rotation_parallel_is_none() {
        assert!(look_rotation(Vec3::Y, Vec3::Y * 3.0, EPS).is_none());
        assert!(look_rotation(Vec3::ZERO, Vec3::Y, EPS).is_none());
    }

    #[test]
    fn test_role_frames_keep_direction_exact() {
        let direction = Vec3::new(0.3, -2.0, 0.4);
        let reference = Vec3::new(1.0, 0.2, 0.1);
        let d = direction.normalize();
        for role in AxisRole::ALL {
            let frame = role_frame(role, direction, reference, EPS).unwrap();
            assert!(
                (frame * role.bone_axis()).abs_diff_eq(d, 1e-5),
                "{role:?} does not keep the bone direction on its axis"
            );
        }
    }

    #[test]
    fn test_role_frame_degenerate_reasons() {
        assert_eq!(
            role_frame(AxisRole::Limb, Vec3::ZERO, Vec3::X, EPS),
            Err(DegenerateReason::ZeroDirection)
        );
        assert_eq!(
            role_frame(AxisRole::Limb, Vec3::Y, Vec3::ZERO, EPS),
            Err(DegenerateReason::ZeroReference)
        );
        for role in AxisRole::ALL {
            assert_eq!(
                role_frame(role, Vec3::Y, Vec3::NEG_Y * 2.0, EPS),
                Err(DegenerateReason::ParallelReference)
            );
        }
        assert_eq!(
            role_frame(AxisRole::Limb, Vec3::new(f32::NAN, 0.0, 0.0), Vec3::X, EPS),
            Err(DegenerateReason::NonFinite)
        );
    }

    #[test]
    fn test_solver_maps_canonical_axis_to_direction() {
        let config = RetargetConfig::default();
        let solver = OrientationSolver::new(&config, RotationMode::AbsoluteAlignment);
        let positions = [Vec3::ZERO, Vec3::new(0.5, 1.0, -0.2), Vec3::X];
        let bone = BoneSpec {
            name: "spine".to_string(),
            id: 0,
            start_joint: 0,
            end_joint: 1,
            parent: 0,
            role: AxisRole::Waist,
            reference: ReferenceVector::Span(JointSpan::new(0, 2)),
        };
        let direction = positions[1] - positions[0];
        let metrics = BoneMetrics {
            direction,
            length: direction.length(),
        };
        let q = solver.bone_frame(&bone, &metrics, &positions).unwrap();
        assert!((q * config.canonical_axis).abs_diff_eq(direction.normalize(), 1e-5));
    }

    #[test]
    fn test_short_positions_are_rejected() {
        let config = RetargetConfig::default();
        let solver = OrientationSolver::new(&config, RotationMode::AbsoluteAlignment);
        let topology = Topology::preset(TopologyId::Mpii16).unwrap();
        let positions: Vec<Vec3> = (0..16).map(|i| Vec3::new(i as f32, (i * i) as f32, 1.0)).collect();
        let metrics = compute_bone_metrics(&positions, &topology).unwrap();

        assert!(matches!(
            solver.solve(&topology, &metrics, &positions[..10]),
            Err(RetargetError::JointCountMismatch { expected: 16, actual: 10 })
        ));
        assert!(matches!(
            solver.solve(&topology, &metrics[..3], &positions),
            Err(RetargetError::JointCountMismatch { expected: 15, actual: 3 })
        ));

        // 左前臂需要 15 号关节
        let forearm = topology.bone(14).unwrap();
        assert!(matches!(
            solver.bone_frame(forearm, &metrics[14], &positions[..15]),
            Err(RetargetError::JointCountMismatch { expected: 16, actual: 15 })
        ));
        assert!(matches!(
            solver.solve_bone(&topology, 14, &metrics[14], &positions[..8]),
            Err(RetargetError::JointCountMismatch { .. })
        ));
    }
}
