//! 骨骼度量：方向（未归一化）与长度

use glam::Vec3;

use crate::skeleton::Topology;
use crate::{RetargetError, Result};

/// 单根骨骼的每帧度量
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneMetrics {
    /// end - start，保留原始长度
    pub direction: Vec3,
    pub length: f32,
}

impl BoneMetrics {
    /// 归一化方向，长度为零时返回零向量
    #[inline]
    pub fn unit_direction(&self) -> Vec3 {
        if self.length > 0.0 {
            self.direction / self.length
        } else {
            Vec3::ZERO
        }
    }
}

/// 校验关节数组形状
pub(crate) fn check_positions(positions: &[Vec3], topology: &Topology) -> Result<()> {
    if positions.is_empty() {
        return Err(RetargetError::EmptyInput("joint positions"));
    }
    if positions.len() != topology.joint_count() {
        return Err(RetargetError::JointCountMismatch {
            expected: topology.joint_count(),
            actual: positions.len(),
        });
    }
    Ok(())
}

/// 计算每根骨骼的方向与长度
///
/// 零长度骨骼原样返回（零向量、长度 0），由下游的坐标系求解处理。
pub fn compute_bone_metrics(positions: &[Vec3], topology: &Topology) -> Result<Vec<BoneMetrics>> {
    check_positions(positions, topology)?;

    Ok(topology
        .bones()
        .iter()
        .map(|bone| {
            let direction = positions[bone.end_joint] - positions[bone.start_joint];
            BoneMetrics {
                direction,
                length: direction.length(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{joint, TopologyId};

    #[test]
    fn test_metrics_follow_bone_order() {
        let topology = Topology::preset(TopologyId::Mpii16).unwrap();
        let mut positions = vec![Vec3::ZERO; 16];
        positions[joint::SPINE] = Vec3::new(0.0, 3.0, 4.0);

        let metrics = compute_bone_metrics(&positions, &topology).unwrap();
        assert_eq!(metrics.len(), topology.bone_count());
        assert_eq!(metrics[0].direction, Vec3::new(0.0, 3.0, 4.0));
        assert_eq!(metrics[0].length, 5.0);
        assert!(metrics[0].unit_direction().abs_diff_eq(Vec3::new(0.0, 0.6, 0.8), 1e-6));
        // 其余骨骼为零长度，不报错
        assert_eq!(metrics[4].length, 0.0);
        assert_eq!(metrics[4].unit_direction(), Vec3::ZERO);
    }

    #[test]
    fn test_rejects_empty_and_mismatched() {
        let topology = Topology::preset(TopologyId::Mpii16).unwrap();
        assert!(matches!(
            compute_bone_metrics(&[], &topology),
            Err(RetargetError::EmptyInput(_))
        ));
        assert!(matches!(
            compute_bone_metrics(&[Vec3::ZERO; 17], &topology),
            Err(RetargetError::JointCountMismatch { expected: 16, actual: 17 })
        ));
    }
}
