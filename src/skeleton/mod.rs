//! 骨骼系统
//!
//! 核心设计思想：
//! - BoneSpec: 单根骨骼的静态描述（起止关节、父骨骼、坐标轴角色）
//! - Topology: 管理骨骼层次结构，构建时校验，之后只读共享
//! - presets: 内置的 16 / 17 关节拓扑

mod bone_spec;
mod presets;
mod topology;

pub use bone_spec::{AxisRole, BoneSpec, JointSpan, ReferenceVector};
pub use presets::{joint, TopologyId};
pub use topology::{ParentChain, ReferenceComposition, RootConvention, Topology, TopologyBuilder};

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl BoneTransform {
    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// 切换手性：翻转 Z 轴
///
/// 引擎内部固定使用右手系（Y 向上），左手系采集数据需先经过此转换。
pub fn flip_handedness(positions: &[Vec3]) -> Vec<Vec3> {
    positions
        .iter()
        .map(|p| Vec3::new(p.x, p.y, -p.z))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_matrix() {
        let transform = BoneTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::ONE,
        };
        let p = transform.to_matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 2.0), 1e-5));
    }

    #[test]
    fn test_flip_handedness_twice_is_identity() {
        let positions = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, -2.0)];
        let flipped = flip_handedness(&positions);
        assert_eq!(flipped[0], Vec3::new(1.0, 2.0, -3.0));
        assert_eq!(flip_handedness(&flipped), positions);
    }
}
