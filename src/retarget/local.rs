//! 局部旋转分解：local = inverse(global[parent]) * global[bone]

use glam::Quat;

use crate::skeleton::Topology;
use crate::{RetargetError, Result};

/// 把世界旋转分解为相对父骨骼的局部旋转
///
/// 根骨骼按拓扑的 RootConvention 处理：直接沿用全局旋转，
/// 或相对固定的世界参考四元数表达。
pub fn compute_local_rotations(global_rotations: &[Quat], topology: &Topology) -> Result<Vec<Quat>> {
    if global_rotations.len() != topology.bone_count() {
        return Err(RetargetError::JointCountMismatch {
            expected: topology.bone_count(),
            actual: global_rotations.len(),
        });
    }

    let root_inverse = topology.root_convention().world_rotation().inverse();

    Ok(topology
        .bones()
        .iter()
        .map(|bone| {
            let global = global_rotations[bone.id];
            let parent = match bone.parent_id() {
                Some(parent) => global_rotations[parent].inverse(),
                None => root_inverse,
            };
            (parent * global).normalize()
        })
        .collect())
}
