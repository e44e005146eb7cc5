//! 地面贴合：整体竖直平移，使较低的脚落在 Y = 0 平面上

use glam::Vec3;

use crate::{RetargetError, Result};

/// 返回平移后的新数组，输入不变
pub fn clamp_to_ground(positions: &[Vec3], left_foot: usize, right_foot: usize) -> Result<Vec<Vec3>> {
    if positions.is_empty() {
        return Err(RetargetError::EmptyInput("positions to clamp"));
    }
    let (Some(left), Some(right)) = (positions.get(left_foot), positions.get(right_foot)) else {
        return Err(RetargetError::JointCountMismatch {
            expected: left_foot.max(right_foot) + 1,
            actual: positions.len(),
        });
    };

    let lowest = left.y.min(right.y);
    let offset = lowest.abs();
    // 在平面以下则抬升，否则下降
    let shift = if lowest <= 0.0 { offset } else { -offset };

    Ok(positions
        .iter()
        .map(|p| Vec3::new(p.x, p.y + shift, p.z))
        .collect())
}
