//! 每帧结果
//!
//! Pose 由引擎一次性构建，之后不再修改；下一帧产生新的 Pose 取代它。

use glam::{Quat, Vec3};

use super::metrics::BoneMetrics;
use crate::error::DegenerateReason;
use crate::skeleton::{BoneTransform, Topology};

/// 退化骨骼的替代来源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackSource {
    /// 沿用上一帧该骨骼的旋转
    PreviousFrame,
    /// 没有上一帧，使用单位旋转
    Identity,
}

/// 单根骨骼的诊断信息
#[derive(Clone, Debug, PartialEq)]
pub struct BoneDiagnostic {
    pub bone: usize,
    pub name: String,
    pub reason: DegenerateReason,
    pub fallback: FallbackSource,
}

/// 每帧重定向结果
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    frame: u32,
    positions: Vec<Vec3>,
    bone_metrics: Vec<BoneMetrics>,
    global_rotations: Vec<Quat>,
    local_rotations: Vec<Quat>,
    fk_positions: Option<Vec<Vec3>>,
    diagnostics: Vec<BoneDiagnostic>,
}

impl Pose {
    pub(crate) fn new(
        frame: u32,
        positions: Vec<Vec3>,
        bone_metrics: Vec<BoneMetrics>,
        global_rotations: Vec<Quat>,
        local_rotations: Vec<Quat>,
        fk_positions: Option<Vec<Vec3>>,
        diagnostics: Vec<BoneDiagnostic>,
    ) -> Self {
        debug_assert_eq!(bone_metrics.len(), global_rotations.len());
        debug_assert_eq!(global_rotations.len(), local_rotations.len());
        Self {
            frame,
            positions,
            bone_metrics,
            global_rotations,
            local_rotations,
            fk_positions,
            diagnostics,
        }
    }

    #[inline]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// 源关节位置
    #[inline]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[inline]
    pub fn bone_metrics(&self) -> &[BoneMetrics] {
        &self.bone_metrics
    }

    /// 世界空间旋转
    #[inline]
    pub fn global_rotations(&self) -> &[Quat] {
        &self.global_rotations
    }

    /// 相对父骨骼的旋转
    #[inline]
    pub fn local_rotations(&self) -> &[Quat] {
        &self.local_rotations
    }

    /// FK 重建位置（仅在启用 FK 时存在）
    #[inline]
    pub fn fk_positions(&self) -> Option<&[Vec3]> {
        self.fk_positions.as_deref()
    }

    #[inline]
    pub fn diagnostics(&self) -> &[BoneDiagnostic] {
        &self.diagnostics
    }

    /// 本帧没有退化骨骼
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// FK 结果中相邻关节间的骨长
    pub fn fk_bone_lengths(&self, topology: &Topology) -> Option<Vec<f32>> {
        let fk = self.fk_positions.as_ref()?;
        Some(
            topology
                .bones()
                .iter()
                .map(|b| fk[b.end_joint].distance(fk[b.start_joint]))
                .collect(),
        )
    }

    /// 每根骨骼的变换：起点关节位置 + 世界旋转
    ///
    /// 优先使用 FK 位置，未启用 FK 时使用源位置。
    pub fn bone_transforms(&self, topology: &Topology) -> Vec<BoneTransform> {
        let joints = self.fk_positions.as_deref().unwrap_or(&self.positions);
        topology
            .bones()
            .iter()
            .map(|b| BoneTransform {
                translation: joints[b.start_joint],
                rotation: self.global_rotations[b.id],
                scale: Vec3::ONE,
            })
            .collect()
    }
}
