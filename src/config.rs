//! 重定向配置
//!
//! 所有参数扁平化，构建引擎时一次性传入，之后只读。

use bitflags::bitflags;
use glam::Vec3;

use crate::{RetargetError, Result};

bitflags! {
    /// 流水线可选阶段
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PipelineFlags: u32 {
        /// 按目标骨长重建关节位置
        const FORWARD_KINEMATICS = 1 << 0;
        /// 重建后将较低的脚贴到地面（需要 FORWARD_KINEMATICS）
        const GROUND_CLAMP = 1 << 1;
    }
}

/// 重定向配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
pub struct RetargetConfig {
    // ========== 数值阈值 ==========
    /// 方向、参考向量及叉积的最小长度，低于此值视为退化，默认 1e-6
    pub degenerate_epsilon: f32,

    // ========== 骨骼空间 ==========
    /// 规范轴：任一骨骼的世界旋转都把它映射到骨骼方向，默认 -X（"left"）
    pub canonical_axis: Vec3,

    // ========== 流水线 ==========
    /// 启用的可选阶段，默认为空（只求旋转）
    pub features: PipelineFlags,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            degenerate_epsilon: 1.0e-6,
            // 与源数据的 Vector3.left 约定一致
            canonical_axis: Vec3::NEG_X,
            features: PipelineFlags::empty(),
            debug_log: false,
        }
    }
}

impl RetargetConfig {
    /// 启用 FK 重建
    pub fn with_forward_kinematics(mut self) -> Self {
        self.features.insert(PipelineFlags::FORWARD_KINEMATICS);
        self
    }

    /// 启用 FK 重建与地面贴合
    pub fn with_ground_clamp(mut self) -> Self {
        self.features
            .insert(PipelineFlags::FORWARD_KINEMATICS | PipelineFlags::GROUND_CLAMP);
        self
    }

    #[inline]
    pub fn forward_kinematics(&self) -> bool {
        self.features.contains(PipelineFlags::FORWARD_KINEMATICS)
    }

    #[inline]
    pub fn ground_clamp(&self) -> bool {
        self.features.contains(PipelineFlags::GROUND_CLAMP)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if !(self.degenerate_epsilon > 0.0 && self.degenerate_epsilon.is_finite()) {
            return Err(RetargetError::configuration(format!(
                "degenerate_epsilon must be positive and finite, got {}",
                self.degenerate_epsilon
            )));
        }
        if !self.canonical_axis.is_normalized() {
            return Err(RetargetError::configuration(format!(
                "canonical_axis must be a unit vector, got {}",
                self.canonical_axis
            )));
        }
        if self.ground_clamp() && !self.forward_kinematics() {
            return Err(RetargetError::configuration(
                "GROUND_CLAMP requires FORWARD_KINEMATICS",
            ));
        }
        Ok(())
    }
}
