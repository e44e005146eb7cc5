//! 错误类型
//!
//! 配置错误在引擎构建时同步返回；退化帧错误在逐帧处理中被转换为
//! 骨骼诊断信息，不会中断整段动画。

use std::fmt;

use thiserror::Error;

/// 骨骼坐标系退化原因
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DegenerateReason {
    /// 骨骼方向长度为零
    ZeroDirection,
    /// 参考向量长度为零
    ZeroReference,
    /// 骨骼方向与参考向量平行
    ParallelReference,
    /// 输入含 NaN / Inf
    NonFinite,
}

impl fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ZeroDirection => "zero-length bone direction",
            Self::ZeroReference => "zero-length reference vector",
            Self::ParallelReference => "direction parallel to reference",
            Self::NonFinite => "non-finite joint data",
        };
        f.write_str(text)
    }
}

/// 重定向内核错误
#[derive(Error, Debug)]
pub enum RetargetError {
    /// 拓扑或引擎配置无效
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 目标骨长缺失或无效
    #[error("Target bone length for bone {bone} ({name}) is missing or invalid: {value}")]
    MissingBoneLength {
        bone: usize,
        name: String,
        value: f32,
    },

    /// 单帧中某根骨骼无法构建坐标系
    #[error("Degenerate frame at bone {bone} ({name}): {reason}")]
    DegenerateFrame {
        bone: usize,
        name: String,
        reason: DegenerateReason,
    },

    /// 输入列表为空
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    /// 输入长度与拓扑不符
    #[error("Count mismatch: expected {expected}, got {actual}")]
    JointCountMismatch { expected: usize, actual: usize },
}

/// Result 别名
pub type Result<T> = std::result::Result<T, RetargetError>;

impl RetargetError {
    /// 创建配置错误
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 是否为构建期错误
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::MissingBoneLength { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetargetError::DegenerateFrame {
            bone: 4,
            name: "right_thigh".to_string(),
            reason: DegenerateReason::ParallelReference,
        };
        let text = err.to_string();
        assert!(text.contains("right_thigh"));
        assert!(text.contains("parallel"));
    }

    #[test]
    fn test_configuration_classification() {
        assert!(RetargetError::configuration("cycle").is_configuration());
        let missing = RetargetError::MissingBoneLength {
            bone: 0,
            name: "spine".to_string(),
            value: 0.0,
        };
        assert!(missing.is_configuration());
        assert!(!RetargetError::EmptyInput("positions").is_configuration());
    }
}
