//! 内置拓扑
//!
//! - Mpii16：16 关节 / 15 骨骼，无头部关节
//! - Mpii17：17 关节 / 16 骨骼，在颈部之上增加头部骨骼
//!
//! 坐标约定：右手系，Y 向上，人物面向 +Z，左侧为 +X。

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::bone_spec::{AxisRole, JointSpan, ReferenceVector};
use super::topology::{ReferenceComposition, Topology, TopologyBuilder};
use crate::Result;

/// 内置拓扑标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TopologyId {
    Mpii16,
    Mpii17,
}

/// 关节索引（两种拓扑共享前 16 个，Mpii17 追加 HEAD）
pub mod joint {
    pub const RIGHT_ANKLE: usize = 0;
    pub const RIGHT_KNEE: usize = 1;
    pub const RIGHT_HIP: usize = 2;
    pub const LEFT_HIP: usize = 3;
    pub const LEFT_KNEE: usize = 4;
    pub const LEFT_ANKLE: usize = 5;
    pub const PELVIS: usize = 6;
    pub const SPINE: usize = 7;
    pub const THORAX: usize = 8;
    pub const NECK: usize = 9;
    pub const RIGHT_WRIST: usize = 10;
    pub const RIGHT_ELBOW: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_SHOULDER: usize = 13;
    pub const LEFT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    /// 仅 Mpii17
    pub const HEAD: usize = 16;
}

use joint::*;

impl TopologyId {
    #[inline]
    pub fn joint_count(self) -> usize {
        match self {
            Self::Mpii16 => 16,
            Self::Mpii17 => 17,
        }
    }

    #[inline]
    pub fn bone_count(self) -> usize {
        self.joint_count() - 1
    }
}

static MPII16: OnceCell<Arc<Topology>> = OnceCell::new();
static MPII17: OnceCell<Arc<Topology>> = OnceCell::new();

impl Topology {
    /// 构建内置拓扑（新实例）
    pub fn preset(id: TopologyId) -> Result<Self> {
        match id {
            TopologyId::Mpii16 => body(TopologyBuilder::new("mpii16", 16, PELVIS))
                .composition(ReferenceComposition::PostInverse)
                .build(),
            TopologyId::Mpii17 => body(TopologyBuilder::new("mpii17", 17, PELVIS))
                .composition(ReferenceComposition::PreMultiply)
                .bone(
                    "head",
                    NECK,
                    HEAD,
                    Some(2),
                    AxisRole::Limb,
                    ReferenceVector::Span(SHOULDER_SPAN),
                )
                .build(),
        }
    }

    /// 进程内共享的只读内置拓扑
    pub fn shared(id: TopologyId) -> Result<Arc<Self>> {
        let cell = match id {
            TopologyId::Mpii16 => &MPII16,
            TopologyId::Mpii17 => &MPII17,
        };
        cell.get_or_try_init(|| Self::preset(id).map(Arc::new))
            .cloned()
    }
}

// ============================================================================
// 参考向量
// ============================================================================

/// 右髋 -> 左髋
const HIP_SPAN: JointSpan = JointSpan::new(RIGHT_HIP, LEFT_HIP);
/// 右肩 -> 左肩
const SHOULDER_SPAN: JointSpan = JointSpan::new(RIGHT_SHOULDER, LEFT_SHOULDER);
/// 脊柱 -> 颈
const UPPER_SPINE: JointSpan = JointSpan::new(SPINE, NECK);

/// 躯干前向 = 髋连线 × 下脊柱
///
/// 手臂在 T-pose 与自然下垂时都与它垂直，因此也作为手臂的参考向量。
fn torso_forward() -> ReferenceVector {
    ReferenceVector::Cross(HIP_SPAN, JointSpan::new(PELVIS, SPINE))
}

/// 两种拓扑共享的 15 根骨骼
fn body(builder: TopologyBuilder) -> TopologyBuilder {
    use AxisRole::{Clavicle, Limb, Waist};

    builder
        .feet(LEFT_ANKLE, RIGHT_ANKLE)
        // 躯干
        .bone("spine", PELVIS, SPINE, None, Waist, torso_forward())
        .bone("thorax", SPINE, THORAX, Some(0), Limb, ReferenceVector::Span(SHOULDER_SPAN))
        .bone("neck", THORAX, NECK, Some(1), Limb, ReferenceVector::Span(SHOULDER_SPAN))
        // 右腿
        .bone("right_hip", PELVIS, RIGHT_HIP, Some(0), Waist, torso_forward())
        .bone("right_thigh", RIGHT_HIP, RIGHT_KNEE, Some(3), Limb, ReferenceVector::Span(HIP_SPAN))
        .bone("right_shin", RIGHT_KNEE, RIGHT_ANKLE, Some(4), Limb, ReferenceVector::Span(HIP_SPAN))
        // 左腿
        .bone("left_hip", PELVIS, LEFT_HIP, Some(0), Waist, torso_forward())
        .bone("left_thigh", LEFT_HIP, LEFT_KNEE, Some(6), Limb, ReferenceVector::Span(HIP_SPAN))
        .bone("left_shin", LEFT_KNEE, LEFT_ANKLE, Some(7), Limb, ReferenceVector::Span(HIP_SPAN))
        // 右臂
        .bone("right_clavicle", THORAX, RIGHT_SHOULDER, Some(1), Clavicle, ReferenceVector::Span(UPPER_SPINE))
        .bone("right_upper_arm", RIGHT_SHOULDER, RIGHT_ELBOW, Some(9), Limb, torso_forward())
        .bone("right_forearm", RIGHT_ELBOW, RIGHT_WRIST, Some(10), Limb, torso_forward())
        // 左臂
        .bone("left_clavicle", THORAX, LEFT_SHOULDER, Some(1), Clavicle, ReferenceVector::Span(UPPER_SPINE))
        .bone("left_upper_arm", LEFT_SHOULDER, LEFT_ELBOW, Some(12), Limb, torso_forward())
        .bone("left_forearm", LEFT_ELBOW, LEFT_WRIST, Some(13), Limb, torso_forward())
}
