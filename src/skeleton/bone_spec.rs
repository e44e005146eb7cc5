//! 骨骼描述 - 拓扑中的静态单元
//!
//! BoneSpec 只保存初始化后不变的数据：起止关节、父骨骼、坐标轴角色与参考向量来源。
//! 每帧变化的量（方向、旋转）由 retarget 模块计算，不存放在这里。

use glam::Vec3;

// ============================================================================
// 坐标轴角色
// ============================================================================

/// 构建骨骼坐标系时方向与参考向量的分工
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisRole {
    /// 四肢：方向为朝向轴，方向 × 参考 为上方向
    Limb,
    /// 锁骨/肩：方向为朝向轴，参考向量直接作为上方向
    Clavicle,
    /// 腰/髋：参考向量（对方向正交化后）为朝向轴，上方向由叉积导出
    Waist,
}

impl AxisRole {
    /// 骨骼方向在该角色坐标系中对应的轴
    #[inline]
    pub fn bone_axis(self) -> Vec3 {
        match self {
            Self::Limb | Self::Clavicle => Vec3::Z,
            Self::Waist => Vec3::X,
        }
    }

    /// 用于查表的序号
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Limb => 0,
            Self::Clavicle => 1,
            Self::Waist => 2,
        }
    }

    pub(crate) const ALL: [AxisRole; 3] = [Self::Limb, Self::Clavicle, Self::Waist];
}

// ============================================================================
// 参考向量
// ============================================================================

/// 两个关节之间的跨度（to - from）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JointSpan {
    pub from: usize,
    pub to: usize,
}

impl JointSpan {
    pub const fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    #[inline]
    pub fn evaluate(&self, positions: &[Vec3]) -> Vec3 {
        positions[self.to] - positions[self.from]
    }
}

/// 每根骨骼的参考向量来源
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReferenceVector {
    /// 当前帧两个关节之间的向量（如左右髋连线）
    Span(JointSpan),
    /// 两个跨度的叉积（如躯干前向 = 髋连线 × 脊柱）
    Cross(JointSpan, JointSpan),
    /// 固定世界方向
    Fixed(Vec3),
}

impl ReferenceVector {
    /// 由当前帧关节位置求参考向量
    pub fn evaluate(&self, positions: &[Vec3]) -> Vec3 {
        match self {
            Self::Span(span) => span.evaluate(positions),
            Self::Cross(a, b) => a.evaluate(positions).cross(b.evaluate(positions)),
            Self::Fixed(v) => *v,
        }
    }

    /// 引用到的所有关节索引
    pub fn joints(&self) -> Vec<usize> {
        match self {
            Self::Span(s) => vec![s.from, s.to],
            Self::Cross(a, b) => vec![a.from, a.to, b.from, b.to],
            Self::Fixed(_) => Vec::new(),
        }
    }
}

// ============================================================================
// 骨骼描述
// ============================================================================

/// 骨骼描述
///
/// 根骨骼的父骨骼是它自己；非根骨骼的父骨骼索引严格小于自身索引。
#[derive(Clone, Debug, PartialEq)]
pub struct BoneSpec {
    /// 骨骼名称
    pub name: String,
    /// 拓扑内索引
    pub id: usize,
    /// 起点关节
    pub start_joint: usize,
    /// 终点关节
    pub end_joint: usize,
    /// 父骨骼索引（根骨骼等于自身）
    pub parent: usize,
    /// 坐标轴角色
    pub role: AxisRole,
    /// 参考向量来源
    pub reference: ReferenceVector,
}

impl BoneSpec {
    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.is_root() {
            None
        } else {
            Some(self.parent)
        }
    }

    /// 是否为根骨骼
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent == self.id
    }

    /// 骨骼向量（end - start）
    #[inline]
    pub fn span(&self) -> JointSpan {
        JointSpan::new(self.start_joint, self.end_joint)
    }
}
