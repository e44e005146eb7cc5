//! 骨骼拓扑 - 管理骨骼层次结构
//!
//! Topology 在构建时完成全部校验（关节范围、父子顺序、无环、关节放置），
//! 之后只读，可通过 `Arc` 在任意多个引擎和线程之间共享。

use glam::Quat;

use super::bone_spec::{AxisRole, BoneSpec, ReferenceVector};
use crate::{RetargetError, Result};

// ============================================================================
// 拓扑级约定
// ============================================================================

/// 相对参考姿态模式下，当前帧坐标系与参考四元数的组合顺序
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceComposition {
    /// rot = target * inverse(rest)，世界空间增量
    PostInverse,
    /// rot = reference * target，reference 存的是 inverse(rest)，骨骼空间增量
    PreMultiply,
}

/// 根骨骼局部旋转的定义方式
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RootConvention {
    /// 局部旋转 = 全局旋转
    Global,
    /// 局部旋转 = inverse(世界参考) * 全局旋转
    RelativeTo(Quat),
}

impl RootConvention {
    /// 根骨骼的父级世界旋转
    #[inline]
    pub fn world_rotation(&self) -> Quat {
        match self {
            Self::Global => Quat::IDENTITY,
            Self::RelativeTo(q) => *q,
        }
    }

    fn validate(&self) -> Result<()> {
        if let Self::RelativeTo(q) = self {
            if !q.is_finite() || !q.is_normalized() {
                return Err(RetargetError::configuration(format!(
                    "root world reference must be a unit quaternion, got {q}"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// 拓扑
// ============================================================================

/// 骨骼拓扑
#[derive(Clone, Debug)]
pub struct Topology {
    name: String,
    joint_count: usize,
    root_joint: usize,
    left_foot: usize,
    right_foot: usize,
    bones: Vec<BoneSpec>,
    composition: ReferenceComposition,
    root_convention: RootConvention,
    /// 子骨骼缓存
    children_cache: Vec<Vec<usize>>,
}

impl Topology {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn bones(&self) -> &[BoneSpec] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, index: usize) -> Option<&BoneSpec> {
        self.bones.get(index)
    }

    /// 按名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// FK 根关节
    #[inline]
    pub fn root_joint(&self) -> usize {
        self.root_joint
    }

    /// 左右脚关节（地面贴合用）
    #[inline]
    pub fn feet(&self) -> (usize, usize) {
        (self.left_foot, self.right_foot)
    }

    #[inline]
    pub fn composition(&self) -> ReferenceComposition {
        self.composition
    }

    #[inline]
    pub fn root_convention(&self) -> RootConvention {
        self.root_convention
    }

    /// 替换根骨骼约定
    pub fn with_root_convention(mut self, convention: RootConvention) -> Result<Self> {
        convention.validate()?;
        self.root_convention = convention;
        Ok(self)
    }

    /// 替换参考组合顺序
    pub fn with_composition(mut self, composition: ReferenceComposition) -> Self {
        self.composition = composition;
        self
    }

    /// 子骨骼索引
    #[inline]
    pub fn children(&self, bone: usize) -> &[usize] {
        self.children_cache.get(bone).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 根骨骼索引
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones.iter().filter(|b| b.is_root()).map(|b| b.id)
    }

    /// 从某根骨骼沿父链走到根（包含自身与根）
    pub fn parent_chain(&self, bone: usize) -> ParentChain<'_> {
        ParentChain {
            bones: &self.bones,
            next: (bone < self.bones.len()).then_some(bone),
        }
    }

    // ========================================
    // 校验
    // ========================================

    fn validate(&self) -> Result<()> {
        let jc = self.joint_count;
        if jc == 0 {
            return Err(RetargetError::configuration("topology has no joints"));
        }
        if self.bones.is_empty() {
            return Err(RetargetError::configuration("topology has no bones"));
        }
        for (label, joint) in [
            ("root joint", self.root_joint),
            ("left foot", self.left_foot),
            ("right foot", self.right_foot),
        ] {
            if joint >= jc {
                return Err(RetargetError::configuration(format!(
                    "{label} index {joint} out of range (joint count {jc})"
                )));
            }
        }
        if self.left_foot == self.right_foot {
            return Err(RetargetError::configuration("left and right foot must differ"));
        }
        self.root_convention.validate()?;

        // 关节范围
        for bone in &self.bones {
            if bone.start_joint >= jc || bone.end_joint >= jc {
                return Err(RetargetError::configuration(format!(
                    "bone {} ({}) joint index out of range: {} -> {} (joint count {jc})",
                    bone.id, bone.name, bone.start_joint, bone.end_joint
                )));
            }
            if bone.start_joint == bone.end_joint {
                return Err(RetargetError::configuration(format!(
                    "bone {} ({}) starts and ends at joint {}",
                    bone.id, bone.name, bone.start_joint
                )));
            }
            if let Some(joint) = bone.reference.joints().into_iter().find(|&j| j >= jc) {
                return Err(RetargetError::configuration(format!(
                    "bone {} ({}) reference joint {joint} out of range",
                    bone.id, bone.name
                )));
            }
            if bone.parent >= self.bones.len() {
                return Err(RetargetError::configuration(format!(
                    "bone {} ({}) parent {} out of range",
                    bone.id, bone.name, bone.parent
                )));
            }
        }

        // 父链必须在 len 步内终止于根骨骼
        for bone in &self.bones {
            if !self.chain_terminates(bone.id) {
                return Err(RetargetError::configuration(format!(
                    "parent chain of bone {} ({}) is cyclic",
                    bone.id, bone.name
                )));
            }
        }

        // 父骨骼必须先于子骨骼
        for bone in &self.bones {
            if !bone.is_root() && bone.parent > bone.id {
                return Err(RetargetError::configuration(format!(
                    "bone {} ({}) precedes its parent {}",
                    bone.id, bone.name, bone.parent
                )));
            }
        }

        // FK 放置：起点必须已放置，每个非根关节恰好被一根骨骼放置
        let mut placed = vec![false; jc];
        placed[self.root_joint] = true;
        for bone in &self.bones {
            if bone.is_root() && bone.start_joint != self.root_joint {
                return Err(RetargetError::configuration(format!(
                    "root bone {} ({}) must start at the root joint {}",
                    bone.id, bone.name, self.root_joint
                )));
            }
            if !placed[bone.start_joint] {
                return Err(RetargetError::configuration(format!(
                    "bone {} ({}) starts at joint {} which no earlier bone reaches",
                    bone.id, bone.name, bone.start_joint
                )));
            }
            if placed[bone.end_joint] {
                return Err(RetargetError::configuration(format!(
                    "joint {} is reached by more than one bone (bone {} {})",
                    bone.end_joint, bone.id, bone.name
                )));
            }
            placed[bone.end_joint] = true;
        }
        if let Some(joint) = placed.iter().position(|p| !p) {
            return Err(RetargetError::configuration(format!(
                "joint {joint} is not reached by any bone"
            )));
        }

        Ok(())
    }

    fn chain_terminates(&self, bone: usize) -> bool {
        let mut current = bone;
        for _ in 0..=self.bones.len() {
            let parent = self.bones[current].parent;
            if parent == current {
                return true;
            }
            current = parent;
        }
        false
    }

    fn build_children_cache(bones: &[BoneSpec]) -> Vec<Vec<usize>> {
        let mut cache = vec![Vec::new(); bones.len()];
        for bone in bones {
            if let Some(parent) = bone.parent_id() {
                cache[parent].push(bone.id);
            }
        }
        cache
    }
}

/// 父链迭代器
pub struct ParentChain<'a> {
    bones: &'a [BoneSpec],
    next: Option<usize>,
}

impl Iterator for ParentChain<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next?;
        let parent = self.bones[current].parent;
        self.next = (parent != current).then_some(parent);
        Some(current)
    }
}

// ============================================================================
// 构建器
// ============================================================================

/// 拓扑构建器
#[derive(Clone, Debug)]
pub struct TopologyBuilder {
    name: String,
    joint_count: usize,
    root_joint: usize,
    feet: Option<(usize, usize)>,
    bones: Vec<BoneSpec>,
    composition: ReferenceComposition,
    root_convention: RootConvention,
}

impl TopologyBuilder {
    pub fn new(name: impl Into<String>, joint_count: usize, root_joint: usize) -> Self {
        Self {
            name: name.into(),
            joint_count,
            root_joint,
            feet: None,
            bones: Vec::new(),
            composition: ReferenceComposition::PostInverse,
            root_convention: RootConvention::Global,
        }
    }

    /// 左右脚关节
    pub fn feet(mut self, left: usize, right: usize) -> Self {
        self.feet = Some((left, right));
        self
    }

    pub fn composition(mut self, composition: ReferenceComposition) -> Self {
        self.composition = composition;
        self
    }

    pub fn root_convention(mut self, convention: RootConvention) -> Self {
        self.root_convention = convention;
        self
    }

    /// 追加骨骼，索引为当前骨骼数；`parent` 为 None 表示根骨骼
    pub fn bone(
        mut self,
        name: impl Into<String>,
        start_joint: usize,
        end_joint: usize,
        parent: Option<usize>,
        role: AxisRole,
        reference: ReferenceVector,
    ) -> Self {
        let id = self.bones.len();
        self.bones.push(BoneSpec {
            name: name.into(),
            id,
            start_joint,
            end_joint,
            parent: parent.unwrap_or(id),
            role,
            reference,
        });
        self
    }

    /// 构建并校验
    pub fn build(self) -> Result<Topology> {
        let (left_foot, right_foot) = self.feet.ok_or_else(|| {
            RetargetError::configuration(format!("topology '{}' has no foot joints", self.name))
        })?;
        let children_cache = Topology::build_children_cache(&self.bones);
        let topology = Topology {
            name: self.name,
            joint_count: self.joint_count,
            root_joint: self.root_joint,
            left_foot,
            right_foot,
            bones: self.bones,
            composition: self.composition,
            root_convention: self.root_convention,
            children_cache,
        };
        topology.validate()?;
        Ok(topology)
    }
}
