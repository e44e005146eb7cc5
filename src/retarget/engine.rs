//! 重定向引擎
//!
//! 构建时一次性固定拓扑、旋转模式、配置和目标骨长，之后只读，可跨线程共享。
//! 每帧流程：
//! 1. 骨骼度量
//! 2. 世界旋转（退化骨骼沿用上一帧或单位旋转，并记录诊断）
//! 3. 局部旋转
//! 4. FK 重建（可选）
//! 5. 地面贴合（可选）

use std::sync::Arc;

use glam::{Quat, Vec3};
use rayon::prelude::*;

use super::fk::{BoneLengthTable, ForwardKinematics};
use super::ground::clamp_to_ground;
use super::local::compute_local_rotations;
use super::metrics::{compute_bone_metrics, BoneMetrics};
use super::orientation::{OrientationSolver, RotationMode};
use super::pose::{BoneDiagnostic, FallbackSource, Pose};
use crate::config::RetargetConfig;
use crate::error::DegenerateReason;
use crate::skeleton::Topology;
use crate::{RetargetError, Result};

/// 第 2 阶段的中间结果
struct SolvedFrame {
    metrics: Vec<BoneMetrics>,
    globals: Vec<Quat>,
    degenerate: Vec<(usize, DegenerateReason)>,
}

/// 重定向引擎（每个目标角色一个实例，拓扑可共享）
#[derive(Clone, Debug)]
pub struct RetargetEngine {
    topology: Arc<Topology>,
    config: RetargetConfig,
    solver: OrientationSolver,
    fk: ForwardKinematics,
    target_lengths: Option<BoneLengthTable>,
}

impl RetargetEngine {
    /// 创建引擎，所有配置错误在此返回
    pub fn new(
        topology: Arc<Topology>,
        mode: RotationMode,
        config: RetargetConfig,
        target_lengths: Option<BoneLengthTable>,
    ) -> Result<Self> {
        config.validate()?;

        if let Some(table) = &target_lengths {
            if table.len() != topology.bone_count() {
                return Err(RetargetError::configuration(format!(
                    "target bone-length table has {} entries, topology '{}' has {} bones",
                    table.len(),
                    topology.name(),
                    topology.bone_count()
                )));
            }
        } else if config.forward_kinematics() {
            return Err(RetargetError::configuration(
                "FORWARD_KINEMATICS requires a target bone-length table",
            ));
        }

        // 参考姿态与拓扑的一致性在 FK 构建时校验
        let fk = ForwardKinematics::new(topology.clone(), &mode, config.canonical_axis)?;
        let solver = OrientationSolver::new(&config, mode);

        if config.debug_log {
            log::info!(
                "[Retarget] 引擎创建: 拓扑={} ({} 关节, {} 骨骼), 模式={}, 阶段={:?}",
                topology.name(),
                topology.joint_count(),
                topology.bone_count(),
                match solver.mode() {
                    RotationMode::AbsoluteAlignment => "绝对对齐",
                    RotationMode::RelativeToReference(_) => "相对参考姿态",
                },
                config.features
            );
        }

        Ok(Self {
            topology,
            config,
            solver,
            fk,
            target_lengths,
        })
    }

    #[inline]
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    #[inline]
    pub fn config(&self) -> &RetargetConfig {
        &self.config
    }

    #[inline]
    pub fn mode(&self) -> &RotationMode {
        self.solver.mode()
    }

    #[inline]
    pub fn target_lengths(&self) -> Option<&BoneLengthTable> {
        self.target_lengths.as_ref()
    }

    /// 处理单帧
    ///
    /// `previous` 为上一帧结果，用于替代本帧退化的骨骼。
    pub fn process_frame(&self, frame: u32, positions: &[Vec3], previous: Option<&Pose>) -> Result<Pose> {
        let mut solved = self.solve_frame(positions)?;
        let previous = previous.map(Pose::global_rotations);
        let diagnostics = self.apply_fallback(frame, &mut solved, previous)?;
        self.finish(frame, positions, solved, diagnostics)
    }

    /// 批量处理整段动画，帧号从 0 开始
    ///
    /// 求解与后处理按帧并行；退化骨骼的上一帧替代按顺序进行。
    pub fn process_sequence<P>(&self, frames: &[P]) -> Result<Vec<Pose>>
    where
        P: AsRef<[Vec3]> + Sync,
    {
        if frames.is_empty() {
            return Err(RetargetError::EmptyInput("frame sequence"));
        }

        let mut solved = frames
            .par_iter()
            .map(|positions| self.solve_frame(positions.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut diagnostics = Vec::with_capacity(solved.len());
        for index in 0..solved.len() {
            let (done, rest) = solved.split_at_mut(index);
            let previous = done.last().map(|s| s.globals.as_slice());
            diagnostics.push(self.apply_fallback(index as u32, &mut rest[0], previous)?);
        }

        let degenerate_frames = diagnostics.iter().filter(|d| !d.is_empty()).count();
        log::debug!(
            "[Retarget] 批量处理 {} 帧，其中 {} 帧含退化骨骼",
            frames.len(),
            degenerate_frames
        );

        solved
            .into_par_iter()
            .zip(diagnostics.into_par_iter())
            .zip(frames.par_iter())
            .enumerate()
            .map(|(index, ((solved, diagnostics), positions))| {
                self.finish(index as u32, positions.as_ref(), solved, diagnostics)
            })
            .collect()
    }

    // ========================================
    // 内部阶段
    // ========================================

    fn solve_frame(&self, positions: &[Vec3]) -> Result<SolvedFrame> {
        let metrics = compute_bone_metrics(positions, &self.topology)?;

        let mut globals = Vec::with_capacity(metrics.len());
        let mut degenerate = Vec::new();
        for (bone, result) in self
            .solver
            .solve(&self.topology, &metrics, positions)?
            .into_iter()
            .enumerate()
        {
            match result {
                Ok(rotation) => globals.push(rotation),
                Err(RetargetError::DegenerateFrame { reason, .. }) => {
                    degenerate.push((bone, reason));
                    globals.push(Quat::IDENTITY);
                }
                Err(other) => return Err(other),
            }
        }

        Ok(SolvedFrame {
            metrics,
            globals,
            degenerate,
        })
    }

    fn apply_fallback(
        &self,
        frame: u32,
        solved: &mut SolvedFrame,
        previous: Option<&[Quat]>,
    ) -> Result<Vec<BoneDiagnostic>> {
        if let Some(previous) = previous {
            if previous.len() != self.topology.bone_count() {
                return Err(RetargetError::JointCountMismatch {
                    expected: self.topology.bone_count(),
                    actual: previous.len(),
                });
            }
        }

        let mut diagnostics = Vec::with_capacity(solved.degenerate.len());
        for &(bone, reason) in &solved.degenerate {
            let (rotation, fallback) = match previous {
                Some(previous) => (previous[bone], FallbackSource::PreviousFrame),
                None => (Quat::IDENTITY, FallbackSource::Identity),
            };
            solved.globals[bone] = rotation;

            let name = self
                .topology
                .bone(bone)
                .map(|b| b.name.clone())
                .unwrap_or_default();
            log::warn!(
                "[Retarget] 帧 {} 骨骼 {} ({}) 退化: {}，替代为 {:?}",
                frame,
                bone,
                name,
                reason,
                fallback
            );
            diagnostics.push(BoneDiagnostic {
                bone,
                name,
                reason,
                fallback,
            });
        }
        Ok(diagnostics)
    }

    fn finish(
        &self,
        frame: u32,
        positions: &[Vec3],
        solved: SolvedFrame,
        diagnostics: Vec<BoneDiagnostic>,
    ) -> Result<Pose> {
        let locals = compute_local_rotations(&solved.globals, &self.topology)?;

        let fk_positions = match (&self.target_lengths, self.config.forward_kinematics()) {
            (Some(table), true) => {
                let root = positions[self.topology.root_joint()];
                let reconstructed = self.fk.reconstruct(&locals, table.as_slice(), root)?;
                if self.config.ground_clamp() {
                    let (left, right) = self.topology.feet();
                    Some(clamp_to_ground(&reconstructed, left, right)?)
                } else {
                    Some(reconstructed)
                }
            }
            _ => None,
        };

        Ok(Pose::new(
            frame,
            positions.to_vec(),
            solved.metrics,
            solved.globals,
            locals,
            fk_positions,
            diagnostics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{joint, TopologyId};

    fn t_pose() -> Vec<Vec3> {
        let mut p = vec![Vec3::ZERO; 16];
        p[joint::PELVIS] = Vec3::new(0.0, 2.0, 0.0);
        p[joint::RIGHT_HIP] = Vec3::new(-1.0, 2.0, 0.0);
        p[joint::RIGHT_KNEE] = Vec3::new(-1.0, 1.0, 0.0);
        p[joint::RIGHT_ANKLE] = Vec3::new(-1.0, 0.0, 0.0);
        p[joint::LEFT_HIP] = Vec3::new(1.0, 2.0, 0.0);
        p[joint::LEFT_KNEE] = Vec3::new(1.0, 1.0, 0.0);
        p[joint::LEFT_ANKLE] = Vec3::new(1.0, 0.0, 0.0);
        p[joint::SPINE] = Vec3::new(0.0, 3.0, 0.0);
        p[joint::THORAX] = Vec3::new(0.0, 4.0, 0.0);
        p[joint::NECK] = Vec3::new(0.0, 5.0, 0.0);
        p[joint::RIGHT_SHOULDER] = Vec3::new(-1.0, 4.0, 0.0);
        p[joint::RIGHT_ELBOW] = Vec3::new(-2.0, 4.0, 0.0);
        p[joint::RIGHT_WRIST] = Vec3::new(-3.0, 4.0, 0.0);
        p[joint::LEFT_SHOULDER] = Vec3::new(1.0, 4.0, 0.0);
        p[joint::LEFT_ELBOW] = Vec3::new(2.0, 4.0, 0.0);
        p[joint::LEFT_WRIST] = Vec3::new(3.0, 4.0, 0.0);
        p
    }

    fn engine(config: RetargetConfig) -> RetargetEngine {
        let topology = Topology::shared(TopologyId::Mpii16).unwrap();
        let lengths = BoneLengthTable::new(&topology, vec![1.0; 15]).unwrap();
        RetargetEngine::new(topology, RotationMode::AbsoluteAlignment, config, Some(lengths)).unwrap()
    }

    #[test]
    fn test_pose_shapes() {
        let engine = engine(RetargetConfig::default().with_forward_kinematics());
        let pose = engine.process_frame(7, &t_pose(), None).unwrap();
        assert_eq!(pose.frame(), 7);
        assert_eq!(pose.bone_metrics().len(), 15);
        assert_eq!(pose.global_rotations().len(), 15);
        assert_eq!(pose.local_rotations().len(), 15);
        assert!(pose.is_clean());
        let fk = pose.fk_positions().unwrap();
        assert_eq!(fk[joint::PELVIS], t_pose()[joint::PELVIS]);
    }

    #[test]
    fn test_fk_disabled_has_no_positions() {
        let engine = engine(RetargetConfig::default());
        let pose = engine.process_frame(0, &t_pose(), None).unwrap();
        assert!(pose.fk_positions().is_none());
    }

    #[test]
    fn test_fk_requires_lengths() {
        let topology = Topology::shared(TopologyId::Mpii16).unwrap();
        let err = RetargetEngine::new(
            topology,
            RotationMode::AbsoluteAlignment,
            RetargetConfig::default().with_forward_kinematics(),
            None,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_degenerate_bone_uses_previous_frame() {
        let engine = engine(RetargetConfig::default());
        let first = engine.process_frame(0, &t_pose(), None).unwrap();

        // 右前臂长度为零
        let mut collapsed = t_pose();
        collapsed[joint::RIGHT_WRIST] = collapsed[joint::RIGHT_ELBOW];
        let second = engine.process_frame(1, &collapsed, Some(&first)).unwrap();

        let forearm = engine.topology().find_bone_by_name("right_forearm").unwrap();
        assert_eq!(second.diagnostics().len(), 1);
        let diagnostic = &second.diagnostics()[0];
        assert_eq!(diagnostic.bone, forearm);
        assert_eq!(diagnostic.reason, DegenerateReason::ZeroDirection);
        assert_eq!(diagnostic.fallback, FallbackSource::PreviousFrame);
        assert_eq!(second.global_rotations()[forearm], first.global_rotations()[forearm]);

        let third = engine.process_frame(2, &collapsed, None).unwrap();
        assert_eq!(third.diagnostics()[0].fallback, FallbackSource::Identity);
        assert_eq!(third.global_rotations()[forearm], Quat::IDENTITY);
    }

    #[test]
    fn test_empty_input_rejected() {
        let engine = engine(RetargetConfig::default());
        assert!(matches!(
            engine.process_frame(0, &[], None),
            Err(RetargetError::EmptyInput(_))
        ));
        let frames: Vec<Vec<Vec3>> = Vec::new();
        assert!(engine.process_sequence(&frames).is_err());
    }

    #[test]
    fn test_sequence_matches_sequential_processing() {
        let engine = engine(RetargetConfig::default().with_ground_clamp());
        let mut collapsed = t_pose();
        collapsed[joint::LEFT_WRIST] = collapsed[joint::LEFT_ELBOW];
        let frames = vec![t_pose(), collapsed.clone(), collapsed];

        let batch = engine.process_sequence(&frames).unwrap();

        let mut previous: Option<Pose> = None;
        for (index, positions) in frames.iter().enumerate() {
            let pose = engine
                .process_frame(index as u32, positions, previous.as_ref())
                .unwrap();
            assert_eq!(pose, batch[index]);
            previous = Some(pose);
        }
        assert_eq!(batch[2].diagnostics()[0].fallback, FallbackSource::PreviousFrame);
    }
}
