// crates/md_mover/src/scale.rs

//! 参考缩放系数
//!
//! 把网格原始流速换算成物理流速的标量。三种策略：
//!
//! - `None`: 系数恒为 1
//! - `ConstantTarget`: 参考点处流速大小缩放到目标值
//! - `MatchOther`: 参考点处流速大小与另一同名模式的缩放后流速一致，
//!   两者点积为负时系数取负
//!
//! 任何失败都把系数记为 0。

use crate::error::{MoverError, MoverResult, ScaleUndefinedReason};
use md_geo::{Velocity, WorldPoint};
use md_mesh::{MeshError, VelocityGrid};
use serde::{Deserialize, Serialize};

/// 缩放倍数上限
pub const MAX_REF_SCALE: f64 = 1.0e6;

/// 可归一化的最小原始流速 [m/s]
pub const MIN_UNSCALED_REF_LENGTH: f64 = 1.0e-5;

/// 缩放策略
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScalePolicy {
    /// 不缩放
    #[default]
    None,
    /// 参考点流速大小缩放到目标值 [m/s]
    ConstantTarget {
        /// 目标流速
        target: f64,
    },
    /// 与指定名称的模式匹配
    MatchOther {
        /// 被匹配模式的名称
        name: String,
    },
}

impl ScalePolicy {
    /// 是否需要在步内按查询重新计算
    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::MatchOther { .. })
    }
}

/// 参考缩放系数计算器
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScaleResolver {
    policy: ScalePolicy,
    ref_point: WorldPoint,
}

impl ScaleResolver {
    /// 创建计算器
    pub fn new(policy: ScalePolicy, ref_point: WorldPoint) -> Self {
        Self { policy, ref_point }
    }

    /// 缩放策略
    pub fn policy(&self) -> &ScalePolicy {
        &self.policy
    }

    /// 参考点
    pub fn ref_point(&self) -> WorldPoint {
        self.ref_point
    }

    /// 计算缩放系数
    ///
    /// `sibling` 仅在 `MatchOther` 策略下被调用，按名称和参考点返回
    /// 兄弟模式的缩放后流速；找不到同名模式时返回 `None`。
    pub fn compute<F>(&self, grid: &VelocityGrid, sibling: F) -> MoverResult<f64>
    where
        F: FnOnce(&str, WorldPoint) -> Option<MoverResult<Velocity>>,
    {
        match &self.policy {
            ScalePolicy::None => Ok(1.0),
            ScalePolicy::ConstantTarget { target } => {
                let mine = sample_reference(grid, self.ref_point)?;
                constant_scale(*target, mine)
            }
            ScalePolicy::MatchOther { name } => {
                let theirs = match sibling(name, self.ref_point) {
                    Some(Ok(v)) => v,
                    Some(Err(MoverError::Mesh(MeshError::OutOfMesh { .. }))) => {
                        return Err(MoverError::scale_undefined(
                            ScaleUndefinedReason::ReferenceOutOfMesh,
                        ))
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        return Err(MoverError::scale_undefined(
                            ScaleUndefinedReason::NoMatchingPattern { name: name.clone() },
                        ))
                    }
                };
                let mine = sample_reference(grid, self.ref_point)?;
                match_scale(mine, theirs)
            }
        }
    }
}

/// 参考点原始流速，网格外记为缩放失败
fn sample_reference(grid: &VelocityGrid, p: WorldPoint) -> MoverResult<Velocity> {
    grid.query(p).map_err(|e| match e {
        MeshError::OutOfMesh { .. } => {
            MoverError::scale_undefined(ScaleUndefinedReason::ReferenceOutOfMesh)
        }
        other => MoverError::Mesh(other),
    })
}

/// 目标流速对应的缩放系数
pub fn constant_scale(target: f64, mine: Velocity) -> MoverResult<f64> {
    let length = mine.length();
    if target.abs() > length * MAX_REF_SCALE {
        return Err(MoverError::scale_undefined(
            ScaleUndefinedReason::TargetUnreachable { target, length },
        ));
    }
    if length < MIN_UNSCALED_REF_LENGTH {
        return Err(MoverError::scale_undefined(
            ScaleUndefinedReason::ReferenceTooSmall { length },
        ));
    }
    Ok(target / length)
}

/// 与兄弟模式匹配的缩放系数（平方量级上检查范围）
pub fn match_scale(mine: Velocity, theirs: Velocity) -> MoverResult<f64> {
    let my_length_sq = mine.length_squared();
    let their_length_sq = theirs.length_squared();
    if their_length_sq > my_length_sq * MAX_REF_SCALE * MAX_REF_SCALE {
        return Err(MoverError::scale_undefined(
            ScaleUndefinedReason::TargetUnreachable {
                target: their_length_sq.sqrt(),
                length: my_length_sq.sqrt(),
            },
        ));
    }
    if my_length_sq < MIN_UNSCALED_REF_LENGTH * MIN_UNSCALED_REF_LENGTH {
        return Err(MoverError::scale_undefined(
            ScaleUndefinedReason::ReferenceTooSmall {
                length: my_length_sq.sqrt(),
            },
        ));
    }

    let scale = (their_length_sq / my_length_sq).sqrt();
    if mine.dot(theirs) < 0.0 {
        Ok(-scale)
    } else {
        Ok(scale)
    }
}
