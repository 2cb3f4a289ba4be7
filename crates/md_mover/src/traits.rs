// crates/md_mover/src/traits.rs

//! 移动器接口
//!
//! 模拟驱动按以下顺序调用每个移动器：
//! 1. `prepare_step`：每步一次，刷新缓存与不确定性表
//! 2. `get_move`：每个粒子一次，可并发
//! 3. `step_done`：每步一次，清除步内缓存

use crate::context::SimulationContext;
use crate::error::MoverResult;
use crate::pattern::CurrentPattern;
use md_geo::{WorldPoint, WorldPoint3D};

/// 移动器类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoverKind {
    /// 三角网格流场模式，可被其他模式按名称匹配缩放
    CurrentPattern,
    /// 其他移动器，不参与名称匹配
    Other,
}

/// 粒子类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LeKind {
    /// 确定性预报粒子
    #[default]
    Forecast,
    /// 不确定性粒子
    Uncertainty,
}

/// 粒子引用
///
/// `set_index` 与 `le_index` 用于查找不确定性记录。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeRef {
    /// 粒子集索引
    pub set_index: usize,
    /// 集内粒子索引
    pub le_index: usize,
    /// 当前位置
    pub position: WorldPoint,
    /// 粒子类别
    pub kind: LeKind,
}

impl LeRef {
    /// 预报粒子
    pub fn forecast(le_index: usize, position: WorldPoint) -> Self {
        Self {
            set_index: 0,
            le_index,
            position,
            kind: LeKind::Forecast,
        }
    }

    /// 不确定性粒子
    pub fn uncertainty(set_index: usize, le_index: usize, position: WorldPoint) -> Self {
        Self {
            set_index,
            le_index,
            position,
            kind: LeKind::Uncertainty,
        }
    }

    /// 是否为不确定性粒子
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.kind == LeKind::Uncertainty
    }
}

/// 移动器 trait
///
/// 步内方法都取 `&self`，可变状态由实现者内部加锁管理，
/// 以便注册表中的兄弟模式在同一步中互相查询。
pub trait Mover: Send + Sync {
    /// 名称（同一注册表内用于匹配）
    fn name(&self) -> &str;

    /// 类别
    fn kind(&self) -> MoverKind;

    /// 步前准备
    fn prepare_step(&self, ctx: &SimulationContext<'_>) -> MoverResult<()>;

    /// 计算粒子在本步的位移
    fn get_move(&self, ctx: &SimulationContext<'_>, le: &LeRef, time_step: f64) -> WorldPoint3D;

    /// 步后清理
    fn step_done(&self);

    /// 向下转换为流场模式
    fn as_current_pattern(&self) -> Option<&CurrentPattern> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_ref_constructors() {
        let p = WorldPoint::new(1, 2);
        let f = LeRef::forecast(5, p);
        assert!(!f.is_uncertain());
        assert_eq!(f.set_index, 0);

        let u = LeRef::uncertainty(2, 7, p);
        assert!(u.is_uncertain());
        assert_eq!((u.set_index, u.le_index), (2, 7));
    }
}
