// crates/md_mover/src/lib.rs

//! MariDrift 流场模式移动器 (Layer 3)
//!
//! 把三角网格流速场换算成粒子每步的位移。
//!
//! # 模块
//!
//! - [`pattern`]: `CurrentPattern` 移动器，步内缓存与位移积分
//! - [`scale`]: 参考缩放系数（不缩放 / 目标流速 / 匹配其他模式）
//! - [`uncertainty`]: 顺流/横流扰动与涡扩散随机游走
//! - [`timeseries`]: 时间缩放序列
//! - [`registry`]: 按地图分组的移动器注册表
//! - [`context`]: 显式传递的模拟时钟与注册表
//!
//! # 步内调用顺序
//!
//! ```ignore
//! for mover in registry.movers() {
//!     mover.prepare_step(&ctx)?;
//! }
//! for le in &les {
//!     let delta = mover.get_move(&ctx, le, ctx.clock.time_step);
//! }
//! for mover in registry.movers() {
//!     mover.step_done();
//! }
//! ```
//!
//! # 特性
//!
//! - `parallel`: 启用 `CurrentPattern::get_moves_parallel`（rayon）

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod pattern;
pub mod registry;
pub mod scale;
pub mod timeseries;
pub mod traits;
pub mod uncertainty;

#[cfg(test)]
mod test_support;

pub use context::{SimulationClock, SimulationContext};
pub use error::{MoverError, MoverResult, ScaleUndefinedReason};
pub use pattern::{displacement, CurrentPattern};
pub use registry::{MapEntry, PatternRegistry};
pub use scale::{ScalePolicy, ScaleResolver};
pub use timeseries::{ExtrapolationMode, TimeSeries, TimeSeriesScale, TimeValueScale};
pub use traits::{LeKind, LeRef, Mover, MoverKind};
pub use uncertainty::{
    CurrentUncertaintyBuilder, StepCache, UncertaintyBuilder, UncertaintyEngine,
    UncertaintyParams, UncertaintyRecord, UncertaintyTable,
};
