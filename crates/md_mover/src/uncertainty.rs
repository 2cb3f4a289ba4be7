// crates/md_mover/src/uncertainty.rs

//! 流场不确定性
//!
//! 不确定性粒子的速度按顺流/横流分解加扰动，再叠加涡扩散随机游走：
//!
//! ```text
//! gamma = value · v0 / (|V| · (v0 + |V|))      (仅在启用涡扩散时)
//! alpha = downstream  + gamma · r1
//! beta  = crossstream + gamma · r2
//! u' = u(1 + alpha) + v·beta
//! v' = v(1 + alpha) - u·beta
//! ```
//!
//! 其中 `value = sqrt(6 · (D / 10⁴) / dt)`，D 单位 cm²/s。
//! 运行首步的 (r1, r2) 在单位圆盘内均匀采样，其后各分量独立取 U[-1, 1]。

use crate::context::SimulationContext;
use crate::error::{MoverError, MoverResult};
use crate::traits::LeRef;
use md_geo::Velocity;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// 低于此流速时顺流/横流分解无意义 [m/s]
pub const MIN_DECOMPOSABLE_SPEED: f64 = 1.0e-6;

/// 默认涡扩散基准流速 [m/s]
pub const DEFAULT_EDDY_V0: f64 = 0.1;

// ============================================================
// 步内缓存
// ============================================================

/// 单步缓存
///
/// 由 `prepare_step` 写入，`step_done` 清零。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepCache {
    /// 是否为运行首步
    pub is_first_step_of_run: bool,
    /// 本步是否已准备
    pub is_optimized_for_step: bool,
    /// 本步扩散系数 [m/s]
    pub diffusion_value: f64,
}

// ============================================================
// 不确定性表
// ============================================================

/// 单个粒子的不确定性记录
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UncertaintyRecord {
    /// 顺流扰动系数
    pub downstream: f64,
    /// 横流扰动系数
    pub crossstream: f64,
}

impl UncertaintyRecord {
    /// 创建记录
    pub const fn new(downstream: f64, crossstream: f64) -> Self {
        Self {
            downstream,
            crossstream,
        }
    }
}

/// 按粒子集分段存储的不确定性记录
#[derive(Debug, Clone, PartialEq)]
pub struct UncertaintyTable {
    set_sizes: Vec<usize>,
    set_offsets: Vec<usize>,
    records: Vec<UncertaintyRecord>,
}

impl UncertaintyTable {
    /// 由各粒子集大小和扁平记录创建
    pub fn new(set_sizes: &[usize], records: Vec<UncertaintyRecord>) -> MoverResult<Self> {
        let total: usize = set_sizes.iter().sum();
        if total != records.len() {
            return Err(MoverError::UncertaintyBuild(format!(
                "记录数 {} 与粒子总数 {} 不一致",
                records.len(),
                total
            )));
        }

        let mut set_offsets = Vec::with_capacity(set_sizes.len());
        let mut offset = 0;
        for &size in set_sizes {
            set_offsets.push(offset);
            offset += size;
        }

        Ok(Self {
            set_sizes: set_sizes.to_vec(),
            set_offsets,
            records,
        })
    }

    /// 各集合填充同一记录
    pub fn filled(set_sizes: &[usize], record: UncertaintyRecord) -> Self {
        let total: usize = set_sizes.iter().sum();
        let mut set_offsets = Vec::with_capacity(set_sizes.len());
        let mut offset = 0;
        for &size in set_sizes {
            set_offsets.push(offset);
            offset += size;
        }
        Self {
            set_sizes: set_sizes.to_vec(),
            set_offsets,
            records: vec![record; total],
        }
    }

    /// 查找粒子记录
    pub fn record(&self, set_index: usize, le_index: usize) -> Option<&UncertaintyRecord> {
        let size = *self.set_sizes.get(set_index)?;
        if le_index >= size {
            return None;
        }
        self.records.get(self.set_offsets[set_index] + le_index)
    }

    /// 粒子集划分是否与给定大小一致
    pub fn matches_sizes(&self, set_sizes: &[usize]) -> bool {
        self.set_sizes == set_sizes
    }

    /// 记录总数
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否没有记录
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 全部记录
    pub fn records(&self) -> &[UncertaintyRecord] {
        &self.records
    }
}

// ============================================================
// 扰动引擎
// ============================================================

/// 不确定性扰动引擎
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UncertaintyEngine {
    /// 涡扩散系数 [cm²/s]
    eddy_diffusion: f64,
    /// 涡扩散基准流速 [m/s]
    eddy_v0: f64,
}

impl Default for UncertaintyEngine {
    fn default() -> Self {
        Self {
            eddy_diffusion: 0.0,
            eddy_v0: DEFAULT_EDDY_V0,
        }
    }
}

impl UncertaintyEngine {
    /// 创建引擎
    pub fn new(eddy_diffusion: f64, eddy_v0: f64) -> Self {
        Self {
            eddy_diffusion,
            eddy_v0,
        }
    }

    /// 涡扩散系数 [cm²/s]
    pub fn eddy_diffusion(&self) -> f64 {
        self.eddy_diffusion
    }

    /// 涡扩散基准流速 [m/s]
    pub fn eddy_v0(&self) -> f64 {
        self.eddy_v0
    }

    /// 扩散系数 [m/s]
    ///
    /// 已除以时间步长，位移积分时会再乘回。
    pub fn diffusion_value(&self, time_step: f64) -> f64 {
        (6.0 * (self.eddy_diffusion / 10_000.0) / time_step).sqrt()
    }

    /// 对不确定性粒子的速度加扰动
    #[allow(clippy::too_many_arguments)]
    pub fn perturb<R: Rng + ?Sized>(
        &self,
        table: Option<&UncertaintyTable>,
        le: &LeRef,
        velocity: Velocity,
        step: &StepCache,
        time_step: f64,
        use_eddy: bool,
        rng: &mut R,
    ) -> MoverResult<Velocity> {
        let record = table
            .and_then(|t| t.record(le.set_index, le.le_index))
            .ok_or(MoverError::UncertaintyTableMissing {
                set_index: le.set_index,
                le_index: le.le_index,
            })?;

        let (rand1, rand2) = if use_eddy {
            if step.is_first_step_of_run {
                random_in_unit_disk(rng)
            } else {
                (rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0))
            }
        } else {
            (0.0, 0.0)
        };

        let value = if step.is_optimized_for_step {
            step.diffusion_value
        } else {
            self.diffusion_value(time_step)
        };

        let speed = velocity.length();
        if speed > MIN_DECOMPOSABLE_SPEED {
            let v0 = self.eddy_v0;
            let gamma = if use_eddy {
                value * v0 / (speed * (v0 + speed))
            } else {
                0.0
            };
            let alpha = record.downstream + gamma * rand1;
            let beta = record.crossstream + gamma * rand2;
            let (u, v) = (velocity.x, velocity.y);
            Ok(Velocity::new(
                u * (1.0 + alpha) + v * beta,
                v * (1.0 + alpha) - u * beta,
            ))
        } else if use_eddy {
            Ok(Velocity::new(value * rand1, value * rand2))
        } else {
            Ok(velocity)
        }
    }
}

/// 单位圆盘内均匀采样（拒绝采样）
fn random_in_unit_disk<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    loop {
        let x: f64 = rng.gen_range(-1.0..=1.0);
        let y: f64 = rng.gen_range(-1.0..=1.0);
        if x * x + y * y <= 1.0 {
            return (x, y);
        }
    }
}

// ============================================================
// 不确定性表构建
// ============================================================

/// 不确定性表构建器
///
/// 每步准备时调用。把 `table` 置为 `None` 表示本步不加不确定性。
pub trait UncertaintyBuilder: Send {
    /// 按当前时刻刷新不确定性表
    fn refresh(
        &mut self,
        ctx: &SimulationContext<'_>,
        rng: &mut dyn RngCore,
        table: &mut Option<UncertaintyTable>,
    ) -> MoverResult<()>;
}

/// 流场不确定性参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyParams {
    /// 记录重新抽样周期 [s]
    pub duration: f64,
    /// 运行开始后多久启用 [s]
    pub start_delay: f64,
    /// 顺流系数上限
    pub up: f64,
    /// 顺流系数下限
    pub down: f64,
    /// 横流系数下限
    pub left: f64,
    /// 横流系数上限
    pub right: f64,
}

impl Default for UncertaintyParams {
    fn default() -> Self {
        Self {
            duration: 48.0 * 3600.0,
            start_delay: 0.0,
            up: 0.3,
            down: -0.3,
            left: -0.1,
            right: 0.1,
        }
    }
}

impl UncertaintyParams {
    /// 检查参数
    pub fn validate(&self) -> MoverResult<()> {
        if self.duration.is_nan() || self.duration <= 0.0 {
            return Err(MoverError::UncertaintyBuild(format!(
                "重新抽样周期必须为正: {}",
                self.duration
            )));
        }
        if self.start_delay.is_nan() || self.start_delay < 0.0 {
            return Err(MoverError::UncertaintyBuild(format!(
                "启用延迟不能为负: {}",
                self.start_delay
            )));
        }
        let finite = [self.up, self.down, self.left, self.right]
            .iter()
            .all(|x| x.is_finite());
        if !finite {
            return Err(MoverError::UncertaintyBuild("扰动范围必须为有限值".into()));
        }
        Ok(())
    }
}

/// 默认的流场不确定性表构建器
///
/// 运行不含不确定性粒子或尚未到启用时刻时不提供表；
/// 否则每隔 `duration` 秒（或粒子集划分变化时）重新抽样全部记录：
/// 顺流系数取 U[down, up]，横流系数取 U[left, right]。
#[derive(Debug, Clone)]
pub struct CurrentUncertaintyBuilder {
    params: UncertaintyParams,
    last_drawn: Option<f64>,
}

impl CurrentUncertaintyBuilder {
    /// 创建构建器
    pub fn new(params: UncertaintyParams) -> MoverResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            last_drawn: None,
        })
    }

    /// 参数
    pub fn params(&self) -> &UncertaintyParams {
        &self.params
    }

    fn draw(&self, set_sizes: &[usize], rng: &mut dyn RngCore) -> MoverResult<UncertaintyTable> {
        let p = &self.params;
        let (down, up) = (p.down.min(p.up), p.down.max(p.up));
        let (left, right) = (p.left.min(p.right), p.left.max(p.right));
        let total: usize = set_sizes.iter().sum();
        let records = (0..total)
            .map(|_| {
                UncertaintyRecord::new(rng.gen_range(down..=up), rng.gen_range(left..=right))
            })
            .collect();
        UncertaintyTable::new(set_sizes, records)
    }
}

impl Default for CurrentUncertaintyBuilder {
    fn default() -> Self {
        Self {
            params: UncertaintyParams::default(),
            last_drawn: None,
        }
    }
}

impl UncertaintyBuilder for CurrentUncertaintyBuilder {
    fn refresh(
        &mut self,
        ctx: &SimulationContext<'_>,
        rng: &mut dyn RngCore,
        table: &mut Option<UncertaintyTable>,
    ) -> MoverResult<()> {
        let sizes = ctx.uncertain_set_sizes;
        if !ctx.uncertain || sizes.is_empty() || ctx.clock.elapsed() < self.params.start_delay {
            *table = None;
            self.last_drawn = None;
            return Ok(());
        }

        let now = ctx.clock.model_time;
        let expired = match self.last_drawn {
            None => true,
            Some(t) => now < t || now - t >= self.params.duration,
        };
        let resized = table.as_ref().map_or(true, |t| !t.matches_sizes(sizes));

        if expired || resized {
            *table = Some(self.draw(sizes, rng)?);
            self.last_drawn = Some(now);
            log::debug!(
                "t={} 重新抽样不确定性记录 ({} 个粒子集)",
                now,
                sizes.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimulationClock;
    use crate::registry::PatternRegistry;
    use md_geo::WorldPoint;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn le(set: usize, idx: usize) -> LeRef {
        LeRef::uncertainty(set, idx, WorldPoint::new(0, 0))
    }

    fn prepared(first: bool, value: f64) -> StepCache {
        StepCache {
            is_first_step_of_run: first,
            is_optimized_for_step: true,
            diffusion_value: value,
        }
    }

    #[test]
    fn test_table_lookup() {
        let records = (0..5)
            .map(|i| UncertaintyRecord::new(i as f64, 0.0))
            .collect();
        let table = UncertaintyTable::new(&[2, 3], records).unwrap();
        assert_eq!(table.record(1, 0).unwrap().downstream, 2.0);
        assert_eq!(table.record(1, 2).unwrap().downstream, 4.0);
        assert!(table.record(0, 2).is_none());
        assert!(table.record(2, 0).is_none());
        assert!(UncertaintyTable::new(&[2, 3], vec![]).is_err());
    }

    #[test]
    fn test_diffusion_value() {
        let engine = UncertaintyEngine::new(1.0e5, 0.1);
        let expected = (6.0 * 10.0 / 900.0_f64).sqrt();
        assert!((engine.diffusion_value(900.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_table() {
        let engine = UncertaintyEngine::default();
        let mut rng = StdRng::seed_from_u64(1);
        let err = engine
            .perturb(
                None,
                &le(0, 0),
                Velocity::new(1.0, 0.0),
                &prepared(false, 0.0),
                60.0,
                true,
                &mut rng,
            )
            .unwrap_err();
        assert!(matches!(err, MoverError::UncertaintyTableMissing { .. }));
    }

    #[test]
    fn test_no_eddy_leaves_velocity_unchanged() {
        let engine = UncertaintyEngine::new(1.0e5, 0.1);
        let table = UncertaintyTable::filled(&[4], UncertaintyRecord::default());
        let mut rng = StdRng::seed_from_u64(7);
        for v in [Velocity::new(0.3, -0.2), Velocity::new(2.0e-6, 0.0)] {
            let out = engine
                .perturb(Some(&table), &le(0, 3), v, &prepared(false, 5.0), 60.0, false, &mut rng)
                .unwrap();
            assert_eq!(out, v);
        }
    }

    #[test]
    fn test_downstream_crossstream_rotation() {
        let engine = UncertaintyEngine::new(0.0, 0.1);
        let table = UncertaintyTable::filled(&[1], UncertaintyRecord::new(0.2, 0.1));
        let mut rng = StdRng::seed_from_u64(3);
        let out = engine
            .perturb(
                Some(&table),
                &le(0, 0),
                Velocity::new(1.0, 0.0),
                &prepared(false, 0.0),
                60.0,
                false,
                &mut rng,
            )
            .unwrap();
        assert!((out.x - 1.2).abs() < 1e-12);
        assert!((out.y + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_slow_flow_is_pure_diffusion() {
        let engine = UncertaintyEngine::new(1.0e4, 0.1);
        let table = UncertaintyTable::filled(&[1], UncertaintyRecord::new(0.3, 0.1));
        let value = 2.0;
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let out = engine
                .perturb(
                    Some(&table),
                    &le(0, 0),
                    Velocity::ZERO,
                    &prepared(true, value),
                    60.0,
                    true,
                    &mut rng,
                )
                .unwrap();
            // 首步在圆盘内采样
            assert!(out.length() <= value + 1e-12);
        }
    }

    #[test]
    fn test_slow_flow_ignores_record() {
        let engine = UncertaintyEngine::new(1.0e4, 0.1);
        let calm = UncertaintyTable::filled(&[1], UncertaintyRecord::new(0.0, 0.0));
        let strong = UncertaintyTable::filled(&[1], UncertaintyRecord::new(0.9, -0.7));
        let value = 2.0;
        let step = prepared(false, value);
        let perturb = |table: &UncertaintyTable, seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            engine
                .perturb(Some(table), &le(0, 0), Velocity::ZERO, &step, 60.0, true, &mut rng)
                .unwrap()
        };

        for seed in 0..20 {
            let a = perturb(&calm, seed);
            let b = perturb(&strong, seed);
            assert_eq!(a, b);

            let mut rng = StdRng::seed_from_u64(seed);
            let r1: f64 = rng.gen_range(-1.0..=1.0);
            let r2: f64 = rng.gen_range(-1.0..=1.0);
            assert_eq!(a, Velocity::new(value * r1, value * r2));
        }
    }

    #[test]
    fn test_later_steps_sample_square() {
        let engine = UncertaintyEngine::new(1.0e4, 0.1);
        let table = UncertaintyTable::filled(&[1], UncertaintyRecord::default());
        let mut rng = StdRng::seed_from_u64(5);
        let mut outside_disk = 0;
        for _ in 0..500 {
            let out = engine
                .perturb(
                    Some(&table),
                    &le(0, 0),
                    Velocity::ZERO,
                    &prepared(false, 1.0),
                    60.0,
                    true,
                    &mut rng,
                )
                .unwrap();
            assert!(out.x.abs() <= 1.0 && out.y.abs() <= 1.0);
            if out.length() > 1.0 {
                outside_disk += 1;
            }
        }
        // 正方形采样约 21% 落在圆盘外
        assert!(outside_disk > 0);
    }

    #[test]
    fn test_builder_lifecycle() {
        let registry = PatternRegistry::new();
        let sizes = [3, 2];
        let params = UncertaintyParams {
            duration: 3600.0,
            start_delay: 600.0,
            ..UncertaintyParams::default()
        };
        let mut builder = CurrentUncertaintyBuilder::new(params).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut table = None;

        let mut clock = SimulationClock::new(0.0, 600.0);
        let ctx = SimulationContext::new(clock, &registry).with_uncertainty(&sizes);
        builder.refresh(&ctx, &mut rng, &mut table).unwrap();
        assert!(table.is_none(), "启用延迟之前不应有表");

        clock.advance();
        let ctx = SimulationContext::new(clock, &registry).with_uncertainty(&sizes);
        builder.refresh(&ctx, &mut rng, &mut table).unwrap();
        let first = table.clone().unwrap();
        assert_eq!(first.len(), 5);
        for r in first.records() {
            assert!((-0.3..=0.3).contains(&r.downstream));
            assert!((-0.1..=0.1).contains(&r.crossstream));
        }

        clock.advance();
        let ctx = SimulationContext::new(clock, &registry).with_uncertainty(&sizes);
        builder.refresh(&ctx, &mut rng, &mut table).unwrap();
        assert_eq!(table.as_ref(), Some(&first), "周期内记录保持不变");

        for _ in 0..6 {
            clock.advance();
        }
        let ctx = SimulationContext::new(clock, &registry).with_uncertainty(&sizes);
        builder.refresh(&ctx, &mut rng, &mut table).unwrap();
        assert_ne!(table.as_ref(), Some(&first), "超过周期后重新抽样");

        let ctx = SimulationContext::new(clock, &registry);
        builder.refresh(&ctx, &mut rng, &mut table).unwrap();
        assert!(table.is_none());
    }

    #[test]
    fn test_invalid_params() {
        let params = UncertaintyParams {
            duration: 0.0,
            ..UncertaintyParams::default()
        };
        assert!(CurrentUncertaintyBuilder::new(params).is_err());

        for start_delay in [f64::NAN, -1.0] {
            let params = UncertaintyParams {
                start_delay,
                ..UncertaintyParams::default()
            };
            assert!(params.validate().is_err());
            assert!(CurrentUncertaintyBuilder::new(params).is_err());
        }
    }
}
