// crates/md_mover/src/pattern.rs

//! 流场模式移动器
//!
//! 一个 `CurrentPattern` 独占一张三角网格流速场，负责：
//! - 每步准备：刷新不确定性表、重算参考缩放系数、缓存扩散系数
//! - 逐粒子：查询缩放后流速，不确定性粒子加扰动，积分为微度位移
//! - 步后：清零步内缓存
//!
//! 步内状态放在读写锁后面。`prepare_step` 是唯一写者，
//! 必须在任何并发 `get_move` 开始前完成。

use crate::context::SimulationContext;
use crate::error::MoverResult;
use crate::scale::{ScalePolicy, ScaleResolver};
use crate::timeseries::TimeSeriesScale;
use crate::traits::{LeRef, Mover, MoverKind};
use crate::uncertainty::{
    CurrentUncertaintyBuilder, StepCache, UncertaintyBuilder, UncertaintyEngine,
    UncertaintyTable,
};
use md_geo::{long_to_lat_ratio, Velocity, WorldPoint, WorldPoint3D, METERS_PER_DEGREE_LAT};
use md_mesh::VelocityGrid;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 步内可变状态
#[derive(Debug)]
struct PatternState {
    ref_scale: f64,
    /// 缩放系数至少计算过一次（失败也算）
    scale_resolved: bool,
    scale_error: bool,
    step: StepCache,
    uncertainty: Option<UncertaintyTable>,
}

impl Default for PatternState {
    fn default() -> Self {
        Self {
            ref_scale: 1.0,
            scale_resolved: false,
            scale_error: false,
            step: StepCache::default(),
            uncertainty: None,
        }
    }
}

/// 三角网格流场模式
pub struct CurrentPattern {
    name: String,
    grid: VelocityGrid,
    resolver: ScaleResolver,
    engine: UncertaintyEngine,
    time_dep: Option<Arc<dyn TimeSeriesScale>>,
    time_file_active: bool,
    on: bool,
    active_start: Option<f64>,
    active_stop: Option<f64>,
    state: RwLock<PatternState>,
    /// 正在按兄弟模式重算缩放系数（防止互相匹配时无限递归）
    resolving: AtomicBool,
    builder: Mutex<Box<dyn UncertaintyBuilder>>,
    rng: Mutex<StdRng>,
}

impl CurrentPattern {
    /// 由已加载的网格创建（不缩放、无涡扩散）
    pub fn new(name: impl Into<String>, grid: VelocityGrid) -> Self {
        Self {
            name: name.into(),
            grid,
            resolver: ScaleResolver::default(),
            engine: UncertaintyEngine::default(),
            time_dep: None,
            time_file_active: false,
            on: true,
            active_start: None,
            active_stop: None,
            state: RwLock::new(PatternState::default()),
            resolving: AtomicBool::new(false),
            builder: Mutex::new(Box::new(CurrentUncertaintyBuilder::default())),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// 从拓扑文件加载
    pub fn load<P: AsRef<Path>>(name: impl Into<String>, path: P) -> MoverResult<Self> {
        let name = name.into();
        let grid = md_mesh::TopologyLoader::load(path.as_ref())?;
        log::info!(
            "流场模式 '{}' 已加载: {} 个三角形",
            name,
            grid.topology().n_triangles()
        );
        Ok(Self::new(name, grid))
    }

    /// 设置缩放策略与参考点
    pub fn with_scale_policy(mut self, policy: ScalePolicy, ref_point: WorldPoint) -> Self {
        self.resolver = ScaleResolver::new(policy, ref_point);
        self
    }

    /// 设置涡扩散参数
    pub fn with_eddy(mut self, eddy_diffusion: f64, eddy_v0: f64) -> Self {
        self.engine = UncertaintyEngine::new(eddy_diffusion, eddy_v0);
        self
    }

    /// 附加时间缩放（并启用）
    pub fn with_time_series(mut self, time_dep: Arc<dyn TimeSeriesScale>) -> Self {
        self.time_dep = Some(time_dep);
        self.time_file_active = true;
        self
    }

    /// 替换不确定性表构建器
    pub fn with_uncertainty_builder(mut self, builder: Box<dyn UncertaintyBuilder>) -> Self {
        self.builder = Mutex::new(builder);
        self
    }

    /// 固定随机数种子
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// 设置生效时间范围 [s]
    pub fn with_active_range(mut self, start: Option<f64>, stop: Option<f64>) -> Self {
        self.active_start = start;
        self.active_stop = stop;
        self
    }

    /// 打开/关闭模式
    pub fn set_on(&mut self, on: bool) {
        self.on = on;
    }

    /// 启用/停用时间缩放
    pub fn set_time_file_active(&mut self, active: bool) {
        self.time_file_active = active;
    }

    /// 流速场
    pub fn grid(&self) -> &VelocityGrid {
        &self.grid
    }

    /// 缩放策略
    pub fn scale_policy(&self) -> &ScalePolicy {
        self.resolver.policy()
    }

    /// 扰动引擎
    pub fn engine(&self) -> &UncertaintyEngine {
        &self.engine
    }

    /// 当前参考缩放系数
    pub fn ref_scale(&self) -> f64 {
        self.state.read().ref_scale
    }

    /// 上次缩放计算是否失败
    pub fn scale_error(&self) -> bool {
        self.state.read().scale_error
    }

    /// 当前步内缓存
    pub fn step_cache(&self) -> StepCache {
        self.state.read().step
    }

    /// 本步是否有不确定性表
    pub fn has_uncertainty_table(&self) -> bool {
        self.state.read().uncertainty.is_some()
    }

    /// 模式是否打开
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// 时刻 `time` 是否生效
    pub fn is_active_at(&self, time: f64) -> bool {
        self.on
            && self.active_start.map_or(true, |s| time >= s)
            && self.active_stop.map_or(true, |e| time <= e)
    }

    /// 原始（未缩放）流速
    pub fn raw_velocity(&self, p: WorldPoint) -> MoverResult<Velocity> {
        Ok(self.grid.query(p)?)
    }

    /// 缩放后流速及是否启用涡扩散
    ///
    /// 涡扩散判据使用乘时间因子之前的流速：|V|² >= v0²。
    /// 未准备的模式在缩放系数从未计算过或策略为实时匹配时先重算，
    /// 兄弟模式因此总能取到完整缩放后的流速。
    pub fn scaled_velocity(
        &self,
        ctx: &SimulationContext<'_>,
        p: WorldPoint,
    ) -> MoverResult<(Velocity, bool)> {
        let (prepared, resolved) = {
            let state = self.state.read();
            (state.step.is_optimized_for_step, state.scale_resolved)
        };
        if !prepared && (!resolved || self.resolver.policy().is_live()) {
            if let Err(e) = self.update_scale(ctx) {
                log::debug!("流场模式 '{}' 实时缩放失败: {}", self.name, e);
            }
        }

        let time_value = self.time_value(ctx.clock.model_time);
        let raw = self.grid.query(p)?;
        let scaled = raw * self.state.read().ref_scale;

        let v0 = self.engine.eddy_v0();
        let use_eddy = scaled.length_squared() >= v0 * v0;

        // 量值只在 x 分量
        Ok((scaled * time_value.x, use_eddy))
    }

    /// 时间缩放因子，查询失败时量值为 0
    fn time_value(&self, time: f64) -> Velocity {
        match (&self.time_dep, self.time_file_active) {
            (Some(ts), true) => ts.time_value(time).unwrap_or_else(|e| {
                log::warn!("流场模式 '{}' 时间缩放查询失败: {}", self.name, e);
                Velocity::new(0.0, 1.0)
            }),
            _ => Velocity::new(1.0, 1.0),
        }
    }

    /// 重算参考缩放系数，失败时记为 0
    pub fn update_scale(&self, ctx: &SimulationContext<'_>) -> MoverResult<f64> {
        if let Some(factor) = self
            .time_dep
            .as_ref()
            .and_then(|ts| ts.hydrology_scale_factor())
        {
            let mut state = self.state.write();
            state.ref_scale = factor;
            state.scale_resolved = true;
            state.scale_error = false;
            return Ok(factor);
        }

        if self.resolving.swap(true, Ordering::AcqRel) {
            // 互相匹配时的重入，沿用当前值
            return Ok(self.state.read().ref_scale);
        }
        let result = self.resolver.compute(&self.grid, |name, p| {
            ctx.registry
                .find_current_pattern(name, Some(self))
                .map(|other| other.scaled_velocity(ctx, p).map(|(v, _)| v))
        });
        self.resolving.store(false, Ordering::Release);

        let mut state = self.state.write();
        state.scale_resolved = true;
        match &result {
            Ok(scale) => {
                state.ref_scale = *scale;
                state.scale_error = false;
            }
            Err(_) => {
                state.ref_scale = 0.0;
                state.scale_error = true;
            }
        }
        result
    }

    /// 不确定性粒子的速度扰动
    ///
    /// 本步没有不确定性表时速度不变；表中找不到记录时速度记为 0。
    fn add_uncertainty(
        &self,
        le: &LeRef,
        velocity: Velocity,
        time_step: f64,
        use_eddy: bool,
    ) -> Velocity {
        let state = self.state.read();
        let Some(table) = state.uncertainty.as_ref() else {
            return velocity;
        };
        let mut rng = self.rng.lock();
        match self.engine.perturb(
            Some(table),
            le,
            velocity,
            &state.step,
            time_step,
            use_eddy,
            &mut *rng,
        ) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("流场模式 '{}': {}", self.name, e);
                Velocity::ZERO
            }
        }
    }

    /// 测点流速诊断：(未缩放流速大小, 缩放后流速大小) [m/s]
    pub fn velocity_at(&self, p: WorldPoint) -> MoverResult<(f64, f64)> {
        let unscaled = self.grid.query(p)?.length();
        Ok((unscaled, self.ref_scale() * unscaled))
    }

    /// 批量计算粒子位移
    pub fn get_moves(
        &self,
        ctx: &SimulationContext<'_>,
        les: &[LeRef],
        time_step: f64,
    ) -> Vec<WorldPoint3D> {
        les.iter().map(|le| self.get_move(ctx, le, time_step)).collect()
    }

    /// 并行批量计算粒子位移
    ///
    /// 调用前 `prepare_step` 必须已完成。
    #[cfg(feature = "parallel")]
    pub fn get_moves_parallel(
        &self,
        ctx: &SimulationContext<'_>,
        les: &[LeRef],
        time_step: f64,
    ) -> Vec<WorldPoint3D> {
        use rayon::prelude::*;
        les.par_iter()
            .map(|le| self.get_move(ctx, le, time_step))
            .collect()
    }
}

impl std::fmt::Debug for CurrentPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentPattern")
            .field("name", &self.name)
            .field("policy", self.resolver.policy())
            .field("ref_scale", &self.ref_scale())
            .field("on", &self.on)
            .finish()
    }
}

impl Mover for CurrentPattern {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MoverKind {
        MoverKind::CurrentPattern
    }

    fn prepare_step(&self, ctx: &SimulationContext<'_>) -> MoverResult<()> {
        {
            let mut builder = self.builder.lock();
            let mut state = self.state.write();
            let mut rng = self.rng.lock();
            builder.refresh(ctx, &mut *rng, &mut state.uncertainty)?;
        }

        if let Err(e) = self.update_scale(ctx) {
            log::warn!(
                "流场模式 '{}' 在 t={} 缩放系数无法确定，本步贡献为零: {}",
                self.name,
                ctx.clock.model_time,
                e
            );
        }

        let mut state = self.state.write();
        state.step = StepCache {
            is_first_step_of_run: ctx.clock.is_first_step(),
            is_optimized_for_step: true,
            diffusion_value: self.engine.diffusion_value(ctx.clock.time_step),
        };
        Ok(())
    }

    fn get_move(&self, ctx: &SimulationContext<'_>, le: &LeRef, time_step: f64) -> WorldPoint3D {
        if !self.is_active_at(ctx.clock.model_time) {
            return WorldPoint3D::ZERO;
        }

        let (mut velocity, use_eddy) = match self.scaled_velocity(ctx, le.position) {
            Ok(v) => v,
            Err(e) => {
                log::trace!("流场模式 '{}' 粒子 {}: {}", self.name, le.le_index, e);
                return WorldPoint3D::ZERO;
            }
        };

        if le.is_uncertain() {
            velocity = self.add_uncertainty(le, velocity, time_step, use_eddy);
        }

        displacement(velocity, le.position, time_step)
    }

    fn step_done(&self) {
        self.state.write().step = StepCache::default();
    }

    fn as_current_pattern(&self) -> Option<&CurrentPattern> {
        Some(self)
    }
}

/// 流速 [m/s] 在 `time_step` 秒内对应的微度位移
pub fn displacement(velocity: Velocity, at: WorldPoint, time_step: f64) -> WorldPoint3D {
    let d_long = (velocity.x / METERS_PER_DEGREE_LAT * time_step) / long_to_lat_ratio(at.lat);
    let d_lat = velocity.y / METERS_PER_DEGREE_LAT * time_step;
    WorldPoint3D::from_degree_delta(d_long, d_lat)
}
