// crates/md_mover/src/context.rs

//! 模拟上下文
//!
//! 显式传递给每个步内调用的模拟时钟与流场模式注册表，
//! 取代对全局模型对象的访问。

use crate::registry::PatternRegistry;

/// 模拟时钟
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    /// 当前模型时间 [s]
    pub model_time: f64,
    /// 运行起始时间 [s]
    pub start_time: f64,
    /// 时间步长 [s]
    pub time_step: f64,
}

impl SimulationClock {
    /// 创建位于起始时刻的时钟
    pub fn new(start_time: f64, time_step: f64) -> Self {
        Self {
            model_time: start_time,
            start_time,
            time_step,
        }
    }

    /// 是否为运行的第一步
    #[inline]
    pub fn is_first_step(&self) -> bool {
        self.model_time == self.start_time
    }

    /// 已运行时长 [s]
    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.model_time - self.start_time
    }

    /// 前进一个时间步
    pub fn advance(&mut self) {
        self.model_time += self.time_step;
    }
}

/// 步内调用上下文
#[derive(Clone, Copy)]
pub struct SimulationContext<'a> {
    /// 模拟时钟
    pub clock: SimulationClock,
    /// 所有地图下的流场模式
    pub registry: &'a PatternRegistry,
    /// 本次运行是否包含不确定性粒子
    pub uncertain: bool,
    /// 各不确定性粒子集的粒子数量
    pub uncertain_set_sizes: &'a [usize],
}

impl<'a> SimulationContext<'a> {
    /// 创建上下文（无不确定性粒子）
    pub fn new(clock: SimulationClock, registry: &'a PatternRegistry) -> Self {
        Self {
            clock,
            registry,
            uncertain: false,
            uncertain_set_sizes: &[],
        }
    }

    /// 附加不确定性粒子集
    pub fn with_uncertainty(mut self, set_sizes: &'a [usize]) -> Self {
        self.uncertain = true;
        self.uncertain_set_sizes = set_sizes;
        self
    }
}
