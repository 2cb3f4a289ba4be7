// crates/md_mover/src/timeseries.rs

//! 时间序列缩放
//!
//! 流场模式可附带一条随时间变化的量值序列（如潮汐流速幅值），
//! 模式速度在每个查询时刻乘以该量值。支持：
//! - 线性插值
//! - 多种外推模式（截断、线性、循环、拒绝）
//! - 水文缩放因子（存在时直接作为参考缩放系数）
//!
//! # 使用示例
//!
//! ```ignore
//! use md_mover::timeseries::{ExtrapolationMode, TimeSeries, TimeValueScale};
//!
//! let series = TimeSeries::from_points(vec![(0.0, 0.0), (3600.0, 1.0)])?
//!     .with_extrapolation(ExtrapolationMode::Cyclic);
//! let scale = TimeValueScale::new(series);
//! let factor = scale.time_value(1800.0)?.x;  // ≈ 0.5
//! ```

use crate::error::{MoverError, MoverResult};
use md_geo::Velocity;
use serde::{Deserialize, Serialize};

/// 外推模式
///
/// 定义当查询时间超出数据范围时的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationMode {
    /// 截断模式：超出范围时返回边界值
    #[default]
    Clamp,

    /// 线性外推：使用边界斜率延伸
    Linear,

    /// 循环模式：周期性重复数据
    ///
    /// t -> t_start + (t - t_start) mod (t_end - t_start)
    Cyclic,

    /// 拒绝模式：超出范围视为查询失败
    Reject,
}

impl ExtrapolationMode {
    /// 获取模式名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clamp => "Clamp",
            Self::Linear => "Linear",
            Self::Cyclic => "Cyclic",
            Self::Reject => "Reject",
        }
    }
}

/// 时间序列数据
///
/// # 约束
///
/// - 时间数组必须严格单调递增
/// - 时间和值数组长度必须相等且非空
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// 时间点 [s]（严格单调递增）
    times: Vec<f64>,
    /// 对应的值
    values: Vec<f64>,
    /// 外推模式
    extrap_mode: ExtrapolationMode,
}

impl TimeSeries {
    /// 从时间和值数组创建时间序列
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> MoverResult<Self> {
        if times.len() != values.len() {
            return Err(MoverError::InvalidTimeSeries(format!(
                "时间点数 {} 与数值个数 {} 不一致",
                times.len(),
                values.len()
            )));
        }
        if times.is_empty() {
            return Err(MoverError::InvalidTimeSeries("时间序列为空".into()));
        }
        if let Some(i) = (1..times.len()).find(|&i| times[i] <= times[i - 1]) {
            return Err(MoverError::InvalidTimeSeries(format!(
                "时间必须严格递增: times[{}]={} <= times[{}]={}",
                i,
                times[i],
                i - 1,
                times[i - 1]
            )));
        }

        Ok(Self {
            times,
            values,
            extrap_mode: ExtrapolationMode::Clamp,
        })
    }

    /// 从 (时间, 值) 点对列表创建时间序列
    pub fn from_points(points: Vec<(f64, f64)>) -> MoverResult<Self> {
        let (times, values): (Vec<_>, Vec<_>) = points.into_iter().unzip();
        Self::new(times, values)
    }

    /// 设置外推模式
    pub fn with_extrapolation(mut self, mode: ExtrapolationMode) -> Self {
        self.extrap_mode = mode;
        self
    }

    /// 获取外推模式
    pub fn extrapolation_mode(&self) -> ExtrapolationMode {
        self.extrap_mode
    }

    /// 获取时间范围
    pub fn time_range(&self) -> (f64, f64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    /// 获取数据点数量
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// 获取指定时间的插值
    ///
    /// 拒绝模式下超出范围返回 `None`。
    pub fn get_value(&self, t: f64) -> Option<f64> {
        let (t_start, t_end) = self.time_range();
        if t < t_start || t > t_end {
            return self.extrapolate(t, t_start, t_end);
        }
        Some(self.interpolate_internal(t))
    }

    fn extrapolate(&self, t: f64, t_start: f64, t_end: f64) -> Option<f64> {
        let n = self.times.len();

        match self.extrap_mode {
            ExtrapolationMode::Reject => None,
            ExtrapolationMode::Clamp => Some(if t < t_start {
                self.values[0]
            } else {
                self.values[n - 1]
            }),
            ExtrapolationMode::Cyclic => {
                let duration = t_end - t_start;
                if duration < 1e-12 {
                    return Some(self.values[0]);
                }
                let offset = (t - t_start).rem_euclid(duration);
                Some(self.interpolate_internal(t_start + offset))
            }
            ExtrapolationMode::Linear => {
                if n < 2 {
                    return Some(self.values[0]);
                }
                let value = if t < t_start {
                    let slope = (self.values[1] - self.values[0]) / (self.times[1] - t_start);
                    self.values[0] + slope * (t - t_start)
                } else {
                    let slope =
                        (self.values[n - 1] - self.values[n - 2]) / (t_end - self.times[n - 2]);
                    self.values[n - 1] + slope * (t - t_end)
                };
                Some(value)
            }
        }
    }

    /// 内部插值（假设 t 在范围内）
    fn interpolate_internal(&self, t: f64) -> f64 {
        let n = self.times.len();
        // 第一个 times[i] > t 的位置
        let upper = self.times.partition_point(|&ti| ti <= t);
        if upper >= n {
            return self.values[n - 1];
        }
        if upper == 0 {
            return self.values[0];
        }

        let idx = upper - 1;
        let t0 = self.times[idx];
        let t1 = self.times[idx + 1];
        let v0 = self.values[idx];
        let v1 = self.values[idx + 1];
        v0 + (t - t0) / (t1 - t0) * (v1 - v0)
    }
}

// ============================================================
// 时间缩放接口
// ============================================================

/// 流场模式的时间缩放来源
///
/// 量值放在返回速度的 `x` 分量。
pub trait TimeSeriesScale: Send + Sync {
    /// 查询时刻 `time` 的量值
    fn time_value(&self, time: f64) -> MoverResult<Velocity>;

    /// 水文缩放因子，存在时取代参考缩放系数
    fn hydrology_scale_factor(&self) -> Option<f64> {
        None
    }
}

/// 基于时间序列的缩放
#[derive(Debug, Clone)]
pub struct TimeValueScale {
    series: TimeSeries,
    hydrology_factor: Option<f64>,
}

impl TimeValueScale {
    /// 创建时间缩放
    pub fn new(series: TimeSeries) -> Self {
        Self {
            series,
            hydrology_factor: None,
        }
    }

    /// 设置水文缩放因子
    pub fn with_hydrology_factor(mut self, factor: f64) -> Self {
        self.hydrology_factor = Some(factor);
        self
    }

    /// 底层时间序列
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }
}

impl TimeSeriesScale for TimeValueScale {
    fn time_value(&self, time: f64) -> MoverResult<Velocity> {
        match self.series.get_value(time) {
            Some(value) => Ok(Velocity::new(value, 0.0)),
            None => {
                let (t0, t1) = self.series.time_range();
                Err(MoverError::time_series_lookup(
                    time,
                    format!("超出数据范围 [{}, {}]", t0, t1),
                ))
            }
        }
    }

    fn hydrology_scale_factor(&self) -> Option<f64> {
        self.hydrology_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> TimeSeries {
        TimeSeries::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 0.5, 0.0]).unwrap()
    }

    #[test]
    fn test_interpolation() {
        let ts = ramp();
        assert!((ts.get_value(0.5).unwrap() - 0.5).abs() < 1e-12);
        assert!((ts.get_value(1.5).unwrap() - 0.75).abs() < 1e-12);
        assert!((ts.get_value(3.0).unwrap() - 0.0).abs() < 1e-12);
        assert!((ts.get_value(1.0).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp() {
        let ts = ramp();
        assert_eq!(ts.get_value(-5.0), Some(0.0));
        assert_eq!(ts.get_value(10.0), Some(0.0));
    }

    #[test]
    fn test_cyclic() {
        let ts = ramp().with_extrapolation(ExtrapolationMode::Cyclic);
        assert!((ts.get_value(4.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((ts.get_value(-1.5).unwrap() - 0.75).abs() < 1e-12);
        assert!((ts.get_value(-2.5).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_linear() {
        let ts = TimeSeries::new(vec![0.0, 1.0], vec![0.0, 2.0])
            .unwrap()
            .with_extrapolation(ExtrapolationMode::Linear);
        assert!((ts.get_value(2.0).unwrap() - 4.0).abs() < 1e-12);
        assert!((ts.get_value(-1.0).unwrap() + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_reject() {
        let ts = ramp().with_extrapolation(ExtrapolationMode::Reject);
        assert!(ts.get_value(3.5).is_none());
        assert!(ts.get_value(2.0).is_some());
    }

    #[test]
    fn test_invalid_series() {
        assert!(TimeSeries::new(vec![], vec![]).is_err());
        assert!(TimeSeries::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(TimeSeries::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_time_value_scale() {
        let scale = TimeValueScale::new(ramp().with_extrapolation(ExtrapolationMode::Reject));
        let v = scale.time_value(0.5).unwrap();
        assert!((v.x - 0.5).abs() < 1e-12);
        assert_eq!(v.y, 0.0);

        let err = scale.time_value(99.0).unwrap_err();
        assert!(matches!(err, MoverError::TimeSeriesLookupFailed { .. }));
        assert!(scale.hydrology_scale_factor().is_none());
    }

    #[test]
    fn test_hydrology_factor() {
        let scale = TimeValueScale::new(ramp()).with_hydrology_factor(2.5);
        assert_eq!(scale.hydrology_scale_factor(), Some(2.5));
    }
}
