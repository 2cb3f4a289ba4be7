// crates/md_config/src/run_config.rs

//! RunConfig - 漂移模拟运行配置
//!
//! 描述一次运行所需的全部输入：时钟、初始粒子位置、地图及其流场模式。
//! 拓扑文件的相对路径相对于配置文件所在目录解析。

use md_geo::WorldPoint;
use md_mover::{ExtrapolationMode, ScalePolicy, TimeSeries, TimeValueScale, UncertaintyParams};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// 运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// 起始时间 [s]
    #[serde(default)]
    pub start_time: f64,

    /// 运行时长 [s]
    #[serde(default = "default_duration")]
    pub duration: f64,

    /// 时间步长 [s]
    #[serde(default = "default_time_step")]
    pub time_step: f64,

    /// 是否计算不确定性粒子
    #[serde(default)]
    pub uncertain: bool,

    /// 随机数种子（缺省时取系统熵）
    #[serde(default)]
    pub seed: Option<u64>,

    /// 初始粒子位置 [经度, 纬度]（度）
    #[serde(default)]
    pub particles: Vec<[f64; 2]>,

    /// 地图
    #[serde(default)]
    pub maps: Vec<MapConfig>,
}

fn default_duration() -> f64 { 24.0 * 3600.0 }
fn default_time_step() -> f64 { 900.0 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            duration: default_duration(),
            time_step: default_time_step(),
            uncertain: false,
            seed: None,
            particles: Vec::new(),
            maps: Vec::new(),
        }
    }
}

/// 地图配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MapConfig {
    /// 地图名称
    pub name: String,

    /// 流场模式
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
}

/// 流场模式配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// 模式名称（缩放匹配时按此名称查找）
    pub name: String,

    /// 拓扑文件路径
    pub topology_file: PathBuf,

    /// 缩放策略
    #[serde(default)]
    pub scale: ScaleConfig,

    /// 涡扩散系数 [cm²/s]
    #[serde(default)]
    pub eddy_diffusion: f64,

    /// 涡扩散基准流速 [m/s]
    #[serde(default = "default_eddy_v0")]
    pub eddy_v0: f64,

    /// 不确定性参数
    #[serde(default)]
    pub uncertainty: UncertaintyConfig,

    /// 时间缩放序列
    #[serde(default)]
    pub time_series: Option<TimeSeriesConfig>,

    /// 是否打开
    #[serde(default = "default_on")]
    pub on: bool,

    /// 生效起始时间 [s]
    #[serde(default)]
    pub active_start: Option<f64>,

    /// 生效结束时间 [s]
    #[serde(default)]
    pub active_stop: Option<f64>,
}

fn default_eddy_v0() -> f64 { 0.1 }
fn default_on() -> bool { true }

/// 缩放策略配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScaleConfig {
    /// 不缩放
    #[default]
    None,
    /// 参考点流速缩放到目标值
    Constant {
        /// 目标流速 [m/s]
        value: f64,
        /// 参考点 [经度, 纬度]
        ref_point: [f64; 2],
    },
    /// 与另一模式匹配
    OtherGrid {
        /// 被匹配模式名称
        name: String,
        /// 参考点 [经度, 纬度]
        ref_point: [f64; 2],
    },
}

impl ScaleConfig {
    /// 转换为缩放策略与参考点
    pub fn to_policy(&self) -> (ScalePolicy, WorldPoint) {
        match self {
            Self::None => (ScalePolicy::None, WorldPoint::default()),
            Self::Constant { value, ref_point } => (
                ScalePolicy::ConstantTarget { target: *value },
                WorldPoint::from_degrees(ref_point[0], ref_point[1]),
            ),
            Self::OtherGrid { name, ref_point } => (
                ScalePolicy::MatchOther { name: name.clone() },
                WorldPoint::from_degrees(ref_point[0], ref_point[1]),
            ),
        }
    }

    fn ref_point(&self) -> Option<[f64; 2]> {
        match self {
            Self::None => None,
            Self::Constant { ref_point, .. } | Self::OtherGrid { ref_point, .. } => {
                Some(*ref_point)
            }
        }
    }
}

/// 不确定性参数配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyConfig {
    /// 重新抽样周期 [s]
    #[serde(default = "default_uncertainty_duration")]
    pub duration: f64,

    /// 启用延迟 [s]
    #[serde(default)]
    pub start_delay: f64,

    /// 顺流系数上限
    #[serde(default = "default_up")]
    pub up: f64,

    /// 顺流系数下限
    #[serde(default = "default_down")]
    pub down: f64,

    /// 横流系数下限
    #[serde(default = "default_left")]
    pub left: f64,

    /// 横流系数上限
    #[serde(default = "default_right")]
    pub right: f64,
}

fn default_uncertainty_duration() -> f64 { 48.0 * 3600.0 }
fn default_up() -> f64 { 0.3 }
fn default_down() -> f64 { -0.3 }
fn default_left() -> f64 { -0.1 }
fn default_right() -> f64 { 0.1 }

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            duration: default_uncertainty_duration(),
            start_delay: 0.0,
            up: default_up(),
            down: default_down(),
            left: default_left(),
            right: default_right(),
        }
    }
}

impl UncertaintyConfig {
    /// 转换为移动器参数
    pub fn to_params(&self) -> UncertaintyParams {
        UncertaintyParams {
            duration: self.duration,
            start_delay: self.start_delay,
            up: self.up,
            down: self.down,
            left: self.left,
            right: self.right,
        }
    }
}

/// 时间缩放序列配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesConfig {
    /// (时间 [s], 量值) 点
    pub points: Vec<[f64; 2]>,

    /// 外推模式
    #[serde(default)]
    pub extrapolation: ExtrapolationMode,

    /// 水文缩放因子
    #[serde(default)]
    pub hydrology_factor: Option<f64>,

    /// 是否启用（停用时保留序列但不参与缩放）
    #[serde(default = "default_on")]
    pub active: bool,
}

impl TimeSeriesConfig {
    /// 构建时间缩放
    pub fn build(&self) -> Result<TimeValueScale, ConfigError> {
        let points = self.points.iter().map(|p| (p[0], p[1])).collect();
        let series = TimeSeries::from_points(points)
            .map_err(|e| ConfigError::invalid("time_series.points", self.points.len(), e.to_string()))?
            .with_extrapolation(self.extrapolation);
        let scale = TimeValueScale::new(series);
        Ok(match self.hydrology_factor {
            Some(f) => scale.with_hydrology_factor(f),
            None => scale,
        })
    }
}

impl PatternConfig {
    /// 创建只含必填项的模式配置
    pub fn new(name: impl Into<String>, topology_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            topology_file: topology_file.into(),
            scale: ScaleConfig::default(),
            eddy_diffusion: 0.0,
            eddy_v0: default_eddy_v0(),
            uncertainty: UncertaintyConfig::default(),
            time_series: None,
            on: default_on(),
            active_start: None,
            active_stop: None,
        }
    }

    /// 相对 `base_dir` 解析拓扑文件路径
    pub fn resolved_topology(&self, base_dir: &Path) -> PathBuf {
        if self.topology_file.is_absolute() {
            self.topology_file.clone()
        } else {
            base_dir.join(&self.topology_file)
        }
    }

    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing(format!("{key}.name")));
        }
        if self.topology_file.as_os_str().is_empty() {
            return Err(ConfigError::Missing(format!("{key}.topology_file")));
        }

        if let Some(p) = self.scale.ref_point() {
            validate_lon_lat(&format!("{key}.scale.ref_point"), p)?;
        }
        if let ScaleConfig::Constant { value, .. } = &self.scale {
            if !value.is_finite() {
                return Err(ConfigError::invalid(
                    format!("{key}.scale.value"),
                    value,
                    "目标流速必须为有限值",
                ));
            }
        }

        if self.eddy_diffusion.is_nan() || self.eddy_diffusion < 0.0 {
            return Err(ConfigError::invalid(
                format!("{key}.eddy_diffusion"),
                self.eddy_diffusion,
                "涡扩散系数不能为负",
            ));
        }
        if self.eddy_v0.is_nan() || self.eddy_v0 < 0.0 {
            return Err(ConfigError::invalid(
                format!("{key}.eddy_v0"),
                self.eddy_v0,
                "基准流速不能为负",
            ));
        }

        self.uncertainty.to_params().validate().map_err(|e| {
            ConfigError::invalid(
                format!("{key}.uncertainty"),
                format!("{:?}", self.uncertainty),
                e.to_string(),
            )
        })?;

        if let Some(ts) = &self.time_series {
            ts.build().map_err(|e| match e {
                ConfigError::InvalidValue { value, reason, .. } => ConfigError::InvalidValue {
                    key: format!("{key}.time_series.points"),
                    value,
                    reason,
                },
                other => other,
            })?;
        }

        if let (Some(start), Some(stop)) = (self.active_start, self.active_stop) {
            if start > stop {
                return Err(ConfigError::invalid(
                    format!("{key}.active_start"),
                    start,
                    format!("晚于 active_stop ({stop})"),
                ));
            }
        }
        Ok(())
    }
}

fn validate_lon_lat(key: &str, p: [f64; 2]) -> Result<(), ConfigError> {
    if !(-180.0..=180.0).contains(&p[0]) || !(-90.0..=90.0).contains(&p[1]) {
        return Err(ConfigError::invalid(
            key,
            format!("[{}, {}]", p[0], p[1]),
            "经度须在 [-180, 180]，纬度须在 [-90, 90]",
        ));
    }
    Ok(())
}

impl RunConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        let config: RunConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_step.is_nan() || self.time_step <= 0.0 {
            return Err(ConfigError::invalid(
                "time_step",
                self.time_step,
                "时间步长必须为正",
            ));
        }
        if self.duration.is_nan() || self.duration < 0.0 {
            return Err(ConfigError::invalid(
                "duration",
                self.duration,
                "运行时长不能为负",
            ));
        }
        if !self.start_time.is_finite() {
            return Err(ConfigError::invalid(
                "start_time",
                self.start_time,
                "起始时间必须为有限值",
            ));
        }

        for (i, p) in self.particles.iter().enumerate() {
            validate_lon_lat(&format!("particles[{i}]"), *p)?;
        }

        if self.maps.is_empty() {
            return Err(ConfigError::Missing("maps".into()));
        }
        let mut map_names = HashSet::new();
        for (i, map) in self.maps.iter().enumerate() {
            if !map_names.insert(map.name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("maps[{i}].name"),
                    &map.name,
                    "地图名称重复",
                ));
            }
            for (j, pattern) in map.patterns.iter().enumerate() {
                pattern.validate(&format!("maps[{i}].patterns[{j}]"))?;
            }
        }

        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 运行步数（不足一步的尾部按一步计）
    pub fn n_steps(&self) -> usize {
        (self.duration / self.time_step).ceil() as usize
    }

    /// 初始粒子位置（微度）
    pub fn particle_points(&self) -> Vec<WorldPoint> {
        self.particles
            .iter()
            .map(|p| WorldPoint::from_degrees(p[0], p[1]))
            .collect()
    }

    /// 按 `other_grid` 引用但配置中不存在的模式名称
    ///
    /// 运行时这些模式的缩放系数记为 0。
    pub fn unresolved_scale_references(&self) -> Vec<&str> {
        let names: HashSet<&str> = self
            .maps
            .iter()
            .flat_map(|m| m.patterns.iter())
            .map(|p| p.name.as_str())
            .collect();
        self.maps
            .iter()
            .flat_map(|m| m.patterns.iter())
            .filter_map(|p| match &p.scale {
                ScaleConfig::OtherGrid { name, .. } if !names.contains(name.as_str()) => {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect()
    }
}
