// crates/md_mover/src/error.rs
//! 移动器错误类型
//!
//! 步内错误只降低单个流场模式在该步的贡献，不终止整个模拟。
//! 网格错误经 `From` 向上传播。

use md_mesh::MeshError;
use thiserror::Error;

/// 移动器模块结果类型
pub type MoverResult<T> = Result<T, MoverError>;

/// 缩放系数无法确定的原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScaleUndefinedReason {
    /// 参考点不在网格内
    #[error("参考点不在网格内")]
    ReferenceOutOfMesh,
    /// 参考点原始流速过小，无法归一化
    #[error("参考点流速过小 ({length:.3e} m/s)")]
    ReferenceTooSmall {
        /// 原始流速大小 [m/s]
        length: f64,
    },
    /// 目标流速超出合理缩放范围
    #[error("目标流速 {target:.3e} 相对参考流速 {length:.3e} 过大")]
    TargetUnreachable {
        /// 目标流速大小 [m/s]
        target: f64,
        /// 原始流速大小 [m/s]
        length: f64,
    },
    /// 找不到同名流场模式
    #[error("找不到流场模式 '{name}'")]
    NoMatchingPattern {
        /// 模式名称
        name: String,
    },
}

/// 移动器错误枚举
#[derive(Error, Debug)]
pub enum MoverError {
    /// 缩放系数无法确定（系数记为 0）
    #[error("缩放系数无法确定: {0}")]
    ScaleUndefined(ScaleUndefinedReason),

    /// 不确定性表缺失或没有对应记录
    #[error("不确定性表缺失 (粒子集 {set_index}, 粒子 {le_index})")]
    UncertaintyTableMissing {
        /// 粒子集索引
        set_index: usize,
        /// 粒子索引
        le_index: usize,
    },

    /// 时间序列查询失败
    #[error("时间序列在 t={time} 处查询失败: {reason}")]
    TimeSeriesLookupFailed {
        /// 查询时间 [s]
        time: f64,
        /// 原因
        reason: String,
    },

    /// 时间序列数据无效
    #[error("时间序列无效: {0}")]
    InvalidTimeSeries(String),

    /// 不确定性表构建失败
    #[error("不确定性表构建失败: {0}")]
    UncertaintyBuild(String),

    /// 网格错误
    #[error("网格错误: {0}")]
    Mesh(#[from] MeshError),
}

impl MoverError {
    /// 构造缩放错误
    pub fn scale_undefined(reason: ScaleUndefinedReason) -> Self {
        Self::ScaleUndefined(reason)
    }

    /// 构造时间序列查询错误
    pub fn time_series_lookup(time: f64, reason: impl Into<String>) -> Self {
        Self::TimeSeriesLookupFailed {
            time,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_undefined_display() {
        let err = MoverError::scale_undefined(ScaleUndefinedReason::NoMatchingPattern {
            name: "bay.cur".into(),
        });
        assert!(err.to_string().contains("bay.cur"));
    }

    #[test]
    fn test_reason_display() {
        let reason = ScaleUndefinedReason::ReferenceTooSmall { length: 1.0e-6 };
        assert_eq!(reason.to_string(), "参考点流速过小 (1.000e-6 m/s)");
        assert_eq!(
            ScaleUndefinedReason::ReferenceOutOfMesh.to_string(),
            "参考点不在网格内"
        );
    }

    #[test]
    fn test_mesh_error_conversion() {
        let err: MoverError = MeshError::out_of_mesh(1, 2).into();
        assert!(matches!(err, MoverError::Mesh(MeshError::OutOfMesh { .. })));
    }
}
