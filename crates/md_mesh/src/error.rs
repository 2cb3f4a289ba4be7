// crates/md_mesh/src/error.rs
//! 网格处理错误类型
//!
//! 包含点定位、拓扑文件解析与 DAG 树结构错误定义。

use thiserror::Error;

/// 网格模块结果类型
pub type MeshResult<T> = Result<T, MeshError>;

/// 网格错误枚举
#[derive(Error, Debug)]
pub enum MeshError {
    /// 点不在网格范围内（可恢复，由调用方决定回退或跳过）
    #[error("点 (经度 {long}, 纬度 {lat}) 不在网格范围内")]
    OutOfMesh {
        /// 经度 [微度]
        long: i32,
        /// 纬度 [微度]
        lat: i32,
    },

    /// 拓扑或 DAG 树结构损坏
    #[error("拓扑数据损坏: {details}")]
    CorruptTopology {
        /// 详细信息
        details: String,
    },

    /// 拓扑文件段格式错误
    #[error("拓扑文件格式错误: {section} 段, 行 {line}: {message}")]
    MalformedSection {
        /// 所在段
        section: &'static str,
        /// 行号（从前导标记之后起算，1 起）
        line: usize,
        /// 错误信息
        message: String,
    },

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl MeshError {
    /// 构造网格外错误
    pub fn out_of_mesh(long: i32, lat: i32) -> Self {
        Self::OutOfMesh { long, lat }
    }

    /// 构造拓扑损坏错误
    pub fn corrupt_topology(details: impl Into<String>) -> Self {
        Self::CorruptTopology {
            details: details.into(),
        }
    }

    /// 构造段格式错误
    pub fn malformed(section: &'static str, line: usize, message: impl Into<String>) -> Self {
        Self::MalformedSection {
            section,
            line,
            message: message.into(),
        }
    }

    /// 是否为可恢复错误（仅网格外查询）
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OutOfMesh { .. })
    }

    /// 段格式错误的行号
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MalformedSection { line, .. } => Some(*line),
            _ => None,
        }
    }
}
