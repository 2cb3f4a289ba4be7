// crates/md_mesh/src/lib.rs

//! MariDrift 网格模块 (Layer 2)
//!
//! 三角网格流速场：拓扑存储、DAG 点定位树与扩展拓扑文件读取。
//!
//! # 核心类型
//!
//! - [`MeshTopology`]: 顶点、三角形与每三角形流速
//! - [`DagIndex`]: 二叉点定位树，O(log n) 查找点所在三角形
//! - [`VelocityGrid`]: 组合以上两者，提供点 → 流速查询
//! - [`TopologyLoader`]: 从扩展拓扑文件构建 [`VelocityGrid`]
//!
//! # 示例
//!
//! ```ignore
//! use md_mesh::TopologyLoader;
//! use md_geo::WorldPoint;
//!
//! let grid = TopologyLoader::load("bay.dat")?;
//! let v = grid.query(WorldPoint::from_degrees(-70.5, 42.1))?;
//! ```

#![warn(clippy::all)]

pub mod dag;
pub mod error;
pub mod grid;
pub mod io;
pub mod topology;

pub use dag::{DagIndex, DagNode};
pub use error::{MeshError, MeshResult};
pub use grid::{GridStatistics, VelocityGrid};
pub use io::{SectionKind, TopologyLoader};
pub use topology::{MeshTopology, Triangle, NO_NEIGHBOR};
