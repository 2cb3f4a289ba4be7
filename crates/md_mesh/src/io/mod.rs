// crates/md_mesh/src/io/mod.rs

//! 网格 IO 模块
//!
//! - 扩展拓扑文件 (顶点 / 三角形拓扑 / DAG 树 三段文本格式)

pub mod topology;

pub use topology::{parse_header, strip_preamble, SectionKind, TopologyLoader, PREAMBLE_LEN};
