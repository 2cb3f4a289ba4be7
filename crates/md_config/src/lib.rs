// crates/md_config/src/lib.rs

//! MariDrift Config Layer (Layer 4)
//!
//! 运行配置：模拟时钟、初始粒子、地图与流场模式。
//! 配置以 JSON 存储，所有字段都有默认值。
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: md_cli     ─> uses RunConfig
//! Layer 4: md_config  ─> RunConfig, PatternConfig (本层)
//! Layer 3: md_mover   ─> CurrentPattern, ScalePolicy, UncertaintyParams
//! Layer 2: md_mesh
//! Layer 1: md_geo
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod run_config;

pub use error::ConfigError;
pub use run_config::{
    MapConfig, PatternConfig, RunConfig, ScaleConfig, TimeSeriesConfig, UncertaintyConfig,
};
