// crates/md_geo/src/lib.rs

//! MariDrift 地理基础类型 (Layer 1)
//!
//! 提供粒子输运模拟中共用的坐标与速度类型。
//!
//! # 模块
//!
//! - `geometry`: 定点微度坐标 (`WorldPoint`)、包围盒 (`WorldRect`)、位移 (`WorldPoint3D`)
//!
//! # 坐标约定
//!
//! 所有网格顶点与粒子位置都以 **微度**（度 × 10⁶）的整数存储，
//! 速度为 (东向 u, 北向 v)，单位 m/s。
//!
//! ```
//! use md_geo::{WorldPoint, WorldRect};
//!
//! let p = WorldPoint::from_degrees(-122.5, 37.75);
//! assert_eq!(p.long, -122_500_000);
//!
//! let mut bounds = WorldRect::VOID;
//! bounds.add_point(p);
//! assert!(bounds.contains(p));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod geometry;

pub use geometry::{
    long_to_lat_ratio, Velocity, WorldPoint, WorldPoint3D, WorldRect, METERS_PER_DEGREE_LAT,
    MICRODEGREES_PER_DEGREE,
};
