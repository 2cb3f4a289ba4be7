// crates/md_geo/src/geometry.rs

//! 几何类型定义
//!
//! 定点微度坐标、包围盒、位移以及经纬度/米换算。

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::Add;

// ============================================================================
// 常量
// ============================================================================

/// 每纬度对应的米数
pub const METERS_PER_DEGREE_LAT: f64 = 111_120.000_24;

/// 每度对应的微度数
pub const MICRODEGREES_PER_DEGREE: f64 = 1_000_000.0;

/// 流速向量 (u: 东向, v: 北向) [m/s]
pub type Velocity = glam::DVec2;

/// 经度/纬度长度比
///
/// 给定纬度（微度）处，一度经度对应的长度与一度纬度长度之比，即 cos(lat)。
#[inline]
#[must_use]
pub fn long_to_lat_ratio(lat: i32) -> f64 {
    let lat_deg = f64::from(lat) / MICRODEGREES_PER_DEGREE;
    (lat_deg * PI / 180.0).cos()
}

// ============================================================================
// WorldPoint - 定点微度坐标
// ============================================================================

/// 地理点（微度定点整数）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPoint {
    /// 经度 [微度]
    pub long: i32,
    /// 纬度 [微度]
    pub lat: i32,
}

impl WorldPoint {
    /// 创建新的点
    #[inline]
    #[must_use]
    pub const fn new(long: i32, lat: i32) -> Self {
        Self { long, lat }
    }

    /// 从十进制度创建（四舍五入到微度）
    #[inline]
    #[must_use]
    pub fn from_degrees(long_deg: f64, lat_deg: f64) -> Self {
        Self {
            long: (long_deg * MICRODEGREES_PER_DEGREE).round() as i32,
            lat: (lat_deg * MICRODEGREES_PER_DEGREE).round() as i32,
        }
    }

    /// 经度 [度]
    #[inline]
    pub fn long_degrees(&self) -> f64 {
        f64::from(self.long) / MICRODEGREES_PER_DEGREE
    }

    /// 纬度 [度]
    #[inline]
    pub fn lat_degrees(&self) -> f64 {
        f64::from(self.lat) / MICRODEGREES_PER_DEGREE
    }

    /// 叠加位移，饱和到 i32 范围
    #[inline]
    #[must_use]
    pub fn offset_by(self, delta: &WorldPoint3D) -> Self {
        Self {
            long: self.long.saturating_add(delta.p.long),
            lat: self.lat.saturating_add(delta.p.lat),
        }
    }
}

impl Add for WorldPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            long: self.long.saturating_add(rhs.long),
            lat: self.lat.saturating_add(rhs.lat),
        }
    }
}

// ============================================================================
// WorldPoint3D - 单步位移
// ============================================================================

/// 带垂向分量的位移
///
/// 水平分量与顶点坐标同为微度定点整数，垂向分量单位为米。
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint3D {
    /// 水平位移 [微度]
    pub p: WorldPoint,
    /// 垂向位移 [m]
    pub z: f64,
}

impl WorldPoint3D {
    /// 零位移
    pub const ZERO: Self = Self {
        p: WorldPoint { long: 0, lat: 0 },
        z: 0.0,
    };

    /// 从度数位移创建（截断到微度，与整数坐标的换算一致）
    #[inline]
    #[must_use]
    pub fn from_degree_delta(d_long: f64, d_lat: f64) -> Self {
        Self {
            p: WorldPoint {
                long: (d_long * MICRODEGREES_PER_DEGREE) as i32,
                lat: (d_lat * MICRODEGREES_PER_DEGREE) as i32,
            },
            z: 0.0,
        }
    }

    /// 是否为零位移
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.p.long == 0 && self.p.lat == 0 && self.z == 0.0
    }
}

// ============================================================================
// WorldRect - 经纬度包围盒
// ============================================================================

/// 轴对齐经纬度包围盒（微度）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldRect {
    /// 最小经度
    pub lo_long: i32,
    /// 最小纬度
    pub lo_lat: i32,
    /// 最大经度
    pub hi_long: i32,
    /// 最大纬度
    pub hi_lat: i32,
}

impl Default for WorldRect {
    fn default() -> Self {
        Self::VOID
    }
}

impl WorldRect {
    /// 空包围盒（反转的极值，加入第一个点后即有效）
    pub const VOID: Self = Self {
        lo_long: i32::MAX,
        lo_lat: i32::MAX,
        hi_long: i32::MIN,
        hi_lat: i32::MIN,
    };

    /// 是否为空
    #[inline]
    pub fn is_void(&self) -> bool {
        self.lo_long > self.hi_long || self.lo_lat > self.hi_lat
    }

    /// 扩展以包含点
    #[inline]
    pub fn add_point(&mut self, p: WorldPoint) {
        self.lo_long = self.lo_long.min(p.long);
        self.lo_lat = self.lo_lat.min(p.lat);
        self.hi_long = self.hi_long.max(p.long);
        self.hi_lat = self.hi_lat.max(p.lat);
    }

    /// 检查点是否在包围盒内（闭区间）
    #[inline]
    pub fn contains(&self, p: WorldPoint) -> bool {
        p.long >= self.lo_long && p.long <= self.hi_long && p.lat >= self.lo_lat && p.lat <= self.hi_lat
    }

    /// 包围盒中心
    pub fn center(&self) -> WorldPoint {
        WorldPoint {
            long: ((i64::from(self.lo_long) + i64::from(self.hi_long)) / 2) as i32,
            lat: ((i64::from(self.lo_lat) + i64::from(self.hi_lat)) / 2) as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_degrees_rounds() {
        let p = WorldPoint::from_degrees(-70.123_456_7, 42.000_000_4);
        assert_eq!(p.long, -70_123_457);
        assert_eq!(p.lat, 42_000_000);
        assert!((p.long_degrees() + 70.123_457).abs() < 1e-9);
    }

    #[test]
    fn test_long_to_lat_ratio() {
        assert!((long_to_lat_ratio(0) - 1.0).abs() < 1e-12);
        let r = long_to_lat_ratio(60_000_000);
        assert!((r - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_void_rect() {
        let mut r = WorldRect::VOID;
        assert!(r.is_void());
        assert!(!r.contains(WorldPoint::new(0, 0)));

        r.add_point(WorldPoint::new(-10, 5));
        r.add_point(WorldPoint::new(20, -5));
        assert!(!r.is_void());
        assert!(r.contains(WorldPoint::new(0, 0)));
        assert!(r.contains(WorldPoint::new(20, 5)));
        assert!(!r.contains(WorldPoint::new(21, 0)));
        assert_eq!(r.center(), WorldPoint::new(5, 0));
    }

    #[test]
    fn test_degree_delta_truncates() {
        let d = WorldPoint3D::from_degree_delta(0.000_001_9, -0.000_001_9);
        assert_eq!(d.p.long, 1);
        assert_eq!(d.p.lat, -1);
        assert!(!d.is_zero());
        assert!(WorldPoint3D::ZERO.is_zero());
    }

    #[test]
    fn test_offset_by() {
        let p = WorldPoint::new(100, 200);
        let d = WorldPoint3D::from_degree_delta(0.000_010_5, 0.000_020_5);
        assert_eq!(p.offset_by(&d), WorldPoint::new(110, 220));
    }
}
