// crates/md_mesh/src/topology.rs

//! 三角网格拓扑
//!
//! 存储顶点（微度坐标）、三角形（顶点索引 + 邻接三角形）和每三角形流速。
//! 加载完成后只读。
//!
//! # 约定
//!
//! - 三角形顶点按逆时针排列
//! - `neighbors[k]` 为跨越顶点 `k` 对边的邻接三角形，`-1` 表示边界
//! - 第 `side` 条有向边从 `vertices[side]` 指向 `vertices[(side + 1) % 3]`，
//!   其右侧邻接三角形为 `neighbors[(side + 2) % 3]`

use crate::error::{MeshError, MeshResult};
use md_geo::{Velocity, WorldPoint, WorldRect};

/// 无邻接三角形标记
pub const NO_NEIGHBOR: i32 = -1;

/// 三角形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    /// 顶点索引（逆时针）
    pub vertices: [u32; 3],
    /// 邻接三角形索引（`-1` 为边界）
    pub neighbors: [i32; 3],
}

impl Triangle {
    /// 创建三角形
    pub const fn new(vertices: [u32; 3], neighbors: [i32; 3]) -> Self {
        Self {
            vertices,
            neighbors,
        }
    }

    /// 有向边 `side` 的端点顶点索引
    #[inline]
    pub fn edge(&self, side: usize) -> (u32, u32) {
        (self.vertices[side], self.vertices[(side + 1) % 3])
    }

    /// 有向边 `side` 右侧的邻接三角形
    #[inline]
    pub fn neighbor_across(&self, side: usize) -> Option<usize> {
        let n = self.neighbors[(side + 2) % 3];
        (n >= 0).then_some(n as usize)
    }
}

/// 网格拓扑
#[derive(Debug, Clone)]
pub struct MeshTopology {
    vertices: Vec<WorldPoint>,
    depths: Option<Vec<f64>>,
    triangles: Vec<Triangle>,
    velocities: Vec<Velocity>,
    bounds: WorldRect,
}

impl MeshTopology {
    /// 创建拓扑并计算包围盒
    ///
    /// `velocities` 为空表示纯拓扑网格，所有三角形流速为零。
    pub fn new(
        vertices: Vec<WorldPoint>,
        triangles: Vec<Triangle>,
        velocities: Vec<Velocity>,
    ) -> MeshResult<Self> {
        let mut bounds = WorldRect::VOID;
        for &v in &vertices {
            bounds.add_point(v);
        }
        Self::from_parts(vertices, None, triangles, velocities, bounds)
    }

    /// 从已解析的各部分组装拓扑（包围盒由调用方累积）
    pub fn from_parts(
        vertices: Vec<WorldPoint>,
        depths: Option<Vec<f64>>,
        triangles: Vec<Triangle>,
        mut velocities: Vec<Velocity>,
        bounds: WorldRect,
    ) -> MeshResult<Self> {
        if vertices.is_empty() {
            return Err(MeshError::corrupt_topology("网格没有顶点"));
        }
        if triangles.is_empty() {
            return Err(MeshError::corrupt_topology("网格没有三角形"));
        }
        if let Some(d) = &depths {
            if d.len() != vertices.len() {
                return Err(MeshError::corrupt_topology(format!(
                    "水深数量 {} 与顶点数量 {} 不一致",
                    d.len(),
                    vertices.len()
                )));
            }
        }
        if velocities.is_empty() {
            velocities = vec![Velocity::ZERO; triangles.len()];
        } else if velocities.len() != triangles.len() {
            return Err(MeshError::corrupt_topology(format!(
                "流速数量 {} 与三角形数量 {} 不一致",
                velocities.len(),
                triangles.len()
            )));
        }

        let n_vertices = vertices.len();
        let n_triangles = triangles.len() as i64;
        for (t, tri) in triangles.iter().enumerate() {
            if let Some(&v) = tri.vertices.iter().find(|&&v| v as usize >= n_vertices) {
                return Err(MeshError::corrupt_topology(format!(
                    "三角形 {} 的顶点索引 {} 超出范围 [0, {})",
                    t, v, n_vertices
                )));
            }
            if let Some(&n) = tri
                .neighbors
                .iter()
                .find(|&&n| n < NO_NEIGHBOR || i64::from(n) >= n_triangles)
            {
                return Err(MeshError::corrupt_topology(format!(
                    "三角形 {} 的邻接索引 {} 超出范围",
                    t, n
                )));
            }
        }

        Ok(Self {
            vertices,
            depths,
            triangles,
            velocities,
            bounds,
        })
    }

    /// 顶点数量
    #[inline]
    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// 三角形数量
    #[inline]
    pub fn n_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// 顶点坐标
    #[inline]
    pub fn vertices(&self) -> &[WorldPoint] {
        &self.vertices
    }

    /// 顶点水深（仅当文件为每个顶点都提供了水深）
    #[inline]
    pub fn depths(&self) -> Option<&[f64]> {
        self.depths.as_deref()
    }

    /// 三角形列表
    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// 获取三角形
    #[inline]
    pub fn triangle(&self, t: usize) -> &Triangle {
        &self.triangles[t]
    }

    /// 三角形流速 [m/s]
    #[inline]
    pub fn velocity(&self, t: usize) -> Velocity {
        self.velocities[t]
    }

    /// 是否所有流速都为零（纯拓扑文件）
    pub fn has_velocity(&self) -> bool {
        self.velocities.iter().any(|v| *v != Velocity::ZERO)
    }

    /// 顶点包围盒
    #[inline]
    pub fn bounds(&self) -> WorldRect {
        self.bounds
    }

    /// 三角形顶点坐标
    pub fn triangle_points(&self, t: usize) -> [WorldPoint; 3] {
        let tri = &self.triangles[t];
        tri.vertices.map(|v| self.vertices[v as usize])
    }

    /// 三角形形心（整数微度）
    pub fn centroid(&self, t: usize) -> WorldPoint {
        let [a, b, c] = self.triangle_points(t);
        let long = (i64::from(a.long) + i64::from(b.long) + i64::from(c.long)) / 3;
        let lat = (i64::from(a.lat) + i64::from(b.lat) + i64::from(c.lat)) / 3;
        WorldPoint::new(long as i32, lat as i32)
    }

    /// 点相对三角形第 `side` 条有向边的位置
    ///
    /// 返回叉积：> 0 在左侧（三角形内侧），< 0 在右侧，= 0 在边所在直线上。
    #[inline]
    pub fn side_of_edge(&self, t: usize, side: usize, p: WorldPoint) -> i64 {
        let (ia, ib) = self.triangles[t].edge(side);
        let a = self.vertices[ia as usize];
        let b = self.vertices[ib as usize];
        cross(a, b, p)
    }

    /// 点是否在三角形内（含边界）
    pub fn triangle_contains(&self, t: usize, p: WorldPoint) -> bool {
        (0..3).all(|side| self.side_of_edge(t, side, p) >= 0)
    }
}

/// (b - a) × (p - a)，使用 i64 避免溢出
#[inline]
fn cross(a: WorldPoint, b: WorldPoint, p: WorldPoint) -> i64 {
    let (ax, ay) = (i64::from(a.long), i64::from(a.lat));
    let (bx, by) = (i64::from(b.long), i64::from(b.lat));
    let (px, py) = (i64::from(p.long), i64::from(p.lat));
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> MeshTopology {
        MeshTopology::new(
            vec![
                WorldPoint::new(0, 0),
                WorldPoint::new(1_000_000, 0),
                WorldPoint::new(0, 1_000_000),
            ],
            vec![Triangle::new([0, 1, 2], [-1, -1, -1])],
            vec![Velocity::new(0.5, -0.25)],
        )
        .unwrap()
    }

    #[test]
    fn test_bounds_and_counts() {
        let topo = unit_triangle();
        assert_eq!(topo.n_vertices(), 3);
        assert_eq!(topo.n_triangles(), 1);
        let b = topo.bounds();
        assert_eq!((b.lo_long, b.hi_long), (0, 1_000_000));
        assert_eq!((b.lo_lat, b.hi_lat), (0, 1_000_000));
        assert!(topo.has_velocity());
    }

    #[test]
    fn test_contains_and_centroid() {
        let topo = unit_triangle();
        let c = topo.centroid(0);
        assert_eq!(c, WorldPoint::new(333_333, 333_333));
        assert!(topo.triangle_contains(0, c));
        assert!(topo.triangle_contains(0, WorldPoint::new(0, 0)));
        assert!(!topo.triangle_contains(0, WorldPoint::new(600_000, 600_000)));
    }

    #[test]
    fn test_edge_orientation() {
        let topo = unit_triangle();
        // 边 0: (0,0) -> (1,0)，形心在左侧
        assert!(topo.side_of_edge(0, 0, topo.centroid(0)) > 0);
        assert!(topo.side_of_edge(0, 0, WorldPoint::new(500_000, -1)) < 0);
        assert_eq!(topo.side_of_edge(0, 0, WorldPoint::new(2_000_000, 0)), 0);
    }

    #[test]
    fn test_neighbor_across() {
        let tri = Triangle::new([0, 1, 2], [7, -1, 3]);
        // 边 0 (v0->v1) 对着顶点 2
        assert_eq!(tri.neighbor_across(0), Some(3));
        assert_eq!(tri.neighbor_across(1), Some(7));
        assert_eq!(tri.neighbor_across(2), None);
    }

    #[test]
    fn test_topology_only_mesh_has_zero_velocity() {
        let topo = MeshTopology::new(
            vec![
                WorldPoint::new(0, 0),
                WorldPoint::new(10, 0),
                WorldPoint::new(0, 10),
            ],
            vec![Triangle::new([0, 1, 2], [-1, -1, -1])],
            Vec::new(),
        )
        .unwrap();
        assert!(!topo.has_velocity());
        assert_eq!(topo.velocity(0), Velocity::ZERO);
    }

    #[test]
    fn test_rejects_bad_indices() {
        let err = MeshTopology::new(
            vec![WorldPoint::new(0, 0), WorldPoint::new(1, 0)],
            vec![Triangle::new([0, 1, 2], [-1, -1, -1])],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::CorruptTopology { .. }));

        let err = MeshTopology::new(
            vec![
                WorldPoint::new(0, 0),
                WorldPoint::new(1, 0),
                WorldPoint::new(0, 1),
            ],
            vec![Triangle::new([0, 1, 2], [-1, 5, -1])],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::CorruptTopology { .. }));
    }
}
