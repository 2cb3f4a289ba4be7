// crates/md_mesh/src/grid.rs

//! 三角网格流速场
//!
//! 组合 [`MeshTopology`] 与 [`DagIndex`]，提供点 → 流速查询。
//! 加载后只读，可在多个读者之间自由共享。

use crate::dag::DagIndex;
use crate::error::{MeshError, MeshResult};
use crate::topology::MeshTopology;
use md_geo::{Velocity, WorldPoint, WorldRect};

/// 网格统计信息
#[derive(Debug, Clone, Copy)]
pub struct GridStatistics {
    /// 顶点数量
    pub n_vertices: usize,
    /// 三角形数量
    pub n_triangles: usize,
    /// DAG 节点数量
    pub n_nodes: usize,
    /// DAG 最大深度
    pub max_depth: usize,
    /// 包围盒
    pub bounds: WorldRect,
    /// 是否携带非零流速
    pub has_velocity: bool,
}

/// 三角网格流速场
#[derive(Debug, Clone)]
pub struct VelocityGrid {
    topology: MeshTopology,
    dag: DagIndex,
}

impl VelocityGrid {
    /// 由拓扑和已构建的 DAG 树创建
    ///
    /// DAG 节点的分割边必须落在本拓扑的三角形范围内。
    pub fn new(topology: MeshTopology, dag: DagIndex) -> MeshResult<Self> {
        let n_segments = 3 * topology.n_triangles() as u64;
        if let Some((i, node)) = dag
            .nodes()
            .iter()
            .enumerate()
            .find(|(_, node)| u64::from(node.segment) >= n_segments)
        {
            return Err(MeshError::corrupt_topology(format!(
                "DAG 节点 {} 的分割边 {} 与拓扑不匹配 ({} 个三角形)",
                i,
                node.segment,
                topology.n_triangles()
            )));
        }
        Ok(Self { topology, dag })
    }

    /// 定位点所在三角形
    ///
    /// 先用包围盒快速排除，再沿 DAG 树下降。
    pub fn locate(&self, p: WorldPoint) -> MeshResult<usize> {
        if !self.topology.bounds().contains(p) {
            return Err(MeshError::out_of_mesh(p.long, p.lat));
        }
        self.dag
            .locate(&self.topology, p)?
            .ok_or_else(|| MeshError::out_of_mesh(p.long, p.lat))
    }

    /// 查询点处的原始（未缩放）流速
    ///
    /// 返回所在三角形存储的流速，不做插值。
    pub fn query(&self, p: WorldPoint) -> MeshResult<Velocity> {
        let t = self.locate(p)?;
        Ok(self.topology.velocity(t))
    }

    /// 查询平滑流速
    ///
    /// 逐三角形存储的流速没有平滑形式，与 [`query`](Self::query) 相同。
    #[inline]
    pub fn query_smoothed(&self, p: WorldPoint) -> MeshResult<Velocity> {
        self.query(p)
    }

    /// 网格包围盒
    #[inline]
    pub fn bounds(&self) -> WorldRect {
        self.topology.bounds()
    }

    /// 拓扑引用
    #[inline]
    pub fn topology(&self) -> &MeshTopology {
        &self.topology
    }

    /// DAG 树引用
    #[inline]
    pub fn dag(&self) -> &DagIndex {
        &self.dag
    }

    /// 统计信息
    pub fn statistics(&self) -> GridStatistics {
        GridStatistics {
            n_vertices: self.topology.n_vertices(),
            n_triangles: self.topology.n_triangles(),
            n_nodes: self.dag.n_nodes(),
            max_depth: self.dag.max_depth(),
            bounds: self.topology.bounds(),
            has_velocity: self.topology.has_velocity(),
        }
    }
}
