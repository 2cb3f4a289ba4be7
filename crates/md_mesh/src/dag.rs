// crates/md_mesh/src/dag.rs

//! DAG 点定位树
//!
//! 由配套的网格生成工具预先构建、随拓扑文件一起存储的二叉点定位树。
//! 本模块只消费该树，不做重新平衡。
//!
//! # 节点语义
//!
//! 每个节点引用一条三角形有向边 `segment = 3 * tri + side`：
//! - 查询点在边的左侧（或直线上）走 `left` 分支，否则走 `right`
//! - 子节点为 `-1` 表示叶子：左叶子解析为 `tri`，右叶子解析为跨边邻接三角形
//! - 右叶子的邻接三角形为 `-1` 时，点位于网格之外
//!
//! 平衡的树查询深度为 O(log n)。

use crate::error::{MeshError, MeshResult};
use crate::topology::MeshTopology;
use md_geo::WorldPoint;

/// 叶子标记
pub const LEAF: i32 = -1;

/// DAG 树节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DagNode {
    /// 分割边编号 `3 * tri + side`
    pub segment: u32,
    /// 左子节点（`-1` 为叶子）
    pub left: i32,
    /// 右子节点（`-1` 为叶子）
    pub right: i32,
}

impl DagNode {
    /// 创建节点
    pub const fn new(segment: u32, left: i32, right: i32) -> Self {
        Self {
            segment,
            left,
            right,
        }
    }

    /// 分割边所属三角形
    #[inline]
    pub fn triangle(&self) -> usize {
        (self.segment / 3) as usize
    }

    /// 分割边在三角形中的序号
    #[inline]
    pub fn side(&self) -> usize {
        (self.segment % 3) as usize
    }
}

/// DAG 点定位索引
#[derive(Debug, Clone)]
pub struct DagIndex {
    nodes: Vec<DagNode>,
}

impl DagIndex {
    /// 从节点列表重建树
    ///
    /// 只做结构边界检查（分割边与子节点索引范围），不做几何校验。
    pub fn build(nodes: Vec<DagNode>, n_triangles: usize) -> MeshResult<Self> {
        if nodes.is_empty() {
            return Err(MeshError::corrupt_topology("DAG 树没有节点"));
        }

        let n_nodes = nodes.len() as i64;
        let n_segments = 3 * n_triangles as u64;
        for (i, node) in nodes.iter().enumerate() {
            if u64::from(node.segment) >= n_segments {
                return Err(MeshError::corrupt_topology(format!(
                    "DAG 节点 {} 的分割边 {} 超出范围 [0, {})",
                    i, node.segment, n_segments
                )));
            }
            for child in [node.left, node.right] {
                if child < LEAF || i64::from(child) >= n_nodes {
                    return Err(MeshError::corrupt_topology(format!(
                        "DAG 节点 {} 的子节点 {} 超出范围",
                        i, child
                    )));
                }
            }
        }

        Ok(Self { nodes })
    }

    /// 节点数量
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// 节点列表
    #[inline]
    pub fn nodes(&self) -> &[DagNode] {
        &self.nodes
    }

    /// 定位点所在三角形
    ///
    /// 返回 `Ok(None)` 表示点在网格之外。下降步数超过节点数时说明树中存在环，
    /// 返回 `CorruptTopology`。
    pub fn locate(&self, topology: &MeshTopology, p: WorldPoint) -> MeshResult<Option<usize>> {
        let mut branch = 0usize;

        for _ in 0..self.nodes.len() {
            let node = &self.nodes[branch];
            let tri = node.triangle();
            let side = node.side();

            let next = if topology.side_of_edge(tri, side, p) >= 0 {
                if node.left == LEAF {
                    return Ok(Some(tri));
                }
                node.left
            } else {
                if node.right == LEAF {
                    return Ok(topology.triangle(tri).neighbor_across(side));
                }
                node.right
            };
            branch = next as usize;
        }

        Err(MeshError::corrupt_topology(format!(
            "DAG 树下降超过 {} 步，树中存在环",
            self.nodes.len()
        )))
    }

    /// 树的最大深度（根为 1）
    ///
    /// 遇到环时按已访问节点截断。
    pub fn max_depth(&self) -> usize {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![(0usize, 1usize)];
        let mut max_depth = 0;

        while let Some((i, depth)) = stack.pop() {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            max_depth = max_depth.max(depth);

            let node = &self.nodes[i];
            for child in [node.left, node.right] {
                if child != LEAF {
                    stack.push((child as usize, depth + 1));
                }
            }
        }

        max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Triangle;
    use md_geo::Velocity;

    /// 单位正方形，沿对角线分为两个三角形
    fn square() -> (MeshTopology, DagIndex) {
        let topo = MeshTopology::new(
            vec![
                WorldPoint::new(0, 0),
                WorldPoint::new(1_000_000, 0),
                WorldPoint::new(1_000_000, 1_000_000),
                WorldPoint::new(0, 1_000_000),
            ],
            vec![
                Triangle::new([0, 1, 2], [-1, 1, -1]),
                Triangle::new([0, 2, 3], [-1, -1, 0]),
            ],
            vec![Velocity::new(1.0, 0.0), Velocity::new(0.0, 1.0)],
        )
        .unwrap();

        let dag = DagIndex::build(
            vec![
                DagNode::new(2, 1, 3),
                DagNode::new(0, 2, -1),
                DagNode::new(1, -1, -1),
                DagNode::new(4, 4, -1),
                DagNode::new(5, -1, -1),
            ],
            topo.n_triangles(),
        )
        .unwrap();

        (topo, dag)
    }

    #[test]
    fn test_locate_both_triangles() {
        let (topo, dag) = square();
        assert_eq!(dag.locate(&topo, WorldPoint::new(750_000, 250_000)).unwrap(), Some(0));
        assert_eq!(dag.locate(&topo, WorldPoint::new(250_000, 750_000)).unwrap(), Some(1));
    }

    #[test]
    fn test_diagonal_resolves_deterministically() {
        let (topo, dag) = square();
        let on_diag = WorldPoint::new(500_000, 500_000);
        assert_eq!(dag.locate(&topo, on_diag).unwrap(), Some(0));
        assert_eq!(dag.locate(&topo, on_diag).unwrap(), Some(0));
    }

    #[test]
    fn test_outside_returns_none() {
        let (topo, dag) = square();
        assert_eq!(dag.locate(&topo, WorldPoint::new(500_000, -10)).unwrap(), None);
        assert_eq!(dag.locate(&topo, WorldPoint::new(-10, 500_000)).unwrap(), None);
    }

    #[test]
    fn test_build_rejects_out_of_range() {
        let err = DagIndex::build(vec![DagNode::new(6, -1, -1)], 2).unwrap_err();
        assert!(matches!(err, MeshError::CorruptTopology { .. }));

        let err = DagIndex::build(vec![DagNode::new(0, 3, -1)], 2).unwrap_err();
        assert!(matches!(err, MeshError::CorruptTopology { .. }));

        let err = DagIndex::build(Vec::new(), 2).unwrap_err();
        assert!(matches!(err, MeshError::CorruptTopology { .. }));
    }

    #[test]
    fn test_cycle_is_reported() {
        let (topo, _) = square();
        let dag = DagIndex::build(vec![DagNode::new(2, 1, 1), DagNode::new(2, 0, 0)], 2).unwrap();
        let err = dag.locate(&topo, WorldPoint::new(750_000, 250_000)).unwrap_err();
        assert!(matches!(err, MeshError::CorruptTopology { .. }));
    }

    #[test]
    fn test_max_depth() {
        let (_, dag) = square();
        assert_eq!(dag.n_nodes(), 5);
        assert_eq!(dag.max_depth(), 3);
    }
}
