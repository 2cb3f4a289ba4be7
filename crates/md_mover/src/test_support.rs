// crates/md_mover/src/test_support.rs

//! 单元测试用网格

use md_geo::{Velocity, WorldPoint};
use md_mesh::{DagIndex, DagNode, MeshTopology, Triangle, VelocityGrid};

/// 直角三角形网格：`origin`、向东 `size`、向北 `size` 三个顶点，流速均匀
pub(crate) fn triangle_grid(origin: WorldPoint, size: i32, velocity: Velocity) -> VelocityGrid {
    let vertices = vec![
        origin,
        WorldPoint::new(origin.long + size, origin.lat),
        WorldPoint::new(origin.long, origin.lat + size),
    ];
    let triangles = vec![Triangle::new([0, 1, 2], [-1, -1, -1])];
    let topology = MeshTopology::new(vertices, triangles, vec![velocity])
        .expect("测试网格拓扑有效");
    let dag = DagIndex::build(
        vec![
            DagNode::new(0, 1, -1),
            DagNode::new(1, 2, -1),
            DagNode::new(2, -1, -1),
        ],
        1,
    )
    .expect("测试 DAG 有效");
    VelocityGrid::new(topology, dag).expect("测试网格与 DAG 匹配")
}
