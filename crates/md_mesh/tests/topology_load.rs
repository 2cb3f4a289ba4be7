// crates/md_mesh/tests/topology_load.rs

//! 拓扑文件加载集成测试
//!
//! 生成规则网格的扩展拓扑文件，经磁盘两遍读取后逐三角形校验形心查询。

use md_geo::{Velocity, WorldPoint};
use md_mesh::{MeshError, TopologyLoader};
use std::fmt::Write as _;

// ============================================================
// 测试辅助设施
// ============================================================

/// 生成 nx × ny 规则网格的拓扑文本（不含前导标记）
///
/// 每个格子分为两个逆时针三角形；DAG 树为逐三角形逐边的链式结构。
/// 测试网格不需要邻接关系，全部记为边界。
fn grid_file_body(nx: usize, ny: usize, newline: &str) -> String {
    let mut s = String::new();
    let n_vertices = (nx + 1) * (ny + 1);
    write!(s, "Vertices\t{}\t{}{}", n_vertices, 2 * (nx + ny), newline).unwrap();
    for j in 0..=ny {
        for i in 0..=nx {
            let lon = -71.0 + i as f64 * 0.1;
            let lat = 42.0 + j as f64 * 0.1;
            write!(s, "{:.6} {:.6} {:.1}{}", lon, lat, 10.0 + j as f64, newline).unwrap();
        }
    }

    let n_triangles = 2 * nx * ny;
    write!(s, "Topology\t{}{}", n_triangles, newline).unwrap();
    let mut t = 0usize;
    for j in 0..ny {
        for i in 0..nx {
            let a = j * (nx + 1) + i;
            let b = a + 1;
            let c = b + nx + 1;
            let d = a + nx + 1;
            for (p, q, r) in [(a, b, c), (a, c, d)] {
                let (u, v) = triangle_velocity(t);
                write!(s, "{} {} {} -1 -1 -1 {} {}{}", p, q, r, u, v, newline).unwrap();
                t += 1;
            }
        }
    }

    write!(s, "DAGTree\t{}{}", 3 * n_triangles, newline).unwrap();
    for t in 0..n_triangles {
        for side in 0..3 {
            let left: i64 = if side < 2 { (3 * t + side + 1) as i64 } else { -1 };
            let right: i64 = if t + 1 < n_triangles { (3 * (t + 1)) as i64 } else { -1 };
            write!(s, "{} {} {}{}", 3 * t + side, left, right, newline).unwrap();
        }
    }
    s
}

fn triangle_velocity(t: usize) -> (f64, f64) {
    (0.01 * t as f64, -0.02 * t as f64)
}

fn write_topology_file(dir: &tempfile::TempDir, name: &str, preamble: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("{}{}", preamble, body)).unwrap();
    path
}

// ============================================================
// 测试
// ============================================================

#[test]
fn test_centroid_roundtrip_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_topology_file(&dir, "grid.dat", "DAG 1.0\n", &grid_file_body(4, 3, "\n"));

    let grid = TopologyLoader::load(&path).unwrap();
    let topo = grid.topology();
    assert_eq!(topo.n_vertices(), 20);
    assert_eq!(topo.n_triangles(), 24);
    assert_eq!(grid.dag().n_nodes(), 72);

    for t in 0..topo.n_triangles() {
        let (u, v) = triangle_velocity(t);
        let c = topo.centroid(t);
        let vel = grid.query(c).unwrap();
        assert_eq!(vel, Velocity::new(u, v), "三角形 {} 形心查询不一致", t);
    }
}

#[test]
fn test_crlf_file_with_blank_preamble_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_topology_file(&dir, "crlf.dat", "DAG 1.0\r\n\r\n", &grid_file_body(2, 2, "\r\n"));

    let grid = TopologyLoader::load(&path).unwrap();
    assert_eq!(grid.topology().n_triangles(), 8);
    let depths = grid.topology().depths().unwrap();
    assert!((depths[0] - 10.0).abs() < 1e-12);
    assert!((depths[8] - 12.0).abs() < 1e-12);
}

#[test]
fn test_bounds_match_vertices() {
    let body = grid_file_body(5, 5, "\n");
    let grid = TopologyLoader::load_from_slice(format!("DAG 1.0\n{}", body).as_bytes()).unwrap();
    let b = grid.bounds();
    assert_eq!(b.lo_long, -71_000_000);
    assert_eq!(b.hi_long, -70_500_000);
    assert_eq!(b.lo_lat, 42_000_000);
    assert_eq!(b.hi_lat, 42_500_000);

    let err = grid.query(WorldPoint::from_degrees(-72.0, 42.2)).unwrap_err();
    assert!(matches!(err, MeshError::OutOfMesh { .. }));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TopologyLoader::load(dir.path().join("absent.dat")).unwrap_err();
    assert!(matches!(err, MeshError::Io(_)));
}

#[test]
fn test_short_file_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_topology_file(&dir, "short.dat", "DAG", "");
    let err = TopologyLoader::load(&path).unwrap_err();
    assert!(matches!(err, MeshError::MalformedSection { line: 0, .. }));
}
