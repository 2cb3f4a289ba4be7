// crates/md_mesh/src/io/topology.rs

//! 扩展拓扑文件读取
//!
//! 文件由旧版网格生成工具输出，结构如下：
//!
//! ```text
//! DAG 1.0                      <- 固定 7 字节前导标记
//! Vertices    4                <- 顶点段: lon lat [depth]（十进制度）
//! -70.0 42.0 10.0
//! ...
//! Topology    2                <- 拓扑段: v0 v1 v2 n0 n1 n2 [u v]
//! 0 1 2 -1 1 -1 0.5 0.0
//! ...
//! DAGTree     5                <- DAG 段: seg left right
//! 2 1 3
//! ...
//! ```
//!
//! 三段必须按顺序出现。段头关键字不区分大小写。
//!
//! # 示例
//!
//! ```ignore
//! use md_mesh::io::TopologyLoader;
//!
//! let grid = TopologyLoader::load("bay.dat")?;
//! println!("{} 个三角形", grid.topology().n_triangles());
//! ```

use crate::dag::{DagIndex, DagNode};
use crate::error::{MeshError, MeshResult};
use crate::grid::VelocityGrid;
use crate::topology::{MeshTopology, Triangle};
use md_geo::{Velocity, WorldPoint, WorldRect};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// 前导标记长度（字节）
pub const PREAMBLE_LEN: usize = 7;

/// 记录行的最短字节数（至少一个字符加一个行终止符）
const MIN_RECORD_LEN: usize = 2;

// ============================================================
// 段头识别
// ============================================================

/// 文件段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// 顶点段
    Vertices,
    /// 三角形拓扑段
    Topology,
    /// DAG 树段
    DagTree,
}

impl SectionKind {
    /// 段头关键字
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Vertices => "Vertices",
            Self::Topology => "Topology",
            Self::DagTree => "DAGTree",
        }
    }
}

/// 识别段头行
///
/// 若 `line` 是 `kind` 类型的段头，返回其携带的数量。
/// 数量之后的附加字段（如顶点段的边界点数）被忽略。
pub fn parse_header(line: &str, kind: SectionKind) -> Option<usize> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if !first.eq_ignore_ascii_case(kind.keyword()) {
        return None;
    }
    tokens.next()?.parse().ok()
}

/// 跳过前导标记及其后紧跟的行终止符
pub fn strip_preamble(raw: &[u8]) -> MeshResult<&[u8]> {
    if raw.len() < PREAMBLE_LEN {
        return Err(MeshError::malformed("preamble", 0, "文件长度不足以包含前导标记"));
    }
    let rest = &raw[PREAMBLE_LEN..];
    let skip = rest
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .count();
    Ok(&rest[skip..])
}

/// 两遍读取拓扑文件
///
/// 第一遍扫描确定文件总长度；第二遍跳过前导标记与行终止符后读入剩余内容。
fn read_topology_file(path: &Path) -> MeshResult<Vec<u8>> {
    let total = io::copy(&mut File::open(path)?, &mut io::sink())? as usize;

    let mut reader = BufReader::new(File::open(path)?);
    let mut preamble = [0u8; PREAMBLE_LEN];
    reader.read_exact(&mut preamble).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            MeshError::malformed("preamble", 0, "文件长度不足以包含前导标记")
        }
        _ => MeshError::Io(e),
    })?;

    let mut skipped = PREAMBLE_LEN;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let n = buf.iter().take_while(|&&b| b == b'\n' || b == b'\r').count();
        let exhausted = n == buf.len();
        reader.consume(n);
        skipped += n;
        if !exhausted {
            break;
        }
    }

    let mut body = Vec::with_capacity(total.saturating_sub(skipped));
    reader.read_to_end(&mut body)?;
    Ok(body)
}

// ============================================================
// 行游标
// ============================================================

/// 逻辑行游标
///
/// 行终止符可以是 `\n`、`\r\n` 或单独的 `\r`。行号从 1 开始。
struct LineCursor<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 0,
        }
    }

    /// 读取下一行，返回 (行号, 内容)
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        if self.pos >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.pos..];
        let end = rest.find(|c: char| c == '\n' || c == '\r').unwrap_or(rest.len());
        let line = &rest[..end];

        let mut advance = end;
        let bytes = rest.as_bytes();
        if end < bytes.len() {
            advance += if bytes[end] == b'\r' && bytes.get(end + 1) == Some(&b'\n') {
                2
            } else {
                1
            };
        }
        self.pos += advance;
        self.line += 1;
        Some((self.line, line))
    }

    /// 按剩余内容可容纳的行数截断段头声明的数量，用于预分配
    fn capacity_hint(&self, declared: usize) -> usize {
        let remaining = self.text.len().saturating_sub(self.pos);
        declared.min(remaining / MIN_RECORD_LEN + 1)
    }

    /// 读取段内下一行，文件提前结束时报错
    fn expect_line(&mut self, section: &'static str) -> MeshResult<(usize, &'a str)> {
        let next = self.line + 1;
        self.next_line()
            .ok_or_else(|| MeshError::malformed(section, next, "文件提前结束"))
    }

    /// 读取段头
    fn expect_header(&mut self, kind: SectionKind) -> MeshResult<usize> {
        let section = kind.keyword();
        let (line_no, line) = self.expect_line(section)?;
        parse_header(line, kind).ok_or_else(|| {
            MeshError::malformed(
                section,
                line_no,
                format!("期望 {} 段头, 实际为 '{}'", section, line.trim()),
            )
        })
    }
}

fn parse_token<T: std::str::FromStr>(
    token: &str,
    section: &'static str,
    line: usize,
    what: &str,
) -> MeshResult<T> {
    token
        .parse()
        .map_err(|_| MeshError::malformed(section, line, format!("{} '{}' 无法解析", what, token)))
}

// ============================================================
// 加载缓冲区
// ============================================================

/// 解析过程中持有的全部网格缓冲区
///
/// 任一步骤失败时整体丢弃，成功时一次性移交给 [`VelocityGrid`]。
#[derive(Default)]
struct MeshBuffers {
    vertices: Vec<WorldPoint>,
    depths: Vec<f64>,
    all_have_depth: bool,
    triangles: Vec<Triangle>,
    velocities: Vec<Velocity>,
    nodes: Vec<DagNode>,
    bounds: WorldRect,
}

impl MeshBuffers {
    fn read_vertices(&mut self, cursor: &mut LineCursor<'_>) -> MeshResult<()> {
        const SECTION: &str = "Vertices";
        let n = cursor.expect_header(SectionKind::Vertices)?;
        log::debug!("读取 {} 个顶点", n);

        let cap = cursor.capacity_hint(n);
        self.vertices.reserve_exact(cap);
        self.depths.reserve_exact(cap);
        self.all_have_depth = true;

        for _ in 0..n {
            let (line_no, line) = cursor.expect_line(SECTION)?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 || tokens.len() > 3 {
                return Err(MeshError::malformed(
                    SECTION,
                    line_no,
                    format!("顶点行需要 2 或 3 个字段, 实际 {}", tokens.len()),
                ));
            }
            let lon: f64 = parse_token(tokens[0], SECTION, line_no, "经度")?;
            let lat: f64 = parse_token(tokens[1], SECTION, line_no, "纬度")?;
            match tokens.get(2) {
                Some(t) => self.depths.push(parse_token(t, SECTION, line_no, "水深")?),
                None => self.all_have_depth = false,
            }

            let p = WorldPoint::from_degrees(lon, lat);
            self.bounds.add_point(p);
            self.vertices.push(p);
        }
        Ok(())
    }

    fn read_topology(&mut self, cursor: &mut LineCursor<'_>) -> MeshResult<()> {
        const SECTION: &str = "Topology";
        let n = cursor.expect_header(SectionKind::Topology)?;
        log::debug!("读取 {} 个三角形", n);

        let cap = cursor.capacity_hint(n);
        self.triangles.reserve_exact(cap);
        let mut with_velocity: Option<bool> = None;

        for _ in 0..n {
            let (line_no, line) = cursor.expect_line(SECTION)?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let has_velocity = match tokens.len() {
                6 => false,
                8 => true,
                k => {
                    return Err(MeshError::malformed(
                        SECTION,
                        line_no,
                        format!("拓扑行需要 6 或 8 个字段, 实际 {}", k),
                    ))
                }
            };
            match with_velocity {
                None => {
                    with_velocity = Some(has_velocity);
                    if has_velocity {
                        self.velocities.reserve_exact(cap);
                    }
                }
                Some(expected) if expected != has_velocity => {
                    return Err(MeshError::malformed(
                        SECTION,
                        line_no,
                        "同一文件中部分拓扑行缺少流速",
                    ));
                }
                Some(_) => {}
            }

            let mut vertices = [0u32; 3];
            for (k, v) in vertices.iter_mut().enumerate() {
                *v = parse_token(tokens[k], SECTION, line_no, "顶点索引")?;
            }
            let mut neighbors = [0i32; 3];
            for (k, nb) in neighbors.iter_mut().enumerate() {
                *nb = parse_token(tokens[3 + k], SECTION, line_no, "邻接索引")?;
            }
            self.triangles.push(Triangle::new(vertices, neighbors));

            if has_velocity {
                let u: f64 = parse_token(tokens[6], SECTION, line_no, "流速 u")?;
                let v: f64 = parse_token(tokens[7], SECTION, line_no, "流速 v")?;
                self.velocities.push(Velocity::new(u, v));
            }
        }

        if with_velocity == Some(false) {
            log::warn!("拓扑文件不含流速, 所有三角形流速为零");
        }
        Ok(())
    }

    fn read_dag_tree(&mut self, cursor: &mut LineCursor<'_>) -> MeshResult<()> {
        const SECTION: &str = "DAGTree";
        let n = cursor.expect_header(SectionKind::DagTree)?;
        log::debug!("读取 {} 个 DAG 节点", n);

        self.nodes.reserve_exact(cursor.capacity_hint(n));
        for _ in 0..n {
            let (line_no, line) = cursor.expect_line(SECTION)?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 3 {
                return Err(MeshError::malformed(
                    SECTION,
                    line_no,
                    format!("DAG 行需要 3 个字段, 实际 {}", tokens.len()),
                ));
            }
            let segment = parse_token(tokens[0], SECTION, line_no, "分割边")?;
            let left = parse_token(tokens[1], SECTION, line_no, "左子节点")?;
            let right = parse_token(tokens[2], SECTION, line_no, "右子节点")?;
            self.nodes.push(DagNode::new(segment, left, right));
        }
        Ok(())
    }

    /// 移交所有权，构建流速场
    fn into_grid(self) -> MeshResult<VelocityGrid> {
        let depths = self.all_have_depth.then_some(self.depths);
        let topology = MeshTopology::from_parts(
            self.vertices,
            depths,
            self.triangles,
            self.velocities,
            self.bounds,
        )?;
        let dag = DagIndex::build(self.nodes, topology.n_triangles())?;
        VelocityGrid::new(topology, dag)
    }
}

// ============================================================
// 加载器
// ============================================================

/// 扩展拓扑文件加载器
pub struct TopologyLoader;

impl TopologyLoader {
    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> MeshResult<VelocityGrid> {
        let path = path.as_ref();
        log::debug!("加载拓扑文件 {}", path.display());
        let body = read_topology_file(path)?;
        Self::parse(&body)
    }

    /// 从完整文件内容（含前导标记）加载
    pub fn load_from_slice(raw: &[u8]) -> MeshResult<VelocityGrid> {
        Self::parse(strip_preamble(raw)?)
    }

    /// 解析已去除前导标记的内容
    pub fn parse(body: &[u8]) -> MeshResult<VelocityGrid> {
        let text = std::str::from_utf8(body)
            .map_err(|e| MeshError::malformed("preamble", 0, format!("文件不是有效文本: {}", e)))?;
        let mut cursor = LineCursor::new(text);

        let mut buffers = MeshBuffers::default();
        buffers.read_vertices(&mut cursor)?;
        buffers.read_topology(&mut cursor)?;
        buffers.read_dag_tree(&mut cursor)?;

        let grid = buffers.into_grid()?;
        log::debug!(
            "拓扑加载完成: {} 顶点, {} 三角形, {} DAG 节点",
            grid.topology().n_vertices(),
            grid.topology().n_triangles(),
            grid.dag().n_nodes()
        );
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "DAG 1.0\n\
Vertices\t4\t4\n\
0.0 0.0 5.0\n\
1.0 0.0 5.0\n\
1.0 1.0 6.0\n\
0.0 1.0 6.0\n\
Topology\t2\n\
0 1 2 -1 1 -1 1.0 0.0\n\
0 2 3 -1 -1 0 0.0 -0.5\n\
DAGTree\t5\n\
2 1 3\n\
0 2 -1\n\
1 -1 -1\n\
4 4 -1\n\
5 -1 -1\n";

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("Vertices\t12\t4", SectionKind::Vertices), Some(12));
        assert_eq!(parse_header("vertices 3", SectionKind::Vertices), Some(3));
        assert_eq!(parse_header("Topology 3", SectionKind::Vertices), None);
        assert_eq!(parse_header("DAGTree x", SectionKind::DagTree), None);
        assert_eq!(parse_header("", SectionKind::DagTree), None);
    }

    #[test]
    fn test_strip_preamble() {
        assert_eq!(strip_preamble(b"DAG 1.0\r\n\r\nVertices 1").unwrap(), b"Vertices 1");
        assert_eq!(strip_preamble(b"XXXXXXXabc").unwrap(), b"abc");
        assert!(strip_preamble(b"DAG").is_err());
    }

    #[test]
    fn test_line_cursor_terminators() {
        let mut c = LineCursor::new("a\r\nb\rc\nd");
        assert_eq!(c.next_line(), Some((1, "a")));
        assert_eq!(c.next_line(), Some((2, "b")));
        assert_eq!(c.next_line(), Some((3, "c")));
        assert_eq!(c.next_line(), Some((4, "d")));
        assert_eq!(c.next_line(), None);
    }

    #[test]
    fn test_load_square() {
        let grid = TopologyLoader::load_from_slice(SQUARE.as_bytes()).unwrap();
        let topo = grid.topology();
        assert_eq!(topo.n_vertices(), 4);
        assert_eq!(topo.n_triangles(), 2);
        assert_eq!(topo.depths(), Some(&[5.0, 5.0, 6.0, 6.0][..]));
        assert_eq!(grid.dag().n_nodes(), 5);

        let v0 = grid.query(WorldPoint::from_degrees(0.75, 0.25)).unwrap();
        assert_eq!(v0, Velocity::new(1.0, 0.0));
        let v1 = grid.query(WorldPoint::from_degrees(0.25, 0.75)).unwrap();
        assert_eq!(v1, Velocity::new(0.0, -0.5));
    }

    #[test]
    fn test_out_of_order_section() {
        let text = "DAG 1.0\nTopology 1\n0 1 2 -1 -1 -1\n";
        let err = TopologyLoader::load_from_slice(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            MeshError::MalformedSection { section: "Vertices", line: 1, .. }
        ));
    }

    #[test]
    fn test_bad_vertex_line_reports_line() {
        let text = "DAG 1.0\nVertices 2\n0.0 0.0\n1.0 abc\n";
        let err = TopologyLoader::load_from_slice(text.as_bytes()).unwrap_err();
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_mixed_velocity_rejected() {
        let text = "DAG 1.0\nVertices 3\n0 0\n1 0\n0 1\nTopology 2\n0 1 2 -1 -1 -1 1 0\n0 1 2 -1 -1 -1\n";
        let err = TopologyLoader::load_from_slice(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            MeshError::MalformedSection { section: "Topology", line: 7, .. }
        ));
    }

    #[test]
    fn test_truncated_dag_block() {
        let text = "DAG 1.0\nVertices 3\n0 0\n1 0\n0 1\nTopology 1\n0 1 2 -1 -1 -1\nDAGTree 3\n0 1 -1\n";
        let err = TopologyLoader::load_from_slice(text.as_bytes()).unwrap_err();
        assert!(matches!(err, MeshError::MalformedSection { section: "DAGTree", .. }));
    }

    #[test]
    fn test_huge_header_count_is_malformed() {
        let text = "DAG 1.0\nVertices 18446744073709551615\n0 0\n";
        let err = TopologyLoader::load_from_slice(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            MeshError::MalformedSection { section: "Vertices", line: 3, .. }
        ));

        let text = "DAG 1.0\nVertices 3\n0 0\n1 0\n0 1\nTopology 4000000000\n0 1 2 -1 -1 -1 1 0\n";
        let err = TopologyLoader::load_from_slice(text.as_bytes()).unwrap_err();
        assert!(matches!(err, MeshError::MalformedSection { section: "Topology", .. }));

        let text = "DAG 1.0\nVertices 3\n0 0\n1 0\n0 1\nTopology 1\n0 1 2 -1 -1 -1\nDAGTree 4000000000\n";
        let err = TopologyLoader::load_from_slice(text.as_bytes()).unwrap_err();
        assert!(matches!(err, MeshError::MalformedSection { section: "DAGTree", .. }));
    }

    #[test]
    fn test_capacity_hint_bounded_by_body() {
        let mut c = LineCursor::new("0 0\n1 0\n");
        assert_eq!(c.capacity_hint(usize::MAX), 5);
        assert_eq!(c.capacity_hint(2), 2);
        c.next_line();
        c.next_line();
        assert_eq!(c.capacity_hint(usize::MAX), 1);
    }

    #[test]
    fn test_index_out_of_range_is_corrupt() {
        let text = "DAG 1.0\nVertices 3\n0 0\n1 0\n0 1\nTopology 1\n0 1 9 -1 -1 -1\nDAGTree 1\n0 -1 -1\n";
        let err = TopologyLoader::load_from_slice(text.as_bytes()).unwrap_err();
        assert!(matches!(err, MeshError::CorruptTopology { .. }));
    }
}
