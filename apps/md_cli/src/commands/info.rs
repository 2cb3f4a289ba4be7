// apps/md_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示拓扑文件的网格统计，可选地查询测点流速。

use anyhow::{Context, Result};
use clap::Args;
use md_geo::WorldPoint;
use md_mover::{CurrentPattern, Mover};
use std::path::PathBuf;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 拓扑文件路径
    #[arg(short, long)]
    pub topology: PathBuf,

    /// 测点 经度 纬度（度）
    #[arg(long, num_args = 2, value_names = ["LON", "LAT"], allow_negative_numbers = true)]
    pub probe: Option<Vec<f64>>,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== MariDrift 拓扑信息 ===");

    let name = args
        .topology
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pattern".to_string());
    let pattern = CurrentPattern::load(name, &args.topology)
        .with_context(|| format!("无法加载拓扑文件: {}", args.topology.display()))?;

    print_statistics(&pattern);

    if let Some(probe) = &args.probe {
        println!();
        print_probe(&pattern, WorldPoint::from_degrees(probe[0], probe[1]));
    }

    Ok(())
}

fn print_statistics(pattern: &CurrentPattern) {
    let stats = pattern.grid().statistics();
    let b = stats.bounds;

    println!("=== 网格统计 ===");
    println!("名称: {}", pattern.name());
    println!("顶点数: {}", stats.n_vertices);
    println!("三角形数: {}", stats.n_triangles);
    println!("DAG 节点数: {}", stats.n_nodes);
    println!("DAG 最大深度: {}", stats.max_depth);
    println!("含流速: {}", if stats.has_velocity { "是" } else { "否" });
    println!(
        "包围盒: 经度 [{:.6}, {:.6}], 纬度 [{:.6}, {:.6}]",
        f64::from(b.lo_long) / 1e6,
        f64::from(b.hi_long) / 1e6,
        f64::from(b.lo_lat) / 1e6,
        f64::from(b.hi_lat) / 1e6
    );
}

fn print_probe(pattern: &CurrentPattern, p: WorldPoint) {
    println!("=== 测点 ({:.6}, {:.6}) ===", p.long_degrees(), p.lat_degrees());
    match pattern.velocity_at(p) {
        Ok((unscaled, scaled)) => {
            println!(
                "[grid: {}, unscaled: {:.4} m/s, scaled: {:.4} m/s]",
                pattern.name(),
                unscaled,
                scaled
            );
        }
        Err(e) => println!("无法查询: {}", e),
    }
}
