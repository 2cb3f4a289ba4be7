// apps/md_cli/src/commands/run.rs

//! 运行模拟命令
//!
//! 按配置组装注册表后执行外层步进循环：
//! 所有移动器准备 → 逐粒子累加各移动器位移 → 所有移动器结束本步。

use anyhow::{Context, Result};
use clap::Args;
use md_config::RunConfig;
use md_geo::{WorldPoint, WorldPoint3D};
use md_mover::{LeRef, Mover, PatternRegistry, SimulationClock, SimulationContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::{build_registry, config_dir};

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 覆盖运行步数
    #[arg(long)]
    pub steps: Option<usize>,

    /// 输出间隔（步）
    #[arg(long, default_value = "0")]
    pub report_every: usize,
}

/// 粒子状态
struct Particles {
    forecast: Vec<WorldPoint>,
    uncertain: Vec<WorldPoint>,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== MariDrift 模拟启动 ===");

    let config = RunConfig::from_file(&args.config)
        .with_context(|| format!("无法读取配置: {}", args.config.display()))?;
    let registry = build_registry(&config, config_dir(&args.config))?;
    info!(
        "地图 {} 张, 移动器 {} 个, 粒子 {} 个, 不确定性: {}",
        registry.maps().len(),
        registry.n_movers(),
        config.particles.len(),
        config.uncertain
    );

    let start_points = config.particle_points();
    let mut particles = Particles {
        uncertain: if config.uncertain {
            start_points.clone()
        } else {
            Vec::new()
        },
        forecast: start_points,
    };
    let set_sizes = if config.uncertain {
        vec![particles.uncertain.len()]
    } else {
        Vec::new()
    };

    let n_steps = args.steps.unwrap_or_else(|| config.n_steps());
    let mut clock = SimulationClock::new(config.start_time, config.time_step);
    let start = Instant::now();

    info!("开始模拟: {} 步, 时间步长={} s", n_steps, config.time_step);

    for step in 0..n_steps {
        let mut ctx = SimulationContext::new(clock, &registry);
        if config.uncertain {
            ctx = ctx.with_uncertainty(&set_sizes);
        }
        run_step(&registry, &ctx, &mut particles);

        if args.report_every > 0 && (step + 1) % args.report_every == 0 {
            info!("t={:.0} s: 完成第 {} 步", clock.model_time + clock.time_step, step + 1);
        }
        clock.advance();
    }

    info!("=== 模拟完成 ===");
    info!("总步数: {}", n_steps);
    info!("计算时间: {:.3} s", start.elapsed().as_secs_f64());

    print_positions("预报粒子", &particles.forecast);
    if config.uncertain {
        print_positions("不确定性粒子", &particles.uncertain);
    }
    Ok(())
}

/// 单步：准备 → 位移 → 结束
fn run_step(registry: &PatternRegistry, ctx: &SimulationContext<'_>, particles: &mut Particles) {
    let dt = ctx.clock.time_step;

    // 准备失败的移动器本步不贡献位移
    let prepared: Vec<&Arc<dyn Mover>> = registry
        .movers()
        .filter(|mover| match mover.prepare_step(ctx) {
            Ok(()) => true,
            Err(e) => {
                warn!("移动器 '{}' 在 t={} 准备失败: {}", mover.name(), ctx.clock.model_time, e);
                false
            }
        })
        .collect();

    let total_move = |le: LeRef| {
        prepared.iter().fold(WorldPoint3D::ZERO, |acc, mover| {
            let d = mover.get_move(ctx, &le, dt);
            WorldPoint3D {
                p: acc.p + d.p,
                z: acc.z + d.z,
            }
        })
    };

    // 同一步内所有移动器都以步初位置计算
    let forecast_moves: Vec<_> = particles
        .forecast
        .iter()
        .enumerate()
        .map(|(i, &p)| total_move(LeRef::forecast(i, p)))
        .collect();
    let uncertain_moves: Vec<_> = particles
        .uncertain
        .iter()
        .enumerate()
        .map(|(i, &p)| total_move(LeRef::uncertainty(0, i, p)))
        .collect();

    for (p, d) in particles.forecast.iter_mut().zip(&forecast_moves) {
        *p = p.offset_by(d);
    }
    for (p, d) in particles.uncertain.iter_mut().zip(&uncertain_moves) {
        *p = p.offset_by(d);
    }

    for mover in registry.movers() {
        mover.step_done();
    }
}

fn print_positions(title: &str, points: &[WorldPoint]) {
    println!("\n=== {} ({}) ===", title, points.len());
    println!("{:>6} {:>14} {:>14}", "#", "经度", "纬度");
    for (i, p) in points.iter().enumerate() {
        println!("{:>6} {:>14.6} {:>14.6}", i, p.long_degrees(), p.lat_degrees());
    }
}
