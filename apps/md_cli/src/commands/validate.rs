// apps/md_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 验证运行配置，并加载其中引用的每个拓扑文件。

use anyhow::{bail, Result};
use clap::Args;
use md_config::{RunConfig, ScaleConfig};
use md_geo::WorldPoint;
use md_mover::Mover;
use std::path::PathBuf;
use tracing::{error, info, warn};

use super::{build_pattern, config_dir};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== MariDrift 配置验证 ===");

    let mut result = ValidationResult::default();
    println!("\n检查配置文件: {}", args.config.display());

    match RunConfig::from_file(&args.config) {
        Ok(config) => {
            println!("  ✓ 配置文件有效");
            validate_patterns(&config, &args.config, &mut result);
        }
        Err(e) => result.add_error(format!("配置无效: {}", e)),
    }

    print_validation_result(&result, args.strict)
}

fn validate_patterns(config: &RunConfig, path: &std::path::Path, result: &mut ValidationResult) {
    let base_dir = config_dir(path);

    for name in config.unresolved_scale_references() {
        result.add_warning(format!("缩放引用的模式 '{}' 不存在，其缩放系数将为 0", name));
    }
    if config.particles.is_empty() {
        result.add_warning("没有初始粒子");
    }

    for map in &config.maps {
        for pattern_config in &map.patterns {
            println!("\n检查模式: {}/{}", map.name, pattern_config.name);
            let pattern = match build_pattern(pattern_config, base_dir, None) {
                Ok(p) => p,
                Err(e) => {
                    result.add_error(format!("{}: {:#}", pattern_config.name, e));
                    continue;
                }
            };

            let stats = pattern.grid().statistics();
            println!(
                "  ✓ {} 个三角形, DAG 深度 {}",
                stats.n_triangles, stats.max_depth
            );
            if !stats.has_velocity {
                result.add_warning(format!("{}: 拓扑文件不含流速", pattern.name()));
            }
            if let Some(ts) = &pattern_config.time_series {
                println!(
                    "  ✓ 时间序列 {} 点, 外推模式 {}{}",
                    ts.points.len(),
                    ts.extrapolation.name(),
                    if ts.active { "" } else { " (已停用)" }
                );
            }

            let ref_point = match &pattern_config.scale {
                ScaleConfig::None => None,
                ScaleConfig::Constant { ref_point, .. } | ScaleConfig::OtherGrid { ref_point, .. } => {
                    Some(WorldPoint::from_degrees(ref_point[0], ref_point[1]))
                }
            };
            if let Some(p) = ref_point {
                if pattern.grid().locate(p).is_err() {
                    result.add_warning(format!(
                        "{}: 缩放参考点 ({:.6}, {:.6}) 不在网格内",
                        pattern.name(),
                        p.long_degrees(),
                        p.lat_degrees()
                    ));
                }
            }
        }
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    // 输出错误
    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
            println!("  ✗ {}", err);
        }
    }

    // 输出警告
    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    let success = if strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };

    if success {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
