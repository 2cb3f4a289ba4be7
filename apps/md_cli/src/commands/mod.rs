// apps/md_cli/src/commands/mod.rs

//! 子命令

pub mod info;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use md_config::{PatternConfig, RunConfig};
use md_mover::{CurrentPattern, CurrentUncertaintyBuilder, PatternRegistry};
use std::path::Path;
use std::sync::Arc;

/// 按配置加载一个流场模式
pub fn build_pattern(
    config: &PatternConfig,
    base_dir: &Path,
    seed: Option<u64>,
) -> Result<CurrentPattern> {
    let path = config.resolved_topology(base_dir);
    let (policy, ref_point) = config.scale.to_policy();
    let builder = CurrentUncertaintyBuilder::new(config.uncertainty.to_params())
        .with_context(|| format!("模式 '{}' 的不确定性参数无效", config.name))?;

    let mut pattern = CurrentPattern::load(config.name.as_str(), &path)
        .with_context(|| format!("无法加载拓扑文件: {}", path.display()))?
        .with_scale_policy(policy, ref_point)
        .with_eddy(config.eddy_diffusion, config.eddy_v0)
        .with_uncertainty_builder(Box::new(builder))
        .with_active_range(config.active_start, config.active_stop);

    if let Some(ts) = &config.time_series {
        let scale = ts
            .build()
            .with_context(|| format!("模式 '{}' 的时间序列无效", config.name))?;
        pattern = pattern.with_time_series(Arc::new(scale));
        pattern.set_time_file_active(ts.active);
    }
    if let Some(seed) = seed {
        pattern = pattern.with_seed(seed);
    }
    pattern.set_on(config.on);
    Ok(pattern)
}

/// 按配置组装注册表
///
/// 每个模式的随机数种子为 `seed + 序号`。
pub fn build_registry(config: &RunConfig, base_dir: &Path) -> Result<PatternRegistry> {
    let mut registry = PatternRegistry::new();
    let mut index = 0u64;
    for map in &config.maps {
        let map_index = registry.add_map(map.name.as_str());
        for pattern in &map.patterns {
            let seed = config.seed.map(|s| s.wrapping_add(index));
            let built = build_pattern(pattern, base_dir, seed)?;
            registry.add_mover(map_index, Arc::new(built));
            index += 1;
        }
    }
    Ok(registry)
}

/// 配置文件所在目录
pub fn config_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}
