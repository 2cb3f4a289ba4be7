// crates/md_mover/src/registry.rs

//! 流场模式注册表
//!
//! 按地图分组保存所有移动器。按名称查找流场模式时，
//! 依地图顺序、再按地图内顺序枚举，取第一个匹配项。

use crate::pattern::CurrentPattern;
use crate::traits::{Mover, MoverKind};
use std::sync::Arc;

/// 一张地图及其移动器
pub struct MapEntry {
    name: String,
    movers: Vec<Arc<dyn Mover>>,
}

impl MapEntry {
    /// 地图名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 地图下的移动器
    pub fn movers(&self) -> &[Arc<dyn Mover>] {
        &self.movers
    }
}

/// 移动器注册表
#[derive(Default)]
pub struct PatternRegistry {
    maps: Vec<MapEntry>,
}

impl PatternRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加地图，返回其索引
    pub fn add_map(&mut self, name: impl Into<String>) -> usize {
        self.maps.push(MapEntry {
            name: name.into(),
            movers: Vec::new(),
        });
        self.maps.len() - 1
    }

    /// 向指定地图添加移动器
    ///
    /// 地图索引无效时返回 `false`。
    pub fn add_mover(&mut self, map_index: usize, mover: Arc<dyn Mover>) -> bool {
        match self.maps.get_mut(map_index) {
            Some(map) => {
                log::debug!("地图 '{}' 添加移动器 '{}'", map.name, mover.name());
                map.movers.push(mover);
                true
            }
            None => false,
        }
    }

    /// 所有地图
    pub fn maps(&self) -> &[MapEntry] {
        &self.maps
    }

    /// 按枚举顺序遍历全部移动器
    pub fn movers(&self) -> impl Iterator<Item = &Arc<dyn Mover>> + '_ {
        self.maps.iter().flat_map(|m| m.movers.iter())
    }

    /// 移动器总数
    pub fn n_movers(&self) -> usize {
        self.maps.iter().map(|m| m.movers.len()).sum()
    }

    /// 按名称查找流场模式
    ///
    /// `exclude` 指向的模式（通常是调用者自身）被跳过。
    pub fn find_current_pattern(
        &self,
        name: &str,
        exclude: Option<&CurrentPattern>,
    ) -> Option<&CurrentPattern> {
        self.movers()
            .filter(|m| m.kind() == MoverKind::CurrentPattern)
            .filter_map(|m| m.as_current_pattern())
            .filter(|p| exclude.map_or(true, |me| !std::ptr::eq(*p, me)))
            .find(|p| p.name() == name)
    }
}
