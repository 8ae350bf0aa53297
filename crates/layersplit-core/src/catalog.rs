//! 图层目录
//!
//! 一次完整扫描数据源的 `Layer` 属性列，得到去重、排序后的图层条目。
//!
//! - 条目身份为 `(几何类型, 原始名称)`，同名图层出现在不同子集中时各自成为独立条目
//! - 排序：原始名称升序，同名按几何类型升序
//! - 空值和空串不进入目录，只计数；纯空白的名称是合法图层名

use crate::dataset::{GeometryKind, SourceRef, SubCollection};
use crate::engine::GeometryEngine;
use crate::error::SourceReadError;
use crate::predicate::SelectionPredicate;
use std::collections::{BTreeMap, BTreeSet};

/// 图层属性字段名
pub const LAYER_FIELD: &str = "Layer";

/// 条目的复合键
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerKey {
    pub kind: GeometryKind,
    pub name: String,
}

impl LayerKey {
    pub fn new(kind: GeometryKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// 目录中的一个图层
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    name: String,
    source: SubCollection,
    /// 同名图层存在于多个子集时，输出名附加几何类型
    qualified: bool,
}

impl LayerEntry {
    /// 原始图层名
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SubCollection {
        &self.source
    }

    pub fn kind(&self) -> GeometryKind {
        self.source.kind
    }

    pub fn key(&self) -> LayerKey {
        LayerKey::new(self.source.kind, self.name.clone())
    }

    /// 命名策略处理之前的输出名
    pub fn candidate_name(&self) -> String {
        if self.qualified {
            format!("{}_{}", self.name, self.source.kind.name())
        } else {
            self.name.clone()
        }
    }

    /// `Layer = '<name>'`
    pub fn predicate(&self) -> SelectionPredicate {
        SelectionPredicate::equals(LAYER_FIELD, self.name.as_str())
    }
}

/// 去重排序后的图层目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerCatalog {
    location: String,
    entries: Vec<LayerEntry>,
    excluded_nulls: usize,
}

impl LayerCatalog {
    /// 扫描数据源的所有子集，构建目录
    ///
    /// 任一子集不可读或缺少图层字段时整体失败，不返回部分结果。
    pub fn build<E: GeometryEngine + ?Sized>(
        engine: &E,
        source: &SourceRef,
    ) -> Result<Self, SourceReadError> {
        let mut found: BTreeSet<(String, GeometryKind)> = BTreeSet::new();
        let mut excluded_nulls = 0;

        for sub in source.sub_collections() {
            let mut records = 0usize;
            let mut nulls = 0usize;

            for value in engine.scan_attribute(&sub, LAYER_FIELD)? {
                records += 1;
                match value? {
                    Some(name) if !name.is_empty() => {
                        found.insert((name, sub.kind));
                    }
                    _ => nulls += 1,
                }
            }

            if nulls > 0 {
                tracing::debug!("Excluded {} records with empty {} in {}", nulls, LAYER_FIELD, sub);
            }
            tracing::debug!("Scanned {} records in {}", records, sub);
            excluded_nulls += nulls;
        }

        // 统计每个名称出现在几个子集中
        let mut kinds_per_name: BTreeMap<&str, usize> = BTreeMap::new();
        for (name, _) in &found {
            *kinds_per_name.entry(name.as_str()).or_default() += 1;
        }

        let entries: Vec<LayerEntry> = found
            .iter()
            .map(|(name, kind)| LayerEntry {
                name: name.clone(),
                source: SubCollection::new(source.location(), *kind),
                qualified: kinds_per_name.get(name.as_str()).copied().unwrap_or(0) > 1,
            })
            .collect();

        if excluded_nulls > 0 {
            tracing::info!(
                "Excluded {} records without a {} value from {}",
                excluded_nulls,
                LAYER_FIELD,
                source.location()
            );
        }
        tracing::info!("Found {} layers in {}", entries.len(), source.location());

        Ok(Self {
            location: source.location().to_string(),
            entries,
            excluded_nulls,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn entries(&self) -> &[LayerEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayerEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 被排除的空值记录数
    pub fn excluded_nulls(&self) -> usize {
        self.excluded_nulls
    }

    /// 原始名称完全相等的所有条目（每个子集至多一个）
    pub fn find(&self, name: &str) -> Vec<&LayerEntry> {
        self.entries.iter().filter(|e| e.name == name).collect()
    }

    pub fn get(&self, key: &LayerKey) -> Option<&LayerEntry> {
        self.entries
            .iter()
            .find(|e| e.source.kind == key.kind && e.name == key.name)
    }

    /// 去重后的原始名称（升序）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
        names.dedup();
        names
    }
}

impl<'a> IntoIterator for &'a LayerCatalog {
    type Item = &'a LayerEntry;
    type IntoIter = std::slice::Iter<'a, LayerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
