//! 内存几何引擎
//!
//! 记录保存在内存中的 [`GeometryEngine`] 实现，行为与文件引擎一致：
//! 目标中已存在的名称视为冲突，名称校验按不区分大小写的方式消除重名。
//! 可以为指定输出名注入失败，便于测试批量导出的错误收集。

use crate::catalog::LAYER_FIELD;
use crate::dataset::{DestinationRef, GeometryKind, SubCollection};
use crate::engine::{AttributeScan, GeometryEngine};
use crate::error::{DestinationError, SourceReadError};
use crate::naming::{first_free_name, sanitize_identifier};
use crate::predicate::SelectionPredicate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// 一条几何记录（几何本身省略，只保留类型与属性）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub kind: GeometryKind,
    pub layer: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    pub fn new(kind: GeometryKind, layer: impl Into<String>) -> Self {
        Self {
            kind,
            layer: Some(layer.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// 图层属性为空值的记录
    pub fn unset(kind: GeometryKind) -> Self {
        Self {
            kind,
            layer: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    fn field(&self, field: &str) -> Option<&str> {
        if field == LAYER_FIELD {
            self.layer.as_deref()
        } else {
            self.attributes.get(field).map(String::as_str)
        }
    }
}

type Datasets = BTreeMap<String, Vec<Record>>;

/// 内存引擎
#[derive(Debug, Default)]
pub struct MemoryEngine {
    sources: HashMap<String, Vec<Record>>,
    destinations: Mutex<HashMap<String, Datasets>>,
    failures: HashMap<String, DestinationError>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册数据源
    pub fn with_source(mut self, location: impl Into<String>, records: Vec<Record>) -> Self {
        self.sources.insert(location.into(), records);
        self
    }

    /// 预置目标中已存在的数据集
    pub fn with_dataset(
        self,
        destination: &DestinationRef,
        name: impl Into<String>,
        records: Vec<Record>,
    ) -> Self {
        self.lock()
            .entry(destination.location.clone())
            .or_default()
            .insert(name.into(), records);
        self
    }

    /// 导出到指定输出名时返回给定错误
    pub fn fail_export(mut self, output_name: impl Into<String>, error: DestinationError) -> Self {
        self.failures.insert(output_name.into(), error);
        self
    }

    /// 读取目标中的数据集
    pub fn dataset(&self, destination: &DestinationRef, name: &str) -> Option<Vec<Record>> {
        self.lock()
            .get(&destination.location)
            .and_then(|datasets| datasets.get(name).cloned())
    }

    /// 目标中所有数据集名称（升序）
    pub fn dataset_names(&self, destination: &DestinationRef) -> Vec<String> {
        self.lock()
            .get(&destination.location)
            .map(|datasets| datasets.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Datasets>> {
        self.destinations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn records(&self, location: &str) -> Result<&Vec<Record>, SourceReadError> {
        self.sources
            .get(location)
            .ok_or_else(|| SourceReadError::Unreadable {
                location: location.to_string(),
                reason: "no such source".to_string(),
            })
    }
}

impl GeometryEngine for MemoryEngine {
    fn scan_attribute<'a>(
        &'a self,
        source: &SubCollection,
        field: &str,
    ) -> Result<AttributeScan<'a>, SourceReadError> {
        let records = self.records(&source.location)?;

        if field != LAYER_FIELD && !records.iter().any(|r| r.attributes.contains_key(field)) {
            return Err(SourceReadError::MissingField {
                location: source.location.clone(),
                field: field.to_string(),
            });
        }

        let kind = source.kind;
        let field = field.to_string();
        Ok(Box::new(
            records
                .iter()
                .filter(move |r| r.kind == kind)
                .map(move |r| Ok(r.field(&field).map(str::to_string))),
        ))
    }

    fn select_and_export(
        &self,
        source: &SubCollection,
        destination: &DestinationRef,
        output_name: &str,
        predicate: &SelectionPredicate,
    ) -> Result<u64, DestinationError> {
        if let Some(error) = self.failures.get(output_name) {
            return Err(error.clone());
        }

        let records = self
            .records(&source.location)
            .map_err(|e| DestinationError::Storage(e.to_string()))?;

        let selected: Vec<Record> = records
            .iter()
            .filter(|r| r.kind == source.kind && predicate.matches(r.field(predicate.field())))
            .cloned()
            .collect();

        let mut destinations = self.lock();
        let datasets = destinations.entry(destination.location.clone()).or_default();
        if datasets.contains_key(output_name) {
            return Err(DestinationError::NameCollision(output_name.to_string()));
        }

        let count = selected.len() as u64;
        datasets.insert(output_name.to_string(), selected);
        Ok(count)
    }

    fn validate_name(
        &self,
        candidate: &str,
        destination: &DestinationRef,
    ) -> Result<String, DestinationError> {
        let base = sanitize_identifier(candidate);
        let destinations = self.lock();
        let existing: Vec<String> = destinations
            .get(&destination.location)
            .map(|datasets| datasets.keys().map(|k| k.to_lowercase()).collect())
            .unwrap_or_default();

        Ok(first_free_name(&base, |name| {
            existing.contains(&name.to_lowercase())
        }))
    }
}
