//! 错误定义

use crate::dataset::GeometryKind;
use thiserror::Error;

/// 读取数据源失败，整个操作中止
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceReadError {
    #[error("Cannot read source '{location}': {reason}")]
    Unreadable { location: String, reason: String },

    #[error("Field '{field}' not found in source '{location}'")]
    MissingField { location: String, field: String },

    #[error("Invalid source format '{location}': {reason}")]
    InvalidFormat { location: String, reason: String },
}

/// 目标工作空间拒绝写入
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    #[error("Output name already exists: {0}")]
    NameCollision(String),

    #[error("Invalid output name: {0}")]
    InvalidName(String),

    #[error("Invalid selection predicate: {0}")]
    InvalidPredicate(String),

    #[error("Destination unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// 单个图层导出失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Export of layer '{layer}' ({kind}) failed: {source}")]
pub struct ExportError {
    pub layer: String,
    pub kind: GeometryKind,
    pub output_name: Option<String>,
    #[source]
    pub source: DestinationError,
}

/// 指定的图层名不在目录中
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Layer not found: {layer}")]
pub struct LayerNotFoundError {
    pub layer: String,
}

/// 配置加载失败
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// 汇总错误
#[derive(Error, Debug)]
pub enum SplitError {
    #[error(transparent)]
    Source(#[from] SourceReadError),

    #[error(transparent)]
    LayerNotFound(#[from] LayerNotFoundError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
