//! 导出配置
//!
//! JSON 格式，所有字段可省略：
//!
//! ```json
//! { "naming": "validated", "on_error": "collect_all", "missing_layer": "error", "jobs": 1 }
//! ```

use crate::error::ConfigError;
use crate::naming::NamingPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 批量导出遇到失败时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// 继续导出其余图层，汇总所有失败
    #[default]
    CollectAll,
    /// 第一次失败后停止
    FailFast,
}

/// 指定图层不存在时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingLayerPolicy {
    #[default]
    Error,
    /// 什么都不做，返回空报告
    Ignore,
}

/// 导出配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub naming: NamingPolicy,
    pub on_error: BatchPolicy,
    pub missing_layer: MissingLayerPolicy,
    /// 并行导出线程数，1 表示顺序执行
    pub jobs: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            naming: NamingPolicy::default(),
            on_error: BatchPolicy::default(),
            missing_layer: MissingLayerPolicy::default(),
            jobs: 1,
        }
    }
}

impl ExportConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!("Loaded export config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::Invalid("jobs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_batch_policy(mut self, on_error: BatchPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_missing_layer(mut self, missing_layer: MissingLayerPolicy) -> Self {
        self.missing_layer = missing_layer;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}
