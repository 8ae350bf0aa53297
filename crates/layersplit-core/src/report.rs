//! 导出结果与批次报告

use crate::dataset::GeometryKind;
use crate::error::ExportError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

/// 一个图层导出成功
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub layer: String,
    pub kind: GeometryKind,
    pub output_name: String,
    pub records: u64,
}

/// 一个图层导出失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFailure {
    pub layer: String,
    pub kind: GeometryKind,
    pub output_name: Option<String>,
    pub reason: String,
}

impl From<&ExportError> for ExportFailure {
    fn from(error: &ExportError) -> Self {
        Self {
            layer: error.layer.clone(),
            kind: error.kind,
            output_name: error.output_name.clone(),
            reason: error.source.to_string(),
        }
    }
}

/// 批次报告
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 实际尝试导出的图层数
    pub attempted: usize,
    pub exported: Vec<ExportOutcome>,
    pub failures: Vec<ExportFailure>,
    /// 因取消或提前终止而未尝试的图层数
    pub skipped: usize,
    pub cancelled: bool,
    /// 快速失败策略下因失败而终止
    pub aborted: bool,
}

impl BatchReport {
    pub(crate) fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            attempted: 0,
            exported: Vec::new(),
            failures: Vec::new(),
            skipped: 0,
            cancelled: false,
            aborted: false,
        }
    }

    pub(crate) fn record(&mut self, result: Result<ExportOutcome, ExportError>) {
        self.attempted += 1;
        match result {
            Ok(outcome) => self.exported.push(outcome),
            Err(error) => {
                tracing::warn!("{}", error);
                self.failures.push(ExportFailure::from(&error));
            }
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        tracing::info!(
            "Exported {} of {} layers ({} failed, {} skipped)",
            self.succeeded(),
            self.attempted,
            self.failures.len(),
            self.skipped
        );
        self
    }

    pub fn succeeded(&self) -> usize {
        self.exported.len()
    }

    /// 全部尝试成功且没有跳过
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0 && !self.cancelled
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 面向用户的多行摘要
    pub fn summary(&self) -> String {
        let mut out = format!(
            "attempted: {}, succeeded: {}, failed: {}",
            self.attempted,
            self.succeeded(),
            self.failures.len()
        );
        if self.skipped > 0 {
            let _ = write!(out, ", skipped: {}", self.skipped);
        }
        if self.cancelled {
            out.push_str(" (cancelled)");
        }
        if self.aborted {
            out.push_str(" (stopped after first failure)");
        }
        for failure in &self.failures {
            let _ = write!(
                out,
                "\n  {} [{}] -> {}: {}",
                failure.layer,
                failure.kind,
                failure.output_name.as_deref().unwrap_or("-"),
                failure.reason
            );
        }
        out
    }
}
