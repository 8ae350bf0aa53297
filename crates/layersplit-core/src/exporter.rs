//! 图层导出
//!
//! 对每个图层条目派生输出名和选择谓词，再调用引擎的选择导出原语。
//!
//! 批量导出分两步：
//! 1. 按目录顺序依次确定输出名，保证同一批次内不会出现重名
//! 2. 逐个导出（`jobs > 1` 时在独立的 rayon 线程池中并行），结果按目录顺序汇总

use crate::cancel::CancellationToken;
use crate::catalog::{LayerCatalog, LayerEntry};
use crate::config::{BatchPolicy, ExportConfig, MissingLayerPolicy};
use crate::dataset::DestinationRef;
use crate::engine::GeometryEngine;
use crate::error::{DestinationError, ExportError, LayerNotFoundError};
use crate::naming::{conservative_name, numbered, NamingPolicy};
use crate::report::{BatchReport, ExportOutcome};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// 批次内重名时最多尝试的编号
const MAX_RENAME_ATTEMPTS: usize = 1000;

/// 已确定输出名（或命名失败）的导出任务
struct ExportJob<'c> {
    entry: &'c LayerEntry,
    output_name: Result<String, ExportError>,
}

/// 导出器
pub struct Exporter<'a, E: GeometryEngine + ?Sized> {
    engine: &'a E,
    config: ExportConfig,
    cancel: CancellationToken,
}

impl<'a, E: GeometryEngine + ?Sized> Exporter<'a, E> {
    pub fn new(engine: &'a E, config: ExportConfig) -> Self {
        Self {
            engine,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// 使用外部取消标记
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 按命名策略派生输出名
    pub fn resolve_name(
        &self,
        entry: &LayerEntry,
        destination: &DestinationRef,
    ) -> Result<String, ExportError> {
        let candidate = entry.candidate_name();
        match self.config.naming {
            NamingPolicy::Conservative => Ok(conservative_name(&candidate)),
            NamingPolicy::Validated => self
                .engine
                .validate_name(&candidate, destination)
                .map_err(|e| export_error(entry, None, e)),
        }
    }

    /// 导出单个图层，`output_name` 为空时使用派生名
    pub fn export_one(
        &self,
        entry: &LayerEntry,
        destination: &DestinationRef,
        output_name: Option<&str>,
    ) -> Result<ExportOutcome, ExportError> {
        let name = match output_name {
            Some(name) => name.to_string(),
            None => self.resolve_name(entry, destination)?,
        };
        self.run(entry, destination, &name)
    }

    /// 按目录顺序导出全部图层
    pub fn export_all(&self, catalog: &LayerCatalog, destination: &DestinationRef) -> BatchReport {
        self.export_entries(catalog.iter(), destination)
    }

    /// 导出原始名称等于 `layer` 的所有条目（每个几何子集一个）
    pub fn export_layer(
        &self,
        catalog: &LayerCatalog,
        layer: &str,
        destination: &DestinationRef,
    ) -> Result<BatchReport, LayerNotFoundError> {
        self.export_layers(catalog, &[layer], destination)
    }

    /// 导出多个指定图层，作为一个批次按目录顺序执行
    pub fn export_layers<S: AsRef<str>>(
        &self,
        catalog: &LayerCatalog,
        layers: &[S],
        destination: &DestinationRef,
    ) -> Result<BatchReport, LayerNotFoundError> {
        for layer in layers {
            let layer = layer.as_ref();
            if catalog.find(layer).is_empty() {
                match self.config.missing_layer {
                    MissingLayerPolicy::Error => {
                        return Err(LayerNotFoundError {
                            layer: layer.to_string(),
                        })
                    }
                    MissingLayerPolicy::Ignore => {
                        tracing::warn!("Layer '{}' not found in {}, ignored", layer, catalog.location());
                    }
                }
            }
        }

        let selected = catalog
            .iter()
            .filter(|entry| layers.iter().any(|l| l.as_ref() == entry.name()));
        Ok(self.export_entries(selected, destination))
    }

    fn export_entries<'c>(
        &self,
        entries: impl IntoIterator<Item = &'c LayerEntry>,
        destination: &DestinationRef,
    ) -> BatchReport {
        let mut report = BatchReport::start();
        let jobs = self.plan(entries, destination);

        tracing::info!("Exporting {} layers to {}", jobs.len(), destination);

        if self.config.jobs > 1 && jobs.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
            {
                Ok(pool) => self.export_parallel(&pool, jobs, destination, &mut report),
                Err(e) => {
                    tracing::warn!("Failed to build export thread pool, exporting sequentially: {}", e);
                    self.export_sequential(jobs, destination, &mut report);
                }
            }
        } else {
            self.export_sequential(jobs, destination, &mut report);
        }

        report.finish()
    }

    /// 依次确定输出名
    fn plan<'c>(
        &self,
        entries: impl IntoIterator<Item = &'c LayerEntry>,
        destination: &DestinationRef,
    ) -> Vec<ExportJob<'c>> {
        let mut taken: HashSet<String> = HashSet::new();

        entries
            .into_iter()
            .map(|entry| ExportJob {
                entry,
                output_name: self.plan_name(entry, destination, &mut taken),
            })
            .collect()
    }

    fn plan_name(
        &self,
        entry: &LayerEntry,
        destination: &DestinationRef,
        taken: &mut HashSet<String>,
    ) -> Result<String, ExportError> {
        let name = self.resolve_name(entry, destination)?;

        // 保守策略按原名比较，大小写是否冲突交给目标判断
        if self.config.naming == NamingPolicy::Conservative {
            if taken.insert(name.clone()) {
                return Ok(name);
            }
            return Err(export_error(
                entry,
                Some(name.clone()),
                DestinationError::NameCollision(name),
            ));
        }

        // 校验后的名称按不区分大小写去重
        if taken.insert(name.to_lowercase()) {
            return Ok(name);
        }

        for n in 1..=MAX_RENAME_ATTEMPTS {
            let candidate = self
                .engine
                .validate_name(&numbered(&name, n), destination)
                .map_err(|e| export_error(entry, None, e))?;
            if taken.insert(candidate.to_lowercase()) {
                tracing::debug!("Renamed '{}' to '{}' to avoid a collision", name, candidate);
                return Ok(candidate);
            }
        }

        Err(export_error(entry, Some(name.clone()), DestinationError::NameCollision(name)))
    }

    fn export_sequential(
        &self,
        jobs: Vec<ExportJob<'_>>,
        destination: &DestinationRef,
        report: &mut BatchReport,
    ) {
        let total = jobs.len();

        for (index, job) in jobs.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!("Export cancelled, {} layers skipped", total - index);
                report.cancelled = true;
                report.skipped = total - index;
                break;
            }

            let result = self.execute(job, destination);
            let failed = result.is_err();
            report.record(result);

            if failed && self.config.on_error == BatchPolicy::FailFast {
                report.aborted = true;
                report.skipped = total - index - 1;
                break;
            }
        }
    }

    fn export_parallel(
        &self,
        pool: &ThreadPool,
        jobs: Vec<ExportJob<'_>>,
        destination: &DestinationRef,
        report: &mut BatchReport,
    ) {
        let stop = AtomicBool::new(false);
        let fail_fast = self.config.on_error == BatchPolicy::FailFast;

        let results: Vec<Option<Result<ExportOutcome, ExportError>>> = pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    if self.cancel.is_cancelled() || stop.load(Ordering::Acquire) {
                        return None;
                    }
                    let result = self.execute(job, destination);
                    if result.is_err() && fail_fast {
                        stop.store(true, Ordering::Release);
                    }
                    Some(result)
                })
                .collect()
        });

        for result in results {
            match result {
                Some(result) => report.record(result),
                None => report.skipped += 1,
            }
        }

        report.aborted = stop.load(Ordering::Acquire);
        report.cancelled = self.cancel.is_cancelled() && report.skipped > 0;
    }

    fn execute(&self, job: ExportJob<'_>, destination: &DestinationRef) -> Result<ExportOutcome, ExportError> {
        let name = job.output_name?;
        self.run(job.entry, destination, &name)
    }

    fn run(
        &self,
        entry: &LayerEntry,
        destination: &DestinationRef,
        output_name: &str,
    ) -> Result<ExportOutcome, ExportError> {
        let predicate = entry.predicate();
        tracing::debug!("Selecting [{}] from {} into {}", predicate, entry.source(), output_name);

        let records = self
            .engine
            .select_and_export(entry.source(), destination, output_name, &predicate)
            .map_err(|e| export_error(entry, Some(output_name.to_string()), e))?;

        tracing::info!(
            "Exported layer '{}' ({}) as {} ({} records)",
            entry.name(),
            entry.kind(),
            output_name,
            records
        );

        Ok(ExportOutcome {
            layer: entry.name().to_string(),
            kind: entry.kind(),
            output_name: output_name.to_string(),
            records,
        })
    }
}

fn export_error(entry: &LayerEntry, output_name: Option<String>, source: DestinationError) -> ExportError {
    ExportError {
        layer: entry.name().to_string(),
        kind: entry.kind(),
        output_name,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{GeometryKind, SourceRef, SubCollection};
    use crate::engine::AttributeScan;
    use crate::error::SourceReadError;
    use crate::memory::{MemoryEngine, Record};
    use crate::predicate::SelectionPredicate;

    /// 第一次导出时触发取消的引擎
    struct CancelOnExport {
        inner: MemoryEngine,
        token: CancellationToken,
    }

    impl GeometryEngine for CancelOnExport {
        fn scan_attribute<'a>(
            &'a self,
            source: &SubCollection,
            field: &str,
        ) -> Result<AttributeScan<'a>, SourceReadError> {
            self.inner.scan_attribute(source, field)
        }

        fn select_and_export(
            &self,
            source: &SubCollection,
            destination: &DestinationRef,
            output_name: &str,
            predicate: &SelectionPredicate,
        ) -> Result<u64, DestinationError> {
            self.token.cancel();
            self.inner.select_and_export(source, destination, output_name, predicate)
        }

        fn validate_name(
            &self,
            candidate: &str,
            destination: &DestinationRef,
        ) -> Result<String, DestinationError> {
            self.inner.validate_name(candidate, destination)
        }
    }

    fn roads() -> Vec<Record> {
        vec![
            Record::new(GeometryKind::Line, "Road").with_attribute("Id", "1"),
            Record::new(GeometryKind::Line, "Road").with_attribute("Id", "2"),
            Record::new(GeometryKind::Line, "River").with_attribute("Id", "3"),
            Record::new(GeometryKind::Line, "River-Bank").with_attribute("Id", "4"),
        ]
    }

    fn roads_catalog(engine: &MemoryEngine) -> LayerCatalog {
        LayerCatalog::build(engine, &SourceRef::dataset("roads", GeometryKind::Line)).expect("catalog")
    }

    #[test]
    fn test_round_trip_export_all() {
        let engine = MemoryEngine::new().with_source("roads", roads());
        let dest = DestinationRef::new("gdb");
        let catalog = roads_catalog(&engine);

        let report = Exporter::new(&engine, ExportConfig::default()).export_all(&catalog, &dest);

        assert!(report.is_clean());
        assert_eq!(report.attempted, 3);
        assert_eq!(engine.dataset_names(&dest), vec!["River", "River_Bank", "Road"]);
        assert_eq!(engine.dataset(&dest, "River").map(|d| d.len()), Some(1));
        assert_eq!(engine.dataset(&dest, "River_Bank").map(|d| d.len()), Some(1));

        let road = engine.dataset(&dest, "Road").expect("road");
        let ids: Vec<&str> = road.iter().map(|r| r.attributes["Id"].as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(road.iter().all(|r| r.layer.as_deref() == Some("Road")));
    }

    #[test]
    fn test_conservative_naming() {
        let engine = MemoryEngine::new().with_source("roads", roads());
        let dest = DestinationRef::new("gdb");
        let catalog = roads_catalog(&engine);
        let config = ExportConfig::default().with_naming(NamingPolicy::Conservative);

        let report = Exporter::new(&engine, config).export_all(&catalog, &dest);

        let names: Vec<&str> = report.exported.iter().map(|o| o.output_name.as_str()).collect();
        assert_eq!(names, vec!["River", "River_Bank", "Road"]);
    }

    #[test]
    fn test_partial_failure_is_collected() {
        let engine = MemoryEngine::new()
            .with_source("roads", roads())
            .fail_export("River_Bank", DestinationError::Storage("quota exceeded".to_string()));
        let dest = DestinationRef::new("gdb");
        let catalog = roads_catalog(&engine);

        let report = Exporter::new(&engine, ExportConfig::default()).export_all(&catalog, &dest);

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].layer, "River-Bank");
        assert_eq!(report.failures[0].output_name.as_deref(), Some("River_Bank"));
        assert!(report.failures[0].reason.contains("quota exceeded"));
        assert!(!report.aborted);
        assert!(engine.dataset(&dest, "River").is_some());
        assert!(engine.dataset(&dest, "Road").is_some());
        assert!(engine.dataset(&dest, "River_Bank").is_none());
    }

    #[test]
    fn test_fail_fast_stops_after_first_failure() {
        let engine = MemoryEngine::new()
            .with_source("roads", roads())
            .fail_export("River_Bank", DestinationError::Unavailable("gdb".to_string()));
        let dest = DestinationRef::new("gdb");
        let catalog = roads_catalog(&engine);
        let config = ExportConfig::default().with_batch_policy(BatchPolicy::FailFast);

        let report = Exporter::new(&engine, config).export_all(&catalog, &dest);

        assert!(report.aborted);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.skipped, 1);
        assert!(engine.dataset(&dest, "Road").is_none());
    }

    #[test]
    fn test_export_single_layer() {
        let engine = MemoryEngine::new().with_source("roads", roads());
        let dest = DestinationRef::new("gdb");
        let catalog = roads_catalog(&engine);
        let exporter = Exporter::new(&engine, ExportConfig::default());

        let report = exporter.export_layer(&catalog, "Road", &dest).expect("road");
        assert_eq!(report.succeeded(), 1);
        assert_eq!(engine.dataset_names(&dest), vec!["Road"]);

        let err = exporter.export_layer(&catalog, "Sidewalk", &dest).unwrap_err();
        assert_eq!(err.layer, "Sidewalk");
    }

    #[test]
    fn test_missing_layer_ignored() {
        let engine = MemoryEngine::new().with_source("roads", roads());
        let dest = DestinationRef::new("gdb");
        let catalog = roads_catalog(&engine);
        let config = ExportConfig::default().with_missing_layer(MissingLayerPolicy::Ignore);

        let report = Exporter::new(&engine, config)
            .export_layer(&catalog, "Sidewalk", &dest)
            .expect("no-op");
        assert_eq!(report.attempted, 0);
        assert!(engine.dataset_names(&dest).is_empty());
    }

    #[test]
    fn test_export_one_with_override_name() {
        let engine = MemoryEngine::new().with_source("roads", roads());
        let dest = DestinationRef::new("gdb");
        let catalog = roads_catalog(&engine);
        let exporter = Exporter::new(&engine, ExportConfig::default());

        let entry = catalog.find("Road")[0];
        let outcome = exporter.export_one(entry, &dest, Some("MainRoads")).expect("export");
        assert_eq!(outcome.output_name, "MainRoads");
        assert_eq!(outcome.records, 2);

        // 再次导出同名数据集时由目标报告冲突
        let err = exporter.export_one(entry, &dest, Some("MainRoads")).unwrap_err();
        assert_eq!(err.source, DestinationError::NameCollision("MainRoads".to_string()));
        assert_eq!(err.layer, "Road");
    }

    #[test]
    fn test_validated_name_avoids_existing_dataset() {
        let dest = DestinationRef::new("gdb");
        let engine = MemoryEngine::new()
            .with_source("roads", roads())
            .with_dataset(&dest, "Road", Vec::new());
        let catalog = roads_catalog(&engine);

        let report = Exporter::new(&engine, ExportConfig::default()).export_layer(&catalog, "Road", &dest)
            .expect("road");
        assert_eq!(report.exported[0].output_name, "Road_1");
        assert_eq!(engine.dataset(&dest, "Road_1").map(|d| d.len()), Some(2));
    }

    #[test]
    fn test_batch_names_are_unique() {
        // "A-B" 与 "A_B" 规范化后相同
        let engine = MemoryEngine::new().with_source(
            "plan",
            vec![Record::new(GeometryKind::Point, "A-B"), Record::new(GeometryKind::Point, "A_B")],
        );
        let dest = DestinationRef::new("gdb");
        let catalog =
            LayerCatalog::build(&engine, &SourceRef::dataset("plan", GeometryKind::Point)).expect("catalog");

        let report = Exporter::new(&engine, ExportConfig::default()).export_all(&catalog, &dest);
        let names: Vec<&str> = report.exported.iter().map(|o| o.output_name.as_str()).collect();
        assert_eq!(names, vec!["A_B", "A_B_1"]);

        let dest = DestinationRef::new("gdb2");
        let config = ExportConfig::default().with_naming(NamingPolicy::Conservative);
        let report = Exporter::new(&engine, config).export_all(&catalog, &dest);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failures[0].layer, "A_B");
        assert!(report.failures[0].reason.contains("already exists"));
    }

    #[test]
    fn test_multi_geometry_layers_export_separately() {
        let engine = MemoryEngine::new().with_source(
            "site.dxf",
            vec![
                Record::new(GeometryKind::Line, "Road"),
                Record::new(GeometryKind::Polygon, "Road"),
                Record::new(GeometryKind::Polygon, "Road"),
                Record::new(GeometryKind::Point, "Trees"),
            ],
        );
        let dest = DestinationRef::new("gdb");
        let catalog = LayerCatalog::build(&engine, &SourceRef::container("site.dxf")).expect("catalog");

        let report = Exporter::new(&engine, ExportConfig::default())
            .export_layer(&catalog, "Road", &dest)
            .expect("road");

        assert_eq!(report.succeeded(), 2);
        assert_eq!(engine.dataset(&dest, "Road_Line").map(|d| d.len()), Some(1));
        assert_eq!(engine.dataset(&dest, "Road_Polygon").map(|d| d.len()), Some(2));
    }

    #[test]
    fn test_cancelled_before_start_skips_everything() {
        let engine = MemoryEngine::new().with_source("roads", roads());
        let dest = DestinationRef::new("gdb");
        let catalog = roads_catalog(&engine);
        let token = CancellationToken::new();
        token.cancel();

        let report = Exporter::new(&engine, ExportConfig::default())
            .with_cancellation(token)
            .export_all(&catalog, &dest);

        assert!(report.cancelled);
        assert_eq!(report.attempted, 0);
        assert_eq!(report.skipped, 3);
        assert!(engine.dataset_names(&dest).is_empty());
    }

    #[test]
    fn test_cancelled_between_exports() {
        let token = CancellationToken::new();
        let engine = CancelOnExport {
            inner: MemoryEngine::new().with_source("roads", roads()),
            token: token.clone(),
        };
        let dest = DestinationRef::new("gdb");
        let catalog =
            LayerCatalog::build(&engine, &SourceRef::dataset("roads", GeometryKind::Line)).expect("catalog");

        let report = Exporter::new(&engine, ExportConfig::default())
            .with_cancellation(token)
            .export_all(&catalog, &dest);

        assert!(report.cancelled);
        assert!(!report.aborted);
        assert_eq!(report.attempted, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(engine.inner.dataset_names(&dest), vec!["River"]);
    }

    #[test]
    fn test_parallel_fail_fast() {
        let records: Vec<Record> = (0..12)
            .map(|i| Record::new(GeometryKind::Polygon, format!("Zone-{:02}", i)))
            .collect();
        let engine = MemoryEngine::new()
            .with_source("zones", records)
            .fail_export("Zone_00", DestinationError::Storage("disk full".to_string()));
        let dest = DestinationRef::new("gdb");
        let catalog =
            LayerCatalog::build(&engine, &SourceRef::dataset("zones", GeometryKind::Polygon)).expect("catalog");
        let config = ExportConfig::default()
            .with_jobs(4)
            .with_batch_policy(BatchPolicy::FailFast);

        let report = Exporter::new(&engine, config).export_all(&catalog, &dest);

        assert!(report.aborted);
        assert!(!report.cancelled);
        assert_eq!(report.attempted + report.skipped, 12);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].layer, "Zone-00");
        assert_eq!(report.succeeded(), report.attempted - 1);
    }

    #[test]
    fn test_conservative_keeps_case_distinct_names() {
        let engine = MemoryEngine::new().with_source(
            "plan",
            vec![Record::new(GeometryKind::Line, "ROAD"), Record::new(GeometryKind::Line, "Road")],
        );
        let dest = DestinationRef::new("gdb");
        let catalog =
            LayerCatalog::build(&engine, &SourceRef::dataset("plan", GeometryKind::Line)).expect("catalog");
        let config = ExportConfig::default().with_naming(NamingPolicy::Conservative);

        let report = Exporter::new(&engine, config).export_all(&catalog, &dest);

        assert!(report.is_clean());
        assert_eq!(engine.dataset_names(&dest), vec!["ROAD", "Road"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let records: Vec<Record> = (0..24)
            .map(|i| Record::new(GeometryKind::Polygon, format!("Zone-{:02}", i % 12)))
            .collect();
        let engine = MemoryEngine::new().with_source("zones", records);
        let catalog =
            LayerCatalog::build(&engine, &SourceRef::dataset("zones", GeometryKind::Polygon)).expect("catalog");

        let sequential = Exporter::new(&engine, ExportConfig::default())
            .export_all(&catalog, &DestinationRef::new("seq"));
        let parallel = Exporter::new(&engine, ExportConfig::default().with_jobs(4))
            .export_all(&catalog, &DestinationRef::new("par"));

        assert_eq!(sequential.exported, parallel.exported);
        assert_eq!(parallel.succeeded(), 12);
        assert!(parallel.exported.iter().all(|o| o.records == 2));
    }
}
