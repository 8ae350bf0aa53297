//! 一步完成的入口：构建目录后立即导出

use crate::cancel::CancellationToken;
use crate::catalog::LayerCatalog;
use crate::config::ExportConfig;
use crate::dataset::{DestinationRef, SourceRef};
use crate::engine::GeometryEngine;
use crate::error::SplitError;
use crate::exporter::Exporter;
use crate::report::BatchReport;

/// 导出数据源中的全部图层
pub fn split_all<E: GeometryEngine + ?Sized>(
    engine: &E,
    source: &SourceRef,
    destination: &DestinationRef,
    config: ExportConfig,
    cancel: CancellationToken,
) -> Result<BatchReport, SplitError> {
    config.validate()?;
    let catalog = LayerCatalog::build(engine, source)?;
    let exporter = Exporter::new(engine, config).with_cancellation(cancel);
    Ok(exporter.export_all(&catalog, destination))
}

/// 只导出指定名称的图层
pub fn split_layers<E: GeometryEngine + ?Sized, S: AsRef<str>>(
    engine: &E,
    source: &SourceRef,
    layers: &[S],
    destination: &DestinationRef,
    config: ExportConfig,
    cancel: CancellationToken,
) -> Result<BatchReport, SplitError> {
    config.validate()?;
    let catalog = LayerCatalog::build(engine, source)?;
    let exporter = Exporter::new(engine, config).with_cancellation(cancel);
    Ok(exporter.export_layers(&catalog, layers, destination)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GeometryKind;
    use crate::memory::{MemoryEngine, Record};

    #[test]
    fn test_split_all_surfaces_source_errors() {
        let engine = MemoryEngine::new();
        let result = split_all(
            &engine,
            &SourceRef::container("absent.dxf"),
            &DestinationRef::new("out"),
            ExportConfig::default(),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(SplitError::Source(_))));
        assert!(engine.dataset_names(&DestinationRef::new("out")).is_empty());
    }

    #[test]
    fn test_split_layers() {
        let engine = MemoryEngine::new().with_source(
            "plan",
            vec![
                Record::new(GeometryKind::Point, "Trees"),
                Record::new(GeometryKind::Point, "Poles"),
                Record::new(GeometryKind::Point, "Signs"),
            ],
        );
        let source = SourceRef::dataset("plan", GeometryKind::Point);
        let dest = DestinationRef::new("out");

        let report = split_layers(
            &engine,
            &source,
            &["Trees", "Poles"],
            &dest,
            ExportConfig::default(),
            CancellationToken::new(),
        )
        .expect("split");
        assert_eq!(report.succeeded(), 2);
        assert_eq!(engine.dataset_names(&dest), vec!["Poles", "Trees"]);

        let missing = split_layers(
            &engine,
            &source,
            &["Sidewalk"],
            &dest,
            ExportConfig::default(),
            CancellationToken::new(),
        );
        assert!(matches!(missing, Err(SplitError::LayerNotFound(_))));
    }

    #[test]
    fn test_export_failures_stay_in_report() {
        let engine = MemoryEngine::new()
            .with_source(
                "plan",
                vec![Record::new(GeometryKind::Line, "Road"), Record::new(GeometryKind::Line, "River")],
            )
            .fail_export("River", crate::error::DestinationError::Storage("read-only".to_string()));

        let report = split_all(
            &engine,
            &SourceRef::dataset("plan", GeometryKind::Line),
            &DestinationRef::new("out"),
            ExportConfig::default(),
            CancellationToken::new(),
        )
        .expect("split");
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].layer, "River");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let engine = MemoryEngine::new();
        let result = split_all(
            &engine,
            &SourceRef::container("plan"),
            &DestinationRef::new("out"),
            ExportConfig::default().with_jobs(0),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(SplitError::Config(_))));
    }
}
