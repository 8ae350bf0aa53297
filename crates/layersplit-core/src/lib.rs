//! layersplit 核心
//!
//! 把一个多图层 CAD 数据源按 `Layer` 属性拆分为多个独立命名的数据集。
//!
//! # 架构设计
//!
//! - `LayerCatalog`: 扫描数据源，得到去重排序的图层条目
//! - `Exporter`: 为每个条目派生输出名与选择谓词，调用引擎导出
//! - `GeometryEngine`: 外部几何数据访问层（扫描、选择导出、名称校验）
//!
//! # 示例
//!
//! ```rust
//! use layersplit_core::prelude::*;
//!
//! let engine = MemoryEngine::new().with_source(
//!     "roads",
//!     vec![Record::new(GeometryKind::Line, "Road"), Record::new(GeometryKind::Line, "River-Bank")],
//! );
//! let catalog = LayerCatalog::build(&engine, &SourceRef::dataset("roads", GeometryKind::Line)).unwrap();
//! let report = Exporter::new(&engine, ExportConfig::default())
//!     .export_all(&catalog, &DestinationRef::new("out"));
//! assert_eq!(report.succeeded(), 2);
//! ```

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod memory;
pub mod naming;
pub mod pipeline;
pub mod predicate;
pub mod report;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::cancel::CancellationToken;
    pub use crate::catalog::{LayerCatalog, LayerEntry, LayerKey, LAYER_FIELD};
    pub use crate::config::{BatchPolicy, ExportConfig, MissingLayerPolicy};
    pub use crate::dataset::{DestinationRef, GeometryKind, SourceRef, SubCollection};
    pub use crate::engine::{AttributeScan, GeometryEngine};
    pub use crate::error::{
        ConfigError, DestinationError, ExportError, LayerNotFoundError, SourceReadError, SplitError,
    };
    pub use crate::exporter::Exporter;
    pub use crate::memory::{MemoryEngine, Record};
    pub use crate::naming::NamingPolicy;
    pub use crate::pipeline::{split_all, split_layers};
    pub use crate::predicate::SelectionPredicate;
    pub use crate::report::{BatchReport, ExportFailure, ExportOutcome};
}
