//! 基于 DXF 文件的几何引擎
//!
//! - 数据源：ASCII DXF 文件，按点、线、面三个子集扫描
//! - 目标工作空间：目录，每个导出的数据集是其中的 `<name>.dxf`

use crate::dxf_io;
use crate::dxf_raw::LayerScan;
use crate::error::FileError;
use layersplit_core::catalog::LAYER_FIELD;
use layersplit_core::dataset::{DestinationRef, SubCollection};
use layersplit_core::engine::{AttributeScan, GeometryEngine};
use layersplit_core::error::{DestinationError, SourceReadError};
use layersplit_core::naming::{first_free_name, sanitize_identifier};
use layersplit_core::predicate::SelectionPredicate;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

/// 输出文件扩展名
pub const DATASET_EXTENSION: &str = "dxf";

/// DXF 几何引擎
#[derive(Debug, Clone, Copy, Default)]
pub struct DxfEngine;

impl DxfEngine {
    pub fn new() -> Self {
        Self
    }

    /// 数据集在目标目录中的路径
    pub fn dataset_path(destination: &DestinationRef, name: &str) -> PathBuf {
        Path::new(&destination.location).join(format!("{}.{}", name, DATASET_EXTENSION))
    }

    /// 目标目录中已有数据集名称（小写）
    fn existing_names(destination: &DestinationRef) -> Result<Vec<String>, DestinationError> {
        let dir = Path::new(&destination.location);
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            // 目录尚未创建
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DestinationError::Unavailable(format!("{}: {}", dir.display(), e))),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| DestinationError::Unavailable(format!("{}: {}", dir.display(), e)))?
                .path();
            let is_dataset = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(DATASET_EXTENSION));
            if !is_dataset {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().to_lowercase());
            }
        }
        Ok(names)
    }
}

fn source_error(location: &str, error: FileError) -> SourceReadError {
    match error {
        FileError::InvalidFormat(reason) => SourceReadError::InvalidFormat {
            location: location.to_string(),
            reason,
        },
        other => SourceReadError::Unreadable {
            location: location.to_string(),
            reason: other.to_string(),
        },
    }
}

impl GeometryEngine for DxfEngine {
    fn scan_attribute<'a>(
        &'a self,
        source: &SubCollection,
        field: &str,
    ) -> Result<AttributeScan<'a>, SourceReadError> {
        // DXF 实体只有图层这一个字符串属性可按记录扫描（组码 8）
        if field != LAYER_FIELD {
            return Err(SourceReadError::MissingField {
                location: source.location.clone(),
                field: field.to_string(),
            });
        }

        let file = File::open(&source.location).map_err(|e| SourceReadError::Unreadable {
            location: source.location.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Scanning {} in {}", field, source);

        let location = source.location.clone();
        Ok(Box::new(
            LayerScan::new(BufReader::new(file), source.kind)
                .map(move |value| value.map_err(|e| source_error(&location, e))),
        ))
    }

    fn select_and_export(
        &self,
        source: &SubCollection,
        destination: &DestinationRef,
        output_name: &str,
        predicate: &SelectionPredicate,
    ) -> Result<u64, DestinationError> {
        if predicate.field() != LAYER_FIELD {
            return Err(DestinationError::InvalidPredicate(predicate.expression()));
        }
        if output_name.is_empty()
            || output_name.contains(['/', '\\'])
            || output_name == "."
            || output_name == ".."
        {
            return Err(DestinationError::InvalidName(output_name.to_string()));
        }

        let dir = Path::new(&destination.location);
        if !dir.is_dir() {
            return Err(DestinationError::Unavailable(destination.location.clone()));
        }

        let path = Self::dataset_path(destination, output_name);
        if path.exists() {
            return Err(DestinationError::NameCollision(output_name.to_string()));
        }

        let drawing = dxf_io::load(Path::new(&source.location))
            .map_err(|e| DestinationError::Storage(format!("{}: {}", source.location, e)))?;
        let selected = dxf_io::select(&drawing, source.kind, predicate);
        let count = selected.entities().count() as u64;

        match dxf_io::save_new(&selected, &path) {
            Ok(()) => {}
            Err(FileError::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DestinationError::NameCollision(output_name.to_string()));
            }
            Err(e) => return Err(DestinationError::Storage(format!("{}: {}", path.display(), e))),
        }

        tracing::debug!("Wrote {} entities to {}", count, path.display());
        Ok(count)
    }

    fn validate_name(
        &self,
        candidate: &str,
        destination: &DestinationRef,
    ) -> Result<String, DestinationError> {
        let base = sanitize_identifier(candidate);
        let existing = Self::existing_names(destination)?;
        Ok(first_free_name(&base, |name| existing.contains(&name.to_lowercase())))
    }
}
