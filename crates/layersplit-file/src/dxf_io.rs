//! DXF文件读取/写出
//!
//! 使用 `dxf` crate 加载完整图纸，按几何子集和选择谓词筛选实体后写成新的 DXF 文件。

use crate::dxf_raw::detect_encoding;
use crate::error::FileError;
use layersplit_core::dataset::GeometryKind;
use layersplit_core::predicate::SelectionPredicate;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// 从DXF文件加载
///
/// 文本编码按 HEADER 段确定，与图层扫描使用同一编码，保证选择谓词匹配扫描得到的图层名。
pub fn load(path: &Path) -> Result<dxf::Drawing, FileError> {
    let encoding = detect_encoding(BufReader::new(File::open(path)?))?;
    let mut reader = BufReader::new(File::open(path)?);
    dxf::Drawing::load_with_encoding(&mut reader, encoding).map_err(|e| FileError::Dxf(e.to_string()))
}

/// 实体所属的几何子集，与 [`crate::dxf_raw::classify_raw`] 保持一致
pub fn classify(entity: &dxf::entities::Entity) -> Option<GeometryKind> {
    match &entity.specific {
        dxf::entities::EntityType::ModelPoint(_) => Some(GeometryKind::Point),

        dxf::entities::EntityType::Line(_)
        | dxf::entities::EntityType::Arc(_)
        | dxf::entities::EntityType::Ellipse(_)
        | dxf::entities::EntityType::Spline(_) => Some(GeometryKind::Line),

        dxf::entities::EntityType::Circle(_)
        | dxf::entities::EntityType::Solid(_)
        | dxf::entities::EntityType::Face3D(_) => Some(GeometryKind::Polygon),

        dxf::entities::EntityType::LwPolyline(lwpoly) => Some(if lwpoly.is_closed() {
            GeometryKind::Polygon
        } else {
            GeometryKind::Line
        }),

        dxf::entities::EntityType::Polyline(poly) => Some(if poly.is_closed() {
            GeometryKind::Polygon
        } else {
            GeometryKind::Line
        }),

        // 文字、标注、块参照等不属于任何子集
        _ => None,
    }
}

/// 筛选出属于 `kind` 且满足谓词的实体，连同同名图层表记录组成新图纸
pub fn select(
    drawing: &dxf::Drawing,
    kind: GeometryKind,
    predicate: &SelectionPredicate,
) -> dxf::Drawing {
    let mut selected = dxf::Drawing::new();
    selected.header.version = drawing.header.version;

    // 导出图层
    for layer in drawing.layers() {
        let exists = selected.layers().any(|l| l.name == layer.name);
        if predicate.matches(Some(&layer.name)) && !exists {
            selected.add_layer(layer.clone());
        }
    }

    // 导出实体
    for entity in drawing.entities() {
        if classify(entity) == Some(kind) && predicate.matches(Some(&entity.common.layer)) {
            selected.add_entity(entity.clone());
        }
    }

    selected
}

/// 写出到新文件，文件已存在时返回 `AlreadyExists`
pub fn save_new(drawing: &dxf::Drawing, path: &Path) -> Result<(), FileError> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut writer = BufWriter::new(file);

    drawing
        .save(&mut writer)
        .map_err(|e| FileError::Dxf(e.to_string()))?;
    writer.flush()?;

    Ok(())
}
