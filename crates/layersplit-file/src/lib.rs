//! layersplit 文件格式处理
//!
//! 基于 DXF 的几何引擎实现：
//! - 流式扫描 ENTITIES 段中的图层名
//! - 按几何子集与图层筛选实体，写出为新的 `.dxf` 文件
//! - 目标目录中的名称校验与去重

pub mod dxf_io;
pub mod dxf_raw;
pub mod error;
pub mod workspace;

pub use error::FileError;
pub use workspace::DxfEngine;

// 流式扫描器（不构建完整图纸）
pub use dxf_raw::{
    classify_raw, code_page_encoding, detect_encoding, DxfPair, DxfPairReader, LayerScan, DEFAULT_LAYER,
};
