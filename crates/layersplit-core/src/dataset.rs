//! 数据源与目标引用
//!
//! CAD 容器按几何类型拆成最多三个子集（点、线、面），每个子集可独立扫描与导出。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 几何子集类型
///
/// 排序为 `Point < Line < Polygon`，目录中同名图层按此顺序排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

impl GeometryKind {
    /// 全部类型（升序）
    pub const ALL: [GeometryKind; 3] = [GeometryKind::Point, GeometryKind::Line, GeometryKind::Polygon];

    /// 类型名称，用于限定输出名
    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::Line => "Line",
            GeometryKind::Polygon => "Polygon",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeometryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" => Ok(GeometryKind::Point),
            "line" | "polyline" => Ok(GeometryKind::Line),
            "polygon" => Ok(GeometryKind::Polygon),
            other => Err(format!("unknown geometry kind: {}", other)),
        }
    }
}

/// 数据源引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    location: String,
    kinds: Vec<GeometryKind>,
}

impl SourceRef {
    /// CAD 容器，包含点、线、面三个子集
    pub fn container(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            kinds: GeometryKind::ALL.to_vec(),
        }
    }

    /// 单一几何类型的数据集
    pub fn dataset(location: impl Into<String>, kind: GeometryKind) -> Self {
        Self {
            location: location.into(),
            kinds: vec![kind],
        }
    }

    /// 只包含指定几何类型的容器，类型列表会去重并排序。空列表等同于完整容器。
    pub fn with_kinds(location: impl Into<String>, kinds: impl IntoIterator<Item = GeometryKind>) -> Self {
        let mut kinds: Vec<GeometryKind> = kinds.into_iter().collect();
        kinds.sort();
        kinds.dedup();
        if kinds.is_empty() {
            return Self::container(location);
        }
        Self {
            location: location.into(),
            kinds,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn kinds(&self) -> &[GeometryKind] {
        &self.kinds
    }

    /// 是否跨越多个几何子集
    pub fn is_multi_geometry(&self) -> bool {
        self.kinds.len() > 1
    }

    /// 按类型升序列出所有子集
    pub fn sub_collections(&self) -> impl Iterator<Item = SubCollection> + '_ {
        self.kinds.iter().map(move |&kind| SubCollection {
            location: self.location.clone(),
            kind,
        })
    }
}

/// 数据源中的一个几何子集
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubCollection {
    pub location: String,
    pub kind: GeometryKind,
}

impl SubCollection {
    pub fn new(location: impl Into<String>, kind: GeometryKind) -> Self {
        Self {
            location: location.into(),
            kind,
        }
    }
}

impl fmt::Display for SubCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.location, self.kind)
    }
}

/// 目标工作空间引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationRef {
    pub location: String,
}

impl DestinationRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

impl fmt::Display for DestinationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}
