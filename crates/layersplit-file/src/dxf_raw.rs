//! DXF 原始文本扫描
//!
//! 不构建完整图纸，直接按组码流式读取 ENTITIES 段，逐个实体取出图层名。
//!
//! # DXF 文件结构
//!
//! ```text
//! 0
//! SECTION
//! 2
//! ENTITIES        ← 实体（线、圆等）
//! 0
//! LINE
//! 8
//! Road            ← 图层名
//! ...
//! 0
//! ENDSEC
//! 0
//! EOF
//! ```
//!
//! # 组码 (Group Code)
//!
//! 每个数据项由两行组成：第一行组码，第二行值。这里用到的组码：
//! - 0: 实体类型 / 段标记
//! - 2: 段名
//! - 8: 图层名
//! - 70: 标志位（多段线第 1 位表示闭合）
//! - 999: 注释

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::io::BufRead;

use crate::error::FileError;
use layersplit_core::dataset::GeometryKind;

/// DXF 组码-值对
#[derive(Debug, Clone)]
pub struct DxfPair {
    pub code: i32,
    pub value: String,
}

impl DxfPair {
    pub fn new(code: i32, value: impl Into<String>) -> Self {
        Self { code, value: value.into() }
    }

    /// 解析为整数
    pub fn as_i32(&self) -> Option<i32> {
        self.value.trim().parse().ok()
    }

    /// 是否为 `0/<marker>`
    fn is_marker(&self, marker: &str) -> bool {
        self.code == 0 && self.value.trim() == marker
    }
}

/// 流式组码读取器，读到 `0/EOF` 后停止
///
/// 按字节读行，再用当前编码解码；无法解码的字节替换为 U+FFFD。
pub struct DxfPairReader<R: BufRead> {
    reader: R,
    encoding: &'static Encoding,
    buf: Vec<u8>,
    first_line: bool,
    finished: bool,
}

impl<R: BufRead> DxfPairReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_encoding(reader, WINDOWS_1252)
    }

    pub fn with_encoding(reader: R, encoding: &'static Encoding) -> Self {
        Self {
            reader,
            encoding,
            buf: Vec::new(),
            first_line: true,
            finished: false,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// 切换后续行的编码
    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
    }

    fn read_line(&mut self) -> Option<std::io::Result<String>> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(e) => return Some(Err(e)),
        }

        let mut line = self.buf.as_slice();
        if self.first_line {
            self.first_line = false;
            if let Some(rest) = line.strip_prefix(b"\xEF\xBB\xBF") {
                line = rest;
                self.encoding = UTF_8;
            }
        }
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        let (text, _) = self.encoding.decode_without_bom_handling(line);
        Some(Ok(text.into_owned()))
    }
}

impl<R: BufRead> Iterator for DxfPairReader<R> {
    type Item = Result<DxfPair, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        // 读取组码
        let code_line = match self.read_line()? {
            Ok(line) => line,
            Err(e) => {
                self.finished = true;
                return Some(Err(FileError::Io(e)));
            }
        };

        // 读取值
        let value_line = match self.read_line() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                self.finished = true;
                return Some(Err(FileError::Io(e)));
            }
            None => {
                self.finished = true;
                return Some(Err(FileError::InvalidFormat(format!(
                    "Missing value for group code: {}",
                    code_line.trim()
                ))));
            }
        };

        let code: i32 = match code_line.trim().parse() {
            Ok(code) => code,
            Err(_) => {
                self.finished = true;
                return Some(Err(FileError::InvalidFormat(format!(
                    "Invalid group code: {}",
                    code_line
                ))));
            }
        };

        let pair = DxfPair::new(code, value_line);
        if pair.is_marker("EOF") {
            self.finished = true;
        }
        Some(Ok(pair))
    }
}

/// `$DWGCODEPAGE` 对应的编码
pub fn code_page_encoding(code_page: &str) -> Option<&'static Encoding> {
    let number = code_page
        .trim()
        .to_ascii_uppercase()
        .strip_prefix("ANSI_")?
        .parse::<u32>()
        .ok()?;
    match number {
        874 => Some(encoding_rs::WINDOWS_874),
        932 => Some(encoding_rs::SHIFT_JIS),
        936 => Some(encoding_rs::GBK),
        949 => Some(encoding_rs::EUC_KR),
        950 => Some(encoding_rs::BIG5),
        1250 => Some(encoding_rs::WINDOWS_1250),
        1251 => Some(encoding_rs::WINDOWS_1251),
        1252 => Some(WINDOWS_1252),
        1253 => Some(encoding_rs::WINDOWS_1253),
        1254 => Some(encoding_rs::WINDOWS_1254),
        1255 => Some(encoding_rs::WINDOWS_1255),
        1256 => Some(encoding_rs::WINDOWS_1256),
        1257 => Some(encoding_rs::WINDOWS_1257),
        1258 => Some(encoding_rs::WINDOWS_1258),
        _ => None,
    }
}

/// 根据 HEADER 变量跟踪文本编码
#[derive(Debug, Default)]
struct EncodingTracker {
    variable: Option<String>,
    utf8: bool,
}

impl EncodingTracker {
    /// 返回需要切换到的编码
    fn observe(&mut self, pair: &DxfPair) -> Option<&'static Encoding> {
        match pair.code {
            0 => {
                self.variable = None;
                None
            }
            9 => {
                self.variable = Some(pair.value.trim().to_string());
                None
            }
            // R2007 (AC1021) 起文本一律为 UTF-8
            1 if self.variable.as_deref() == Some("$ACADVER") && pair.value.trim() >= "AC1021" => {
                self.utf8 = true;
                Some(UTF_8)
            }
            3 if self.variable.as_deref() == Some("$DWGCODEPAGE") && !self.utf8 => {
                code_page_encoding(&pair.value)
            }
            _ => None,
        }
    }
}

/// 读取 HEADER 段确定文本编码，缺省为 windows-1252
pub fn detect_encoding<R: BufRead>(reader: R) -> Result<&'static Encoding, FileError> {
    let mut pairs = DxfPairReader::new(reader);
    let mut tracker = EncodingTracker::default();
    let mut in_header = false;
    let mut section_open = false;

    while let Some(pair) = pairs.next() {
        let pair = pair?;
        // 段名只出现在 0/SECTION 之后；HEADER 内的组码 2 是变量值
        if section_open && pair.code == 2 {
            if pair.value.trim() != "HEADER" {
                break;
            }
            in_header = true;
        } else if in_header && pair.is_marker("ENDSEC") {
            break;
        } else if in_header {
            if let Some(encoding) = tracker.observe(&pair) {
                pairs.set_encoding(encoding);
            }
        }
        section_open = pair.is_marker("SECTION");
    }

    Ok(pairs.encoding())
}

/// 按实体类型名和标志位分类，与 [`crate::dxf_io::classify`] 保持一致
pub fn classify_raw(entity_type: &str, flags: i32) -> Option<GeometryKind> {
    let closed = flags & 1 != 0;
    match entity_type {
        "POINT" => Some(GeometryKind::Point),
        "LINE" | "ARC" | "ELLIPSE" | "SPLINE" => Some(GeometryKind::Line),
        "CIRCLE" | "SOLID" | "3DFACE" => Some(GeometryKind::Polygon),
        "LWPOLYLINE" | "POLYLINE" if closed => Some(GeometryKind::Polygon),
        "LWPOLYLINE" | "POLYLINE" => Some(GeometryKind::Line),
        _ => None,
    }
}

/// 未指定图层的实体所在的图层
pub const DEFAULT_LAYER: &str = "0";

/// 正在读取的实体
#[derive(Debug)]
struct RawEntity {
    entity_type: String,
    layer: Option<String>,
    flags: i32,
}

impl RawEntity {
    fn new(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            layer: None,
            flags: 0,
        }
    }

    /// 属于指定子集时返回图层名，没有组码 8 的实体属于图层 "0"
    fn layer_if(self, kind: GeometryKind) -> Option<Option<String>> {
        (classify_raw(&self.entity_type, self.flags) == Some(kind))
            .then(|| Some(self.layer.unwrap_or_else(|| DEFAULT_LAYER.to_string())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// 还没读到第一个组码
    Start,
    /// 寻找 ENTITIES 段
    Searching { section_open: bool },
    Entities,
    Done,
}

/// ENTITIES 段中某一几何子集的图层名扫描
///
/// 每个属于该子集的实体产出一项。HEADER 段中的 `$ACADVER` / `$DWGCODEPAGE`
/// 决定之后各行的解码方式，与 [`crate::dxf_io::load`] 一致。
pub struct LayerScan<R: BufRead> {
    pairs: DxfPairReader<R>,
    kind: GeometryKind,
    state: ScanState,
    current: Option<RawEntity>,
    encoding: EncodingTracker,
}

impl<R: BufRead> LayerScan<R> {
    pub fn new(reader: R, kind: GeometryKind) -> Self {
        Self {
            pairs: DxfPairReader::new(reader),
            kind,
            state: ScanState::Start,
            current: None,
            encoding: EncodingTracker::default(),
        }
    }

    fn finish(&mut self) -> Option<Option<String>> {
        self.state = ScanState::Done;
        self.current.take().and_then(|e| e.layer_if(self.kind))
    }
}

impl<R: BufRead> Iterator for LayerScan<R> {
    type Item = Result<Option<String>, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state == ScanState::Done {
                return None;
            }

            let pair = match self.pairs.next() {
                Some(Ok(pair)) => pair,
                Some(Err(e)) => {
                    self.state = ScanState::Done;
                    return Some(Err(e));
                }
                None if self.state == ScanState::Start => {
                    self.state = ScanState::Done;
                    return Some(Err(FileError::InvalidFormat("Empty DXF file".to_string())));
                }
                // 文件在 ENTITIES 段中途结束
                None => return self.finish().map(Ok),
            };

            // 999: 注释
            if pair.code == 999 {
                continue;
            }

            let state = self.state;
            match state {
                ScanState::Start => {
                    if !pair.is_marker("SECTION") {
                        self.state = ScanState::Done;
                        return Some(Err(FileError::InvalidFormat(format!(
                            "Expected SECTION, found group code {}",
                            pair.code
                        ))));
                    }
                    self.state = ScanState::Searching { section_open: true };
                }
                ScanState::Searching { section_open } => {
                    if let Some(encoding) = self.encoding.observe(&pair) {
                        self.pairs.set_encoding(encoding);
                    }
                    if pair.code == 0 {
                        self.state = ScanState::Searching {
                            section_open: pair.value.trim() == "SECTION",
                        };
                    } else if pair.code == 2 {
                        if section_open && pair.value.trim() == "ENTITIES" {
                            self.state = ScanState::Entities;
                        } else {
                            self.state = ScanState::Searching { section_open: false };
                        }
                    }
                }
                ScanState::Entities => match pair.code {
                    0 => {
                        let finished = self.current.take();
                        if pair.is_marker("ENDSEC") {
                            self.state = ScanState::Done;
                        } else {
                            self.current = Some(RawEntity::new(pair.value.trim()));
                        }
                        if let Some(layer) = finished.and_then(|e| e.layer_if(self.kind)) {
                            return Some(Ok(layer));
                        }
                    }
                    8 => {
                        if let Some(entity) = self.current.as_mut() {
                            entity.layer = Some(pair.value);
                        }
                    }
                    70 => {
                        if let Some(entity) = self.current.as_mut() {
                            entity.flags = pair.as_i32().unwrap_or(0);
                        }
                    }
                    _ => {}
                },
                ScanState::Done => return None,
            }
        }
    }
}
