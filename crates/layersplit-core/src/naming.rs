//! 输出名派生

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 目标标识符中已知的非法字符
pub const ILLEGAL_NAME_CHARS: &[char] = &['-'];

/// 输出命名策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// 只替换已知非法字符，结果仍可能被目标拒绝
    Conservative,
    /// 交给目标工作空间校验并消除重名
    #[default]
    Validated,
}

impl fmt::Display for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingPolicy::Conservative => f.write_str("conservative"),
            NamingPolicy::Validated => f.write_str("validated"),
        }
    }
}

impl FromStr for NamingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(NamingPolicy::Conservative),
            "validated" => Ok(NamingPolicy::Validated),
            other => Err(format!("unknown naming policy: {}", other)),
        }
    }
}

/// 保守策略：非法字符替换为 `_`，其他字符原样保留
pub fn conservative_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if ILLEGAL_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// 目标标识符最大长度
pub const MAX_IDENTIFIER_LEN: usize = 160;

/// 严格规范化：只保留 ASCII 字母、数字和 `_`，数字开头或为空时加 `T` 前缀
///
/// 供实现"校验"策略的引擎使用。
pub fn sanitize_identifier(candidate: &str) -> String {
    let mut name: String = candidate
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'T');
    }

    // 只含 ASCII，按字节截断安全
    name.truncate(MAX_IDENTIFIER_LEN);
    name
}

/// 依次尝试 `base`、`base_1`、`base_2`…，返回第一个未被占用的名称
pub fn first_free_name(base: &str, mut is_taken: impl FnMut(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }

    let mut n = 1;
    loop {
        let candidate = numbered(base, n);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// `base_n`
pub fn numbered(base: &str, n: usize) -> String {
    format!("{}_{}", base, n)
}
