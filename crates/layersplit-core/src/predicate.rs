//! 选择谓词
//!
//! 形如 `Layer = 'O''Brien'` 的等值过滤表达式。字面量中的单引号一律加倍，
//! 表达式只能通过 [`SelectionPredicate::equals`] 构造，渲染时统一转义。

use serde::Serialize;
use std::fmt;

/// 等值选择谓词
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SelectionPredicate {
    field: String,
    value: String,
}

impl SelectionPredicate {
    /// `field = 'value'`
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// 未转义的原始值
    pub fn value(&self) -> &str {
        &self.value
    }

    /// 渲染后的表达式
    pub fn expression(&self) -> String {
        self.to_string()
    }

    /// 在进程内求值：与原始值逐字节相等
    pub fn matches(&self, value: Option<&str>) -> bool {
        value == Some(self.value.as_str())
    }
}

impl fmt::Display for SelectionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = '{}'", self.field, escape_literal(&self.value))
    }
}

/// SQL 风格字符串字面量转义：`'` → `''`
pub fn escape_literal(raw: &str) -> String {
    raw.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_is_doubled() {
        let predicate = SelectionPredicate::equals("Layer", "O'Brien");
        assert_eq!(predicate.expression(), "Layer = 'O''Brien'");
        assert_eq!(predicate.value(), "O'Brien");
    }

    #[test]
    fn test_plain_and_injection_values() {
        assert_eq!(SelectionPredicate::equals("Layer", "Road").to_string(), "Layer = 'Road'");

        let hostile = SelectionPredicate::equals("Layer", "x' OR '1'='1");
        assert_eq!(hostile.to_string(), "Layer = 'x'' OR ''1''=''1'");
        assert_eq!(escape_literal("''"), "''''");
    }

    #[test]
    fn test_matches_exact_value_only() {
        let predicate = SelectionPredicate::equals("Layer", "O'Brien");
        assert!(predicate.matches(Some("O'Brien")));
        assert!(!predicate.matches(Some("O''Brien")));
        assert!(!predicate.matches(Some("o'brien")));
        assert!(!predicate.matches(None));
    }
}
