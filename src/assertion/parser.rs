use regex::Regex;

use crate::assertion::types::{AssertError, AssertExpr, AssertValue, CompareOp, ValuePath};
use crate::variable::PathExpr;

/// 符号运算符，长的在前
const SYMBOL_OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];

/// 单词运算符，后面必须跟空白
const WORD_OPERATORS: [&str; 2] = ["contains", "matches"];

/// 解析断言表达式
///
/// 支持的格式：
/// - `status == 200`
/// - `headers.content-type contains "json"`
/// - `body.user.id > 0`
/// - `body.items[0].tags contains ["a"]`
/// - `body contains {"code": 0}`
/// - `body.order_no matches "^ORD-\d+$"`
/// - `response.time < 1000`
/// - `body.token exists`
///
/// 左值是第一个空白或比较符号之前的部分，右值可以包含任意字符（JSON、正则等）。
pub fn parse_assertion(input: &str) -> Result<AssertExpr, AssertError> {
    let input = input.trim();

    let split = input
        .find(|c: char| c.is_whitespace() || "=!<>".contains(c))
        .unwrap_or(input.len());
    let left_str = &input[..split];
    let rest = input[split..].trim_start();

    if left_str.is_empty() {
        return Err(AssertError::InvalidSyntax(
            "Left side of assertion is empty".to_string(),
        ));
    }

    if rest == "exists" {
        let path = parse_value_path(left_str)?;
        return Ok(AssertExpr::Exists { path });
    }

    let (op, right_str) = split_operator(rest).ok_or_else(|| {
        AssertError::InvalidSyntax(format!("No valid operator found in assertion: {}", input))
    })?;

    if right_str.is_empty() {
        return Err(AssertError::InvalidSyntax(
            "Right side of assertion is empty".to_string(),
        ));
    }

    let left = parse_value_path(left_str)?;
    let right = parse_assert_value(right_str)?;

    if let (CompareOp::Matches, AssertValue::String(pattern)) = (op, &right) {
        Regex::new(pattern)
            .map_err(|e| AssertError::InvalidValue(format!("invalid regex {}: {}", pattern, e)))?;
    }

    Ok(AssertExpr::Compare { left, op, right })
}

/// 从剩余文本开头识别运算符，返回运算符和右值文本
fn split_operator(rest: &str) -> Option<(CompareOp, &str)> {
    for symbol in SYMBOL_OPERATORS {
        if let Some(right) = rest.strip_prefix(symbol) {
            return CompareOp::parse(symbol).map(|op| (op, right.trim()));
        }
    }

    for word in WORD_OPERATORS {
        if let Some(right) = rest.strip_prefix(word) {
            if right.is_empty() || right.starts_with(char::is_whitespace) {
                return CompareOp::parse(word).map(|op| (op, right.trim()));
            }
        }
    }

    None
}

/// 解析值路径
fn parse_value_path(input: &str) -> Result<ValuePath, AssertError> {
    let input = input.trim();

    if input == "status" {
        return Ok(ValuePath::Status);
    }

    if input == "response.time" {
        return Ok(ValuePath::ResponseTime);
    }

    if let Some(rest) = input
        .strip_prefix("headers.")
        .or_else(|| input.strip_prefix("header."))
    {
        if rest.is_empty() {
            return Err(AssertError::InvalidSyntax(
                "Header name cannot be empty".to_string(),
            ));
        }
        return Ok(ValuePath::Header(rest.to_string()));
    }

    let body_path = if input == "body" {
        Some("")
    } else {
        input.strip_prefix("body.")
    };
    if let Some(rest) = body_path {
        let path = PathExpr::parse(rest).map_err(|e| AssertError::InvalidSyntax(e.to_string()))?;
        return Ok(ValuePath::Body(path));
    }

    Err(AssertError::InvalidSyntax(format!(
        "Invalid value path: {}. Must start with 'status', 'headers.', 'body', or 'response.time'",
        input
    )))
}

/// 解析断言值（右值）
fn parse_assert_value(input: &str) -> Result<AssertValue, AssertError> {
    let input = input.trim();

    // Null
    if input == "null" {
        return Ok(AssertValue::Null);
    }

    // 布尔值
    if input == "true" {
        return Ok(AssertValue::Bool(true));
    }
    if input == "false" {
        return Ok(AssertValue::Bool(false));
    }

    // 字符串（带引号）
    let quoted = input
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| input.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    if let Some(s) = quoted {
        return Ok(AssertValue::String(s.to_string()));
    }

    // 对象 / 数组
    if input.starts_with('{') || input.starts_with('[') {
        let value: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| AssertError::InvalidValue(format!("{}: {}", input, e)))?;
        return AssertValue::from_json(&value);
    }

    // 数字
    if let Ok(n) = input.parse::<f64>() {
        return Ok(AssertValue::Number(n));
    }

    // 未带引号的字符串（用于 contains 等）
    Ok(AssertValue::String(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(path: &str) -> ValuePath {
        ValuePath::Body(PathExpr::parse(path).unwrap())
    }

    #[test]
    fn test_parse_status_assertion() {
        let expr = parse_assertion("status == 200").unwrap();
        match expr {
            AssertExpr::Compare { left, op, right } => {
                assert_eq!(left, ValuePath::Status);
                assert_eq!(op, CompareOp::Equal);
                assert_eq!(right, AssertValue::Number(200.0));
            }
            _ => panic!("Expected Compare assertion"),
        }
    }

    #[test]
    fn test_parse_without_spaces() {
        let expr = parse_assertion("status>=200").unwrap();
        match expr {
            AssertExpr::Compare { left, op, right } => {
                assert_eq!(left, ValuePath::Status);
                assert_eq!(op, CompareOp::GreaterOrEqual);
                assert_eq!(right, AssertValue::Number(200.0));
            }
            _ => panic!("Expected Compare assertion"),
        }
    }

    #[test]
    fn test_parse_header_assertion() {
        let expr = parse_assertion("headers.content-type contains \"json\"").unwrap();
        match expr {
            AssertExpr::Compare { left, op, right } => {
                assert_eq!(left, ValuePath::Header("content-type".to_string()));
                assert_eq!(op, CompareOp::Contains);
                assert_eq!(right, AssertValue::String("json".to_string()));
            }
            _ => panic!("Expected Compare assertion"),
        }
    }

    #[test]
    fn test_parse_indexed_body_assertion() {
        let expr = parse_assertion("body.data.items[0].id > 0").unwrap();
        match expr {
            AssertExpr::Compare { left, op, .. } => {
                assert_eq!(left, body("data.items[0].id"));
                assert_eq!(op, CompareOp::Greater);
            }
            _ => panic!("Expected Compare assertion"),
        }
    }

    #[test]
    fn test_parse_json_right_side_with_operators_inside() {
        let expr = parse_assertion(r#"body contains {"msg": "a == b", "n": 1}"#).unwrap();
        match expr {
            AssertExpr::Compare { left, op, right } => {
                assert_eq!(left, body(""));
                assert_eq!(op, CompareOp::Contains);
                assert_eq!(right, AssertValue::Json(json!({"msg": "a == b", "n": 1})));
            }
            _ => panic!("Expected Compare assertion"),
        }
    }

    #[test]
    fn test_parse_matches() {
        let expr = parse_assertion(r#"body.code matches "^OK-\d+$""#).unwrap();
        match expr {
            AssertExpr::Compare { op, right, .. } => {
                assert_eq!(op, CompareOp::Matches);
                assert_eq!(right, AssertValue::String(r"^OK-\d+$".to_string()));
            }
            _ => panic!("Expected Compare assertion"),
        }
        assert!(parse_assertion(r#"body.code matches "(""#).is_err());
    }

    #[test]
    fn test_parse_exists_assertion() {
        let expr = parse_assertion("body.token exists").unwrap();
        assert_eq!(expr, AssertExpr::Exists { path: body("token") });
    }

    #[test]
    fn test_parse_operators() {
        assert!(parse_assertion("status == 200").is_ok());
        assert!(parse_assertion("status != 404").is_ok());
        assert!(parse_assertion("status > 199").is_ok());
        assert!(parse_assertion("status < 300").is_ok());
        assert!(parse_assertion("status >= 200").is_ok());
        assert!(parse_assertion("status <= 299").is_ok());
        assert!(parse_assertion("status contains 20").is_ok());
    }

    #[test]
    fn test_parse_values() {
        let right = |s: &str| match parse_assertion(s).unwrap() {
            AssertExpr::Compare { right, .. } => right,
            _ => panic!(),
        };

        assert_eq!(right("body.count == 42"), AssertValue::Number(42.0));
        assert_eq!(right("body.name == \"test\""), AssertValue::String("test".to_string()));
        assert_eq!(right("body.name == 'test'"), AssertValue::String("test".to_string()));
        assert_eq!(right("body.active == true"), AssertValue::Bool(true));
        assert_eq!(right("body.data == null"), AssertValue::Null);
        assert_eq!(right("body.tags == [1, 2]"), AssertValue::Json(json!([1, 2])));
        assert_eq!(right("body.msg contains ok"), AssertValue::String("ok".to_string()));
    }

    #[test]
    fn test_parse_invalid_syntax() {
        assert!(parse_assertion("invalid").is_err());
        assert!(parse_assertion("status").is_err());
        assert!(parse_assertion("== 200").is_err());
        assert!(parse_assertion("status ==").is_err());
        assert!(parse_assertion("status containsx 1").is_err());
        assert!(parse_assertion("cookie.a == 1").is_err());
        assert!(parse_assertion("body.items[x] == 1").is_err());
        assert!(parse_assertion("body == {broken").is_err());
    }
}
