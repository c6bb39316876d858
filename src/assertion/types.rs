use std::fmt;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::variable::PathExpr;

/// 断言错误类型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssertError {
    #[error("Invalid assertion syntax: {0}")]
    InvalidSyntax(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Value extraction failed: {0}")]
    ExtractionError(String),

    #[error("Invalid assertion '{raw}': {reason}")]
    InvalidExpectation { raw: String, reason: String },
}

/// 断言表达式
#[derive(Debug, Clone, PartialEq)]
pub enum AssertExpr {
    /// 比较断言: left op right
    Compare {
        left: ValuePath,
        op: CompareOp,
        right: AssertValue,
    },
    /// 存在性断言: path exists
    Exists { path: ValuePath },
}

impl fmt::Display for AssertExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertExpr::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            AssertExpr::Exists { path } => write!(f, "{} exists", path),
        }
    }
}

/// 值路径 - 用于从响应中提取值
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePath {
    /// HTTP 状态码
    Status,
    /// 响应 Header
    Header(String),
    /// Body 路径；空路径表示整个 Body
    Body(PathExpr),
    /// 响应时间（毫秒）
    ResponseTime,
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuePath::Status => write!(f, "status"),
            ValuePath::Header(name) => write!(f, "headers.{}", name),
            ValuePath::Body(path) if path.is_root() => write!(f, "body"),
            ValuePath::Body(path) => write!(f, "body.{}", path),
            ValuePath::ResponseTime => write!(f, "response.time"),
        }
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,          // ==
    NotEqual,       // !=
    Greater,        // >
    Less,           // <
    GreaterOrEqual, // >=
    LessOrEqual,    // <=
    Contains,       // contains
    Matches,        // matches
}

impl CompareOp {
    /// 从字符串解析运算符
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            ">" => Some(Self::Greater),
            "<" => Some(Self::Less),
            ">=" => Some(Self::GreaterOrEqual),
            "<=" => Some(Self::LessOrEqual),
            "contains" => Some(Self::Contains),
            "matches" => Some(Self::Matches),
            _ => None,
        }
    }

    /// 转换为字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Contains => "contains",
            Self::Matches => "matches",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 断言值
#[derive(Debug, Clone, PartialEq)]
pub enum AssertValue {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    /// 对象或数组
    Json(Value),
}

impl fmt::Display for AssertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertValue::Number(n) => write!(f, "{}", n),
            AssertValue::String(s) => write!(f, "\"{}\"", s),
            AssertValue::Bool(b) => write!(f, "{}", b),
            AssertValue::Null => write!(f, "null"),
            AssertValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl AssertValue {
    pub fn from_json(value: &Value) -> Result<Self, AssertError> {
        match value {
            Value::Number(n) => n.as_f64().map(AssertValue::Number).ok_or_else(|| {
                AssertError::ExtractionError("Number cannot be represented as f64".to_string())
            }),
            Value::String(s) => Ok(AssertValue::String(s.clone())),
            Value::Bool(b) => Ok(AssertValue::Bool(*b)),
            Value::Null => Ok(AssertValue::Null),
            Value::Array(_) | Value::Object(_) => Ok(AssertValue::Json(value.clone())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AssertValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AssertValue::String(s) => Value::String(s.clone()),
            AssertValue::Bool(b) => Value::Bool(*b),
            AssertValue::Null => Value::Null,
            AssertValue::Json(v) => v.clone(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            AssertValue::Number(_) => "number",
            AssertValue::String(_) => "string",
            AssertValue::Bool(_) => "boolean",
            AssertValue::Null => "null",
            AssertValue::Json(Value::Array(_)) => "array",
            AssertValue::Json(_) => "object",
        }
    }

    /// 数字按十进制文本、字符串按原文参与文本匹配
    fn as_text(&self) -> Option<String> {
        match self {
            AssertValue::Number(n) => Some(n.to_string()),
            AssertValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn mismatch(&self, other: &AssertValue) -> AssertError {
        AssertError::TypeMismatch {
            expected: other.type_name().to_string(),
            actual: self.type_name().to_string(),
        }
    }

    /// 比较两个值（self 为实际值，other 为期望值）
    pub fn compare(&self, op: CompareOp, other: &AssertValue) -> Result<bool, AssertError> {
        match op {
            CompareOp::Contains => return self.contains(other),
            CompareOp::Matches => return self.matches(other),
            _ => {}
        }

        match (self, other) {
            // 数字比较
            (AssertValue::Number(a), AssertValue::Number(b)) => match op {
                CompareOp::Equal => Ok((a - b).abs() < f64::EPSILON),
                CompareOp::NotEqual => Ok((a - b).abs() >= f64::EPSILON),
                CompareOp::Greater => Ok(a > b),
                CompareOp::Less => Ok(a < b),
                CompareOp::GreaterOrEqual => Ok(a >= b),
                CompareOp::LessOrEqual => Ok(a <= b),
                _ => Err(AssertError::InvalidOperator(op.to_string())),
            },

            // 字符串比较
            (AssertValue::String(a), AssertValue::String(b)) => match op {
                CompareOp::Equal => Ok(a == b),
                CompareOp::NotEqual => Ok(a != b),
                _ => Err(AssertError::InvalidOperator(format!(
                    "Operator {} not supported for strings",
                    op
                ))),
            },

            // 布尔比较
            (AssertValue::Bool(a), AssertValue::Bool(b)) => match op {
                CompareOp::Equal => Ok(a == b),
                CompareOp::NotEqual => Ok(a != b),
                _ => Err(AssertError::InvalidOperator(format!(
                    "Operator {} not supported for boolean values",
                    op
                ))),
            },

            // 对象/数组：完全结构相等
            (AssertValue::Json(a), AssertValue::Json(b)) => match op {
                CompareOp::Equal => Ok(json_equal(a, b)),
                CompareOp::NotEqual => Ok(!json_equal(a, b)),
                _ => Err(AssertError::InvalidOperator(format!(
                    "Operator {} not supported for {}",
                    op,
                    self.type_name()
                ))),
            },

            // Null 与任意类型
            (AssertValue::Null, _) | (_, AssertValue::Null) => match op {
                CompareOp::Equal => Ok(self == other),
                CompareOp::NotEqual => Ok(self != other),
                _ => Err(AssertError::InvalidOperator(format!(
                    "Operator {} not supported for null comparison",
                    op
                ))),
            },

            _ => Err(self.mismatch(other)),
        }
    }

    fn contains(&self, other: &AssertValue) -> Result<bool, AssertError> {
        match (self, other) {
            (AssertValue::Json(actual), AssertValue::Json(expected)) => {
                Ok(is_subset(actual, expected))
            }
            (AssertValue::Json(Value::Array(items)), scalar) => {
                let expected = scalar.to_json();
                Ok(items.iter().any(|item| is_subset(item, &expected)))
            }
            _ => match (self.as_text(), other.as_text()) {
                (Some(actual), Some(expected)) => Ok(actual.contains(&expected)),
                _ => Err(self.mismatch(other)),
            },
        }
    }

    fn matches(&self, other: &AssertValue) -> Result<bool, AssertError> {
        let AssertValue::String(pattern) = other else {
            return Err(AssertError::InvalidValue(format!(
                "matches expects a regex string, got {}",
                other
            )));
        };
        let re = Regex::new(pattern)
            .map_err(|e| AssertError::InvalidValue(format!("invalid regex {}: {}", pattern, e)))?;
        let text = self
            .as_text()
            .ok_or_else(|| self.mismatch(&AssertValue::String(String::new())))?;
        Ok(re.is_match(&text))
    }
}

/// 数字按数值比较的结构相等
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_equal(v, other)))
        }
        _ => a == b,
    }
}

/// 部分结构匹配：expected 中的每个字段/元素都能在 actual 中找到
fn is_subset(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => e
            .iter()
            .all(|(k, ev)| a.get(k).is_some_and(|av| is_subset(av, ev))),
        (Value::Array(a), Value::Array(e)) => {
            e.iter().all(|ev| a.iter().any(|av| is_subset(av, ev)))
        }
        _ => json_equal(actual, expected),
    }
}

/// 加载时解析好的断言，保留原始文本用于报告
#[derive(Debug, Clone, PartialEq, serde::Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expectation {
    pub raw: String,
    pub expr: AssertExpr,
}

impl Expectation {
    pub fn parse(raw: &str) -> Result<Self, AssertError> {
        Ok(Self {
            raw: raw.trim().to_string(),
            expr: crate::assertion::parser::parse_assertion(raw)?,
        })
    }
}

impl TryFrom<String> for Expectation {
    type Error = AssertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).map_err(|e| AssertError::InvalidExpectation {
            raw: value.trim().to_string(),
            reason: e.to_string(),
        })
    }
}

impl From<Expectation> for String {
    fn from(expectation: Expectation) -> Self {
        expectation.raw
    }
}

/// 一个步骤全部断言的结论
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub passed: bool,

    /// 第一个失败断言的说明
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    pub assertions: Vec<AssertionResult>,
}

/// 断言结果
#[derive(Debug, Clone, Serialize)]
pub struct AssertionResult {
    /// 原始断言字符串
    pub raw: String,

    /// 是否通过
    pub passed: bool,

    /// 实际值（字符串表示）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    /// 期望描述
    pub expected: String,

    /// 失败消息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AssertionResult {
    /// 创建成功的断言结果
    pub fn success(raw: String, actual: String, expected: String) -> Self {
        Self {
            raw,
            passed: true,
            actual: Some(actual),
            expected,
            message: None,
        }
    }

    /// 创建失败的断言结果
    pub fn failure(raw: String, actual: String, expected: String, message: String) -> Self {
        Self {
            raw,
            passed: false,
            actual: Some(actual),
            expected,
            message: Some(message),
        }
    }

    /// 创建错误的断言结果（解析或执行错误）
    pub fn error(raw: String, error: AssertError) -> Self {
        Self {
            raw,
            passed: false,
            actual: None,
            expected: String::new(),
            message: Some(error.to_string()),
        }
    }
}
