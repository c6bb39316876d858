use crate::variable::types::ExtractError;
use serde_json::Value;
use std::fmt;

/// 路径段
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// 对象键；作用于数组时若为数字则按下标处理（`items.0`）
    Key(String),
    /// 显式下标（`items[0]`）
    Index(usize),
}

/// 路径表达式，用于从 JSON 响应中读取值
///
/// 支持的写法：
/// - `data.user.id`
/// - `data.items[0].id` / `[1]` / `items[0][2]`
/// - `data.items.0.id`
/// - `$.data.id` 或 `.data.id`（前缀会被忽略）
/// - 空字符串表示整个 body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathExpr {
    raw: String,
    segments: Vec<Segment>,
}

impl PathExpr {
    pub fn parse(input: &str) -> Result<Self, ExtractError> {
        let raw = input.trim();
        let clean = raw.strip_prefix('$').unwrap_or(raw);
        let clean = clean.strip_prefix('.').unwrap_or(clean);

        let mut segments = Vec::new();
        if !clean.is_empty() {
            for part in clean.split('.') {
                Self::parse_part(raw, part, &mut segments)?;
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    fn parse_part(raw: &str, part: &str, segments: &mut Vec<Segment>) -> Result<(), ExtractError> {
        if part.is_empty() {
            return Err(ExtractError::InvalidPath(format!(
                "empty segment in '{}'",
                raw
            )));
        }

        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if !key.is_empty() {
            if key.contains(']') {
                return Err(ExtractError::InvalidPath(format!(
                    "unbalanced ']' in '{}'",
                    raw
                )));
            }
            segments.push(Segment::Key(key.to_string()));
        }

        while !rest.is_empty() {
            let close = match (rest.starts_with('['), rest.find(']')) {
                (true, Some(close)) => close,
                _ => {
                    return Err(ExtractError::InvalidPath(format!(
                        "malformed index in '{}'",
                        raw
                    )));
                }
            };
            let index = rest[1..close].trim().parse::<usize>().map_err(|_| {
                ExtractError::InvalidPath(format!(
                    "index '{}' in '{}' is not a non-negative integer",
                    &rest[1..close],
                    raw
                ))
            })?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
        }

        Ok(())
    }

    /// 是否指向整个文档
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// 在 JSON 值上求值
    pub fn evaluate<'a>(&self, root: &'a Value) -> Result<&'a Value, ExtractError> {
        let mut current = root;

        for (pos, segment) in self.segments.iter().enumerate() {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map
                    .get(key)
                    .ok_or_else(|| ExtractError::PathNotFound(self.prefix(pos)))?,
                (Segment::Key(key), Value::Array(items)) => {
                    let index = key.parse::<usize>().map_err(|_| ExtractError::TypeMismatch {
                        path: self.prefix(pos),
                        expected: "object",
                        found: "array",
                    })?;
                    items
                        .get(index)
                        .ok_or_else(|| ExtractError::PathNotFound(self.prefix(pos)))?
                }
                (Segment::Index(index), Value::Array(items)) => items
                    .get(*index)
                    .ok_or_else(|| ExtractError::PathNotFound(self.prefix(pos)))?,
                (Segment::Key(_), other) => {
                    return Err(ExtractError::TypeMismatch {
                        path: self.prefix(pos),
                        expected: "object",
                        found: value_kind(other),
                    });
                }
                (Segment::Index(_), other) => {
                    return Err(ExtractError::TypeMismatch {
                        path: self.prefix(pos),
                        expected: "array",
                        found: value_kind(other),
                    });
                }
            };
        }

        Ok(current)
    }

    /// 渲染前 `upto + 1` 个路径段，用于错误信息
    fn prefix(&self, upto: usize) -> String {
        let mut out = String::new();
        for segment in self.segments.iter().take(upto + 1) {
            match segment {
                Segment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                Segment::Index(index) => out.push_str(&format!("[{}]", index)),
            }
        }
        out
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// JSON 值的类型名
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
