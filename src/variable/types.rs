use serde_json::Value;
use std::collections::HashMap;

/// 提取 / 路径求值错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("Invalid path expression: {0}")]
    InvalidPath(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Type mismatch at '{path}': expected {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Response body is not valid JSON: {0}")]
    InvalidBody(String),

    #[error("Header '{0}' not found")]
    HeaderNotFound(String),

    #[error("Header '{0}' is not valid UTF-8")]
    InvalidHeader(String),

    #[error("Pattern '{0}' did not match the response body")]
    NoMatch(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// 单个用例的执行上下文
///
/// 只属于一次用例执行，保存前面步骤提取出的值。同名提取允许覆盖，
/// 步骤顺序决定每个时刻可见的值。
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    values: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// 批量写入（用于一次步骤的全部提取结果）
    pub fn extend(&mut self, values: impl IntoIterator<Item = (String, Value)>) {
        self.values.extend(values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 运行级常量池（来自配置环境和 CLI 覆盖）
#[derive(Debug, Clone, Default)]
pub struct Constants {
    values: HashMap<String, String>,
}

impl Constants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn extend(&mut self, vars: HashMap<String, String>) {
        self.values.extend(vars);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 占位符查找范围：先查用例上下文，再查常量池
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub context: &'a ExecutionContext,
    pub constants: &'a Constants,
}

impl<'a> Scope<'a> {
    pub fn new(context: &'a ExecutionContext, constants: &'a Constants) -> Self {
        Self { context, constants }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.context
            .get(name)
            .cloned()
            .or_else(|| self.constants.get(name).map(|s| Value::String(s.to_string())))
    }
}
