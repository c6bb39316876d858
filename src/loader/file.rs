use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::loader::types::{LoadError, TestCase};

/// 测试数据来源
pub trait CaseLoader {
    /// 按声明顺序返回用例
    fn load(&self) -> Result<Vec<TestCase>, LoadError>;
}

/// 带 `cases` 字段的顶层对象（JSON 对象或 TOML 的 `[[cases]]`）
#[derive(Deserialize)]
struct CaseTable {
    #[serde(default)]
    cases: Vec<TestCase>,
}

/// 从 `.json` / `.toml` 文件加载用例
#[derive(Debug, Clone)]
pub struct FileLoader {
    path: PathBuf,
}

impl FileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 解析 JSON 内容
    ///
    /// 顶层是数组时按用例列表解析，否则按 `{"cases": [...]}` 解析，
    /// 字段错误原样返回。
    pub fn parse_json(content: &str) -> Result<Vec<TestCase>, LoadError> {
        if content.trim_start().starts_with('[') {
            Ok(serde_json::from_str(content)?)
        } else {
            let table: CaseTable = serde_json::from_str(content)?;
            Ok(table.cases)
        }
    }

    /// 解析 TOML 内容（`[[cases]]` 数组）
    pub fn parse_toml(content: &str) -> Result<Vec<TestCase>, LoadError> {
        let table: CaseTable = toml::from_str(content)?;
        Ok(table.cases)
    }
}

impl CaseLoader for FileLoader {
    fn load(&self) -> Result<Vec<TestCase>, LoadError> {
        let content = fs::read_to_string(&self.path)?;
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let cases = match extension.as_str() {
            "json" => Self::parse_json(&content)?,
            "toml" => Self::parse_toml(&content)?,
            other => return Err(LoadError::UnsupportedFormat(other.to_string())),
        };

        if cases.is_empty() {
            return Err(LoadError::NoCases(self.path.display().to_string()));
        }

        debug!(path = %self.path.display(), count = cases.len(), "loaded test cases");
        Ok(cases)
    }
}

/// 已在内存中的用例
impl CaseLoader for Vec<TestCase> {
    fn load(&self) -> Result<Vec<TestCase>, LoadError> {
        Ok(self.clone())
    }
}
