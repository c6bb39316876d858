use crate::http::Response;
use crate::variable::path::PathExpr;
use crate::variable::types::ExtractError;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// 变量捕获来源
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaptureSource {
    /// 从响应 Body 提取（路径表达式）
    /// 示例: body.token, body.data.items[0].id
    Body(PathExpr),

    /// 从响应 Header 提取
    /// 示例: header.X-Token
    Header(String),

    /// 响应状态码
    Status,

    /// 在原始 Body 上执行正则，取第一个捕获组（无捕获组时取整个匹配）
    /// 示例: regex:token=(\w+)
    Regex(String),
}

/// 变量捕获配置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableCapture {
    /// 变量名称
    pub name: String,

    /// 捕获来源
    pub source: CaptureSource,
}

impl VariableCapture {
    /// 从 Body 提取变量
    pub fn from_body(name: impl Into<String>, path: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            name: name.into(),
            source: CaptureSource::Body(PathExpr::parse(path)?),
        })
    }

    /// 从 Header 提取变量
    pub fn from_header(name: impl Into<String>, header_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: CaptureSource::Header(header_name.into()),
        }
    }

    /// 解析捕获源字符串
    ///
    /// 语法:
    /// - `body.user.id` / `user.id` → CaptureSource::Body
    /// - `header.X-Token` → CaptureSource::Header
    /// - `status` → CaptureSource::Status
    /// - `regex:id=(\d+)` → CaptureSource::Regex
    pub fn parse(var_name: &str, source_str: &str) -> Result<Self, ExtractError> {
        let source_str = source_str.trim();
        let source = if source_str == "status" {
            CaptureSource::Status
        } else if source_str == "body" {
            CaptureSource::Body(PathExpr::parse("")?)
        } else if let Some(path) = source_str.strip_prefix("body.") {
            CaptureSource::Body(PathExpr::parse(path)?)
        } else if let Some(header_name) = source_str.strip_prefix("header.") {
            CaptureSource::Header(header_name.to_string())
        } else if let Some(pattern) = source_str.strip_prefix("regex:") {
            Regex::new(pattern).map_err(|e| ExtractError::InvalidPattern(e.to_string()))?;
            CaptureSource::Regex(pattern.to_string())
        } else {
            // 默认从 body 提取
            CaptureSource::Body(PathExpr::parse(source_str)?)
        };

        Ok(Self {
            name: var_name.to_string(),
            source,
        })
    }

    /// 从响应中取出该变量的值
    pub fn extract(&self, response: &Response) -> Result<Value, ExtractError> {
        match &self.source {
            CaptureSource::Body(path) => extract(response, path),
            CaptureSource::Header(name) => {
                let value = response
                    .headers
                    .get(name.as_str())
                    .ok_or_else(|| ExtractError::HeaderNotFound(name.clone()))?;
                let text = value
                    .to_str()
                    .map_err(|_| ExtractError::InvalidHeader(name.clone()))?;
                Ok(Value::String(text.to_string()))
            }
            CaptureSource::Status => Ok(Value::from(response.status.code())),
            CaptureSource::Regex(pattern) => {
                let re =
                    Regex::new(pattern).map_err(|e| ExtractError::InvalidPattern(e.to_string()))?;
                let caps = re
                    .captures(&response.body)
                    .ok_or_else(|| ExtractError::NoMatch(pattern.clone()))?;
                let matched = caps.get(1).or_else(|| caps.get(0));
                matched
                    .map(|m| Value::String(m.as_str().to_string()))
                    .ok_or_else(|| ExtractError::NoMatch(pattern.clone()))
            }
        }
    }
}

/// 按路径表达式从响应 Body 读取值
pub fn extract(response: &Response, path: &PathExpr) -> Result<Value, ExtractError> {
    let document = response
        .json()
        .map_err(|e| ExtractError::InvalidBody(e.to_string()))?;
    path.evaluate(&document).cloned()
}

/// 把 `name → source` 映射反序列化为捕获列表
pub fn deserialize_captures<'de, D>(deserializer: D) -> Result<Vec<VariableCapture>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: BTreeMap<String, String> = BTreeMap::deserialize(deserializer)?;
    map.iter()
        .map(|(name, source)| {
            VariableCapture::parse(name, source).map_err(|e| {
                serde::de::Error::custom(format!("extract '{}': {}", name, e))
            })
        })
        .collect()
}
