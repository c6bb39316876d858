use thiserror::Error;

use crate::http::DispatchError;
use crate::token::AuthError;
use crate::variable::ExtractError;

#[derive(Error, Debug)]
pub enum CaserunError {
    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("调度错误: {0}")]
    Schedule(String),

    #[error("HTTP 客户端错误: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML 解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("URL 解析错误: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for CaserunError {
    fn from(err: anyhow::Error) -> Self {
        CaserunError::Other(err.to_string())
    }
}

impl From<crate::loader::LoadError> for CaserunError {
    fn from(err: crate::loader::LoadError) -> Self {
        CaserunError::ParseError(err.to_string())
    }
}

/// Result type for caserun crate
pub type Result<T> = std::result::Result<T, CaserunError>;

/// 单个步骤的失败原因
///
/// 所有步骤级错误都在 Case Runner 边界被捕获并记录到 `StepResult` 中，
/// 不会中断整个运行。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("token acquisition failed: {0}")]
    AuthAcquisition(#[from] AuthError),

    #[error("request rejected as unauthenticated (status {status}) after token refresh")]
    AuthRejected { status: u16 },

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("assertion failed: {detail}")]
    Assertion { detail: String },

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("unresolved placeholder(s): {}", .names.join(", "))]
    UnresolvedPlaceholder { names: Vec<String> },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("case panicked: {0}")]
    Panicked(String),
}

impl StepError {
    /// 错误类别，用于报告和历史记录
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::AuthAcquisition(_) => "auth_acquisition",
            StepError::AuthRejected { .. } => "auth_rejected",
            StepError::Dispatch(_) => "dispatch",
            StepError::Assertion { .. } => "assertion",
            StepError::Extraction(_) => "extraction",
            StepError::UnresolvedPlaceholder { .. } => "unresolved_placeholder",
            StepError::InvalidRequest(_) => "invalid_request",
            StepError::Panicked(_) => "panicked",
        }
    }
}

impl serde::Serialize for StepError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("StepError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
