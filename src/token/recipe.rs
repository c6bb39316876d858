use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::Result;
use crate::http::Method;
use crate::token::types::{AuthError, Credential};
use crate::variable::PathExpr;

/// 凭证获取方式
///
/// 由 [`TokenManager`](crate::token::TokenManager) 在刷新路径上调用，
/// 调用期间管理器持有锁。
pub trait CredentialRecipe: Send + Sync {
    fn fetch(&self) -> std::result::Result<Credential, AuthError>;
}

impl<F> CredentialRecipe for F
where
    F: Fn() -> std::result::Result<Credential, AuthError> + Send + Sync,
{
    fn fetch(&self) -> std::result::Result<Credential, AuthError> {
        self()
    }
}

/// 固定凭证
#[derive(Debug, Clone)]
pub struct StaticRecipe {
    value: String,
}

impl StaticRecipe {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl CredentialRecipe for StaticRecipe {
    fn fetch(&self) -> std::result::Result<Credential, AuthError> {
        Ok(Credential::new(self.value.clone()))
    }
}

/// 未配置认证时使用，任何获取都会失败
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecipe;

impl CredentialRecipe for NoRecipe {
    fn fetch(&self) -> std::result::Result<Credential, AuthError> {
        Err(AuthError::NotConfigured)
    }
}

/// 登录接口配置
#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub url: String,
    pub method: Method,
    pub body: Value,
    pub token_path: PathExpr,
    pub expires_in_path: Option<PathExpr>,
    pub timeout: Duration,
    pub verify_tls: bool,
}

/// 调用登录接口获取 Token
pub struct LoginRecipe {
    client: reqwest::blocking::Client,
    settings: LoginSettings,
}

impl LoginRecipe {
    pub fn new(settings: LoginSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()?;
        Ok(Self { client, settings })
    }
}

impl CredentialRecipe for LoginRecipe {
    fn fetch(&self) -> std::result::Result<Credential, AuthError> {
        debug!(url = %self.settings.url, "requesting credential");

        let response = self
            .client
            .request(self.settings.method.to_reqwest(), &self.settings.url)
            .json(&self.settings.body)
            .send()
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(status.as_u16()));
        }

        let body: Value = response
            .json()
            .map_err(|e| AuthError::MissingToken(format!("response is not JSON: {}", e)))?;

        credential_from_body(&body, &self.settings.token_path, self.settings.expires_in_path.as_ref())
    }
}

/// 从登录响应中取出 Token 与有效期
fn credential_from_body(
    body: &Value,
    token_path: &PathExpr,
    expires_in_path: Option<&PathExpr>,
) -> std::result::Result<Credential, AuthError> {
    let value = match token_path.evaluate(body) {
        Ok(Value::String(s)) if !s.is_empty() => s.clone(),
        Ok(Value::Number(n)) => n.to_string(),
        Ok(_) => return Err(AuthError::MissingToken(format!("{} is empty", token_path))),
        Err(e) => return Err(AuthError::MissingToken(e.to_string())),
    };

    let mut credential = Credential::new(value);
    if let Some(path) = expires_in_path {
        let secs = path.evaluate(body).ok().and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        if let Some(secs) = secs {
            credential = credential.expiring_in(Duration::from_secs(secs));
        }
    }
    Ok(credential)
}
