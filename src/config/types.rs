use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::Result;
use crate::http::{Method, TokenBinding, TransportSettings};
use crate::runner::Schedule;
use crate::token::{CredentialRecipe, LoginRecipe, LoginSettings, NoRecipe, TokenSettings};
use crate::variable::{Constants, PathExpr, RequestDefaults, VariableResolver};

/// 调度方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Sequential,
    Grouped,
    Pooled,
}

/// `[engine]` 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    /// 每次发送前暂停
    pub request_interval_ms: u64,
    pub verify_tls: bool,
    pub workers: usize,
    pub mode: RunMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 5000,
            request_interval_ms: 0,
            verify_tls: true,
            workers: 8,
            mode: RunMode::Sequential,
        }
    }
}

/// `[auth]` 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 登录接口；为空时只使用预置/备用 Token
    pub login_url: Option<String>,
    pub method: Method,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 自定义登录请求体，覆盖 username/password
    pub body: Option<Value>,
    pub token_path: String,
    pub expires_in_path: Option<String>,
    pub expiry_secs: u64,
    pub header: String,
    pub scheme: String,
    pub default_token: Option<String>,
    pub backup_token: Option<String>,
    pub reject_statuses: Vec<u16>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_url: None,
            method: Method::Post,
            username: None,
            password: None,
            body: None,
            token_path: "token".to_string(),
            expires_in_path: None,
            expiry_secs: 7200,
            header: "Authorization".to_string(),
            scheme: "Bearer".to_string(),
            default_token: None,
            backup_token: None,
            reject_statuses: vec![401],
        }
    }
}

impl AuthConfig {
    pub fn token_settings(&self) -> TokenSettings {
        let resolve = |s: &Option<String>| s.as_deref().map(VariableResolver::resolve_env_vars);
        TokenSettings {
            default_ttl: Duration::from_secs(self.expiry_secs),
            seed: resolve(&self.default_token),
            backup: resolve(&self.backup_token),
        }
    }

    pub fn binding(&self) -> TokenBinding {
        TokenBinding {
            header: self.header.clone(),
            scheme: self.scheme.clone(),
            reject_statuses: self.reject_statuses.clone(),
        }
    }

    /// 登录请求体；字符串中的 `${VAR}` 会被展开
    pub fn login_body(&self) -> Value {
        let body = self.body.clone().unwrap_or_else(|| {
            json!({
                "username": self.username.clone().unwrap_or_default(),
                "password": self.password.clone().unwrap_or_default(),
            })
        });
        expand_env(body)
    }

    /// 按配置创建凭证配方
    pub fn recipe(
        &self,
        engine: &EngineConfig,
        base_url: Option<&str>,
    ) -> Result<Box<dyn CredentialRecipe>> {
        let Some(login_url) = self.login_url.as_deref() else {
            return Ok(Box::new(NoRecipe));
        };

        let url = if login_url.starts_with("http://") || login_url.starts_with("https://") {
            login_url.to_string()
        } else {
            let base = base_url.ok_or_else(|| {
                crate::CaserunError::ConfigError(format!(
                    "relative login_url '{}' requires engine.base_url",
                    login_url
                ))
            })?;
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                login_url.trim_start_matches('/')
            )
        };
        url::Url::parse(&url)?;

        let token_path = PathExpr::parse(&self.token_path)
            .map_err(|e| crate::CaserunError::ConfigError(format!("auth.token_path: {}", e)))?;
        let expires_in_path = self
            .expires_in_path
            .as_deref()
            .map(PathExpr::parse)
            .transpose()
            .map_err(|e| {
                crate::CaserunError::ConfigError(format!("auth.expires_in_path: {}", e))
            })?;

        let recipe = LoginRecipe::new(LoginSettings {
            url,
            method: self.method,
            body: self.login_body(),
            token_path,
            expires_in_path,
            timeout: Duration::from_millis(engine.timeout_ms),
            verify_tls: engine.verify_tls,
        })?;
        Ok(Box::new(recipe))
    }
}

fn expand_env(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(VariableResolver::resolve_env_vars(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(expand_env).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, expand_env(v))).collect()),
        other => other,
    }
}

/// 环境配置（一组常量）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Environment {
    #[serde(flatten)]
    pub variables: HashMap<String, String>,
}

/// `caserun.toml` 的完整内容
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub auth: Option<AuthConfig>,
    /// 所有请求的默认 Header
    pub headers: BTreeMap<String, String>,
    pub environments: HashMap<String, Environment>,
}

impl RunConfig {
    pub fn get_environment(&self, env_name: &str) -> Option<&Environment> {
        self.environments.get(env_name)
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            timeout: Duration::from_millis(self.engine.timeout_ms),
            request_interval: Duration::from_millis(self.engine.request_interval_ms),
            verify_tls: self.engine.verify_tls,
        }
    }

    /// base_url 优先取 `[engine]`，其次取常量池中的 `base_url`
    pub fn request_defaults(&self, constants: &Constants) -> RequestDefaults {
        let base_url = self
            .engine
            .base_url
            .as_deref()
            .map(VariableResolver::resolve_env_vars)
            .or_else(|| constants.get("base_url").map(str::to_string));

        RequestDefaults {
            base_url,
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), VariableResolver::resolve_env_vars(v)))
                .collect(),
        }
    }

    pub fn schedule(&self) -> Schedule {
        match self.engine.mode {
            RunMode::Sequential => Schedule::Sequential,
            RunMode::Grouped => Schedule::Grouped,
            RunMode::Pooled => Schedule::Pooled {
                workers: self.engine.workers,
            },
        }
    }
}
