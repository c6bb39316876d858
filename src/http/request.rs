use std::collections::BTreeMap;
use std::time::Duration;

use crate::http::types::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestBody {
    Json(Value),
    Form(BTreeMap<String, String>),
    Text(String),
}

/// HTTP 头名不区分大小写：先移除同名旧值再插入
pub fn insert_header(headers: &mut BTreeMap<String, String>, name: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

/// 占位符已全部替换的请求，可直接发送
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRequest {
    pub method: Method,
    pub url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,

    /// 是否需要附加 Token
    #[serde(default)]
    pub auth: bool,

    /// 单个请求的超时（覆盖全局设置）
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl ResolvedRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
            auth: false,
            timeout: None,
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// 设置请求头，替换大小写不同的同名头
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        insert_header(&mut self.headers, key.to_string(), value.into());
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_json(mut self, data: Value) -> Self {
        self.body = Some(RequestBody::Json(data));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.body = Some(RequestBody::Text(text.to_string()));
        self
    }

    pub fn with_auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    /// 形如 `GET http://host/path` 的请求行
    pub fn request_line(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}
