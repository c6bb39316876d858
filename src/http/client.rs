use std::thread;
use std::time::{Duration, Instant};

use crate::Result;
use crate::http::request::{RequestBody, ResolvedRequest};
use crate::http::response::Response;
use tracing::debug;

/// 传输层错误（超时、连接失败等），与 4xx/5xx 响应不同
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request could not be built: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout(err.to_string())
        } else if err.is_connect() {
            DispatchError::Connect(err.to_string())
        } else if err.is_builder() {
            DispatchError::InvalidRequest(err.to_string())
        } else {
            DispatchError::Transport(err.to_string())
        }
    }
}

/// 可插拔的请求发送能力
///
/// 实现必须阻塞直到得到响应或超时。
pub trait Transport: Send + Sync {
    fn execute(&self, request: &ResolvedRequest) -> std::result::Result<Response, DispatchError>;
}

/// HTTP 传输配置
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// 默认请求超时
    pub timeout: Duration,

    /// 每次发送前的等待间隔
    pub request_interval: Duration,

    /// 是否校验 TLS 证书
    pub verify_tls: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            request_interval: Duration::ZERO,
            verify_tls: true,
        }
    }
}

/// 基于 reqwest 阻塞客户端的传输实现
#[derive(Clone)]
pub struct HttpTransport {
    inner: reqwest::blocking::Client,
    request_interval: Duration,
}

impl HttpTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()?;

        Ok(Self {
            inner,
            request_interval: settings.request_interval,
        })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ResolvedRequest) -> std::result::Result<Response, DispatchError> {
        let url = if request.query.is_empty() {
            reqwest::Url::parse(&request.url)
        } else {
            reqwest::Url::parse_with_params(&request.url, &request.query)
        }
        .map_err(|e| DispatchError::InvalidRequest(format!("{}: {}", request.url, e)))?;

        let mut req = self.inner.request(request.method.to_reqwest(), url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        req = match &request.body {
            Some(RequestBody::Json(value)) => req.json(value),
            Some(RequestBody::Form(fields)) => req.form(fields),
            Some(RequestBody::Text(text)) => req.body(text.clone()),
            None => req,
        };

        if !self.request_interval.is_zero() {
            thread::sleep(self.request_interval);
        }

        debug!(request = %request.request_line(), "sending request");
        let start = Instant::now();
        let response = req.send()?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text()?;
        let duration = start.elapsed();
        debug!(status, elapsed_ms = duration.as_millis() as u64, "response received");

        Response::new(status, headers, body, duration)
            .map_err(|e| DispatchError::Transport(e.to_string()))
    }
}
