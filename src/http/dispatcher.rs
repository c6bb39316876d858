use std::sync::Arc;

use tracing::debug;

use crate::error::StepError;
use crate::http::client::Transport;
use crate::http::request::ResolvedRequest;
use crate::http::response::Response;
use crate::token::{AuthError, Token, TokenManager};

/// Token 如何附加到请求上，以及哪些状态码视为认证被拒绝
#[derive(Debug, Clone)]
pub struct TokenBinding {
    pub header: String,

    /// 为空时直接发送 Token 原值
    pub scheme: String,

    pub reject_statuses: Vec<u16>,
}

impl Default for TokenBinding {
    fn default() -> Self {
        Self {
            header: "Authorization".to_string(),
            scheme: "Bearer".to_string(),
            reject_statuses: vec![401],
        }
    }
}

impl TokenBinding {
    pub fn header_value(&self, token: &Token) -> String {
        if self.scheme.is_empty() {
            token.value().to_string()
        } else {
            format!("{} {}", self.scheme, token.value())
        }
    }
}

/// 一次发送的结果，附带本次使用的 Token（若有）
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub response: Response,
    pub token: Option<Token>,
}

/// 发送已解析的请求并按需附加 Token
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    tokens: Option<Arc<TokenManager>>,
    binding: TokenBinding,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            tokens: None,
            binding: TokenBinding::default(),
        }
    }

    pub fn with_tokens(mut self, tokens: Arc<TokenManager>, binding: TokenBinding) -> Self {
        self.tokens = Some(tokens);
        self.binding = binding;
        self
    }

    pub fn tokens(&self) -> Option<&Arc<TokenManager>> {
        self.tokens.as_ref()
    }

    pub fn send(&self, request: &ResolvedRequest) -> Result<Dispatched, StepError> {
        if !request.auth {
            let response = self.transport.execute(request)?;
            return Ok(Dispatched {
                response,
                token: None,
            });
        }

        let tokens = self.tokens.as_ref().ok_or(AuthError::NotConfigured)?;
        let token = tokens.acquire()?;

        let mut authorized = request.clone();
        authorized.set_header(&self.binding.header, self.binding.header_value(&token));
        debug!(
            request = %request.request_line(),
            generation = token.generation(),
            "attaching token"
        );

        let response = self.transport.execute(&authorized)?;
        Ok(Dispatched {
            response,
            token: Some(token),
        })
    }

    pub fn is_auth_rejection(&self, response: &Response) -> bool {
        self.binding
            .reject_statuses
            .contains(&response.status.code())
    }

    /// 返回是否真的清除了缓存
    pub fn invalidate(&self, token: &Token) -> bool {
        self.tokens
            .as_ref()
            .is_some_and(|tokens| tokens.invalidate_if_current(token))
    }
}
