use std::fmt;
use std::time::{Duration, Instant};

/// 获取凭证失败
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("credential service unreachable: {0}")]
    Unreachable(String),

    #[error("credential request rejected with status {0}")]
    Rejected(u16),

    #[error("token not found in credential response: {0}")]
    MissingToken(String),

    #[error("no credential recipe configured")]
    NotConfigured,
}

/// 凭证配方返回的原始凭证
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub value: String,

    /// 有效期；为空时使用默认有效期
    pub expires_in: Option<Duration>,
}

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_in: None,
        }
    }

    pub fn expiring_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }
}

/// 缓存中的 Token
///
/// `generation` 每次获取/刷新递增，用来判断被拒绝的 Token 是否仍是当前缓存。
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    generation: u64,
    acquired_at: Instant,
    expires_at: Option<Instant>,
}

impl Token {
    pub(crate) fn new(value: String, generation: u64, ttl: Option<Duration>) -> Self {
        let acquired_at = Instant::now();
        Self {
            value,
            generation,
            acquired_at,
            expires_at: ttl.and_then(|ttl| acquired_at.checked_add(ttl)),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

// Token 值不出现在日志里
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("generation", &self.generation)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
