use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::token::recipe::CredentialRecipe;
use crate::token::types::{AuthError, Token};

/// Token 管理配置
#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// 凭证未给出有效期时使用
    pub default_ttl: Duration,

    /// 预置 Token，在过期前直接使用
    pub seed: Option<String>,

    /// 获取失败时的备用 Token
    pub backup: Option<String>,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(7200),
            seed: None,
            backup: None,
        }
    }
}

#[derive(Debug, Default)]
struct TokenState {
    current: Option<Token>,
    generation: u64,
}

impl TokenState {
    fn install(&mut self, value: String, ttl: Duration) -> Token {
        self.generation += 1;
        let token = Token::new(value, self.generation, Some(ttl));
        self.current = Some(token.clone());
        token
    }
}

/// 整个运行共享的 Token 管理器
///
/// 检查与刷新在同一把锁内完成：N 个并发调用者遇到过期 Token 时，
/// 只有一个会调用凭证配方，其余调用者阻塞后直接拿到这次刷新的结果。
pub struct TokenManager {
    recipe: Box<dyn CredentialRecipe>,
    settings: TokenSettings,
    state: Mutex<TokenState>,
    refreshes: AtomicU64,
}

impl TokenManager {
    pub fn new(recipe: impl CredentialRecipe + 'static, settings: TokenSettings) -> Self {
        Self::from_boxed(Box::new(recipe), settings)
    }

    pub fn from_boxed(recipe: Box<dyn CredentialRecipe>, settings: TokenSettings) -> Self {
        let mut state = TokenState::default();
        if let Some(seed) = settings.seed.as_ref().filter(|s| !s.is_empty()) {
            state.install(seed.clone(), settings.default_ttl);
        }

        Self {
            recipe,
            settings,
            state: Mutex::new(state),
            refreshes: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 返回当前有效的 Token，缺失或过期时在锁内刷新
    pub fn acquire(&self) -> Result<Token, AuthError> {
        let mut state = self.lock();

        if let Some(token) = state
            .current
            .as_ref()
            .filter(|token| token.is_valid_at(Instant::now()))
        {
            return Ok(token.clone());
        }

        self.refreshes.fetch_add(1, Ordering::SeqCst);
        match self.recipe.fetch() {
            Ok(credential) => {
                let ttl = credential.expires_in.unwrap_or(self.settings.default_ttl);
                let token = state.install(credential.value, ttl);
                info!(generation = token.generation(), "token acquired");
                Ok(token)
            }
            Err(err) => match self.settings.backup.as_ref().filter(|b| !b.is_empty()) {
                Some(backup) => {
                    warn!(error = %err, "token acquisition failed, using backup token");
                    Ok(state.install(backup.clone(), self.settings.default_ttl))
                }
                None => {
                    error!(error = %err, "token acquisition failed");
                    Err(err)
                }
            },
        }
    }

    /// 无条件标记缓存失效
    pub fn invalidate(&self) {
        self.lock().current = None;
    }

    /// 仅当被拒绝的 Token 仍是当前缓存时才失效
    ///
    /// 返回是否真的清除了缓存。
    pub fn invalidate_if_current(&self, stale: &Token) -> bool {
        let mut state = self.lock();
        let is_current = state
            .current
            .as_ref()
            .is_some_and(|token| token.generation() == stale.generation());
        if is_current {
            state.current = None;
            info!(generation = stale.generation(), "token invalidated");
        }
        is_current
    }

    /// 当前缓存（不触发刷新）
    pub fn current(&self) -> Option<Token> {
        self.lock().current.clone()
    }

    /// 凭证配方被调用的次数
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }
}
