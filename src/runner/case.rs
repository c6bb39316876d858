use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::Result;
use crate::assertion::verify;
use crate::config::RunConfig;
use crate::error::StepError;
use crate::http::{Dispatcher, HttpTransport, Transport};
use crate::loader::{Step, TestCase};
use crate::runner::types::{CaseResult, CaseStatus, StepResult};
use crate::token::TokenManager;
use crate::variable::{Constants, ExecutionContext, RequestDefaults, Scope, VariableResolver};

/// 驱动单个用例：按顺序执行 解析 → 发送 → 断言 → 提取
///
/// 每次 [`run`](CaseRunner::run) 都使用全新的 [`ExecutionContext`]，
/// 不同用例之间看不到彼此提取的值。
#[derive(Clone)]
pub struct CaseRunner {
    dispatcher: Dispatcher,
    constants: Arc<Constants>,
    defaults: Arc<RequestDefaults>,
}

impl CaseRunner {
    pub fn new(dispatcher: Dispatcher, constants: Constants, defaults: RequestDefaults) -> Self {
        Self {
            dispatcher,
            constants: Arc::new(constants),
            defaults: Arc::new(defaults),
        }
    }

    /// 按配置组装 HTTP 传输、Token 管理器和默认请求参数
    pub fn from_config(config: &RunConfig, constants: Constants) -> Result<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config.transport_settings())?);
        let defaults = config.request_defaults(&constants);

        let mut dispatcher = Dispatcher::new(transport);
        if let Some(auth) = &config.auth {
            let recipe = auth.recipe(&config.engine, defaults.base_url.as_deref())?;
            let tokens = Arc::new(TokenManager::from_boxed(recipe, auth.token_settings()));
            dispatcher = dispatcher.with_tokens(tokens, auth.binding());
        }

        Ok(Self::new(dispatcher, constants, defaults))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// 执行一个用例，所有步骤级错误都转换为失败的 `CaseResult`
    pub fn run(&self, case: &TestCase) -> CaseResult {
        if !case.enabled {
            info!(case = %case.id, "case disabled, skipped");
            return CaseResult::skipped(case.id.clone(), case.group.clone());
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let mut context = ExecutionContext::new();
        let mut steps = Vec::new();
        let mut status = CaseStatus::Passed;

        for (index, step) in case.steps.iter().enumerate() {
            if !step.enabled {
                debug!(case = %case.id, step = %step.label(index), "step disabled");
                continue;
            }

            let result = self.run_step(index, step, &mut context);
            let failed = !result.passed();
            steps.push(result);
            if failed {
                status = CaseStatus::Failed;
                break;
            }
        }

        info!(
            case = %case.id,
            status = status.as_str(),
            steps = steps.len(),
            "case finished"
        );

        CaseResult {
            case_id: case.id.clone(),
            group: case.group.clone(),
            status,
            steps,
            started_at,
            duration: start.elapsed(),
        }
    }

    fn run_step(&self, index: usize, step: &Step, context: &mut ExecutionContext) -> StepResult {
        let mut result = StepResult::new(index, step.label(index));
        let start = Instant::now();

        let outcome = self.execute_step(step, context, &mut result);
        result.duration = start.elapsed();

        match outcome {
            Ok(()) => debug!(step = %result.name, "step passed"),
            Err(err) => {
                warn!(step = %result.name, kind = err.kind(), error = %err, "step failed");
                result.error = Some(err);
            }
        }
        result
    }

    fn execute_step(
        &self,
        step: &Step,
        context: &mut ExecutionContext,
        result: &mut StepResult,
    ) -> std::result::Result<(), StepError> {
        let request = VariableResolver::resolve_request(
            &step.request,
            Scope::new(context, &self.constants),
            &self.defaults,
        )?;
        result.request = Some(request.clone());

        let mut dispatched = self.dispatcher.send(&request)?;

        // 认证被拒绝时刷新 Token 并重试一次
        if let Some(token) = dispatched.token.take()
            && self.dispatcher.is_auth_rejection(&dispatched.response)
        {
            warn!(
                request = %request.request_line(),
                status = dispatched.response.status.code(),
                "request rejected as unauthenticated, retrying with a fresh token"
            );
            self.dispatcher.invalidate(&token);
            result.retried = true;

            dispatched = self.dispatcher.send(&request)?;
            if self.dispatcher.is_auth_rejection(&dispatched.response) {
                let status = dispatched.response.status.code();
                result.response = Some(dispatched.response);
                return Err(StepError::AuthRejected { status });
            }
        }

        let response = dispatched.response;
        let verdict = verify(&response, &step.expect);
        let failure = verdict.detail.clone();
        result.verdict = Some(verdict);
        let response = result.response.insert(response);

        if let Some(detail) = failure {
            return Err(StepError::Assertion { detail });
        }

        // 全部提取成功后才写入上下文
        let mut extracted = Vec::with_capacity(step.extract.len());
        for capture in &step.extract {
            let value = capture.extract(response)?;
            debug!(variable = %capture.name, "value extracted");
            extracted.push((capture.name.clone(), value));
        }
        context.extend(extracted);

        Ok(())
    }
}
