use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assertion::{AssertionResult, Verdict};
use crate::error::StepError;
use crate::http::serialization;
use crate::http::{ResolvedRequest, Response};

/// 用例最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "passed",
            CaseStatus::Failed => "failed",
            CaseStatus::Skipped => "skipped",
        }
    }
}

/// 单个步骤的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// 步骤在用例中的序号（从 0 开始，含被禁用的步骤）
    pub index: usize,

    pub name: String,

    /// 解析后的请求；占位符解析失败时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<ResolvedRequest>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,

    /// 步骤总耗时（含重试）
    #[serde(with = "serialization::millis")]
    pub duration: Duration,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,

    /// 是否因认证被拒绝而重试过
    pub retried: bool,
}

impl StepResult {
    pub fn new(index: usize, name: String) -> Self {
        Self {
            index,
            name,
            request: None,
            response: None,
            verdict: None,
            duration: Duration::ZERO,
            error: None,
            retried: false,
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none()
    }

    pub fn assertions(&self) -> &[AssertionResult] {
        self.verdict
            .as_ref()
            .map(|v| v.assertions.as_slice())
            .unwrap_or_default()
    }
}

/// 单个用例的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub case_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    pub status: CaseStatus,

    /// 已执行的步骤；失败后的步骤不会出现
    pub steps: Vec<StepResult>,

    pub started_at: DateTime<Utc>,

    #[serde(with = "serialization::millis")]
    pub duration: Duration,
}

impl CaseResult {
    pub fn skipped(case_id: impl Into<String>, group: Option<String>) -> Self {
        Self {
            case_id: case_id.into(),
            group,
            status: CaseStatus::Skipped,
            steps: Vec::new(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// 执行中 panic 的用例，记为失败
    pub fn panicked(case_id: impl Into<String>, group: Option<String>, message: String) -> Self {
        let mut step = StepResult::new(0, "<case>".to_string());
        step.error = Some(StepError::Panicked(message));
        Self {
            case_id: case_id.into(),
            group,
            status: CaseStatus::Failed,
            steps: vec![step],
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }

    /// 导致用例失败的步骤
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.passed())
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn count(&mut self, status: CaseStatus) {
        self.total += 1;
        match status {
            CaseStatus::Passed => self.passed += 1,
            CaseStatus::Failed => self.failed += 1,
            CaseStatus::Skipped => self.skipped += 1,
        }
    }
}

/// 一次运行的全部结果
///
/// 只能通过 [`RunResult::record`] 追加用例结果，计数与列表同步更新。
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    run_id: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    summary: RunSummary,
    cases: Vec<CaseResult>,
}

impl RunResult {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            summary: RunSummary::default(),
            cases: Vec::new(),
        }
    }

    pub fn record(&mut self, case: CaseResult) {
        self.summary.count(case.status);
        self.cases.push(case);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn cases(&self) -> &[CaseResult] {
        &self.cases
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn case(&self, case_id: &str) -> Option<&CaseResult> {
        self.cases.iter().find(|c| c.case_id == case_id)
    }

    /// 墙钟耗时
    pub fn duration(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// 当且仅当所有用例都通过
    pub fn success(&self) -> bool {
        self.cases.iter().all(CaseResult::is_passed)
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, status: CaseStatus) -> CaseResult {
        let mut result = CaseResult::skipped(id, None);
        result.status = status;
        result
    }

    #[test]
    fn test_record_keeps_counts_consistent() {
        let mut run = RunResult::new();
        run.record(case("a", CaseStatus::Passed));
        run.record(case("b", CaseStatus::Failed));
        run.record(case("c", CaseStatus::Skipped));
        run.record(case("d", CaseStatus::Passed));

        let summary = run.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total, run.cases().len());
        assert!(!run.success());
    }

    #[test]
    fn test_success_requires_all_passed() {
        let mut run = RunResult::new();
        assert!(run.success());
        run.record(case("a", CaseStatus::Passed));
        assert!(run.success());
        run.record(case("b", CaseStatus::Skipped));
        assert!(!run.success());
    }

    #[test]
    fn test_failed_step_lookup() {
        let mut result = case("a", CaseStatus::Failed);
        let ok = StepResult::new(0, "login".to_string());
        let mut bad = StepResult::new(1, "profile".to_string());
        bad.error = Some(StepError::Assertion {
            detail: "status == 200".to_string(),
        });
        result.steps = vec![ok, bad];

        assert_eq!(result.failed_step().unwrap().name, "profile");
    }

    #[test]
    fn test_serialized_shape() {
        let mut run = RunResult::new();
        run.record(case("a", CaseStatus::Passed));
        run.finish();

        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["summary"]["passed"], 1);
        assert_eq!(value["cases"][0]["status"], "passed");
        assert!(value["finished_at"].is_string());
    }
}
