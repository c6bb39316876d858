use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::{CaseResult, CaseStatus};

/// 历史记录条目：一个用例的执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    /// 唯一 ID (UUID)
    pub id: String,

    /// 用例开始时间
    pub timestamp: DateTime<Utc>,

    pub case_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    pub status: CaseStatus,

    /// 已记录的步骤数
    pub steps: usize,

    /// 用例耗时 (毫秒)
    pub duration_ms: u64,

    /// 失败步骤 (不包含响应 Body，节省空间)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureMeta>,
}

/// 失败步骤的摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMeta {
    pub step: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    pub kind: String,
    pub message: String,
}

impl CaseRecord {
    pub fn from_case(result: &CaseResult) -> Self {
        let failure = result.failed_step().map(|step| FailureMeta {
            step: step.name.clone(),
            request: step.request.as_ref().map(|r| r.request_line()),
            status: step.response.as_ref().map(|r| r.status.code()),
            kind: step
                .error
                .as_ref()
                .map(|e| e.kind().to_string())
                .unwrap_or_default(),
            message: step
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        });

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: result.started_at,
            case_id: result.case_id.clone(),
            group: result.group.clone(),
            status: result.status,
            steps: result.steps.len(),
            duration_ms: result.duration.as_millis() as u64,
            failure,
        }
    }
}
