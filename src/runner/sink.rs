use crate::Result;
use crate::runner::types::{CaseResult, RunResult};

/// 结果的持久化出口
///
/// 在汇总线程上调用；返回的错误只记录警告，不影响运行结果。
pub trait ResultSink: Send + Sync {
    fn record_case(&self, result: &CaseResult) -> Result<()>;

    fn record_run(&self, _run: &RunResult) -> Result<()> {
        Ok(())
    }
}
