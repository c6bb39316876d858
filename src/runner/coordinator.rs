use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;

use tracing::{error, info, warn};

use crate::loader::TestCase;
use crate::runner::case::CaseRunner;
use crate::runner::sink::ResultSink;
use crate::runner::types::{CaseResult, RunResult};
use crate::{CaserunError, Result};

/// 调度策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// 按声明顺序逐个执行
    Sequential,
    /// 按分组执行，组按首次出现的顺序，组内按声明顺序
    Grouped,
    /// 固定大小的工作线程池从共享队列取用例
    Pooled { workers: usize },
}

impl Schedule {
    pub fn name(&self) -> &'static str {
        match self {
            Schedule::Sequential => "sequential",
            Schedule::Grouped => "grouped",
            Schedule::Pooled { .. } => "pooled",
        }
    }
}

/// 执行协调器：调度用例并汇总结果
///
/// 汇总只发生在调用 [`run`](Coordinator::run) 的线程上，
/// 工作线程通过 channel 把 `CaseResult` 交给它。
pub struct Coordinator {
    runner: CaseRunner,
    sinks: Vec<Box<dyn ResultSink>>,
}

impl Coordinator {
    pub fn new(runner: CaseRunner) -> Self {
        Self {
            runner,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn runner(&self) -> &CaseRunner {
        &self.runner
    }

    /// 执行全部用例
    ///
    /// 只有结构性问题（用例 ID 为空或重复、线程池大小为 0）会返回错误；
    /// 单个用例失败只体现在结果中。
    pub fn run(&self, cases: &[TestCase], schedule: Schedule) -> Result<RunResult> {
        validate(cases, schedule)?;

        let mut run = RunResult::new();
        info!(
            run_id = run.run_id(),
            mode = schedule.name(),
            cases = cases.len(),
            "run started"
        );

        match schedule {
            Schedule::Sequential => {
                for case in cases {
                    let result = self.run_case(case);
                    self.collect(&mut run, result);
                }
            }
            Schedule::Grouped => {
                for (group, members) in group_cases(cases) {
                    info!(group = group.unwrap_or("<ungrouped>"), cases = members.len(), "group started");
                    for case in members {
                        let result = self.run_case(case);
                        self.collect(&mut run, result);
                    }
                }
            }
            Schedule::Pooled { workers } => self.run_pooled(cases, workers, &mut run),
        }

        run.finish();
        for sink in &self.sinks {
            if let Err(e) = sink.record_run(&run) {
                warn!(error = %e, "failed to record run result");
            }
        }

        let summary = run.summary();
        info!(
            run_id = run.run_id(),
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            "run finished"
        );
        Ok(run)
    }

    fn run_pooled(&self, cases: &[TestCase], workers: usize, run: &mut RunResult) {
        let queue = Mutex::new(cases.iter().collect::<VecDeque<_>>());
        let pool_size = workers.min(cases.len());
        let (tx, rx) = mpsc::channel::<CaseResult>();

        thread::scope(|scope| {
            for worker in 0..pool_size {
                let tx = tx.clone();
                let queue = &queue;
                let spawned = thread::Builder::new()
                    .name(format!("caserun-worker-{}", worker))
                    .spawn_scoped(scope, move || {
                        loop {
                            let next = queue
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .pop_front();
                            let Some(case) = next else { break };
                            if tx.send(self.run_case(case)).is_err() {
                                break;
                            }
                        }
                    });
                if let Err(e) = spawned {
                    error!(worker, error = %e, "failed to spawn worker");
                }
            }
            drop(tx);

            for result in rx {
                self.collect(run, result);
            }
        });

        // 线程创建失败时剩余的用例在当前线程执行
        let leftovers: Vec<&TestCase> = queue
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .collect();
        for case in leftovers {
            let result = self.run_case(case);
            self.collect(run, result);
        }
    }

    /// 执行单个用例，panic 记为失败
    fn run_case(&self, case: &TestCase) -> CaseResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.runner.run(case))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(case = %case.id, panic = %message, "case panicked");
                CaseResult::panicked(case.id.clone(), case.group.clone(), message)
            }
        }
    }

    fn collect(&self, run: &mut RunResult, result: CaseResult) {
        for sink in &self.sinks {
            if let Err(e) = sink.record_case(&result) {
                warn!(case = %result.case_id, error = %e, "failed to record case result");
            }
        }
        run.record(result);
    }
}

fn validate(cases: &[TestCase], schedule: Schedule) -> Result<()> {
    if let Schedule::Pooled { workers: 0 } = schedule {
        return Err(CaserunError::Schedule(
            "pooled mode requires at least one worker".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (index, case) in cases.iter().enumerate() {
        if case.id.trim().is_empty() {
            return Err(CaserunError::Schedule(format!(
                "case #{} has an empty id",
                index + 1
            )));
        }
        if !seen.insert(case.id.as_str()) {
            return Err(CaserunError::Schedule(format!(
                "duplicate case id: {}",
                case.id
            )));
        }
    }
    Ok(())
}

/// 按首次出现的顺序分组；未分组的用例归为一组
fn group_cases(cases: &[TestCase]) -> Vec<(Option<&str>, Vec<&TestCase>)> {
    let mut groups: Vec<(Option<&str>, Vec<&TestCase>)> = Vec::new();
    for case in cases {
        let key = case.group.as_deref();
        match groups.iter_mut().find(|(group, _)| *group == key) {
            Some((_, members)) => members.push(case),
            None => groups.push((key, vec![case])),
        }
    }
    groups
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
