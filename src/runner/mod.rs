pub mod case;
pub mod coordinator;
pub mod reporter;
pub mod sink;
pub mod types;

pub use case::CaseRunner;
pub use coordinator::{Coordinator, Schedule};
pub use reporter::{ConsoleReporter, JsonReport, ReportBuilder};
pub use sink::ResultSink;
pub use types::{CaseResult, CaseStatus, RunResult, RunSummary, StepResult};
