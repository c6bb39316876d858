pub mod model;
pub mod printer;
pub mod recorder;
pub mod storage;

pub use model::{CaseRecord, FailureMeta};
pub use printer::list_history;
pub use recorder::HistorySink;
pub use storage::HistoryStorage;
