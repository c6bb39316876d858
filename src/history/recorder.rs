use crate::Result;
use crate::history::model::CaseRecord;
use crate::history::storage::HistoryStorage;
use crate::runner::{CaseResult, ResultSink};
use tracing::debug;

/// 把每个用例结果追加到历史文件
pub struct HistorySink {
    storage: HistoryStorage,
}

impl HistorySink {
    pub fn new(storage: HistoryStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &HistoryStorage {
        &self.storage
    }
}

impl Default for HistorySink {
    fn default() -> Self {
        Self::new(HistoryStorage::default())
    }
}

impl ResultSink for HistorySink {
    fn record_case(&self, result: &CaseResult) -> Result<()> {
        let record = CaseRecord::from_case(result);
        self.storage.append(&record)?;
        debug!(case = %record.case_id, status = record.status.as_str(), "history recorded");
        Ok(())
    }
}
