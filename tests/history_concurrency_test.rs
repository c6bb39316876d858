use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use caserun::history::{CaseRecord, HistoryStorage};
use caserun::runner::CaseResult;
use tempfile::TempDir;

#[test]
fn test_concurrent_writes() {
    let temp_dir = TempDir::new().unwrap();
    let history_file = temp_dir.path().join("history.jsonl");
    let history_path = Arc::new(history_file.clone());

    let thread_count = 10;
    let records_per_thread = 50;

    let handles: Vec<_> = (0..thread_count)
        .map(|i| {
            let path = history_path.clone();
            thread::spawn(move || {
                // 每个线程独立的 storage，模拟多个进程
                let storage = HistoryStorage::new_with_path((*path).clone());
                for j in 0..records_per_thread {
                    let result = CaseResult::skipped(format!("{}-{}", i, j), None);
                    storage.append(&CaseRecord::from_case(&result)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let records = HistoryStorage::new_with_path(history_file).list().unwrap();
    assert_eq!(records.len(), thread_count * records_per_thread);

    let ids: HashSet<_> = records.iter().map(|r| r.case_id.as_str()).collect();
    assert_eq!(ids.len(), thread_count * records_per_thread);
}
