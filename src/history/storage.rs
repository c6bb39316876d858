use super::model::CaseRecord;
use crate::Result;
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HISTORY_DIR: &str = ".caserun";
const HISTORY_FILE: &str = "history.jsonl";
/// 超过该大小时在读取时压缩 (20 MB)
const COMPACTION_THRESHOLD_BYTES: u64 = 20 * 1024 * 1024;
/// 压缩后保留的条目数
const MAX_ENTRIES: usize = 10_000;

/// JSON Lines 格式的历史文件
#[derive(Debug, Clone)]
pub struct HistoryStorage {
    file_path: PathBuf,
}

impl Default for HistoryStorage {
    fn default() -> Self {
        let dir =
            std::env::var("CASERUN_HISTORY_DIR").unwrap_or_else(|_| HISTORY_DIR.to_string());
        Self {
            file_path: Path::new(&dir).join(HISTORY_FILE),
        }
    }
}

impl HistoryStorage {
    /// 项目本地存储，可通过 CASERUN_HISTORY_DIR 覆盖目录
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// 追加一条记录
    ///
    /// 写入期间持有 `fs2` 排他锁，多个进程同时追加时每行保持完整。
    pub fn append(&self, record: &CaseRecord) -> Result<()> {
        self.ensure_dir()?;
        let json = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.lock_exclusive()?;
        writeln!(file, "{}", json)?;
        drop(file);

        Ok(())
    }

    /// 全部记录（按写入顺序），必要时先压缩
    pub fn list(&self) -> Result<Vec<CaseRecord>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        // 只在读取时检查大小，追加路径保持简单
        self.compact_if_needed()?;

        self.read_all()
    }

    /// 最近的 N 条记录，从旧到新
    pub fn tail(&self, n: usize) -> Result<Vec<CaseRecord>> {
        let records = self.list()?;
        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }

    fn read_all(&self) -> Result<Vec<CaseRecord>> {
        let file = fs::File::open(&self.file_path)?;
        file.lock_shared()?;

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            // 损坏的行直接跳过
            if let Ok(record) = serde_json::from_str::<CaseRecord>(&line) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn compact_if_needed(&self) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.file_path)?;

        if file.metadata()?.len() < COMPACTION_THRESHOLD_BYTES {
            return Ok(());
        }

        file.lock_exclusive()?;

        // 加锁后再检查一次，其他进程可能刚压缩过
        if file.metadata()?.len() < COMPACTION_THRESHOLD_BYTES {
            return Ok(());
        }

        let records: Vec<CaseRecord> = BufReader::new(&file)
            .lines()
            .map_while(|l| l.ok())
            .filter_map(|l| serde_json::from_str(&l).ok())
            .collect();

        if records.len() <= MAX_ENTRIES {
            return Ok(());
        }

        let skip = records.len() - MAX_ENTRIES;

        // 截断后原地重写，保持同一个文件句柄上的锁
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;

        let mut writer = std::io::BufWriter::new(file);
        for record in records.iter().skip(skip) {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CaseStatus;
    use tempfile::TempDir;

    fn record(case_id: &str) -> CaseRecord {
        CaseRecord {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            case_id: case_id.to_string(),
            group: None,
            status: CaseStatus::Passed,
            steps: 1,
            duration_ms: 12,
            failure: None,
        }
    }

    #[test]
    fn test_append_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let storage = HistoryStorage::new_with_path(temp_dir.path().join("history.jsonl"));

        storage.append(&record("a")).unwrap();
        storage.append(&record("b")).unwrap();

        let list = storage.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].case_id, "a");
        assert_eq!(list[1].case_id, "b");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = HistoryStorage::new_with_path(temp_dir.path().join("none.jsonl"));
        assert!(storage.list().unwrap().is_empty());
    }

    #[test]
    fn test_tail_skips_corrupted_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("history.jsonl");
        let storage = HistoryStorage::new_with_path(&path);

        for i in 0..10 {
            storage.append(&record(&i.to_string())).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let tail = storage.tail(3).unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].case_id, "7");
        assert_eq!(tail[2].case_id, "9");
    }
}
