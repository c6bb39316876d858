use super::model::CaseRecord;
use super::storage::HistoryStorage;
use crate::Result;
use crate::runner::CaseStatus;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

pub fn list_history(storage: &HistoryStorage, limit: usize) -> Result<()> {
    let mut records = storage.tail(limit)?;
    // 最新的在前
    records.reverse();

    if records.is_empty() {
        println!("No history yet ({})", storage.path().display());
        return Ok(());
    }

    println!("{}", history_table(&records));
    Ok(())
}

pub fn history_table(records: &[CaseRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "ID", "Time", "Case", "Group", "Status", "Steps", "Duration", "Failure",
    ]);

    for record in records {
        let status_color = match record.status {
            CaseStatus::Passed => Color::Green,
            CaseStatus::Failed => Color::Red,
            CaseStatus::Skipped => Color::DarkGrey,
        };
        let failure = record
            .failure
            .as_ref()
            .map(|f| format!("{}: {}", f.step, f.message))
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(record.id.get(..8).unwrap_or(&record.id)),
            Cell::new(record.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&record.case_id),
            Cell::new(record.group.as_deref().unwrap_or("-")).add_attribute(Attribute::Dim),
            Cell::new(record.status.as_str()).fg(status_color),
            Cell::new(record.steps),
            Cell::new(format!("{}ms", record.duration_ms)),
            Cell::new(failure),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CaseResult;

    #[test]
    fn test_table_contains_case_rows() {
        let records = vec![
            CaseRecord::from_case(&CaseResult::skipped("login", None)),
            CaseRecord::from_case(&CaseResult::panicked("orders", None, "boom".to_string())),
        ];

        let rendered = history_table(&records).to_string();
        assert!(rendered.contains("login"));
        assert!(rendered.contains("orders"));
        assert!(rendered.contains("skipped"));
        assert!(rendered.contains("<case>"));
    }
}
