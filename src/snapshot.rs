// src/snapshot.rs

use anyhow::{Context, Result};
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use chrono::NaiveDate;
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::process::{
    self,
    convert::{build_batch, ColumnKind},
    derive::DAYS_COLUMN,
    utils::extract_date_from_filename,
};
use crate::records::{RecordSet, DATE_COLUMNS};

/// `<dir>/<prefix>YYYYMMDD.csv`. One name per calendar day, so a second run
/// on the same day replaces the first.
pub fn snapshot_path(dir: &Path, prefix: &str, run_date: NaiveDate) -> PathBuf {
    dir.join(format!("{}{}.csv", prefix, run_date.format("%Y%m%d")))
}

/// Run date encoded in a snapshot's file name.
pub fn snapshot_date(path: &Path) -> Option<NaiveDate> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(extract_date_from_filename)
}

/// Write `batch` as CSV (header row, ISO dates, blanks for absent values)
/// through a temp file in the target directory, renamed into place at the
/// end. Readers see the old file or the new one, never half of one.
pub fn write_csv_atomic(batch: &RecordBatch, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let mut writer = WriterBuilder::new().with_header(true).build(&mut out);
        writer.write(batch).context("writing csv rows")?;
        drop(writer);
        out.flush().context("flushing csv")?;
    }
    tmp.as_file().sync_all().context("syncing temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming temp file onto {}", path.display()))?;
    Ok(())
}

/// Persist one run's record set as that day's snapshot.
#[instrument(level = "info", skip(set), fields(rows = set.len()))]
pub fn write_snapshot(
    set: &RecordSet,
    dir: &Path,
    prefix: &str,
    run_date: NaiveDate,
) -> Result<PathBuf> {
    let path = snapshot_path(dir, prefix, run_date);
    let replacing = path.exists();
    write_csv_atomic(set.batch(), &path)?;
    info!(path = %path.display(), replaced = replacing, "snapshot written");
    Ok(path)
}

/// Load a snapshot back with the canonical types: designated date columns as
/// dates, `days_until_submission` as integers, the rest as text exactly as
/// written (no ingest-side trimming or quote stripping).
pub fn read_snapshot(path: &Path) -> Result<RecordSet> {
    let raw = process::load_source(path, b',')?;
    let (batch, _) = build_batch(&raw.headers, &raw.rows, |name| {
        if name == DAYS_COLUMN {
            ColumnKind::Days
        } else if DATE_COLUMNS.contains(&name) {
            ColumnKind::Date
        } else {
            ColumnKind::Verbatim
        }
    })?;
    RecordSet::new(batch).with_context(|| format!("snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuctionError;
    use crate::process::{pipeline::build_record_set, RawTable};
    use tempfile::tempdir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn raw(rows: &[[&str; 3]]) -> RawTable {
        RawTable::new(
            vec![
                "Name of Corporate Debtor".into(),
                "Date of Auction".into(),
                "Last Date of Submission".into(),
            ],
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn write_then_read_keeps_types_and_order() {
        let tmp = tempdir().unwrap();
        let today = d(2024, 1, 10);
        let (set, _) = build_record_set(
            raw(&[
                ["Acme, Ltd", "20-01-2024", "15-01-2024"],
                ["Beta", "", "not a date"],
            ]),
            today,
        )
        .unwrap();

        let path = write_snapshot(&set, tmp.path(), "processed_auctions_", today).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "processed_auctions_20240110.csv"
        );
        assert_eq!(snapshot_date(&path), Some(today));

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "name_of_corporate_debtor,date_of_auction,last_date_of_submission,days_until_submission"
        );
        assert_eq!(lines.next().unwrap(), "\"Acme, Ltd\",2024-01-20,2024-01-15,5");

        let back = read_snapshot(&path).unwrap();
        assert_eq!(back.column_names(), set.column_names());
        assert_eq!(back.records().collect::<Vec<_>>(), set.records().collect::<Vec<_>>());
    }

    #[test]
    fn same_day_run_overwrites() {
        let tmp = tempdir().unwrap();
        let today = d(2024, 1, 10);
        let (first, _) = build_record_set(raw(&[["A", "", "15-01-2024"]]), today).unwrap();
        let (second, _) = build_record_set(
            raw(&[["B", "", "12-01-2024"], ["C", "", "13-01-2024"]]),
            today,
        )
        .unwrap();

        let p1 = write_snapshot(&first, tmp.path(), "processed_auctions_", today).unwrap();
        let p2 = write_snapshot(&second, tmp.path(), "processed_auctions_", today).unwrap();
        assert_eq!(p1, p2);

        let files: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(files.len(), 1, "no temp files or duplicates left behind");

        let back = read_snapshot(&p2).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.record(0).field("name_of_corporate_debtor"), Some("B"));
        assert_eq!(back.days_at(1), Some(3));
    }

    #[test]
    fn snapshot_without_days_column_is_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("processed_auctions_20240110.csv");
        fs::write(&path, "name,last_date_of_submission\nA,2024-01-15\n").unwrap();
        let err = read_snapshot(&path).unwrap_err();
        assert!(matches!(
            AuctionError::find(&err),
            Some(AuctionError::MissingRequiredColumn { column }) if column == DAYS_COLUMN
        ));
    }

    #[test]
    fn text_cells_read_back_exactly() {
        let tmp = tempdir().unwrap();
        let headers = vec!["note".to_string(), DAYS_COLUMN.to_string()];
        let notes = ["\"x\"", "  padded  ", "a, \"b\""];
        let rows: Vec<Vec<String>> = notes
            .iter()
            .map(|n| vec![n.to_string(), "1".to_string()])
            .collect();
        let (batch, _) = build_batch(&headers, &rows, |n| {
            if n == DAYS_COLUMN {
                ColumnKind::Days
            } else {
                ColumnKind::Verbatim
            }
        })
        .unwrap();
        let set = RecordSet::new(batch).unwrap();

        let path = write_snapshot(&set, tmp.path(), "processed_auctions_", d(2024, 1, 10)).unwrap();
        let back = read_snapshot(&path).unwrap();
        let read: Vec<String> = back
            .records()
            .map(|r| r.field("note").unwrap().to_string())
            .collect();
        assert_eq!(read, notes);
    }
}
