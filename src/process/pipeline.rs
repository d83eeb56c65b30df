// src/process/pipeline.rs

use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

use crate::config::Settings;
use crate::error::AuctionError;
use crate::locate::FileLocator;
use crate::process::{
    columns::normalize_headers,
    convert::{coerce_dates, CoercionReport},
    derive::append_days_until_submission,
    load_source, RawTable,
};
use crate::records::{RecordSet, DATE_COLUMNS};
use crate::snapshot::write_snapshot;

/// Result of one successful run.
#[derive(Debug)]
pub struct RunOutcome {
    pub source: PathBuf,
    pub snapshot: PathBuf,
    pub rows: usize,
    pub report: CoercionReport,
}

/// normalize → coerce → derive, all in memory. Nothing is written here, so a
/// failure leaves no trace on disk.
pub fn build_record_set(raw: RawTable, today: NaiveDate) -> Result<(RecordSet, CoercionReport)> {
    let headers = normalize_headers(&raw.headers)?;
    info!(columns = ?headers, "normalized headers");

    let (batch, report) = coerce_dates(&headers, &raw.rows, &DATE_COLUMNS)?;
    let batch = append_days_until_submission(&batch, today)?;
    let set = RecordSet::new(batch)?;
    Ok((set, report))
}

/// One full run: locate the newest export, build the record set against
/// `today`, emit that day's snapshot.
///
/// Fatal failures are logged here at `error`, once; a missing source is left
/// to the caller since it is not a failure of the data.
#[instrument(level = "info", skip(locator, settings))]
pub fn run(locator: &dyn FileLocator, settings: &Settings, today: NaiveDate) -> Result<RunOutcome> {
    let result = run_once(locator, settings, today);
    if let Err(e) = &result {
        if !matches!(AuctionError::find(e), Some(AuctionError::NoSourceFound { .. })) {
            error!("run aborted, no snapshot written: {:#}", e);
        }
    }
    result
}

fn run_once(locator: &dyn FileLocator, settings: &Settings, today: NaiveDate) -> Result<RunOutcome> {
    let source = locator
        .latest(&settings.source_pattern)?
        .ok_or_else(|| AuctionError::NoSourceFound {
            pattern: settings.source_pattern.clone(),
        })?;
    info!(source = %source.display(), "processing file");

    let raw = load_source(&source, settings.delimiter_byte())?;
    let (set, report) = build_record_set(raw, today)?;
    if report.unparsable_total() > 0 {
        warn!(
            cells = report.unparsable_total(),
            "some dates could not be parsed and were left empty"
        );
    }

    let snapshot = write_snapshot(&set, &settings.exports_dir, &settings.snapshot_prefix, today)?;
    Ok(RunOutcome {
        source,
        snapshot,
        rows: set.len(),
        report,
    })
}
