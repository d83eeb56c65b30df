// src/view.rs

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use glob::Pattern;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::config::Settings;
use crate::error::AuctionError;
use crate::filter::{self, FilterRange, Order, Selection};
use crate::locate::FileLocator;
use crate::records::RecordSet;
use crate::snapshot::{self, read_snapshot};

/// The snapshot a consumer is looking at.
#[derive(Debug, Clone)]
pub struct CurrentSnapshot {
    pub path: PathBuf,
    pub set: RecordSet,
}

/// Newest snapshot under the configured pattern.
pub fn open_current(locator: &dyn FileLocator, settings: &Settings) -> Result<CurrentSnapshot> {
    let pattern = settings.snapshot_pattern();
    let path = locator
        .latest(&pattern)?
        .ok_or(AuctionError::NoSourceFound { pattern })?;
    let set = read_snapshot(&path)?;
    info!(path = %path.display(), rows = set.len(), "loaded snapshot");
    Ok(CurrentSnapshot { path, set })
}

/// Range the viewer applies: explicit bounds win, missing ones fall back to
/// the observed min/max. Inverted bounds are swapped. `None` when there is
/// nothing to fall back on.
pub fn resolve_range(
    observed: Option<(i64, i64)>,
    low: Option<i64>,
    high: Option<i64>,
) -> Option<FilterRange> {
    let lo = low.or(observed.map(|(l, _)| l))?;
    let hi = high.or(observed.map(|(_, h)| h))?;
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    FilterRange::new(lo, hi).ok()
}

/// A filtered view; the rows travel with the range that produced them.
#[derive(Debug, Clone)]
pub struct FilteredView {
    pub range: FilterRange,
    pub rows: RecordSet,
}

pub fn filtered_view(set: &RecordSet, range: FilterRange) -> Result<FilteredView> {
    let rows = filter::evaluate(set, Selection::Range(range), Order::Original)?;
    Ok(FilteredView { range, rows })
}

/// Plain-text table of the rows.
pub fn render(set: &RecordSet) -> Result<String> {
    Ok(pretty_format_batches(&[set.batch().clone()])?.to_string())
}

/// Prefix of downloaded exports. Distinct from the snapshot prefix so a
/// download can never be mistaken for, or replace, a snapshot.
pub const DOWNLOAD_PREFIX: &str = "filtered_auctions_";

/// Download name for an export of `snapshot`: the snapshot's date suffix
/// under `DOWNLOAD_PREFIX`, e.g. `filtered_auctions_20240110.csv`.
pub fn export_file_name(snapshot: &Path) -> String {
    match snapshot::snapshot_date(snapshot) {
        Some(d) => format!("{}{}.csv", DOWNLOAD_PREFIX, d.format("%Y%m%d")),
        None => format!("{}export.csv", DOWNLOAD_PREFIX),
    }
}

/// Whether `path` would be picked up as a snapshot. Exports must not be.
pub fn is_snapshot_name(path: &Path, settings: &Settings) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    Pattern::new(&settings.snapshot_pattern())
        .map(|p| p.matches(name))
        .unwrap_or(false)
}

/// Write the rows as CSV, or Parquet when `path` ends in `.parquet`.
pub fn export(set: &RecordSet, path: &Path) -> Result<()> {
    let is_parquet = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));
    let written = if is_parquet {
        write_parquet(set, path)
    } else {
        snapshot::write_csv_atomic(set.batch(), path)
    };
    written.with_context(|| format!("exporting to {}", path.display()))?;
    info!(path = %path.display(), rows = set.len(), "export written");
    Ok(())
}

fn write_parquet(set: &RecordSet, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(tmp.reopen()?, set.schema(), Some(props))?;
    writer.write(set.batch())?;
    writer.close()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
