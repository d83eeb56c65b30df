use anyhow::Result;
use arrow::{
    array::{ArrayRef, Date32Builder, Int64Builder, StringBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use chrono::{Datelike, NaiveDate};
use std::{collections::BTreeMap, sync::Arc};
use tracing::warn;

use crate::process::{date_parser, utils};

/// Days between 0001-01-01 (CE day 1) and 1970-01-01, the Date32 epoch.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

pub fn date_to_date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

pub fn date32_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_FROM_CE)?)
}

/// How a column is typed in the canonical record set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Trimmed, outer quotes stripped; for raw source cells.
    Text,
    /// Kept byte for byte; for cells this crate already wrote.
    Verbatim,
    Date,
    Days,
}

impl ColumnKind {
    pub fn data_type(self) -> DataType {
        match self {
            ColumnKind::Text | ColumnKind::Verbatim => DataType::Utf8,
            ColumnKind::Date => DataType::Date32,
            ColumnKind::Days => DataType::Int64,
        }
    }
}

/// What the coercer saw: designated columns that were missing and, per date
/// column, how many non-empty cells failed to parse.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoercionReport {
    pub missing_columns: Vec<String>,
    pub unparsable: BTreeMap<String, usize>,
}

impl CoercionReport {
    pub fn unparsable_total(&self) -> usize {
        self.unparsable.values().sum()
    }

    pub fn is_missing(&self, column: &str) -> bool {
        self.missing_columns.iter().any(|c| c == column)
    }
}

/// Whole-day count from a cell such as `5` or `5.0` (the latter is how
/// dataframe tools write integer columns containing blanks).
fn parse_days(raw: &str) -> Option<i64> {
    let s = utils::clean_str(raw);
    s.parse::<i64>().ok().or_else(|| {
        let f: f64 = s.parse().ok()?;
        (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
    })
}

/// Build a typed batch from string rows. `kind_of` decides each column's type;
/// cells that do not fit the type become null.
pub fn build_batch(
    headers: &[String],
    rows: &[Vec<String>],
    kind_of: impl Fn(&str) -> ColumnKind,
) -> Result<(RecordBatch, CoercionReport)> {
    let mut report = CoercionReport::default();
    let mut fields = Vec::with_capacity(headers.len());
    let mut cols: Vec<ArrayRef> = Vec::with_capacity(headers.len());

    for (i, name) in headers.iter().enumerate() {
        let kind = kind_of(name.as_str());
        let cells = rows.iter().map(|r| r.get(i).map(String::as_str).unwrap_or(""));
        fields.push(Field::new(name, kind.data_type(), true));

        match kind {
            ColumnKind::Text => {
                let mut b = StringBuilder::with_capacity(rows.len(), rows.len() * 16);
                for cell in cells {
                    b.append_option(utils::non_empty(cell));
                }
                cols.push(Arc::new(b.finish()));
            }
            ColumnKind::Verbatim => {
                let mut b = StringBuilder::with_capacity(rows.len(), rows.len() * 16);
                for cell in cells {
                    b.append_option((!cell.is_empty()).then_some(cell));
                }
                cols.push(Arc::new(b.finish()));
            }
            ColumnKind::Date => {
                let mut b = Date32Builder::with_capacity(rows.len());
                let mut bad = 0usize;
                for cell in cells {
                    let parsed = date_parser::parse_date(cell);
                    if parsed.is_none() && utils::non_empty(cell).is_some() {
                        bad += 1;
                    }
                    b.append_option(parsed.map(date_to_date32));
                }
                if bad > 0 {
                    warn!(column = %name, cells = bad, "unparsable dates set to absent");
                    report.unparsable.insert(name.clone(), bad);
                }
                cols.push(Arc::new(b.finish()));
            }
            ColumnKind::Days => {
                let mut b = Int64Builder::with_capacity(rows.len());
                for cell in cells {
                    b.append_option(parse_days(cell));
                }
                cols.push(Arc::new(b.finish()));
            }
        }
    }

    let schema = Arc::new(Schema::new(fields));
    // explicit row count so a header-only table still carries its schema
    let opts = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    let batch = RecordBatch::try_new_with_options(schema, cols, &opts)?;
    Ok((batch, report))
}

/// Temporal coercion step: designated date columns become Date32, everything
/// else stays text. Designated columns that are absent are reported, not fatal.
pub fn coerce_dates(
    headers: &[String],
    rows: &[Vec<String>],
    date_columns: &[&str],
) -> Result<(RecordBatch, CoercionReport)> {
    let (batch, mut report) = build_batch(headers, rows, |name| {
        if date_columns.contains(&name) {
            ColumnKind::Date
        } else {
            ColumnKind::Text
        }
    })?;

    for col in date_columns {
        if !headers.iter().any(|h| h == col) {
            warn!(column = %col, "date column not found in source");
            report.missing_columns.push(col.to_string());
        }
    }
    Ok((batch, report))
}
