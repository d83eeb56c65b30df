// src/records.rs

use anyhow::{anyhow, Result};
use arrow::{
    array::{Array, Date32Array, Int64Array, StringArray},
    datatypes::{DataType, SchemaRef},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;

use crate::error::AuctionError;
use crate::process::derive::{DAYS_COLUMN, SUBMISSION_COLUMN};

pub const ISSUE_COLUMN: &str = "date_of_issue_of_auction_notice";
pub const AUCTION_COLUMN: &str = "date_of_auction";

/// The designated date columns, in the order the coercer handles them.
pub const DATE_COLUMNS: [&str; 3] = [ISSUE_COLUMN, AUCTION_COLUMN, SUBMISSION_COLUMN];

/// Ordered, immutable set of canonical records backed by one Arrow batch.
///
/// Construction checks that `days_until_submission` exists as Int64, so every
/// consumer can rely on it.
#[derive(Debug, Clone)]
pub struct RecordSet {
    batch: RecordBatch,
    days_idx: usize,
}

/// One row, typed. Non-date columns are carried as text in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub date_of_issue_of_auction_notice: Option<NaiveDate>,
    pub date_of_auction: Option<NaiveDate>,
    pub last_date_of_submission: Option<NaiveDate>,
    pub days_until_submission: Option<i64>,
    pub fields: Vec<(String, Option<String>)>,
}

impl CanonicalRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }
}

impl RecordSet {
    pub fn new(batch: RecordBatch) -> Result<Self> {
        let days_idx = batch
            .schema()
            .index_of(DAYS_COLUMN)
            .map_err(|_| AuctionError::MissingRequiredColumn {
                column: DAYS_COLUMN.into(),
            })?;
        let dt = batch.schema().field(days_idx).data_type().clone();
        if dt != DataType::Int64 {
            return Err(anyhow!("{} is {:?}, expected Int64", DAYS_COLUMN, dt));
        }
        Ok(Self { batch, days_idx })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn days(&self) -> &Int64Array {
        self.batch
            .column(self.days_idx)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("days column type checked in RecordSet::new")
    }

    pub fn days_at(&self, row: usize) -> Option<i64> {
        let days = self.days();
        days.is_valid(row).then(|| days.value(row))
    }

    /// Same schema, different rows; used by the filter.
    pub(crate) fn with_batch(&self, batch: RecordBatch) -> Self {
        Self {
            batch,
            days_idx: self.days_idx,
        }
    }

    pub fn record(&self, row: usize) -> CanonicalRecord {
        let mut rec = CanonicalRecord {
            date_of_issue_of_auction_notice: None,
            date_of_auction: None,
            last_date_of_submission: None,
            days_until_submission: self.days_at(row),
            fields: Vec::new(),
        };

        let schema = self.batch.schema();
        for (field, col) in schema.fields().iter().zip(self.batch.columns()) {
            if let Some(dates) = col.as_any().downcast_ref::<Date32Array>() {
                let v = dates.is_valid(row).then(|| dates.value_as_date(row)).flatten();
                match field.name().as_str() {
                    ISSUE_COLUMN => rec.date_of_issue_of_auction_notice = v,
                    AUCTION_COLUMN => rec.date_of_auction = v,
                    SUBMISSION_COLUMN => rec.last_date_of_submission = v,
                    _ => rec
                        .fields
                        .push((field.name().clone(), v.map(|d| d.to_string()))),
                }
            } else if let Some(text) = col.as_any().downcast_ref::<StringArray>() {
                let v = text.is_valid(row).then(|| text.value(row).to_string());
                rec.fields.push((field.name().clone(), v));
            }
        }
        rec
    }

    pub fn records(&self) -> impl Iterator<Item = CanonicalRecord> + '_ {
        (0..self.len()).map(|i| self.record(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::convert::{build_batch, ColumnKind};

    #[test]
    fn rejects_batches_without_days() {
        let (batch, _) = build_batch(
            &["name".to_string()],
            &[vec!["x".to_string()]],
            |_| ColumnKind::Text,
        )
        .unwrap();
        let err = RecordSet::new(batch).unwrap_err();
        assert!(matches!(
            AuctionError::find(&err),
            Some(AuctionError::MissingRequiredColumn { .. })
        ));
    }

    #[test]
    fn typed_record_view() {
        let headers: Vec<String> = ["name", AUCTION_COLUMN, SUBMISSION_COLUMN, DAYS_COLUMN]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = vec![vec![
            "Acme Ltd".to_string(),
            "2024-02-01".to_string(),
            "2024-01-15".to_string(),
            "5".to_string(),
        ]];
        let (batch, _) = build_batch(&headers, &rows, |n| match n {
            AUCTION_COLUMN | SUBMISSION_COLUMN => ColumnKind::Date,
            DAYS_COLUMN => ColumnKind::Days,
            _ => ColumnKind::Text,
        })
        .unwrap();
        let set = RecordSet::new(batch).unwrap();

        let rec = set.record(0);
        assert_eq!(rec.field("name"), Some("Acme Ltd"));
        assert_eq!(rec.date_of_auction, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(rec.last_date_of_submission, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(rec.date_of_issue_of_auction_notice, None);
        assert_eq!(rec.days_until_submission, Some(5));
        assert_eq!(set.days_at(0), Some(5));
    }
}
