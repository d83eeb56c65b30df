use anyhow::{anyhow, Result};
use arrow::{
    array::{Array, ArrayRef, Date32Array, Int64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use std::sync::Arc;

use crate::error::AuctionError;
use crate::process::convert::date32_to_date;

pub const SUBMISSION_COLUMN: &str = "last_date_of_submission";
pub const DAYS_COLUMN: &str = "days_until_submission";

/// Signed whole days from `today` to `deadline`; negative once it has passed.
pub fn days_until(deadline: NaiveDate, today: NaiveDate) -> i64 {
    (deadline - today).num_days()
}

/// Append `days_until_submission` computed against one fixed `today`.
///
/// Fails the whole batch when `last_date_of_submission` is missing; rows with
/// an absent submission date just get an absent day count. An existing
/// `days_until_submission` column is replaced so the derived one is always last.
pub fn append_days_until_submission(batch: &RecordBatch, today: NaiveDate) -> Result<RecordBatch> {
    let schema = batch.schema();
    let idx = schema
        .index_of(SUBMISSION_COLUMN)
        .map_err(|_| AuctionError::MissingRequiredColumn {
            column: SUBMISSION_COLUMN.into(),
        })?;

    let deadlines = batch
        .column(idx)
        .as_any()
        .downcast_ref::<Date32Array>()
        .ok_or_else(|| {
            anyhow!(
                "{} is {:?}, expected Date32",
                SUBMISSION_COLUMN,
                schema.field(idx).data_type()
            )
        })?;

    let days: Int64Array = deadlines
        .iter()
        .map(|v| v.and_then(date32_to_date).map(|d| days_until(d, today)))
        .collect();

    let mut fields = Vec::with_capacity(schema.fields().len() + 1);
    let mut cols: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 1);
    for (field, col) in schema.fields().iter().zip(batch.columns()) {
        if field.name() != DAYS_COLUMN {
            fields.push(field.as_ref().clone());
            cols.push(col.clone());
        }
    }
    fields.push(Field::new(DAYS_COLUMN, DataType::Int64, true));
    cols.push(Arc::new(days));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), cols).map_err(Into::into)
}
