// src/filter.rs

use anyhow::Result;
use arrow::{
    array::{BooleanArray, UInt32Array},
    compute::{filter_record_batch, take_record_batch},
};

use crate::error::AuctionError;
use crate::records::RecordSet;

/// Inclusive `[low, high]` bounds on `days_until_submission`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRange {
    low: i64,
    high: i64,
}

impl FilterRange {
    pub fn new(low: i64, high: i64) -> Result<Self, AuctionError> {
        if low > high {
            return Err(AuctionError::InvalidRange { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> i64 {
        self.low
    }

    pub fn high(&self) -> i64 {
        self.high
    }

    pub fn contains(&self, days: i64) -> bool {
        self.low <= days && days <= self.high
    }
}

/// Which rows a consumer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Two-sided inclusive range; negative days allowed (viewer).
    Range(FilterRange),
    /// `[0, threshold]`: upcoming deadlines only, passed ones are dropped (notifier).
    UpTo { threshold: i64 },
}

impl Selection {
    pub fn bounds(&self) -> Result<FilterRange, AuctionError> {
        match *self {
            Selection::Range(r) => Ok(r),
            Selection::UpTo { threshold } => FilterRange::new(0, threshold),
        }
    }
}

/// Row order of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Original,
    /// Ascending by days remaining; equal values keep their original order.
    Urgency,
}

/// Rows whose `days_until_submission` is present and within the selection.
/// Never mutates `set`; absent day counts never match.
pub fn evaluate(set: &RecordSet, selection: Selection, order: Order) -> Result<RecordSet> {
    let range = selection.bounds()?;
    let days = set.days();

    let mut keep: Vec<(u32, i64)> = days
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|d| range.contains(*d)).map(|d| (i as u32, d)))
        .collect();

    let batch = match order {
        Order::Original => {
            let mask: BooleanArray = days
                .iter()
                .map(|v| Some(v.is_some_and(|d| range.contains(d))))
                .collect();
            filter_record_batch(set.batch(), &mask)?
        }
        Order::Urgency => {
            // sort_by_key is stable
            keep.sort_by_key(|&(_, d)| d);
            let idx = UInt32Array::from_iter_values(keep.iter().map(|&(i, _)| i));
            take_record_batch(set.batch(), &idx)?
        }
    };
    Ok(set.with_batch(batch))
}

/// Observed `(min, max)` of the day counts; `None` if every row is absent.
pub fn observed_range(set: &RecordSet) -> Option<(i64, i64)> {
    set.days().iter().flatten().fold(None, |acc, d| match acc {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })
}
