//! Rankings computed from a freshly loaded record collection.
//!
//! All functions here are pure. They take ownership of the collection, since every computation
//! works on its own fresh copy of the store.
//!
//! Ties in revenue are broken by input order for records, and are unspecified for groups. Group
//! sums are computed in input order, but callers should only rely on them being numerically close
//! to any other summation order.

use std::cmp::Ordering;
use std::collections::HashMap;

use thiserror::Error;

use crate::types::BusinessRecord;

/// The number of entries in every ranking.
pub const RANKING_SIZE: usize = 10;

/// An error computing a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    /// There are fewer records or groups than the ranking requires.
    #[error("insufficient data: ranking requires {required} entries, but only {available} exist")]
    InsufficientData { required: usize, available: usize },
}

/// The summed revenue of all records sharing a grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTotal {
    pub key: String,
    pub revenue: f64,
}

/// Orders revenues descending.
///
/// `NaN` values compare as equal to everything, which keeps the sort total but leaves their
/// position unspecified.
fn by_revenue_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Keeps the first [`RANKING_SIZE`] entries, or fails if there are fewer than that.
fn take_strict<T>(mut entries: Vec<T>) -> Result<Vec<T>, AggregationError> {
    if entries.len() < RANKING_SIZE {
        return Err(AggregationError::InsufficientData {
            required: RANKING_SIZE,
            available: entries.len(),
        });
    }
    entries.truncate(RANKING_SIZE);
    Ok(entries)
}

/// Sums the revenue of all records per grouping key, ordered by descending sum.
fn group_revenue<F>(records: &[BusinessRecord], key: F) -> Vec<GroupTotal>
where
    F: Fn(&BusinessRecord) -> &str,
{
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for record in records {
        *totals.entry(key(record)).or_default() += record.revenue();
    }

    let mut groups: Vec<_> = totals
        .into_iter()
        .map(|(key, revenue)| GroupTotal {
            key: key.to_owned(),
            revenue,
        })
        .collect();
    groups.sort_by(|a, b| by_revenue_desc(a.revenue, b.revenue));
    groups
}

/// Returns the ten records with the highest gross revenue, highest first.
///
/// # Errors
///
/// Fails with [`AggregationError::InsufficientData`] if the collection has fewer than ten
/// records.
pub fn top_records_by_revenue(
    mut records: Vec<BusinessRecord>,
) -> Result<Vec<BusinessRecord>, AggregationError> {
    records.sort_by(|a, b| by_revenue_desc(a.revenue(), b.revenue()));
    take_strict(records)
}

/// Returns the ten cities with the highest summed revenue, highest first.
///
/// Cities are grouped by exact name.
///
/// # Errors
///
/// Fails with [`AggregationError::InsufficientData`] if there are fewer than ten distinct cities.
pub fn top_cities_by_revenue(
    records: &[BusinessRecord],
) -> Result<Vec<GroupTotal>, AggregationError> {
    take_strict(group_revenue(records, |record| &record.location.city))
}

/// Returns up to ten activity categories with the highest summed revenue, highest first.
///
/// Unlike the other rankings, this one tolerates short collections and returns all categories if
/// there are fewer than ten of them.
pub fn top_categories_by_revenue(records: &[BusinessRecord]) -> Vec<GroupTotal> {
    let mut groups = group_revenue(records, |record| &record.activity.category);
    groups.truncate(RANKING_SIZE);
    groups
}

/// Sums revenue per city over the whole collection, without truncation.
pub fn city_totals(records: &[BusinessRecord]) -> Vec<GroupTotal> {
    group_revenue(records, |record| &record.location.city)
}

/// Sums revenue per activity category over the whole collection, without truncation.
pub fn category_totals(records: &[BusinessRecord]) -> Vec<GroupTotal> {
    group_revenue(records, |record| &record.activity.category)
}
