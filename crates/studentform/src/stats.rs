//! Daily submission counters.
//!
//! One document per calendar day, keyed `YYYY-MM-DD`, counts submissions in
//! total and by county, gender and age group. Each update is one atomic
//! read-modify-write on the store and best effort: the caller logs a
//! failure and moves on.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::SubmissionRecord;
use crate::store::DocumentStore;

const UNKNOWN_COUNTY: &str = "Unknown";
const UNKNOWN: &str = "unknown";

/// Aggregate counts for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    /// The day, `YYYY-MM-DD`.
    pub date: String,
    /// Submissions that day.
    pub daily_count: u64,
    /// Counts keyed by county display name.
    #[serde(default)]
    pub by_county: BTreeMap<String, u64>,
    /// Counts keyed by gender.
    #[serde(default)]
    pub by_gender: BTreeMap<String, u64>,
    /// Counts keyed by age bracket.
    #[serde(default)]
    pub by_age_group: BTreeMap<String, u64>,
    /// When the document was first written.
    pub created: DateTime<Utc>,
    /// When it was last incremented.
    pub last_updated: DateTime<Utc>,
}

impl DailyStats {
    /// An empty aggregate for `date`.
    #[must_use]
    pub fn new(date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            date: stats_key(date),
            daily_count: 0,
            by_county: BTreeMap::new(),
            by_gender: BTreeMap::new(),
            by_age_group: BTreeMap::new(),
            created: now,
            last_updated: now,
        }
    }

    /// Count one submission.
    pub fn record(&mut self, record: &SubmissionRecord, now: DateTime<Utc>) {
        let county = record.county_name().unwrap_or(UNKNOWN_COUNTY);
        let gender = match record.personal_info.gender.trim() {
            "" => UNKNOWN,
            g => g,
        };
        let age_group = record
            .analytics
            .age_group
            .map_or(UNKNOWN, |group| group.as_str());

        self.daily_count += 1;
        *self.by_county.entry(county.to_string()).or_default() += 1;
        *self.by_gender.entry(gender.to_string()).or_default() += 1;
        *self.by_age_group.entry(age_group.to_string()).or_default() += 1;
        self.last_updated = now;
    }
}

/// Document id for a day.
#[must_use]
pub fn stats_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Read today's aggregate, if one exists.
///
/// # Errors
///
/// Returns [`Error::StatsUpdate`] if the store fails or the stored document
/// cannot be parsed.
pub async fn read_daily_stats(
    store: &dyn DocumentStore,
    collection: &str,
    date: NaiveDate,
) -> Result<Option<DailyStats>> {
    let key = stats_key(date);
    let existing = store
        .get(collection, &key)
        .await
        .map_err(|e| Error::stats_update(e.to_string()))?;
    existing.map(|doc| parse_stats(&key, doc)).transpose()
}

/// Increment the aggregate for the record's submission day.
///
/// # Errors
///
/// Returns [`Error::StatsUpdate`] if the store fails or the stored document
/// cannot be parsed.
pub async fn update_daily_stats(
    store: &dyn DocumentStore,
    collection: &str,
    record: &SubmissionRecord,
    now: DateTime<Utc>,
) -> Result<DailyStats> {
    let date = now.date_naive();
    let key = stats_key(date);
    let increment = |current: Option<Value>| -> Result<Value> {
        let mut stats = match current {
            Some(doc) => parse_stats(&key, doc)?,
            None => DailyStats::new(date, now),
        };
        stats.record(record, now);
        Ok(serde_json::to_value(&stats)?)
    };

    let doc = store
        .update(collection, &key, &increment)
        .await
        .map_err(|e| Error::stats_update(e.to_string()))?;
    let stats = parse_stats(&key, doc)?;

    debug!(date = %stats.date, count = stats.daily_count, "Daily stats updated");
    Ok(stats)
}

fn parse_stats(key: &str, doc: Value) -> Result<DailyStats> {
    serde_json::from_value(doc)
        .map_err(|e| Error::stats_update(format!("malformed stats for {key}: {e}")))
}
