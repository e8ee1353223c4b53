//! The trigger table derived from tracked searches.
//!
//! A [`ScheduleTable`] is a pure function of the active [`SearchSpec`]s at
//! the time it was built. It is never edited: each resync builds a new one
//! and replaces the old one wholesale.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::Serialize;

use crate::searches::SearchSpec;

/// One recurring crawl: `term` on `site` every `frequency_days` days at
/// `preferred_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    /// `run_search_<search id>_<site>`, unique within a table.
    pub key: String,
    pub search_id: i64,
    /// Catalog site name, e.g. `OLX`.
    pub site: String,
    pub term: String,
    pub frequency_days: u32,
    pub preferred_time: NaiveTime,
}

impl ScheduleEntry {
    /// Whether the entry fires in the minute containing `now` (local wall
    /// clock).
    ///
    /// Days are counted from 1970-01-01, so every entry with the same
    /// frequency fires on the same calendar days.
    #[must_use]
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now.hour() == self.preferred_time.hour()
            && now.minute() == self.preferred_time.minute()
            && days_since_epoch(now).rem_euclid(i64::from(self.frequency_days.max(1))) == 0
    }
}

fn days_since_epoch(now: NaiveDateTime) -> i64 {
    now.date()
        .signed_duration_since(NaiveDate::default())
        .num_days()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleTable {
    pub built_at: DateTime<Utc>,
    pub entries: Vec<ScheduleEntry>,
}

impl ScheduleTable {
    /// A table with no entries, used until the first resync succeeds.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            built_at: DateTime::<Utc>::UNIX_EPOCH,
            entries: Vec::new(),
        }
    }

    /// Builds the table from scratch: one entry per active site of each
    /// active search. Inactive searches and inactive sites produce nothing.
    #[must_use]
    pub fn build(specs: &[SearchSpec], built_at: DateTime<Utc>) -> Self {
        let mut entries: Vec<ScheduleEntry> = Vec::new();
        for spec in specs.iter().filter(|s| s.is_active) {
            for site in spec.active_sites() {
                let key = format!("run_search_{}_{}", spec.id, site.name.to_lowercase());
                if entries.iter().any(|e| e.key == key) {
                    continue;
                }
                entries.push(ScheduleEntry {
                    key,
                    search_id: spec.id,
                    site: site.name.clone(),
                    term: spec.term.clone(),
                    frequency_days: spec.frequency_days.max(1),
                    preferred_time: spec.preferred_time,
                });
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self { built_at, entries }
    }

    pub fn due(&self, now: NaiveDateTime) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.iter().filter(move |e| e.is_due(now))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "schedule_test.rs"]
mod tests;
