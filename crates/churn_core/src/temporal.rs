//! Projection of time-derived customer fields
//!
//! The customer store is a snapshot taken on a reference date. Recency fields
//! are projected to "today" without being written back.

use chrono::{Local, NaiveDate};
use serde::Serialize;

/// Stored recency column
pub const DAYS_SINCE_LAST: &str = "DAYS_SINCE_LAST";

/// Stored 30-day request count column
pub const QTD_SOL_LAST_30D: &str = "QTD_SOL_LAST_30D";

/// Window after which the 30-day request count is stale
pub const REQUEST_WINDOW_DAYS: i64 = 30;

/// Snapshot date of the shipped customer store
pub fn default_reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 31).unwrap_or_default()
}

/// Source of the current date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a given date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemporalProjection {
    #[serde(rename = "DAYS_SINCE_LAST")]
    pub days_since_last: i64,
    #[serde(rename = "QTD_SOL_LAST_30D")]
    pub qtd_sol_last_30d: i64,
}

/// Project stored recency fields from `reference` to `today`.
///
/// Elapsed days never go negative. Once the projected recency exceeds the
/// 30-day window the request count is reported as zero.
pub fn project(
    stored_days_since_last: f64,
    stored_qtd_sol_last_30d: f64,
    reference: NaiveDate,
    today: NaiveDate,
) -> TemporalProjection {
    let elapsed = (today - reference).num_days().max(0);
    let days_since_last = (stored_days_since_last.trunc() as i64).saturating_add(elapsed);

    let qtd_sol_last_30d = if days_since_last > REQUEST_WINDOW_DAYS {
        0
    } else {
        stored_qtd_sol_last_30d.trunc() as i64
    };

    TemporalProjection {
        days_since_last,
        qtd_sol_last_30d,
    }
}
