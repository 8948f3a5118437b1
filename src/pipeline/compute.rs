//! Derived fields: casing normalisation, due dates, and the update payload.

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc, Weekday};

use crate::pipeline::types::{ExtractionResult, UpdatePayload};

/// Business days until an update is due when the model gives no date.
pub const DEFAULT_UPDATE_DUE_BUSINESS_DAYS: u32 = 5;

/// Capitalise the first letter of each word and lowercase the rest.
///
/// A word is a run of alphanumerics; an apostrophe inside a word does not
/// start a new one, so "client's review" becomes "Client's Review".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            in_word = in_word && c == '\'';
            out.push(c);
        }
    }
    out
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The date `days` weekdays after `start`. `start` itself never counts.
pub fn add_business_days(start: NaiveDate, days: u32) -> NaiveDate {
    let mut current = start;
    let mut added = 0;
    while added < days {
        current += Duration::days(1);
        if !is_weekend(current) {
            added += 1;
        }
    }
    current
}

/// Everything computed from one extraction result.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedUpdate {
    pub payload: UpdatePayload,
    /// Normalised stage, if the model supplied one.
    pub stage: Option<String>,
    /// Normalised status, if the model supplied one.
    pub status: Option<String>,
    /// Model's due date, or the business-day default. Always set so it can
    /// be reported even when no summary is written.
    pub update_due: String,
}

/// Build the update payload from an extraction.
///
/// Only present, non-blank fields are written. A status change also stamps
/// `now`; a summary also writes the due date.
pub fn derive_update(
    extraction: &ExtractionResult,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> DerivedUpdate {
    let stage = extraction.stage().map(title_case);
    let status = extraction.status().map(title_case);
    let update_due = extraction
        .update_due()
        .map(str::to_string)
        .unwrap_or_else(|| {
            add_business_days(today, DEFAULT_UPDATE_DUE_BUSINESS_DAYS)
                .format("%Y-%m-%d")
                .to_string()
        });

    let summary = extraction.update_summary();
    let payload = UpdatePayload {
        stage: stage.clone(),
        status: status.clone(),
        status_changed: status
            .as_ref()
            .map(|_| now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        with_client: extraction.with_client,
        update: summary.map(str::to_string),
        update_due: summary.map(|_| update_due.clone()),
    };

    DerivedUpdate {
        payload,
        stage,
        status,
        update_due,
    }
}
