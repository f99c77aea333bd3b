//! # Report Identifiers
//!
//! New reports get `YYMMDD-NNN`: the day prefix plus a per-day sequence.
//! The sequence is one more than the highest suffix already used today, so
//! gaps left by removed reports are never refilled. The first report of a day
//! is `-000`.
//!
//! The suffix is read from everything after the seventh character. An
//! identifier that carries today's prefix but an unreadable suffix counts as
//! sequence 0. Past 999 the suffix simply grows a digit (`-1000`). Once the
//! highest suffix of a day reaches [`MAX_SEQUENCE`] no further identifier is
//! handed out for that day.

use crate::error::{Result, ValidationError};
use crate::model::{report_id_of, ReportId, Row, MAX_SEQUENCE};
use chrono::NaiveDate;

pub fn next_identifier(existing: &[Row], today: NaiveDate) -> Result<ReportId> {
    let prefix = ReportId::day_prefix(today);

    let highest = existing
        .iter()
        .map(report_id_of)
        .filter(|id| id.starts_with(&prefix))
        .map(sequence_of)
        .max();

    let next = match highest {
        Some(n) => n.checked_add(1).unwrap_or(u64::MAX),
        None => 0,
    };
    match u32::try_from(next) {
        Ok(next) if next <= MAX_SEQUENCE => Ok(ReportId::new(&prefix, next)),
        _ => Err(ValidationError::SequenceExhausted(prefix).into()),
    }
}

fn sequence_of(id: &str) -> u64 {
    id.get(7..).and_then(|s| s.parse().ok()).unwrap_or(0)
}
