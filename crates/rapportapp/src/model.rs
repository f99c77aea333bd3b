//! # Data Model
//!
//! Rows are schemaless JSON objects (`serde_json::Map`), matching the on-disk
//! files that spreadsheet users and older tool versions also touch. The few
//! places where the library needs structure get small typed helpers instead of
//! a full schema:
//!
//! - [`Collection`]: the four named collections and their file names.
//! - [`ReportId`]: the `YYMMDD-NNN` report identifier.
//! - [`PhotoSlot`]: the three photo-slot fields of a report row.
//! - [`UserIdentity`]: the "current user" the caller passes in.
//!
//! Key order inside a row is preserved (`serde_json` with `preserve_order`),
//! so the CSV mirror header follows the order fields were inserted in.

use crate::error::{Result, ValidationError};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One record of a collection.
pub type Row = Map<String, Value>;

/// Field holding a report's identifier, in reports, overview rows and
/// remediation notes alike.
pub const REPORT_ID_FIELD: &str = "idmeldung";

pub const JSON_MIME: &str = "application/json";
pub const CSV_MIME: &str = "text/csv";
pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Rapporte,
    Massnahmen,
    Meldungen,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Rapporte,
        Collection::Massnahmen,
        Collection::Meldungen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Rapporte => "rapporte",
            Collection::Massnahmen => "massnahmen",
            Collection::Meldungen => "meldungen",
        }
    }

    pub fn json_file(self) -> String {
        format!("{}.json", self.name())
    }

    pub fn csv_file(self) -> String {
        format!("{}.csv", self.name())
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim_end_matches(".json")))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Highest per-day sequence an identifier may carry.
pub const MAX_SEQUENCE: u32 = 999_999;

/// A report identifier: `YYMMDD-NNN`.
///
/// `NNN` is at least three digits; a day with more than 999 reports simply
/// grows a fourth digit. Sequences above [`MAX_SEQUENCE`] are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportId(String);

impl ReportId {
    pub fn new(prefix: &str, sequence: u32) -> Self {
        Self(format!("{}-{:03}", prefix, sequence))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::MissingIdentifier.into());
        }
        let valid = match raw.split_once('-') {
            Some((day, seq)) => {
                day.len() == 6
                    && seq.len() >= 3
                    && day.bytes().all(|b| b.is_ascii_digit())
                    && seq.bytes().all(|b| b.is_ascii_digit())
                    && seq.parse::<u32>().is_ok_and(|n| n <= MAX_SEQUENCE)
            }
            None => false,
        };
        if !valid {
            return Err(ValidationError::InvalidIdentifier(raw.to_string()).into());
        }
        Ok(Self(raw.to_string()))
    }

    /// The `YYMMDD` day prefix for a date.
    pub fn day_prefix(date: NaiveDate) -> String {
        date.format("%y%m%d").to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ReportId {
    type Error = crate::error::RapportError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ReportId> for String {
    fn from(id: ReportId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSlot {
    Photo1,
    Photo2,
    Photo3,
}

impl PhotoSlot {
    pub const ALL: [PhotoSlot; 3] = [PhotoSlot::Photo1, PhotoSlot::Photo2, PhotoSlot::Photo3];

    pub fn field(self) -> &'static str {
        match self {
            PhotoSlot::Photo1 => "photo1",
            PhotoSlot::Photo2 => "photo2",
            PhotoSlot::Photo3 => "photo3",
        }
    }

    /// First slot of `row` that holds no reference yet.
    pub fn first_free(row: &Row) -> Option<PhotoSlot> {
        Self::ALL.into_iter().find(|slot| match row.get(slot.field()) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
    }
}

/// Which kind of row a stored photo belongs to. Drives the asset file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Report,
    Massnahme,
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub iduser: String,
    pub vorname: String,
    pub nachname: String,
    pub rolle: String,
}

impl UserIdentity {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.vorname, self.nachname)
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self.rolle.as_str(), "Administrator" | "Superuser" | "Chef")
    }
}

/// Caller input for a new report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReport {
    pub anlage: String,
    pub bereich: String,
    pub titel: String,
    pub meldung: String,
}

/// Date and time the way the rows store them: `dd.mm.yy` and `HH:MM`.
pub fn display_date(now: &DateTime<Local>) -> String {
    now.format("%d.%m.%y").to_string()
}

pub fn display_time(now: &DateTime<Local>) -> String {
    now.format("%H:%M").to_string()
}

/// String value of a field, empty when absent or not a string.
pub fn field_str<'a>(row: &'a Row, field: &str) -> &'a str {
    row.get(field).and_then(Value::as_str).unwrap_or("")
}

pub fn report_id_of(row: &Row) -> &str {
    field_str(row, REPORT_ID_FIELD)
}

/// Sort rows by report identifier, lexicographically.
pub fn sort_by_report_id(rows: &mut [Row]) {
    rows.sort_by(|a, b| report_id_of(a).cmp(report_id_of(b)));
}
