use crate::commands::{CmdMessage, CmdResult};
use crate::error::{Result, ValidationError};
use crate::model::{
    display_date, display_time, field_str, report_id_of, Collection, ReportId, Row,
    UserIdentity,
};
use crate::store::Storage;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

/// Append a remediation note to a report, with an optional photo.
///
/// The photo is stored as `{id}-m-{suffix}.jpg` and referenced from `mphoto`;
/// notes do not use the report's photo slots.
#[instrument(skip(storage, user, text, photo), fields(user = %user.iduser))]
pub async fn add(
    storage: &Storage,
    id: &str,
    user: &UserIdentity,
    text: &str,
    photo: Option<Vec<u8>>,
    now: DateTime<Local>,
) -> Result<CmdResult> {
    let id = ReportId::parse(id)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::MissingField("massnahme").into());
    }

    let mphoto = match photo {
        Some(raw) => {
            storage
                .photos
                .ingest_massnahme(raw, &id)
                .await?
                .reference
        }
        None => String::new(),
    };

    let row: Row = [
        ("idmassnahme", Uuid::new_v4().to_string()),
        ("idmeldung", id.to_string()),
        ("iduser", user.iduser.clone()),
        ("mdatum", display_date(&now)),
        ("mzeit", display_time(&now)),
        ("mbearbeiter", user.display_name()),
        ("email", "-".to_string()),
        ("handy", "-".to_string()),
        ("mphoto", mphoto),
        ("massnahme", text.to_string()),
        (
            "iso",
            now.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), Value::String(value)))
    .collect();

    storage
        .records
        .append_row(Collection::Massnahmen, row.clone())
        .await?;

    let mut result = CmdResult::default().with_affected_rows(vec![row]);
    result.add_message(CmdMessage::success(format!("Massnahme added to {}", id)));
    Ok(result)
}

/// Remediation notes of one report, oldest first.
pub async fn for_report(storage: &Storage, id: &str) -> Result<CmdResult> {
    let id = ReportId::parse(id)?;
    let mut rows: Vec<Row> = storage
        .records
        .read_collection(Collection::Massnahmen)
        .await?
        .into_iter()
        .filter(|row| report_id_of(row) == id.as_str())
        .collect();
    rows.sort_by(|a, b| field_str(a, "iso").cmp(field_str(b, "iso")));
    Ok(CmdResult::default().with_listed_rows(rows))
}
