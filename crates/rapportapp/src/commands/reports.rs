use crate::commands::{CmdMessage, CmdResult};
use crate::error::{Result, ValidationError};
use crate::ident::next_identifier;
use crate::model::{
    display_date, display_time, report_id_of, sort_by_report_id, Collection, NewReport,
    PhotoSlot, Row, UserIdentity,
};
use crate::store::Storage;
use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::{info, instrument};

pub const INITIAL_STATUS: &str = "Meldung";

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField(field).into());
    }
    Ok(value)
}

fn row_of<'a>(fields: impl IntoIterator<Item = (&'a str, String)>) -> Row {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::String(value)))
        .collect()
}

/// Create a report: allocate the next identifier of the day, save the detail
/// document (mirrored into `meldungen`) and append the overview row to
/// `rapporte`.
///
/// Identifier allocation and the detail save happen under the `meldungen`
/// lock, so two creates in this process never get the same identifier.
#[instrument(skip(storage, user, input), fields(user = %user.iduser))]
pub async fn create(
    storage: &Storage,
    user: &UserIdentity,
    input: NewReport,
    now: DateTime<Local>,
) -> Result<CmdResult> {
    let anlage = required(&input.anlage, "anlage")?;
    let bereich = required(&input.bereich, "bereich")?;
    let titel = required(&input.titel, "titel")?;
    let meldung = required(&input.meldung, "meldung")?;

    let datum = display_date(&now);
    let zeit = display_time(&now);
    let melder = user.display_name();

    let report = {
        let _guard = storage.ctx.locks().lock(Collection::Meldungen).await;
        let existing = storage.records.read_collection(Collection::Meldungen).await?;
        let id = next_identifier(&existing, now.date_naive())?;

        let mut report = row_of([
            ("idmeldung", id.to_string()),
            ("iduser", user.iduser.clone()),
            ("datum", datum.clone()),
            ("zeit", zeit.clone()),
            ("melder", melder.clone()),
            ("email", "-".to_string()),
            ("handy", "-".to_string()),
        ]);
        for slot in PhotoSlot::ALL {
            report.insert(slot.field().to_string(), Value::String(String::new()));
        }
        report.extend(row_of([
            ("anlage", anlage.to_string()),
            ("status", INITIAL_STATUS.to_string()),
            ("bereich", bereich.to_string()),
            ("titel", titel.to_string()),
            ("meldung", meldung.to_string()),
        ]));

        storage.documents.save_detail_locked(id.as_str(), report).await?
    };

    let id = report_id_of(&report).to_string();
    let overview = row_of([
        ("idmeldung", id.clone()),
        ("anlage", anlage.to_string()),
        ("bereich", bereich.to_string()),
        ("status", INITIAL_STATUS.to_string()),
        ("titel", titel.to_string()),
        ("melder", melder),
        ("datum", datum),
        ("zeit", zeit),
    ]);
    storage
        .records
        .append_row(Collection::Rapporte, overview)
        .await?;
    info!(%id, "report created");

    let mut result = CmdResult::default().with_affected_rows(vec![report]);
    result.add_message(CmdMessage::success(format!("Report created: {}", id)));
    Ok(result)
}

/// The `meldungen` index, sorted by identifier.
pub async fn list(storage: &Storage) -> Result<CmdResult> {
    let mut rows = storage.records.read_collection(Collection::Meldungen).await?;
    sort_by_report_id(&mut rows);
    Ok(CmdResult::default().with_listed_rows(rows))
}

/// One report's detail document.
pub async fn get(storage: &Storage, id: &str) -> Result<CmdResult> {
    let document = storage.documents.load_detail(id).await?;
    Ok(CmdResult::default().with_listed_rows(vec![document]))
}
