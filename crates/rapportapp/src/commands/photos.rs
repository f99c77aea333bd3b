use crate::commands::{CmdMessage, CmdResult};
use crate::error::{RapportError, Result, ValidationError};
use crate::model::{report_id_of, Collection, PhotoSlot, ReportId, Row};
use crate::photo::StoredAsset;
use crate::store::Storage;
use serde_json::Value;
use tracing::{info, instrument, warn};

/// Attach an uploaded photo to the next free slot of a report.
///
/// Rejected without any write when the body is empty (`no-file`), the report
/// is unknown (`NotFound`) or all three slots are taken (`slots-exhausted`).
/// The slot check and the re-save run under the `meldungen` lock, so two
/// uploads for the same report land in different slots.
#[instrument(skip(storage, raw), fields(size = raw.len()))]
pub async fn attach(storage: &Storage, id: &str, raw: Vec<u8>) -> Result<CmdResult> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyUpload.into());
    }
    let id = ReportId::parse(id)?;
    let placed = store_in_free_slot(storage, &id, raw).await?;

    let mut result = CmdResult::default().with_affected_rows(vec![placed.report]);
    if placed.from_index {
        result.add_message(CmdMessage::warning(format!(
            "{} had no detail document, created it from the index",
            id
        )));
    }
    result.add_message(CmdMessage::success(format!(
        "Photo stored in {}: {}",
        placed.slot.field(),
        placed.asset.reference
    )));
    Ok(result)
}

/// A report photo together with the slot it now occupies.
pub(crate) struct PlacedPhoto {
    pub slot: PhotoSlot,
    pub asset: StoredAsset,
    /// The re-saved detail document.
    pub report: Row,
    pub from_index: bool,
}

/// Ingest a report photo and record its reference in the first free slot.
pub(crate) async fn store_in_free_slot(
    storage: &Storage,
    id: &ReportId,
    raw: Vec<u8>,
) -> Result<PlacedPhoto> {
    let _guard = storage.ctx.locks().lock(Collection::Meldungen).await;
    let (mut report, from_index) = load_report(storage, id).await?;

    let (slot, asset) = storage.photos.ingest_report(raw, id, &report).await?;
    report.insert(
        slot.field().to_string(),
        Value::String(asset.reference.clone()),
    );
    let report = storage
        .documents
        .save_detail_locked(id.as_str(), report)
        .await?;
    info!(%id, slot = slot.field(), name = %asset.name, "photo attached");
    Ok(PlacedPhoto {
        slot,
        asset,
        report,
        from_index,
    })
}

/// The detail document, falling back to the `meldungen` index for reports
/// that only exist there (written before detail documents existed). The flag
/// is set when the index row was used.
async fn load_report(storage: &Storage, id: &ReportId) -> Result<(Row, bool)> {
    match storage.documents.load_detail(id.as_str()).await {
        Err(RapportError::NotFound(_)) => {
            let index = storage.records.read_collection(Collection::Meldungen).await?;
            let row = index
                .into_iter()
                .find(|row| report_id_of(row) == id.as_str())
                .ok_or_else(|| RapportError::NotFound(format!("report {}", id)))?;
            warn!(%id, "report has no detail document, using index row");
            Ok((row, true))
        }
        other => other.map(|row| (row, false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{at, storage, user};
    use crate::commands::{reports, MessageLevel};
    use crate::model::{field_str, NewReport};
    use crate::test_utils::png_bytes;
    use serde_json::json;

    async fn report(storage: &Storage) -> String {
        let input = NewReport {
            anlage: "Halle 3".into(),
            bereich: "Technik".into(),
            titel: "Leck".into(),
            meldung: "Wasser tropft".into(),
        };
        let result = reports::create(storage, &user(), input, at(1, 8, 0))
            .await
            .unwrap();
        report_id_of(&result.affected_rows[0]).to_string()
    }

    #[tokio::test]
    async fn fills_slots_in_order() {
        let (backend, storage) = storage();
        let id = report(&storage).await;

        for _ in 0..3 {
            attach(&storage, &id, png_bytes(40, 30)).await.unwrap();
        }
        let detail = storage.documents.load_detail(&id).await.unwrap();
        for slot in PhotoSlot::ALL {
            assert!(field_str(&detail, slot.field()).starts_with("memory://"));
        }
        assert_eq!(backend.file_names_in("FOTOS").len(), 3);

        let index = storage.records.read_collection(Collection::Meldungen).await.unwrap();
        assert_eq!(index, vec![detail]);
    }

    #[tokio::test]
    async fn fourth_upload_is_rejected_without_write() {
        let (backend, storage) = storage();
        let id = report(&storage).await;
        for _ in 0..3 {
            attach(&storage, &id, png_bytes(10, 10)).await.unwrap();
        }

        let writes = backend.write_count();
        let err = attach(&storage, &id, png_bytes(10, 10)).await.unwrap_err();
        assert_eq!(err.reason_code(), Some("slots-exhausted"));
        assert_eq!(backend.write_count(), writes);
        assert_eq!(backend.file_names_in("FOTOS").len(), 3);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (backend, storage) = storage();
        let err = attach(&storage, "250101-000", Vec::new()).await.unwrap_err();
        assert_eq!(err.reason_code(), Some("no-file"));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn unknown_report_is_not_found() {
        let (backend, storage) = storage();
        storage.ctx.namespace().await.unwrap();
        let writes = backend.write_count();

        let err = attach(&storage, "250101-000", png_bytes(10, 10)).await.unwrap_err();
        assert!(matches!(err, RapportError::NotFound(_)));
        assert_eq!(backend.write_count(), writes);
    }

    #[tokio::test]
    async fn index_only_reports_get_a_detail_document() {
        let (_backend, storage) = storage();
        let row = json!({"idmeldung": "240101-000", "titel": "alt", "photo1": "/fotos/a.jpg"});
        storage
            .records
            .write_collection(Collection::Meldungen, &[row.as_object().cloned().unwrap()])
            .await
            .unwrap();

        let result = attach(&storage, "240101-000", png_bytes(10, 10)).await.unwrap();
        assert_eq!(result.messages[0].level, MessageLevel::Warning);
        assert_eq!(result.messages[1].content.split(':').next(), Some("Photo stored in photo2"));

        let detail = storage.documents.load_detail("240101-000").await.unwrap();
        assert_eq!(field_str(&detail, "photo1"), "/fotos/a.jpg");
        assert!(!field_str(&detail, "photo2").is_empty());
    }

    #[tokio::test]
    async fn concurrent_uploads_take_different_slots() {
        let (_backend, storage) = storage();
        let id = report(&storage).await;

        let (a, b) = tokio::join!(
            attach(&storage, &id, png_bytes(10, 10)),
            attach(&storage, &id, png_bytes(12, 12)),
        );
        a.unwrap();
        b.unwrap();

        let detail = storage.documents.load_detail(&id).await.unwrap();
        assert!(!field_str(&detail, "photo1").is_empty());
        assert!(!field_str(&detail, "photo2").is_empty());
        assert_ne!(field_str(&detail, "photo1"), field_str(&detail, "photo2"));
        assert_eq!(field_str(&detail, "photo3"), "");
    }
}
