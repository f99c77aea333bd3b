use super::context::StoreContext;
use super::record_store::RecordStore;
use crate::error::{RapportError, Result, ValidationError};
use crate::model::{report_id_of, sort_by_report_id, Collection, ReportId, Row, JSON_MIME, REPORT_ID_FIELD};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Per-report detail documents, one `{idmeldung}.json` each in the detail
/// folder, mirrored into the flat `meldungen` collection.
///
/// ## Consistency
///
/// `save_detail` writes the document first and then reconciles the mirror
/// (read `meldungen`, replace or append, sort, write back). The two steps are
/// not atomic: a crash in between leaves the document ahead of the index until
/// the next save of that report. Within one process the mirror update holds
/// the `meldungen` lock, so concurrent saves of different reports do not drop
/// each other's index entries; across processes they still can.
#[derive(Clone)]
pub struct DocumentStore {
    ctx: Arc<StoreContext>,
    records: RecordStore,
}

impl DocumentStore {
    pub fn new(ctx: Arc<StoreContext>, records: RecordStore) -> Self {
        Self { ctx, records }
    }

    fn file_name(id: &ReportId) -> String {
        format!("{}.json", id)
    }

    /// Create or overwrite the detail document of `id` and reconcile its
    /// mirror entry.
    #[instrument(skip(self, document))]
    pub async fn save_detail(&self, id: &str, document: Row) -> Result<Row> {
        let _guard = self.ctx.locks().lock(Collection::Meldungen).await;
        self.save_detail_locked(id, document).await
    }

    /// Same as [`save_detail`](Self::save_detail); the caller already holds
    /// the `meldungen` collection lock.
    pub(crate) async fn save_detail_locked(&self, id: &str, mut document: Row) -> Result<Row> {
        let id = ReportId::parse(id)?;
        match document.get(REPORT_ID_FIELD) {
            None | Some(Value::Null) => {
                document.insert(REPORT_ID_FIELD.to_string(), Value::String(id.to_string()));
            }
            Some(Value::String(found)) if found == id.as_str() => {}
            Some(other) => {
                let found = other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string());
                return Err(ValidationError::IdentifierMismatch {
                    expected: id.to_string(),
                    found,
                }
                .into());
            }
        }

        let ns = self.ctx.namespace().await?;
        let body = serde_json::to_vec_pretty(&document)?;
        self.ctx
            .backend()
            .upsert_file(&ns.detail, &Self::file_name(&id), body, JSON_MIME)
            .await?;

        self.reconcile_mirror(&id, &document).await?;
        Ok(document)
    }

    async fn reconcile_mirror(&self, id: &ReportId, document: &Row) -> Result<()> {
        let mut index = self.records.read_collection(Collection::Meldungen).await?;
        match index.iter_mut().find(|row| report_id_of(row) == id.as_str()) {
            Some(existing) => {
                debug!(%id, "replacing mirror entry");
                *existing = document.clone();
            }
            None => {
                debug!(%id, "appending mirror entry");
                index.push(document.clone());
            }
        }
        sort_by_report_id(&mut index);
        self.records
            .write_collection(Collection::Meldungen, &index)
            .await
    }

    /// The detail document of `id`. Unlike collections, a missing document is
    /// a genuine `NotFound`.
    #[instrument(skip(self))]
    pub async fn load_detail(&self, id: &str) -> Result<Row> {
        let id = ReportId::parse(id)?;
        let ns = self.ctx.namespace().await?;
        let backend = self.ctx.backend();
        let entry = backend
            .find_entry(&ns.detail, &Self::file_name(&id))
            .await?
            .ok_or_else(|| RapportError::NotFound(format!("report {}", id)))?;
        let bytes = backend.read_file(&entry.handle).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Every detail document, sorted by identifier.
    ///
    /// One backend read per file; fine for the few thousand reports this tool
    /// sees, not meant for more.
    #[instrument(skip(self))]
    pub async fn list_details(&self) -> Result<Vec<Row>> {
        let ns = self.ctx.namespace().await?;
        let backend = self.ctx.backend();
        let entries = backend.list_entries(&ns.detail, None).await?;

        let mut documents = Vec::new();
        for entry in entries.iter().filter(|e| e.name.ends_with(".json")) {
            let bytes = backend.read_file(&entry.handle).await?;
            let document: Row = serde_json::from_slice(&bytes)?;
            documents.push(document);
        }
        sort_by_report_id(&mut documents);
        Ok(documents)
    }
}
