use super::context::StoreContext;
use super::csv_export::render_csv;
use crate::error::Result;
use crate::model::{Collection, Row, CSV_MIME, JSON_MIME};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Whole-collection reads and writes.
///
/// Every read goes to the backend; nothing is cached between calls. Writes
/// replace the whole file. `write_collection` takes no lock: concurrent
/// writers to the same collection race and the last one wins. Callers that
/// read, modify and write back hold the collection lock from
/// [`CollectionLocks`](super::context::CollectionLocks) around the span.
#[derive(Clone)]
pub struct RecordStore {
    ctx: Arc<StoreContext>,
    csv_mirror: bool,
}

impl RecordStore {
    pub fn new(ctx: Arc<StoreContext>, csv_mirror: bool) -> Self {
        Self { ctx, csv_mirror }
    }

    pub fn mirrors_csv(&self) -> bool {
        self.csv_mirror
    }

    /// All rows of `collection`. A missing file or an empty or unreadable body
    /// reads as an empty collection.
    #[instrument(skip(self), fields(%collection))]
    pub async fn read_collection(&self, collection: Collection) -> Result<Vec<Row>> {
        let ns = self.ctx.namespace().await?;
        let backend = self.ctx.backend();

        let Some(entry) = backend.find_entry(&ns.db, &collection.json_file()).await? else {
            debug!("collection file missing, reading as empty");
            return Ok(Vec::new());
        };
        let bytes = backend.read_file(&entry.handle).await?;
        Ok(parse_collection(collection, &bytes))
    }

    /// Replace `collection` with `rows`: the JSON file, then the CSV mirror
    /// when enabled. The two writes are independent.
    #[instrument(skip(self, rows), fields(%collection, rows = rows.len()))]
    pub async fn write_collection(&self, collection: Collection, rows: &[Row]) -> Result<()> {
        let ns = self.ctx.namespace().await?;
        let backend = self.ctx.backend();

        let json = serde_json::to_vec_pretty(rows)?;
        backend
            .upsert_file(&ns.db, &collection.json_file(), json, JSON_MIME)
            .await?;

        if self.csv_mirror {
            let csv = render_csv(rows)?;
            backend
                .upsert_file(&ns.db, &collection.csv_file(), csv, CSV_MIME)
                .await?;
        }
        Ok(())
    }

    /// Append one row under the collection lock.
    pub async fn append_row(&self, collection: Collection, row: Row) -> Result<()> {
        let _guard = self.ctx.locks().lock(collection).await;
        let mut rows = self.read_collection(collection).await?;
        rows.push(row);
        self.write_collection(collection, &rows).await
    }
}

/// Decode a collection body.
///
/// The canonical shape is a JSON array. The `{ "items": [...] }` wrapper
/// written by older remote-backed versions is accepted, as is any other
/// object, whose values are taken as the rows.
pub fn parse_collection(collection: Collection, bytes: &[u8]) -> Vec<Row> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(%collection, error = %e, "unreadable collection body, reading as empty");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) if matches!(map.get("items"), Some(Value::Array(_))) => {
            match map.into_iter().find(|(key, _)| key == "items") {
                Some((_, Value::Array(items))) => items,
                _ => Vec::new(),
            }
        }
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Null => Vec::new(),
        other => {
            warn!(%collection, kind = ?other, "collection body is not a list, reading as empty");
            return Vec::new();
        }
    };

    let total = items.len();
    let rows: Vec<Row> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect();
    if rows.len() != total {
        warn!(%collection, skipped = total - rows.len(), "skipped non-object rows");
    }
    rows
}
