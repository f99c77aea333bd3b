//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer and the stores.
//! It is the single entry point for all clients: the bundled CLI, an HTTP
//! server, or tests.
//!
//! ## Role and Responsibilities
//!
//! The facade:
//! - **Dispatches** to the command functions in `commands/*.rs`
//! - **Exposes** the storage primitives (collections, detail documents,
//!   photo ingestion, identifier generation) for callers that build their own
//!   operations
//! - **Returns structured types**, never formatted text
//!
//! Business logic lives in the commands, storage behavior in `store/`.
//!
//! ## Concurrency
//!
//! All methods take `&self` and may be called concurrently. Clones share the
//! same [`StoreContext`](crate::store::StoreContext): one resolved namespace
//! and one set of collection locks per process.

use crate::commands::{self, init::StoreStatus, CmdResult};
use crate::config::RapportConfig;
use crate::error::Result;
use crate::ident::next_identifier;
use crate::model::{AssetKind, Collection, NewReport, ReportId, Row, UserIdentity};
use crate::photo::StoredAsset;
use crate::store::{Handle, Storage};
use chrono::{DateTime, Local};

#[derive(Clone)]
pub struct RapportApi {
    storage: Storage,
}

impl RapportApi {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Build the configured backend. No I/O happens until the first call.
    pub fn open(config: &RapportConfig) -> Result<Self> {
        Ok(Self::new(Storage::open(config)?))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn init(&self) -> Result<StoreStatus> {
        commands::init::run(&self.storage).await
    }

    pub async fn create_report(
        &self,
        user: &UserIdentity,
        input: NewReport,
        now: DateTime<Local>,
    ) -> Result<CmdResult> {
        commands::reports::create(&self.storage, user, input, now).await
    }

    pub async fn list_reports(&self) -> Result<CmdResult> {
        commands::reports::list(&self.storage).await
    }

    pub async fn get_report(&self, id: &str) -> Result<CmdResult> {
        commands::reports::get(&self.storage, id).await
    }

    pub async fn attach_photo(&self, id: &str, raw: Vec<u8>) -> Result<CmdResult> {
        commands::photos::attach(&self.storage, id, raw).await
    }

    pub async fn add_massnahme(
        &self,
        id: &str,
        user: &UserIdentity,
        text: &str,
        photo: Option<Vec<u8>>,
        now: DateTime<Local>,
    ) -> Result<CmdResult> {
        commands::massnahmen::add(&self.storage, id, user, text, photo, now).await
    }

    pub async fn massnahmen_for(&self, id: &str) -> Result<CmdResult> {
        commands::massnahmen::for_report(&self.storage, id).await
    }

    pub async fn seed_users(&self) -> Result<CmdResult> {
        commands::users::seed(&self.storage).await
    }

    pub async fn authenticate(&self, login: &str, password: &str) -> Result<UserIdentity> {
        commands::users::authenticate(&self.storage, login, password).await
    }

    pub async fn list_users(&self, user: &UserIdentity) -> Result<CmdResult> {
        commands::users::list(&self.storage, user).await
    }

    // Storage primitives

    pub async fn read_collection(&self, collection: Collection) -> Result<Vec<Row>> {
        self.storage.records.read_collection(collection).await
    }

    /// Whole-collection replace. Takes no lock: last writer wins.
    pub async fn write_collection(&self, collection: Collection, rows: &[Row]) -> Result<()> {
        self.storage.records.write_collection(collection, rows).await
    }

    pub async fn save_detail(&self, id: &str, document: Row) -> Result<Row> {
        self.storage.documents.save_detail(id, document).await
    }

    pub async fn load_detail(&self, id: &str) -> Result<Row> {
        self.storage.documents.load_detail(id).await
    }

    pub async fn list_details(&self) -> Result<Vec<Row>> {
        self.storage.documents.list_details().await
    }

    /// Normalize and store a photo for `owner`.
    ///
    /// A report photo always takes the report's next free slot, so a report
    /// with three photos is refused with `slots-exhausted` and nothing is
    /// written. Remediation-note photos take no slot.
    pub async fn ingest_photo(&self, raw: Vec<u8>, owner: &str, kind: AssetKind) -> Result<StoredAsset> {
        let owner = ReportId::parse(owner)?;
        match kind {
            AssetKind::Report => {
                let placed =
                    commands::photos::store_in_free_slot(&self.storage, &owner, raw).await?;
                Ok(placed.asset)
            }
            AssetKind::Massnahme => self.storage.photos.ingest_massnahme(raw, &owner).await,
        }
    }

    /// The identifier the next report created at `now` would get. Nothing
    /// is reserved.
    pub async fn peek_next_identifier(&self, now: DateTime<Local>) -> Result<ReportId> {
        let existing = self.read_collection(Collection::Meldungen).await?;
        next_identifier(&existing, now.date_naive())
    }

    /// Point the store at another root location.
    pub async fn set_root(&self, root: Handle) {
        self.storage.ctx.set_root(root).await;
    }

    /// Forget the resolved namespace, e.g. after folders were moved by hand.
    pub async fn invalidate_namespace(&self) {
        self.storage.ctx.invalidate().await;
    }
}
