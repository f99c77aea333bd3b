//! # Storage Layer
//!
//! A transactional-looking record store emulated on top of plain files,
//! either on local disk or on a remote file host.
//!
//! ## Layers
//!
//! ```text
//! RecordStore / DocumentStore      whole collections, per-report documents
//!            │
//!      StoreContext                backend + root + cached Namespace + locks
//!            │
//!   dyn StorageBackend             FsBackend | DriveBackend | MemBackend
//! ```
//!
//! The backend trait is deliberately small: list, create folder, read,
//! create file, update file. Everything else (lookup by name, upsert,
//! namespace resolution, CSV mirroring) is built on top of it, so the stores
//! never know which backend they run on.
//!
//! ## Guarantees
//!
//! - A missing collection file reads as an empty collection.
//! - Collection writes replace the whole file. There is no cross-collection
//!   atomicity.
//! - Read-modify-write spans inside the library hold a per-collection lock;
//!   other processes writing the same files still race.
//!
//! [`Storage::open`] assembles everything from a [`RapportConfig`].

pub mod backend;
pub mod context;
pub mod csv_export;
pub mod document_store;
pub mod drive_backend;
pub mod fs_backend;
pub mod mem_backend;
pub mod namespace;
pub mod record_store;

pub use backend::{BackendKind, Entry, EntryKind, Handle, SharedBackend, StorageBackend};
pub use context::{CollectionLocks, StoreContext};
pub use document_store::DocumentStore;
pub use namespace::{Namespace, NamespaceNames};
pub use record_store::RecordStore;

use crate::config::{BackendChoice, RapportConfig};
use crate::error::{RapportError, Result};
use crate::photo::{PhotoLimits, PhotoPipeline};
use drive_backend::{parse_folder_id, DriveBackend};
use fs_backend::FsBackend;
use std::sync::Arc;
use tracing::info;

/// Everything the command layer needs, sharing one [`StoreContext`].
#[derive(Clone)]
pub struct Storage {
    pub ctx: Arc<StoreContext>,
    pub records: RecordStore,
    pub documents: DocumentStore,
    pub photos: PhotoPipeline,
}

impl Storage {
    pub fn new(
        backend: SharedBackend,
        root: Handle,
        names: NamespaceNames,
        csv_mirror: bool,
        limits: PhotoLimits,
    ) -> Self {
        let ctx = Arc::new(StoreContext::new(backend, root, names));
        let records = RecordStore::new(ctx.clone(), csv_mirror);
        let documents = DocumentStore::new(ctx.clone(), records.clone());
        let photos = PhotoPipeline::new(ctx.clone(), limits);
        Self {
            ctx,
            records,
            documents,
            photos,
        }
    }

    /// Select and build the configured backend. Performs no I/O; a drive
    /// setup without folder id or token fails here with `NotConfigured`.
    pub fn open(config: &RapportConfig) -> Result<Self> {
        let (backend, root): (SharedBackend, Handle) = match config.backend {
            BackendChoice::Local => {
                info!(data_dir = %config.data_dir.display(), "using local backend");
                (
                    Arc::new(FsBackend::new(config.data_dir.clone())),
                    FsBackend::root_handle(),
                )
            }
            BackendChoice::Drive => {
                let raw = config.drive_folder.as_deref().unwrap_or("");
                let folder = parse_folder_id(raw).ok_or_else(|| {
                    RapportError::NotConfigured(format!("drive folder id unreadable: {:?}", raw))
                })?;
                let token = config
                    .drive_token
                    .as_deref()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| RapportError::NotConfigured("drive token missing".to_string()))?;
                info!(%folder, "using drive backend");
                (
                    Arc::new(DriveBackend::new(config.drive_api_base.clone(), token)),
                    Handle::new(folder),
                )
            }
        };

        Ok(Self::new(
            backend,
            root,
            config.namespace_names(),
            config.csv_mirror(),
            config.photo_limits(),
        ))
    }
}
