//! # Namespace Resolution
//!
//! Every root location carries the same three sub-folders:
//!
//! ```text
//! <root>/
//! ├── DB/       users.json, rapporte.json, massnahmen.json, meldungen.json (+ .csv mirrors)
//! ├── MELD/     {idmeldung}.json, one detail document per report
//! └── FOTOS/    {idmeldung}-{suffix}.jpg, {idmeldung}-m-{suffix}.jpg
//! ```
//!
//! Resolution looks each folder up by exact name and creates what is missing,
//! then seeds each collection file with an empty array. It is idempotent; the
//! [`StoreContext`](super::context::StoreContext) caches the result.

use super::backend::{Entry, EntryKind, Handle, StorageBackend};
use crate::error::{RapportError, Result};
use crate::model::{Collection, JSON_MIME};
use serde::Serialize;
use tracing::info;

/// Names of the three namespace folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceNames {
    pub db: String,
    pub detail: String,
    pub asset: String,
}

impl Default for NamespaceNames {
    fn default() -> Self {
        Self {
            db: "DB".to_string(),
            detail: "MELD".to_string(),
            asset: "FOTOS".to_string(),
        }
    }
}

/// Resolved handles of the three namespace folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Namespace {
    pub db: Handle,
    pub detail: Handle,
    pub asset: Handle,
}

pub async fn ensure_namespace(
    backend: &dyn StorageBackend,
    root: &Handle,
    names: &NamespaceNames,
) -> Result<Namespace> {
    let resolve = async {
        let db = ensure_folder(backend, root, &names.db).await?;
        let detail = ensure_folder(backend, root, &names.detail).await?;
        let asset = ensure_folder(backend, root, &names.asset).await?;

        for collection in Collection::ALL {
            let file = collection.json_file();
            if backend.find_entry(&db, &file).await?.is_none() {
                info!(%collection, "seeding empty collection");
                backend
                    .create_file(&db, &file, b"[]".to_vec(), JSON_MIME)
                    .await?;
            }
        }
        Ok::<_, RapportError>(Namespace { db, detail, asset })
    };

    resolve.await.map_err(|e| match e {
        RapportError::NotConfigured(_) | RapportError::Validation(_) => e,
        other => RapportError::NamespaceUnavailable(format!("root {}: {}", root, other)),
    })
}

async fn ensure_folder(backend: &dyn StorageBackend, parent: &Handle, name: &str) -> Result<Handle> {
    let existing = backend.list_entries(parent, Some(name)).await?;
    if let Some(Entry { handle, .. }) = existing.into_iter().find(|e| e.kind == EntryKind::Folder) {
        return Ok(handle);
    }
    info!(%parent, name, "creating namespace folder");
    backend.create_folder(parent, name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem_backend::MemBackend;

    #[tokio::test]
    async fn creates_folders_and_seeds_collections() {
        let backend = MemBackend::new();
        let root = MemBackend::root_handle();
        let ns = ensure_namespace(&backend, &root, &NamespaceNames::default())
            .await
            .unwrap();

        let top = backend.list_entries(&root, None).await.unwrap();
        let mut names: Vec<_> = top.iter().map(|e| e.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["DB", "FOTOS", "MELD"]);

        let files = backend.list_entries(&ns.db, None).await.unwrap();
        assert_eq!(files.len(), 4);
        assert_eq!(backend.file_named("users.json").unwrap(), b"[]");
    }

    #[tokio::test]
    async fn is_idempotent() {
        let backend = MemBackend::new();
        let root = MemBackend::root_handle();
        let names = NamespaceNames::default();
        let first = ensure_namespace(&backend, &root, &names).await.unwrap();
        let writes = backend.write_count();
        let second = ensure_namespace(&backend, &root, &names).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.write_count(), writes);
        assert_eq!(backend.list_entries(&root, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn a_file_does_not_count_as_folder() {
        let backend = MemBackend::new();
        let root = MemBackend::root_handle();
        backend
            .create_file(&root, "DB", b"x".to_vec(), "text/plain")
            .await
            .unwrap();
        let ns = ensure_namespace(&backend, &root, &NamespaceNames::default())
            .await
            .unwrap();
        let db_entries = backend.list_entries(&root, Some("DB")).await.unwrap();
        assert_eq!(db_entries.len(), 2);
        assert!(db_entries
            .iter()
            .any(|e| e.handle == ns.db && e.kind == EntryKind::Folder));
    }

    #[tokio::test]
    async fn unreachable_root_is_namespace_unavailable() {
        let backend = MemBackend::new();
        backend.set_simulate_write_error(true);
        let result =
            ensure_namespace(&backend, &MemBackend::root_handle(), &NamespaceNames::default())
                .await;
        assert!(matches!(result, Err(RapportError::NamespaceUnavailable(_))));
    }
}
