use super::backend::{BackendKind, Handle, SharedBackend};
use super::namespace::{ensure_namespace, Namespace, NamespaceNames};
use crate::error::Result;
use crate::model::Collection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

struct Resolved {
    root: Handle,
    namespace: Option<Namespace>,
}

/// Process-scoped storage state: the backend, the configured root and the
/// resolved namespace handles.
///
/// Built once at startup and shared by the stores. The namespace is resolved
/// on first use and reused until [`invalidate`](Self::invalidate) or
/// [`set_root`](Self::set_root).
pub struct StoreContext {
    backend: SharedBackend,
    names: NamespaceNames,
    resolved: Mutex<Resolved>,
    locks: CollectionLocks,
}

impl StoreContext {
    pub fn new(backend: SharedBackend, root: Handle, names: NamespaceNames) -> Self {
        Self {
            backend,
            names,
            resolved: Mutex::new(Resolved {
                root,
                namespace: None,
            }),
            locks: CollectionLocks::default(),
        }
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn names(&self) -> &NamespaceNames {
        &self.names
    }

    pub fn locks(&self) -> &CollectionLocks {
        &self.locks
    }

    pub async fn root(&self) -> Handle {
        self.resolved.lock().await.root.clone()
    }

    /// The resolved namespace, resolving it on first use.
    pub async fn namespace(&self) -> Result<Namespace> {
        let mut resolved = self.resolved.lock().await;
        if let Some(ns) = &resolved.namespace {
            return Ok(ns.clone());
        }
        debug!(root = %resolved.root, "resolving namespace");
        let ns = ensure_namespace(self.backend.as_ref(), &resolved.root, &self.names).await?;
        resolved.namespace = Some(ns.clone());
        Ok(ns)
    }

    /// Drop the cached namespace; the next access re-resolves it.
    pub async fn invalidate(&self) {
        self.resolved.lock().await.namespace = None;
    }

    /// Point the context at another root. The cache is dropped only when the
    /// root actually changes.
    pub async fn set_root(&self, root: Handle) {
        let mut resolved = self.resolved.lock().await;
        if resolved.root != root {
            resolved.root = root;
            resolved.namespace = None;
        }
    }
}

/// One async mutex per collection.
///
/// Serializes read-modify-write spans inside this process. Writers in other
/// processes are not covered and still race last-writer-wins.
#[derive(Default)]
pub struct CollectionLocks {
    locks: std::sync::Mutex<HashMap<Collection, Arc<Mutex<()>>>>,
}

impl CollectionLocks {
    pub async fn lock(&self, collection: Collection) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(collection).or_default().clone()
        };
        lock.lock_owned().await
    }
}
