use crate::error::Result;
use crate::store::{BackendKind, Handle, Namespace, NamespaceNames, Storage};
use serde::Serialize;

/// Where the data lives, after the namespace has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub backend: BackendKind,
    pub root: Handle,
    pub names: NamespaceNames,
    pub namespace: Namespace,
    pub csv_mirror: bool,
}

/// Resolve (and create, where missing) the namespace under the configured
/// root. Safe to run repeatedly.
pub async fn run(storage: &Storage) -> Result<StoreStatus> {
    let namespace = storage.ctx.namespace().await?;
    Ok(StoreStatus {
        backend: storage.ctx.backend_kind(),
        root: storage.ctx.root().await,
        names: storage.ctx.names().clone(),
        namespace,
        csv_mirror: storage.records.mirrors_csv(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures;

    #[tokio::test]
    async fn init_reports_backend_and_creates_namespace() {
        let (backend, storage) = fixtures::storage();
        let status = run(&storage).await.unwrap();
        assert_eq!(status.backend, BackendKind::Memory);
        assert!(!status.csv_mirror);
        assert_eq!(backend.file_names_in("DB").len(), 4);

        let writes = backend.write_count();
        assert_eq!(run(&storage).await.unwrap(), status);
        assert_eq!(backend.write_count(), writes);
    }
}
