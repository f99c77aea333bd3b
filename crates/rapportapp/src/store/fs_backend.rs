use super::backend::{validate_name, BackendKind, Entry, EntryKind, Handle, StorageBackend};
use crate::error::{RapportError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Local-disk backend rooted at the configured data directory.
///
/// Handles are relative paths (`""` is the root, `"DB/users.json"` a file).
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root_handle() -> Handle {
        Handle::new("")
    }

    fn path_of(&self, handle: &Handle) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for part in handle.as_str().split('/').filter(|p| !p.is_empty()) {
            validate_name(part)?;
            path.push(part);
        }
        Ok(path)
    }

    fn child(parent: &Handle, name: &str) -> Handle {
        if parent.as_str().is_empty() {
            Handle::new(name)
        } else {
            Handle::new(format!("{}/{}", parent.as_str(), name))
        }
    }

    async fn atomic_write(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        let dir = target
            .parent()
            .ok_or_else(|| RapportError::Store(format!("no parent for {}", target.display())))?;
        fs::create_dir_all(dir).await?;

        let tmp = dir.join(format!(".write-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn list_entries(&self, parent: &Handle, name: Option<&str>) -> Result<Vec<Entry>> {
        let dir = self.path_of(parent)?;
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(dirent) = reader.next_entry().await? {
            let Some(file_name) = dirent.file_name().to_str().map(str::to_string) else {
                continue;
            };
            // In-flight atomic writes
            if file_name.starts_with(".write-") && file_name.ends_with(".tmp") {
                continue;
            }
            if name.is_some_and(|wanted| wanted != file_name) {
                continue;
            }
            let kind = if dirent.file_type().await?.is_dir() {
                EntryKind::Folder
            } else {
                EntryKind::File
            };
            entries.push(Entry {
                handle: Self::child(parent, &file_name),
                name: file_name,
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn create_folder(&self, parent: &Handle, name: &str) -> Result<Handle> {
        validate_name(name)?;
        let handle = Self::child(parent, name);
        let path = self.path_of(&handle)?;
        debug!(path = %path.display(), "creating folder");
        fs::create_dir_all(&path).await?;
        Ok(handle)
    }

    async fn read_file(&self, handle: &Handle) -> Result<Vec<u8>> {
        let path = self.path_of(handle)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(RapportError::NotFound(handle.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_file(
        &self,
        parent: &Handle,
        name: &str,
        bytes: Vec<u8>,
        _mime: &str,
    ) -> Result<Handle> {
        validate_name(name)?;
        let handle = Self::child(parent, name);
        let path = self.path_of(&handle)?;
        debug!(path = %path.display(), size = bytes.len(), "writing new file");
        self.atomic_write(&path, &bytes).await?;
        Ok(handle)
    }

    async fn update_file(&self, handle: &Handle, bytes: Vec<u8>, _mime: &str) -> Result<()> {
        let path = self.path_of(handle)?;
        if fs::metadata(&path).await.is_err() {
            return Err(RapportError::NotFound(handle.to_string()));
        }
        debug!(path = %path.display(), size = bytes.len(), "overwriting file");
        self.atomic_write(&path, &bytes).await
    }

    fn asset_reference(&self, _handle: &Handle, name: &str) -> String {
        format!("/fotos/{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsBackend) {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        (dir, backend)
    }

    #[tokio::test]
    async fn missing_folder_lists_empty() {
        let (_dir, backend) = setup();
        let entries = backend
            .list_entries(&Handle::new("nope"), None)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn handles_are_relative_paths() {
        let (dir, backend) = setup();
        let db = backend
            .create_folder(&FsBackend::root_handle(), "DB")
            .await
            .unwrap();
        assert_eq!(db.as_str(), "DB");

        let file = backend
            .create_file(&db, "users.json", b"[]".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(file.as_str(), "DB/users.json");
        assert!(dir.path().join("DB").join("users.json").exists());
    }

    #[tokio::test]
    async fn rejects_traversal_in_handles() {
        let (_dir, backend) = setup();
        let result = backend.read_file(&Handle::new("DB/../../etc/passwd")).await;
        assert!(matches!(result, Err(RapportError::Validation(_))));
    }

    #[tokio::test]
    async fn update_requires_existing_file() {
        let (_dir, backend) = setup();
        let result = backend
            .update_file(&Handle::new("missing.json"), b"{}".to_vec(), "application/json")
            .await;
        assert!(matches!(result, Err(RapportError::NotFound(_))));
    }
}
