use crate::error::{Result, ValidationError};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque reference to a folder or file inside a backend.
///
/// For `FsBackend` this is a `/`-separated path relative to the data
/// directory, for `DriveBackend` a file id, for `MemBackend` a node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Handle(String);

impl Handle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

/// A listed child of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub handle: Handle,
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Drive,
    Memory,
}

/// Abstract interface for raw storage I/O.
///
/// This trait handles the "how" of storage (disk, remote file host, memory),
/// while the record and document stores handle the "what" (collections,
/// detail documents, mirrors). Every method may suspend on disk or network.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// List children of `parent`. With `name` set, only entries with exactly
    /// that name (case-sensitive) are returned.
    ///
    /// A folder that does not exist yet lists as empty.
    async fn list_entries(&self, parent: &Handle, name: Option<&str>) -> Result<Vec<Entry>>;

    async fn create_folder(&self, parent: &Handle, name: &str) -> Result<Handle>;

    async fn read_file(&self, handle: &Handle) -> Result<Vec<u8>>;

    async fn create_file(
        &self,
        parent: &Handle,
        name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<Handle>;

    async fn update_file(&self, handle: &Handle, bytes: Vec<u8>, mime: &str) -> Result<()>;

    /// Reference to a stored asset suitable for a row's photo-slot field.
    fn asset_reference(&self, handle: &Handle, name: &str) -> String;

    /// First entry named `name` in `parent`, if any.
    async fn find_entry(&self, parent: &Handle, name: &str) -> Result<Option<Entry>> {
        Ok(self
            .list_entries(parent, Some(name))
            .await?
            .into_iter()
            .next())
    }

    /// Overwrite the file named `name` in `parent`, creating it if missing.
    async fn upsert_file(
        &self,
        parent: &Handle,
        name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<Handle> {
        match self.find_entry(parent, name).await? {
            Some(entry) if entry.kind == EntryKind::File => {
                debug!(%parent, name, "updating existing file");
                self.update_file(&entry.handle, bytes, mime).await?;
                Ok(entry.handle)
            }
            _ => {
                debug!(%parent, name, "creating file");
                self.create_file(parent, name, bytes, mime).await
            }
        }
    }
}

pub type SharedBackend = Arc<dyn StorageBackend>;

/// Entry names are single path components.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(ValidationError::InvalidName(name.to_string()).into());
    }
    Ok(())
}
