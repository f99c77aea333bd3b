use super::backend::{validate_name, BackendKind, Entry, EntryKind, Handle, StorageBackend};
use crate::error::{RapportError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone)]
struct Node {
    parent: String,
    name: String,
    content: Option<Vec<u8>>,
}

impl Node {
    fn kind(&self) -> EntryKind {
        if self.content.is_some() {
            EntryKind::File
        } else {
            EntryKind::Folder
        }
    }
}

/// In-memory storage backend for testing.
///
/// Models a remote file host: nodes have generated ids, names are not unique
/// within a folder, and nothing is persisted. A plain `Mutex` is enough since
/// no lock is held across an await point.
pub struct MemBackend {
    nodes: Mutex<BTreeMap<String, Node>>,
    next_id: AtomicUsize,
    writes: AtomicUsize,
    simulate_write_error: AtomicBool,
    failing_name: Mutex<Option<String>>,
}

impl Default for MemBackend {
    fn default() -> Self {
        Self {
            nodes: Mutex::new(BTreeMap::new()),
            next_id: AtomicUsize::new(1),
            writes: AtomicUsize::new(0),
            simulate_write_error: AtomicBool::new(false),
            failing_name: Mutex::new(None),
        }
    }
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_handle() -> Handle {
        Handle::new("root")
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Fail only writes to files called `name`, to test partial failures.
    pub fn fail_writes_to(&self, name: Option<&str>) {
        *self.failing_name.lock().unwrap_or_else(|e| e.into_inner()) = name.map(str::to_string);
    }

    /// Number of successful file creations and updates so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Test helper: raw bytes of the first file named `name` anywhere.
    pub fn file_named(&self, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .values()
            .find(|n| n.name == name && n.content.is_some())
            .and_then(|n| n.content.clone())
    }

    /// Test helper: names of all files directly inside the folder `folder`.
    pub fn file_names_in(&self, folder: &str) -> Vec<String> {
        let nodes = self.lock();
        let folder_ids: Vec<&String> = nodes
            .iter()
            .filter(|(_, n)| n.name == folder && n.content.is_none())
            .map(|(id, _)| id)
            .collect();
        let mut names: Vec<String> = nodes
            .values()
            .filter(|n| n.content.is_some() && folder_ids.contains(&&n.parent))
            .map(|n| n.name.clone())
            .collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Node>> {
        // A panicking test thread must not poison the other assertions.
        self.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_write(&self, name: &str) -> Result<()> {
        let failing = self.failing_name.lock().unwrap_or_else(|e| e.into_inner());
        if self.simulate_write_error.load(Ordering::SeqCst) || failing.as_deref() == Some(name) {
            return Err(RapportError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }

    fn insert(&self, parent: &Handle, name: &str, content: Option<Vec<u8>>) -> Handle {
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock().insert(
            id.clone(),
            Node {
                parent: parent.as_str().to_string(),
                name: name.to_string(),
                content,
            },
        );
        Handle::new(id)
    }
}

#[async_trait]
impl StorageBackend for MemBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn list_entries(&self, parent: &Handle, name: Option<&str>) -> Result<Vec<Entry>> {
        let nodes = self.lock();
        Ok(nodes
            .iter()
            .filter(|(_, n)| n.parent == parent.as_str())
            .filter(|(_, n)| name.map_or(true, |wanted| wanted == n.name))
            .map(|(id, n)| Entry {
                handle: Handle::new(id.clone()),
                name: n.name.clone(),
                kind: n.kind(),
            })
            .collect())
    }

    async fn create_folder(&self, parent: &Handle, name: &str) -> Result<Handle> {
        validate_name(name)?;
        self.check_write(name)?;
        Ok(self.insert(parent, name, None))
    }

    async fn read_file(&self, handle: &Handle) -> Result<Vec<u8>> {
        self.lock()
            .get(handle.as_str())
            .and_then(|n| n.content.clone())
            .ok_or_else(|| RapportError::NotFound(handle.to_string()))
    }

    async fn create_file(
        &self,
        parent: &Handle,
        name: &str,
        bytes: Vec<u8>,
        _mime: &str,
    ) -> Result<Handle> {
        validate_name(name)?;
        self.check_write(name)?;
        let handle = self.insert(parent, name, Some(bytes));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn update_file(&self, handle: &Handle, bytes: Vec<u8>, _mime: &str) -> Result<()> {
        let name = self
            .lock()
            .get(handle.as_str())
            .map(|n| n.name.clone())
            .unwrap_or_default();
        self.check_write(&name)?;
        let mut nodes = self.lock();
        match nodes.get_mut(handle.as_str()) {
            Some(node) if node.content.is_some() => {
                node.content = Some(bytes);
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(RapportError::NotFound(handle.to_string())),
        }
    }

    fn asset_reference(&self, handle: &Handle, _name: &str) -> String {
        format!("memory://{}", handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_list_read_update() {
        let backend = MemBackend::new();
        let root = MemBackend::root_handle();
        let folder = backend.create_folder(&root, "DB").await.unwrap();
        let file = backend
            .create_file(&folder, "users.json", b"[]".to_vec(), "application/json")
            .await
            .unwrap();

        let listed = backend.list_entries(&folder, Some("users.json")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, EntryKind::File);

        backend
            .update_file(&file, b"[{}]".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(backend.read_file(&file).await.unwrap(), b"[{}]");
        assert_eq!(backend.write_count(), 2);
    }

    #[tokio::test]
    async fn name_filter_is_case_sensitive() {
        let backend = MemBackend::new();
        let root = MemBackend::root_handle();
        backend.create_folder(&root, "DB").await.unwrap();
        assert!(backend.list_entries(&root, Some("db")).await.unwrap().is_empty());
        assert_eq!(backend.list_entries(&root, Some("DB")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn simulated_write_errors() {
        let backend = MemBackend::new();
        backend.set_simulate_write_error(true);
        let result = backend
            .create_file(&MemBackend::root_handle(), "x.json", vec![], "application/json")
            .await;
        assert!(matches!(result, Err(RapportError::Store(_))));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn fails_only_named_writes() {
        let backend = MemBackend::new();
        let root = MemBackend::root_handle();
        backend.fail_writes_to(Some("b.json"));
        assert!(backend
            .create_file(&root, "a.json", vec![], "application/json")
            .await
            .is_ok());
        assert!(backend
            .create_file(&root, "b.json", vec![], "application/json")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let backend = MemBackend::new();
        let root = MemBackend::root_handle();
        let first = backend
            .upsert_file(&root, "a.json", b"1".to_vec(), "application/json")
            .await
            .unwrap();
        let second = backend
            .upsert_file(&root, "a.json", b"2".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.list_entries(&root, None).await.unwrap().len(), 1);
        assert_eq!(backend.read_file(&first).await.unwrap(), b"2");
    }
}
