//! Google Drive v3 backend.
//!
//! Only the REST calls the record store needs are implemented. Obtaining the
//! bearer token (the OAuth refresh exchange) is left to the caller; the token
//! comes in through configuration.

use super::backend::{validate_name, BackendKind, Entry, EntryKind, Handle, StorageBackend};
use crate::error::{RapportError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

pub struct DriveBackend {
    client: Client,
    api_base: String,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
}

impl DriveFile {
    fn into_entry(self) -> Entry {
        let kind = if self.mime_type == FOLDER_MIME {
            EntryKind::Folder
        } else {
            EntryKind::File
        };
        Entry {
            handle: Handle::new(self.id),
            name: self.name,
            kind,
        }
    }
}

impl DriveBackend {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.api_base)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(RapportError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

/// Quote a value for a Drive search query.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn list_query(parent: &Handle, name: Option<&str>) -> String {
    let mut q = format!(
        "'{}' in parents and trashed=false",
        escape_query_value(parent.as_str())
    );
    if let Some(name) = name {
        q.push_str(&format!(" and name='{}'", escape_query_value(name)));
    }
    q
}

/// Pull the folder id out of configuration: either the bare id or a share
/// URL of the form `.../folders/<id>?...`.
pub fn parse_folder_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let candidate = match raw.split_once("/folders/") {
        Some((_, rest)) => rest.split(['?', '/', '#']).next().unwrap_or(""),
        None if raw.contains("id=") => raw
            .split("id=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap_or(""),
        None => raw,
    };
    let valid = !candidate.is_empty()
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    valid.then(|| candidate.to_string())
}

/// Body of a `multipart/related` upload: JSON metadata part, then media part.
pub fn multipart_body(boundary: &str, metadata: &serde_json::Value, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--").as_bytes());
    body
}

#[async_trait]
impl StorageBackend for DriveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Drive
    }

    async fn list_entries(&self, parent: &Handle, name: Option<&str>) -> Result<Vec<Entry>> {
        let q = list_query(parent, name);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            debug!(%q, "drive files.list");
            let mut request = self
                .client
                .get(self.files_url())
                .bearer_auth(&self.token)
                .query(&[
                    ("q", q.as_str()),
                    ("fields", "nextPageToken,files(id,name,mimeType)"),
                    ("spaces", "drive"),
                    ("pageSize", "1000"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: FileList = Self::check(request.send().await?).await?.json().await?;
            entries.extend(page.files.into_iter().map(DriveFile::into_entry));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(entries)
    }

    async fn create_folder(&self, parent: &Handle, name: &str) -> Result<Handle> {
        validate_name(name)?;
        debug!(%parent, name, "drive create folder");
        let response = self
            .client
            .post(self.files_url())
            .bearer_auth(&self.token)
            .query(&[("fields", "id,name,mimeType")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME,
                "parents": [parent.as_str()],
            }))
            .send()
            .await?;
        let created: DriveFile = Self::check(response).await?.json().await?;
        Ok(Handle::new(created.id))
    }

    async fn read_file(&self, handle: &Handle) -> Result<Vec<u8>> {
        debug!(%handle, "drive download");
        let response = self
            .client
            .get(format!("{}/{}", self.files_url(), handle))
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RapportError::NotFound(handle.to_string()));
        }
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn create_file(
        &self,
        parent: &Handle,
        name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<Handle> {
        validate_name(name)?;
        let boundary = format!("rapport-{}", Uuid::new_v4().simple());
        let metadata = json!({ "name": name, "parents": [parent.as_str()] });
        let body = multipart_body(&boundary, &metadata, mime, &bytes);

        debug!(%parent, name, size = bytes.len(), "drive multipart upload");
        let response = self
            .client
            .post(self.upload_url())
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("fields", "id,name,mimeType")])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let created: DriveFile = Self::check(response).await?.json().await?;
        Ok(Handle::new(created.id))
    }

    async fn update_file(&self, handle: &Handle, bytes: Vec<u8>, mime: &str) -> Result<()> {
        debug!(%handle, size = bytes.len(), "drive media update");
        let response = self
            .client
            .patch(format!("{}/{}", self.upload_url(), handle))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "media")])
            .header(CONTENT_TYPE, mime)
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    fn asset_reference(&self, handle: &Handle, _name: &str) -> String {
        format!("https://drive.google.com/uc?id={}", handle)
    }
}
