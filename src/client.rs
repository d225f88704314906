//! Document and folder operations on the device
//!
//! The device addresses objects by id; every path-based operation here first
//! resolves the path with `GET /resolve/entry/path/{path}`. Paths look like
//! `Document/Notes/todo.pdf`.
//!
//! # Example
//!
//! ```no_run
//! use dpt_client::{DptClient, DptConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DptConfig::from_env();
//! let client = DptClient::from_config(&config)?;
//! client.authenticate().await?;
//!
//! for entry in client.list_folder("Document").await? {
//!     println!("{} ({})", entry.entry_path, entry.entry_type);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{AuthError, AuthSession};
use crate::config::DptConfig;
use crate::error::DptError;
use crate::transport::{HttpTransport, Request, Response, Transport, TransportError};

/// Errors from device file operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Path \"{0}\" does not exist")]
    NotFound(String),

    #[error("Device returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Auth(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Transport(e) => e.suggestion(),
            Self::Auth(e) => e.suggestion(),
            Self::Status { status: 401, .. } => Some("The session is not authenticated; run the handshake first."),
            _ => None,
        }
    }

    fn from_response(response: &Response) -> Self {
        let message = response
            .device_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| response.text());
        Self::Status {
            status: response.status,
            message,
        }
    }
}

/// A document or folder on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: String,
    #[serde(default)]
    pub entry_name: String,
    #[serde(default)]
    pub entry_path: String,
    #[serde(default)]
    pub entry_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<String>,
}

impl Entry {
    pub fn is_folder(&self) -> bool {
        self.entry_type == "folder"
    }
}

#[derive(Debug, Deserialize)]
struct EntryList {
    #[serde(default)]
    entry_list: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct TemplateList {
    #[serde(default)]
    template_list: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct NewFolderRequest<'a> {
    folder_name: &'a str,
    parent_folder_id: &'a str,
}

#[derive(Debug, Serialize)]
struct NewDocumentRequest<'a> {
    file_name: &'a str,
    parent_folder_id: &'a str,
    document_source: &'a str,
}

#[derive(Debug, Deserialize)]
struct NewDocumentResponse {
    document_id: String,
}

#[derive(Debug, Serialize)]
struct OpenDocumentRequest<'a> {
    document_id: &'a str,
    page: u32,
}

#[derive(Debug, Serialize)]
struct CopyMoveRequest<'a> {
    parent_folder_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
}

/// Source id plus destination folder id and optional new name
#[derive(Debug, Clone, PartialEq, Eq)]
struct CopyMoveTarget {
    source_id: String,
    folder_id: String,
    new_name: Option<String>,
}

/// Split `Document/a/b.pdf` into (`Document/a`, `b.pdf`).
pub fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

/// Client for the device API
pub struct DptClient<T> {
    transport: T,
    client_id: String,
    prepared_key: String,
    auth_timeout: Option<Duration>,
}

impl DptClient<HttpTransport> {
    /// Build an HTTPS client from configuration, loading the client id and key.
    pub fn from_config(config: &DptConfig) -> Result<Self, DptError> {
        let transport = HttpTransport::new(
            config.base_url.clone(),
            config.timeout,
            config.accept_invalid_certs,
        )?;
        let client_id = config.load_client_id()?;
        let prepared_key = config.load_prepared_key()?;
        Ok(Self::new(transport, client_id, prepared_key).with_auth_timeout(config.timeout))
    }
}

impl<T: Transport> DptClient<T> {
    /// `prepared_key` is base64 PKCS#8 DER, see [`crate::pkcs::prepare_key`].
    pub fn new(transport: T, client_id: impl Into<String>, prepared_key: impl Into<String>) -> Self {
        Self {
            transport,
            client_id: client_id.into(),
            prepared_key: prepared_key.into(),
            auth_timeout: None,
        }
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = Some(timeout);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Run the nonce handshake; later requests ride on the transport's session.
    pub async fn authenticate(&self) -> Result<Response, ClientError> {
        let mut session = AuthSession::new(&self.transport);
        if let Some(timeout) = self.auth_timeout {
            session = session.with_timeout(timeout);
        }
        Ok(session
            .authenticate(&self.client_id, &self.prepared_key)
            .await?)
    }

    /// Send a request and fail on non-success status.
    async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let method = request.method;
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!("{} {} returned HTTP {}", method, path, response.status);
            return Err(ClientError::from_response(&response));
        }
        Ok(response)
    }

    fn decode<R: serde::de::DeserializeOwned>(response: &Response) -> Result<R, ClientError> {
        response
            .json()
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Look up the entry at `path`.
    pub async fn resolve_entry(&self, path: &str) -> Result<Entry, ClientError> {
        let endpoint = format!("/resolve/entry/path/{}", urlencoding::encode(path));
        let response = self.request(Request::get(endpoint)).await?;
        let entry: Entry = Self::decode(&response)?;
        debug!("Resolved {} to {}", path, entry.entry_id);
        Ok(entry)
    }

    /// Entry id for `path`, or `None` when the device does not know the path
    pub async fn object_id(&self, path: &str) -> Result<Option<String>, ClientError> {
        match self.resolve_entry(path).await {
            Ok(entry) => Ok(Some(entry.entry_id)),
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn require_id(&self, path: &str) -> Result<String, ClientError> {
        self.object_id(path)
            .await?
            .ok_or_else(|| ClientError::NotFound(path.to_string()))
    }

    /// All documents
    pub async fn list_documents(&self) -> Result<Vec<Entry>, ClientError> {
        let response = self.request(Request::get("/documents2")).await?;
        Ok(Self::decode::<EntryList>(&response)?.entry_list)
    }

    /// All documents and folders
    pub async fn list_all(&self) -> Result<Vec<Entry>, ClientError> {
        let response = self
            .request(Request::get("/documents2?entry_type=all"))
            .await?;
        Ok(Self::decode::<EntryList>(&response)?.entry_list)
    }

    /// Direct children of the folder at `path`
    pub async fn list_folder(&self, path: &str) -> Result<Vec<Entry>, ClientError> {
        let id = self.require_id(path).await?;
        let response = self
            .request(Request::get(format!("/folders/{}/entries", id)))
            .await?;
        Ok(Self::decode::<EntryList>(&response)?.entry_list)
    }

    /// Create folder `name` inside `parent_path`.
    pub async fn new_folder(&self, parent_path: &str, name: &str) -> Result<(), ClientError> {
        let parent_folder_id = self.require_id(parent_path).await?;
        let body = NewFolderRequest {
            folder_name: name,
            parent_folder_id: &parent_folder_id,
        };
        self.request(Request::post("/folders2").json(&body)?).await?;
        Ok(())
    }

    pub async fn delete_folder(&self, path: &str) -> Result<(), ClientError> {
        let id = self.require_id(path).await?;
        self.request(Request::delete(format!("/folders/{}", id)))
            .await?;
        Ok(())
    }

    pub async fn delete_document(&self, path: &str) -> Result<(), ClientError> {
        let id = self.require_id(path).await?;
        self.request(Request::delete(format!("/documents/{}", id)))
            .await?;
        Ok(())
    }

    /// Open a document on the device screen at `page` (1-based).
    pub async fn display_document(&self, path: &str, page: u32) -> Result<(), ClientError> {
        let id = self.require_id(path).await?;
        let body = OpenDocumentRequest {
            document_id: &id,
            page,
        };
        self.request(Request::put("/viewer/controls/open2").json(&body)?)
            .await?;
        Ok(())
    }

    pub async fn list_templates(&self) -> Result<Vec<serde_json::Value>, ClientError> {
        let response = self
            .request(Request::get("/viewer/configs/note_templates"))
            .await?;
        Ok(Self::decode::<TemplateList>(&response)?.template_list)
    }

    /// Create an empty document entry at `path` and return its id.
    pub async fn create_document(&self, path: &str) -> Result<String, ClientError> {
        let (parent_path, file_name) = split_path(path);
        let parent_folder_id = self.require_id(parent_path).await?;
        let body = NewDocumentRequest {
            file_name,
            parent_folder_id: &parent_folder_id,
            document_source: "",
        };
        let response = self.request(Request::post("/documents2").json(&body)?).await?;
        Ok(Self::decode::<NewDocumentResponse>(&response)?.document_id)
    }

    /// Upload `bytes` as a new document at `path`; returns the document id.
    pub async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, ClientError> {
        let document_id = self.create_document(path).await?;
        let (_, file_name) = split_path(path);
        let request = Request::put(format!("/documents/{}/file", document_id))
            .file("file", file_name, bytes);
        self.request(request).await?;
        Ok(document_id)
    }

    /// Raw file content of the document at `path`
    pub async fn download(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let id = self.require_id(path).await?;
        let response = self
            .request(Request::get(format!("/documents/{}/file", id)))
            .await?;
        Ok(response.body)
    }

    /// Copy the document at `old_path` to `new_path`.
    ///
    /// `new_path` may name an existing folder (the name is kept) or a new
    /// file path inside an existing folder (the copy is renamed).
    pub async fn copy_file(&self, old_path: &str, new_path: &str) -> Result<(), ClientError> {
        let target = self.copy_move_target(old_path, new_path).await?;
        let body = CopyMoveRequest {
            parent_folder_id: &target.folder_id,
            file_name: target.new_name.as_deref(),
        };
        let endpoint = format!("/documents/{}/copy", target.source_id);
        self.request(Request::post(endpoint).json(&body)?).await?;
        Ok(())
    }

    /// Move (and optionally rename) the document at `old_path`; see [`copy_file`](Self::copy_file).
    pub async fn move_file(&self, old_path: &str, new_path: &str) -> Result<(), ClientError> {
        let target = self.copy_move_target(old_path, new_path).await?;
        let body = CopyMoveRequest {
            parent_folder_id: &target.folder_id,
            file_name: target.new_name.as_deref(),
        };
        let endpoint = format!("/documents/{}", target.source_id);
        self.request(Request::put(endpoint).json(&body)?).await?;
        Ok(())
    }

    async fn copy_move_target(
        &self,
        old_path: &str,
        new_path: &str,
    ) -> Result<CopyMoveTarget, ClientError> {
        let source_id = self.require_id(old_path).await?;

        if let Some(folder_id) = self.object_id(new_path).await? {
            return Ok(CopyMoveTarget {
                source_id,
                folder_id,
                new_name: None,
            });
        }

        // new_path names the file itself, so its parent must exist
        let (parent_path, new_name) = split_path(new_path);
        let folder_id = self
            .object_id(parent_path)
            .await?
            .ok_or_else(|| ClientError::NotFound(new_path.to_string()))?;
        Ok(CopyMoveTarget {
            source_id,
            folder_id,
            new_name: Some(new_name.to_string()),
        })
    }
}
