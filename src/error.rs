//! Unified error type for the public API
//!
//! Modules keep their own error enums for precise handling; [`DptError`]
//! collects them for callers that only need one type.
//!
//! # Example
//!
//! ```no_run
//! use dpt_client::DptError;
//!
//! fn run() -> Result<(), DptError> {
//!     let key = dpt_client::pkcs::prepare_key("MIIEowIBAAKCAQEA...")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all operations
///
/// # Error Categories
///
/// - **Key**: key text format or DER structure errors
/// - **Sign**: key import errors in the signing primitive
/// - **Transport**: connectivity, certificate and timeout errors
/// - **Auth**: nonce handshake failures
/// - **Client**: document and folder operation failures
/// - **Config**: missing or unreadable settings and credential files
/// - **LocalFile**: local files read for upload or written by download
#[derive(Debug, Error)]
pub enum DptError {
    #[error("Key error: {0}")]
    Key(#[from] crate::pkcs::KeyError),

    #[error("Signing error: {0}")]
    Sign(#[from] crate::signer::SignError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("{0}")]
    Auth(#[from] crate::auth::AuthError),

    #[error("{0}")]
    Client(#[from] crate::client::ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Failed to access local file {path}: {source}")]
    LocalFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DptError {
    /// Wrap an I/O error on a local document file
    pub fn local_file(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::LocalFile {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the error is potentially retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Auth(e) => e.is_retryable(),
            Self::Client(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Transport(e) => e.suggestion(),
            Self::Auth(e) => e.suggestion(),
            Self::Client(e) => e.suggestion(),
            Self::Key(_) | Self::Sign(_) => {
                Some("Provide the RSA private key as PEM (RSA or PKCS#8) or bare base64.")
            }
            Self::Config(_) | Self::LocalFile { .. } => None,
        }
    }

    /// Returns true if the key could not be prepared or imported
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::Key(_) | Self::Sign(_))
            || matches!(self, Self::Config(crate::config::ConfigError::Key { .. }))
    }

    /// Returns true if the device certificate was not trusted
    pub fn is_certificate_error(&self) -> bool {
        use crate::transport::TransportError::Certificate;
        match self {
            Self::Transport(e) => matches!(e, Certificate(_)),
            Self::Auth(e) => matches!(e.transport_error(), Some(Certificate(_))),
            Self::Client(crate::client::ClientError::Transport(e)) => matches!(e, Certificate(_)),
            Self::Client(crate::client::ClientError::Auth(e)) => {
                matches!(e.transport_error(), Some(Certificate(_)))
            }
            _ => false,
        }
    }

    /// Returns true if the device answered but refused the credentials
    pub fn is_auth_rejected(&self) -> bool {
        match self {
            Self::Auth(e) | Self::Client(crate::client::ClientError::Auth(e)) => e.is_rejected(),
            _ => false,
        }
    }
}
