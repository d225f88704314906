//! Prelude
//!
//! Commonly used types in one import.
//!
//! # Example
//!
//! ```no_run
//! use dpt_client::prelude::*;
//!
//! # async fn example() -> Result<(), DptError> {
//! let client = DptClient::from_config(&DptConfig::from_env())?;
//! client.authenticate().await?;
//! let docs: Vec<Entry> = client.list_documents().await?;
//! # Ok(())
//! # }
//! ```

pub use crate::auth::{AuthError, AuthSession, AuthState};
pub use crate::client::{ClientError, DptClient, Entry};
pub use crate::config::{ConfigError, DptConfig};
pub use crate::error::DptError;
pub use crate::pkcs::{prepare_key, KeyError, KeyFormat};
pub use crate::signer::NonceSigner;
pub use crate::transport::{HttpTransport, Request, Response, Transport, TransportError};
