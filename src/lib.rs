pub mod auth;
pub mod client;
pub mod config;
mod error;
pub mod pkcs;
pub mod prelude;
pub mod signer;
pub mod transport;

pub use auth::{AuthError, AuthSession, AuthState};
pub use client::{ClientError, DptClient, Entry};
pub use config::{ConfigError, DptConfig};
pub use error::DptError;
pub use pkcs::{prepare_key, to_pkcs8, to_pkcs8_str, KeyError, KeyFormat};
pub use signer::{NonceSigner, SignError};
pub use transport::{HttpTransport, Request, Response, Transport, TransportError};
