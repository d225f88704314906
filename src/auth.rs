//! Nonce challenge-response authentication
//!
//! # Protocol Flow
//!
//! 1. `GET /auth/nonce/{client_id}` returns `{"nonce": "..."}`
//! 2. Sign the nonce's UTF-8 bytes with RSASSA-PKCS1-v1_5 / SHA-256
//! 3. `PUT /auth` with `{"client_id": ..., "nonce_signed": <base64 signature>}`
//!
//! The session itself (a cookie) lives in the transport. Each call to
//! [`AuthSession::authenticate`] fetches a fresh nonce; nothing is retried.
//!
//! # Example
//!
//! ```no_run
//! use dpt_client::{auth::AuthSession, pkcs::prepare_key, transport::HttpTransport};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new("https://digitalpaper.local:8443", Duration::from_secs(30), true)?;
//! let key = prepare_key(&std::fs::read_to_string("privatekey.dat")?)?;
//!
//! let mut session = AuthSession::new(&transport).with_timeout(Duration::from_secs(10));
//! session.authenticate("my-client-id", &key).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::signer::{NonceSigner, SignError};
use crate::transport::{Request, Response, Transport, TransportError};

/// Authentication errors
///
/// Every variant ends the current attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Could not authenticate. {0}")]
    Key(#[from] SignError),

    #[error("Could not authenticate. GET nonce failed (HTTP {status})")]
    NonceRequestFailed { status: u16 },

    #[error("Could not authenticate. GET nonce failed: {0}")]
    NonceTransport(#[source] TransportError),

    #[error("Could not authenticate. GET nonce failed: invalid nonce response: {0}")]
    InvalidNonceResponse(String),

    #[error("Could not authenticate. PUT auth failed. (HTTP {status}: {message})")]
    AuthSubmitFailed { status: u16, message: String },

    #[error("Could not authenticate. PUT auth failed: {0}")]
    SubmitTransport(#[source] TransportError),

    #[error("Could not authenticate. Handshake did not finish within {0:?}")]
    TimedOut(Duration),
}

impl AuthError {
    /// The transport failure behind this error, if any
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::NonceTransport(e) | Self::SubmitTransport(e) => Some(e),
            _ => None,
        }
    }

    /// True when the device answered but refused the credentials
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            Self::NonceRequestFailed { .. } | Self::AuthSubmitFailed { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TimedOut(_) => true,
            _ => self.transport_error().is_some_and(TransportError::is_retryable),
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Key(_) => Some("Check that the key file holds the device's RSA private key."),
            Self::NonceRequestFailed { .. } => {
                Some("Check the client id; the device does not know it.")
            }
            Self::AuthSubmitFailed { .. } => {
                Some("The device rejected the signature; check that the key belongs to this client id.")
            }
            _ => self.transport_error().and_then(TransportError::suggestion),
        }
    }
}

/// `GET /auth/nonce/{client_id}` response
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// `PUT /auth` request body
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthRequest {
    pub client_id: String,
    pub nonce_signed: String,
}

/// Handshake progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    NonceRequested,
    NonceSigned,
    Authenticated,
    /// Terminal failure with the reason reported to the caller
    Failed(String),
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Failed(_))
    }
}

/// Nonce handshake orchestrator
///
/// Dropping the future returned by [`authenticate`](Self::authenticate)
/// cancels the attempt; no state outside the transport is left behind.
pub struct AuthSession<'a, T> {
    transport: &'a T,
    state: AuthState,
    timeout: Option<Duration>,
}

impl<'a, T: Transport> AuthSession<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            state: AuthState::Idle,
            timeout: None,
        }
    }

    /// Bound the whole handshake (both round-trips and signing).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Run the handshake for `client_id` with a base64 PKCS#8 key.
    ///
    /// On success the `PUT /auth` response is returned; the transport now
    /// holds the session. The key is imported before any request is sent, so
    /// a bad key never consumes a nonce.
    pub async fn authenticate(
        &mut self,
        client_id: &str,
        prepared_key: &str,
    ) -> Result<Response, AuthError> {
        self.state = AuthState::Idle;

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.handshake(client_id, prepared_key))
                .await
                .unwrap_or(Err(AuthError::TimedOut(limit))),
            None => self.handshake(client_id, prepared_key).await,
        };

        match &result {
            Ok(_) => {
                self.state = AuthState::Authenticated;
                info!("Authenticated as client {}", client_id);
            }
            Err(e) => {
                self.state = AuthState::Failed(e.to_string());
                warn!("{}", e);
            }
        }
        result
    }

    async fn handshake(&mut self, client_id: &str, prepared_key: &str) -> Result<Response, AuthError> {
        let signer = NonceSigner::from_pkcs8_base64(prepared_key)?;

        self.state = AuthState::NonceRequested;
        let response = self
            .transport
            .send(Request::get(format!("/auth/nonce/{}", client_id)))
            .await
            .map_err(AuthError::NonceTransport)?;
        if !response.is_success() {
            return Err(AuthError::NonceRequestFailed {
                status: response.status,
            });
        }
        let NonceResponse { nonce } = response
            .json()
            .map_err(|e| AuthError::InvalidNonceResponse(e.to_string()))?;

        let nonce_signed = signer.sign_nonce(&nonce);
        self.state = AuthState::NonceSigned;
        debug!("Signed nonce for client {}", client_id);

        let body = AuthRequest {
            client_id: client_id.to_string(),
            nonce_signed,
        };
        let request = Request::put("/auth")
            .json(&body)
            .map_err(AuthError::SubmitTransport)?;
        let response = self
            .transport
            .send(request)
            .await
            .map_err(AuthError::SubmitTransport)?;
        if !response.is_success() {
            let message = response
                .device_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| response.text());
            return Err(AuthError::AuthSubmitFailed {
                status: response.status,
                message,
            });
        }

        Ok(response)
    }
}
