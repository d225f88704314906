//! Common test utilities for dpt-client integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dpt_client::transport::{Method, Request, Response, Transport, TransportError};
use rand::rngs::OsRng;
use rsa::{
    pkcs1::EncodeRsaPrivateKey,
    pkcs1v15::{Signature, VerifyingKey},
    pkcs8::{EncodePrivateKey, LineEnding},
    signature::Verifier,
    RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;

pub const CLIENT_ID: &str = "3f9a1c2e-0b7d-4e55-9c61-a8d2f0e4b712";

/// One RSA key shared by every test in a binary; generation is slow.
pub fn test_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).expect("RSA key generation"))
}

pub fn pkcs1_der(key: &RsaPrivateKey) -> Vec<u8> {
    key.to_pkcs1_der().unwrap().as_bytes().to_vec()
}

pub fn pkcs1_pem(key: &RsaPrivateKey) -> String {
    key.to_pkcs1_pem(LineEnding::LF).unwrap().to_string()
}

pub fn pkcs8_der(key: &RsaPrivateKey) -> Vec<u8> {
    key.to_pkcs8_der().unwrap().as_bytes().to_vec()
}

pub fn pkcs8_pem(key: &RsaPrivateKey) -> String {
    key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
}

/// Base64 PKCS#8 key as produced by `prepare_key`
pub fn prepared_test_key() -> String {
    BASE64.encode(pkcs8_der(test_key()))
}

/// Check a base64 signature over `message` against `key`.
pub fn verify_signature(key: &RsaPrivateKey, message: &[u8], signature_b64: &str) -> bool {
    let Ok(bytes) = BASE64.decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(RsaPublicKey::from(key))
        .verify(message, &signature)
        .is_ok()
}

/// In-memory transport with scripted responses
///
/// Unscripted requests get a 404 with a device error body.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), Result<Response, String>>>,
    calls: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.routes.lock().unwrap().insert(
            (method, path.to_string()),
            Ok(Response::new(status, body.as_bytes().to_vec())),
        );
        self
    }

    pub fn on_json(self, method: Method, path: &str, body: serde_json::Value) -> Self {
        self.on(method, path, 200, &body.to_string())
    }

    /// Fail with a transport-level connection error
    pub fn unreachable(self, method: Method, path: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Err("connection refused".to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn last_call(&self, method: Method, path: &str) -> Option<Request> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let key = (request.method, request.path.clone());
        self.calls.lock().unwrap().push(request);
        match self.routes.lock().unwrap().get(&key) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(reason)) => Err(TransportError::Connect(reason.clone())),
            None => Ok(Response::new(
                404,
                r#"{"error_code": 40401, "message": "Resource not found."}"#,
            )),
        }
    }
}
