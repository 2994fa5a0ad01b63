//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::credential::{Argon2Verifier, CredentialError, Verifier};
use crate::core::input::LineInput;
use crate::core::state::{Session, Viewport};
use crate::ssh::session::{FrameSink, SessionError};

/// Argon2 with the smallest legal cost so tests stay fast.
pub fn test_verifier(secret: &str) -> Arc<dyn Verifier> {
    Arc::new(Argon2Verifier::with_params(secret, 1024, 1, 1).unwrap())
}

/// An 80x24 xterm session guarded by `secret`.
pub fn test_session(secret: &str) -> Session {
    session_with(test_verifier(secret))
}

pub fn session_with(verifier: Arc<dyn Verifier>) -> Session {
    Session::new(verifier, "xterm-256color", Viewport::default(), LineInput::default())
}

/// A verifier whose check always errors.
pub struct ErrorVerifier;

impl Verifier for ErrorVerifier {
    fn verify(&self, _attempt: &str) -> Result<bool, CredentialError> {
        Err(CredentialError::Verify("backend unavailable".to_string()))
    }
}

/// What a session wrote to its channel, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkRecord {
    Frame(Vec<u8>),
    ExitStatus(u32),
    Close,
}

/// In-memory `FrameSink` that records every call.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<SinkRecord>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().unwrap().clone()
    }

    /// All frame bytes concatenated and lossily decoded.
    pub fn output(&self) -> String {
        let bytes: Vec<u8> = self
            .records()
            .into_iter()
            .filter_map(|r| match r {
                SinkRecord::Frame(b) => Some(b),
                _ => None,
            })
            .flatten()
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn closed(&self) -> bool {
        self.records().contains(&SinkRecord::Close)
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn write(&mut self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.records.lock().unwrap().push(SinkRecord::Frame(bytes));
        Ok(())
    }

    async fn exit_status(&mut self, status: u32) -> Result<(), SessionError> {
        self.records.lock().unwrap().push(SinkRecord::ExitStatus(status));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.records.lock().unwrap().push(SinkRecord::Close);
        Ok(())
    }
}

/// Write a fresh Ed25519 host key (PKCS#8 PEM) to a unique temp file.
pub fn write_test_host_key() -> std::path::PathBuf {
    use argon2::password_hash::rand_core::OsRng;
    use russh::keys::{Algorithm, PrivateKey};

    let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
    let mut pem = Vec::new();
    russh::keys::encode_pkcs8_pem(&key, &mut pem).unwrap();
    let path = std::env::temp_dir().join(format!("termcv-key-{}", uuid::Uuid::new_v4()));
    std::fs::write(&path, pem).unwrap();
    path
}
