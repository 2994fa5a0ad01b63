//! Host key loading. A missing or unreadable key is fatal; no key is ever
//! generated on the fly.

use std::fmt;
use std::path::{Path, PathBuf};

use russh::keys::PrivateKey;

#[derive(Debug)]
pub enum HostKeyError {
    Missing(PathBuf),
    Read(PathBuf, std::io::Error),
    Decode(PathBuf, String),
}

impl fmt::Display for HostKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKeyError::Missing(path) => write!(
                f,
                "host key not found at {} (create one with: ssh-keygen -t ed25519 -f {} -N '')",
                path.display(),
                path.display()
            ),
            HostKeyError::Read(path, e) => write!(f, "reading host key {}: {}", path.display(), e),
            HostKeyError::Decode(path, e) => {
                write!(f, "decoding host key {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for HostKeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HostKeyError::Read(_, e) => Some(e),
            _ => None,
        }
    }
}

pub fn load_host_key(path: &Path) -> Result<PrivateKey, HostKeyError> {
    let key_text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HostKeyError::Missing(path.to_path_buf()),
        _ => HostKeyError::Read(path.to_path_buf(), e),
    })?;
    russh::keys::decode_secret_key(&key_text, None)
        .map_err(|e| HostKeyError::Decode(path.to_path_buf(), e.to_string()))
}
