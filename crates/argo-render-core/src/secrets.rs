//! SOPS secret gate
//!
//! Documents carrying a top-level `sops` key are encrypted. The gate decodes
//! just enough of a document to look for that key and, when present, hands the
//! untouched input bytes to a [`Decryptor`]. Everything else passes through
//! unchanged.
//!
//! The gate never re-encodes input: SOPS verifies a MAC over the document as
//! written, so only the original bytes can be decrypted.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde_yaml::Value as YamlValue;
use tracing::debug;

use crate::codec;
use crate::error::{CoreError, Result};

/// Top-level key that marks a SOPS-encrypted document
pub const SOPS_MARKER_KEY: &str = "sops";

/// Format hint handed to the decryption engine
pub const YAML_FORMAT: &str = "yaml";

/// Decryption engine
///
/// Key material is located by the engine itself (environment, key files);
/// callers only provide the encrypted bytes and their format.
pub trait Decryptor {
    fn decrypt(&self, data: &[u8], format: &str) -> Result<Vec<u8>>;
}

/// Decrypts by piping documents through the `sops` binary
#[derive(Debug, Clone, Default)]
pub struct SopsBinary {
    age_key_file: Option<PathBuf>,
}

impl SopsBinary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Age key file exported to the `sops` process as `SOPS_AGE_KEY_FILE`
    pub fn with_age_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.age_key_file = Some(path.into());
        self
    }
}

impl Decryptor for SopsBinary {
    fn decrypt(&self, data: &[u8], format: &str) -> Result<Vec<u8>> {
        let sops_path = which::which("sops").map_err(|e| CoreError::DecryptorUnavailable {
            message: format!("sops binary not found in PATH: {}", e),
        })?;

        debug!("Using sops binary at {}", sops_path.display());

        let mut cmd = Command::new(&sops_path);
        cmd.arg("--decrypt")
            .arg("--input-type")
            .arg(format)
            .arg("--output-type")
            .arg(format)
            .arg("/dev/stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(key_file) = &self.age_key_file {
            cmd.env("SOPS_AGE_KEY_FILE", key_file);
        }

        let mut child = cmd.spawn().map_err(|e| CoreError::DecryptorUnavailable {
            message: format!("failed to spawn {}: {}", sops_path.display(), e),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data).map_err(|e| CoreError::Decrypt {
                message: format!("failed to write encrypted content to sops stdin: {}", e),
            })?;
        }

        let output = child.wait_with_output().map_err(|e| CoreError::Decrypt {
            message: format!("failed to wait for sops: {}", e),
        })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(CoreError::Decrypt {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Decrypts documents that carry the SOPS marker, passes the rest through
pub struct SecretGate {
    decryptor: Box<dyn Decryptor>,
}

impl SecretGate {
    pub fn new(decryptor: impl Decryptor + 'static) -> Self {
        Self {
            decryptor: Box::new(decryptor),
        }
    }

    /// Return decrypted bytes for encrypted documents, the input otherwise
    pub fn maybe_decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if !is_encrypted(data)? {
            return Ok(data.to_vec());
        }

        debug!("Document carries a top-level `{}` key, decrypting", SOPS_MARKER_KEY);
        self.decryptor.decrypt(data, YAML_FORMAT)
    }
}

impl std::fmt::Debug for SecretGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretGate").finish_non_exhaustive()
    }
}

/// Check the first document of `data` for the SOPS marker key
pub fn is_encrypted(data: &[u8]) -> Result<bool> {
    let document = codec::decode_first(data).map_err(|e| CoreError::SecretParse {
        message: e.to_string(),
    })?;
    has_marker(&document)
}

fn has_marker(document: &YamlValue) -> Result<bool> {
    match document {
        YamlValue::Mapping(map) => Ok(map.contains_key(SOPS_MARKER_KEY)),
        YamlValue::Null => Ok(false),
        YamlValue::Tagged(tagged) => has_marker(&tagged.value),
        YamlValue::Sequence(_) => Err(CoreError::SecretParse {
            message: "expected a mapping at the document root, found a sequence".to_string(),
        }),
        _ => Err(CoreError::SecretParse {
            message: "expected a mapping at the document root, found a scalar".to_string(),
        }),
    }
}
