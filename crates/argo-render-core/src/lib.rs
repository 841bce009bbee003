//! argo-render core - Source discovery and input handling for argo-render
//!
//! This crate provides the building blocks the rendering engine works with:
//! - `source`: Source discovery (directories holding YAML files)
//! - `values`: Helm values layering with deep merge
//! - `secrets`: SOPS detection and decryption gate
//! - `chart`: Helm chart metadata
//! - `codec`: Multi-document YAML decoding, encoding and normalization

pub mod chart;
pub mod codec;
pub mod error;
pub mod files;
pub mod secrets;
pub mod source;
pub mod values;

pub use chart::{CHART_FILE, HelmChart, HelmDependency};
pub use codec::YAML_DELIMITER;
pub use error::{CoreError, Result};
pub use secrets::{Decryptor, SecretGate, SopsBinary};
pub use source::{Source, SourceKind, scan};
pub use values::{Values, resolve_values};
