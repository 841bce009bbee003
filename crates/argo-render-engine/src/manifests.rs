//! Plain manifest directories
//!
//! Every file directly inside the source is a manifest, whatever its
//! extension. Subdirectories are not read.

use std::path::Path;
use std::rc::Rc;

use argo_render_core::files::{list_files, read_file};
use argo_render_core::{SecretGate, Source, SourceKind, YAML_DELIMITER};
use tracing::{debug, warn};

use crate::dispatch::Renderer;
use crate::error::Result;
use crate::transform::TRANSFORM_FILE;

/// Concatenate the manifests of `dir`, decrypting the encrypted ones
pub fn read_manifests(dir: &Path, gate: &SecretGate) -> Result<Vec<u8>> {
    let mut manifests = Vec::new();

    for path in list_files(dir)? {
        if path.file_name().is_some_and(|name| name == TRANSFORM_FILE) {
            continue;
        }

        let manifest = read_file(&path)?;
        if manifest.is_empty() {
            warn!(file = %path.display(), "Skipping empty manifest file");
            continue;
        }

        debug!(file = %path.display(), "Adding manifest");
        let manifest = gate
            .maybe_decrypt(&manifest)
            .map_err(|e| e.in_file(&path))?;

        manifests.extend_from_slice(YAML_DELIMITER.as_bytes());
        manifests.extend_from_slice(&manifest);
        manifests.push(b'\n');
    }

    Ok(manifests)
}

/// Renders any directory as plain manifests
pub struct ManifestsRenderer {
    gate: Rc<SecretGate>,
}

impl ManifestsRenderer {
    pub fn new(gate: Rc<SecretGate>) -> Self {
        Self { gate }
    }
}

impl Renderer for ManifestsRenderer {
    fn kind(&self) -> SourceKind {
        SourceKind::PlainManifests
    }

    fn render(&self, source: &Source) -> Result<Option<Vec<u8>>> {
        read_manifests(source.path(), &self.gate).map(Some)
    }
}
