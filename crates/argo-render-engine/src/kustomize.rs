//! Kustomize overlay rendering
//!
//! Files are read by `kustomize build` itself, so encrypted resources are not
//! decrypted first: the build reorders mapping fields, which breaks the SOPS
//! MAC check. Use a secret generator plugin for encrypted data in overlays.

use std::path::Path;
use std::process::Command;

use argo_render_core::{Source, SourceKind};
use tracing::{info, warn};

use crate::dispatch::Renderer;
use crate::error::{EngineError, Result};
use crate::tools;

const KUSTOMIZE: &str = "kustomize";

/// File that marks a Kustomize directory
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Builds a Kustomize directory into manifests
pub trait KustomizeBuilder {
    fn build(&self, dir: &Path) -> Result<Vec<u8>>;
}

/// Runs the `kustomize` binary found on PATH
///
/// Resources are emitted in legacy order (namespaces and CRDs first), the way
/// `kubectl apply -k` orders them.
#[derive(Debug, Clone, Default)]
pub struct KustomizeBinary;

impl KustomizeBuilder for KustomizeBinary {
    fn build(&self, dir: &Path) -> Result<Vec<u8>> {
        let mut cmd = Command::new(tools::locate(KUSTOMIZE)?);
        cmd.arg("build").arg("--reorder").arg("legacy").arg(dir);

        let output = tools::run(KUSTOMIZE, cmd, None)?;
        if !output.status.success() {
            return Err(EngineError::Kustomize {
                path: dir.to_path_buf(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// Renders sources holding a `kustomization.yaml`
pub struct KustomizeRenderer {
    builder: Box<dyn KustomizeBuilder>,
}

impl KustomizeRenderer {
    pub fn new(builder: Box<dyn KustomizeBuilder>) -> Self {
        Self { builder }
    }
}

impl Renderer for KustomizeRenderer {
    fn kind(&self) -> SourceKind {
        SourceKind::Kustomize
    }

    fn render(&self, source: &Source) -> Result<Option<Vec<u8>>> {
        if !source.join(KUSTOMIZATION_FILE).exists() {
            warn!(
                source = %source,
                "Unable to load kustomization.yaml, assuming this is not a Kustomize dir"
            );
            return Ok(None);
        }

        info!(source = %source, "Running kustomize build");
        self.builder.build(source.path()).map(Some)
    }
}
