//! Whole-tree rendering

use std::path::Path;
use std::rc::Rc;

use argo_render_core::{Decryptor, SecretGate, SopsBinary, YAML_DELIMITER, scan};
use tracing::info;

use crate::dispatch::{Dispatcher, Renderer};
use crate::error::Result;
use crate::helm::{HelmBinary, HelmClient, HelmRenderer};
use crate::kustomize::{KustomizeBinary, KustomizeBuilder, KustomizeRenderer};
use crate::logging::Verbosity;
use crate::manifests::ManifestsRenderer;
use crate::settings::Settings;

/// Pipeline builder
pub struct PipelineBuilder {
    settings: Settings,
    verbosity: Verbosity,
    helm: Option<Box<dyn HelmClient>>,
    kustomize: Option<Box<dyn KustomizeBuilder>>,
    gate: Option<SecretGate>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            verbosity: Verbosity::default(),
            helm: None,
            kustomize: None,
            gate: None,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Replace the `helm` binary
    pub fn helm_client(mut self, client: impl HelmClient + 'static) -> Self {
        self.helm = Some(Box::new(client));
        self
    }

    /// Replace the `kustomize` binary
    pub fn kustomize_builder(mut self, builder: impl KustomizeBuilder + 'static) -> Self {
        self.kustomize = Some(Box::new(builder));
        self
    }

    /// Replace the `sops` binary
    pub fn decryptor(mut self, decryptor: impl Decryptor + 'static) -> Self {
        self.gate = Some(SecretGate::new(decryptor));
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        let Settings {
            namespace,
            release,
            helm: repos,
            sops_age_key_file,
        } = self.settings;

        let gate = Rc::new(self.gate.unwrap_or_else(|| {
            let sops = match sops_age_key_file {
                Some(key_file) => SopsBinary::new().with_age_key_file(key_file),
                None => SopsBinary::new(),
            };
            SecretGate::new(sops)
        }));

        let helm = self.helm.unwrap_or_else(|| Box::new(HelmBinary));
        let kustomize = self.kustomize.unwrap_or_else(|| Box::new(KustomizeBinary));

        let renderers: Vec<Box<dyn Renderer>> = vec![
            Box::new(HelmRenderer::new(
                helm,
                Rc::clone(&gate),
                repos,
                namespace,
                release,
            )),
            Box::new(KustomizeRenderer::new(kustomize)),
            Box::new(ManifestsRenderer::new(gate)),
        ];

        Pipeline {
            dispatcher: Dispatcher::new(renderers),
            verbosity: self.verbosity,
        }
    }
}

/// Renders every source below a root directory
pub struct Pipeline {
    dispatcher: Dispatcher,
    verbosity: Verbosity,
}

impl Pipeline {
    /// Create a builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Render all sources under `root`, in path order
    ///
    /// Nothing is returned unless every source rendered.
    pub fn render(&self, root: &Path) -> Result<Vec<u8>> {
        let dispatch = self.verbosity.dispatch();
        tracing::dispatcher::with_default(&dispatch, || self.render_tree(root))
    }

    fn render_tree(&self, root: &Path) -> Result<Vec<u8>> {
        let sources = scan(root)?;
        let mut output = Vec::new();

        for source in &sources {
            info!(source = %source, "Processing source");
            let rendered = self.dispatcher.render(source)?;
            append_stream(&mut output, &rendered.output);
        }

        info!(sources = sources.len(), bytes = output.len(), "Rendering complete");
        Ok(output)
    }
}

/// Append one source's output as whole documents
///
/// `kustomize build` does not open its output with a separator; without one
/// its first resource would continue the previous source's last document.
fn append_stream(output: &mut Vec<u8>, rendered: &[u8]) {
    if rendered.is_empty() {
        return;
    }
    if output.last().is_some_and(|&b| b != b'\n') {
        output.push(b'\n');
    }
    if !rendered.starts_with(YAML_DELIMITER.as_bytes()) {
        output.extend_from_slice(YAML_DELIMITER.as_bytes());
    }
    output.extend_from_slice(rendered);
}
