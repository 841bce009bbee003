//! Helm chart rendering
//!
//! A source is a chart when its `Chart.yaml` loads. Rendering registers
//! private dependency repositories when asked to, layers the values files,
//! fetches dependencies and runs `helm template` with the merged values on
//! stdin.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::rc::Rc;

use argo_render_core::{HelmChart, SecretGate, Source, SourceKind, resolve_values};
use tracing::{debug, info, warn};

use crate::dispatch::Renderer;
use crate::error::{EngineError, Result};
use crate::settings::HelmRepoSettings;
use crate::tools;

const HELM: &str = "helm";

/// A chart repository to register before fetching dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAdd<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub credentials: Option<(&'a str, &'a str)>,
    pub ca_file: Option<&'a Path>,
}

impl RepoAdd<'_> {
    /// Arguments for `helm`, starting at the subcommand
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "repo".into(),
            "add".into(),
            self.name.into(),
            self.url.into(),
            "--force-update".into(),
        ];

        if let Some((username, password)) = self.credentials {
            args.push("--username".into());
            args.push(username.into());
            args.push("--password".into());
            args.push(password.into());
        }

        if let Some(ca_file) = self.ca_file {
            args.push("--ca-file".into());
            args.push(ca_file.into());
        }

        args
    }
}

/// A `helm template` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRequest<'a> {
    pub namespace: &'a str,
    pub release: &'a str,
    pub chart: &'a Path,
}

impl TemplateRequest<'_> {
    /// Arguments for `helm`; values are read from stdin
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "template".into(),
            "-n".into(),
            self.namespace.into(),
            self.release.into(),
            self.chart.into(),
            "-f".into(),
            "-".into(),
        ]
    }
}

/// Operations the renderer needs from Helm
pub trait HelmClient {
    fn repo_add(&self, repo: &RepoAdd<'_>) -> Result<()>;

    fn dependency_update(&self, chart: &Path) -> Result<()>;

    /// Render the chart with `values` (YAML) and return the manifests
    fn template(&self, request: &TemplateRequest<'_>, values: &[u8]) -> Result<Vec<u8>>;
}

/// Runs the `helm` binary found on PATH
#[derive(Debug, Clone, Default)]
pub struct HelmBinary;

impl HelmBinary {
    fn command(&self, args: Vec<OsString>) -> Result<Command> {
        let mut cmd = Command::new(tools::locate(HELM)?);
        cmd.args(args);
        Ok(cmd)
    }
}

impl HelmClient for HelmBinary {
    fn repo_add(&self, repo: &RepoAdd<'_>) -> Result<()> {
        let output = tools::run(HELM, self.command(repo.args())?, None)?;
        if !output.status.success() {
            return Err(EngineError::Helm {
                command: "repo add".to_string(),
                output: tools::combined_output(&output),
            });
        }
        Ok(())
    }

    fn dependency_update(&self, chart: &Path) -> Result<()> {
        let args: Vec<OsString> = vec!["dependency".into(), "update".into(), chart.into()];
        let output = tools::run(HELM, self.command(args)?, None)?;
        if !output.status.success() {
            return Err(EngineError::Helm {
                command: "dependency update".to_string(),
                output: tools::combined_output(&output),
            });
        }
        Ok(())
    }

    fn template(&self, request: &TemplateRequest<'_>, values: &[u8]) -> Result<Vec<u8>> {
        let output = tools::run(HELM, self.command(request.args())?, Some(values))?;
        if !output.status.success() {
            return Err(EngineError::Helm {
                command: "template".to_string(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// Renders sources that hold a Helm chart
pub struct HelmRenderer {
    client: Box<dyn HelmClient>,
    gate: Rc<SecretGate>,
    repos: HelmRepoSettings,
    namespace: String,
    release: String,
}

impl HelmRenderer {
    pub fn new(
        client: Box<dyn HelmClient>,
        gate: Rc<SecretGate>,
        repos: HelmRepoSettings,
        namespace: impl Into<String>,
        release: impl Into<String>,
    ) -> Self {
        Self {
            client,
            gate,
            repos,
            namespace: namespace.into(),
            release: release.into(),
        }
    }

    fn register_repositories(&self, chart: &HelmChart) -> Result<()> {
        for dependency in chart.remote_dependencies() {
            let Some(url) = dependency.repository.as_deref() else {
                continue;
            };
            info!(repository = url, "Adding new Helm repo");

            self.client.repo_add(&RepoAdd {
                name: &dependency.name,
                url,
                credentials: self.repos.credentials(),
                ca_file: self.repos.ca_file.as_deref(),
            })?;
        }

        Ok(())
    }
}

impl Renderer for HelmRenderer {
    fn kind(&self) -> SourceKind {
        SourceKind::Helm
    }

    fn render(&self, source: &Source) -> Result<Option<Vec<u8>>> {
        let chart = match HelmChart::load(source.path()) {
            Ok(chart) => chart,
            Err(e) => {
                warn!(
                    source = %source,
                    error = %e,
                    "Unable to load Helm chart data, assuming this is not a Helm chart"
                );
                return Ok(None);
            }
        };

        debug!(source = %source, chart = %chart.name, version = %chart.version, "Loaded chart");

        if self.repos.private {
            self.register_repositories(&chart)?;
        }

        let values = resolve_values(source.path(), &self.gate)?;
        let values = values.to_yaml()?;

        self.client.dependency_update(source.path())?;

        let request = TemplateRequest {
            namespace: &self.namespace,
            release: &self.release,
            chart: source.path(),
        };
        let manifests = self.client.template(&request, values.as_bytes())?;

        Ok(Some(manifests))
    }
}
