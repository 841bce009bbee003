//! Helm chart metadata
//!
//! Only `Chart.yaml` is read. A directory counts as a chart when that file
//! loads and passes the same checks Helm applies before templating.

use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value as YamlValue;

use crate::codec;
use crate::error::{CoreError, Result};
use crate::files;

/// Chart metadata file name
pub const CHART_FILE: &str = "Chart.yaml";

/// API version assumed when `apiVersion` is missing
pub const DEFAULT_API_VERSION: &str = "v1";

/// Helm Chart.yaml structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChart {
    /// API version (v1 or v2)
    #[serde(default)]
    pub api_version: String,

    /// Chart name
    #[serde(default)]
    pub name: String,

    /// Chart version (SemVer)
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,

    /// Chart description
    #[serde(default)]
    pub description: Option<String>,

    /// Chart type (application or library)
    #[serde(default, rename = "type")]
    pub chart_type: Option<String>,

    /// App version
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub app_version: Option<String>,

    /// Chart dependencies
    #[serde(default)]
    pub dependencies: Vec<HelmDependency>,
}

/// Helm dependency
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmDependency {
    /// Dependency name
    #[serde(default)]
    pub name: String,

    /// Version constraint
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub version: Option<String>,

    /// Repository URL
    #[serde(default)]
    pub repository: Option<String>,

    /// Alias name
    #[serde(default)]
    pub alias: Option<String>,
}

impl HelmDependency {
    /// Whether the dependency is fetched from a remote chart repository
    ///
    /// Local (`file://`) and OCI dependencies cannot be registered with
    /// `helm repo add`.
    pub fn has_http_repository(&self) -> bool {
        self.repository
            .as_deref()
            .is_some_and(|r| r.starts_with("http://") || r.starts_with("https://"))
    }
}

impl HelmChart {
    /// Load and validate `Chart.yaml` from a chart directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CHART_FILE);
        let data = files::read_file(&path).map_err(|e| {
            if e.is_not_found() {
                CoreError::ChartNotFound {
                    path: dir.to_path_buf(),
                }
            } else {
                e
            }
        })?;

        Self::from_slice(&data)
    }

    /// Parse and validate Chart.yaml content
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let document = codec::decode_first(data)?;
        if document.is_null() {
            return Err(CoreError::InvalidChart {
                message: "Chart.yaml is empty".to_string(),
            });
        }

        let mut chart: HelmChart =
            serde_yaml::from_value(document).map_err(|e| CoreError::InvalidChart {
                message: e.to_string(),
            })?;

        if chart.api_version.is_empty() {
            chart.api_version = DEFAULT_API_VERSION.to_string();
        }

        chart.validate()?;
        Ok(chart)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(invalid("name is required"));
        }
        if self.version.is_empty() {
            return Err(invalid("version is required"));
        }
        if parse_version(&self.version).is_none() {
            return Err(invalid(format!(
                "version '{}' is not a valid SemVer",
                self.version
            )));
        }

        match self.chart_type.as_deref() {
            None | Some("") | Some("application") | Some("library") => {}
            Some(other) => return Err(invalid(format!("chart type '{}' is not valid", other))),
        }

        for dependency in &self.dependencies {
            if dependency.name.is_empty() {
                return Err(invalid("dependencies must have a name"));
            }
        }

        Ok(())
    }

    /// Dependencies that can be registered as chart repositories
    pub fn remote_dependencies(&self) -> impl Iterator<Item = &HelmDependency> {
        self.dependencies.iter().filter(|d| d.has_http_repository())
    }
}

/// Accept numbers and booleans where Helm expects a string (`version: 1.0`)
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match YamlValue::deserialize(deserializer)? {
        YamlValue::Null => Ok(String::new()),
        YamlValue::String(s) => Ok(s),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        _ => Err(D::Error::custom("expected a string")),
    }
}

fn optional_scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = scalar_string(deserializer)?;
    Ok((!value.is_empty()).then_some(value))
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::InvalidChart {
        message: message.into(),
    }
}

/// Parse a chart version, accepting a `v` prefix and missing minor/patch parts
fn parse_version(version: &str) -> Option<semver::Version> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v);
    }

    // "1" or "1.2", optionally followed by pre-release or build metadata
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    let padded = match parts.len() {
        1 => format!("{}.0.0{}", core, rest),
        2 => format!("{}.0{}", core, rest),
        _ => return None,
    };

    semver::Version::parse(&padded).ok()
}
