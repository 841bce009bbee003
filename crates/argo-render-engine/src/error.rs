//! Engine error types

use std::path::PathBuf;

use argo_render_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(code(argo_render::input))]
    Core(#[from] CoreError),

    #[error("{tool} is not available: {message}")]
    #[diagnostic(
        code(argo_render::tool_missing),
        help("install the binary and make sure it is on PATH")
    )]
    ToolNotFound { tool: &'static str, message: String },

    #[error("Unable to run {tool}: {message}")]
    #[diagnostic(code(argo_render::process))]
    Process { tool: &'static str, message: String },

    #[error("Helm {command} command failed: {output}")]
    #[diagnostic(code(argo_render::helm))]
    Helm { command: String, output: String },

    #[error("Kustomize build failed for {}: {output}", path.display())]
    #[diagnostic(code(argo_render::kustomize))]
    Kustomize { path: PathBuf, output: String },

    #[error("Unable to parse jq query string: {message}")]
    #[diagnostic(code(argo_render::jq::parse), help("check the syntax of transform.jq"))]
    QueryParse { message: String },

    #[error("Unable to compile jq query string: {message}")]
    #[diagnostic(
        code(argo_render::jq::compile),
        help("the query refers to a filter or variable that does not exist")
    )]
    QueryCompile { message: String },

    #[error("Error occurred during jq query run: {message}")]
    #[diagnostic(code(argo_render::jq::run))]
    QueryRun { message: String },

    #[error("No renderer claimed source {}", path.display())]
    #[diagnostic(code(argo_render::unclaimed))]
    Unclaimed { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helm_error_keeps_output() {
        let err = EngineError::Helm {
            command: "template".to_string(),
            output: "Error: chart requires kubeVersion: >=1.30".to_string(),
        };

        insta::assert_snapshot!(err.to_string(), @"Helm template command failed: Error: chart requires kubeVersion: >=1.30");
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: EngineError = CoreError::Decrypt {
            message: "no key".to_string(),
        }
        .into();

        assert_eq!(err.to_string(), "Unable to decrypt data with SOPS: no key");
    }

    #[test]
    fn test_diagnostic_codes() {
        let err = EngineError::QueryRun {
            message: "cannot index".to_string(),
        };
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("argo_render::jq::run"));
    }
}
