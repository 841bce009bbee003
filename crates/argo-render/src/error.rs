//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use argo_render_core::CoreError;
use argo_render_engine::EngineError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Rendering failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] EngineError),

    /// IO error outside of rendering (working directory, stdout)
    #[error("IO error: {message}")]
    #[diagnostic(code(argo_render::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Render(EngineError::Core(e)) => core_exit_code(e),
            CliError::Render(EngineError::Unclaimed { .. }) => exit_codes::ERROR,
            CliError::Render(_) => exit_codes::RENDER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }
}

fn core_exit_code(err: &CoreError) -> i32 {
    match err {
        CoreError::InFile { source, .. } => core_exit_code(source),
        CoreError::ReadFile { .. } | CoreError::ReadDir { .. } => exit_codes::IO_ERROR,
        CoreError::Decrypt { .. } | CoreError::DecryptorUnavailable { .. } => {
            exit_codes::RENDER_ERROR
        }
        CoreError::YamlParse(_)
        | CoreError::ValuesDecode { .. }
        | CoreError::SecretParse { .. }
        | CoreError::ChartNotFound { .. }
        | CoreError::InvalidChart { .. } => exit_codes::INPUT_ERROR,
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
