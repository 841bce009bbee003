//! Log output for a render run
//!
//! Standard output carries the rendered manifests, so logs always go to
//! stderr. The subscriber is scoped to a run instead of being installed
//! globally.

use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding an explicit filter directive
pub const LOG_ENV: &str = "ARGO_RENDER_LOG";

/// How much a run logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only
    #[default]
    Quiet,
    /// Progress through sources and renderers
    Verbose,
    /// Everything, including external tool invocations
    Debug,
}

impl Verbosity {
    pub fn from_flags(verbose: u8) -> Self {
        match verbose {
            0 => Self::Quiet,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }

    /// Filter for this level, unless `ARGO_RENDER_LOG` holds a valid directive
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }

    /// Subscriber writing to stderr at this level
    pub fn dispatch(&self) -> Dispatch {
        let subscriber = tracing_subscriber::registry().with(self.filter()).with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        );

        Dispatch::new(subscriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(0), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(4), Verbosity::Debug);
    }

    #[test]
    fn test_directives() {
        assert_eq!(Verbosity::Quiet.directive(), "error");
        assert_eq!(Verbosity::Verbose.directive(), "info");
        assert_eq!(Verbosity::Debug.directive(), "debug");
    }
}
