//! Runtime settings read from the Argo CD plugin environment
//!
//! Argo CD exports application metadata as `ARGOCD_APP_*` and every
//! user-defined plugin variable with an `ARGOCD_ENV_` prefix.

use std::path::PathBuf;

pub const APP_NAMESPACE_ENV: &str = "ARGOCD_APP_NAMESPACE";
pub const APP_NAME_ENV: &str = "ARGOCD_APP_NAME";
pub const HELM_PRIVATE_ENV: &str = "ARGOCD_ENV_HELM_PRIVATE";
pub const HELM_USERNAME_ENV: &str = "ARGOCD_ENV_HELM_USERNAME";
pub const HELM_PASSWORD_ENV: &str = "ARGOCD_ENV_HELM_PASSWORD";
pub const HELM_CA_FILE_ENV: &str = "ARGOCD_ENV_HELM_CA_FILE";
pub const SOPS_AGE_KEY_FILE_ENV: &str = "ARGOCD_ENV_SOPS_AGE_KEY_FILE";

/// Misspelled credential variables accepted for existing deployments
pub const LEGACY_HELM_USERNAME_ENV: &str = "ARGCDO_ENV_HELM_USERNAME";
pub const LEGACY_HELM_PASSWORD_ENV: &str = "ARGCDO_ENV_HELM_PASSWORD";

/// Plugin settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Namespace passed to `helm template -n`
    pub namespace: String,

    /// Release name passed to `helm template`
    pub release: String,

    /// Private chart repository access
    pub helm: HelmRepoSettings,

    /// Age key file handed to sops
    pub sops_age_key_file: Option<PathBuf>,
}

/// Private chart repository registration
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HelmRepoSettings {
    /// Register dependency repositories before templating
    pub private: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ca_file: Option<PathBuf>,
}

impl HelmRepoSettings {
    /// Username and password, only when both are set and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for HelmRepoSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelmRepoSettings")
            .field("private", &self.private)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ca_file", &self.ca_file)
            .finish()
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            namespace: lookup(APP_NAMESPACE_ENV).unwrap_or_default(),
            release: lookup(APP_NAME_ENV).unwrap_or_default(),
            helm: HelmRepoSettings {
                private: lookup(HELM_PRIVATE_ENV).is_some(),
                username: non_empty(HELM_USERNAME_ENV)
                    .or_else(|| non_empty(LEGACY_HELM_USERNAME_ENV)),
                password: non_empty(HELM_PASSWORD_ENV)
                    .or_else(|| non_empty(LEGACY_HELM_PASSWORD_ENV)),
                ca_file: non_empty(HELM_CA_FILE_ENV).map(PathBuf::from),
            },
            sops_age_key_file: non_empty(SOPS_AGE_KEY_FILE_ENV).map(PathBuf::from),
        }
    }
}
