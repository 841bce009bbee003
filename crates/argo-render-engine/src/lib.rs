//! argo-render engine - Rendering pipeline for the Argo CD plugin
//!
//! This crate turns discovered sources into Kubernetes manifests:
//! - Format detection (Helm, then Kustomize, then plain manifests)
//! - Helm and Kustomize rendering through their binaries
//! - jq transforms of rendered output
//! - Settings from the Argo CD plugin environment

pub mod dispatch;
pub mod error;
pub mod helm;
pub mod kustomize;
pub mod logging;
pub mod manifests;
pub mod pipeline;
pub mod settings;
pub mod tools;
pub mod transform;

pub use dispatch::{Dispatcher, Renderer, Rendered};
pub use error::{EngineError, Result};
pub use helm::{HelmBinary, HelmClient, HelmRenderer};
pub use kustomize::{KustomizeBinary, KustomizeBuilder, KustomizeRenderer};
pub use logging::Verbosity;
pub use manifests::{ManifestsRenderer, read_manifests};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use settings::Settings;
pub use transform::transform;
