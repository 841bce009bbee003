//! argo-render - Argo CD config management plugin
//!
//! Renders every source below a directory and prints the manifests for
//! Argo CD to apply.

use std::io::Write;
use std::path::PathBuf;

use argo_render_engine::settings::{APP_NAME_ENV, APP_NAMESPACE_ENV};
use argo_render_engine::{Pipeline, Settings, Verbosity};
use clap::{ArgAction, Parser};

mod error;
mod exit_codes;

use error::Result;

#[derive(Parser)]
#[command(name = "argo-render")]
#[command(version)]
#[command(about = "Render Helm charts, Kustomize overlays and plain manifests for Argo CD", long_about = None)]
struct Cli {
    /// Directory to render (defaults to the current directory)
    path: Option<PathBuf>,

    /// Verbose logging on stderr (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Namespace passed to helm template
    #[arg(long, env = APP_NAMESPACE_ENV)]
    namespace: Option<String>,

    /// Release name passed to helm template
    #[arg(long, env = APP_NAME_ENV)]
    name: Option<String>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = run(cli) {
        let code = e.exit_code();
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = match cli.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let mut settings = Settings::from_env();
    if let Some(namespace) = cli.namespace {
        settings.namespace = namespace;
    }
    if let Some(name) = cli.name {
        settings.release = name;
    }

    let pipeline = Pipeline::builder()
        .settings(settings)
        .verbosity(Verbosity::from_flags(cli.verbose))
        .build();

    let output = pipeline.render(&root)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&output)?;
    stdout.flush()?;

    Ok(())
}
