//! Format detection
//!
//! Renderers are asked in order whether they recognise a source. The first one
//! that renders it wins; later renderers are not consulted.

use argo_render_core::files::read_file;
use argo_render_core::{Source, SourceKind};
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::transform::{TRANSFORM_FILE, transform};

/// One source format
pub trait Renderer {
    fn kind(&self) -> SourceKind;

    /// Render the source, or `Ok(None)` when it is not in this format
    ///
    /// Declining must not have side effects.
    fn render(&self, source: &Source) -> Result<Option<Vec<u8>>>;
}

/// Output of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub kind: SourceKind,
    pub output: Vec<u8>,
}

/// Tries renderers in order and applies the source's transform
pub struct Dispatcher {
    renderers: Vec<Box<dyn Renderer>>,
}

impl Dispatcher {
    pub fn new(renderers: Vec<Box<dyn Renderer>>) -> Self {
        Self { renderers }
    }

    pub fn render(&self, source: &Source) -> Result<Rendered> {
        for renderer in &self.renderers {
            let Some(output) = renderer.render(source)? else {
                continue;
            };

            let kind = renderer.kind();
            info!(source = %source, renderer = %kind, "Rendered source");

            let output = apply_transform(source, output)?;
            return Ok(Rendered { kind, output });
        }

        Err(EngineError::Unclaimed {
            path: source.path().to_path_buf(),
        })
    }
}

fn apply_transform(source: &Source, output: Vec<u8>) -> Result<Vec<u8>> {
    let path = source.join(TRANSFORM_FILE);

    let query = match read_file(&path) {
        Ok(query) => query,
        Err(e) if e.is_not_found() => {
            warn!(source = %source, "Unable to load JQ transform file, skipping transformation");
            return Ok(output);
        }
        Err(e) => return Err(e.into()),
    };

    info!(source = %source, file = %path.display(), "Applying transform");
    let query = String::from_utf8_lossy(&query);
    transform(&output, &query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Claims when the source holds `marker`, answering with `output`
    struct Fake {
        kind: SourceKind,
        marker: &'static str,
        output: &'static str,
        asked: Rc<RefCell<Vec<SourceKind>>>,
    }

    impl Renderer for Fake {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn render(&self, source: &Source) -> Result<Option<Vec<u8>>> {
            self.asked.borrow_mut().push(self.kind);
            if source.join(self.marker).exists() {
                Ok(Some(self.output.as_bytes().to_vec()))
            } else {
                Ok(None)
            }
        }
    }

    fn dispatcher() -> (Dispatcher, Rc<RefCell<Vec<SourceKind>>>) {
        let asked = Rc::new(RefCell::new(Vec::new()));
        let fake = |kind: SourceKind, marker: &'static str, output: &'static str| -> Box<dyn Renderer> {
            Box::new(Fake {
                kind,
                marker,
                output,
                asked: Rc::clone(&asked),
            })
        };

        let dispatcher = Dispatcher::new(vec![
            fake(SourceKind::Helm, "Chart.yaml", "---\nkind: FromHelm\n"),
            fake(
                SourceKind::Kustomize,
                "kustomization.yaml",
                "---\nkind: FromKustomize\n",
            ),
            fake(SourceKind::PlainManifests, ".", "---\nkind: FromFiles\n"),
        ]);
        (dispatcher, asked)
    }

    #[test]
    fn test_first_claim_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Chart.yaml"), "").unwrap();
        fs::write(dir.path().join("kustomization.yaml"), "").unwrap();
        let (dispatcher, asked) = dispatcher();

        let rendered = dispatcher.render(&Source::new(dir.path())).unwrap();

        assert_eq!(rendered.kind, SourceKind::Helm);
        assert_eq!(*asked.borrow(), vec![SourceKind::Helm]);
    }

    #[test]
    fn test_falls_through_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("deployment.yaml"), "").unwrap();
        let (dispatcher, asked) = dispatcher();

        let rendered = dispatcher.render(&Source::new(dir.path())).unwrap();

        assert_eq!(rendered.kind, SourceKind::PlainManifests);
        assert_eq!(rendered.output, b"---\nkind: FromFiles\n".to_vec());
        assert_eq!(
            *asked.borrow(),
            vec![
                SourceKind::Helm,
                SourceKind::Kustomize,
                SourceKind::PlainManifests
            ]
        );
    }

    #[test]
    fn test_transform_applies_to_any_renderer() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("kustomization.yaml"), "").unwrap();
        fs::write(dir.path().join(TRANSFORM_FILE), ".metadata.name = \"patched\"").unwrap();
        let (dispatcher, _) = dispatcher();

        let rendered = dispatcher.render(&Source::new(dir.path())).unwrap();

        assert_eq!(rendered.kind, SourceKind::Kustomize);
        assert_eq!(
            String::from_utf8(rendered.output).unwrap(),
            "---\nkind: FromKustomize\nmetadata:\n  name: patched\n"
        );
    }

    #[test]
    fn test_nothing_claims() {
        let dir = TempDir::new().unwrap();
        let dispatcher = Dispatcher::new(Vec::new());

        let err = dispatcher.render(&Source::new(dir.path())).unwrap_err();

        assert!(matches!(err, EngineError::Unclaimed { .. }));
    }
}
