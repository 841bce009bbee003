//! jq post-processing of rendered manifests
//!
//! The query runs once per rendered document. Each value it yields becomes a
//! document of its own, so a query can drop (`empty`, `select`), rewrite or
//! split resources.

use argo_render_core::codec;
use jaq_core::compile::{self, Undefined};
use jaq_core::load::{self, Arena, File, Loader};
use jaq_core::{Compiler, Ctx, RcIter};
use jaq_json::Val;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Query file applied to a source's rendered output
pub const TRANSFORM_FILE: &str = "transform.jq";

/// Run `query` over every document of `rendered`
pub fn transform(rendered: &[u8], query: &str) -> Result<Vec<u8>> {
    let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = Arena::default();

    let modules = loader
        .load(&arena, File { code: query, path: () })
        .map_err(|errors| EngineError::QueryParse {
            message: describe_load(query, errors),
        })?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errors| EngineError::QueryCompile {
            message: describe_compile(query, errors),
        })?;

    let documents = codec::decode_documents(rendered)?;
    let inputs = RcIter::new(core::iter::empty());
    let mut out = Vec::with_capacity(rendered.len());

    for document in documents {
        // Empty templates leave separator-only or comment-only sections
        if document.is_null() {
            continue;
        }

        let input = Val::from(codec::normalize(document));
        for result in filter.run((Ctx::new([], &inputs), input)) {
            let value = result.map_err(|e| EngineError::QueryRun {
                message: e.to_string(),
            })?;
            out.extend(codec::encode_document(&serde_json::Value::from(value))?);
        }
    }

    debug!(bytes = out.len(), "Applied transform");
    Ok(out)
}

fn describe_load(query: &str, errors: load::Errors<&str, ()>) -> String {
    let mut messages = Vec::new();
    for (_, error) in errors {
        match error {
            load::Error::Io(errors) => messages.extend(
                errors
                    .into_iter()
                    .map(|(path, e)| format!("cannot load module {}: {}", path, e)),
            ),
            load::Error::Lex(errors) => messages.extend(
                errors
                    .into_iter()
                    .map(|(expected, found)| unexpected(query, expected.as_str(), found)),
            ),
            load::Error::Parse(errors) => messages.extend(
                errors
                    .into_iter()
                    .map(|(expected, found)| unexpected(query, expected.as_str(), found)),
            ),
        }
    }
    messages.join("; ")
}

fn describe_compile(query: &str, errors: compile::Errors<&str, ()>) -> String {
    errors
        .into_iter()
        .flat_map(|(_, errors)| errors)
        .map(|(found, undefined)| {
            let name = match undefined {
                Undefined::Filter(arity) => format!("filter '{}/{}'", found, arity),
                other => format!("{} '{}'", other.as_str(), found),
            };
            format!("undefined {}{}", name, position(query, found))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn unexpected(query: &str, expected: &str, found: &str) -> String {
    let token = match found.split_whitespace().next() {
        Some(token) => format!("'{}'", token),
        None => "end of input".to_string(),
    };
    format!("expected {}, found {}{}", expected, token, position(query, found))
}

/// " at line L, column C" for a token sliced from `query`, empty otherwise
fn position(query: &str, token: &str) -> String {
    let offset = (token.as_ptr() as usize)
        .checked_sub(query.as_ptr() as usize)
        .filter(|offset| *offset <= query.len() && query.is_char_boundary(*offset));

    let Some(offset) = offset else {
        return String::new();
    };

    let before = &query[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    format!(" at line {}, column {}", line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    const RENDERED: &str = "\
---
# Source: app/templates/empty.yaml
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  mode: fast
---
apiVersion: v1
kind: Service
metadata:
  name: web
";

    fn documents(out: &[u8]) -> Vec<Value> {
        codec::decode_documents(out).unwrap()
    }

    #[test]
    fn test_identity_keeps_every_resource() {
        let out = transform(RENDERED.as_bytes(), ".").unwrap();
        let docs = documents(&out);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["kind"], "ConfigMap");
        assert_eq!(docs[1]["kind"], "Service");
    }

    #[test]
    fn test_outputs_are_separator_prefixed() {
        let out = transform(b"kind: Service\n", ".kind").unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "---\nService\n");
    }

    #[test]
    fn test_select_drops_documents() {
        let out = transform(RENDERED.as_bytes(), r#"select(.kind != "Service")"#).unwrap();
        let docs = documents(&out);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["metadata"]["name"], "settings");
    }

    #[test]
    fn test_two_results_make_two_documents() {
        let out = transform(b"kind: Service\n", ". , (.kind = \"Endpoints\")").unwrap();
        let docs = documents(&out);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["kind"], "Service");
        assert_eq!(docs[1]["kind"], "Endpoints");
    }

    #[test]
    fn test_rewrite_labels() {
        let out = transform(
            RENDERED.as_bytes(),
            r#".metadata.labels["app.kubernetes.io/managed-by"] = "argo-render""#,
        )
        .unwrap();
        let docs = documents(&out);

        for doc in &docs {
            assert_eq!(
                doc["metadata"]["labels"]["app.kubernetes.io/managed-by"],
                "argo-render"
            );
        }
    }

    #[test]
    fn test_non_string_keys_are_usable() {
        let out = transform(b"ports:\n  80: http\n  true: yes\n", ".ports[\"80\"]").unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "---\nhttp\n");
    }

    #[test]
    fn test_parse_error() {
        let err = transform(RENDERED.as_bytes(), ".metadata |").unwrap_err();

        let EngineError::QueryParse { message } = err else {
            panic!("expected a parse error, got {:?}", err);
        };
        assert!(message.starts_with("expected "), "{}", message);
    }

    #[test]
    fn test_compile_error_names_filter_and_position() {
        let err = transform(RENDERED.as_bytes(), ".\n| no_such_filter(1)").unwrap_err();

        let EngineError::QueryCompile { message } = err else {
            panic!("expected a compile error, got {:?}", err);
        };
        assert_eq!(message, "undefined filter 'no_such_filter/1' at line 2, column 3");
    }

    #[test]
    fn test_unexpected_token_position() {
        let query = ".a\n  | .b +";
        let found = &query[query.len() - 1..];

        assert_eq!(
            unexpected(query, "term", found),
            "expected term, found '+' at line 2, column 8"
        );
    }

    #[test]
    fn test_unexpected_end_of_input() {
        let query = ".a |";
        let elsewhere = String::from("  ");

        assert_eq!(
            unexpected(query, "term", &query[query.len()..]),
            "expected term, found end of input at line 1, column 5"
        );
        assert_eq!(
            unexpected(query, "term", &elsewhere),
            "expected term, found end of input"
        );
    }

    #[test]
    fn test_runtime_error_is_fatal() {
        let err = transform(b"kind: Service\n", "error(\"rejected\")").unwrap_err();
        assert!(matches!(err, EngineError::QueryRun { .. }));
    }

    #[test]
    fn test_malformed_input_is_fatal() {
        let err = transform(b"kind: [unclosed\n", ".").unwrap_err();
        assert!(matches!(err, EngineError::Core(_)));
    }

    #[test]
    fn test_empty_input() {
        assert!(transform(b"", ".").unwrap().is_empty());
    }
}
