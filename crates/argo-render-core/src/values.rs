//! Values handling with deep merge support
//!
//! A Helm source gets its values from `values.yaml` in the source root,
//! layered with every file of the `values/` subdirectory in file name order.
//! Each file goes through the [`SecretGate`] before it is decoded.

use std::path::Path;

use serde_yaml::{Mapping, Value as YamlValue};
use tracing::{debug, warn};

use crate::codec;
use crate::error::{CoreError, Result};
use crate::files::{list_files, read_file};
use crate::secrets::SecretGate;

/// Base values file in the source root
pub const VALUES_FILE: &str = "values.yaml";

/// Directory of override values files
pub const VALUES_DIR: &str = "values";

/// Values container with deep merge capability
#[derive(Debug, Clone, PartialEq)]
pub struct Values(pub YamlValue);

impl Default for Values {
    fn default() -> Self {
        Self::new()
    }
}

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(YamlValue::Mapping(Mapping::new()))
    }

    /// Decode the (already decrypted) content of a values file
    ///
    /// An empty document yields empty values; anything but a mapping is rejected.
    pub fn from_slice(path: &Path, data: &[u8]) -> Result<Self> {
        let document = codec::decode_first(data).map_err(|e| CoreError::ValuesDecode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_document(document).map_err(|message| CoreError::ValuesDecode {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_document(document: YamlValue) -> std::result::Result<Self, String> {
        match document {
            YamlValue::Null => Ok(Self::new()),
            map @ YamlValue::Mapping(_) => Ok(Self(map)),
            YamlValue::Tagged(tagged) => Self::from_document(tagged.value),
            _ => Err("values must be a mapping at the document root".to_string()),
        }
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Mappings: recursive merge
    /// - Sequences: overlay replaces base (not appended)
    /// - A mapping overridden by a non-mapping is replaced wholesale
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Serialize as a YAML document, e.g. to feed `helm template -f -`
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

/// Deep merge two YAML values
fn deep_merge(base: &mut YamlValue, overlay: &YamlValue) {
    match (base, overlay) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Resolve the layered values of a source directory
///
/// Missing `values.yaml` or `values/` only mean "no contribution at that
/// layer". Any other read or decode failure is returned.
pub fn resolve_values(source: &Path, gate: &SecretGate) -> Result<Values> {
    let mut values = Values::new();

    let base = source.join(VALUES_FILE);
    match read_file(&base) {
        Ok(data) => {
            values = load_values_file(&base, &data, gate)?;
            debug!(file = %base.display(), "Loaded default values");
        }
        Err(e) if e.is_not_found() => {
            warn!(
                file = %base.display(),
                "Unable to load default values file, checking for other values"
            );
        }
        Err(e) => return Err(e),
    }

    let overrides_dir = source.join(VALUES_DIR);
    let overrides = match list_files(&overrides_dir) {
        Ok(files) => files,
        Err(e) if e.is_not_found() => {
            warn!(
                dir = %overrides_dir.display(),
                "Unable to read the values directory, assuming no additional values files exist"
            );
            return Ok(values);
        }
        Err(e) => return Err(e),
    };

    for file in overrides {
        let data = read_file(&file)?;
        let layer = load_values_file(&file, &data, gate)?;
        values.merge(&layer);
        debug!(file = %file.display(), "Merged override values");
    }

    Ok(values)
}

fn load_values_file(path: &Path, data: &[u8], gate: &SecretGate) -> Result<Values> {
    let plain = gate.maybe_decrypt(data).map_err(|e| e.in_file(path))?;
    Values::from_slice(path, &plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::Decryptor;
    use std::fs;
    use tempfile::TempDir;

    /// Fails any decryption attempt
    struct NoDecrypt;

    impl Decryptor for NoDecrypt {
        fn decrypt(&self, _data: &[u8], _format: &str) -> Result<Vec<u8>> {
            Err(CoreError::Decrypt {
                message: "no keys available".to_string(),
            })
        }
    }

    /// Answers every decryption with the same plaintext
    struct Plaintext(&'static str);

    impl Decryptor for Plaintext {
        fn decrypt(&self, _data: &[u8], _format: &str) -> Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn parse(yaml: &str) -> Values {
        Values::from_slice(Path::new("values.yaml"), yaml.as_bytes()).unwrap()
    }

    /// Look up a dotted path
    fn get<'a>(values: &'a Values, path: &str) -> Option<&'a YamlValue> {
        path.split('.')
            .try_fold(&values.0, |value, key| value.as_mapping()?.get(key))
    }

    #[test]
    fn test_deep_merge() {
        let mut base = parse(
            r#"
image:
  repository: nginx
  tag: "1.0"
replicas: 1
"#,
        );

        let overlay = parse(
            r#"
image:
  tag: "2.0"
  pullPolicy: Always
replicas: 3
"#,
        );

        base.merge(&overlay);

        assert_eq!(get(&base, "image.repository").unwrap(), "nginx");
        assert_eq!(get(&base, "image.tag").unwrap(), "2.0");
        assert_eq!(get(&base, "image.pullPolicy").unwrap(), "Always");
        assert_eq!(get(&base, "replicas").unwrap(), 3);
    }

    #[test]
    fn test_merge_sequences_are_replaced() {
        let mut base = parse("hosts: [a, b, c]");
        base.merge(&parse("hosts: [d]"));

        assert_eq!(base, parse("hosts: [d]"));
    }

    #[test]
    fn test_merge_mapping_replaced_by_scalar() {
        let mut base = parse("ingress:\n  enabled: true\n  host: a\n");
        base.merge(&parse("ingress: false"));

        assert_eq!(get(&base, "ingress").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn test_merge_scalar_replaced_by_mapping() {
        let mut base = parse("ingress: false");
        base.merge(&parse("ingress:\n  enabled: true\n"));

        assert_eq!(get(&base, "ingress.enabled").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn test_merge_layers_last_wins() {
        let mut merged = Values::new();
        for layer in [
            "a: 1\nnested: {x: 1, y: 1}",
            "a: 2\nnested: {y: 2}",
            "a: 3\nnested: {z: 3}",
        ] {
            merged.merge(&parse(layer));
        }

        assert_eq!(get(&merged, "a").unwrap(), 3);
        assert_eq!(get(&merged, "nested.x").unwrap(), 1);
        assert_eq!(get(&merged, "nested.y").unwrap(), 2);
        assert_eq!(get(&merged, "nested.z").unwrap(), 3);
    }

    #[test]
    fn test_from_slice_rejects_non_mapping() {
        let path = Path::new("values.yaml");

        assert!(Values::from_slice(path, b"- a\n- b\n").is_err());
        assert_eq!(Values::from_slice(path, b"").unwrap(), Values::new());
    }

    #[test]
    fn test_empty_values_serialize_as_empty_mapping() {
        assert_eq!(Values::new().to_yaml().unwrap(), "{}\n");
    }

    #[test]
    fn test_resolve_override_order_is_lexicographic() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "values.yaml", "replicas: 1\nimage: {tag: base}\n");
        write(dir.path(), "values/b.yaml", "replicas: 3\n");
        write(dir.path(), "values/a.yaml", "replicas: 2\nimage: {pullPolicy: Always}\n");

        let values = resolve_values(dir.path(), &SecretGate::new(NoDecrypt)).unwrap();

        assert_eq!(get(&values, "replicas").unwrap(), 3);
        assert_eq!(get(&values, "image.tag").unwrap(), "base");
        assert_eq!(get(&values, "image.pullPolicy").unwrap(), "Always");
    }

    #[test]
    fn test_resolve_without_any_values() {
        let dir = TempDir::new().unwrap();

        let values = resolve_values(dir.path(), &SecretGate::new(NoDecrypt)).unwrap();

        assert_eq!(values, Values::new());
    }

    #[test]
    fn test_resolve_overrides_without_base() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "values/prod.yaml", "replicas: 5\n");

        let values = resolve_values(dir.path(), &SecretGate::new(NoDecrypt)).unwrap();

        assert_eq!(get(&values, "replicas").unwrap(), 5);
    }

    #[test]
    fn test_resolve_skips_nested_directories() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "values.yaml", "replicas: 1\n");
        write(dir.path(), "values/nested/ignored.yaml", "replicas: 99\n");

        let values = resolve_values(dir.path(), &SecretGate::new(NoDecrypt)).unwrap();

        assert_eq!(get(&values, "replicas").unwrap(), 1);
    }

    #[test]
    fn test_resolve_decrypts_encrypted_override() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "values.yaml", "password: changeme\nuser: admin\n");
        write(
            dir.path(),
            "values/secrets.yaml",
            "password: ENC[AES256_GCM,data:xyz]\nsops:\n  version: 3.8.1\n",
        );

        let gate = SecretGate::new(Plaintext("password: s3cret\n"));
        let values = resolve_values(dir.path(), &gate).unwrap();

        assert_eq!(get(&values, "password").unwrap(), "s3cret");
        assert_eq!(get(&values, "user").unwrap(), "admin");
        assert!(get(&values, "sops").is_none());
    }

    #[test]
    fn test_resolve_malformed_override_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "values/broken.yaml", "replicas: [1, 2\n");

        let err = resolve_values(dir.path(), &SecretGate::new(NoDecrypt)).unwrap_err();

        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_resolve_decryption_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "values.yaml", "sops: {version: 3.8.1}\n");

        let err = resolve_values(dir.path(), &SecretGate::new(NoDecrypt)).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("values.yaml"));
        assert!(message.contains("no keys available"));
    }
}
