//! YAML document codec
//!
//! Decoding and encoding of single and multi-document YAML streams, plus the
//! normalization step that turns a decoded YAML value into a JSON value the
//! query engine can consume.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use serde_yaml::value::{Tag, TaggedValue};

use crate::error::Result;

/// Separator written in front of every emitted document
pub const YAML_DELIMITER: &str = "---\n";

/// Decode every document of a YAML stream
///
/// `<<` merge keys are resolved in every document.
pub fn decode_documents(data: &[u8]) -> Result<Vec<YamlValue>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_slice(data) {
        documents.push(decode(document)?);
    }
    Ok(documents)
}

/// Decode only the first document of a YAML stream
///
/// Later documents are not parsed. An empty stream decodes to `Null`.
pub fn decode_first(data: &[u8]) -> Result<YamlValue> {
    match serde_yaml::Deserializer::from_slice(data).next() {
        Some(document) => decode(document),
        None => Ok(YamlValue::Null),
    }
}

fn decode(document: serde_yaml::Deserializer<'_>) -> Result<YamlValue> {
    let mut value = YamlValue::deserialize(document)?;
    value.apply_merge()?;
    Ok(value)
}

/// Encode a value as one separator-prefixed YAML document
pub fn encode_document<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let yaml = serde_yaml::to_string(value)?;
    let mut out = Vec::with_capacity(YAML_DELIMITER.len() + yaml.len());
    out.extend_from_slice(YAML_DELIMITER.as_bytes());
    out.extend_from_slice(yaml.as_bytes());
    Ok(out)
}

/// Convert a decoded YAML value into a JSON value
///
/// - Mapping keys that are not strings are stringified
/// - `!!timestamp` scalars become RFC 3339 strings with second precision
/// - Other tags are dropped, keeping the tagged value
/// - Non-finite floats become their YAML spelling (`.inf`, `.nan`)
pub fn normalize(value: YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => normalize_number(&n),
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(seq) => JsonValue::Array(seq.into_iter().map(normalize).collect()),
        YamlValue::Mapping(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                object.insert(key_to_string(key), normalize(value));
            }
            JsonValue::Object(object)
        }
        YamlValue::Tagged(tagged) => normalize_tagged(*tagged),
    }
}

fn normalize_number(n: &serde_yaml::Number) -> JsonValue {
    if let Some(i) = n.as_i64() {
        JsonValue::from(i)
    } else if let Some(u) = n.as_u64() {
        JsonValue::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(n.to_string()))
    }
}

fn normalize_tagged(tagged: TaggedValue) -> JsonValue {
    if is_timestamp_tag(&tagged.tag) {
        if let YamlValue::String(raw) = &tagged.value {
            if let Some(canonical) = canonical_timestamp(raw) {
                return JsonValue::String(canonical);
            }
        }
    }
    normalize(tagged.value)
}

fn is_timestamp_tag(tag: &Tag) -> bool {
    let name = tag.to_string();
    name.trim_start_matches('!') == "timestamp" || name.ends_with(":timestamp")
}

fn key_to_string(key: YamlValue) -> String {
    match key {
        YamlValue::String(s) => s,
        YamlValue::Null => "null".to_string(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Tagged(tagged) => key_to_string(tagged.value),
        complex @ (YamlValue::Sequence(_) | YamlValue::Mapping(_)) => {
            normalize(complex).to_string()
        }
    }
}

/// Format a YAML timestamp as RFC 3339 (`Z` for UTC, seconds precision)
pub fn canonical_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
}
