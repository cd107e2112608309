//! Typed view over a package's declared `extra` metadata.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// The `extra` keys the engine acts on. Every other key lands in `other`
/// untouched and is never consulted.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PackageExtra {
    /// `[source, target]` pairs; absent means the package is not deployed
    #[serde(default)]
    pub map: Option<Vec<MapEntry>>,
    /// Strategy requested by the package itself
    #[serde(default, rename = "deploy-strategy")]
    pub deploy_strategy: Option<String>,
    #[serde(default, deserialize_with = "deserialize_chmod_rules")]
    pub chmod: Vec<ChmodRule>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl PackageExtra {
    /// Parse an `extra` object. A malformed document yields the default
    /// (no mapping data, so the package is skipped) instead of an error.
    pub fn from_value(package: &str, value: &Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        match serde_json::from_value(value.clone()) {
            Ok(extra) => extra,
            Err(e) => {
                log::warn!("Ignoring malformed extra metadata of {}: {}", package, e);
                Self::default()
            }
        }
    }

    /// Whether the package declared any mapping data.
    pub fn has_mapping(&self) -> bool {
        self.map.is_some()
    }
}

/// One `[source, target]` mapping pair.
///
/// `source` is relative to the package install path and `target` relative to
/// the package's deployment directory; an empty string or `.` stands for the
/// directory itself.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "(String, String)")]
pub struct MapEntry {
    pub source: String,
    pub target: String,
}

impl From<(String, String)> for MapEntry {
    fn from((source, target): (String, String)) -> Self {
        Self { source, target }
    }
}

impl MapEntry {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Mapping that deploys the whole package onto its target directory.
    pub fn whole_package() -> Self {
        Self::new("", "")
    }
}

/// A declared `{ "path": ..., "mask": ... }` permission rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChmodRule {
    pub path: Option<String>,
    pub mask: Option<String>,
}

impl ChmodRule {
    pub fn new(path: impl Into<String>, mask: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            mask: Some(mask.into()),
        }
    }

    /// The mask as a mode, read as octal digits (`"0644"` -> `0o644`).
    pub fn mode(&self) -> Option<u32> {
        let mask = self.mask.as_deref()?.trim();
        if mask.is_empty() {
            return None;
        }
        u32::from_str_radix(mask, 8).ok().filter(|m| *m <= 0o7777)
    }

    fn from_value(value: &Value) -> Self {
        Self {
            path: value.get("path").and_then(scalar_to_string),
            mask: value.get("mask").and_then(scalar_to_string),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `chmod` must be a list; anything else is treated as no rules at all.
fn deserialize_chmod_rules<'de, D>(deserializer: D) -> Result<Vec<ChmodRule>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items.iter().map(ChmodRule::from_value).collect())
}
