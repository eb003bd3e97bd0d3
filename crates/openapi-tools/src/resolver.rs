//! In-document `$ref` resolution.
//!
//! Only local references (`#/...`) are resolved. External references (other files, URLs) are
//! kept as-is. Resolution is relative to the single root document, so a resolved subtree never
//! needs to know where it came from.

use crate::error::{OpenApiToolsError, Result};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Return a copy of `root` with every local `$ref` replaced by its target.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::CircularReference`] for reference cycles and
/// [`OpenApiToolsError::UnresolvedReference`] for pointers that do not exist.
pub fn dereference(root: &Value) -> Result<Value> {
    RefResolver::new(root).resolve(root)
}

pub struct RefResolver<'a> {
    root: &'a Value,
    /// Pointers whose resolution is in progress.
    resolving: HashSet<String>,
    /// Fully resolved targets, reused for repeated references.
    resolved: HashMap<String, Value>,
}

impl<'a> RefResolver<'a> {
    #[must_use]
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            resolving: HashSet::new(),
            resolved: HashMap::new(),
        }
    }

    /// Dereference `value` against the root document.
    ///
    /// # Errors
    ///
    /// See [`dereference`].
    pub fn resolve(&mut self, value: &Value) -> Result<Value> {
        match value {
            Value::Object(map) => self.resolve_object(map),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve_object(&mut self, map: &Map<String, Value>) -> Result<Value> {
        let Some(Value::String(reference)) = map.get("$ref") else {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), self.resolve(v)?);
            }
            return Ok(Value::Object(out));
        };

        let target = self.resolve_ref(reference)?;
        if map.len() == 1 {
            return Ok(target);
        }

        // Sibling keys are overlaid on the resolved target and win on conflict.
        let Value::Object(mut merged) = target else {
            return Ok(target);
        };
        for (k, v) in map {
            if k == "$ref" {
                continue;
            }
            merged.insert(k.clone(), self.resolve(v)?);
        }
        Ok(Value::Object(merged))
    }

    fn resolve_ref(&mut self, reference: &str) -> Result<Value> {
        if !reference.starts_with("#/") {
            let mut external = Map::new();
            external.insert("$ref".to_string(), Value::String(reference.to_string()));
            return Ok(Value::Object(external));
        }

        if let Some(done) = self.resolved.get(reference) {
            return Ok(done.clone());
        }
        if !self.resolving.insert(reference.to_string()) {
            return Err(OpenApiToolsError::CircularReference {
                reference: reference.to_string(),
            });
        }

        // `Value::pointer` applies `~1` / `~0` unescaping per segment.
        let target = self
            .root
            .pointer(&reference[1..])
            .ok_or_else(|| OpenApiToolsError::UnresolvedReference(reference.to_string()));
        let result = target.and_then(|t| self.resolve(t));

        self.resolving.remove(reference);
        let value = result?;
        self.resolved.insert(reference.to_string(), value.clone());
        Ok(value)
    }
}
