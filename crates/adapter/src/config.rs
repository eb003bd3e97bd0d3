//! Config file loading for the adapter.
//!
//! The file is an [`ApiServerConfig`] document (YAML or JSON) with an optional top-level `name`.
//! String values may reference environment variables as `${VAR}`; references are expanded after
//! parsing, so secrets never need YAML quoting.

use crate::error::{AdapterError, Result};
use regex::Regex;
use restmcp_openapi_tools::ApiServerConfig;
use serde_yaml::Value;
use std::path::Path;
use std::sync::LazyLock;

static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap_or_else(|e| unreachable!("{e}"))
});

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Source name for logs. Defaults to `apiName`, then the file stem.
    pub name: String,
    pub api: ApiServerConfig,
}

/// Read and expand a config file. A relative `spec` path resolves against the file's directory.
///
/// # Errors
///
/// Returns [`AdapterError::Io`] when the file cannot be read and [`AdapterError::Config`] for
/// invalid contents or unset variables.
pub fn load_config(path: &Path) -> Result<AdapterConfig> {
    let content = std::fs::read_to_string(path)?;
    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("api")
        .to_string();
    let mut config = parse_config(&content, &fallback, |var| std::env::var(var).ok())?;

    if let Some(dir) = path.parent()
        && is_plain_path(&config.api.spec)
        && Path::new(&config.api.spec).is_relative()
    {
        let candidate = dir.join(&config.api.spec);
        if candidate.is_file() {
            config.api.spec = candidate.to_string_lossy().into_owned();
        }
    }
    Ok(config)
}

/// Parse config text, resolving `${VAR}` through `lookup`.
///
/// # Errors
///
/// Returns [`AdapterError::Config`] for malformed documents and unset variables.
pub fn parse_config(
    content: &str,
    fallback_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AdapterConfig> {
    let mut doc: Value = serde_yaml::from_str(content)?;
    let Value::Mapping(map) = &mut doc else {
        return Err(AdapterError::Config(
            "config must be a mapping with at least a 'spec' key".to_string(),
        ));
    };
    let name = map
        .remove("name")
        .and_then(|v| v.as_str().map(str::to_string));

    expand_env(&mut doc, &lookup)?;
    let api: ApiServerConfig = serde_yaml::from_value(doc)
        .map_err(|e| AdapterError::Config(format!("invalid tool source config: {e}")))?;

    let name = name
        .or_else(|| api.api_name.clone())
        .unwrap_or_else(|| fallback_name.to_string());
    Ok(AdapterConfig { name, api })
}

fn expand_env(value: &mut Value, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
    match value {
        Value::String(s) => *s = expand_str(s, lookup)?,
        Value::Sequence(items) => {
            for item in items {
                expand_env(item, lookup)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                expand_env(item, lookup)?;
            }
        }
        Value::Tagged(tagged) => expand_env(&mut tagged.value, lookup)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

/// Replace every `${VAR}` in `s`.
///
/// # Errors
///
/// Returns [`AdapterError::Config`] naming the first unset variable.
pub fn expand_str(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in ENV_REF.captures_iter(s) {
        let (Some(whole), Some(var)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = lookup(var.as_str()).ok_or_else(|| {
            AdapterError::Config(format!(
                "environment variable '{}' is not set",
                var.as_str()
            ))
        })?;
        out.push_str(&s[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(out)
}

/// A single-line, non-URL spec value.
fn is_plain_path(spec: &str) -> bool {
    let spec = spec.trim();
    !spec.is_empty()
        && !spec.contains('\n')
        && !spec.starts_with('{')
        && !spec.starts_with("http://")
        && !spec.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use restmcp_http_tools::config::AuthConfig;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| vars.get(k).cloned()
    }

    #[test]
    fn expands_references_inside_strings() {
        let lookup = env(&[("HOST", "api.example.com"), ("PORT", "8443")]);
        assert_eq!(
            expand_str("https://${HOST}:${PORT}/v1", &lookup).expect("expand"),
            "https://api.example.com:8443/v1"
        );
        assert_eq!(expand_str("no refs $HOST", &lookup).expect("expand"), "no refs $HOST");
    }

    #[test]
    fn unset_variable_is_an_error() {
        let err = expand_str("${MISSING_TOKEN}", &env(&[])).expect_err("unset");
        assert!(err.to_string().contains("MISSING_TOKEN"), "{err}");
    }

    #[test]
    fn parses_config_with_secrets_and_name() {
        let yaml = r#"
name: pets
spec: ./petstore.yaml
baseUrl: https://${HOST}
auth:
  type: bearer
  token: ${PETS_TOKEN}
executor:
  maxRetries: 2
"#;
        let config = parse_config(
            yaml,
            "fallback",
            env(&[("HOST", "pets.test"), ("PETS_TOKEN", "t:0k#n")]),
        )
        .expect("parse");
        assert_eq!(config.name, "pets");
        assert_eq!(config.api.base_url.as_deref(), Some("https://pets.test"));
        assert_eq!(config.api.executor.max_retries, 2);
        assert_eq!(
            config.api.auth,
            AuthConfig::Bearer {
                token: "t:0k#n".to_string()
            }
        );
    }

    #[test]
    fn name_falls_back_to_api_name_then_file_stem() {
        let named = parse_config("spec: a.yaml\napiName: Weather\n", "file", env(&[]))
            .expect("parse");
        assert_eq!(named.name, "Weather");
        let unnamed = parse_config("spec: a.yaml\n", "file", env(&[])).expect("parse");
        assert_eq!(unnamed.name, "file");
    }

    #[test]
    fn rejects_non_mapping_and_missing_spec() {
        assert!(matches!(
            parse_config("- a\n- b\n", "x", env(&[])),
            Err(AdapterError::Config(_))
        ));
        assert!(matches!(
            parse_config("baseUrl: https://x\n", "x", env(&[])),
            Err(AdapterError::Config(_))
        ));
    }

    #[test]
    fn relative_spec_resolves_against_config_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("petstore.yaml"), "openapi: 3.0.0\n").expect("write spec");
        let path = dir.path().join("pets.yaml");
        std::fs::write(&path, "spec: petstore.yaml\n").expect("write config");

        let config = load_config(&path).expect("load");
        assert_eq!(config.name, "pets");
        assert_eq!(
            Path::new(&config.api.spec),
            dir.path().join("petstore.yaml").as_path()
        );
    }
}
