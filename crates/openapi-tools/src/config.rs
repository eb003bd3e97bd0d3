use restmcp_http_tools::config::{AuthConfig, ExecutorConfig};
use restmcp_http_tools::model::VariantSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration for an OpenAPI-based tool source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerConfig {
    /// Spec location (URL or file path) or literal JSON/YAML content.
    pub spec: String,

    /// Optional spec hash (`sha256:<hex>`) for version pinning.
    #[serde(default)]
    pub spec_hash: Option<String>,

    /// Hash policy: warn, fail, or ignore.
    #[serde(default)]
    pub spec_hash_policy: HashPolicy,

    /// Override base URL from spec.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Prefix for generated tool names.
    #[serde(default)]
    pub api_name: Option<String>,

    /// Reject incomplete documents and dereference failures instead of degrading.
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Auto-discovery configuration.
    #[serde(default)]
    pub auto_discover: AutoDiscoverConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Calls matching any rule get the configured credentials even on public endpoints. Other
    /// calls follow the endpoint's declared security.
    #[serde(default)]
    pub conditional_auth: Vec<ConditionalAuthRule>,

    /// Extra endpoints cloned from discovered ones.
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
}

impl ApiServerConfig {
    #[must_use]
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            spec_hash: None,
            spec_hash_policy: HashPolicy::default(),
            base_url: None,
            api_name: None,
            strict: false,
            auth: AuthConfig::None,
            auto_discover: AutoDiscoverConfig::default(),
            generator: GeneratorConfig::default(),
            executor: ExecutorConfig::default(),
            conditional_auth: Vec::new(),
            variants: Vec::new(),
        }
    }
}

/// Hash verification policy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashPolicy {
    /// Log warning if hash doesn't match.
    #[default]
    Warn,
    /// Fail startup if hash doesn't match.
    Fail,
    /// Ignore hash verification.
    Ignore,
}

/// Auto-discovery configuration.
///
/// Patterns are globs over `"METHOD /path"` (e.g. `"GET /pets*"`) or over the endpoint name.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AutoDiscoverConfig {
    /// Simple boolean: true = discover all, false = expose nothing.
    Enabled(bool),
    /// Detailed configuration with include/exclude.
    Detailed {
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
}

impl Default for AutoDiscoverConfig {
    fn default() -> Self {
        AutoDiscoverConfig::Enabled(true)
    }
}

impl AutoDiscoverConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match self {
            AutoDiscoverConfig::Enabled(b) => *b,
            AutoDiscoverConfig::Detailed { .. } => true,
        }
    }

    #[must_use]
    pub fn include_patterns(&self) -> &[String] {
        match self {
            AutoDiscoverConfig::Enabled(_) => &[],
            AutoDiscoverConfig::Detailed { include, .. } => include,
        }
    }

    #[must_use]
    pub fn exclude_patterns(&self) -> &[String] {
        match self {
            AutoDiscoverConfig::Enabled(_) => &[],
            AutoDiscoverConfig::Detailed { exclude, .. } => exclude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default = "default_true")]
    pub include_metadata: bool,

    /// Nest inputs under `path`/`query`/`header`/`cookie`/`body` objects.
    #[serde(default)]
    pub group_parameters: bool,

    /// Replaces the whole auth-parameter exclusion set when given.
    #[serde(default)]
    pub auth_params: Option<Vec<String>>,

    /// Add parameter names found in the document's security schemes to the exclusion set.
    #[serde(default = "default_true")]
    pub detect_auth_params: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            include_metadata: true,
            group_parameters: false,
            auth_params: None,
            detect_auth_params: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAuthRule {
    /// Whole-name globs over tool names (`*` and `?`).
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default)]
    pub argument: Option<ArgumentMatch>,
}

/// Matches when the named argument equals one of `values`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArgumentMatch {
    pub name: String,
    pub values: Vec<Value>,
}
