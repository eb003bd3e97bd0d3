//! Insertion-ordered tool collection with lookup, filtering and JSON export.

use crate::error::{OpenApiToolsError, Result};
use crate::generator::McpTool;
use regex::{Regex, RegexBuilder};
use restmcp_http_tools::model::HttpMethod;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::path::Path;

/// Which tool text a pattern is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatternField {
    #[default]
    Name,
    Description,
    Path,
    All,
}

/// Combined filter; every criterion that is set must match.
#[derive(Debug, Clone, Default)]
pub struct ToolQuery {
    pub method: Option<HttpMethod>,
    pub tag: Option<String>,
    pub pattern: Option<String>,
    pub pattern_field: PatternField,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    name: Option<String>,
    tools: Vec<McpTool>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            tools: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::DuplicateTool`] when the name is taken.
    pub fn add(&mut self, tool: McpTool) -> Result<()> {
        if self.contains(&tool.name) {
            return Err(OpenApiToolsError::DuplicateTool(tool.name));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Stops at the first duplicate; tools before it stay registered.
    ///
    /// # Errors
    ///
    /// See [`ToolRegistry::add`].
    pub fn add_all(&mut self, tools: impl IntoIterator<Item = McpTool>) -> Result<()> {
        tools.into_iter().try_for_each(|tool| self.add(tool))
    }

    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::ToolNotFound`] when no tool has this name.
    pub fn update(&mut self, tool: McpTool) -> Result<()> {
        match self.tools.iter_mut().find(|t| t.name == tool.name) {
            Some(slot) => {
                *slot = tool;
                Ok(())
            }
            None => Err(OpenApiToolsError::ToolNotFound(tool.name)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&McpTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<McpTool> {
        let idx = self.tools.iter().position(|t| t.name == name)?;
        Some(self.tools.remove(idx))
    }

    pub fn clear(&mut self) {
        self.tools.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[must_use]
    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    #[must_use]
    pub fn by_tag(&self, tag: &str, limit: Option<usize>) -> Vec<&McpTool> {
        limited(self.tools.iter().filter(|t| t.tags().contains(&tag)), limit)
    }

    #[must_use]
    pub fn by_method(&self, method: HttpMethod, limit: Option<usize>) -> Vec<&McpTool> {
        limited(
            self.tools
                .iter()
                .filter(|t| t.method() == Some(method.as_str())),
            limit,
        )
    }

    /// Case-insensitive substring match on name or description.
    #[must_use]
    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<&McpTool> {
        let needle = query.to_lowercase();
        limited(
            self.tools.iter().filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
            }),
            limit,
        )
    }

    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::InvalidPattern`] for an invalid regex.
    pub fn filter_by_pattern(
        &self,
        pattern: &str,
        field: PatternField,
        limit: Option<usize>,
    ) -> Result<Vec<&McpTool>> {
        let regex = compile(pattern)?;
        Ok(limited(
            self.tools.iter().filter(|t| matches_field(t, &regex, field)),
            limit,
        ))
    }

    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::InvalidPattern`] for an invalid `pattern`.
    pub fn query(&self, query: &ToolQuery) -> Result<Vec<&McpTool>> {
        let regex = query.pattern.as_deref().map(compile).transpose()?;
        Ok(limited(
            self.tools.iter().filter(|t| {
                query.method.is_none_or(|m| t.method() == Some(m.as_str()))
                    && query
                        .tag
                        .as_deref()
                        .is_none_or(|tag| t.tags().contains(&tag))
                    && regex
                        .as_ref()
                        .is_none_or(|re| matches_field(t, re, query.pattern_field))
            }),
            query.limit,
        ))
    }

    #[must_use]
    pub fn all_tags(&self) -> BTreeSet<String> {
        self.tools
            .iter()
            .flat_map(|t| t.tags().into_iter().map(str::to_string))
            .collect()
    }

    /// `{name, tools, count, metadata: {tags, tool_names}}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "tools": self.tools_value(),
            "count": self.tools.len(),
            "metadata": {
                "tags": self.all_tags(),
                "tool_names": self.names(),
            },
        })
    }

    /// # Errors
    ///
    /// Returns a serialization error (not expected for JSON values).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Io`] when the file cannot be written.
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Write only the `[{name, description, inputSchema, metadata?}]` array.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Io`] when the file cannot be written.
    pub fn export_tools_only(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(&self.tools_value())?)?;
        Ok(())
    }

    fn tools_value(&self) -> Value {
        Value::Array(self.tools.iter().map(McpTool::to_value).collect())
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| OpenApiToolsError::invalid_pattern(pattern, &e))
}

fn matches_field(tool: &McpTool, regex: &Regex, field: PatternField) -> bool {
    let name = || regex.is_match(&tool.name);
    let description = || regex.is_match(&tool.description);
    let path = || tool.path().is_some_and(|p| regex.is_match(p));
    match field {
        PatternField::Name => name(),
        PatternField::Description => description(),
        PatternField::Path => path(),
        PatternField::All => name() || description() || path(),
    }
}

fn limited<'a>(iter: impl Iterator<Item = &'a McpTool>, limit: Option<usize>) -> Vec<&'a McpTool> {
    iter.take(limit.unwrap_or(usize::MAX)).collect()
}
