//! Declarative pipeline definitions
//!
//! A definition is an ordered list of steps. Index order is the default
//! execution order; `entrypoint` and `on_success` describe the same pipeline
//! as a chain of labels.

use super::options::{group_tokens, CliOption};
use crate::error::{ErrorCode, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default options of a step, grouped into flag/value pairs
///
/// Serialized as the flat token list, e.g. `["-i", "{input_dir}", "-m", "SIFT"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct DefaultOptions(Vec<CliOption>);

impl DefaultOptions {
    pub fn new(options: Vec<CliOption>) -> Self {
        Self(options)
    }

    pub fn as_slice(&self) -> &[CliOption] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for DefaultOptions {
    type Error = String;

    fn try_from(tokens: Vec<String>) -> std::result::Result<Self, Self::Error> {
        group_tokens(&tokens).map(Self).map_err(|token| {
            format!(
                "default option value '{}' has no preceding flag; positional arguments belong in `command`",
                token
            )
        })
    }
}

impl From<DefaultOptions> for Vec<String> {
    fn from(options: DefaultOptions) -> Self {
        options
            .0
            .iter()
            .flat_map(|option| option.tokens().cloned())
            .collect()
    }
}

/// One external tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Executable followed by positional tokens; may contain placeholders
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "DefaultOptions::is_empty")]
    pub default_options: DefaultOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<String>,
}

impl Step {
    /// Human-readable title, falling back to the label
    pub fn title(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.label)
    }

    pub fn executable(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Whether any command or option token mentions `{name}`
    pub fn references(&self, name: &str) -> bool {
        let needle = format!("{{{}}}", name);
        self.command
            .iter()
            .chain(
                self.default_options
                    .as_slice()
                    .iter()
                    .flat_map(|option| option.tokens()),
            )
            .any(|token| token.contains(&needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    pub steps: Vec<Step>,
}

impl PipelineDefinition {
    /// Build a definition in code, validating it like a loaded one
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Result<Self> {
        let definition = Self {
            name: name.into(),
            description: None,
            entrypoint: None,
            steps,
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn with_entrypoint(mut self, label: impl Into<String>) -> Result<Self> {
        self.entrypoint = Some(label.into());
        self.validate()?;
        Ok(self)
    }

    pub fn from_yaml_str(name: &str, content: &str) -> Result<Self> {
        let definition: Self = serde_yaml::from_str(content)
            .map_err(|e| PipelineError::from(e).with_context(format!("pipeline '{}'", name)))?;
        definition.named(name)
    }

    pub fn from_json_str(name: &str, content: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(content)
            .map_err(|e| PipelineError::from(e).with_context(format!("pipeline '{}'", name)))?;
        definition.named(name)
    }

    /// Load a definition file; `.json` is parsed as JSON, anything else as YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::configuration_with_code(
                ErrorCode::CONFIG_NOT_FOUND,
                "cannot read pipeline definition",
            )
            .with_path(path)
            .with_source(e)
        })?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipeline".to_string());

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let loaded = if is_json {
            Self::from_json_str(&stem, &content)
        } else {
            Self::from_yaml_str(&stem, &content)
        };
        loaded.map_err(|e| e.with_path(path))
    }

    fn named(mut self, fallback: &str) -> Result<Self> {
        if self.name.trim().is_empty() {
            self.name = fallback.to_string();
        }
        self.validate()?;
        Ok(self)
    }

    /// Check structural invariants
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| {
            PipelineError::configuration_with_code(ErrorCode::CONFIG_INVALID_PIPELINE, message)
        };

        if self.steps.is_empty() {
            return Err(invalid(format!("pipeline '{}' has no steps", self.name)));
        }

        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.label.trim().is_empty() {
                return Err(invalid(format!("step #{} has an empty label", index)));
            }
            if step.label.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid(format!(
                    "step label '{}' is numeric and would be ambiguous with a step index",
                    step.label
                )));
            }
            if !seen.insert(step.label.as_str()) {
                return Err(invalid(format!("duplicate step label '{}'", step.label)));
            }
            if step.command.is_empty() || step.executable().trim().is_empty() {
                return Err(invalid(format!("step '{}' has no command", step.label)));
            }
        }

        let dangling = self
            .entrypoint
            .iter()
            .map(|label| ("entrypoint", label))
            .chain(
                self.steps
                    .iter()
                    .filter_map(|s| s.on_success.as_ref().map(|next| ("on_success", next))),
            )
            .find(|(_, label)| !seen.contains(label.as_str()));
        if let Some((field, label)) = dangling {
            return Err(invalid(format!(
                "{} refers to unknown step '{}'",
                field, label
            )));
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Index of the step with exactly this label
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.label == label)
    }
}
