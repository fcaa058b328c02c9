//! Placeholder substitution for step commands
//!
//! Tokens reference session paths as `{name}`, e.g. `{matches_dir}/sfm_data.json`.
//! `{{` and `}}` produce literal braces.

use super::definition::Step;
use super::options::CliOption;
use crate::error::{ErrorCode, PipelineError, Result};
use crate::session::{PathSet, PLACEHOLDERS};
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("Invalid regex pattern"));

/// A step's command and default options as unresolved templates
#[derive(Debug, Clone, Copy)]
pub struct CommandTemplate<'a> {
    step: &'a Step,
}

impl<'a> CommandTemplate<'a> {
    pub fn new(step: &'a Step) -> Self {
        Self { step }
    }

    /// Resolve the executable and positional tokens
    pub fn resolve(&self, paths: &PathSet) -> Result<Vec<String>> {
        self.step
            .command
            .iter()
            .map(|token| resolve_token(&self.step.label, token, paths))
            .collect()
    }

    /// Resolve flags and values of the step's default options
    pub fn resolve_defaults(&self, paths: &PathSet) -> Result<Vec<CliOption>> {
        self.step
            .default_options
            .as_slice()
            .iter()
            .map(|option| {
                let flag = resolve_token(&self.step.label, &option.flag, paths)?;
                let value = option
                    .value
                    .as_deref()
                    .map(|value| resolve_token(&self.step.label, value, paths))
                    .transpose()?;
                Ok(CliOption::new(flag, value))
            })
            .collect()
    }
}

/// Substitute every placeholder in `token`
pub fn resolve_token(step: &str, token: &str, paths: &PathSet) -> Result<String> {
    let mut resolved = String::with_capacity(token.len());
    let mut last_end = 0;

    for cap in PLACEHOLDER_RE.captures_iter(token) {
        let whole = cap.get(0).expect("capture group 0 always exists");
        resolved.push_str(&token[last_end..whole.start()]);
        last_end = whole.end();

        match (whole.as_str(), cap.get(1)) {
            ("{{", _) => resolved.push('{'),
            ("}}", _) => resolved.push('}'),
            (_, Some(name)) => {
                let name = name.as_str().trim();
                let value = paths.lookup(name).ok_or_else(|| {
                    PipelineError::template(
                        ErrorCode::PIPELINE_TEMPLATE_UNKNOWN_PLACEHOLDER,
                        step,
                        Some(name.to_string()),
                        format!("known placeholders are {}", PLACEHOLDERS.join(", ")),
                    )
                })?;
                resolved.push_str(&value);
            }
            (brace, None) => {
                return Err(PipelineError::template(
                    ErrorCode::PIPELINE_TEMPLATE_UNBALANCED,
                    step,
                    None,
                    format!("unbalanced '{}' in token '{}' (write '{}{}' for a literal)", brace, token, brace, brace),
                ));
            }
        }
    }

    resolved.push_str(&token[last_end..]);
    Ok(resolved)
}
