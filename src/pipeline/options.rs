//! Flag/value option pairs and the pass-through merge rule

use serde::{Deserialize, Serialize};
use std::fmt;

/// One flag with its optional value, e.g. `-m SIFT` or `--force`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliOption {
    pub flag: String,
    pub value: Option<String>,
}

impl CliOption {
    pub fn new(flag: impl Into<String>, value: Option<String>) -> Self {
        Self {
            flag: flag.into(),
            value,
        }
    }

    /// Flatten into command-line tokens
    pub fn tokens(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.flag).chain(self.value.iter())
    }
}

impl fmt::Display for CliOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}", self.flag, value),
            None => write!(f, "{}", self.flag),
        }
    }
}

/// Whether a token is a flag rather than a value
///
/// Negative numbers such as `-1` or `-0.5` are values. Anything starting with
/// `--` is a flag, including `--5`.
pub fn is_flag(token: &str) -> bool {
    match token.strip_prefix('-') {
        None | Some("") => false,
        Some(rest) if rest.starts_with('-') => true,
        Some(rest) => !is_unsigned_number(rest),
    }
}

fn is_unsigned_number(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit() || c == '.') && text.parse::<f64>().is_ok()
}

/// Prefix a bare option name: `-` for one character, `--` for longer names
pub fn normalize_flag(name: &str) -> String {
    if name.starts_with('-') {
        name.to_string()
    } else if name.chars().count() == 1 {
        format!("-{}", name)
    } else {
        format!("--{}", name)
    }
}

/// Group a flat, already-prefixed token list into options
///
/// A flag token opens an option; the following token is its value unless it
/// is itself a flag. Returns the offending token when a value has no flag.
pub fn group_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<CliOption>, String> {
    let mut options: Vec<CliOption> = Vec::new();
    for token in tokens {
        let token = token.as_ref();
        if is_flag(token) {
            options.push(CliOption::new(token, None));
            continue;
        }
        match options.last_mut() {
            Some(last) if last.value.is_none() => last.value = Some(token.to_string()),
            _ => return Err(token.to_string()),
        }
    }
    Ok(options)
}

/// Turn caller-supplied pass-through tokens into options
///
/// Tokens are read as consecutive `(flag, value)` pairs; a trailing flag
/// without a value becomes a bare switch. Flags are auto-prefixed, and when a
/// flag is given more than once the last occurrence wins.
pub fn user_options<S: AsRef<str>>(tokens: &[S]) -> Vec<CliOption> {
    let mut options: Vec<CliOption> = Vec::new();
    for pair in tokens.chunks(2) {
        let flag = normalize_flag(pair[0].as_ref());
        let value = pair.get(1).map(|v| v.as_ref().to_string());
        options.retain(|existing| existing.flag != flag);
        options.push(CliOption::new(flag, value));
    }
    options
}

/// Merge default options with user overrides
///
/// Every default whose flag the user also supplies is dropped; the result is
/// the surviving defaults followed by the user options, each group in its
/// original order.
pub fn merge(defaults: &[CliOption], user: &[CliOption]) -> Vec<String> {
    defaults
        .iter()
        .filter(|default| !user.iter().any(|u| u.flag == default.flag))
        .chain(user.iter())
        .flat_map(|option| option.tokens().cloned())
        .collect()
}
