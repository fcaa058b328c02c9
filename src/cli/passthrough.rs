//! Per-step option overrides taken out of argv before clap sees it
//!
//! `--<N> TOKEN...` and `--step-args SEL TOKEN...` collect option tokens for
//! one step. Collection stops at the next token that looks like a flag, so
//! the tokens are written without dashes: `--1 p ULTRA` sets `-p ULTRA` on
//! step 1. Negative numbers are values and do not end a group.

use crate::error::{ErrorCode, PipelineError, Result};
use crate::pipeline::options::is_flag;
use crate::pipeline::{PassthroughArgs, StepSelector};
use std::iter::Peekable;

pub const STEP_ARGS_FLAG: &str = "--step-args";

/// Command line with the per-step overrides removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArgs {
    pub argv: Vec<String>,
    pub passthrough: PassthroughArgs,
}

/// Split per-step override groups out of `args`
///
/// Everything after a bare `--` is passed on untouched.
pub fn extract_passthrough<I>(args: I) -> Result<ExtractedArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut extracted = ExtractedArgs::default();
    let mut args = args.into_iter().peekable();

    while let Some(arg) = args.next() {
        if arg == "--" {
            extracted.argv.push(arg);
            extracted.argv.extend(args.by_ref());
            break;
        }

        if arg == STEP_ARGS_FLAG {
            let selector = match args.next_if(|next| !is_flag(next)) {
                Some(selector) => selector.parse::<StepSelector>().unwrap_or_else(|e| match e {}),
                None => {
                    return Err(PipelineError::configuration_with_code(
                        ErrorCode::CONFIG_INVALID_VALUE,
                        format!("{} needs a step index or label", STEP_ARGS_FLAG),
                    ))
                }
            };
            let tokens = collect_group(&mut args);
            extracted.passthrough.insert(selector, tokens);
            continue;
        }

        match step_index(&arg) {
            Some(index) => {
                let tokens = collect_group(&mut args);
                extracted.passthrough.insert(StepSelector::ByIndex(index), tokens);
            }
            None => extracted.argv.push(arg),
        }
    }

    Ok(extracted)
}

/// `--3` -> `Some(3)`
fn step_index(arg: &str) -> Option<usize> {
    let digits = arg.strip_prefix("--")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn collect_group<I>(args: &mut Peekable<I>) -> Vec<String>
where
    I: Iterator<Item = String>,
{
    let mut tokens = Vec::new();
    while let Some(token) = args.next_if(|next| !is_flag(next)) {
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn extract(line: &str) -> ExtractedArgs {
        extract_passthrough(argv(line)).unwrap()
    }

    #[test]
    fn test_index_groups_are_removed_from_argv() {
        let extracted = extract("photopipe run images --1 p ULTRA --from 1 --5 resolution-level 2");

        assert_eq!(extracted.argv, argv("photopipe run images --from 1"));

        let mut expected = PassthroughArgs::new();
        expected.insert(StepSelector::ByIndex(1), argv("p ULTRA"));
        expected.insert(StepSelector::ByIndex(5), argv("resolution-level 2"));
        assert_eq!(extracted.passthrough, expected);
    }

    #[test]
    fn test_adjacent_index_groups_are_split() {
        let extracted = extract("photopipe run images --1 p ULTRA --5 resolution-level 2");

        assert_eq!(extracted.argv, argv("photopipe run images"));
        let mut expected = PassthroughArgs::new();
        expected.insert(StepSelector::ByIndex(1), argv("p ULTRA"));
        expected.insert(StepSelector::ByIndex(5), argv("resolution-level 2"));
        assert_eq!(extracted.passthrough, expected);
    }

    #[test]
    fn test_negative_numbers_stay_in_the_group() {
        let extracted = extract("photopipe run images --6 decimate -0.5 --echo");

        assert_eq!(extracted.argv, argv("photopipe run images --echo"));
        let mut expected = PassthroughArgs::new();
        expected.insert(StepSelector::ByIndex(6), argv("decimate -0.5"));
        assert_eq!(extracted.passthrough, expected);
    }

    #[test]
    fn test_step_args_accepts_labels() {
        let extracted = extract("photopipe run images --step-args features p HIGH --dry-run");

        assert_eq!(extracted.argv, argv("photopipe run images --dry-run"));
        let mut expected = PassthroughArgs::new();
        expected.insert(StepSelector::ByLabel("features".into()), argv("p HIGH"));
        assert_eq!(extracted.passthrough, expected);
    }

    #[test]
    fn test_step_args_without_selector_is_rejected() {
        let err = extract_passthrough(argv("photopipe run images --step-args --echo")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
    }

    #[test]
    fn test_tokens_after_double_dash_are_untouched() {
        let extracted = extract("photopipe run images -- --2 x");
        assert_eq!(extracted.argv, argv("photopipe run images -- --2 x"));
        assert!(extracted.passthrough.is_empty());
    }

    #[test]
    fn test_long_flags_are_not_step_indices() {
        assert_eq!(step_index("--3"), Some(3));
        assert_eq!(step_index("--12"), Some(12));
        assert_eq!(step_index("--from"), None);
        assert_eq!(step_index("--"), None);
        assert_eq!(step_index("-3"), None);
    }
}
