//! Turning user step selections into concrete step indices

use super::definition::PipelineDefinition;
use super::options::{user_options, CliOption};
use crate::error::{ErrorCode, PipelineError, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// A step referenced by position or by label
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepSelector {
    ByIndex(usize),
    ByLabel(String),
}

impl StepSelector {
    /// Resolve to an index in `definition`
    pub fn resolve(&self, definition: &PipelineDefinition) -> Result<usize> {
        match self {
            StepSelector::ByIndex(index) if *index < definition.len() => Ok(*index),
            StepSelector::ByIndex(index) => Err(PipelineError::unknown_step(
                ErrorCode::SELECT_INDEX_OUT_OF_RANGE,
                index.to_string(),
                &definition.name,
            )),
            StepSelector::ByLabel(label) => definition.index_of(label).ok_or_else(|| {
                PipelineError::unknown_step(
                    ErrorCode::SELECT_UNKNOWN_LABEL,
                    label.clone(),
                    &definition.name,
                )
            }),
        }
    }
}

impl FromStr for StepSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<usize>() {
            Ok(index) => StepSelector::ByIndex(index),
            Err(_) => StepSelector::ByLabel(s.to_string()),
        })
    }
}

impl fmt::Display for StepSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepSelector::ByIndex(index) => write!(f, "#{}", index),
            StepSelector::ByLabel(label) => write!(f, "{}", label),
        }
    }
}

/// Which steps of a pipeline a run executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Inclusive index range; open ends default to the first and last step
    Range {
        first: Option<StepSelector>,
        last: Option<StepSelector>,
    },
    /// Follow `on_success` links from an entrypoint (default: the declared one)
    Chain { entrypoint: Option<StepSelector> },
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Range {
            first: None,
            last: None,
        }
    }
}

impl Selection {
    /// Resolve to the ordered list of step indices to execute
    pub fn resolve(&self, definition: &PipelineDefinition) -> Result<Vec<usize>> {
        match self {
            Selection::Range { first, last } => {
                let first = match first {
                    Some(selector) => selector.resolve(definition)?,
                    None => 0,
                };
                let last = match last {
                    Some(selector) => selector.resolve(definition)?,
                    None => definition.len().saturating_sub(1),
                };
                if first > last {
                    return Err(PipelineError::configuration_with_code(
                        ErrorCode::SELECT_EMPTY_RANGE,
                        format!(
                            "first step #{} comes after last step #{}; nothing to run",
                            first, last
                        ),
                    ));
                }
                Ok((first..=last).collect())
            }
            Selection::Chain { entrypoint } => {
                let start = match (entrypoint, &definition.entrypoint) {
                    (Some(selector), _) => selector.resolve(definition)?,
                    (None, Some(label)) => {
                        StepSelector::ByLabel(label.clone()).resolve(definition)?
                    }
                    (None, None) => 0,
                };
                Self::follow_chain(definition, start)
            }
        }
    }

    fn follow_chain(definition: &PipelineDefinition, start: usize) -> Result<Vec<usize>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(start);

        while let Some(index) = current {
            if !visited.insert(index) {
                return Err(PipelineError::configuration_with_code(
                    ErrorCode::CONFIG_INVALID_PIPELINE,
                    format!(
                        "on_success chain revisits step '{}'; cyclic pipelines are not supported",
                        definition.steps[index].label
                    ),
                ));
            }
            order.push(index);
            current = match &definition.steps[index].on_success {
                Some(next) => Some(StepSelector::ByLabel(next.clone()).resolve(definition)?),
                None => None,
            };
        }

        Ok(order)
    }
}

/// Caller-supplied option tokens per step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassthroughArgs {
    entries: Vec<(StepSelector, Vec<String>)>,
}

impl PassthroughArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add raw tokens for a step, e.g. `["p", "ULTRA"]`
    pub fn insert(&mut self, selector: StepSelector, tokens: Vec<String>) {
        self.entries.push((selector, tokens));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve selectors and parse tokens into user options per step index
    ///
    /// Entries addressing the same step are concatenated in insertion order.
    pub fn resolve(&self, definition: &PipelineDefinition) -> Result<BTreeMap<usize, Vec<CliOption>>> {
        let mut tokens: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (selector, raw) in &self.entries {
            let index = selector.resolve(definition)?;
            tokens.entry(index).or_default().extend(raw.iter().cloned());
        }
        Ok(tokens
            .into_iter()
            .map(|(index, raw)| (index, user_options(&raw)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::definition::{DefaultOptions, Step};

    fn step(label: &str, next: Option<&str>) -> Step {
        Step {
            label: label.to_string(),
            description: None,
            command: vec!["true".to_string()],
            default_options: DefaultOptions::default(),
            on_success: next.map(str::to_string),
        }
    }

    fn nine_steps() -> PipelineDefinition {
        let labels = [
            "intrinsics",
            "features",
            "matches",
            "sfm",
            "export",
            "densify",
            "mesh",
            "refine",
            "texture",
        ];
        let steps = labels
            .iter()
            .enumerate()
            .map(|(i, label)| step(label, labels.get(i + 1).copied()))
            .collect();
        PipelineDefinition::new("nine", steps)
            .unwrap()
            .with_entrypoint("intrinsics")
            .unwrap()
    }

    fn range(first: Option<&str>, last: Option<&str>) -> Selection {
        Selection::Range {
            first: first.map(|s| s.parse().unwrap()),
            last: last.map(|s| s.parse().unwrap()),
        }
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!("3".parse::<StepSelector>().unwrap(), StepSelector::ByIndex(3));
        assert_eq!(
            "densify".parse::<StepSelector>().unwrap(),
            StepSelector::ByLabel("densify".to_string())
        );
    }

    #[test]
    fn test_default_range_is_whole_pipeline() {
        assert_eq!(
            Selection::default().resolve(&nine_steps()).unwrap(),
            (0..9).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_single_step_range() {
        assert_eq!(
            range(Some("0"), Some("0")).resolve(&nine_steps()).unwrap(),
            vec![0]
        );
    }

    #[test]
    fn test_every_valid_range_is_exact_and_ascending() {
        let definition = nine_steps();
        for first in 0..9 {
            for last in first..9 {
                let selection = Selection::Range {
                    first: Some(StepSelector::ByIndex(first)),
                    last: Some(StepSelector::ByIndex(last)),
                };
                assert_eq!(
                    selection.resolve(&definition).unwrap(),
                    (first..=last).collect::<Vec<_>>()
                );
            }
        }
    }

    #[test]
    fn test_label_bounds_resolve_to_indices() {
        assert_eq!(
            range(Some("export"), Some("mesh"))
                .resolve(&nine_steps())
                .unwrap(),
            vec![4, 5, 6]
        );
        assert_eq!(
            range(Some("refine"), None).resolve(&nine_steps()).unwrap(),
            vec![7, 8]
        );
    }

    #[test]
    fn test_unknown_bounds_fail() {
        let err = range(Some("bogus_label"), None)
            .resolve(&nine_steps())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStep { ref selector, .. } if selector == "bogus_label"));

        let err = range(None, Some("9")).resolve(&nine_steps()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SELECT_INDEX_OUT_OF_RANGE);
    }

    #[test]
    fn test_inverted_range_fails() {
        let err = range(Some("5"), Some("2")).resolve(&nine_steps()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SELECT_EMPTY_RANGE);
    }

    #[test]
    fn test_chain_from_declared_entrypoint() {
        let selection = Selection::Chain { entrypoint: None };
        assert_eq!(
            selection.resolve(&nine_steps()).unwrap(),
            (0..9).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_chain_stops_at_terminal_step() {
        let steps = vec![
            step("a", Some("c")),
            step("b", None),
            step("c", None),
            step("d", Some("b")),
        ];
        let definition = PipelineDefinition::new("skip", steps).unwrap();

        let from_a = Selection::Chain {
            entrypoint: Some(StepSelector::ByLabel("a".into())),
        };
        assert_eq!(from_a.resolve(&definition).unwrap(), vec![0, 2]);

        let from_d = Selection::Chain {
            entrypoint: Some(StepSelector::ByLabel("d".into())),
        };
        assert_eq!(from_d.resolve(&definition).unwrap(), vec![3, 1]);
    }

    #[test]
    fn test_chain_without_declared_entrypoint_starts_at_first_step() {
        let definition =
            PipelineDefinition::new("p", vec![step("a", None), step("b", None)]).unwrap();
        assert_eq!(
            Selection::Chain { entrypoint: None }
                .resolve(&definition)
                .unwrap(),
            vec![0]
        );
    }

    #[test]
    fn test_chain_visits_each_step_at_most_once() {
        let definition =
            PipelineDefinition::new("loop", vec![step("a", Some("b")), step("b", Some("a"))])
                .unwrap();
        let err = Selection::Chain { entrypoint: None }
            .resolve(&definition)
            .unwrap_err();
        assert!(err.to_string().contains("revisits step 'a'"));
    }

    #[test]
    fn test_passthrough_resolution() {
        let mut passthrough = PassthroughArgs::new();
        passthrough.insert(StepSelector::ByIndex(1), vec!["p".into(), "ULTRA".into()]);
        passthrough.insert(
            StepSelector::ByLabel("features".into()),
            vec!["n".into(), "8".into()],
        );
        passthrough.insert(
            StepSelector::ByLabel("densify".into()),
            vec!["resolution-level".into(), "2".into()],
        );

        let resolved = passthrough.resolve(&nine_steps()).unwrap();
        assert_eq!(
            resolved.get(&1).unwrap(),
            &vec![
                CliOption::new("-p", Some("ULTRA".into())),
                CliOption::new("-n", Some("8".into())),
            ]
        );
        assert_eq!(
            resolved.get(&5).unwrap(),
            &vec![CliOption::new("--resolution-level", Some("2".into()))]
        );
    }

    #[test]
    fn test_passthrough_for_unknown_step_fails() {
        let mut passthrough = PassthroughArgs::new();
        passthrough.insert(StepSelector::ByIndex(12), vec!["p".into(), "HIGH".into()]);
        let err = passthrough.resolve(&nine_steps()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
