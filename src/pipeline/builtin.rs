//! Pipelines shipped with photopipe and lookup of user-provided ones

use super::definition::PipelineDefinition;
use crate::error::{ErrorCode, PipelineError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_PIPELINE: &str = "openmvg_openmvs";

const BUILTIN: &[(&str, &str)] = &[
    (
        "openmvg_openmvs",
        include_str!("../../pipelines/openmvg_openmvs.yaml"),
    ),
    (
        "openmvg_openmvs_colorized",
        include_str!("../../pipelines/openmvg_openmvs_colorized.yaml"),
    ),
];

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}

/// Parse an embedded pipeline by name
pub fn builtin(name: &str) -> Option<Result<PipelineDefinition>> {
    BUILTIN
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(name, content)| PipelineDefinition::from_yaml_str(name, content))
}

/// Find a pipeline by file path, by name in `pipelines_dir`, or among the built-ins
pub fn resolve_pipeline(name_or_path: &str, pipelines_dir: Option<&Path>) -> Result<PipelineDefinition> {
    let as_path = Path::new(name_or_path);
    if as_path.is_file() {
        debug!("Loading pipeline from {}", as_path.display());
        return PipelineDefinition::load(as_path);
    }

    let name = strip_extension(name_or_path);
    if let Some(path) = pipelines_dir.and_then(|dir| find_in_dir(dir, name)) {
        debug!("Loading pipeline '{}' from {}", name, path.display());
        return PipelineDefinition::load(&path);
    }

    builtin(name).unwrap_or_else(|| {
        Err(PipelineError::configuration_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!(
                "unknown pipeline '{}'; built-in pipelines: {}",
                name_or_path,
                builtin_names().collect::<Vec<_>>().join(", ")
            ),
        ))
    })
}

fn strip_extension(name: &str) -> &str {
    EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(&format!(".{}", ext)))
        .unwrap_or(name)
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_pipelines_parse_and_chain_in_index_order() {
        for name in builtin_names() {
            let definition = builtin(name).unwrap().unwrap();
            assert_eq!(definition.name, name);
            assert_eq!(definition.entrypoint.as_deref(), Some("intrinsics"));
            for (index, step) in definition.steps.iter().enumerate() {
                let expected = definition.steps.get(index + 1).map(|s| s.label.as_str());
                assert_eq!(step.on_success.as_deref(), expected, "{}: {}", name, step.label);
            }
        }
    }

    #[test]
    fn test_default_pipeline_shape() {
        let definition = resolve_pipeline(DEFAULT_PIPELINE, None).unwrap();
        assert_eq!(definition.len(), 9);
        assert_eq!(definition.index_of("features"), Some(1));
        assert_eq!(definition.index_of("texture"), Some(8));
        assert!(definition.steps[0].references("camera_database"));

        let colorized = resolve_pipeline("openmvg_openmvs_colorized", None).unwrap();
        assert_eq!(colorized.len(), 12);
    }

    #[test]
    fn test_pipelines_dir_shadows_builtin() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("openmvg_openmvs.yml"),
            "steps:\n  - label: only\n    command: [\"true\"]\n",
        )
        .unwrap();

        let definition = resolve_pipeline("openmvg_openmvs", Some(temp.path())).unwrap();
        assert_eq!(definition.len(), 1);
        assert_eq!(definition.name, "openmvg_openmvs");
    }

    #[test]
    fn test_path_and_extension_forms() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.json");
        std::fs::write(
            &path,
            r#"{"steps": [{"label": "a", "command": ["true"]}]}"#,
        )
        .unwrap();

        let definition = resolve_pipeline(path.to_str().unwrap(), None).unwrap();
        assert_eq!(definition.name, "custom");

        let definition = resolve_pipeline("openmvg_openmvs.json", None).unwrap();
        assert_eq!(definition.name, "openmvg_openmvs");
    }

    #[test]
    fn test_unknown_pipeline_lists_builtins() {
        let err = resolve_pipeline("meshroom", None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_NOT_FOUND);
        assert!(err.to_string().contains("openmvg_openmvs_colorized"));
    }
}
