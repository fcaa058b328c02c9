//! Canonical directory layout of a reconstruction session
//!
//! ```text
//! <session>/
//!   source/               input images
//!   build/                final outputs
//!   tmp/matches/          features, matches, sfm_data.json
//!   tmp/reconstruction/   sfm_data.bin, colorized point clouds
//!   tmp/mvs/              scene.mvs and the dense/mesh stages
//!   processed.log         interleaved tool output
//!   execution.jsonl       one execution record per line
//! ```

use crate::error::{ErrorCode, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Placeholder names a step command may reference, in display order
pub const PLACEHOLDERS: &[&str] = &[
    "uid",
    "session_dir",
    "input_dir",
    "output_dir",
    "matches_dir",
    "reconstruction_dir",
    "mvs_dir",
    "log_path",
    "camera_database",
    "openmvg_bin",
    "openmvs_bin",
];

/// Locations of the reconstruction toolchain, as seen by the executing substrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub openmvg_bin: PathBuf,
    pub openmvs_bin: PathBuf,
    pub camera_database: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            openmvg_bin: PathBuf::from("/usr/local/bin"),
            openmvs_bin: PathBuf::from("/usr/local/bin/OpenMVS"),
            camera_database: PathBuf::from(
                "/usr/local/share/openMVG/sensor_width_camera_database.txt",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    uid: String,
    session_dir: PathBuf,
    input_dir: PathBuf,
    output_dir: PathBuf,
    matches_dir: PathBuf,
    reconstruction_dir: PathBuf,
    mvs_dir: PathBuf,
    log_path: PathBuf,
    records_path: PathBuf,
    tools: ToolPaths,
}

impl PathSet {
    /// Compute the layout under `session_dir` without touching the filesystem
    pub fn new(uid: impl Into<String>, session_dir: impl Into<PathBuf>, tools: ToolPaths) -> Self {
        let session_dir = session_dir.into();
        let tmp = session_dir.join("tmp");
        Self {
            uid: uid.into(),
            input_dir: session_dir.join("source"),
            output_dir: session_dir.join("build"),
            matches_dir: tmp.join("matches"),
            reconstruction_dir: tmp.join("reconstruction"),
            mvs_dir: tmp.join("mvs"),
            log_path: session_dir.join("processed.log"),
            records_path: session_dir.join("execution.jsonl"),
            session_dir,
            tools,
        }
    }

    /// Create the working directories, requiring the input directory to exist
    ///
    /// Safe to call repeatedly; existing directories are left as they are.
    pub fn materialize(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            return Err(PipelineError::configuration_with_code(
                ErrorCode::CONFIG_SOURCE_MISSING,
                "session has no source image directory",
            )
            .with_path(&self.input_dir));
        }

        for dir in self.working_dirs() {
            std::fs::create_dir_all(dir).map_err(|e| {
                PipelineError::from(e)
                    .with_path(dir)
                    .with_context("creating session directory")
            })?;
            debug!("Session directory ready: {}", dir.display());
        }

        Ok(())
    }

    /// Directories created by `materialize`
    pub fn working_dirs(&self) -> [&Path; 4] {
        [
            &self.output_dir,
            &self.matches_dir,
            &self.reconstruction_dir,
            &self.mvs_dir,
        ]
    }

    /// Resolve a placeholder name to its value
    pub fn lookup(&self, name: &str) -> Option<String> {
        let path: &Path = match name {
            "uid" => return Some(self.uid.clone()),
            "session_dir" => &self.session_dir,
            "input_dir" => &self.input_dir,
            "output_dir" => &self.output_dir,
            "matches_dir" => &self.matches_dir,
            "reconstruction_dir" => &self.reconstruction_dir,
            "mvs_dir" => &self.mvs_dir,
            "log_path" => &self.log_path,
            "camera_database" => &self.tools.camera_database,
            "openmvg_bin" => &self.tools.openmvg_bin,
            "openmvs_bin" => &self.tools.openmvs_bin,
            _ => return None,
        };
        Some(path.to_string_lossy().into_owned())
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn matches_dir(&self) -> &Path {
        &self.matches_dir
    }

    pub fn reconstruction_dir(&self) -> &Path {
        &self.reconstruction_dir
    }

    pub fn mvs_dir(&self) -> &Path {
        &self.mvs_dir
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn camera_database(&self) -> &Path {
        &self.tools.camera_database
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(root: &Path) -> PathSet {
        PathSet::new("abc123", root, ToolPaths::default())
    }

    #[test]
    fn test_layout_is_rooted_at_session() {
        let paths = layout(Path::new("/data/abc123"));
        assert_eq!(paths.input_dir(), Path::new("/data/abc123/source"));
        assert_eq!(paths.output_dir(), Path::new("/data/abc123/build"));
        assert_eq!(paths.matches_dir(), Path::new("/data/abc123/tmp/matches"));
        assert_eq!(
            paths.reconstruction_dir(),
            Path::new("/data/abc123/tmp/reconstruction")
        );
        assert_eq!(paths.mvs_dir(), Path::new("/data/abc123/tmp/mvs"));
        assert_eq!(paths.log_path(), Path::new("/data/abc123/processed.log"));
        for dir in paths.working_dirs() {
            assert!(dir.starts_with(paths.session_dir()));
        }
    }

    #[test]
    fn test_materialize_requires_input_dir() {
        let temp = TempDir::new().unwrap();
        let paths = layout(temp.path());

        let err = paths.materialize().unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_SOURCE_MISSING);
        assert!(!paths.matches_dir().exists());
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let paths = layout(temp.path());
        std::fs::create_dir_all(paths.input_dir()).unwrap();

        paths.materialize().unwrap();
        let first: Vec<_> = walk(temp.path());
        paths.materialize().unwrap();
        let second: Vec<_> = walk(temp.path());

        assert_eq!(first, second);
        for dir in paths.working_dirs() {
            assert!(dir.is_dir());
        }
    }

    #[test]
    fn test_lookup_known_and_unknown_names() {
        let paths = layout(Path::new("/data/abc123"));
        assert_eq!(paths.lookup("uid").as_deref(), Some("abc123"));
        assert_eq!(
            paths.lookup("mvs_dir").as_deref(),
            Some("/data/abc123/tmp/mvs")
        );
        assert_eq!(
            paths.lookup("openmvs_bin").as_deref(),
            Some("/usr/local/bin/OpenMVS")
        );
        assert!(paths.lookup("features_dir").is_none());
        for name in PLACEHOLDERS {
            assert!(paths.lookup(name).is_some(), "{} should resolve", name);
        }
    }

    fn walk(root: &Path) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.path().to_path_buf())
            .collect();
        entries.sort();
        entries
    }
}
