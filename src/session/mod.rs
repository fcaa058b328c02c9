//! Reconstruction sessions
//!
//! A session is one working directory tree identified by a uid. It is created
//! on the first run and reused when the same uid is passed again, which is how
//! a failed run is resumed with `--from`/`--entrypoint`.

pub mod paths;
pub mod source;

pub use paths::{PathSet, ToolPaths, PLACEHOLDERS};
pub use source::{check_source, ingest, ingest_excluding, list_images, IngestReport};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier for a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Reuse an existing id, or generate one when none (or an empty one) is given
    pub fn from_option(id: Option<String>) -> Self {
        match id {
            Some(id) if !id.trim().is_empty() => Self(id.trim().to_string()),
            _ => Self::new(),
        }
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session's identity and directory layout
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    paths: PathSet,
}

impl Session {
    /// Locate a session; `root` wins over `<data_dir>/<uid>` when given
    pub fn locate(
        id: SessionId,
        root: Option<&Path>,
        data_dir: &Path,
        tools: ToolPaths,
    ) -> Result<Self> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => data_dir.join(id.as_str()),
        };
        let root = absolute(&root)?;
        let paths = PathSet::new(id.as_str(), root, tools);
        Ok(Self { id, paths })
    }

    /// Copy the source images in and create the working directories
    ///
    /// The session tree is left out of the copy when it sits inside `source`.
    pub fn prepare(&self, source: &Path) -> Result<IngestReport> {
        let report = ingest_excluding(
            source,
            self.paths.input_dir(),
            &[self.paths.session_dir()],
        )?;
        self.paths.materialize()?;
        Ok(report)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn paths(&self) -> &PathSet {
        &self.paths
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
