//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Environment variables that would leak host configuration into a test
pub const PHOTOPIPE_ENV: &[&str] = &[
    "PHOTOPIPE_DATA_DIR",
    "PHOTOPIPE_IMAGE",
    "PHOTOPIPE_CONTAINER_RUNTIME",
    "PHOTOPIPE_CONTAINER",
    "PHOTOPIPE_LOG",
];

/// A pipeline of shell steps that leave a trace file per step
pub const SHELL_PIPELINE: &str = r#"
name: shell
description: Shell stand-ins for the reconstruction tools
entrypoint: list
steps:
  - label: list
    description: List the ingested images
    command: ["sh", "-c", "ls {input_dir} > {matches_dir}/images.txt"]
    on_success: count
  - label: count
    command: ["sh", "-c", "wc -l < {matches_dir}/images.txt > {reconstruction_dir}/count.txt"]
    on_success: report
  - label: report
    command: ["sh", "-c", "echo reconstructed; cp {reconstruction_dir}/count.txt {mvs_dir}/scene.txt"]
"#;

/// A pipeline whose middle step exits with status 3
pub const FAILING_PIPELINE: &str = r#"
name: failing
steps:
  - label: first
    command: ["sh", "-c", "echo first > {output_dir}/first.txt"]
  - label: broken
    command: ["sh", "-c", "echo about to fail; exit 3"]
  - label: never
    command: ["sh", "-c", "echo never > {output_dir}/never.txt"]
"#;

/// Test context builder for setting up test environments
pub struct TestContextBuilder {
    temp_dir: TempDir,
    images: Vec<String>,
    pipelines: Vec<(String, String)>,
    with_camera_database: bool,
}

impl TestContextBuilder {
    /// Create a new test context builder
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            images: Vec::new(),
            pipelines: Vec::new(),
            with_camera_database: true,
        })
    }

    /// Add a fake image to the source directory
    pub fn with_image(mut self, name: &str) -> Self {
        self.images.push(name.to_string());
        self
    }

    /// Write a pipeline definition as `<pipelines>/<name>.yaml`
    pub fn with_pipeline(mut self, name: &str, yaml: &str) -> Self {
        self.pipelines.push((name.to_string(), yaml.to_string()));
        self
    }

    pub fn without_camera_database(mut self) -> Self {
        self.with_camera_database = false;
        self
    }

    /// Build the test context
    pub fn build(self) -> Result<TestContext> {
        let root = self.temp_dir.path().to_path_buf();
        let source = root.join("images");
        let pipelines = root.join("pipelines");
        let data = root.join("data");
        let camera_database = root.join("sensor_width_camera_database.txt");

        fs::create_dir_all(&source)?;
        fs::create_dir_all(&pipelines)?;
        for image in &self.images {
            fs::write(source.join(image), b"\xff\xd8\xff\xe0fake")?;
        }
        for (name, yaml) in &self.pipelines {
            fs::write(pipelines.join(format!("{}.yaml", name)), yaml)?;
        }
        if self.with_camera_database {
            fs::write(&camera_database, "Canon EOS 5D;35.8\n")?;
        }

        let settings = root.join("photopipe.toml");
        fs::write(
            &settings,
            format!(
                "data_dir = {:?}\npipelines_dir = {:?}\n\n[tools]\ncamera_database = {:?}\n",
                data.display().to_string(),
                pipelines.display().to_string(),
                camera_database.display().to_string(),
            ),
        )?;

        Ok(TestContext {
            temp_dir: self.temp_dir,
            source,
            data,
            settings,
        })
    }
}

/// Test context containing temporary directories and helpers
pub struct TestContext {
    temp_dir: TempDir,
    pub source: PathBuf,
    pub data: PathBuf,
    pub settings: PathBuf,
}

impl TestContext {
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Session directory for an explicit uid under the configured data dir
    pub fn session_dir(&self, uid: &str) -> PathBuf {
        self.data.join(uid)
    }

    pub fn read(&self, path: impl AsRef<Path>) -> String {
        fs::read_to_string(self.root().join(path)).unwrap_or_default()
    }
}
