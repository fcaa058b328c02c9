//! Container-backed execution
//!
//! One container is started per run with the session directory mounted at the
//! same path, every step is run in it with `exec`, and it is force-removed
//! when the run ends. Any docker-compatible CLI works as the runtime.

use super::{check_status, step_error, ExecutionEnvironment};
use crate::error::{ErrorCode, PipelineError, Result};
use crate::session::PathSet;
use crate::subprocess::{OutputMode, ProcessCommand, ProcessCommandBuilder, SubprocessManager};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Container settings from the `[container]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Run steps in a container instead of on the host
    pub enabled: bool,
    /// Container CLI, e.g. `docker` or `podman`
    pub runtime: String,
    pub image: String,
    pub privileged: bool,
    /// Command that keeps the container alive between steps
    pub shell: String,
    /// Upper bound for `run` plus the readiness wait
    #[serde(with = "humantime_serde")]
    pub provision_timeout: Duration,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            runtime: "docker".to_string(),
            image: "photogrammetry:latest".to_string(),
            privileged: true,
            shell: "bash".to_string(),
            provision_timeout: Duration::from_secs(60),
        }
    }
}

/// Host path mounted into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub host: PathBuf,
    pub container: PathBuf,
}

impl VolumeMount {
    /// Mount a host directory at the same path inside the container
    pub fn same_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            host: path.clone(),
            container: path,
        }
    }

    fn to_arg(&self) -> String {
        format!("{}:{}", self.host.display(), self.container.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Unprovisioned,
    Provisioning,
    Active,
    TornDown,
}

/// Lifecycle of the single container a run executes in
pub struct ContainerSession {
    settings: ContainerSettings,
    subprocess: SubprocessManager,
    state: ContainerState,
    handle: Option<ContainerHandle>,
    workdir: Option<PathBuf>,
}

impl ContainerSession {
    pub fn new(settings: ContainerSettings, subprocess: SubprocessManager) -> Self {
        Self {
            settings,
            subprocess,
            state: ContainerState::Unprovisioned,
            handle: None,
            workdir: None,
        }
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn handle(&self) -> Option<&ContainerHandle> {
        self.handle.as_ref()
    }

    /// Start a detached container with `mounts` and wait until it is running
    pub async fn provision(
        &mut self,
        session_id: &str,
        mounts: &[VolumeMount],
    ) -> Result<ContainerHandle> {
        if self.state != ContainerState::Unprovisioned {
            return Err(PipelineError::provisioning(
                ErrorCode::PROVISION_FAILED,
                format!("container session is already {:?}", self.state),
            ));
        }
        self.state = ContainerState::Provisioning;

        match self.start(session_id, mounts).await {
            Ok(handle) => {
                info!(
                    "Container {} ({}) is running image {}",
                    handle.name, handle.id, self.settings.image
                );
                self.handle = Some(handle.clone());
                self.state = ContainerState::Active;
                Ok(handle)
            }
            Err(e) => {
                self.state = ContainerState::Unprovisioned;
                Err(e)
            }
        }
    }

    async fn start(&self, session_id: &str, mounts: &[VolumeMount]) -> Result<ContainerHandle> {
        for mount in mounts {
            std::fs::create_dir_all(&mount.host).map_err(|e| {
                PipelineError::from(e)
                    .with_path(&mount.host)
                    .with_context("creating container mount")
            })?;
        }

        let deadline = Instant::now() + self.settings.provision_timeout;
        let name = format!("photopipe-{}", session_id);
        let command = self.run_command(&name, mounts);
        debug!("Provisioning container: {}", command.display());

        let output = self.subprocess.runner().run(command).await.map_err(|e| {
            PipelineError::provisioning(e.error_code(), format!("cannot start container: {}", e))
                .with_source(e)
        })?;
        if !output.status.success() {
            let mut err = PipelineError::provisioning(
                ErrorCode::PROVISION_FAILED,
                format!(
                    "{} run failed: {}",
                    self.settings.runtime,
                    output.stderr.trim()
                ),
            );
            if let Some(code) = output.status.code() {
                err = err.with_exit_code(code);
            }
            return Err(err);
        }

        let id = output
            .stdout
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::provisioning(
                    ErrorCode::PROVISION_NO_HANDLE,
                    format!("{} run printed no container id", self.settings.runtime),
                )
            })?;
        let handle = ContainerHandle { id, name };

        if let Err(e) = self.wait_until_running(&handle, deadline).await {
            self.remove(&handle).await;
            return Err(e);
        }
        Ok(handle)
    }

    fn run_command(&self, name: &str, mounts: &[VolumeMount]) -> ProcessCommand {
        let mut builder = ProcessCommandBuilder::new(&self.settings.runtime)
            .args(["run", "--detach", "--tty", "--rm", "--name", name]);
        if self.settings.privileged {
            builder = builder.arg("--privileged");
        }
        for mount in mounts {
            builder = builder.arg("--volume").arg(&mount.to_arg());
        }
        builder
            .arg(&self.settings.image)
            .arg(&self.settings.shell)
            .timeout(self.settings.provision_timeout)
            .build()
    }

    async fn wait_until_running(&self, handle: &ContainerHandle, deadline: Instant) -> Result<()> {
        loop {
            let probe = ProcessCommandBuilder::new(&self.settings.runtime)
                .args(["inspect", "--format", "{{.State.Running}}", handle.id.as_str()])
                .build();
            match self.subprocess.runner().run(probe).await {
                Ok(output) if output.status.success() && output.stdout.trim() == "true" => {
                    return Ok(());
                }
                Ok(output) => debug!(
                    "Container {} not ready yet ({})",
                    handle.id,
                    output.stdout.trim()
                ),
                Err(e) => debug!("Readiness probe for {} failed: {}", handle.id, e),
            }

            if Instant::now() >= deadline {
                return Err(PipelineError::provisioning(
                    ErrorCode::PROVISION_TIMEOUT,
                    format!(
                        "container {} did not report running within {:?}",
                        handle.id, self.settings.provision_timeout
                    ),
                ));
            }
            tokio::time::sleep(READINESS_POLL_INTERVAL).await;
        }
    }

    fn remove_command(runtime: &str, handle: &ContainerHandle) -> ProcessCommand {
        ProcessCommandBuilder::new(runtime)
            .args(["rm", "--force", handle.id.as_str()])
            .build()
    }

    async fn remove(&self, handle: &ContainerHandle) {
        let command = Self::remove_command(&self.settings.runtime, handle);
        match self.subprocess.runner().run(command).await {
            Ok(output) if output.status.success() => {
                debug!("Removed container {}", handle.id)
            }
            Ok(output) => warn!(
                "Removing container {} returned {}: {}",
                handle.id,
                output.status,
                output.stderr.trim()
            ),
            Err(e) => warn!("Failed to remove container {}: {}", handle.id, e),
        }
    }
}

#[async_trait]
impl ExecutionEnvironment for ContainerSession {
    fn describe(&self) -> String {
        match &self.handle {
            Some(handle) => format!("container {} ({})", handle.name, self.settings.image),
            None => format!("container ({})", self.settings.image),
        }
    }

    fn runs_on_host(&self) -> bool {
        false
    }

    async fn prepare(&mut self, paths: &PathSet) -> Result<()> {
        let mounts = [VolumeMount::same_path(paths.session_dir())];
        self.provision(paths.uid(), &mounts).await?;
        self.workdir = Some(paths.session_dir().to_path_buf());
        Ok(())
    }

    async fn execute(&self, step: &str, tokens: &[String], output: OutputMode) -> Result<()> {
        let rendered = shell_words::join(tokens);
        let handle = match (&self.state, &self.handle) {
            (ContainerState::Active, Some(handle)) => handle,
            _ => {
                return Err(PipelineError::provisioning(
                    ErrorCode::PROVISION_NO_HANDLE,
                    format!("cannot run step '{}': no active container", step),
                ))
            }
        };

        let mut builder = ProcessCommandBuilder::new(&self.settings.runtime).arg("exec");
        if let Some(dir) = &self.workdir {
            builder = builder.arg("--workdir").arg(&dir.to_string_lossy());
        }
        let command = builder.arg(&handle.id).args(tokens).output(output).build();
        debug!("Running step '{}' in container: {}", step, command.display());

        let result = self
            .subprocess
            .runner()
            .run(command)
            .await
            .map_err(|e| step_error(step, &rendered, e))?;
        check_status(step, &rendered, &result.status)
    }

    async fn teardown(&mut self) {
        match self.state {
            ContainerState::Active => {
                if let Some(handle) = self.handle.take() {
                    info!("Removing container {}", handle.name);
                    self.remove(&handle).await;
                }
                self.state = ContainerState::TornDown;
            }
            ContainerState::Unprovisioned => self.state = ContainerState::TornDown,
            ContainerState::Provisioning | ContainerState::TornDown => {}
        }
    }
}

impl Drop for ContainerSession {
    fn drop(&mut self) {
        if self.state != ContainerState::Active {
            return;
        }
        let Some(handle) = self.handle.take() else {
            return;
        };
        warn!("Container {} still active on drop; removing it", handle.id);

        let runner = self.subprocess.runner();
        let command = Self::remove_command(&self.settings.runtime, &handle);
        let removal = async move {
            if let Err(e) = runner.run(command).await {
                warn!("Failed to remove container {}: {}", handle.id, e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(removal);
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt.block_on(removal),
                Err(e) => warn!("No runtime available to remove container: {}", e),
            },
        }
    }
}
