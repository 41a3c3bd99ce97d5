//! Pipeline Controller: composes ports, intake, build and transfer
//!
//! The controller owns a [`DeploySession`] holding the user's choices (the
//! selected port) and the derived state (latest port listing, current
//! sketch, last build). It adds no algorithm of its own beyond sequencing
//! and precondition checks; failures from the stages below are returned
//! unchanged and never retried here.
//!
//! # Deploy preconditions
//!
//! - Raw source: a selected port that is still attached and valid, plus a sketch
//! - Compiled image: the same port checks, plus a successful build of the
//!   current sketch
//!
//! A selected port is re-checked against a fresh enumeration at deploy time;
//! a port that vanished since selection is rejected with
//! [`DeployError::StalePort`] instead of being used.

use crate::build::BuildOrchestrator;
use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::intake::{ArtifactIntake, IntakeEvent, IntakeHandle};
use crate::ports::PortRegistry;
use crate::transfer::{read_payload, TransferEngine};
use crate::types::{Artifact, ArtifactKind, BuildResult, PortDescriptor, TransferReport};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Selection and derived state for one user session
#[derive(Debug, Clone, Default)]
pub struct DeploySession {
    selected_port: Option<String>,
    ports: Vec<PortDescriptor>,
    artifact: Option<Artifact>,
    build: Option<BuildResult>,
}

impl DeploySession {
    /// Path of the selected port, unchecked
    pub fn selected_port(&self) -> Option<&str> {
        self.selected_port.as_deref()
    }

    /// Ports from the latest enumeration
    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn build(&self) -> Option<&BuildResult> {
        self.build.as_ref()
    }

    /// Replace the sketch; any image built from the old one is discarded
    fn set_artifact(&mut self, artifact: Option<Artifact>) {
        let changed = match (&self.artifact, &artifact) {
            (Some(old), Some(new)) => old.path != new.path || new.received_at.is_some(),
            (None, None) => false,
            _ => true,
        };
        if changed && self.build.take().is_some() {
            tracing::debug!("Sketch changed, discarding previous build");
        }
        self.artifact = artifact;
    }
}

/// What can be done right now, for presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployState {
    pub selected_port: Option<String>,
    /// Selected port is in the latest listing and valid
    pub port_ready: bool,
    pub artifact: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub board: Option<String>,
    pub can_build: bool,
    pub can_deploy_source: bool,
    pub can_deploy_image: bool,
}

/// Drives the deployment pipeline
#[derive(Debug)]
pub struct PipelineController {
    registry: PortRegistry,
    intake: ArtifactIntake,
    builder: BuildOrchestrator,
    transfer: TransferEngine,
    session: DeploySession,
}

impl PipelineController {
    pub fn new(
        registry: PortRegistry,
        intake: ArtifactIntake,
        builder: BuildOrchestrator,
        transfer: TransferEngine,
    ) -> Self {
        Self {
            registry,
            intake,
            builder,
            transfer,
            session: DeploySession::default(),
        }
    }

    /// Controller wired to the OS serial ports and the real toolchain
    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(
            PortRegistry::system(&config.ports),
            ArtifactIntake::new(config.intake.clone()),
            BuildOrchestrator::with_process_runner(
                config.toolchain.clone(),
                config.intake.clone(),
            ),
            TransferEngine::system(config.ports.baud_rate),
        )
    }

    pub fn session(&self) -> &DeploySession {
        &self.session
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    // ==================== Refresh points ====================

    /// Re-enumerate ports
    pub async fn refresh_ports(&mut self) -> &[PortDescriptor] {
        self.session.ports = self.registry.list().await;
        &self.session.ports
    }

    /// Re-check the working directory for a sketch
    pub async fn refresh_artifact(&mut self) -> Option<&Artifact> {
        let current = self.intake.current().await;
        let unchanged = match (&self.session.artifact, &current) {
            (Some(old), Some(new)) => old.path == new.path,
            (None, None) => true,
            _ => false,
        };
        if !unchanged {
            self.session.set_artifact(current);
        }
        self.session.artifact.as_ref()
    }

    /// React to an intake notification
    pub fn handle_intake_event(&mut self, event: IntakeEvent) {
        match event {
            IntakeEvent::ArtifactUpdated(artifact) => {
                tracing::info!("Sketch updated: {:?}", artifact.path);
                self.session.set_artifact(Some(artifact));
            }
        }
    }

    /// Start the intake task, reporting into `events`
    pub fn start_intake(&self, events: mpsc::Sender<IntakeEvent>) -> IntakeHandle {
        self.intake.clone().spawn(events)
    }

    /// Run one intake tick and apply its result
    pub async fn poll_intake(&mut self) -> Result<Option<&Artifact>> {
        match self.intake.poll_once().await? {
            Some(artifact) => {
                self.handle_intake_event(IntakeEvent::ArtifactUpdated(artifact));
                Ok(self.session.artifact.as_ref())
            }
            None => Ok(None),
        }
    }

    // ==================== Operations ====================

    /// Select a port from the latest enumeration
    pub fn select_port(&mut self, path: &str) -> Result<&PortDescriptor> {
        let port = PortRegistry::find(&self.session.ports, path)
            .ok_or_else(|| DeployError::StalePort(path.to_string()))?;
        if !self.registry.validate(port) {
            return Err(DeployError::InvalidPort(path.to_string()));
        }

        tracing::info!("Selected port {}", port);
        self.session.selected_port = Some(path.to_string());
        Ok(port)
    }

    /// Select the most likely device port without user input
    pub fn auto_select_port(&mut self) -> Option<&PortDescriptor> {
        let path = self.registry.auto_select(&self.session.ports)?.path.clone();
        self.select_port(&path).ok()
    }

    /// Compile the current sketch
    pub async fn build(&mut self) -> Result<&BuildResult> {
        self.session.build = None;
        let result = self.builder.build().await?;
        Ok(self.session.build.insert(result))
    }

    /// Send the sketch source to the selected port
    pub async fn deploy_source(&mut self) -> Result<TransferReport> {
        let port = self.checked_port().await?;
        let artifact = self.refresh_artifact().await.map(|a| a.path.clone());
        let artifact = artifact
            .ok_or_else(|| DeployError::NoArtifact(self.intake.settings().artifact_path()))?;

        let payload = read_payload(&artifact, ArtifactKind::Source).await?;
        self.transfer.deploy(Some(&port), &payload).await
    }

    /// Send the compiled image to the selected port
    pub async fn deploy_image(&mut self) -> Result<TransferReport> {
        let port = self.checked_port().await?;
        let image = self
            .session
            .build
            .as_ref()
            .map(|b| b.image.path.clone())
            .ok_or(DeployError::NoImage)?;

        let payload = read_payload(&image, ArtifactKind::Image).await?;
        self.transfer.deploy(Some(&port), &payload).await
    }

    /// Deploy either kind of payload
    pub async fn deploy(&mut self, kind: ArtifactKind) -> Result<TransferReport> {
        match kind {
            ArtifactKind::Source => self.deploy_source().await,
            ArtifactKind::Image => self.deploy_image().await,
        }
    }

    /// Summary of what is currently possible
    pub fn state(&self) -> DeployState {
        let session = &self.session;
        let port_ready = session
            .selected_port()
            .and_then(|path| PortRegistry::find(&session.ports, path))
            .is_some_and(|port| self.registry.validate(port));
        let has_artifact = session.artifact.is_some();
        let build = session.build.as_ref();

        DeployState {
            selected_port: session.selected_port.clone(),
            port_ready,
            artifact: session.artifact.as_ref().map(|a| a.path.clone()),
            image: build.map(|b| b.image.path.clone()),
            board: build.map(|b| b.board.fqbn.clone()),
            can_build: has_artifact,
            can_deploy_source: port_ready && has_artifact,
            can_deploy_image: port_ready && build.is_some(),
        }
    }

    /// The selected port, re-validated against a fresh enumeration
    async fn checked_port(&mut self) -> Result<String> {
        let path = self
            .session
            .selected_port
            .clone()
            .ok_or(DeployError::PortRequired)?;

        self.refresh_ports().await;
        let port = PortRegistry::find(&self.session.ports, &path)
            .ok_or_else(|| DeployError::StalePort(path.clone()))?;
        if !self.registry.validate(port) {
            return Err(DeployError::InvalidPort(path));
        }

        Ok(path)
    }
}
