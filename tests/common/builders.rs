//! Test data builders for creating test objects

use super::fakes::{FakeEnumerator, FakeToolchain, RecordingTransport};
use inodeploy::config::{IntakeSettings, PortSettings, ToolchainSettings};
use inodeploy::{
    ArtifactIntake, BuildOrchestrator, PipelineController, PortDescriptor, PortRegistry,
    TransferEngine,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Temporary download folder + working directory pair
pub struct Workspace {
    pub dir: TempDir,
    pub intake: IntakeSettings,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_artifact_name("sketch.ino")
    }

    pub fn with_artifact_name(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let intake = IntakeSettings {
            watch_path: dir.path().join("Downloads").join(name),
            working_dir: dir.path().join("projects").join("sketch"),
            artifact_name: name.to_string(),
            poll_interval_ms: 20,
        };
        Self { dir, intake }
    }

    /// Simulate the browser finishing a download
    pub fn download(&self, content: &str) {
        let parent = self.intake.watch_path.parent().expect("watch path has a parent");
        std::fs::create_dir_all(parent).expect("create download dir");
        std::fs::write(&self.intake.watch_path, content).expect("write download");
    }
}

/// Builder wiring a [`PipelineController`] to fakes
pub struct PipelineBuilder {
    ports: Vec<PortDescriptor>,
    exclusions: Vec<String>,
    toolchain: FakeToolchain,
    transport: RecordingTransport,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            ports: Vec::new(),
            exclusions: Vec::new(),
            toolchain: FakeToolchain::new(""),
            transport: RecordingTransport::default(),
        }
    }

    pub fn port(mut self, port: PortDescriptor) -> Self {
        self.ports.push(port);
        self
    }

    pub fn exclude(mut self, path: &str) -> Self {
        self.exclusions.push(path.to_string());
        self
    }

    pub fn toolchain(mut self, toolchain: FakeToolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn transport(mut self, transport: RecordingTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Build the controller; the returned enumerator can replug ports later
    pub fn build(self, workspace: &Workspace) -> (PipelineController, FakeEnumerator) {
        let settings = PortSettings {
            exclusions: self.exclusions,
            ..Default::default()
        };
        let enumerator = FakeEnumerator::with_ports(self.ports);

        let controller = PipelineController::new(
            PortRegistry::new(Arc::new(enumerator.clone()), &settings),
            ArtifactIntake::new(workspace.intake.clone()),
            BuildOrchestrator::new(
                Arc::new(self.toolchain),
                ToolchainSettings::default(),
                workspace.intake.clone(),
            ),
            TransferEngine::new(Arc::new(self.transport), settings.baud_rate),
        );
        (controller, enumerator)
    }
}
