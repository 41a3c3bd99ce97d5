//! Artifact Intake: moves downloaded sketches into the working directory
//!
//! The intake watches one well-known path outside this process's control
//! (normally the browser's download folder). On every tick where a file
//! exists there, it is *moved* (renamed, not copied) into the working
//! directory under the fixed artifact name, replacing any previous sketch.
//! Each successful move emits [`IntakeEvent::ArtifactUpdated`].
//!
//! # Lifecycle
//!
//! [`ArtifactIntake::spawn`] starts the periodic task on the tokio runtime
//! and returns an [`IntakeHandle`]. Dropping or stopping the handle cancels
//! the task. A failed move is logged and retried on the next tick; it never
//! ends the task.
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//! let handle = ArtifactIntake::new(config.intake.clone()).spawn(tx);
//!
//! while let Some(IntakeEvent::ArtifactUpdated(artifact)) = rx.recv().await {
//!     println!("new sketch at {:?}", artifact.path);
//! }
//! handle.shutdown().await;
//! ```

use crate::config::IntakeSettings;
use crate::error::{DeployError, Result};
use crate::types::{Artifact, ArtifactKind};
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Notification sent by the intake task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeEvent {
    /// A new sketch replaced the artifact in the working directory
    ArtifactUpdated(Artifact),
}

/// Relocates incoming sketches into the working directory
#[derive(Debug, Clone)]
pub struct ArtifactIntake {
    settings: IntakeSettings,
}

impl ArtifactIntake {
    pub fn new(settings: IntakeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    /// The artifact currently in the working directory, if any
    pub async fn current(&self) -> Option<Artifact> {
        current_artifact(&self.settings).await
    }

    /// Run one intake tick.
    ///
    /// Returns the relocated artifact, or `None` when nothing was waiting.
    pub async fn poll_once(&self) -> Result<Option<Artifact>> {
        let source = &self.settings.watch_path;
        if !tokio::fs::try_exists(source).await? {
            return Ok(None);
        }

        let working_dir = &self.settings.working_dir;
        tokio::fs::create_dir_all(working_dir).await.map_err(|e| {
            DeployError::Io(e).with_context(format!("Failed to create {:?}", working_dir))
        })?;

        let target = self.settings.artifact_path();
        tokio::fs::rename(source, &target).await.map_err(|e| {
            DeployError::Io(e).with_context(format!("Failed to move {:?} to {:?}", source, target))
        })?;

        tracing::info!("Moved {:?} to {:?}", source, target);
        Ok(Some(Artifact::new(target, ArtifactKind::Source).received_now()))
    }

    /// Start polling on the current tokio runtime
    pub fn spawn(self, events: mpsc::Sender<IntakeEvent>) -> IntakeHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(events, token.clone()));
        IntakeHandle { token, task: Some(task) }
    }

    async fn run(self, events: mpsc::Sender<IntakeEvent>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            "Watching {:?} every {:?}",
            self.settings.watch_path,
            self.settings.poll_interval()
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.poll_once().await {
                Ok(Some(artifact)) => {
                    if events.send(IntakeEvent::ArtifactUpdated(artifact)).await.is_err() {
                        tracing::debug!("Intake event receiver dropped");
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Intake tick failed, retrying next tick: {}", e),
            }
        }

        tracing::debug!("Intake stopped");
    }
}

/// Look up the artifact in the working directory
pub(crate) async fn current_artifact(settings: &IntakeSettings) -> Option<Artifact> {
    let path = settings.artifact_path();
    is_file(&path)
        .await
        .then(|| Artifact::new(path, ArtifactKind::Source))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Handle to a running intake task; cancels the task on drop
#[derive(Debug)]
pub struct IntakeHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl IntakeHandle {
    /// Request the task to stop after its current tick
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Intake task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for IntakeHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn settings_in(dir: &TempDir) -> IntakeSettings {
        IntakeSettings {
            watch_path: dir.path().join("downloads").join("sketch.ino"),
            working_dir: dir.path().join("projects").join("sketch"),
            artifact_name: "sketch.ino".to_string(),
            poll_interval_ms: 10,
        }
    }

    fn drop_download(settings: &IntakeSettings, content: &str) {
        let parent: PathBuf = settings.watch_path.parent().unwrap().into();
        std::fs::create_dir_all(parent).unwrap();
        std::fs::write(&settings.watch_path, content).unwrap();
    }

    #[tokio::test]
    async fn test_nothing_waiting() {
        let dir = tempdir().unwrap();
        let intake = ArtifactIntake::new(settings_in(&dir));

        assert!(intake.poll_once().await.unwrap().is_none());
        assert!(intake.current().await.is_none());
        assert!(!intake.settings().working_dir.exists());
    }

    #[tokio::test]
    async fn test_moves_into_new_working_dir() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        drop_download(&settings, "void setup(){}\nvoid loop(){}\n");

        let intake = ArtifactIntake::new(settings.clone());
        let artifact = intake.poll_once().await.unwrap().unwrap();

        assert_eq!(artifact.path, settings.artifact_path());
        assert_eq!(artifact.kind, ArtifactKind::Source);
        assert!(artifact.received_at.is_some());
        assert!(!settings.watch_path.exists());

        let entries: Vec<_> = std::fs::read_dir(&settings.working_dir)
            .unwrap()
            .collect::<std::io::Result<_>>()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            std::fs::read_to_string(settings.artifact_path()).unwrap(),
            "void setup(){}\nvoid loop(){}\n"
        );
        assert_eq!(intake.current().await.unwrap().path, settings.artifact_path());
    }

    #[tokio::test]
    async fn test_second_download_overwrites() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let intake = ArtifactIntake::new(settings.clone());

        drop_download(&settings, "first");
        intake.poll_once().await.unwrap();
        drop_download(&settings, "second");
        intake.poll_once().await.unwrap();

        let entries = std::fs::read_dir(&settings.working_dir).unwrap().count();
        assert_eq!(entries, 1);
        assert_eq!(std::fs::read_to_string(settings.artifact_path()).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_spawned_task_emits_and_stops() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let (tx, mut rx) = mpsc::channel(4);

        let handle = ArtifactIntake::new(settings.clone()).spawn(tx);
        drop_download(&settings, "blink");

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("intake should emit within the timeout")
            .expect("channel open");
        let IntakeEvent::ArtifactUpdated(artifact) = event;
        assert_eq!(artifact.path, settings.artifact_path());

        handle.shutdown().await;
        assert!(rx.recv().await.is_none(), "sender dropped with the task");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_move_failure_keeps_polling() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(&dir);
        // A regular file where the working directory should be makes every move fail
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        settings.working_dir = blocker.join("sketch");
        drop_download(&settings, "stuck");

        let intake = ArtifactIntake::new(settings.clone());
        assert!(intake.poll_once().await.is_err());

        let (tx, _rx) = mpsc::channel(4);
        let handle = intake.spawn(tx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_stopped());
        assert!(settings.watch_path.exists(), "source left in place for retry");
        handle.shutdown().await;
    }
}
