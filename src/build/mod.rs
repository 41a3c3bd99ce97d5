//! Build Orchestrator: board detection, compilation and image lookup
//!
//! A build runs four steps in order:
//!
//! 1. Require a sketch in the working directory ([`DeployError::NoArtifact`])
//! 2. Run the board-list tool and map its output to a [`BoardProfile`];
//!    unmatched output falls back to the configured default board
//! 3. Run the compiler with the board and the working directory as both
//!    source and output ([`DeployError::CompileFailed`] carries stderr verbatim)
//! 4. Locate the produced image ([`DeployError::ArtifactMissing`] if none)
//!
//! When several images match the extension, the lexicographically first
//! file name is used. With arduino-cli this picks `sketch.ino.hex` over
//! `sketch.ino.with_bootloader.hex`.

pub mod board;
pub mod runner;

pub use board::match_board;
pub use runner::{ProcessRunner, ToolCommand, ToolOutput, ToolRunner};

use crate::config::{IntakeSettings, ToolchainSettings};
use crate::error::{DeployError, Result};
use crate::intake::current_artifact;
use crate::types::{Artifact, ArtifactKind, BoardProfile, BuildResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Detects the board, compiles the sketch and finds the image
#[derive(Clone)]
pub struct BuildOrchestrator {
    runner: Arc<dyn ToolRunner>,
    toolchain: ToolchainSettings,
    intake: IntakeSettings,
}

impl BuildOrchestrator {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        toolchain: ToolchainSettings,
        intake: IntakeSettings,
    ) -> Self {
        Self {
            runner,
            toolchain,
            intake,
        }
    }

    /// Orchestrator running the real toolchain
    pub fn with_process_runner(toolchain: ToolchainSettings, intake: IntakeSettings) -> Self {
        Self::new(Arc::new(ProcessRunner), toolchain, intake)
    }

    pub fn working_dir(&self) -> &Path {
        &self.intake.working_dir
    }

    /// Compile the current sketch
    pub async fn build(&self) -> Result<BuildResult> {
        let sketch = current_artifact(&self.intake)
            .await
            .ok_or_else(|| DeployError::NoArtifact(self.intake.artifact_path()))?;

        tracing::info!("Building {:?}", sketch.path);

        let board = self.detect_board().await?;
        self.compile(&board).await?;
        let image = self.find_image().await?;

        tracing::info!("Built {:?} for {}", image.path, board);
        Ok(BuildResult {
            image,
            board,
            built_at: chrono::Local::now(),
        })
    }

    /// Identify the attached board, falling back to the default
    pub async fn detect_board(&self) -> Result<BoardProfile> {
        let command = ToolCommand::new(&self.toolchain.program, self.toolchain.detect_timeout())
            .args(self.toolchain.board_list_args.iter().cloned());

        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(e @ DeployError::Timeout { .. }) => return Err(e),
            Err(e) => return Err(DeployError::BoardDetectionFailed(e.to_string())),
        };

        if !output.success {
            return Err(DeployError::BoardDetectionFailed(format!(
                "{} exited with {:?}: {}",
                command.display(),
                output.code,
                output.stderr.trim()
            )));
        }

        match match_board(&output.stdout, &self.toolchain.boards) {
            Some(board) => {
                tracing::info!("Detected board {} (matched {:?})", board.fqbn, board.token);
                Ok(BoardProfile::detected(&board.fqbn))
            }
            None => {
                tracing::warn!(
                    "No known board detected, falling back to default {}",
                    self.toolchain.default_fqbn
                );
                Ok(BoardProfile::fallback(&self.toolchain.default_fqbn))
            }
        }
    }

    async fn compile(&self, board: &BoardProfile) -> Result<()> {
        self.remove_stale_images().await?;

        let dir = self.intake.working_dir.to_string_lossy().into_owned();
        let command = ToolCommand::new(&self.toolchain.program, self.toolchain.compile_timeout())
            .args(self.toolchain.compile_args.iter().cloned())
            .args(["--fqbn", board.fqbn.as_str(), "--output-dir", dir.as_str(), dir.as_str()])
            .current_dir(&self.intake.working_dir);

        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(e @ DeployError::Timeout { .. }) => return Err(e),
            Err(e) => {
                return Err(DeployError::CompileFailed {
                    code: None,
                    stderr: e.to_string(),
                })
            }
        };

        if !output.success {
            tracing::warn!("Compilation failed with {:?}", output.code);
            return Err(DeployError::CompileFailed {
                code: output.code,
                stderr: output.stderr,
            });
        }

        Ok(())
    }

    /// Locate the compiled image in the working directory
    pub async fn find_image(&self) -> Result<Artifact> {
        let mut images = self.list_images().await?;
        if images.is_empty() {
            return Err(DeployError::ArtifactMissing {
                dir: self.intake.working_dir.clone(),
                extension: self.toolchain.image_extension.clone(),
            });
        }

        images.sort();
        if images.len() > 1 {
            tracing::warn!(
                "{} images found, using {:?}",
                images.len(),
                images[0].file_name().unwrap_or_default()
            );
        }

        Ok(Artifact::new(images.swap_remove(0), ArtifactKind::Image))
    }

    async fn list_images(&self) -> Result<Vec<PathBuf>> {
        let mut images = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.intake.working_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(images),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .is_some_and(|ext| ext == self.toolchain.image_extension.as_str());
            if matches && entry.file_type().await?.is_file() {
                images.push(path);
            }
        }

        Ok(images)
    }

    /// Images left by an earlier build must not be mistaken for fresh output
    async fn remove_stale_images(&self) -> Result<()> {
        for image in self.list_images().await? {
            tracing::debug!("Removing stale image {:?}", image);
            tokio::fs::remove_file(&image).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for BuildOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("toolchain", &self.toolchain)
            .field("intake", &self.intake)
            .finish_non_exhaustive()
    }
}
