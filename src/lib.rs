//! # inodeploy: Arduino sketch deployment pipeline
//!
//! Gets a user's sketch from the browser's download folder onto an attached
//! Arduino-class board over serial.
//!
//! ## Architecture
//!
//! - **Ports**: enumerates serial ports and decides which are real devices
//! - **Intake**: moves downloaded sketches into a stable working directory
//! - **Build**: detects the board and runs `arduino-cli` against the working directory
//! - **Transfer**: open → write → drain → close over a 9600 baud serial link
//! - **Pipeline**: composes the above and tracks what is deployable right now
//!
//! All I/O (enumeration, subprocesses, serial, filesystem) is async on tokio.
//! The intake runs as its own cancellable task and reports through a channel.
//!
//! ## Configuration
//!
//! Settings live in `config.toml` under the platform config directory
//! (`dev.inodeploy`); see [`config`].
//!
//! ## Example
//!
//! ```ignore
//! use inodeploy::{config::DeployConfig, pipeline::PipelineController};
//!
//! #[tokio::main]
//! async fn main() -> inodeploy::Result<()> {
//!     let config = DeployConfig::load_or_default();
//!     let mut pipeline = PipelineController::from_config(&config);
//!
//!     pipeline.refresh_ports().await;
//!     pipeline.select_port("/dev/ttyACM0")?;
//!     pipeline.build().await?;
//!     pipeline.deploy_image().await?;
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod pipeline;
pub mod ports;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use build::BuildOrchestrator;
pub use config::DeployConfig;
pub use error::{DeployError, ErrorKind, Result};
pub use intake::{ArtifactIntake, IntakeEvent, IntakeHandle};
pub use pipeline::{DeployState, PipelineController};
pub use ports::PortRegistry;
pub use transfer::TransferEngine;
pub use types::{Artifact, ArtifactKind, BoardProfile, BuildResult, Payload, PortDescriptor};
