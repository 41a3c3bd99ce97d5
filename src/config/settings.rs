//! Configuration sections for the deployment pipeline
//!
//! Each component reads its own section of [`DeployConfig`](super::DeployConfig):
//!
//! - [`PortSettings`] - Exclusion list and baud rate for the Port Registry / Transfer Engine
//! - [`IntakeSettings`] - Watched download path, working directory and poll interval
//! - [`ToolchainSettings`] - External tool command lines, board mappings and timeouts
//!
//! Every field has a serde default so partial config files load cleanly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Baud rate expected by the sketch loader on the device
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default intake poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

/// Default logical artifact name
pub const DEFAULT_ARTIFACT_NAME: &str = "sketch.ino";

/// Fallback board when detection finds nothing
pub const DEFAULT_FQBN: &str = "arduino:avr:uno";

// ==================== Ports ====================

/// Port Registry and serial transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSettings {
    /// Port paths that are never device interfaces (onboard UARTs, Bluetooth bridges)
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// Baud rate used to open the serial link
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_exclusions() -> Vec<String> {
    vec![
        "/dev/ttyS0".to_string(),
        "/dev/cu.Bluetooth-Incoming-Port".to_string(),
        "/dev/tty.Bluetooth-Incoming-Port".to_string(),
    ]
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            exclusions: default_exclusions(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

// ==================== Intake ====================

/// Artifact Intake settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSettings {
    /// File to watch for (usually in the browser's download folder)
    #[serde(default = "default_watch_path")]
    pub watch_path: PathBuf,

    /// Sketch folder the build and transfer stages read from
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Name the artifact is given inside the working directory
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,

    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_watch_path() -> PathBuf {
    dirs_next::download_dir()
        .or_else(dirs_next::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_ARTIFACT_NAME)
}

fn default_working_dir() -> PathBuf {
    dirs_next::document_dir()
        .or_else(dirs_next::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inodeploy")
        .join("sketch")
}

fn default_artifact_name() -> String {
    DEFAULT_ARTIFACT_NAME.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            watch_path: default_watch_path(),
            working_dir: default_working_dir(),
            artifact_name: default_artifact_name(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl IntakeSettings {
    /// Poll interval as a Duration (never zero)
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Full path of the artifact inside the working directory
    pub fn artifact_path(&self) -> PathBuf {
        self.working_dir.join(&self.artifact_name)
    }

    /// Extension of the artifact name, used to ignore unrelated downloads
    pub fn artifact_extension(&self) -> Option<&str> {
        std::path::Path::new(&self.artifact_name)
            .extension()
            .and_then(|e| e.to_str())
    }
}

// ==================== Toolchain ====================

/// Maps a token seen in the board-list output to a board profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMapping {
    /// Substring searched for in each output line
    pub token: String,
    /// Fully-qualified board name passed to the compiler
    pub fqbn: String,
}

impl BoardMapping {
    pub fn new(token: impl Into<String>, fqbn: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            fqbn: fqbn.into(),
        }
    }
}

/// External toolchain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainSettings {
    /// Toolchain executable
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments listing connected boards
    #[serde(default = "default_board_list_args")]
    pub board_list_args: Vec<String>,

    /// Arguments preceding `--fqbn` for a compile
    #[serde(default = "default_compile_args")]
    pub compile_args: Vec<String>,

    /// Board used when detection matches nothing
    #[serde(default = "default_fqbn")]
    pub default_fqbn: String,

    /// Known boards, highest priority first
    #[serde(default = "default_boards")]
    pub boards: Vec<BoardMapping>,

    /// Extension of the compiled image
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Time budget for the board-list subprocess
    #[serde(default = "default_detect_timeout_secs")]
    pub detect_timeout_secs: u64,

    /// Time budget for the compiler subprocess
    #[serde(default = "default_compile_timeout_secs")]
    pub compile_timeout_secs: u64,
}

fn default_program() -> String {
    "arduino-cli".to_string()
}

fn default_board_list_args() -> Vec<String> {
    vec!["board".to_string(), "list".to_string()]
}

fn default_compile_args() -> Vec<String> {
    vec!["compile".to_string()]
}

fn default_fqbn() -> String {
    DEFAULT_FQBN.to_string()
}

fn default_boards() -> Vec<BoardMapping> {
    vec![
        BoardMapping::new("arduino:avr:uno", "arduino:avr:uno"),
        BoardMapping::new("arduino:avr:mega", "arduino:avr:mega"),
        BoardMapping::new("arduino:avr:nano", "arduino:avr:nano"),
        BoardMapping::new("arduino:avr:leonardo", "arduino:avr:leonardo"),
        BoardMapping::new("arduino:avr:micro", "arduino:avr:micro"),
    ]
}

fn default_image_extension() -> String {
    "hex".to_string()
}

fn default_detect_timeout_secs() -> u64 {
    30
}

fn default_compile_timeout_secs() -> u64 {
    300
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            board_list_args: default_board_list_args(),
            compile_args: default_compile_args(),
            default_fqbn: default_fqbn(),
            boards: default_boards(),
            image_extension: default_image_extension(),
            detect_timeout_secs: default_detect_timeout_secs(),
            compile_timeout_secs: default_compile_timeout_secs(),
        }
    }
}

impl ToolchainSettings {
    pub fn detect_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_timeout_secs)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }
}
