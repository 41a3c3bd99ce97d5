//! Recording fakes for the pipeline's collaborators

use async_trait::async_trait;
use inodeploy::build::{ToolCommand, ToolOutput, ToolRunner};
use inodeploy::ports::PortEnumerator;
use inodeploy::transfer::{SerialLink, SerialTransport};
use inodeploy::{PortDescriptor, Result};
use std::io;
use std::sync::{Arc, Mutex};

/// Enumerator whose port list tests can change between calls
#[derive(Clone, Default)]
pub struct FakeEnumerator {
    ports: Arc<Mutex<Vec<PortDescriptor>>>,
}

impl FakeEnumerator {
    pub fn with_ports(ports: Vec<PortDescriptor>) -> Self {
        Self {
            ports: Arc::new(Mutex::new(ports)),
        }
    }

    pub fn set_ports(&self, ports: Vec<PortDescriptor>) {
        *self.ports.lock().unwrap() = ports;
    }
}

#[async_trait]
impl PortEnumerator for FakeEnumerator {
    async fn enumerate(&self) -> Result<Vec<PortDescriptor>> {
        Ok(self.ports.lock().unwrap().clone())
    }
}

/// One observed serial operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialCall {
    Open { path: String, baud_rate: u32 },
    Write(Vec<u8>),
    Drain,
    Close,
}

/// Serial transport that records every call
#[derive(Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<SerialCall>>>,
    fail_writes: bool,
}

impl RecordingTransport {
    /// Transport whose links reject every write
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<SerialCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Bytes written across all transfers
    pub fn written(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SerialCall::Write(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[async_trait]
impl SerialTransport for RecordingTransport {
    async fn open(&self, path: &str, baud_rate: u32) -> io::Result<Box<dyn SerialLink>> {
        self.calls.lock().unwrap().push(SerialCall::Open {
            path: path.to_string(),
            baud_rate,
        });
        Ok(Box::new(RecordingLink {
            calls: Arc::clone(&self.calls),
            fail_writes: self.fail_writes,
        }))
    }
}

struct RecordingLink {
    calls: Arc<Mutex<Vec<SerialCall>>>,
    fail_writes: bool,
}

#[async_trait]
impl SerialLink for RecordingLink {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.calls.lock().unwrap().push(SerialCall::Write(bytes.to_vec()));
        Ok(())
    }

    async fn drain(&mut self) -> io::Result<()> {
        self.calls.lock().unwrap().push(SerialCall::Drain);
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.calls.lock().unwrap().push(SerialCall::Close);
        Ok(())
    }
}

/// Toolchain that answers board-list with fixed text and "compiles" by
/// dropping an image into the output directory
#[derive(Clone)]
pub struct FakeToolchain {
    board_list: String,
    image: Option<(String, Vec<u8>)>,
    compile_error: Option<String>,
    commands: Arc<Mutex<Vec<ToolCommand>>>,
}

impl FakeToolchain {
    pub fn new(board_list: &str) -> Self {
        Self {
            board_list: board_list.to_string(),
            image: Some(("sketch.ino.hex".to_string(), b":00000001FF\n".to_vec())),
            compile_error: None,
            commands: Arc::default(),
        }
    }

    /// Compiler exits 1 with the given stderr
    pub fn failing_compile(mut self, stderr: &str) -> Self {
        self.compile_error = Some(stderr.to_string());
        self
    }

    /// Compiler succeeds without producing an image
    pub fn without_image(mut self) -> Self {
        self.image = None;
        self
    }

    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        self.image.as_ref().map(|(_, bytes)| bytes.clone())
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for FakeToolchain {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.commands.lock().unwrap().push(command.clone());

        if command.args.first().map(String::as_str) == Some("board") {
            return Ok(ToolOutput::ok(self.board_list.clone()));
        }

        if let Some(stderr) = &self.compile_error {
            return Ok(ToolOutput::failed(1, stderr.clone()));
        }

        if let (Some(dir), Some((name, bytes))) = (&command.cwd, &self.image) {
            std::fs::write(dir.join(name), bytes)?;
        }
        Ok(ToolOutput::ok("Sketch uses 444 bytes (1%) of program storage space."))
    }
}
