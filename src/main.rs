//! inodeploy - Main Entry Point
//!
//! Thin command-line surface over the deployment pipeline: list ports,
//! watch for downloaded sketches, build, deploy and report state.

use anyhow::Context;
use clap::{Parser, Subcommand};
use inodeploy::{
    config::{self, DeployConfig},
    ArtifactKind, PipelineController,
};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// inodeploy - deploy Arduino sketches over serial
#[derive(Debug, Parser)]
#[command(name = "inodeploy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write rolling log files to the app data directory
    #[arg(long, global = true)]
    log_to_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List serial ports and whether they look like devices
    Ports,

    /// Move downloaded sketches into the working directory
    Watch {
        /// Run a single intake tick and exit
        #[arg(long)]
        once: bool,
    },

    /// Detect the board and compile the current sketch
    Build,

    /// Send the sketch (or the compiled image) to a board
    Deploy {
        /// Serial port; auto-detected when omitted
        #[arg(short, long)]
        port: Option<String>,

        /// Compile first and send the image instead of the source
        #[arg(long)]
        image: bool,
    },

    /// Show what is currently deployable
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_dir = if cli.log_to_file { config::log_dir() } else { None };
    let _log_guard = inodeploy::logging::init(cli.verbose, log_dir.as_deref())?;

    let config = match cli.config {
        Some(ref path) => DeployConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DeployConfig::load_or_default(),
    };

    let mut pipeline = PipelineController::from_config(&config);

    match cli.command {
        Commands::Ports => list_ports(&mut pipeline).await,
        Commands::Watch { once } => watch(&mut pipeline, once).await,
        Commands::Build => {
            let result = pipeline.build().await?;
            println!("Built {} for {}", result.image.path.display(), result.board);
            Ok(())
        }
        Commands::Deploy { port, image } => deploy(&mut pipeline, port, image).await,
        Commands::Status { json } => status(&mut pipeline, json).await,
    }
}

async fn list_ports(pipeline: &mut PipelineController) -> anyhow::Result<()> {
    let ports = pipeline.refresh_ports().await.to_vec();
    if ports.is_empty() {
        println!("No ports available");
        return Ok(());
    }

    for port in &ports {
        let marker = if pipeline.registry().validate(port) { "ok" } else { "--" };
        println!(
            "[{}] {}  manufacturer={} vid={} pid={} serial={}",
            marker,
            port.path,
            port.manufacturer_or_unknown(),
            port.vendor_id_or_unknown(),
            port.product_id_or_unknown(),
            port.serial_number_or_unknown()
        );
    }
    Ok(())
}

async fn watch(pipeline: &mut PipelineController, once: bool) -> anyhow::Result<()> {
    if once {
        match pipeline.poll_intake().await? {
            Some(artifact) => println!("Received {}", artifact.path.display()),
            None => println!("Nothing to receive"),
        }
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(16);
    let handle = pipeline.start_intake(tx);
    tracing::info!("Watching for sketches, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = rx.recv() => match event {
                Some(event) => pipeline.handle_intake_event(event),
                None => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

async fn deploy(
    pipeline: &mut PipelineController,
    port: Option<String>,
    image: bool,
) -> anyhow::Result<()> {
    pipeline.refresh_ports().await;
    match port {
        Some(ref path) => {
            pipeline.select_port(path)?;
        }
        None => {
            if let Some(port) = pipeline.auto_select_port() {
                println!("Using {}", port);
            }
        }
    }

    let kind = if image {
        pipeline.build().await?;
        ArtifactKind::Image
    } else {
        ArtifactKind::Source
    };

    let report = pipeline.deploy(kind).await?;
    println!(
        "Sent {} bytes of {} to {} in {:.1?}",
        report.bytes_written, report.kind, report.port, report.elapsed
    );
    Ok(())
}

async fn status(pipeline: &mut PipelineController, json: bool) -> anyhow::Result<()> {
    pipeline.refresh_ports().await;
    pipeline.auto_select_port();
    pipeline.refresh_artifact().await;

    let state = pipeline.state();
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let show = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    };
    println!(
        "Port:   {}{}",
        state.selected_port.as_deref().unwrap_or("none"),
        if state.port_ready { "" } else { " (not ready)" }
    );
    println!("Sketch: {}", show(&state.artifact));
    println!("Image:  {}", show(&state.image));
    println!(
        "Can build: {}  deploy source: {}  deploy image: {}",
        state.can_build, state.can_deploy_source, state.can_deploy_image
    );
    Ok(())
}
