//! tonegend daemon

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use tonegend::{
    config::DaemonConfig,
    core::{DaemonEvent, ToneDaemon},
    services::ControlService,
    tone::Standard,
    utils::setup_logging,
    Result,
};

#[derive(Parser)]
#[command(name = "tonegend")]
#[command(about = "Call-progress and DTMF tone generator")]
#[command(version = tonegend::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "TONEGEND_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Indicator standard (cept, ansi, atnt, japan)
    #[arg(short, long)]
    standard: Option<Standard>,

    /// Write raw PCM per stream into this directory
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start,
    /// Validate configuration
    ValidateConfig,
    /// Generate default configuration
    GenerateConfig {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(&cli)?;

    // Held until exit so buffered log lines reach the file
    let _log_guard = setup_logging(&config.logging)?;

    info!("Starting {} v{}", tonegend::NAME, tonegend::VERSION);
    info!("Description: {}", tonegend::DESCRIPTION);

    match &cli.command {
        Some(Commands::Start) | None => run_daemon(config).await,
        Some(Commands::ValidateConfig) => validate_configuration(&config),
        Some(Commands::GenerateConfig { output }) => generate_default_config(output.clone()),
    }
}

fn load_configuration(cli: &Cli) -> Result<DaemonConfig> {
    let mut config = match &cli.config {
        Some(config_path) => DaemonConfig::load_from_file(config_path)?,
        None => DaemonConfig::load_from_env().unwrap_or_else(|_| DaemonConfig::default_config()),
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(standard) = cli.standard {
        config.indicator.standard = standard;
    }
    if let Some(dir) = &cli.output_dir {
        config.audio.output_dir = Some(dir.display().to_string());
    }

    config.validate()?;
    Ok(config)
}

async fn run_daemon(config: DaemonConfig) -> Result<()> {
    info!("Initializing tone daemon");

    let mut daemon = ToneDaemon::new(config.clone())?;
    let mut event_rx = daemon
        .take_event_receiver()
        .ok_or_else(|| tonegend::Error::internal("Failed to get event receiver"))?;

    let mut control = if config.control.enabled {
        let mut service = ControlService::new(config.control.clone(), daemon.handle());
        service.start().await?;
        Some(service)
    } else {
        warn!("Control service disabled, no remote calls will be accepted");
        None
    };

    let event_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            handle_daemon_event(event);
        }
    });

    daemon
        .run(async {
            match signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down gracefully"),
                Err(err) => error!("Unable to listen for shutdown signal: {}", err),
            }
        })
        .await?;

    if let Some(service) = control.as_mut() {
        service.stop();
    }
    drop(daemon);
    let _ = event_task.await;

    info!("tonegend shutdown complete");
    Ok(())
}

fn handle_daemon_event(event: DaemonEvent) {
    match event {
        DaemonEvent::Started => info!("Tone daemon started"),
        DaemonEvent::Stopped => info!("Tone daemon stopped"),
        DaemonEvent::CallCompleted {
            sender,
            method,
            error: None,
        } => info!("{} from '{}' completed", method, sender),
        DaemonEvent::CallCompleted {
            sender,
            method,
            error: Some(error),
        } => warn!("{} from '{}' rejected: {}", method, sender, error),
    }
}

fn validate_configuration(config: &DaemonConfig) -> Result<()> {
    config.validate()?;

    println!("✓ Configuration is valid");
    println!("  Sample rate:      {} Hz", config.audio.sample_rate);
    println!("  Buffer:           {} ms", config.audio.buffer_ms);
    println!("  Standard:         {}", config.indicator.standard);
    println!("  Volume scale:     {}%", config.indicator.volume_scale);
    println!("  Indicator stream: {}", config.indicator.stream);
    if config.control.enabled {
        println!(
            "  Control:          {}:{}",
            config.control.bind_address, config.control.port
        );
    } else {
        println!("  Control:          disabled");
    }

    Ok(())
}

fn generate_default_config(output_path: Option<PathBuf>) -> Result<()> {
    let config = DaemonConfig::default_config();
    let toml_content = toml::to_string_pretty(&config)
        .map_err(|e| tonegend::Error::internal(format!("Failed to serialize config: {}", e)))?;

    match output_path {
        Some(path) => {
            std::fs::write(&path, toml_content)?;
            println!("✓ Default configuration written to: {}", path.display());
        }
        None => {
            println!("{}", toml_content);
        }
    }

    Ok(())
}
