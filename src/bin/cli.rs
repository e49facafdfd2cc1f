//! tonegen-cli: issue remote calls to a running tonegend

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use tonegend::protocols::dtmf::{event_digit, DTMF_MAX};
use tonegend::protocols::rfc4733::{indicator_kind, linear_volume, Arg};
use tonegend::services::{ControlRequest, ControlResponse};
use tonegend::tone::Standard;

#[derive(Parser)]
#[command(name = "tonegen-cli")]
#[command(about = "Tone generator control tool")]
#[command(version = tonegend::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon host to connect to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Control port
    #[arg(short, long, default_value = "5577")]
    port: u16,

    /// Caller identity; defaults to the connection's address
    #[arg(short, long)]
    sender: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a DTMF or indicator tone by telephone-event code
    Start {
        /// Event code (0-15 DTMF, 66 dial, 72 busy, ...)
        event: u32,
        /// Power level in dBm0 (0 to -63)
        #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
        level: i32,
        /// Duration in milliseconds, 0 for until stopped
        #[arg(short, long, default_value = "0")]
        duration: u32,
    },
    /// Stop the tone this caller started
    Stop,
    /// Stop the DTMF or indicator tone selected by an event code
    StopEvent {
        event: u32,
    },
    /// Select the national indicator standard
    SetStandard {
        standard: Standard,
    },
    /// Scale indicator volume (percent)
    SetVolume {
        percent: u32,
    },
    /// Set stream properties (key=value pairs)
    SetProperties {
        properties: String,
    },
    /// List the supported event codes
    Events,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (method, args) = match &cli.command {
        Commands::Start { event, level, duration } => {
            println!(
                "Starting event {} at {} dBm0 (volume {}) for {}",
                describe_event(*event).bold(),
                level,
                linear_volume(*level),
                if *duration == 0 {
                    "until stopped".to_string()
                } else {
                    format!("{} ms", duration)
                }
            );
            (
                "StartEventTone",
                vec![Arg::U32(*event), Arg::I32(*level), Arg::U32(*duration)],
            )
        }
        Commands::Stop => ("StopTone", vec![]),
        Commands::StopEvent { event } => ("StopEventTone", vec![Arg::U32(*event)]),
        Commands::SetStandard { standard } => ("SetStandard", vec![Arg::I32(*standard as i32)]),
        Commands::SetVolume { percent } => ("SetVolume", vec![Arg::U32(*percent)]),
        Commands::SetProperties { properties } => {
            ("SetProperties", vec![Arg::from(properties.as_str())])
        }
        Commands::Events => {
            show_events();
            return Ok(());
        }
    };

    let request = ControlRequest {
        sender: cli.sender.clone(),
        method: method.to_string(),
        args,
    };

    let response = send_request(&cli.host, cli.port, &request).await?;
    if response.ok {
        println!("{} {}", "✓".green(), method);
        Ok(())
    } else {
        let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
        println!("{} {}: {}", "✗".red(), method, reason.red());
        bail!("{} rejected", method)
    }
}

async fn send_request(host: &str, port: u16, request: &ControlRequest) -> Result<ControlResponse> {
    let stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("cannot connect to tonegend at {}:{}", host, port))?;
    let (reader, mut writer) = stream.into_split();

    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    writer.write_all(&line).await?;

    let mut lines = BufReader::new(reader).lines();
    let reply = lines
        .next_line()
        .await?
        .context("connection closed before a reply arrived")?;

    serde_json::from_str(&reply).context("malformed reply")
}

fn describe_event(event: u32) -> String {
    match (event_digit(event), indicator_kind(event)) {
        (Some(digit), _) => format!("{} (DTMF '{}')", event, digit),
        (None, Some(kind)) => format!("{} ({})", event, kind),
        (None, None) => format!("{} (unknown)", event),
    }
}

fn show_events() {
    println!("{}", "Telephone events".bold().blue());
    println!();

    println!("{:<8} {:<16}", "Code".bold(), "Tone".bold());
    println!("{}", "─".repeat(26));
    for event in 0..DTMF_MAX {
        if let Some(digit) = event_digit(event) {
            println!("{:<8} DTMF '{}'", event, digit);
        }
    }
    for event in [66, 70, 72, 73, 74, 79, 256, 257] {
        if let Some(kind) = indicator_kind(event) {
            println!("{:<8} {}", event, kind.to_string().green());
        }
    }
}
