//! mPOS developer CLI
//!
//! Offline frame encoding/decoding, command building, and a driver for a
//! terminal reachable through a line-oriented TCP bridge.

mod tcp_transport;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mpos_core::{
    event_channel, FrameCodec, Notifier, PosCommand, PosSession, RefundCheck, ResponseDecoder,
    SessionConfig, TerminalResponse,
};
use tcp_transport::TcpBridgeTransport;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// mPOS CLI - Payment terminal command tool
#[derive(Parser, Debug)]
#[command(name = "mpos-cli")]
#[command(author = "mPOS Integrado Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build, encode and send payment terminal commands", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Session config JSON (defaults to <config dir>/mpos/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Frame a raw command body and print it as hex
    Encode { command: String },

    /// Decode a raw hex response
    Decode {
        hex: String,
        /// Also print how many characters were skipped
        #[arg(long)]
        report: bool,
    },

    /// Validate operator input and print the framed command
    Build {
        operation: Operation,
        #[command(flatten)]
        input: OperatorInput,
    },

    /// Connect to a TCP bridge and run operations in order
    Send {
        /// Bridge address (host:port)
        #[arg(short, long)]
        connect: String,
        #[arg(required = true)]
        operations: Vec<Operation>,
        #[command(flatten)]
        input: OperatorInput,
    },
}

#[derive(clap::Args, Debug, Default)]
struct OperatorInput {
    /// Sale amount
    #[arg(long)]
    amount: Option<String>,

    /// Refund operation number
    #[arg(long)]
    operation_number: Option<String>,

    /// Accept refund operation numbers in 1..=999999
    #[arg(long, default_value = "false")]
    corrected_refund: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    LoadKeys,
    LastSale,
    Totals,
    Close,
    Details,
    Sale,
    Refund,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level)?;

    match args.command {
        Command::Encode { command } => {
            println!("{}", FrameCodec::encode(&command)?);
        }
        Command::Decode { hex, report } => {
            let decoded = ResponseDecoder::decode_with_report(&hex);
            println!("{}", decoded.text);
            if report {
                println!("skipped: {}", decoded.skipped);
            }
        }
        Command::Build { operation, input } => {
            let config = load_config(args.config.as_deref())?;
            let command = build_command(operation, &input, refund_check(&config, &input))?;
            let payload = FrameCodec::encode(&command.body())?;
            println!("body:    {command}");
            println!("payload: {payload}");
        }
        Command::Send {
            connect,
            operations,
            input,
        } => {
            let config = load_config(args.config.as_deref())?;
            let check = refund_check(&config, &input);
            send(&connect, &operations, &input, config.with_refund_check(check)).await?;
        }
    }

    Ok(())
}

fn setup_logging(level: &str) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::WARN);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Load the session config from `path`, the user config dir, or defaults
fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    if let Some(path) = path {
        return SessionConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    match dirs::config_dir().map(|dir| dir.join("mpos").join("config.json")) {
        Some(path) if path.exists() => {
            info!("Using config {}", path.display());
            SessionConfig::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        _ => Ok(SessionConfig::default()),
    }
}

fn refund_check(config: &SessionConfig, input: &OperatorInput) -> RefundCheck {
    if input.corrected_refund {
        RefundCheck::Corrected
    } else {
        config.refund_check
    }
}

fn build_command(
    operation: Operation,
    input: &OperatorInput,
    check: RefundCheck,
) -> Result<PosCommand> {
    let command = match operation {
        Operation::LoadKeys => PosCommand::LoadKeys,
        Operation::LastSale => PosCommand::LastSale,
        Operation::Totals => PosCommand::Totals,
        Operation::Close => PosCommand::Close,
        Operation::Details => PosCommand::Details,
        Operation::Sale => {
            let Some(amount) = input.amount.as_deref() else {
                bail!("--amount is required for sale");
            };
            PosCommand::sale(amount)?
        }
        Operation::Refund => {
            let Some(number) = input.operation_number.as_deref() else {
                bail!("--operation-number is required for refund");
            };
            PosCommand::refund(number, check)?
        }
    };
    Ok(command)
}

async fn send(
    target: &str,
    operations: &[Operation],
    input: &OperatorInput,
    config: SessionConfig,
) -> Result<()> {
    config.validate()?;

    let (events_tx, events_rx) = event_channel(config.event_buffer);
    let notifier: Arc<dyn Notifier> = Arc::new(|text: &str| eprintln!("! {text}"));
    let mut session = PosSession::new(
        Box::new(TcpBridgeTransport::new(events_tx)),
        events_rx,
        notifier,
        config,
    );

    session
        .connect(target)
        .await
        .with_context(|| format!("Failed to connect to {target}"))?;
    session.wait_until_connected().await?;
    println!("Connected to {target}");

    for &operation in operations {
        let result = match operation {
            Operation::LoadKeys => session.load_keys().await,
            Operation::LastSale => session.last_sale().await,
            Operation::Totals => session.totals().await,
            Operation::Close => session.close().await,
            Operation::Details => session.details().await,
            Operation::Sale => {
                let amount = input.amount.as_deref().context("--amount is required for sale")?;
                session.sale(amount).await
            }
            Operation::Refund => {
                let number = input
                    .operation_number
                    .as_deref()
                    .context("--operation-number is required for refund")?;
                session.refund(number).await
            }
        };

        match result {
            Ok(response) => print_response(operation, &response),
            Err(e) => eprintln!("{operation:?} failed: {e}"),
        }
    }

    session.shutdown().await?;
    Ok(())
}

fn print_response(operation: Operation, response: &TerminalResponse) {
    println!("{operation:?}");
    println!("  raw:    {}", response.raw);
    println!("  text:   {:?}", response.text);
    if !response.fields.is_empty() {
        println!("  fields: {}", response.fields.join(" | "));
    }
    match response.checksum_ok {
        Some(true) => println!("  lrc:    ok"),
        Some(false) => println!("  lrc:    MISMATCH"),
        None => {}
    }
}
