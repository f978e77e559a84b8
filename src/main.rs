use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sx127x_lora::logging::{init_logger_with_level, log_error, log_warn};
use sx127x_lora::radio::DriverConfig;
use sx127x_lora::LoRaError;

#[derive(Parser, Debug)]
#[command(name = "sx127x-cli")]
#[command(about = "CLI tool for SX127x LoRa radios")]
struct Cli {
    /// JSON driver configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SPI device, e.g. /dev/spidev0.0
    #[arg(long)]
    spidev: Option<String>,

    /// DIO0 line, e.g. GPIO25
    #[arg(long)]
    dio0: Option<String>,

    /// NRESET line, e.g. GPIO17
    #[arg(long)]
    reset: Option<String>,

    /// Carrier frequency in Hz
    #[arg(short, long)]
    frequency: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reset the chip and print its silicon revision
    Version,
    /// Send one packet
    Transmit {
        payload: String,
        /// Treat PAYLOAD as hex instead of text
        #[arg(long)]
        hex: bool,
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },
    /// Listen until Ctrl-C, printing every packet as JSON
    Receive {
        /// Give up when no packet arrives within this time
        #[arg(long, default_value = "60000")]
        timeout_ms: u64,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger_with_level(if cli.verbose { "debug" } else { "info" });

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<LoRaError>() {
            Some(err) if err.is_link_error() => log_warn(&format!("{err}")),
            _ => log_error(&format!("{e:#}")),
        }
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = effective_config(&cli)?;
    match cli.command {
        Commands::ShowConfig => {
            println!("{}", config.to_json_string()?);
            Ok(())
        }
        command => run_radio(config, command).await,
    }
}

/// File (or defaults) overridden by command-line flags
fn effective_config(cli: &Cli) -> Result<DriverConfig> {
    let mut config = match &cli.config {
        Some(path) => DriverConfig::from_file(path)?,
        None => DriverConfig::default(),
    };
    if let Some(spidev) = &cli.spidev {
        config.pins.spidev = spidev.clone();
    }
    if let Some(dio0) = &cli.dio0 {
        config.pins.dio0 = dio0.clone();
    }
    if let Some(reset) = &cli.reset {
        config.pins.reset = Some(reset.clone());
    }
    if let Some(frequency) = cli.frequency {
        config.radio.frequency_hz = frequency;
    }
    config.validate()?;
    Ok(config)
}

fn parse_payload(payload: &str, is_hex: bool) -> Result<Vec<u8>> {
    if is_hex {
        let cleaned: String = payload.split_whitespace().collect();
        hex::decode(&cleaned).with_context(|| format!("Invalid hex payload '{payload}'"))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

#[cfg(feature = "raspberry-pi")]
async fn run_radio(config: DriverConfig, command: Commands) -> Result<()> {
    use std::time::Duration;
    use sx127x_lora::logging::{log_info, log_message};
    use sx127x_lora::radio::hal::RaspberryPiHal;
    use tokio::sync::{mpsc, oneshot};

    let pins = &config.pins;
    let hal = RaspberryPiHal::open_with_speed(
        &pins.spidev,
        &pins.dio0,
        pins.reset.as_deref(),
        pins.spi_speed_hz,
    )
    .map_err(LoRaError::from)?;
    let mut radio = hal.into_radio(config.radio.clone());

    match command {
        Commands::Version => {
            radio.reset()?;
            let version = radio.version()?;
            println!("0x{version:02X}");
        }
        Commands::Transmit {
            payload,
            hex,
            timeout_ms,
        } => {
            let payload = parse_payload(&payload, hex)?;
            radio.configure()?;
            radio.transmit(&payload, Duration::from_millis(timeout_ms))?;
            log_info(&format!("Sent {} bytes", payload.len()));
        }
        Commands::Receive { timeout_ms } => {
            radio.configure()?;

            let (cancel_tx, mut cancel_rx) = oneshot::channel();
            let (msg_tx, mut msg_rx) = mpsc::channel(32);
            let timeout = Duration::from_millis(timeout_ms);
            let worker = tokio::task::spawn_blocking(move || {
                radio.receive_continuous(&mut cancel_rx, timeout, &msg_tx)
            });

            let mut cancel_tx = Some(cancel_tx);
            loop {
                tokio::select! {
                    message = msg_rx.recv() => match message {
                        Some(message) => {
                            log_message(&message);
                            println!("{}", serde_json::to_string(&message)?);
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c(), if cancel_tx.is_some() => {
                        log_info("Stopping receive after the current wait");
                        if let Some(cancel) = cancel_tx.take() {
                            let _ = cancel.send(());
                        }
                    }
                }
            }

            worker.await.context("Receive task failed")??;
        }
        Commands::ShowConfig => println!("{}", config.to_json_string()?),
    }
    Ok(())
}

#[cfg(not(feature = "raspberry-pi"))]
async fn run_radio(_config: DriverConfig, _command: Commands) -> Result<()> {
    Err(LoRaError::FeatureNotEnabled(
        "raspberry-pi (rebuild with --features raspberry-pi)".to_string(),
    )
    .into())
}
