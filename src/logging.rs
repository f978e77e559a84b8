use crate::radio::Message;
use log::{debug, error, info, log_enabled, warn, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// The level comes from `RUST_LOG` and defaults to `info`.
pub fn init_logger() {
    init_logger_with_level("info");
}

/// Initializes `env_logger`, using `default_level` when `RUST_LOG` is not set.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger_with_level(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}

/// Hex dump of a payload at debug level, 16 bytes per line
pub fn log_payload_hex(label: &str, data: &[u8]) {
    if !log_enabled!(Level::Debug) {
        return;
    }
    debug!("{} ({} bytes)", label, data.len());
    for (i, chunk) in data.chunks(16).enumerate() {
        debug!("  {:04X}: {}", i * 16, hex_line(chunk));
    }
}

/// One summary line per received message
pub fn log_message(message: &Message) {
    info!(
        "RX {} bytes RSSI {} dBm SNR {:.2} dB: {}",
        message.len(),
        message.rssi,
        message.snr,
        message.payload_hex()
    );
    log_payload_hex("RX payload", &message.payload);
}

fn hex_line(chunk: &[u8]) -> String {
    chunk
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
