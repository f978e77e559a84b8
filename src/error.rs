//! # SX127x Driver Error Handling
//!
//! This module defines the LoRaError enum, which represents the different error
//! types that can occur in the sx127x-lora crate. No variant is retried internally;
//! every error reaches the caller unchanged.

use crate::radio::hal::HalError;
use thiserror::Error;

/// Represents the different error types that can occur in the driver.
#[derive(Debug, Error)]
pub enum LoRaError {
    /// Transport failure on a register access. Fatal to the operation in progress.
    #[error("Bus error: {0}")]
    Bus(#[from] HalError),

    /// RegVersion did not report the expected silicon revision.
    #[error("Version mismatch: expected 0x{expected:02X}, found 0x{found:02X}")]
    VersionMismatch { expected: u8, found: u8 },

    /// No TxDone edge on DIO0 within the timeout.
    #[error("Transmit timeout: DIO0 did not rise")]
    TransmitTimeout,

    /// No RxDone edge on DIO0 within the timeout during receive.
    #[error("Receive timeout")]
    ReceiveTimeout,

    /// DIO0 rose but RxDone never appeared in the IRQ flags.
    #[error("RX not done after DIO0 edge")]
    ReceiveNotDone,

    /// The chip flagged a payload CRC error.
    #[error("CRC mismatch on received payload")]
    CrcMismatch,

    /// Payload does not fit the FIFO.
    #[error("Payload too large: {0} bytes (max 255)")]
    PayloadTooLarge(usize),

    /// Invalid configuration file or value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A hardware backend was requested that is not compiled in.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(String),
}

impl LoRaError {
    /// Errors caused by the radio link rather than the host side
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            LoRaError::TransmitTimeout
                | LoRaError::ReceiveTimeout
                | LoRaError::ReceiveNotDone
                | LoRaError::CrcMismatch
        )
    }
}
