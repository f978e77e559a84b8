//! # sx127x-lora - Host-side driver for Semtech SX127x LoRa transceivers
//!
//! The sx127x-lora crate drives an SX1276/77/78/79 (or an RFM95/96/98 module) from a Linux host
//! over SPI, with DIO0 wired to a GPIO for completion interrupts and an optional GPIO on NRESET.
//!
//! ## Features
//!
//! - Register-level SPI protocol with single, burst read and burst write accesses
//! - LoRa mode state machine with guaranteed return to Standby after TX and RX
//! - Frequency, spreading factor, bandwidth, coding rate, power, CRC and header mode setters
//!   that read-modify-write the chip registers
//! - Interrupt-driven transmit and receive with timeouts, continuous receive with cancellation
//! - RSSI, SNR and CRC decoding into received [`Message`](radio::Message)s
//! - Raspberry Pi backend (`raspberry-pi` feature) and a simulated chip for tests
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! sx127x-lora = { version = "0.1.0", features = ["raspberry-pi"] }
//! ```
//!
//! ```rust
//! use sx127x_lora::{init_logger, LoRaConfig, LoRaError, Sx127x};
//! use sx127x_lora::radio::hal::mock::MockChip;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), LoRaError> {
//! init_logger();
//! let chip = MockChip::new();
//! let mut radio = Sx127x::without_reset(chip.spi(), chip.interrupt_line(), LoRaConfig::default());
//! radio.configure()?;
//! radio.set_spreading_factor(9)?;
//! radio.transmit(&[0x01, 0x02, 0x03], Duration::from_secs(1))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;
pub mod radio;

pub use crate::error::LoRaError;
pub use crate::logging::{init_logger, log_info};

pub use radio::{
    Bandwidth, CodingRate, DriverConfig, HeaderMode, LoRaConfig, Message, Mode, Sx127x,
};
