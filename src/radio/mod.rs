//! # SX127x LoRa Radio
//!
//! Layers, bottom up:
//!
//! - [`hal`]: SPI, reset and DIO0 collaborators as traits, plus platform backends
//! - [`register_access`]: register read/write framing over the SPI bus
//! - [`registers`]: register map and chip constants
//! - [`sx127x`]: the transceiver controller and its mode state machine

pub mod config;
pub mod hal;
pub mod irq;
pub mod message;
pub mod mode;
pub mod register_access;
pub mod registers;
pub mod sx127x;

pub use config::{Bandwidth, CodingRate, DriverConfig, HeaderMode, LoRaConfig, PinConfig};
pub use hal::{HalError, InterruptLine, NoReset, ResetLine, SpiBus};
pub use irq::{Dio0Mapping, IrqFlags};
pub use message::Message;
pub use mode::Mode;
pub use sx127x::{LinkStats, ModeGuard, Sx127x};
