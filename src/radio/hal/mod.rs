//! # Hardware Abstraction Layer for the SX127x
//!
//! The controller never opens devices itself. It is handed three collaborators:
//!
//! - a [`SpiBus`] performing full-duplex byte exchanges with the chip,
//! - a [`ResetLine`] driving NRESET (optional, some boards tie it high),
//! - an [`InterruptLine`] sensing rising edges on DIO0.
//!
//! Platform implementations live in submodules. [`mock`] simulates a chip behind all three
//! traits and is used by the test suites.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during HAL operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HalError {
    #[error("SPI communication error: {0}")]
    Spi(String),

    #[error("GPIO operation error: {0}")]
    Gpio(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Synchronous byte-exchange channel to the chip
pub trait SpiBus {
    /// Clock out `tx` while clocking in `rx`. Both slices have the same length.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), HalError>;
}

/// Digital output driving the chip's NRESET pin (active low)
pub trait ResetLine {
    fn set_high(&mut self) -> Result<(), HalError>;

    fn set_low(&mut self) -> Result<(), HalError>;
}

/// Digital input connected to DIO0
///
/// Waiting is split in two steps so the caller can start latching edges before it triggers
/// the chip activity that will eventually raise the line. An edge that fires between
/// [`arm`](InterruptLine::arm) and [`wait_for_edge`](InterruptLine::wait_for_edge) is not lost.
pub trait InterruptLine {
    /// Enable rising edge detection, discarding edges latched earlier
    fn arm(&mut self) -> Result<(), HalError>;

    /// Block until a rising edge is latched or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when an edge was consumed and `Ok(false)` on timeout.
    fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool, HalError>;
}

impl<T: SpiBus + ?Sized> SpiBus for &mut T {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), HalError> {
        (**self).transfer(tx, rx)
    }
}

impl<T: ResetLine + ?Sized> ResetLine for &mut T {
    fn set_high(&mut self) -> Result<(), HalError> {
        (**self).set_high()
    }

    fn set_low(&mut self) -> Result<(), HalError> {
        (**self).set_low()
    }
}

impl<T: InterruptLine + ?Sized> InterruptLine for &mut T {
    fn arm(&mut self) -> Result<(), HalError> {
        (**self).arm()
    }

    fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool, HalError> {
        (**self).wait_for_edge(timeout)
    }
}

/// Reset line placeholder for boards where NRESET is not wired to the host
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReset;

impl ResetLine for NoReset {
    fn set_high(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), HalError> {
        Ok(())
    }
}

// Simulated chip for tests and dry runs
pub mod mock;

// Platform implementations
#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;

#[cfg(feature = "raspberry-pi")]
pub use raspberry_pi::{RaspberryPiHal, RpiInterruptLine, RpiResetLine, RpiSpiBus};
