//! # LoRa Session Configuration
//!
//! [`LoRaConfig`] mirrors the modem parameters the controller has pushed to the chip. The
//! mirror is advisory: setters on [`Sx127x`](crate::radio::Sx127x) always read-modify-write
//! the real register and only update the mirror once the write succeeded.
//!
//! [`DriverConfig`] adds the platform wiring and can be loaded from JSON:
//!
//! ```json
//! {
//!   "pins": { "spidev": "/dev/spidev0.0", "dio0": "GPIO25", "reset": "GPIO17" },
//!   "radio": { "frequency_hz": 868100000, "spreading_factor": 9, "bandwidth": "Bw125" }
//! }
//! ```
//!
//! Fields left out take their defaults.

use crate::error::LoRaError;
use crate::radio::registers::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// LoRa signal bandwidth steps supported by the SX127x (RegModemConfig1 bits 7-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bandwidth {
    Bw7_8,
    Bw10_4,
    Bw15_6,
    Bw20_8,
    Bw31_25,
    Bw41_7,
    Bw62_5,
    Bw125,
    Bw250,
    Bw500,
}

impl Bandwidth {
    const STEPS: [(Bandwidth, u64); 10] = [
        (Bandwidth::Bw7_8, 7_800),
        (Bandwidth::Bw10_4, 10_400),
        (Bandwidth::Bw15_6, 15_600),
        (Bandwidth::Bw20_8, 20_800),
        (Bandwidth::Bw31_25, 31_250),
        (Bandwidth::Bw41_7, 41_700),
        (Bandwidth::Bw62_5, 62_500),
        (Bandwidth::Bw125, 125_000),
        (Bandwidth::Bw250, 250_000),
        (Bandwidth::Bw500, 500_000),
    ];

    /// Smallest step that is not below `hz`; anything above 250 kHz selects 500 kHz
    pub fn from_hz(hz: u64) -> Self {
        Self::STEPS
            .iter()
            .find(|(_, step)| hz <= *step)
            .map(|(bw, _)| *bw)
            .unwrap_or(Bandwidth::Bw500)
    }

    /// Nominal bandwidth in Hz
    pub fn hz(self) -> u64 {
        Self::STEPS[self.register_value() as usize].1
    }

    /// Field value before shifting into RegModemConfig1
    pub fn register_value(self) -> u8 {
        self as u8
    }
}

impl Default for Bandwidth {
    fn default() -> Self {
        Bandwidth::Bw125
    }
}

/// LoRa forward error correction rate 4/n
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodingRate {
    Cr4_5,
    Cr4_6,
    Cr4_7,
    Cr4_8,
}

impl CodingRate {
    /// Denominator `n` clamped to 5..=8
    pub fn from_denominator(denominator: u8) -> Self {
        match denominator {
            0..=5 => CodingRate::Cr4_5,
            6 => CodingRate::Cr4_6,
            7 => CodingRate::Cr4_7,
            _ => CodingRate::Cr4_8,
        }
    }

    /// Nearest rate 4/n that does not exceed `ratio` (e.g. 0.8 selects 4/5, 0.7 selects 4/6).
    /// Ratios below 4/8 select 4/8.
    pub fn from_ratio(ratio: f64) -> Self {
        (5..=8u8)
            .find(|n| 4.0 / f64::from(*n) <= ratio + 1e-9)
            .map(Self::from_denominator)
            .unwrap_or(CodingRate::Cr4_8)
    }

    pub fn denominator(self) -> u8 {
        match self {
            CodingRate::Cr4_5 => 5,
            CodingRate::Cr4_6 => 6,
            CodingRate::Cr4_7 => 7,
            CodingRate::Cr4_8 => 8,
        }
    }

    pub fn ratio(self) -> f64 {
        4.0 / f64::from(self.denominator())
    }

    /// Field value before shifting into RegModemConfig1 bits 3-1
    pub fn register_value(self) -> u8 {
        self.denominator() - 4
    }
}

impl Default for CodingRate {
    fn default() -> Self {
        CodingRate::Cr4_5
    }
}

/// How payload length is conveyed on air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Length, coding rate and CRC presence sent in a header
    Explicit,
    /// All parties agree on the payload length beforehand
    Implicit,
}

impl Default for HeaderMode {
    fn default() -> Self {
        HeaderMode::Explicit
    }
}

/// Session parameters mirrored from the chip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoRaConfig {
    pub spreading_factor: u8,
    pub bandwidth: Bandwidth,
    pub coding_rate: CodingRate,
    pub preamble_length: u16,
    pub sync_word: u8,
    pub frequency_hz: u64,
    pub tx_power_dbm: u8,
    pub crc: bool,
    pub header_mode: HeaderMode,
}

impl Default for LoRaConfig {
    fn default() -> Self {
        Self {
            spreading_factor: DEFAULT_SPREADING_FACTOR,
            bandwidth: Bandwidth::Bw125,
            coding_rate: CodingRate::Cr4_5,
            preamble_length: DEFAULT_PREAMBLE_LENGTH,
            sync_word: DEFAULT_SYNC_WORD,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
            crc: true,
            header_mode: HeaderMode::Explicit,
        }
    }
}

/// Clamp a spreading factor to the SX127x range 6..=12
pub fn clamp_spreading_factor(sf: u8) -> u8 {
    sf.clamp(6, 12)
}

/// Clamp a PA_BOOST output power to 2..=17 dBm
pub fn clamp_tx_power(dbm: u8) -> u8 {
    dbm.clamp(TX_POWER_MIN_DBM, TX_POWER_MAX_DBM)
}

/// Convert a carrier frequency to the 24-bit RegFrf word, `(hz << 19) / 32 MHz`
pub fn frequency_to_frf(frequency_hz: u64) -> u32 {
    ((frequency_hz << FRF_SHIFT) / FXOSC_HZ) as u32
}

/// RegFrf word for `frequency_hz`, rejecting frequencies the 24-bit register cannot hold
pub fn checked_frequency_to_frf(frequency_hz: u64) -> Result<u32, LoRaError> {
    let frf = frequency_hz
        .checked_mul(1 << FRF_SHIFT)
        .map(|scaled| scaled / FXOSC_HZ);
    match frf {
        Some(frf) if frf > 0 && frf <= u64::from(FRF_MAX) => Ok(frf as u32),
        _ => Err(LoRaError::Config(format!(
            "Frequency {} Hz out of range",
            frequency_hz
        ))),
    }
}

/// Inverse of [`frequency_to_frf`], exact to one synthesizer step
pub fn frf_to_frequency(frf: u32) -> u64 {
    (u64::from(frf) * FXOSC_HZ) >> FRF_SHIFT
}

/// Synthesizer resolution in Hz (about 61 Hz)
pub fn frequency_step_hz() -> f64 {
    FXOSC_HZ as f64 / f64::from(1u32 << FRF_SHIFT)
}

/// Identifiers of the SPI device and GPIO lines the chip is wired to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// SPI device path (e.g., "/dev/spidev0.0")
    pub spidev: String,
    /// DIO0 line, BCM numbering (e.g., "GPIO25")
    pub dio0: String,
    /// NRESET line, `None` when not wired
    pub reset: Option<String>,
    /// SPI clock in Hz
    pub spi_speed_hz: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            spidev: "/dev/spidev0.0".to_string(),
            dio0: format!("GPIO{}", DEFAULT_DIO0_PIN),
            reset: Some(format!("GPIO{}", DEFAULT_RESET_PIN)),
            spi_speed_hz: SPI_SPEED,
        }
    }
}

/// Complete driver configuration as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub pins: PinConfig,
    pub radio: LoRaConfig,
}

impl DriverConfig {
    pub fn from_json_str(json: &str) -> Result<Self, LoRaError> {
        let config: DriverConfig = serde_json::from_str(json)
            .map_err(|e| LoRaError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoRaError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            LoRaError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        log::info!("Loaded driver configuration from {}", path.display());
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, LoRaError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LoRaError::Config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Reject values the chip cannot represent. Out-of-range SF and power are clamped by the
    /// setters instead and pass here.
    pub fn validate(&self) -> Result<(), LoRaError> {
        checked_frequency_to_frf(self.radio.frequency_hz)?;
        if self.pins.spidev.is_empty() || self.pins.dio0.is_empty() {
            return Err(LoRaError::Config(
                "SPI device and DIO0 line must be set".to_string(),
            ));
        }
        if self.pins.spi_speed_hz == 0 || self.pins.spi_speed_hz > 10_000_000 {
            return Err(LoRaError::Config(format!(
                "Invalid SPI speed {} Hz, must be 1-10000000",
                self.pins.spi_speed_hz
            )));
        }
        Ok(())
    }
}
