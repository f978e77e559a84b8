//! # Raspberry Pi HAL Implementation
//!
//! SPI and GPIO backends for an SX127x module (RFM95/96/98, Dragino LoRa HAT, ...) wired to a
//! Raspberry Pi 4 or 5, using the rppal crate.
//!
//! ## Hardware Setup
//!
//! ```text
//! Pi Pin │ BCM GPIO │ SX127x Pin │ Function
//! ───────┼──────────┼────────────┼─────────────
//! 19     │ GPIO 10  │ MOSI       │ SPI data out
//! 21     │ GPIO 9   │ MISO       │ SPI data in
//! 23     │ GPIO 11  │ SCK        │ SPI clock
//! 24     │ GPIO 8   │ NSS        │ Chip select (CE0)
//! 22     │ GPIO 25  │ DIO0       │ TxDone / RxDone interrupt
//! 11     │ GPIO 17  │ NRESET     │ Reset (optional)
//! ```
//!
//! SPI must be enabled in `/boot/config.txt` (`dtparam=spi=on`).
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sx127x_lora::radio::hal::RaspberryPiHal;
//! use sx127x_lora::radio::Sx127x;
//!
//! let hal = RaspberryPiHal::open("/dev/spidev0.0", "GPIO25", Some("GPIO17"))?;
//! let mut radio = hal.into_radio(Default::default());
//! radio.configure()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::radio::config::LoRaConfig;
use crate::radio::hal::{HalError, InterruptLine, ResetLine, SpiBus};
use crate::radio::registers::SPI_SPEED;
use crate::radio::sx127x::Sx127x;
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use rppal::spi::{BitOrder, Bus, Mode, SlaveSelect, Spi};
use std::time::Duration;

/// SPI bus wrapper implementing [`SpiBus`]
pub struct RpiSpiBus {
    spi: Spi,
    device: String,
}

impl SpiBus for RpiSpiBus {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), HalError> {
        match self.spi.transfer(rx, tx) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("SPI transfer on {} failed: {}", self.device, e);
                Err(HalError::Spi(e.to_string()))
            }
        }
    }
}

/// NRESET output implementing [`ResetLine`]
pub struct RpiResetLine {
    pin: OutputPin,
}

impl ResetLine for RpiResetLine {
    fn set_high(&mut self) -> Result<(), HalError> {
        self.pin.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), HalError> {
        self.pin.set_low();
        Ok(())
    }
}

/// DIO0 input implementing [`InterruptLine`]
pub struct RpiInterruptLine {
    pin: InputPin,
}

impl InterruptLine for RpiInterruptLine {
    fn arm(&mut self) -> Result<(), HalError> {
        // Reconfiguring the trigger drops edges queued by the kernel for the previous operation
        self.pin
            .set_interrupt(Trigger::RisingEdge)
            .map_err(|e| HalError::Gpio(format!("Failed to set interrupt: {}", e)))
    }

    fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool, HalError> {
        self.pin
            .poll_interrupt(false, Some(timeout))
            .map(|level| level.is_some())
            .map_err(|e| HalError::Gpio(format!("Failed to poll interrupt: {}", e)))
    }
}

/// Opened SPI device plus DIO0 and optional NRESET lines
pub struct RaspberryPiHal {
    pub spi: RpiSpiBus,
    pub dio0: RpiInterruptLine,
    pub reset: Option<RpiResetLine>,
}

impl RaspberryPiHal {
    /// Open the SPI device and GPIO lines named by the given identifiers
    ///
    /// # Arguments
    ///
    /// * `spidev` - SPI device path, e.g. `/dev/spidev0.0` (bus 0, chip select 0)
    /// * `dio0` - BCM GPIO of DIO0, e.g. `"25"` or `"GPIO25"`
    /// * `reset` - BCM GPIO of NRESET, `None` when not wired
    pub fn open(spidev: &str, dio0: &str, reset: Option<&str>) -> Result<Self, HalError> {
        Self::open_with_speed(spidev, dio0, reset, SPI_SPEED)
    }

    /// Same as [`open`](Self::open) with an explicit SPI clock
    pub fn open_with_speed(
        spidev: &str,
        dio0: &str,
        reset: Option<&str>,
        speed_hz: u32,
    ) -> Result<Self, HalError> {
        let (bus, slave_select) = parse_spidev(spidev)?;

        let spi = Spi::new(bus, slave_select, speed_hz, Mode::Mode0)
            .map_err(|e| HalError::Spi(format!("Failed to open {}: {}", spidev, e)))?;
        spi.set_bit_order(BitOrder::MsbFirst)
            .map_err(|e| HalError::Spi(format!("Failed to set bit order: {}", e)))?;

        let gpio =
            Gpio::new().map_err(|e| HalError::Gpio(format!("Failed to initialize GPIO: {}", e)))?;

        let dio0_num = parse_gpio(dio0)?;
        let dio0_pin = gpio
            .get(dio0_num)
            .map_err(|e| HalError::Gpio(format!("Failed to get DIO0 pin {}: {}", dio0_num, e)))?
            .into_input_pulldown();

        let reset_line = match reset {
            Some(name) => {
                let num = parse_gpio(name)?;
                let mut pin = gpio
                    .get(num)
                    .map_err(|e| HalError::Gpio(format!("Failed to get reset pin {}: {}", num, e)))?
                    .into_output();
                pin.set_high(); // NRESET is active low, start released
                Some(RpiResetLine { pin })
            }
            None => None,
        };

        log::info!("Raspberry Pi HAL initialized:");
        log::info!("  SPI: {} @ {} Hz", spidev, speed_hz);
        log::info!("  DIO0: GPIO {}", dio0_num);
        match reset {
            Some(name) => log::info!("  RESET: {}", name),
            None => log::warn!("  RESET: not wired, skipping hardware reset"),
        }

        Ok(Self {
            spi: RpiSpiBus {
                spi,
                device: spidev.to_string(),
            },
            dio0: RpiInterruptLine { pin: dio0_pin },
            reset: reset_line,
        })
    }

    /// Hand the opened lines to a controller
    pub fn into_radio(self, config: LoRaConfig) -> Sx127x<RpiSpiBus, RpiResetLine, RpiInterruptLine> {
        Sx127x::new(self.spi, self.reset, self.dio0, config)
    }
}

/// Map `/dev/spidevB.S` (or plain `B.S`) to an rppal bus and chip select
fn parse_spidev(spidev: &str) -> Result<(Bus, SlaveSelect), HalError> {
    let invalid = || HalError::InvalidConfig(format!("Invalid SPI device '{}'", spidev));

    let id = spidev.trim_start_matches("/dev/").trim_start_matches("spidev");
    let (bus, ss) = id.split_once('.').ok_or_else(invalid)?;

    let bus = match bus {
        "0" => Bus::Spi0,
        "1" => Bus::Spi1,
        "2" => Bus::Spi2,
        "3" => Bus::Spi3,
        "4" => Bus::Spi4,
        "5" => Bus::Spi5,
        "6" => Bus::Spi6,
        _ => return Err(invalid()),
    };
    let ss = match ss {
        "0" => SlaveSelect::Ss0,
        "1" => SlaveSelect::Ss1,
        "2" => SlaveSelect::Ss2,
        _ => return Err(invalid()),
    };

    Ok((bus, ss))
}

/// Parse a BCM GPIO identifier, accepting `25`, `GPIO25` and `gpio25`
fn parse_gpio(name: &str) -> Result<u8, HalError> {
    let digits = name
        .trim()
        .trim_start_matches("GPIO")
        .trim_start_matches("gpio");
    digits
        .parse::<u8>()
        .map_err(|_| HalError::InvalidConfig(format!("Invalid GPIO identifier '{}'", name)))
}
