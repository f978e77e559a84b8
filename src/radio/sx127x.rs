//! # SX127x Transceiver Controller
//!
//! [`Sx127x`] owns the register bus, the DIO0 line and the optional reset line of one chip
//! and drives the LoRa mode state machine:
//!
//! ```text
//! Uninitialized -> Sleep -> Standby -> { Transmit | ReceiveContinuous | ReceiveSingle } -> Standby
//! ```
//!
//! Sleep is only entered while [`configure`](Sx127x::configure) programs the registers that
//! are writable in sleep (or on an explicit [`sleep`](Sx127x::sleep) call). TX and RX modes
//! are always entered through a [`ModeGuard`], which puts the chip back in Standby on every
//! exit path.
//!
//! ## Interrupt handling
//!
//! Completion is signalled on DIO0 with a rising edge. The edge wait is armed before the
//! opmode write that starts the operation, so an edge raised before the wait begins is
//! latched instead of lost. A failed opmode write is reported at once, without waiting.
//!
//! Every operation takes `&mut self`: a single owner per chip is what keeps two operations
//! from racing on the FIFO pointer or the DIO0 line.
//!
//! ## Example
//!
//! ```rust
//! use sx127x_lora::radio::hal::mock::{MockChip, RxPacket};
//! use sx127x_lora::radio::{LoRaConfig, Sx127x};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), sx127x_lora::LoRaError> {
//! let chip = MockChip::new();
//! let mut radio = Sx127x::new(
//!     chip.spi(),
//!     Some(chip.reset_line()),
//!     chip.interrupt_line(),
//!     LoRaConfig::default(),
//! );
//! radio.configure()?;
//! radio.transmit(b"hello", Duration::from_secs(1))?;
//!
//! chip.queue_packet(RxPacket::new(b"pong"));
//! let message = radio.receive_single(Duration::from_secs(1))?;
//! assert_eq!(message.payload, b"pong");
//! # Ok(())
//! # }
//! ```

use crate::error::LoRaError;
use crate::radio::config::*;
use crate::radio::hal::{InterruptLine, NoReset, ResetLine, SpiBus};
use crate::radio::irq::{Dio0Mapping, IrqFlags};
use crate::radio::message::{rssi_from_raw, snr_from_raw, Message};
use crate::radio::mode::{write_mode, Mode};
use crate::radio::register_access::Registers;
use crate::radio::registers::*;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// Counters kept across operations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkStats {
    pub packets_received: u64,
    pub crc_errors: u64,
    pub transmissions: u64,
    pub tx_timeouts: u64,
    pub rx_timeouts: u64,
    pub last_rssi: Option<i16>,
    pub last_snr: Option<f32>,
}

/// Controller for one SX127x chip
pub struct Sx127x<S: SpiBus, R: ResetLine, I: InterruptLine> {
    regs: Registers<S>,
    reset: Option<R>,
    irq: I,
    config: LoRaConfig,
    /// Last mode written; `None` until configured or after a reset
    mode: Option<Mode>,
    stats: LinkStats,
}

impl<S: SpiBus, I: InterruptLine> Sx127x<S, NoReset, I> {
    /// Controller for a chip without a wired reset line
    pub fn without_reset(spi: S, dio0: I, config: LoRaConfig) -> Self {
        Self::new(spi, None, dio0, config)
    }
}

impl<S: SpiBus, R: ResetLine, I: InterruptLine> Sx127x<S, R, I> {
    /// Take ownership of the chip's lines. Nothing is sent to the chip until
    /// [`configure`](Self::configure).
    pub fn new(spi: S, reset: Option<R>, dio0: I, mut config: LoRaConfig) -> Self {
        config.spreading_factor = clamp_spreading_factor(config.spreading_factor);
        config.tx_power_dbm = clamp_tx_power(config.tx_power_dbm);
        Self {
            regs: Registers::new(spi),
            reset,
            irq: dio0,
            config,
            mode: None,
            stats: LinkStats::default(),
        }
    }

    /// Give the lines back
    pub fn release(self) -> (S, Option<R>, I) {
        (self.regs.into_inner(), self.reset, self.irq)
    }

    /// Reset the chip, check its revision and program the whole configuration mirror.
    /// Leaves the chip in Standby.
    pub fn configure(&mut self) -> Result<(), LoRaError> {
        info!("Configuring SX127x");
        self.reset()?;

        let version = self.version()?;
        if version != SX127X_VERSION {
            error!(
                "Unexpected SX127x version 0x{:02X} (expected 0x{:02X})",
                version, SX127X_VERSION
            );
            return Err(LoRaError::VersionMismatch {
                expected: SX127X_VERSION,
                found: version,
            });
        }
        info!("SX127x version: 0x{:02X}", version);

        self.sleep()?;

        let config = self.config.clone();
        self.set_frequency(config.frequency_hz)?;
        self.set_crc(config.crc)?;
        self.regs
            .write_register(REG_FIFO_TX_BASE_ADDR, &[FIFO_BASE_ADDR])?;
        self.regs
            .write_register(REG_FIFO_RX_BASE_ADDR, &[FIFO_BASE_ADDR])?;
        self.set_lna_boost(true)?;
        self.regs
            .write_register(REG_MODEM_CONFIG_3, &[MODEM_CONFIG_3_AGC_AUTO_ON])?;
        self.set_tx_power(config.tx_power_dbm)?;
        self.set_spreading_factor(config.spreading_factor)?;
        self.set_bandwidth(config.bandwidth)?;
        self.set_coding_rate(config.coding_rate)?;
        self.set_preamble_length(config.preamble_length)?;
        self.set_sync_word(config.sync_word)?;
        self.set_header_mode(config.header_mode)?;

        self.standby()?;
        info!(
            "SX127x configured: {:.3} MHz, SF{}, {} Hz, CR 4/{}",
            config.frequency_hz as f64 / 1e6,
            config.spreading_factor,
            config.bandwidth.hz(),
            config.coding_rate.denominator()
        );
        Ok(())
    }

    /// Pulse NRESET low then high, holding each level for the chip's settle time
    pub fn reset(&mut self) -> Result<(), LoRaError> {
        let Some(reset) = self.reset.as_mut() else {
            debug!("No reset line wired, skipping reset pulse");
            return Ok(());
        };

        debug!("Resetting SX127x");
        reset.set_low()?;
        thread::sleep(Duration::from_millis(RESET_PULSE_MS));
        reset.set_high()?;
        thread::sleep(Duration::from_millis(RESET_PULSE_MS));

        // Chip is back in its power-on state
        self.mode = None;
        Ok(())
    }

    /// Silicon revision from RegVersion
    pub fn version(&mut self) -> Result<u8, LoRaError> {
        Ok(self.regs.read_register(REG_VERSION)?)
    }

    // =========================================================================
    // Mode control
    // =========================================================================

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), LoRaError> {
        write_mode(&mut self.regs, &mut self.mode, mode)?;
        Ok(())
    }

    /// Mode reported by the chip itself. `None` when the LoRa modem is not selected or the
    /// chip is in a transitional mode.
    pub fn read_mode(&mut self) -> Result<Option<Mode>, LoRaError> {
        let opmode = self.regs.read_register(REG_OP_MODE)?;
        Ok(Mode::from_opmode(opmode))
    }

    /// Last mode written by this controller (advisory)
    pub fn current_mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn standby(&mut self) -> Result<(), LoRaError> {
        self.set_mode(Mode::Standby)
    }

    pub fn sleep(&mut self) -> Result<(), LoRaError> {
        self.set_mode(Mode::Sleep)
    }

    /// Enter a TX or RX `mode` and return a guard that restores Standby when dropped.
    /// Sleep and Standby are rejected with [`LoRaError::Config`] without touching the chip.
    pub fn enter_mode(&mut self, mode: Mode) -> Result<ModeGuard<'_, S, R, I>, LoRaError> {
        if !mode.is_active() {
            return Err(LoRaError::Config(format!(
                "Mode {} cannot be held by a mode guard",
                mode
            )));
        }
        let mut guard = ModeGuard::new(self);
        guard.set_mode(mode)?;
        Ok(guard)
    }

    // =========================================================================
    // Configuration setters
    // =========================================================================

    /// Program the carrier frequency. Only takes effect in Sleep or Standby.
    ///
    /// Frequencies whose RegFrf word is zero or wider than 24 bits are rejected with
    /// [`LoRaError::Config`] before anything is written.
    pub fn set_frequency(&mut self, frequency_hz: u64) -> Result<(), LoRaError> {
        let frf = checked_frequency_to_frf(frequency_hz)?;
        self.regs.write_register(REG_FRF_MSB, &[(frf >> 16) as u8])?;
        self.regs.write_register(REG_FRF_MID, &[(frf >> 8) as u8])?;
        self.regs.write_register(REG_FRF_LSB, &[frf as u8])?;
        self.config.frequency_hz = frequency_hz;
        debug!("Frequency set to: {:.3} MHz", frequency_hz as f64 / 1e6);
        Ok(())
    }

    /// Carrier frequency currently programmed in RegFrf
    pub fn read_frequency(&mut self) -> Result<u64, LoRaError> {
        let frf = self.regs.read_register_burst(REG_FRF_MSB, 3)?;
        let word = (u32::from(frf[0]) << 16) | (u32::from(frf[1]) << 8) | u32::from(frf[2]);
        Ok(frf_to_frequency(word))
    }

    /// Set the spreading factor (clamped to 6..=12) and the matching detection settings
    pub fn set_spreading_factor(&mut self, sf: u8) -> Result<(), LoRaError> {
        let sf = clamp_spreading_factor(sf);
        let (optimize, threshold) = if sf == 6 {
            (DETECTION_OPTIMIZE_SF6, DETECTION_THRESHOLD_SF6)
        } else {
            (
                DETECTION_OPTIMIZE_SF7_TO_SF12,
                DETECTION_THRESHOLD_SF7_TO_SF12,
            )
        };
        self.regs.write_register(REG_DETECTION_OPTIMIZE, &[optimize])?;
        self.regs
            .write_register(REG_DETECTION_THRESHOLD, &[threshold])?;
        self.regs
            .update_register(REG_MODEM_CONFIG_2, MODEM_CONFIG_2_SF_KEEP, sf << 4)?;
        self.config.spreading_factor = sf;
        debug!("Spreading factor set to: SF{}", sf);
        Ok(())
    }

    pub fn set_bandwidth(&mut self, bandwidth: Bandwidth) -> Result<(), LoRaError> {
        self.regs.update_register(
            REG_MODEM_CONFIG_1,
            MODEM_CONFIG_1_BW_KEEP,
            bandwidth.register_value() << 4,
        )?;
        self.config.bandwidth = bandwidth;
        debug!("Bandwidth set to: {} Hz", bandwidth.hz());
        Ok(())
    }

    /// Select the smallest bandwidth step not below `hz`
    pub fn set_signal_bandwidth_hz(&mut self, hz: u64) -> Result<(), LoRaError> {
        self.set_bandwidth(Bandwidth::from_hz(hz))
    }

    pub fn set_coding_rate(&mut self, coding_rate: CodingRate) -> Result<(), LoRaError> {
        self.regs.update_register(
            REG_MODEM_CONFIG_1,
            MODEM_CONFIG_1_CR_KEEP,
            coding_rate.register_value() << 1,
        )?;
        self.config.coding_rate = coding_rate;
        debug!("Coding rate set to: 4/{}", coding_rate.denominator());
        Ok(())
    }

    /// Select the coding rate from a 4/n ratio such as `0.8`
    pub fn set_coding_rate_ratio(&mut self, ratio: f64) -> Result<(), LoRaError> {
        self.set_coding_rate(CodingRate::from_ratio(ratio))
    }

    pub fn set_preamble_length(&mut self, length: u16) -> Result<(), LoRaError> {
        let [msb, lsb] = length.to_be_bytes();
        self.regs.write_register(REG_PREAMBLE_MSB, &[msb])?;
        self.regs.write_register(REG_PREAMBLE_LSB, &[lsb])?;
        self.config.preamble_length = length;
        Ok(())
    }

    pub fn set_sync_word(&mut self, sync_word: u8) -> Result<(), LoRaError> {
        self.regs.write_register(REG_SYNC_WORD, &[sync_word])?;
        self.config.sync_word = sync_word;
        Ok(())
    }

    /// Output power on PA_BOOST, clamped to 2..=17 dBm
    pub fn set_tx_power(&mut self, dbm: u8) -> Result<(), LoRaError> {
        let dbm = clamp_tx_power(dbm);
        // Pout = 2 + OutputPower on PA_BOOST
        self.regs
            .write_register(REG_PA_CONFIG, &[PA_BOOST | (dbm - TX_POWER_MIN_DBM)])?;
        self.config.tx_power_dbm = dbm;
        debug!("TX power set to: {} dBm", dbm);
        Ok(())
    }

    pub fn set_crc(&mut self, enabled: bool) -> Result<(), LoRaError> {
        let bits = if enabled { MODEM_CONFIG_2_CRC_ON } else { 0 };
        self.regs
            .update_register(REG_MODEM_CONFIG_2, !MODEM_CONFIG_2_CRC_ON, bits)?;
        self.config.crc = enabled;
        Ok(())
    }

    pub fn set_lna_boost(&mut self, enabled: bool) -> Result<(), LoRaError> {
        let bits = if enabled { LNA_BOOST_HF } else { 0 };
        self.regs.update_register(REG_LNA, !LNA_BOOST_HF, bits)?;
        Ok(())
    }

    /// Invert I and Q, as used on downlinks by LoRaWAN gateways
    pub fn set_invert_iq(&mut self, inverted: bool) -> Result<(), LoRaError> {
        let (iq, iq2) = if inverted {
            (INVERT_IQ_ON, INVERT_IQ2_ON)
        } else {
            (INVERT_IQ_OFF, INVERT_IQ2_OFF)
        };
        self.regs.write_register(REG_INVERT_IQ, &[iq])?;
        self.regs.write_register(REG_INVERT_IQ2, &[iq2])?;
        Ok(())
    }

    pub fn set_explicit_header_mode(&mut self) -> Result<(), LoRaError> {
        self.set_header_mode(HeaderMode::Explicit)
    }

    pub fn set_implicit_header_mode(&mut self) -> Result<(), LoRaError> {
        self.set_header_mode(HeaderMode::Implicit)
    }

    pub fn set_header_mode(&mut self, header_mode: HeaderMode) -> Result<(), LoRaError> {
        let bits = match header_mode {
            HeaderMode::Explicit => 0,
            HeaderMode::Implicit => MODEM_CONFIG_1_IMPLICIT_HEADER,
        };
        self.regs.update_register(
            REG_MODEM_CONFIG_1,
            !MODEM_CONFIG_1_IMPLICIT_HEADER,
            bits,
        )?;
        self.config.header_mode = header_mode;
        Ok(())
    }

    // =========================================================================
    // IRQ flags and DIO0
    // =========================================================================

    pub fn irq_flags(&mut self) -> Result<IrqFlags, LoRaError> {
        Ok(IrqFlags::from(self.regs.read_register(REG_IRQ_FLAGS)?))
    }

    /// Clear every latched IRQ flag and return the flags that were set
    pub fn clear_irq_flags(&mut self) -> Result<IrqFlags, LoRaError> {
        let flags = self.irq_flags()?;
        self.regs.write_register(REG_IRQ_FLAGS, &[flags.bits()])?;
        Ok(flags)
    }

    pub fn map_dio0(&mut self, mapping: Dio0Mapping) -> Result<(), LoRaError> {
        self.regs
            .write_register(REG_DIO_MAPPING_1, &[mapping.register_value()])?;
        Ok(())
    }

    // =========================================================================
    // Transmit
    // =========================================================================

    /// Send `payload` in implicit header mode and wait up to `timeout` for TxDone on DIO0.
    ///
    /// The chip is back in Standby when this returns, whatever the outcome.
    pub fn transmit(&mut self, payload: &[u8], timeout: Duration) -> Result<(), LoRaError> {
        if payload.len() > MAX_PKT_LENGTH {
            return Err(LoRaError::PayloadTooLarge(payload.len()));
        }

        self.set_implicit_header_mode()?;
        self.clear_irq_flags()?;
        self.regs
            .write_register(REG_FIFO_ADDR_PTR, &[FIFO_BASE_ADDR])?;
        self.regs
            .write_register(REG_PAYLOAD_LENGTH, &[payload.len() as u8])?;
        if !payload.is_empty() {
            self.regs.write_register(REG_FIFO, payload)?;
        }
        self.map_dio0(Dio0Mapping::TxDone)?;
        // Armed before the mode write so a TxDone edge raised right away is latched
        self.irq.arm()?;

        let mut guard = self.enter_mode(Mode::Transmit)?;
        let edge = guard.irq.wait_for_edge(timeout)?;

        if !edge {
            guard.stats.tx_timeouts += 1;
            warn!("Transmit timed out after {:?}: DIO0 did not rise", timeout);
            return Err(LoRaError::TransmitTimeout);
        }

        guard.stats.transmissions += 1;
        guard.finish()?;
        info!("Transmitted {} bytes", payload.len());
        Ok(())
    }

    // =========================================================================
    // Receive
    // =========================================================================

    /// Listen in ReceiveContinuous until `cancel` fires, delivering every packet on `output`.
    ///
    /// Cancellation is checked once per packet and never interrupts a wait in progress, so a
    /// request is seen at the latest `timeout` after it was made. A dropped cancel sender or
    /// a closed `output` also ends the session. Returns `Ok(())` on cancellation; any receive
    /// timeout, spurious edge or CRC error ends the session with that error. Standby is
    /// restored on every exit path.
    ///
    /// # Panics
    ///
    /// Messages are sent with [`mpsc::Sender::blocking_send`], which panics when called from
    /// within an asynchronous execution context. Run this from a plain thread or from
    /// `tokio::task::spawn_blocking`.
    pub fn receive_continuous(
        &mut self,
        cancel: &mut oneshot::Receiver<()>,
        timeout: Duration,
        output: &mpsc::Sender<Message>,
    ) -> Result<(), LoRaError> {
        self.prepare_receive()?;
        let mut guard = self.enter_mode(Mode::ReceiveContinuous)?;
        info!(
            "Listening (continuous) on {:.3} MHz",
            guard.config.frequency_hz as f64 / 1e6
        );

        loop {
            match cancel.try_recv() {
                Ok(()) | Err(TryRecvError::Closed) => {
                    info!("Receive cancelled");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            let message = guard.receive_packet(timeout)?;
            if output.blocking_send(message).is_err() {
                info!("Message receiver closed, stopping receive");
                break;
            }
        }

        guard.finish()
    }

    /// Receive one packet in ReceiveSingle mode
    pub fn receive_single(&mut self, timeout: Duration) -> Result<Message, LoRaError> {
        self.prepare_receive()?;
        let mut guard = self.enter_mode(Mode::ReceiveSingle)?;
        let message = guard.receive_packet(timeout)?;
        guard.finish()?;
        Ok(message)
    }

    fn prepare_receive(&mut self) -> Result<(), LoRaError> {
        self.clear_irq_flags()?;
        self.map_dio0(Dio0Mapping::RxDone)?;
        self.set_explicit_header_mode()?;
        self.irq.arm()?;
        Ok(())
    }

    /// Wait for one packet in an RX mode that is already entered
    fn receive_packet(&mut self, timeout: Duration) -> Result<Message, LoRaError> {
        if !self.irq.wait_for_edge(timeout)? {
            self.stats.rx_timeouts += 1;
            warn!("No packet within {:?}", timeout);
            return Err(LoRaError::ReceiveTimeout);
        }

        self.wait_rx_done()?;
        let flags = self.clear_irq_flags()?;
        if flags.crc_error() {
            self.stats.crc_errors += 1;
            warn!("CRC error on received packet (IRQ flags 0x{:02X})", flags.bits());
            return Err(LoRaError::CrcMismatch);
        }

        let message = self.read_message()?;
        self.stats.packets_received += 1;
        self.stats.last_rssi = Some(message.rssi);
        self.stats.last_snr = Some(message.snr);
        debug!(
            "Received {} bytes, RSSI {} dBm, SNR {:.2} dB",
            message.len(),
            message.rssi,
            message.snr
        );
        Ok(message)
    }

    /// Poll RegIrqFlags for RxDone after a DIO0 edge
    pub fn wait_rx_done(&mut self) -> Result<(), LoRaError> {
        for attempt in 1..=RX_DONE_POLL_ATTEMPTS {
            if self.irq_flags()?.rx_done() {
                return Ok(());
            }
            if attempt < RX_DONE_POLL_ATTEMPTS {
                thread::sleep(Duration::from_millis(1));
            }
        }
        warn!("DIO0 rose but RxDone was not set");
        Err(LoRaError::ReceiveNotDone)
    }

    // =========================================================================
    // FIFO and packet status
    // =========================================================================

    /// Read the last received payload from the FIFO
    pub fn read_fifo(&mut self) -> Result<Vec<u8>, LoRaError> {
        let count_register = match self.config.header_mode {
            HeaderMode::Implicit => REG_PAYLOAD_LENGTH,
            HeaderMode::Explicit => REG_RX_NB_BYTES,
        };
        let count = usize::from(self.regs.read_register(count_register)?);
        let current = self.regs.read_register(REG_FIFO_RX_CURRENT_ADDR)?;
        self.regs.write_register(REG_FIFO_ADDR_PTR, &[current])?;
        if count == 0 {
            return Ok(Vec::new());
        }
        Ok(self.regs.read_register_burst(REG_FIFO, count)?)
    }

    /// RSSI of the last packet in dBm
    pub fn packet_rssi(&mut self) -> Result<i16, LoRaError> {
        let raw = self.regs.read_register(REG_PKT_RSSI_VALUE)?;
        Ok(rssi_from_raw(raw, self.config.frequency_hz))
    }

    /// SNR of the last packet in dB
    pub fn packet_snr(&mut self) -> Result<f32, LoRaError> {
        Ok(snr_from_raw(self.regs.read_register(REG_PKT_SNR_VALUE)?))
    }

    /// Current channel RSSI in dBm
    pub fn instantaneous_rssi(&mut self) -> Result<i16, LoRaError> {
        let raw = self.regs.read_register(REG_RSSI_VALUE)?;
        Ok(rssi_from_raw(raw, self.config.frequency_hz))
    }

    /// Payload and signal quality of the last received packet
    pub fn read_message(&mut self) -> Result<Message, LoRaError> {
        let payload = self.read_fifo()?;
        let rssi = self.packet_rssi()?;
        let snr = self.packet_snr()?;
        Ok(Message { payload, rssi, snr })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &LoRaConfig {
        &self.config
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = LinkStats::default();
    }
}

/// Exclusive use of the chip in a TX or RX mode.
///
/// Dropping the guard writes Standby and logs a failure, since `Drop` cannot return it.
/// [`finish`](ModeGuard::finish) does the same but reports the error.
pub struct ModeGuard<'a, S: SpiBus, R: ResetLine, I: InterruptLine> {
    radio: &'a mut Sx127x<S, R, I>,
    restored: bool,
}

impl<'a, S: SpiBus, R: ResetLine, I: InterruptLine> ModeGuard<'a, S, R, I> {
    fn new(radio: &'a mut Sx127x<S, R, I>) -> Self {
        Self {
            radio,
            restored: false,
        }
    }

    /// Return the chip to Standby
    pub fn finish(mut self) -> Result<(), LoRaError> {
        self.restored = true;
        self.radio.standby()
    }
}

impl<S: SpiBus, R: ResetLine, I: InterruptLine> Deref for ModeGuard<'_, S, R, I> {
    type Target = Sx127x<S, R, I>;

    fn deref(&self) -> &Self::Target {
        self.radio
    }
}

impl<S: SpiBus, R: ResetLine, I: InterruptLine> DerefMut for ModeGuard<'_, S, R, I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.radio
    }
}

impl<S: SpiBus, R: ResetLine, I: InterruptLine> Drop for ModeGuard<'_, S, R, I> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.radio.standby() {
            error!("Failed to return SX127x to standby: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::hal::mock::{
        MockChip, MockInterruptLine, MockResetLine, MockSpiBus, RxPacket,
    };
    use std::time::Instant;

    type MockRadio = Sx127x<MockSpiBus, MockResetLine, MockInterruptLine>;

    fn radio(chip: &MockChip) -> MockRadio {
        Sx127x::new(
            chip.spi(),
            Some(chip.reset_line()),
            chip.interrupt_line(),
            LoRaConfig::default(),
        )
    }

    fn configured(chip: &MockChip) -> MockRadio {
        let mut radio = radio(chip);
        radio.configure().unwrap();
        chip.clear_write_log();
        radio
    }

    #[test]
    fn test_configure_leaves_standby() {
        let chip = MockChip::new();
        let mut radio = radio(&chip);
        radio.configure().unwrap();

        assert_eq!(chip.mode(), MODE_STANDBY);
        assert_eq!(radio.current_mode(), Some(Mode::Standby));
        assert_eq!(radio.read_mode().unwrap(), Some(Mode::Standby));
        // Sleep is entered before the frequency is programmed
        assert_eq!(chip.writes_to(REG_OP_MODE)[0], vec![0x80]);
    }

    #[test]
    fn test_configure_programs_registers() {
        let chip = MockChip::new();
        configured(&chip);

        assert_eq!(chip.register(REG_FRF_MSB), 0xE4);
        assert_eq!(chip.register(REG_FRF_MID), 0xC0);
        assert_eq!(chip.register(REG_FRF_LSB), 0x00);
        assert_eq!(chip.register(REG_PA_CONFIG), 0x8F);
        assert_eq!(chip.register(REG_LNA), 0x23);
        assert_eq!(chip.register(REG_MODEM_CONFIG_3), 0x04);
        assert_eq!(chip.register(REG_FIFO_TX_BASE_ADDR), 0x00);
        assert_eq!(chip.register(REG_FIFO_RX_BASE_ADDR), 0x00);
        // BW 125 kHz, CR 4/5, explicit header
        assert_eq!(chip.register(REG_MODEM_CONFIG_1), 0x72);
        // SF7, CRC on
        assert_eq!(chip.register(REG_MODEM_CONFIG_2), 0x74);
        assert_eq!(chip.register(REG_SYNC_WORD), 0x12);
        assert_eq!(chip.register(REG_PREAMBLE_MSB), 0x00);
        assert_eq!(chip.register(REG_PREAMBLE_LSB), 0x08);
    }

    #[test]
    fn test_configure_reset_pulse_timing() {
        let chip = MockChip::new();
        let mut radio = radio(&chip);
        let start = Instant::now();
        radio.configure().unwrap();

        let levels = chip.reset_levels();
        assert_eq!(levels.len(), 2);
        assert!(!levels[0].0);
        assert!(levels[1].0);
        assert!(levels[1].1 - levels[0].1 >= Duration::from_millis(RESET_PULSE_MS));
        assert!(start.elapsed() >= Duration::from_millis(2 * RESET_PULSE_MS));
    }

    #[test]
    fn test_configure_version_mismatch_stops_before_writes() {
        let chip = MockChip::new().with_version(0x22);
        let mut radio = radio(&chip);

        match radio.configure() {
            Err(LoRaError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, 0x12);
                assert_eq!(found, 0x22);
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
        assert!(chip.write_log().is_empty());
        assert_eq!(radio.current_mode(), None);
    }

    #[test]
    fn test_configure_without_reset_line() {
        let chip = MockChip::new();
        let mut radio =
            Sx127x::without_reset(chip.spi(), chip.interrupt_line(), LoRaConfig::default());
        radio.configure().unwrap();
        assert!(chip.reset_levels().is_empty());
        assert_eq!(chip.mode(), MODE_STANDBY);
    }

    #[test]
    fn test_configure_pushes_custom_config() {
        let chip = MockChip::new();
        let config = LoRaConfig {
            spreading_factor: 10,
            bandwidth: Bandwidth::Bw250,
            coding_rate: CodingRate::Cr4_8,
            sync_word: 0x34,
            frequency_hz: 433_000_000,
            tx_power_dbm: 30,
            ..Default::default()
        };
        let mut radio = Sx127x::new(
            chip.spi(),
            Some(chip.reset_line()),
            chip.interrupt_line(),
            config,
        );
        radio.configure().unwrap();

        assert_eq!(chip.register(REG_MODEM_CONFIG_1), 0x88);
        assert_eq!(chip.register(REG_MODEM_CONFIG_2) >> 4, 10);
        assert_eq!(chip.register(REG_SYNC_WORD), 0x34);
        assert_eq!(chip.register(REG_PA_CONFIG), 0x8F);
        assert_eq!(radio.config().tx_power_dbm, 17);
        assert_eq!(radio.read_frequency().unwrap(), 433_000_000);
    }

    #[test]
    fn test_bandwidth_preserves_other_bits() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.set_register(REG_MODEM_CONFIG_1, 0x0B);

        radio.set_bandwidth(Bandwidth::Bw250).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_1), 0x8B);
        radio.set_signal_bandwidth_hz(10_000).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_1), 0x1B);
        assert_eq!(radio.config().bandwidth, Bandwidth::Bw10_4);
    }

    #[test]
    fn test_coding_rate_preserves_other_bits() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.set_register(REG_MODEM_CONFIG_1, 0xA1);

        radio.set_coding_rate(CodingRate::Cr4_8).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_1), 0xA9);
        radio.set_coding_rate_ratio(0.7).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_1), 0xA5);
        assert_eq!(radio.config().coding_rate, CodingRate::Cr4_6);
    }

    #[test]
    fn test_spreading_factor_preserves_other_bits_and_clamps() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.set_register(REG_MODEM_CONFIG_2, 0x77);

        radio.set_spreading_factor(10).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_2), 0xA7);
        assert_eq!(chip.register(REG_DETECTION_OPTIMIZE), 0xC3);
        assert_eq!(chip.register(REG_DETECTION_THRESHOLD), 0x0A);

        radio.set_spreading_factor(15).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_2), 0xC7);
        assert_eq!(radio.config().spreading_factor, 12);

        radio.set_spreading_factor(3).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_2), 0x67);
        assert_eq!(chip.register(REG_DETECTION_OPTIMIZE), 0xC5);
        assert_eq!(chip.register(REG_DETECTION_THRESHOLD), 0x0C);
        assert_eq!(radio.config().spreading_factor, 6);
    }

    #[test]
    fn test_crc_preserves_other_bits() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.set_register(REG_MODEM_CONFIG_2, 0xF7);

        radio.set_crc(false).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_2), 0xF3);
        assert!(!radio.config().crc);
        radio.set_crc(true).unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_2), 0xF7);
    }

    #[test]
    fn test_header_mode_toggles_single_bit() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.set_register(REG_MODEM_CONFIG_1, 0x72);

        radio.set_implicit_header_mode().unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_1), 0x73);
        assert_eq!(radio.config().header_mode, HeaderMode::Implicit);
        radio.set_explicit_header_mode().unwrap();
        assert_eq!(chip.register(REG_MODEM_CONFIG_1), 0x72);
        assert_eq!(radio.config().header_mode, HeaderMode::Explicit);
    }

    #[test]
    fn test_tx_power_clamped() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);

        radio.set_tx_power(30).unwrap();
        assert_eq!(chip.register(REG_PA_CONFIG), 0x8F);
        radio.set_tx_power(0).unwrap();
        assert_eq!(chip.register(REG_PA_CONFIG), 0x80);
        assert_eq!(radio.config().tx_power_dbm, 2);
        radio.set_tx_power(10).unwrap();
        assert_eq!(chip.register(REG_PA_CONFIG), 0x88);
    }

    #[test]
    fn test_lna_boost_and_invert_iq() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);

        radio.set_lna_boost(false).unwrap();
        assert_eq!(chip.register(REG_LNA), 0x20);
        radio.set_invert_iq(true).unwrap();
        assert_eq!(chip.register(REG_INVERT_IQ), 0x66);
        assert_eq!(chip.register(REG_INVERT_IQ2), 0x19);
        radio.set_invert_iq(false).unwrap();
        assert_eq!(chip.register(REG_INVERT_IQ), 0x27);
        assert_eq!(chip.register(REG_INVERT_IQ2), 0x1D);
    }

    #[test]
    fn test_setter_failure_leaves_mirror_unchanged() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.fail_after(0);

        assert!(matches!(radio.set_sync_word(0x34), Err(LoRaError::Bus(_))));
        assert_eq!(radio.config().sync_word, 0x12);
        assert!(radio.set_spreading_factor(9).is_err());
        assert_eq!(radio.config().spreading_factor, 7);
    }

    #[test]
    fn test_transmit_writes_fifo_and_returns_to_standby() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);

        radio.transmit(b"hello", Duration::from_secs(1)).unwrap();

        assert_eq!(chip.fifo(0, 5), b"hello".to_vec());
        assert_eq!(chip.register(REG_PAYLOAD_LENGTH), 5);
        assert_eq!(chip.register(REG_DIO_MAPPING_1), DIO0_TX_DONE);
        assert_eq!(
            chip.register(REG_MODEM_CONFIG_1) & MODEM_CONFIG_1_IMPLICIT_HEADER,
            MODEM_CONFIG_1_IMPLICIT_HEADER
        );
        assert_eq!(chip.writes_to(REG_FIFO_ADDR_PTR), vec![vec![0x00]]);
        assert_eq!(
            chip.writes_to(REG_OP_MODE),
            vec![vec![Mode::Transmit.opmode()], vec![Mode::Standby.opmode()]]
        );
        assert_eq!(chip.mode(), MODE_STANDBY);
        assert_eq!(chip.lost_edges(), 0);
        assert_eq!(radio.stats().transmissions, 1);
    }

    #[test]
    fn test_transmit_timeout() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.disable_tx_done();

        let start = Instant::now();
        let result = radio.transmit(&[0x55; 20], Duration::from_secs(1));

        assert!(matches!(result, Err(LoRaError::TransmitTimeout)));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(chip.mode(), MODE_STANDBY);
        assert_eq!(radio.current_mode(), Some(Mode::Standby));
        assert_eq!(radio.stats().tx_timeouts, 1);
    }

    #[test]
    fn test_transmit_rejects_oversized_payload() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        let transfers = chip.transfer_count();

        let result = radio.transmit(&[0u8; 256], Duration::from_secs(1));
        assert!(matches!(result, Err(LoRaError::PayloadTooLarge(256))));
        assert_eq!(chip.transfer_count(), transfers);
    }

    #[test]
    fn test_receive_single() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.queue_packet(RxPacket::new(b"ping").with_signal(100, -8));

        let message = radio.receive_single(Duration::from_secs(1)).unwrap();
        assert_eq!(message.payload, b"ping".to_vec());
        assert_eq!(message.rssi, 100 - 157);
        assert_eq!(message.snr, -2.0);
        assert_eq!(chip.mode(), MODE_STANDBY);
        assert_eq!(radio.config().header_mode, HeaderMode::Explicit);
        assert_eq!(radio.stats().packets_received, 1);
        assert_eq!(radio.stats().last_rssi, Some(-57));
    }

    #[test]
    fn test_receive_continuous_until_cancelled() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.queue_packet(RxPacket::new(b"first"));
        chip.queue_packet(RxPacket::new(b"second packet"));

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        chip.cancel_on_wait(1, cancel_tx);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        radio
            .receive_continuous(&mut cancel_rx, Duration::from_secs(1), &out_tx)
            .unwrap();

        assert_eq!(out_rx.try_recv().unwrap().payload, b"first".to_vec());
        let second = out_rx.try_recv().unwrap();
        assert_eq!(second.payload, b"second packet".to_vec());
        assert_eq!(second.len(), 13);
        assert!(out_rx.try_recv().is_err());
        assert_eq!(chip.mode(), MODE_STANDBY);
    }

    #[test]
    fn test_receive_crc_error_aborts_session() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.queue_packet(RxPacket::new(b"good"));
        chip.queue_packet(RxPacket::new(b"bad").with_crc_error());

        let (_cancel_tx, mut cancel_rx) = oneshot::channel();
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let result = radio.receive_continuous(&mut cancel_rx, Duration::from_secs(1), &out_tx);

        assert!(matches!(result, Err(LoRaError::CrcMismatch)));
        assert_eq!(out_rx.try_recv().unwrap().payload, b"good".to_vec());
        assert!(out_rx.try_recv().is_err());
        assert_eq!(chip.mode(), MODE_STANDBY);
        assert_eq!(radio.stats().crc_errors, 1);
    }

    #[test]
    fn test_receive_spurious_edge() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.queue_spurious_edges(1);

        let result = radio.receive_single(Duration::from_secs(1));
        assert!(matches!(result, Err(LoRaError::ReceiveNotDone)));
        assert_eq!(chip.mode(), MODE_STANDBY);
    }

    #[test]
    fn test_receive_timeout() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);

        let (_cancel_tx, mut cancel_rx) = oneshot::channel();
        let (out_tx, _out_rx) = mpsc::channel(1);
        let result =
            radio.receive_continuous(&mut cancel_rx, Duration::from_millis(50), &out_tx);

        assert!(matches!(result, Err(LoRaError::ReceiveTimeout)));
        assert_eq!(chip.mode(), MODE_STANDBY);
        assert_eq!(radio.stats().rx_timeouts, 1);
    }

    #[test]
    fn test_dropped_cancel_sender_stops_receive() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.queue_packet(RxPacket::new(b"never read"));

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        drop(cancel_tx);
        let (out_tx, mut out_rx) = mpsc::channel(1);

        radio
            .receive_continuous(&mut cancel_rx, Duration::from_secs(1), &out_tx)
            .unwrap();
        assert!(out_rx.try_recv().is_err());
        assert_eq!(chip.mode(), MODE_STANDBY);
    }

    #[test]
    fn test_closed_output_stops_receive() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.queue_packet(RxPacket::new(b"orphan"));

        let (_cancel_tx, mut cancel_rx) = oneshot::channel();
        let (out_tx, out_rx) = mpsc::channel(1);
        drop(out_rx);

        radio
            .receive_continuous(&mut cancel_rx, Duration::from_secs(1), &out_tx)
            .unwrap();
        assert_eq!(chip.mode(), MODE_STANDBY);
        assert_eq!(radio.stats().packets_received, 1);
    }

    #[test]
    fn test_read_fifo_follows_rx_current_addr() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.queue_packet(RxPacket::new(b"abc"));
        chip.queue_packet(RxPacket::new(b"defgh"));

        radio.receive_single(Duration::from_secs(1)).unwrap();
        let second = radio.receive_single(Duration::from_secs(1)).unwrap();

        assert_eq!(second.payload, b"defgh".to_vec());
        assert_eq!(chip.register(REG_FIFO_RX_CURRENT_ADDR), 3);
    }

    #[test]
    fn test_read_fifo_implicit_uses_payload_length() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.queue_packet(RxPacket::new(b"0123456789"));
        radio.receive_single(Duration::from_secs(1)).unwrap();

        radio.set_implicit_header_mode().unwrap();
        chip.set_register(REG_PAYLOAD_LENGTH, 4);
        assert_eq!(radio.read_fifo().unwrap(), b"0123".to_vec());
    }

    #[test]
    fn test_transmit_bus_failure_surfaces() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.fail_after(3);

        let result = radio.transmit(b"payload", Duration::from_millis(10));
        assert!(matches!(result, Err(LoRaError::Bus(_))));
    }

    #[test]
    fn test_transmit_mode_write_failure_returns_immediately() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        // Header mode, IRQ clear, FIFO pointer, length, FIFO and DIO0 take 8 transfers
        chip.fail_after(8);

        let start = Instant::now();
        let result = radio.transmit(b"hello", Duration::from_secs(3));

        assert!(matches!(result, Err(LoRaError::Bus(_))));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(chip.writes_to(REG_FIFO), vec![b"hello".to_vec()]);
        assert!(chip.writes_to(REG_OP_MODE).is_empty());
        assert_eq!(radio.stats().tx_timeouts, 0);
    }

    #[test]
    fn test_enter_mode_requires_active_mode() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);

        assert!(matches!(
            radio.enter_mode(Mode::Sleep),
            Err(LoRaError::Config(_))
        ));
        assert!(radio.enter_mode(Mode::Standby).is_err());
        assert!(chip.write_log().is_empty());

        let guard = radio.enter_mode(Mode::ReceiveSingle).unwrap();
        assert_eq!(chip.mode(), MODE_RX_SINGLE);
        drop(guard);
        assert_eq!(chip.mode(), MODE_STANDBY);
    }

    #[test]
    fn test_instantaneous_rssi_uses_band_offset() {
        let chip = MockChip::new();
        let mut radio = configured(&chip);
        chip.set_register(REG_RSSI_VALUE, 60);
        assert_eq!(radio.instantaneous_rssi().unwrap(), 60 - 157);

        radio.sleep().unwrap();
        radio.set_frequency(433_000_000).unwrap();
        radio.standby().unwrap();
        assert_eq!(radio.instantaneous_rssi().unwrap(), 60 - 164);
    }
}
