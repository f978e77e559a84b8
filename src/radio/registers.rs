//! # SX127x LoRa Register Definitions and Constants
//!
//! Register addresses, operating mode bits and IRQ masks for the Semtech SX1276/77/78/79
//! family (and modules built on it such as the HopeRF RFM95/96/98) operating in LoRa mode.
//!
//! ## Register Map
//!
//! Only the LoRa page is described here:
//! - 0x00-0x0F: FIFO access, operating mode, RF carrier, PA and LNA
//! - 0x0D-0x13: FIFO pointer indirection and packet status
//! - 0x19-0x2C: Packet quality (SNR/RSSI), modem configuration, frequency error
//! - 0x31-0x4D: Detection tuning, IQ inversion, sync word, DIO mapping, version, PA DAC

// =============================================================================
// SX127x Register Addresses (LoRa mode)
// =============================================================================

/// FIFO read/write access register
pub const REG_FIFO: u8 = 0x00;

/// Operating mode and long-range (LoRa) selection
pub const REG_OP_MODE: u8 = 0x01;

/// RF carrier frequency (MSB)
pub const REG_FRF_MSB: u8 = 0x06;

/// RF carrier frequency (MID)
pub const REG_FRF_MID: u8 = 0x07;

/// RF carrier frequency (LSB)
pub const REG_FRF_LSB: u8 = 0x08;

/// PA selection and output power control
pub const REG_PA_CONFIG: u8 = 0x09;

/// Over current protection control
pub const REG_OCP: u8 = 0x0B;

/// LNA gain and boost settings
pub const REG_LNA: u8 = 0x0C;

/// SPI interface address pointer into the FIFO data buffer
pub const REG_FIFO_ADDR_PTR: u8 = 0x0D;

/// Write base address in FIFO data buffer for the TX modulator
pub const REG_FIFO_TX_BASE_ADDR: u8 = 0x0E;

/// Read base address in FIFO data buffer for the RX demodulator
pub const REG_FIFO_RX_BASE_ADDR: u8 = 0x0F;

/// Start address (in data buffer) of the last packet received
pub const REG_FIFO_RX_CURRENT_ADDR: u8 = 0x10;

/// IRQ flags, cleared by writing a one to the bit
pub const REG_IRQ_FLAGS: u8 = 0x12;

/// Number of payload bytes of the latest packet received
pub const REG_RX_NB_BYTES: u8 = 0x13;

/// Estimation of SNR on the last packet received (two's complement, 0.25 dB steps)
pub const REG_PKT_SNR_VALUE: u8 = 0x19;

/// RSSI of the latest packet received
pub const REG_PKT_RSSI_VALUE: u8 = 0x1A;

/// Current (instantaneous) RSSI value
pub const REG_RSSI_VALUE: u8 = 0x1B;

/// Bandwidth, coding rate and header mode
pub const REG_MODEM_CONFIG_1: u8 = 0x1D;

/// Spreading factor, continuous TX mode and RX payload CRC
pub const REG_MODEM_CONFIG_2: u8 = 0x1E;

/// Preamble length (MSB)
pub const REG_PREAMBLE_MSB: u8 = 0x20;

/// Preamble length (LSB)
pub const REG_PREAMBLE_LSB: u8 = 0x21;

/// Payload length, required in implicit header mode
pub const REG_PAYLOAD_LENGTH: u8 = 0x22;

/// Low data rate optimize and AGC auto
pub const REG_MODEM_CONFIG_3: u8 = 0x26;

/// Estimated frequency error (MSB)
pub const REG_FREQ_ERROR_MSB: u8 = 0x28;

/// Estimated frequency error (MID)
pub const REG_FREQ_ERROR_MID: u8 = 0x29;

/// Estimated frequency error (LSB)
pub const REG_FREQ_ERROR_LSB: u8 = 0x2A;

/// Wideband RSSI measurement, used as an entropy source
pub const REG_RSSI_WIDEBAND: u8 = 0x2C;

/// LoRa detection optimize for SF6
pub const REG_DETECTION_OPTIMIZE: u8 = 0x31;

/// Invert LoRa I and Q signals
pub const REG_INVERT_IQ: u8 = 0x33;

/// LoRa detection threshold for SF6
pub const REG_DETECTION_THRESHOLD: u8 = 0x37;

/// LoRa sync word
pub const REG_SYNC_WORD: u8 = 0x39;

/// Second IQ inversion register
pub const REG_INVERT_IQ2: u8 = 0x3B;

/// Mapping of pins DIO0 to DIO3
pub const REG_DIO_MAPPING_1: u8 = 0x40;

/// Silicon revision (read-only)
pub const REG_VERSION: u8 = 0x42;

/// Higher power settings of the PA
pub const REG_PA_DAC: u8 = 0x4D;

// =============================================================================
// Operating Mode (RegOpMode)
// =============================================================================

/// LongRangeMode bit, selects the LoRa modem. Must accompany every mode value.
pub const MODE_LONG_RANGE: u8 = 0x80;

pub const MODE_SLEEP: u8 = 0x00;
pub const MODE_STANDBY: u8 = 0x01;
pub const MODE_TX: u8 = 0x03;
pub const MODE_RX_CONTINUOUS: u8 = 0x05;
pub const MODE_RX_SINGLE: u8 = 0x06;

/// Mask of the mode field inside RegOpMode
pub const MODE_MASK: u8 = 0x07;

// =============================================================================
// PA Configuration
// =============================================================================

/// Route output through the PA_BOOST pin (RFM95/96/98 modules only wire this pin)
pub const PA_BOOST: u8 = 0x80;

/// Lowest programmable output power on PA_BOOST, in dBm
pub const TX_POWER_MIN_DBM: u8 = 2;

/// Highest output power on PA_BOOST without the +20 dBm PA DAC setting
pub const TX_POWER_MAX_DBM: u8 = 17;

// =============================================================================
// IRQ Flags (RegIrqFlags)
// =============================================================================

pub const IRQ_CAD_DETECTED_MASK: u8 = 0x01;
pub const IRQ_FHSS_CHANGE_CHANNEL_MASK: u8 = 0x02;
pub const IRQ_CAD_DONE_MASK: u8 = 0x04;
pub const IRQ_TX_DONE_MASK: u8 = 0x08;
pub const IRQ_VALID_HEADER_MASK: u8 = 0x10;
pub const IRQ_PAYLOAD_CRC_ERROR_MASK: u8 = 0x20;
pub const IRQ_RX_DONE_MASK: u8 = 0x40;
pub const IRQ_RX_TIMEOUT_MASK: u8 = 0x80;

// =============================================================================
// DIO Mapping (RegDioMapping1, DIO0 field in bits 7-6)
// =============================================================================

/// DIO0 asserts on RxDone
pub const DIO0_RX_DONE: u8 = 0x00;

/// DIO0 asserts on TxDone
pub const DIO0_TX_DONE: u8 = 0x40;

// =============================================================================
// Modem Configuration Fields
// =============================================================================

/// RegModemConfig1 bits kept when programming the bandwidth
pub const MODEM_CONFIG_1_BW_KEEP: u8 = 0x0F;

/// RegModemConfig1 bits kept when programming the coding rate
pub const MODEM_CONFIG_1_CR_KEEP: u8 = 0xF1;

/// RegModemConfig1 ImplicitHeaderModeOn bit
pub const MODEM_CONFIG_1_IMPLICIT_HEADER: u8 = 0x01;

/// RegModemConfig2 bits kept when programming the spreading factor
pub const MODEM_CONFIG_2_SF_KEEP: u8 = 0x0F;

/// RegModemConfig2 RxPayloadCrcOn bit
pub const MODEM_CONFIG_2_CRC_ON: u8 = 0x04;

/// RegModemConfig3 AgcAutoOn, LNA gain set by the internal AGC loop
pub const MODEM_CONFIG_3_AGC_AUTO_ON: u8 = 0x04;

/// RegLna LnaBoostHf field (150% LNA current)
pub const LNA_BOOST_HF: u8 = 0x03;

/// Detection optimize / threshold pair for SF6
pub const DETECTION_OPTIMIZE_SF6: u8 = 0xC5;
pub const DETECTION_THRESHOLD_SF6: u8 = 0x0C;

/// Detection optimize / threshold pair for SF7 to SF12
pub const DETECTION_OPTIMIZE_SF7_TO_SF12: u8 = 0xC3;
pub const DETECTION_THRESHOLD_SF7_TO_SF12: u8 = 0x0A;

/// RegInvertIQ values for inverted and normal IQ (RX and TX inversion bits together)
pub const INVERT_IQ_ON: u8 = 0x66;
pub const INVERT_IQ_OFF: u8 = 0x27;

/// RegInvertIQ2 values for inverted and normal IQ
pub const INVERT_IQ2_OFF: u8 = 0x1D;
pub const INVERT_IQ2_ON: u8 = 0x19;

// =============================================================================
// Chip Constants
// =============================================================================

/// Silicon revision reported in RegVersion by the SX1276/77/78/79
pub const SX127X_VERSION: u8 = 0x12;

/// Crystal oscillator frequency, in Hz
pub const FXOSC_HZ: u64 = 32_000_000;

/// Frequency synthesizer step exponent, Fstep = FXOSC / 2^19
pub const FRF_SHIFT: u32 = 19;

/// Largest value of the 24-bit RegFrf word
pub const FRF_MAX: u32 = 0x00FF_FFFF;

/// Carrier frequencies below this threshold use the low frequency RF port
pub const RF_MID_BAND_THRESHOLD_HZ: u64 = 525_000_000;

/// Packet RSSI offset on the high frequency port (bands 2 and 3)
pub const RSSI_OFFSET_HF_PORT: i16 = 157;

/// Packet RSSI offset on the low frequency port (band 1)
pub const RSSI_OFFSET_LF_PORT: i16 = 164;

/// Largest payload the FIFO can hold
pub const MAX_PKT_LENGTH: usize = 255;

/// Base address of both TX and RX regions in the FIFO
pub const FIFO_BASE_ADDR: u8 = 0x00;

/// Number of IRQ flag polls after a DIO0 edge before giving up on RxDone
pub const RX_DONE_POLL_ATTEMPTS: usize = 5;

/// Minimum time the reset line is held low, then high, in milliseconds
pub const RESET_PULSE_MS: u64 = 10;

// =============================================================================
// Default Configuration Values
// =============================================================================

pub const DEFAULT_FREQUENCY_HZ: u64 = 915_000_000;
pub const DEFAULT_SPREADING_FACTOR: u8 = 7;
pub const DEFAULT_PREAMBLE_LENGTH: u16 = 8;
pub const DEFAULT_SYNC_WORD: u8 = 0x12;
pub const DEFAULT_TX_POWER_DBM: u8 = 17;

/// SPI clock used on the Raspberry Pi (chip supports up to 10 MHz)
pub const SPI_SPEED: u32 = 8_000_000;

/// Default BCM GPIO for DIO0
pub const DEFAULT_DIO0_PIN: u8 = 25;

/// Default BCM GPIO for NRESET
pub const DEFAULT_RESET_PIN: u8 = 17;
