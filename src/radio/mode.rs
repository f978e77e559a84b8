//! # SX127x Operating Modes
//!
//! RegOpMode holds the modem selection (bit 7, LongRangeMode) and the transceiver mode
//! (bits 2-0). The long-range bit must accompany every mode write or the chip falls back to
//! the FSK/OOK modem, so the OR is done in [`Mode::opmode`] and nowhere else.

use crate::radio::hal::{HalError, SpiBus};
use crate::radio::register_access::Registers;
use crate::radio::registers::*;
use std::fmt;

/// Transceiver modes used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Lowest power; frequency and modem registers are only writable here
    Sleep,
    /// Crystal running, ready for TX/RX
    Standby,
    /// Sends the FIFO payload, returns to standby on TxDone
    Transmit,
    /// Listens until told otherwise, FIFO refilled per packet
    ReceiveContinuous,
    /// Listens for one packet, returns to standby
    ReceiveSingle,
}

impl Mode {
    /// Mode field value without the long-range flag
    pub const fn bits(self) -> u8 {
        match self {
            Mode::Sleep => MODE_SLEEP,
            Mode::Standby => MODE_STANDBY,
            Mode::Transmit => MODE_TX,
            Mode::ReceiveContinuous => MODE_RX_CONTINUOUS,
            Mode::ReceiveSingle => MODE_RX_SINGLE,
        }
    }

    /// Full RegOpMode value for this mode in LoRa operation
    pub const fn opmode(self) -> u8 {
        MODE_LONG_RANGE | self.bits()
    }

    /// Decode RegOpMode. `None` when the LoRa modem is not selected or the mode is one the
    /// driver never enters (FSTX, FSRX, CAD).
    pub fn from_opmode(value: u8) -> Option<Self> {
        if value & MODE_LONG_RANGE == 0 {
            return None;
        }
        match value & MODE_MASK {
            MODE_SLEEP => Some(Mode::Sleep),
            MODE_STANDBY => Some(Mode::Standby),
            MODE_TX => Some(Mode::Transmit),
            MODE_RX_CONTINUOUS => Some(Mode::ReceiveContinuous),
            MODE_RX_SINGLE => Some(Mode::ReceiveSingle),
            _ => None,
        }
    }

    /// Modes in which the chip radiates or listens
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Mode::Transmit | Mode::ReceiveContinuous | Mode::ReceiveSingle
        )
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Sleep => "sleep",
            Mode::Standby => "standby",
            Mode::Transmit => "tx",
            Mode::ReceiveContinuous => "rx-continuous",
            Mode::ReceiveSingle => "rx-single",
        };
        f.write_str(name)
    }
}

/// Write RegOpMode and record the mode in the advisory cache
pub(crate) fn write_mode<S: SpiBus>(
    regs: &mut Registers<S>,
    cached: &mut Option<Mode>,
    mode: Mode,
) -> Result<(), HalError> {
    regs.write_register(REG_OP_MODE, &[mode.opmode()])?;
    *cached = Some(mode);
    log::debug!("SX127x mode set to: {}", mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opmode_always_carries_long_range_flag() {
        for mode in [
            Mode::Sleep,
            Mode::Standby,
            Mode::Transmit,
            Mode::ReceiveContinuous,
            Mode::ReceiveSingle,
        ] {
            assert_eq!(mode.opmode() & MODE_LONG_RANGE, MODE_LONG_RANGE);
            assert_eq!(Mode::from_opmode(mode.opmode()), Some(mode));
        }
        assert_eq!(Mode::Sleep.opmode(), 0x80);
        assert_eq!(Mode::Standby.opmode(), 0x81);
        assert_eq!(Mode::Transmit.opmode(), 0x83);
        assert_eq!(Mode::ReceiveContinuous.opmode(), 0x85);
        assert_eq!(Mode::ReceiveSingle.opmode(), 0x86);
    }

    #[test]
    fn test_from_opmode_rejects_fsk_and_transitional_modes() {
        assert_eq!(Mode::from_opmode(0x01), None); // FSK standby
        assert_eq!(Mode::from_opmode(0x82), None); // FSTX
        assert_eq!(Mode::from_opmode(0x87), None); // CAD
    }

    #[test]
    fn test_active_modes() {
        assert!(Mode::Transmit.is_active());
        assert!(Mode::ReceiveSingle.is_active());
        assert!(!Mode::Standby.is_active());
        assert!(!Mode::Sleep.is_active());
    }
}
