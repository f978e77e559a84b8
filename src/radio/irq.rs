//! # SX127x Interrupt Flags
//!
//! RegIrqFlags latches one bit per radio event. Bits stay set until the host writes the same
//! bits back, so the usual pattern after a DIO0 edge is read, act, write back.
//!
//! ```text
//! Bit 7: RxTimeout          Bit 3: TxDone
//! Bit 6: RxDone             Bit 2: CadDone
//! Bit 5: PayloadCrcError    Bit 1: FhssChangeChannel
//! Bit 4: ValidHeader        Bit 0: CadDetected
//! ```

use crate::radio::registers::*;
use bitflags::bitflags;

bitflags! {
    /// Snapshot of RegIrqFlags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IrqFlags: u8 {
        const CAD_DETECTED = IRQ_CAD_DETECTED_MASK;
        const FHSS_CHANGE_CHANNEL = IRQ_FHSS_CHANGE_CHANNEL_MASK;
        const CAD_DONE = IRQ_CAD_DONE_MASK;
        const TX_DONE = IRQ_TX_DONE_MASK;
        const VALID_HEADER = IRQ_VALID_HEADER_MASK;
        const PAYLOAD_CRC_ERROR = IRQ_PAYLOAD_CRC_ERROR_MASK;
        const RX_DONE = IRQ_RX_DONE_MASK;
        const RX_TIMEOUT = IRQ_RX_TIMEOUT_MASK;
    }
}

impl IrqFlags {
    pub fn tx_done(self) -> bool {
        self.contains(Self::TX_DONE)
    }

    pub fn rx_done(self) -> bool {
        self.contains(Self::RX_DONE)
    }

    pub fn crc_error(self) -> bool {
        self.contains(Self::PAYLOAD_CRC_ERROR)
    }
}

impl From<u8> for IrqFlags {
    fn from(raw: u8) -> Self {
        Self::from_bits_retain(raw)
    }
}

impl From<IrqFlags> for u8 {
    fn from(flags: IrqFlags) -> Self {
        flags.bits()
    }
}

/// Signal routed to DIO0 through RegDioMapping1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dio0Mapping {
    RxDone,
    TxDone,
}

impl Dio0Mapping {
    pub fn register_value(self) -> u8 {
        match self {
            Dio0Mapping::RxDone => DIO0_RX_DONE,
            Dio0Mapping::TxDone => DIO0_TX_DONE,
        }
    }
}
