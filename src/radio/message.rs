//! Received LoRa packets and signal quality decoding

use crate::radio::registers::*;
use serde::Serialize;

/// One packet received with a clean CRC
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub payload: Vec<u8>,
    /// Packet RSSI in dBm
    pub rssi: i16,
    /// Packet SNR in dB
    pub snr: f32,
}

impl Message {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as upper-case hex
    pub fn payload_hex(&self) -> String {
        hex::encode_upper(&self.payload)
    }
}

/// RSSI offset for the RF port the carrier frequency is routed through
pub fn rssi_offset(frequency_hz: u64) -> i16 {
    if frequency_hz < RF_MID_BAND_THRESHOLD_HZ {
        RSSI_OFFSET_LF_PORT
    } else {
        RSSI_OFFSET_HF_PORT
    }
}

/// Decode RegPktRssiValue (or RegRssiValue) to dBm
pub fn rssi_from_raw(raw: u8, frequency_hz: u64) -> i16 {
    i16::from(raw) - rssi_offset(frequency_hz)
}

/// Decode RegPktSnrValue (two's complement, quarter dB) to dB
pub fn snr_from_raw(raw: u8) -> f32 {
    f32::from(raw as i8) * 0.25
}
