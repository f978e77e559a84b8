//! Unit tests for the `LoRaError` enum and its associated `Display` trait implementation.

use sx127x_lora::radio::HalError;
use sx127x_lora::LoRaError;

/// Tests that HAL errors convert into the `Bus` variant.
#[test]
fn test_bus_error_from_hal() {
    let err: LoRaError = HalError::Spi("timeout".to_string()).into();
    assert!(matches!(err, LoRaError::Bus(HalError::Spi(_))));
    assert_eq!(
        err.to_string(),
        "Bus error: SPI communication error: timeout"
    );
}

/// Tests that the `VersionMismatch` variant is correctly formatted.
#[test]
fn test_version_mismatch_error() {
    let err = LoRaError::VersionMismatch {
        expected: 0x12,
        found: 0x22,
    };
    assert_eq!(
        err.to_string(),
        "Version mismatch: expected 0x12, found 0x22"
    );
}

/// Tests that the `PayloadTooLarge` variant is correctly formatted.
#[test]
fn test_payload_too_large_error() {
    let err = LoRaError::PayloadTooLarge(300);
    assert_eq!(err.to_string(), "Payload too large: 300 bytes (max 255)");
}

/// Tests which errors are attributed to the radio link.
#[test]
fn test_link_errors() {
    assert!(LoRaError::TransmitTimeout.is_link_error());
    assert!(LoRaError::ReceiveTimeout.is_link_error());
    assert!(LoRaError::ReceiveNotDone.is_link_error());
    assert!(LoRaError::CrcMismatch.is_link_error());
    assert!(!LoRaError::Bus(HalError::Gpio("x".to_string())).is_link_error());
    assert!(!LoRaError::Config("x".to_string()).is_link_error());
    assert!(!LoRaError::VersionMismatch {
        expected: 0x12,
        found: 0
    }
    .is_link_error());
}
