//! # SX127x SPI Register Protocol
//!
//! Every access is one SPI transaction. The first byte carries the register address in
//! bits 6-0 and the direction in bit 7 (1 = write). The chip auto-increments the address
//! for burst accesses, except on RegFifo where it advances RegFifoAddrPtr instead.
//!
//! ```text
//! read  : MOSI [addr & 0x7F][0x00]...[0x00]    MISO [ -- ][ d0 ]...[ dn ]
//! write : MOSI [addr | 0x80][ d0 ]...[ dn ]    MISO ignored
//! ```

use crate::radio::hal::{HalError, SpiBus};

const WRITE_BIT: u8 = 0x80;

/// Register-level access to the chip over a [`SpiBus`]
pub struct Registers<S> {
    bus: S,
}

impl<S: SpiBus> Registers<S> {
    pub fn new(bus: S) -> Self {
        Self { bus }
    }

    /// Give the bus back
    pub fn into_inner(self) -> S {
        self.bus
    }

    /// Read a single register
    pub fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let tx = [addr & !WRITE_BIT, 0x00];
        let mut rx = [0u8; 2];
        self.bus.transfer(&tx, &mut rx)?;
        log::trace!("read  0x{:02X} -> 0x{:02X}", addr, rx[1]);
        Ok(rx[1])
    }

    /// Read `count` consecutive bytes starting at `addr`
    pub fn read_register_burst(&mut self, addr: u8, count: usize) -> Result<Vec<u8>, HalError> {
        let mut tx = vec![0u8; 1 + count];
        tx[0] = addr & !WRITE_BIT;
        let mut rx = vec![0u8; tx.len()];
        self.bus.transfer(&tx, &mut rx)?;
        rx.remove(0);
        log::trace!("read  0x{:02X} burst of {} bytes", addr, count);
        Ok(rx)
    }

    /// Write one or more bytes starting at `addr`
    pub fn write_register(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError> {
        let mut tx = Vec::with_capacity(1 + data.len());
        tx.push(addr | WRITE_BIT);
        tx.extend_from_slice(data);
        let mut rx = vec![0u8; tx.len()];
        self.bus.transfer(&tx, &mut rx)?;
        log::trace!("write 0x{:02X} <- {}", addr, hex::encode_upper(data));
        Ok(())
    }

    /// Read-modify-write: keep the bits in `keep`, then OR in `bits`
    pub fn update_register(&mut self, addr: u8, keep: u8, bits: u8) -> Result<u8, HalError> {
        let current = self.read_register(addr)?;
        let new_value = (current & keep) | bits;
        self.write_register(addr, &[new_value])?;
        Ok(new_value)
    }
}
