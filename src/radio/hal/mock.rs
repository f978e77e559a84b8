//! Simulated SX127x for testing
//!
//! [`MockChip`] keeps a register file and FIFO behind a shared lock and hands out SPI,
//! reset and DIO0 handles implementing the HAL traits. It understands the parts of the
//! register protocol the controller relies on:
//!
//! - address byte with the write bit, auto-increment, FIFO access through RegFifoAddrPtr
//! - write-one-to-clear IRQ flags
//! - TxDone raised when the opmode enters TX (unless disabled), then back to standby
//! - queued packets delivered into the FIFO while the host waits on DIO0 in an RX mode
//! - DIO0 edges latched only while the line is armed

use crate::radio::hal::{HalError, InterruptLine, ResetLine, SpiBus};
use crate::radio::registers::*;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// A packet waiting to be "received" by the simulated chip
#[derive(Debug, Clone)]
pub struct RxPacket {
    pub payload: Vec<u8>,
    /// Raw RegPktRssiValue
    pub rssi_raw: u8,
    /// Raw RegPktSnrValue, two's complement quarter dB
    pub snr_raw: i8,
    pub crc_error: bool,
}

impl RxPacket {
    pub fn new(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            rssi_raw: 100,
            snr_raw: 20,
            crc_error: false,
        }
    }

    pub fn with_signal(mut self, rssi_raw: u8, snr_raw: i8) -> Self {
        self.rssi_raw = rssi_raw;
        self.snr_raw = snr_raw;
        self
    }

    pub fn with_crc_error(mut self) -> Self {
        self.crc_error = true;
        self
    }
}

/// Internal chip state
#[derive(Debug)]
struct ChipState {
    registers: [u8; 0x80],
    power_on: [u8; 0x80],
    fifo: [u8; 256],
    /// Register writes in order: (address, payload)
    write_log: Vec<(u8, Vec<u8>)>,
    transfers: usize,
    fail_from_transfer: Option<usize>,
    tx_completes: bool,
    rx_queue: VecDeque<RxPacket>,
    spurious_edges: usize,
    armed: bool,
    pending_edges: usize,
    lost_edges: usize,
    waits: usize,
    cancel_on_wait: Option<(usize, oneshot::Sender<()>)>,
    reset_levels: Vec<(bool, Instant)>,
}

impl ChipState {
    fn new() -> Self {
        let mut registers = [0u8; 0x80];
        // Power-on values from the datasheet, LoRa page
        registers[REG_OP_MODE as usize] = MODE_LONG_RANGE | MODE_STANDBY;
        registers[REG_FRF_MSB as usize] = 0x6C;
        registers[REG_FRF_MID as usize] = 0x80;
        registers[REG_PA_CONFIG as usize] = 0x4F;
        registers[REG_LNA as usize] = 0x20;
        registers[REG_MODEM_CONFIG_1 as usize] = 0x72;
        registers[REG_MODEM_CONFIG_2 as usize] = 0x70;
        registers[REG_PREAMBLE_LSB as usize] = 0x08;
        registers[REG_PAYLOAD_LENGTH as usize] = 0x01;
        registers[REG_DETECTION_OPTIMIZE as usize] = 0xC3;
        registers[REG_DETECTION_THRESHOLD as usize] = 0x0A;
        registers[REG_SYNC_WORD as usize] = 0x12;
        registers[REG_INVERT_IQ as usize] = 0x27;
        registers[REG_INVERT_IQ2 as usize] = 0x1D;
        registers[REG_VERSION as usize] = SX127X_VERSION;

        Self {
            registers,
            power_on: registers,
            fifo: [0u8; 256],
            write_log: Vec::new(),
            transfers: 0,
            fail_from_transfer: None,
            tx_completes: true,
            rx_queue: VecDeque::new(),
            spurious_edges: 0,
            armed: false,
            pending_edges: 0,
            lost_edges: 0,
            waits: 0,
            cancel_on_wait: None,
            reset_levels: Vec::new(),
        }
    }

    fn mode(&self) -> u8 {
        self.registers[REG_OP_MODE as usize] & MODE_MASK
    }

    fn dio0_mapping(&self) -> u8 {
        self.registers[REG_DIO_MAPPING_1 as usize] & 0xC0
    }

    fn raise_dio0(&mut self) {
        if self.armed {
            self.pending_edges += 1;
        } else {
            self.lost_edges += 1;
        }
    }

    fn read(&mut self, addr: u8) -> u8 {
        if addr == REG_FIFO {
            let ptr = self.registers[REG_FIFO_ADDR_PTR as usize];
            self.registers[REG_FIFO_ADDR_PTR as usize] = ptr.wrapping_add(1);
            self.fifo[ptr as usize]
        } else {
            self.registers[(addr & 0x7F) as usize]
        }
    }

    fn write(&mut self, addr: u8, value: u8) {
        match addr {
            REG_FIFO => {
                let ptr = self.registers[REG_FIFO_ADDR_PTR as usize];
                self.fifo[ptr as usize] = value;
                self.registers[REG_FIFO_ADDR_PTR as usize] = ptr.wrapping_add(1);
            }
            REG_IRQ_FLAGS => {
                self.registers[REG_IRQ_FLAGS as usize] &= !value;
            }
            REG_VERSION | REG_RX_NB_BYTES | REG_FIFO_RX_CURRENT_ADDR | REG_PKT_RSSI_VALUE
            | REG_PKT_SNR_VALUE => {}
            REG_OP_MODE => {
                self.registers[REG_OP_MODE as usize] = value;
                if value & MODE_MASK == MODE_TX && self.tx_completes {
                    self.registers[REG_IRQ_FLAGS as usize] |= IRQ_TX_DONE_MASK;
                    self.registers[REG_OP_MODE as usize] = (value & !MODE_MASK) | MODE_STANDBY;
                    if self.dio0_mapping() == DIO0_TX_DONE {
                        self.raise_dio0();
                    }
                }
            }
            _ => {
                self.registers[(addr & 0x7F) as usize] = value;
            }
        }
    }

    fn in_rx_mode(&self) -> bool {
        matches!(self.mode(), MODE_RX_CONTINUOUS | MODE_RX_SINGLE)
    }

    /// Place the next queued packet in the FIFO and raise RxDone
    fn deliver_packet(&mut self) -> bool {
        let Some(packet) = self.rx_queue.pop_front() else {
            return false;
        };

        // Successive packets land after the previous one, like the chip's ring buffer
        let base = self.registers[REG_FIFO_RX_BASE_ADDR as usize];
        let start = if self.registers[REG_RX_NB_BYTES as usize] == 0 {
            base
        } else {
            self.registers[REG_FIFO_RX_CURRENT_ADDR as usize]
                .wrapping_add(self.registers[REG_RX_NB_BYTES as usize])
        };
        for (i, byte) in packet.payload.iter().enumerate() {
            self.fifo[start.wrapping_add(i as u8) as usize] = *byte;
        }

        self.registers[REG_FIFO_RX_CURRENT_ADDR as usize] = start;
        self.registers[REG_RX_NB_BYTES as usize] = packet.payload.len() as u8;
        self.registers[REG_PKT_RSSI_VALUE as usize] = packet.rssi_raw;
        self.registers[REG_PKT_SNR_VALUE as usize] = packet.snr_raw as u8;

        let mut flags = IRQ_RX_DONE_MASK | IRQ_VALID_HEADER_MASK;
        if packet.crc_error {
            flags |= IRQ_PAYLOAD_CRC_ERROR_MASK;
        }
        self.registers[REG_IRQ_FLAGS as usize] |= flags;

        if self.mode() == MODE_RX_SINGLE {
            self.registers[REG_OP_MODE as usize] =
                (self.registers[REG_OP_MODE as usize] & !MODE_MASK) | MODE_STANDBY;
        }
        if self.dio0_mapping() == DIO0_RX_DONE {
            self.raise_dio0();
        }
        true
    }
}

/// Handle to a simulated chip; clones share the same state
#[derive(Clone)]
pub struct MockChip {
    state: Arc<(Mutex<ChipState>, Condvar)>,
}

impl Default for MockChip {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChip {
    pub fn new() -> Self {
        Self {
            state: Arc::new((Mutex::new(ChipState::new()), Condvar::new())),
        }
    }

    /// Report a different silicon revision
    pub fn with_version(self, version: u8) -> Self {
        {
            let mut state = self.lock();
            state.registers[REG_VERSION as usize] = version;
            state.power_on[REG_VERSION as usize] = version;
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, ChipState> {
        self.state.0.lock().unwrap()
    }

    pub fn spi(&self) -> MockSpiBus {
        MockSpiBus { chip: self.clone() }
    }

    pub fn reset_line(&self) -> MockResetLine {
        MockResetLine { chip: self.clone() }
    }

    pub fn interrupt_line(&self) -> MockInterruptLine {
        MockInterruptLine { chip: self.clone() }
    }

    pub fn register(&self, addr: u8) -> u8 {
        self.lock().registers[addr as usize]
    }

    pub fn set_register(&self, addr: u8, value: u8) {
        self.lock().registers[addr as usize] = value;
    }

    /// Current mode field of RegOpMode
    pub fn mode(&self) -> u8 {
        self.lock().mode()
    }

    pub fn fifo(&self, start: u8, len: usize) -> Vec<u8> {
        let state = self.lock();
        (0..len)
            .map(|i| state.fifo[start.wrapping_add(i as u8) as usize])
            .collect()
    }

    /// All register writes since creation (or the last `clear_write_log`)
    pub fn write_log(&self) -> Vec<(u8, Vec<u8>)> {
        self.lock().write_log.clone()
    }

    /// Payloads written to one register, oldest first
    pub fn writes_to(&self, addr: u8) -> Vec<Vec<u8>> {
        self.lock()
            .write_log
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn clear_write_log(&self) {
        self.lock().write_log.clear();
    }

    pub fn transfer_count(&self) -> usize {
        self.lock().transfers
    }

    /// Make every transfer from the `n`th (0-based, counted from now) onwards fail
    pub fn fail_after(&self, n: usize) {
        let mut state = self.lock();
        state.fail_from_transfer = Some(state.transfers + n);
    }

    /// Keep TX running forever, DIO0 never rises
    pub fn disable_tx_done(&self) {
        self.lock().tx_completes = false;
    }

    pub fn queue_packet(&self, packet: RxPacket) {
        self.lock().rx_queue.push_back(packet);
    }

    /// Raise DIO0 `count` times without setting any IRQ flag
    pub fn queue_spurious_edges(&self, count: usize) {
        self.lock().spurious_edges += count;
    }

    /// Fire `cancel` while the host performs its `wait_index`th (0-based) DIO0 wait
    pub fn cancel_on_wait(&self, wait_index: usize, cancel: oneshot::Sender<()>) {
        self.lock().cancel_on_wait = Some((wait_index, cancel));
    }

    /// Edges raised while DIO0 was not armed
    pub fn lost_edges(&self) -> usize {
        self.lock().lost_edges
    }

    /// Levels driven on NRESET with their timestamps
    pub fn reset_levels(&self) -> Vec<(bool, Instant)> {
        self.lock().reset_levels.clone()
    }
}

/// SPI side of a [`MockChip`]
pub struct MockSpiBus {
    chip: MockChip,
}

impl SpiBus for MockSpiBus {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), HalError> {
        assert_eq!(tx.len(), rx.len(), "SPI buffers must have equal length");

        let (lock, cvar) = &*self.chip.state;
        let mut state = lock.lock().unwrap();

        let index = state.transfers;
        state.transfers += 1;
        if state.fail_from_transfer.is_some_and(|from| index >= from) {
            return Err(HalError::Spi("simulated transfer failure".to_string()));
        }

        let Some((&header, data)) = tx.split_first() else {
            return Ok(());
        };
        let addr = header & 0x7F;
        rx[0] = 0;

        if header & 0x80 != 0 {
            state.write_log.push((addr, data.to_vec()));
            for (i, byte) in data.iter().enumerate() {
                let target = if addr == REG_FIFO {
                    addr
                } else {
                    addr.wrapping_add(i as u8) & 0x7F
                };
                state.write(target, *byte);
            }
            cvar.notify_all();
        } else {
            for i in 0..data.len() {
                let target = if addr == REG_FIFO {
                    addr
                } else {
                    addr.wrapping_add(i as u8) & 0x7F
                };
                rx[i + 1] = state.read(target);
            }
        }
        Ok(())
    }
}

/// NRESET side of a [`MockChip`]
pub struct MockResetLine {
    chip: MockChip,
}

impl MockResetLine {
    fn drive(&mut self, level: bool) {
        let mut state = self.chip.lock();
        let was_low = state.reset_levels.last().is_some_and(|(l, _)| !*l);
        state.reset_levels.push((level, Instant::now()));
        if level && was_low {
            state.registers = state.power_on;
        }
    }
}

impl ResetLine for MockResetLine {
    fn set_high(&mut self) -> Result<(), HalError> {
        self.drive(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), HalError> {
        self.drive(false);
        Ok(())
    }
}

/// DIO0 side of a [`MockChip`]
pub struct MockInterruptLine {
    chip: MockChip,
}

impl InterruptLine for MockInterruptLine {
    fn arm(&mut self) -> Result<(), HalError> {
        let mut state = self.chip.lock();
        state.armed = true;
        state.pending_edges = 0;
        Ok(())
    }

    fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool, HalError> {
        let (lock, cvar) = &*self.chip.state;
        let mut state = lock.lock().unwrap();

        if !state.armed {
            return Err(HalError::Gpio("DIO0 waited on before being armed".to_string()));
        }

        let wait_index = state.waits;
        state.waits += 1;
        if state
            .cancel_on_wait
            .as_ref()
            .is_some_and(|(index, _)| *index == wait_index)
        {
            if let Some((_, cancel)) = state.cancel_on_wait.take() {
                let _ = cancel.send(());
            }
        }

        let deadline = Instant::now() + timeout;
        loop {
            if state.pending_edges > 0 {
                state.pending_edges -= 1;
                return Ok(true);
            }
            if state.spurious_edges > 0 {
                state.spurious_edges -= 1;
                return Ok(true);
            }
            let rx_idle = state.registers[REG_IRQ_FLAGS as usize] & IRQ_RX_DONE_MASK == 0;
            if state.in_rx_mode() && rx_idle && state.deliver_packet() {
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            state = cvar.wait_timeout(state, deadline - now).unwrap().0;
        }
    }
}
