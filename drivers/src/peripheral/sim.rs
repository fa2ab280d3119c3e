//! Simulated 16550 port.
//!
//! Behaves like a UART whose transmitter is infinitely fast: every byte
//! written lands in a wire capture at once, so the holding register is always
//! empty until the capture fills up. Receive data and line faults are injected
//! by the test or simulation. Interrupt identification follows the 16550
//! priority order (line status, received data, transmit empty).

use heapless::{Deque, Vec};

use crate::hal::serial::{Ier, InterruptId, LineSetup, Lsr, UartPort};

/// Receive FIFO depth of the simulated port.
pub const SIM_RX_DEPTH: usize = 64;
/// Bytes the wire capture holds before the transmitter reports busy.
pub const SIM_WIRE_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct SimPort {
    rx: Deque<u8, SIM_RX_DEPTH>,
    faults: Lsr,
    wire: Vec<u8, SIM_WIRE_CAPACITY>,
    ier: Ier,
    setup: Option<LineSetup>,
    configured: u32,
}

impl SimPort {
    pub const fn new() -> Self {
        Self {
            rx: Deque::new(),
            faults: Lsr::empty(),
            wire: Vec::new(),
            ier: Ier::empty(),
            setup: None,
            configured: 0,
        }
    }

    /// Queue bytes as if they arrived on the line. Returns how many fit.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in bytes {
            if self.rx.push_back(byte).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Latch error bits, reported by the next Line Status read.
    pub fn inject_fault(&mut self, fault: Lsr) {
        self.faults |= fault & Lsr::ERRORS;
    }

    /// Everything written so far.
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn take_wire(&mut self) -> Vec<u8, SIM_WIRE_CAPACITY> {
        core::mem::take(&mut self.wire)
    }

    /// Move the wire capture into `peer`'s receive FIFO, as a null-modem
    /// cable would. Bytes that do not fit stay in the capture.
    pub fn deliver_to(&mut self, peer: &mut SimPort) -> usize {
        let wire = self.take_wire();
        let accepted = peer.feed(&wire);
        // Cannot overflow: the capture was just emptied.
        let _ = self.wire.extend_from_slice(&wire[accepted..]);
        accepted
    }

    /// Bytes waiting in the receive FIFO.
    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    /// Last value written to the Interrupt Enable Register.
    pub fn interrupts(&self) -> Ier {
        self.ier
    }

    /// Last programmed line setup.
    pub fn setup(&self) -> Option<&LineSetup> {
        self.setup.as_ref()
    }

    /// Number of times the line has been programmed.
    pub fn configure_count(&self) -> u32 {
        self.configured
    }

    fn thr_empty(&self) -> bool {
        !self.wire.is_full()
    }
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl UartPort for SimPort {
    fn configure(&mut self, setup: &LineSetup) {
        self.setup = Some(*setup);
        self.ier = Ier::empty();
        self.rx.clear();
        self.faults = Lsr::empty();
        self.configured += 1;
    }

    fn interrupt_id(&mut self) -> Option<InterruptId> {
        if self.ier.contains(Ier::LINE_STATUS) && !self.faults.is_empty() {
            Some(InterruptId::LineStatus)
        } else if self.ier.contains(Ier::DATA_AVAILABLE) && !self.rx.is_empty() {
            Some(InterruptId::ReceivedData)
        } else if self.ier.contains(Ier::THR_EMPTY) && self.thr_empty() {
            Some(InterruptId::TransmitEmpty)
        } else {
            None
        }
    }

    fn line_status(&mut self) -> Lsr {
        let mut lsr = core::mem::replace(&mut self.faults, Lsr::empty());
        if !self.rx.is_empty() {
            lsr |= Lsr::DATA_READY;
        }
        if self.thr_empty() {
            lsr |= Lsr::THR_EMPTY | Lsr::TRANSMITTER_EMPTY;
        }
        lsr
    }

    fn read_data(&mut self) -> u8 {
        self.rx.pop_front().unwrap_or(0)
    }

    fn write_data(&mut self, byte: u8) {
        if self.wire.push(byte).is_err() {
            log::warn!("sim: wire capture full, {:#04x} lost", byte);
        }
    }

    fn set_interrupts(&mut self, ier: Ier) {
        self.ier = ier;
    }

    fn rx_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_priority() {
        let mut port = SimPort::new();
        port.set_interrupts(Ier::all());
        assert_eq!(port.interrupt_id(), Some(InterruptId::TransmitEmpty));

        port.feed(&[1]);
        assert_eq!(port.interrupt_id(), Some(InterruptId::ReceivedData));

        port.inject_fault(Lsr::PARITY_ERROR);
        assert_eq!(port.interrupt_id(), Some(InterruptId::LineStatus));

        let lsr = port.line_status();
        assert!(lsr.contains(Lsr::PARITY_ERROR | Lsr::DATA_READY));
        assert!(!port.line_status().contains(Lsr::PARITY_ERROR));
    }

    #[test]
    fn masked_sources_stay_quiet() {
        let mut port = SimPort::new();
        port.feed(&[1, 2]);
        assert_eq!(port.interrupt_id(), None);
        assert!(port.rx_pending());
    }

    #[test]
    fn feed_respects_depth() {
        let mut port = SimPort::new();
        let bytes = [0u8; SIM_RX_DEPTH + 5];
        assert_eq!(port.feed(&bytes), SIM_RX_DEPTH);
        assert_eq!(port.rx_len(), SIM_RX_DEPTH);
    }

    #[test]
    fn deliver_moves_the_wire() {
        let mut a = SimPort::new();
        let mut b = SimPort::new();
        a.write_data(0x41);
        a.write_data(0x42);
        assert_eq!(a.deliver_to(&mut b), 2);
        assert!(a.wire().is_empty());
        assert_eq!(b.read_data(), 0x41);
        assert_eq!(b.read_data(), 0x42);
        assert!(!b.rx_pending());
    }
}
