//! Interrupt service routine.

use super::SpsUart;
use super::codec::Decoded;
use super::transfer::{Direction, TransferStatus};
use crate::hal::serial::{InterruptId, Lsr, UartPort};

/// Interrupt identifications serviced per call before returning.
pub const MAX_SERVICE_ROUNDS: usize = 8;

/// Receive FIFO depth; bytes drained per receive interrupt.
pub const RX_BURST_LIMIT: usize = 16;

impl<P: UartPort> SpsUart<'_, P> {
    /// Service the UART interrupt. Call from the interrupt vector.
    ///
    /// Handles up to [`MAX_SERVICE_ROUNDS`] pending sources in priority order;
    /// anything left keeps the line asserted and is picked up next time.
    pub fn service_interrupt(&mut self) {
        if self.setup.is_none() {
            return;
        }

        self.rx_drained = false;
        for _ in 0..MAX_SERVICE_ROUNDS {
            let Some(id) = self.port.interrupt_id() else {
                break;
            };
            match id {
                InterruptId::LineStatus => {
                    let lsr = self.port.line_status();
                    self.line_fault(lsr);
                }
                InterruptId::ReceivedData | InterruptId::CharacterTimeout => self.service_receive(),
                InterruptId::TransmitEmpty => self.service_transmit(),
                InterruptId::ModemStatus | InterruptId::BusyDetect => self.port.acknowledge(id),
            }
        }

        if self.rx_drained {
            self.settle_read();
        }
    }

    /// Drain up to [`RX_BURST_LIMIT`] bytes of the receive FIFO through the
    /// decoder. The extra pass only checks whether the FIFO ran dry.
    fn service_receive(&mut self) {
        for pass in 0..=RX_BURST_LIMIT {
            let lsr = self.port.line_status();
            if self.line_fault(lsr) {
                continue;
            }
            if !lsr.contains(Lsr::DATA_READY) {
                self.rx_drained = true;
                return;
            }
            if pass == RX_BURST_LIMIT {
                return;
            }

            let wire = self.port.read_data();
            self.receive(wire);
        }
    }

    fn receive(&mut self, wire: u8) {
        self.stats.rx_bytes = self.stats.rx_bytes.wrapping_add(1);

        match self.decoder.decode(wire) {
            Decoded::Escape => {}
            Decoded::Signal(signal) => {
                self.stats.signals_received = self.stats.signals_received.wrapping_add(1);
                log::trace!("sps: peer sent {:?}", signal);
                self.gate.observe(signal);
                self.update_tx_interrupt();
            }
            Decoded::Data(byte) => self.store(byte),
        }
    }

    fn store(&mut self, byte: u8) {
        let Some(rx) = self.rx.as_mut() else {
            self.stats.dropped = self.stats.dropped.wrapping_add(1);
            log::trace!("sps: dropped {:#04x}, no read pending", byte);
            return;
        };

        if !rx.push(byte) {
            self.stats.dropped = self.stats.dropped.wrapping_add(1);
            self.stats.overflows = self.stats.overflows.wrapping_add(1);
            log::warn!("sps: receive overflow after {} bytes", rx.size());
            self.complete(Direction::Read, TransferStatus::Error);
        }
    }

    /// A full read completes OK once the burst that filled it is over.
    fn settle_read(&mut self) {
        if self.rx.as_ref().is_some_and(|rx| rx.is_complete()) {
            self.complete(Direction::Read, TransferStatus::Ok);
        }
    }

    /// Act on the error bits of `lsr`. Returns `true` if a fault was handled,
    /// in which case the faulty character has been discarded.
    ///
    /// The fault ends the active read, or the active write when no read is
    /// pending.
    fn line_fault(&mut self, lsr: Lsr) -> bool {
        let detecting = self.setup.is_some_and(|s| s.error_detection);
        let errors = lsr & Lsr::ERRORS;
        if !detecting || errors.is_empty() {
            return false;
        }

        self.stats.line_errors = self.stats.line_errors.wrapping_add(1);
        log::warn!("sps: line error {:?}", errors);

        if lsr.contains(Lsr::DATA_READY) {
            let _ = self.port.read_data();
        }
        self.decoder.reset();

        let victim = if self.rx.is_some() {
            Direction::Read
        } else {
            Direction::Write
        };
        self.complete(victim, TransferStatus::Error);
        true
    }

    /// Put at most one octet on the wire.
    ///
    /// Order: the literal of a half-sent stuffed pair, then a pending flow
    /// octet, then the next data byte if the gate is open.
    fn service_transmit(&mut self) {
        if let Some(literal) = self.tx_literal.take() {
            self.send(literal);
        } else if let Some(signal) = self.gate.take_pending() {
            self.stats.signals_sent = self.stats.signals_sent.wrapping_add(1);
            self.send(signal);
        } else if self.gate.permits_data() {
            if let Some(byte) = self.tx.as_mut().and_then(|tx| tx.pull()) {
                let encoded = self.codec.encode(byte);
                self.tx_literal = encoded.literal();
                self.send(encoded.first());
            }
        }

        if self.tx_literal.is_none() && self.tx.as_ref().is_some_and(|tx| tx.is_complete()) {
            self.complete(Direction::Write, TransferStatus::Ok);
        }
        self.update_tx_interrupt();
    }

    fn send(&mut self, byte: u8) {
        self.port.write_data(byte);
        self.stats.tx_bytes = self.stats.tx_bytes.wrapping_add(1);
    }
}
