//! Serial Port Service (SPS) UART engine.
//!
//! [`SpsUart`] owns one [`UartPort`] and moves bytes between it and caller
//! buffers from the interrupt handler ([`SpsUart::service_interrupt`]).
//! Requests return immediately; finished transfers are queued as
//! [`Completion`]s and handed to application code by
//! [`SpsUart::dispatch_completions`] or [`SpsUart::poll_completion`], outside
//! interrupt context.
//!
//! # Lanes
//!
//! There is one read lane and one write lane. They progress independently;
//! the write lane additionally consults the [`FlowGate`].
//!
//! # Example
//!
//! ```no_run
//! use sps_uart::hal::serial::LineConfig;
//! use sps_uart::peripheral::sim::SimPort;
//! use sps_uart::sps::SpsUart;
//!
//! let mut rx_buf = [0u8; 16];
//! let mut uart = SpsUart::new(SimPort::new());
//! uart.initialize(LineConfig::default())?;
//! uart.read(&mut rx_buf, 16).map_err(|r| r.error)?;
//! // ... interrupts call uart.service_interrupt() ...
//! uart.dispatch_completions(|done| {
//!     let _ = done.data();
//! });
//! # Ok::<(), sps_uart::hal::serial::UartError>(())
//! ```

pub mod codec;
mod dispatch;
pub mod flow;
pub mod transfer;

use heapless::Deque;

use crate::hal::serial::{BusyPolicy, Ier, LineConfig, LineSetup, UartError, UartPort};
use codec::{Codec, Decoder};
use flow::{FlowGate, FlowState};
use transfer::{COMPLETION_SLOTS, Completion, Direction, Rejected, Transfer, TransferStatus};

pub use dispatch::{MAX_SERVICE_ROUNDS, RX_BURST_LIMIT};

/// Running counters, for diagnostics.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct UartStats {
    /// Wire bytes received, control octets included.
    pub rx_bytes: u32,
    /// Wire bytes transmitted, control octets included.
    pub tx_bytes: u32,
    /// Data bytes that arrived with no room to store them.
    pub dropped: u32,
    /// Reads ended by an overflow.
    pub overflows: u32,
    pub line_errors: u32,
    pub signals_sent: u32,
    pub signals_received: u32,
}

impl UartStats {
    const fn new() -> Self {
        Self {
            rx_bytes: 0,
            tx_bytes: 0,
            dropped: 0,
            overflows: 0,
            line_errors: 0,
            signals_sent: 0,
            signals_received: 0,
        }
    }
}

/// Interrupt-driven UART with software flow control.
pub struct SpsUart<'a, P: UartPort> {
    port: P,
    setup: Option<LineSetup>,
    codec: Codec,
    decoder: Decoder,
    gate: FlowGate,
    rx: Option<Transfer<'a>>,
    tx: Option<Transfer<'a>>,
    /// Second octet of a stuffed pair that is half on the wire.
    tx_literal: Option<u8>,
    /// Receive FIFO found empty during the current service pass.
    rx_drained: bool,
    /// Shadow of the Interrupt Enable Register.
    ier: Ier,
    completions: Deque<Completion<'a>, COMPLETION_SLOTS>,
    stats: UartStats,
}

impl<'a, P: UartPort> SpsUart<'a, P> {
    /// Wrap a port. Nothing touches the hardware until [`initialize`](Self::initialize).
    pub const fn new(port: P) -> Self {
        let codec = Codec::transparent();
        Self {
            port,
            setup: None,
            codec,
            decoder: codec.decoder(),
            gate: FlowGate::new(false),
            rx: None,
            tx: None,
            tx_literal: None,
            rx_drained: false,
            ier: Ier::empty(),
            completions: Deque::new(),
            stats: UartStats::new(),
        }
    }

    /// Program the line and enable the receive (and, with error detection,
    /// line status) interrupt.
    ///
    /// Calling again with the same configuration does nothing. A different
    /// configuration is refused with [`UartError::Busy`] while a transfer is
    /// active or the literal of a stuffed pair is still to be sent, and
    /// resets the flow state otherwise.
    pub fn initialize(&mut self, config: LineConfig) -> Result<(), UartError> {
        let setup = LineSetup::resolve(&config)?;

        if self.setup == Some(setup) {
            return Ok(());
        }
        if self.rx.is_some() || self.tx.is_some() || self.tx_literal.is_some() {
            return Err(UartError::Busy);
        }

        self.port.configure(&setup);

        self.codec = Codec::new(setup.flow_control);
        self.decoder = self.codec.decoder();
        self.gate = FlowGate::new(self.codec.signalling());
        self.ier = setup.base_interrupts();
        self.port.set_interrupts(self.ier);
        self.setup = Some(setup);

        log::debug!(
            "sps: {} baud (divisor {}), lcr {:#04x}, flow {:?}, error detection {}",
            setup.baud.bps(),
            setup.divisor(),
            setup.format.bits(),
            setup.flow_control,
            setup.error_detection,
        );
        Ok(())
    }

    /// Start receiving `size` bytes into `buffer`.
    ///
    /// Completes OK once `size` data bytes are stored, ERROR if more data is
    /// already waiting at that point (overflow) or on a line fault.
    pub fn read(&mut self, buffer: &'a mut [u8], size: usize) -> Result<(), Rejected<'a>> {
        if let Err(error) = self.admit(Direction::Read, buffer.len(), size) {
            return Err(Rejected { error, buffer });
        }
        self.rx = Some(Transfer::new(buffer, size));
        Ok(())
    }

    /// Start transmitting the first `size` bytes of `buffer`.
    pub fn write(&mut self, buffer: &'a mut [u8], size: usize) -> Result<(), Rejected<'a>> {
        if let Err(error) = self.admit(Direction::Write, buffer.len(), size) {
            return Err(Rejected { error, buffer });
        }
        self.tx = Some(Transfer::new(buffer, size));
        self.update_tx_interrupt();
        Ok(())
    }

    /// Resume transmission: clear the local XOFF and schedule an XON.
    pub fn flow_on(&mut self) {
        self.gate.request_on();
        log::trace!("sps: flow on");
        self.update_tx_interrupt();
    }

    /// Suspend transmission and ask the peer to stop with an XOFF.
    ///
    /// Returns `false`, changing nothing, while the receiver holds an unread
    /// byte; the caller retries later.
    pub fn flow_off(&mut self) -> bool {
        if self.port.rx_pending() {
            log::trace!("sps: flow off deferred, receiver busy");
            return false;
        }
        self.gate.request_off();
        log::trace!("sps: flow off");
        self.update_tx_interrupt();
        true
    }

    /// End every active transfer with ERROR. No-op when idle.
    pub fn finish_transfers(&mut self) {
        self.complete(Direction::Read, TransferStatus::Error);
        self.complete(Direction::Write, TransferStatus::Error);
    }

    /// End every active transfer with TIMEOUT. Called by whoever owns the timer.
    pub fn timeout_transfers(&mut self) {
        self.complete(Direction::Read, TransferStatus::Timeout);
        self.complete(Direction::Write, TransferStatus::Timeout);
    }

    /// Take the oldest undelivered completion.
    pub fn poll_completion(&mut self) -> Option<Completion<'a>> {
        self.completions.pop_front()
    }

    /// Hand every undelivered completion to `f`, oldest first. Returns how
    /// many were delivered.
    pub fn dispatch_completions(&mut self, mut f: impl FnMut(Completion<'a>)) -> usize {
        let mut delivered = 0;
        while let Some(completion) = self.completions.pop_front() {
            f(completion);
            delivered += 1;
        }
        delivered
    }

    /// `(transferred, size)` of the active transfer on `direction`.
    pub fn progress(&self, direction: Direction) -> Option<(usize, usize)> {
        self.lane(direction).map(|t| (t.transferred(), t.size()))
    }

    pub fn is_active(&self, direction: Direction) -> bool {
        self.lane(direction).is_some()
    }

    pub fn flow_state(&self) -> FlowState {
        FlowState::from(&self.gate)
    }

    pub fn setup(&self) -> Option<&LineSetup> {
        self.setup.as_ref()
    }

    pub fn stats(&self) -> UartStats {
        self.stats
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    fn lane(&self, direction: Direction) -> Option<&Transfer<'a>> {
        match direction {
            Direction::Read => self.rx.as_ref(),
            Direction::Write => self.tx.as_ref(),
        }
    }

    fn active_count(&self) -> usize {
        usize::from(self.rx.is_some()) + usize::from(self.tx.is_some())
    }

    /// Check a new transfer against the preconditions and the busy policy.
    fn admit(&mut self, direction: Direction, len: usize, size: usize) -> Result<(), UartError> {
        let setup = self.setup.ok_or(UartError::NotInitialized)?;

        if size == 0 || size > len {
            return Err(UartError::InvalidSize);
        }

        let busy = self.is_active(direction);
        if busy && setup.busy_policy == BusyPolicy::Reject {
            log::warn!("sps: {:?} rejected, transfer already active", direction);
            return Err(UartError::Busy);
        }

        // A replaced transfer keeps its slot for its own completion.
        if self.completions.len() + self.active_count() >= COMPLETION_SLOTS {
            return Err(UartError::QueueFull);
        }

        if busy {
            log::debug!("sps: {:?} replaces the active transfer", direction);
            self.complete(direction, TransferStatus::Error);
        }
        Ok(())
    }

    /// Move the transfer on `direction` to its terminal state.
    ///
    /// A half-sent stuffed pair is still finished on the wire so the peer's
    /// decoder does not swallow the next octet.
    fn complete(&mut self, direction: Direction, status: TransferStatus) {
        let transfer = match direction {
            Direction::Read => self.rx.take(),
            Direction::Write => self.tx.take(),
        };
        let Some(transfer) = transfer else {
            return;
        };

        let completion = transfer.finish(direction, status);
        if status != TransferStatus::Ok {
            log::debug!(
                "sps: {:?} ended {:?} after {} bytes",
                direction,
                status,
                completion.transferred
            );
        }

        if self.completions.push_back(completion).is_err() {
            // Unreachable: every active transfer holds a reserved slot.
            log::error!("sps: completion queue overrun, {:?} lost", direction);
        }

        if direction == Direction::Write {
            self.update_tx_interrupt();
        }
    }

    /// Enable the transmit interrupt exactly when there is something to send.
    fn update_tx_interrupt(&mut self) {
        if self.setup.is_none() {
            return;
        }

        let data_ready = self.gate.permits_data() && self.tx.as_ref().is_some_and(|t| !t.is_complete());
        let wanted = self.tx_literal.is_some() || self.gate.has_pending() || data_ready;

        let ier = if wanted {
            self.ier | Ier::THR_EMPTY
        } else {
            self.ier - Ier::THR_EMPTY
        };
        if ier != self.ier {
            self.ier = ier;
            self.port.set_interrupts(ier);
        }
    }
}
