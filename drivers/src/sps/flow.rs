//! Flow gate: decides whether the write lane may pull the next data byte.
//!
//! Two independent sources can close the gate: the local side
//! (`flow_off`/`flow_on`) and the peer (an inbound XOFF/XON). Local
//! transitions also schedule the matching control octet, which goes out ahead
//! of any further data.

use super::codec::FlowSignal;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlowGate {
    /// Schedule XON/XOFF octets on local transitions.
    signalling: bool,
    local: FlowSignal,
    remote: FlowSignal,
    pending: Option<FlowSignal>,
}

impl FlowGate {
    pub const fn new(signalling: bool) -> Self {
        Self {
            signalling,
            local: FlowSignal::None,
            remote: FlowSignal::None,
            pending: None,
        }
    }

    /// Neither side asserts XOFF.
    #[inline]
    pub fn permits_data(&self) -> bool {
        self.local != FlowSignal::Xoff && self.remote != FlowSignal::Xoff
    }

    /// Local resume. Replaces a not-yet-sent XOFF.
    pub fn request_on(&mut self) {
        self.local = FlowSignal::Xon;
        if self.signalling {
            self.pending = Some(FlowSignal::Xon);
        }
    }

    /// Local suspend. Replaces a not-yet-sent XON.
    pub fn request_off(&mut self) {
        self.local = FlowSignal::Xoff;
        if self.signalling {
            self.pending = Some(FlowSignal::Xoff);
        }
    }

    /// Record a signal received from the peer.
    pub fn observe(&mut self, signal: FlowSignal) {
        self.remote = signal;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the control octet that must precede further data.
    pub fn take_pending(&mut self) -> Option<u8> {
        self.pending.take().and_then(FlowSignal::wire_byte)
    }

    pub fn local(&self) -> FlowSignal {
        self.local
    }

    pub fn remote(&self) -> FlowSignal {
        self.remote
    }
}

/// Snapshot of both flow directions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlowState {
    /// Last local `flow_on`/`flow_off`.
    pub local: FlowSignal,
    /// Last XON/XOFF received from the peer.
    pub remote: FlowSignal,
    /// A control octet is waiting for the transmitter.
    pub signal_pending: bool,
}

impl From<&FlowGate> for FlowState {
    fn from(gate: &FlowGate) -> Self {
        Self {
            local: gate.local,
            remote: gate.remote,
            signal_pending: gate.has_pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sps::codec::{XOFF_BYTE, XON_BYTE};

    #[test]
    fn open_by_default() {
        let gate = FlowGate::new(true);
        assert!(gate.permits_data());
        assert!(!gate.has_pending());
        assert_eq!(gate.local(), FlowSignal::None);
    }

    #[test]
    fn local_off_schedules_xoff() {
        let mut gate = FlowGate::new(true);
        gate.request_off();
        assert!(!gate.permits_data());
        assert_eq!(gate.take_pending(), Some(XOFF_BYTE));
        assert_eq!(gate.take_pending(), None);
        assert!(!gate.permits_data());

        gate.request_on();
        assert!(gate.permits_data());
        assert_eq!(gate.take_pending(), Some(XON_BYTE));
    }

    #[test]
    fn latest_local_request_wins() {
        let mut gate = FlowGate::new(true);
        gate.request_off();
        gate.request_on();
        assert_eq!(gate.take_pending(), Some(XON_BYTE));
        assert!(!gate.has_pending());
    }

    #[test]
    fn remote_xoff_closes_gate() {
        let mut gate = FlowGate::new(true);
        gate.observe(FlowSignal::Xoff);
        assert!(!gate.permits_data());
        assert!(!gate.has_pending());

        // A local resume does not override the peer.
        gate.request_on();
        assert!(!gate.permits_data());

        gate.observe(FlowSignal::Xon);
        assert!(gate.permits_data());
    }

    #[test]
    fn silent_without_signalling() {
        let mut gate = FlowGate::new(false);
        gate.request_off();
        assert!(!gate.permits_data());
        assert!(!gate.has_pending());
    }

    #[test]
    fn state_snapshot() {
        let mut gate = FlowGate::new(true);
        gate.request_off();
        gate.observe(FlowSignal::Xon);
        let state = FlowState::from(&gate);
        assert_eq!(state.local, FlowSignal::Xoff);
        assert_eq!(state.remote, FlowSignal::Xon);
        assert!(state.signal_pending);
    }
}
