//! XON/XOFF signalling and byte stuffing.
//!
//! With stuffing enabled, a data byte equal to one of the three reserved
//! octets goes on the wire as `STUFFING_BYTE, byte`. The receiving side treats
//! the byte after a stuffing byte as literal data, and an XON/XOFF that was
//! not escaped as a flow signal.

use crate::hal::serial::FlowControl;

/// Marks the next wire byte as literal data.
pub const STUFFING_BYTE: u8 = 0x39;
/// Resume transmission.
pub const XON_BYTE: u8 = 0x11;
/// Suspend transmission.
pub const XOFF_BYTE: u8 = 0x13;

/// Flow-control state, as stored and as signalled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FlowSignal {
    /// No signal seen or sent yet.
    #[default]
    None = 0x00,
    Xon = 0x01,
    Xoff = 0x02,
}

impl FlowSignal {
    /// The octet that carries this signal on the wire.
    pub const fn wire_byte(self) -> Option<u8> {
        match self {
            Self::None => None,
            Self::Xon => Some(XON_BYTE),
            Self::Xoff => Some(XOFF_BYTE),
        }
    }

    pub const fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            XON_BYTE => Some(Self::Xon),
            XOFF_BYTE => Some(Self::Xoff),
            _ => None,
        }
    }
}

/// Returns `true` for octets that must be escaped when stuffing is on.
#[inline]
pub const fn is_reserved(byte: u8) -> bool {
    matches!(byte, STUFFING_BYTE | XON_BYTE | XOFF_BYTE)
}

/// Wire form of one data byte: one octet, or a stuffing byte and the literal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Encoded {
    bytes: [u8; 2],
    len: u8,
}

impl Encoded {
    const fn plain(byte: u8) -> Self {
        Self { bytes: [byte, 0], len: 1 }
    }

    const fn stuffed(byte: u8) -> Self {
        Self {
            bytes: [STUFFING_BYTE, byte],
            len: 2,
        }
    }

    /// Octet to put on the wire now.
    pub const fn first(&self) -> u8 {
        self.bytes[0]
    }

    /// Octet that must directly follow [`first`](Self::first), if stuffed.
    pub const fn literal(&self) -> Option<u8> {
        if self.len == 2 { Some(self.bytes[1]) } else { None }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Escape `byte` if it collides with a reserved octet.
#[inline]
pub const fn encode(byte: u8) -> Encoded {
    if is_reserved(byte) {
        Encoded::stuffed(byte)
    } else {
        Encoded::plain(byte)
    }
}

/// Classification of one inbound wire byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A payload byte for the read buffer.
    Data(u8),
    /// An unescaped XON or XOFF.
    Signal(FlowSignal),
    /// A stuffing byte; the next byte is literal.
    Escape,
}

/// Line codec for one flow-control mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Codec {
    signalling: bool,
    stuffing: bool,
}

impl Codec {
    pub const fn new(flow_control: FlowControl) -> Self {
        match flow_control {
            FlowControl::None => Self {
                signalling: false,
                stuffing: false,
            },
            FlowControl::Software { stuffing } => Self {
                signalling: true,
                stuffing,
            },
        }
    }

    /// Codec that passes every byte through unchanged.
    pub const fn transparent() -> Self {
        Self::new(FlowControl::None)
    }

    pub const fn signalling(&self) -> bool {
        self.signalling
    }

    pub const fn stuffing(&self) -> bool {
        self.stuffing
    }

    #[inline]
    pub const fn encode(&self, byte: u8) -> Encoded {
        if self.stuffing {
            encode(byte)
        } else {
            Encoded::plain(byte)
        }
    }

    pub const fn decoder(&self) -> Decoder {
        Decoder {
            codec: *self,
            escaped: false,
        }
    }
}

/// Inbound side of a [`Codec`]. Carries the "previous byte was a stuffing
/// byte" bit between calls.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Decoder {
    codec: Codec,
    escaped: bool,
}

impl Decoder {
    pub fn decode(&mut self, wire: u8) -> Decoded {
        if self.escaped {
            self.escaped = false;
            return Decoded::Data(wire);
        }

        if self.codec.stuffing && wire == STUFFING_BYTE {
            self.escaped = true;
            return Decoded::Escape;
        }

        if self.codec.signalling {
            if let Some(signal) = FlowSignal::from_wire(wire) {
                return Decoded::Signal(signal);
            }
        }

        Decoded::Data(wire)
    }

    /// Returns `true` between a stuffing byte and its literal.
    pub const fn is_escaped(&self) -> bool {
        self.escaped
    }

    /// Forget a dangling stuffing byte, e.g. after a line fault.
    pub fn reset(&mut self) {
        self.escaped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUFFED: Codec = Codec::new(FlowControl::Software { stuffing: true });

    fn encode_all(codec: &Codec, data: &[u8]) -> Vec<u8> {
        data.iter().flat_map(|&b| codec.encode(b).as_slice().to_vec()).collect()
    }

    fn decode_all(codec: &Codec, wire: &[u8]) -> (Vec<u8>, Vec<FlowSignal>) {
        let mut decoder = codec.decoder();
        let mut data = Vec::new();
        let mut signals = Vec::new();
        for &b in wire {
            match decoder.decode(b) {
                Decoded::Data(d) => data.push(d),
                Decoded::Signal(s) => signals.push(s),
                Decoded::Escape => {}
            }
        }
        (data, signals)
    }

    /// Fixed-seed xorshift so failures reproduce.
    fn xorshift(state: &mut u32) -> u32 {
        *state ^= *state << 13;
        *state ^= *state >> 17;
        *state ^= *state << 5;
        *state
    }

    #[test]
    fn reserved_bytes_are_escaped() {
        assert_eq!(encode(0x39).as_slice(), &[0x39, 0x39]);
        assert_eq!(encode(0x11).as_slice(), &[0x39, 0x11]);
        assert_eq!(encode(0x13).as_slice(), &[0x39, 0x13]);
        assert_eq!(encode(0x41).as_slice(), &[0x41]);
        assert_eq!(encode(0x13).first(), STUFFING_BYTE);
        assert_eq!(encode(0x13).literal(), Some(0x13));
        assert_eq!(encode(0x00).literal(), None);
    }

    #[test]
    fn wire_scenario() {
        let data = [0x41, 0x39, 0x11, 0x13, 0x42];
        let wire = encode_all(&STUFFED, &data);
        assert_eq!(wire, vec![0x41, 0x39, 0x39, 0x39, 0x11, 0x39, 0x13, 0x42]);

        let (decoded, signals) = decode_all(&STUFFED, &wire);
        assert_eq!(decoded, data);
        assert!(signals.is_empty());
    }

    #[test]
    fn round_trip_every_byte() {
        let data: Vec<u8> = (0..=255).collect();
        let (decoded, signals) = decode_all(&STUFFED, &encode_all(&STUFFED, &data));
        assert_eq!(decoded, data);
        assert!(signals.is_empty());
    }

    #[test]
    fn round_trip_every_pair() {
        // Covers every reserved byte in every position of a two-byte window.
        for a in 0..=255u8 {
            for b in [0x00, 0x11, 0x13, 0x39, 0x7F, 0xFF] {
                let data = [a, b, a];
                let (decoded, _) = decode_all(&STUFFED, &encode_all(&STUFFED, &data));
                assert_eq!(decoded, data);
            }
        }
    }

    #[test]
    fn round_trip_random_sequences() {
        let mut seed = 0x2545_F491;
        for _ in 0..500 {
            let len = (xorshift(&mut seed) % 64) as usize;
            // Bias towards reserved octets so runs of them show up.
            let data: Vec<u8> = (0..len)
                .map(|_| match xorshift(&mut seed) % 4 {
                    0 => 0x39,
                    1 => [0x11, 0x13][(xorshift(&mut seed) % 2) as usize],
                    _ => xorshift(&mut seed) as u8,
                })
                .collect();
            let (decoded, signals) = decode_all(&STUFFED, &encode_all(&STUFFED, &data));
            assert_eq!(decoded, data);
            assert!(signals.is_empty());
        }
    }

    #[test]
    fn unescaped_control_bytes_are_signals() {
        let (data, signals) = decode_all(&STUFFED, &[0x13, 0x41, 0x11]);
        assert_eq!(data, vec![0x41]);
        assert_eq!(signals, vec![FlowSignal::Xoff, FlowSignal::Xon]);
    }

    #[test]
    fn escape_state_tracks_pairs() {
        let mut decoder = STUFFED.decoder();
        assert_eq!(decoder.decode(STUFFING_BYTE), Decoded::Escape);
        assert!(decoder.is_escaped());
        assert_eq!(decoder.decode(XOFF_BYTE), Decoded::Data(XOFF_BYTE));
        assert!(!decoder.is_escaped());

        decoder.decode(STUFFING_BYTE);
        decoder.reset();
        assert_eq!(decoder.decode(XON_BYTE), Decoded::Signal(FlowSignal::Xon));
    }

    #[test]
    fn transparent_mode_passes_everything() {
        let codec = Codec::transparent();
        let data: Vec<u8> = (0..=255).collect();
        let wire = encode_all(&codec, &data);
        assert_eq!(wire, data);
        let (decoded, signals) = decode_all(&codec, &wire);
        assert_eq!(decoded, data);
        assert!(signals.is_empty());
    }

    #[test]
    fn signalling_without_stuffing() {
        let codec = Codec::new(FlowControl::Software { stuffing: false });
        assert_eq!(codec.encode(0x39).as_slice(), &[0x39]);
        let (data, signals) = decode_all(&codec, &[0x39, 0x13, 0x39]);
        assert_eq!(data, vec![0x39, 0x39]);
        assert_eq!(signals, vec![FlowSignal::Xoff]);
    }

    #[test]
    fn signal_encoding() {
        assert_eq!(FlowSignal::None as u8, 0x00);
        assert_eq!(FlowSignal::Xon as u8, 0x01);
        assert_eq!(FlowSignal::Xoff as u8, 0x02);
        assert_eq!(FlowSignal::Xon.wire_byte(), Some(XON_BYTE));
        assert_eq!(FlowSignal::None.wire_byte(), None);
        assert_eq!(FlowSignal::from_wire(0x13), Some(FlowSignal::Xoff));
        assert_eq!(FlowSignal::from_wire(0x39), None);
    }
}
