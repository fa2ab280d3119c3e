//! Serial line configuration and the UART port abstraction.
//!
//! [`LineConfig`] is what callers hand to the driver; [`LineSetup`] is the
//! validated form with the divisor resolved and the line control byte built.
//! [`UartPort`] is the register-level seam the SPS engine drives from its
//! interrupt handler.

use bitflags::bitflags;
use core::fmt;

/// Serial clock feeding the baud generator.
pub const SERIAL_CLOCK_HZ: u32 = 16_000_000;

// ============================================================================
// Register flags
// ============================================================================

bitflags! {
    /// Interrupt Enable Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ier: u8 {
        /// Received data available (and character timeout).
        const DATA_AVAILABLE    = 1 << 0;
        /// Transmitter holding register empty.
        const THR_EMPTY         = 1 << 1;
        /// Receiver line status.
        const LINE_STATUS       = 1 << 2;
        /// Modem status.
        const MODEM_STATUS      = 1 << 3;
    }
}

bitflags! {
    /// Line Status Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u8 {
        /// Data ready (received data available).
        const DATA_READY        = 1 << 0;
        /// Overrun error.
        const OVERRUN_ERROR     = 1 << 1;
        /// Parity error.
        const PARITY_ERROR      = 1 << 2;
        /// Framing error.
        const FRAMING_ERROR     = 1 << 3;
        /// Break indicator.
        const BREAK_INDICATOR   = 1 << 4;
        /// Transmit Holding Register empty.
        const THR_EMPTY         = 1 << 5;
        /// Transmitter empty (both THR and shift register).
        const TRANSMITTER_EMPTY = 1 << 6;
        /// Error in received FIFO.
        const FIFO_ERROR        = 1 << 7;

        /// Every receive fault the line can report.
        const ERRORS = Self::OVERRUN_ERROR.bits()
            | Self::PARITY_ERROR.bits()
            | Self::FRAMING_ERROR.bits()
            | Self::BREAK_INDICATOR.bits();
    }
}

bitflags! {
    /// Line Control Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u8 {
        /// Word length bit 0.
        const WORD_LEN_0        = 1 << 0;
        /// Word length bit 1.
        const WORD_LEN_1        = 1 << 1;
        /// Extra stop bit (1.5 stop bits with 5-bit characters).
        const STOP_BIT          = 1 << 2;
        /// Parity enable.
        const PARITY_ENABLE     = 1 << 3;
        /// Even parity select.
        const EVEN_PARITY       = 1 << 4;
        /// Stick parity.
        const STICK_PARITY      = 1 << 5;
        /// Set break.
        const BREAK             = 1 << 6;
        /// Divisor Latch Access Bit.
        const DLAB              = 1 << 7;
    }
}

bitflags! {
    /// FIFO Control Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fcr: u8 {
        /// Enable FIFOs.
        const ENABLE            = 1 << 0;
        /// Clear receive FIFO.
        const CLEAR_RX          = 1 << 1;
        /// Clear transmit FIFO.
        const CLEAR_TX          = 1 << 2;
        /// Receive trigger level: 1 byte.
        const TRIGGER_1         = 0b00 << 6;
    }
}

/// Interrupt source reported by the Interrupt Identification Register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InterruptId {
    /// Receiver line status (overrun, parity, framing, break).
    LineStatus,
    /// Received data reached the trigger level.
    ReceivedData,
    /// Data sits in the receive FIFO and the line went quiet.
    CharacterTimeout,
    /// Transmitter holding register empty.
    TransmitEmpty,
    /// Modem status change.
    ModemStatus,
    /// LCR written while the UART was busy (DesignWare variants).
    BusyDetect,
}

impl InterruptId {
    /// Decode an IIR value. Returns `None` when no interrupt is pending.
    pub const fn from_iir(iir: u8) -> Option<Self> {
        match iir & 0x0F {
            0b0110 => Some(Self::LineStatus),
            0b0100 => Some(Self::ReceivedData),
            0b1100 => Some(Self::CharacterTimeout),
            0b0010 => Some(Self::TransmitEmpty),
            0b0000 => Some(Self::ModemStatus),
            0b0111 => Some(Self::BusyDetect),
            _ => None,
        }
    }
}

// ============================================================================
// Line configuration
// ============================================================================

/// Supported baud rates.
///
/// The discriminant is the divisor for [`SERIAL_CLOCK_HZ`]:
/// `divisor = serial_clock / (16 * baud_rate)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum BaudRate {
    /// 921600 baud (divisor = 1).
    Baud921600 = 1,
    /// 460800 baud (divisor = 2).
    Baud460800 = 2,
    /// 115200 baud (divisor = 9).
    Baud115200 = 9,
    /// 57600 baud (divisor = 17).
    Baud57600 = 17,
    /// 9600 baud (divisor = 104).
    Baud9600 = 104,
}

impl BaudRate {
    /// Look up a rate in bits per second.
    pub const fn from_bps(bps: u32) -> Option<Self> {
        match bps {
            921_600 => Some(Self::Baud921600),
            460_800 => Some(Self::Baud460800),
            115_200 => Some(Self::Baud115200),
            57_600 => Some(Self::Baud57600),
            9_600 => Some(Self::Baud9600),
            _ => None,
        }
    }

    pub const fn bps(self) -> u32 {
        match self {
            Self::Baud921600 => 921_600,
            Self::Baud460800 => 460_800,
            Self::Baud115200 => 115_200,
            Self::Baud57600 => 57_600,
            Self::Baud9600 => 9_600,
        }
    }

    /// Returns the divisor latch value for this baud rate.
    #[inline]
    pub const fn divisor(self) -> u16 {
        self as u16
    }

    /// Duration of one character on the line, in timer ticks.
    ///
    /// Higher layers arm their receive timeout with a multiple of this.
    pub const fn char_duration(self) -> u32 {
        match self {
            Self::Baud921600 => 11,
            _ => self.divisor() as u32 * 22,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    const fn lcr(self) -> Lcr {
        match self {
            Self::Five => Lcr::empty(),
            Self::Six => Lcr::WORD_LEN_0,
            Self::Seven => Lcr::WORD_LEN_1,
            Self::Eight => Lcr::WORD_LEN_0.union(Lcr::WORD_LEN_1),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit.
    One,
    /// Two stop bits; 1.5 when the character is 5 bits wide.
    Two,
}

/// Parity mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
    /// Parity bit always 0.
    Space,
    /// Parity bit always 1.
    Mark,
}

impl Parity {
    const fn lcr(self) -> Lcr {
        match self {
            Self::None => Lcr::empty(),
            Self::Odd => Lcr::PARITY_ENABLE,
            Self::Even => Lcr::PARITY_ENABLE.union(Lcr::EVEN_PARITY),
            Self::Mark => Lcr::PARITY_ENABLE.union(Lcr::STICK_PARITY),
            Self::Space => Lcr::PARITY_ENABLE
                .union(Lcr::EVEN_PARITY)
                .union(Lcr::STICK_PARITY),
        }
    }
}

/// Flow control carried on the line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlowControl {
    /// Every wire byte is data.
    None,
    /// In-band XON/XOFF. With `stuffing`, data bytes that collide with the
    /// control octets are escaped so any payload survives the line.
    Software { stuffing: bool },
}

/// What `read`/`write` do when their direction already has a transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BusyPolicy {
    /// Refuse the new transfer and hand its buffer back.
    Reject,
    /// Complete the active transfer with ERROR, then start the new one.
    Replace,
}

/// Serial line configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineConfig {
    /// Baud rate in bits per second; must be one of the [`BaudRate`] rates.
    pub baud_rate: u32,
    /// Number of data bits per character.
    pub data_bits: DataBits,
    /// Number of stop bits.
    pub stop_bits: StopBits,
    /// Parity mode.
    pub parity: Parity,
    /// Report framing/parity/overrun/break faults as transfer errors.
    pub error_detection: bool,
    /// Flow control mode.
    pub flow_control: FlowControl,
    /// Policy for a transfer requested on a busy direction.
    pub busy_policy: BusyPolicy,
}

impl LineConfig {
    /// 8 data bits, no parity, 1 stop bit, XON/XOFF with byte stuffing.
    pub const fn new_8n1(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            error_detection: true,
            flow_control: FlowControl::Software { stuffing: true },
            busy_policy: BusyPolicy::Reject,
        }
    }

    pub const fn with_format(mut self, data_bits: DataBits, parity: Parity, stop_bits: StopBits) -> Self {
        self.data_bits = data_bits;
        self.parity = parity;
        self.stop_bits = stop_bits;
        self
    }

    pub const fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub const fn with_error_detection(mut self, enabled: bool) -> Self {
        self.error_detection = enabled;
        self
    }

    pub const fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }
}

impl Default for LineConfig {
    /// 115200 baud, 8N1, error detection on, XON/XOFF with stuffing.
    fn default() -> Self {
        Self::new_8n1(115_200)
    }
}

/// Validated line configuration, ready to be programmed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineSetup {
    pub baud: BaudRate,
    /// Character format for the Line Control Register (DLAB clear).
    pub format: Lcr,
    pub error_detection: bool,
    pub flow_control: FlowControl,
    pub busy_policy: BusyPolicy,
}

impl LineSetup {
    /// Resolve the divisor and build the line control byte.
    pub fn resolve(config: &LineConfig) -> Result<Self, UartError> {
        let baud = BaudRate::from_bps(config.baud_rate).ok_or(UartError::UnsupportedBaudRate)?;

        let mut format = config.data_bits.lcr() | config.parity.lcr();
        if config.stop_bits == StopBits::Two {
            format |= Lcr::STOP_BIT;
        }

        Ok(Self {
            baud,
            format,
            error_detection: config.error_detection,
            flow_control: config.flow_control,
            busy_policy: config.busy_policy,
        })
    }

    pub const fn divisor(&self) -> u16 {
        self.baud.divisor()
    }

    pub const fn char_duration(&self) -> u32 {
        self.baud.char_duration()
    }

    /// Interrupts the engine keeps enabled while idle.
    pub fn base_interrupts(&self) -> Ier {
        if self.error_detection {
            Ier::DATA_AVAILABLE | Ier::LINE_STATUS
        } else {
            Ier::DATA_AVAILABLE
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors reported synchronously by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UartError {
    /// Baud rate has no divisor in the supported table.
    UnsupportedBaudRate,
    /// `initialize` has not been called yet.
    NotInitialized,
    /// Size is zero or larger than the buffer.
    InvalidSize,
    /// A transfer is already active on that direction (or, for
    /// `initialize`, on any direction or still finishing on the wire).
    Busy,
    /// Undelivered completions fill the completion queue.
    QueueFull,
}

impl fmt::Display for UartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnsupportedBaudRate => "baud rate not in the divisor table",
            Self::NotInitialized => "UART not initialized",
            Self::InvalidSize => "transfer size is zero or exceeds the buffer",
            Self::Busy => "transfer already active",
            Self::QueueFull => "completion queue full",
        })
    }
}

// ============================================================================
// Port trait
// ============================================================================

/// Register-level access to a 16550-style UART.
///
/// Methods that read registers with side effects (IIR, LSR, RBR) take
/// `&mut self`.
pub trait UartPort {
    /// Program divisor and character format, enable and clear the FIFOs.
    /// Leaves all interrupts disabled.
    fn configure(&mut self, setup: &LineSetup);

    /// Highest-priority pending interrupt, if any.
    fn interrupt_id(&mut self) -> Option<InterruptId>;

    /// Read the Line Status Register. Clears latched error bits.
    fn line_status(&mut self) -> Lsr;

    /// Pop one byte from the receive buffer.
    fn read_data(&mut self) -> u8;

    /// Push one byte to the transmit holding register.
    fn write_data(&mut self, byte: u8);

    /// Write the Interrupt Enable Register.
    fn set_interrupts(&mut self, ier: Ier);

    /// Returns `true` if the receive FIFO holds a byte. Has no side effects.
    fn rx_pending(&self) -> bool;

    /// Clear a source the engine does not service itself.
    fn acknowledge(&mut self, id: InterruptId) {
        let _ = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisors_follow_clock_formula() {
        for baud in [
            BaudRate::Baud921600,
            BaudRate::Baud460800,
            BaudRate::Baud115200,
            BaudRate::Baud57600,
            BaudRate::Baud9600,
        ] {
            let exact = SERIAL_CLOCK_HZ / (16 * baud.bps());
            assert!(baud.divisor() as u32 == exact || baud.divisor() as u32 == exact + 1);
            assert_eq!(BaudRate::from_bps(baud.bps()), Some(baud));
        }
    }

    #[test]
    fn char_duration_fast_path() {
        assert_eq!(BaudRate::Baud921600.char_duration(), 11);
        assert_eq!(BaudRate::Baud115200.char_duration(), 9 * 22);
        assert_eq!(BaudRate::Baud9600.char_duration(), 104 * 22);
    }

    #[test]
    fn unsupported_rate_rejected() {
        let config = LineConfig::new_8n1(38_400);
        assert_eq!(LineSetup::resolve(&config), Err(UartError::UnsupportedBaudRate));
    }

    #[test]
    fn format_8n1() {
        let setup = LineSetup::resolve(&LineConfig::default()).unwrap();
        assert_eq!(setup.format.bits(), 0b0000_0011);
        assert_eq!(setup.divisor(), 9);
    }

    #[test]
    fn format_parity_and_stop_bits() {
        let config = LineConfig::new_8n1(9_600).with_format(DataBits::Seven, Parity::Even, StopBits::Two);
        let setup = LineSetup::resolve(&config).unwrap();
        assert_eq!(setup.format.bits(), 0b0001_1110);

        let mark = LineConfig::new_8n1(9_600).with_format(DataBits::Five, Parity::Mark, StopBits::One);
        assert_eq!(LineSetup::resolve(&mark).unwrap().format.bits(), 0b0010_1000);

        let space = LineConfig::new_8n1(9_600).with_format(DataBits::Six, Parity::Space, StopBits::One);
        assert_eq!(LineSetup::resolve(&space).unwrap().format.bits(), 0b0011_1001);
    }

    #[test]
    fn base_interrupts_follow_error_detection() {
        let on = LineSetup::resolve(&LineConfig::default()).unwrap();
        assert_eq!(on.base_interrupts(), Ier::DATA_AVAILABLE | Ier::LINE_STATUS);

        let off = LineSetup::resolve(&LineConfig::default().with_error_detection(false)).unwrap();
        assert_eq!(off.base_interrupts(), Ier::DATA_AVAILABLE);
    }

    #[test]
    fn iir_decoding() {
        assert_eq!(InterruptId::from_iir(0xC1), None);
        assert_eq!(InterruptId::from_iir(0xC6), Some(InterruptId::LineStatus));
        assert_eq!(InterruptId::from_iir(0xC4), Some(InterruptId::ReceivedData));
        assert_eq!(InterruptId::from_iir(0xCC), Some(InterruptId::CharacterTimeout));
        assert_eq!(InterruptId::from_iir(0xC2), Some(InterruptId::TransmitEmpty));
        assert_eq!(InterruptId::from_iir(0x07), Some(InterruptId::BusyDetect));
    }
}
