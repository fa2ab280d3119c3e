//! 16550-compatible UART with 32-bit register stride.
//!
//! Matches the DesignWare APB UART found on the DA14580 (UART and UART2):
//! the classic 16550 register file at 4-byte spacing plus the UART Status
//! Register, which reports FIFO state without the side effects of LSR.
//!
//! # Example
//!
//! ```no_run
//! use sps_uart::hal::serial::{LineConfig, LineSetup, UartPort};
//! use sps_uart::peripheral::uart16550::Uart16550;
//!
//! let mut uart = unsafe { Uart16550::new(0x5000_1000) };
//! let setup = LineSetup::resolve(&LineConfig::default()).unwrap();
//! uart.configure(&setup);
//! ```

use core::ptr::{read_volatile, write_volatile};

use crate::hal::serial::{Fcr, Ier, InterruptId, Lcr, LineSetup, Lsr, UartPort};

/// Register offsets from the UART base address.
mod reg {
    /// Receive Buffer Register (read, DLAB=0).
    pub const RBR: usize = 0x00;
    /// Transmit Holding Register (write, DLAB=0).
    pub const THR: usize = 0x00;
    /// Divisor Latch Low (DLAB=1).
    pub const DLL: usize = 0x00;
    /// Interrupt Enable Register (DLAB=0).
    pub const IER: usize = 0x04;
    /// Divisor Latch High (DLAB=1).
    pub const DLH: usize = 0x04;
    /// Interrupt Identification Register (read).
    pub const IIR: usize = 0x08;
    /// FIFO Control Register (write).
    pub const FCR: usize = 0x08;
    /// Line Control Register.
    pub const LCR: usize = 0x0C;
    /// Modem Control Register.
    pub const MCR: usize = 0x10;
    /// Line Status Register.
    pub const LSR: usize = 0x14;
    /// Modem Status Register.
    pub const MSR: usize = 0x18;
    /// UART Status Register.
    pub const USR: usize = 0x7C;
}

// UART Status Register (USR) bits
const USR_BUSY: u32 = 1 << 0;
const USR_RFNE: u32 = 1 << 3;

/// Polls of USR.BUSY before reprogramming anyway.
const BUSY_SPIN_LIMIT: u32 = 100_000;

/// Memory-mapped 16550 UART.
pub struct Uart16550 {
    base: usize,
}

impl Uart16550 {
    /// Create a new instance.
    ///
    /// # Safety
    ///
    /// - `base` must point to a 16550-compatible register block with 32-bit stride
    /// - Only one instance should exist per UART hardware
    /// - Clocks and pins must already be set up by the platform layer
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub const fn base(&self) -> usize {
        self.base
    }

    #[inline]
    fn read_reg(&self, offset: usize) -> u32 {
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write_reg(&mut self, offset: usize, value: u32) {
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// Wait until the UART accepts LCR writes. Returns `false` if it is
    /// still busy after [`BUSY_SPIN_LIMIT`] polls.
    ///
    /// USR.BUSY also stays set while a character is being received, so a
    /// line with continuous inbound traffic may never report idle.
    fn wait_idle(&self) -> bool {
        for _ in 0..BUSY_SPIN_LIMIT {
            if self.read_reg(reg::USR) & USR_BUSY == 0 {
                return true;
            }
            core::hint::spin_loop();
        }
        false
    }
}

impl UartPort for Uart16550 {
    fn configure(&mut self, setup: &LineSetup) {
        // Interrupts off while the line is reprogrammed
        self.write_reg(reg::IER, 0);

        // Divisor and LCR writes are ignored while busy; the receive side
        // must be quiet for the new setup to take effect.
        if !self.wait_idle() {
            log::warn!("uart16550 {:#x}: still busy, line setup may not apply", self.base);
        }

        let divisor = setup.divisor();
        self.write_reg(reg::LCR, Lcr::DLAB.bits() as u32);
        self.write_reg(reg::DLL, (divisor & 0xFF) as u32);
        self.write_reg(reg::DLH, (divisor >> 8) as u32);

        // Character format, clears DLAB
        self.write_reg(reg::LCR, setup.format.bits() as u32);

        // One byte per receive event
        self.write_reg(
            reg::FCR,
            (Fcr::ENABLE | Fcr::CLEAR_RX | Fcr::CLEAR_TX | Fcr::TRIGGER_1).bits() as u32,
        );

        // No modem control: RTS/CTS stays unused
        self.write_reg(reg::MCR, 0);
    }

    fn interrupt_id(&mut self) -> Option<InterruptId> {
        InterruptId::from_iir(self.read_reg(reg::IIR) as u8)
    }

    fn line_status(&mut self) -> Lsr {
        Lsr::from_bits_truncate(self.read_reg(reg::LSR) as u8)
    }

    fn read_data(&mut self) -> u8 {
        (self.read_reg(reg::RBR) & 0xFF) as u8
    }

    fn write_data(&mut self, byte: u8) {
        self.write_reg(reg::THR, byte as u32);
    }

    fn set_interrupts(&mut self, ier: Ier) {
        self.write_reg(reg::IER, ier.bits() as u32);
    }

    fn rx_pending(&self) -> bool {
        self.read_reg(reg::USR) & USR_RFNE != 0
    }

    fn acknowledge(&mut self, id: InterruptId) {
        // Reading the status register is what clears these sources
        match id {
            InterruptId::ModemStatus => {
                let _ = self.read_reg(reg::MSR);
            }
            InterruptId::BusyDetect => {
                let _ = self.read_reg(reg::USR);
            }
            _ => {}
        }
    }
}
