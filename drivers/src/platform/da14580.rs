//! Dialog DA14580 memory map.
//!
//! Both UARTs are DesignWare APB blocks clocked from the 16 MHz peripheral
//! clock, matching [`SERIAL_CLOCK_HZ`](crate::hal::serial::SERIAL_CLOCK_HZ).

use super::{Platform, UartInstance};

pub const PERIPHERAL_BASE: usize = 0x5000_0000;

pub const UART_BASE: usize = PERIPHERAL_BASE + 0x1000;
pub const UART2_BASE: usize = PERIPHERAL_BASE + 0x1100;

pub const UART_IRQ: u32 = 8;
pub const UART2_IRQ: u32 = 9;

static UARTS: [UartInstance; 2] = [
    UartInstance {
        base: UART_BASE,
        irq: UART_IRQ,
    },
    UartInstance {
        base: UART2_BASE,
        irq: UART2_IRQ,
    },
];

pub struct Da14580Platform;

impl Platform for Da14580Platform {
    fn name() -> &'static str {
        "DA14580 (SmartBond)"
    }

    fn uarts() -> &'static [UartInstance] {
        &UARTS
    }
}
