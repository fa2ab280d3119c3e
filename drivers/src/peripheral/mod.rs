//! Peripheral Drivers
//!
//! # Available Peripherals
//!
//! - [`uart16550`]: 16550-compatible UART with 32-bit register stride
//! - [`sim`]: software model of the same UART, for host builds and tests

pub mod sim;
pub mod uart16550;
