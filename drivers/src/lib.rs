//! Interrupt-driven UART transport with software flow control.
//!
//! # Module Organization
//!
//! - [`hal`]: register models and the [`UartPort`] trait
//! - [`peripheral`]: port implementations (MMIO 16550, simulated port)
//! - [`sps`]: the transfer engine, byte stuffing codec and flow gate
//! - [`uart`]: interrupt-safe sharing of an engine between thread and ISR
//! - [`platform`]: board memory maps, selected by Cargo feature
//!
//! # Usage Example
//!
//! ```no_run
//! use sps_uart::{LineConfig, SpsUart};
//! use sps_uart::peripheral::uart16550::Uart16550;
//!
//! let mut buf = *b"hello";
//! let mut uart = SpsUart::new(unsafe { Uart16550::new(0x5000_1000) });
//! uart.initialize(LineConfig::default())?;
//! uart.write(&mut buf, 5).map_err(|r| r.error)?;
//! # Ok::<(), sps_uart::UartError>(())
//! ```

#![cfg_attr(not(test), no_std)]

pub mod hal;
pub mod peripheral;
pub mod platform;
pub mod sps;
pub mod uart;

// Re-export commonly used types
pub use hal::serial::{BaudRate, FlowControl, LineConfig, UartError, UartPort};
pub use sps::SpsUart;
pub use sps::codec::FlowSignal;
pub use sps::transfer::{Completion, Direction, TransferStatus};
pub use uart::SharedUart;
