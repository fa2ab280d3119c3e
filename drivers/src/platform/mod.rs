//! Platform Abstraction Layer
//!
//! Board-level facts the peripheral drivers cannot know on their own: where
//! the UART register blocks live and which interrupt lines they raise.
//! Exactly one platform is selected with a Cargo feature; without one the
//! crate builds hardware-free (simulated ports only).

cfg_if::cfg_if! {
    if #[cfg(feature = "da14580")] {
        pub mod da14580;
        pub use da14580::Da14580Platform as CurrentPlatform;
    }
}

/// Interrupt line and register block of one UART instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartInstance {
    pub base: usize,
    pub irq: u32,
}

/// Implemented by each supported platform.
pub trait Platform {
    /// Platform name for debugging
    fn name() -> &'static str;

    /// UART instances, primary first.
    fn uarts() -> &'static [UartInstance];

    /// Look up a UART by index (0 = primary).
    fn uart(index: usize) -> Option<UartInstance> {
        Self::uarts().get(index).copied()
    }
}
