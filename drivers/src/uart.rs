use common::sync::{IrqControl, IrqLock};

use crate::hal::serial::UartPort;
use crate::sps::SpsUart;
use crate::sps::transfer::{Completion, Rejected};

/// An [`SpsUart`] shared between thread context and its interrupt handler.
///
/// Every access masks interrupts through `I` for the duration of the call.
/// Completions are taken out one at a time and handed to user code with the
/// lock released, so a completion handler may start the next transfer.
pub struct SharedUart<'a, P: UartPort, I: IrqControl> {
    inner: IrqLock<SpsUart<'a, P>, I>,
}

impl<'a, P: UartPort, I: IrqControl> SharedUart<'a, P, I> {
    pub const fn new(uart: SpsUart<'a, P>) -> Self {
        Self {
            inner: IrqLock::new(uart),
        }
    }

    /// Execute a closure with exclusive access to the driver.
    ///
    /// # Example
    /// ```ignore
    /// uart.with(|sps| sps.flow_off());
    /// ```
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut SpsUart<'a, P>) -> R,
    {
        let mut uart = self.inner.lock();
        f(&mut uart)
    }

    pub fn read(&self, buffer: &'a mut [u8], size: usize) -> Result<(), Rejected<'a>> {
        self.inner.lock().read(buffer, size)
    }

    pub fn write(&self, buffer: &'a mut [u8], size: usize) -> Result<(), Rejected<'a>> {
        self.inner.lock().write(buffer, size)
    }

    pub fn flow_on(&self) {
        self.inner.lock().flow_on();
    }

    pub fn flow_off(&self) -> bool {
        self.inner.lock().flow_off()
    }

    pub fn finish_transfers(&self) {
        self.inner.lock().finish_transfers();
    }

    /// Interrupt vector entry point.
    pub fn service_interrupt(&self) {
        self.inner.lock().service_interrupt();
    }

    /// Deliver queued completions to `f` with interrupts enabled.
    pub fn dispatch_completions(&self, mut f: impl FnMut(Completion<'a>)) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.inner.lock().poll_completion();
            let Some(completion) = next else {
                break;
            };
            f(completion);
            delivered += 1;
        }
        delivered
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "da14580")] {
        use common::arch::CurrentIrq;
        use crate::peripheral::uart16550::Uart16550;
        use crate::platform::da14580::UART_BASE;

        /// The SPS UART instance, protected by interrupt masking.
        pub static UART0: SharedUart<'static, Uart16550, CurrentIrq> =
            SharedUart::new(SpsUart::new(unsafe { Uart16550::new(UART_BASE) }));

        /// Execute a closure with exclusive access to UART0.
        pub fn with_uart0<F, R>(f: F) -> R
        where
            F: FnOnce(&mut SpsUart<'static, Uart16550>) -> R,
        {
            UART0.with(f)
        }

        /// Body of the UART interrupt vector.
        pub fn uart0_isr() {
            UART0.service_interrupt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::serial::LineConfig;
    use crate::peripheral::sim::SimPort;
    use crate::sps::transfer::{Direction, TransferStatus};
    use common::arch::CurrentIrq;

    #[test]
    fn completion_handler_can_restart_transfers() {
        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        let mut spare = Some(&mut second[..]);

        let shared: SharedUart<'_, SimPort, CurrentIrq> = SharedUart::new(SpsUart::new(SimPort::new()));
        shared.with(|u| u.initialize(LineConfig::default())).unwrap();
        shared.read(&mut first, 2).unwrap();

        shared.with(|u| u.port_mut().feed(b"ab"));
        shared.service_interrupt();

        let mut seen = Vec::new();
        let delivered = shared.dispatch_completions(|done| {
            seen.push((done.direction, done.status, done.data().to_vec()));
            if let Some(buf) = spare.take() {
                shared.read(buf, 2).unwrap();
            }
        });

        assert_eq!(delivered, 1);
        assert_eq!(seen, vec![(Direction::Read, TransferStatus::Ok, b"ab".to_vec())]);
        assert!(shared.with(|u| u.is_active(Direction::Read)));
    }
}
