pub mod irq;
pub mod irq_lock;
pub use irq::IrqControl;
pub use irq_lock::{IrqLock, IrqLockGuard};
