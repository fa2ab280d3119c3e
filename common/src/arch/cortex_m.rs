use crate::sync::irq::IrqControl;

const PRIMASK_PM: u32 = 1 << 0;

/// Interrupt control for ARMv6-M / ARMv7-M cores.
///
/// `disable()` saves PRIMASK and executes `cpsid i`; `restore(true)` executes
/// `cpsie i`. The asm blocks are compiler barriers: memory accesses are not
/// reordered across them.
pub struct CortexMIrq;

impl IrqControl for CortexMIrq {
    type State = bool;

    #[inline(always)]
    fn disable() -> bool {
        let primask: u32;
        unsafe {
            core::arch::asm!(
                "mrs {0}, PRIMASK",
                "cpsid i",
                out(reg) primask,
                options(nostack, preserves_flags)
            );
        }
        primask & PRIMASK_PM == 0 // interrupts were enabled
    }

    #[inline(always)]
    fn restore(prev_enabled: bool) {
        if prev_enabled {
            unsafe {
                core::arch::asm!("cpsie i", options(nostack, preserves_flags));
            }
        }
    }
}
