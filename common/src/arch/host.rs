use crate::sync::irq::IrqControl;

/// Interrupt control for hosted builds.
///
/// There is no interrupt line to mask on the host: simulations call the
/// interrupt service routine from thread context, so exclusion comes from the
/// lock flag alone.
pub struct HostIrq;

impl IrqControl for HostIrq {
    type State = ();

    #[inline]
    fn disable() {}

    #[inline]
    fn restore(_state: ()) {}
}
