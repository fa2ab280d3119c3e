//! Interrupt masking for the build target.

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "arm", target_os = "none"))] {
        mod cortex_m;
        pub use cortex_m::CortexMIrq as CurrentIrq;
    } else {
        mod host;
        pub use host::HostIrq as CurrentIrq;
    }
}
