//! Primitives shared by thread-context code and interrupt handlers.
//!
//! - [`sync`]: interrupt-masking lock and the [`sync::IrqControl`] seam
//! - [`arch`]: the `IrqControl` implementation for the build target

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod sync;
