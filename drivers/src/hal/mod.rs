//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! Register models and the [`serial::UartPort`] trait that the SPS engine
//! drives. Implementations live in [`crate::peripheral`].

pub mod serial;
