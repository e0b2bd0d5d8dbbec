//! Hardware Abstraction Layer (HAL) for embedded systems
//!
//! This crate provides vendor-agnostic traits for the peripherals the
//! MT76x7 drivers are built on: the SPI master interface, the GPIO line used
//! as chip select, and the interrupt controller that routes peripheral IRQs.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

pub mod error;
pub mod gpio;
pub mod interrupt;
pub mod spi;

// Re-export commonly used types
pub use error::{HalError, HalResult};
