//! MT7687/MT7697 SPI master driver
//!
//! Drives the SPI master block of the MT76x7 family in "more-buffer" mode,
//! where one kick moves up to 32 bytes through eight 32-bit data slots plus a
//! 4-byte opcode register. Arbitrary-length requests are split into kicks by
//! [`plan`], framed by a single chip-select assertion, and completed either by
//! polling the busy bit or from the SPI interrupt.
//!
//! ## Features
//! - `std` - `std::error::Error` for the error types
//! - `defmt` - `defmt::Format` for the error types
//! - `mock` - simulated registers, chip select and interrupt controller
//!
//! ## Example
//! ```ignore
//! use hal_mt7687::{MasterConfig, Mmio, SpiMaster};
//!
//! let regs = unsafe { Mmio::spi_master() };
//! let mut spi = SpiMaster::new(regs, cs_pin);
//! spi.init(MasterConfig::builder().clock_frequency(6_000_000).build())?;
//! spi.send(&[0x02, 0x00, 0x10, 0x00, 0xde, 0xad])?;
//! ```
//!
//! For the interrupt path, keep the session in a
//! `critical_section::Mutex<RefCell<Option<SpiMaster<..>>>>` shared with the
//! SPI interrupt handler, which calls [`SpiMaster::on_interrupt`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

// Links the single-core critical-section implementation on target.
#[cfg(all(target_arch = "arm", target_os = "none"))]
use cortex_m as _;

pub mod codec;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod master;
pub mod plan;
pub mod regs;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use config::{
    ChipSelectPolarity, ChipSelectTiming, DeassertMode, MasterConfig, MasterConfigBuilder, PadMacro,
    SampleEdge, SlavePort,
};
pub use error::{Result, SpiMasterError};
pub use master::{RunningStatus, SpiCallback, SpiCompletion, SpiEvent, SpiMaster};
pub use regs::{Mmio, RegisterFile};
