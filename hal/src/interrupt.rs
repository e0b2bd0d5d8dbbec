//! Interrupt controller abstraction

use crate::error::HalResult;

/// Interrupt line number as seen by the interrupt controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Irq(pub u32);

impl Irq {
    /// Raw line number
    pub const fn number(self) -> u32 {
        self.0
    }
}

/// Interrupt controller abstraction
///
/// Handlers live in the vector table and forward to the owning driver, so
/// drivers only unmask their line once a completion callback is in place and
/// mask it again when they shut down.
pub trait InterruptController: Send + Sync {
    /// Unmask the line
    fn enable(&mut self, irq: Irq) -> HalResult<()>;

    /// Mask the line
    fn disable(&mut self, irq: Irq) -> HalResult<()>;

    /// Drop a pending request without servicing it
    fn clear_pending(&mut self, irq: Irq) -> HalResult<()>;

    /// Whether the line is currently unmasked
    fn is_enabled(&self, irq: Irq) -> bool;
}
