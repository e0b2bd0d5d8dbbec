//! GPIO (General Purpose Input/Output) abstraction

use crate::error::HalResult;

/// GPIO pin modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Input (floating)
    Input,
    /// Output (push-pull)
    Output,
    /// Output (open-drain)
    OutputOpenDrain,
}

/// GPIO pin levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Low level (0V)
    Low,
    /// High level (VCC)
    High,
}

impl Level {
    /// The opposite level
    pub const fn inverted(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// GPIO pin trait (object-safe)
pub trait GpioPin: Send + Sync {
    /// Configure pin mode
    fn set_mode(&mut self, mode: PinMode) -> HalResult<()>;

    /// Read current level
    fn read(&self) -> HalResult<Level>;

    /// Write level (for output pins)
    fn write(&mut self, level: Level) -> HalResult<()>;

    /// Toggle output
    fn toggle(&mut self) -> HalResult<()> {
        let current = self.read()?;
        self.write(current.inverted())
    }

    /// Get pin number
    fn pin_number(&self) -> u32;
}
