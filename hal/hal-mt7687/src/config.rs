//! SPI master session configuration.

use hal::gpio::Level;
use hal::spi::{BitOrder, SpiConfig, SpiMode};

use crate::error::{Result, SpiMasterError};
use crate::regs::{
    CFG0_HOLD_MASK, CFG0_HOLD_SHIFT, CFG0_SETUP_MASK, CFG0_SETUP_SHIFT, CFG1_DEASSERT,
    CFG1_GET_TICK_MASK, CFG1_GET_TICK_SHIFT, CFG1_IDLE_MASK, CFG1_IDLE_SHIFT, CFG1_PAD_MACRO_MASK,
    CFG1_PAD_MACRO_SHIFT, CFG1_SAMPLE_NEGATIVE, MASTER_CLK_DIV_MASK, MASTER_CLK_DIV_SHIFT,
    MASTER_CPHA, MASTER_CPOL, MASTER_LSB_FIRST, MASTER_SLAVE_SEL_MASK, MASTER_SLAVE_SEL_SHIFT,
};

/// Clock feeding the SPI master block.
pub const SOURCE_CLOCK_HZ: u32 = 120_000_000;
/// Slowest supported SCK.
pub const MIN_CLOCK_HZ: u32 = 30_000;
/// Fastest supported SCK.
pub const MAX_CLOCK_HZ: u32 = 12_000_000;
/// Busy-bit polls before a kick is declared lost.
pub const DEFAULT_POLL_BUDGET: u32 = 50_000;
/// Largest chip-select setup or hold count.
pub const MAX_CS_SETUP_HOLD_COUNT: u16 = 0x7fff;
/// Largest MISO tick delay, in SPI system clocks.
pub const MAX_GET_TICK_DELAY: u8 = 7;

/// Hardware slave select line driven alongside the GPIO chip select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlavePort {
    Slave0,
    Slave1,
}

impl SlavePort {
    pub const fn index(self) -> u32 {
        match self {
            SlavePort::Slave0 => 0,
            SlavePort::Slave1 => 1,
        }
    }
}

impl TryFrom<u8> for SlavePort {
    type Error = SpiMasterError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SlavePort::Slave0),
            1 => Ok(SlavePort::Slave1),
            _ => Err(SpiMasterError::InvalidPort),
        }
    }
}

/// Level that marks the chip-select line as asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipSelectPolarity {
    ActiveLow,
    ActiveHigh,
}

impl ChipSelectPolarity {
    pub const fn asserted(self) -> Level {
        match self {
            ChipSelectPolarity::ActiveLow => Level::Low,
            ChipSelectPolarity::ActiveHigh => Level::High,
        }
    }

    pub const fn deasserted(self) -> Level {
        self.asserted().inverted()
    }
}

/// Chip-select timing in SPI base clock cycles.
///
/// Each phase lasts `(count + 1)` clock periods. `idle_count` spaces
/// consecutive transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipSelectTiming {
    pub setup_count: u16,
    pub hold_count: u16,
    pub idle_count: u8,
}

impl ChipSelectTiming {
    pub fn validate(&self) -> Result<()> {
        if self.setup_count > MAX_CS_SETUP_HOLD_COUNT || self.hold_count > MAX_CS_SETUP_HOLD_COUNT
        {
            return Err(SpiMasterError::InvalidParameter);
        }
        Ok(())
    }
}

/// MISO sampling edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SampleEdge {
    #[default]
    Positive,
    Negative,
}

/// Whether the hardware slave select toggles after every byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeassertMode {
    #[default]
    Disabled,
    Enabled,
}

/// Pad group the SPI master signals are routed through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PadMacro {
    #[default]
    GroupA,
    GroupB,
    GroupC,
}

impl PadMacro {
    pub const fn index(self) -> u32 {
        match self {
            PadMacro::GroupA => 0,
            PadMacro::GroupB => 1,
            PadMacro::GroupC => 2,
        }
    }
}

/// Configuration of one SPI master session.
///
/// Read once at the start of every transaction; it can only be replaced
/// while the controller is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterConfig {
    pub clock_frequency: u32,
    pub slave_port: SlavePort,
    pub bit_order: BitOrder,
    pub mode: SpiMode,
    pub cs_polarity: ChipSelectPolarity,
    pub cs_timing: ChipSelectTiming,
    /// Timing tolerance for high clock rates, 0 (off) to 7 system clocks.
    pub get_tick_delay: u8,
    pub sample_edge: SampleEdge,
    pub deassert: DeassertMode,
    pub pad_macro: PadMacro,
    pub poll_budget: u32,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            clock_frequency: MAX_CLOCK_HZ,
            slave_port: SlavePort::Slave0,
            bit_order: BitOrder::MsbFirst,
            mode: SpiMode::Mode0,
            cs_polarity: ChipSelectPolarity::ActiveLow,
            cs_timing: ChipSelectTiming::default(),
            get_tick_delay: 0,
            sample_edge: SampleEdge::Positive,
            deassert: DeassertMode::Disabled,
            pad_macro: PadMacro::GroupA,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }
}

impl MasterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> MasterConfigBuilder {
        MasterConfigBuilder::default()
    }

    /// Rejects settings the controller cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CLOCK_HZ..=MAX_CLOCK_HZ).contains(&self.clock_frequency) {
            return Err(SpiMasterError::InvalidParameter);
        }
        if self.poll_budget == 0 || self.get_tick_delay > MAX_GET_TICK_DELAY {
            return Err(SpiMasterError::InvalidParameter);
        }
        self.cs_timing.validate()
    }

    /// Divisor giving the fastest SCK not above `clock_frequency`.
    ///
    /// SCK = source / (2 * (divisor + 2)).
    pub fn clock_divisor(&self) -> u32 {
        let sck = 2 * u64::from(self.clock_frequency.max(1));
        let half_periods = u64::from(SOURCE_CLOCK_HZ).div_ceil(sck);
        // Never above the source clock, so the quotient fits.
        (half_periods as u32).saturating_sub(2)
    }

    /// Value for `SPI_MASTER` with every transfer mode bit cleared.
    pub fn master_register(&self) -> u32 {
        let mut value = (self.clock_divisor() << MASTER_CLK_DIV_SHIFT) & MASTER_CLK_DIV_MASK;
        value |= (self.slave_port.index() << MASTER_SLAVE_SEL_SHIFT) & MASTER_SLAVE_SEL_MASK;
        if self.mode.polarity() {
            value |= MASTER_CPOL;
        }
        if self.mode.phase() {
            value |= MASTER_CPHA;
        }
        if self.bit_order == BitOrder::LsbFirst {
            value |= MASTER_LSB_FIRST;
        }
        value
    }

    /// Value for `SPI_CFG0`: chip-select setup and hold counts.
    pub fn cfg0_register(&self) -> u32 {
        ((u32::from(self.cs_timing.setup_count) << CFG0_SETUP_SHIFT) & CFG0_SETUP_MASK)
            | ((u32::from(self.cs_timing.hold_count) << CFG0_HOLD_SHIFT) & CFG0_HOLD_MASK)
    }

    /// Value for `SPI_CFG1`: idle count, sampling, deassert and pad group.
    pub fn cfg1_register(&self) -> u32 {
        let mut value = (u32::from(self.cs_timing.idle_count) << CFG1_IDLE_SHIFT) & CFG1_IDLE_MASK;
        value |= (u32::from(self.get_tick_delay) << CFG1_GET_TICK_SHIFT) & CFG1_GET_TICK_MASK;
        value |= (self.pad_macro.index() << CFG1_PAD_MACRO_SHIFT) & CFG1_PAD_MACRO_MASK;
        if self.sample_edge == SampleEdge::Negative {
            value |= CFG1_SAMPLE_NEGATIVE;
        }
        if self.deassert == DeassertMode::Enabled {
            value |= CFG1_DEASSERT;
        }
        value
    }
}

impl From<&SpiConfig> for MasterConfig {
    fn from(config: &SpiConfig) -> Self {
        Self {
            clock_frequency: config.frequency,
            bit_order: config.bit_order,
            mode: config.mode,
            ..Self::default()
        }
    }
}

/// Builder for ergonomic session configuration.
#[derive(Debug, Clone, Default)]
pub struct MasterConfigBuilder {
    config: MasterConfig,
}

impl MasterConfigBuilder {
    /// Sets the SCK frequency in Hz.
    pub fn clock_frequency(mut self, hz: u32) -> Self {
        self.config.clock_frequency = hz;
        self
    }

    /// Sets the hardware slave select.
    pub fn slave_port(mut self, port: SlavePort) -> Self {
        self.config.slave_port = port;
        self
    }

    pub fn bit_order(mut self, order: BitOrder) -> Self {
        self.config.bit_order = order;
        self
    }

    /// Sets clock polarity and phase.
    pub fn mode(mut self, mode: SpiMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn cs_polarity(mut self, polarity: ChipSelectPolarity) -> Self {
        self.config.cs_polarity = polarity;
        self
    }

    pub fn cs_timing(mut self, timing: ChipSelectTiming) -> Self {
        self.config.cs_timing = timing;
        self
    }

    /// Sets the MISO tick delay (0 disables it).
    pub fn get_tick_delay(mut self, delay: u8) -> Self {
        self.config.get_tick_delay = delay;
        self
    }

    pub fn sample_edge(mut self, edge: SampleEdge) -> Self {
        self.config.sample_edge = edge;
        self
    }

    /// Toggles the hardware slave select after every byte.
    pub fn deassert(mut self, mode: DeassertMode) -> Self {
        self.config.deassert = mode;
        self
    }

    pub fn pad_macro(mut self, group: PadMacro) -> Self {
        self.config.pad_macro = group;
        self
    }

    /// Sets how many busy-bit polls a kick may take.
    pub fn poll_budget(mut self, polls: u32) -> Self {
        self.config.poll_budget = polls;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> MasterConfig {
        self.config
    }
}
