//! Register access layer for the SPI master block.
//!
//! The driver never touches memory directly: everything goes through a
//! [`RegisterFile`], which is either the real memory-mapped block ([`Mmio`])
//! or a simulated one in tests.

use hal::interrupt::Irq;

/// Physical base address of the SPI master block on the CM4 bus.
pub const SPI_MASTER_BASE: usize = 0x2400_0000;

/// SPI master interrupt line on the CM4 NVIC.
pub const SPI_MASTER_IRQ: Irq = Irq(14);

/// Control register.
pub const SPI_CTL: usize = 0x00;
/// Opcode (command phase) word.
pub const SPI_OPCODE: usize = 0x04;
/// First of the eight 32-bit data slots.
pub const SPI_DATA0: usize = 0x08;
/// Master configuration register.
pub const SPI_MASTER: usize = 0x28;
/// More-buffer bit counts.
pub const SPI_MORE_BUF: usize = 0x2c;
/// Chip-select setup and hold timing.
pub const SPI_CFG0: usize = 0x30;
/// Transfer status, write one to clear.
pub const SPI_STATUS: usize = 0x34;
/// Chip-select idle timing, sampling, deassert mode and pad group.
pub const SPI_CFG1: usize = 0x38;

/// Number of 32-bit data slots.
pub const DATA_SLOTS: usize = 8;

/// `SPI_CTL`: start the programmed transfer.
pub const CTL_START: u32 = 1 << 8;
/// `SPI_CTL`: transfer in progress (read-only).
pub const CTL_BUSY: u32 = 1 << 16;

/// `SPI_MASTER`: more-buffer mode (opcode + up to 32 data bytes per kick).
pub const MASTER_MORE_BUF_MODE: u32 = 1 << 2;
/// `SPI_MASTER`: shift LSB first on MOSI and MISO.
pub const MASTER_LSB_FIRST: u32 = 1 << 3;
/// `SPI_MASTER`: clock phase.
pub const MASTER_CPHA: u32 = 1 << 4;
/// `SPI_MASTER`: clock polarity.
pub const MASTER_CPOL: u32 = 1 << 5;
/// `SPI_MASTER`: raise the IRQ when a transfer finishes.
pub const MASTER_INT_EN: u32 = 1 << 9;
/// `SPI_MASTER`: full-duplex data phase.
pub const MASTER_BOTH_DIRECTIONAL: u32 = 1 << 10;
/// `SPI_MASTER`: clock divisor field.
pub const MASTER_CLK_DIV_SHIFT: u32 = 16;
pub const MASTER_CLK_DIV_MASK: u32 = 0xfff << MASTER_CLK_DIV_SHIFT;
/// `SPI_MASTER`: hardware slave select.
pub const MASTER_SLAVE_SEL_SHIFT: u32 = 29;
pub const MASTER_SLAVE_SEL_MASK: u32 = 0x3 << MASTER_SLAVE_SEL_SHIFT;

/// `SPI_MORE_BUF`: MOSI data bit count.
pub const MORE_BUF_MOSI_SHIFT: u32 = 0;
pub const MORE_BUF_MOSI_MASK: u32 = 0x1ff << MORE_BUF_MOSI_SHIFT;
/// `SPI_MORE_BUF`: MISO data bit count.
pub const MORE_BUF_MISO_SHIFT: u32 = 12;
pub const MORE_BUF_MISO_MASK: u32 = 0x1ff << MORE_BUF_MISO_SHIFT;
/// `SPI_MORE_BUF`: command (opcode) bit count.
pub const MORE_BUF_CMD_SHIFT: u32 = 24;
pub const MORE_BUF_CMD_MASK: u32 = 0x3f << MORE_BUF_CMD_SHIFT;

/// `SPI_CFG0`: chip-select setup count.
pub const CFG0_SETUP_SHIFT: u32 = 0;
pub const CFG0_SETUP_MASK: u32 = 0x7fff << CFG0_SETUP_SHIFT;
/// `SPI_CFG0`: chip-select hold count.
pub const CFG0_HOLD_SHIFT: u32 = 16;
pub const CFG0_HOLD_MASK: u32 = 0x7fff << CFG0_HOLD_SHIFT;

/// `SPI_CFG1`: chip-select idle count.
pub const CFG1_IDLE_SHIFT: u32 = 0;
pub const CFG1_IDLE_MASK: u32 = 0xff << CFG1_IDLE_SHIFT;
/// `SPI_CFG1`: MISO tick delay.
pub const CFG1_GET_TICK_SHIFT: u32 = 8;
pub const CFG1_GET_TICK_MASK: u32 = 0x7 << CFG1_GET_TICK_SHIFT;
/// `SPI_CFG1`: sample MISO on the falling edge.
pub const CFG1_SAMPLE_NEGATIVE: u32 = 1 << 11;
/// `SPI_CFG1`: deassert the hardware slave select after every byte.
pub const CFG1_DEASSERT: u32 = 1 << 12;
/// `SPI_CFG1`: pad macro group.
pub const CFG1_PAD_MACRO_SHIFT: u32 = 16;
pub const CFG1_PAD_MACRO_MASK: u32 = 0x3 << CFG1_PAD_MACRO_SHIFT;

/// `SPI_STATUS`: the last transfer completed.
pub const STATUS_DONE: u32 = 1 << 0;
/// `SPI_STATUS`: the controller aborted the last transfer.
pub const STATUS_ERROR: u32 = 1 << 1;

/// Byte offset of data slot `index`.
pub const fn data_slot(index: usize) -> usize {
    SPI_DATA0 + index * 4
}

/// Packs the more-buffer bit counts for one kick.
pub const fn more_buf_bits(cmd_bytes: usize, mosi_bytes: usize, miso_bytes: usize) -> u32 {
    ((((cmd_bytes * 8) as u32) << MORE_BUF_CMD_SHIFT) & MORE_BUF_CMD_MASK)
        | ((((mosi_bytes * 8) as u32) << MORE_BUF_MOSI_SHIFT) & MORE_BUF_MOSI_MASK)
        | ((((miso_bytes * 8) as u32) << MORE_BUF_MISO_SHIFT) & MORE_BUF_MISO_MASK)
}

/// Raw 32-bit access to the SPI master register block.
pub trait RegisterFile: Send + Sync {
    /// Read the register at byte `offset`.
    fn read32(&self, offset: usize) -> u32;

    /// Write `value` to the register at byte `offset`.
    fn write32(&mut self, offset: usize, value: u32);

    /// Read-modify-write setting `mask`.
    fn set_bits(&mut self, offset: usize, mask: u32) {
        let value = self.read32(offset);
        self.write32(offset, value | mask);
    }

    /// Read-modify-write clearing `mask`.
    fn clear_bits(&mut self, offset: usize, mask: u32) {
        let value = self.read32(offset);
        self.write32(offset, value & !mask);
    }
}

/// Volatile access to the memory-mapped register block.
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Creates an accessor for the block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of an SPI master register block that no
    /// other code accesses while this value is alive.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Accessor for the on-chip SPI master.
    ///
    /// # Safety
    ///
    /// Must be called at most once; the returned value owns the block.
    pub const unsafe fn spi_master() -> Self {
        Self::new(SPI_MASTER_BASE)
    }
}

impl RegisterFile for Mmio {
    fn read32(&self, offset: usize) -> u32 {
        let ptr = (self.base + offset) as *const u32;
        // SAFETY: `new` guarantees `base` maps the register block and that
        // offsets come from the map above.
        unsafe { ptr.read_volatile() }
    }

    fn write32(&mut self, offset: usize, value: u32) {
        let ptr = (self.base + offset) as *mut u32;
        // SAFETY: see `read32`.
        unsafe { ptr.write_volatile(value) }
    }
}
