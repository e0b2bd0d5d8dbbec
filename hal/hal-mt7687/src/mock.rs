//! Simulated SPI master hardware for host tests.
//!
//! [`MockRegisters`] models just enough of the block to exercise the driver:
//! writing `CTL_START` snapshots the programmed kick, fills the receive slots
//! from a scripted MISO stream, raises the status bits and, with `INT_EN`
//! set, marks the interrupt pending until the status is cleared.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use hal::gpio::{GpioPin, Level, PinMode};
use hal::interrupt::{InterruptController, Irq};
use hal::spi::BitOrder;
use hal::{HalError, HalResult};

use crate::codec::{pack_slots, unpack_slots, unpack_word};
use crate::regs::{
    data_slot, RegisterFile, CTL_BUSY, CTL_START, DATA_SLOTS, MASTER_BOTH_DIRECTIONAL,
    MASTER_INT_EN, MASTER_LSB_FIRST, MASTER_MORE_BUF_MODE, MORE_BUF_CMD_MASK, MORE_BUF_CMD_SHIFT,
    MORE_BUF_MISO_MASK, MORE_BUF_MISO_SHIFT, MORE_BUF_MOSI_MASK, MORE_BUF_MOSI_SHIFT, SPI_CTL,
    SPI_CFG1, SPI_MASTER, SPI_MORE_BUF, SPI_OPCODE, SPI_STATUS, STATUS_DONE, STATUS_ERROR,
};

const REGISTER_COUNT: usize = SPI_CFG1 / 4 + 1;
const NEVER: u32 = u32::MAX;

/// How long the busy bit stays set after a kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyBehavior {
    /// Idle on the first poll.
    Immediate,
    /// Busy for the given number of polls.
    Polls(u32),
    /// Stuck busy.
    Never,
}

/// Snapshot of the registers at the moment a kick was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kick {
    pub master: u32,
    pub opcode: u32,
    pub more_buf: u32,
    pub slots: [u32; DATA_SLOTS],
    /// Bytes the simulated slave drove during the data phase.
    pub miso: Vec<u8>,
}

impl Kick {
    pub fn cmd_bytes(&self) -> usize {
        (((self.more_buf & MORE_BUF_CMD_MASK) >> MORE_BUF_CMD_SHIFT) / 8) as usize
    }

    pub fn mosi_bytes(&self) -> usize {
        (((self.more_buf & MORE_BUF_MOSI_MASK) >> MORE_BUF_MOSI_SHIFT) / 8) as usize
    }

    pub fn miso_bytes(&self) -> usize {
        (((self.more_buf & MORE_BUF_MISO_MASK) >> MORE_BUF_MISO_SHIFT) / 8) as usize
    }

    pub fn more_buf_mode(&self) -> bool {
        self.master & MASTER_MORE_BUF_MODE != 0
    }

    pub fn full_duplex(&self) -> bool {
        self.master & MASTER_BOTH_DIRECTIONAL != 0
    }

    pub fn interrupt(&self) -> bool {
        self.master & MASTER_INT_EN != 0
    }

    pub fn bit_order(&self) -> BitOrder {
        bit_order(self.master)
    }

    /// Bytes shifted out on MOSI: opcode phase, then data phase.
    pub fn mosi(&self) -> Vec<u8> {
        let order = self.bit_order();
        let mut opcode = alloc::vec![0u8; self.cmd_bytes()];
        if !opcode.is_empty() {
            let _ = unpack_word(self.opcode, &mut opcode, order);
        }
        let mut data = alloc::vec![0u8; self.mosi_bytes()];
        let _ = unpack_slots(&self.slots, &mut data, order);

        opcode.extend_from_slice(&data);
        opcode
    }
}

/// Array-backed register file.
pub struct MockRegisters {
    regs: [u32; REGISTER_COUNT],
    busy_polls: AtomicU32,
    busy: BusyBehavior,
    miso: VecDeque<u8>,
    failing_kick: Option<usize>,
    kicks: Vec<Kick>,
    writes: usize,
}

impl Default for MockRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegisters {
    pub fn new() -> Self {
        Self {
            regs: [0; REGISTER_COUNT],
            busy_polls: AtomicU32::new(0),
            busy: BusyBehavior::Immediate,
            miso: VecDeque::new(),
            failing_kick: None,
            kicks: Vec::new(),
            writes: 0,
        }
    }

    pub fn with_busy(mut self, busy: BusyBehavior) -> Self {
        self.busy = busy;
        self
    }

    /// Queues bytes for the slave to drive; once drained it drives `0xff`.
    pub fn script_miso(&mut self, bytes: &[u8]) {
        self.miso.extend(bytes.iter().copied());
    }

    /// Makes kick number `index` (zero-based) report `STATUS_ERROR`.
    pub fn fail_kick(&mut self, index: usize) {
        self.failing_kick = Some(index);
    }

    pub fn kicks(&self) -> &[Kick] {
        &self.kicks
    }

    /// MOSI bytes of all kicks, in wire order.
    pub fn mosi_stream(&self) -> Vec<u8> {
        self.kicks.iter().flat_map(Kick::mosi).collect()
    }

    /// Total register writes, including the ones made by `init`.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Raw register value without side effects.
    pub fn peek(&self, offset: usize) -> u32 {
        self.regs[offset / 4]
    }

    /// Whether the SPI interrupt is raised.
    pub fn interrupt_pending(&self) -> bool {
        let status = self.peek(SPI_STATUS);
        self.peek(SPI_MASTER) & MASTER_INT_EN != 0 && status & (STATUS_DONE | STATUS_ERROR) != 0
    }

    fn start(&mut self) {
        let master = self.peek(SPI_MASTER);
        let mut kick = Kick {
            master,
            opcode: self.peek(SPI_OPCODE),
            more_buf: self.peek(SPI_MORE_BUF),
            slots: core::array::from_fn(|slot| self.peek(data_slot(slot))),
            miso: Vec::new(),
        };

        if kick.more_buf_mode() {
            let count = kick.miso_bytes();
            let first = if kick.full_duplex() { 4 } else { 0 };
            kick.miso = (0..count)
                .map(|_| self.miso.pop_front().unwrap_or(0xff))
                .collect();
            if let Ok(words) = pack_slots(&kick.miso, bit_order(master)) {
                for (slot, word) in words.iter().enumerate() {
                    self.regs[data_slot(first + slot) / 4] = *word;
                }
            }
        }

        let status = if self.failing_kick == Some(self.kicks.len()) {
            STATUS_DONE | STATUS_ERROR
        } else {
            STATUS_DONE
        };
        self.regs[SPI_STATUS / 4] |= status;

        let polls = match self.busy {
            BusyBehavior::Immediate => 0,
            BusyBehavior::Polls(polls) => polls,
            BusyBehavior::Never => NEVER,
        };
        self.busy_polls.store(polls, Ordering::Relaxed);
        self.kicks.push(kick);
    }
}

impl RegisterFile for MockRegisters {
    fn read32(&self, offset: usize) -> u32 {
        let value = self.regs[offset / 4];
        if offset != SPI_CTL {
            return value;
        }

        let remaining = self.busy_polls.load(Ordering::Relaxed);
        if remaining == 0 {
            return value;
        }
        if remaining != NEVER {
            self.busy_polls.store(remaining - 1, Ordering::Relaxed);
        }
        value | CTL_BUSY
    }

    fn write32(&mut self, offset: usize, value: u32) {
        self.writes += 1;
        match offset {
            SPI_STATUS => self.regs[offset / 4] &= !value,
            SPI_CTL => {
                self.regs[offset / 4] = value & !(CTL_START | CTL_BUSY);
                if value & CTL_START != 0 {
                    self.start();
                }
            }
            _ => self.regs[offset / 4] = value,
        }
    }
}

fn bit_order(master: u32) -> BitOrder {
    if master & MASTER_LSB_FIRST != 0 {
        BitOrder::LsbFirst
    } else {
        BitOrder::MsbFirst
    }
}

/// Chip-select pin that records every level it is driven to.
#[derive(Debug, Clone)]
pub struct MockChipSelect {
    mode: PinMode,
    level: Level,
    history: Vec<Level>,
    writable: Option<usize>,
}

impl Default for MockChipSelect {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChipSelect {
    /// A floating input that reads high.
    pub fn new() -> Self {
        Self {
            mode: PinMode::Input,
            level: Level::High,
            history: Vec::new(),
            writable: None,
        }
    }

    /// Accepts `writes` more level changes, then reports a hardware error.
    pub fn fail_after(mut self, writes: usize) -> Self {
        self.writable = Some(writes);
        self
    }

    pub fn mode(&self) -> PinMode {
        self.mode
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Every level written, in order.
    pub fn history(&self) -> &[Level] {
        &self.history
    }

    /// Number of edges into `level`.
    pub fn edges_to(&self, level: Level) -> usize {
        let mut previous = Level::High;
        let mut edges = 0;
        for &next in &self.history {
            if next != previous && next == level {
                edges += 1;
            }
            previous = next;
        }
        edges
    }
}

impl GpioPin for MockChipSelect {
    fn set_mode(&mut self, mode: PinMode) -> HalResult<()> {
        self.mode = mode;
        Ok(())
    }

    fn read(&self) -> HalResult<Level> {
        Ok(self.level)
    }

    fn write(&mut self, level: Level) -> HalResult<()> {
        if let Some(remaining) = self.writable.as_mut() {
            if *remaining == 0 {
                return Err(HalError::HardwareError);
            }
            *remaining -= 1;
        }
        self.level = level;
        self.history.push(level);
        Ok(())
    }

    fn pin_number(&self) -> u32 {
        0
    }
}

/// Interrupt controller that only tracks enable state.
#[derive(Debug, Default)]
pub struct MockInterruptController {
    enabled: Vec<Irq>,
}

impl MockInterruptController {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InterruptController for MockInterruptController {
    fn enable(&mut self, irq: Irq) -> HalResult<()> {
        if !self.enabled.contains(&irq) {
            self.enabled.push(irq);
        }
        Ok(())
    }

    fn disable(&mut self, irq: Irq) -> HalResult<()> {
        self.enabled.retain(|&enabled| enabled != irq);
        Ok(())
    }

    fn clear_pending(&mut self, _irq: Irq) -> HalResult<()> {
        Ok(())
    }

    fn is_enabled(&self, irq: Irq) -> bool {
        self.enabled.contains(&irq)
    }
}
