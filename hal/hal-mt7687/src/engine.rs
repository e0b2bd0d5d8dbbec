//! Transaction engine: programs and kicks single chunks.
//!
//! Each kick follows the same register sequence: load the opcode word, the
//! data slots and the more-buffer bit counts, switch the controller into
//! more-buffer mode, set START. After the transfer the mode bits are cleared
//! again so the block falls back to single-shot mode between requests.

use hal::spi::BitOrder;
use log::{trace, warn};

use crate::codec::{pack_slots, pack_word, unpack_slots, SLOT_BYTES};
use crate::error::{Result, SpiMasterError};
use crate::plan::{DuplexChunk, ReceiveChunk, SendChunk, DUPLEX_RX_SLOT, DUPLEX_SLOTS};
use crate::regs::{
    data_slot, more_buf_bits, RegisterFile, CTL_BUSY, CTL_START, DATA_SLOTS,
    MASTER_BOTH_DIRECTIONAL, MASTER_INT_EN, MASTER_MORE_BUF_MODE, SPI_CTL, SPI_MASTER,
    SPI_MORE_BUF, SPI_OPCODE, SPI_STATUS, STATUS_DONE, STATUS_ERROR,
};

/// How a kick reports completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Spin on the busy bit.
    Polling,
    /// Raise the SPI interrupt.
    Interrupt,
}

/// Data-phase direction of a kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    Half,
    Full,
}

impl Duplex {
    const fn mode_bits(self) -> u32 {
        match self {
            Duplex::Half => MASTER_MORE_BUF_MODE,
            Duplex::Full => MASTER_MORE_BUF_MODE | MASTER_BOTH_DIRECTIONAL,
        }
    }
}

/// Borrowed view of the register file for one transaction.
pub struct Engine<'a, R: RegisterFile> {
    regs: &'a mut R,
    order: BitOrder,
    master: u32,
}

impl<'a, R: RegisterFile> Engine<'a, R> {
    /// `master` is the idle `SPI_MASTER` value of the session.
    pub fn new(regs: &'a mut R, order: BitOrder, master: u32) -> Self {
        Self {
            regs,
            order,
            master,
        }
    }

    /// Loads one half-duplex send chunk of `source`.
    pub fn load_send(&mut self, source: &[u8], chunk: &SendChunk) -> Result<()> {
        let opcode = &source[chunk.opcode.clone()];
        let data = &source[chunk.data.clone()];

        self.write_opcode(opcode)?;
        self.write_slots(0, DATA_SLOTS, data)?;
        self.regs
            .write32(SPI_MORE_BUF, more_buf_bits(opcode.len(), data.len(), 0));
        Ok(())
    }

    /// Loads one half-duplex receive chunk. Kicks after the first carry a
    /// fake zero opcode so the command phase is skipped.
    pub fn load_receive(&mut self, command: &[u8], chunk: &ReceiveChunk) -> Result<()> {
        let command = if chunk.with_command { command } else { &[] };

        self.write_opcode(command)?;
        self.write_slots(0, DATA_SLOTS, &[])?;
        self.regs
            .write32(SPI_MORE_BUF, more_buf_bits(command.len(), 0, chunk.rx.len()));
        Ok(())
    }

    /// Loads one full-duplex chunk.
    pub fn load_duplex(&mut self, tx: &[u8], chunk: &DuplexChunk) -> Result<()> {
        let opcode = &tx[chunk.opcode.clone()];
        let data = &tx[chunk.tx_data.clone()];

        self.write_opcode(opcode)?;
        self.write_slots(0, DUPLEX_SLOTS, data)?;
        self.write_slots(DUPLEX_RX_SLOT, DUPLEX_SLOTS, &[])?;
        self.regs.write32(
            SPI_MORE_BUF,
            more_buf_bits(opcode.len(), data.len(), chunk.rx_data.len()),
        );
        Ok(())
    }

    /// Starts the loaded chunk.
    pub fn kick(&mut self, duplex: Duplex, completion: Completion) {
        let mut master = self.master | duplex.mode_bits();
        if completion == Completion::Interrupt {
            master |= MASTER_INT_EN;
        }
        self.regs.write32(SPI_MASTER, master);
        self.regs.write32(SPI_STATUS, STATUS_DONE | STATUS_ERROR);
        self.regs.set_bits(SPI_CTL, CTL_START);
        trace!("spi kick {:?} {:?}", duplex, completion);
    }

    /// Spins until the busy bit clears, then leaves more-buffer mode.
    pub fn wait_idle(&mut self, budget: u32) -> Result<()> {
        let mut polls = 0;
        while self.regs.read32(SPI_CTL) & CTL_BUSY != 0 {
            polls += 1;
            if polls >= budget {
                warn!("spi busy bit stuck after {} polls", polls);
                self.finish();
                return Err(SpiMasterError::HardwareTimeout);
            }
            core::hint::spin_loop();
        }
        self.acknowledge()
    }

    /// Clears the completion status, leaves more-buffer mode and reports
    /// whether the controller flagged the transfer.
    pub fn acknowledge(&mut self) -> Result<()> {
        let status = self.regs.read32(SPI_STATUS);
        self.regs.write32(SPI_STATUS, status & (STATUS_DONE | STATUS_ERROR));
        self.finish();

        if status & STATUS_ERROR != 0 {
            warn!("spi controller reported status {:#x}", status);
            return Err(SpiMasterError::Unclassified);
        }
        Ok(())
    }

    /// Returns the controller to single-shot mode.
    pub fn finish(&mut self) {
        self.regs.write32(SPI_MASTER, self.master);
    }

    /// Decodes a half-duplex receive chunk into `dest`.
    pub fn read_receive(&self, dest: &mut [u8]) -> Result<()> {
        self.read_slots(0, dest)
    }

    /// Decodes the receive slots of a full-duplex chunk into `dest`.
    pub fn read_duplex(&self, dest: &mut [u8]) -> Result<()> {
        self.read_slots(DUPLEX_RX_SLOT, dest)
    }

    fn write_opcode(&mut self, opcode: &[u8]) -> Result<()> {
        let word = if opcode.is_empty() {
            0
        } else {
            pack_word(opcode, self.order)?
        };
        self.regs.write32(SPI_OPCODE, word);
        Ok(())
    }

    /// Writes `bytes` into `count` slots from `first`, zeroing the rest.
    fn write_slots(&mut self, first: usize, count: usize, bytes: &[u8]) -> Result<()> {
        if bytes.len() > count * SLOT_BYTES {
            return Err(SpiMasterError::InvalidParameter);
        }

        let words = pack_slots(bytes, self.order)?;
        for slot in 0..count {
            let word = words.get(slot).copied().unwrap_or(0);
            self.regs.write32(data_slot(first + slot), word);
        }
        Ok(())
    }

    fn read_slots(&self, first: usize, dest: &mut [u8]) -> Result<()> {
        if dest.is_empty() {
            return Ok(());
        }
        let count = dest.len().div_ceil(SLOT_BYTES);
        if first + count > DATA_SLOTS {
            return Err(SpiMasterError::InvalidParameter);
        }

        let mut words = [0u32; DATA_SLOTS];
        for (slot, word) in words.iter_mut().take(count).enumerate() {
            *word = self.regs.read32(data_slot(first + slot));
        }
        unpack_slots(&words[..count], dest, self.order)
    }
}
