//! Byte ⇄ data-slot conversion.
//!
//! The controller shifts each 32-bit slot out starting from a fixed end, so
//! the byte order inside a word depends on the configured bit order: with
//! MSB-first the first byte sits in the most significant *populated* byte,
//! with LSB-first it sits at bit 0.

use hal::spi::BitOrder;
use heapless::Vec;

use crate::error::{Result, SpiMasterError};
use crate::regs::DATA_SLOTS;

/// Bytes held by one data slot.
pub const SLOT_BYTES: usize = 4;

/// Packs 1–4 bytes into one register word.
pub fn pack_word(bytes: &[u8], order: BitOrder) -> Result<u32> {
    if bytes.is_empty() || bytes.len() > SLOT_BYTES {
        return Err(SpiMasterError::InvalidParameter);
    }

    let word = match order {
        BitOrder::MsbFirst => bytes
            .iter()
            .fold(0u32, |word, &byte| (word << 8) | u32::from(byte)),
        BitOrder::LsbFirst => bytes
            .iter()
            .enumerate()
            .fold(0u32, |word, (i, &byte)| word | (u32::from(byte) << (8 * i))),
    };
    Ok(word)
}

/// Unpacks `out.len()` (1–4) bytes from a register word packed the same way.
pub fn unpack_word(word: u32, out: &mut [u8], order: BitOrder) -> Result<()> {
    let count = out.len();
    if count == 0 || count > SLOT_BYTES {
        return Err(SpiMasterError::InvalidParameter);
    }

    for (i, byte) in out.iter_mut().enumerate() {
        let shift = match order {
            BitOrder::MsbFirst => 8 * (count - 1 - i),
            BitOrder::LsbFirst => 8 * i,
        };
        *byte = (word >> shift) as u8;
    }
    Ok(())
}

/// Packs up to 32 bytes into `ceil(len / 4)` words.
pub fn pack_slots(bytes: &[u8], order: BitOrder) -> Result<Vec<u32, DATA_SLOTS>> {
    if bytes.len() > DATA_SLOTS * SLOT_BYTES {
        return Err(SpiMasterError::InvalidParameter);
    }

    let mut words = Vec::new();
    for group in bytes.chunks(SLOT_BYTES) {
        words
            .push(pack_word(group, order)?)
            .map_err(|_| SpiMasterError::InvalidParameter)?;
    }
    Ok(words)
}

/// Fills `out` from consecutive words; the last word may be partial.
pub fn unpack_slots(words: &[u32], out: &mut [u8], order: BitOrder) -> Result<()> {
    if out.len().div_ceil(SLOT_BYTES) > words.len() {
        return Err(SpiMasterError::InvalidParameter);
    }

    for (group, &word) in out.chunks_mut(SLOT_BYTES).zip(words) {
        unpack_word(word, group, order)?;
    }
    Ok(())
}
