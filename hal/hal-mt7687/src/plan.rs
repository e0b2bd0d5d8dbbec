//! Chunk planning.
//!
//! A logical request is split into kicks sized to what one more-buffer
//! transfer can carry. Plans are pure index arithmetic: each chunk is a set of
//! ranges into the caller's buffers, so the polling loop and the interrupt
//! path walk the exact same sequence.

use core::cmp::min;
use core::ops::Range;

/// Bytes carried by the command (opcode) phase.
pub const OPCODE_BYTES: usize = 4;

/// Bytes of a send request consumed per kick (opcode + data).
pub const SEND_STRIDE: usize = 28;

/// Data-phase bytes of a full send kick.
pub const SEND_DATA_BYTES: usize = SEND_STRIDE - OPCODE_BYTES;

/// Bytes received per half-duplex kick.
pub const RECEIVE_STRIDE: usize = 32;

/// Bytes of each direction covered by one full-duplex kick.
pub const DUPLEX_WINDOW: usize = 16;

/// Slots per direction in full-duplex mode.
pub const DUPLEX_SLOTS: usize = 4;

/// First receive slot in full-duplex mode.
pub const DUPLEX_RX_SLOT: usize = 4;

/// One kick of a half-duplex send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendChunk {
    /// Bytes shifted out in the command phase.
    pub opcode: Range<usize>,
    /// Bytes shifted out in the data phase (may be empty).
    pub data: Range<usize>,
}

impl SendChunk {
    /// Payload bytes carried by this kick.
    pub fn len(&self) -> usize {
        self.opcode.len() + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kick sequence for a half-duplex send of `len` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPlan {
    len: usize,
}

impl SendPlan {
    pub const fn new(len: usize) -> Self {
        Self { len }
    }

    /// Total number of kicks.
    pub const fn chunk_count(&self) -> usize {
        if self.len == 0 {
            0
        } else if self.len <= OPCODE_BYTES {
            1
        } else {
            self.len / SEND_STRIDE + (self.len % SEND_STRIDE != 0) as usize
        }
    }

    /// The `index`-th kick, if any.
    pub fn chunk(&self, index: usize) -> Option<SendChunk> {
        if index >= self.chunk_count() {
            return None;
        }

        let start = index * SEND_STRIDE;
        let end = min(start + SEND_STRIDE, self.len);
        let opcode_end = min(start + OPCODE_BYTES, end);
        Some(SendChunk {
            opcode: start..opcode_end,
            data: opcode_end..end,
        })
    }

    pub fn chunks(&self) -> impl Iterator<Item = SendChunk> + '_ {
        (0..self.chunk_count()).filter_map(move |index| self.chunk(index))
    }
}

/// One kick of a half-duplex receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveChunk {
    /// Whether the command phase carries the real command; later kicks use a
    /// zero-length fake opcode.
    pub with_command: bool,
    /// Destination range in the receive buffer.
    pub rx: Range<usize>,
}

/// Kick sequence for a half-duplex receive of `len` bytes after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivePlan {
    command_len: usize,
    len: usize,
}

impl ReceivePlan {
    pub const fn new(command_len: usize, len: usize) -> Self {
        Self { command_len, len }
    }

    /// Total number of kicks. A bare command still needs one.
    pub const fn chunk_count(&self) -> usize {
        if self.len == 0 {
            (self.command_len != 0) as usize
        } else {
            self.len / RECEIVE_STRIDE + (self.len % RECEIVE_STRIDE != 0) as usize
        }
    }

    pub fn chunk(&self, index: usize) -> Option<ReceiveChunk> {
        if index >= self.chunk_count() {
            return None;
        }

        let start = min(index * RECEIVE_STRIDE, self.len);
        let end = min(start + RECEIVE_STRIDE, self.len);
        Some(ReceiveChunk {
            with_command: index == 0,
            rx: start..end,
        })
    }

    pub fn chunks(&self) -> impl Iterator<Item = ReceiveChunk> + '_ {
        (0..self.chunk_count()).filter_map(move |index| self.chunk(index))
    }
}

/// One kick of a full-duplex transfer.
///
/// The command phase is half-duplex, so the bytes it shifts out are not
/// sampled on MISO; the matching receive bytes are filled with the echoed
/// opcode bytes instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplexChunk {
    /// Send bytes shifted out in the command phase.
    pub opcode: Range<usize>,
    /// Send bytes placed in the four send slots.
    pub tx_data: Range<usize>,
    /// Receive bytes covered by the command phase.
    pub echo: Range<usize>,
    /// Receive bytes decoded from the four receive slots.
    pub rx_data: Range<usize>,
}

/// Kick sequence for a full-duplex transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplexPlan {
    tx_len: usize,
    rx_len: usize,
}

impl DuplexPlan {
    pub const fn new(tx_len: usize, rx_len: usize) -> Self {
        Self { tx_len, rx_len }
    }

    /// `max(ceil(tx / 16), ceil(rx / 16))`.
    pub const fn chunk_count(&self) -> usize {
        let tx = self.tx_len.div_ceil(DUPLEX_WINDOW);
        let rx = self.rx_len.div_ceil(DUPLEX_WINDOW);
        if tx > rx {
            tx
        } else {
            rx
        }
    }

    pub fn chunk(&self, index: usize) -> Option<DuplexChunk> {
        let send = window_len(self.tx_len, index);
        let receive = window_len(self.rx_len, index);
        if send + receive == 0 {
            return None;
        }

        let base = index * DUPLEX_WINDOW;
        let opcode = min(OPCODE_BYTES, send);
        let echo = min(opcode, receive);
        Some(DuplexChunk {
            opcode: base..base + opcode,
            tx_data: base + opcode..base + send,
            echo: base..base + echo,
            rx_data: base + echo..base + receive,
        })
    }

    pub fn chunks(&self) -> impl Iterator<Item = DuplexChunk> + '_ {
        (0..self.chunk_count()).map_while(move |index| self.chunk(index))
    }
}

/// Bytes of a `len`-byte stream that fall into window `index`.
fn window_len(len: usize, index: usize) -> usize {
    let quotient = len / DUPLEX_WINDOW;
    if index < quotient {
        DUPLEX_WINDOW
    } else if index == quotient {
        len % DUPLEX_WINDOW
    } else {
        0
    }
}
