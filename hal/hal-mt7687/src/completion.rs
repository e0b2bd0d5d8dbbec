//! Completion bookkeeping for interrupt-driven requests.
//!
//! One logical request may span many kicks. The counter is only advanced from
//! the SPI completion interrupt (single writer); the thread that starts a
//! request arms it before the first kick, while the interrupt is quiet.

use core::sync::atomic::{AtomicU32, Ordering};

/// Outcome of recording one finished kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More kicks remain; carries the index of the next one.
    Pending(usize),
    /// That was the last kick of the request.
    Finished,
}

/// Counts finished kicks of the in-flight asynchronous request.
#[derive(Debug, Default)]
pub struct CompletionCounter {
    completed: AtomicU32,
    total: AtomicU32,
}

impl CompletionCounter {
    pub const fn new() -> Self {
        Self {
            completed: AtomicU32::new(0),
            total: AtomicU32::new(0),
        }
    }

    /// Arms the counter for a request of `total` kicks.
    pub fn begin(&self, total: u32) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Release);
    }

    /// Records one finished kick. Only the completion interrupt calls this.
    pub fn complete_kick(&self) -> Progress {
        let total = self.total.load(Ordering::Acquire);
        let completed = self.completed.load(Ordering::Relaxed) + 1;

        if completed >= total {
            self.reset();
            Progress::Finished
        } else {
            self.completed.store(completed, Ordering::Relaxed);
            Progress::Pending(completed as usize)
        }
    }

    /// Drops any in-flight state.
    pub fn reset(&self) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Release);
    }

    /// Whether a request is armed.
    pub fn in_flight(&self) -> bool {
        self.total.load(Ordering::Acquire) != 0
    }

    /// Kicks finished so far for the armed request.
    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Kicks the armed request needs.
    pub fn total(&self) -> u32 {
        self.total.load(Ordering::Acquire)
    }
}
