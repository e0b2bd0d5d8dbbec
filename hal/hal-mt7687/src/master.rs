//! SPI master session.
//!
//! A [`SpiMaster`] owns the register block and the chip-select GPIO of one
//! controller. Every public transfer is one logical request: the busy flag is
//! taken, chip select is asserted once, the request is split into kicks by
//! the planner and pushed through the engine, and chip select is released
//! once at the end, on success and on failure alike.
//!
//! Polling requests run to completion in the caller. Asynchronous requests
//! return after the first kick; the platform forwards the SPI interrupt to
//! [`SpiMaster::on_interrupt`], which drives the remaining kicks and finally
//! hands the buffer back through the registered callback.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicBool, Ordering};

use hal::gpio::{GpioPin, Level, PinMode};
use hal::interrupt::InterruptController;
use hal::spi::{SpiConfig, SpiMaster as HalSpiMaster};
use hal::HalResult;
use heapless::Vec;
use log::{debug, warn};

use crate::completion::{CompletionCounter, Progress};
use crate::config::{ChipSelectTiming, DeassertMode, MasterConfig, PadMacro};
use crate::engine::{Completion, Duplex, Engine};
use crate::error::{Result, SpiMasterError};
use crate::plan::{DuplexPlan, ReceivePlan, SendPlan, OPCODE_BYTES};
use crate::regs::{
    RegisterFile, SPI_CFG0, SPI_CFG1, SPI_MASTER, SPI_MASTER_IRQ, SPI_STATUS, STATUS_DONE,
    STATUS_ERROR,
};

/// What finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiEvent {
    /// An asynchronous send completed.
    SendFinished,
    /// An asynchronous send-and-receive completed; the buffer holds the data.
    ReceiveFinished,
    /// The request was aborted; chip select has been released.
    Failed(SpiMasterError),
}

/// Delivered to the callback once per asynchronous request.
#[derive(Debug)]
pub struct SpiCompletion {
    pub event: SpiEvent,
    /// The buffer handed to `send_async` / `send_and_receive_async`.
    pub buffer: Box<[u8]>,
}

/// Completion callback, invoked from interrupt context.
pub type SpiCallback = Box<dyn FnMut(SpiCompletion) + Send + Sync>;

/// Whether the controller is running a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningStatus {
    Busy,
    Idle,
}

enum AsyncRequest {
    Send {
        data: Box<[u8]>,
        plan: SendPlan,
    },
    /// `buffer[..command.len()]` gets a copy of the command.
    Receive {
        command: Vec<u8, OPCODE_BYTES>,
        buffer: Box<[u8]>,
        plan: ReceivePlan,
    },
}

impl AsyncRequest {
    fn chunk_count(&self) -> usize {
        match self {
            AsyncRequest::Send { plan, .. } => plan.chunk_count(),
            AsyncRequest::Receive { plan, .. } => plan.chunk_count(),
        }
    }

    fn into_buffer(self) -> Box<[u8]> {
        match self {
            AsyncRequest::Send { data, .. } => data,
            AsyncRequest::Receive { buffer, .. } => buffer,
        }
    }
}

struct InFlight {
    request: AsyncRequest,
    index: usize,
}

/// One SPI master controller and its chip-select line.
pub struct SpiMaster<R: RegisterFile, CS: GpioPin> {
    regs: R,
    cs: CS,
    config: Option<MasterConfig>,
    busy: AtomicBool,
    completion: CompletionCounter,
    callback: Option<SpiCallback>,
    in_flight: Option<InFlight>,
}

impl<R: RegisterFile, CS: GpioPin> SpiMaster<R, CS> {
    /// Wraps a register block and a chip-select pin. Call [`init`](Self::init)
    /// before any transfer.
    pub fn new(regs: R, cs: CS) -> Self {
        Self {
            regs,
            cs,
            config: None,
            busy: AtomicBool::new(false),
            completion: CompletionCounter::new(),
            callback: None,
            in_flight: None,
        }
    }

    /// Validates and applies `config`, leaving chip select deasserted.
    pub fn init(&mut self, config: MasterConfig) -> Result<()> {
        config.validate()?;
        self.acquire()?;

        let result = self.apply(&config);
        if result.is_ok() {
            debug!(
                "spi master init: {} Hz, divisor {}, {:?}",
                config.clock_frequency,
                config.clock_divisor(),
                config.bit_order
            );
            self.config = Some(config);
        }
        self.release();
        result
    }

    fn apply(&mut self, config: &MasterConfig) -> Result<()> {
        self.regs.write32(SPI_MASTER, config.master_register());
        self.regs.write32(SPI_CFG0, config.cfg0_register());
        self.regs.write32(SPI_CFG1, config.cfg1_register());
        self.regs.write32(SPI_STATUS, STATUS_DONE | STATUS_ERROR);
        self.cs.set_mode(PinMode::Output).map_err(gpio_error)?;
        self.cs
            .write(config.cs_polarity.deasserted())
            .map_err(gpio_error)
    }

    /// Returns the controller to reset state, masks the SPI interrupt if a
    /// callback had unmasked it, and forgets the configuration and callback.
    pub fn deinit<I>(&mut self, intc: &mut I) -> Result<()>
    where
        I: InterruptController + ?Sized,
    {
        self.acquire()?;
        self.regs.write32(SPI_MASTER, 0);
        self.regs.write32(SPI_CFG0, 0);
        self.regs.write32(SPI_CFG1, 0);
        self.regs.write32(SPI_STATUS, STATUS_DONE | STATUS_ERROR);
        self.config = None;

        let masked = match self.callback.take() {
            Some(_) => intc
                .disable(SPI_MASTER_IRQ)
                .and_then(|()| intc.clear_pending(SPI_MASTER_IRQ))
                .map_err(|_| SpiMasterError::Unclassified),
            None => Ok(()),
        };
        self.release();
        masked
    }

    /// Replaces the chip-select setup, hold and idle counts.
    pub fn set_chip_select_timing(&mut self, timing: ChipSelectTiming) -> Result<()> {
        timing.validate()?;
        let config = MasterConfig {
            cs_timing: timing,
            ..self.active_config()?
        };
        self.init(config)
    }

    /// Enables or disables per-byte deassertion of the hardware slave select.
    pub fn set_deassert(&mut self, mode: DeassertMode) -> Result<()> {
        let config = MasterConfig {
            deassert: mode,
            ..self.active_config()?
        };
        self.init(config)
    }

    /// Routes the SPI master signals through another pad group.
    pub fn set_pad_macro(&mut self, group: PadMacro) -> Result<()> {
        let config = MasterConfig {
            pad_macro: group,
            ..self.active_config()?
        };
        self.init(config)
    }

    /// Active configuration, if initialized.
    pub fn config(&self) -> Option<&MasterConfig> {
        self.config.as_ref()
    }

    pub fn running_status(&self) -> RunningStatus {
        if self.busy.load(Ordering::Acquire) {
            RunningStatus::Busy
        } else {
            RunningStatus::Idle
        }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn chip_select(&self) -> &CS {
        &self.cs
    }

    /// Gives back the register block and the chip-select pin.
    pub fn free(self) -> (R, CS) {
        (self.regs, self.cs)
    }

    /// Installs the completion callback and unmasks the SPI interrupt.
    pub fn register_callback<I, F>(&mut self, callback: F, intc: &mut I) -> Result<()>
    where
        I: InterruptController + ?Sized,
        F: FnMut(SpiCompletion) + Send + Sync + 'static,
    {
        if self.running_status() == RunningStatus::Busy {
            return Err(SpiMasterError::Busy);
        }
        self.callback = Some(Box::new(callback));
        intc.enable(SPI_MASTER_IRQ)
            .map_err(|_| SpiMasterError::Unclassified)
    }

    /// Sends `data`, blocking until the last kick is done.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(SpiMasterError::InvalidParameter);
        }

        let plan = SendPlan::new(data.len());
        debug!("spi send: {} bytes in {} kicks", data.len(), plan.chunk_count());
        self.run_polling(|engine, budget| {
            for chunk in plan.chunks() {
                engine.load_send(data, &chunk)?;
                engine.kick(Duplex::Half, Completion::Polling);
                engine.wait_idle(budget)?;
            }
            Ok(())
        })
    }

    /// Sends `command` (0–4 bytes), then clocks in `out.len()` bytes.
    pub fn receive(&mut self, command: &[u8], out: &mut [u8]) -> Result<()> {
        if command.len() > OPCODE_BYTES || (command.is_empty() && out.is_empty()) {
            return Err(SpiMasterError::InvalidParameter);
        }

        let plan = ReceivePlan::new(command.len(), out.len());
        debug!(
            "spi receive: {} command bytes, {} bytes in {} kicks",
            command.len(),
            out.len(),
            plan.chunk_count()
        );
        self.run_polling(|engine, budget| {
            for chunk in plan.chunks() {
                engine.load_receive(command, &chunk)?;
                engine.kick(Duplex::Half, Completion::Polling);
                engine.wait_idle(budget)?;
                engine.read_receive(&mut out[chunk.rx.clone()])?;
            }
            Ok(())
        })
    }

    /// Half-duplex send-then-receive.
    ///
    /// `out` covers the whole exchange. MISO is not sampled during the
    /// command phase, so the first `command.len()` bytes are a copy of the
    /// command that was sent; the rest are the bytes clocked in after it.
    pub fn send_and_receive(&mut self, command: &[u8], out: &mut [u8]) -> Result<()> {
        if command.is_empty() || command.len() > OPCODE_BYTES || out.len() < command.len() {
            return Err(SpiMasterError::InvalidParameter);
        }

        let (echo, data) = out.split_at_mut(command.len());
        self.receive(command, data)?;
        echo.copy_from_slice(command);
        Ok(())
    }

    /// Full-duplex exchange of `tx` and `rx`.
    ///
    /// Every 16-byte window starts with a half-duplex command phase whose MISO
    /// is not sampled, so the first bytes of each receive window are copies
    /// of the opcode bytes sent in that window, not data from the slave.
    pub fn send_and_receive_full_duplex(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.is_empty() && rx.is_empty() {
            return Err(SpiMasterError::InvalidParameter);
        }

        let plan = DuplexPlan::new(tx.len(), rx.len());
        debug!(
            "spi full duplex: tx {} rx {} in {} kicks",
            tx.len(),
            rx.len(),
            plan.chunk_count()
        );
        self.run_polling(|engine, budget| {
            for chunk in plan.chunks() {
                engine.load_duplex(tx, &chunk)?;
                engine.kick(Duplex::Full, Completion::Polling);
                engine.wait_idle(budget)?;

                let echo_src = chunk.opcode.start..chunk.opcode.start + chunk.echo.len();
                rx[chunk.echo.clone()].copy_from_slice(&tx[echo_src]);
                engine.read_duplex(&mut rx[chunk.rx_data.clone()])?;
            }
            Ok(())
        })
    }

    /// Starts sending `data` and returns after the first kick.
    ///
    /// Requires a registered callback. On rejection the buffer is dropped.
    pub fn send_async(&mut self, data: Box<[u8]>) -> Result<()> {
        if data.is_empty() || self.callback.is_none() {
            return Err(SpiMasterError::InvalidParameter);
        }

        let plan = SendPlan::new(data.len());
        self.start_async(AsyncRequest::Send { data, plan })
    }

    /// Starts a half-duplex send-then-receive over `buffer`, laid out as for
    /// [`send_and_receive`](Self::send_and_receive).
    pub fn send_and_receive_async(&mut self, command: &[u8], buffer: Box<[u8]>) -> Result<()> {
        if command.is_empty() || buffer.len() < command.len() || self.callback.is_none() {
            return Err(SpiMasterError::InvalidParameter);
        }
        let command: Vec<u8, OPCODE_BYTES> =
            Vec::from_slice(command).map_err(|_| SpiMasterError::InvalidParameter)?;

        let plan = ReceivePlan::new(command.len(), buffer.len() - command.len());
        self.start_async(AsyncRequest::Receive {
            command,
            buffer,
            plan,
        })
    }

    /// SPI interrupt entry point.
    ///
    /// Acknowledges the finished kick, then either starts the next one or
    /// completes the request: chip select is deasserted here and only here
    /// on the asynchronous path.
    pub fn on_interrupt(&mut self) {
        let Some(config) = self.config else {
            return;
        };

        let mut engine = Engine::new(&mut self.regs, config.bit_order, config.master_register());
        let acked = engine.acknowledge();

        let Some(flight) = self.in_flight.as_mut() else {
            debug!("spi: spurious interrupt");
            return;
        };

        let collected = acked.and_then(|()| match &mut flight.request {
            AsyncRequest::Send { .. } => Ok(()),
            AsyncRequest::Receive {
                command,
                buffer,
                plan,
            } => {
                let chunk = plan
                    .chunk(flight.index)
                    .ok_or(SpiMasterError::InvalidParameter)?;
                let offset = command.len();
                let dest = &mut buffer[offset + chunk.rx.start..offset + chunk.rx.end];
                engine.read_receive(dest)
            }
        });

        if let Err(err) = collected {
            self.complete(&config, Err(err));
            return;
        }

        match self.completion.complete_kick() {
            Progress::Finished => self.complete(&config, Ok(())),
            Progress::Pending(next) => {
                flight.index = next;
                if let Err(err) = self.kick_in_flight(&config) {
                    self.complete(&config, Err(err));
                }
            }
        }
    }

    fn start_async(&mut self, request: AsyncRequest) -> Result<()> {
        let config = self.active_config()?;
        self.acquire()?;

        if let Err(err) = self.assert_cs(&config) {
            self.release();
            return Err(err);
        }

        let total = request.chunk_count();
        debug!("spi async request: {} kicks", total);
        self.completion.begin(total as u32);
        self.in_flight = Some(InFlight { request, index: 0 });

        if let Err(err) = self.kick_in_flight(&config) {
            self.completion.reset();
            self.in_flight = None;
            if let Err(cs_err) = self.deassert_cs(&config) {
                warn!("spi chip select release failed: {}", cs_err);
            }
            self.release();
            return Err(err);
        }
        Ok(())
    }

    fn kick_in_flight(&mut self, config: &MasterConfig) -> Result<()> {
        let Self {
            regs, in_flight, ..
        } = self;
        let Some(flight) = in_flight.as_ref() else {
            return Ok(());
        };

        let mut engine = Engine::new(regs, config.bit_order, config.master_register());
        match &flight.request {
            AsyncRequest::Send { data, plan } => {
                let chunk = plan
                    .chunk(flight.index)
                    .ok_or(SpiMasterError::InvalidParameter)?;
                engine.load_send(data, &chunk)?;
            }
            AsyncRequest::Receive { command, plan, .. } => {
                let chunk = plan
                    .chunk(flight.index)
                    .ok_or(SpiMasterError::InvalidParameter)?;
                engine.load_receive(command, &chunk)?;
            }
        }
        engine.kick(Duplex::Half, Completion::Interrupt);
        Ok(())
    }

    fn complete(&mut self, config: &MasterConfig, result: Result<()>) {
        self.completion.reset();
        let flight = self.in_flight.take();
        let released = self.deassert_cs(config);
        self.release();

        let Some(flight) = flight else {
            return;
        };
        let result = result.and(released);
        if result.is_ok() {
            debug!("spi async request done");
        }
        let completion = match (flight.request, result) {
            (AsyncRequest::Send { data, .. }, Ok(())) => SpiCompletion {
                event: SpiEvent::SendFinished,
                buffer: data,
            },
            (
                AsyncRequest::Receive {
                    command,
                    mut buffer,
                    ..
                },
                Ok(()),
            ) => {
                buffer[..command.len()].copy_from_slice(&command);
                SpiCompletion {
                    event: SpiEvent::ReceiveFinished,
                    buffer,
                }
            }
            (request, Err(err)) => {
                warn!("spi async request failed: {}", err);
                SpiCompletion {
                    event: SpiEvent::Failed(err),
                    buffer: request.into_buffer(),
                }
            }
        };

        if let Some(callback) = self.callback.as_mut() {
            callback(completion);
        }
    }

    /// Runs one blocking request between a single CS assert/deassert pair.
    fn run_polling<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut Engine<'_, R>, u32) -> Result<()>,
    {
        let config = self.active_config()?;
        self.acquire()?;

        let result = self.assert_cs(&config).and_then(|()| {
            let mut engine =
                Engine::new(&mut self.regs, config.bit_order, config.master_register());
            body(&mut engine, config.poll_budget)
        });
        let released = self.deassert_cs(&config);
        self.release();

        match result {
            Ok(()) => debug!("spi request done"),
            Err(err) => warn!("spi request failed: {}", err),
        }
        result.and(released)
    }

    fn active_config(&self) -> Result<MasterConfig> {
        self.config.ok_or(SpiMasterError::NotInitialized)
    }

    /// Test-and-set of the busy flag with interrupts masked.
    fn acquire(&self) -> Result<()> {
        critical_section::with(|_| {
            if self.busy.load(Ordering::Acquire) {
                Err(SpiMasterError::Busy)
            } else {
                self.busy.store(true, Ordering::Release);
                Ok(())
            }
        })
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    fn assert_cs(&mut self, config: &MasterConfig) -> Result<()> {
        self.drive_cs(config.cs_polarity.asserted())
    }

    fn deassert_cs(&mut self, config: &MasterConfig) -> Result<()> {
        self.drive_cs(config.cs_polarity.deasserted())
    }

    fn drive_cs(&mut self, level: Level) -> Result<()> {
        self.cs.write(level).map_err(gpio_error)
    }
}

fn gpio_error(_: hal::HalError) -> SpiMasterError {
    SpiMasterError::Unclassified
}

impl<R: RegisterFile, CS: GpioPin> HalSpiMaster for SpiMaster<R, CS> {
    fn configure(&mut self, config: &SpiConfig) -> HalResult<()> {
        let next = match self.config {
            Some(current) => MasterConfig {
                clock_frequency: config.frequency,
                bit_order: config.bit_order,
                mode: config.mode,
                ..current
            },
            None => MasterConfig::from(config),
        };
        Ok(self.init(next)?)
    }

    fn transfer(&mut self, tx_data: &[u8], rx_buffer: &mut [u8]) -> HalResult<()> {
        if tx_data.len() != rx_buffer.len() {
            return Err(SpiMasterError::InvalidParameter.into());
        }
        Ok(self.send_and_receive_full_duplex(tx_data, rx_buffer)?)
    }

    fn write(&mut self, data: &[u8]) -> HalResult<()> {
        Ok(self.send(data)?)
    }

    fn read(&mut self, buffer: &mut [u8]) -> HalResult<()> {
        Ok(self.receive(&[], buffer)?)
    }
}
