use hal::gpio::{Level, PinMode};
use hal::interrupt::InterruptController;
use hal::spi::{BitOrder, SpiConfig, SpiMaster as _, SpiMode};
use hal::HalError;

use super::*;
use crate::config::{ChipSelectPolarity, ChipSelectTiming, DeassertMode, PadMacro, SampleEdge};
use crate::error::SpiMasterError;
use crate::master::RunningStatus;
use crate::mock::MockInterruptController;
use crate::regs::{
    RegisterFile, CFG0_HOLD_SHIFT, CFG1_DEASSERT, CFG1_PAD_MACRO_SHIFT, CFG1_SAMPLE_NEGATIVE,
    SPI_CFG0, SPI_CFG1, SPI_MASTER, SPI_MASTER_IRQ,
};

#[test]
fn test_init_programs_master_and_releases_cs() {
    let config = MasterConfig::builder()
        .clock_frequency(1_000_000)
        .mode(SpiMode::Mode3)
        .build();
    let master = master_with(MockRegisters::new(), config);

    assert_eq!(master.registers().peek(SPI_MASTER), config.master_register());
    assert_eq!(master.chip_select().mode(), PinMode::Output);
    assert_eq!(master.chip_select().level(), Level::High);
    assert_eq!(master.config(), Some(&config));
    assert_eq!(master.running_status(), RunningStatus::Idle);
}

#[test]
fn test_active_high_chip_select() {
    let config = MasterConfig::builder()
        .cs_polarity(ChipSelectPolarity::ActiveHigh)
        .build();
    let mut master = master_with(MockRegisters::new(), config);
    assert_eq!(master.chip_select().level(), Level::Low);

    master.send(&[1, 2, 3]).unwrap();
    assert_eq!(master.chip_select().history(), &[Level::Low, Level::High, Level::Low]);
}

#[test]
fn test_rejects_invalid_config() {
    let mut master = SpiMaster::new(MockRegisters::new(), MockChipSelect::new());
    let config = MasterConfig::builder().clock_frequency(50_000_000).build();

    assert_eq!(master.init(config), Err(SpiMasterError::InvalidParameter));
    assert!(master.config().is_none());
    assert_eq!(master.registers().write_count(), 0);
}

#[test]
fn test_transfer_requires_init() {
    let mut master = SpiMaster::new(MockRegisters::new(), MockChipSelect::new());

    assert_eq!(master.send(&[1, 2]), Err(SpiMasterError::NotInitialized));
    assert!(master.chip_select().history().is_empty());
    assert!(master.registers().kicks().is_empty());
}

#[test]
fn test_deinit_resets_controller() {
    let mut master = master();
    master.deinit(&mut MockInterruptController::new()).unwrap();

    assert!(master.config().is_none());
    assert_eq!(master.registers().read32(SPI_MASTER), 0);
    assert_eq!(master.send(&[1]), Err(SpiMasterError::NotInitialized));
}

#[test]
fn test_free_returns_parts() {
    let mut master = master();
    master.send(&[0xaa; 8]).unwrap();

    let (regs, cs) = master.free();
    assert_eq!(regs.kicks().len(), 1);
    assert_eq!(cs.level(), Level::High);
}

#[test]
fn test_hal_configure_keeps_session_settings() {
    let config = MasterConfig::builder()
        .cs_polarity(ChipSelectPolarity::ActiveHigh)
        .poll_budget(99)
        .build();
    let mut master = master_with(MockRegisters::new(), config);

    let hal_config = SpiConfig {
        frequency: 2_000_000,
        mode: SpiMode::Mode1,
        bit_order: BitOrder::LsbFirst,
    };
    master.configure(&hal_config).unwrap();

    let active = master.config().copied().unwrap();
    assert_eq!(active.clock_frequency, 2_000_000);
    assert_eq!(active.mode, SpiMode::Mode1);
    assert_eq!(active.bit_order, BitOrder::LsbFirst);
    assert_eq!(active.cs_polarity, ChipSelectPolarity::ActiveHigh);
    assert_eq!(active.poll_budget, 99);
}

#[test]
fn test_hal_configure_rejects_out_of_range_clock() {
    let mut master = SpiMaster::new(MockRegisters::new(), MockChipSelect::new());
    let hal_config = SpiConfig {
        frequency: 1_000,
        ..SpiConfig::default()
    };

    assert_eq!(master.configure(&hal_config), Err(HalError::InvalidParameter));
}

#[test]
fn test_hal_write_and_read() {
    let mut regs = MockRegisters::new();
    regs.script_miso(&[9, 8, 7]);
    let mut master = master_with(regs, MasterConfig::default());

    master.write(&[1, 2, 3, 4, 5]).unwrap();
    let mut buffer = [0u8; 3];
    master.read(&mut buffer).unwrap();

    assert_eq!(buffer, [9, 8, 7]);
    assert_eq!(master.registers().mosi_stream(), [1, 2, 3, 4, 5]);
    assert_eq!(cs_assertions(&master), 2);
}

#[test]
fn test_init_programs_timing_and_pads() {
    let timing = ChipSelectTiming {
        setup_count: 3,
        hold_count: 0x7fff,
        idle_count: 255,
    };
    let config = MasterConfig::builder()
        .cs_timing(timing)
        .get_tick_delay(2)
        .sample_edge(SampleEdge::Negative)
        .deassert(DeassertMode::Enabled)
        .pad_macro(PadMacro::GroupC)
        .build();
    let master = master_with(MockRegisters::new(), config);

    assert_eq!(
        master.registers().peek(SPI_CFG0),
        3 | (0x7fff << CFG0_HOLD_SHIFT)
    );
    let cfg1 = master.registers().peek(SPI_CFG1);
    assert_eq!(cfg1 & 0xff, 255);
    assert_eq!((cfg1 >> 8) & 0x7, 2);
    assert_ne!(cfg1 & CFG1_SAMPLE_NEGATIVE, 0);
    assert_ne!(cfg1 & CFG1_DEASSERT, 0);
    assert_eq!((cfg1 >> CFG1_PAD_MACRO_SHIFT) & 0x3, 2);
}

#[test]
fn test_session_setters_reprogram_controller() {
    let mut master = master();
    assert_eq!(master.registers().peek(SPI_CFG1), 0);

    master
        .set_chip_select_timing(ChipSelectTiming {
            setup_count: 10,
            hold_count: 20,
            idle_count: 5,
        })
        .unwrap();
    master.set_deassert(DeassertMode::Enabled).unwrap();
    master.set_pad_macro(PadMacro::GroupB).unwrap();

    let config = master.config().copied().unwrap();
    assert_eq!(config.cs_timing.hold_count, 20);
    assert_eq!(config.deassert, DeassertMode::Enabled);
    assert_eq!(config.pad_macro, PadMacro::GroupB);
    assert_eq!(master.registers().peek(SPI_CFG0), 10 | (20 << CFG0_HOLD_SHIFT));
    assert_eq!(
        master.registers().peek(SPI_CFG1),
        5 | CFG1_DEASSERT | (1 << CFG1_PAD_MACRO_SHIFT)
    );
}

#[test]
fn test_setters_validate_and_require_init() {
    let too_long = ChipSelectTiming {
        setup_count: 0x8000,
        ..ChipSelectTiming::default()
    };
    let mut master = master();
    assert_eq!(
        master.set_chip_select_timing(too_long),
        Err(SpiMasterError::InvalidParameter)
    );
    assert_eq!(master.registers().peek(SPI_CFG0), 0);

    let mut bare = SpiMaster::new(MockRegisters::new(), MockChipSelect::new());
    assert_eq!(
        bare.set_deassert(DeassertMode::Enabled),
        Err(SpiMasterError::NotInitialized)
    );
    assert_eq!(
        bare.set_pad_macro(PadMacro::GroupB),
        Err(SpiMasterError::NotInitialized)
    );
}

#[test]
fn test_deinit_masks_callback_irq() {
    let mut master = master();
    let mut intc = MockInterruptController::new();
    master.register_callback(|_| {}, &mut intc).unwrap();
    assert!(intc.is_enabled(SPI_MASTER_IRQ));

    master.deinit(&mut intc).unwrap();
    assert!(!intc.is_enabled(SPI_MASTER_IRQ));
    assert_eq!(master.registers().peek(SPI_CFG1), 0);
}
