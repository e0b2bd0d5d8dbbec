use hal::gpio::Level;
use hal::spi::BitOrder;

use super::*;
use crate::error::SpiMasterError;
use crate::master::RunningStatus;
use crate::mock::BusyBehavior;
use crate::plan::SendPlan;
use crate::regs::{SPI_MASTER, SPI_OPCODE};

#[test]
fn test_thirty_byte_send() {
    let mut master = master();
    let data = pattern(30);
    master.send(&data).unwrap();

    let kicks = master.registers().kicks();
    assert_eq!(kicks.len(), 2);
    assert_eq!((kicks[0].cmd_bytes(), kicks[0].mosi_bytes()), (4, 24));
    assert_eq!((kicks[1].cmd_bytes(), kicks[1].mosi_bytes()), (2, 0));
    assert!(kicks.iter().all(|kick| kick.more_buf_mode() && !kick.full_duplex()));
    assert!(kicks.iter().all(|kick| !kick.interrupt()));

    assert_eq!(master.registers().mosi_stream(), data);
    assert_eq!(cs_assertions(&master), 1);
}

#[test]
fn test_send_lengths_frame_once() {
    for len in 1..=96 {
        let mut master = master();
        let data = pattern(len);
        master.send(&data).unwrap();

        let regs = master.registers();
        assert_eq!(regs.kicks().len(), SendPlan::new(len).chunk_count(), "len {len}");
        assert_eq!(regs.mosi_stream(), data, "len {len}");
        assert!(regs
            .kicks()
            .iter()
            .all(|kick| kick.cmd_bytes() <= 4 && kick.cmd_bytes() + kick.mosi_bytes() <= 28));
        assert_eq!(cs_assertions(&master), 1, "len {len}");
        assert_eq!(master.chip_select().level(), Level::High);
    }
}

#[test]
fn test_empty_send_rejected() {
    let mut master = master();
    assert_eq!(master.send(&[]), Err(SpiMasterError::InvalidParameter));
    assert_eq!(cs_assertions(&master), 0);
    assert!(master.registers().kicks().is_empty());
}

#[test]
fn test_opcode_word_layout() {
    let mut master = master();
    master.send(&[0x0a, 0x0b, 0x0c]).unwrap();
    assert_eq!(master.registers().kicks()[0].opcode, 0x000a_0b0c);

    let config = MasterConfig::builder().bit_order(BitOrder::LsbFirst).build();
    let mut master = master_with(MockRegisters::new(), config);
    master.send(&[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();

    let kick = &master.registers().kicks()[0];
    assert_eq!(kick.opcode, 0x0403_0201);
    assert_eq!(kick.slots[0], 0x05);
    assert_eq!(master.registers().mosi_stream(), [1, 2, 3, 4, 5]);
}

#[test]
fn test_receive_after_command() {
    let miso = pattern(70);
    let mut regs = MockRegisters::new();
    regs.script_miso(&miso);
    let mut master = master_with(regs, MasterConfig::default());

    let mut out = [0u8; 70];
    master.receive(&[0x0b], &mut out).unwrap();
    assert_eq!(out.as_slice(), miso.as_slice());

    let kicks = master.registers().kicks();
    assert_eq!(kicks.len(), 3);
    assert_eq!((kicks[0].cmd_bytes(), kicks[0].miso_bytes()), (1, 32));
    assert_eq!((kicks[1].cmd_bytes(), kicks[1].miso_bytes()), (0, 32));
    assert_eq!((kicks[2].cmd_bytes(), kicks[2].miso_bytes()), (0, 6));
    assert_eq!(kicks[1].opcode, 0);
    assert_eq!(cs_assertions(&master), 1);
}

#[test]
fn test_receive_lsb_first() {
    let miso = pattern(13);
    let mut regs = MockRegisters::new();
    regs.script_miso(&miso);
    let config = MasterConfig::builder().bit_order(BitOrder::LsbFirst).build();
    let mut master = master_with(regs, config);

    let mut out = [0u8; 13];
    master.receive(&[], &mut out).unwrap();
    assert_eq!(out.as_slice(), miso.as_slice());
}

#[test]
fn test_send_and_receive_echoes_command() {
    let miso = pattern(8);
    let mut regs = MockRegisters::new();
    regs.script_miso(&miso);
    let mut master = master_with(regs, MasterConfig::default());

    let mut out = [0u8; 10];
    master.send_and_receive(&[0x0b, 0x00], &mut out).unwrap();

    assert_eq!(out[..2], [0x0b, 0x00]);
    assert_eq!(out[2..], miso[..]);
    assert_eq!(master.registers().mosi_stream(), [0x0b, 0x00]);
}

#[test]
fn test_bare_command_is_one_kick() {
    let mut master = master();
    let mut out = [0u8; 1];
    master.send_and_receive(&[0x06], &mut out).unwrap();

    let kicks = master.registers().kicks();
    assert_eq!(kicks.len(), 1);
    assert_eq!((kicks[0].cmd_bytes(), kicks[0].miso_bytes()), (1, 0));
    assert_eq!(out, [0x06]);
}

#[test]
fn test_send_and_receive_rejects_bad_lengths() {
    let mut master = master();
    let mut out = [0u8; 8];

    assert_eq!(
        master.send_and_receive(&[1, 2, 3, 4, 5], &mut out),
        Err(SpiMasterError::InvalidParameter)
    );
    assert_eq!(
        master.send_and_receive(&[1, 2, 3], &mut out[..2]),
        Err(SpiMasterError::InvalidParameter)
    );
    assert_eq!(
        master.send_and_receive(&[], &mut out),
        Err(SpiMasterError::InvalidParameter)
    );
    assert_eq!(master.receive(&[], &mut []), Err(SpiMasterError::InvalidParameter));
    assert_eq!(cs_assertions(&master), 0);
}

#[test]
fn test_stuck_busy_times_out() {
    let config = MasterConfig::builder().poll_budget(10).build();
    let regs = MockRegisters::new().with_busy(BusyBehavior::Never);
    let mut master = master_with(regs, config);

    assert_eq!(master.send(&pattern(60)), Err(SpiMasterError::HardwareTimeout));
    assert_eq!(master.registers().kicks().len(), 1);
    assert_eq!(master.registers().peek(SPI_MASTER), config.master_register());
    assert_eq!(master.chip_select().level(), Level::High);
    assert_eq!(master.running_status(), RunningStatus::Idle);
}

#[test]
fn test_slow_busy_within_budget() {
    let config = MasterConfig::builder().poll_budget(10).build();
    let regs = MockRegisters::new().with_busy(BusyBehavior::Polls(5));
    let mut master = master_with(regs, config);

    master.send(&pattern(60)).unwrap();
    assert_eq!(master.registers().kicks().len(), 3);
}

#[test]
fn test_controller_error_aborts_request() {
    let mut regs = MockRegisters::new();
    regs.fail_kick(1);
    let mut master = master_with(regs, MasterConfig::default());

    assert_eq!(master.send(&pattern(60)), Err(SpiMasterError::Unclassified));
    assert_eq!(master.registers().kicks().len(), 2);
    assert_eq!(master.chip_select().level(), Level::High);
    assert_eq!(cs_assertions(&master), 1);

    master.send(&[1, 2]).unwrap();
    assert_eq!(cs_assertions(&master), 2);
    assert_eq!(master.registers().peek(SPI_OPCODE), 0x0102);
}

#[test]
fn test_receive_lengths_frame_once() {
    for len in 0..=96 {
        let miso = pattern(len);
        let mut regs = MockRegisters::new();
        regs.script_miso(&miso);
        let mut master = master_with(regs, MasterConfig::default());

        let mut out = vec![0u8; len];
        master.receive(&[0x0b], &mut out).unwrap();

        assert_eq!(out, miso, "len {len}");
        assert_eq!(cs_assertions(&master), 1, "len {len}");
        assert_eq!(master.chip_select().level(), Level::High, "len {len}");
    }
}

#[test]
fn test_send_and_receive_lengths_frame_once() {
    for len in 0..=96 {
        let mut master = master();
        let mut out = vec![0u8; len];
        let result = master.send_and_receive(&[0x0b], &mut out);

        if len == 0 {
            assert_eq!(result, Err(SpiMasterError::InvalidParameter));
            assert_eq!(cs_assertions(&master), 0);
        } else {
            result.unwrap();
            assert_eq!(out[0], 0x0b);
            assert_eq!(cs_assertions(&master), 1, "len {len}");
        }
        assert_eq!(master.chip_select().level(), Level::High, "len {len}");
    }
}
