use hal::spi::SpiMaster as _;
use hal::HalError;

use super::*;
use crate::error::SpiMasterError;
use crate::plan::DuplexPlan;

#[test]
fn test_window_split_with_echo() {
    let tx = pattern(20);
    let miso = [0xc0, 0xc1, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xcb];
    let mut regs = MockRegisters::new();
    regs.script_miso(&miso);
    let mut master = master_with(regs, MasterConfig::default());

    let mut rx = [0u8; 16];
    master.send_and_receive_full_duplex(&tx, &mut rx).unwrap();

    let kicks = master.registers().kicks();
    assert_eq!(kicks.len(), 2);
    assert!(kicks.iter().all(|kick| kick.full_duplex()));
    assert_eq!(
        (kicks[0].cmd_bytes(), kicks[0].mosi_bytes(), kicks[0].miso_bytes()),
        (4, 12, 12)
    );
    assert_eq!(
        (kicks[1].cmd_bytes(), kicks[1].mosi_bytes(), kicks[1].miso_bytes()),
        (4, 0, 0)
    );

    assert_eq!(rx[..4], tx[..4]);
    assert_eq!(rx[4..], miso);
    assert_eq!(master.registers().mosi_stream(), tx);
    assert_eq!(cs_assertions(&master), 1);
}

#[test]
fn test_receive_longer_than_send() {
    let mut master = master();
    let mut rx = [0u8; 40];
    master
        .send_and_receive_full_duplex(&[1, 2, 3, 4], &mut rx)
        .unwrap();

    let kicks = master.registers().kicks();
    assert_eq!(kicks.len(), 3);
    assert_eq!((kicks[1].cmd_bytes(), kicks[1].miso_bytes()), (0, 16));
    assert_eq!((kicks[2].cmd_bytes(), kicks[2].miso_bytes()), (0, 8));
    assert_eq!(rx[..4], [1, 2, 3, 4]);
}

#[test]
fn test_kick_count_and_coverage() {
    for tx_len in (0..=40).step_by(3) {
        for rx_len in (0..=40).step_by(5) {
            if tx_len == 0 && rx_len == 0 {
                continue;
            }
            let mut master = master();
            let tx = pattern(tx_len);
            let mut rx = vec![0u8; rx_len];
            master.send_and_receive_full_duplex(&tx, &mut rx).unwrap();

            let expected = tx_len.div_ceil(16).max(rx_len.div_ceil(16));
            let regs = master.registers();
            assert_eq!(regs.kicks().len(), expected, "tx {tx_len} rx {rx_len}");
            assert_eq!(regs.mosi_stream(), tx, "tx {tx_len} rx {rx_len}");

            let echoed: usize = DuplexPlan::new(tx_len, rx_len)
                .chunks()
                .map(|chunk| chunk.echo.len())
                .sum();
            let sampled: usize = regs.kicks().iter().map(|kick| kick.miso_bytes()).sum();
            assert_eq!(echoed + sampled, rx_len, "tx {tx_len} rx {rx_len}");
            assert_eq!(cs_assertions(&master), 1);
        }
    }
}

#[test]
fn test_empty_exchange_rejected() {
    let mut master = master();
    assert_eq!(
        master.send_and_receive_full_duplex(&[], &mut []),
        Err(SpiMasterError::InvalidParameter)
    );
}

#[test]
fn test_hal_transfer_requires_equal_lengths() {
    let mut master = master();
    let mut rx = [0u8; 3];

    assert_eq!(master.transfer(&[1, 2], &mut rx), Err(HalError::InvalidParameter));
    assert!(master.registers().kicks().is_empty());

    master.transfer(&[1, 2, 3], &mut rx).unwrap();
    assert_eq!(rx, [1, 2, 3]);
}
