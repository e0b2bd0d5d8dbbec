//! Session tests against the simulated controller.

mod full_duplex;
mod half_duplex;
mod session;

use hal::gpio::Level;

use crate::config::MasterConfig;
use crate::master::SpiMaster;
use crate::mock::{MockChipSelect, MockRegisters};

type MockMaster = SpiMaster<MockRegisters, MockChipSelect>;

fn master_with(regs: MockRegisters, config: MasterConfig) -> MockMaster {
    let mut master = SpiMaster::new(regs, MockChipSelect::new());
    master.init(config).unwrap();
    master
}

fn master() -> MockMaster {
    master_with(MockRegisters::new(), MasterConfig::default())
}

/// Active-low assertions since construction.
fn cs_assertions(master: &MockMaster) -> usize {
    master.chip_select().edges_to(Level::Low)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(1)).collect()
}
