use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::cpu::{IrqLatch, RegisterState};
use crate::error::Error;
use crate::machine::Machine;
use crate::memory::FlatMemory;
use crate::pic::PIC;
use crate::pit::PIT;

#[cfg(test)]
#[path = "./snapshot_test.rs"]
mod snapshot_test;

/// Machine state at an instruction boundary. Prefix state is always idle
/// there and is not stored.
#[derive(Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub regs: RegisterState,
    pub instruction_count: usize,
    pub halted: bool,
    pub latch: IrqLatch,
    pub pic: PIC,
    /// timer state, so its output agrees with the edges the PIC has seen
    pub pit: Option<PIT>,
    pub memory: FlatMemory,
}

impl Snapshot {
    pub fn capture(machine: &Machine) -> Self {
        Snapshot {
            regs: machine.cpu.regs.clone(),
            instruction_count: machine.cpu.instruction_count,
            halted: machine.cpu.halted,
            latch: machine.cpu.latch,
            pic: machine.board.pic.clone(),
            pit: machine.board.pit().cloned(),
            memory: machine.board.memory.clone(),
        }
    }

    pub fn restore(self, machine: &mut Machine) {
        machine.cpu.regs = self.regs;
        machine.cpu.instruction_count = self.instruction_count;
        machine.cpu.halted = self.halted;
        machine.cpu.latch = self.latch;
        machine.cpu.fatal_error = false;
        machine.cpu.prefixes.reset();
        machine.board.pic = self.pic;
        machine.board.memory = self.memory;
        match (self.pit, machine.board.pit_mut()) {
            (Some(pit), Some(live)) => *live = pit,
            (None, None) => {}
            _ => warn!("snapshot and machine disagree on the PIT, timer state not restored"),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}
