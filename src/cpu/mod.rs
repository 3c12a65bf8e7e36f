// these modules are re-exported as a single module

pub use self::alu::*;
pub mod alu;

pub use self::flag::*;
mod flag;

pub use self::irq_latch::*;
mod irq_latch;

pub use self::modrm::*;
mod modrm;

pub use self::prefix::*;
pub mod prefix;

pub use self::register::*;
mod register;

pub use self::segment::*;
mod segment;

pub use self::table::*;
mod table;

mod control;
mod ops;
mod string;

use crate::error::Error;
use crate::machine::Bus;
use crate::memory::MemoryAddress;

#[cfg(test)]
#[path = "./cpu_test.rs"]
mod cpu_test;

/// prints diagnostics of stack usage (push / pop)
const DEBUG_STACK: bool = false;

/// logs every hardware interrupt delivered to the CPU
const DEBUG_INTERRUPTS: bool = false;

pub struct CPU {
    /// number of completed step iterations
    pub instruction_count: usize,

    /// general purpose registers, segment registers, ip
    pub regs: RegisterState,

    pub prefixes: Prefixes,

    /// sampled state of the interrupt request line
    pub latch: IrqLatch,

    /// set by HLT, cleared by a delivered hardware interrupt
    pub halted: bool,

    /// signals a decode fault stopped execution
    pub fatal_error: bool,

    /// vector divide errors through INT 0, else only log them
    pub divide_error_interrupt: bool,

    /// IP of the first byte (including prefixes) of the current instruction
    instruction_start: u16,

    tables: Box<OpcodeTables>,
}

impl Default for CPU {
    fn default() -> Self {
        CPU {
            instruction_count: 0,
            regs: RegisterState::default(),
            prefixes: Prefixes::default(),
            latch: IrqLatch::default(),
            halted: false,
            fatal_error: false,
            divide_error_interrupt: true,
            instruction_start: 0,
            tables: Box::new(OpcodeTables::new()),
        }
    }
}

impl CPU {
    pub fn get_r8(&self, r: R) -> u8 {
        self.regs.get_r8(r)
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        self.regs.set_r8(r, val);
    }

    pub fn get_r16(&self, r: R) -> u16 {
        self.regs.get_r16(r)
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        self.regs.set_r16(r, val);
    }

    pub fn get_r32(&self, r: R) -> u32 {
        self.regs.get_r32(r)
    }

    pub fn set_r32(&mut self, r: R, val: u32) {
        self.regs.set_r32(r, val);
    }

    /// reads a register by case-insensitive name, None if unknown
    pub fn get_register(&self, name: &str) -> Option<u32> {
        self.regs.get_by_name(name)
    }

    /// writes a register by case-insensitive name, None if unknown
    pub fn set_register(&mut self, name: &str, val: u32) -> Option<()> {
        self.regs.set_by_name(name, val)
    }

    pub fn register_by_name(&mut self, name: &str) -> Option<&mut Register16> {
        self.regs.register_mut(name)
    }

    pub fn get_flag(&self, letter: char) -> Option<bool> {
        self.regs.flags.get_by_letter(letter)
    }

    pub fn set_flag(&mut self, letter: char, val: bool) -> Option<()> {
        self.regs.flags.set_by_letter(letter, val)
    }

    /// returns the address of CS:IP as a MemoryAddress::RealSegmentOffset
    pub fn get_memory_address(&self) -> MemoryAddress {
        MemoryAddress::RealSegmentOffset(self.get_r16(R::CS), self.regs.ip.val)
    }

    /// returns the absolute address of CS:IP
    pub fn get_address(&self) -> u32 {
        self.get_memory_address().value()
    }

    /// the opcode table entry for a single-byte opcode
    pub fn opcode_entry(&self, op: u8) -> OpcodeEntry {
        self.tables.single[op as usize]
    }

    /// operand width of word-sized opcodes under the current prefixes
    pub fn word_width(&self) -> Width {
        match self.prefixes.operand_size() {
            OperandSize::_16bit => Width::Word,
            OperandSize::_32bit => Width::Dword,
        }
    }

    /// bit 0 of most opcodes selects byte or word operation
    pub fn width_of(&self, op: u8) -> Width {
        if op & 1 == 0 {
            Width::Byte
        } else {
            self.word_width()
        }
    }

    /// Runs one iteration of the fetch/dispatch loop: interrupt check,
    /// one complete instruction including its prefixes, then one clock pulse.
    pub fn step(&mut self, bus: &mut dyn Bus) -> Result<(), Error> {
        if bus.hold_requested() {
            bus.hold_acknowledge();
            bus.clock_pulse();
            return Ok(());
        }

        let res = self.execute(bus);
        self.latch.instruction_retired();
        self.instruction_count += 1;
        bus.clock_pulse();

        match res {
            Ok(()) => Ok(()),
            Err(e) => self.fault(bus, e),
        }
    }

    fn execute(&mut self, bus: &mut dyn Bus) -> Result<(), Error> {
        self.service_interrupt(bus)?;
        if self.halted {
            return Ok(());
        }
        if !self.prefixes.in_rep() {
            self.prefixes.reset();
        }
        self.instruction_start = self.regs.ip.val;
        let trap = self.regs.flags.trap;

        let mut op = self.fetch_u8(bus)?;
        while self.dispatch(bus, op)? == EntryKind::Prefix {
            op = self.fetch_u8(bus)?;
        }

        if trap {
            self.interrupt(bus, 1)?;
        }
        Ok(())
    }

    /// samples the interrupt request line and delivers a latched request
    fn service_interrupt(&mut self, bus: &mut dyn Bus) -> Result<(), Error> {
        if !self.latch.sample(bus.interrupt_pending()) {
            return Ok(());
        }
        if !self.regs.flags.interrupt {
            return Ok(());
        }
        let vector = bus.interrupt_acknowledge();
        if DEBUG_INTERRUPTS {
            debug!("[{}] delivering hardware interrupt {:02X}", self.get_memory_address(), vector);
        }
        self.latch.delivered();
        self.halted = false;
        self.prefixes.reset();
        self.interrupt(bus, vector)
    }

    fn fault(&mut self, bus: &mut dyn Bus, err: Error) -> Result<(), Error> {
        if err.is_fatal() {
            self.fatal_error = true;
            error!("[{:04X}:{:04X}] {} (instruction {})",
                self.get_r16(R::CS), self.instruction_start, err, self.instruction_count);
            return Err(err);
        }
        warn!("{}", err);
        self.prefixes.reset();
        if self.divide_error_interrupt {
            self.interrupt(bus, 0)?;
        }
        Ok(())
    }

    /// executes one opcode byte through the single-byte table
    pub fn dispatch(&mut self, bus: &mut dyn Bus, op: u8) -> Result<EntryKind, Error> {
        let entry = self.tables.single[op as usize];
        self.run_entry(bus, entry, &[op])
    }

    /// executes the second byte of a 0x0F-escaped opcode
    pub fn dispatch_extended(&mut self, bus: &mut dyn Bus, op: u8) -> Result<EntryKind, Error> {
        let entry = self.tables.double[op as usize];
        self.run_entry(bus, entry, &[0x0F, op])
    }

    fn run_entry(&mut self, bus: &mut dyn Bus, entry: OpcodeEntry, bytes: &[u8]) -> Result<EntryKind, Error> {
        let op = bytes[bytes.len() - 1];
        match entry.kind {
            EntryKind::Unassigned => {
                warn!("[{:04X}:{:04X}] unassigned opcode {}, ignored",
                    self.get_r16(R::CS), self.instruction_start, crate::hex::hex_bytes(bytes));
            }
            EntryKind::Illegal => return Err(self.illegal(bytes)),
            _ => (entry.exec)(self, bus, op)?,
        }
        Ok(entry.kind)
    }

    /// builds a decode fault for the current instruction
    pub fn illegal(&self, bytes: &[u8]) -> Error {
        let mut opcode = self.prefixes.active().to_vec();
        opcode.extend_from_slice(bytes);
        Error::IllegalInstruction {
            opcode,
            cs: self.get_r16(R::CS),
            ip: self.instruction_start,
            count: self.instruction_count,
        }
    }

    pub fn divide_error(&self) -> Error {
        Error::DivideError {
            cs: self.get_r16(R::CS),
            ip: self.instruction_start,
        }
    }

    pub fn instruction_start(&self) -> u16 {
        self.instruction_start
    }

    /// reads the byte at CS:IP and advances IP. the only path that moves IP forward
    pub fn fetch_u8(&mut self, bus: &mut dyn Bus) -> Result<u8, Error> {
        let b = bus.read_u8(self.code_address(self.regs.ip.val))?;
        self.regs.ip.val = self.regs.ip.val.wrapping_add(1);
        Ok(b)
    }

    pub fn fetch_u16(&mut self, bus: &mut dyn Bus) -> Result<u16, Error> {
        let lo = self.fetch_u8(bus)?;
        let hi = self.fetch_u8(bus)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    pub fn fetch_i8(&mut self, bus: &mut dyn Bus) -> Result<i8, Error> {
        Ok(self.fetch_u8(bus)? as i8)
    }

    /// fetches an immediate of the given width
    pub fn fetch_imm(&mut self, bus: &mut dyn Bus, w: Width) -> Result<u32, Error> {
        match w {
            Width::Byte => Ok(u32::from(self.fetch_u8(bus)?)),
            Width::Word => Ok(u32::from(self.fetch_u16(bus)?)),
            Width::Dword => {
                let lo = self.fetch_u16(bus)?;
                let hi = self.fetch_u16(bus)?;
                Ok(u32::from(hi) << 16 | u32::from(lo))
            }
        }
    }

    /// reads `w` bytes at seg:offset. the offset wraps inside the segment
    pub fn read_mem(&self, bus: &mut dyn Bus, seg: Segment, offset: u16, w: Width) -> Result<u32, Error> {
        let mut val = 0;
        for i in 0..w.bytes() {
            let b = bus.read_u8(self.segment_address(seg, offset.wrapping_add(i)))?;
            val |= u32::from(b) << (8 * i);
        }
        Ok(val)
    }

    pub fn write_mem(&self, bus: &mut dyn Bus, seg: Segment, offset: u16, w: Width, val: u32) -> Result<(), Error> {
        for i in 0..w.bytes() {
            bus.write_u8(self.segment_address(seg, offset.wrapping_add(i)), (val >> (8 * i)) as u8)?;
        }
        Ok(())
    }

    pub fn push16(&mut self, bus: &mut dyn Bus, data: u16) -> Result<(), Error> {
        self.push(bus, Width::Word, u32::from(data))
    }

    pub fn pop16(&mut self, bus: &mut dyn Bus) -> Result<u16, Error> {
        Ok(self.pop(bus, Width::Word)? as u16)
    }

    pub fn push(&mut self, bus: &mut dyn Bus, w: Width, data: u32) -> Result<(), Error> {
        let sp = self.get_r16(R::SP).wrapping_sub(w.bytes());
        self.set_r16(R::SP, sp);
        if DEBUG_STACK {
            debug!("[{}] push {:04X} to {:04X}:{:04X}", self.get_memory_address(), data, self.get_r16(R::SS), sp);
        }
        self.write_mem(bus, Segment::SS, sp, w, data)
    }

    pub fn pop(&mut self, bus: &mut dyn Bus, w: Width) -> Result<u32, Error> {
        let sp = self.get_r16(R::SP);
        let data = self.read_mem(bus, Segment::SS, sp, w)?;
        if DEBUG_STACK {
            debug!("[{}] pop {:04X} from {:04X}:{:04X}", self.get_memory_address(), data, self.get_r16(R::SS), sp);
        }
        self.set_r16(R::SP, sp.wrapping_add(w.bytes()));
        Ok(data)
    }

    /// pushes FLAGS, CS and IP, clears IF and TF and loads CS:IP from the vector table
    pub fn interrupt(&mut self, bus: &mut dyn Bus, vector: u8) -> Result<(), Error> {
        let flags = self.regs.flags.u16();
        self.push16(bus, flags)?;
        self.regs.flags.interrupt = false;
        self.regs.flags.trap = false;
        let cs = self.get_r16(R::CS);
        let ip = self.regs.ip.val;
        self.push16(bus, cs)?;
        self.push16(bus, ip)?;
        let idx = u32::from(vector) << 2;
        let ip = bus.read_u16(idx)?;
        let cs = bus.read_u16(idx + 2)?;
        self.regs.ip.val = ip;
        self.set_r16(R::CS, cs);
        Ok(())
    }

    /// evaluates one of the 16 branch conditions, as encoded in the low nibble of Jcc
    pub fn condition(&self, cc: u8) -> bool {
        let f = &self.regs.flags;
        let res = match (cc >> 1) & 7 {
            0 => f.overflow,
            1 => f.carry,
            2 => f.zero,
            3 => f.carry || f.zero,
            4 => f.sign,
            5 => f.parity,
            6 => f.sign != f.overflow,
            _ => f.zero || (f.sign != f.overflow),
        };
        if cc & 1 == 0 {
            res
        } else {
            !res
        }
    }

    /// called by a string instruction after each element. decrements CX and
    /// rewinds IP to the first prefix byte while the repetition continues
    pub fn repeat_element(&mut self) {
        if let Some((mode, rewind)) = self.prefixes.leave_rep() {
            let cx = self.get_r16(R::CX).wrapping_sub(1);
            self.set_r16(R::CX, cx);
            if mode.should_continue(cx, self.regs.flags.zero) {
                self.regs.ip.val = self.regs.ip.val.wrapping_sub(rewind);
            }
        }
    }
}
