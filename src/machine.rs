use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::MachineConfig;
use crate::cpu::{CPU, R};
use crate::error::Error;
use crate::memory::{FlatMemory, MemoryAddress, ADDRESS_MASK};
use crate::pic::{Device, PIC};
use crate::snapshot::Snapshot;

use crate::pit::PIT as PITComponent;

#[cfg(test)]
#[path = "./machine_test.rs"]
mod machine_test;

/// logs each instruction as they are executed
const DEBUG_EXEC: bool = false;

/// logs access to I/O ports
const DEBUG_IO: bool = false;

/// The CPU's view of the rest of the machine: memory, I/O ports, the
/// interrupt request line and the bus hold request.
pub trait Bus {
    fn read_u8(&mut self, addr: u32) -> Result<u8, Error>;

    fn write_u8(&mut self, addr: u32, data: u8) -> Result<(), Error>;

    /// little endian, the address wraps at 1 MiB
    fn read_u16(&mut self, addr: u32) -> Result<u16, Error> {
        let lo = self.read_u8(addr & ADDRESS_MASK)?;
        let hi = self.read_u8(addr.wrapping_add(1) & ADDRESS_MASK)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    fn write_u16(&mut self, addr: u32, data: u16) -> Result<(), Error> {
        self.write_u8(addr & ADDRESS_MASK, data as u8)?;
        self.write_u8(addr.wrapping_add(1) & ADDRESS_MASK, (data >> 8) as u8)
    }

    fn in_u8(&mut self, port: u16) -> Result<u8, Error>;
    fn in_u16(&mut self, port: u16) -> Result<u16, Error>;
    fn in_u32(&mut self, port: u16) -> Result<u32, Error>;
    fn out_u8(&mut self, port: u16, data: u8) -> Result<(), Error>;
    fn out_u16(&mut self, port: u16, data: u16) -> Result<(), Error>;
    fn out_u32(&mut self, port: u16, data: u32) -> Result<(), Error>;

    /// level of the CPU INTR line
    fn interrupt_pending(&self) -> bool;

    /// runs an interrupt acknowledge cycle and returns the vector
    fn interrupt_acknowledge(&mut self) -> u8;

    /// true while a bus master wants the CPU to stay off the bus
    fn hold_requested(&self) -> bool {
        false
    }

    fn hold_acknowledge(&mut self) {}

    /// called once per loop iteration, drives device time
    fn clock_pulse(&mut self);
}

/// A device on the I/O bus.
pub trait Component {
    fn name(&self) -> &str;

    /// I/O ports claimed by the device
    fn ports(&self) -> Vec<u16>;

    /// the device kind, if it needs an IRQ line
    fn device(&self) -> Option<Device> {
        None
    }

    /// receives the line assigned by the interrupt controller
    fn attach_irq(&mut self, _line: u8) {}

    /// returns Some<u8> if read was handled
    fn in_u8(&mut self, _port: u16) -> Option<u8> {
        None
    }

    /// returns true if write was handled
    fn out_u8(&mut self, _port: u16, _data: u8) -> bool {
        false
    }

    /// returns Some<u16> if read was handled, else it is split into byte reads
    fn in_u16(&mut self, _port: u16) -> Option<u16> {
        None
    }

    /// returns true if write was handled, else it is split into byte writes
    fn out_u16(&mut self, _port: u16, _data: u16) -> bool {
        false
    }

    /// advances device time by one pulse
    fn clock(&mut self, _pic: &mut PIC) {}
}

pub enum MachineComponent {
    PIT(PITComponent),
    External(Box<dyn Component>),
}

impl MachineComponent {
    fn component(&self) -> &dyn Component {
        match self {
            MachineComponent::PIT(c) => c,
            MachineComponent::External(c) => c.as_ref(),
        }
    }

    fn component_mut(&mut self) -> &mut dyn Component {
        match self {
            MachineComponent::PIT(c) => c,
            MachineComponent::External(c) => c.as_mut(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PortOwner {
    PIC,
    Component(usize),
}

/// Memory, interrupt controller and the port-mapped devices.
pub struct Motherboard {
    pub memory: FlatMemory,
    pub pic: PIC,
    components: Vec<MachineComponent>,
    ports: BTreeMap<u16, PortOwner>,
    /// remaining clock pulses a bus master holds the bus
    hold_cycles: usize,
    ignore_unknown_ports: bool,
}

impl Motherboard {
    pub fn new(config: &MachineConfig) -> Self {
        let mut board = Motherboard {
            memory: FlatMemory::new(config.memory.size),
            pic: PIC::new(config.pic.master_offset, config.pic.slave_offset),
            components: Vec::new(),
            ports: BTreeMap::new(),
            hold_cycles: 0,
            ignore_unknown_ports: config.io.ignore_unknown_ports,
        };
        for port in &[0x0020, 0x0021, 0x00A0, 0x00A1] {
            board.ports.insert(*port, PortOwner::PIC);
        }
        if config.pit.enabled {
            let pit = MachineComponent::PIT(PITComponent::new(config.pit.divisor));
            if let Err(e) = board.add_component(pit) {
                warn!("pit not installed: {}", e);
            }
        }
        board
    }

    /// installs a device: claims its ports and requests its IRQ line.
    /// nothing is installed if any port is taken or no line is free
    pub fn add_component(&mut self, mut component: MachineComponent) -> Result<Option<u8>, Error> {
        let ports = component.component().ports();
        for port in &ports {
            if let Some(owner) = self.ports.get(port) {
                return Err(Error::PortConflict {
                    port: *port,
                    owner: self.owner_name(*owner),
                });
            }
        }
        let line = match component.component().device() {
            Some(device) => {
                let line = self.pic.request_irq(device)?;
                component.component_mut().attach_irq(line);
                Some(line)
            }
            None => None,
        };
        let idx = self.components.len();
        for port in ports {
            self.ports.insert(port, PortOwner::Component(idx));
        }
        debug!("installed {} (irq {:?})", component.component().name(), line);
        self.components.push(component);
        Ok(line)
    }

    /// installs an external device
    pub fn attach(&mut self, component: Box<dyn Component>) -> Result<Option<u8>, Error> {
        self.add_component(MachineComponent::External(component))
    }

    fn owner_name(&self, owner: PortOwner) -> String {
        match owner {
            PortOwner::PIC => "pic".to_owned(),
            PortOwner::Component(idx) => self.components[idx].component().name().to_owned(),
        }
    }

    /// returns the name of the device owning a port
    pub fn port_owner(&self, port: u16) -> Option<String> {
        self.ports.get(&port).map(|owner| self.owner_name(*owner))
    }

    /// returns a mutable reference to the PIT component
    pub fn pit_mut(&mut self) -> Option<&mut PITComponent> {
        for component in &mut self.components {
            if let MachineComponent::PIT(c) = component {
                return Some(c);
            }
        }
        None
    }

    /// returns a reference to the PIT component
    pub fn pit(&self) -> Option<&PITComponent> {
        for component in &self.components {
            if let MachineComponent::PIT(c) = component {
                return Some(c);
            }
        }
        None
    }

    /// keeps the CPU off the bus for the next `cycles` clock pulses
    pub fn request_hold(&mut self, cycles: usize) {
        self.hold_cycles = cycles;
    }

    fn unknown_port(&self, port: u16, width: u8) -> Result<(), Error> {
        if self.ignore_unknown_ports {
            warn!("unhandled {}-bit access to port {:04X}", width, port);
            Ok(())
        } else {
            Err(Error::UnknownPort { port, width })
        }
    }
}

impl Bus for Motherboard {
    fn read_u8(&mut self, addr: u32) -> Result<u8, Error> {
        self.memory.read_u8(addr)
    }

    fn write_u8(&mut self, addr: u32, data: u8) -> Result<(), Error> {
        self.memory.write_u8(addr, data)
    }

    /// read byte from I/O port
    fn in_u8(&mut self, port: u16) -> Result<u8, Error> {
        let val = match self.ports.get(&port).copied() {
            Some(PortOwner::PIC) => self.pic.in_u8(port),
            Some(PortOwner::Component(idx)) => self.components[idx].component_mut().in_u8(port),
            None => None,
        };
        if DEBUG_IO {
            debug!("in_u8: read from {:04X} = {:?}", port, val);
        }
        match val {
            Some(v) => Ok(v),
            None => self.unknown_port(port, 8).map(|_| 0xFF),
        }
    }

    /// read word from I/O port
    fn in_u16(&mut self, port: u16) -> Result<u16, Error> {
        match self.ports.get(&port).copied() {
            Some(PortOwner::PIC) => Ok(self.pic.in_u16(port)),
            Some(PortOwner::Component(idx)) => {
                if let Some(v) = self.components[idx].component_mut().in_u16(port) {
                    return Ok(v);
                }
                let lo = self.in_u8(port)?;
                let hi = self.in_u8(port.wrapping_add(1))?;
                Ok(u16::from(hi) << 8 | u16::from(lo))
            }
            None => self.unknown_port(port, 16).map(|_| 0xFFFF),
        }
    }

    fn in_u32(&mut self, port: u16) -> Result<u32, Error> {
        match self.ports.get(&port).copied() {
            Some(PortOwner::PIC) => Ok(self.pic.in_u32(port)),
            Some(PortOwner::Component(_)) => {
                let lo = self.in_u16(port)?;
                let hi = self.in_u16(port.wrapping_add(2))?;
                Ok(u32::from(hi) << 16 | u32::from(lo))
            }
            None => self.unknown_port(port, 32).map(|_| 0xFFFF_FFFF),
        }
    }

    /// write byte to I/O port
    fn out_u8(&mut self, port: u16, data: u8) -> Result<(), Error> {
        if DEBUG_IO {
            debug!("out_u8: write to {:04X} = {:02X}", port, data);
        }
        let handled = match self.ports.get(&port).copied() {
            Some(PortOwner::PIC) => self.pic.out_u8(port, data),
            Some(PortOwner::Component(idx)) => self.components[idx].component_mut().out_u8(port, data),
            None => false,
        };
        if handled {
            Ok(())
        } else {
            self.unknown_port(port, 8)
        }
    }

    /// write word to I/O port
    fn out_u16(&mut self, port: u16, data: u16) -> Result<(), Error> {
        if DEBUG_IO {
            debug!("out_u16: write to {:04X} = {:04X}", port, data);
        }
        match self.ports.get(&port).copied() {
            Some(PortOwner::PIC) => {
                self.pic.out_u16(port, data);
                Ok(())
            }
            Some(PortOwner::Component(idx)) => {
                if self.components[idx].component_mut().out_u16(port, data) {
                    return Ok(());
                }
                self.out_u8(port, data as u8)?;
                self.out_u8(port.wrapping_add(1), (data >> 8) as u8)
            }
            None => self.unknown_port(port, 16),
        }
    }

    fn out_u32(&mut self, port: u16, data: u32) -> Result<(), Error> {
        match self.ports.get(&port).copied() {
            Some(PortOwner::PIC) => {
                self.pic.out_u32(port, data);
                Ok(())
            }
            Some(PortOwner::Component(_)) => {
                self.out_u16(port, data as u16)?;
                self.out_u16(port.wrapping_add(2), (data >> 16) as u16)
            }
            None => self.unknown_port(port, 32),
        }
    }

    fn interrupt_pending(&self) -> bool {
        self.pic.interrupt_pending()
    }

    fn interrupt_acknowledge(&mut self) -> u8 {
        self.pic.interrupt_acknowledge()
    }

    fn hold_requested(&self) -> bool {
        self.hold_cycles > 0
    }

    fn hold_acknowledge(&mut self) {
        self.hold_cycles = self.hold_cycles.saturating_sub(1);
    }

    fn clock_pulse(&mut self) {
        for component in &mut self.components {
            component.component_mut().clock(&mut self.pic);
        }
    }
}

/// A shared stop request for the run loop. Clones refer to the same
/// request, so a device or another thread can end a run.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// the run loop exits at its next instruction boundary
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

pub struct Machine {
    pub cpu: CPU,
    pub board: Motherboard,
    pub config: MachineConfig,

    /// true while run() or run_for() is executing
    running: bool,
    stop_request: StopHandle,

    /// base offset where the program was loaded
    pub rom_base: MemoryAddress,

    /// length of loaded program in bytes
    pub rom_length: usize,

    tracing: bool,
    trace_file: Option<BufWriter<File>>,
    /// remaining instructions to trace, None for unlimited
    trace_count: Option<usize>,
}

impl Machine {
    pub fn default() -> Self {
        Self::from_config(MachineConfig::default())
    }

    pub fn from_config(config: MachineConfig) -> Self {
        let mut cpu = CPU::default();
        cpu.divide_error_interrupt = config.cpu.divide_error_interrupt;
        Machine {
            cpu,
            board: Motherboard::new(&config),
            rom_base: MemoryAddress::RealSegmentOffset(config.program.segment, config.program.offset),
            config,
            running: false,
            stop_request: StopHandle::default(),
            rom_length: 0,
            tracing: false,
            trace_file: None,
            trace_count: None,
        }
    }

    /// reads the configuration from a TOML file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Ok(Self::from_config(MachineConfig::from_file(path)?))
    }

    /// Enables writing of an instruction trace to file.
    /// The format tries to be similar to dosbox debugger "LOGS" format.
    pub fn write_trace_to<P: AsRef<Path>>(&mut self, filename: P) -> Result<(), Error> {
        let file = File::create(filename)?;
        self.trace_file = Some(BufWriter::new(file));
        self.tracing = true;
        Ok(())
    }

    /// traces through the log facade instead of a file
    pub fn enable_tracing(&mut self) {
        self.tracing = true;
    }

    /// limits the trace to the next `count` instructions
    pub fn set_trace_count(&mut self, count: usize) {
        self.trace_count = Some(count);
    }

    /// reset the CPU, keeping memory and devices
    pub fn hard_reset(&mut self) {
        self.cpu = CPU::default();
        self.cpu.divide_error_interrupt = self.config.cpu.divide_error_interrupt;
        self.running = false;
    }

    /// Loads a flat binary at the configured segment:offset and points
    /// CS:IP at it. DS, ES and SS are set to the load segment.
    pub fn load_executable(&mut self, data: &[u8]) -> Result<(), Error> {
        let segment = self.config.program.segment;
        let offset = self.config.program.offset;
        self.load_image(data, segment, offset)?;

        self.cpu.set_r16(R::CS, segment);
        self.cpu.set_r16(R::DS, segment);
        self.cpu.set_r16(R::ES, segment);
        self.cpu.set_r16(R::SS, segment);
        // offset of last word available in first 64k segment
        self.cpu.set_r16(R::SP, 0xFFFE);
        self.cpu.regs.ip.val = offset;

        self.rom_base = MemoryAddress::RealSegmentOffset(segment, offset);
        self.rom_length = data.len();
        Ok(())
    }

    /// copies data to segment:offset without touching the CPU
    pub fn load_image(&mut self, data: &[u8], segment: u16, offset: u16) -> Result<(), Error> {
        let addr = MemoryAddress::RealSegmentOffset(segment, offset).value();
        self.board.memory.write(addr, data)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// requests the run loop to stop after the current instruction.
    /// a request made while not running ends the next run before its
    /// first instruction
    pub fn stop(&self) {
        self.stop_request.stop();
    }

    /// returns a handle that can request a stop while the machine runs
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_request.clone()
    }

    /// Runs until a stop is requested, until the configured instruction limit, until a
    /// HLT with interrupts disabled, or until a fatal fault.
    pub fn run(&mut self) -> Result<(), Error> {
        self.run_until(self.config.cpu.max_instructions)
    }

    /// like run(), executing at most `count` more instructions
    pub fn run_for(&mut self, count: usize) -> Result<(), Error> {
        let limit = self.cpu.instruction_count + count;
        let limit = match self.config.cpu.max_instructions {
            Some(max) if max < limit => max,
            _ => limit,
        };
        self.run_until(Some(limit))
    }

    fn run_until(&mut self, limit: Option<usize>) -> Result<(), Error> {
        self.running = true;
        let res = loop {
            if self.stop_request.take() {
                info!("[{}] stop requested, {} instructions executed",
                    self.cpu.get_memory_address(), self.cpu.instruction_count);
                break Ok(());
            }
            if let Some(limit) = limit {
                if self.cpu.instruction_count >= limit {
                    debug!("instruction limit {} reached", limit);
                    break Ok(());
                }
            }
            if self.cpu.halted && !self.cpu.regs.flags.interrupt && !self.board.hold_requested() {
                info!("[{}] halted with interrupts disabled, {} instructions executed",
                    self.cpu.get_memory_address(), self.cpu.instruction_count);
                break Ok(());
            }
            if let Err(e) = self.execute_instruction() {
                break Err(e);
            }
        };
        self.running = false;
        // a request raised during the final instruction does not carry over
        self.stop_request.take();
        res
    }

    /// executes n instructions of the cpu
    pub fn execute_instructions(&mut self, count: usize) -> Result<(), Error> {
        for _ in 0..count {
            self.execute_instruction()?;
        }
        Ok(())
    }

    /// runs one iteration of the CPU loop
    pub fn execute_instruction(&mut self) -> Result<(), Error> {
        if self.tracing && !self.cpu.halted {
            self.trace_instruction();
        }
        if DEBUG_EXEC {
            debug!("[{}] executing", self.cpu.get_memory_address());
        }
        self.cpu.step(&mut self.board)
    }

    fn trace_instruction(&mut self) {
        if let Some(count) = self.trace_count {
            if count == 0 {
                self.tracing = false;
                let res = match &mut self.trace_file {
                    Some(file) => file.flush(),
                    None => Ok(()),
                };
                if let Err(e) = res {
                    self.trace_failed(e);
                }
                return;
            }
            self.trace_count = Some(count - 1);
        }

        let line = self.trace_line();
        let res = match &mut self.trace_file {
            Some(file) => writeln!(file, "{}", line),
            None => {
                trace!("{}", line);
                Ok(())
            }
        };
        if let Err(e) = res {
            self.trace_failed(e);
        }
    }

    /// turns tracing off after the first write error
    fn trace_failed(&mut self, err: io::Error) {
        warn!("instruction trace disabled: {}", err);
        self.tracing = false;
        self.trace_file = None;
    }

    pub fn is_tracing(&self) -> bool {
        self.tracing
    }

    /// formats the state before the instruction at CS:IP, similar to dosbox LOGS output
    fn trace_line(&mut self) -> String {
        let op = self.board.read_u8(self.cpu.get_address()).unwrap_or(0);
        let mnemonic = self.cpu.opcode_entry(op).mnemonic;
        let flags = &self.cpu.regs.flags;
        format!("{}  {:02X} {:10} EAX:{:08X} EBX:{:08X} ECX:{:08X} EDX:{:08X} ESI:{:08X} EDI:{:08X} EBP:{:08X} ESP:{:08X} DS:{:04X} ES:{:04X} SS:{:04X} C{} Z{} S{} O{} I{}",
            self.cpu.get_memory_address(), op, mnemonic,
            self.cpu.get_r32(R::EAX), self.cpu.get_r32(R::EBX), self.cpu.get_r32(R::ECX), self.cpu.get_r32(R::EDX),
            self.cpu.get_r32(R::ESI), self.cpu.get_r32(R::EDI), self.cpu.get_r32(R::EBP), self.cpu.get_r32(R::ESP),
            self.cpu.get_r16(R::DS), self.cpu.get_r16(R::ES), self.cpu.get_r16(R::SS),
            flags.carry as u8, flags.zero as u8, flags.sign as u8, flags.overflow as u8, flags.interrupt as u8)
    }

    /// writes CPU, interrupt controller and memory state to a file
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        Snapshot::capture(self).save(path)
    }

    pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        Snapshot::load(path)?.restore(self);
        Ok(())
    }
}
