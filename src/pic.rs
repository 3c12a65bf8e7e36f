// Programmable Interrupt Controller
// Two cascaded 8259A chips as wired in the PC/AT: the slave's output drives
// line 2 of the master, the master's output drives the CPU INTR pin.
// http://wiki.osdev.org/8259_PIC

use crate::error::Error;

#[cfg(test)]
#[path = "./pic_test.rs"]
mod pic_test;

const DEBUG_PIC: bool = false;

pub const MASTER: usize = 0;
pub const SLAVE: usize = 1;

/// the master line the slave chip is wired to
pub const CASCADE_LINE: u8 = 2;

/// lines handed out to devices without a fixed assignment, in order
pub const FREE_LINES: [u8; 4] = [3, 5, 7, 10];

/// Devices that may request an IRQ line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Device {
    Pit,
    Keyboard,
    Cascade,
    Serial,
    Floppy,
    Rtc,
    Mouse,
    /// ATA channel 0-3
    Ata(u8),
    Other(String),
}

impl Device {
    /// the line wired to this device on a PC/AT
    pub fn fixed_line(&self) -> Option<u8> {
        match *self {
            Device::Pit => Some(0),
            Device::Keyboard => Some(1),
            Device::Cascade => Some(CASCADE_LINE),
            Device::Serial => Some(4),
            Device::Floppy => Some(6),
            Device::Rtc => Some(8),
            Device::Mouse => Some(12),
            Device::Ata(0) => Some(14),
            Device::Ata(1) => Some(15),
            Device::Ata(2) => Some(11),
            Device::Ata(3) => Some(9),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IrqLine {
    pub owner: Device,
    pub enabled: bool,
}

/// Ownership of the 16 IRQ lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IrqRegistry {
    lines: Vec<Option<IrqLine>>,
}

impl Default for IrqRegistry {
    fn default() -> Self {
        let mut lines = vec![None; 16];
        lines[CASCADE_LINE as usize] = Some(IrqLine { owner: Device::Cascade, enabled: true });
        IrqRegistry { lines }
    }
}

impl IrqRegistry {
    /// assigns a line to `device`: its fixed line, or the first free general purpose line
    pub fn request(&mut self, device: Device) -> Result<u8, Error> {
        let line = match device.fixed_line() {
            Some(line) => {
                if self.lines[line as usize].is_some() {
                    return Err(Error::IrqUnavailable(device));
                }
                line
            }
            None => match FREE_LINES.iter().find(|&&l| self.lines[l as usize].is_none()) {
                Some(&line) => line,
                None => return Err(Error::IrqUnavailable(device)),
            },
        };
        if DEBUG_PIC {
            debug!("irq {} assigned to {:?}", line, device);
        }
        self.lines[line as usize] = Some(IrqLine { owner: device, enabled: true });
        Ok(line)
    }

    pub fn release(&mut self, line: u8) -> Result<(), Error> {
        match self.lines.get_mut(line as usize) {
            Some(entry) => {
                *entry = None;
                Ok(())
            }
            None => Err(Error::InvalidIrq(line)),
        }
    }

    pub fn set_enabled(&mut self, line: u8, enabled: bool) -> Result<(), Error> {
        match self.lines.get_mut(line as usize) {
            Some(Some(entry)) => {
                entry.enabled = enabled;
                Ok(())
            }
            _ => Err(Error::InvalidIrq(line)),
        }
    }

    pub fn owner(&self, line: u8) -> Option<&Device> {
        match self.lines.get(line as usize) {
            Some(Some(entry)) => Some(&entry.owner),
            _ => None,
        }
    }

    /// true if the line is assigned and enabled
    pub fn is_active(&self, line: u8) -> bool {
        match self.lines.get(line as usize) {
            Some(Some(entry)) => entry.enabled,
            _ => false,
        }
    }
}

/// progress through the ICW1..ICW4 initialization sequence
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InitSequence {
    pub in_init: bool,
    /// ICWs in this sequence, including ICW1
    pub words_expected: u8,
    /// number of the next expected ICW (2-4)
    pub current_word: u8,
    /// ICW1 SNGL: no ICW3
    pub single: bool,
    /// ICW1 IC4: ICW4 follows
    pub needs_icw4: bool,
}

/// One 8259A chip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chip {
    pub is_master: bool,
    /// vector base programmed by ICW2
    pub interrupt_offset: u8,
    /// interrupt request register, pending lines
    pub irr: u8,
    /// in-service register
    pub isr: u8,
    /// interrupt mask register
    pub imr: u8,
    /// current input pin levels, for edge detection
    pub irq_in: u8,
    /// rotation pointer; the highest priority line is the one after it
    pub lowest_priority: u8,
    /// line of the request latched on `int_request`
    pub current_irq: u8,
    /// output pin, latched until acknowledged
    pub int_request: bool,
    pub auto_eoi: bool,
    pub rotate_on_auto_eoi: bool,
    pub special_mask: bool,
    pub polled: bool,
    /// OCW3 RIS: command port reads return ISR instead of IRR
    pub read_isr: bool,
    /// ICW1 LTIM. recorded, acknowledge still treats every line as edge triggered
    pub level_triggered: bool,
    pub init: InitSequence,
}

impl Chip {
    pub fn new(is_master: bool, interrupt_offset: u8) -> Self {
        Chip {
            is_master,
            interrupt_offset,
            irr: 0,
            isr: 0,
            imr: 0xFF,
            irq_in: 0,
            lowest_priority: 7,
            current_irq: 0,
            int_request: false,
            auto_eoi: false,
            rotate_on_auto_eoi: false,
            special_mask: false,
            polled: false,
            read_isr: false,
            level_triggered: false,
            init: InitSequence::default(),
        }
    }

    fn name(&self) -> &'static str {
        if self.is_master {
            "master"
        } else {
            "slave"
        }
    }

    /// the in-service line of highest priority, relative to the rotation pointer
    fn highest_in_service(&self) -> Option<u8> {
        let highest = (self.lowest_priority + 1) & 7;
        (0..8).map(|i| (highest + i) & 7).find(|irq| self.isr & (1 << irq) != 0)
    }

    /// finds the line to signal, if any
    fn resolve(&self) -> Option<u8> {
        if self.int_request {
            return None;
        }
        let highest = (self.lowest_priority + 1) & 7;
        let mut max_irq = highest;
        if !self.special_mask {
            if let Some(in_service) = self.highest_in_service() {
                if in_service == highest {
                    return None;
                }
                max_irq = in_service;
            }
        }
        let unmasked = self.irr & !self.imr;
        if unmasked == 0 {
            return None;
        }
        let mut irq = highest;
        loop {
            let skip = self.special_mask && self.isr & (1 << irq) != 0;
            if !skip && unmasked & (1 << irq) != 0 {
                return Some(irq);
            }
            irq = (irq + 1) & 7;
            if irq == max_irq {
                return None;
            }
        }
    }

    /// moves an acknowledged line from IRR to ISR, honoring auto EOI
    fn accept(&mut self, irq: u8) {
        self.irr &= !(1 << irq);
        if !self.auto_eoi {
            self.isr |= 1 << irq;
        } else if self.rotate_on_auto_eoi {
            self.lowest_priority = irq;
        }
    }

    fn vector(&self, irq: u8) -> u8 {
        self.interrupt_offset.wrapping_add(irq)
    }
}

/// The cascaded master/slave pair, the IRQ registry and the CPU-facing INTR line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PIC {
    pub chips: [Chip; 2],
    pub registry: IrqRegistry,
    /// CPU INTR pin
    pub cpu_intr: bool,
}

impl Default for PIC {
    fn default() -> Self {
        Self::new(0x08, 0x70)
    }
}

impl PIC {
    pub fn new(master_offset: u8, slave_offset: u8) -> Self {
        PIC {
            chips: [Chip::new(true, master_offset), Chip::new(false, slave_offset)],
            registry: IrqRegistry::default(),
            cpu_intr: false,
        }
    }

    pub fn master(&self) -> &Chip {
        &self.chips[MASTER]
    }

    pub fn slave(&self) -> &Chip {
        &self.chips[SLAVE]
    }

    pub fn request_irq(&mut self, device: Device) -> Result<u8, Error> {
        self.registry.request(device)
    }

    pub fn release_irq(&mut self, line: u8) -> Result<(), Error> {
        if line >= 16 {
            return Err(Error::InvalidIrq(line));
        }
        self.clear_irq(line);
        self.registry.release(line)
    }

    /// true while the CPU INTR line is asserted
    pub fn interrupt_pending(&self) -> bool {
        self.cpu_intr
    }

    /// raises an input line. only a low to high transition latches a request
    pub fn set_irq(&mut self, line: u8) {
        if !self.registry.is_active(line) {
            warn!("pic: ignoring request on unassigned or disabled irq {}", line);
            return;
        }
        let which = if line < 8 { MASTER } else { SLAVE };
        self.raise_line(which, line & 7);
    }

    /// lowers an input line and withdraws its pending request
    pub fn clear_irq(&mut self, line: u8) {
        if line >= 16 {
            warn!("pic: ignoring clear of invalid irq {}", line);
            return;
        }
        let chip = &mut self.chips[if line < 8 { MASTER } else { SLAVE }];
        let mask = 1 << (line & 7);
        chip.irq_in &= !mask;
        chip.irr &= !mask;
    }

    fn raise_line(&mut self, which: usize, irq: u8) {
        let chip = &mut self.chips[which];
        let mask = 1 << irq;
        if chip.irq_in & mask == 0 {
            if DEBUG_PIC {
                debug!("pic {}: irq {} raised", chip.name(), irq);
            }
            chip.irq_in |= mask;
            chip.irr |= mask;
            self.service(which);
        }
    }

    /// signals the highest priority pending request, if one qualifies
    fn service(&mut self, which: usize) {
        let chip = &mut self.chips[which];
        if let Some(irq) = chip.resolve() {
            chip.int_request = true;
            chip.current_irq = irq;
            if which == MASTER {
                self.cpu_intr = true;
            } else {
                self.raise_line(MASTER, CASCADE_LINE);
            }
        }
    }

    /// Interrupt acknowledge cycle. Resolves priority again, moves the winning
    /// line from IRR to ISR and returns its vector, or the spurious vector
    /// (offset + 7) if nothing qualifies any more.
    pub fn interrupt_acknowledge(&mut self) -> u8 {
        self.cpu_intr = false;
        let master = &mut self.chips[MASTER];
        master.int_request = false;
        let irq = match master.resolve() {
            Some(irq) => irq,
            None => return master.vector(7),
        };
        master.accept(irq);
        let mut vector = master.vector(irq);

        if irq == CASCADE_LINE {
            master.irq_in &= !(1 << CASCADE_LINE);
            let slave = &mut self.chips[SLAVE];
            slave.int_request = false;
            match slave.resolve() {
                Some(irq) => {
                    slave.accept(irq);
                    vector = slave.vector(irq);
                }
                None => return slave.vector(7),
            }
            self.service(SLAVE);
        }
        self.service(MASTER);
        if DEBUG_PIC {
            debug!("pic: acknowledged vector {:02X}", vector);
        }
        vector
    }

    /// non-specific EOI: clears the in-service line of highest priority
    fn clear_highest_interrupt(&mut self, which: usize) -> Option<u8> {
        let chip = &mut self.chips[which];
        let irq = chip.highest_in_service()?;
        chip.isr &= !(1 << irq);
        Some(irq)
    }

    pub fn in_u8(&mut self, port: u16) -> Option<u8> {
        let val = match port {
            0x20 => self.read_command(MASTER),
            0x21 => self.chips[MASTER].imr,
            0xA0 => self.read_command(SLAVE),
            0xA1 => self.chips[SLAVE].imr,
            _ => return None,
        };
        if DEBUG_PIC {
            debug!("pic: read {:04X} = {:02X}", port, val);
        }
        Some(val)
    }

    pub fn out_u8(&mut self, port: u16, data: u8) -> bool {
        if DEBUG_PIC {
            debug!("pic: write {:04X} = {:02X}", port, data);
        }
        match port {
            0x20 => self.write_command(MASTER, data),
            0x21 => self.write_data(MASTER, data),
            0xA0 => self.write_command(SLAVE, data),
            0xA1 => self.write_data(SLAVE, data),
            _ => return false,
        }
        true
    }

    /// the 8259A has no 16-bit registers
    pub fn in_u16(&mut self, port: u16) -> u16 {
        warn!("pic: 16-bit read from port {:04X} is not supported", port);
        0xFFFF
    }

    pub fn in_u32(&mut self, port: u16) -> u32 {
        warn!("pic: 32-bit read from port {:04X} is not supported", port);
        0xFFFF_FFFF
    }

    pub fn out_u16(&mut self, port: u16, data: u16) {
        warn!("pic: 16-bit write {:04X} to port {:04X} ignored", data, port);
    }

    pub fn out_u32(&mut self, port: u16, data: u32) {
        warn!("pic: 32-bit write {:08X} to port {:04X} ignored", data, port);
    }

    fn read_command(&mut self, which: usize) -> u8 {
        if self.chips[which].polled {
            return self.poll(which);
        }
        let chip = &self.chips[which];
        if chip.read_isr {
            chip.isr
        } else {
            chip.irr
        }
    }

    /// poll command: acknowledges the pending request like an INTA cycle
    /// and returns 0x80 | line, or 0 if nothing is pending
    fn poll(&mut self, which: usize) -> u8 {
        if which == MASTER {
            self.cpu_intr = false;
        } else {
            self.chips[MASTER].irq_in &= !(1 << CASCADE_LINE);
            self.chips[MASTER].irr &= !(1 << CASCADE_LINE);
        }
        let chip = &mut self.chips[which];
        chip.polled = false;
        chip.int_request = false;
        let irq = match chip.resolve() {
            Some(irq) => irq,
            None => return 0,
        };
        chip.accept(irq);
        self.service(which);
        0x80 | irq
    }

    fn write_command(&mut self, which: usize, value: u8) {
        if value & 0x10 != 0 {
            self.icw1(which, value);
            return;
        }
        if value & 0x18 == 0x08 {
            self.ocw3(which, value);
            return;
        }
        self.ocw2(which, value);
    }

    fn icw1(&mut self, which: usize, value: u8) {
        let chip = &mut self.chips[which];
        if DEBUG_PIC {
            debug!("pic {}: ICW1 {:02X}", chip.name(), value);
        }
        chip.init.in_init = true;
        chip.init.single = value & 0x02 != 0;
        chip.init.needs_icw4 = value & 0x01 != 0;
        chip.init.words_expected = 2 + (!chip.init.single) as u8 + chip.init.needs_icw4 as u8;
        chip.init.current_word = 2;
        chip.level_triggered = value & 0x08 != 0;
        if chip.level_triggered {
            warn!("pic {}: level triggered mode requested, lines stay edge triggered", chip.name());
        }
        chip.imr = 0;
        chip.isr = 0;
        chip.irr = 0;
        chip.lowest_priority = 7;
        chip.int_request = false;
        chip.auto_eoi = false;
        chip.rotate_on_auto_eoi = false;
        chip.special_mask = false;
        chip.polled = false;
        chip.read_isr = false;
        if which == MASTER {
            self.cpu_intr = false;
        } else {
            self.chips[MASTER].irq_in &= !(1 << CASCADE_LINE);
            self.chips[MASTER].irr &= !(1 << CASCADE_LINE);
        }
    }

    fn ocw3(&mut self, which: usize, value: u8) {
        let chip = &mut self.chips[which];
        match (value >> 5) & 3 {
            2 => chip.special_mask = false,
            3 => chip.special_mask = true,
            _ => {}
        }
        if value & 0x04 != 0 {
            chip.polled = true;
            return;
        }
        if value & 0x02 != 0 {
            chip.read_isr = value & 0x01 != 0;
        }
        self.service(which);
    }

    fn ocw2(&mut self, which: usize, value: u8) {
        match value {
            0x00 | 0x80 => self.chips[which].rotate_on_auto_eoi = value != 0,
            0x20 | 0xA0 => {
                let cleared = self.clear_highest_interrupt(which);
                if let (0xA0, Some(irq)) = (value, cleared) {
                    self.chips[which].lowest_priority = irq;
                }
                self.service(which);
            }
            0x40 => {}
            0x60..=0x67 => {
                self.chips[which].isr &= !(1 << (value - 0x60));
                self.service(which);
            }
            0xC0..=0xC7 => {
                self.chips[which].lowest_priority = value - 0xC0;
                self.service(which);
            }
            0xE0..=0xE7 => {
                let irq = value - 0xE0;
                self.chips[which].isr &= !(1 << irq);
                self.chips[which].lowest_priority = irq;
                self.service(which);
            }
            _ => warn!("pic {}: unsupported OCW2 {:02X}", self.chips[which].name(), value),
        }
    }

    fn write_data(&mut self, which: usize, value: u8) {
        let chip = &mut self.chips[which];
        if !chip.init.in_init {
            chip.imr = value;
            self.service(which);
            return;
        }
        match chip.init.current_word {
            2 => {
                chip.interrupt_offset = value & 0xF8;
                chip.init.current_word = if !chip.init.single {
                    3
                } else if chip.init.needs_icw4 {
                    4
                } else {
                    0
                };
            }
            3 => {
                // cascade wiring is fixed: slave on master line 2
                chip.init.current_word = if chip.init.needs_icw4 { 4 } else { 0 };
            }
            _ => {
                chip.auto_eoi = value & 0x02 != 0;
                if value & 0x01 == 0 {
                    warn!("pic {}: ICW4 selects 8080/8085 mode, only 8086 mode is emulated", chip.name());
                }
                chip.init.current_word = 0;
            }
        }
        if chip.init.current_word == 0 {
            chip.init.in_init = false;
            if DEBUG_PIC {
                debug!("pic {}: initialized, offset {:02X}", chip.name(), chip.interrupt_offset);
            }
        }
    }
}
