// Programmable Interval Timer
// http://wiki.osdev.org/Programmable_Interval_Timer
//
// A 8253/8254 chip. Counters advance once per CPU clock pulse (one per
// executed instruction). Channel 0 output drives IRQ0.

use crate::machine::Component;
use crate::pic::{Device, PIC};

#[cfg(test)]
#[path = "./pit_test.rs"]
mod pit_test;

const DEBUG_PIT: bool = false;

/// reload value of 0 selects the maximum period
pub const DEFAULT_DIVISOR: u32 = 0x1_0000;

#[derive(Clone, Serialize, Deserialize)]
pub struct PIT {
    pub timer0: Timer,
    pub timer1: Timer,
    pub timer2: Timer,
    /// line assigned to channel 0 by the interrupt controller
    irq: Option<u8>,
}

impl Default for PIT {
    fn default() -> Self {
        Self::new(DEFAULT_DIVISOR)
    }
}

impl Component for PIT {
    fn name(&self) -> &str {
        "pit"
    }

    fn ports(&self) -> Vec<u16> {
        vec![0x0040, 0x0041, 0x0042, 0x0043]
    }

    fn device(&self) -> Option<Device> {
        Some(Device::Pit)
    }

    fn attach_irq(&mut self, line: u8) {
        self.irq = Some(line);
    }

    fn in_u8(&mut self, port: u16) -> Option<u8> {
        // PORT 0040-005F - PIT - PROGRAMMABLE INTERVAL TIMER (8253, 8254)
        match port {
            0x0040 => Some(self.timer0.get_next_u8()),
            0x0041 => Some(self.timer1.get_next_u8()),
            0x0042 => Some(self.timer2.get_next_u8()),
            // the control word register is write only
            0x0043 => Some(0xFF),
            _ => None,
        }
    }

    fn out_u8(&mut self, port: u16, data: u8) -> bool {
        match port {
            0x0040 => self.timer0.write_reload_part(data),
            0x0041 => self.timer1.write_reload_part(data),
            0x0042 => self.timer2.write_reload_part(data),
            0x0043 => self.set_mode_command(data),
            _ => return false,
        }
        true
    }

    /// advances all counters by one pulse and mirrors channel 0 onto its IRQ line
    fn clock(&mut self, pic: &mut PIC) {
        self.timer1.tick();
        self.timer2.tick();
        if !self.timer0.tick() {
            return;
        }
        if let Some(line) = self.irq {
            if self.timer0.output {
                pic.set_irq(line);
            } else {
                pic.clear_irq(line);
            }
        }
    }
}

impl PIT {
    /// channel 0 starts as a square wave generator with period `divisor`,
    /// as programmed by the PC BIOS. divisors above 0x10000 are clamped
    pub fn new(divisor: u32) -> Self {
        let reload = if divisor >= DEFAULT_DIVISOR {
            if divisor > DEFAULT_DIVISOR {
                warn!("pit: divisor {:#X} clamped to 0x10000", divisor);
            }
            0
        } else {
            divisor as u16
        };
        let mut timer0 = Timer::new(0);
        timer0.set_mode(3, 3, 0);
        timer0.load(reload);
        PIT {
            timer0,
            timer1: Timer::new(1),
            timer2: Timer::new(2),
            irq: None,
        }
    }

    fn counter(&mut self, n: u8) -> &mut Timer {
        match n {
            0 => &mut self.timer0,
            1 => &mut self.timer1,
            _ => &mut self.timer2,
        }
    }

    /// port 0043: control word, SC1 SC0 RW1 RW0 M2 M1 M0 BCD
    pub fn set_mode_command(&mut self, val: u8) {
        let channel = val >> 6;
        if channel == 3 {
            warn!("pit: read-back command {:02X} is not supported", val);
            return;
        }
        if DEBUG_PIT {
            debug!("pit: control word {:02X} for channel {}", val, channel);
        }
        self.counter(channel).set_mode((val >> 4) & 3, (val >> 1) & 7, val & 1);
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Timer {
    /// current counter value, counts down to 1 then reloads
    pub count: u32,
    pub reload: u16,
    /// counter output pin
    pub output: bool,
    /// count frozen by a latch command, until read out
    latched: Option<u16>,
    /// the next byte transferred is the high byte
    high_next: bool,
    channel: u8,
    access: ByteAccess,
    mode: CounterMode,
}

impl Timer {
    pub fn new(channel: u8) -> Self {
        Timer {
            count: DEFAULT_DIVISOR,
            reload: 0,
            output: false,
            latched: None,
            high_next: false,
            channel,
            access: ByteAccess::LowThenHigh,
            mode: CounterMode::TerminalCount,
        }
    }

    /// number of pulses in one counter cycle
    pub fn period(&self) -> u32 {
        if self.reload == 0 {
            DEFAULT_DIVISOR
        } else {
            u32::from(self.reload)
        }
    }

    /// sets a new reload value and restarts the count
    pub fn load(&mut self, reload: u16) {
        self.reload = reload;
        self.count = self.period();
        self.output = self.mode != CounterMode::TerminalCount;
    }

    /// advances the counter one pulse. returns true if the output changed
    pub fn tick(&mut self) -> bool {
        let terminal = self.count <= 1;
        self.count = if terminal {
            self.period()
        } else {
            self.count - 1
        };
        let output = match self.mode {
            CounterMode::TerminalCount => self.output || terminal,
            CounterMode::RateGenerator => self.count != 1,
            CounterMode::SquareWave => self.count > self.period() / 2,
            CounterMode::SoftwareStrobe => !terminal,
            // gate triggered modes have no gate input here
            CounterMode::OneShot | CounterMode::HardwareStrobe => self.output,
        };
        let changed = output != self.output;
        self.output = output;
        changed
    }

    /// reads the next byte of the count, or of a latched count
    pub fn get_next_u8(&mut self) -> u8 {
        let val = self.latched.unwrap_or(self.count as u16);
        let high = match self.access {
            ByteAccess::Low => false,
            ByteAccess::High => true,
            ByteAccess::LowThenHigh => {
                let high = self.high_next;
                self.high_next = !high;
                high
            }
        };
        if high || self.access == ByteAccess::Low {
            self.latched = None;
        }
        if high {
            (val >> 8) as u8
        } else {
            val as u8
        }
    }

    /// receives one byte of a new reload value
    pub fn write_reload_part(&mut self, val: u8) {
        match self.access {
            ByteAccess::LowThenHigh if self.high_next => {
                self.high_next = false;
                self.load((self.reload & 0x00FF) | u16::from(val) << 8);
            }
            ByteAccess::LowThenHigh => {
                self.high_next = true;
                self.reload = (self.reload & 0xFF00) | u16::from(val);
            }
            ByteAccess::Low => self.load(u16::from(val)),
            ByteAccess::High => self.load(u16::from(val) << 8),
        }
        if DEBUG_PIT {
            debug!("pit {}: reload {:04X}, {:?}", self.channel, self.reload, self.mode);
        }
    }

    /// applies the access and mode fields of a control word. an access
    /// field of 0 is a counter latch command and leaves the mode alone
    pub fn set_mode(&mut self, access: u8, mode: u8, bcd: u8) {
        self.access = match access {
            0 => {
                self.latched = Some(self.count as u16);
                return;
            }
            1 => ByteAccess::Low,
            2 => ByteAccess::High,
            _ => ByteAccess::LowThenHigh,
        };
        self.high_next = false;
        self.mode = match mode {
            0 => CounterMode::TerminalCount,
            1 => CounterMode::OneShot,
            2 | 6 => CounterMode::RateGenerator,
            3 | 7 => CounterMode::SquareWave,
            4 => CounterMode::SoftwareStrobe,
            _ => CounterMode::HardwareStrobe,
        };
        self.output = self.mode != CounterMode::TerminalCount;
        if bcd != 0 {
            warn!("pit {}: BCD counting is not supported, counting in binary", self.channel);
        }
    }
}

/// which bytes of the 16-bit count a port access transfers
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
enum ByteAccess {
    Low,
    High,
    LowThenHigh,
}

/// 8254 counter modes 0-5
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
enum CounterMode {
    TerminalCount,
    OneShot,
    RateGenerator,
    SquareWave,
    SoftwareStrobe,
    HardwareStrobe,
}
