use std::convert::From;

use crate::cpu::Flags;

#[cfg(test)]
#[path = "./register_test.rs"]
mod register_test;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Register16 {
    pub val: u16,
}

impl Register16 {
    pub fn set_hi(&mut self, val: u8) {
        self.val = (self.val & 0xFF) + (u16::from(val) << 8);
    }
    pub fn set_lo(&mut self, val: u8) {
        self.val = (self.val & 0xFF00) + u16::from(val);
    }
    pub fn lo_u8(&self) -> u8 {
        (self.val & 0xFF) as u8
    }
    pub fn hi_u8(&self) -> u8 {
        (self.val >> 8) as u8
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum R {
    AL, CL, DL, BL, AH, CH, DH, BH,
    AX, CX, DX, BX, SP, BP, SI, DI,
    EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI,
    ES, CS, SS, DS,
    IP,
}

impl R {
    /// index into the general purpose or segment register array
    pub fn index(self) -> usize {
        match self {
            R::AL | R::AH | R::AX | R::EAX | R::ES => 0,
            R::CL | R::CH | R::CX | R::ECX | R::CS => 1,
            R::DL | R::DH | R::DX | R::EDX | R::SS => 2,
            R::BL | R::BH | R::BX | R::EBX | R::DS => 3,
            R::SP | R::ESP => 4,
            R::BP | R::EBP => 5,
            R::SI | R::ESI => 6,
            R::DI | R::EDI => 7,
            R::IP => 0,
        }
    }

    pub fn is_high_byte(self) -> bool {
        match self {
            R::AH | R::CH | R::DH | R::BH => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            R::AL => "al", R::CL => "cl", R::DL => "dl", R::BL => "bl",
            R::AH => "ah", R::CH => "ch", R::DH => "dh", R::BH => "bh",
            R::AX => "ax", R::CX => "cx", R::DX => "dx", R::BX => "bx",
            R::SP => "sp", R::BP => "bp", R::SI => "si", R::DI => "di",
            R::EAX => "eax", R::ECX => "ecx", R::EDX => "edx", R::EBX => "ebx",
            R::ESP => "esp", R::EBP => "ebp", R::ESI => "esi", R::EDI => "edi",
            R::ES => "es", R::CS => "cs", R::SS => "ss", R::DS => "ds",
            R::IP => "ip",
        }
    }

    /// case-insensitive lookup of a register name
    pub fn from_name(name: &str) -> Option<R> {
        let r = match name.to_ascii_lowercase().as_str() {
            "al" => R::AL, "cl" => R::CL, "dl" => R::DL, "bl" => R::BL,
            "ah" => R::AH, "ch" => R::CH, "dh" => R::DH, "bh" => R::BH,
            "ax" => R::AX, "cx" => R::CX, "dx" => R::DX, "bx" => R::BX,
            "sp" => R::SP, "bp" => R::BP, "si" => R::SI, "di" => R::DI,
            "eax" => R::EAX, "ecx" => R::ECX, "edx" => R::EDX, "ebx" => R::EBX,
            "esp" => R::ESP, "ebp" => R::EBP, "esi" => R::ESI, "edi" => R::EDI,
            "es" => R::ES, "cs" => R::CS, "ss" => R::SS, "ds" => R::DS,
            "ip" => R::IP,
            _ => return None,
        };
        Some(r)
    }
}

/// decodes the reg or rm field of an addressing byte as a 8-bit register
pub fn r8(v: u8) -> R {
    match v & 7 {
        0 => R::AL,
        1 => R::CL,
        2 => R::DL,
        3 => R::BL,
        4 => R::AH,
        5 => R::CH,
        6 => R::DH,
        _ => R::BH,
    }
}

pub fn r16(v: u8) -> R {
    match v & 7 {
        0 => R::AX,
        1 => R::CX,
        2 => R::DX,
        3 => R::BX,
        4 => R::SP,
        5 => R::BP,
        6 => R::SI,
        _ => R::DI,
    }
}

pub fn r32(v: u8) -> R {
    match v & 7 {
        0 => R::EAX,
        1 => R::ECX,
        2 => R::EDX,
        3 => R::EBX,
        4 => R::ESP,
        5 => R::EBP,
        6 => R::ESI,
        _ => R::EDI,
    }
}

/// segment registers are encoded in 2 bits, so 4-7 alias 0-3 on the 8086
pub fn sr(v: u8) -> R {
    match v & 3 {
        0 => R::ES,
        1 => R::CS,
        2 => R::SS,
        _ => R::DS,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterState {
    /// AX, CX, DX, BX, SP, BP, SI, DI
    pub gpr: [Register16; 8],

    /// upper halves of EAX..EDI
    pub gpr_hi: [u16; 8],

    /// ES, CS, SS, DS
    pub sreg: [Register16; 4],

    pub ip: Register16,
    pub flags: Flags,
}

impl RegisterState {
    pub fn get_r8(&self, r: R) -> u8 {
        let reg = &self.gpr[r.index()];
        if r.is_high_byte() {
            reg.hi_u8()
        } else {
            reg.lo_u8()
        }
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        let high = r.is_high_byte();
        let reg = &mut self.gpr[r.index()];
        if high {
            reg.set_hi(val);
        } else {
            reg.set_lo(val);
        }
    }

    pub fn get_r16(&self, r: R) -> u16 {
        match r {
            R::ES | R::CS | R::SS | R::DS => self.sreg[r.index()].val,
            R::IP => self.ip.val,
            _ => self.gpr[r.index()].val,
        }
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        match r {
            R::ES | R::CS | R::SS | R::DS => self.sreg[r.index()].val = val,
            R::IP => self.ip.val = val,
            _ => self.gpr[r.index()].val = val,
        }
    }

    pub fn get_r32(&self, r: R) -> u32 {
        let i = r.index();
        u32::from(self.gpr_hi[i]) << 16 | u32::from(self.gpr[i].val)
    }

    pub fn set_r32(&mut self, r: R, val: u32) {
        let i = r.index();
        self.gpr_hi[i] = (val >> 16) as u16;
        self.gpr[i].val = val as u16;
    }

    /// returns a handle to the 16-bit storage cell of a named register.
    /// byte names resolve to their containing word register.
    pub fn register_mut(&mut self, name: &str) -> Option<&mut Register16> {
        let r = R::from_name(name)?;
        match r {
            R::ES | R::CS | R::SS | R::DS => Some(&mut self.sreg[r.index()]),
            R::IP => Some(&mut self.ip),
            _ => Some(&mut self.gpr[r.index()]),
        }
    }

    /// reads a register by name, or "flags"
    pub fn get_by_name(&self, name: &str) -> Option<u32> {
        if name.eq_ignore_ascii_case("flags") {
            return Some(u32::from(self.flags.u16()));
        }
        let r = R::from_name(name)?;
        Some(match r {
            R::AL | R::CL | R::DL | R::BL | R::AH | R::CH | R::DH | R::BH => u32::from(self.get_r8(r)),
            R::EAX | R::ECX | R::EDX | R::EBX | R::ESP | R::EBP | R::ESI | R::EDI => self.get_r32(r),
            _ => u32::from(self.get_r16(r)),
        })
    }

    /// writes a register by name, or "flags". the value is truncated to the register width
    pub fn set_by_name(&mut self, name: &str, val: u32) -> Option<()> {
        if name.eq_ignore_ascii_case("flags") {
            self.flags.set_u16(val as u16);
            return Some(());
        }
        let r = R::from_name(name)?;
        match r {
            R::AL | R::CL | R::DL | R::BL | R::AH | R::CH | R::DH | R::BH => self.set_r8(r, val as u8),
            R::EAX | R::ECX | R::EDX | R::EBX | R::ESP | R::EBP | R::ESI | R::EDI => self.set_r32(r, val),
            _ => self.set_r16(r, val as u16),
        }
        Some(())
    }
}
