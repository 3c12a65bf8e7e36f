use crate::cpu::{r16, r32, r8, Segment, Width, CPU, R};
use crate::error::Error;
use crate::machine::Bus;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModRegRm {
    pub md: u8,
    pub reg: u8,
    pub rm: u8,
}

impl ModRegRm {
    pub fn from_byte(b: u8) -> Self {
        ModRegRm {
            md: b >> 6,
            reg: (b >> 3) & 7,
            rm: b & 7,
        }
    }

    pub fn u8(&self) -> u8 {
        (self.md << 6) | (self.reg << 3) | self.rm
    }
}

/// the eight 16-bit base/index combinations selected by the rm field
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AMode {
    BXSI, BXDI, BPSI, BPDI, SI, DI, BP, BX
}

impl AMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AMode::BXSI => "bx+si",
            AMode::BXDI => "bx+di",
            AMode::BPSI => "bp+si",
            AMode::BPDI => "bp+di",
            AMode::SI => "si",
            AMode::DI => "di",
            AMode::BP => "bp",
            AMode::BX => "bx",
        }
    }

    /// BP-based forms address the stack segment
    pub fn default_segment(self) -> Segment {
        match self {
            AMode::BPSI | AMode::BPDI | AMode::BP => Segment::SS,
            _ => Segment::DS,
        }
    }
}

impl From<u8> for AMode {
    fn from(rm: u8) -> Self {
        match rm & 7 {
            0 => AMode::BXSI,
            1 => AMode::BXDI,
            2 => AMode::BPSI,
            3 => AMode::BPDI,
            4 => AMode::SI,
            5 => AMode::DI,
            6 => AMode::BP,
            _ => AMode::BX,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    /// register number, interpreted according to the access width
    Register(u8),
    Immediate(u32),
    Memory { segment: Segment, offset: u16 },
}

impl CPU {
    /// fetches an addressing byte and decodes its r/m operand
    pub fn decode_modrm(&mut self, bus: &mut dyn Bus) -> Result<(ModRegRm, Operand), Error> {
        let x = ModRegRm::from_byte(self.fetch_u8(bus)?);
        let rm = self.decode_rm(bus, x)?;
        Ok((x, rm))
    }

    /// decodes the r/m half of an addressing byte, fetching any displacement
    pub fn decode_rm(&mut self, bus: &mut dyn Bus, x: ModRegRm) -> Result<Operand, Error> {
        if x.md == 3 {
            return Ok(Operand::Register(x.rm));
        }
        let (base, default_segment) = if x.md == 0 && x.rm == 6 {
            (self.fetch_u16(bus)?, Segment::DS)
        } else {
            let amode = AMode::from(x.rm);
            (self.amode_offset(amode), amode.default_segment())
        };
        let disp = match x.md {
            1 => self.fetch_i8(bus)? as i16 as u16,
            2 => self.fetch_u16(bus)?,
            _ => 0,
        };
        Ok(Operand::Memory {
            segment: self.prefixes.segment_or(default_segment),
            offset: base.wrapping_add(disp),
        })
    }

    pub fn amode_offset(&self, amode: AMode) -> u16 {
        match amode {
            AMode::BXSI => self.get_r16(R::BX).wrapping_add(self.get_r16(R::SI)),
            AMode::BXDI => self.get_r16(R::BX).wrapping_add(self.get_r16(R::DI)),
            AMode::BPSI => self.get_r16(R::BP).wrapping_add(self.get_r16(R::SI)),
            AMode::BPDI => self.get_r16(R::BP).wrapping_add(self.get_r16(R::DI)),
            AMode::SI => self.get_r16(R::SI),
            AMode::DI => self.get_r16(R::DI),
            AMode::BP => self.get_r16(R::BP),
            AMode::BX => self.get_r16(R::BX),
        }
    }

    pub fn read_reg(&self, idx: u8, w: Width) -> u32 {
        match w {
            Width::Byte => u32::from(self.get_r8(r8(idx))),
            Width::Word => u32::from(self.get_r16(r16(idx))),
            Width::Dword => self.get_r32(r32(idx)),
        }
    }

    pub fn write_reg(&mut self, idx: u8, w: Width, val: u32) {
        match w {
            Width::Byte => self.set_r8(r8(idx), val as u8),
            Width::Word => self.set_r16(r16(idx), val as u16),
            Width::Dword => self.set_r32(r32(idx), val),
        }
    }

    pub fn read_operand(&self, bus: &mut dyn Bus, op: Operand, w: Width) -> Result<u32, Error> {
        match op {
            Operand::Register(idx) => Ok(self.read_reg(idx, w)),
            Operand::Immediate(imm) => Ok(imm & w.mask()),
            Operand::Memory { segment, offset } => self.read_mem(bus, segment, offset, w),
        }
    }

    pub fn write_operand(&mut self, bus: &mut dyn Bus, op: Operand, w: Width, val: u32) -> Result<(), Error> {
        match op {
            Operand::Register(idx) => {
                self.write_reg(idx, w, val);
                Ok(())
            }
            Operand::Memory { segment, offset } => self.write_mem(bus, segment, offset, w, val),
            Operand::Immediate(_) => unreachable!("write to immediate operand"),
        }
    }
}
