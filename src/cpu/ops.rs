//! Arithmetic, logic and data movement instructions.

use crate::cpu::alu::{self, ShiftOp, Width};
use crate::cpu::{r16, sr, Operand, Segment, CPU, R};
use crate::error::Error;
use crate::machine::Bus;

#[cfg(test)]
#[path = "./ops_test.rs"]
mod ops_test;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AluOp {
    Add, Or, Adc, Sbb, And, Sub, Xor, Cmp,
}

impl From<u8> for AluOp {
    fn from(v: u8) -> Self {
        match v & 7 {
            0 => AluOp::Add,
            1 => AluOp::Or,
            2 => AluOp::Adc,
            3 => AluOp::Sbb,
            4 => AluOp::And,
            5 => AluOp::Sub,
            6 => AluOp::Xor,
            _ => AluOp::Cmp,
        }
    }
}

impl CPU {
    /// applies a two-operand arithmetic or logic operation and returns the result
    pub fn alu(&mut self, op: AluOp, w: Width, dst: u32, src: u32) -> u32 {
        let f = &mut self.regs.flags;
        match op {
            AluOp::Add => alu::add(f, w, dst, src, false),
            AluOp::Adc => {
                let c = f.carry;
                alu::add(f, w, dst, src, c)
            }
            AluOp::Sub | AluOp::Cmp => alu::sub(f, w, dst, src, false),
            AluOp::Sbb => {
                let c = f.carry;
                alu::sub(f, w, dst, src, c)
            }
            AluOp::Or => alu::logic(f, w, dst | src),
            AluOp::And => alu::logic(f, w, dst & src),
            AluOp::Xor => alu::logic(f, w, dst ^ src),
        }
    }

    /// used by aaa, aas
    fn adjb(&mut self, param1: i8, param2: i8) {
        if self.regs.flags.adjust || (self.get_r8(R::AL) & 0xF) > 9 {
            let al = (i16::from(self.get_r8(R::AL)) + i16::from(param1)) as u8;
            let ah = (i16::from(self.get_r8(R::AH)) + i16::from(param2)) as u8;
            self.set_r8(R::AL, al);
            self.set_r8(R::AH, ah);
            self.regs.flags.adjust = true;
            self.regs.flags.carry = true;
        } else {
            self.regs.flags.adjust = false;
            self.regs.flags.carry = false;
        }
        let al = self.get_r8(R::AL);
        self.set_r8(R::AL, al & 0x0F);
    }

    /// used by daa, das
    fn adj4(&mut self, param1: i16, param2: i16) {
        let mut al = self.get_r8(R::AL);
        if ((al & 0x0F) > 0x09) || self.regs.flags.adjust {
            if (al > 0x99) || self.regs.flags.carry {
                al = (i16::from(al) + param2) as u8;
                self.regs.flags.carry = true;
            } else {
                self.regs.flags.carry = false;
            }
            al = (i16::from(al) + param1) as u8;
            self.regs.flags.adjust = true;
        } else {
            if (al > 0x99) || self.regs.flags.carry {
                al = (i16::from(al) + param2) as u8;
                self.regs.flags.carry = true;
            } else {
                self.regs.flags.carry = false;
            }
            self.regs.flags.adjust = false;
        }
        self.set_r8(R::AL, al);
        self.regs.flags.set_szp(Width::Byte, u32::from(al));
    }

    /// signed multiply truncated to `w`, CF and OF report lost significant bits
    fn imul_truncating(&mut self, w: Width, a: u32, b: u32) -> u32 {
        let full = i64::from(w.sign_extend(a)) * i64::from(w.sign_extend(b));
        let res = full as u32 & w.mask();
        let lost = i64::from(w.sign_extend(res)) != full;
        self.regs.flags.carry = lost;
        self.regs.flags.overflow = lost;
        res
    }

    fn mul(&mut self, w: Width, src: u32) {
        let hi = match w {
            Width::Byte => {
                let res = u16::from(self.get_r8(R::AL)) * src as u16;
                self.set_r16(R::AX, res);
                u32::from(res >> 8)
            }
            Width::Word => {
                let res = u32::from(self.get_r16(R::AX)) * src;
                self.set_r16(R::AX, res as u16);
                self.set_r16(R::DX, (res >> 16) as u16);
                res >> 16
            }
            Width::Dword => {
                let res = u64::from(self.get_r32(R::EAX)) * u64::from(src);
                self.set_r32(R::EAX, res as u32);
                self.set_r32(R::EDX, (res >> 32) as u32);
                (res >> 32) as u32
            }
        };
        self.regs.flags.carry = hi != 0;
        self.regs.flags.overflow = hi != 0;
    }

    fn imul_accumulator(&mut self, w: Width, src: u32) {
        let lost = match w {
            Width::Byte => {
                let res = i16::from(self.get_r8(R::AL) as i8) * i16::from(src as u8 as i8);
                self.set_r16(R::AX, res as u16);
                res != i16::from(res as i8)
            }
            Width::Word => {
                let res = i32::from(self.get_r16(R::AX) as i16) * i32::from(src as u16 as i16);
                self.set_r16(R::AX, res as u16);
                self.set_r16(R::DX, (res >> 16) as u16);
                res != i32::from(res as i16)
            }
            Width::Dword => {
                let res = i64::from(self.get_r32(R::EAX) as i32) * i64::from(src as i32);
                self.set_r32(R::EAX, res as u32);
                self.set_r32(R::EDX, (res >> 32) as u32);
                res != i64::from(res as i32)
            }
        };
        self.regs.flags.carry = lost;
        self.regs.flags.overflow = lost;
    }

    fn div(&mut self, w: Width, src: u32) -> Result<(), Error> {
        if src == 0 {
            return Err(self.divide_error());
        }
        match w {
            Width::Byte => {
                let num = u32::from(self.get_r16(R::AX));
                let quo = num / src;
                if quo > 0xFF {
                    return Err(self.divide_error());
                }
                self.set_r8(R::AL, quo as u8);
                self.set_r8(R::AH, (num % src) as u8);
            }
            Width::Word => {
                let num = u32::from(self.get_r16(R::DX)) << 16 | u32::from(self.get_r16(R::AX));
                let quo = num / src;
                if quo > 0xFFFF {
                    return Err(self.divide_error());
                }
                self.set_r16(R::AX, quo as u16);
                self.set_r16(R::DX, (num % src) as u16);
            }
            Width::Dword => {
                let num = u64::from(self.get_r32(R::EDX)) << 32 | u64::from(self.get_r32(R::EAX));
                let quo = num / u64::from(src);
                if quo > 0xFFFF_FFFF {
                    return Err(self.divide_error());
                }
                self.set_r32(R::EAX, quo as u32);
                self.set_r32(R::EDX, (num % u64::from(src)) as u32);
            }
        }
        Ok(())
    }

    fn idiv(&mut self, w: Width, src: u32) -> Result<(), Error> {
        if src & w.mask() == 0 {
            return Err(self.divide_error());
        }
        let (num, bits) = match w {
            Width::Byte => (i128::from(self.get_r16(R::AX) as i16), 8),
            Width::Word => {
                let num = u32::from(self.get_r16(R::DX)) << 16 | u32::from(self.get_r16(R::AX));
                (i128::from(num as i32), 16)
            }
            Width::Dword => {
                let num = u64::from(self.get_r32(R::EDX)) << 32 | u64::from(self.get_r32(R::EAX));
                (i128::from(num as i64), 32)
            }
        };
        let div = i128::from(w.sign_extend(src));
        let quo = num / div;
        let rem = num % div;
        let limit = 1i128 << (bits - 1);
        if quo >= limit || quo < -limit {
            return Err(self.divide_error());
        }
        match w {
            Width::Byte => {
                self.set_r8(R::AL, quo as u8);
                self.set_r8(R::AH, rem as u8);
            }
            Width::Word => {
                self.set_r16(R::AX, quo as u16);
                self.set_r16(R::DX, rem as u16);
            }
            Width::Dword => {
                self.set_r32(R::EAX, quo as u32);
                self.set_r32(R::EDX, rem as u32);
            }
        }
        Ok(())
    }
}

/// the eight arithmetic rows, each in six forms: rm,reg / reg,rm / acc,imm
pub fn alu_family(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let kind = AluOp::from(op >> 3);
    let w = cpu.width_of(op);
    match op & 7 {
        0 | 1 => {
            let (x, rm) = cpu.decode_modrm(bus)?;
            let dst = cpu.read_operand(bus, rm, w)?;
            let src = cpu.read_reg(x.reg, w);
            let res = cpu.alu(kind, w, dst, src);
            if kind != AluOp::Cmp {
                cpu.write_operand(bus, rm, w, res)?;
            }
        }
        2 | 3 => {
            let (x, rm) = cpu.decode_modrm(bus)?;
            let dst = cpu.read_reg(x.reg, w);
            let src = cpu.read_operand(bus, rm, w)?;
            let res = cpu.alu(kind, w, dst, src);
            if kind != AluOp::Cmp {
                cpu.write_reg(x.reg, w, res);
            }
        }
        _ => {
            let dst = cpu.read_reg(0, w);
            let src = cpu.fetch_imm(bus, w)?;
            let res = cpu.alu(kind, w, dst, src);
            if kind != AluOp::Cmp {
                cpu.write_reg(0, w, res);
            }
        }
    }
    Ok(())
}

/// 0x80-0x83: arithmetic on r/m with an immediate, operation in the reg field
pub fn group1(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let (x, rm) = cpu.decode_modrm(bus)?;
    let imm = Operand::Immediate(match op {
        0x81 => cpu.fetch_imm(bus, w)?,
        0x83 => i32::from(cpu.fetch_i8(bus)?) as u32,
        _ => u32::from(cpu.fetch_u8(bus)?),
    });
    let kind = AluOp::from(x.reg);
    let src = cpu.read_operand(bus, imm, w)?;
    let dst = cpu.read_operand(bus, rm, w)?;
    let res = cpu.alu(kind, w, dst, src);
    if kind != AluOp::Cmp {
        cpu.write_operand(bus, rm, w, res)?;
    }
    Ok(())
}

pub fn test_rm_reg(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let (x, rm) = cpu.decode_modrm(bus)?;
    let dst = cpu.read_operand(bus, rm, w)?;
    let src = cpu.read_reg(x.reg, w);
    alu::logic(&mut cpu.regs.flags, w, dst & src);
    Ok(())
}

pub fn test_acc_imm(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let src = cpu.fetch_imm(bus, w)?;
    let dst = cpu.read_reg(0, w);
    alu::logic(&mut cpu.regs.flags, w, dst & src);
    Ok(())
}

pub fn xchg_rm_reg(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let (x, rm) = cpu.decode_modrm(bus)?;
    let a = cpu.read_operand(bus, rm, w)?;
    let b = cpu.read_reg(x.reg, w);
    cpu.write_operand(bus, rm, w, b)?;
    cpu.write_reg(x.reg, w, a);
    Ok(())
}

pub fn xchg_ax_reg(cpu: &mut CPU, _bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let idx = op & 7;
    let a = cpu.read_reg(0, w);
    let b = cpu.read_reg(idx, w);
    cpu.write_reg(0, w, b);
    cpu.write_reg(idx, w, a);
    Ok(())
}

/// 0x88-0x8B, bit 1 selects the direction
pub fn mov_rm_reg(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let (x, rm) = cpu.decode_modrm(bus)?;
    if op & 2 == 0 {
        let val = cpu.read_reg(x.reg, w);
        cpu.write_operand(bus, rm, w, val)
    } else {
        let val = cpu.read_operand(bus, rm, w)?;
        cpu.write_reg(x.reg, w, val);
        Ok(())
    }
}

pub fn mov_rm_sreg(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let (x, rm) = cpu.decode_modrm(bus)?;
    let val = cpu.get_r16(sr(x.reg));
    cpu.write_operand(bus, rm, Width::Word, u32::from(val))
}

pub fn mov_sreg_rm(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let (x, rm) = cpu.decode_modrm(bus)?;
    let val = cpu.read_operand(bus, rm, Width::Word)?;
    cpu.set_r16(sr(x.reg), val as u16);
    Ok(())
}

pub fn lea(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let (x, rm) = cpu.decode_modrm(bus)?;
    match rm {
        Operand::Memory { offset, .. } => {
            let w = cpu.word_width();
            cpu.write_reg(x.reg, w, u32::from(offset));
            Ok(())
        }
        _ => Err(cpu.illegal(&[op, x.u8()])),
    }
}

/// LES (0xC4) and LDS (0xC5)
pub fn load_far_pointer(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let (x, rm) = cpu.decode_modrm(bus)?;
    match rm {
        Operand::Memory { segment, offset } => {
            let off = cpu.read_mem(bus, segment, offset, Width::Word)?;
            let seg = cpu.read_mem(bus, segment, offset.wrapping_add(2), Width::Word)?;
            cpu.write_reg(x.reg, Width::Word, off);
            let sreg = if op == 0xC4 { R::ES } else { R::DS };
            cpu.set_r16(sreg, seg as u16);
            Ok(())
        }
        _ => Err(cpu.illegal(&[op, x.u8()])),
    }
}

pub fn pop_rm(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let (_, rm) = cpu.decode_modrm(bus)?;
    let val = cpu.pop(bus, w)?;
    cpu.write_operand(bus, rm, w, val)
}

pub fn cbw(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    match cpu.word_width() {
        Width::Dword => {
            let ax = cpu.get_r16(R::AX) as i16;
            cpu.set_r32(R::EAX, i32::from(ax) as u32);
        }
        _ => {
            let al = cpu.get_r8(R::AL) as i8;
            cpu.set_r16(R::AX, i16::from(al) as u16);
        }
    }
    Ok(())
}

pub fn cwd(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    match cpu.word_width() {
        Width::Dword => {
            let hi = if cpu.get_r32(R::EAX) & 0x8000_0000 != 0 { 0xFFFF_FFFF } else { 0 };
            cpu.set_r32(R::EDX, hi);
        }
        _ => {
            let hi = if cpu.get_r16(R::AX) & 0x8000 != 0 { 0xFFFF } else { 0 };
            cpu.set_r16(R::DX, hi);
        }
    }
    Ok(())
}

/// 0xA0-0xA3: accumulator to or from a direct offset
pub fn mov_moffs(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let offset = cpu.fetch_u16(bus)?;
    let seg = cpu.prefixes.segment_or(Segment::DS);
    if op & 2 == 0 {
        let val = cpu.read_mem(bus, seg, offset, w)?;
        cpu.write_reg(0, w, val);
        Ok(())
    } else {
        let val = cpu.read_reg(0, w);
        cpu.write_mem(bus, seg, offset, w, val)
    }
}

pub fn mov_reg_imm(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = if op < 0xB8 { Width::Byte } else { cpu.word_width() };
    let val = cpu.fetch_imm(bus, w)?;
    cpu.write_reg(op & 7, w, val);
    Ok(())
}

pub fn mov_rm_imm(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let (_, rm) = cpu.decode_modrm(bus)?;
    let val = cpu.fetch_imm(bus, w)?;
    cpu.write_operand(bus, rm, w, val)
}

pub fn inc_reg(cpu: &mut CPU, _bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let dst = cpu.read_reg(op & 7, w);
    let res = alu::inc(&mut cpu.regs.flags, w, dst);
    cpu.write_reg(op & 7, w, res);
    Ok(())
}

pub fn dec_reg(cpu: &mut CPU, _bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let dst = cpu.read_reg(op & 7, w);
    let res = alu::dec(&mut cpu.regs.flags, w, dst);
    cpu.write_reg(op & 7, w, res);
    Ok(())
}

pub fn push_reg(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let idx = op & 7;
    let val = if r16(idx) == R::SP && w == Width::Word {
        // the 8086 pushes the already decremented stack pointer
        u32::from(cpu.get_r16(R::SP).wrapping_sub(2))
    } else {
        cpu.read_reg(idx, w)
    };
    cpu.push(bus, w, val)
}

pub fn pop_reg(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let val = cpu.pop(bus, w)?;
    cpu.write_reg(op & 7, w, val);
    Ok(())
}

pub fn push_segment(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let val = cpu.get_r16(sr(op >> 3));
    cpu.push16(bus, val)
}

pub fn pop_segment(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let val = cpu.pop16(bus)?;
    cpu.set_r16(sr(op >> 3), val);
    Ok(())
}

pub fn pusha(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let sp = cpu.read_reg(4, w);
    for idx in 0..8 {
        let val = if idx == 4 { sp } else { cpu.read_reg(idx, w) };
        cpu.push(bus, w, val)?;
    }
    Ok(())
}

pub fn popa(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    for idx in (0..8).rev() {
        let val = cpu.pop(bus, w)?;
        if idx != 4 {
            cpu.write_reg(idx, w, val);
        }
    }
    Ok(())
}

/// 0x68 pushes a full immediate, 0x6A a sign-extended byte
pub fn push_imm(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let val = if op == 0x68 {
        cpu.fetch_imm(bus, w)?
    } else {
        i32::from(cpu.fetch_i8(bus)?) as u32 & w.mask()
    };
    cpu.push(bus, w, val)
}

/// 0x69 imul reg, r/m, imm and 0x6B imul reg, r/m, imm8
pub fn imul_imm(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let (x, rm) = cpu.decode_modrm(bus)?;
    let src = cpu.read_operand(bus, rm, w)?;
    let imm = if op == 0x69 {
        cpu.fetch_imm(bus, w)?
    } else {
        i32::from(cpu.fetch_i8(bus)?) as u32 & w.mask()
    };
    let res = cpu.imul_truncating(w, src, imm);
    cpu.write_reg(x.reg, w, res);
    Ok(())
}

/// 0x0F 0xAF imul reg, r/m
pub fn imul_reg_rm(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let (x, rm) = cpu.decode_modrm(bus)?;
    let src = cpu.read_operand(bus, rm, w)?;
    let dst = cpu.read_reg(x.reg, w);
    let res = cpu.imul_truncating(w, dst, src);
    cpu.write_reg(x.reg, w, res);
    Ok(())
}

/// 0xF6 / 0xF7: test, not, neg, mul, imul, div, idiv
pub fn group3(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let (x, rm) = cpu.decode_modrm(bus)?;
    match x.reg {
        0 | 1 => {
            let imm = cpu.fetch_imm(bus, w)?;
            let dst = cpu.read_operand(bus, rm, w)?;
            alu::logic(&mut cpu.regs.flags, w, dst & imm);
        }
        2 => {
            let dst = cpu.read_operand(bus, rm, w)?;
            cpu.write_operand(bus, rm, w, !dst & w.mask())?;
        }
        3 => {
            let dst = cpu.read_operand(bus, rm, w)?;
            let res = alu::neg(&mut cpu.regs.flags, w, dst);
            cpu.write_operand(bus, rm, w, res)?;
        }
        4 => {
            let src = cpu.read_operand(bus, rm, w)?;
            cpu.mul(w, src);
        }
        5 => {
            let src = cpu.read_operand(bus, rm, w)?;
            cpu.imul_accumulator(w, src);
        }
        6 => {
            let src = cpu.read_operand(bus, rm, w)?;
            cpu.div(w, src)?;
        }
        _ => {
            let src = cpu.read_operand(bus, rm, w)?;
            cpu.idiv(w, src)?;
        }
    }
    Ok(())
}

/// 0xFE: inc / dec r/m8, other reg values are malformed
pub fn group4(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let (x, rm) = cpu.decode_modrm(bus)?;
    let dst = cpu.read_operand(bus, rm, Width::Byte)?;
    let res = match x.reg {
        0 => alu::inc(&mut cpu.regs.flags, Width::Byte, dst),
        1 => alu::dec(&mut cpu.regs.flags, Width::Byte, dst),
        _ => return Err(cpu.illegal(&[op, x.u8()])),
    };
    cpu.write_operand(bus, rm, Width::Byte, res)
}

/// 0xD0-0xD3 and 0xC0-0xC1: shifts and rotates by 1, CL or imm8
pub fn shift_group(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let (x, rm) = cpu.decode_modrm(bus)?;
    let count = match op {
        0xD0 | 0xD1 => 1,
        0xD2 | 0xD3 => cpu.get_r8(R::CL),
        _ => cpu.fetch_u8(bus)?,
    };
    let dst = cpu.read_operand(bus, rm, w)?;
    let res = alu::shift(&mut cpu.regs.flags, w, ShiftOp::from(x.reg), dst, count);
    if count != 0 {
        cpu.write_operand(bus, rm, w, res)?;
    }
    Ok(())
}

pub fn daa(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    cpu.adj4(6, 0x60);
    Ok(())
}

pub fn das(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    cpu.adj4(-6, -0x60);
    Ok(())
}

pub fn aaa(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    cpu.adjb(6, 1);
    Ok(())
}

pub fn aas(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    cpu.adjb(-6, -1);
    Ok(())
}

pub fn aam(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let base = cpu.fetch_u8(bus)?;
    if base == 0 {
        return Err(cpu.divide_error());
    }
    let al = cpu.get_r8(R::AL);
    cpu.set_r8(R::AH, al / base);
    cpu.set_r8(R::AL, al % base);
    cpu.regs.flags.set_szp(Width::Byte, u32::from(al % base));
    Ok(())
}

pub fn aad(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let base = cpu.fetch_u8(bus)?;
    let al = cpu.get_r8(R::AL).wrapping_add(cpu.get_r8(R::AH).wrapping_mul(base));
    cpu.set_r16(R::AX, u16::from(al));
    cpu.regs.flags.set_szp(Width::Byte, u32::from(al));
    Ok(())
}

pub fn xlat(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let offset = cpu.get_r16(R::BX).wrapping_add(u16::from(cpu.get_r8(R::AL)));
    let seg = cpu.prefixes.segment_or(Segment::DS);
    let val = cpu.read_mem(bus, seg, offset, Width::Byte)?;
    cpu.set_r8(R::AL, val as u8);
    Ok(())
}

/// coprocessor escape: the operand is decoded so IP stays in sync, nothing executes
pub fn esc(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    cpu.decode_modrm(bus)?;
    Ok(())
}

/// 0x0F 0x90-0x9F
pub fn setcc(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let (_, rm) = cpu.decode_modrm(bus)?;
    let val = cpu.condition(op & 0xF) as u32;
    cpu.write_operand(bus, rm, Width::Byte, val)
}

/// 0x0F 0xB6 / 0xB7
pub fn movzx(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let dst_w = cpu.word_width();
    let src_w = if op & 1 == 0 { Width::Byte } else { Width::Word };
    let (x, rm) = cpu.decode_modrm(bus)?;
    let val = cpu.read_operand(bus, rm, src_w)?;
    cpu.write_reg(x.reg, dst_w, val);
    Ok(())
}

/// 0x0F 0xBE / 0xBF
pub fn movsx(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let dst_w = cpu.word_width();
    let src_w = if op & 1 == 0 { Width::Byte } else { Width::Word };
    let (x, rm) = cpu.decode_modrm(bus)?;
    let val = cpu.read_operand(bus, rm, src_w)?;
    cpu.write_reg(x.reg, dst_w, src_w.sign_extend(val) as u32 & dst_w.mask());
    Ok(())
}
