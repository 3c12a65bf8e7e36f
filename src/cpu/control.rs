//! Control transfer, flag manipulation and port I/O instructions.

use crate::cpu::alu::{self, Width};
use crate::cpu::{IrqLatch, Operand, Segment, CPU, R};
use crate::error::Error;
use crate::machine::Bus;

#[cfg(test)]
#[path = "./control_test.rs"]
mod control_test;

impl CPU {
    pub(crate) fn port_in(&mut self, bus: &mut dyn Bus, port: u16, w: Width) -> Result<u32, Error> {
        match w {
            Width::Byte => Ok(u32::from(bus.in_u8(port)?)),
            Width::Word => Ok(u32::from(bus.in_u16(port)?)),
            Width::Dword => bus.in_u32(port),
        }
    }

    pub(crate) fn port_out(&mut self, bus: &mut dyn Bus, port: u16, w: Width, val: u32) -> Result<(), Error> {
        match w {
            Width::Byte => bus.out_u8(port, val as u8),
            Width::Word => bus.out_u16(port, val as u16),
            Width::Dword => bus.out_u32(port, val),
        }
    }

    fn jump_relative(&mut self, rel: i16) {
        self.regs.ip.val = self.regs.ip.val.wrapping_add(rel as u16);
    }

    fn far_call(&mut self, bus: &mut dyn Bus, seg: u16, off: u16) -> Result<(), Error> {
        let cs = self.get_r16(R::CS);
        let ip = self.regs.ip.val;
        self.push16(bus, cs)?;
        self.push16(bus, ip)?;
        self.set_r16(R::CS, seg);
        self.regs.ip.val = off;
        Ok(())
    }
}

pub fn jcc_short(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let rel = cpu.fetch_i8(bus)?;
    if cpu.condition(op & 0xF) {
        cpu.jump_relative(i16::from(rel));
    }
    Ok(())
}

/// 0x0F 0x80-0x8F
pub fn jcc_near(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let rel = cpu.fetch_u16(bus)? as i16;
    if cpu.condition(op & 0xF) {
        cpu.jump_relative(rel);
    }
    Ok(())
}

pub fn jmp_short(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let rel = cpu.fetch_i8(bus)?;
    cpu.jump_relative(i16::from(rel));
    Ok(())
}

pub fn jmp_near(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let rel = cpu.fetch_u16(bus)? as i16;
    cpu.jump_relative(rel);
    Ok(())
}

pub fn jmp_far_imm(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let off = cpu.fetch_u16(bus)?;
    let seg = cpu.fetch_u16(bus)?;
    cpu.set_r16(R::CS, seg);
    cpu.regs.ip.val = off;
    Ok(())
}

pub fn call_near(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let rel = cpu.fetch_u16(bus)? as i16;
    let ip = cpu.regs.ip.val;
    cpu.push16(bus, ip)?;
    cpu.jump_relative(rel);
    Ok(())
}

pub fn call_far_imm(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let off = cpu.fetch_u16(bus)?;
    let seg = cpu.fetch_u16(bus)?;
    cpu.far_call(bus, seg, off)
}

/// 0xC2 ret imm16, 0xC3 ret
pub fn ret_near(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let release = if op == 0xC2 { cpu.fetch_u16(bus)? } else { 0 };
    cpu.regs.ip.val = cpu.pop16(bus)?;
    let sp = cpu.get_r16(R::SP).wrapping_add(release);
    cpu.set_r16(R::SP, sp);
    Ok(())
}

/// 0xCA retf imm16, 0xCB retf
pub fn ret_far(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let release = if op == 0xCA { cpu.fetch_u16(bus)? } else { 0 };
    cpu.regs.ip.val = cpu.pop16(bus)?;
    let cs = cpu.pop16(bus)?;
    cpu.set_r16(R::CS, cs);
    let sp = cpu.get_r16(R::SP).wrapping_add(release);
    cpu.set_r16(R::SP, sp);
    Ok(())
}

pub fn enter(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let size = cpu.fetch_u16(bus)?;
    let level = cpu.fetch_u8(bus)? & 0x1F;
    let bp = cpu.get_r16(R::BP);
    cpu.push16(bus, bp)?;
    let frame = cpu.get_r16(R::SP);
    if level > 0 {
        let mut bp = bp;
        for _ in 1..level {
            bp = bp.wrapping_sub(2);
            let val = cpu.read_mem(bus, Segment::SS, bp, Width::Word)?;
            cpu.push16(bus, val as u16)?;
        }
        cpu.push16(bus, frame)?;
    }
    cpu.set_r16(R::BP, frame);
    let sp = cpu.get_r16(R::SP).wrapping_sub(size);
    cpu.set_r16(R::SP, sp);
    Ok(())
}

pub fn leave(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let bp = cpu.get_r16(R::BP);
    cpu.set_r16(R::SP, bp);
    let bp = cpu.pop16(bus)?;
    cpu.set_r16(R::BP, bp);
    Ok(())
}

/// 0xCC int 3, 0xCD int imm8, 0xCE into
pub fn int(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    match op {
        0xCC => cpu.interrupt(bus, 3),
        0xCD => {
            let vector = cpu.fetch_u8(bus)?;
            cpu.interrupt(bus, vector)
        }
        _ => {
            if cpu.regs.flags.overflow {
                cpu.interrupt(bus, 4)
            } else {
                Ok(())
            }
        }
    }
}

pub fn iret(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    cpu.regs.ip.val = cpu.pop16(bus)?;
    let cs = cpu.pop16(bus)?;
    cpu.set_r16(R::CS, cs);
    let flags = cpu.pop16(bus)?;
    cpu.regs.flags.set_u16(flags);
    Ok(())
}

pub fn pushf(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let flags = cpu.regs.flags.u16();
    cpu.push16(bus, flags)
}

pub fn popf(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let flags = cpu.pop16(bus)?;
    cpu.regs.flags.set_u16(flags);
    Ok(())
}

/// loads SF, ZF, AF, PF and CF from AH
pub fn sahf(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let ah = u16::from(cpu.get_r8(R::AH));
    let flags = (cpu.regs.flags.u16() & 0xFF00) | ah;
    cpu.regs.flags.set_u16(flags);
    Ok(())
}

pub fn lahf(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let flags = cpu.regs.flags.u16() as u8;
    cpu.set_r8(R::AH, flags);
    Ok(())
}

/// 0xE0 loopne, 0xE1 loope, 0xE2 loop, 0xE3 jcxz
pub fn loop_family(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let rel = cpu.fetch_i8(bus)?;
    let taken = if op == 0xE3 {
        cpu.get_r16(R::CX) == 0
    } else {
        let cx = cpu.get_r16(R::CX).wrapping_sub(1);
        cpu.set_r16(R::CX, cx);
        match op {
            0xE0 => cx != 0 && !cpu.regs.flags.zero,
            0xE1 => cx != 0 && cpu.regs.flags.zero,
            _ => cx != 0,
        }
    };
    if taken {
        cpu.jump_relative(i16::from(rel));
    }
    Ok(())
}

/// 0xE4-0xE7: in / out with an immediate port number
pub fn in_out_imm(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let port = u16::from(cpu.fetch_u8(bus)?);
    in_out(cpu, bus, op, port)
}

/// 0xEC-0xEF: in / out with the port number in DX
pub fn in_out_dx(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let port = cpu.get_r16(R::DX);
    in_out(cpu, bus, op, port)
}

fn in_out(cpu: &mut CPU, bus: &mut dyn Bus, op: u8, port: u16) -> Result<(), Error> {
    let w = cpu.width_of(op);
    if op & 2 == 0 {
        let val = cpu.port_in(bus, port, w)?;
        cpu.write_reg(0, w, val);
        Ok(())
    } else {
        let val = cpu.read_reg(0, w);
        cpu.port_out(bus, port, w, val)
    }
}

pub fn hlt(cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    cpu.halted = true;
    Ok(())
}

/// 0xF5 cmc, 0xF8-0xFD clc, stc, cli, sti, cld, std
pub fn flag_op(cpu: &mut CPU, _bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let f = &mut cpu.regs.flags;
    match op {
        0xF5 => f.carry = !f.carry,
        0xF8 => f.carry = false,
        0xF9 => f.carry = true,
        0xFA => f.interrupt = false,
        0xFB => {
            if !f.interrupt {
                // the instruction after STI always runs before a pending request is taken
                cpu.latch = IrqLatch::Idle;
            }
            cpu.regs.flags.interrupt = true;
        }
        0xFC => f.direction = false,
        _ => f.direction = true,
    }
    Ok(())
}

/// 0xFF: inc, dec, call, call far, jmp, jmp far, push
pub fn group5(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.word_width();
    let (x, rm) = cpu.decode_modrm(bus)?;
    match x.reg {
        0 => {
            let dst = cpu.read_operand(bus, rm, w)?;
            let res = alu::inc(&mut cpu.regs.flags, w, dst);
            cpu.write_operand(bus, rm, w, res)
        }
        1 => {
            let dst = cpu.read_operand(bus, rm, w)?;
            let res = alu::dec(&mut cpu.regs.flags, w, dst);
            cpu.write_operand(bus, rm, w, res)
        }
        2 => {
            let target = cpu.read_operand(bus, rm, Width::Word)? as u16;
            let ip = cpu.regs.ip.val;
            cpu.push16(bus, ip)?;
            cpu.regs.ip.val = target;
            Ok(())
        }
        4 => {
            cpu.regs.ip.val = cpu.read_operand(bus, rm, Width::Word)? as u16;
            Ok(())
        }
        3 | 5 => match rm {
            Operand::Memory { segment, offset } => {
                let off = cpu.read_mem(bus, segment, offset, Width::Word)? as u16;
                let seg = cpu.read_mem(bus, segment, offset.wrapping_add(2), Width::Word)? as u16;
                if x.reg == 3 {
                    cpu.far_call(bus, seg, off)
                } else {
                    cpu.set_r16(R::CS, seg);
                    cpu.regs.ip.val = off;
                    Ok(())
                }
            }
            _ => Err(cpu.illegal(&[op, x.u8()])),
        },
        6 => {
            let val = cpu.read_operand(bus, rm, w)?;
            cpu.push(bus, w, val)
        }
        _ => Err(cpu.illegal(&[op, x.u8()])),
    }
}
