//! String instructions and the REP prefix.

use crate::cpu::alu::{self, Width};
use crate::cpu::prefix;
use crate::cpu::{EntryKind, Segment, CPU, R};
use crate::error::Error;
use crate::machine::Bus;

#[cfg(test)]
#[path = "./string_test.rs"]
mod string_test;

impl CPU {
    /// moves SI or DI one element forward or backward, according to DF
    fn advance(&mut self, r: R, w: Width) {
        let val = self.get_r16(r);
        let val = if self.regs.flags.direction {
            val.wrapping_sub(w.bytes())
        } else {
            val.wrapping_add(w.bytes())
        };
        self.set_r16(r, val);
    }

    /// DS:SI, overridable
    fn source_segment(&self) -> Segment {
        self.prefixes.segment_or(Segment::DS)
    }
}

pub fn movs(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let val = cpu.read_mem(bus, cpu.source_segment(), cpu.get_r16(R::SI), w)?;
    cpu.write_mem(bus, Segment::ES, cpu.get_r16(R::DI), w, val)?;
    cpu.advance(R::SI, w);
    cpu.advance(R::DI, w);
    cpu.repeat_element();
    Ok(())
}

pub fn cmps(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let dst = cpu.read_mem(bus, cpu.source_segment(), cpu.get_r16(R::SI), w)?;
    let src = cpu.read_mem(bus, Segment::ES, cpu.get_r16(R::DI), w)?;
    alu::sub(&mut cpu.regs.flags, w, dst, src, false);
    cpu.advance(R::SI, w);
    cpu.advance(R::DI, w);
    cpu.repeat_element();
    Ok(())
}

pub fn stos(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let val = cpu.read_reg(0, w);
    cpu.write_mem(bus, Segment::ES, cpu.get_r16(R::DI), w, val)?;
    cpu.advance(R::DI, w);
    cpu.repeat_element();
    Ok(())
}

pub fn lods(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let val = cpu.read_mem(bus, cpu.source_segment(), cpu.get_r16(R::SI), w)?;
    cpu.write_reg(0, w, val);
    cpu.advance(R::SI, w);
    cpu.repeat_element();
    Ok(())
}

pub fn scas(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let dst = cpu.read_reg(0, w);
    let src = cpu.read_mem(bus, Segment::ES, cpu.get_r16(R::DI), w)?;
    alu::sub(&mut cpu.regs.flags, w, dst, src, false);
    cpu.advance(R::DI, w);
    cpu.repeat_element();
    Ok(())
}

/// port DX to ES:DI
pub fn ins(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let port = cpu.get_r16(R::DX);
    let val = cpu.port_in(bus, port, w)?;
    cpu.write_mem(bus, Segment::ES, cpu.get_r16(R::DI), w, val)?;
    cpu.advance(R::DI, w);
    cpu.repeat_element();
    Ok(())
}

/// DS:SI to port DX
pub fn outs(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    let w = cpu.width_of(op);
    let val = cpu.read_mem(bus, cpu.source_segment(), cpu.get_r16(R::SI), w)?;
    let port = cpu.get_r16(R::DX);
    cpu.port_out(bus, port, w, val)?;
    cpu.advance(R::SI, w);
    cpu.repeat_element();
    Ok(())
}

/// 0xF2 REPNE / 0xF3 REP. Executes any further prefixes and the target
/// string instruction, entering the repetition sub-state for it. In front of
/// anything but a string instruction the repeat prefix has no effect.
pub fn rep(cpu: &mut CPU, bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    cpu.prefixes.push(op);
    let mut target = cpu.fetch_u8(bus)?;
    while prefix::is_chained_prefix(target) {
        cpu.prefixes.push(target);
        target = cpu.fetch_u8(bus)?;
    }

    if !prefix::is_string_op(target) {
        while cpu.dispatch(bus, target)? == EntryKind::Prefix {
            target = cpu.fetch_u8(bus)?;
        }
        return Ok(());
    }

    if cpu.get_r16(R::CX) == 0 {
        return Ok(());
    }
    let rewind = cpu.regs.ip.val.wrapping_sub(cpu.instruction_start());
    cpu.prefixes.enter_rep(prefix::classify_rep(op, target), rewind);
    cpu.dispatch(bus, target).map(|_| ())
}
