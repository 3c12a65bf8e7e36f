use std::ops::RangeInclusive;

use crate::cpu::{control, ops, string, CPU};
use crate::error::Error;
use crate::machine::Bus;

/// an opcode handler. the last opcode byte is passed along so one handler
/// can serve a whole opcode family
pub type Handler = fn(&mut CPU, &mut dyn Bus, u8) -> Result<(), Error>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EntryKind {
    /// completes an instruction
    Instruction,
    /// modifies the instruction that follows it
    Prefix,
    /// not defined on this processor, logged and skipped
    Unassigned,
    /// decode fault
    Illegal,
}

#[derive(Clone, Copy)]
pub struct OpcodeEntry {
    pub mnemonic: &'static str,
    pub kind: EntryKind,
    pub exec: Handler,
}

impl OpcodeEntry {
    fn illegal() -> Self {
        OpcodeEntry {
            mnemonic: "(bad)",
            kind: EntryKind::Illegal,
            exec: no_operation,
        }
    }

    fn unassigned() -> Self {
        OpcodeEntry {
            mnemonic: "(unassigned)",
            kind: EntryKind::Unassigned,
            exec: no_operation,
        }
    }
}

fn no_operation(_cpu: &mut CPU, _bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    Ok(())
}

/// the single-byte map and the 0x0F-escaped map
pub struct OpcodeTables {
    pub single: [OpcodeEntry; 256],
    pub double: [OpcodeEntry; 256],
}

impl Default for OpcodeTables {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeTables {
    pub fn new() -> Self {
        let mut t = OpcodeTables {
            single: [OpcodeEntry::illegal(); 256],
            double: [OpcodeEntry::illegal(); 256],
        };
        t.fill_single();
        t.fill_double();
        t
    }

    fn fill_single(&mut self) {
        let s = &mut self.single;
        // arithmetic and logic rows: 0x00-0x05, 0x08-0x0D ... 0x38-0x3D
        for (row, name) in ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"].iter().enumerate() {
            let base = (row as u8) << 3;
            set(s, base..=base + 5, *name, ops::alu_family);
        }
        set(s, 0x06..=0x06, "push es", ops::push_segment);
        set(s, 0x07..=0x07, "pop es", ops::pop_segment);
        set(s, 0x0E..=0x0E, "push cs", ops::push_segment);
        s[0x0F] = instruction("(escape)", escape);
        set(s, 0x16..=0x16, "push ss", ops::push_segment);
        set(s, 0x17..=0x17, "pop ss", ops::pop_segment);
        set(s, 0x1E..=0x1E, "push ds", ops::push_segment);
        set(s, 0x1F..=0x1F, "pop ds", ops::pop_segment);
        prefix(s, 0x26, "es:");
        set(s, 0x27..=0x27, "daa", ops::daa);
        prefix(s, 0x2E, "cs:");
        set(s, 0x2F..=0x2F, "das", ops::das);
        prefix(s, 0x36, "ss:");
        set(s, 0x37..=0x37, "aaa", ops::aaa);
        prefix(s, 0x3E, "ds:");
        set(s, 0x3F..=0x3F, "aas", ops::aas);
        set(s, 0x40..=0x47, "inc", ops::inc_reg);
        set(s, 0x48..=0x4F, "dec", ops::dec_reg);
        set(s, 0x50..=0x57, "push", ops::push_reg);
        set(s, 0x58..=0x5F, "pop", ops::pop_reg);
        set(s, 0x60..=0x60, "pusha", ops::pusha);
        set(s, 0x61..=0x61, "popa", ops::popa);
        for op in [0x62, 0x63, 0x64, 0x65, 0x67, 0xD6, 0xF1].iter() {
            s[*op as usize] = OpcodeEntry::unassigned();
        }
        prefix(s, 0x66, "(operand size)");
        set(s, 0x68..=0x68, "push", ops::push_imm);
        set(s, 0x69..=0x69, "imul", ops::imul_imm);
        set(s, 0x6A..=0x6A, "push", ops::push_imm);
        set(s, 0x6B..=0x6B, "imul", ops::imul_imm);
        set(s, 0x6C..=0x6D, "ins", string::ins);
        set(s, 0x6E..=0x6F, "outs", string::outs);
        set(s, 0x70..=0x7F, "jcc", control::jcc_short);
        set(s, 0x80..=0x83, "(group 1)", ops::group1);
        set(s, 0x84..=0x85, "test", ops::test_rm_reg);
        set(s, 0x86..=0x87, "xchg", ops::xchg_rm_reg);
        set(s, 0x88..=0x8B, "mov", ops::mov_rm_reg);
        set(s, 0x8C..=0x8C, "mov", ops::mov_rm_sreg);
        set(s, 0x8D..=0x8D, "lea", ops::lea);
        set(s, 0x8E..=0x8E, "mov", ops::mov_sreg_rm);
        set(s, 0x8F..=0x8F, "pop", ops::pop_rm);
        set(s, 0x90..=0x90, "nop", no_operation);
        set(s, 0x91..=0x97, "xchg", ops::xchg_ax_reg);
        set(s, 0x98..=0x98, "cbw", ops::cbw);
        set(s, 0x99..=0x99, "cwd", ops::cwd);
        set(s, 0x9A..=0x9A, "call far", control::call_far_imm);
        set(s, 0x9B..=0x9B, "wait", no_operation);
        set(s, 0x9C..=0x9C, "pushf", control::pushf);
        set(s, 0x9D..=0x9D, "popf", control::popf);
        set(s, 0x9E..=0x9E, "sahf", control::sahf);
        set(s, 0x9F..=0x9F, "lahf", control::lahf);
        set(s, 0xA0..=0xA3, "mov", ops::mov_moffs);
        set(s, 0xA4..=0xA5, "movs", string::movs);
        set(s, 0xA6..=0xA7, "cmps", string::cmps);
        set(s, 0xA8..=0xA9, "test", ops::test_acc_imm);
        set(s, 0xAA..=0xAB, "stos", string::stos);
        set(s, 0xAC..=0xAD, "lods", string::lods);
        set(s, 0xAE..=0xAF, "scas", string::scas);
        set(s, 0xB0..=0xBF, "mov", ops::mov_reg_imm);
        set(s, 0xC0..=0xC1, "(shift group)", ops::shift_group);
        set(s, 0xC2..=0xC3, "ret", control::ret_near);
        set(s, 0xC4..=0xC5, "lds", ops::load_far_pointer);
        set(s, 0xC6..=0xC7, "mov", ops::mov_rm_imm);
        set(s, 0xC8..=0xC8, "enter", control::enter);
        set(s, 0xC9..=0xC9, "leave", control::leave);
        set(s, 0xCA..=0xCB, "retf", control::ret_far);
        set(s, 0xCC..=0xCE, "int", control::int);
        set(s, 0xCF..=0xCF, "iret", control::iret);
        set(s, 0xD0..=0xD3, "(shift group)", ops::shift_group);
        set(s, 0xD4..=0xD4, "aam", ops::aam);
        set(s, 0xD5..=0xD5, "aad", ops::aad);
        set(s, 0xD7..=0xD7, "xlat", ops::xlat);
        set(s, 0xD8..=0xDF, "esc", ops::esc);
        set(s, 0xE0..=0xE3, "loop", control::loop_family);
        set(s, 0xE4..=0xE7, "in/out", control::in_out_imm);
        set(s, 0xE8..=0xE8, "call", control::call_near);
        set(s, 0xE9..=0xE9, "jmp", control::jmp_near);
        set(s, 0xEA..=0xEA, "jmp far", control::jmp_far_imm);
        set(s, 0xEB..=0xEB, "jmp short", control::jmp_short);
        set(s, 0xEC..=0xEF, "in/out", control::in_out_dx);
        prefix(s, 0xF0, "lock");
        set(s, 0xF2..=0xF3, "rep", string::rep);
        set(s, 0xF4..=0xF4, "hlt", control::hlt);
        set(s, 0xF5..=0xF5, "cmc", control::flag_op);
        set(s, 0xF6..=0xF7, "(group 3)", ops::group3);
        set(s, 0xF8..=0xFD, "(flag op)", control::flag_op);
        set(s, 0xFE..=0xFE, "(group 4)", ops::group4);
        set(s, 0xFF..=0xFF, "(group 5)", control::group5);
    }

    fn fill_double(&mut self) {
        let d = &mut self.double;
        set(d, 0x80..=0x8F, "jcc", control::jcc_near);
        set(d, 0x90..=0x9F, "setcc", ops::setcc);
        set(d, 0xAF..=0xAF, "imul", ops::imul_reg_rm);
        set(d, 0xB6..=0xB7, "movzx", ops::movzx);
        set(d, 0xBE..=0xBF, "movsx", ops::movsx);
    }
}

fn instruction(mnemonic: &'static str, exec: Handler) -> OpcodeEntry {
    OpcodeEntry {
        mnemonic,
        kind: EntryKind::Instruction,
        exec,
    }
}

fn set(t: &mut [OpcodeEntry; 256], ops: RangeInclusive<u8>, mnemonic: &'static str, exec: Handler) {
    for op in ops {
        t[op as usize] = instruction(mnemonic, exec);
    }
}

fn prefix(t: &mut [OpcodeEntry; 256], op: u8, mnemonic: &'static str) {
    t[op as usize] = OpcodeEntry {
        mnemonic,
        kind: EntryKind::Prefix,
        exec: apply_prefix,
    };
}

fn apply_prefix(cpu: &mut CPU, _bus: &mut dyn Bus, op: u8) -> Result<(), Error> {
    cpu.prefixes.push(op);
    Ok(())
}

/// 0x0F redirects the next byte into the double-byte map
fn escape(cpu: &mut CPU, bus: &mut dyn Bus, _op: u8) -> Result<(), Error> {
    let op = cpu.fetch_u8(bus)?;
    cpu.dispatch_extended(bus, op).map(|_| ())
}
