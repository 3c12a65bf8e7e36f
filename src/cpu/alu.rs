//! Flag computation shared by every arithmetic and logic instruction.
//!
//! The predicates are pure functions of (operands, result, carry-in); the
//! operations below apply them to a `Flags` and return the truncated result.

use crate::cpu::Flags;

#[cfg(test)]
#[path = "./alu_test.rs"]
mod alu_test;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Width {
    Byte,
    Word,
    Dword,
}

impl Width {
    pub fn bits(self) -> u32 {
        match self {
            Width::Byte => 8,
            Width::Word => 16,
            Width::Dword => 32,
        }
    }

    pub fn bytes(self) -> u16 {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Dword => 4,
        }
    }

    pub fn mask(self) -> u32 {
        match self {
            Width::Byte => 0xFF,
            Width::Word => 0xFFFF,
            Width::Dword => 0xFFFF_FFFF,
        }
    }

    pub fn sign_bit(self) -> u32 {
        match self {
            Width::Byte => 0x80,
            Width::Word => 0x8000,
            Width::Dword => 0x8000_0000,
        }
    }

    /// sign-extends `v` from this width to 32 bits
    pub fn sign_extend(self, v: u32) -> i32 {
        match self {
            Width::Byte => i32::from(v as u8 as i8),
            Width::Word => i32::from(v as u16 as i16),
            Width::Dword => v as i32,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ShiftOp {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sal,
    Sar,
}

impl From<u8> for ShiftOp {
    /// decodes the reg field of a shift group addressing byte
    fn from(reg: u8) -> Self {
        match reg & 7 {
            0 => ShiftOp::Rol,
            1 => ShiftOp::Ror,
            2 => ShiftOp::Rcl,
            3 => ShiftOp::Rcr,
            4 => ShiftOp::Shl,
            5 => ShiftOp::Shr,
            6 => ShiftOp::Sal,
            _ => ShiftOp::Sar,
        }
    }
}

/// true if the low byte of `res` holds an even number of set bits
pub fn parity(res: u32) -> bool {
    (res as u8).count_ones() % 2 == 0
}

/// carry or borrow out of bit 3
pub fn adjust(res: u32, v1: u32, v2: u32) -> bool {
    (res ^ v1 ^ v2) & 0x10 != 0
}

pub fn overflow_add(w: Width, res: u32, v1: u32, v2: u32) -> bool {
    (res ^ v1) & (res ^ v2) & w.sign_bit() != 0
}

/// `dst - src = res`
pub fn overflow_sub(w: Width, res: u32, src: u32, dst: u32) -> bool {
    (dst ^ src) & (dst ^ res) & w.sign_bit() != 0
}

/// `wide` is the untruncated result; any bit above the width means carry
pub fn carry(w: Width, wide: u64) -> bool {
    wide & !u64::from(w.mask()) != 0
}

/// ADD / ADC
pub fn add(flags: &mut Flags, w: Width, dst: u32, src: u32, carry_in: bool) -> u32 {
    let (dst, src) = (dst & w.mask(), src & w.mask());
    let wide = u64::from(dst) + u64::from(src) + u64::from(carry_in);
    let res = wide as u32 & w.mask();
    flags.set_carry(w, wide);
    flags.set_overflow_add(w, res, dst, src);
    flags.set_adjust(res, dst, src);
    flags.set_szp(w, res);
    res
}

/// SUB / SBB / CMP / NEG
pub fn sub(flags: &mut Flags, w: Width, dst: u32, src: u32, borrow_in: bool) -> u32 {
    let (dst, src) = (dst & w.mask(), src & w.mask());
    let res = dst.wrapping_sub(src).wrapping_sub(borrow_in as u32) & w.mask();
    flags.carry = u64::from(src) + u64::from(borrow_in) > u64::from(dst);
    flags.set_overflow_sub(w, res, src, dst);
    flags.set_adjust(res, src, dst);
    flags.set_szp(w, res);
    res
}

/// AND / OR / XOR / TEST: clears CF and OF
pub fn logic(flags: &mut Flags, w: Width, res: u32) -> u32 {
    let res = res & w.mask();
    flags.carry = false;
    flags.overflow = false;
    flags.adjust = false;
    flags.set_szp(w, res);
    res
}

/// INC leaves CF untouched
pub fn inc(flags: &mut Flags, w: Width, dst: u32) -> u32 {
    let carry = flags.carry;
    let res = add(flags, w, dst, 1, false);
    flags.carry = carry;
    res
}

/// DEC leaves CF untouched
pub fn dec(flags: &mut Flags, w: Width, dst: u32) -> u32 {
    let carry = flags.carry;
    let res = sub(flags, w, dst, 1, false);
    flags.carry = carry;
    res
}

pub fn neg(flags: &mut Flags, w: Width, dst: u32) -> u32 {
    sub(flags, w, 0, dst, false)
}

/// Shifts and rotates. A zero count leaves both operand and flags unchanged.
/// The count is not masked, matching the 8086.
pub fn shift(flags: &mut Flags, w: Width, op: ShiftOp, dst: u32, count: u8) -> u32 {
    let mask = w.mask();
    let msb = w.sign_bit();
    let mut res = dst & mask;
    if count == 0 {
        return res;
    }
    match op {
        ShiftOp::Rol => {
            for _ in 0..count {
                let out = res & msb != 0;
                res = ((res << 1) | out as u32) & mask;
            }
            flags.carry = res & 1 != 0;
            flags.overflow = (res & msb != 0) != flags.carry;
        }
        ShiftOp::Ror => {
            for _ in 0..count {
                let out = res & 1 != 0;
                res = (res >> 1) | if out { msb } else { 0 };
            }
            flags.carry = res & msb != 0;
            flags.overflow = (res & msb != 0) != (res & (msb >> 1) != 0);
        }
        ShiftOp::Rcl => {
            for _ in 0..count {
                let out = res & msb != 0;
                res = ((res << 1) | flags.carry as u32) & mask;
                flags.carry = out;
            }
            flags.overflow = (res & msb != 0) != flags.carry;
        }
        ShiftOp::Rcr => {
            for _ in 0..count {
                flags.overflow = (res & msb != 0) != flags.carry;
                let out = res & 1 != 0;
                res = (res >> 1) | if flags.carry { msb } else { 0 };
                flags.carry = out;
            }
        }
        ShiftOp::Shl | ShiftOp::Sal => {
            for _ in 0..count {
                flags.carry = res & msb != 0;
                res = (res << 1) & mask;
            }
            flags.overflow = (res & msb != 0) != flags.carry;
            flags.set_szp(w, res);
        }
        ShiftOp::Shr => {
            flags.overflow = res & msb != 0;
            for _ in 0..count {
                flags.carry = res & 1 != 0;
                res >>= 1;
            }
            flags.set_szp(w, res);
        }
        ShiftOp::Sar => {
            let sign = res & msb;
            for _ in 0..count {
                flags.carry = res & 1 != 0;
                res = (res >> 1) | sign;
            }
            flags.overflow = false;
            flags.set_szp(w, res);
        }
    }
    res
}
