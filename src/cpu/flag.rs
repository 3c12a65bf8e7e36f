use crate::cpu::alu::{self, Width};

#[cfg(test)]
#[path = "./flag_test.rs"]
mod flag_test;

/// https://en.wikipedia.org/wiki/FLAGS_register
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flags {
    // ____ O___ SZ_A _P_C
    pub carry: bool,     // 0: carry flag
    pub parity: bool,    // 2: parity flag
    pub adjust: bool,    // 4: adjust flag
    pub zero: bool,      // 6: zero flag
    pub sign: bool,      // 7: sign flag
    pub trap: bool,      // 8: trap flag (single step)
    pub interrupt: bool, // 9: interrupt flag
    pub direction: bool, // 10: direction flag (control with cld, std)
    pub overflow: bool,  // 11: overflow flag
}

pub const FLAG_CF: u16 = 0x0001;
pub const FLAG_PF: u16 = 0x0004;
pub const FLAG_AF: u16 = 0x0010;
pub const FLAG_ZF: u16 = 0x0040;
pub const FLAG_SF: u16 = 0x0080;
pub const FLAG_TF: u16 = 0x0100;
pub const FLAG_IF: u16 = 0x0200;
pub const FLAG_DF: u16 = 0x0400;
pub const FLAG_OF: u16 = 0x0800;

/// bit 1 and bits 12-15 always read as 1 on 8086 and 186
pub const FLAG_FIXED_ONES: u16 = 0xF002;

impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}

impl Flags {
    pub fn new() -> Self {
        Flags {
            carry: false,
            parity: false,
            adjust: false,
            zero: false,
            sign: false,
            trap: false,
            interrupt: false,
            direction: false,
            overflow: false,
        }
    }

    pub fn new_from_u16(val: u16) -> Flags {
        let mut f = Flags::new();
        f.set_u16(val);
        f
    }

    /// Set equal to the most-significant bit of the result,
    /// which is the sign bit of a signed integer.
    pub fn set_sign(&mut self, w: Width, res: u32) {
        self.sign = res & w.sign_bit() != 0;
    }

    /// Set if the least-significant byte of the result contains an
    /// even number of 1 bits; cleared otherwise.
    pub fn set_parity(&mut self, res: u32) {
        self.parity = alu::parity(res);
    }

    /// Zero flag, set if the result is zero.
    pub fn set_zero(&mut self, w: Width, res: u32) {
        self.zero = res & w.mask() == 0;
    }

    /// sets sign, zero and parity according to the result
    pub fn set_szp(&mut self, w: Width, res: u32) {
        self.set_sign(w, res);
        self.set_zero(w, res);
        self.set_parity(res);
    }

    /// Set if an arithmetic operation generates a carry or a borrow out
    /// of bit 3 of the result. Used in binary-coded decimal (BCD) arithmetic.
    pub fn set_adjust(&mut self, res: u32, v1: u32, v2: u32) {
        self.adjust = alu::adjust(res, v1, v2);
    }

    /// Set if the signed result does not fit the destination operand.
    pub fn set_overflow_add(&mut self, w: Width, res: u32, v1: u32, v2: u32) {
        self.overflow = alu::overflow_add(w, res, v1, v2);
    }

    pub fn set_overflow_sub(&mut self, w: Width, res: u32, src: u32, dst: u32) {
        self.overflow = alu::overflow_sub(w, res, src, dst);
    }

    /// Set if the unsigned result carried or borrowed out of the most-significant bit.
    /// `wide` is the result computed at double width.
    pub fn set_carry(&mut self, w: Width, wide: u64) {
        self.carry = alu::carry(w, wide);
    }

    /// initializes the flags with a packed u16
    pub fn set_u16(&mut self, val: u16) {
        self.carry       = val & FLAG_CF != 0;
        self.parity      = val & FLAG_PF != 0;
        self.adjust      = val & FLAG_AF != 0;
        self.zero        = val & FLAG_ZF != 0;
        self.sign        = val & FLAG_SF != 0;
        self.trap        = val & FLAG_TF != 0;
        self.interrupt   = val & FLAG_IF != 0;
        self.direction   = val & FLAG_DF != 0;
        self.overflow    = val & FLAG_OF != 0;
    }

    pub fn carry_val(&self) -> u32 {
        if self.carry {
            1
        } else {
            0
        }
    }

    /// returns the FLAGS register
    pub fn u16(&self) -> u16 {
        let mut val = FLAG_FIXED_ONES;
        if self.carry {
            val |= FLAG_CF;
        }
        if self.parity {
            val |= FLAG_PF;
        }
        if self.adjust {
            val |= FLAG_AF;
        }
        if self.zero {
            val |= FLAG_ZF;
        }
        if self.sign {
            val |= FLAG_SF;
        }
        if self.trap {
            val |= FLAG_TF;
        }
        if self.interrupt {
            val |= FLAG_IF;
        }
        if self.direction {
            val |= FLAG_DF;
        }
        if self.overflow {
            val |= FLAG_OF;
        }
        val
    }

    /// looks up a flag by its letter (C, P, A, Z, S, T, I, D, O), case-insensitive
    pub fn get_by_letter(&self, letter: char) -> Option<bool> {
        match letter.to_ascii_uppercase() {
            'C' => Some(self.carry),
            'P' => Some(self.parity),
            'A' => Some(self.adjust),
            'Z' => Some(self.zero),
            'S' => Some(self.sign),
            'T' => Some(self.trap),
            'I' => Some(self.interrupt),
            'D' => Some(self.direction),
            'O' => Some(self.overflow),
            _ => None,
        }
    }

    /// returns None if the letter names no flag
    pub fn set_by_letter(&mut self, letter: char, val: bool) -> Option<()> {
        let flag = match letter.to_ascii_uppercase() {
            'C' => &mut self.carry,
            'P' => &mut self.parity,
            'A' => &mut self.adjust,
            'Z' => &mut self.zero,
            'S' => &mut self.sign,
            'T' => &mut self.trap,
            'I' => &mut self.interrupt,
            'D' => &mut self.direction,
            'O' => &mut self.overflow,
            _ => return None,
        };
        *flag = val;
        Some(())
    }
}
