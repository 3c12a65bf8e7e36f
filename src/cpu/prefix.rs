use crate::cpu::Segment;

#[cfg(test)]
#[path = "./prefix_test.rs"]
mod prefix_test;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OperandSize {
    /// word: 0-FFFF
    _16bit,

    /// dword: 0-FFFFFFFF
    _32bit,
}

impl Default for OperandSize {
    fn default() -> Self {
        OperandSize::_16bit
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RepeatMode {
    /// REP: repeat while CX != 0
    Rep,
    /// REPE / REPZ: also stop when ZF is cleared
    Repe,
    /// REPNE / REPNZ: also stop when ZF is set
    Repne,
}

impl RepeatMode {
    /// the per-element continuation test, evaluated after CX was decremented
    pub fn should_continue(self, cx: u16, zero: bool) -> bool {
        if cx == 0 {
            return false;
        }
        match self {
            RepeatMode::Rep => true,
            RepeatMode::Repe => zero,
            RepeatMode::Repne => !zero,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PrefixState {
    /// no prefix seen in the current instruction
    Idle,
    /// the given prefix byte was executed, its instruction is not yet complete
    Pending(u8),
    /// a string instruction is repeating; `rewind` is the byte length from the
    /// first prefix byte to the end of the string opcode
    InRep { mode: RepeatMode, rewind: u16 },
}

impl Default for PrefixState {
    fn default() -> Self {
        PrefixState::Idle
    }
}

pub const PREFIX_ES: u8 = 0x26;
pub const PREFIX_CS: u8 = 0x2E;
pub const PREFIX_SS: u8 = 0x36;
pub const PREFIX_DS: u8 = 0x3E;
pub const PREFIX_OPSIZE: u8 = 0x66;
pub const PREFIX_LOCK: u8 = 0xF0;
pub const PREFIX_REPNE: u8 = 0xF2;
pub const PREFIX_REP: u8 = 0xF3;

/// Prefix bytes executed so far for the current instruction, and their effects.
#[derive(Clone, Debug, Default)]
pub struct Prefixes {
    pub state: PrefixState,
    active: Vec<u8>,
    segment_override: Option<Segment>,
    operand_size: OperandSize,
}

impl Prefixes {
    /// records an executed prefix byte and applies its effect
    pub fn push(&mut self, op: u8) {
        if let Some(seg) = Segment::from_prefix(op) {
            self.segment_override = Some(seg);
        } else if op == PREFIX_OPSIZE {
            self.operand_size = OperandSize::_32bit;
        }
        self.active.push(op);
        if let PrefixState::Idle | PrefixState::Pending(_) = self.state {
            self.state = PrefixState::Pending(op);
        }
    }

    /// undoes the effect of every active prefix, in reverse order
    pub fn reset(&mut self) {
        while let Some(op) = self.active.pop() {
            if Segment::from_prefix(op).is_some() {
                self.segment_override = None;
            } else if op == PREFIX_OPSIZE {
                self.operand_size = OperandSize::_16bit;
            }
        }
        self.state = PrefixState::Idle;
    }

    pub fn active(&self) -> &[u8] {
        &self.active
    }

    pub fn segment_override(&self) -> Option<Segment> {
        self.segment_override
    }

    /// the override segment if one is active, else `default`
    pub fn segment_or(&self, default: Segment) -> Segment {
        self.segment_override.unwrap_or(default)
    }

    pub fn operand_size(&self) -> OperandSize {
        self.operand_size
    }

    pub fn in_rep(&self) -> bool {
        match self.state {
            PrefixState::InRep { .. } => true,
            _ => false,
        }
    }

    pub fn enter_rep(&mut self, mode: RepeatMode, rewind: u16) {
        self.state = PrefixState::InRep { mode, rewind };
    }

    /// leaves the repetition sub-state, returning it if one was active
    pub fn leave_rep(&mut self) -> Option<(RepeatMode, u16)> {
        match self.state {
            PrefixState::InRep { mode, rewind } => {
                self.state = PrefixState::Idle;
                Some((mode, rewind))
            }
            _ => None,
        }
    }
}

/// prefixes that may appear between a REP byte and its string instruction
pub fn is_chained_prefix(op: u8) -> bool {
    Segment::from_prefix(op).is_some() || op == PREFIX_OPSIZE || op == PREFIX_LOCK
}

/// string instructions that honor a repeat prefix
pub fn is_string_op(op: u8) -> bool {
    match op {
        0x6C..=0x6F | 0xA4..=0xA7 | 0xAA..=0xAF => true,
        _ => false,
    }
}

/// CMPS and SCAS test ZF between elements, the others only count CX down
pub fn classify_rep(prefix: u8, target: u8) -> RepeatMode {
    match target {
        0xA6 | 0xA7 | 0xAE | 0xAF => {
            if prefix == PREFIX_REPNE {
                RepeatMode::Repne
            } else {
                RepeatMode::Repe
            }
        }
        _ => RepeatMode::Rep,
    }
}
