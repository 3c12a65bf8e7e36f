use std::fmt;

use crate::cpu::{CPU, R};
use crate::memory::MemoryAddress;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Segment {
    ES,
    CS,
    SS,
    DS,
}

impl Default for Segment {
    fn default() -> Self {
        Segment::DS
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::ES => "es",
            Segment::CS => "cs",
            Segment::SS => "ss",
            Segment::DS => "ds",
        }
    }

    pub fn as_register(self) -> R {
        match self {
            Segment::ES => R::ES,
            Segment::CS => R::CS,
            Segment::SS => R::SS,
            Segment::DS => R::DS,
        }
    }

    /// maps a segment override prefix byte to its segment
    pub fn from_prefix(op: u8) -> Option<Segment> {
        match op {
            0x26 => Some(Segment::ES),
            0x2E => Some(Segment::CS),
            0x36 => Some(Segment::SS),
            0x3E => Some(Segment::DS),
            _ => None,
        }
    }
}

/// translates a segment:offset pair into a 20-bit linear address
pub fn linear(segment: u16, offset: u16) -> u32 {
    MemoryAddress::RealSegmentOffset(segment, offset).value()
}

impl CPU {
    /// CS:offset
    pub fn code_address(&self, offset: u16) -> u32 {
        linear(self.get_r16(R::CS), offset)
    }

    pub fn segment_address(&self, seg: Segment, offset: u16) -> u32 {
        linear(self.get_r16(seg.as_register()), offset)
    }
}
