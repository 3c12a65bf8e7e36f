use std::fmt;

/// the 8086 address bus is 20 bits wide, carries out of bit 19 are dropped
pub const ADDRESS_MASK: u32 = 0xF_FFFF;

// represents a memory address inside the vm
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MemoryAddress {
    /// a real mode segment:offset pair (0_0000 - F_FFFF)
    RealSegmentOffset(u16, u16),
}

impl MemoryAddress {
    /// translates a segment:offset pair to a physical (flat) address
    pub fn value(&self) -> u32 {
        match *self {
            MemoryAddress::RealSegmentOffset(seg, off) => ((u32::from(seg) << 4) + u32::from(off)) & ADDRESS_MASK,
        }
    }

    pub fn segment(&self) -> u16 {
        match *self {
            MemoryAddress::RealSegmentOffset(seg, _) => seg,
        }
    }

    pub fn offset(&self) -> u16 {
        match *self {
            MemoryAddress::RealSegmentOffset(_, off) => off,
        }
    }

    /// advances the offset, wrapping inside the segment
    pub fn inc(&mut self, n: u16) {
        match *self {
            MemoryAddress::RealSegmentOffset(_, ref mut off) => *off = off.wrapping_add(n),
        }
    }
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MemoryAddress::RealSegmentOffset(seg, off) => write!(f, "{:04X}:{:04X}", seg, off),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_segment_offset() {
        assert_eq!(0x1_2350, MemoryAddress::RealSegmentOffset(0x1234, 0x0010).value());
        assert_eq!(0x0_0000, MemoryAddress::RealSegmentOffset(0x0000, 0x0000).value());
    }

    #[test]
    fn displays_as_segment_offset_pair() {
        assert_eq!("085F:0100", format!("{}", MemoryAddress::RealSegmentOffset(0x085F, 0x0100)));
    }

    #[test]
    fn wraps_at_one_megabyte() {
        // FFFF:0010 is 0x10_0000, which aliases to 0 on an 8086
        assert_eq!(0x0_0000, MemoryAddress::RealSegmentOffset(0xFFFF, 0x0010).value());
        assert_eq!(0x0_FFEF, MemoryAddress::RealSegmentOffset(0xFFFF, 0xFFFF).value());
    }

    #[test]
    fn offset_wraps_inside_segment() {
        let mut addr = MemoryAddress::RealSegmentOffset(0x2000, 0xFFFF);
        addr.inc(2);
        assert_eq!(0x0001, addr.offset());
        assert_eq!(0x2000, addr.segment());
    }
}
