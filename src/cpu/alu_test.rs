use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::cpu::alu::{self, ShiftOp, Width};
use crate::cpu::Flags;

#[test]
fn add_u8_flag_table() {
    // (dst, src, res, CF, OF, AF, ZF, SF)
    let table: [(u32, u32, u32, bool, bool, bool, bool, bool); 5] = [
        (0x80, 0x80, 0x00, true, true, false, true, false),
        (0x7F, 0x01, 0x80, false, true, true, false, true),
        (0xFF, 0x01, 0x00, true, false, true, true, false),
        (0x0F, 0x01, 0x10, false, false, true, false, false),
        (0x10, 0x20, 0x30, false, false, false, false, false),
    ];
    for &(dst, src, res, cf, of, af, zf, sf) in table.iter() {
        let mut flags = Flags::new();
        assert_eq!(res, alu::add(&mut flags, Width::Byte, dst, src, false));
        assert_eq!((cf, of, af, zf, sf), (flags.carry, flags.overflow, flags.adjust, flags.zero, flags.sign));
    }
}

#[test]
fn sub_u8_flag_table() {
    // (dst, src, res, CF, OF, AF, ZF, SF)
    let table: [(u32, u32, u32, bool, bool, bool, bool, bool); 4] = [
        (0x00, 0x01, 0xFF, true, false, true, false, true),
        (0x80, 0x01, 0x7F, false, true, true, false, false),
        (0x05, 0x05, 0x00, false, false, false, true, false),
        (0x7F, 0xFF, 0x80, true, true, false, false, true),
    ];
    for &(dst, src, res, cf, of, af, zf, sf) in table.iter() {
        let mut flags = Flags::new();
        assert_eq!(res, alu::sub(&mut flags, Width::Byte, dst, src, false));
        assert_eq!((cf, of, af, zf, sf), (flags.carry, flags.overflow, flags.adjust, flags.zero, flags.sign));
    }
}

#[test]
fn inc_dec_preserve_carry() {
    let mut flags = Flags::new();
    flags.carry = true;
    assert_eq!(0x0000, alu::inc(&mut flags, Width::Word, 0xFFFF));
    assert_eq!(true, flags.carry);
    assert_eq!(true, flags.zero);

    flags.carry = false;
    assert_eq!(0xFFFF, alu::dec(&mut flags, Width::Word, 0x0000));
    assert_eq!(false, flags.carry);
    assert_eq!(true, flags.sign);
}

#[test]
fn logic_clears_carry_and_overflow() {
    let mut flags = Flags::new();
    flags.carry = true;
    flags.overflow = true;
    assert_eq!(0x00, alu::logic(&mut flags, Width::Byte, 0xF0 & 0x0F));
    assert_eq!(false, flags.carry);
    assert_eq!(false, flags.overflow);
    assert_eq!(true, flags.zero);
    assert_eq!(true, flags.parity);
}

#[test]
fn neg_sets_carry_unless_zero() {
    let mut flags = Flags::new();
    assert_eq!(0xFF, alu::neg(&mut flags, Width::Byte, 0x01));
    assert_eq!(true, flags.carry);
    assert_eq!(0x00, alu::neg(&mut flags, Width::Byte, 0x00));
    assert_eq!(false, flags.carry);
    assert_eq!(0x80, alu::neg(&mut flags, Width::Byte, 0x80));
    assert_eq!(true, flags.overflow);
}

#[test]
fn shifts_and_rotates() {
    let mut flags = Flags::new();
    assert_eq!(0x03, alu::shift(&mut flags, Width::Byte, ShiftOp::Rol, 0x81, 1));
    assert_eq!(true, flags.carry);

    assert_eq!(0xC0, alu::shift(&mut flags, Width::Byte, ShiftOp::Ror, 0x81, 1));
    assert_eq!(true, flags.carry);

    flags.carry = false;
    assert_eq!(0x02, alu::shift(&mut flags, Width::Byte, ShiftOp::Rcl, 0x81, 1));
    assert_eq!(true, flags.carry);

    assert_eq!(0xC0, alu::shift(&mut flags, Width::Byte, ShiftOp::Rcr, 0x81, 1));
    assert_eq!(true, flags.carry);

    assert_eq!(0xF000, alu::shift(&mut flags, Width::Word, ShiftOp::Sar, 0x8000, 3));
    assert_eq!(false, flags.carry);
    assert_eq!(true, flags.sign);

    assert_eq!(0x0000, alu::shift(&mut flags, Width::Word, ShiftOp::Shl, 0x8000, 1));
    assert_eq!(true, flags.carry);
    assert_eq!(true, flags.zero);
    assert_eq!(true, flags.overflow);

    assert_eq!(0x01, alu::shift(&mut flags, Width::Byte, ShiftOp::Shr, 0x02, 1));
    assert_eq!(false, flags.carry);
}

#[test]
fn zero_count_shift_changes_nothing() {
    let mut flags = Flags::new_from_u16(0x0801);
    let before = flags;
    assert_eq!(0x1234, alu::shift(&mut flags, Width::Word, ShiftOp::Shl, 0x1234, 0));
    assert_eq!(before, flags);
}

/// checks add/sub against a reference computed in i64
#[test]
fn arithmetic_matches_widening_reference() {
    let mut rng = XorShiftRng::seed_from_u64(0x8086);
    for _ in 0..2000 {
        for &w in [Width::Byte, Width::Word, Width::Dword].iter() {
            let dst = rng.gen::<u32>() & w.mask();
            let src = rng.gen::<u32>() & w.mask();
            let cin: bool = rng.gen();
            let mut flags = Flags::new();

            let res = alu::add(&mut flags, w, dst, src, cin);
            let wide = u64::from(dst) + u64::from(src) + cin as u64;
            let signed = i64::from(w.sign_extend(dst)) + i64::from(w.sign_extend(src)) + cin as i64;
            assert_eq!(wide as u32 & w.mask(), res);
            assert_eq!(wide > u64::from(w.mask()), flags.carry);
            assert_eq!(signed != i64::from(w.sign_extend(res)), flags.overflow);
            assert_eq!(res == 0, flags.zero);
            assert_eq!(res & w.sign_bit() != 0, flags.sign);
            assert_eq!((res as u8).count_ones() % 2 == 0, flags.parity);
            assert_eq!(((dst & 0xF) + (src & 0xF) + cin as u32) > 0xF, flags.adjust);

            let res = alu::sub(&mut flags, w, dst, src, cin);
            let signed = i64::from(w.sign_extend(dst)) - i64::from(w.sign_extend(src)) - cin as i64;
            assert_eq!(dst.wrapping_sub(src).wrapping_sub(cin as u32) & w.mask(), res);
            assert_eq!(u64::from(src) + cin as u64 > u64::from(dst), flags.carry);
            assert_eq!(signed != i64::from(w.sign_extend(res)), flags.overflow);
            assert_eq!(res == 0, flags.zero);
            assert_eq!((src & 0xF) + cin as u32 > (dst & 0xF), flags.adjust);
        }
    }
}
