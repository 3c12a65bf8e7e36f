use pretty_assertions::assert_eq;

use crate::cpu::R;
use crate::error::Error;
use crate::machine::Machine;

fn machine_with(code: &[u8]) -> Machine {
    let mut machine = Machine::default();
    machine.load_executable(code).unwrap();
    machine
}

/// linear address of DS:offset for a freshly loaded program
fn data_address(offset: u16) -> u32 {
    0x0_85F0 + u32::from(offset)
}

#[test]
fn can_execute_add_and_adc() {
    let mut machine = machine_with(&[
        0xB0, 0xFF, // mov al,0xff
        0x04, 0x01, // add al,0x1
        0x14, 0x00, // adc al,0x0
    ]);
    machine.execute_instructions(2).unwrap();
    assert_eq!(0x00, machine.cpu.get_r8(R::AL));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.zero);
    assert_eq!(true, machine.cpu.regs.flags.adjust);
    assert_eq!(false, machine.cpu.regs.flags.overflow);

    machine.execute_instruction().unwrap();
    assert_eq!(0x01, machine.cpu.get_r8(R::AL));
    assert_eq!(false, machine.cpu.regs.flags.carry);
    assert_eq!(false, machine.cpu.regs.flags.zero);
}

#[test]
fn can_execute_group1_with_sign_extended_immediate() {
    let mut machine = machine_with(&[
        0xBB, 0x10, 0x00,   // mov bx,0x10
        0x83, 0xEB, 0x01,   // sub bx,byte +0x1
        0x83, 0xC3, 0xFF,   // add bx,byte -0x1
        0x83, 0xFB, 0x0E,   // cmp bx,byte +0xe
    ]);
    machine.execute_instructions(2).unwrap();
    assert_eq!(0x000F, machine.cpu.get_r16(R::BX));

    machine.execute_instruction().unwrap();
    assert_eq!(0x000E, machine.cpu.get_r16(R::BX));
    assert_eq!(true, machine.cpu.regs.flags.carry);

    machine.execute_instruction().unwrap();
    assert_eq!(0x000E, machine.cpu.get_r16(R::BX));
    assert_eq!(true, machine.cpu.regs.flags.zero);
    assert_eq!(false, machine.cpu.regs.flags.carry);
}

#[test]
fn can_execute_logic_ops() {
    let mut machine = machine_with(&[
        0xB8, 0xF0, 0x0F,   // mov ax,0xff0
        0x25, 0x0F, 0x00,   // and ax,0xf
        0x0D, 0x00, 0x80,   // or ax,0x8000
        0x35, 0x00, 0x80,   // xor ax,0x8000
    ]);
    machine.execute_instructions(2).unwrap();
    assert_eq!(0x0000, machine.cpu.get_r16(R::AX));
    assert_eq!(true, machine.cpu.regs.flags.zero);
    assert_eq!(true, machine.cpu.regs.flags.parity);

    machine.execute_instruction().unwrap();
    assert_eq!(0x8000, machine.cpu.get_r16(R::AX));
    assert_eq!(true, machine.cpu.regs.flags.sign);

    machine.execute_instruction().unwrap();
    assert_eq!(0x0000, machine.cpu.get_r16(R::AX));
    assert_eq!(false, machine.cpu.regs.flags.carry);
    assert_eq!(false, machine.cpu.regs.flags.overflow);
}

#[test]
fn can_execute_mul_and_div() {
    let mut machine = machine_with(&[
        0xB8, 0x34, 0x12,   // mov ax,0x1234
        0xBB, 0x00, 0x01,   // mov bx,0x100
        0xF7, 0xE3,         // mul bx
        0xF7, 0xF3,         // div bx
    ]);
    machine.execute_instructions(3).unwrap();
    assert_eq!(0x3400, machine.cpu.get_r16(R::AX));
    assert_eq!(0x0012, machine.cpu.get_r16(R::DX));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.overflow);

    machine.execute_instruction().unwrap();
    assert_eq!(0x1234, machine.cpu.get_r16(R::AX));
    assert_eq!(0x0000, machine.cpu.get_r16(R::DX));
}

#[test]
fn can_execute_signed_byte_ops() {
    let mut machine = machine_with(&[
        0xB8, 0xF9, 0xFF,   // mov ax,0xfff9
        0xB3, 0x02,         // mov bl,0x2
        0xF6, 0xFB,         // idiv bl
        0xB0, 0xF0,         // mov al,0xf0
        0xB3, 0x10,         // mov bl,0x10
        0xF6, 0xEB,         // imul bl
    ]);
    machine.execute_instructions(3).unwrap();
    assert_eq!(0xFD, machine.cpu.get_r8(R::AL)); // -3
    assert_eq!(0xFF, machine.cpu.get_r8(R::AH)); // -1

    machine.execute_instructions(3).unwrap();
    assert_eq!(0xFF00, machine.cpu.get_r16(R::AX)); // -256
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.overflow);
}

#[test]
fn quotient_overflow_is_a_divide_error() {
    let mut machine = machine_with(&[
        0xB8, 0x00, 0x10,   // mov ax,0x1000
        0xB3, 0x02,         // mov bl,0x2
        0xF6, 0xF3,         // div bl
    ]);
    machine.cpu.divide_error_interrupt = false;
    machine.execute_instructions(3).unwrap();
    assert_eq!(0x1000, machine.cpu.get_r16(R::AX));
    assert_eq!(0x0107, machine.cpu.regs.ip.val);
    assert_eq!(false, machine.cpu.fatal_error);
}

#[test]
fn can_execute_shifts_and_rotates() {
    let mut machine = machine_with(&[
        0xB0, 0x81,         // mov al,0x81
        0xD0, 0xE0,         // shl al,1
        0xB1, 0x03,         // mov cl,0x3
        0xD2, 0xC8,         // ror al,cl
        0xB0, 0x80,         // mov al,0x80
        0xD0, 0xF8,         // sar al,1
    ]);
    machine.execute_instructions(2).unwrap();
    assert_eq!(0x02, machine.cpu.get_r8(R::AL));
    assert_eq!(true, machine.cpu.regs.flags.carry);

    machine.execute_instructions(2).unwrap();
    assert_eq!(0x40, machine.cpu.get_r8(R::AL));

    machine.execute_instructions(2).unwrap();
    assert_eq!(0xC0, machine.cpu.get_r8(R::AL));
    assert_eq!(false, machine.cpu.regs.flags.carry);
}

#[test]
fn shift_count_is_not_masked() {
    let mut machine = machine_with(&[
        0xB1, 0x21,         // mov cl,0x21
        0xB8, 0x01, 0x00,   // mov ax,0x1
        0xD3, 0xE0,         // shl ax,cl
    ]);
    machine.execute_instructions(3).unwrap();
    assert_eq!(0x0000, machine.cpu.get_r16(R::AX));
    assert_eq!(true, machine.cpu.regs.flags.zero);
}

#[test]
fn shift_by_zero_leaves_flags() {
    let mut machine = machine_with(&[
        0xF9,               // stc
        0xB1, 0x00,         // mov cl,0x0
        0xB0, 0x01,         // mov al,0x1
        0xD2, 0xE0,         // shl al,cl
    ]);
    machine.execute_instructions(4).unwrap();
    assert_eq!(0x01, machine.cpu.get_r8(R::AL));
    assert_eq!(true, machine.cpu.regs.flags.carry);
}

#[test]
fn push_sp_stores_decremented_value() {
    let mut machine = machine_with(&[
        0x54,   // push sp
        0x5B,   // pop bx
    ]);
    machine.execute_instructions(2).unwrap();
    assert_eq!(0xFFFC, machine.cpu.get_r16(R::BX));
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));
}

#[test]
fn can_execute_bcd_adjustments() {
    let mut machine = machine_with(&[
        0xB0, 0x19,         // mov al,0x19
        0x04, 0x28,         // add al,0x28
        0x27,               // daa
        0xB0, 0x4F,         // mov al,0x4f
        0xD4, 0x0A,         // aam
        0xB8, 0x09, 0x07,   // mov ax,0x709
        0xD5, 0x0A,         // aad
    ]);
    machine.execute_instructions(3).unwrap();
    assert_eq!(0x47, machine.cpu.get_r8(R::AL));

    machine.execute_instructions(2).unwrap();
    assert_eq!(0x07, machine.cpu.get_r8(R::AH));
    assert_eq!(0x09, machine.cpu.get_r8(R::AL));

    machine.execute_instructions(2).unwrap();
    assert_eq!(0x004F, machine.cpu.get_r16(R::AX));
}

#[test]
fn aam_by_zero_is_a_divide_error() {
    let mut machine = machine_with(&[
        0xD4, 0x00, // aam 0x0
    ]);
    machine.cpu.divide_error_interrupt = false;
    machine.execute_instruction().unwrap();
    assert_eq!(0x0102, machine.cpu.regs.ip.val);
}

#[test]
fn can_execute_lea_and_xchg() {
    let mut machine = machine_with(&[
        0xBB, 0x00, 0x10,   // mov bx,0x1000
        0xBE, 0x20, 0x00,   // mov si,0x20
        0x8D, 0x40, 0x05,   // lea ax,[bx+si+0x5]
        0x93,               // xchg ax,bx
    ]);
    machine.execute_instructions(3).unwrap();
    assert_eq!(0x1025, machine.cpu.get_r16(R::AX));

    machine.execute_instruction().unwrap();
    assert_eq!(0x1000, machine.cpu.get_r16(R::AX));
    assert_eq!(0x1025, machine.cpu.get_r16(R::BX));
}

#[test]
fn lea_with_register_operand_is_illegal() {
    let mut machine = machine_with(&[
        0x8D, 0xC0, // lea ax,ax
    ]);
    match machine.execute_instruction() {
        Err(Error::IllegalInstruction { opcode, .. }) => assert_eq!(vec![0x8Du8, 0xC0], opcode),
        other => panic!("expected an illegal instruction, got {:?}", other),
    }
}

#[test]
fn can_load_far_pointer() {
    let mut machine = machine_with(&[
        0xC4, 0x1E, 0x00, 0x02, // les bx,[0x200]
    ]);
    machine.board.memory.write_u16(data_address(0x200), 0x1234).unwrap();
    machine.board.memory.write_u16(data_address(0x202), 0x5678).unwrap();
    machine.execute_instruction().unwrap();
    assert_eq!(0x1234, machine.cpu.get_r16(R::BX));
    assert_eq!(0x5678, machine.cpu.get_r16(R::ES));
}

#[test]
fn can_execute_xlat() {
    let mut machine = machine_with(&[
        0xBB, 0x00, 0x03,   // mov bx,0x300
        0xB0, 0x05,         // mov al,0x5
        0xD7,               // xlatb
    ]);
    machine.board.memory.write_u8(data_address(0x305), 0x99).unwrap();
    machine.execute_instructions(3).unwrap();
    assert_eq!(0x99, machine.cpu.get_r8(R::AL));
}

#[test]
fn can_sign_extend_accumulator() {
    let mut machine = machine_with(&[
        0xB0, 0x80, // mov al,0x80
        0x98,       // cbw
        0x99,       // cwd
    ]);
    machine.execute_instructions(3).unwrap();
    assert_eq!(0xFF80, machine.cpu.get_r16(R::AX));
    assert_eq!(0xFFFF, machine.cpu.get_r16(R::DX));
}

#[test]
fn can_execute_extended_moves() {
    let mut machine = machine_with(&[
        0xB0, 0xF0,         // mov al,0xf0
        0x0F, 0xB6, 0xD8,   // movzx bx,al
        0x0F, 0xBE, 0xC8,   // movsx cx,al
        0xF9,               // stc
        0x0F, 0x92, 0xC2,   // setc dl
    ]);
    machine.execute_instructions(5).unwrap();
    assert_eq!(0x00F0, machine.cpu.get_r16(R::BX));
    assert_eq!(0xFFF0, machine.cpu.get_r16(R::CX));
    assert_eq!(0x01, machine.cpu.get_r8(R::DL));
}

#[test]
fn inc_byte_in_memory_keeps_carry() {
    let mut machine = machine_with(&[
        0xF9,                   // stc
        0xFE, 0x06, 0x00, 0x02, // inc byte [0x200]
    ]);
    machine.board.memory.write_u8(data_address(0x200), 0xFF).unwrap();
    machine.execute_instructions(2).unwrap();
    assert_eq!(0x00, machine.board.memory.read_u8(data_address(0x200)).unwrap());
    assert_eq!(true, machine.cpu.regs.flags.zero);
    assert_eq!(true, machine.cpu.regs.flags.carry);
}

#[test]
fn can_push_and_pop_all() {
    let mut machine = machine_with(&[
        0xB8, 0x11, 0x11,   // mov ax,0x1111
        0xBF, 0x22, 0x22,   // mov di,0x2222
        0x60,               // pusha
        0x31, 0xC0,         // xor ax,ax
        0x31, 0xFF,         // xor di,di
        0x61,               // popa
    ]);
    machine.execute_instructions(3).unwrap();
    assert_eq!(0xFFEE, machine.cpu.get_r16(R::SP));

    machine.execute_instructions(3).unwrap();
    assert_eq!(0x1111, machine.cpu.get_r16(R::AX));
    assert_eq!(0x2222, machine.cpu.get_r16(R::DI));
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));
}
