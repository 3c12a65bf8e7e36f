use pretty_assertions::assert_eq;

use crate::config::MachineConfig;
use crate::cpu::R;
use crate::error::Error;
use crate::machine::Machine;
use crate::pic::Device;

fn machine_with(code: &[u8]) -> Machine {
    let mut machine = Machine::default();
    machine.load_executable(code).unwrap();
    machine
}

/// points interrupt vector `int` at 085F:`offset` and places `code` there
fn install_handler(machine: &mut Machine, int: u8, offset: u16, code: &[u8]) {
    let addr = u32::from(int) * 4;
    machine.board.memory.write_u16(addr, offset).unwrap();
    machine.board.memory.write_u16(addr + 2, 0x085F).unwrap();
    machine.load_image(code, 0x085F, offset).unwrap();
}

/// hands IRQ 3 (vector 0x0B) to a test device and unmasks the master chip
fn with_irq3(machine: &mut Machine) {
    let line = machine.board.pic.request_irq(Device::Other("test".to_owned())).unwrap();
    assert_eq!(3, line);
    machine.board.pic.out_u8(0x21, 0x00);
}

/// reads the word at SS:SP
fn stack_top(machine: &Machine) -> u16 {
    let addr = (u32::from(machine.cpu.get_r16(R::SS)) << 4) + u32::from(machine.cpu.get_r16(R::SP));
    machine.board.memory.read_u16(addr).unwrap()
}

#[test]
fn can_execute_mov_then_mov() {
    let mut machine = machine_with(&[
        0xB8, 0x05, 0x00,   // mov ax,0x5
        0x89, 0xC1,         // mov cx,ax
    ]);
    machine.execute_instructions(2).unwrap();
    assert_eq!(0x0005, machine.cpu.get_r16(R::AX));
    assert_eq!(0x0005, machine.cpu.get_r16(R::CX));
    assert_eq!(false, machine.cpu.regs.flags.zero);
    assert_eq!(0x0105, machine.cpu.regs.ip.val);
    assert_eq!(2, machine.cpu.instruction_count);
}

#[test]
fn can_handle_stack() {
    let mut machine = machine_with(&[
        0xB8, 0x88, 0x88,   // mov ax,0x8888
        0x8E, 0xD8,         // mov ds,ax
        0x1E,               // push ds
        0x07,               // pop es
    ]);
    machine.execute_instructions(2).unwrap();
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));
    machine.execute_instruction().unwrap(); // push
    assert_eq!(0xFFFC, machine.cpu.get_r16(R::SP));
    machine.execute_instruction().unwrap(); // pop
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));

    assert_eq!(0x107, machine.cpu.regs.ip.val);
    assert_eq!(0x8888, machine.cpu.get_r16(R::AX));
    assert_eq!(0x8888, machine.cpu.get_r16(R::DS));
    assert_eq!(0x8888, machine.cpu.get_r16(R::ES));
}

#[test]
fn segment_override_lasts_one_instruction() {
    let mut machine = machine_with(&[
        0xB8, 0x00, 0x30,   // mov ax,0x3000
        0x8E, 0xC0,         // mov es,ax
        0xBB, 0x10, 0x00,   // mov bx,0x10
        0x26, 0x8B, 0x07,   // mov ax,[es:bx]
        0x8B, 0x0F,         // mov cx,[bx]
    ]);
    machine.board.memory.write_u16(0x3_0010, 0x1111).unwrap();
    machine.board.memory.write_u16(0x0_85F0 + 0x10, 0x2222).unwrap();

    machine.execute_instructions(5).unwrap();
    assert_eq!(0x1111, machine.cpu.get_r16(R::AX));
    assert_eq!(0x2222, machine.cpu.get_r16(R::CX));
    assert_eq!(0x010D, machine.cpu.regs.ip.val);
    assert_eq!(None, machine.cpu.prefixes.segment_override());
}

#[test]
fn bp_based_addressing_defaults_to_ss() {
    let mut machine = machine_with(&[
        0xB8, 0x00, 0x20,       // mov ax,0x2000
        0x8E, 0xD0,             // mov ss,ax
        0xB8, 0x00, 0x30,       // mov ax,0x3000
        0x8E, 0xD8,             // mov ds,ax
        0xBD, 0x10, 0x00,       // mov bp,0x10
        0x8B, 0x46, 0x02,       // mov ax,[bp+0x2]
        0x8B, 0x1E, 0x12, 0x00, // mov bx,[0x12]
        0x3E, 0x8B, 0x4E, 0x02, // mov cx,[ds:bp+0x2]
        0x8B, 0x53, 0x02,       // mov dx,[bp+di+0x2]
    ]);
    machine.board.memory.write_u16(0x2_0012, 0xBEEF).unwrap();
    machine.board.memory.write_u16(0x3_0012, 0xCAFE).unwrap();

    machine.execute_instructions(9).unwrap();
    assert_eq!(0xBEEF, machine.cpu.get_r16(R::AX));
    assert_eq!(0xCAFE, machine.cpu.get_r16(R::BX));
    assert_eq!(0xCAFE, machine.cpu.get_r16(R::CX));
    assert_eq!(0xBEEF, machine.cpu.get_r16(R::DX));
}

#[test]
fn operand_size_prefix_widens_one_instruction() {
    let mut machine = machine_with(&[
        0x66, 0xB8, 0x78, 0x56, 0x34, 0x12, // mov eax,0x12345678
        0xB8, 0x01, 0x00,                   // mov ax,0x1
    ]);
    machine.execute_instruction().unwrap();
    assert_eq!(0x1234_5678, machine.cpu.get_r32(R::EAX));
    assert_eq!(0x0106, machine.cpu.regs.ip.val);

    machine.execute_instruction().unwrap();
    assert_eq!(0x1234_0001, machine.cpu.get_r32(R::EAX));
    assert_eq!(0x0109, machine.cpu.regs.ip.val);
}

#[test]
fn illegal_double_byte_opcode_is_fatal() {
    let mut machine = machine_with(&[0x0F, 0xFF]);
    match machine.execute_instruction() {
        Err(Error::IllegalInstruction { opcode, cs, ip, count }) => {
            assert_eq!(vec![0x0Fu8, 0xFF], opcode);
            assert_eq!(0x085F, cs);
            assert_eq!(0x0100, ip);
            assert_eq!(0, count);
        }
        other => panic!("expected an illegal instruction, got {:?}", other),
    }
    assert_eq!(true, machine.cpu.fatal_error);
}

#[test]
fn illegal_instruction_reports_its_prefixes() {
    let mut machine = machine_with(&[
        0x90,               // nop
        0x2E, 0x0F, 0xFF,   // cs: (bad)
    ]);
    machine.execute_instruction().unwrap();
    match machine.execute_instruction() {
        Err(Error::IllegalInstruction { opcode, ip, count, .. }) => {
            assert_eq!(vec![0x2Eu8, 0x0F, 0xFF], opcode);
            assert_eq!(0x0101, ip);
            assert_eq!(1, count);
        }
        other => panic!("expected an illegal instruction, got {:?}", other),
    }
}

#[test]
fn malformed_group_encoding_is_fatal() {
    let mut machine = machine_with(&[0xFE, 0xD0]); // fe /2 is undefined
    match machine.execute_instruction() {
        Err(Error::IllegalInstruction { opcode, .. }) => assert_eq!(vec![0xFEu8, 0xD0], opcode),
        other => panic!("expected an illegal instruction, got {:?}", other),
    }
}

#[test]
fn unassigned_opcode_is_skipped() {
    let mut machine = machine_with(&[
        0xD6,   // salc, not on the 8086
        0x40,   // inc ax
    ]);
    machine.execute_instruction().unwrap();
    assert_eq!(0x0101, machine.cpu.regs.ip.val);
    assert_eq!(false, machine.cpu.fatal_error);
    machine.execute_instruction().unwrap();
    assert_eq!(1, machine.cpu.get_r16(R::AX));
}

#[test]
fn unknown_port_is_an_error() {
    let mut machine = machine_with(&[
        0xE4, 0x99, // in al,0x99
    ]);
    match machine.execute_instruction() {
        Err(Error::UnknownPort { port, width }) => {
            assert_eq!(0x99, port);
            assert_eq!(8, width);
        }
        other => panic!("expected an unknown port error, got {:?}", other),
    }
}

#[test]
fn unknown_port_can_be_ignored() {
    let mut config = MachineConfig::default();
    config.io.ignore_unknown_ports = true;
    let mut machine = Machine::from_config(config);
    machine.load_executable(&[
        0xE4, 0x99,         // in al,0x99
        0xE7, 0x99,         // out 0x99,ax
    ]).unwrap();
    machine.execute_instructions(2).unwrap();
    assert_eq!(0xFF, machine.cpu.get_r8(R::AL));
}

#[test]
fn can_program_the_pic_with_out() {
    let mut machine = machine_with(&[
        0xB0, 0x11,     // mov al,0x11
        0xE6, 0x20,     // out 0x20,al
        0xB0, 0x20,     // mov al,0x20
        0xE6, 0x21,     // out 0x21,al
        0xB0, 0x04,     // mov al,0x4
        0xE6, 0x21,     // out 0x21,al
        0xB0, 0x01,     // mov al,0x1
        0xE6, 0x21,     // out 0x21,al
        0xE4, 0x21,     // in al,0x21
        0xE5, 0x20,     // in ax,0x20
    ]);
    machine.execute_instructions(9).unwrap();
    assert_eq!(0x20, machine.board.pic.master().interrupt_offset);
    assert_eq!(false, machine.board.pic.master().init.in_init);
    assert_eq!(0x00, machine.cpu.get_r8(R::AL));

    // the 8259 has no word registers
    machine.execute_instruction().unwrap();
    assert_eq!(0xFFFF, machine.cpu.get_r16(R::AX));
}

#[test]
fn irq_is_delivered_on_second_boundary() {
    let mut machine = machine_with(&[
        0xFB,   // sti
        0x90,   // nop
        0x90,   // nop
        0x90,   // nop
    ]);
    install_handler(&mut machine, 0x0B, 0x0200, &[
        0xBB, 0x11, 0x11,   // mov bx,0x1111
        0xCF,               // iret
    ]);
    with_irq3(&mut machine);

    machine.execute_instruction().unwrap(); // sti
    machine.board.pic.set_irq(3);

    machine.execute_instruction().unwrap(); // nop, request latched
    assert_eq!(0x0102, machine.cpu.regs.ip.val);
    assert_eq!(0, machine.cpu.get_r16(R::BX));

    machine.execute_instruction().unwrap(); // delivery, mov bx
    assert_eq!(0x085F, machine.cpu.get_r16(R::CS));
    assert_eq!(0x0203, machine.cpu.regs.ip.val);
    assert_eq!(0x1111, machine.cpu.get_r16(R::BX));
    assert_eq!(false, machine.cpu.regs.flags.interrupt);
    assert_eq!(0x0102, stack_top(&machine));
    assert_eq!(0x08, machine.board.pic.master().isr);

    machine.execute_instruction().unwrap(); // iret
    assert_eq!(0x0102, machine.cpu.regs.ip.val);
    assert_eq!(true, machine.cpu.regs.flags.interrupt);
}

#[test]
fn instruction_after_sti_runs_before_delivery() {
    let mut machine = machine_with(&[
        0xFB,   // sti
        0x90,   // nop
        0x90,   // nop
    ]);
    install_handler(&mut machine, 0x0B, 0x0200, &[
        0xBB, 0x11, 0x11,   // mov bx,0x1111
        0xCF,               // iret
    ]);
    with_irq3(&mut machine);
    machine.board.pic.set_irq(3);

    machine.execute_instruction().unwrap(); // sti
    machine.execute_instruction().unwrap(); // nop
    assert_eq!(0x0102, machine.cpu.regs.ip.val);
    assert_eq!(0, machine.cpu.get_r16(R::BX));

    machine.execute_instruction().unwrap();
    assert_eq!(0x1111, machine.cpu.get_r16(R::BX));
}

#[test]
fn irq_waits_while_interrupts_are_disabled() {
    let mut machine = machine_with(&[0x90, 0x90, 0x90, 0x90, 0x90]);
    with_irq3(&mut machine);
    machine.board.pic.set_irq(3);
    machine.execute_instructions(5).unwrap();
    assert_eq!(0x0105, machine.cpu.regs.ip.val);
    assert_eq!(true, machine.board.pic.interrupt_pending());
    assert_eq!(0, machine.board.pic.master().isr);
}

#[test]
fn hlt_is_woken_by_irq() {
    let mut machine = machine_with(&[
        0xFB,               // sti
        0xF4,               // hlt
        0xB8, 0x01, 0x00,   // mov ax,0x1
    ]);
    install_handler(&mut machine, 0x0B, 0x0200, &[
        0xBB, 0x22, 0x22,   // mov bx,0x2222
        0xCF,               // iret
    ]);
    with_irq3(&mut machine);

    machine.execute_instructions(3).unwrap();
    assert_eq!(true, machine.cpu.halted);
    assert_eq!(0x0102, machine.cpu.regs.ip.val);

    machine.board.pic.set_irq(3);
    machine.execute_instruction().unwrap();
    assert_eq!(true, machine.cpu.halted);
    machine.execute_instruction().unwrap();
    assert_eq!(false, machine.cpu.halted);
    assert_eq!(0x2222, machine.cpu.get_r16(R::BX));

    machine.execute_instructions(2).unwrap(); // iret, mov
    assert_eq!(0x0001, machine.cpu.get_r16(R::AX));
    assert_eq!(0x0105, machine.cpu.regs.ip.val);
}

#[test]
fn divide_error_vectors_through_int0() {
    let mut machine = machine_with(&[
        0xB8, 0x0A, 0x00,   // mov ax,0xa
        0xB3, 0x00,         // mov bl,0x0
        0xF6, 0xF3,         // div bl
        0x90,               // nop
    ]);
    install_handler(&mut machine, 0x00, 0x0300, &[
        0xB9, 0x33, 0x33,   // mov cx,0x3333
        0xCF,               // iret
    ]);
    machine.execute_instructions(3).unwrap();
    assert_eq!(0x0300, machine.cpu.regs.ip.val);
    assert_eq!(0xFFF8, machine.cpu.get_r16(R::SP));
    assert_eq!(0x0107, stack_top(&machine));
    assert_eq!(false, machine.cpu.fatal_error);

    machine.execute_instructions(2).unwrap();
    assert_eq!(0x3333, machine.cpu.get_r16(R::CX));
    assert_eq!(0x0107, machine.cpu.regs.ip.val);
    assert_eq!(0x000A, machine.cpu.get_r16(R::AX));
}

#[test]
fn divide_error_can_be_logged_only() {
    let mut machine = machine_with(&[
        0xB8, 0x0A, 0x00,   // mov ax,0xa
        0xB3, 0x00,         // mov bl,0x0
        0xF6, 0xF3,         // div bl
        0x90,               // nop
    ]);
    machine.cpu.divide_error_interrupt = false;
    machine.execute_instructions(3).unwrap();
    assert_eq!(0x0107, machine.cpu.regs.ip.val);
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));
}

#[test]
fn trap_flag_raises_int1_after_next_instruction() {
    let mut machine = machine_with(&[
        0x9C,               // pushf
        0x58,               // pop ax
        0x0D, 0x00, 0x01,   // or ax,0x100
        0x50,               // push ax
        0x9D,               // popf
        0x90,               // nop
        0x90,               // nop
    ]);
    install_handler(&mut machine, 0x01, 0x0400, &[
        0x90,   // nop
        0xCF,   // iret
    ]);
    machine.execute_instructions(5).unwrap();
    assert_eq!(true, machine.cpu.regs.flags.trap);
    assert_eq!(0x0107, machine.cpu.regs.ip.val);

    machine.execute_instruction().unwrap();
    assert_eq!(0x0400, machine.cpu.regs.ip.val);
    assert_eq!(false, machine.cpu.regs.flags.trap);
    assert_eq!(0x0108, stack_top(&machine));
}

#[test]
fn bus_hold_delays_execution() {
    let mut machine = machine_with(&[
        0x40,   // inc ax
        0x40,   // inc ax
    ]);
    machine.board.request_hold(2);
    machine.execute_instructions(2).unwrap();
    assert_eq!(0, machine.cpu.get_r16(R::AX));
    assert_eq!(0x0100, machine.cpu.regs.ip.val);
    assert_eq!(0, machine.cpu.instruction_count);

    machine.execute_instruction().unwrap();
    assert_eq!(1, machine.cpu.get_r16(R::AX));
}

#[test]
fn registers_and_flags_by_name() {
    let mut machine = Machine::default();
    let cpu = &mut machine.cpu;
    assert_eq!(Some(()), cpu.set_register("AX", 0x1234));
    assert_eq!(Some(0x12), cpu.get_register("ah"));
    assert_eq!(Some(0x34), cpu.get_register("al"));
    assert_eq!(None, cpu.get_register("xx"));
    assert_eq!(None, cpu.set_register("xx", 1));

    if let Some(bx) = cpu.register_by_name("bl") {
        bx.val = 0xABCD;
    }
    assert_eq!(0xABCD, cpu.get_r16(R::BX));

    assert_eq!(Some(()), cpu.set_flag('z', true));
    assert_eq!(Some(true), cpu.get_flag('Z'));
    assert_eq!(None, cpu.get_flag('q'));
    assert_eq!(None, cpu.set_flag('q', true));
}
