use bsc_engine::compiler::bytecode::BytecodeWriter;
use bsc_engine::{Instruction, Vm, VmError, VmOptions};

fn assemble(program: &[Instruction]) -> Vec<u8> {
    let mut writer = BytecodeWriter::new();
    for instruction in program {
        instruction.encode(&mut writer);
    }
    writer.into_bytes()
}

fn run(program: &[Instruction]) -> Result<Vec<u8>, VmError> {
    let mut vm = Vm::new(VmOptions::default());
    vm.execute(&assemble(program))?;
    Ok(vm.stack().to_vec())
}

#[test]
fn test_add_without_ret_halts_at_end() {
    use Instruction::*;
    assert_eq!(run(&[Push8(3), Push8(4), Add8]).unwrap(), vec![7]);
}

#[test]
fn test_arithmetic_wraps() {
    use Instruction::*;
    assert_eq!(run(&[Push8(127), Push8(1), Add8]).unwrap(), vec![0x80]);
    assert_eq!(
        run(&[Push16(0x7FFF), Push16(2), Mul16]).unwrap(),
        vec![0xFE, 0xFF]
    );
    // -9 / 2 truncates toward zero
    assert_eq!(run(&[Push8(0xF7), Push8(2), Div8]).unwrap(), vec![0xFC]);
}

#[test]
fn test_variables_live_on_the_stack() {
    use Instruction::*;
    let stack = run(&[
        PushZeros(3),
        Push16(1),
        Push16(500),
        Set16,
        Push16(0),
        Iget16(1),
        Pop8,
        Set8,
    ])
    .unwrap();
    assert_eq!(stack, vec![0xF4, 0xF4, 0x01]);
}

#[test]
fn test_get_takes_address_from_stack() {
    use Instruction::*;
    let stack = run(&[PushZeros(1), Push16(0), Push8(9), Set8, Push16(0), Get8]).unwrap();
    assert_eq!(stack, vec![9, 9]);
}

#[test]
fn test_access_above_top_traps() {
    use Instruction::*;
    assert!(matches!(
        run(&[PushZeros(1), Iget16(0)]),
        Err(VmError::FrameOutOfBounds { .. })
    ));
    assert_eq!(run(&[Pop16]), Err(VmError::StackUnderflow));
}

#[test]
fn test_nested_calls_are_frame_relative() {
    use Instruction::*;
    // Outer instance: a byte at 0, then an inner instance at 1. The inner
    // body writes 5 to its own address 0, which is 2 at top level.
    let inner = assemble(&[
        Ijump(16),
        Label(0),
        Push16(0),
        Push8(5),
        Set8,
        Ret,
        Label(1),
    ]);
    assert_eq!(inner.len(), 16);

    let mut program = inner;
    let outer_entry = program.len() as u16 + 3;
    let outer_body = assemble(&[
        Label(2),
        Push16(0),
        Push8(7),
        Set8,
        Call {
            frame_delta: 1,
            target: 3,
        },
        Ret,
        Label(3),
    ]);
    let outer_exit = outer_entry + outer_body.len() as u16;
    program.extend(assemble(&[Ijump(outer_exit)]));
    program.extend(outer_body);
    program.extend(assemble(&[
        PushZeros(1),
        PushZeros(2),
        Call {
            frame_delta: 1,
            target: outer_entry,
        },
        Eof,
    ]));

    let mut vm = Vm::new(VmOptions::default());
    vm.execute(&program).unwrap();
    assert_eq!(vm.stack(), &[0, 7, 5]);
}

#[test]
fn test_stack_budget() {
    use Instruction::*;
    let mut vm = Vm::new(VmOptions {
        stack_size: 2,
        max_steps: 100,
    });
    assert_eq!(
        vm.execute(&assemble(&[Push16(1), Push8(2)])),
        Err(VmError::StackOverflow)
    );
}

#[test]
fn test_jump_out_of_bounds() {
    use Instruction::*;
    assert_eq!(run(&[Ijump(100)]), Err(VmError::JumpOutOfBounds(100)));
    // a target equal to the stream length simply halts
    assert_eq!(run(&[Ijump(3)]).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_error_kind() {
    assert_eq!(
        VmError::DivisionByZero(0).kind(),
        bsc_engine::ErrorKind::VmTrap
    );
}
