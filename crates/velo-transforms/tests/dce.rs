//! Dead-code elimination scenarios: unreachable blocks, unused defs,
//! def-use chains, and the fold/peephole/dce pipeline.

use velo_ir::{Function, InstKind, InstRef, Opcode, Type};
use velo_transforms::{ConstantFolding, Dce, Pass, Peephole};

fn insts_of(f: &Function, block: velo_ir::BlockId) -> Vec<InstRef> {
    f.get_block(block)
        .unwrap()
        .insts()
        .map(|i| InstRef::new(block, i))
        .collect()
}

#[test]
fn unreachable_blocks_are_removed() {
    let mut f = Function::new("foo", Type::Void, vec![]);
    let entry = f.append_block();
    let target = f.append_block();
    let orphan = f.append_block();
    f.append_br(entry, target).unwrap();
    f.append_ret(target, None).unwrap();
    // The orphan branches into the live graph; its predecessor link must
    // disappear with it.
    f.append_br(orphan, target).unwrap();
    assert!(f.get_block(target).unwrap().has_predecessor(orphan));

    Dce.run(&mut f).unwrap();

    assert_eq!(f.blocks_count(), 2);
    assert!(f.get_block(orphan).is_none());
    let preds: Vec<_> = f.get_block(target).unwrap().predecessors().collect();
    assert_eq!(preds, vec![entry]);
}

#[test]
fn entry_is_never_removed() {
    let mut f = Function::new("foo", Type::Void, vec![]);
    let entry = f.append_block();
    f.append_ret(entry, None).unwrap();

    Dce.run(&mut f).unwrap();
    assert_eq!(f.blocks_count(), 1);
    assert!(f.get_block(entry).is_some());
}

#[test]
fn unused_defs_are_removed() {
    let mut f = Function::new("foo", Type::I64, vec![Type::I64]);
    let bb = f.append_block();
    let arg = f.append_arg(bb, 0).unwrap();
    let unused = f.append_const(bb, Type::I64, 5).unwrap();
    f.append_ret(bb, Some(arg)).unwrap();

    Dce.run(&mut f).unwrap();

    assert!(f.get_inst(unused).is_none());
    let insts = insts_of(&f, bb);
    assert_eq!(insts.len(), 2);
    assert_eq!(f.get_inst(insts[0]).unwrap().opcode(), Opcode::Arg);
    assert_eq!(f.get_inst(insts[1]).unwrap().opcode(), Opcode::Ret);
}

#[test]
fn dead_chains_collapse_completely() {
    let mut f = Function::new("foo", Type::Void, vec![]);
    let bb = f.append_block();
    // c feeds b feeds a; nothing uses a. All three must go, which takes
    // more than one sweep in textual order.
    let c = f.append_const(bb, Type::I64, 1).unwrap();
    let b = f.append_binary(bb, Opcode::Add, c, c).unwrap();
    let a = f.append_binary(bb, Opcode::Mul, b, b).unwrap();
    f.append_ret(bb, None).unwrap();

    Dce.run(&mut f).unwrap();

    assert!(f.get_inst(a).is_none());
    assert!(f.get_inst(b).is_none());
    assert!(f.get_inst(c).is_none());
    assert_eq!(f.get_block(bb).unwrap().len(), 1);
}

#[test]
fn used_defs_and_terminators_survive() {
    let mut f = Function::new("foo", Type::I64, vec![]);
    let b0 = f.append_block();
    let b1 = f.append_block();
    let value = f.append_const(b0, Type::I64, 9).unwrap();
    f.append_br(b0, b1).unwrap();
    f.append_ret(b1, Some(value)).unwrap();

    Dce.run(&mut f).unwrap();

    assert!(f.get_inst(value).is_some());
    assert_eq!(f.get_block(b0).unwrap().len(), 2);
    assert_eq!(f.get_block(b1).unwrap().len(), 1);
}

#[test]
fn pipeline_reduces_constant_expression_to_return() {
    // ((1 + 2) * (8 - 3)) -> fold -> dce leaves just the result.
    let mut f = Function::new("mix", Type::I64, vec![]);
    let bb = f.append_block();
    let c1 = f.append_const(bb, Type::I64, 1).unwrap();
    let c2 = f.append_const(bb, Type::I64, 2).unwrap();
    let add = f.append_binary(bb, Opcode::Add, c1, c2).unwrap();
    let c8 = f.append_const(bb, Type::I64, 8).unwrap();
    let c3 = f.append_const(bb, Type::I64, 3).unwrap();
    let sub = f.append_binary(bb, Opcode::Sub, c8, c3).unwrap();
    let mul = f.append_binary(bb, Opcode::Mul, add, sub).unwrap();
    f.append_ret(bb, Some(mul)).unwrap();

    ConstantFolding.run(&mut f).unwrap();
    Peephole.run(&mut f).unwrap();
    Dce.run(&mut f).unwrap();

    let insts = insts_of(&f, bb);
    assert_eq!(insts.len(), 2, "{f}");
    let result = f.get_inst(insts[0]).unwrap();
    assert_eq!(result.opcode(), Opcode::Const);
    assert_eq!(result.const_value(), Some(15));
    match f.get_inst(insts[1]).unwrap().kind() {
        InstKind::Ret { value } => assert_eq!(*value, Some(insts[0])),
        _ => panic!("expected ret"),
    }
    insta::assert_snapshot!(f.dump().unwrap(), @r"
    i64 mix():
    %bb0:
        %0.10 = i64 constant 15 ; used by: %0.7
        %0.7 ret i64 %0.10
    ");
}

#[test]
fn unreachable_loop_with_cross_block_uses_is_removed() {
    let mut f = Function::new("foo", Type::Void, vec![]);
    let entry = f.append_block();
    let dead_a = f.append_block();
    let dead_b = f.append_block();
    f.append_ret(entry, None).unwrap();
    // Two unreachable blocks referencing each other's defs and blocks.
    let x = f.append_const(dead_a, Type::I64, 1).unwrap();
    f.append_br(dead_a, dead_b).unwrap();
    let y = f.append_binary(dead_b, Opcode::Add, x, x).unwrap();
    let _ = y;
    f.append_br(dead_b, dead_a).unwrap();

    Dce.run(&mut f).unwrap();

    assert_eq!(f.blocks_count(), 1);
    assert!(f.get_block(dead_a).is_none());
    assert!(f.get_block(dead_b).is_none());
}
