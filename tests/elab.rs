//! Elaboration semantics: guard nesting, the multi-assignment policy,
//! and conditional-block behavior, checked on the flattened netlist.

use bitweave::ir::{Opcode, VarKind};
use bitweave::RtlBuilder;
use num_bigint::BigUint;

/// Constant value of a net's input, when its driver folded.
fn input_const(netlist: &bitweave::netlist::Netlist, net: &bitweave::netlist::Net, idx: usize) -> Option<u64> {
  match &netlist.get(net.ins[idx].net).opcode {
    Opcode::Const { value } => {
      let digits = value.to_u64_digits();
      Some(if digits.is_empty() { 0 } else { digits[0] })
    }
    _ => None,
  }
}

#[test]
fn else_branch_elaborates_under_negated_guard() {
  // With a constant-true condition, the guards fold: the then-side
  // display must come out enabled and the else-side display disabled.
  let mut sys = RtlBuilder::new("t");
  let cond = sys.get_const_u64(1, 1);
  sys.if_then_else(
    cond,
    |s| {
      s.create_display(vec![bitweave::FmtAtom::lit("then")], vec![]);
    },
    |s| {
      s.create_display(vec![bitweave::FmtAtom::lit("else")], vec![]);
    },
  );
  let netlist = sys.flatten();
  let mut guards = Vec::new();
  for net in netlist.iter() {
    if let Opcode::Display { .. } = &net.opcode {
      guards.push(input_const(&netlist, net, 0).expect("guard should fold"));
    }
  }
  assert_eq!(guards, vec![1, 0]);
}

#[test]
fn nested_guards_conjoin() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.get_const_u64(1, 1);
  let b = sys.get_const_u64(1, 0);
  sys.when(a, |s| {
    s.when(b, |s| {
      s.create_finish();
    });
  });
  let netlist = sys.flatten();
  let finish = netlist
    .iter()
    .find(|net| matches!(net.opcode, Opcode::Finish))
    .unwrap();
  assert_eq!(input_const(&netlist, finish, 0), Some(0));
}

#[test]
fn unassigned_wire_is_its_default() {
  let mut sys = RtlBuilder::new("t");
  let dflt = sys.get_const_u64(8, 42);
  let w = sys.add_wire("idle", dflt);
  sys.create_output("out", w.value());
  let netlist = sys.flatten();
  let out = netlist
    .iter()
    .find(|net| matches!(net.opcode, Opcode::Output { .. }))
    .unwrap();
  assert_eq!(input_const(&netlist, out, 0), Some(42));
}

#[test]
fn multiply_assigned_wire_merges_with_its_default() {
  let mut sys = RtlBuilder::new("t");
  let zero = sys.get_const_u64(8, 0);
  let w = sys.add_wire("merged", zero);
  let c = sys.create_input("c", 1);
  let d = sys.create_input("d", 1);
  let v1 = sys.get_const_u64(8, 1);
  let v2 = sys.get_const_u64(8, 2);
  sys.when(c, |s| s.assign(w, v1));
  sys.when(d, |s| s.assign(w, v2));
  sys.create_output("out", w.value());
  let netlist = sys.flatten();
  let merge = netlist
    .iter()
    .find(|net| matches!(net.opcode, Opcode::MergeWrites { .. }))
    .expect("wire with two writers resolves to a merge");
  // Two recorded writes plus the none-active default pair.
  assert_eq!(merge.ins.len(), 6);
}

#[test]
fn register_with_one_unconditional_assignment_is_plain() {
  let mut sys = RtlBuilder::new("t");
  let zero = sys.get_const_u64(4, 0);
  let count = sys.add_reg("count", zero);
  let one = sys.get_const_u64(4, 1);
  let next = sys.create_add(count.value(), one);
  sys.assign(count, next);
  sys.create_output("out", count.value());
  let netlist = sys.flatten();
  assert!(netlist
    .iter()
    .any(|net| matches!(net.opcode, Opcode::Register)));
  assert!(!netlist
    .iter()
    .any(|net| matches!(net.opcode, Opcode::RegisterEn)));
}

#[test]
fn register_with_guarded_assignments_gets_an_or_enable() {
  let mut sys = RtlBuilder::new("t");
  let zero = sys.get_const_u64(4, 0);
  let r = sys.add_reg("r", zero);
  let c = sys.create_input("c", 1);
  let d = sys.create_input("d", 1);
  let v1 = sys.get_const_u64(4, 1);
  let v2 = sys.get_const_u64(4, 2);
  sys.when(c, |s| s.assign(r, v1));
  sys.when(d, |s| s.assign(r, v2));
  sys.create_output("out", r.value());
  let netlist = sys.flatten();
  let reg = netlist
    .iter()
    .find(|net| matches!(net.opcode, Opcode::RegisterEn))
    .expect("two guarded writers make an enabled register");
  // Enable is the OR of the two guards, data the one-hot merge.
  let en = netlist.get(reg.ins[1].net);
  assert!(matches!(&en.opcode, Opcode::Binary { .. }));
  let data = netlist.get(reg.ins[2].net);
  assert!(matches!(&data.opcode, Opcode::MergeWrites { .. }));
}

#[test]
fn unassigned_register_holds_itself() {
  let mut sys = RtlBuilder::new("t");
  let init = sys.get_const_u64(4, 9);
  let r = sys.add_reg("stuck", init);
  sys.create_output("out", r.value());
  let netlist = sys.flatten();
  let reg = netlist
    .iter()
    .find(|net| matches!(net.opcode, Opcode::Register))
    .unwrap();
  // The next input loops back onto the register's own net.
  assert_eq!(reg.ins[1].net, reg.id);
}

#[test]
fn same_program_flattens_to_identical_netlists() {
  let build = || {
    let mut sys = RtlBuilder::new("t");
    let zero = sys.get_const_u64(8, 0);
    let r = sys.add_reg("r", zero);
    let inc = sys.get_const_u64(8, 1);
    let next = sys.create_add(r.value(), inc);
    sys.assign(r, next);
    let c = sys.create_input("c", 1);
    sys.when(c, |s| {
      s.create_display(
        vec![bitweave::FmtAtom::lit("r = "), bitweave::FmtAtom::dec()],
        vec![r.value()],
      );
    });
    sys.create_output("out", r.value());
    sys.flatten().to_string()
  };
  assert_eq!(build(), build());
}

#[test]
fn variables_report_their_kind() {
  let mut sys = RtlBuilder::new("t");
  let zero = sys.get_const_u64(1, 0);
  let r = sys.add_reg("r", zero);
  let w = sys.add_wire("w", zero);
  let rv: bitweave::BaseNode = r.into();
  let wv: bitweave::BaseNode = w.into();
  assert_eq!(
    rv.as_ref::<bitweave::ir::Var>(&sys).unwrap().get().get_kind(),
    VarKind::Reg
  );
  assert_eq!(
    wv.as_ref::<bitweave::ir::Var>(&sys).unwrap().get().get_kind(),
    VarKind::Wire
  );
}

#[test]
#[should_panic(expected = "Combinational cycle")]
fn combinational_wire_cycles_are_fatal() {
  let mut sys = RtlBuilder::new("t");
  let zero = sys.get_const_u64(8, 0);
  let a = sys.add_wire("a", zero);
  let b = sys.add_wire("b", zero);
  let c = sys.create_input("c", 1);
  let av = a.value();
  let bv = b.value();
  sys.when(c, |s| {
    s.assign(a, bv);
    s.assign(b, av);
  });
  sys.create_output("out", a.value());
  sys.flatten();
}

#[test]
fn wide_constant_registers_flatten() {
  let mut sys = RtlBuilder::new("t");
  let init = sys.get_const(128, BigUint::from(7u8));
  let r = sys.add_reg("wide", init);
  let one = sys.get_const(128, BigUint::from(1u8));
  let next = sys.create_add(r.value(), one);
  sys.assign(r, next);
  sys.create_output("out", r.value());
  let netlist = sys.flatten();
  assert!(netlist.iter().any(|net| net.width == 128));
}
