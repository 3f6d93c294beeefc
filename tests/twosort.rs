//! Two-sort: `(a < b) ? (a, b) : (b, a)` over 8-bit values. The pair is
//! checked by folding both input orders and by emitting a module with
//! boundary ports.

use bitweave::backend::verilog;
use bitweave::{BaseNode, RtlBuilder};

fn two_sort(sys: &mut RtlBuilder, a: BaseNode, b: BaseNode) -> (BaseNode, BaseNode) {
  let lt = sys.create_ilt(a, b);
  let lo = sys.create_select(lt, a, b);
  let hi = sys.create_select(lt, b, a);
  (lo, hi)
}

fn const_of(sys: &RtlBuilder, node: BaseNode) -> u64 {
  let v = node.as_const(sys).expect("expected a folded constant");
  let digits = v.to_u64_digits();
  if digits.is_empty() {
    0
  } else {
    digits[0]
  }
}

#[test]
fn sorted_input_stays_sorted() {
  let mut sys = RtlBuilder::new("twosort");
  let a = sys.get_const_u64(8, 1);
  let b = sys.get_const_u64(8, 2);
  let (lo, hi) = two_sort(&mut sys, a, b);
  assert_eq!(const_of(&sys, lo), 1);
  assert_eq!(const_of(&sys, hi), 2);
}

#[test]
fn reversed_input_gets_sorted() {
  let mut sys = RtlBuilder::new("twosort");
  let a = sys.get_const_u64(8, 2);
  let b = sys.get_const_u64(8, 1);
  let (lo, hi) = two_sort(&mut sys, a, b);
  assert_eq!(const_of(&sys, lo), 1);
  assert_eq!(const_of(&sys, hi), 2);
}

#[test]
fn equal_inputs_pass_through() {
  let mut sys = RtlBuilder::new("twosort");
  let a = sys.get_const_u64(8, 7);
  let b = sys.get_const_u64(8, 7);
  let (lo, hi) = two_sort(&mut sys, a, b);
  assert_eq!(const_of(&sys, lo), 7);
  assert_eq!(const_of(&sys, hi), 7);
}

#[test]
fn module_exposes_both_ports_of_the_pair() {
  let mut sys = RtlBuilder::new("twosort");
  let a = sys.create_input("a", 8);
  let b = sys.create_input("b", 8);
  let (lo, hi) = two_sort(&mut sys, a, b);
  sys.create_output("lo", lo);
  sys.create_output("hi", hi);
  let netlist = sys.flatten();
  let text = verilog::emit(&netlist);
  assert!(text.contains("input wire [7:0] a"));
  assert!(text.contains("input wire [7:0] b"));
  assert!(text.contains("output wire [7:0] lo"));
  assert!(text.contains("output wire [7:0] hi"));
  // Both selects share the one comparison node.
  let text2 = verilog::emit(&netlist);
  assert_eq!(text, text2);
  assert_eq!(text.matches(" < ").count(), 1);
}
