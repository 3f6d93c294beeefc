//! Width and folding properties checked through the builder: every
//! constant-only application must collapse to a constant matching the
//! emitted Verilog's semantics.

use bitweave::RtlBuilder;
use num_bigint::BigUint;

fn const_of(sys: &RtlBuilder, node: bitweave::BaseNode) -> u64 {
  let v = node.as_const(sys).expect("expected a folded constant");
  let digits = v.to_u64_digits();
  match digits.len() {
    0 => 0,
    1 => digits[0],
    _ => panic!("constant wider than 64 bits"),
  }
}

#[test]
fn concat_then_slice_recovers_both_halves() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.get_const_u64(8, 0xAB);
  let b = sys.get_const_u64(4, 0xC);
  let cat = sys.create_concat(a, b);
  assert_eq!(cat.width(&sys), 12);
  let lo = sys.create_slice(cat, 3, 0);
  let hi = sys.create_slice(cat, 11, 4);
  assert_eq!(const_of(&sys, lo), 0xC);
  assert_eq!(const_of(&sys, hi), 0xAB);
}

#[test]
fn zero_extend_then_slice_down_recovers_the_value() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.get_const_u64(8, 0x9D);
  let wide = sys.create_zext(a, 20);
  assert_eq!(wide.width(&sys), 20);
  let back = sys.create_slice(wide, 7, 0);
  assert_eq!(const_of(&sys, back), 0x9D);
}

#[test]
fn sign_extend_fills_the_high_bits() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.get_const_u64(4, 0b1010);
  let wide = sys.create_sext(a, 8);
  assert_eq!(const_of(&sys, wide), 0b11111010);
}

#[test]
fn arithmetic_wraps_at_the_output_width() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.get_const_u64(8, 200);
  let b = sys.get_const_u64(8, 100);
  let sum = sys.create_add(a, b);
  assert_eq!(const_of(&sys, sum), (200 + 100) % 256);
  let diff = sys.create_sub(b, a);
  assert_eq!(const_of(&sys, diff), (256 + 100 - 200) % 256);
}

#[test]
fn full_width_multiply_doubles_the_width() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.get_const_u64(8, 200);
  let b = sys.get_const_u64(8, 200);
  let wide = sys.create_mul(a, b, false, true);
  assert_eq!(wide.width(&sys), 16);
  assert_eq!(const_of(&sys, wide), 40000);
  let narrow = sys.create_mul(a, b, false, false);
  assert_eq!(narrow.width(&sys), 8);
  assert_eq!(const_of(&sys, narrow), 40000 % 256);
}

#[test]
fn shifts_follow_verilog_semantics() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.get_const_u64(8, 0x81);
  let s3 = sys.get_const_u64(4, 3);
  let shl = sys.create_shl(a, s3);
  assert_eq!(const_of(&sys, shl), 0x08);
  let shr = sys.create_shr(a, s3);
  assert_eq!(const_of(&sys, shr), 0x10);
  let ashr = sys.create_ashr(a, s3);
  assert_eq!(const_of(&sys, ashr), 0xF0);
}

#[test]
fn select_folds_through_a_constant_condition() {
  let mut sys = RtlBuilder::new("t");
  let t = sys.get_const_u64(8, 7);
  let f = sys.get_const_u64(8, 9);
  let one = sys.get_const_u64(1, 1);
  let zero = sys.get_const_u64(1, 0);
  let a = sys.create_select(one, t, f);
  let b = sys.create_select(zero, t, f);
  assert_eq!(const_of(&sys, a), 7);
  assert_eq!(const_of(&sys, b), 9);
}

#[test]
fn replicate_broadcasts_the_bit() {
  let mut sys = RtlBuilder::new("t");
  let one = sys.get_const_u64(1, 1);
  let ones = sys.create_replicate(one, 6);
  assert_eq!(const_of(&sys, ones), 0b111111);
}

#[test]
fn equal_structure_is_one_node() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.create_input("a", 8);
  let b = sys.create_input("b", 8);
  let x = sys.create_add(a, b);
  let y = sys.create_add(a, b);
  assert_eq!(x, y);
  let z = sys.create_add(b, a);
  assert_ne!(x, z);
}

#[test]
fn wide_constants_survive_folding() {
  let mut sys = RtlBuilder::new("t");
  let big = (BigUint::from(1u8) << 100u32) - BigUint::from(1u8);
  let a = sys.get_const(100, big.clone());
  let b = sys.get_const(100, BigUint::from(1u8));
  let sum = sys.create_add(a, b);
  assert_eq!(sum.as_const(&sys), Some(&BigUint::from(0u8)));
  let cat = sys.create_concat(a, b);
  assert_eq!(cat.width(&sys), 200);
  assert_eq!(cat.as_const(&sys), Some(&((big << 100u32) | BigUint::from(1u8))));
}

#[test]
#[should_panic(expected = "equal operand widths")]
fn width_mismatch_is_fatal() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.create_input("a", 8);
  let b = sys.create_input("b", 4);
  sys.create_add(a, b);
}

#[test]
#[should_panic(expected = "out of range")]
fn slice_out_of_range_is_fatal() {
  let mut sys = RtlBuilder::new("t");
  let a = sys.create_input("a", 8);
  sys.create_slice(a, 8, 0);
}
