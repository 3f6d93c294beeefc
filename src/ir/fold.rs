//! Compile-time evaluation of primitives over constant operands. The
//! results must agree bit-for-bit with the Verilog the printer emits.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};

use crate::ir::expr::{subcode, MergeStrategy, Opcode};

pub(crate) fn mask(w: usize) -> BigUint {
  (BigUint::one() << w) - BigUint::one()
}

pub(crate) fn truncate(v: &BigUint, w: usize) -> BigUint {
  v & mask(w)
}

fn to_signed(v: &BigUint, w: usize) -> BigInt {
  if v.bit((w - 1) as u64) {
    BigInt::from(v.clone()) - (BigInt::one() << w)
  } else {
    BigInt::from(v.clone())
  }
}

fn from_signed(v: BigInt, w: usize) -> BigUint {
  let m = BigInt::one() << w;
  let r = ((v % &m) + &m) % m;
  r.to_biguint().unwrap()
}

fn bool_val(b: bool) -> BigUint {
  if b {
    BigUint::one()
  } else {
    BigUint::zero()
  }
}

/// Evaluate `opcode` over constant operands `(value, width)`, producing a
/// value of width `out_w`. `None` means the node does not fold (stateful
/// or effectful primitives, and division by zero, which Verilog leaves
/// undefined).
pub(crate) fn fold(opcode: &Opcode, args: &[(BigUint, usize)], out_w: usize) -> Option<BigUint> {
  use subcode::Binary::*;
  use subcode::Compare::*;
  let res = match opcode {
    Opcode::Binary { binop } => {
      let (a, w) = (&args[0].0, args[0].1);
      let b = &args[1].0;
      match binop {
        Add => truncate(&(a + b), w),
        Sub => truncate(&((mask(w) + BigUint::one()) + a - b), w),
        Div => {
          if b.is_zero() {
            return None;
          }
          a / b
        }
        Mod => {
          if b.is_zero() {
            return None;
          }
          a % b
        }
        BitwiseAnd => a & b,
        BitwiseOr => a | b,
        BitwiseXor => a ^ b,
        Shl => match b.to_usize() {
          Some(s) if s < w => truncate(&(a << s), w),
          _ => BigUint::zero(),
        },
        Shr => match b.to_usize() {
          Some(s) if s < w => a >> s,
          _ => BigUint::zero(),
        },
        AShr => {
          let neg = a.bit((w - 1) as u64);
          match b.to_usize() {
            Some(s) if s < w => {
              let shifted = a >> s;
              if neg {
                shifted | (mask(s) << (w - s))
              } else {
                shifted
              }
            }
            _ => {
              if neg {
                mask(w)
              } else {
                BigUint::zero()
              }
            }
          }
        }
      }
    }
    Opcode::Mul { signed, full } => {
      let (a, w) = (&args[0].0, args[0].1);
      let b = &args[1].0;
      let wide = if *signed {
        from_signed(to_signed(a, w) * to_signed(b, w), 2 * w)
      } else {
        a * b
      };
      if *full {
        wide
      } else {
        truncate(&wide, w)
      }
    }
    Opcode::Unary { uop } => match uop {
      subcode::Unary::Flip => &args[0].0 ^ mask(args[0].1),
    },
    Opcode::Compare { cmp } => {
      let a = &args[0].0;
      let b = &args[1].0;
      bool_val(match cmp {
        EQ => a == b,
        NEQ => a != b,
        ILT => a < b,
        ILE => a <= b,
      })
    }
    Opcode::Replicate => {
      if args[0].0.is_zero() {
        BigUint::zero()
      } else {
        mask(out_w)
      }
    }
    Opcode::ZeroExt => args[0].0.clone(),
    Opcode::SignExt => {
      let (a, w) = (&args[0].0, args[0].1);
      if a.bit((w - 1) as u64) {
        a | (mask(out_w - w) << w)
      } else {
        a.clone()
      }
    }
    Opcode::Slice { hi: _, lo } => truncate(&(&args[0].0 >> *lo), out_w),
    Opcode::Concat => {
      let b_w = args[1].1;
      (&args[0].0 << b_w) | &args[1].0
    }
    Opcode::Identity => args[0].0.clone(),
    Opcode::Mux => {
      let idx = args[0].0.to_usize()?;
      args[1 + idx].0.clone()
    }
    Opcode::MergeWrites {
      strategy: MergeStrategy::Or,
    } => {
      let mut acc = BigUint::zero();
      for pair in args.chunks(2) {
        if !pair[0].0.is_zero() {
          acc |= &pair[1].0;
        }
      }
      acc
    }
    _ => return None,
  };
  debug_assert!(res <= mask(out_w));
  Some(res)
}
