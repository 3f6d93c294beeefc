//! Bit-pattern matchers over fixed-width words. A pattern is a sequence
//! of literal runs and named fields listed most-significant first; a
//! field name may occur several times, and extraction concatenates the
//! scattered runs back together with the highest run first. Decoders for
//! instruction sets with scattered immediates fall out directly.

use num_bigint::BigUint;

use crate::builder::RtlBuilder;
use crate::ir::BaseNode;

enum Token {
  Lit { width: usize, value: BigUint },
  Var { name: String, width: usize },
}

pub struct BitPat {
  tokens: Vec<Token>,
}

impl Default for BitPat {
  fn default() -> Self {
    Self::new()
  }
}

impl BitPat {
  pub fn new() -> Self {
    Self { tokens: Vec::new() }
  }

  /// Append a literal run on the low side.
  pub fn lit(mut self, width: usize, value: u64) -> Self {
    assert!(width != 0, "A pattern literal needs a non-zero width");
    let value = BigUint::from(value);
    assert!(
      value < (BigUint::from(1u8) << width),
      "Pattern literal {} does not fit b{}",
      value,
      width
    );
    self.tokens.push(Token::Lit { width, value });
    self
  }

  /// Append a named field on the low side.
  pub fn var(mut self, name: &str, width: usize) -> Self {
    assert!(width != 0, "A pattern field needs a non-zero width");
    self.tokens.push(Token::Var {
      name: name.into(),
      width,
    });
    self
  }

  pub fn width(&self) -> usize {
    self
      .tokens
      .iter()
      .map(|x| match x {
        Token::Lit { width, .. } => *width,
        Token::Var { width, .. } => *width,
      })
      .sum()
  }

  /// Bit ranges `(hi, lo)` of each token, most-significant first.
  fn ranges(&self) -> Vec<(usize, usize)> {
    let mut hi = self.width();
    self
      .tokens
      .iter()
      .map(|x| {
        let width = match x {
          Token::Lit { width, .. } => *width,
          Token::Var { width, .. } => *width,
        };
        let range = (hi - 1, hi - width);
        hi -= width;
        range
      })
      .collect()
  }

  /// The 1-bit condition that `subject` matches every literal run.
  pub fn matches(&self, sys: &mut RtlBuilder, subject: BaseNode) -> BaseNode {
    assert_eq!(
      subject.width(sys),
      self.width(),
      "Pattern of width b{} matched against b{}",
      self.width(),
      subject.width(sys)
    );
    let mut cond = sys.get_const_u64(1, 1);
    for (token, (hi, lo)) in self.tokens.iter().zip(self.ranges()) {
      if let Token::Lit { width, value } = token {
        let run = sys.create_slice(subject, hi, lo);
        let want = sys.get_const(*width, value.clone());
        let eq = sys.create_eq(run, want);
        cond = sys.create_bitwise_and(cond, eq);
      }
    }
    cond
  }

  /// Reassemble the named (possibly scattered) field from `subject`.
  pub fn extract(&self, sys: &mut RtlBuilder, subject: BaseNode, name: &str) -> BaseNode {
    let mut runs = Vec::new();
    for (token, (hi, lo)) in self.tokens.iter().zip(self.ranges()) {
      if let Token::Var { name: n, .. } = token {
        if n == name {
          runs.push(sys.create_slice(subject, hi, lo));
        }
      }
    }
    assert!(
      !runs.is_empty(),
      "Pattern has no field named {}",
      name
    );
    sys.create_concat_many(&runs)
  }
}

/// An ordered list of pattern alternatives; dispatch runs each body under
/// its match condition, with earlier alternatives taking priority.
pub struct BitScan {
  pats: Vec<BitPat>,
}

impl Default for BitScan {
  fn default() -> Self {
    Self::new()
  }
}

impl BitScan {
  pub fn new() -> Self {
    Self { pats: Vec::new() }
  }

  pub fn alt(mut self, pat: BitPat) -> Self {
    self.pats.push(pat);
    self
  }

  pub fn get(&self, idx: usize) -> &BitPat {
    &self.pats[idx]
  }

  /// Elaborate `body(sys, i)` under the guard "alternative `i` is the
  /// first match of `subject`".
  pub fn dispatch(
    &self,
    sys: &mut RtlBuilder,
    subject: BaseNode,
    mut body: impl FnMut(&mut RtlBuilder, usize),
  ) {
    let mut none_before = sys.get_const_u64(1, 1);
    for (i, pat) in self.pats.iter().enumerate() {
      let m = pat.matches(sys, subject);
      let g = sys.create_bitwise_and(m, none_before);
      sys.when(g, |s| body(s, i));
      let nm = sys.create_flip(m);
      none_before = sys.create_bitwise_and(none_before, nm);
    }
  }
}
