use num_bigint::BigUint;

/// `{ bits { value } }`.
pub(super) fn broadcast(value: &str, bits: usize) -> String {
  format!("{{{}{{{}}}}}", bits, value)
}

/// One-hot merge: OR together `({bits{enable}} & value)` terms. The
/// result is don't-care when the pair list is empty.
pub(super) fn select_1h<'a>(
  iter: impl Iterator<Item = (&'a str, &'a str)>,
  bits: usize,
) -> String {
  reduce(
    iter.map(|(en, value)| format!("({} & {})", broadcast(en, bits), value)),
    " | ",
    bits,
  )
}

pub(super) fn reduce(iter: impl Iterator<Item = String>, join: &str, bits: usize) -> String {
  let res = iter.collect::<Vec<_>>().join(join);
  if res.is_empty() {
    dontcare_literal(bits)
  } else {
    res
  }
}

/// `w'hX` literal of a constant.
pub(super) fn const_literal(value: &BigUint, bits: usize) -> String {
  format!("{}'h{:x}", bits, value)
}

/// `w'bxx…x` literal.
pub(super) fn dontcare_literal(bits: usize) -> String {
  format!("{}'b{}", bits, "x".repeat(bits))
}

/// `[w-1:0] ` when the width needs a range, empty for 1-bit ports.
pub(super) fn port_range(bits: usize) -> String {
  if bits > 1 {
    format!("[{}:0] ", bits - 1)
  } else {
    String::new()
  }
}

/// Escape a string for a Verilog string literal.
pub(super) fn escape(s: &str) -> String {
  let mut res = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '"' => res.push_str("\\\""),
      '\\' => res.push_str("\\\\"),
      '\n' => res.push_str("\\n"),
      '\t' => res.push_str("\\t"),
      '%' => res.push_str("%%"),
      _ => res.push(c),
    }
  }
  res
}
