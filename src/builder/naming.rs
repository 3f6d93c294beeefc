//! Deterministic synthesis of Verilog-legal identifiers from name hints.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::NameHints;

static ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new("[^A-Za-z0-9_]").unwrap());

/// Replace every character Verilog cannot carry in an identifier with `_`.
pub fn sanitize(frag: &str) -> String {
  ILLEGAL.replace_all(frag, "_").into_owned()
}

/// Join the hint fragments prefixes-roots-suffixes with underscores,
/// falling back to `v` for hintless nets, and append the net id, which
/// alone guarantees uniqueness across the module.
pub fn mangle(hints: &NameHints, net_id: usize) -> String {
  let joined = hints
    .fragments()
    .map(sanitize)
    .filter(|x| !x.is_empty())
    .collect::<Vec<_>>()
    .join("_");
  let mut res = if joined.is_empty() {
    "v".to_string()
  } else {
    joined
  };
  if res.starts_with(|c: char| c.is_ascii_digit()) {
    res.insert(0, 'v');
  }
  res.push('_');
  res.push_str(&net_id.to_string());
  res
}
