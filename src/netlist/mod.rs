//! The flattened circuit: a dense, creation-ordered array of primitive
//! instances wired by input references.

use std::fmt::{Display, Formatter};

use crate::builder::naming;
use crate::ir::{NameHints, Opcode};

mod flatten;

/// A reference to another net, optionally through one of its named output
/// ports (block RAMs and custom instances have more than one).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetInput {
  pub net: usize,
  pub port: Option<String>,
}

impl NetInput {
  pub fn new(net: usize) -> Self {
    Self { net, port: None }
  }

  pub fn with_port(net: usize, port: &str) -> Self {
    Self {
      net,
      port: Some(port.into()),
    }
  }
}

/// One numbered primitive instance.
pub struct Net {
  pub id: usize,
  pub opcode: Opcode,
  pub ins: Vec<NetInput>,
  pub width: usize,
  pub hints: NameHints,
}

/// The whole flattened module, indexed densely by net id with no
/// deletions. Creation order is elaboration order, which makes emission
/// deterministic.
pub struct Netlist {
  name: String,
  nets: Vec<Net>,
}

impl Netlist {
  pub(crate) fn new(name: String) -> Self {
    Self {
      name,
      nets: Vec::new(),
    }
  }

  pub fn get_name(&self) -> &str {
    &self.name
  }

  pub fn len(&self) -> usize {
    self.nets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nets.is_empty()
  }

  pub fn get(&self, id: usize) -> &Net {
    &self.nets[id]
  }

  pub fn iter(&self) -> impl Iterator<Item = &Net> {
    self.nets.iter()
  }

  /// The Verilog identifier of a net.
  pub fn net_name(&self, id: usize) -> String {
    naming::mangle(&self.nets[id].hints, id)
  }

  pub(crate) fn alloc(&mut self, opcode: Opcode, width: usize, hints: NameHints) -> usize {
    let id = self.nets.len();
    self.nets.push(Net {
      id,
      opcode,
      ins: Vec::new(),
      width,
      hints,
    });
    id
  }

  pub(crate) fn net_mut(&mut self, id: usize) -> &mut Net {
    &mut self.nets[id]
  }
}

impl Display for Netlist {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "netlist {} {{", self.name)?;
    for net in &self.nets {
      let ins = net
        .ins
        .iter()
        .map(|x| match &x.port {
          Some(port) => format!("n{}.{}", x.net, port),
          None => format!("n{}", x.net),
        })
        .collect::<Vec<_>>()
        .join(", ");
      writeln!(
        f,
        "  n{}: b{} = {:?}({})",
        net.id, net.width, net.opcode, ins
      )?;
    }
    write!(f, "}}")
  }
}
