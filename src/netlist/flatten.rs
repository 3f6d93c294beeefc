//! Two-pass transcription of an elaboration into a netlist. Pass one
//! folds every variable's recorded assignments into a single driver node;
//! pass two materializes each unique node into one numbered net.

use std::collections::{HashMap, HashSet};

use crate::builder::system::RtlBuilder;
use crate::ir::{
  BaseNode, Expr, MergeStrategy, NameHints, NodeKind, Opcode, Typed, Var, VarKind,
};
use crate::netlist::{NetInput, Netlist};

use num_traits::One;

impl RtlBuilder {
  /// Transcribe this elaboration into an independent netlist. Driver
  /// resolution appends merge nodes to the slab, so the builder is
  /// borrowed mutably; the builder itself stays usable afterwards.
  pub fn flatten(&mut self) -> Netlist {
    let vars = self.vars.clone();
    let mut drivers = HashMap::new();
    for var in &vars {
      let driver = self.resolve_driver(*var);
      drivers.insert(var.get_key(), driver);
    }

    let roots = self
      .inputs
      .iter()
      .chain(self.outputs.iter())
      .chain(self.events.iter())
      .chain(self.instances.iter())
      .copied()
      .collect::<Vec<_>>();

    let name = self.get_name().to_string();
    let mut mat = Materializer {
      sys: self,
      drivers,
      memo: HashMap::new(),
      in_progress: HashSet::new(),
      netlist: Netlist::new(name),
    };
    for root in roots {
      mat.materialize(root);
    }
    for var in vars {
      mat.force(var);
    }
    mat.netlist
  }

  /// Fold a variable's `(guard, value)` list into one driver node.
  fn resolve_driver(&mut self, var: BaseNode) -> BaseNode {
    let (kind, dtype, init, assigns) = {
      let v = var.as_ref::<Var>(self).unwrap();
      let v = v.get();
      (
        v.get_kind(),
        v.dtype().clone(),
        v.get_init(),
        v.assigns.clone(),
      )
    };
    match kind {
      VarKind::Reg => {
        if assigns.is_empty() {
          // Never enabled: the register feeds itself and only reset moves it.
          self.create_expr(dtype, Opcode::Register, vec![init, var])
        } else if assigns.len() == 1 && self.is_const_one(assigns[0].0) {
          self.create_expr(dtype, Opcode::Register, vec![init, assigns[0].1])
        } else {
          let en = self.or_all(assigns.iter().map(|x| x.0));
          let data = self.create_merge_writes(MergeStrategy::Or, assigns);
          self.create_expr(dtype, Opcode::RegisterEn, vec![init, en, data])
        }
      }
      VarKind::Wire => {
        if assigns.is_empty() {
          init
        } else {
          let en = self.or_all(assigns.iter().map(|x| x.0));
          let none_active = self.create_flip(en);
          let mut pairs = assigns;
          pairs.push((none_active, init));
          self.create_merge_writes(MergeStrategy::Or, pairs)
        }
      }
    }
  }

  fn or_all(&mut self, mut nodes: impl Iterator<Item = BaseNode>) -> BaseNode {
    let first = nodes.next().unwrap();
    nodes.fold(first, |acc, x| self.create_bitwise_or(acc, x))
  }

  fn is_const_one(&self, node: BaseNode) -> bool {
    node
      .as_const(self)
      .map(|v| v.is_one())
      .unwrap_or(false)
  }
}

struct Materializer<'a> {
  sys: &'a RtlBuilder,
  /// Variable slab key to resolved driver node.
  drivers: HashMap<usize, BaseNode>,
  /// Node to net id; each unique node materializes exactly once.
  memo: HashMap<BaseNode, usize>,
  /// Nodes on the current combinational walk, for cycle detection.
  in_progress: HashSet<BaseNode>,
  netlist: Netlist,
}

impl Materializer<'_> {
  /// Materialize a node into a net, memoized.
  fn materialize(&mut self, node: BaseNode) -> usize {
    if let Some(id) = self.memo.get(&node) {
      return *id;
    }
    match node.get_kind() {
      NodeKind::Expr => self.materialize_expr(node),
      NodeKind::Var => self.materialize_var(node),
      NodeKind::Unknown => panic!("Cannot materialize an unknown node"),
    }
  }

  fn materialize_expr(&mut self, node: BaseNode) -> usize {
    let expr = node.as_ref::<Expr>(self.sys).unwrap();
    let opcode = expr.get().get_opcode().clone();
    let width = expr.get().dtype().get_bits();
    let hints = expr.get().hints.clone();
    let operands = expr.get().operand_iter().collect::<Vec<_>>();

    match opcode {
      Opcode::ReadPort { .. } => {
        panic!("ReadPort nodes resolve into input references, not nets")
      }
      // State breaks cycles: the net id exists before the inputs do, so a
      // register's next value may reach back to the register itself.
      Opcode::Register | Opcode::RegisterEn => {
        let id = self.netlist.alloc(opcode, width, hints);
        self.memo.insert(node, id);
        let ins = operands.iter().map(|x| self.net_input(*x)).collect();
        self.netlist.net_mut(id).ins = ins;
        id
      }
      _ => {
        assert!(
          self.in_progress.insert(node),
          "Combinational cycle through {} node {:?}",
          opcode.name(),
          node
        );
        let ins = operands
          .iter()
          .map(|x| self.net_input(*x))
          .collect::<Vec<_>>();
        self.in_progress.remove(&node);
        let id = self.netlist.alloc(opcode, width, hints);
        self.netlist.net_mut(id).ins = ins;
        self.memo.insert(node, id);
        id
      }
    }
  }

  fn materialize_var(&mut self, node: BaseNode) -> usize {
    let driver = *self
      .drivers
      .get(&node.get_key())
      .unwrap_or_else(|| panic!("Variable {:?} has no resolved driver", node));
    let hints = node.as_ref::<Var>(self.sys).unwrap().get().hints.clone();

    if self.is_register(driver) {
      // Pre-assign the id under both names so self-references land on it.
      let expr = driver.as_ref::<Expr>(self.sys).unwrap();
      let opcode = expr.get().get_opcode().clone();
      let width = expr.get().dtype().get_bits();
      let operands = expr.get().operand_iter().collect::<Vec<_>>();
      let id = self.netlist.alloc(opcode, width, hints);
      self.memo.insert(node, id);
      self.memo.insert(driver, id);
      let ins = operands.iter().map(|x| self.net_input(*x)).collect();
      self.netlist.net_mut(id).ins = ins;
      id
    } else {
      // A wire is an alias for its driver; its hints ride along.
      assert!(
        self.in_progress.insert(node),
        "Combinational cycle through wire {:?}",
        node
      );
      let input = self.net_input(driver);
      self.in_progress.remove(&node);
      let id = match input.port {
        None => input.net,
        // Aliasing a named output port needs a net of its own.
        Some(_) => {
          let width = node.as_ref::<Var>(self.sys).unwrap().get().dtype().get_bits();
          let id = self.netlist.alloc(Opcode::Identity, width, NameHints::new());
          self.netlist.net_mut(id).ins = vec![input];
          id
        }
      };
      self.memo.insert(node, id);
      self.netlist.net_mut(id).hints.merge(&hints);
      id
    }
  }

  /// Resolve an operand reference, collapsing `ReadPort` selections into
  /// the input's named-port field.
  fn net_input(&mut self, node: BaseNode) -> NetInput {
    if let Ok(expr) = node.as_ref::<Expr>(self.sys) {
      if let Opcode::ReadPort { port } = expr.get().get_opcode() {
        let port = port.clone();
        let src = expr.get().get_operand(0).unwrap();
        return NetInput::with_port(self.materialize(src), &port);
      }
    }
    NetInput::new(self.materialize(node))
  }

  /// Make sure a root variable's logic reaches the netlist.
  fn force(&mut self, var: BaseNode) {
    self.materialize(var);
  }

  fn is_register(&self, node: BaseNode) -> bool {
    node
      .as_ref::<Expr>(self.sys)
      .map(|x| {
        matches!(
          x.get().get_opcode(),
          Opcode::Register | Opcode::RegisterEn
        )
      })
      .unwrap_or(false)
  }
}
