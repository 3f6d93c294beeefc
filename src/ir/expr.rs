use num_bigint::BigUint;

use crate::ir::{fmt::FmtAtom, node::BaseNode, DataType, Typed};

pub mod subcode;

/// How simultaneous writes to one variable combine.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum MergeStrategy {
  /// Each pair contributes `value` when its enable is 1 and `0` otherwise;
  /// contributions are ORed. Don't-care when no pair is enabled.
  Or,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BramShape {
  SinglePort,
  DualPort,
  TrueDualPort,
}

/// Descriptor of an opaque black-box module instance.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CustomInfo {
  pub module: String,
  /// Input port names and widths, in operand order.
  pub ins: Vec<(String, usize)>,
  /// Output port names and widths.
  pub outs: Vec<(String, usize)>,
  /// Verilog parameter bindings.
  pub params: Vec<(String, String)>,
  pub clocked: bool,
  pub resetable: bool,
}

/// The closed primitive set. Parameters that are part of a primitive's
/// identity live inside the variant; value inputs are `Expr` operands.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Opcode {
  Const {
    value: BigUint,
  },
  DontCare,
  Binary {
    binop: subcode::Binary,
  },
  Mul {
    signed: bool,
    full: bool,
  },
  Unary {
    uop: subcode::Unary,
  },
  Compare {
    cmp: subcode::Compare,
  },
  /// Replicate a 1-bit operand out to the result width.
  Replicate,
  ZeroExt,
  SignExt,
  Slice {
    hi: usize,
    lo: usize,
  },
  /// High operand first.
  Concat,
  Identity,
  /// Operands: selector then `2^w(sel)` data inputs.
  Mux,
  /// Operands: `enable, value` pairs, flattened.
  MergeWrites {
    strategy: MergeStrategy,
  },
  /// Operands: `[init, next]`. Resets to `init` when it is a constant.
  Register,
  /// Operands: `[init, enable, next]`.
  RegisterEn,
  /// Operand layout per shape: single `[addr, di, we (, be)]`,
  /// dual `[rd_addr, wr_addr, di, we (, be)]`,
  /// true dual `[addr_a, di_a, we_a, addr_b, di_b, we_b (, be_a, be_b)]`.
  Bram {
    shape: BramShape,
    init_file: Option<String>,
    byte_en: bool,
  },
  RegFileMake {
    init_file: Option<String>,
    addr_width: usize,
    data_width: usize,
  },
  /// Operands: `[regfile, addr]`.
  RegFileRead,
  /// Operands: `[regfile, guard, addr, data]`.
  RegFileWrite,
  /// Select the named output port of a multi-output operand.
  ReadPort {
    port: String,
  },
  Input {
    name: String,
  },
  /// Operand: the driver.
  Output {
    name: String,
  },
  /// Operands: guard, then one node per `Val` atom and one 1-bit node per
  /// `BeginCond` atom, in atom order.
  Display {
    fmt: Vec<FmtAtom>,
  },
  /// Operand: guard.
  Finish,
  /// Operands: `[guard, pred]`.
  Assert {
    msg: String,
  },
  TestPlusArgs {
    name: String,
  },
  Custom {
    info: CustomInfo,
  },
}

impl Opcode {
  /// Primitives with no state and no side effect; these are hash-consed so
  /// equal structure is one node.
  pub fn is_combinational(&self) -> bool {
    matches!(
      self,
      Opcode::Const { .. }
        | Opcode::DontCare
        | Opcode::Binary { .. }
        | Opcode::Mul { .. }
        | Opcode::Unary { .. }
        | Opcode::Compare { .. }
        | Opcode::Replicate
        | Opcode::ZeroExt
        | Opcode::SignExt
        | Opcode::Slice { .. }
        | Opcode::Concat
        | Opcode::Identity
        | Opcode::Mux
        | Opcode::MergeWrites { .. }
        | Opcode::ReadPort { .. }
        | Opcode::TestPlusArgs { .. }
    )
  }

  /// Primitives updated inside the clocked always block.
  pub fn is_sequential(&self) -> bool {
    matches!(
      self,
      Opcode::Register | Opcode::RegisterEn | Opcode::RegFileWrite
    )
  }

  /// Side-effect statements rooted in the event list.
  pub fn is_event(&self) -> bool {
    matches!(
      self,
      Opcode::Display { .. } | Opcode::Finish | Opcode::Assert { .. } | Opcode::RegFileWrite
    )
  }

  pub fn name(&self) -> &'static str {
    match self {
      Opcode::Const { .. } => "Const",
      Opcode::DontCare => "DontCare",
      Opcode::Binary { .. } => "Binary",
      Opcode::Mul { .. } => "Mul",
      Opcode::Unary { .. } => "Unary",
      Opcode::Compare { .. } => "Compare",
      Opcode::Replicate => "Replicate",
      Opcode::ZeroExt => "ZeroExt",
      Opcode::SignExt => "SignExt",
      Opcode::Slice { .. } => "Slice",
      Opcode::Concat => "Concat",
      Opcode::Identity => "Identity",
      Opcode::Mux => "Mux",
      Opcode::MergeWrites { .. } => "MergeWrites",
      Opcode::Register => "Register",
      Opcode::RegisterEn => "RegisterEn",
      Opcode::Bram { .. } => "Bram",
      Opcode::RegFileMake { .. } => "RegFileMake",
      Opcode::RegFileRead => "RegFileRead",
      Opcode::RegFileWrite => "RegFileWrite",
      Opcode::ReadPort { .. } => "ReadPort",
      Opcode::Input { .. } => "Input",
      Opcode::Output { .. } => "Output",
      Opcode::Display { .. } => "Display",
      Opcode::Finish => "Finish",
      Opcode::Assert { .. } => "Assert",
      Opcode::TestPlusArgs { .. } => "TestPlusArgs",
      Opcode::Custom { .. } => "Custom",
    }
  }
}

/// One node of the expression DAG: a primitive applied to operand nodes,
/// tagged with its output width.
pub struct Expr {
  pub(crate) key: usize,
  dtype: DataType,
  opcode: Opcode,
  operands: Vec<BaseNode>,
  /// Name hints riding on this node, merged into the net at flatten time.
  pub(crate) hints: crate::ir::data::NameHints,
}

impl Expr {
  pub(crate) fn new(dtype: DataType, opcode: Opcode, operands: Vec<BaseNode>) -> Self {
    Self {
      key: 0,
      dtype,
      opcode,
      operands,
      hints: crate::ir::data::NameHints::new(),
    }
  }

  pub fn get_opcode(&self) -> &Opcode {
    &self.opcode
  }

  pub fn get_operand(&self, i: usize) -> Option<BaseNode> {
    self.operands.get(i).copied()
  }

  pub fn get_num_operands(&self) -> usize {
    self.operands.len()
  }

  pub fn operand_iter(&self) -> impl Iterator<Item = BaseNode> + '_ {
    self.operands.iter().copied()
  }
}

impl Typed for Expr {
  fn dtype(&self) -> &DataType {
    &self.dtype
  }
}
