use std::collections::HashMap;

use num_bigint::BigUint;

use crate::ir::{
  expr::{subcode, BramShape, CustomInfo, MergeStrategy},
  fmt::FmtAtom,
  fold,
  node::{Element, IsElement},
  BaseNode, DataType, Expr, NameHints, Opcode, Typed, Var, VarKind,
};

type CacheKey = (DataType, Opcode, Vec<BaseNode>);

/// An `RtlBuilder` is both the storage of one elaboration and the
/// syntax-sugared IR builder: user code calls its `create_*` methods to
/// grow the expression DAG and its control methods (`when`, `assign`,
/// `create_display`, …) to record the module's behavior. Nothing outlives
/// the builder; flattening transcribes it into an independent netlist.
pub struct RtlBuilder {
  /// The slab storing every element of this elaboration. Node identity is
  /// the slab key, so structural sharing is a cache away.
  pub(crate) slab: slab::Slab<Element>,
  /// The name of the module being described.
  name: String,
  /// Hash-consing cache: equal primitive + equal operands is one node.
  cached_nodes: HashMap<CacheKey, BaseNode>,
  /// The enable under which statements currently elaborate. Each entry is
  /// already conjoined with everything beneath it.
  guard_stack: Vec<BaseNode>,
  /// Declared variables, in creation order.
  pub(crate) vars: Vec<BaseNode>,
  /// Boundary nets, in creation order.
  pub(crate) inputs: Vec<BaseNode>,
  pub(crate) outputs: Vec<BaseNode>,
  /// Side-effect statements (displays, finishes, asserts, register-file
  /// writes), in program order.
  pub(crate) events: Vec<BaseNode>,
  /// Stateful instances that must reach the netlist even when nothing
  /// reads them: BRAMs, register files, custom black boxes.
  pub(crate) instances: Vec<BaseNode>,
}

/// Create a binary operator constructor. Plain operators demand equal
/// operand widths; shifts only constrain the left operand.
macro_rules! create_binop_impl {
  ($method:ident, $binop:ident) => {
    paste::paste! {
      pub fn [<create_ $method>](&mut self, a: BaseNode, b: BaseNode) -> BaseNode {
        let w = self.same_width(stringify!($binop), a, b);
        self.create_expr(
          DataType::bits_ty(w),
          Opcode::Binary { binop: subcode::Binary::$binop },
          vec![a, b],
        )
      }
    }
  };

  (shift $method:ident, $binop:ident) => {
    paste::paste! {
      pub fn [<create_ $method>](&mut self, a: BaseNode, b: BaseNode) -> BaseNode {
        let w = a.width(self);
        self.create_expr(
          DataType::bits_ty(w),
          Opcode::Binary { binop: subcode::Binary::$binop },
          vec![a, b],
        )
      }
    }
  };

  (cmp $method:ident, $cmp:ident) => {
    paste::paste! {
      pub fn [<create_ $method>](&mut self, a: BaseNode, b: BaseNode) -> BaseNode {
        self.same_width(stringify!($cmp), a, b);
        self.create_expr(
          DataType::bits_ty(1),
          Opcode::Compare { cmp: subcode::Compare::$cmp },
          vec![a, b],
        )
      }
    }
  };
}

impl RtlBuilder {
  pub fn new(name: &str) -> Self {
    Self {
      slab: slab::Slab::new(),
      name: name.into(),
      cached_nodes: HashMap::new(),
      guard_stack: Vec::new(),
      vars: Vec::new(),
      inputs: Vec::new(),
      outputs: Vec::new(),
      events: Vec::new(),
      instances: Vec::new(),
    }
  }

  pub fn get_name(&self) -> &str {
    &self.name
  }

  /// The helper function to insert an element into the elaboration's slab.
  pub(crate) fn insert_element<
    'elem,
    'sys: 'elem,
    T: IsElement<'elem, 'sys> + Into<Element> + 'sys,
  >(
    &'sys mut self,
    elem: T,
  ) -> BaseNode {
    let key = self.slab.insert(elem.into());
    let res = T::into_reference(key);
    T::downcast_mut(&mut self.slab, &res).unwrap().set_key(key);
    res
  }

  /// Attach a root name hint to a node. Hints flow onto the materialized
  /// net and only influence emitted identifiers.
  pub fn add_name_hint(&mut self, node: BaseNode, root: &str) {
    if let Ok(expr) = Expr::downcast_mut(&mut self.slab, &node) {
      expr.hints.add_root(root);
    } else if let Ok(var) = Var::downcast_mut(&mut self.slab, &node) {
      var.hints.add_root(root);
    } else {
      panic!("Cannot attach a name hint to {:?}", node);
    }
  }

  /// The helper function to create a constant bit vector.
  ///
  /// # Arguments
  ///
  /// * `width` - The width of the constant.
  /// * `value` - The value; must fit the width.
  pub fn get_const(&mut self, width: usize, value: BigUint) -> BaseNode {
    assert!(
      value <= fold::mask(width),
      "Constant {} does not fit b{}",
      value,
      width
    );
    self.create_expr(DataType::bits_ty(width), Opcode::Const { value }, vec![])
  }

  pub fn get_const_u64(&mut self, width: usize, value: u64) -> BaseNode {
    self.get_const(width, BigUint::from(value))
  }

  pub fn dontcare(&mut self, width: usize) -> BaseNode {
    self.create_expr(DataType::bits_ty(width), Opcode::DontCare, vec![])
  }

  /// The helper function to create an expression node. Checks the
  /// primitive's width contract, folds constant-only applications, and
  /// hash-conses combinational nodes so equal structure is one node.
  pub fn create_expr(
    &mut self,
    dtype: DataType,
    opcode: Opcode,
    operands: Vec<BaseNode>,
  ) -> BaseNode {
    self.verify_widths(&dtype, &opcode, &operands);

    if opcode.is_combinational() && !matches!(opcode, Opcode::Const { .. } | Opcode::DontCare) {
      let args = operands
        .iter()
        .map(|x| x.as_const(self).map(|v| (v.clone(), x.width(self))))
        .collect::<Option<Vec<_>>>();
      if let Some(args) = args {
        if let Some(value) = fold::fold(&opcode, &args, dtype.get_bits()) {
          return self.get_const(dtype.get_bits(), value);
        }
      }
    }

    if opcode.is_combinational() {
      let key = (dtype.clone(), opcode.clone(), operands.clone());
      if let Some(hit) = self.cached_nodes.get(&key) {
        return *hit;
      }
      let node = self.insert_element(Expr::new(dtype, opcode, operands));
      self.cached_nodes.insert(key, node);
      node
    } else {
      self.insert_element(Expr::new(dtype, opcode, operands))
    }
  }

  fn same_width(&self, prim: &str, a: BaseNode, b: BaseNode) -> usize {
    let wa = a.width(self);
    let wb = b.width(self);
    assert_eq!(
      wa, wb,
      "{} expects equal operand widths, but b{} and b{} are given",
      prim, wa, wb
    );
    wa
  }

  create_binop_impl!(add, Add);
  create_binop_impl!(sub, Sub);
  create_binop_impl!(div, Div);
  create_binop_impl!(mod_, Mod);
  create_binop_impl!(bitwise_and, BitwiseAnd);
  create_binop_impl!(bitwise_or, BitwiseOr);
  create_binop_impl!(bitwise_xor, BitwiseXor);
  create_binop_impl!(shift shl, Shl);
  create_binop_impl!(shift shr, Shr);
  create_binop_impl!(shift ashr, AShr);
  create_binop_impl!(cmp eq, EQ);
  create_binop_impl!(cmp neq, NEQ);
  create_binop_impl!(cmp ilt, ILT);
  create_binop_impl!(cmp ile, ILE);

  /// Multiply. `full` doubles the output width; `signed` interprets both
  /// operands as two's complement (only observable with `full`).
  pub fn create_mul(&mut self, a: BaseNode, b: BaseNode, signed: bool, full: bool) -> BaseNode {
    let w = self.same_width("Mul", a, b);
    let out_w = if full { 2 * w } else { w };
    self.create_expr(
      DataType::bits_ty(out_w),
      Opcode::Mul { signed, full },
      vec![a, b],
    )
  }

  pub fn create_flip(&mut self, x: BaseNode) -> BaseNode {
    let w = x.width(self);
    self.create_expr(
      DataType::bits_ty(w),
      Opcode::Unary {
        uop: subcode::Unary::Flip,
      },
      vec![x],
    )
  }

  /// Replicate a 1-bit value `width` times.
  pub fn create_replicate(&mut self, bit: BaseNode, width: usize) -> BaseNode {
    self.create_expr(DataType::bits_ty(width), Opcode::Replicate, vec![bit])
  }

  pub fn create_zext(&mut self, x: BaseNode, width: usize) -> BaseNode {
    let w = x.width(self);
    assert!(w <= width, "ZeroExtend from b{} down to b{}", w, width);
    if w == width {
      return x;
    }
    self.create_expr(DataType::bits_ty(width), Opcode::ZeroExt, vec![x])
  }

  pub fn create_sext(&mut self, x: BaseNode, width: usize) -> BaseNode {
    let w = x.width(self);
    assert!(w <= width, "SignExtend from b{} down to b{}", w, width);
    if w == width {
      return x;
    }
    self.create_expr(DataType::bits_ty(width), Opcode::SignExt, vec![x])
  }

  /// Select bits `[hi:lo]`, both inclusive.
  pub fn create_slice(&mut self, x: BaseNode, hi: usize, lo: usize) -> BaseNode {
    let w = x.width(self);
    assert!(
      lo <= hi && hi < w,
      "Slice [{}:{}] out of range for b{}",
      hi,
      lo,
      w
    );
    self.create_expr(
      DataType::bits_ty(hi - lo + 1),
      Opcode::Slice { hi, lo },
      vec![x],
    )
  }

  pub fn create_bit(&mut self, x: BaseNode, idx: usize) -> BaseNode {
    self.create_slice(x, idx, idx)
  }

  /// Concatenate, high operand first.
  pub fn create_concat(&mut self, hi: BaseNode, lo: BaseNode) -> BaseNode {
    let w = hi.width(self) + lo.width(self);
    self.create_expr(DataType::bits_ty(w), Opcode::Concat, vec![hi, lo])
  }

  /// Concatenate a list, highest first.
  pub fn create_concat_many(&mut self, parts: &[BaseNode]) -> BaseNode {
    assert!(!parts.is_empty(), "Concat of an empty list");
    let mut res = parts[0];
    for x in &parts[1..] {
      res = self.create_concat(res, *x);
    }
    res
  }

  pub fn create_identity(&mut self, x: BaseNode) -> BaseNode {
    let w = x.width(self);
    self.create_expr(DataType::bits_ty(w), Opcode::Identity, vec![x])
  }

  /// A `2^w(sel)`-way multiplexer. A short data list is padded with
  /// don't-care branches; a list longer than the selector range aborts.
  pub fn create_mux(&mut self, sel: BaseNode, mut inputs: Vec<BaseNode>) -> BaseNode {
    let wsel = sel.width(self);
    assert!(
      wsel < usize::BITS as usize,
      "Mux selector b{} is beyond any practical input list",
      wsel
    );
    let n = 1usize << wsel;
    assert!(
      !inputs.is_empty() && inputs.len() <= n,
      "Mux with {} data inputs against a b{} selector",
      inputs.len(),
      wsel
    );
    let w = inputs[0].width(self);
    while inputs.len() < n {
      let dc = self.dontcare(w);
      inputs.push(dc);
    }
    let mut operands = vec![sel];
    operands.extend(inputs);
    self.create_expr(DataType::bits_ty(w), Opcode::Mux, operands)
  }

  /// The ternary select: `cond ? on_true : on_false`.
  pub fn create_select(&mut self, cond: BaseNode, on_true: BaseNode, on_false: BaseNode) -> BaseNode {
    self.create_mux(cond, vec![on_false, on_true])
  }

  /// Combine `(enable, value)` pairs into one value under the given merge
  /// strategy. Mostly reached through variable resolution.
  pub fn create_merge_writes(
    &mut self,
    strategy: MergeStrategy,
    pairs: Vec<(BaseNode, BaseNode)>,
  ) -> BaseNode {
    assert!(!pairs.is_empty(), "MergeWrites over an empty write list");
    let w = pairs[0].1.width(self);
    let mut operands = Vec::with_capacity(pairs.len() * 2);
    for (en, value) in pairs {
      operands.push(en);
      operands.push(value);
    }
    self.create_expr(
      DataType::bits_ty(w),
      Opcode::MergeWrites { strategy },
      operands,
    )
  }

  pub fn create_test_plus_args(&mut self, name: &str) -> BaseNode {
    self.create_expr(
      DataType::bits_ty(1),
      Opcode::TestPlusArgs { name: name.into() },
      vec![],
    )
  }

  /// Declare a module input port.
  pub fn create_input(&mut self, name: &str, width: usize) -> BaseNode {
    let node = self.create_expr(
      DataType::bits_ty(width),
      Opcode::Input { name: name.into() },
      vec![],
    );
    self.inputs.push(node);
    node
  }

  /// Declare a module output port driven by `driver`.
  pub fn create_output(&mut self, name: &str, driver: BaseNode) -> BaseNode {
    let w = driver.width(self);
    let node = self.create_expr(
      DataType::bits_ty(w),
      Opcode::Output { name: name.into() },
      vec![driver],
    );
    self.outputs.push(node);
    node
  }

  /// The enable bit statements currently elaborate under.
  pub fn get_guard(&mut self) -> BaseNode {
    match self.guard_stack.last() {
      Some(g) => *g,
      None => self.get_const_u64(1, 1),
    }
  }

  /// Elaborate `body` with `cond` conjoined onto the guard.
  pub fn when(&mut self, cond: BaseNode, body: impl FnOnce(&mut Self)) {
    assert_eq!(
      cond.width(self),
      1,
      "A guard condition must be 1 bit, but b{} is given",
      cond.width(self)
    );
    let cur = self.get_guard();
    let g = self.create_bitwise_and(cur, cond);
    self.guard_stack.push(g);
    body(self);
    self.guard_stack.pop();
  }

  /// Two guarded blocks: `on_true` under `cond`, `on_false` under `!cond`,
  /// both under the surrounding guard.
  pub fn if_then_else(
    &mut self,
    cond: BaseNode,
    on_true: impl FnOnce(&mut Self),
    on_false: impl FnOnce(&mut Self),
  ) {
    self.when(cond, on_true);
    let ncond = self.create_flip(cond);
    self.when(ncond, on_false);
  }

  /// Declare a register initialized to `init` (a constant or don't-care).
  pub fn add_reg(&mut self, name: &str, init: BaseNode) -> Reg {
    let dtype = init
      .get_dtype(self)
      .unwrap_or_else(|| panic!("Register {} initialized with an untyped node", name));
    {
      let expr = init.as_ref::<Expr>(self).expect("Register init must be a literal");
      assert!(
        matches!(expr.get().get_opcode(), Opcode::Const { .. } | Opcode::DontCare),
        "Register {} init must be a constant or don't-care",
        name
      );
    }
    let var = self.insert_element(Var::new(VarKind::Reg, dtype, init, NameHints::root(name)));
    self.vars.push(var);
    Reg { var }
  }

  /// Declare a wire emitting `default` on cycles where no assignment
  /// fires.
  pub fn add_wire(&mut self, name: &str, default: BaseNode) -> Wire {
    let dtype = default
      .get_dtype(self)
      .unwrap_or_else(|| panic!("Wire {} defaulted with an untyped node", name));
    assert!(!dtype.is_void(), "Wire {} cannot carry a void value", name);
    let var = self.insert_element(Var::new(VarKind::Wire, dtype, default, NameHints::root(name)));
    self.vars.push(var);
    Wire { var }
  }

  /// Record a conditional assignment to a variable under the current
  /// guard.
  pub fn assign(&mut self, var: impl Into<BaseNode>, value: BaseNode) {
    let var = var.into();
    let vw = {
      let v = var
        .as_ref::<Var>(self)
        .unwrap_or_else(|e| panic!("Assignment target is not a variable: {}", e));
      v.get().dtype().get_bits()
    };
    let ww = value.width(self);
    assert_eq!(
      vw, ww,
      "Assignment of a b{} value to a b{} variable",
      ww, vw
    );
    let guard = self.get_guard();
    let v = Var::downcast_mut(&mut self.slab, &var).unwrap();
    v.assigns.push((guard, value));
  }

  /// Record a display under the current guard. `args` supplies one node
  /// per `Val` atom and one 1-bit node per `BeginCond`, in atom order.
  pub fn create_display(&mut self, fmt: Vec<FmtAtom>, args: Vec<BaseNode>) -> BaseNode {
    let guard = self.get_guard();
    let mut operands = vec![guard];
    operands.extend(args);
    let node = self.create_expr(DataType::void(), Opcode::Display { fmt }, operands);
    self.events.push(node);
    node
  }

  /// Record a `$finish` under the current guard.
  pub fn create_finish(&mut self) -> BaseNode {
    let guard = self.get_guard();
    let node = self.create_expr(DataType::void(), Opcode::Finish, vec![guard]);
    self.events.push(node);
    node
  }

  /// Record a simulation-time assertion: when the guard is enabled and
  /// `pred` is 0, the message prints and simulation finishes.
  pub fn create_assert(&mut self, msg: &str, pred: BaseNode) -> BaseNode {
    let guard = self.get_guard();
    let node = self.create_expr(
      DataType::void(),
      Opcode::Assert { msg: msg.into() },
      vec![guard, pred],
    );
    self.events.push(node);
    node
  }

  /// Instantiate a single-port block RAM.
  pub fn add_bram_single(
    &mut self,
    name: &str,
    addr_width: usize,
    data_width: usize,
    init_file: Option<&str>,
    byte_en: bool,
  ) -> Bram {
    let port_a = self.bram_port(name, "", addr_width, data_width, byte_en);
    let mut operands = vec![port_a.addr.var, port_a.di.var, port_a.we.var];
    operands.extend(port_a.be.map(|x| x.var));
    let node = self.create_expr(
      DataType::bits_ty(data_width),
      Opcode::Bram {
        shape: BramShape::SinglePort,
        init_file: init_file.map(|x| x.into()),
        byte_en,
      },
      operands,
    );
    self.add_name_hint(node, name);
    self.instances.push(node);
    let out = self.create_read_port(node, "DO");
    Bram {
      shape: BramShape::SinglePort,
      port_a,
      wr_addr: None,
      port_b: None,
      out,
      out_b: None,
    }
  }

  /// Instantiate a dual-port block RAM: one read address, one write
  /// address, a single data output.
  pub fn add_bram_dual(
    &mut self,
    name: &str,
    addr_width: usize,
    data_width: usize,
    init_file: Option<&str>,
    byte_en: bool,
  ) -> Bram {
    let port_a = self.bram_port(name, "", addr_width, data_width, byte_en);
    let wr_addr_dc = self.dontcare(addr_width);
    let wr_addr = {
      let mut hints = NameHints::root(name);
      hints.add_suffix("wr_addr");
      let var = self.insert_element(Var::new(
        VarKind::Wire,
        DataType::bits_ty(addr_width),
        wr_addr_dc,
        hints,
      ));
      self.vars.push(var);
      Wire { var }
    };
    let mut operands = vec![port_a.addr.var, wr_addr.var, port_a.di.var, port_a.we.var];
    operands.extend(port_a.be.map(|x| x.var));
    let node = self.create_expr(
      DataType::bits_ty(data_width),
      Opcode::Bram {
        shape: BramShape::DualPort,
        init_file: init_file.map(|x| x.into()),
        byte_en,
      },
      operands,
    );
    self.add_name_hint(node, name);
    self.instances.push(node);
    let out = self.create_read_port(node, "DO");
    Bram {
      shape: BramShape::DualPort,
      port_a,
      wr_addr: Some(wr_addr),
      port_b: None,
      out,
      out_b: None,
    }
  }

  /// Instantiate a true dual-port block RAM: two fully independent
  /// load/store ports with outputs `DO_A` and `DO_B`.
  pub fn add_bram_true_dual(
    &mut self,
    name: &str,
    addr_width: usize,
    data_width: usize,
    init_file: Option<&str>,
    byte_en: bool,
  ) -> Bram {
    let port_a = self.bram_port(name, "a", addr_width, data_width, byte_en);
    let port_b = self.bram_port(name, "b", addr_width, data_width, byte_en);
    let mut operands = vec![
      port_a.addr.var,
      port_a.di.var,
      port_a.we.var,
      port_b.addr.var,
      port_b.di.var,
      port_b.we.var,
    ];
    operands.extend(port_a.be.map(|x| x.var));
    operands.extend(port_b.be.map(|x| x.var));
    let node = self.create_expr(
      DataType::bits_ty(data_width),
      Opcode::Bram {
        shape: BramShape::TrueDualPort,
        init_file: init_file.map(|x| x.into()),
        byte_en,
      },
      operands,
    );
    self.add_name_hint(node, name);
    self.instances.push(node);
    let out = self.create_read_port(node, "DO_A");
    let out_b = self.create_read_port(node, "DO_B");
    Bram {
      shape: BramShape::TrueDualPort,
      port_a,
      wr_addr: None,
      port_b: Some(port_b),
      out,
      out_b: Some(out_b),
    }
  }

  fn bram_port(
    &mut self,
    name: &str,
    suffix: &str,
    addr_width: usize,
    data_width: usize,
    byte_en: bool,
  ) -> BramPort {
    let mk_wire = |sys: &mut Self, field: &str, width: usize, default: BaseNode| {
      let mut hints = NameHints::root(name);
      if !suffix.is_empty() {
        hints.add_suffix(suffix);
      }
      hints.add_suffix(field);
      let var = sys.insert_element(Var::new(VarKind::Wire, DataType::bits_ty(width), default, hints));
      sys.vars.push(var);
      Wire { var }
    };
    let addr_dc = self.dontcare(addr_width);
    let addr = mk_wire(self, "addr", addr_width, addr_dc);
    let di_dc = self.dontcare(data_width);
    let di = mk_wire(self, "di", data_width, di_dc);
    let we_0 = self.get_const_u64(1, 0);
    let we = mk_wire(self, "we", 1, we_0);
    let be = if byte_en {
      assert!(
        data_width % 8 == 0,
        "Byte enables need a byte-multiple data width, but b{} is given",
        data_width
      );
      let ones = fold::mask(data_width / 8);
      let all = self.get_const(data_width / 8, ones);
      Some(mk_wire(self, "be", data_width / 8, all))
    } else {
      None
    };
    BramPort { addr, di, we, be }
  }

  /// Instantiate a register file: combinational reads, clocked writes.
  pub fn add_regfile(
    &mut self,
    name: &str,
    addr_width: usize,
    data_width: usize,
    init_file: Option<&str>,
  ) -> RegFile {
    let node = self.create_expr(
      DataType::void(),
      Opcode::RegFileMake {
        init_file: init_file.map(|x| x.into()),
        addr_width,
        data_width,
      },
      vec![],
    );
    self.add_name_hint(node, name);
    self.instances.push(node);
    RegFile { node }
  }

  pub(crate) fn create_regfile_read(&mut self, rf: BaseNode, addr: BaseNode) -> BaseNode {
    let data_width = self.regfile_widths(rf).1;
    self.create_expr(
      DataType::bits_ty(data_width),
      Opcode::RegFileRead,
      vec![rf, addr],
    )
  }

  pub(crate) fn create_regfile_write(&mut self, rf: BaseNode, addr: BaseNode, data: BaseNode) {
    let guard = self.get_guard();
    let node = self.create_expr(
      DataType::void(),
      Opcode::RegFileWrite,
      vec![rf, guard, addr, data],
    );
    self.events.push(node);
  }

  fn regfile_widths(&self, rf: BaseNode) -> (usize, usize) {
    let expr = rf
      .as_ref::<Expr>(self)
      .unwrap_or_else(|e| panic!("Register-file reference: {}", e));
    match expr.get().get_opcode() {
      Opcode::RegFileMake {
        addr_width,
        data_width,
        ..
      } => (*addr_width, *data_width),
      other => panic!("Expecting RegFileMake, but {} is given", other.name()),
    }
  }

  /// Instantiate an opaque Verilog module. Returns the instance node;
  /// output ports are read with [`RtlBuilder::create_read_port`].
  pub fn create_custom(&mut self, info: CustomInfo, ins: Vec<BaseNode>) -> BaseNode {
    let node = self.create_expr(DataType::void(), Opcode::Custom { info }, ins);
    self.instances.push(node);
    node
  }

  /// Read a named output port of a multi-output instance.
  pub fn create_read_port(&mut self, src: BaseNode, port: &str) -> BaseNode {
    let width = {
      let expr = src
        .as_ref::<Expr>(self)
        .unwrap_or_else(|e| panic!("ReadPort source: {}", e));
      match expr.get().get_opcode() {
        Opcode::Bram { shape, .. } => {
          let legal: &[&str] = match shape {
            BramShape::TrueDualPort => &["DO_A", "DO_B"],
            _ => &["DO"],
          };
          assert!(
            legal.contains(&port),
            "A {:?} BRAM has no output port {}",
            shape,
            port
          );
          expr.get().dtype().get_bits()
        }
        Opcode::Custom { info } => {
          info
            .outs
            .iter()
            .find(|(n, _)| n == port)
            .unwrap_or_else(|| panic!("Module {} has no output port {}", info.module, port))
            .1
        }
        other => panic!("ReadPort on a single-output {} primitive", other.name()),
      }
    };
    self.create_expr(
      DataType::bits_ty(width),
      Opcode::ReadPort { port: port.into() },
      vec![src],
    )
  }

  /// Check a primitive application against the width rules before it is
  /// interned. Everything here is fatal: a violation is a bug in the
  /// design being elaborated.
  fn verify_widths(&self, dtype: &DataType, opcode: &Opcode, operands: &[BaseNode]) {
    let out_w = dtype.get_bits();
    let w = |x: &BaseNode| x.width(self);
    let expect_arity = |n: usize| {
      assert_eq!(
        operands.len(),
        n,
        "{} expects {} operands, but {} are given",
        opcode.name(),
        n,
        operands.len()
      );
    };
    match opcode {
      Opcode::Const { value } => {
        expect_arity(0);
        assert!(*value <= fold::mask(out_w));
      }
      Opcode::DontCare | Opcode::Input { .. } | Opcode::TestPlusArgs { .. } => expect_arity(0),
      Opcode::Binary { binop } => {
        expect_arity(2);
        match binop {
          subcode::Binary::Shl | subcode::Binary::Shr | subcode::Binary::AShr => {
            assert_eq!(w(&operands[0]), out_w, "{} result width", binop);
          }
          _ => {
            assert_eq!(w(&operands[0]), w(&operands[1]), "{} operand widths", binop);
            assert_eq!(w(&operands[0]), out_w, "{} result width", binop);
          }
        }
      }
      Opcode::Mul { full, .. } => {
        expect_arity(2);
        assert_eq!(w(&operands[0]), w(&operands[1]), "Mul operand widths");
        let expect = if *full { 2 * w(&operands[0]) } else { w(&operands[0]) };
        assert_eq!(out_w, expect, "Mul result width");
      }
      Opcode::Unary { .. } | Opcode::Identity => {
        expect_arity(1);
        assert_eq!(w(&operands[0]), out_w);
      }
      Opcode::Compare { cmp } => {
        expect_arity(2);
        assert_eq!(w(&operands[0]), w(&operands[1]), "{} operand widths", cmp);
        assert_eq!(out_w, 1);
      }
      Opcode::Replicate => {
        expect_arity(1);
        assert_eq!(w(&operands[0]), 1, "Replicate expects a 1-bit operand");
      }
      Opcode::ZeroExt | Opcode::SignExt => {
        expect_arity(1);
        assert!(
          w(&operands[0]) < out_w,
          "{} from b{} to b{}",
          opcode.name(),
          w(&operands[0]),
          out_w
        );
      }
      Opcode::Slice { hi, lo } => {
        expect_arity(1);
        assert!(*lo <= *hi && *hi < w(&operands[0]));
        assert_eq!(out_w, hi - lo + 1);
      }
      Opcode::Concat => {
        expect_arity(2);
        assert_eq!(out_w, w(&operands[0]) + w(&operands[1]));
      }
      Opcode::Mux => {
        let wsel = w(&operands[0]);
        expect_arity(1 + (1 << wsel));
        for x in &operands[1..] {
          assert_eq!(w(x), out_w, "Mux data width");
        }
      }
      Opcode::MergeWrites { .. } => {
        assert!(
          operands.len() % 2 == 0 && !operands.is_empty(),
          "MergeWrites expects enable/value pairs, but {} operands are given",
          operands.len()
        );
        for pair in operands.chunks(2) {
          assert_eq!(w(&pair[0]), 1, "MergeWrites enable width");
          assert_eq!(w(&pair[1]), out_w, "MergeWrites value width");
        }
      }
      Opcode::Register => {
        expect_arity(2);
        assert_eq!(w(&operands[0]), out_w, "Register init width");
        assert_eq!(w(&operands[1]), out_w, "Register next width");
      }
      Opcode::RegisterEn => {
        expect_arity(3);
        assert_eq!(w(&operands[0]), out_w, "Register init width");
        assert_eq!(w(&operands[1]), 1, "Register enable width");
        assert_eq!(w(&operands[2]), out_w, "Register next width");
      }
      Opcode::Bram { shape, byte_en, .. } => {
        let base = match shape {
          BramShape::SinglePort => 3,
          BramShape::DualPort => 4,
          BramShape::TrueDualPort => 6,
        };
        let bes = if *byte_en {
          if matches!(shape, BramShape::TrueDualPort) {
            2
          } else {
            1
          }
        } else {
          0
        };
        expect_arity(base + bes);
      }
      Opcode::RegFileMake { .. } => expect_arity(0),
      Opcode::RegFileRead => {
        expect_arity(2);
        let (aw, dw) = self.regfile_widths(operands[0]);
        assert_eq!(w(&operands[1]), aw, "RegFileRead address width");
        assert_eq!(out_w, dw);
      }
      Opcode::RegFileWrite => {
        expect_arity(4);
        let (aw, dw) = self.regfile_widths(operands[0]);
        assert_eq!(w(&operands[1]), 1, "RegFileWrite guard width");
        assert_eq!(w(&operands[2]), aw, "RegFileWrite address width");
        assert_eq!(w(&operands[3]), dw, "RegFileWrite data width");
      }
      Opcode::ReadPort { .. } => expect_arity(1),
      Opcode::Output { .. } => {
        expect_arity(1);
        assert_eq!(w(&operands[0]), out_w);
      }
      Opcode::Display { fmt } => {
        let mut depth = 0usize;
        let mut takes = 0usize;
        for atom in fmt {
          match atom {
            FmtAtom::Val { .. } => takes += 1,
            FmtAtom::BeginCond => {
              takes += 1;
              depth += 1;
            }
            FmtAtom::EndCond => {
              assert!(depth > 0, "Display has an EndCond without a BeginCond");
              depth -= 1;
            }
            FmtAtom::Lit(_) => {}
          }
        }
        assert_eq!(depth, 0, "Display has an unclosed BeginCond");
        assert_eq!(
          operands.len(),
          1 + takes,
          "Display expects a guard plus {} data operands, but {} are given",
          takes,
          operands.len()
        );
        assert_eq!(w(&operands[0]), 1, "Display guard width");
        let mut idx = 1;
        for atom in fmt {
          match atom {
            FmtAtom::Val { .. } => idx += 1,
            FmtAtom::BeginCond => {
              assert_eq!(w(&operands[idx]), 1, "Display condition width");
              idx += 1;
            }
            _ => {}
          }
        }
      }
      Opcode::Finish => {
        expect_arity(1);
        assert_eq!(w(&operands[0]), 1);
      }
      Opcode::Assert { .. } => {
        expect_arity(2);
        assert_eq!(w(&operands[0]), 1);
        assert_eq!(w(&operands[1]), 1);
      }
      Opcode::Custom { info } => {
        expect_arity(info.ins.len());
        for ((name, width), x) in info.ins.iter().zip(operands.iter()) {
          assert_eq!(
            w(x),
            *width,
            "Input {} of module {} expects b{}",
            name,
            info.module,
            width
          );
        }
      }
    }
  }
}

/// A register variable handle. Reading yields the placeholder node the
/// flattener resolves to the register's net.
#[derive(Clone, Copy)]
pub struct Reg {
  var: BaseNode,
}

impl Reg {
  pub fn value(&self) -> BaseNode {
    self.var
  }
}

impl From<Reg> for BaseNode {
  fn from(x: Reg) -> BaseNode {
    x.var
  }
}

/// A wire variable handle.
#[derive(Clone, Copy)]
pub struct Wire {
  var: BaseNode,
}

impl Wire {
  pub fn value(&self) -> BaseNode {
    self.var
  }
}

impl From<Wire> for BaseNode {
  fn from(x: Wire) -> BaseNode {
    x.var
  }
}

struct BramPort {
  addr: Wire,
  di: Wire,
  we: Wire,
  be: Option<Wire>,
}

/// A block RAM handle. Loading and storing through the same port on the
/// same cycle is undefined, per the primitive's contract.
pub struct Bram {
  shape: BramShape,
  port_a: BramPort,
  /// Dual-port only: the dedicated write address.
  wr_addr: Option<Wire>,
  port_b: Option<BramPort>,
  /// The (first) data output.
  pub out: BaseNode,
  out_b: Option<BaseNode>,
}

impl Bram {
  pub fn load(&self, sys: &mut RtlBuilder, addr: BaseNode) {
    sys.assign(self.port_a.addr, addr);
  }

  pub fn store(&self, sys: &mut RtlBuilder, addr: BaseNode, data: BaseNode) {
    match self.shape {
      BramShape::DualPort => sys.assign(self.wr_addr.unwrap(), addr),
      _ => sys.assign(self.port_a.addr, addr),
    }
    sys.assign(self.port_a.di, data);
    let one = sys.get_const_u64(1, 1);
    sys.assign(self.port_a.we, one);
  }

  /// Store with an explicit byte-enable mask; only on byte-enable RAMs.
  pub fn store_be(&self, sys: &mut RtlBuilder, addr: BaseNode, data: BaseNode, be: BaseNode) {
    let be_wire = self
      .port_a
      .be
      .unwrap_or_else(|| panic!("store_be on a BRAM without byte enables"));
    self.store(sys, addr, data);
    sys.assign(be_wire, be);
  }

  pub fn out_b(&self) -> BaseNode {
    self
      .out_b
      .unwrap_or_else(|| panic!("A {:?} BRAM has one output port", self.shape))
  }

  pub fn load_b(&self, sys: &mut RtlBuilder, addr: BaseNode) {
    let port = self.require_port_b();
    sys.assign(port.addr, addr);
  }

  pub fn store_b(&self, sys: &mut RtlBuilder, addr: BaseNode, data: BaseNode) {
    let port = self.require_port_b();
    let (pa, pdi, pwe) = (port.addr, port.di, port.we);
    sys.assign(pa, addr);
    sys.assign(pdi, data);
    let one = sys.get_const_u64(1, 1);
    sys.assign(pwe, one);
  }

  fn require_port_b(&self) -> &BramPort {
    self
      .port_b
      .as_ref()
      .unwrap_or_else(|| panic!("A {:?} BRAM has no port B", self.shape))
  }
}

/// A register-file handle: any number of combinational reads and guarded
/// writes per cycle.
#[derive(Clone, Copy)]
pub struct RegFile {
  node: BaseNode,
}

impl RegFile {
  pub fn read(&self, sys: &mut RtlBuilder, addr: BaseNode) -> BaseNode {
    sys.create_regfile_read(self.node, addr)
  }

  pub fn update(&self, sys: &mut RtlBuilder, addr: BaseNode, data: BaseNode) {
    sys.create_regfile_write(self.node, addr, data);
  }
}
