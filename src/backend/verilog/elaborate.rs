use std::{
  collections::HashSet,
  fs::File,
  io::{self, Write},
  path::PathBuf,
};

use crate::{
  backend::common::{create_and_clean_dir, Config},
  ir::{
    expr::{subcode, BramShape},
    fmt::FmtAtom,
    Opcode,
  },
  netlist::{Net, NetInput, Netlist},
};

use super::utils::{broadcast, const_literal, dontcare_literal, escape, port_range, select_1h};

struct VerilogDumper<'a> {
  netlist: &'a Netlist,
  /// Mangled identifier per net id.
  names: Vec<String>,
}

impl<'a> VerilogDumper<'a> {
  fn new(netlist: &'a Netlist) -> Self {
    let names = (0..netlist.len()).map(|id| netlist.net_name(id)).collect();
    Self { netlist, names }
  }

  /// The text of an input reference: the net's identifier, or the named
  /// output wire of a multi-output instance.
  fn iref(&self, input: &NetInput) -> String {
    match &input.port {
      Some(port) => format!("{}_{}", self.names[input.net], port),
      None => self.names[input.net].clone(),
    }
  }

  fn input_width(&self, input: &NetInput) -> usize {
    let net = self.netlist.get(input.net);
    match &input.port {
      Some(port) => match &net.opcode {
        Opcode::Custom { info } => {
          info
            .outs
            .iter()
            .find(|(name, _)| name == port)
            .unwrap_or_else(|| panic!("Module {} has no output {}", info.module, port))
            .1
        }
        _ => net.width,
      },
      None => net.width,
    }
  }

  fn dump(&self) -> String {
    let mut res = String::new();
    self.dump_header(&mut res);
    for net in self.netlist.iter() {
      self.dump_decl(net, &mut res);
    }
    res.push('\n');
    let mut seen_outputs = HashSet::new();
    for net in self.netlist.iter() {
      self.dump_assign(net, &mut seen_outputs, &mut res);
    }
    res.push('\n');
    self.dump_always(&mut res);
    res.push_str(&format!("endmodule // {}\n", self.netlist.get_name()));
    res
  }

  fn dump_header(&self, res: &mut String) {
    res.push_str(&format!("module {}(\n", self.netlist.get_name()));
    let mut ports = vec![
      "input wire clock".to_string(),
      "input wire reset".to_string(),
    ];
    let mut seen = HashSet::new();
    for net in self.netlist.iter() {
      match &net.opcode {
        Opcode::Input { name } => {
          if seen.insert(name.clone()) {
            ports.push(format!("input wire {}{}", port_range(net.width), name));
          }
        }
        Opcode::Output { name } => {
          if seen.insert(name.clone()) {
            ports.push(format!("output wire {}{}", port_range(net.width), name));
          }
        }
        _ => {}
      }
    }
    res.push_str(&format!("  {}\n", ports.join(",\n  ")));
    res.push_str(");\n\n");
  }

  fn dump_decl(&self, net: &Net, res: &mut String) {
    let name = &self.names[net.id];
    match &net.opcode {
      Opcode::Const { value } => {
        res.push_str(&format!(
          "  wire [{}:0] {} = {};\n",
          net.width - 1,
          name,
          const_literal(value, net.width)
        ));
      }
      Opcode::DontCare => {
        res.push_str(&format!(
          "  wire [{}:0] {} = {};\n",
          net.width - 1,
          name,
          dontcare_literal(net.width)
        ));
      }
      Opcode::Register | Opcode::RegisterEn => {
        res.push_str(&format!("  reg [{}:0] {};\n", net.width - 1, name));
      }
      Opcode::Mux => {
        let data_count = net.ins.len() - 1;
        if data_count > 2 {
          self.dump_mux_function(net, res);
        }
        res.push_str(&format!("  wire [{}:0] {};\n", net.width - 1, name));
      }
      Opcode::Bram { shape, .. } => {
        let outs: &[&str] = match shape {
          BramShape::TrueDualPort => &["DO_A", "DO_B"],
          _ => &["DO"],
        };
        for port in outs {
          res.push_str(&format!(
            "  wire [{}:0] {}_{};\n",
            net.width - 1,
            name,
            port
          ));
        }
      }
      Opcode::RegFileMake {
        init_file,
        addr_width,
        data_width,
      } => {
        res.push_str(&format!(
          "  reg [{}:0] {} [0:{}];\n",
          data_width - 1,
          name,
          (1usize << addr_width) - 1
        ));
        if let Some(file) = init_file {
          if !file.is_empty() {
            res.push_str(&format!(
              "  generate initial $readmemh(\"{}\", {}); endgenerate\n",
              escape(file),
              name
            ));
          }
        }
      }
      Opcode::Custom { info } => {
        for (port, width) in &info.outs {
          res.push_str(&format!(
            "  wire [{}:0] {}_{};\n",
            width - 1,
            name,
            port
          ));
        }
      }
      Opcode::Output { .. }
      | Opcode::Display { .. }
      | Opcode::Finish
      | Opcode::Assert { .. }
      | Opcode::RegFileWrite => {}
      _ => {
        res.push_str(&format!("  wire [{}:0] {};\n", net.width - 1, name));
      }
    }
  }

  /// The wide-selector mux lowers through a function so the `case` can
  /// carry a don't-care default.
  fn dump_mux_function(&self, net: &Net, res: &mut String) {
    let name = &self.names[net.id];
    let data_count = net.ins.len() - 1;
    let wsel = data_count.trailing_zeros() as usize;
    res.push_str(&format!("  function [{}:0] f_{};\n", net.width - 1, name));
    res.push_str(&format!("    input [{}:0] sel;\n", wsel - 1));
    for i in 0..data_count {
      res.push_str(&format!("    input [{}:0] in{};\n", net.width - 1, i));
    }
    res.push_str("    begin\n");
    res.push_str("      case (sel)\n");
    for i in 0..data_count {
      res.push_str(&format!("        {}: f_{} = in{};\n", i, name, i));
    }
    res.push_str(&format!(
      "        default: f_{} = {};\n",
      name,
      dontcare_literal(net.width)
    ));
    res.push_str("      endcase\n");
    res.push_str("    end\n");
    res.push_str("  endfunction\n");
  }

  fn dump_assign(&self, net: &Net, seen_outputs: &mut HashSet<String>, res: &mut String) {
    let name = &self.names[net.id];
    let ins = &net.ins;
    let rhs = match &net.opcode {
      Opcode::Binary { binop } => match binop {
        subcode::Binary::AShr => Some(format!(
          "$signed({}) >>> {}",
          self.iref(&ins[0]),
          self.iref(&ins[1])
        )),
        _ => Some(format!(
          "{} {} {}",
          self.iref(&ins[0]),
          binop.verilog_op(),
          self.iref(&ins[1])
        )),
      },
      Opcode::Mul { signed, .. } => {
        if *signed {
          Some(format!(
            "$signed({}) * $signed({})",
            self.iref(&ins[0]),
            self.iref(&ins[1])
          ))
        } else {
          Some(format!("{} * {}", self.iref(&ins[0]), self.iref(&ins[1])))
        }
      }
      Opcode::Unary { uop } => Some(format!("{}{}", uop.verilog_op(), self.iref(&ins[0]))),
      Opcode::Compare { cmp } => Some(format!(
        "{} {} {}",
        self.iref(&ins[0]),
        cmp.verilog_op(),
        self.iref(&ins[1])
      )),
      Opcode::Replicate => Some(broadcast(&self.iref(&ins[0]), net.width)),
      Opcode::ZeroExt => {
        let pad = net.width - self.input_width(&ins[0]);
        Some(format!("{{{{{}{{1'b0}}}}, {}}}", pad, self.iref(&ins[0])))
      }
      Opcode::SignExt => {
        let in_w = self.input_width(&ins[0]);
        let pad = net.width - in_w;
        let x = self.iref(&ins[0]);
        Some(format!("{{{{{}{{{}[{}]}}}}, {}}}", pad, x, in_w - 1, x))
      }
      Opcode::Slice { hi, lo } => Some(format!("{}[{}:{}]", self.iref(&ins[0]), hi, lo)),
      Opcode::Concat => Some(format!(
        "{{{}, {}}}",
        self.iref(&ins[0]),
        self.iref(&ins[1])
      )),
      Opcode::Identity => Some(self.iref(&ins[0])),
      Opcode::Mux => {
        let data_count = ins.len() - 1;
        if data_count == 2 {
          Some(format!(
            "{} ? {} : {}",
            self.iref(&ins[0]),
            self.iref(&ins[2]),
            self.iref(&ins[1])
          ))
        } else {
          let args = ins
            .iter()
            .map(|x| self.iref(x))
            .collect::<Vec<_>>()
            .join(", ");
          Some(format!("f_{}({})", name, args))
        }
      }
      Opcode::MergeWrites { .. } => {
        let pairs = ins
          .chunks(2)
          .map(|pair| (self.iref(&pair[0]), self.iref(&pair[1])))
          .collect::<Vec<_>>();
        Some(select_1h(
          pairs.iter().map(|(en, value)| (en.as_str(), value.as_str())),
          net.width,
        ))
      }
      Opcode::TestPlusArgs { name: plusarg } => Some(format!(
        "$test$plusargs(\"{}\") == 0 ? 0 : 1",
        escape(plusarg)
      )),
      Opcode::RegFileRead => Some(format!(
        "{}[{}]",
        self.names[ins[0].net],
        self.iref(&ins[1])
      )),
      Opcode::Input { name: port } => Some(port.clone()),
      Opcode::Output { name: port } => {
        if seen_outputs.insert(port.clone()) {
          res.push_str(&format!("  assign {} = {};\n", port, self.iref(&ins[0])));
        }
        None
      }
      Opcode::Bram { .. } => {
        self.dump_bram(net, res);
        None
      }
      Opcode::Custom { .. } => {
        self.dump_custom(net, res);
        None
      }
      _ => None,
    };
    if let Some(rhs) = rhs {
      res.push_str(&format!("  assign {} = {};\n", name, rhs));
    }
  }

  fn dump_bram(&self, net: &Net, res: &mut String) {
    let name = &self.names[net.id];
    let (shape, init_file, byte_en) = match &net.opcode {
      Opcode::Bram {
        shape,
        init_file,
        byte_en,
      } => (shape, init_file, byte_en),
      _ => unreachable!(),
    };
    let module = match (shape, byte_en) {
      (BramShape::SinglePort, false) => "BlockRAM",
      (BramShape::SinglePort, true) => "BlockRAMBE",
      (BramShape::DualPort, false) => "BlockRAMDual",
      (BramShape::DualPort, true) => "BlockRAMDualBE",
      (BramShape::TrueDualPort, false) => "BlockRAMTrueDual",
      (BramShape::TrueDualPort, true) => "BlockRAMTrueDualBE",
    };
    let addr_width = self.input_width(&net.ins[0]);
    let init = match init_file {
      Some(file) if !file.is_empty() => escape(file),
      _ => "UNUSED".to_string(),
    };
    res.push_str(&format!("  {} #(\n", module));
    res.push_str(&format!("    .INIT_FILE(\"{}\"),\n", init));
    res.push_str(&format!("    .ADDR_WIDTH({}),\n", addr_width));
    res.push_str(&format!("    .DATA_WIDTH({})\n", net.width));
    res.push_str(&format!("  ) {} (\n", name));
    res.push_str("    .CLK(clock),\n");
    let bindings: Vec<(String, String)> = match shape {
      BramShape::SinglePort => {
        let mut b = vec![
          ("ADDR".to_string(), self.iref(&net.ins[0])),
          ("DI".to_string(), self.iref(&net.ins[1])),
          ("WE".to_string(), self.iref(&net.ins[2])),
        ];
        if *byte_en {
          b.push(("BE".to_string(), self.iref(&net.ins[3])));
        }
        b.push(("DO".to_string(), format!("{}_DO", name)));
        b
      }
      BramShape::DualPort => {
        let mut b = vec![
          ("RD_ADDR".to_string(), self.iref(&net.ins[0])),
          ("WR_ADDR".to_string(), self.iref(&net.ins[1])),
          ("DI".to_string(), self.iref(&net.ins[2])),
          ("WE".to_string(), self.iref(&net.ins[3])),
        ];
        if *byte_en {
          b.push(("BE".to_string(), self.iref(&net.ins[4])));
        }
        b.push(("DO".to_string(), format!("{}_DO", name)));
        b
      }
      BramShape::TrueDualPort => {
        let mut b = vec![
          ("ADDR_A".to_string(), self.iref(&net.ins[0])),
          ("DI_A".to_string(), self.iref(&net.ins[1])),
          ("WE_A".to_string(), self.iref(&net.ins[2])),
          ("ADDR_B".to_string(), self.iref(&net.ins[3])),
          ("DI_B".to_string(), self.iref(&net.ins[4])),
          ("WE_B".to_string(), self.iref(&net.ins[5])),
        ];
        if *byte_en {
          b.push(("BE_A".to_string(), self.iref(&net.ins[6])));
          b.push(("BE_B".to_string(), self.iref(&net.ins[7])));
        }
        b.push(("DO_A".to_string(), format!("{}_DO_A", name)));
        b.push(("DO_B".to_string(), format!("{}_DO_B", name)));
        b
      }
    };
    let text = bindings
      .iter()
      .map(|(port, wire)| format!("    .{}({})", port, wire))
      .collect::<Vec<_>>()
      .join(",\n");
    res.push_str(&text);
    res.push_str("\n  );\n");
  }

  fn dump_custom(&self, net: &Net, res: &mut String) {
    let name = &self.names[net.id];
    let info = match &net.opcode {
      Opcode::Custom { info } => info,
      _ => unreachable!(),
    };
    if info.params.is_empty() {
      res.push_str(&format!("  {} {} (\n", info.module, name));
    } else {
      res.push_str(&format!("  {} #(\n", info.module));
      let params = info
        .params
        .iter()
        .map(|(k, v)| format!("    .{}({})", k, v))
        .collect::<Vec<_>>()
        .join(",\n");
      res.push_str(&params);
      res.push_str(&format!("\n  ) {} (\n", name));
    }
    let mut bindings = Vec::new();
    if info.clocked {
      bindings.push("    .clock(clock)".to_string());
    }
    if info.resetable {
      bindings.push("    .reset(reset)".to_string());
    }
    for ((port, _), input) in info.ins.iter().zip(net.ins.iter()) {
      bindings.push(format!("    .{}({})", port, self.iref(input)));
    }
    for (port, _) in &info.outs {
      bindings.push(format!("    .{}({}_{})", port, name, port));
    }
    res.push_str(&bindings.join(",\n"));
    res.push_str("\n  );\n");
  }

  fn dump_always(&self, res: &mut String) {
    res.push_str("  always @(posedge clock) begin\n");
    res.push_str("    if (reset) begin\n");
    for net in self.netlist.iter() {
      if let Opcode::Register | Opcode::RegisterEn = net.opcode {
        let init = &net.ins[0];
        if matches!(
          self.netlist.get(init.net).opcode,
          Opcode::Const { .. }
        ) && init.port.is_none()
        {
          res.push_str(&format!(
            "      {} <= {};\n",
            self.names[net.id],
            self.iref(init)
          ));
        }
      }
    }
    res.push_str("    end else begin\n");
    for net in self.netlist.iter() {
      match &net.opcode {
        Opcode::Register => {
          res.push_str(&format!(
            "      {} <= {};\n",
            self.names[net.id],
            self.iref(&net.ins[1])
          ));
        }
        Opcode::RegisterEn => {
          res.push_str(&format!(
            "      if ({} == 1) {} <= {};\n",
            self.iref(&net.ins[1]),
            self.names[net.id],
            self.iref(&net.ins[2])
          ));
        }
        _ => {}
      }
    }
    for net in self.netlist.iter() {
      match &net.opcode {
        Opcode::Display { fmt } => self.dump_display(net, fmt, res),
        Opcode::Finish => {
          res.push_str(&format!(
            "      if ({} == 1) $finish;\n",
            self.iref(&net.ins[0])
          ));
        }
        Opcode::Assert { msg } => {
          res.push_str(&format!(
            "      if ({} == 1) if ({} == 0) begin $write(\"{}\"); $finish; end\n",
            self.iref(&net.ins[0]),
            self.iref(&net.ins[1]),
            escape(msg)
          ));
        }
        Opcode::RegFileWrite => {
          res.push_str(&format!(
            "      if ({} == 1) {}[{}] <= {};\n",
            self.iref(&net.ins[1]),
            self.names[net.ins[0].net],
            self.iref(&net.ins[2]),
            self.iref(&net.ins[3])
          ));
        }
        _ => {}
      }
    }
    res.push_str("    end\n");
    res.push_str("  end\n");
  }

  fn dump_display(&self, net: &Net, fmt: &[FmtAtom], res: &mut String) {
    let mut indent = 6;
    res.push_str(&format!(
      "{}if ({} == 1) begin\n",
      " ".repeat(indent),
      self.iref(&net.ins[0])
    ));
    indent += 2;
    let mut run_fmt = String::new();
    let mut run_args: Vec<String> = Vec::new();
    let mut cursor = 1;
    let flush =
      |run_fmt: &mut String, run_args: &mut Vec<String>, indent: usize, res: &mut String| {
        if run_fmt.is_empty() && run_args.is_empty() {
          return;
        }
        let args = if run_args.is_empty() {
          String::new()
        } else {
          format!(", {}", run_args.join(", "))
        };
        res.push_str(&format!(
          "{}$write(\"{}\"{});\n",
          " ".repeat(indent),
          run_fmt,
          args
        ));
        run_fmt.clear();
        run_args.clear();
      };
    for atom in fmt {
      match atom {
        FmtAtom::Lit(s) => run_fmt.push_str(&escape(s)),
        FmtAtom::Val { .. } => {
          run_fmt.push_str(&atom.specifier().unwrap());
          run_args.push(self.iref(&net.ins[cursor]));
          cursor += 1;
        }
        FmtAtom::BeginCond => {
          flush(&mut run_fmt, &mut run_args, indent, res);
          res.push_str(&format!(
            "{}if ({} == 1) begin\n",
            " ".repeat(indent),
            self.iref(&net.ins[cursor])
          ));
          cursor += 1;
          indent += 2;
        }
        FmtAtom::EndCond => {
          flush(&mut run_fmt, &mut run_args, indent, res);
          indent -= 2;
          res.push_str(&format!("{}end\n", " ".repeat(indent)));
        }
      }
    }
    flush(&mut run_fmt, &mut run_args, indent, res);
    indent -= 2;
    res.push_str(&format!("{}end\n", " ".repeat(indent)));
  }
}

/// Render a netlist as a complete Verilog module.
pub fn emit(netlist: &Netlist) -> String {
  VerilogDumper::new(netlist).dump()
}

/// Write `<base_dir>/<module>.v`.
pub fn elaborate(netlist: &Netlist, config: &Config) -> io::Result<PathBuf> {
  create_and_clean_dir(&config.base_dir, config.override_dump)?;
  let path = config.fname(netlist.get_name(), "v");
  println!("Writing verilog rtl to {}", path.display());
  let mut fd = File::create(&path)?;
  fd.write_all(emit(netlist).as_bytes())?;
  Ok(path)
}
