//! An 8-bit toy CPU: `00ZZNNNN` loads an immediate, `01ZZXXYY` adds two
//! registers, `10NNNNYY` branches on a nonzero register, `11NNNNNN`
//! halts. The program loads 1 into r0, accumulates it into r1 four
//! times, branches once on r1, and halts.

use bitweave::backend::verilog;
use bitweave::ir::Opcode;
use bitweave::pattern::{BitPat, BitScan};
use bitweave::{FmtAtom, RtlBuilder};

const PROGRAM: [u64; 8] = [
  0b00_00_0001, // li r0, 1
  0b01_01_00_01, // add r1, r0, r1
  0b01_01_00_01,
  0b01_01_00_01,
  0b01_01_00_01,
  0b10_0111_01, // bnz 7, r1
  0b11_000000, // halt
  0b11_000000, // halt
];

fn build() -> bitweave::netlist::Netlist {
  let mut sys = RtlBuilder::new("tiny_cpu");

  let pc_init = sys.get_const_u64(4, 0);
  let pc = sys.add_reg("pc", pc_init);
  let rf = sys.add_regfile("rf", 2, 8, None);

  // Instruction ROM: an 8-way selector over the program words.
  let rom_sel = sys.create_slice(pc.value(), 2, 0);
  let words = PROGRAM
    .iter()
    .map(|x| sys.get_const_u64(8, *x))
    .collect::<Vec<_>>();
  let instr = sys.create_mux(rom_sel, words);
  sys.add_name_hint(instr, "instr");

  // Fall-through next pc, overridden by branches and halts.
  let one4 = sys.get_const_u64(4, 1);
  let pc_inc = sys.create_add(pc.value(), one4);
  let next_pc = sys.add_wire("next_pc", pc_inc);
  sys.assign(pc, next_pc.value());

  let decode = BitScan::new()
    .alt(BitPat::new().lit(2, 0b00).var("rd", 2).var("imm", 4))
    .alt(
      BitPat::new()
        .lit(2, 0b01)
        .var("rd", 2)
        .var("rx", 2)
        .var("ry", 2),
    )
    .alt(BitPat::new().lit(2, 0b10).var("target", 4).var("ry", 2))
    .alt(BitPat::new().lit(2, 0b11).var("pad", 6));

  decode.dispatch(&mut sys, instr, |s, i| match i {
    0 => {
      let rd = decode.get(0).extract(s, instr, "rd");
      let imm = decode.get(0).extract(s, instr, "imm");
      let value = s.create_zext(imm, 8);
      rf.update(s, rd, value);
    }
    1 => {
      let rd = decode.get(1).extract(s, instr, "rd");
      let rx = decode.get(1).extract(s, instr, "rx");
      let ry = decode.get(1).extract(s, instr, "ry");
      let a = rf.read(s, rx);
      let b = rf.read(s, ry);
      let sum = s.create_add(a, b);
      rf.update(s, rd, sum);
    }
    2 => {
      let target = decode.get(2).extract(s, instr, "target");
      let ry = decode.get(2).extract(s, instr, "ry");
      let value = rf.read(s, ry);
      let zero = s.get_const_u64(8, 0);
      let taken = s.create_neq(value, zero);
      s.when(taken, |s| {
        s.assign(next_pc, target);
      });
    }
    3 => {
      s.assign(next_pc, pc.value());
      s.create_finish();
    }
    _ => unreachable!(),
  });

  // Per-cycle trace of the program counter and the accumulator.
  let r1_addr = sys.get_const_u64(2, 1);
  let r1 = rf.read(&mut sys, r1_addr);
  sys.create_display(
    vec![
      FmtAtom::lit("pc="),
      FmtAtom::dec(),
      FmtAtom::lit(" r1="),
      FmtAtom::dec(),
      FmtAtom::lit("\n"),
    ],
    vec![pc.value(), r1],
  );

  sys.flatten()
}

#[test]
fn the_cpu_elaborates_to_a_bounded_netlist() {
  let netlist = build();
  assert!(!netlist.is_empty());
  assert!(netlist.len() < 200, "netlist has {} nets", netlist.len());
}

#[test]
fn state_and_memory_land_in_the_netlist() {
  let netlist = build();
  // The pc register is write-enabled only through the next_pc wire merge.
  assert!(netlist
    .iter()
    .any(|net| matches!(net.opcode, Opcode::Register)));
  assert!(netlist
    .iter()
    .any(|net| matches!(net.opcode, Opcode::RegFileMake { .. })));
  let writes = netlist
    .iter()
    .filter(|net| matches!(net.opcode, Opcode::RegFileWrite))
    .count();
  assert_eq!(writes, 2);
}

#[test]
fn the_rom_lowers_through_a_case_function() {
  let netlist = build();
  let text = verilog::emit(&netlist);
  assert!(text.contains("function [7:0] f_instr_"));
  assert!(text.contains("case (sel)"));
}

#[test]
fn the_trace_and_halt_are_emitted() {
  let netlist = build();
  let text = verilog::emit(&netlist);
  assert!(text.contains("$write(\"pc=%d r1=%d\\n\""));
  assert!(text.contains("$finish;"));
  assert!(text.contains("reg [7:0] rf_"));
}

#[test]
fn the_program_words_fold_into_the_rom() {
  let netlist = build();
  let text = verilog::emit(&netlist);
  // A couple of the instruction constants, as emitted literals.
  assert!(text.contains("8'h51"));
  assert!(text.contains("8'hc0"));
}
