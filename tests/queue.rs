//! A one-slot queue with a producer writing a running count and a
//! consumer draining it. With one slot, every enqueue is followed by the
//! matching dequeue, which the guard structure encodes directly.

use bitweave::backend::verilog;
use bitweave::ir::Opcode;
use bitweave::queue::{make_queue, Stream};
use bitweave::{FmtAtom, RtlBuilder};

fn build() -> bitweave::netlist::Netlist {
  let mut sys = RtlBuilder::new("simple_queue");
  let q = make_queue(&mut sys, "q", 8);

  // Producer: push the running count whenever there is room.
  let zero = sys.get_const_u64(8, 0);
  let count = sys.add_reg("count", zero);
  sys.when(q.not_full, |s| {
    q.enq(s, count.value());
    let one = s.get_const_u64(8, 1);
    let next = s.create_add(count.value(), one);
    s.assign(count, next);
    s.create_display(
      vec![FmtAtom::lit("Enqueued "), FmtAtom::dec(), FmtAtom::lit("\n")],
      vec![count.value()],
    );
  });

  // Consumer: drain whenever a value is present.
  sys.when(q.can_deq(), |s| {
    q.deq(s);
    s.create_display(
      vec![FmtAtom::lit("Dequeued "), FmtAtom::dec(), FmtAtom::lit("\n")],
      vec![q.first],
    );
  });

  sys.flatten()
}

#[test]
fn the_trace_carries_both_messages() {
  let netlist = build();
  let text = verilog::emit(&netlist);
  assert!(text.contains("$write(\"Enqueued %d\\n\""));
  assert!(text.contains("$write(\"Dequeued %d\\n\""));
}

#[test]
fn enq_and_deq_guards_are_complementary() {
  let netlist = build();
  // The enqueue display is guarded by not-full (a negation of the full
  // register), the dequeue display by the full register itself; a cycle
  // can never print both for the same slot state.
  let displays = netlist
    .iter()
    .filter(|net| matches!(net.opcode, Opcode::Display { .. }))
    .collect::<Vec<_>>();
  assert_eq!(displays.len(), 2);
  let enq_guard = netlist.get(displays[0].ins[0].net);
  let deq_guard = netlist.get(displays[1].ins[0].net);
  assert_ne!(enq_guard.id, deq_guard.id);
}

#[test]
fn state_reduces_to_three_registers() {
  let netlist = build();
  // Queue data, the full flag, and the producer count.
  let regs = netlist
    .iter()
    .filter(|net| matches!(net.opcode, Opcode::Register | Opcode::RegisterEn))
    .count();
  assert_eq!(regs, 3);
}

#[test]
fn a_stream_shares_the_queue_plumbing() {
  let mut sys = RtlBuilder::new("streamed");
  let q = make_queue(&mut sys, "q", 8);
  let s = Stream::from_queue(&q);
  sys.when(s.can_get, |b| {
    s.get(b);
  });
  sys.create_output("front", s.value);
  let netlist = sys.flatten();
  let text = verilog::emit(&netlist);
  assert!(text.contains("output wire [7:0] front"));
}
