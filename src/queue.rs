//! A one-slot queue and its stream projection, built entirely from
//! registers and wires. Preconditions (enq only when `not_full`, deq only
//! when `not_empty`) are the designer's responsibility.

use crate::builder::{RtlBuilder, Wire};
use crate::ir::BaseNode;

pub struct Queue {
  /// 1 when an enqueue may happen this cycle.
  pub not_full: BaseNode,
  /// 1 when the slot holds a value.
  pub not_empty: BaseNode,
  /// The front value; valid when `not_empty`.
  pub first: BaseNode,
  pub(crate) do_enq: Wire,
  pub(crate) enq_data: Wire,
  pub(crate) do_deq: Wire,
}

pub fn make_queue(sys: &mut RtlBuilder, name: &str, width: usize) -> Queue {
  let data_init = sys.dontcare(width);
  let data = sys.add_reg(&format!("{}_data", name), data_init);
  let zero1 = sys.get_const_u64(1, 0);
  let full = sys.add_reg(&format!("{}_full", name), zero1);

  let dc = sys.dontcare(width);
  let enq_data = sys.add_wire(&format!("{}_enq_data", name), dc);
  let do_enq = sys.add_wire(&format!("{}_do_enq", name), zero1);
  let do_deq = sys.add_wire(&format!("{}_do_deq", name), zero1);

  // An enqueue wins over a simultaneous dequeue: the slot refills.
  sys.when(do_enq.value(), |s| {
    s.assign(data, enq_data.value());
    let one = s.get_const_u64(1, 1);
    s.assign(full, one);
  });
  let no_enq = sys.create_flip(do_enq.value());
  let deq_only = sys.create_bitwise_and(do_deq.value(), no_enq);
  sys.when(deq_only, |s| {
    let zero = s.get_const_u64(1, 0);
    s.assign(full, zero);
  });

  let not_full = sys.create_flip(full.value());
  Queue {
    not_full,
    not_empty: full.value(),
    first: data.value(),
    do_enq,
    enq_data,
    do_deq,
  }
}

impl Queue {
  /// Enqueue `value` under the current guard.
  pub fn enq(&self, sys: &mut RtlBuilder, value: BaseNode) {
    let one = sys.get_const_u64(1, 1);
    sys.assign(self.do_enq, one);
    sys.assign(self.enq_data, value);
  }

  /// Dequeue under the current guard.
  pub fn deq(&self, sys: &mut RtlBuilder) {
    let one = sys.get_const_u64(1, 1);
    sys.assign(self.do_deq, one);
  }

  pub fn can_deq(&self) -> BaseNode {
    self.not_empty
  }
}

/// The consumer-side projection of a queue.
pub struct Stream {
  pub can_get: BaseNode,
  pub value: BaseNode,
  do_get: Wire,
}

impl Stream {
  pub fn from_queue(queue: &Queue) -> Self {
    Stream {
      can_get: queue.not_empty,
      value: queue.first,
      do_get: queue.do_deq,
    }
  }

  /// Consume the current value under the current guard.
  pub fn get(&self, sys: &mut RtlBuilder) {
    let one = sys.get_const_u64(1, 1);
    sys.assign(self.do_get, one);
  }
}
