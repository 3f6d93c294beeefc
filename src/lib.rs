//! bitweave describes synchronous circuits as ordinary Rust expressions
//! and elaborates them into a netlist of primitive nodes, which the
//! backend renders as a synthesizable Verilog module plus a simulator
//! scaffold.

pub mod backend;
pub mod builder;
pub mod ir;
pub mod netlist;
pub mod pattern;
pub mod queue;
pub mod recipe;

pub use builder::{Bram, Reg, RegFile, RtlBuilder, Wire};
pub use ir::{BaseNode, FmtAtom, Radix};
