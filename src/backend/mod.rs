pub mod common;
pub mod harness;
pub mod verilog;

pub use common::Config;

use std::io;

use crate::netlist::Netlist;

/// Emit everything a design needs to simulate: the Verilog module, the
/// Verilator C++ wrapper, and the makefiles.
pub fn elaborate_top(netlist: &Netlist, config: &Config) -> io::Result<()> {
  verilog::elaborate(netlist, config)?;
  harness::elaborate(netlist.get_name(), config)?;
  Ok(())
}
