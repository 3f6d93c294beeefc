//! The simulator scaffold written next to the Verilog: a Verilator C++
//! wrapper, a per-module makefile, and a parent Makefile delegating to
//! it. All three are verbatim templates parameterized on the module name.

use std::{fs, io};

use super::common::Config;

fn cpp_wrapper(module: &str, sim_threshold: usize) -> String {
  format!(
    r#"// Verilator harness for {module}
#include "V{module}.h"
#include "verilated.h"

vluint64_t main_time = 0;

double sc_time_stamp() {{ return main_time; }}

int main(int argc, char** argv) {{
  Verilated::commandArgs(argc, argv);
  V{module}* top = new V{module};
  // Hold reset over one full clock cycle.
  top->reset = 1;
  top->clock = 0; top->eval();
  top->clock = 1; top->eval();
  top->reset = 0;
  while (!Verilated::gotFinish() && main_time < {sim_threshold}) {{
    top->clock = 0; top->eval();
    top->clock = 1; top->eval();
    main_time++;
  }}
  top->final();
  delete top;
  return 0;
}}
"#
  )
}

fn module_mk(module: &str) -> String {
  format!(
    r#"# Build the Verilator simulator for {module}.
# BITWEAVE_ROOT points at the source tree holding the Verilog primitives.
ifndef BITWEAVE_ROOT
$(error "Please set BITWEAVE_ROOT")
endif

{module}: {module}.v {module}.cpp
	verilator -cc {module}.v -exe {module}.cpp -o {module} \
	  -y $(BITWEAVE_ROOT)/verilog \
	  -Wno-UNSIGNED -Wno-WIDTH \
	  --x-assign unique --x-initial unique
	$(MAKE) -C obj_dir -f V{module}.mk {module}
	cp obj_dir/{module} .

.PHONY: clean
clean:
	rm -rf obj_dir {module}
"#
  )
}

fn parent_makefile(module: &str) -> String {
  format!(
    r#"all:
	$(MAKE) -f {module}.mk

.PHONY: clean
clean:
	$(MAKE) -f {module}.mk clean
"#
  )
}

/// Write `<module>.cpp`, `<module>.mk` and the parent `Makefile` into the
/// configured output directory. The directory is expected to exist; the
/// Verilog emitter creates it.
pub fn elaborate(module: &str, config: &Config) -> io::Result<()> {
  fs::create_dir_all(&config.base_dir)?;
  fs::write(
    config.fname(module, "cpp"),
    cpp_wrapper(module, config.sim_threshold),
  )?;
  fs::write(config.fname(module, "mk"), module_mk(module))?;
  fs::write(config.base_dir.join("Makefile"), parent_makefile(module))?;
  Ok(())
}
