// The RTL builder and identifier synthesis.

pub mod naming;
pub mod system;

pub use system::{Bram, Reg, RegFile, RtlBuilder, Wire};
