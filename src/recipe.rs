//! A small sequential layer: recipes compile onto go/done pulse wiring
//! over the core's registers and wires, one state bit per `Tick`.

use crate::builder::RtlBuilder;
use crate::ir::BaseNode;

pub enum Recipe {
  /// Finishes the cycle it starts.
  Skip,
  /// Finishes one cycle after it starts.
  Tick,
  /// Run an RTL block under the go pulse; takes one cycle.
  Action(Box<dyn FnOnce(&mut RtlBuilder)>),
  /// One after another.
  Seq(Vec<Recipe>),
  /// All at once; finishes when the slowest branch finishes. The branches
  /// are expected to take the same number of cycles.
  Par(Vec<Recipe>),
  /// One branch under the condition, the other under its negation.
  If(BaseNode, Box<Recipe>, Box<Recipe>),
  /// Re-run the body as long as the condition holds. The body must
  /// contain at least one `Tick` (or `Action`), otherwise the repeat path
  /// is a combinational cycle.
  While(BaseNode, Box<Recipe>),
}

impl Recipe {
  /// Sugar for `Action` without the boxing noise.
  pub fn act(f: impl FnOnce(&mut RtlBuilder) + 'static) -> Recipe {
    Recipe::Action(Box::new(f))
  }
}

/// Compile a recipe. `go` is a 1-bit start pulse; the returned bit pulses
/// on the cycle the recipe finishes.
pub fn run_recipe(sys: &mut RtlBuilder, recipe: Recipe, go: BaseNode) -> BaseNode {
  assert_eq!(
    go.width(sys),
    1,
    "A recipe go pulse must be 1 bit, but b{} is given",
    go.width(sys)
  );
  run(sys, recipe, go)
}

/// A 1-bit register delaying `x` by one cycle.
fn tick(sys: &mut RtlBuilder, x: BaseNode) -> BaseNode {
  let zero = sys.get_const_u64(1, 0);
  let r = sys.add_reg("tick", zero);
  sys.assign(r, x);
  r.value()
}

fn run(sys: &mut RtlBuilder, recipe: Recipe, go: BaseNode) -> BaseNode {
  match recipe {
    Recipe::Skip => go,
    Recipe::Tick => tick(sys, go),
    Recipe::Action(body) => {
      sys.when(go, body);
      tick(sys, go)
    }
    Recipe::Seq(stages) => {
      let mut done = go;
      for stage in stages {
        done = run(sys, stage, done);
      }
      done
    }
    Recipe::Par(branches) => {
      assert!(!branches.is_empty(), "Par of an empty recipe list");
      let dones = branches
        .into_iter()
        .map(|branch| run(sys, branch, go))
        .collect::<Vec<_>>();
      let first = dones[0];
      dones[1..]
        .iter()
        .fold(first, |acc, x| sys.create_bitwise_and(acc, *x))
    }
    Recipe::If(cond, on_true, on_false) => {
      let t_go = sys.create_bitwise_and(go, cond);
      let ncond = sys.create_flip(cond);
      let f_go = sys.create_bitwise_and(go, ncond);
      let t_done = run(sys, *on_true, t_go);
      let f_done = run(sys, *on_false, f_go);
      sys.create_bitwise_or(t_done, f_done)
    }
    Recipe::While(cond, body) => {
      // The repeat wire closes the loop; registers inside the body keep
      // the closed path sequential.
      let zero = sys.get_const_u64(1, 0);
      let repeat = sys.add_wire("while_repeat", zero);
      let start = sys.create_bitwise_or(go, repeat.value());
      let enter = sys.create_bitwise_and(start, cond);
      let body_done = run(sys, *body, enter);
      sys.assign(repeat, body_done);
      let ncond = sys.create_flip(cond);
      sys.create_bitwise_and(start, ncond)
    }
  }
}
