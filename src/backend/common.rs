use std::{env, fs, path::PathBuf};

pub struct Config {
  /// The directory the emitted files land in.
  pub base_dir: PathBuf,
  /// If true, the emitter removes whatever the target directory already
  /// holds before writing.
  pub override_dump: bool,
  /// The cycle bound compiled into the simulator harness.
  pub sim_threshold: usize,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      base_dir: env::temp_dir(),
      override_dump: true,
      sim_threshold: 100000,
    }
  }
}

impl Config {
  /// The path of an emitted file with the given suffix.
  pub fn fname(&self, module: &str, suffix: &str) -> PathBuf {
    self.base_dir.join(format!("{}.{}", module, suffix))
  }
}

pub(super) fn create_and_clean_dir(dir: &PathBuf, override_dir: bool) -> std::io::Result<()> {
  if !dir.exists() {
    fs::create_dir_all(dir)?;
  }
  assert!(dir.is_dir(), "{} is not a directory", dir.display());
  if override_dir {
    for elem in fs::read_dir(dir)? {
      let path = elem?.path();
      if path.is_dir() {
        fs::remove_dir_all(path)?;
      } else {
        fs::remove_file(path)?;
      }
    }
  }
  Ok(())
}
