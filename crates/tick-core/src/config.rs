//! tick settings.
//!
//! Settings come from built-in defaults, then the rc file (and anything it
//! includes), then `rc.KEY=VALUE` overrides from the command line.

use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::task::Priority;

const DEFAULTS: [(&str, &str); 4] = [
  ("data.location", "~/.tick"),
  ("default.command", "list"),
  ("default.priority", "medium"),
  ("color", "on")
];

#[derive(Debug, Clone)]
pub struct Config {
  settings:         HashMap<String, String>,
  /// Canonical paths of every rc file read, in read order.
  pub loaded_files: Vec<PathBuf>
}

#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Blank,
  Include(&'a str),
  Setting(&'a str, &'a str)
}

impl Default for Config {
  fn default() -> Self {
    Self {
      settings:     DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: Vec::new()
    }
  }
}

impl Config {
  /// Defaults plus the rc file picked by `--tickrc`, `TICKRC` or
  /// `~/.tickrc`, in that order.
  #[tracing::instrument]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match rc_path(rc_override)? {
      | Some(path) => {
        info!(rc = %path.display(), "reading tickrc");
        cfg.read_rc(&path)?;
      }
      | None => {
        debug!("no tickrc, defaults only")
      }
    }

    Ok(cfg)
  }

  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = match key
        .strip_prefix("rc.")
      {
        | Some(bare) => bare.to_string(),
        | None => key
      };
      debug!(%key, %value, "rc override");
      self.settings.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.settings.get(key).cloned()
  }

  /// `on`/`off` style switch. Unset is `None`; anything unrecognised is an
  /// error naming the key.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .settings
      .get(key)
      .map(|raw| {
        parse_switch(raw).ok_or_else(
          || {
            anyhow!(
              "invalid {key} setting: \
               {raw}"
            )
          }
        )
      })
      .transpose()
  }

  pub fn default_priority(
    &self
  ) -> anyhow::Result<Priority> {
    self
      .settings
      .get("default.priority")
      .map(|raw| {
        raw.parse::<Priority>().context(
          "invalid default.priority \
           setting"
        )
      })
      .unwrap_or(Ok(Priority::default()))
  }

  fn read_rc(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = fs::canonicalize(
      expand_home(path)
    )
    .with_context(|| {
      format!(
        "cannot open tickrc {}",
        path.display()
      )
    })?;

    if self.loaded_files.contains(&path)
    {
      debug!(rc = %path.display(), "already read, include skipped");
      return Ok(());
    }
    self.loaded_files.push(path.clone());

    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let dir = path
      .parent()
      .unwrap_or(Path::new("."))
      .to_path_buf();

    for (idx, raw) in
      text.lines().enumerate()
    {
      let line =
        parse_rc_line(raw).with_context(
          || {
            format!(
              "invalid config line \
               {}:{}",
              path.display(),
              idx + 1
            )
          }
        )?;

      match line {
        | RcLine::Blank => {}
        | RcLine::Include(target) => {
          let target =
            expand_home(Path::new(target));
          let target = dir.join(target);
          if target.exists() {
            self.read_rc(&target)?;
          } else {
            warn!(include = %target.display(), "included tickrc missing");
          }
        }
        | RcLine::Setting(key, value) => {
          trace!(key, value, "rc setting");
          self.settings.insert(
            key.to_string(),
            value.to_string()
          );
        }
      }
    }

    Ok(())
  }
}

/// Directory holding the store files: `--data`, else `data.location`.
/// Created when missing.
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match override_dir {
    | Some(dir) => dir.to_path_buf(),
    | None => {
      let location = cfg
        .get("data.location")
        .ok_or_else(|| {
          anyhow!(
            "data.location is not set"
          )
        })?;
      expand_home(Path::new(&location))
    }
  };

  if !dir.is_dir() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn rc_path(
  rc_override: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = rc_override {
    return Ok(Some(path.to_path_buf()));
  }

  if let Some(env) =
    std::env::var_os("TICKRC")
  {
    return Ok(
      (env != "/dev/null")
        .then(|| PathBuf::from(env))
    );
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let path = home.join(".tickrc");
  Ok(path.is_file().then_some(path))
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<RcLine<'_>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();

  if line.is_empty() {
    return Ok(RcLine::Blank);
  }

  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      bail!("include needs a path");
    }
    return Ok(RcLine::Include(target));
  }

  match line.split_once('=') {
    | Some((key, value))
      if !key.trim().is_empty() =>
    {
      Ok(RcLine::Setting(
        key.trim(),
        value.trim()
      ))
    }
    | _ => {
      bail!("expected key = value: {raw}")
    }
  }
}

fn parse_switch(
  raw: &str
) -> Option<bool> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "true" | "1" => {
      Some(true)
    }
    | "off" | "no" | "false" | "0" => {
      Some(false)
    }
    | _ => None
  }
}

fn expand_home(path: &Path) -> PathBuf {
  if let Ok(rest) =
    path.strip_prefix("~")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
