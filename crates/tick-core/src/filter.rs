use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum Filter {
  #[default]
  All,
  Active,
  Completed
}

impl Filter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | Filter::All => true,
      | Filter::Active => {
        task.is_active()
      }
      | Filter::Completed => {
        task.completed
      }
    }
  }

  pub fn as_str(
    self
  ) -> &'static str {
    match self {
      | Filter::All => "all",
      | Filter::Active => "active",
      | Filter::Completed => {
        "completed"
      }
    }
  }
}

impl fmt::Display for Filter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Filter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(Filter::All),
      | "active" => Ok(Filter::Active),
      | "completed" | "done" => {
        Ok(Filter::Completed)
      }
      | other => Err(anyhow!(
        "invalid filter: {other} \
         (expected \
         all|active|completed)"
      ))
    }
  }
}

/// Lower-cased search needle, computed once per derivation.
#[derive(Debug, Clone, Default)]
pub struct SearchNeedle {
  lowered: String
}

impl SearchNeedle {
  pub fn new(
    search: &str
  ) -> Self {
    Self {
      lowered: search.to_lowercase()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.lowered.is_empty()
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    if self.is_empty() {
      return true;
    }
    let hit = task
      .text
      .to_lowercase()
      .contains(&self.lowered);
    trace!(id = %task.id, hit, "search match");
    hit
  }
}
