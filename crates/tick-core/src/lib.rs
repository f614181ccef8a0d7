pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod filter;
pub mod persisted;
pub mod preference;
pub mod render;
pub mod repository;
pub mod task;
pub mod view;

use std::ffi::OsString;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

pub use app::TodoApp;
pub use datastore::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use filter::Filter;
pub use persisted::{Codec, JsonCodec, Persisted, SharedStore};
pub use preference::{PreferenceToggle, ThemeHook};
pub use repository::TaskRepository;
pub use task::{Priority, Task, TaskId};
pub use view::{View, ViewQuery, derive_view};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tick CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.tickrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store: SharedStore = Rc::new(
    datastore::FileStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open store at {}",
        data_dir.display()
      )
    })?
  );

  let renderer =
    render::Renderer::new(&cfg)?;
  let mut todo =
    TodoApp::open(
      store,
      renderer.theme_hook()
    );

  let command = match cli.command {
    | Some(command) => command,
    | None => {
      let name = cfg
        .get("default.command")
        .unwrap_or_else(|| {
          "list".to_string()
        });
      debug!(command = %name, "no explicit command, using default");
      cli::Command::from_default_name(
        &name
      )?
    }
  };

  let mut out = std::io::stdout().lock();
  commands::dispatch(
    &mut todo,
    &cfg,
    &renderer,
    &mut out,
    command
  )?;

  info!("done");
  Ok(())
}
