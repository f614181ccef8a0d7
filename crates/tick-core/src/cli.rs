use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::Filter;
use crate::task::Priority;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tick",
    version,
    about = "tick: a small persistent to-do list",
    disable_help_subcommand = true,
    infer_subcommands = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "tickrc")]
    pub tickrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task
    Add {
        #[arg(short = 'p', long = "priority")]
        priority: Option<Priority>,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Show the task list
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Toggle completion of a task
    #[command(visible_alias = "toggle")]
    Done { selector: String },

    /// Delete a task
    #[command(visible_alias = "rm")]
    Delete { selector: String },

    /// Replace the text of a task
    Edit {
        selector: String,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Change the priority of a task
    Priority { selector: String, level: Priority },

    /// Remove all completed tasks
    Clear,

    /// Show or change the theme preference
    Theme {
        #[arg(value_enum, default_value_t = ThemeAction::Show)]
        action: ThemeAction,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(short = 'f', long = "filter", default_value_t = Filter::All)]
    pub filter: Filter,

    #[arg(short = 's', long = "search", default_value = "")]
    pub search: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
    Show,
    Toggle,
    On,
    Off,
}

impl Command {
    /// Command used when none is given, named by `default.command`.
    pub fn from_default_name(name: &str) -> anyhow::Result<Self> {
        match name.trim() {
            "list" | "ls" => Ok(Command::List(ListArgs::default())),
            "active" => Ok(Command::List(ListArgs {
                filter: Filter::Active,
                search: String::new(),
            })),
            "theme" => Ok(Command::Theme {
                action: ThemeAction::Show,
            }),
            other => Err(anyhow!(
                "default.command must be list, active or theme, got: {other}"
            )),
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.KEY=VALUE` / `rc.KEY:VALUE` tokens out of the argument list so
/// they can appear anywhere on the command line.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, ThemeAction, preprocess_args};
    use crate::filter::Filter;
    use crate::task::Priority;

    fn args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[test]
    fn rc_tokens_are_extracted() {
        let pre = preprocess_args(&args(&["tick", "rc.color=off", "list", "rc.default.priority:high"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["tick", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.default.priority".to_string(), "high".to_string()),
            ]
        );
    }

    #[test]
    fn parses_add_with_priority_and_words() {
        let cli = GlobalCli::parse_from(["tick", "add", "-p", "high", "Call", "the", "bank"]);
        match cli.command {
            Some(Command::Add { priority, text }) => {
                assert_eq!(priority, Some(Priority::High));
                assert_eq!(text.join(" "), "Call the bank");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_list_filter_and_search() {
        let cli = GlobalCli::parse_from(["tick", "list", "--filter", "active", "-s", "ca"]);
        match cli.command {
            Some(Command::List(list)) => {
                assert_eq!(list.filter, Filter::Active);
                assert_eq!(list.search, "ca");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn theme_defaults_to_show() {
        let cli = GlobalCli::parse_from(["tick", "theme"]);
        assert!(matches!(
            cli.command,
            Some(Command::Theme {
                action: ThemeAction::Show
            })
        ));
    }

    #[test]
    fn default_command_names() {
        assert!(matches!(
            Command::from_default_name("list").expect("list"),
            Command::List(_)
        ));
        assert!(Command::from_default_name("explode").is_err());
    }
}
