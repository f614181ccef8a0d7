use std::io::Write;

use anyhow::anyhow;
use tracing::{debug, info, instrument, warn};

use crate::app::TodoApp;
use crate::cli::{Command, ListArgs, ThemeAction};
use crate::config::Config;
use crate::filter::Filter;
use crate::render::Renderer;
use crate::task::{Priority, TaskId};

#[instrument(skip(app, cfg, renderer, out, command))]
pub fn dispatch<W: Write>(
    app: &mut TodoApp,
    cfg: &Config,
    renderer: &Renderer,
    out: &mut W,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    let outcome = match command {
        Command::Add { priority, text } => {
            let priority = match priority {
                Some(p) => p,
                None => cfg.default_priority()?,
            };
            cmd_add(app, out, &text.join(" "), priority)
        }
        Command::List(args) => cmd_list(app, renderer, out, args),
        Command::Done { selector } => cmd_done(app, out, &selector),
        Command::Delete { selector } => cmd_delete(app, out, &selector),
        Command::Edit { selector, text } => cmd_edit(app, out, &selector, &text.join(" ")),
        Command::Priority { selector, level } => cmd_priority(app, out, &selector, level),
        Command::Clear => cmd_clear(app, out),
        Command::Theme { action } => cmd_theme(app, out, action),
    };
    outcome?;

    if app.unsaved() {
        for error in app.save_errors() {
            warn!(error, "write did not reach storage");
        }
        eprintln!("warning: changes not saved");
    }

    Ok(())
}

/// Resolves a user-supplied task reference.
///
/// Accepts a 1-based position in the unfiltered display order, an exact id,
/// or an unambiguous id prefix.
pub fn resolve_selector(app: &TodoApp, selector: &str) -> anyhow::Result<TaskId> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(anyhow!("task selector cannot be empty"));
    }

    if let Ok(position) = selector.parse::<usize>() {
        let view = crate::view::derive_view(app.tasks(), Filter::All, "");
        if let Some(task) = position.checked_sub(1).and_then(|idx| view.get(idx)) {
            return Ok(task.id.clone());
        }
    }

    let exact = TaskId::from(selector);
    if app.task(&exact).is_some() {
        return Ok(exact);
    }

    let mut matches = app
        .tasks()
        .iter()
        .filter(|task| task.id.as_str().starts_with(selector));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches {selector}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("task selector {selector} is ambiguous"));
    }
    Ok(first.id.clone())
}

#[instrument(skip(app, out, text))]
fn cmd_add<W: Write>(
    app: &mut TodoApp,
    out: &mut W,
    text: &str,
    priority: Priority,
) -> anyhow::Result<()> {
    info!("command add");

    match app.create(text, priority) {
        Some(id) => writeln!(out, "Created task {id}.")?,
        None => writeln!(out, "Nothing to add.")?,
    }
    Ok(())
}

#[instrument(skip(app, renderer, out))]
fn cmd_list<W: Write>(
    app: &mut TodoApp,
    renderer: &Renderer,
    out: &mut W,
    args: ListArgs,
) -> anyhow::Result<()> {
    app.set_filter(args.filter);
    app.set_search_text(args.search);

    let view = app.view();
    debug!(shown = view.tasks.len(), total = app.tasks().len(), "rendering view");
    renderer.write_view(out, &view, app.filter(), app.search_text())
}

#[instrument(skip(app, out))]
fn cmd_done<W: Write>(app: &mut TodoApp, out: &mut W, selector: &str) -> anyhow::Result<()> {
    info!("command done");
    let id = resolve_selector(app, selector)?;
    app.toggle(&id);

    let state = match app.task(&id) {
        Some(task) if task.completed => "completed",
        _ => "active",
    };
    writeln!(out, "Task {id} is now {state}.")?;
    Ok(())
}

#[instrument(skip(app, out))]
fn cmd_delete<W: Write>(app: &mut TodoApp, out: &mut W, selector: &str) -> anyhow::Result<()> {
    info!("command delete");
    let id = resolve_selector(app, selector)?;
    app.delete(&id);
    writeln!(out, "Deleted task {id}.")?;
    Ok(())
}

#[instrument(skip(app, out, text))]
fn cmd_edit<W: Write>(
    app: &mut TodoApp,
    out: &mut W,
    selector: &str,
    text: &str,
) -> anyhow::Result<()> {
    info!("command edit");
    let id = resolve_selector(app, selector)?;
    if app.edit(&id, text) {
        writeln!(out, "Updated task {id}.")?;
    } else {
        writeln!(out, "Text cannot be empty; task {id} unchanged.")?;
    }
    Ok(())
}

#[instrument(skip(app, out))]
fn cmd_priority<W: Write>(
    app: &mut TodoApp,
    out: &mut W,
    selector: &str,
    level: Priority,
) -> anyhow::Result<()> {
    info!("command priority");
    let id = resolve_selector(app, selector)?;
    app.set_priority(&id, level);
    writeln!(out, "Task {id} priority set to {level}.")?;
    Ok(())
}

#[instrument(skip(app, out))]
fn cmd_clear<W: Write>(app: &mut TodoApp, out: &mut W) -> anyhow::Result<()> {
    info!("command clear");
    let removed = app.clear_completed();
    let noun = if removed == 1 { "task" } else { "tasks" };
    writeln!(out, "Removed {removed} completed {noun}.")?;
    Ok(())
}

#[instrument(skip(app, out))]
fn cmd_theme<W: Write>(app: &mut TodoApp, out: &mut W, action: ThemeAction) -> anyhow::Result<()> {
    match action {
        ThemeAction::Show => {}
        ThemeAction::Toggle => {
            app.toggle_theme();
        }
        ThemeAction::On => app.set_dark(true),
        ThemeAction::Off => app.set_dark(false),
    }

    let name = if app.is_dark() { "dark" } else { "light" };
    writeln!(out, "Theme: {name}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{dispatch, resolve_selector};
    use crate::app::TodoApp;
    use crate::cli::{Command, ListArgs, ThemeAction};
    use crate::config::Config;
    use crate::datastore::MemoryStore;
    use crate::filter::Filter;
    use crate::persisted::SharedStore;
    use crate::render::Renderer;
    use crate::task::{Priority, TaskId};

    fn setup() -> (TodoApp, Renderer, Config) {
        let store: SharedStore = Rc::new(MemoryStore::new());
        let renderer = Renderer::with_color(false);
        let app = TodoApp::open(store, renderer.theme_hook());
        (app, renderer, Config::default())
    }

    fn run(app: &mut TodoApp, renderer: &Renderer, cfg: &Config, command: Command) -> String {
        let mut out = Vec::new();
        dispatch(app, cfg, renderer, &mut out, command).expect("dispatch");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn add_uses_configured_default_priority() {
        let (mut app, renderer, mut cfg) = setup();
        cfg.apply_overrides(vec![("default.priority".to_string(), "high".to_string())]);

        let out = run(
            &mut app,
            &renderer,
            &cfg,
            Command::Add {
                priority: None,
                text: vec!["Call".to_string(), "bank".to_string()],
            },
        );
        assert!(out.starts_with("Created task "));
        assert_eq!(app.tasks()[0].priority, Priority::High);
        assert_eq!(app.tasks()[0].text, "Call bank");
    }

    #[test]
    fn blank_add_reports_nothing() {
        let (mut app, renderer, cfg) = setup();
        let out = run(
            &mut app,
            &renderer,
            &cfg,
            Command::Add {
                priority: Some(Priority::Low),
                text: vec!["   ".to_string()],
            },
        );
        assert_eq!(out.trim(), "Nothing to add.");
        assert!(app.tasks().is_empty());
    }

    #[test]
    fn selectors_resolve_by_position_id_and_prefix() {
        let (mut app, _, _) = setup();
        let low = app.create("low", Priority::Low).expect("created");
        let high = app.create("high", Priority::High).expect("created");

        assert_eq!(resolve_selector(&app, "1").expect("position"), high);
        assert_eq!(resolve_selector(&app, "2").expect("position"), low);
        assert_eq!(resolve_selector(&app, low.as_str()).expect("exact"), low);
        assert_eq!(resolve_selector(&app, &high.as_str()[..8]).expect("prefix"), high);
        assert!(resolve_selector(&app, "zzzz-not-an-id").is_err());
        assert!(resolve_selector(&app, "").is_err());
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        let store = Rc::new(MemoryStore::new());
        store.insert_raw(
            "todos",
            r#"[{"id":"ab1","text":"a","completed":false,"priority":"low"},
                {"id":"ab2","text":"b","completed":false,"priority":"low"}]"#,
        );
        let app = TodoApp::open(store, |_| {});
        assert!(resolve_selector(&app, "ab").is_err());
        assert_eq!(resolve_selector(&app, "ab2").expect("exact"), TaskId::from("ab2"));
    }

    #[test]
    fn done_list_and_clear_flow() {
        let (mut app, renderer, cfg) = setup();
        app.create("Buy milk", Priority::Medium);
        app.create("Call bank", Priority::High);
        app.create("Walk dog", Priority::Low);

        let out = run(
            &mut app,
            &renderer,
            &cfg,
            Command::Done {
                selector: "2".to_string(),
            },
        );
        assert!(out.contains("is now completed"));

        let out = run(
            &mut app,
            &renderer,
            &cfg,
            Command::List(ListArgs {
                filter: Filter::Active,
                search: "ca".to_string(),
            }),
        );
        assert!(out.contains("Call bank"));
        assert!(!out.contains("Walk dog"));
        assert!(out.contains("2 items left"));

        let out = run(&mut app, &renderer, &cfg, Command::Clear);
        assert_eq!(out.trim(), "Removed 1 completed task.");
        assert_eq!(app.tasks().len(), 2);
    }

    #[test]
    fn edit_rejects_blank_text() {
        let (mut app, renderer, cfg) = setup();
        let id = app.create("Read", Priority::Medium).expect("created");
        let out = run(
            &mut app,
            &renderer,
            &cfg,
            Command::Edit {
                selector: id.to_string(),
                text: vec![" ".to_string()],
            },
        );
        assert!(out.contains("unchanged"));
        assert_eq!(app.tasks()[0].text, "Read");
    }

    #[test]
    fn theme_toggle_reaches_renderer() {
        let (mut app, renderer, cfg) = setup();
        let out = run(
            &mut app,
            &renderer,
            &cfg,
            Command::Theme {
                action: ThemeAction::Toggle,
            },
        );
        assert_eq!(out.trim(), "Theme: dark");
        assert!(renderer.is_dark());

        run(
            &mut app,
            &renderer,
            &cfg,
            Command::Theme {
                action: ThemeAction::Off,
            },
        );
        assert!(!renderer.is_dark());
    }
}
