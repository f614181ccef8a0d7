use std::cell::Cell;
use std::io::{self, IsTerminal, Write};
use std::rc::Rc;

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::filter::Filter;
use crate::task::{Priority, Task};
use crate::view::View;

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    dark: Rc<Cell<bool>>,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self::with_color(color && io::stdout().is_terminal()))
    }

    pub fn with_color(color: bool) -> Self {
        Self {
            color,
            dark: Rc::new(Cell::new(false)),
        }
    }

    /// Hook for the theme preference; switches the palette.
    pub fn theme_hook(&self) -> impl FnMut(bool) + 'static {
        let dark = self.dark.clone();
        move |value| dark.set(value)
    }

    pub fn is_dark(&self) -> bool {
        self.dark.get()
    }

    #[tracing::instrument(skip(self, out, view))]
    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        view: &View<'_>,
        filter: Filter,
        search: &str,
    ) -> anyhow::Result<()> {
        if view.is_empty() {
            if filter == Filter::All && search.is_empty() {
                writeln!(out, "No tasks yet.")?;
            } else {
                writeln!(out, "No matching tasks.")?;
            }
        } else {
            let headers = vec![
                "#".to_string(),
                "ID".to_string(),
                "Pri".to_string(),
                "Done".to_string(),
                "Text".to_string(),
            ];

            let rows = view
                .tasks
                .iter()
                .enumerate()
                .map(|(idx, task)| self.task_row(idx + 1, task))
                .collect();

            write_table(&mut out, headers, rows)?;
        }

        writeln!(out)?;
        let noun = if view.active_count == 1 { "item" } else { "items" };
        write!(out, "{} {noun} left", view.active_count)?;
        if view.has_completed {
            write!(out, "  (`tick clear` removes completed)")?;
        }
        writeln!(out)?;
        Ok(())
    }

    fn task_row(&self, position: usize, task: &Task) -> Vec<String> {
        let short_id: String = task.id.as_str().chars().take(SHORT_ID_LEN).collect();
        let priority = self.paint(task.priority.as_str(), self.priority_code(task.priority));
        let done = if task.completed { "x" } else { "" }.to_string();
        let text = if task.completed {
            self.paint(&task.text, "9")
        } else {
            task.text.clone()
        };

        vec![position.to_string(), short_id, priority, done, text]
    }

    fn priority_code(&self, priority: Priority) -> &'static str {
        match (priority, self.dark.get()) {
            (Priority::High, false) => "31",
            (Priority::Medium, false) => "33",
            (Priority::Low, false) => "34",
            (Priority::High, true) => "91",
            (Priority::Medium, true) => "93",
            (Priority::Low, true) => "94",
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Renderer, strip_ansi};
    use crate::config::Config;
    use crate::filter::Filter;
    use crate::task::{Priority, Task, TaskId};
    use crate::view::{View, ViewQuery};

    fn render(renderer: &Renderer, tasks: &[Task], query: &ViewQuery) -> String {
        let view = View::build(tasks, query);
        let mut buf = Vec::new();
        renderer
            .write_view(&mut buf, &view, query.filter, &query.search)
            .expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn table_lists_view_in_order_with_footer() {
        let mut done = Task::new(TaskId::from("aaaa"), "Buy milk".to_string(), Priority::Medium);
        done.completed = true;
        let tasks = vec![
            done,
            Task::new(TaskId::from("bbbb"), "Call bank".to_string(), Priority::High),
        ];

        let out = render(&Renderer::with_color(false), &tasks, &ViewQuery::default());
        let call = out.find("Call bank").expect("call bank shown");
        let milk = out.find("Buy milk").expect("buy milk shown");
        assert!(call < milk);
        assert!(out.contains("1 item left"));
        assert!(out.contains("tick clear"));
    }

    #[test]
    fn empty_states() {
        let renderer = Renderer::with_color(false);
        let out = render(&renderer, &[], &ViewQuery::default());
        assert!(out.contains("No tasks yet."));
        assert!(out.contains("0 items left"));

        let tasks = vec![Task::new(TaskId::from("a"), "x".to_string(), Priority::Low)];
        let out = render(&renderer, &tasks, &ViewQuery::new(Filter::Completed, ""));
        assert!(out.contains("No matching tasks."));
    }

    #[test]
    fn theme_hook_switches_palette() {
        let renderer = Renderer::with_color(true);
        let tasks = vec![Task::new(TaskId::from("a"), "x".to_string(), Priority::High)];

        let light = render(&renderer, &tasks, &ViewQuery::default());
        assert!(light.contains("\x1b[31m"));

        let mut hook = renderer.theme_hook();
        hook(true);
        assert!(renderer.is_dark());
        let dark = render(&renderer, &tasks, &ViewQuery::default());
        assert!(dark.contains("\x1b[91m"));
        assert_eq!(strip_ansi(&light), strip_ansi(&dark));
    }

    #[test]
    fn color_setting_goes_through_config() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "off".to_string())]);
        let renderer = Renderer::new(&cfg).expect("renderer");
        let tasks = vec![Task::new(TaskId::from("a"), "x".to_string(), Priority::High)];
        assert!(!render(&renderer, &tasks, &ViewQuery::default()).contains('\x1b'));

        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        let err = Renderer::new(&cfg).expect_err("invalid color");
        assert!(err.to_string().contains("invalid color setting"));
    }
}
