//! Derived display list.
//!
//! `derive_view` is a pure function of the collection, the status filter and
//! the search text. It never reorders the collection itself; it returns
//! borrows in display order so it can run on every keystroke.

use crate::filter::{Filter, SearchNeedle};
use crate::task::Task;

/// Transient UI state feeding the pipeline. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub filter: Filter,
    pub search: String,
}

impl ViewQuery {
    pub fn new(filter: Filter, search: impl Into<String>) -> Self {
        Self {
            filter,
            search: search.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View<'a> {
    pub tasks: Vec<&'a Task>,
    pub active_count: usize,
    pub has_completed: bool,
}

impl<'a> View<'a> {
    pub fn build(tasks: &'a [Task], query: &ViewQuery) -> Self {
        Self {
            tasks: derive_view(tasks, query.filter, &query.search),
            active_count: active_count(tasks),
            has_completed: has_completed(tasks),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Filters by status and search text, then orders incomplete before
/// completed and, within each group, high before medium before low.
///
/// The sort is stable, so equal keys keep insertion order.
pub fn derive_view<'a>(tasks: &'a [Task], filter: Filter, search: &str) -> Vec<&'a Task> {
    let needle = SearchNeedle::new(search);
    let mut out: Vec<&Task> = tasks
        .iter()
        .filter(|task| filter.matches(task) && needle.matches(task))
        .collect();
    out.sort_by_key(|task| (task.completed, task.priority.rank()));
    out
}

/// Incomplete tasks across the whole collection, ignoring filter and search.
pub fn active_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| task.is_active()).count()
}

pub fn has_completed(tasks: &[Task]) -> bool {
    tasks.iter().any(|task| task.completed)
}
