//! The task collection and the only code allowed to change it.
//!
//! Every operation computes a new collection from the current one and writes
//! it through [`Persisted`]. Operations are total: invalid input (blank text,
//! unknown id) is a silent no-op reported through the return value, never an
//! error.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::persisted::{Persisted, SharedStore};
use crate::task::{Priority, Task, TaskId};

pub const TODOS_KEY: &str = "todos";

/// Produces task ids that never repeat within a collection.
///
/// Ids are UUID v4 strings; a draw that clashes with an existing id (only
/// possible with ids imported from older data) is discarded and redrawn.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdGenerator;

impl IdGenerator {
    pub fn next_id(&self, existing: &[Task]) -> TaskId {
        loop {
            let candidate = TaskId::new(Uuid::new_v4().to_string());
            if !existing.iter().any(|task| task.id == candidate) {
                return candidate;
            }
            warn!(id = %candidate, "generated id already in use; drawing again");
        }
    }
}

#[derive(Debug)]
pub struct TaskRepository {
    todos: Persisted<Vec<Task>>,
    ids: IdGenerator,
}

impl TaskRepository {
    #[instrument(skip(store))]
    pub fn open(store: SharedStore) -> Self {
        let todos =
            Persisted::initialize(store, TODOS_KEY, Vec::new()).validate_with(sanitize_loaded);
        info!(count = todos.get().len(), "loaded task collection");
        Self {
            todos,
            ids: IdGenerator,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        self.todos.get()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks().iter().find(|task| &task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }

    pub fn is_saved(&self) -> bool {
        self.todos.is_saved()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.todos.last_error()
    }

    /// Appends a new incomplete task. Returns `None` when `text` is blank.
    #[instrument(skip(self, text))]
    pub fn create(&mut self, text: &str, priority: Priority) -> Option<TaskId> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring create with blank text");
            return None;
        }

        let id = self.ids.next_id(self.tasks());
        let task = Task::new(id.clone(), text.to_string(), priority);
        self.todos.update(|todos| {
            let mut next = todos.clone();
            next.push(task);
            next
        });

        debug!(id = %id, count = self.len(), "task created");
        Some(id)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn toggle(&mut self, id: &TaskId) -> bool {
        self.modify(id, |task| task.completed = !task.completed)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: &TaskId) -> bool {
        if self.get(id).is_none() {
            debug!("delete of unknown id ignored");
            return false;
        }

        self.todos.update(|todos| {
            todos
                .iter()
                .filter(|task| &task.id != id)
                .cloned()
                .collect()
        });
        true
    }

    /// Replaces the text of a task. Blank text is rejected and the stored
    /// text stays as it was.
    #[instrument(skip(self, text), fields(id = %id))]
    pub fn edit(&mut self, id: &TaskId, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            debug!("rejecting edit to blank text");
            return false;
        }
        self.modify(id, |task| task.text = text.to_string())
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn set_priority(&mut self, id: &TaskId, priority: Priority) -> bool {
        self.modify(id, |task| task.priority = priority)
    }

    /// Drops every completed task, keeping the rest in order. Returns how
    /// many were removed.
    #[instrument(skip(self))]
    pub fn clear_completed(&mut self) -> usize {
        let removed = self.tasks().iter().filter(|task| task.completed).count();
        if removed == 0 {
            return 0;
        }

        self.todos.update(|todos| {
            todos
                .iter()
                .filter(|task| !task.completed)
                .cloned()
                .collect()
        });
        info!(removed, "cleared completed tasks");
        removed
    }

    fn modify<F>(&mut self, id: &TaskId, change: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        let Some(index) = self.tasks().iter().position(|task| &task.id == id) else {
            debug!("unknown id; nothing to change");
            return false;
        };

        self.todos.update(|todos| {
            let mut next = todos.clone();
            if let Some(task) = next.get_mut(index) {
                change(task);
            }
            next
        });
        true
    }
}

fn sanitize_loaded(tasks: Vec<Task>) -> Vec<Task> {
    let before = tasks.len();
    let mut seen = HashSet::new();
    let kept: Vec<Task> = tasks
        .into_iter()
        .filter_map(|mut task| {
            let trimmed = task.text.trim();
            if trimmed.is_empty() || task.id.as_str().is_empty() {
                return None;
            }
            if trimmed.len() != task.text.len() {
                task.text = trimmed.to_string();
            }
            seen.insert(task.id.clone()).then_some(task)
        })
        .collect();

    if kept.len() != before {
        warn!(
            before,
            after = kept.len(),
            "dropped stored tasks with blank text or duplicate ids"
        );
    }
    kept
}
