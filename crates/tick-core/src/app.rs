//! Operation surface offered to a presentation layer.
//!
//! `TodoApp` owns the task repository, the theme toggle and the transient
//! filter/search state. Both persisted parts share one store. Nothing here
//! returns an error; storage trouble shows up only through [`TodoApp::unsaved`].

use tracing::debug;

use crate::filter::Filter;
use crate::persisted::SharedStore;
use crate::preference::{PreferenceToggle, ThemeHook};
use crate::repository::TaskRepository;
use crate::task::{Priority, Task, TaskId};
use crate::view::{View, ViewQuery, active_count, has_completed};

#[derive(Debug)]
pub struct TodoApp {
    repo: TaskRepository,
    theme: PreferenceToggle,
    query: ViewQuery,
}

impl TodoApp {
    pub fn open(store: SharedStore, theme_hook: impl ThemeHook + 'static) -> Self {
        let repo = TaskRepository::open(store.clone());
        let theme = PreferenceToggle::open(store, theme_hook);
        Self {
            repo,
            theme,
            query: ViewQuery::default(),
        }
    }

    pub fn create(&mut self, text: &str, priority: Priority) -> Option<TaskId> {
        self.repo.create(text, priority)
    }

    pub fn toggle(&mut self, id: &TaskId) -> bool {
        self.repo.toggle(id)
    }

    pub fn delete(&mut self, id: &TaskId) -> bool {
        self.repo.delete(id)
    }

    pub fn edit(&mut self, id: &TaskId, text: &str) -> bool {
        self.repo.edit(id, text)
    }

    pub fn set_priority(&mut self, id: &TaskId, priority: Priority) -> bool {
        self.repo.set_priority(id, priority)
    }

    pub fn clear_completed(&mut self) -> usize {
        self.repo.clear_completed()
    }

    pub fn tasks(&self) -> &[Task] {
        self.repo.tasks()
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.repo.get(id)
    }

    /// Current derived view for the active filter and search text.
    pub fn view(&self) -> View<'_> {
        View::build(self.repo.tasks(), &self.query)
    }

    pub fn active_count(&self) -> usize {
        active_count(self.repo.tasks())
    }

    pub fn has_completed(&self) -> bool {
        has_completed(self.repo.tasks())
    }

    pub fn filter(&self) -> Filter {
        self.query.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        debug!(%filter, "filter changed");
        self.query.filter = filter;
    }

    pub fn search_text(&self) -> &str {
        &self.query.search
    }

    pub fn set_search_text(&mut self, search: impl Into<String>) {
        self.query.search = search.into();
        debug!(search = %self.query.search, "search text changed");
    }

    pub fn toggle_theme(&mut self) -> bool {
        self.theme.toggle()
    }

    pub fn set_dark(&mut self, dark: bool) {
        self.theme.set(dark);
    }

    pub fn is_dark(&self) -> bool {
        self.theme.is_enabled()
    }

    /// True when the last write of either persisted value did not reach the
    /// store.
    pub fn unsaved(&self) -> bool {
        !self.repo.is_saved() || !self.theme.is_saved()
    }

    pub fn save_errors(&self) -> Vec<&str> {
        self.repo
            .last_error()
            .into_iter()
            .chain(self.theme.last_error())
            .collect()
    }
}
