use tracing::{debug, instrument};

use crate::persisted::{Persisted, SharedStore};

pub const DARK_MODE_KEY: &str = "dark-mode";

/// Presentation side effect reflecting the theme flag.
pub trait ThemeHook {
    fn apply(&mut self, dark: bool);
}

impl<F> ThemeHook for F
where
    F: FnMut(bool),
{
    fn apply(&mut self, dark: bool) {
        self(dark)
    }
}

/// Persisted boolean preference whose every value, including the one loaded
/// at startup, is pushed to a [`ThemeHook`].
pub struct PreferenceToggle {
    value: Persisted<bool>,
    hook: Box<dyn ThemeHook>,
}

impl PreferenceToggle {
    pub fn open(store: SharedStore, hook: impl ThemeHook + 'static) -> Self {
        Self::open_key(store, DARK_MODE_KEY, hook)
    }

    #[instrument(skip(store, hook))]
    pub fn open_key(store: SharedStore, key: &str, hook: impl ThemeHook + 'static) -> Self {
        let value = Persisted::initialize(store, key, false);
        let mut toggle = Self {
            value,
            hook: Box::new(hook),
        };
        toggle.reflect();
        toggle
    }

    pub fn is_enabled(&self) -> bool {
        *self.value.get()
    }

    pub fn is_saved(&self) -> bool {
        self.value.is_saved()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.value.last_error()
    }

    #[instrument(skip(self))]
    pub fn toggle(&mut self) -> bool {
        self.value.update(|prev| !prev);
        self.reflect();
        self.is_enabled()
    }

    /// Sets the flag; the hook only fires when the value actually changes.
    pub fn set(&mut self, enabled: bool) {
        if self.is_enabled() != enabled {
            self.toggle();
        }
    }

    fn reflect(&mut self) {
        let dark = self.is_enabled();
        debug!(key = self.value.key(), dark, "applying theme");
        self.hook.apply(dark);
    }
}

impl std::fmt::Debug for PreferenceToggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceToggle")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}
