//! A value bound to one key of a [`KeyValueStore`].
//!
//! Loading reads through once at construction; every update writes through
//! immediately. Both directions are best effort: a missing or unreadable
//! slot yields the default, and a failed write keeps the in-memory value and
//! is only logged and recorded.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::datastore::KeyValueStore;

pub type SharedStore = Rc<dyn KeyValueStore>;

/// Serializer/deserializer pair for a persisted value.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> anyhow::Result<String>;

    fn decode(&self, raw: &str) -> anyhow::Result<T>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> anyhow::Result<String> {
        serde_json::to_string(value).context("failed to encode value as json")
    }

    fn decode(&self, raw: &str) -> anyhow::Result<T> {
        serde_json::from_str(raw).context("failed to decode json value")
    }
}

pub struct Persisted<T, C = JsonCodec> {
    key: String,
    value: T,
    codec: C,
    store: SharedStore,
    last_error: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Persisted<T, JsonCodec>
where
    T: Serialize + DeserializeOwned,
{
    pub fn initialize(store: SharedStore, key: &str, default: T) -> Self {
        Self::with_codec(store, key, default, JsonCodec)
    }
}

impl<T, C> Persisted<T, C>
where
    C: Codec<T>,
{
    #[tracing::instrument(skip(store, default, codec))]
    pub fn with_codec(store: SharedStore, key: &str, default: T, codec: C) -> Self {
        let value = load_or_default(store.as_ref(), &codec, key, default);
        Self {
            key: key.to_string(),
            value,
            codec,
            store,
            last_error: None,
            _marker: PhantomData,
        }
    }

    /// Runs `check` over the loaded value, e.g. to drop records that break
    /// invariants the codec cannot express. Does not write.
    pub fn validate_with<F>(self, check: F) -> Self
    where
        F: FnOnce(T) -> T,
    {
        let Self {
            key,
            value,
            codec,
            store,
            last_error,
            _marker,
        } = self;
        Self {
            key,
            value: check(value),
            codec,
            store,
            last_error,
            _marker,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.write_through();
    }

    /// Functional update evaluated against the latest in-memory value.
    pub fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value);
        self.set(next);
    }

    pub fn is_saved(&self) -> bool {
        self.last_error.is_none()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[tracing::instrument(skip(self), fields(key = %self.key))]
    fn write_through(&mut self) {
        let result = self
            .codec
            .encode(&self.value)
            .and_then(|raw| {
                self.store
                    .set(&self.key, &raw)
                    .with_context(|| format!("failed to write key {}", self.key))
            });

        match result {
            Ok(()) => {
                debug!("persisted value");
                self.last_error = None;
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "persisting value failed; keeping in-memory change");
                self.last_error = Some(format!("{err:#}"));
            }
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for Persisted<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

fn load_or_default<T, C>(store: &dyn KeyValueStore, codec: &C, key: &str, default: T) -> T
where
    C: Codec<T>,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "no stored value; using default");
            return default;
        }
        Err(err) => {
            warn!(key, error = %err, "reading stored value failed; using default");
            return default;
        }
    };

    match codec.decode(&raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(key, error = %format!("{err:#}"), "stored value is malformed; using default");
            default
        }
    }
}
