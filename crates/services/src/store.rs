use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use storage::repository::KeyValueRepository;
use study_core::model::{EntityKind, EntityRecord, Identity, merge_partial};
use study_core::{Clock, StorageKey};

use crate::codec;
use crate::error::{CodecError, StateStoreError};

/// What happened to a write-through after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    /// The record's `questions` collection is empty; an earlier non-empty
    /// save under the same key is left alone.
    SkippedEmptyQuestions,
    /// Encoding or the storage write failed; state lives in memory only.
    Failed,
}

//
// ─── STATE STORE ───────────────────────────────────────────────────────────────
//

/// One named slice of state, backed by durable storage.
///
/// The store keeps the current record in memory and writes it through on
/// every mutation, under the key derived from the entity kind and the active
/// identity.
pub struct StateStore<S: EntityRecord> {
    kind: EntityKind,
    state: S,
    identity_name: Option<String>,
    repo: Arc<dyn KeyValueRepository>,
    clock: Clock,
}

impl<S: EntityRecord> StateStore<S> {
    /// Create a store holding the default state, without touching storage.
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::UnsupportedKind` if `S` is not the record type for `kind`.
    pub fn new(
        kind: EntityKind,
        repo: Arc<dyn KeyValueRepository>,
        clock: Clock,
    ) -> Result<Self, StateStoreError> {
        if !S::supports(kind) {
            return Err(StateStoreError::UnsupportedKind(kind));
        }
        Ok(Self {
            kind,
            state: S::default_for(kind),
            identity_name: None,
            repo,
            clock,
        })
    }

    /// Create a store and load it for `identity`.
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::UnsupportedKind` if `S` is not the record type for `kind`.
    pub async fn open(
        kind: EntityKind,
        repo: Arc<dyn KeyValueRepository>,
        clock: Clock,
        identity: Option<&Identity>,
    ) -> Result<Self, StateStoreError> {
        let mut store = Self::new(kind, repo, clock)?;
        store.load(identity).await;
        Ok(store)
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    #[must_use]
    pub fn identity_name(&self) -> Option<&str> {
        self.identity_name.as_deref()
    }

    #[must_use]
    pub fn default_state(&self) -> S {
        S::default_for(self.kind)
    }

    /// Key the store currently reads and writes.
    #[must_use]
    pub fn storage_key(&self) -> StorageKey {
        self.kind.storage_key(self.identity_name())
    }

    /// Switch to `identity`'s namespace and replace in-memory state with what
    /// is stored there, or the default.
    pub async fn load(&mut self, identity: Option<&Identity>) -> &S {
        self.identity_name = identity.map(|id| id.username().to_string());
        let key = self.storage_key();
        let stored = match self.repo.get(&key).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(%key, error = %err, "state read failed; using default");
                None
            }
        };
        self.state = codec::decode(stored.as_deref(), self.default_state());
        &self.state
    }

    /// Shallow-merge `partial` into the state and persist.
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::Merge` if `partial` is not an object or the
    /// merged state does not fit the record; the state is left unchanged.
    pub async fn update(&mut self, partial: Value) -> Result<PersistOutcome, StateStoreError> {
        self.state = merge_partial(&self.state, partial)?;
        Ok(self.persist().await)
    }

    /// Mutate the state in place and persist.
    pub async fn modify<F>(&mut self, mutate: F) -> PersistOutcome
    where
        F: FnOnce(&mut S),
    {
        mutate(&mut self.state);
        self.persist().await
    }

    /// Replace the whole state and persist.
    pub async fn replace(&mut self, state: S) -> PersistOutcome {
        self.state = state;
        self.persist().await
    }

    /// Write the current state under the active key.
    pub async fn persist(&self) -> PersistOutcome {
        if self.state.question_count() == Some(0) {
            return PersistOutcome::SkippedEmptyQuestions;
        }
        let key = self.storage_key();
        let text = match codec::encode(&self.state, self.identity_name(), self.clock.now_millis())
        {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%key, error = %err, "state encode failed; keeping in memory only");
                return PersistOutcome::Failed;
            }
        };
        match self.repo.set(&key, &text).await {
            Ok(()) => PersistOutcome::Written,
            Err(err) => {
                tracing::warn!(%key, error = %err, "state write failed; keeping in memory only");
                PersistOutcome::Failed
            }
        }
    }

    /// Restore the default state and remove the stored key.
    pub async fn reset(&mut self) {
        self.state = self.default_state();
        let key = self.storage_key();
        if let Err(err) = self.repo.remove(&key).await {
            tracing::warn!(%key, error = %err, "state removal failed");
        }
    }
}

//
// ─── TYPE-ERASED VIEW ──────────────────────────────────────────────────────────
//

/// Type-erased store operations used by the registry to treat every entity
/// the same way.
#[async_trait]
pub trait ManagedStore: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Current state as JSON.
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::Codec` if the state cannot be serialized.
    fn snapshot(&self) -> Result<Value, StateStoreError>;

    /// Check that `value` would be accepted by `restore`.
    ///
    /// # Errors
    ///
    /// Returns the decode failure message.
    fn validate(&self, value: &Value) -> Result<(), String>;

    async fn reload(&mut self, identity: Option<&Identity>);

    /// Replace the state with `value` and persist.
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::Codec` if `value` does not fit the record.
    async fn restore(&mut self, value: Value) -> Result<PersistOutcome, StateStoreError>;

    async fn clear(&mut self);
}

#[async_trait]
impl<S: EntityRecord> ManagedStore for StateStore<S> {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn snapshot(&self) -> Result<Value, StateStoreError> {
        serde_json::to_value(&self.state)
            .map_err(|err| StateStoreError::Codec(err.into()))
    }

    fn validate(&self, value: &Value) -> Result<(), String> {
        if !value.is_object() {
            return Err(CodecError::NotAnObject.to_string());
        }
        S::deserialize(value)
            .map(|_| ())
            .map_err(|err| err.to_string())
    }

    async fn reload(&mut self, identity: Option<&Identity>) {
        self.load(identity).await;
    }

    async fn restore(&mut self, value: Value) -> Result<PersistOutcome, StateStoreError> {
        if !value.is_object() {
            return Err(StateStoreError::Codec(CodecError::NotAnObject));
        }
        let state: S =
            serde_json::from_value(value).map_err(|err| StateStoreError::Codec(err.into()))?;
        Ok(self.replace(state).await)
    }

    async fn clear(&mut self) {
        self.reset().await;
    }
}
