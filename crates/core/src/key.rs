use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity segment used when nobody is logged in.
pub const GUEST: &str = "guest";

const SEPARATOR: &str = "-";

/// Fixed prefixes that partition the key space by state family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Per-page state (`app-state-…`).
    AppState,
    /// Per question-type and mode state (`question-state-…`).
    QuestionState,
    /// Long-lived learning progress (`learning-progress-…`).
    LearningProgress,
}

impl Namespace {
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::AppState => "app-state",
            Namespace::QuestionState => "question-state",
            Namespace::LearningProgress => "learning-progress",
        }
    }
}

/// A fully derived storage key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Wraps a raw key, for keys that are not derived (e.g. `current-user`).
    #[must_use]
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the page-state key for `entity` under the `app-state` namespace.
#[must_use]
pub fn derive_key(entity: &str, mode: Option<&str>, identity_name: Option<&str>) -> StorageKey {
    derive_namespaced_key(Namespace::AppState, Some(entity), mode, identity_name)
}

/// Derive a key under an explicit namespace.
///
/// Segments are joined with `-`, e.g. `question-state-coding-exam-alice` or
/// `learning-progress-guest`.
#[must_use]
pub fn derive_namespaced_key(
    namespace: Namespace,
    entity: Option<&str>,
    mode: Option<&str>,
    identity_name: Option<&str>,
) -> StorageKey {
    let identity = identity_name.unwrap_or(GUEST);
    let parts = [Some(namespace.prefix()), entity, mode, Some(identity)];
    let key = parts
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    StorageKey(key)
}
