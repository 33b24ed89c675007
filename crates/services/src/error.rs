//! Shared error types for the services crate.

use thiserror::Error;

use storage::sqlite::SqliteInitError;
use study_core::model::{EntityKind, IdentityError, MergeError, QuestionError};

/// Errors emitted by the state codec.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("state must serialize to a JSON object")]
    NotAnObject,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors emitted by `StateStore`.
///
/// Storage faults never show up here: they are logged and reported through
/// `PersistOutcome::Failed` instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateStoreError {
    #[error("record type does not back entity {0}")]
    UnsupportedKind(EntityKind),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors emitted by `StateRegistry::import_all`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("import file is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("import file must contain a JSON object")]
    NotAnObject,
    #[error("imported {entity} does not match its state shape: {reason}")]
    InvalidEntity { entity: String, reason: String },
}

/// Errors emitted by `IdentityService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityServiceError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Errors emitted while loading question content.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("chapter {chapter} not found")]
    ChapterNotFound { chapter: String },
    #[error("question request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("chapter document is not valid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid question source: {0}")]
    InvalidSource(String),
    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// Errors emitted by `ExamService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamError {
    #[error("no questions match the exam configuration")]
    NoQuestions,
    #[error("no exam is in progress")]
    NotTaking,
    #[error(transparent)]
    Questions(#[from] QuestionBankError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Identity(#[from] IdentityServiceError),
    #[error(transparent)]
    Store(#[from] StateStoreError),
    #[error(transparent)]
    Questions(#[from] QuestionBankError),
}
