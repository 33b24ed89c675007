#![forbid(unsafe_code)]

pub mod app_services;
pub mod codec;
pub mod error;
pub mod exam_service;
pub mod identity_service;
pub mod practice_service;
pub mod progress_service;
pub mod question_bank;
pub mod registry;
pub mod store;

pub use study_core::Clock;

pub use app_services::{AppServices, DEFAULT_QUESTIONS_LOCATION};
pub use error::{
    AppServicesError, CodecError, ExamError, IdentityServiceError, ImportError,
    QuestionBankError, StateStoreError,
};
pub use exam_service::ExamService;
pub use identity_service::IdentityService;
pub use practice_service::{PracticeAnswer, PracticeService};
pub use progress_service::{ProgressService, ProgressSummary};
pub use question_bank::{DirectorySource, HttpSource, QuestionBank, QuestionSource};
pub use registry::{EXPORT_FILE_NAME, ExportDocument, ImportReport, StateRegistry};
pub use store::{ManagedStore, PersistOutcome, StateStore};
