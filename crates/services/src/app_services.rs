use std::sync::Arc;

use storage::repository::Storage;
use study_core::model::Identity;

use crate::Clock;
use crate::error::AppServicesError;
use crate::exam_service::ExamService;
use crate::identity_service::IdentityService;
use crate::practice_service::PracticeService;
use crate::progress_service::ProgressService;
use crate::question_bank::{QuestionBank, source_from_location};
use crate::registry::StateRegistry;

/// Question location used when none is configured.
pub const DEFAULT_QUESTIONS_LOCATION: &str = "data/questions";

/// Assembles app-facing services around one state registry.
///
/// The registry is loaded for the persisted identity at construction;
/// `login` and `logout` keep it in step afterwards.
pub struct AppServices {
    registry: StateRegistry,
    identity: IdentityService,
    practice: PracticeService,
    exam: ExamService,
    progress: ProgressService,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// question location is not usable.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        questions: &str,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, questions).await
    }

    /// # Errors
    ///
    /// Returns `AppServicesError` if the question location is not usable.
    pub async fn from_storage(
        storage: Storage,
        clock: Clock,
        questions: &str,
    ) -> Result<Self, AppServicesError> {
        let bank = QuestionBank::new(source_from_location(questions)?);
        let identity = IdentityService::new(Arc::clone(&storage.kv), clock);
        let current = identity.current().await;
        let registry = StateRegistry::open(Arc::clone(&storage.kv), clock, current).await?;

        Ok(Self {
            registry,
            identity,
            practice: PracticeService::new(bank.clone(), clock),
            exam: ExamService::new(bank, clock),
            progress: ProgressService::new(clock),
        })
    }

    /// Declare an identity and resync every store to its namespace.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Identity` for a blank name.
    pub async fn login(&mut self, username: &str) -> Result<Identity, AppServicesError> {
        let identity = self.identity.login(username).await?;
        self.registry
            .on_identity_changed(Some(identity.clone()))
            .await;
        Ok(identity)
    }

    /// Return to the guest namespace. Nothing stored is deleted.
    pub async fn logout(&mut self) {
        self.identity.logout().await;
        self.registry.on_identity_changed(None).await;
    }

    #[must_use]
    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StateRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.registry.identity()
    }

    /// Practice service together with the registry it works on.
    pub fn practice(&mut self) -> (&PracticeService, &mut StateRegistry) {
        (&self.practice, &mut self.registry)
    }

    /// Exam service together with the registry it works on.
    pub fn exam(&mut self) -> (&ExamService, &mut StateRegistry) {
        (&self.exam, &mut self.registry)
    }

    /// Progress service together with the registry it works on.
    pub fn progress(&mut self) -> (&ProgressService, &mut StateRegistry) {
        (&self.progress, &mut self.registry)
    }
}
