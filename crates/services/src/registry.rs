use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use storage::repository::KeyValueRepository;
use study_core::Clock;
use study_core::key::GUEST;
use study_core::model::{
    EntityKind, ExamState, Identity, LearningProgress, LessonsState, Page, PracticeState,
    ProgressViewState, QuestionExamState, QuestionPracticeState, QuestionType, SettingsState,
    StudyMode, UserProfileState, identity_name,
};

use crate::error::{ImportError, StateStoreError};
use crate::store::{ManagedStore, PersistOutcome, StateStore};

/// Default file name offered for backup downloads.
pub const EXPORT_FILE_NAME: &str = "app-states-backup.json";

const EXPORT_DATE_FIELD: &str = "exportDate";
const EXPORT_USER_FIELD: &str = "user";

/// One value per question type.
#[derive(Debug)]
pub struct PerType<T> {
    pub multiple_choice: T,
    pub fill_in_blank: T,
    pub coding: T,
    pub essay: T,
}

impl<T> PerType<T> {
    fn try_build<E>(mut build: impl FnMut(QuestionType) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            multiple_choice: build(QuestionType::MultipleChoice)?,
            fill_in_blank: build(QuestionType::FillInBlank)?,
            coding: build(QuestionType::Coding)?,
            essay: build(QuestionType::Essay)?,
        })
    }

    #[must_use]
    pub fn get(&self, question_type: QuestionType) -> &T {
        match question_type {
            QuestionType::MultipleChoice => &self.multiple_choice,
            QuestionType::FillInBlank => &self.fill_in_blank,
            QuestionType::Coding => &self.coding,
            QuestionType::Essay => &self.essay,
        }
    }

    pub fn get_mut(&mut self, question_type: QuestionType) -> &mut T {
        match question_type {
            QuestionType::MultipleChoice => &mut self.multiple_choice,
            QuestionType::FillInBlank => &mut self.fill_in_blank,
            QuestionType::Coding => &mut self.coding,
            QuestionType::Essay => &mut self.essay,
        }
    }
}

/// Bulk export: one field per entity plus the export metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDocument {
    #[serde(flatten)]
    pub states: Map<String, Value>,
    #[serde(rename = "exportDate")]
    pub export_date: DateTime<Utc>,
    pub user: String,
}

impl ExportDocument {
    /// Two-space indented JSON, the format of the backup file.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if a state value cannot be written.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// What `import_all` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Entities whose state was replaced.
    pub applied: Vec<EntityKind>,
    /// Top-level fields that name no entity.
    pub ignored: Vec<String>,
    /// Applied entities whose write-through did not reach storage.
    pub not_persisted: Vec<EntityKind>,
}

/// The process-wide set of state stores.
pub struct StateRegistry {
    identity: Option<Identity>,
    clock: Clock,
    practice: StateStore<PracticeState>,
    exam: StateStore<ExamState>,
    lessons: StateStore<LessonsState>,
    progress_view: StateStore<ProgressViewState>,
    settings: StateStore<SettingsState>,
    user_profile: StateStore<UserProfileState>,
    question_practice: PerType<StateStore<QuestionPracticeState>>,
    question_exam: PerType<StateStore<QuestionExamState>>,
    learning_progress: StateStore<LearningProgress>,
}

impl StateRegistry {
    /// Build every store with default state, without reading storage.
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::UnsupportedKind` if a record type is wired to
    /// the wrong entity.
    pub fn new(repo: Arc<dyn KeyValueRepository>, clock: Clock) -> Result<Self, StateStoreError> {
        let page = |page: Page| EntityKind::Page(page);
        Ok(Self {
            identity: None,
            clock,
            practice: StateStore::new(page(Page::Practice), Arc::clone(&repo), clock)?,
            exam: StateStore::new(page(Page::Exam), Arc::clone(&repo), clock)?,
            lessons: StateStore::new(page(Page::Lessons), Arc::clone(&repo), clock)?,
            progress_view: StateStore::new(page(Page::Progress), Arc::clone(&repo), clock)?,
            settings: StateStore::new(page(Page::Settings), Arc::clone(&repo), clock)?,
            user_profile: StateStore::new(page(Page::UserProfile), Arc::clone(&repo), clock)?,
            question_practice: PerType::try_build(|ty| {
                StateStore::new(
                    EntityKind::Question(ty, StudyMode::Practice),
                    Arc::clone(&repo),
                    clock,
                )
            })?,
            question_exam: PerType::try_build(|ty| {
                StateStore::new(
                    EntityKind::Question(ty, StudyMode::Exam),
                    Arc::clone(&repo),
                    clock,
                )
            })?,
            learning_progress: StateStore::new(EntityKind::LearningProgress, repo, clock)?,
        })
    }

    /// Build every store and load it for `identity`.
    ///
    /// # Errors
    ///
    /// See [`StateRegistry::new`].
    pub async fn open(
        repo: Arc<dyn KeyValueRepository>,
        clock: Clock,
        identity: Option<Identity>,
    ) -> Result<Self, StateStoreError> {
        let mut registry = Self::new(repo, clock)?;
        registry.on_identity_changed(identity).await;
        Ok(registry)
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Every store, in export order.
    #[must_use]
    pub fn stores(&self) -> Vec<&dyn ManagedStore> {
        let mut stores: Vec<&dyn ManagedStore> = vec![
            &self.practice,
            &self.exam,
            &self.lessons,
            &self.progress_view,
            &self.settings,
            &self.user_profile,
        ];
        for ty in QuestionType::ALL {
            stores.push(self.question_practice.get(ty));
            stores.push(self.question_exam.get(ty));
        }
        stores.push(&self.learning_progress);
        stores
    }

    /// Every store, mutably, in export order.
    pub fn stores_mut(&mut self) -> Vec<&mut dyn ManagedStore> {
        let PerType {
            multiple_choice: mc_practice,
            fill_in_blank: fib_practice,
            coding: coding_practice,
            essay: essay_practice,
        } = &mut self.question_practice;
        let PerType {
            multiple_choice: mc_exam,
            fill_in_blank: fib_exam,
            coding: coding_exam,
            essay: essay_exam,
        } = &mut self.question_exam;
        let stores: Vec<&mut dyn ManagedStore> = vec![
            &mut self.practice,
            &mut self.exam,
            &mut self.lessons,
            &mut self.progress_view,
            &mut self.settings,
            &mut self.user_profile,
            mc_practice,
            mc_exam,
            fib_practice,
            fib_exam,
            coding_practice,
            coding_exam,
            essay_practice,
            essay_exam,
            &mut self.learning_progress,
        ];
        stores
    }

    /// Full resync: reload every store from `identity`'s namespace.
    ///
    /// In-memory state of the previous identity is dropped without a final
    /// write; it was already persisted on its last mutation.
    pub async fn on_identity_changed(&mut self, identity: Option<Identity>) {
        tracing::info!(
            user = identity_name(identity.as_ref()).unwrap_or(GUEST),
            "reloading state for identity"
        );
        for store in self.stores_mut() {
            store.reload(identity.as_ref()).await;
        }
        self.identity = identity;
    }

    /// Snapshot every store into a backup document.
    #[must_use]
    pub fn export_all(&self) -> ExportDocument {
        let mut states = Map::new();
        for store in self.stores() {
            match store.snapshot() {
                Ok(value) => {
                    states.insert(store.kind().export_name().to_string(), value);
                }
                Err(err) => {
                    tracing::warn!(entity = %store.kind(), error = %err, "skipping entity in export");
                }
            }
        }
        ExportDocument {
            states,
            export_date: self.clock.now(),
            user: identity_name(self.identity()).unwrap_or(GUEST).to_string(),
        }
    }

    /// Replace store contents from a backup document.
    ///
    /// Every present, non-null entity field is validated before any store is
    /// touched, so a failed import leaves all state as it was.
    ///
    /// # Errors
    ///
    /// - `ImportError::Decode` if `text` is not JSON.
    /// - `ImportError::NotAnObject` if the top level is not an object.
    /// - `ImportError::InvalidEntity` if an entity field does not fit its record.
    pub async fn import_all(&mut self, text: &str) -> Result<ImportReport, ImportError> {
        let Value::Object(mut fields) = serde_json::from_str(text).map_err(ImportError::Decode)?
        else {
            return Err(ImportError::NotAnObject);
        };

        let mut staged = Vec::new();
        for store in self.stores() {
            let name = store.kind().export_name();
            match fields.remove(name) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    store
                        .validate(&value)
                        .map_err(|reason| ImportError::InvalidEntity {
                            entity: name.to_string(),
                            reason,
                        })?;
                    staged.push((store.kind(), value));
                }
            }
        }

        let mut report = ImportReport {
            ignored: fields
                .keys()
                .filter(|key| *key != EXPORT_DATE_FIELD && *key != EXPORT_USER_FIELD)
                .cloned()
                .collect(),
            ..ImportReport::default()
        };

        for store in self.stores_mut() {
            let kind = store.kind();
            let Some(position) = staged.iter().position(|(staged_kind, _)| *staged_kind == kind)
            else {
                continue;
            };
            let (_, value) = staged.swap_remove(position);
            let outcome = store
                .restore(value)
                .await
                .map_err(|err| ImportError::InvalidEntity {
                    entity: kind.export_name().to_string(),
                    reason: err.to_string(),
                })?;
            if outcome == PersistOutcome::Failed {
                report.not_persisted.push(kind);
            }
            report.applied.push(kind);
        }

        tracing::info!(
            applied = report.applied.len(),
            ignored = report.ignored.len(),
            "imported state backup"
        );
        Ok(report)
    }

    /// Reset one entity to its default and remove its key.
    pub async fn reset(&mut self, kind: EntityKind) {
        for store in self.stores_mut() {
            if store.kind() == kind {
                store.clear().await;
            }
        }
    }

    /// Reset every entity to its default and remove all keys of the active identity.
    pub async fn clear_all(&mut self) {
        for store in self.stores_mut() {
            store.clear().await;
        }
        tracing::info!(
            user = identity_name(self.identity()).unwrap_or(GUEST),
            "cleared all state"
        );
    }

    #[must_use]
    pub fn practice(&self) -> &StateStore<PracticeState> {
        &self.practice
    }

    pub fn practice_mut(&mut self) -> &mut StateStore<PracticeState> {
        &mut self.practice
    }

    #[must_use]
    pub fn exam(&self) -> &StateStore<ExamState> {
        &self.exam
    }

    pub fn exam_mut(&mut self) -> &mut StateStore<ExamState> {
        &mut self.exam
    }

    #[must_use]
    pub fn lessons(&self) -> &StateStore<LessonsState> {
        &self.lessons
    }

    pub fn lessons_mut(&mut self) -> &mut StateStore<LessonsState> {
        &mut self.lessons
    }

    #[must_use]
    pub fn progress_view(&self) -> &StateStore<ProgressViewState> {
        &self.progress_view
    }

    pub fn progress_view_mut(&mut self) -> &mut StateStore<ProgressViewState> {
        &mut self.progress_view
    }

    #[must_use]
    pub fn settings(&self) -> &StateStore<SettingsState> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut StateStore<SettingsState> {
        &mut self.settings
    }

    #[must_use]
    pub fn user_profile(&self) -> &StateStore<UserProfileState> {
        &self.user_profile
    }

    pub fn user_profile_mut(&mut self) -> &mut StateStore<UserProfileState> {
        &mut self.user_profile
    }

    #[must_use]
    pub fn question_practice(
        &self,
        question_type: QuestionType,
    ) -> &StateStore<QuestionPracticeState> {
        self.question_practice.get(question_type)
    }

    pub fn question_practice_mut(
        &mut self,
        question_type: QuestionType,
    ) -> &mut StateStore<QuestionPracticeState> {
        self.question_practice.get_mut(question_type)
    }

    #[must_use]
    pub fn question_exam(&self, question_type: QuestionType) -> &StateStore<QuestionExamState> {
        self.question_exam.get(question_type)
    }

    pub fn question_exam_mut(
        &mut self,
        question_type: QuestionType,
    ) -> &mut StateStore<QuestionExamState> {
        self.question_exam.get_mut(question_type)
    }

    #[must_use]
    pub fn learning_progress(&self) -> &StateStore<LearningProgress> {
        &self.learning_progress
    }

    pub fn learning_progress_mut(&mut self) -> &mut StateStore<LearningProgress> {
        &mut self.learning_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storage::repository::InMemoryRepository;
    use study_core::time::{fixed_clock, fixed_now};

    async fn registry() -> (InMemoryRepository, StateRegistry) {
        let mem = InMemoryRepository::new();
        let registry = StateRegistry::open(Arc::new(mem.clone()), fixed_clock(), None)
            .await
            .unwrap();
        (mem, registry)
    }

    #[tokio::test]
    async fn stores_cover_every_entity_in_export_order() {
        let (_, mut registry) = registry().await;
        let kinds: Vec<_> = registry.stores().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, EntityKind::all());
        let kinds_mut: Vec<_> = registry.stores_mut().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds_mut, EntityKind::all());
    }

    #[tokio::test]
    async fn export_names_every_entity_and_metadata() {
        let (_, registry) = registry().await;
        let doc = registry.export_all();
        let value: Value = serde_json::from_str(&doc.to_pretty_json().unwrap()).unwrap();
        for kind in EntityKind::all() {
            assert!(value.get(kind.export_name()).is_some(), "{kind} missing");
        }
        assert_eq!(value["user"], "guest");
        assert_eq!(value["exportDate"], json!(fixed_now()));
        assert_eq!(value["settings"]["theme"], "light");
    }

    #[tokio::test]
    async fn import_ignores_unknown_and_null_fields() {
        let (_, mut registry) = registry().await;
        let report = registry
            .import_all(r#"{"settings": {"theme": "dark"}, "practice": null, "bogus": 1, "user": "x"}"#)
            .await
            .unwrap();
        assert_eq!(report.applied, vec![EntityKind::Page(Page::Settings)]);
        assert_eq!(report.ignored, vec!["bogus".to_string()]);
        assert!(report.not_persisted.is_empty());
        assert_eq!(
            registry.settings().state().theme,
            study_core::model::Theme::Dark
        );
    }

    #[tokio::test]
    async fn import_is_all_or_nothing() {
        let (mem, mut registry) = registry().await;
        let err = registry
            .import_all(r#"{"settings": {"theme": "dark"}, "lessons": {"completedTopics": 5}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidEntity { ref entity, .. } if entity == "lessons"));
        assert_eq!(registry.settings().state(), &SettingsState::default());
        assert!(mem.is_empty().unwrap());
    }

    #[tokio::test]
    async fn import_rejects_malformed_documents() {
        let (_, mut registry) = registry().await;
        assert!(matches!(
            registry.import_all("{oops").await,
            Err(ImportError::Decode(_))
        ));
        assert!(matches!(
            registry.import_all("[1]").await,
            Err(ImportError::NotAnObject)
        ));
    }

    #[tokio::test]
    async fn reset_touches_only_the_named_entity() {
        let (_, mut registry) = registry().await;
        registry
            .settings_mut()
            .update(json!({"theme": "dark"}))
            .await
            .unwrap();
        registry
            .progress_view_mut()
            .update(json!({"viewMode": "charts"}))
            .await
            .unwrap();

        registry.reset(EntityKind::Page(Page::Settings)).await;
        assert_eq!(registry.settings().state(), &SettingsState::default());
        assert_eq!(
            registry.progress_view().state().view_mode,
            study_core::model::ViewMode::Charts
        );
    }
}
