use study_core::Clock;
use study_core::model::LearningProgress;

use crate::registry::StateRegistry;
use crate::store::PersistOutcome;

/// Updates to the learning-progress record.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProgressService {
    clock: Clock,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Mark a lesson topic as completed or not.
    pub async fn update_chapter_progress(
        &self,
        registry: &mut StateRegistry,
        chapter: &str,
        topic: &str,
        completed: bool,
    ) -> PersistOutcome {
        let now = self.clock.now();
        registry
            .learning_progress_mut()
            .modify(|progress| progress.update_chapter_progress(chapter, topic, completed, now))
            .await
    }

    /// Count one answered practice question.
    pub async fn record_practice(
        &self,
        registry: &mut StateRegistry,
        correct: bool,
        time_spent_secs: u64,
    ) -> PersistOutcome {
        registry
            .learning_progress_mut()
            .modify(|progress| progress.record_practice(correct, time_spent_secs))
            .await
    }

    pub async fn reset_all(&self, registry: &mut StateRegistry) -> PersistOutcome {
        registry
            .learning_progress_mut()
            .modify(LearningProgress::reset_all)
            .await
    }
}

/// Headline numbers shown on the progress page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    pub questions_answered: u32,
    pub accuracy: Option<u32>,
    pub streak: u32,
    pub exams_taken: usize,
    pub exams_passed: usize,
    pub average_exam_score: Option<u32>,
}

impl ProgressSummary {
    #[must_use]
    pub fn of(progress: &LearningProgress) -> Self {
        Self {
            questions_answered: progress.practice_stats.total_questions,
            accuracy: progress.accuracy(),
            streak: progress.practice_stats.streak,
            exams_taken: progress.exam_history.len(),
            exams_passed: progress.exam_history.iter().filter(|r| r.passed).count(),
            average_exam_score: progress.average_exam_score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storage::repository::{InMemoryRepository, KeyValueRepository};
    use study_core::model::EntityKind;
    use study_core::time::{fixed_clock, fixed_now};

    #[tokio::test]
    async fn updates_are_written_through() {
        let mem = InMemoryRepository::new();
        let mut registry = StateRegistry::open(Arc::new(mem.clone()), fixed_clock(), None)
            .await
            .unwrap();
        let service = ProgressService::new(fixed_clock());

        service
            .update_chapter_progress(&mut registry, "numpy", "arrays", true)
            .await;
        service.record_practice(&mut registry, true, 12).await;
        service.record_practice(&mut registry, false, 8).await;

        let progress = registry.learning_progress().state();
        assert_eq!(
            progress.chapters["numpy"]["arrays"].completed_at,
            Some(fixed_now())
        );
        let summary = ProgressSummary::of(progress);
        assert_eq!(summary.questions_answered, 2);
        assert_eq!(summary.accuracy, Some(50));
        assert_eq!(summary.streak, 0);
        assert_eq!(summary.exams_taken, 0);

        let raw = mem
            .get(&EntityKind::LearningProgress.storage_key(None))
            .await
            .unwrap()
            .unwrap();
        assert!(raw.contains("\"totalQuestions\":2"));

        service.reset_all(&mut registry).await;
        assert_eq!(
            registry.learning_progress().state(),
            &LearningProgress::default()
        );
    }
}
