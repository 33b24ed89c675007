use rand::Rng;
use rand::seq::SliceRandom;
use study_core::Clock;
use study_core::grading::{self, Submission};
use study_core::model::{
    ANY, Answer, ExamConfig, ExamPhase, ExamRecord, ExamState, ExamTimer, Question,
    QuestionFilter, QuestionType, TimerTick,
};
use uuid::Uuid;

use crate::error::{ExamError, QuestionBankError};
use crate::question_bank::QuestionBank;
use crate::registry::StateRegistry;
use crate::store::PersistOutcome;

/// Question types drawn into the mixed mock exam.
pub const EXAM_QUESTION_TYPES: [QuestionType; 2] =
    [QuestionType::MultipleChoice, QuestionType::Coding];

/// Language used for reference answers stored with results.
const RESULT_LANGUAGE: &str = "en";

/// Drives the mock exam page: assembly, answering, the countdown and grading.
#[derive(Clone)]
pub struct ExamService {
    bank: QuestionBank,
    clock: Clock,
}

impl ExamService {
    #[must_use]
    pub fn new(bank: QuestionBank, clock: Clock) -> Self {
        Self { bank, clock }
    }

    /// Draw questions for `config`: filter, shuffle, keep the first N.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Questions` for an unknown difficulty and
    /// `ExamError::NoQuestions` when nothing matches.
    pub async fn assemble<R: Rng + ?Sized>(
        &self,
        config: &ExamConfig,
        rng: &mut R,
    ) -> Result<Vec<Question>, ExamError> {
        let mut filter = QuestionFilter::from_selection(&config.chapter, &config.difficulty, ANY)
            .map_err(QuestionBankError::from)?;
        filter.types = EXAM_QUESTION_TYPES.to_vec();

        let mut questions = self.bank.load_filtered(&filter).await;
        if questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        questions.shuffle(rng);
        questions.truncate(usize::try_from(config.number_of_questions).unwrap_or(usize::MAX));
        Ok(questions)
    }

    /// Assemble an exam and put the exam page into the `taking` phase.
    ///
    /// # Errors
    ///
    /// See [`ExamService::assemble`].
    pub async fn start<R: Rng + ?Sized>(
        &self,
        registry: &mut StateRegistry,
        config: ExamConfig,
        rng: &mut R,
    ) -> Result<PersistOutcome, ExamError> {
        let questions = self.assemble(&config, rng).await?;
        tracing::info!(
            chapter = %config.chapter,
            count = questions.len(),
            "starting exam"
        );
        let time_remaining = config.time_limit_secs();
        Ok(registry
            .exam_mut()
            .modify(|state| {
                state.exam_state = ExamPhase::Taking;
                state.questions = questions;
                state.current_question_index = 0;
                state.answers.clear();
                state.code_outputs.clear();
                state.time_remaining = time_remaining;
                state.exam_config = config;
                state.is_loading = false;
            })
            .await)
    }

    fn ensure_taking(registry: &StateRegistry) -> Result<(), ExamError> {
        if registry.exam().state().exam_state == ExamPhase::Taking {
            Ok(())
        } else {
            Err(ExamError::NotTaking)
        }
    }

    /// # Errors
    ///
    /// Returns `ExamError::NotTaking` outside the `taking` phase.
    pub async fn record_answer(
        &self,
        registry: &mut StateRegistry,
        question_id: &str,
        answer: Answer,
    ) -> Result<PersistOutcome, ExamError> {
        Self::ensure_taking(registry)?;
        Ok(registry
            .exam_mut()
            .modify(|state| {
                state.answers.insert(question_id.to_string(), answer);
            })
            .await)
    }

    /// # Errors
    ///
    /// Returns `ExamError::NotTaking` outside the `taking` phase.
    pub async fn record_code_output(
        &self,
        registry: &mut StateRegistry,
        question_id: &str,
        output: &str,
    ) -> Result<PersistOutcome, ExamError> {
        Self::ensure_taking(registry)?;
        Ok(registry
            .exam_mut()
            .modify(|state| {
                state
                    .code_outputs
                    .insert(question_id.to_string(), output.to_string());
            })
            .await)
    }

    /// Advance the countdown by one second; completes the exam on expiry.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotTaking` outside the `taking` phase.
    pub async fn tick(&self, registry: &mut StateRegistry) -> Result<TimerTick, ExamError> {
        Self::ensure_taking(registry)?;
        let mut timer = ExamTimer::resume(registry.exam().state().time_remaining);
        let tick = timer.tick();
        registry
            .exam_mut()
            .modify(|state| state.time_remaining = timer.remaining())
            .await;
        if tick == TimerTick::Expired {
            tracing::info!("exam time expired");
            self.complete(registry).await?;
        }
        Ok(tick)
    }

    /// Grade the exam, append it to the learning history and clear the
    /// persisted exam so a reload starts from setup.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotTaking` outside the `taking` phase.
    pub async fn complete(&self, registry: &mut StateRegistry) -> Result<ExamRecord, ExamError> {
        Self::ensure_taking(registry)?;
        let record = grade_exam(registry.exam().state());

        let now = self.clock.now();
        let history_entry = record.clone();
        registry
            .learning_progress_mut()
            .modify(|progress| progress.add_exam_result(history_entry, now))
            .await;

        let exam = registry.exam_mut();
        exam.reset().await;
        exam.modify(|state| state.exam_state = ExamPhase::Completed).await;

        tracing::info!(score = record.score, passed = record.passed, "exam completed");
        Ok(record)
    }
}

fn grade_exam(state: &ExamState) -> ExamRecord {
    let results: Vec<_> = state
        .questions
        .iter()
        .map(|question| {
            let submission = Submission {
                answer: state.answers.get(&question.id),
                code_output: state.code_outputs.get(&question.id).map(String::as_str),
            };
            grading::grade(question, submission, RESULT_LANGUAGE)
        })
        .collect();
    let correct = results.iter().filter(|r| r.is_correct).count();
    let total = results.len();
    let score = grading::score(correct, total);
    ExamRecord {
        id: Uuid::new_v4(),
        chapter: state.exam_config.chapter.clone(),
        difficulty: state.exam_config.difficulty.clone(),
        total_questions: u32::try_from(total).unwrap_or(u32::MAX),
        correct_answers: u32::try_from(correct).unwrap_or(u32::MAX),
        score,
        passed: grading::passed(score),
        time_spent: state
            .exam_config
            .time_limit_secs()
            .saturating_sub(state.time_remaining),
        results,
        completed_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;
    use storage::repository::InMemoryRepository;
    use study_core::time::{fixed_clock, fixed_now};

    use crate::question_bank::DirectorySource;

    const NUMPY: &str = r#"[
        {"id": "mc-1", "type": "multiple-choice", "options": ["a", "b"], "correct": 1, "difficulty": "easy"},
        {"id": "mc-2", "type": "multiple-choice", "options": ["a", "b"], "correct": 0, "difficulty": "easy"},
        {"id": "code-1", "type": "coding", "expected_output": "6", "difficulty": "easy"},
        {"id": "essay-1", "type": "essay", "difficulty": "easy"}
    ]"#;

    async fn setup() -> (tempfile::TempDir, ExamService, StateRegistry) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("numpy.json"), NUMPY).unwrap();
        let bank = QuestionBank::new(Arc::new(DirectorySource::new(dir.path())));
        let registry = StateRegistry::open(
            Arc::new(InMemoryRepository::new()),
            fixed_clock(),
            None,
        )
        .await
        .unwrap();
        (dir, ExamService::new(bank, fixed_clock()), registry)
    }

    fn config(count: u32, minutes: u32) -> ExamConfig {
        ExamConfig {
            chapter: "numpy".into(),
            ..ExamConfig::new(count, minutes)
        }
    }

    #[tokio::test]
    async fn assemble_excludes_other_types_and_caps_count() {
        let (_dir, service, _) = setup().await;
        let mut rng = StdRng::seed_from_u64(7);
        let questions = service.assemble(&config(10, 5), &mut rng).await.unwrap();
        assert_eq!(questions.len(), 3);
        assert!(questions.iter().all(|q| q.kind != QuestionType::Essay));

        let questions = service.assemble(&config(2, 5), &mut rng).await.unwrap();
        assert_eq!(questions.len(), 2);
    }

    #[tokio::test]
    async fn assemble_reports_empty_selection() {
        let (_dir, service, _) = setup().await;
        let mut cfg = config(5, 5);
        cfg.difficulty = "hard".into();
        let err = service
            .assemble(&cfg, &mut StdRng::seed_from_u64(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::NoQuestions));
    }

    #[tokio::test]
    async fn full_exam_is_graded_and_recorded() {
        let (_dir, service, mut registry) = setup().await;
        let mut rng = StdRng::seed_from_u64(3);
        service.start(&mut registry, config(10, 5), &mut rng).await.unwrap();
        assert_eq!(registry.exam().state().exam_state, ExamPhase::Taking);
        assert_eq!(registry.exam().state().time_remaining, 300);

        service
            .record_answer(&mut registry, "mc-1", Answer::Choice(1))
            .await
            .unwrap();
        service
            .record_answer(&mut registry, "mc-2", Answer::Choice(1))
            .await
            .unwrap();
        service
            .record_code_output(&mut registry, "code-1", "6\n")
            .await
            .unwrap();
        for _ in 0..60 {
            service.tick(&mut registry).await.unwrap();
        }

        let record = service.complete(&mut registry).await.unwrap();
        assert_eq!(record.total_questions, 3);
        assert_eq!(record.correct_answers, 2);
        assert_eq!(record.score, 67);
        assert!(!record.passed);
        assert_eq!(record.time_spent, 60);

        let history = &registry.learning_progress().state().exam_history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].completed_at, Some(fixed_now()));

        let exam = registry.exam().state();
        assert_eq!(exam.exam_state, ExamPhase::Completed);
        assert!(exam.questions.is_empty());

        // A reload starts from setup.
        registry.on_identity_changed(None).await;
        assert_eq!(registry.exam().state(), &ExamState::default());
    }

    #[tokio::test]
    async fn expiry_completes_the_exam() {
        let (_dir, service, mut registry) = setup().await;
        let mut rng = StdRng::seed_from_u64(9);
        service.start(&mut registry, config(1, 1), &mut rng).await.unwrap();
        registry
            .exam_mut()
            .modify(|state| state.time_remaining = 2)
            .await;

        assert_eq!(
            service.tick(&mut registry).await.unwrap(),
            TimerTick::Running { remaining: 1 }
        );
        assert_eq!(service.tick(&mut registry).await.unwrap(), TimerTick::Expired);
        assert_eq!(registry.learning_progress().state().exam_history.len(), 1);
        assert!(matches!(
            service.tick(&mut registry).await,
            Err(ExamError::NotTaking)
        ));
    }
}
