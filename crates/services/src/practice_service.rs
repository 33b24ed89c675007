use study_core::Clock;
use study_core::grading::{self, Submission};
use study_core::model::{Answer, PracticeState, QuestionFilter};

use crate::error::QuestionBankError;
use crate::progress_service::ProgressService;
use crate::question_bank::{QuestionBank, available_types};
use crate::registry::StateRegistry;

/// Outcome of answering the current practice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PracticeAnswer {
    pub correct: bool,
    pub time_spent_secs: u64,
}

/// Drives the mixed practice page.
#[derive(Clone)]
pub struct PracticeService {
    bank: QuestionBank,
    progress: ProgressService,
    clock: Clock,
}

impl PracticeService {
    #[must_use]
    pub fn new(bank: QuestionBank, clock: Clock) -> Self {
        Self {
            bank,
            progress: ProgressService::new(clock),
            clock,
        }
    }

    /// Load questions for the selection and store them with the selection.
    ///
    /// Returns the number of questions loaded.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Question` for an unknown difficulty or type.
    pub async fn start(
        &self,
        registry: &mut StateRegistry,
        chapter: &str,
        difficulty: &str,
        question_type: &str,
    ) -> Result<usize, QuestionBankError> {
        let filter = QuestionFilter::from_selection(chapter, difficulty, question_type)?;
        let questions = self.bank.load_filtered(&filter).await;
        let count = questions.len();
        let start_time = self.clock.now_millis();

        registry
            .practice_mut()
            .modify(|state| {
                *state = PracticeState {
                    available_question_types: available_types(&questions),
                    questions,
                    selected_chapter: chapter.to_string(),
                    selected_difficulty: difficulty.to_string(),
                    selected_question_type: question_type.to_string(),
                    start_time: Some(start_time),
                    ..PracticeState::default()
                };
            })
            .await;
        tracing::info!(chapter, difficulty, question_type, count, "practice started");
        Ok(count)
    }

    /// Grade an answer to the current question and count it in the practice
    /// statistics. Returns `None` when there is no current question.
    pub async fn answer(
        &self,
        registry: &mut StateRegistry,
        answer: Option<Answer>,
        code_output: Option<String>,
    ) -> Option<PracticeAnswer> {
        let now = self.clock.now_millis();
        let state = registry.practice().state();
        let question = state.questions.get(state.current_question_index)?;
        let correct = grading::is_correct(
            question,
            Submission {
                answer: answer.as_ref(),
                code_output: code_output.as_deref(),
            },
        );
        let elapsed_ms = state.start_time.map_or(0, |start| now.saturating_sub(start));
        let time_spent_secs = u64::try_from(elapsed_ms / 1000).unwrap_or(0);
        let question_id = question.id.clone();

        registry
            .practice_mut()
            .modify(|state| {
                if let Some(answer) = answer {
                    state.answers.insert(question_id.clone(), answer);
                }
                if let Some(output) = code_output {
                    state.code_outputs.insert(question_id, output);
                }
                state.show_result = true;
                state.is_correct = correct;
                state.has_answered_correctly |= correct;
            })
            .await;
        self.progress
            .record_practice(registry, correct, time_spent_secs)
            .await;

        Some(PracticeAnswer {
            correct,
            time_spent_secs,
        })
    }

    /// Move by `step` questions, clamped to the loaded range.
    pub async fn navigate(&self, registry: &mut StateRegistry, step: isize) {
        let now = self.clock.now_millis();
        registry
            .practice_mut()
            .modify(|state| {
                let last = state.questions.len().saturating_sub(1);
                let target = state
                    .current_question_index
                    .saturating_add_signed(step)
                    .min(last);
                if target != state.current_question_index {
                    state.current_question_index = target;
                    state.selected_answer = None;
                    state.user_answer.clear();
                    state.show_result = false;
                    state.is_correct = false;
                    state.has_answered_correctly = false;
                    state.show_reference_answer = false;
                    state.show_hint = false;
                    state.start_time = Some(now);
                }
            })
            .await;
    }
}
