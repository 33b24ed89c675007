use crate::model::{Answer, CorrectAnswer, Question, QuestionResult, QuestionType};

/// Minimum score (percent) for an exam to count as passed.
pub const PASS_MARK: u32 = 70;

/// What the learner handed in for one question.
#[derive(Debug, Clone, Copy, Default)]
pub struct Submission<'a> {
    pub answer: Option<&'a Answer>,
    pub code_output: Option<&'a str>,
}

/// Check a submission against the question's reference answer.
#[must_use]
pub fn is_correct(question: &Question, submission: Submission<'_>) -> bool {
    match question.kind {
        QuestionType::MultipleChoice => match (submission.answer, &question.correct) {
            (Some(Answer::Choice(chosen)), Some(CorrectAnswer::Index(correct))) => {
                chosen == correct
            }
            _ => false,
        },
        QuestionType::Coding => {
            let Some(expected) = question.expected_output.as_deref() else {
                return false;
            };
            submission.code_output.unwrap_or_default().trim() == expected.trim()
        }
        QuestionType::FillInBlank => {
            let Some(Answer::Text(given)) = submission.answer else {
                return false;
            };
            let given = normalize(given);
            !given.is_empty()
                && accepted_answers(question)
                    .into_iter()
                    .any(|accepted| normalize(accepted) == given)
        }
        QuestionType::Essay => {
            matches!(submission.answer, Some(Answer::Text(text)) if !text.trim().is_empty())
        }
    }
}

/// Human-readable reference answer for result screens.
#[must_use]
pub fn reference_answer(question: &Question, language: &str) -> String {
    match question.kind {
        QuestionType::MultipleChoice => match &question.correct {
            Some(CorrectAnswer::Index(index)) => question
                .options
                .get(*index)
                .map(|option| option.get(language).to_string())
                .unwrap_or_default(),
            _ => String::new(),
        },
        QuestionType::Coding => question.expected_output.clone().unwrap_or_default(),
        QuestionType::FillInBlank | QuestionType::Essay => accepted_answers(question)
            .first()
            .map(|s| (*s).to_string())
            .or_else(|| question.solution.clone())
            .unwrap_or_default(),
    }
}

/// Grade one question into a result row.
#[must_use]
pub fn grade(question: &Question, submission: Submission<'_>, language: &str) -> QuestionResult {
    let user_answer = if question.kind == QuestionType::Coding {
        Some(Answer::Text(
            submission.code_output.unwrap_or_default().to_string(),
        ))
    } else {
        submission.answer.cloned()
    };
    QuestionResult {
        question_id: question.id.clone(),
        question: question.question.clone(),
        user_answer,
        correct_answer: reference_answer(question, language),
        is_correct: is_correct(question, submission),
        explanation: question.explanation.clone(),
    }
}

/// `round(correct / total * 100)`, zero for an empty exam.
#[must_use]
pub fn score(correct: usize, total: usize) -> u32 {
    percent(correct, total)
}

#[must_use]
pub fn passed(score: u32) -> bool {
    score >= PASS_MARK
}

fn accepted_answers(question: &Question) -> Vec<&str> {
    let mut accepted: Vec<&str> = question.answer.as_deref().into_iter().collect();
    match &question.correct {
        Some(CorrectAnswer::Text(text)) => accepted.push(text),
        Some(CorrectAnswer::AnyOf(texts)) => accepted.extend(texts.iter().map(String::as_str)),
        Some(CorrectAnswer::Index(_)) | None => {}
    }
    accepted
}

/// Rounded percentage of `part` in `whole`, zero when `whole` is zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(value: serde_json::Value) -> Question {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn multiple_choice_compares_option_index() {
        let q = question(json!({
            "id": "q1", "type": "multiple-choice", "options": ["a", "b", "c"], "correct": 2
        }));
        let right = Answer::Choice(2);
        let wrong = Answer::Choice(0);
        assert!(is_correct(&q, Submission { answer: Some(&right), ..Default::default() }));
        assert!(!is_correct(&q, Submission { answer: Some(&wrong), ..Default::default() }));
        assert!(!is_correct(&q, Submission::default()));
        assert_eq!(reference_answer(&q, "en"), "c");
    }

    #[test]
    fn fill_in_blank_is_trimmed_and_case_insensitive() {
        let q = question(json!({
            "id": "q2", "type": "fill-in-blank", "correct": ["ndarray", "numpy.ndarray"]
        }));
        let given = Answer::Text("  NumPy.NDArray ".into());
        let empty = Answer::Text("   ".into());
        assert!(is_correct(&q, Submission { answer: Some(&given), ..Default::default() }));
        assert!(!is_correct(&q, Submission { answer: Some(&empty), ..Default::default() }));

        let q = question(json!({"id": "q3", "type": "fill-in-blank", "answer": "DataFrame"}));
        let given = Answer::Text("dataframe".into());
        assert!(is_correct(&q, Submission { answer: Some(&given), ..Default::default() }));
        assert_eq!(reference_answer(&q, "en"), "DataFrame");
    }

    #[test]
    fn coding_compares_trimmed_output() {
        let q = question(json!({
            "id": "q4", "type": "coding", "expected_output": "[1 2 3]\n"
        }));
        let ok = Submission { code_output: Some("[1 2 3]"), ..Default::default() };
        let bad = Submission { code_output: Some("[1, 2, 3]"), ..Default::default() };
        assert!(is_correct(&q, ok));
        assert!(!is_correct(&q, bad));

        let row = grade(&q, ok, "en");
        assert_eq!(row.user_answer, Some(Answer::Text("[1 2 3]".into())));
        assert!(row.is_correct);
    }

    #[test]
    fn essay_counts_any_non_blank_answer() {
        let q = question(json!({"id": "q5", "type": "essay"}));
        let text = Answer::Text("Broadcasting stretches arrays.".into());
        assert!(is_correct(&q, Submission { answer: Some(&text), ..Default::default() }));
        assert!(!is_correct(&q, Submission::default()));
    }

    #[test]
    fn score_rounds_and_pass_mark_is_inclusive() {
        assert_eq!(score(2, 3), 67);
        assert_eq!(score(7, 10), 70);
        assert_eq!(score(0, 0), 0);
        assert!(passed(70));
        assert!(!passed(69));
    }
}
