use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::question::{ANY, Answer, LocalizedText, QuestionType};

/// Seconds left at or below which the timer is shown as urgent.
pub const DANGER_THRESHOLD_SECS: u32 = 300;
/// Seconds left at or below which the timer is shown as a warning.
pub const WARNING_THRESHOLD_SECS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamPhase {
    #[default]
    Setup,
    Taking,
    Completed,
}

/// Parameters chosen on the exam setup screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamConfig {
    pub chapter: String,
    pub difficulty: String,
    pub number_of_questions: u32,
    /// Minutes.
    pub time_limit: u32,
}

impl ExamConfig {
    #[must_use]
    pub fn new(number_of_questions: u32, time_limit: u32) -> Self {
        Self {
            chapter: ANY.to_string(),
            difficulty: ANY.to_string(),
            number_of_questions,
            time_limit,
        }
    }

    /// Defaults used by the per-type exam screens.
    #[must_use]
    pub fn for_question_type(question_type: QuestionType) -> Self {
        match question_type {
            QuestionType::MultipleChoice => Self::new(10, 15),
            QuestionType::FillInBlank => Self::new(5, 10),
            QuestionType::Coding => Self::new(3, 20),
            QuestionType::Essay => Self::new(2, 25),
        }
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit.saturating_mul(60)
    }
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self::new(20, 30)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerUrgency {
    Normal,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    Running { remaining: u32 },
    Expired,
}

/// Once-per-second exam countdown.
///
/// The host drives it by calling `tick` every second while an exam is being
/// taken; the tick that reaches zero reports `Expired` and the exam should be
/// completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamTimer {
    remaining: u32,
}

impl ExamTimer {
    #[must_use]
    pub fn start(config: &ExamConfig) -> Self {
        Self {
            remaining: config.time_limit_secs(),
        }
    }

    /// Resume from a persisted `timeRemaining`.
    #[must_use]
    pub fn resume(remaining: u32) -> Self {
        Self { remaining }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    pub fn tick(&mut self) -> TimerTick {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            TimerTick::Expired
        } else {
            TimerTick::Running {
                remaining: self.remaining,
            }
        }
    }

    #[must_use]
    pub fn urgency(&self) -> TimerUrgency {
        if self.remaining <= DANGER_THRESHOLD_SECS {
            TimerUrgency::Danger
        } else if self.remaining <= WARNING_THRESHOLD_SECS {
            TimerUrgency::Warning
        } else {
            TimerUrgency::Normal
        }
    }

    /// `m:ss` rendering of the remaining time.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}:{:02}", self.remaining / 60, self.remaining % 60)
    }
}

/// Per-question outcome stored with an exam result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    #[serde(default)]
    pub question: LocalizedText,
    #[serde(default)]
    pub user_answer: Option<Answer>,
    #[serde(default)]
    pub correct_answer: String,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<LocalizedText>,
}

/// A completed exam as kept in learning-progress history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub id: Uuid,
    pub chapter: String,
    pub difficulty: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub score: u32,
    pub passed: bool,
    /// Seconds.
    pub time_spent: u32,
    #[serde(default)]
    pub results: Vec<QuestionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_type_defaults() {
        let cfg = ExamConfig::for_question_type(QuestionType::Coding);
        assert_eq!((cfg.number_of_questions, cfg.time_limit), (3, 20));
        let cfg = ExamConfig::default();
        assert_eq!((cfg.number_of_questions, cfg.time_limit), (20, 30));
        assert_eq!(cfg.chapter, "all");
    }

    #[test]
    fn timer_counts_down_to_expiry() {
        let mut timer = ExamTimer::resume(3);
        assert_eq!(timer.tick(), TimerTick::Running { remaining: 2 });
        assert_eq!(timer.tick(), TimerTick::Running { remaining: 1 });
        assert_eq!(timer.tick(), TimerTick::Expired);
        assert!(timer.is_expired());
        assert_eq!(timer.tick(), TimerTick::Expired);
    }

    #[test]
    fn timer_starts_from_config_minutes() {
        let timer = ExamTimer::start(&ExamConfig::new(5, 10));
        assert_eq!(timer.remaining(), 600);
        assert_eq!(timer.display(), "10:00");
    }

    #[test]
    fn urgency_thresholds() {
        assert_eq!(ExamTimer::resume(601).urgency(), TimerUrgency::Normal);
        assert_eq!(ExamTimer::resume(600).urgency(), TimerUrgency::Warning);
        assert_eq!(ExamTimer::resume(301).urgency(), TimerUrgency::Warning);
        assert_eq!(ExamTimer::resume(300).urgency(), TimerUrgency::Danger);
        assert_eq!(ExamTimer::resume(65).display(), "1:05");
    }
}
