use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::grading::percent;
use crate::model::exam::ExamRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicProgress {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeStats {
    pub total_questions: u32,
    pub correct_answers: u32,
    /// Seconds.
    pub total_time: u64,
    /// Consecutive correct answers up to the latest one.
    pub streak: u32,
}

/// Long-lived per-user learning record: lesson topics, practice totals and
/// exam history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningProgress {
    pub chapters: BTreeMap<String, BTreeMap<String, TopicProgress>>,
    pub practice_stats: PracticeStats,
    pub exam_history: Vec<ExamRecord>,
}

impl LearningProgress {
    pub fn update_chapter_progress(
        &mut self,
        chapter: &str,
        topic: &str,
        completed: bool,
        now: DateTime<Utc>,
    ) {
        let entry = self
            .chapters
            .entry(chapter.to_string())
            .or_default()
            .entry(topic.to_string())
            .or_default();
        entry.completed = completed;
        entry.completed_at = completed.then_some(now);
    }

    #[must_use]
    pub fn is_topic_completed(&self, chapter: &str, topic: &str) -> bool {
        self.chapters
            .get(chapter)
            .and_then(|topics| topics.get(topic))
            .is_some_and(|topic| topic.completed)
    }

    /// Percentage of `total_topics` completed in `chapter`, rounded.
    #[must_use]
    pub fn chapter_completion(&self, chapter: &str, total_topics: usize) -> u32 {
        if total_topics == 0 {
            return 0;
        }
        let done = self
            .chapters
            .get(chapter)
            .map_or(0, |topics| topics.values().filter(|t| t.completed).count());
        percent(done, total_topics)
    }

    pub fn record_practice(&mut self, correct: bool, time_spent_secs: u64) {
        let stats = &mut self.practice_stats;
        stats.total_questions = stats.total_questions.saturating_add(1);
        stats.total_time = stats.total_time.saturating_add(time_spent_secs);
        if correct {
            stats.correct_answers = stats.correct_answers.saturating_add(1);
            stats.streak = stats.streak.saturating_add(1);
        } else {
            stats.streak = 0;
        }
    }

    pub fn add_exam_result(&mut self, mut record: ExamRecord, now: DateTime<Utc>) {
        record.completed_at = Some(now);
        self.exam_history.push(record);
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    /// Practice accuracy in percent, `None` before the first answer.
    #[must_use]
    pub fn accuracy(&self) -> Option<u32> {
        let stats = &self.practice_stats;
        (stats.total_questions > 0).then(|| {
            percent(
                stats.correct_answers as usize,
                stats.total_questions as usize,
            )
        })
    }

    #[must_use]
    pub fn average_exam_score(&self) -> Option<u32> {
        if self.exam_history.is_empty() {
            return None;
        }
        let total: u64 = self.exam_history.iter().map(|r| u64::from(r.score)).sum();
        let count = self.exam_history.len() as u64;
        u32::try_from((total + count / 2) / count).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use uuid::Uuid;

    fn exam(score: u32) -> ExamRecord {
        ExamRecord {
            id: Uuid::new_v4(),
            chapter: "all".into(),
            difficulty: "all".into(),
            total_questions: 10,
            correct_answers: score / 10,
            score,
            passed: score >= 70,
            time_spent: 120,
            results: Vec::new(),
            completed_at: None,
        }
    }

    #[test]
    fn chapter_progress_sets_and_clears_completion_time() {
        let mut progress = LearningProgress::default();
        progress.update_chapter_progress("numpy", "arrays", true, fixed_now());
        assert!(progress.is_topic_completed("numpy", "arrays"));
        assert_eq!(
            progress.chapters["numpy"]["arrays"].completed_at,
            Some(fixed_now())
        );

        progress.update_chapter_progress("numpy", "arrays", false, fixed_now());
        assert!(!progress.is_topic_completed("numpy", "arrays"));
        assert_eq!(progress.chapters["numpy"]["arrays"].completed_at, None);
    }

    #[test]
    fn chapter_completion_rounds_percentage() {
        let mut progress = LearningProgress::default();
        progress.update_chapter_progress("pandas", "a", true, fixed_now());
        progress.update_chapter_progress("pandas", "b", false, fixed_now());
        assert_eq!(progress.chapter_completion("pandas", 3), 33);
        assert_eq!(progress.chapter_completion("pandas", 0), 0);
        assert_eq!(progress.chapter_completion("missing", 4), 0);
    }

    #[test]
    fn practice_stats_accumulate() {
        let mut progress = LearningProgress::default();
        assert_eq!(progress.accuracy(), None);
        progress.record_practice(true, 30);
        progress.record_practice(true, 10);
        progress.record_practice(false, 20);
        progress.record_practice(true, 5);

        let stats = &progress.practice_stats;
        assert_eq!(stats.total_questions, 4);
        assert_eq!(stats.correct_answers, 3);
        assert_eq!(stats.total_time, 65);
        assert_eq!(stats.streak, 1);
        assert_eq!(progress.accuracy(), Some(75));
    }

    #[test]
    fn exam_history_appends_with_completion_time() {
        let mut progress = LearningProgress::default();
        progress.add_exam_result(exam(80), fixed_now());
        progress.add_exam_result(exam(65), fixed_now());
        assert_eq!(progress.exam_history.len(), 2);
        assert_eq!(progress.exam_history[0].completed_at, Some(fixed_now()));
        assert_eq!(progress.average_exam_score(), Some(73));

        progress.reset_all();
        assert_eq!(progress, LearningProgress::default());
    }

    #[test]
    fn serializes_camel_case_shape() {
        let value = serde_json::to_value(LearningProgress::default()).unwrap();
        assert_eq!(value["practiceStats"]["totalQuestions"], 0);
        assert_eq!(value["examHistory"], serde_json::json!([]));
        assert_eq!(value["chapters"], serde_json::json!({}));
    }
}
