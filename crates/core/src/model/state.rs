use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::model::entity::{EntityKind, Page, StudyMode};
use crate::model::exam::{ExamConfig, ExamPhase};
use crate::model::progress::LearningProgress;
use crate::model::question::{ANY, Answer, Question, QuestionType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MergeError {
    #[error("partial update must be a JSON object")]
    NotAnObject,
    #[error("partial update does not fit the state record: {0}")]
    Schema(String),
}

/// A state record that can back a store for one or more entity kinds.
pub trait EntityRecord:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Whether this record type is the one used for `kind`.
    fn supports(kind: EntityKind) -> bool;

    /// The documented default for `kind`.
    fn default_for(kind: EntityKind) -> Self;

    /// Length of the `questions` collection for collection-shaped records.
    fn question_count(&self) -> Option<usize> {
        None
    }
}

/// Shallow merge of `partial` into `current`; later keys win.
///
/// # Errors
///
/// Returns `MergeError::NotAnObject` unless both sides are JSON objects, and
/// `MergeError::Schema` if the merged object no longer fits `S`.
pub fn merge_partial<S>(current: &S, partial: Value) -> Result<S, MergeError>
where
    S: Serialize + DeserializeOwned,
{
    let Value::Object(updates) = partial else {
        return Err(MergeError::NotAnObject);
    };
    let mut base = match serde_json::to_value(current) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(MergeError::NotAnObject),
        Err(err) => return Err(MergeError::Schema(err.to_string())),
    };
    merge_into(&mut base, updates);
    serde_json::from_value(Value::Object(base)).map_err(|err| MergeError::Schema(err.to_string()))
}

fn merge_into(base: &mut Map<String, Value>, updates: Map<String, Value>) {
    for (key, value) in updates {
        base.insert(key, value);
    }
}

//
// ─── PAGE RECORDS ──────────────────────────────────────────────────────────────
//

/// State of the mixed practice page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct PracticeState {
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    pub selected_answer: Option<Answer>,
    pub user_answer: String,
    pub show_result: bool,
    pub is_correct: bool,
    /// Milliseconds since epoch.
    pub start_time: Option<i64>,
    pub selected_chapter: String,
    pub selected_difficulty: String,
    pub selected_question_type: String,
    pub available_question_types: Vec<QuestionType>,
    pub answers: BTreeMap<String, Answer>,
    pub code_outputs: BTreeMap<String, String>,
    pub has_answered_correctly: bool,
    pub show_reference_answer: bool,
    pub show_hint: bool,
    pub show_plot: bool,
}

impl Default for PracticeState {
    fn default() -> Self {
        Self {
            questions: Vec::new(),
            current_question_index: 0,
            selected_answer: None,
            user_answer: String::new(),
            show_result: false,
            is_correct: false,
            start_time: None,
            selected_chapter: ANY.to_string(),
            selected_difficulty: ANY.to_string(),
            selected_question_type: ANY.to_string(),
            available_question_types: Vec::new(),
            answers: BTreeMap::new(),
            code_outputs: BTreeMap::new(),
            has_answered_correctly: false,
            show_reference_answer: false,
            show_hint: false,
            show_plot: false,
        }
    }
}

impl EntityRecord for PracticeState {
    fn supports(kind: EntityKind) -> bool {
        kind == EntityKind::Page(Page::Practice)
    }

    fn default_for(_kind: EntityKind) -> Self {
        Self::default()
    }

    fn question_count(&self) -> Option<usize> {
        Some(self.questions.len())
    }
}

/// State of the mock exam page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamState {
    pub exam_state: ExamPhase,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    pub answers: BTreeMap<String, Answer>,
    pub code_outputs: BTreeMap<String, String>,
    /// Seconds.
    pub time_remaining: u32,
    pub exam_config: ExamConfig,
    pub is_loading: bool,
}

impl Default for ExamState {
    fn default() -> Self {
        Self {
            exam_state: ExamPhase::Setup,
            questions: Vec::new(),
            current_question_index: 0,
            answers: BTreeMap::new(),
            code_outputs: BTreeMap::new(),
            time_remaining: 0,
            exam_config: ExamConfig::default(),
            is_loading: false,
        }
    }
}

impl EntityRecord for ExamState {
    fn supports(kind: EntityKind) -> bool {
        kind == EntityKind::Page(Page::Exam)
    }

    fn default_for(_kind: EntityKind) -> Self {
        Self::default()
    }

    fn question_count(&self) -> Option<usize> {
        Some(self.questions.len())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonsState {
    pub selected_chapter: Option<String>,
    pub completed_topics: Vec<String>,
    pub current_topic: Option<String>,
    pub lesson_progress: BTreeMap<String, Value>,
}

impl EntityRecord for LessonsState {
    fn supports(kind: EntityKind) -> bool {
        kind == EntityKind::Page(Page::Lessons)
    }

    fn default_for(_kind: EntityKind) -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Overview,
    Detailed,
    Charts,
}

/// Filters chosen on the progress page (not the progress data itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressViewState {
    pub selected_time_range: String,
    pub selected_chapter: String,
    pub selected_difficulty: String,
    pub view_mode: ViewMode,
}

impl Default for ProgressViewState {
    fn default() -> Self {
        Self {
            selected_time_range: ANY.to_string(),
            selected_chapter: ANY.to_string(),
            selected_difficulty: ANY.to_string(),
            view_mode: ViewMode::Overview,
        }
    }
}

impl EntityRecord for ProgressViewState {
    fn supports(kind: EntityKind) -> bool {
        kind == EntityKind::Page(Page::Progress)
    }

    fn default_for(_kind: EntityKind) -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SettingsState {
    pub theme: Theme,
    pub font_size: FontSize,
    pub auto_save: bool,
    pub notifications: bool,
    pub sound_effects: bool,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_size: FontSize::Medium,
            auto_save: true,
            notifications: true,
            sound_effects: true,
        }
    }
}

impl EntityRecord for SettingsState {
    fn supports(kind: EntityKind) -> bool {
        kind == EntityKind::Page(Page::Settings)
    }

    fn default_for(_kind: EntityKind) -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileTab {
    #[default]
    Profile,
    Achievements,
    Statistics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfileState {
    pub editing_profile: bool,
    pub selected_tab: ProfileTab,
    pub show_change_password: bool,
}

impl EntityRecord for UserProfileState {
    fn supports(kind: EntityKind) -> bool {
        kind == EntityKind::Page(Page::UserProfile)
    }

    fn default_for(_kind: EntityKind) -> Self {
        Self::default()
    }
}

//
// ─── QUESTION-TYPE RECORDS ─────────────────────────────────────────────────────
//

/// Responses keyed by question id.
///
/// Only the maps relevant to a question type are ever filled: multiple choice
/// uses `selected_answers`, fill-in-blank and essay use `user_answers`, coding
/// uses `user_code`, `code_outputs` and `execution_errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Responses {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selected_answers: BTreeMap<String, Answer>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub user_answers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub user_code: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub code_outputs: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub execution_errors: BTreeMap<String, String>,
    pub is_executing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct QuestionPracticeState {
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    #[serde(flatten)]
    pub responses: Responses,
    pub show_result: bool,
    pub is_correct: bool,
    pub start_time: Option<i64>,
    pub selected_chapter: String,
    pub selected_difficulty: String,
    pub answers: BTreeMap<String, Answer>,
    pub has_answered_correctly: bool,
    pub show_reference_answer: bool,
    pub show_hint: bool,
    pub show_plot: bool,
}

impl Default for QuestionPracticeState {
    fn default() -> Self {
        Self {
            questions: Vec::new(),
            current_question_index: 0,
            responses: Responses::default(),
            show_result: false,
            is_correct: false,
            start_time: None,
            selected_chapter: ANY.to_string(),
            selected_difficulty: ANY.to_string(),
            answers: BTreeMap::new(),
            has_answered_correctly: false,
            show_reference_answer: false,
            show_hint: false,
            show_plot: false,
        }
    }
}

impl EntityRecord for QuestionPracticeState {
    fn supports(kind: EntityKind) -> bool {
        matches!(kind, EntityKind::Question(_, StudyMode::Practice))
    }

    fn default_for(_kind: EntityKind) -> Self {
        Self::default()
    }

    fn question_count(&self) -> Option<usize> {
        Some(self.questions.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionExamState {
    pub exam_state: ExamPhase,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    #[serde(flatten)]
    pub responses: Responses,
    pub time_remaining: u32,
    pub exam_config: ExamConfig,
    pub is_loading: bool,
}

impl QuestionExamState {
    #[must_use]
    pub fn for_question_type(question_type: QuestionType) -> Self {
        Self {
            exam_state: ExamPhase::Setup,
            questions: Vec::new(),
            current_question_index: 0,
            responses: Responses::default(),
            time_remaining: 0,
            exam_config: ExamConfig::for_question_type(question_type),
            is_loading: false,
        }
    }
}

impl Default for QuestionExamState {
    fn default() -> Self {
        Self::for_question_type(QuestionType::MultipleChoice)
    }
}

impl EntityRecord for QuestionExamState {
    fn supports(kind: EntityKind) -> bool {
        matches!(kind, EntityKind::Question(_, StudyMode::Exam))
    }

    fn default_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Question(question_type, _) => Self::for_question_type(question_type),
            _ => Self::default(),
        }
    }

    fn question_count(&self) -> Option<usize> {
        Some(self.questions.len())
    }
}

impl EntityRecord for LearningProgress {
    fn supports(kind: EntityKind) -> bool {
        kind == EntityKind::LearningProgress
    }

    fn default_for(_kind: EntityKind) -> Self {
        Self::default()
    }
}
