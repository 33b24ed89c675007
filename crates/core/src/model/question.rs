use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chapters shipped with the course content, in display order.
pub const COURSE_CHAPTERS: [&str; 6] = [
    "python-basics",
    "numpy",
    "pandas",
    "matplotlib",
    "ai-intro",
    "midterm-exam",
];

/// Filter value meaning "do not filter on this dimension".
pub const ANY: &str = "all";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("unknown question type: {0}")]
    UnknownType(String),
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    FillInBlank,
    Coding,
    Essay,
}

impl QuestionType {
    pub const ALL: [QuestionType; 4] = [
        QuestionType::MultipleChoice,
        QuestionType::FillInBlank,
        QuestionType::Coding,
        QuestionType::Essay,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::FillInBlank => "fill-in-blank",
            QuestionType::Coding => "coding",
            QuestionType::Essay => "essay",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| QuestionError::UnknownType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuestionError::UnknownDifficulty(other.to_string())),
        }
    }
}

/// Text that is either plain or keyed by language code (`zh`, `en`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedText {
    /// Resolve for `language`, falling back to English, then Chinese.
    #[must_use]
    pub fn get(&self, language: &str) -> &str {
        match self {
            LocalizedText::Plain(text) => text,
            LocalizedText::Localized(map) => map
                .get(language)
                .or_else(|| map.get("en"))
                .or_else(|| map.get("zh"))
                .map_or("", String::as_str),
        }
    }
}

impl Default for LocalizedText {
    fn default() -> Self {
        LocalizedText::Plain(String::new())
    }
}

/// The `correct` field of a question record.
///
/// Multiple choice questions store the option index; fill-in-blank questions
/// store one or several accepted strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Index(usize),
    Text(String),
    AnyOf(Vec<String>),
}

/// A learner's answer as held in page state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(usize),
    Text(String),
}

/// One question record from a chapter document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub question: LocalizedText,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<CorrectAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<LocalizedText>,
    /// Chapter the question was loaded from; filled in by the loader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
}

/// The body of one chapter document: `{"questions": [...]}` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChapterDocument {
    Wrapped { questions: Vec<Question> },
    Bare(Vec<Question>),
}

impl ChapterDocument {
    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        match self {
            ChapterDocument::Wrapped { questions } | ChapterDocument::Bare(questions) => questions,
        }
    }
}

/// Chapter / difficulty / type filter where `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub chapter: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub types: Vec<QuestionType>,
}

impl QuestionFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter from the string selections held in page state.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if a non-`all` value is not a known difficulty or type.
    pub fn from_selection(
        chapter: &str,
        difficulty: &str,
        question_type: &str,
    ) -> Result<Self, QuestionError> {
        Ok(Self {
            chapter: non_wildcard(chapter).map(str::to_string),
            difficulty: non_wildcard(difficulty).map(str::parse).transpose()?,
            types: non_wildcard(question_type)
                .map(str::parse)
                .transpose()?
                .into_iter()
                .collect(),
        })
    }

    #[must_use]
    pub fn matches(&self, question: &Question) -> bool {
        if let Some(chapter) = self.chapter.as_deref() {
            if question.chapter.as_deref() != Some(chapter) {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if question.difficulty != Some(difficulty) {
                return false;
            }
        }
        self.types.is_empty() || self.types.contains(&question.kind)
    }
}

fn non_wildcard(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && value != ANY).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(json: serde_json::Value) -> Question {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn parses_multiple_choice_record() {
        let q = question(serde_json::json!({
            "id": "np-1",
            "type": "multiple-choice",
            "question": {"zh": "数组?", "en": "Array?"},
            "options": ["a", "b"],
            "correct": 1,
            "difficulty": "easy",
            "explanation": "because"
        }));
        assert_eq!(q.kind, QuestionType::MultipleChoice);
        assert_eq!(q.correct, Some(CorrectAnswer::Index(1)));
        assert_eq!(q.question.get("zh"), "数组?");
        assert_eq!(q.question.get("fr"), "Array?");
        assert_eq!(q.difficulty, Some(Difficulty::Easy));
    }

    #[test]
    fn chapter_document_accepts_both_shapes() {
        let wrapped: ChapterDocument = serde_json::from_str(
            r#"{"questions":[{"id":"a","type":"essay"}]}"#,
        )
        .unwrap();
        let bare: ChapterDocument =
            serde_json::from_str(r#"[{"id":"b","type":"coding"}]"#).unwrap();
        assert_eq!(wrapped.into_questions()[0].id, "a");
        assert_eq!(bare.into_questions()[0].kind, QuestionType::Coding);
    }

    #[test]
    fn filter_from_selection_treats_all_as_wildcard() {
        let filter = QuestionFilter::from_selection("all", "all", "all").unwrap();
        assert_eq!(filter, QuestionFilter::all());

        let filter = QuestionFilter::from_selection("numpy", "hard", "coding").unwrap();
        assert_eq!(filter.chapter.as_deref(), Some("numpy"));
        assert_eq!(filter.difficulty, Some(Difficulty::Hard));
        assert_eq!(filter.types, vec![QuestionType::Coding]);
    }

    #[test]
    fn filter_rejects_unknown_type() {
        let err = QuestionFilter::from_selection("all", "all", "true-false").unwrap_err();
        assert_eq!(err, QuestionError::UnknownType("true-false".into()));
    }

    #[test]
    fn filter_matches_on_every_dimension() {
        let mut q = question(serde_json::json!({
            "id": "p-1", "type": "fill-in-blank", "difficulty": "medium"
        }));
        q.chapter = Some("pandas".into());

        let filter = QuestionFilter::from_selection("pandas", "medium", "fill-in-blank").unwrap();
        assert!(filter.matches(&q));

        let filter = QuestionFilter::from_selection("numpy", "all", "all").unwrap();
        assert!(!filter.matches(&q));

        let filter = QuestionFilter::from_selection("all", "easy", "all").unwrap();
        assert!(!filter.matches(&q));
    }
}
