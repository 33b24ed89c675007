use std::fmt;
use std::str::FromStr;

use crate::key::{Namespace, StorageKey, derive_namespaced_key};
use crate::model::question::QuestionType;

/// Application pages that keep their own state slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Page {
    Practice,
    Exam,
    Lessons,
    Progress,
    Settings,
    UserProfile,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::Practice,
        Page::Exam,
        Page::Lessons,
        Page::Progress,
        Page::Settings,
        Page::UserProfile,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Page::Practice => "practice",
            Page::Exam => "exam",
            Page::Lessons => "lessons",
            Page::Progress => "progress",
            Page::Settings => "settings",
            Page::UserProfile => "userProfile",
        }
    }
}

/// Whether a question-type slice backs free practice or a timed exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StudyMode {
    Practice,
    Exam,
}

impl StudyMode {
    pub const ALL: [StudyMode; 2] = [StudyMode::Practice, StudyMode::Exam];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StudyMode::Practice => "practice",
            StudyMode::Exam => "exam",
        }
    }
}

/// Every named slice of persisted state the application knows about.
///
/// The set is closed; each kind has exactly one record type and default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Page(Page),
    Question(QuestionType, StudyMode),
    LearningProgress,
}

impl EntityKind {
    /// All kinds, pages first, in export order.
    #[must_use]
    pub fn all() -> Vec<EntityKind> {
        let pages = Page::ALL.into_iter().map(EntityKind::Page);
        let questions = QuestionType::ALL.into_iter().flat_map(|ty| {
            StudyMode::ALL
                .into_iter()
                .map(move |mode| EntityKind::Question(ty, mode))
        });
        pages
            .chain(questions)
            .chain(std::iter::once(EntityKind::LearningProgress))
            .collect()
    }

    #[must_use]
    pub fn namespace(self) -> Namespace {
        match self {
            EntityKind::Page(_) => Namespace::AppState,
            EntityKind::Question(..) => Namespace::QuestionState,
            EntityKind::LearningProgress => Namespace::LearningProgress,
        }
    }

    /// Entity segment of the storage key, if any.
    #[must_use]
    pub fn entity_name(self) -> Option<&'static str> {
        match self {
            EntityKind::Page(page) => Some(page.as_str()),
            EntityKind::Question(ty, _) => Some(ty.as_str()),
            EntityKind::LearningProgress => None,
        }
    }

    /// Mode segment of the storage key, if any.
    #[must_use]
    pub fn mode(self) -> Option<&'static str> {
        match self {
            EntityKind::Question(_, mode) => Some(mode.as_str()),
            EntityKind::Page(_) | EntityKind::LearningProgress => None,
        }
    }

    /// Storage key for this kind under `identity_name` (`None` = guest).
    #[must_use]
    pub fn storage_key(self, identity_name: Option<&str>) -> StorageKey {
        derive_namespaced_key(
            self.namespace(),
            self.entity_name(),
            self.mode(),
            identity_name,
        )
    }

    /// Field name used for this kind in bulk export documents.
    #[must_use]
    pub fn export_name(self) -> &'static str {
        use QuestionType::{Coding, Essay, FillInBlank, MultipleChoice};
        use StudyMode::{Exam, Practice};

        match self {
            EntityKind::Page(page) => page.as_str(),
            EntityKind::Question(MultipleChoice, Practice) => "multiple-choice-practice",
            EntityKind::Question(MultipleChoice, Exam) => "multiple-choice-exam",
            EntityKind::Question(FillInBlank, Practice) => "fill-in-blank-practice",
            EntityKind::Question(FillInBlank, Exam) => "fill-in-blank-exam",
            EntityKind::Question(Coding, Practice) => "coding-practice",
            EntityKind::Question(Coding, Exam) => "coding-exam",
            EntityKind::Question(Essay, Practice) => "essay-practice",
            EntityKind::Question(Essay, Exam) => "essay-exam",
            EntityKind::LearningProgress => "learningProgress",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.export_name())
    }
}

/// Error type for parsing an entity kind from its export name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEntityKindError(String);

impl fmt::Display for ParseEntityKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity: {}", self.0)
    }
}

impl std::error::Error for ParseEntityKindError {}

impl FromStr for EntityKind {
    type Err = ParseEntityKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::all()
            .into_iter()
            .find(|kind| kind.export_name() == s)
            .ok_or_else(|| ParseEntityKindError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_kinds_are_listed_once() {
        let all = EntityKind::all();
        assert_eq!(all.len(), 15);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn keys_are_distinct_per_identity() {
        for identity in [None, Some("alice")] {
            let keys: HashSet<_> = EntityKind::all()
                .into_iter()
                .map(|kind| kind.storage_key(identity))
                .collect();
            assert_eq!(keys.len(), 15);
        }
    }

    #[test]
    fn keys_follow_namespace_layout() {
        assert_eq!(
            EntityKind::Page(Page::UserProfile)
                .storage_key(Some("alice"))
                .as_str(),
            "app-state-userProfile-alice"
        );
        assert_eq!(
            EntityKind::Question(QuestionType::FillInBlank, StudyMode::Practice)
                .storage_key(None)
                .as_str(),
            "question-state-fill-in-blank-practice-guest"
        );
        assert_eq!(
            EntityKind::LearningProgress
                .storage_key(Some("bob"))
                .as_str(),
            "learning-progress-bob"
        );
    }

    #[test]
    fn export_names_round_trip_through_from_str() {
        for kind in EntityKind::all() {
            assert_eq!(kind.export_name().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("timestamp".parse::<EntityKind>().is_err());
    }
}
