mod entity;
mod exam;
mod identity;
mod progress;
mod question;
mod state;

pub use entity::{EntityKind, Page, ParseEntityKindError, StudyMode};
pub use exam::{
    DANGER_THRESHOLD_SECS, ExamConfig, ExamPhase, ExamRecord, ExamTimer, QuestionResult,
    TimerTick, TimerUrgency, WARNING_THRESHOLD_SECS,
};
pub use identity::{CURRENT_USER_KEY, Identity, IdentityError, identity_name};
pub use progress::{LearningProgress, PracticeStats, TopicProgress};
pub use question::{
    ANY, Answer, COURSE_CHAPTERS, ChapterDocument, CorrectAnswer, Difficulty, LocalizedText,
    Question, QuestionError, QuestionFilter, QuestionType,
};
pub use state::{
    EntityRecord, ExamState, FontSize, LessonsState, MergeError, PracticeState, ProfileTab,
    ProgressViewState, QuestionExamState, QuestionPracticeState, Responses, SettingsState, Theme,
    UserProfileState, ViewMode, merge_partial,
};
