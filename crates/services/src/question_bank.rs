use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use study_core::model::{COURSE_CHAPTERS, ChapterDocument, Question, QuestionFilter, QuestionType};
use url::Url;

use crate::error::QuestionBankError;

/// Where chapter documents come from.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch and parse the document for `chapter`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if the document is missing, unreachable or malformed.
    async fn fetch_chapter(&self, chapter: &str) -> Result<Vec<Question>, QuestionBankError>;
}

fn document_name(chapter: &str) -> Result<String, QuestionBankError> {
    let valid = !chapter.is_empty()
        && chapter
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(QuestionBankError::InvalidSource(format!(
            "bad chapter name {chapter:?}"
        )));
    }
    Ok(format!("{chapter}.json"))
}

fn parse_document(text: &str) -> Result<Vec<Question>, QuestionBankError> {
    let document: ChapterDocument = serde_json::from_str(text)?;
    Ok(document.into_questions())
}

/// Reads `{root}/{chapter}.json`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl QuestionSource for DirectorySource {
    async fn fetch_chapter(&self, chapter: &str) -> Result<Vec<Question>, QuestionBankError> {
        let path = self.root.join(document_name(chapter)?);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(QuestionBankError::ChapterNotFound {
                    chapter: chapter.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        parse_document(&text)
    }
}

/// Fetches `{base}/{chapter}.json`.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    /// # Errors
    ///
    /// Returns `QuestionBankError::InvalidSource` unless `base` is an http(s) URL.
    pub fn new(base: &str) -> Result<Self, QuestionBankError> {
        let mut base = Url::parse(base)
            .map_err(|err| QuestionBankError::InvalidSource(format!("{base}: {err}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(QuestionBankError::InvalidSource(format!(
                "unsupported scheme {}",
                base.scheme()
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    /// URL of the document for `chapter`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::InvalidSource` for chapter names that are not plain slugs.
    pub fn chapter_url(&self, chapter: &str) -> Result<Url, QuestionBankError> {
        self.base
            .join(&document_name(chapter)?)
            .map_err(|err| QuestionBankError::InvalidSource(err.to_string()))
    }
}

#[async_trait]
impl QuestionSource for HttpSource {
    async fn fetch_chapter(&self, chapter: &str) -> Result<Vec<Question>, QuestionBankError> {
        let url = self.chapter_url(chapter)?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(QuestionBankError::ChapterNotFound {
                chapter: chapter.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(QuestionBankError::HttpStatus(response.status()));
        }
        let text = response.text().await?;
        parse_document(&text)
    }
}

/// Pick a source from a location string: http(s) URLs are fetched, anything
/// else is a directory.
///
/// # Errors
///
/// Returns `QuestionBankError::InvalidSource` for malformed URLs.
pub fn source_from_location(location: &str) -> Result<Arc<dyn QuestionSource>, QuestionBankError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Arc::new(HttpSource::new(location)?))
    } else {
        Ok(Arc::new(DirectorySource::new(location)))
    }
}

/// Question content for the course, loaded per chapter.
#[derive(Clone)]
pub struct QuestionBank {
    source: Arc<dyn QuestionSource>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self { source }
    }

    /// Questions of one chapter, tagged with the chapter name.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` from the source.
    pub async fn load_chapter(&self, chapter: &str) -> Result<Vec<Question>, QuestionBankError> {
        let mut questions = self.source.fetch_chapter(chapter).await?;
        for question in &mut questions {
            question.chapter = Some(chapter.to_string());
        }
        Ok(questions)
    }

    /// Questions of several chapters. Chapters that fail to load are logged and skipped.
    pub async fn load_chapters(&self, chapters: &[&str]) -> Vec<Question> {
        let mut all = Vec::new();
        for chapter in chapters {
            match self.load_chapter(chapter).await {
                Ok(questions) => all.extend(questions),
                Err(err) => {
                    tracing::warn!(chapter, error = %err, "skipping chapter");
                }
            }
        }
        all
    }

    /// Questions matching `filter`, drawn from its chapter or the whole course.
    pub async fn load_filtered(&self, filter: &QuestionFilter) -> Vec<Question> {
        let chapters: Vec<&str> = match filter.chapter.as_deref() {
            Some(chapter) => vec![chapter],
            None => COURSE_CHAPTERS.to_vec(),
        };
        let mut questions = self.load_chapters(&chapters).await;
        questions.retain(|question| filter.matches(question));
        tracing::debug!(count = questions.len(), "loaded filtered questions");
        questions
    }
}

/// Distinct question types present in `questions`, in canonical order.
#[must_use]
pub fn available_types(questions: &[Question]) -> Vec<QuestionType> {
    QuestionType::ALL
        .into_iter()
        .filter(|ty| questions.iter().any(|q| q.kind == *ty))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::Difficulty;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) {
        std::fs::write(dir.path().join(name), body).unwrap();
    }

    fn bank(dir: &tempfile::TempDir) -> QuestionBank {
        QuestionBank::new(Arc::new(DirectorySource::new(dir.path())))
    }

    #[tokio::test]
    async fn reads_wrapped_and_bare_documents() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir,
            "numpy.json",
            r#"{"questions": [{"id": "np-1", "type": "coding", "difficulty": "easy"}]}"#,
        );
        write(
            &dir,
            "pandas.json",
            r#"[{"id": "pd-1", "type": "essay"}, {"id": "pd-2", "type": "multiple-choice"}]"#,
        );

        let bank = bank(&dir);
        let numpy = bank.load_chapter("numpy").await.unwrap();
        assert_eq!(numpy[0].chapter.as_deref(), Some("numpy"));
        let pandas = bank.load_chapter("pandas").await.unwrap();
        assert_eq!(pandas.len(), 2);
        assert_eq!(
            available_types(&pandas),
            vec![QuestionType::MultipleChoice, QuestionType::Essay]
        );
    }

    #[tokio::test]
    async fn missing_and_broken_chapters_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "numpy.json", r#"[{"id": "np-1", "type": "essay"}]"#);
        write(&dir, "pandas.json", "{broken");

        let bank = bank(&dir);
        assert!(matches!(
            bank.load_chapter("matplotlib").await,
            Err(QuestionBankError::ChapterNotFound { .. })
        ));
        assert!(matches!(
            bank.load_chapter("pandas").await,
            Err(QuestionBankError::Parse(_))
        ));

        let all = bank.load_chapters(&["numpy", "pandas", "matplotlib"]).await;
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn filtered_load_applies_difficulty_and_type() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir,
            "numpy.json",
            r#"[
                {"id": "a", "type": "coding", "difficulty": "easy"},
                {"id": "b", "type": "coding", "difficulty": "hard"},
                {"id": "c", "type": "essay", "difficulty": "easy"}
            ]"#,
        );
        let filter = QuestionFilter::from_selection("numpy", "easy", "coding").unwrap();
        let questions = bank(&dir).load_filtered(&filter).await;
        let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(questions[0].difficulty, Some(Difficulty::Easy));
    }

    #[tokio::test]
    async fn chapter_names_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            bank(&dir).load_chapter("../secrets").await,
            Err(QuestionBankError::InvalidSource(_))
        ));
    }

    #[test]
    fn http_source_builds_chapter_urls() {
        let source = HttpSource::new("https://example.com/data/questions").unwrap();
        assert_eq!(
            source.chapter_url("numpy").unwrap().as_str(),
            "https://example.com/data/questions/numpy.json"
        );
        assert!(HttpSource::new("ftp://example.com").is_err());
        assert!(HttpSource::new("not a url").is_err());
    }
}
