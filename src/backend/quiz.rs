use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{GameError, Result};

/// A quiz document as served by the authoring backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub points: u32,
    pub time_limit_secs: u64,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl Question {
    /// Index of the first option flagged correct, if any
    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(|option| option.is_correct)
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

/// Read-only quiz lookup, called once when a game starts
#[async_trait]
pub trait QuizSource: Send + Sync {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>>;
}

/// Fetches quizzes from the authoring backend over HTTP
pub struct HttpQuizSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpQuizSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GameError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn quiz_url(&self, quiz_id: &str) -> String {
        format!("{}/quizzes/{}", self.base_url, urlencoding::encode(quiz_id))
    }
}

#[async_trait]
impl QuizSource for HttpQuizSource {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        let url = self.quiz_url(quiz_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(quiz_id = %quiz_id, "Quiz lookup returned 404");
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GameError::Internal(format!(
                "Quiz lookup failed with status {}: {}",
                status, error_text
            )));
        }

        let quiz: Quiz = response.json().await?;
        tracing::info!(
            quiz_id = %quiz_id,
            question_count = quiz.questions.len(),
            "Fetched quiz from backend"
        );
        Ok(Some(quiz))
    }
}

/// In-memory quiz catalogue
#[derive(Default)]
pub struct StaticQuizSource {
    quizzes: RwLock<HashMap<String, Quiz>>,
}

impl StaticQuizSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quizzes(quizzes: impl IntoIterator<Item = Quiz>) -> Self {
        let quizzes = quizzes
            .into_iter()
            .map(|quiz| (quiz.id.clone(), quiz))
            .collect();
        Self {
            quizzes: RwLock::new(quizzes),
        }
    }

    /// Loads a JSON array of quizzes
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            GameError::InvalidConfiguration(format!(
                "Failed to read quiz file {}: {}",
                path.display(),
                e
            ))
        })?;
        let quizzes: Vec<Quiz> = serde_json::from_str(&raw)?;
        tracing::info!(path = %path.display(), quiz_count = quizzes.len(), "Loaded quiz file");
        Ok(Self::with_quizzes(quizzes))
    }

    pub async fn insert(&self, quiz: Quiz) {
        self.quizzes.write().await.insert(quiz.id.clone(), quiz);
    }
}

#[async_trait]
impl QuizSource for StaticQuizSource {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        Ok(self.quizzes.read().await.get(quiz_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quiz() -> Quiz {
        Quiz {
            id: "quiz-1".to_string(),
            title: "Capitals".to_string(),
            questions: vec![Question {
                text: "Capital of France?".to_string(),
                image_url: None,
                points: 10,
                time_limit_secs: 30,
                options: vec![
                    AnswerOption { text: "Lyon".to_string(), is_correct: false },
                    AnswerOption { text: "Paris".to_string(), is_correct: true },
                ],
            }],
        }
    }

    #[test]
    fn test_correct_index() {
        let quiz = sample_quiz();
        assert_eq!(quiz.questions[0].correct_index(), Some(1));

        let mut no_answer = quiz.questions[0].clone();
        no_answer.options.iter_mut().for_each(|o| o.is_correct = false);
        assert_eq!(no_answer.correct_index(), None);
    }

    #[test]
    fn test_quiz_deserialize_defaults() {
        let json = r#"{
            "id": "q",
            "questions": [{
                "text": "2 + 2?",
                "points": 5,
                "time_limit_secs": 20,
                "options": [{"text": "4", "is_correct": true}, {"text": "5"}]
            }]
        }"#;

        let quiz: Quiz = serde_json::from_str(json).unwrap();
        assert_eq!(quiz.title, "");
        assert_eq!(quiz.questions[0].image_url, None);
        assert!(!quiz.questions[0].options[1].is_correct);
        assert_eq!(quiz.questions[0].time_limit(), Duration::from_secs(20));
    }

    #[test]
    fn test_quiz_url_encodes_id() {
        let source = HttpQuizSource::new("http://backend:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(source.quiz_url("a b/c"), "http://backend:3000/quizzes/a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_static_source_lookup() {
        let source = StaticQuizSource::with_quizzes(vec![sample_quiz()]);
        assert!(source.fetch_quiz("quiz-1").await.unwrap().is_some());
        assert!(source.fetch_quiz("missing").await.unwrap().is_none());

        let mut other = sample_quiz();
        other.id = "quiz-2".to_string();
        source.insert(other).await;
        assert!(source.fetch_quiz("quiz-2").await.unwrap().is_some());
    }
}
