//! Collaborators outside the live game engine
//!
//! The authoring backend owns quizzes and finished-game records. The engine
//! only reads a quiz once when a game starts and writes a result once when
//! it ends.
//!
//! - `quiz`: quiz lookup over HTTP or from an in-memory catalogue
//! - `results`: result sinks (HTTP or log-only)
//! - `queue`: non-blocking result submission

mod queue;
mod quiz;
mod results;

pub use queue::ResultQueue;
pub use quiz::{AnswerOption, HttpQuizSource, Question, Quiz, QuizSource, StaticQuizSource};
pub use results::{GameResult, HttpResultSink, LogResultSink, ResultSink, Standing};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::Result;

/// Builds the quiz source and result sink described by the configuration
///
/// A quiz file takes precedence over the quiz API so a server can run
/// stand-alone. Without a results URL, results are only logged.
pub async fn init_from_config(
    config: &BackendConfig,
) -> Result<(Arc<dyn QuizSource>, Arc<dyn ResultSink>)> {
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let quizzes: Arc<dyn QuizSource> = match (&config.quiz_file, &config.quiz_api_url) {
        (Some(path), _) => Arc::new(StaticQuizSource::from_file(Path::new(path)).await?),
        (None, Some(url)) => {
            tracing::info!(url = %url, "Using quiz API");
            Arc::new(HttpQuizSource::new(url.clone(), timeout)?)
        }
        (None, None) => {
            tracing::warn!("Neither QUIZ_FILE nor QUIZ_API_URL set, no quizzes available");
            Arc::new(StaticQuizSource::new())
        }
    };

    let results: Arc<dyn ResultSink> = match &config.results_api_url {
        Some(url) => {
            tracing::info!(url = %url, "Recording results to backend");
            Arc::new(HttpResultSink::new(url, timeout)?)
        }
        None => {
            tracing::info!("RESULTS_API_URL not set, results will only be logged");
            Arc::new(LogResultSink)
        }
    };

    Ok((quizzes, results))
}
