use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::game::JoinCode;

/// Final placement of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub user_id: String,
    pub display_name: String,
    pub score: u32,
    pub rank: usize,
}

/// Final scores of a finished game, recorded once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub join_code: JoinCode,
    pub quiz_id: String,
    pub host_id: String,
    pub standings: Vec<Standing>,
}

/// Durable destination for finished games
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, result: &GameResult) -> Result<()>;
}

/// Posts results to the backend's results endpoint
pub struct HttpResultSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpResultSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GameError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}/games/results", base_url.trim_end_matches('/')),
            client,
        })
    }
}

#[async_trait]
impl ResultSink for HttpResultSink {
    async fn record(&self, result: &GameResult) -> Result<()> {
        let response = self.client.post(&self.endpoint).json(result).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GameError::Internal(format!(
                "Result upload failed with status {}: {}",
                status, error_text
            )));
        }

        tracing::info!(
            join_code = result.join_code,
            quiz_id = %result.quiz_id,
            players = result.standings.len(),
            "Recorded game result"
        );
        Ok(())
    }
}

/// Used when no results endpoint is configured
pub struct LogResultSink;

#[async_trait]
impl ResultSink for LogResultSink {
    async fn record(&self, result: &GameResult) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        tracing::info!(join_code = result.join_code, result = %payload, "Game finished");
        Ok(())
    }
}
