pub mod payload;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::FeedbackSettings;
use payload::create_submission;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub name: String,
    pub rating: u8,
    pub comment: String,
}

/// Posts user feedback to a form-collection endpoint.
pub struct FeedbackClient {
    client: Client,
    settings: FeedbackSettings,
}

impl FeedbackClient {
    pub fn new(client: Client, settings: FeedbackSettings) -> Self {
        Self { client, settings }
    }

    /// `Ok(true)` when the endpoint accepted the submission (201 Created).
    pub async fn submit(&self, feedback: &Feedback) -> Result<bool> {
        if !(MIN_RATING..=MAX_RATING).contains(&feedback.rating) {
            return Err(anyhow!(
                "Rating must be between {} and {}, got {}",
                MIN_RATING,
                MAX_RATING,
                feedback.rating
            ));
        }
        if self.settings.endpoint.is_empty() {
            return Err(anyhow!("No feedback endpoint configured"));
        }

        let instance_id = Uuid::new_v4().to_string();
        let payload = create_submission(&self.settings, &instance_id, feedback);

        let response = self
            .client
            .post(&self.settings.endpoint)
            .header("Authorization", format!("Token {}", self.settings.token))
            .json(&payload)
            .send()
            .await
            .context("Failed to send feedback")?;

        if response.status() == StatusCode::CREATED {
            info!("Feedback submitted");
            Ok(true)
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = status.as_u16(), body = %error_text, "Feedback endpoint rejected submission");
            Ok(false)
        }
    }
}
