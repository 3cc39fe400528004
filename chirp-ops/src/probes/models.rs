use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::fmt;

use super::{ProbeError, ProbeResult};

/// Prompt sent to each candidate; any generated text counts as success
const PROBE_PROMPT: &str = "Reply with the single word: pong";

/// An API version and model name pair to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidate {
    pub version: String,
    pub model: String,
}

impl ModelCandidate {
    pub fn new(version: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            model: model.into(),
        }
    }

    /// Parse a `version/model` pair
    pub fn parse(s: &str) -> Option<Self> {
        let (version, model) = s.trim().split_once('/')?;
        if version.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self::new(version, model))
    }

    fn endpoint(&self, base_url: &str) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            self.version,
            self.model
        )
    }
}

impl fmt::Display for ModelCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.version, self.model)
    }
}

/// One candidate that was tried and did not work
#[derive(Debug, Clone)]
pub struct Attempt {
    pub candidate: ModelCandidate,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    /// Failed candidates in the order they were tried
    pub failures: Vec<Attempt>,
    /// First working candidate and the first line of its reply, when it sent text
    pub working: Option<(ModelCandidate, Option<String>)>,
}

/// Try each candidate in order and stop at the first that generates content.
///
/// Authentication failures abort immediately since no other candidate can
/// succeed with the same key.
pub async fn probe_models(
    client: &Client,
    base_url: &str,
    api_key: &str,
    candidates: &[ModelCandidate],
) -> ProbeResult<ProbeOutcome> {
    let mut outcome = ProbeOutcome::default();
    let body = json!({ "contents": [{ "parts": [{ "text": PROBE_PROMPT }] }] });

    for candidate in candidates {
        tracing::info!("Trying {}", candidate);

        let response = match client
            .post(candidate.endpoint(base_url))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("{} unreachable: {}", candidate, e);
                outcome.failures.push(Attempt {
                    candidate: candidate.clone(),
                    status: None,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let status = response.status();
        // Any success status means the pair is usable, even if the reply was
        // blocked or carried no text
        if status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let text = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|reply| generated_text(&reply));
            if text.is_none() {
                tracing::warn!("{} answered without generated text", candidate);
            }
            outcome.working = Some((candidate.clone(), text));
            break;
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);

        if is_auth_failure(status, &body) {
            return Err(ProbeError::Auth {
                status: status.as_u16(),
                message,
            });
        }

        tracing::warn!("{} failed with {}: {}", candidate, status, message);
        outcome.failures.push(Attempt {
            candidate: candidate.clone(),
            status: Some(status.as_u16()),
            message,
        });
    }

    Ok(outcome)
}

fn is_auth_failure(status: StatusCode, body: &str) -> bool {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => true,
        StatusCode::BAD_REQUEST => body.contains("API_KEY_INVALID") || body.contains("API key not valid"),
        _ => false,
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// First line of the first candidate's generated text
fn generated_text(reply: &Value) -> Option<String> {
    let text = reply["candidates"][0]["content"]["parts"][0]["text"].as_str()?;
    Some(text.lines().next().unwrap_or_default().trim().to_string())
}
