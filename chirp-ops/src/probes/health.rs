use reqwest::Client;
use serde_json::Value;

use chirp_types::HealthReport;

use super::{ProbeError, ProbeResult};

#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub report: HealthReport,
    /// Whether the deployment can see the required secret
    pub secret_visible: bool,
}

/// Name of the health-body flag reporting whether `secret` is configured.
///
/// `NEWS_API_KEY` maps to `newsApiKeyConfigured`.
pub fn configured_flag(secret: &str) -> String {
    let mut flag = String::with_capacity(secret.len() + 10);
    for (i, word) in secret
        .split(|c: char| c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let word = word.to_lowercase();
        if i == 0 {
            flag.push_str(&word);
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                flag.extend(first.to_uppercase());
                flag.push_str(chars.as_str());
            }
        }
    }
    flag.push_str("Configured");
    flag
}

/// Fetch the deployed app's health endpoint and look up the flag for `secret`
pub async fn check_health(client: &Client, url: &str, secret: &str) -> ProbeResult<HealthCheck> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProbeError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await?;
    let body: Value = serde_json::from_str(&text)
        .map_err(|e| ProbeError::InvalidResponse(format!("{}: {}", e, text)))?;
    let secret_visible = body[configured_flag(secret).as_str()]
        .as_bool()
        .unwrap_or(false);
    let report: HealthReport = serde_json::from_value(body)
        .map_err(|e| ProbeError::InvalidResponse(format!("{}: {}", e, text)))?;

    Ok(HealthCheck {
        report,
        secret_visible,
    })
}

/// Steps for exposing a missing secret to the deployment
pub fn setup_instructions(secret: &str) -> Vec<String> {
    vec![
        format!("1. Obtain a value for {} from the provider dashboard.", secret),
        format!(
            "2. Add {} to the hosting project's environment or secret manager.",
            secret
        ),
        "3. Grant the serving runtime access to the secret.".to_string(),
        "4. Redeploy so the new environment is picked up.".to_string(),
        "5. Run check-health again to confirm.".to_string(),
    ]
}
