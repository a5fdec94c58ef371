use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::config::WebhookSection;
use crate::job::JobReport;

/// Delivers the terminal job report to a configured callback. Delivery
/// is best-effort: a reachable endpoint is never retried whatever status
/// it answers, and exhausted retries are logged, not raised.
pub struct WebhookNotifier {
    client: Client,
    endpoint: Url,
    attempts: u32,
    attempt_timeout: Duration,
    retry_pause: Duration,
}

impl WebhookNotifier {
    pub fn new(endpoint: Url, attempts: u32, attempt_timeout: Duration, retry_pause: Duration) -> Option<Self> {
        let client = match Client::builder().user_agent("vodpack/0.1").build() {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "could not build webhook client");
                return None;
            }
        };
        Some(Self {
            client,
            endpoint,
            attempts: attempts.max(1),
            attempt_timeout,
            retry_pause,
        })
    }

    pub fn from_config(section: &WebhookSection) -> Option<Self> {
        let raw = section.url.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let endpoint = match Url::parse(raw) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                warn!(url = raw, error = %err, "ignoring invalid webhook url");
                return None;
            }
        };
        Self::new(
            endpoint,
            section.attempts,
            Duration::from_secs(section.timeout_seconds),
            Duration::from_secs(section.retry_pause_seconds),
        )
    }

    /// Returns true when the endpoint received the report, regardless of
    /// the status it answered with.
    pub async fn deliver(&self, report: &JobReport) -> bool {
        for attempt in 1..=self.attempts {
            let result = self
                .client
                .post(self.endpoint.clone())
                .timeout(self.attempt_timeout)
                .json(report)
                .send()
                .await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        info!(job_id = %report.job_id, %status, "webhook delivered");
                    } else {
                        warn!(job_id = %report.job_id, %status, "webhook answered an error status");
                    }
                    return true;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "webhook attempt failed");
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_pause).await;
                    }
                }
            }
        }
        warn!(
            job_id = %report.job_id,
            attempts = self.attempts,
            "webhook delivery abandoned"
        );
        false
    }
}
