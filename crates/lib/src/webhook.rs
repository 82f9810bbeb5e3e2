//! Webhook sender: POST the payload as JSON with a bounded timeout.
//!
//! Delivery is at-most-once. Every outcome is logged and returned; nothing is retried or queued,
//! so a failed delivery drops the message and the relay keeps going.

use std::time::Duration;

use crate::payload::OutboundPayload;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_LOG_LIMIT: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid webhook url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("building http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 2xx response.
    Delivered { status: u16 },
    /// Any other HTTP status; body truncated for logging.
    Rejected { status: u16, body: String },
    /// No response within the timeout.
    Timeout,
    /// DNS, connect, or other transport failure.
    Transport(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// HTTP client bound to one webhook URL.
#[derive(Clone)]
pub struct WebhookSender {
    url: reqwest::Url,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, WebhookError> {
        let parsed = reqwest::Url::parse(url.trim()).map_err(|e| WebhookError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(WebhookError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: parsed,
            timeout,
            client,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// POST the payload. Never fails: errors are classified into the outcome and logged.
    pub async fn send(&self, payload: &OutboundPayload) -> DeliveryOutcome {
        let res = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await;
        let outcome = match res {
            Ok(res) => {
                let status = res.status();
                if status.is_success() {
                    DeliveryOutcome::Delivered {
                        status: status.as_u16(),
                    }
                } else {
                    let body = res.text().await.unwrap_or_default();
                    DeliveryOutcome::Rejected {
                        status: status.as_u16(),
                        body: truncate(&body, BODY_LOG_LIMIT),
                    }
                }
            }
            Err(e) if e.is_timeout() => DeliveryOutcome::Timeout,
            Err(e) => DeliveryOutcome::Transport(e.to_string()),
        };
        self.log_outcome(payload.chat_id, &outcome);
        outcome
    }

    fn log_outcome(&self, chat_id: i64, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered { status } => {
                log::info!("sent message from chat {} to webhook: HTTP {}", chat_id, status);
            }
            DeliveryOutcome::Rejected { status, body } => {
                log::error!("webhook error: HTTP {} - {}", status, body);
            }
            DeliveryOutcome::Timeout => {
                log::error!(
                    "webhook timeout: no response within {}s, message from chat {} dropped",
                    self.timeout.as_secs(),
                    chat_id
                );
            }
            DeliveryOutcome::Transport(e) => {
                log::error!("webhook connection error, message from chat {} dropped: {}", chat_id, e);
            }
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => s[..cut].to_string(),
        None => s.to_string(),
    }
}
