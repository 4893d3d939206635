use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use config::shared::BatchConfig;
use gcp_bigquery_client::yup_oauth2::authenticator::DefaultAuthenticator;
use gcp_bigquery_client::yup_oauth2::{ServiceAccountAuthenticator, parse_service_account_key};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{ErrorKind, SignalsError, SignalsResult};
use crate::retries::{MAX_RETRY_ATTEMPTS, calculate_backoff};
use crate::signals_error;
use crate::source::SignalSource;
use crate::types::ReceivedSignal;

/// Base endpoint of the Pub/Sub REST API.
const PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com/v1";

/// OAuth2 scope required for pulling and acknowledging messages.
const PUBSUB_SCOPE: &str = "https://www.googleapis.com/auth/pubsub";

/// Derives the default subscription name for a topic.
///
/// `projects/{p}/topics/{t}` maps to `projects/{p}/subscriptions/{t}`, the
/// convention used when no explicit subscription is configured.
pub fn subscription_for_topic(topic: &str) -> String {
    topic.replacen("/topics/", "/subscriptions/", 1)
}

#[derive(Debug, Serialize)]
struct PullRequest {
    #[serde(rename = "maxMessages")]
    max_messages: usize,
}

#[derive(Debug, Default, Deserialize)]
struct PullResponse {
    #[serde(rename = "receivedMessages", default)]
    received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
struct ReceivedMessage {
    #[serde(rename = "ackId")]
    ack_id: String,
    message: PubSubMessage,
}

#[derive(Debug, Deserialize)]
struct PubSubMessage {
    #[serde(default)]
    data: String,
    #[serde(rename = "messageId", default)]
    message_id: String,
}

#[derive(Debug, Serialize)]
struct AcknowledgeRequest<'a> {
    #[serde(rename = "ackIds")]
    ack_ids: &'a [String],
}

/// Checks if an HTTP failure represents a transient condition worth retrying.
fn is_retryable_http_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() {
        return true;
    }

    matches!(error.status().map(|s| s.as_u16()), Some(429 | 500 | 502 | 503))
}

/// A single failed pull or acknowledge attempt.
#[derive(Debug)]
enum AttemptError {
    Token(SignalsError),
    Http(reqwest::Error),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            // Token refresh blips are transient; a genuinely bad key keeps
            // failing and exhausts the retry budget instead.
            AttemptError::Token(_) => true,
            AttemptError::Http(err) => is_retryable_http_error(err),
        }
    }

    fn into_error(self, description: &'static str, subscription: &str) -> SignalsError {
        match self {
            AttemptError::Token(err) => err,
            AttemptError::Http(err) => signals_error!(
                ErrorKind::SourceReadFailed,
                description,
                subscription.to_string(),
                source: err
            ),
        }
    }
}

/// Pub/Sub streaming pull source.
///
/// Pulls batches of messages from a subscription over the REST API. A batch is
/// acknowledged only when the pipeline comes back for the next one, which means
/// the previous batch has been appended. Delivery is therefore at-least-once: a
/// crash between append and ack redelivers signals, which downstream consumers
/// must tolerate as duplicate rows.
pub struct PubSubSource {
    http: reqwest::Client,
    auth: DefaultAuthenticator,
    subscription: String,
    batch: BatchConfig,
    pending_acks: Vec<String>,
}

impl PubSubSource {
    /// Creates a source authenticated with a service account key.
    pub async fn new_with_key(
        subscription: String,
        service_account_key: &str,
        batch: BatchConfig,
    ) -> SignalsResult<Self> {
        let key = parse_service_account_key(service_account_key).map_err(|err| {
            signals_error!(
                ErrorKind::ConfigError,
                "Invalid service account key for Pub/Sub",
                source: err
            )
        })?;

        let auth = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|err| {
                signals_error!(
                    ErrorKind::SourceConnectionFailed,
                    "Failed to build Pub/Sub authenticator",
                    source: err
                )
            })?;

        Ok(Self {
            http: reqwest::Client::new(),
            auth,
            subscription,
            batch,
            pending_acks: Vec::new(),
        })
    }

    /// Returns the subscription this source pulls from.
    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    async fn token(&self) -> SignalsResult<String> {
        let token = self.auth.token(&[PUBSUB_SCOPE]).await.map_err(|err| {
            signals_error!(
                ErrorKind::SourceConnectionFailed,
                "Failed to obtain Pub/Sub access token",
                source: err
            )
        })?;

        match token.token() {
            Some(token) => Ok(token.to_string()),
            None => Err(signals_error!(
                ErrorKind::SourceConnectionFailed,
                "Pub/Sub access token response contained no token"
            )),
        }
    }

    async fn pull_once(&self) -> Result<PullResponse, AttemptError> {
        let token = self.token().await.map_err(AttemptError::Token)?;
        let url = format!("{PUBSUB_ENDPOINT}/{}:pull", self.subscription);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&PullRequest {
                max_messages: self.batch.max_size,
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(AttemptError::Http)?;

        response
            .json::<PullResponse>()
            .await
            .map_err(AttemptError::Http)
    }

    /// Pulls the next batch, retrying transient failures with backoff.
    async fn pull(&self) -> SignalsResult<PullResponse> {
        let mut attempt = 0;

        loop {
            match self.pull_once().await {
                Ok(response) => return Ok(response),
                Err(failure) if failure.is_retryable() && attempt < MAX_RETRY_ATTEMPTS => {
                    attempt += 1;
                    let backoff = calculate_backoff(attempt);
                    warn!(
                        subscription = %self.subscription,
                        %attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = ?failure,
                        "transient pull failure, retrying"
                    );
                    sleep(backoff).await;
                }
                Err(failure) => {
                    return Err(
                        failure.into_error("Pub/Sub pull request failed", &self.subscription)
                    );
                }
            }
        }
    }

    async fn acknowledge_once(&self, ack_ids: &[String]) -> Result<(), AttemptError> {
        let token = self.token().await.map_err(AttemptError::Token)?;
        let url = format!("{PUBSUB_ENDPOINT}/{}:acknowledge", self.subscription);

        self.http
            .post(&url)
            .bearer_auth(token)
            .json(&AcknowledgeRequest { ack_ids })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(AttemptError::Http)?;

        Ok(())
    }

    /// Acknowledges a batch, retrying transient failures with backoff.
    async fn acknowledge(&self, ack_ids: Vec<String>) -> SignalsResult<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }

        let mut attempt = 0;

        loop {
            match self.acknowledge_once(&ack_ids).await {
                Ok(()) => return Ok(()),
                Err(failure) if failure.is_retryable() && attempt < MAX_RETRY_ATTEMPTS => {
                    attempt += 1;
                    let backoff = calculate_backoff(attempt);
                    warn!(
                        subscription = %self.subscription,
                        %attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = ?failure,
                        "transient acknowledge failure, retrying"
                    );
                    sleep(backoff).await;
                }
                Err(failure) => {
                    return Err(failure
                        .into_error("Pub/Sub acknowledge request failed", &self.subscription));
                }
            }
        }
    }
}

impl SignalSource for PubSubSource {
    fn name() -> &'static str {
        "pubsub"
    }

    async fn next_batch(&mut self) -> SignalsResult<Vec<ReceivedSignal>> {
        // The previous batch has been appended by now, so it is safe to ack.
        let acks = std::mem::take(&mut self.pending_acks);
        self.acknowledge(acks).await?;

        loop {
            let response = self.pull().await?;

            if response.received_messages.is_empty() {
                sleep(Duration::from_millis(self.batch.max_fill_ms)).await;
                continue;
            }

            let mut ack_ids = Vec::with_capacity(response.received_messages.len());
            let mut batch = Vec::with_capacity(response.received_messages.len());

            for received in response.received_messages {
                ack_ids.push(received.ack_id);

                let raw = match BASE64.decode(&received.message.data) {
                    Ok(raw) => Bytes::from(raw),
                    Err(err) => {
                        warn!(
                            message_id = %received.message.message_id,
                            error = %err,
                            "skipping message with invalid base64 payload"
                        );
                        continue;
                    }
                };

                match ReceivedSignal::decode(raw) {
                    Ok(signal) => batch.push(signal),
                    Err(err) => {
                        // Undecodable signals are acked and skipped; redelivering
                        // them would poison the subscription forever.
                        warn!(
                            message_id = %received.message.message_id,
                            error = %err,
                            "skipping undecodable signal"
                        );
                    }
                }
            }

            debug!(
                subscription = %self.subscription,
                signals = batch.len(),
                "pulled batch from pub/sub"
            );

            self.pending_acks = ack_ids;

            return Ok(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_derived_from_topic() {
        assert_eq!(
            subscription_for_topic("projects/tapglue-signals/topics/test-events"),
            "projects/tapglue-signals/subscriptions/test-events"
        );
    }

    #[test]
    fn subscription_derivation_only_touches_first_marker() {
        assert_eq!(
            subscription_for_topic("projects/p/topics/a/topics/b"),
            "projects/p/subscriptions/a/topics/b"
        );
    }

    /// Serves a single canned HTTP response and returns the resulting
    /// `reqwest` status error.
    async fn status_error(status_line: &str) -> reqwest::Error {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\n\r\n");

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(response.as_bytes()).await;
        });

        reqwest::Client::new()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap_err()
    }

    #[tokio::test]
    async fn server_side_failures_are_retryable() {
        let unavailable = status_error("503 Service Unavailable").await;
        assert!(is_retryable_http_error(&unavailable));
        assert!(AttemptError::Http(unavailable).is_retryable());

        let throttled = status_error("429 Too Many Requests").await;
        assert!(is_retryable_http_error(&throttled));
    }

    #[tokio::test]
    async fn client_side_rejections_are_fatal() {
        let forbidden = status_error("403 Forbidden").await;
        assert!(!is_retryable_http_error(&forbidden));
        assert!(!AttemptError::Http(forbidden).is_retryable());

        let missing = status_error("404 Not Found").await;
        assert!(!is_retryable_http_error(&missing));
    }

    #[test]
    fn token_failures_are_retryable() {
        let failure = AttemptError::Token(signals_error!(
            ErrorKind::SourceConnectionFailed,
            "Pub/Sub access token response contained no token"
        ));

        assert!(failure.is_retryable());
    }
}
