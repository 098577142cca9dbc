// ABOUTME: Transport to the remote assistant endpoint.
// ABOUTME: One POST per exchange plus a best-effort /destroy teardown notification.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload returned by the assistant endpoint. All fields are optional;
/// `summary` and `response` are alternative text fields, `table` is an
/// HTML fragment the render surface may embed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AskReply {
    pub response: Option<String>,
    pub summary: Option<String>,
    pub table: Option<String>,
}

#[derive(Serialize)]
struct AskRequest<'a> {
    query: &'a str,
    userid: &'a str,
}

#[derive(Serialize)]
struct DestroyRequest<'a> {
    userid: &'a str,
}

/// Transport failure for a single exchange. No retries happen at this
/// layer; failures propagate immediately to the controller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint answered with a non-success HTTP status.
    #[error("assistant endpoint returned {status} {status_text}")]
    Http { status: u16, status_text: String },
    /// The request never completed (connection, DNS, protocol).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl TransportError {
    /// Short human-readable phrase for the timeline. Raw transport
    /// internals never reach the user beyond this.
    pub fn status_phrase(&self) -> String {
        match self {
            TransportError::Http { status_text, status } => {
                if status_text.is_empty() {
                    format!("HTTP {status}")
                } else {
                    status_text.clone()
                }
            }
            TransportError::Request(_) => "connection failed".to_string(),
        }
    }
}

/// One request/response exchange with the remote assistant, plus the
/// end-of-session notification. Implementations make a single attempt
/// and never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ask the assistant one question on behalf of a user.
    async fn ask(
        &self,
        query: &str,
        user_id: &str,
        auth_token: &str,
    ) -> Result<AskReply, TransportError>;

    /// Best-effort notification that the session ended. Must not fail
    /// observably; implementations log and swallow delivery errors.
    async fn notify_end_of_session(&self, user_id: &str, auth_token: &str);
}

/// HTTP transport over reqwest. POSTs `{query, userid}` to the endpoint
/// and `{userid}` to `<endpoint>/destroy` on teardown.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint_url: String,
    request_timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint_url: endpoint_url.into(),
            request_timeout: None,
        }
    }

    /// Opt into a per-request timeout. Off by default: a hung endpoint
    /// leaves the exchange pending, matching the documented no-timeout
    /// contract of the session controller.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn destroy_url(&self) -> String {
        format!("{}/destroy", self.endpoint_url.trim_end_matches('/'))
    }

    fn post(&self, url: &str, auth_token: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.post(url);
        if !auth_token.is_empty() {
            request = request.header("Authorization", auth_token);
        }
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }
        request
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn ask(
        &self,
        query: &str,
        user_id: &str,
        auth_token: &str,
    ) -> Result<AskReply, TransportError> {
        log::debug!("asking assistant endpoint at {}", self.endpoint_url);

        let response = self
            .post(&self.endpoint_url, auth_token)
            .json(&AskRequest {
                query,
                userid: user_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        Ok(response.json::<AskReply>().await?)
    }

    async fn notify_end_of_session(&self, user_id: &str, auth_token: &str) {
        let url = self.destroy_url();
        log::debug!("sending end-of-session notification to {url}");

        let result = self
            .post(&url, auth_token)
            .json(&DestroyRequest { userid: user_id })
            .send()
            .await;

        // Delivery is best-effort; the session is going away either way.
        match result {
            Ok(response) if !response.status().is_success() => {
                log::warn!(
                    "end-of-session notification rejected with {}",
                    response.status()
                );
            }
            Ok(_) => {}
            Err(e) => log::warn!("end-of-session notification failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_request_wire_shape() {
        let body = serde_json::to_value(AskRequest {
            query: "open sales orders",
            userid: "alex@example.com",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"query": "open sales orders", "userid": "alex@example.com"})
        );
    }

    #[test]
    fn destroy_request_wire_shape() {
        let body = serde_json::to_value(DestroyRequest {
            userid: "alex@example.com",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"userid": "alex@example.com"}));
    }

    #[test]
    fn reply_parses_partial_payloads() {
        let reply: AskReply =
            serde_json::from_str(r#"{"summary": "3 orders found", "table": "<table></table>"}"#)
                .unwrap();
        assert_eq!(reply.summary.as_deref(), Some("3 orders found"));
        assert_eq!(reply.table.as_deref(), Some("<table></table>"));
        assert_eq!(reply.response, None);

        let empty: AskReply = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, AskReply::default());
    }

    #[test]
    fn reply_ignores_unknown_fields() {
        let reply: AskReply =
            serde_json::from_str(r#"{"response": "Hi!", "quickReplies": ["a", "b"]}"#).unwrap();
        assert_eq!(reply.response.as_deref(), Some("Hi!"));
    }

    #[test]
    fn status_phrase_is_short() {
        let err = TransportError::Http {
            status: 503,
            status_text: "Service Unavailable".to_string(),
        };
        assert_eq!(err.status_phrase(), "Service Unavailable");

        let bare = TransportError::Http {
            status: 599,
            status_text: String::new(),
        };
        assert_eq!(bare.status_phrase(), "HTTP 599");
    }

    #[test]
    fn destroy_url_handles_trailing_slash() {
        let t = HttpTransport::new("https://bot.example.com/chat/");
        assert_eq!(t.destroy_url(), "https://bot.example.com/chat/destroy");
    }
}
