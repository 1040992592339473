//! Outgoing email.
//!
//! Everything that sends mail goes through the [`Mailer`] trait. Production
//! posts JSON to an HTTP email API ([`HttpMailer`]); without one configured
//! the server falls back to [`LogMailer`], which records the message in the
//! log and reports success.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email transport error: {0}")]
    Transport(String),

    #[error("Email API rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// A fully rendered message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Mailer for development: logs the envelope and succeeds.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Email not sent (no EMAIL_API_URL configured)"
        );
        debug!(body = %message.text, "Email body");
        Ok(())
    }
}

/// Posts `{from, to, subject, html, text}` as JSON to an email API.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %message.to, subject = %message.subject, "Email accepted by API");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Test doubles shared by the pipeline and route tests.

    use std::sync::Mutex;

    use super::*;

    /// Records every message; optionally fails every send.
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<EmailMessage>>,
        pub fail: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport("smtp down".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::http::{header, HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    type Received = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            subject: "hi".into(),
            html: "<p>hi</p>".into(),
            text: "hi".into(),
        }
    }

    /// Local email API that records each request and answers with `status`.
    async fn email_api(status: StatusCode) -> (SocketAddr, Received) {
        let received: Received = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    sink.lock().unwrap().push((auth, body));
                    (status, "queue full")
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, received)
    }

    #[tokio::test]
    async fn test_log_mailer_succeeds() {
        assert!(LogMailer.send(&message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_http_mailer_posts_json_with_bearer() {
        let (addr, received) = email_api(StatusCode::ACCEPTED).await;
        let mailer = HttpMailer::new(format!("http://{addr}/send"), Some("secret".into()));

        mailer.send(&message()).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0.as_deref(), Some("Bearer secret"));
        assert_eq!(received[0].1["to"], "b@example.com");
        assert_eq!(received[0].1["subject"], "hi");
    }

    #[tokio::test]
    async fn test_http_mailer_maps_error_status() {
        let (addr, _received) = email_api(StatusCode::SERVICE_UNAVAILABLE).await;
        let mailer = HttpMailer::new(format!("http://{addr}/send"), None);

        match mailer.send(&message()).await {
            Err(MailError::Rejected { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "queue full");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_mailer_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mailer = HttpMailer::new(format!("http://{addr}/send"), None);
        assert!(matches!(
            mailer.send(&message()).await,
            Err(MailError::Transport(_))
        ));
    }
}
