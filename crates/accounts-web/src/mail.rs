//! Outgoing email.
//!
//! [`EmailBackend`] is the delivery seam. Pick one with
//! [`backend_from_settings`]:
//!
//! - [`ConsoleBackend`] - Prints messages to stdout (development default)
//! - [`FileBackend`] - Writes one `.eml` file per message
//! - [`InMemoryBackend`] - Keeps an outbox for tests
//! - [`HttpApiBackend`] - Posts JSON to a transactional email HTTP API

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use accounts_core::crypto::get_random_string;
use accounts_core::error::{AccountsError, AccountsResult};
use accounts_core::EmailSettings;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

/// An email with a plain-text body and an optional HTML alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub from_email: String,
    pub to: Vec<String>,
    pub html_body: Option<String>,
}

impl EmailMessage {
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        from_email: impl Into<String>,
        to: Vec<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            from_email: from_email.into(),
            to,
            html_body: None,
        }
    }

    #[must_use]
    pub fn with_html_body(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }

    /// Renders the message in RFC 822 form.
    ///
    /// With an HTML alternative the body is `multipart/alternative`.
    pub fn format_message(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "MIME-Version: 1.0");
        let _ = writeln!(out, "Subject: {}", self.subject);
        let _ = writeln!(out, "From: {}", self.from_email);
        let _ = writeln!(out, "To: {}", self.to.join(", "));
        let _ = writeln!(out, "Date: {}", chrono::Utc::now().to_rfc2822());

        match &self.html_body {
            None => {
                let _ = writeln!(out, "Content-Type: text/plain; charset=\"utf-8\"");
                let _ = writeln!(out, "\n{}", self.body);
            }
            Some(html) => {
                let boundary = format!("===============accounts{}==", get_random_string(16));
                let _ = writeln!(
                    out,
                    "Content-Type: multipart/alternative; boundary=\"{boundary}\"\n"
                );
                let _ = writeln!(out, "--{boundary}");
                let _ = writeln!(out, "Content-Type: text/plain; charset=\"utf-8\"\n");
                let _ = writeln!(out, "{}", self.body);
                let _ = writeln!(out, "--{boundary}");
                let _ = writeln!(out, "Content-Type: text/html; charset=\"utf-8\"\n");
                let _ = writeln!(out, "{html}");
                let _ = writeln!(out, "--{boundary}--");
            }
        }
        out
    }
}

fn require_recipient(message: &EmailMessage) -> AccountsResult<()> {
    if message.to.is_empty() {
        return Err(AccountsError::EmailError(
            "Email must have at least one recipient".to_string(),
        ));
    }
    Ok(())
}

/// Delivers email.
#[async_trait]
pub trait EmailBackend: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> AccountsResult<()>;

    /// Sends each message, returning how many were delivered.
    async fn send_many(&self, messages: &[EmailMessage]) -> AccountsResult<usize> {
        let mut count = 0;
        for message in messages {
            match self.send(message).await {
                Ok(()) => count += 1,
                Err(e) => tracing::error!(error = %e, subject = %message.subject, "email not sent"),
            }
        }
        Ok(count)
    }
}

/// Prints messages to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleBackend;

#[async_trait]
impl EmailBackend for ConsoleBackend {
    async fn send(&self, message: &EmailMessage) -> AccountsResult<()> {
        require_recipient(message)?;
        let separator = "-".repeat(79);
        let formatted = message.format_message();
        tokio::task::spawn_blocking(move || {
            println!("{formatted}");
            println!("{separator}");
        })
        .await
        .map_err(|e| AccountsError::EmailError(e.to_string()))?;
        Ok(())
    }
}

/// Writes each message to its own `.eml` file in `dir`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

#[async_trait]
impl EmailBackend for FileBackend {
    async fn send(&self, message: &EmailMessage) -> AccountsResult<()> {
        require_recipient(message)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        let path = self
            .dir
            .join(format!("{timestamp}-{}.eml", get_random_string(8)));
        tokio::fs::write(&path, message.format_message()).await?;

        tracing::debug!(path = %path.display(), "email written");
        Ok(())
    }
}

/// Collects messages in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    outbox: Arc<RwLock<Vec<EmailMessage>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every message sent so far.
    pub async fn messages(&self) -> Vec<EmailMessage> {
        self.outbox.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.outbox.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.outbox.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.outbox.write().await.clear();
    }
}

#[async_trait]
impl EmailBackend for InMemoryBackend {
    async fn send(&self, message: &EmailMessage) -> AccountsResult<()> {
        require_recipient(message)?;
        self.outbox.write().await.push(message.clone());
        Ok(())
    }
}

/// Request body accepted by Resend-style transactional email APIs.
#[derive(Debug, Serialize)]
struct ApiEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

/// Sends through an HTTP email API with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpApiBackend {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpApiBackend {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AccountsResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("accounts-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AccountsError::ConfigurationError(format!("email client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EmailBackend for HttpApiBackend {
    async fn send(&self, message: &EmailMessage) -> AccountsResult<()> {
        require_recipient(message)?;
        let payload = ApiEmail {
            from: &message.from_email,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
            html: message.html_body.as_deref(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AccountsError::EmailError(format!("send failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = %status, subject = %message.subject, "email accepted by API");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AccountsError::EmailError(format!(
            "email API returned HTTP {status}: {body}"
        )))
    }
}

/// Builds the backend named by `settings.backend`.
///
/// `"console"`, `"file"`, `"memory"` or `"api"`.
pub fn backend_from_settings(settings: &EmailSettings) -> AccountsResult<Arc<dyn EmailBackend>> {
    match settings.backend.as_str() {
        "console" => Ok(Arc::new(ConsoleBackend)),
        "file" => Ok(Arc::new(FileBackend::new(settings.file_path.clone()))),
        "memory" => Ok(Arc::new(InMemoryBackend::new())),
        "api" => Ok(Arc::new(HttpApiBackend::new(
            settings.api_url.clone(),
            settings.api_key.clone(),
            Duration::from_secs(settings.timeout_secs),
        )?)),
        other => Err(AccountsError::ConfigurationError(format!(
            "unknown email backend '{other}'"
        ))),
    }
}
