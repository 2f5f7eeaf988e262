// =============================================================================
// Report Sinks
// =============================================================================
//
// `TelegramSink` posts to the Bot API `sendMessage` endpoint with Markdown
// parse mode.  Messages above the 4096-character limit are split on line
// boundaries and sent in order.  `LogSink` prints to stdout and is the
// fallback when no bot credentials are configured.
// =============================================================================

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, instrument};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
/// Bot API limit on message text, in characters.
pub const TELEGRAM_MAX_CHARS: usize = 4096;

#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, text: &str) -> Result<()>;
}

/// Publish through `sink`; a failure is logged and swallowed.
pub async fn deliver(sink: &dyn ReportSink, text: &str) -> bool {
    match sink.publish(text).await {
        Ok(()) => {
            info!(sink = sink.name(), chars = text.chars().count(), "report delivered");
            true
        }
        Err(e) => {
            error!(sink = sink.name(), error = %e, "report delivery failed");
            false
        }
    }
}

// =============================================================================
// Telegram
// =============================================================================

#[derive(Clone)]
pub struct TelegramSink {
    base_url: String,
    token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramSink {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client for Telegram")?;

        Ok(Self {
            base_url: TELEGRAM_API_URL.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
            client,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send_chunk(&self, chunk: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": chunk,
            "parse_mode": "Markdown",
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Telegram sendMessage request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Telegram sendMessage HTTP {}: {}", status.as_u16(), text);
        }
        Ok(())
    }
}

#[async_trait]
impl ReportSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    #[instrument(skip(self, text), name = "telegram::publish")]
    async fn publish(&self, text: &str) -> Result<()> {
        for chunk in split_message(text, TELEGRAM_MAX_CHARS) {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSink")
            .field("base_url", &self.base_url)
            .field("chat_id", &self.chat_id)
            .field("token", &"***")
            .finish()
    }
}

// =============================================================================
// Stdout
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl ReportSink for LogSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn publish(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }
}

// =============================================================================
// Splitting
// =============================================================================

/// Split `text` into chunks of at most `max_chars` characters, breaking on
/// newlines.  A single line longer than the limit is cut at char boundaries.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let sep = usize::from(!current.is_empty());

        if current_len + sep + line_len <= max_chars {
            if sep == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += sep + line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= max_chars {
            current.push_str(line);
            current_len = line_len;
        } else {
            let chars: Vec<char> = line.chars().collect();
            let pieces = chars.chunks(max_chars).map(|c| c.iter().collect::<String>());
            let mut last = None;
            for piece in pieces {
                if let Some(prev) = last.replace(piece) {
                    chunks.push(prev);
                }
            }
            if let Some(tail) = last {
                current_len = tail.chars().count();
                current = tail;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
