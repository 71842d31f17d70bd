//! Report delivery
//!
//! A [`NotificationSink`] sends a pre-formatted text block to a destination.
//! Delivery is best effort: [`deliver`] logs failures and never lets them
//! affect the scan result or the exit status.

use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;

const TELEGRAM_API: &str = "https://api.telegram.org";
/// Telegram rejects messages over 4096 characters; leave room for the `<pre>` wrapper
const TELEGRAM_CHUNK_CHARS: usize = 4000;

/// Failure to deliver a message
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Destination for a rendered report
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError>;
}

/// Send through `sink`, logging and swallowing any failure.
///
/// Returns whether the message was delivered.
pub fn deliver<S: NotificationSink + ?Sized>(sink: &S, destination: &str, text: &str) -> bool {
    match sink.send(destination, text) {
        Ok(()) => {
            tracing::info!(sink = sink.name(), destination, "report delivered");
            true
        }
        Err(error) => {
            tracing::warn!(sink = sink.name(), destination, %error, "report delivery failed");
            false
        }
    }
}

// ============================================================
// CONSOLE
// ============================================================

/// Writes the text to a stream; the destination is ignored
pub struct ConsoleSink<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> NotificationSink for ConsoleSink<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    fn send(&self, _destination: &str, text: &str) -> Result<(), NotifyError> {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }
}

// ============================================================
// TELEGRAM
// ============================================================

/// Telegram Bot API `sendMessage`; the destination is the chat id.
///
/// Text is sent monospaced inside `<pre>` so tables keep their alignment, and
/// split into several messages when it exceeds Telegram's size limit.
#[derive(Clone)]
pub struct TelegramSink {
    client: Client,
    token: String,
    api_base: String,
}

impl fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSink")
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

impl TelegramSink {
    pub fn new(token: impl Into<String>) -> Result<Self, NotifyError> {
        Self::with_api_base(token, TELEGRAM_API)
    }

    pub fn with_api_base(
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

impl NotificationSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        for chunk in split_message(text, TELEGRAM_CHUNK_CHARS) {
            let payload = SendMessage {
                chat_id: destination,
                text: format!("<pre>{}</pre>", escape_html(chunk)),
                parse_mode: "HTML",
            };
            // the url carries the bot token
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .map_err(reqwest::Error::without_url)?;
            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .map_err(reqwest::Error::without_url)
                    .unwrap_or_default();
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }
        }
        Ok(())
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Split on line boundaries into chunks of at most `max_chars` characters.
///
/// A single line longer than `max_chars` is split mid-line.
fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chars = 0;
    let mut last_break = None;

    for (i, c) in text.char_indices() {
        if chars == max_chars {
            let end = last_break.unwrap_or(i);
            chunks.push(&text[start..end]);
            start = if last_break.is_some() { end + 1 } else { end };
            chars = text[start..i].chars().count();
            last_break = None;
        }
        if c == '\n' {
            last_break = Some(i);
        }
        chars += 1;
    }
    if start < text.len() || chunks.is_empty() {
        chunks.push(&text[start..]);
    }
    chunks
}
