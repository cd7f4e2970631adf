use super::telegram::{TelegramNotifier, Update};
use crate::report::DEFAULT_MAX_CHARS;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Scheduled runs happen on the quarter hour
const RUN_INTERVAL_MINUTES: u32 = 15;

pub const HELP_TEXT: &str = "🤖 Commands:\n\
/status - current signal snapshot\n\
/next - time until the next scheduled run\n\
/help - this help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Next,
    Help,
}

/// Parse a chat message into a command. Anything else is ignored.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?.to_lowercase();
    // "/status@my_bot" in group chats
    let command = first.split('@').next().unwrap_or_default();

    match command {
        "/status" => Some(Command::Status),
        "/next" => Some(Command::Next),
        "/help" | "/start" => Some(Command::Help),
        _ => None,
    }
}

/// Minutes until the next :00, :15, :30 or :45. Exactly on a boundary counts as a full interval.
pub fn minutes_to_next_quarter(now: DateTime<Utc>) -> u32 {
    match (RUN_INTERVAL_MINUTES - now.minute() % RUN_INTERVAL_MINUTES) % RUN_INTERVAL_MINUTES {
        0 => RUN_INTERVAL_MINUTES,
        m => m,
    }
}

/// Produces the text for `/status`
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status_report(&self) -> Result<String>;
}

/// Highest processed update id, kept in a small text file between runs
pub struct UpdateCursor {
    path: PathBuf,
}

impl UpdateCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unreadable contents are treated as no cursor
    pub async fn load(&self) -> Option<i64> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw.trim().parse().ok(),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, update_id: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, update_id.to_string())
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Summary of one poll
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub updates: usize,
    pub answered: usize,
    pub last_update_id: Option<i64>,
}

/// Answers pending commands once and exits. Not a long-running listener.
pub struct CommandBot {
    notifier: TelegramNotifier,
    cursor: UpdateCursor,
    /// When set, other chats are ignored
    owner_chat: Option<i64>,
    max_message_chars: usize,
}

impl CommandBot {
    pub fn new(notifier: TelegramNotifier, cursor: UpdateCursor, owner_chat: Option<i64>) -> Self {
        Self {
            notifier,
            cursor,
            owner_chat,
            max_message_chars: DEFAULT_MAX_CHARS,
        }
    }

    /// Replies longer than this go out as numbered parts
    pub fn with_max_message_chars(mut self, max_chars: usize) -> Self {
        self.max_message_chars = max_chars;
        self
    }

    pub async fn poll_once(
        &self,
        status: &dyn StatusSource,
        now: DateTime<Utc>,
    ) -> Result<PollSummary> {
        let last_id = self.cursor.load().await;
        let updates = self
            .notifier
            .get_updates(last_id.map(|id| id + 1))
            .await
            .context("getUpdates failed")?;

        let mut summary = PollSummary {
            updates: updates.len(),
            ..Default::default()
        };
        let mut max_id = last_id;
        // rendered at most once per poll
        let mut status_text: Option<String> = None;

        for update in &updates {
            max_id = Some(max_id.map_or(update.update_id, |id| id.max(update.update_id)));

            let Some((chat_id, command)) = self.accept(update) else {
                continue;
            };

            let reply = match command {
                Command::Status => {
                    if status_text.is_none() {
                        status_text = Some(match status.status_report().await {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::error!("Failed to build status report: {:#}", e);
                                format!("⚠️ Status unavailable: {}", e)
                            }
                        });
                    }
                    status_text.clone().unwrap_or_default()
                }
                Command::Next => format!(
                    "⏱ Next scheduled run in ~{} min.",
                    minutes_to_next_quarter(now)
                ),
                Command::Help => HELP_TEXT.to_string(),
            };

            match self
                .notifier
                .send_report(&chat_id.to_string(), &reply, self.max_message_chars)
                .await
            {
                Ok(_) => summary.answered += 1,
                Err(e) => tracing::warn!(chat = chat_id, "Failed to answer {:?}: {}", command, e),
            }
        }

        if let Some(id) = max_id {
            if max_id != last_id {
                self.cursor.save(id).await?;
            }
        }
        summary.last_update_id = max_id;

        tracing::info!(
            "Poll done: {} updates, {} answered",
            summary.updates,
            summary.answered
        );

        Ok(summary)
    }

    fn accept(&self, update: &Update) -> Option<(i64, Command)> {
        let message = update.message()?;
        if let Some(owner) = self.owner_chat {
            if message.chat.id != owner {
                tracing::debug!(chat = message.chat.id, "Ignoring message from foreign chat");
                return None;
            }
        }
        let command = parse_command(message.text.as_deref()?)?;
        Some((message.chat.id, command))
    }
}
