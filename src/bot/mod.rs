//! Chat front-end: command routing and per-chat intake sessions.
//!
//! [`ChatBot`] is transport-agnostic: it maps one incoming text to the
//! replies to send. [`run_bot`] drives it from Telegram long-polling.

pub mod conversation;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::adapters::csv_export::CSV_FILENAME;
use crate::adapters::telegram::TelegramClient;
use crate::adapters::StorageError;
use crate::application::AssessmentService;
use crate::domain::intake::{looks_labeled, parse_labeled};
use crate::domain::nutrition::format_decimal;
use crate::domain::{describe_errors, AssessmentRecord, PatientInput};
use crate::ports::Storage;
use crate::NutricareError;

use conversation::{Conversation, Step};

pub const WELCOME: &str =
    "Welcome to NutriCare Bot! Use /add to add a patient or /list to view patients.";
const CANCELLED: &str = "Operation cancelled.";
const SAVED: &str = "Patient added to database!";
const EMPTY_LIST: &str = "No patients in database.";
const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";
const HELP: &str = "Commands: /add, /list, /export, /cancel. You can also send one message with lines like \"Name: ...\", \"Age: ...\", \"Weight: ...\", \"Height: ...\", \"MUAC: ...\".";
const FAILURE: &str = "Sorry, something went wrong. Please try again.";

/// Recommendation characters shown per `/list` line.
const LIST_RECOMMENDATION_CHARS: usize = 50;

/// Telegram's `sendMessage` text limit, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Intake sessions idle longer than this are dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Document { filename: String, bytes: Vec<u8> },
}

impl Reply {
    fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

struct Session {
    conversation: Conversation,
    last_active: Instant,
}

/// Chat bot engine. Owns one intake conversation per chat.
pub struct ChatBot<S>
where
    S: Storage,
{
    service: Arc<AssessmentService<S>>,
    sessions: HashMap<i64, Session>,
    session_ttl: Duration,
}

impl<S> ChatBot<S>
where
    S: Storage,
    S::Error: Into<StorageError>,
{
    pub fn new(service: Arc<AssessmentService<S>>) -> Self {
        Self {
            service,
            sessions: HashMap::new(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Override how long an unanswered intake is kept.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Number of chats with an intake in progress.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Handle one incoming text and return the replies, in order.
    pub fn handle_message(&mut self, chat_id: i64, text: &str) -> Vec<Reply> {
        let text = text.trim();
        self.expire_idle_sessions(Instant::now());

        if let Some(command) = parse_command(text) {
            return self.handle_command(chat_id, command);
        }

        if let Some(session) = self.sessions.get_mut(&chat_id) {
            session.last_active = Instant::now();
            let step = session.conversation.advance(text);
            if session.conversation.is_finished() {
                self.sessions.remove(&chat_id);
            }
            return match step {
                Step::Prompt(prompt) => vec![Reply::text(prompt)],
                Step::Retry(message) => vec![Reply::Text(message)],
                Step::Completed(input) => self.save(input),
                Step::Cancelled => vec![Reply::text(CANCELLED)],
                Step::Finished => Vec::new(),
            };
        }

        if looks_labeled(text) {
            return match parse_labeled(text) {
                Ok(input) => self.save(input),
                Err(errors) => vec![Reply::Text(format!(
                    "Could not read patient data: {}",
                    describe_errors(&errors)
                ))],
            };
        }

        vec![Reply::text(HELP)]
    }

    fn expire_idle_sessions(&mut self, now: Instant) {
        let ttl = self.session_ttl;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.saturating_duration_since(session.last_active) < ttl);
        let expired = before - self.sessions.len();
        if expired > 0 {
            tracing::debug!(expired, "Dropped idle intake sessions");
        }
    }

    fn handle_command(&mut self, chat_id: i64, command: &str) -> Vec<Reply> {
        match command {
            "start" => vec![Reply::text(WELCOME)],
            "add" => {
                let (conversation, prompt) = Conversation::start();
                self.sessions.insert(
                    chat_id,
                    Session {
                        conversation,
                        last_active: Instant::now(),
                    },
                );
                vec![Reply::text(prompt)]
            }
            "cancel" => match self.sessions.remove(&chat_id) {
                Some(mut session) => {
                    session.conversation.cancel();
                    vec![Reply::text(CANCELLED)]
                }
                None => vec![Reply::text(NOTHING_TO_CANCEL)],
            },
            "list" => match self.service.list() {
                Ok(records) => split_message(&format_list(&records), MAX_MESSAGE_LEN)
                    .into_iter()
                    .map(Reply::Text)
                    .collect(),
                Err(e) => failure(&e),
            },
            "export" => {
                let mut bytes = Vec::new();
                match self.service.export_csv(&mut bytes) {
                    Ok(_) => vec![Reply::Document {
                        filename: CSV_FILENAME.to_string(),
                        bytes,
                    }],
                    Err(e) => failure(&e),
                }
            }
            _ => vec![Reply::text(HELP)],
        }
    }

    fn save(&self, input: PatientInput) -> Vec<Reply> {
        match self.service.record(input) {
            Ok(record) => vec![Reply::Text(format_assessment(&record)), Reply::text(SAVED)],
            Err(NutricareError::Validation(errors)) => vec![Reply::Text(format!(
                "Could not save patient: {}",
                describe_errors(&errors)
            ))],
            Err(e) => failure(&e),
        }
    }
}

fn failure(error: &NutricareError) -> Vec<Reply> {
    tracing::error!(error = %error, "Bot request failed");
    vec![Reply::text(FAILURE)]
}

/// Command name without the leading slash or a trailing `@botname`.
fn parse_command(text: &str) -> Option<&str> {
    let word = text.strip_prefix('/')?.split_whitespace().next()?;
    Some(word.split('@').next().unwrap_or(word))
}

/// Assessment summary sent after saving.
#[must_use]
pub fn format_assessment(record: &AssessmentRecord) -> String {
    let a = &record.assessment;
    format!(
        "Patient: {}, Age: {}\nBMI: {} ({})\nNutrition: {}\nRecommendation: {}",
        a.name(),
        a.age_years(),
        format_decimal(a.bmi()),
        a.build(),
        a.nutrition_status(),
        a.recommendation()
    )
}

/// `/list` body, one line per record.
#[must_use]
pub fn format_list(records: &[AssessmentRecord]) -> String {
    if records.is_empty() {
        return EMPTY_LIST.to_string();
    }
    let mut msg = String::from("Patients:\n");
    for record in records {
        let a = &record.assessment;
        let rec: String = a.recommendation().chars().take(LIST_RECOMMENDATION_CHARS).collect();
        msg.push_str(&format!(
            "{}: BMI {} ({}), Nutrition: {}, Rec: {}...\n",
            a.name(),
            format_decimal(a.bmi()),
            a.build(),
            a.nutrition_status(),
            rec
        ));
    }
    msg
}

/// Split text into chunks of at most `limit` UTF-16 units, breaking at line
/// ends where possible.
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.encode_utf16().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= limit {
            current.push_str(line);
            current_len += line_len;
            continue;
        }
        for c in line.chars() {
            if current_len + c.len_utf16() > limit {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(c);
            current_len += c.len_utf16();
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(
        BASE_BACKOFF_MS
            .saturating_mul(1u64 << attempt.min(16))
            .min(MAX_BACKOFF_MS),
    )
}

/// Long-poll Telegram and answer messages until shutdown is signalled.
///
/// Storage calls are blocking; they run via `block_in_place`, so this must
/// be driven on a multi-threaded runtime.
pub async fn run_bot<S>(
    client: TelegramClient,
    mut bot: ChatBot<S>,
    poll_timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: Storage,
    S::Error: Into<StorageError>,
{
    tracing::info!("Telegram bot polling started");
    let mut offset: Option<i64> = None;
    let mut failures: u32 = 0;

    loop {
        let updates = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() { break; }
                continue;
            }
            result = client.get_updates(offset, poll_timeout) => result,
        };

        let updates = match updates {
            Ok(updates) => {
                failures = 0;
                updates
            }
            Err(e) => {
                let delay = retry_delay(failures);
                failures = failures.saturating_add(1);
                tracing::warn!(error = %e, ?delay, "getUpdates failed; backing off");
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() { break; }
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            let chat_id = message.chat.id;

            let replies = tokio::task::block_in_place(|| bot.handle_message(chat_id, &text));
            tracing::debug!(chat_id, replies = replies.len(), "Handled message");

            for reply in replies {
                let sent = match reply {
                    Reply::Text(text) => client.send_message(chat_id, &text).await,
                    Reply::Document { filename, bytes } => {
                        client.send_document(chat_id, &filename, bytes).await
                    }
                };
                if let Err(e) = sent {
                    tracing::warn!(chat_id, error = %e, "Failed to send reply");
                }
            }
        }
    }

    tracing::info!(active_sessions = bot.active_sessions(), "Telegram bot stopped");
}
