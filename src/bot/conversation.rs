//! Step-by-step patient intake over chat.
//!
//! One [`Conversation`] per chat walks through name, age, weight, height and
//! MUAC. Bad answers re-prompt without advancing.

use crate::domain::intake::{parse_age, parse_measurement};
use crate::domain::{Field, InputError, PatientInput};

/// Where a conversation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    AwaitingName,
    AwaitingAge,
    AwaitingWeight,
    AwaitingHeight,
    AwaitingMuac,
    Done,
    Cancelled,
}

impl ConversationState {
    /// Prompt shown when entering this state.
    #[must_use]
    pub fn prompt(&self) -> Option<&'static str> {
        match self {
            Self::AwaitingName => Some("Enter patient name:"),
            Self::AwaitingAge => Some("Enter age:"),
            Self::AwaitingWeight => Some("Enter weight in kg:"),
            Self::AwaitingHeight => Some("Enter height in cm:"),
            Self::AwaitingMuac => Some("Enter MUAC in mm:"),
            Self::Done | Self::Cancelled => None,
        }
    }

    /// Whether the conversation has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// Result of feeding one message into a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Answer accepted; ask the next question
    Prompt(&'static str),
    /// Answer rejected; ask again with this message
    Retry(String),
    /// All answers collected
    Completed(PatientInput),
    /// The conversation was cancelled
    Cancelled,
    /// The conversation already ended; the message was ignored
    Finished,
}

/// Answers collected so far.
#[derive(Debug, Default)]
struct Answers {
    name: Option<String>,
    age_years: Option<u32>,
    weight_kg: Option<f64>,
    height_cm: Option<f64>,
}

/// Intake conversation for a single chat.
#[derive(Debug)]
pub struct Conversation {
    state: ConversationState,
    answers: Answers,
}

impl Conversation {
    /// Begin a new intake. Returns the conversation and its first prompt.
    #[must_use]
    pub fn start() -> (Self, &'static str) {
        let conversation = Self {
            state: ConversationState::AwaitingName,
            answers: Answers::default(),
        };
        (conversation, "Enter patient name:")
    }

    #[must_use]
    pub fn state(&self) -> ConversationState {
        self.state
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Abandon the intake from any active state.
    pub fn cancel(&mut self) -> Step {
        if self.is_finished() {
            return Step::Finished;
        }
        self.state = ConversationState::Cancelled;
        self.answers = Answers::default();
        Step::Cancelled
    }

    /// Feed one answer.
    pub fn advance(&mut self, text: &str) -> Step {
        let text = text.trim();
        match self.state {
            ConversationState::AwaitingName => {
                if text.is_empty() {
                    return Step::Retry("Name cannot be empty. Enter patient name:".to_string());
                }
                self.answers.name = Some(text.to_string());
                self.move_to(ConversationState::AwaitingAge)
            }
            ConversationState::AwaitingAge => match parse_age(text) {
                Ok(age) => {
                    self.answers.age_years = Some(age);
                    self.move_to(ConversationState::AwaitingWeight)
                }
                Err(e) => Step::Retry(retry_message(&e)),
            },
            ConversationState::AwaitingWeight => match parse_measurement(Field::Weight, text) {
                Ok(weight) => {
                    self.answers.weight_kg = Some(weight);
                    self.move_to(ConversationState::AwaitingHeight)
                }
                Err(e) => Step::Retry(retry_message(&e)),
            },
            ConversationState::AwaitingHeight => match parse_measurement(Field::Height, text) {
                Ok(height) => {
                    self.answers.height_cm = Some(height);
                    self.move_to(ConversationState::AwaitingMuac)
                }
                Err(e) => Step::Retry(retry_message(&e)),
            },
            ConversationState::AwaitingMuac => match parse_measurement(Field::Muac, text) {
                Ok(muac_mm) => self.complete(muac_mm),
                Err(e) => Step::Retry(retry_message(&e)),
            },
            ConversationState::Done | ConversationState::Cancelled => Step::Finished,
        }
    }

    fn move_to(&mut self, next: ConversationState) -> Step {
        self.state = next;
        match next.prompt() {
            Some(prompt) => Step::Prompt(prompt),
            None => Step::Finished,
        }
    }

    fn complete(&mut self, muac_mm: f64) -> Step {
        let answers = std::mem::take(&mut self.answers);
        match (answers.name, answers.age_years, answers.weight_kg, answers.height_cm) {
            (Some(name), Some(age_years), Some(weight_kg), Some(height_cm)) => {
                self.state = ConversationState::Done;
                Step::Completed(PatientInput {
                    name,
                    age_years,
                    weight_kg,
                    height_cm,
                    muac_mm,
                })
            }
            // Unreachable through `advance`, but never hand out partial input.
            _ => {
                self.state = ConversationState::Cancelled;
                Step::Cancelled
            }
        }
    }
}

fn retry_message(error: &InputError) -> String {
    match error {
        InputError::NotPositive { field, .. } => {
            format!("Invalid {field}. Enter a positive number:")
        }
        InputError::NotANumber { field, .. } | InputError::MissingField { field } => {
            format!("Invalid {field}. Enter a number:")
        }
        InputError::EmptyName => "Name cannot be empty. Enter patient name:".to_string(),
    }
}
