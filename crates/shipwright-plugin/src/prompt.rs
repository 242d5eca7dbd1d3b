//! Operator prompt contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::{PluginError, PluginResult};

/// Kind of question to ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Yes/no.
    Confirm,
    /// Free text.
    Input,
    /// One of [`Question::choices`].
    List,
}

/// One selectable answer of a list question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Label shown to the operator.
    pub name: String,
    /// Value returned when selected.
    pub value: String,
}

impl Choice {
    /// Creates a choice.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A prompt descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// Kind of question.
    pub kind: QuestionKind,
    /// Answer key.
    pub name: String,
    /// Text shown to the operator.
    pub message: String,
    /// Default answer.
    pub default: Option<Value>,
    /// Choices for list questions.
    pub choices: Vec<Choice>,
}

impl Question {
    /// Creates a confirm question.
    #[must_use]
    pub fn confirm(name: impl Into<String>, message: impl Into<String>, default: bool) -> Self {
        Self {
            kind: QuestionKind::Confirm,
            name: name.into(),
            message: message.into(),
            default: Some(Value::Bool(default)),
            choices: Vec::new(),
        }
    }

    /// Creates a free-text question.
    #[must_use]
    pub fn input(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: QuestionKind::Input,
            name: name.into(),
            message: message.into(),
            default: None,
            choices: Vec::new(),
        }
    }

    /// Creates a list question.
    #[must_use]
    pub fn list(name: impl Into<String>, message: impl Into<String>, choices: Vec<Choice>) -> Self {
        let default = choices.first().map(|c| Value::String(c.value.clone()));
        Self {
            kind: QuestionKind::List,
            name: name.into(),
            message: message.into(),
            default,
            choices,
        }
    }
}

/// Asks the operator questions. Used only in interactive runs.
#[async_trait]
pub trait Prompt: Send + Sync {
    /// Asks `question` and returns `{ <name>: <answer> }`.
    ///
    /// # Errors
    ///
    /// Returns an error if no answer could be read.
    async fn ask(&self, question: &Question) -> PluginResult<Value>;
}

/// Prompt used in unattended runs: every question is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl Prompt for NoPrompt {
    async fn ask(&self, question: &Question) -> PluginResult<Value> {
        Err(PluginError::Prompt(format!(
            "cannot ask `{}` in unattended mode",
            question.name
        )))
    }
}
