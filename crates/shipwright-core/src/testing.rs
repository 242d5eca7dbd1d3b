//! In-memory adapters for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for plugin and binary tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};
use shipwright_plugin::{
    ExecOptions, PluginError, PluginResult, Prompt, Question, Shell, ShellCommand, ShellError,
    template,
};

/// Shell that records commands instead of running them.
///
/// Line commands are recorded after template rendering. Commands match
/// `failing` and `with_output` patterns by substring.
#[derive(Debug, Default)]
pub struct RecordingShell {
    executed: Mutex<Vec<(String, bool)>>,
    failing: Vec<String>,
    outputs: Vec<(String, String)>,
}

impl RecordingShell {
    /// Makes commands containing `pattern` fail.
    #[must_use]
    pub fn failing(mut self, pattern: impl Into<String>) -> Self {
        self.failing.push(pattern.into());
        self
    }

    /// Makes commands containing `pattern` print `output`.
    #[must_use]
    pub fn with_output(mut self, pattern: impl Into<String>, output: impl Into<String>) -> Self {
        self.outputs.push((pattern.into(), output.into()));
        self
    }

    /// Returns every command received, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    /// Returns the commands received with the `write` flag.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, write)| *write)
            .map(|(command, _)| command.clone())
            .collect()
    }
}

#[async_trait]
impl Shell for RecordingShell {
    async fn exec(
        &self,
        command: &ShellCommand,
        options: &ExecOptions,
    ) -> Result<String, ShellError> {
        let rendered = match command {
            ShellCommand::Line(line) => template::render(line, &options.context),
            ShellCommand::Args(_) => command.to_string(),
        };
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((rendered.clone(), options.write));

        if self.failing.iter().any(|p| rendered.contains(p.as_str())) {
            return Err(ShellError {
                command: rendered,
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }

        Ok(self
            .outputs
            .iter()
            .find(|(p, _)| rendered.contains(p.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

/// Prompt that replays queued answers and records the questions asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<Value>>,
    asked: Mutex<Vec<Question>>,
}

impl ScriptedPrompt {
    /// Creates a prompt answering with `answers`, in order.
    #[must_use]
    pub fn new(answers: impl IntoIterator<Item = Value>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::default(),
        }
    }

    /// Returns the questions asked so far.
    #[must_use]
    pub fn asked(&self) -> Vec<Question> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn ask(&self, question: &Question) -> PluginResult<Value> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(question.clone());

        let answer = self
            .answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| PluginError::Prompt(format!("no answer for `{}`", question.name)))?;

        Ok(json!({ question.name.clone(): answer }))
    }
}
