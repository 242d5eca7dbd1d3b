//! Line-based terminal prompt.

use async_trait::async_trait;
use serde_json::{Value, json};
use shipwright_plugin::{PluginError, PluginResult, Prompt, Question, QuestionKind};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

type Input = Box<dyn AsyncBufRead + Send + Unpin>;
type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Asks questions on a line-oriented terminal.
pub struct TerminalPrompt {
    io: Mutex<(Input, Output)>,
}

impl TerminalPrompt {
    /// Creates a prompt over arbitrary streams.
    #[must_use]
    pub fn new(
        input: impl AsyncBufRead + Send + Unpin + 'static,
        output: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            io: Mutex::new((Box::new(input), Box::new(output))),
        }
    }

    /// Creates a prompt on stdin and stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

fn io_error(e: std::io::Error) -> PluginError {
    PluginError::Prompt(format!("terminal: {e}"))
}

fn render(question: &Question) -> String {
    match question.kind {
        QuestionKind::Confirm => {
            let hint = match question.default {
                Some(Value::Bool(false)) => "y/N",
                _ => "Y/n",
            };
            format!("? {} ({hint}) ", question.message)
        }
        QuestionKind::Input => match question.default.as_ref().and_then(Value::as_str) {
            Some(default) => format!("? {} ({default}) ", question.message),
            None => format!("? {} ", question.message),
        },
        QuestionKind::List => {
            let mut text = format!("? {}\n", question.message);
            for (i, choice) in question.choices.iter().enumerate() {
                text.push_str(&format!("  {}) {}\n", i + 1, choice.name));
            }
            text.push_str("  Answer [1]: ");
            text
        }
    }
}

/// Interprets one answer line. `None` means ask again.
fn interpret(question: &Question, line: &str) -> Option<Value> {
    let line = line.trim();
    match question.kind {
        QuestionKind::Confirm => match line.to_lowercase().as_str() {
            "" => Some(question.default.clone().unwrap_or(Value::Bool(true))),
            "y" | "yes" => Some(Value::Bool(true)),
            "n" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        QuestionKind::Input => {
            if line.is_empty() {
                question.default.clone()
            } else {
                Some(Value::String(line.to_string()))
            }
        }
        QuestionKind::List => {
            if line.is_empty() {
                return question.default.clone();
            }
            let by_index = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| question.choices.get(i));
            by_index
                .or_else(|| question.choices.iter().find(|c| c.value == line))
                .map(|c| Value::String(c.value.clone()))
        }
    }
}

#[async_trait]
impl Prompt for TerminalPrompt {
    async fn ask(&self, question: &Question) -> PluginResult<Value> {
        let mut guard = self.io.lock().await;
        let (input, output) = &mut *guard;

        loop {
            output
                .write_all(render(question).as_bytes())
                .await
                .map_err(io_error)?;
            output.flush().await.map_err(io_error)?;

            let mut line = String::new();
            if input.read_line(&mut line).await.map_err(io_error)? == 0 {
                return Err(PluginError::Prompt(format!(
                    "no answer for `{}`: input closed",
                    question.name
                )));
            }

            if let Some(answer) = interpret(question, &line) {
                return Ok(json!({ question.name.as_str(): answer }));
            }
        }
    }
}
