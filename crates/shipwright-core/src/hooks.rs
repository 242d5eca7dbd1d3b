//! User-declared shell hooks around lifecycle phases.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use shipwright_config::HookCommand;
use shipwright_plugin::{ExecOptions, Phase, Shell, ShellCommand};
use tracing::{info, warn};

use crate::{CoreError, CoreResult};

/// Which side of a phase a hook runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPrefix {
    /// Before the phase.
    Before,
    /// After the phase.
    After,
}

impl fmt::Display for HookPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "before",
            Self::After => "after",
        })
    }
}

/// Builds a hook key: `before:init` or `after:git:release`.
#[must_use]
pub fn hook_name(prefix: HookPrefix, namespace: Option<&str>, phase: Phase) -> String {
    match namespace {
        Some(ns) => format!("{prefix}:{ns}:{phase}"),
        None => format!("{prefix}:{phase}"),
    }
}

fn is_known_hook(name: &str) -> bool {
    let parts: Vec<&str> = name.split(':').collect();
    let (prefix, phase) = match parts.as_slice() {
        [prefix, phase] | [prefix, _, phase] => (*prefix, *phase),
        _ => return false,
    };
    matches!(prefix, "before" | "after") && Phase::ALL.iter().any(|p| p.as_str() == phase)
}

/// Runs configured hook commands and records every hook point reached.
pub struct HookRunner {
    hooks: BTreeMap<String, Vec<String>>,
    shell: Arc<dyn Shell>,
    fired: Vec<String>,
}

impl HookRunner {
    /// Creates a runner for the configured hooks.
    pub fn new(hooks: &BTreeMap<String, HookCommand>, shell: Arc<dyn Shell>) -> Self {
        let hooks = hooks
            .iter()
            .map(|(name, command)| {
                if !is_known_hook(name) {
                    warn!(hook = %name, "hook does not match any lifecycle phase");
                }
                let commands = command.commands().into_iter().map(String::from).collect();
                (name.clone(), commands)
            })
            .collect();

        Self {
            hooks,
            shell,
            fired: Vec::new(),
        }
    }

    /// Fires the hook point `name`, running its commands in order.
    ///
    /// Commands are state-changing, so dry runs only log them.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failing command.
    pub async fn run(&mut self, name: &str, context: &Value) -> CoreResult<()> {
        self.fired.push(name.to_string());

        let Some(commands) = self.hooks.get(name) else {
            return Ok(());
        };

        for command in commands {
            info!(hook = %name, %command, "running hook");
            let options = ExecOptions::write().with_context(context.clone());
            let output = self
                .shell
                .exec(&ShellCommand::Line(command.clone()), &options)
                .await
                .map_err(|source| CoreError::Hook {
                    hook: name.to_string(),
                    source,
                })?;
            if !output.is_empty() {
                info!(hook = %name, "{output}");
            }
        }

        Ok(())
    }

    /// Returns the hook points fired so far, in order.
    #[must_use]
    pub fn fired(&self) -> &[String] {
        &self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingShell;
    use serde_json::json;

    #[test]
    fn test_hook_names() {
        insta::assert_snapshot!(
            [
                hook_name(HookPrefix::Before, None, Phase::Init),
                hook_name(HookPrefix::After, Some("git"), Phase::Release),
                hook_name(HookPrefix::Before, Some("npm"), Phase::BeforeBump),
            ]
            .join("\n"),
            @r"
        before:init
        after:git:release
        before:npm:beforeBump
        "
        );
    }

    #[test]
    fn test_known_hooks() {
        assert!(is_known_hook("before:init"));
        assert!(is_known_hook("after:github:release"));
        assert!(!is_known_hook("during:init"));
        assert!(!is_known_hook("before:deploy"));
        assert!(!is_known_hook("before"));
    }

    #[tokio::test]
    async fn test_run_renders_and_records() {
        let shell = Arc::new(RecordingShell::default());
        let mut hooks = BTreeMap::new();
        hooks.insert(
            "after:release".to_string(),
            HookCommand::Many(vec!["echo ${version}".to_string(), "true".to_string()]),
        );

        let mut runner = HookRunner::new(&hooks, shell.clone());
        runner
            .run("after:release", &json!({"version": "1.1.0"}))
            .await
            .unwrap();
        runner.run("after:git:release", &json!({})).await.unwrap();

        assert_eq!(shell.commands(), vec!["echo 1.1.0", "true"]);
        assert_eq!(runner.fired(), ["after:release", "after:git:release"]);
    }

    #[tokio::test]
    async fn test_run_failure_names_hook() {
        let shell = Arc::new(RecordingShell::default().failing("exit 1"));
        let mut hooks = BTreeMap::new();
        hooks.insert(
            "before:init".to_string(),
            HookCommand::One("exit 1".to_string()),
        );

        let mut runner = HookRunner::new(&hooks, shell);
        let err = runner.run("before:init", &json!({})).await.unwrap_err();
        assert!(err.to_string().starts_with("hook `before:init` failed"));
    }
}
