//! Scripted runner for tests and dry wiring.
//!
//! [`ScriptedShell`] never spawns anything. It records every command it is
//! asked to run and answers from per-pattern queues of canned results.

use crate::command::{CallOptions, ShellCommand, ShellResult};
use crate::error::Result;
use crate::runner::ShellRunner;
use std::cell::RefCell;
use std::collections::VecDeque;

struct Rule {
    needle: String,
    responses: VecDeque<ShellResult>,
}

/// A [`ShellRunner`] that replays canned results.
///
/// Rules match when the rendered command contains the rule's needle; the
/// first matching rule wins. Each rule pops its queued results in order and
/// keeps repeating the last one once the queue is down to a single entry.
/// Commands matching no rule get the fallback result (exit code 0, no output).
pub struct ScriptedShell {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<String>>,
    fallback: ShellResult,
}

impl ScriptedShell {
    /// A runner that answers every command with success.
    pub fn new() -> Self {
        Self {
            rules: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            fallback: ShellResult::ok(""),
        }
    }

    /// Replace the result used for commands that match no rule.
    pub fn with_fallback(mut self, result: ShellResult) -> Self {
        self.fallback = result;
        self
    }

    /// Answer commands containing `needle` with `results`, in order.
    pub fn on(self, needle: impl Into<String>, results: impl IntoIterator<Item = ShellResult>) -> Self {
        self.rules.borrow_mut().push(Rule {
            needle: needle.into(),
            responses: results.into_iter().collect(),
        });
        self
    }

    /// Every command run so far, rendered as shell strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// How many recorded commands contain `needle`.
    pub fn count_matching(&self, needle: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.contains(needle)).count()
    }
}

impl Default for ScriptedShell {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner for ScriptedShell {
    fn run(&self, command: &ShellCommand, _opts: &CallOptions) -> Result<ShellResult> {
        let rendered = command.to_string();
        self.calls.borrow_mut().push(rendered.clone());

        let mut rules = self.rules.borrow_mut();
        let Some(rule) = rules.iter_mut().find(|r| rendered.contains(&r.needle)) else {
            return Ok(self.fallback.clone());
        };

        let result = if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            rule.responses.front().cloned()
        };
        Ok(result.unwrap_or_else(|| self.fallback.clone()))
    }
}
