//! CommandSpec: a fully rendered tool invocation.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::Backend;

/// The logical effect of a command, independent of flag syntax.
///
/// Tools do not always spell out every effect: `wimlib-imagex unmount`
/// discards by omitting `--commit`. The intent records it either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandIntent {
    Mount,
    Commit,
    Discard,
    ListMounts,
    ListIndexes,
}

/// An executable plus its ordered argument vector.
///
/// Fully determined by a backend and an operation. The only later change is
/// [`CommandSpec::with_program`], which swaps the bare program name for a
/// located executable path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Backend that will interpret the arguments.
    pub backend: Backend,
    /// Executable name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// What the command does.
    pub intent: CommandIntent,
}

impl CommandSpec {
    /// Create a spec running the backend's default program name.
    pub fn new(backend: Backend, intent: CommandIntent) -> Self {
        Self {
            backend,
            program: backend.program().to_string(),
            args: Vec::new(),
            intent,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the program with a located executable.
    pub fn with_program(mut self, path: &Path) -> Self {
        self.program = path.to_string_lossy().into_owned();
        self
    }

    /// Whether the spec names something to execute.
    pub fn is_runnable(&self) -> bool {
        !self.program.trim().is_empty()
    }
}

impl fmt::Display for CommandSpec {
    /// Shell-ish rendering for logs; arguments containing spaces are quoted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_word(f, &self.program)?;
        for arg in &self.args {
            f.write_str(" ")?;
            write_word(f, arg)?;
        }
        Ok(())
    }
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    if word.is_empty() || word.contains(char::is_whitespace) {
        write!(f, "\"{}\"", word)
    } else {
        f.write_str(word)
    }
}
