//! wimm REPL: interactive shell for mounting and inspecting WIM images.
//!
//! The shell drives an [`ImageManager`] on its own tokio runtime. It handles:
//! - Image operations: `mount`, `unmount`, `commit`, `discard`, `mounts`, `indexes`
//! - A trailing `&` to run an operation in the background
//! - Session commands: `tools`, `backend`, `jobs`, `wait`
//! - Meta-commands: `/help`, `/quit`
//! - Command history via rustyline

pub mod format;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use thiserror::Error;
use tokio::runtime::Runtime;

use wimm_kernel::types::{BackendMode, JobResult, Operation, OperationKind};
use wimm_kernel::{ImageManager, JobHandle, ManagerConfig};

/// Returned from [`Repl::process_line`] when the user asked to leave.
#[derive(Debug, Error)]
#[error("exit requested")]
pub struct ExitRequested;

/// Result from meta-command handling.
#[derive(Debug)]
enum MetaResult {
    /// Continue with optional output
    Continue(Option<String>),
    /// Exit the REPL (caller should save history and exit)
    Exit,
}

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// An image operation, run as a job.
    Run(Operation),
    Tools,
    /// Show the mode, or switch to a new one.
    Backend(Option<BackendMode>),
    Jobs,
    /// Wait for background jobs and show their results.
    Wait,
}

impl Command {
    /// Parse a command from its words.
    pub fn parse(words: &[String]) -> Result<Self> {
        let Some((name, args)) = words.split_first() else {
            bail!("empty command");
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let command = match (name.as_str(), args.as_slice()) {
            ("mount", [image, dir]) => Command::Run(Operation::mount(*image, "", *dir)),
            ("mount", [image, dir, index]) => Command::Run(Operation::mount(*image, *index, *dir)),
            ("mount", _) => bail!("usage: mount <image> <dir> [index]"),

            ("unmount", [dir]) | ("commit", [dir]) => Command::Run(Operation::unmount(*dir, true)),
            ("unmount", [dir, "--discard"]) | ("discard", [dir]) => {
                Command::Run(Operation::unmount(*dir, false))
            }
            ("unmount", _) => bail!("usage: unmount <dir> [--discard]"),
            ("commit", _) => bail!("usage: commit <dir>"),
            ("discard", _) => bail!("usage: discard <dir>"),

            ("mounts", []) => Command::Run(Operation::ListMounts),
            ("mounts", _) => bail!("usage: mounts"),
            ("indexes", [image]) => Command::Run(Operation::list_indexes(*image)),
            ("indexes", _) => bail!("usage: indexes <image>"),

            ("tools", []) => Command::Tools,
            ("backend", []) => Command::Backend(None),
            ("backend", [mode]) => Command::Backend(Some(mode.parse()?)),
            ("backend", _) => bail!("usage: backend [auto|dism|wimlib]"),
            ("jobs", []) => Command::Jobs,
            ("wait", []) => Command::Wait,

            (other, _) => bail!("unknown command: {} (type /help)", other),
        };
        Ok(command)
    }
}

/// Split a line into words; single or double quotes group words with spaces.
///
/// Backslashes are literal so Windows paths need no escaping.
pub fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        bail!("unterminated quote");
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Process exit status for a finished job: 0 success, 2 needs elevation,
/// 1 any other failure.
pub fn exit_status(result: &JobResult) -> u8 {
    if result.succeeded {
        0
    } else if result.needs_privilege() {
        2
    } else {
        1
    }
}

/// A job started with a trailing `&`.
struct Background {
    kind: OperationKind,
    handle: JobHandle,
}

/// REPL configuration and state.
pub struct Repl {
    manager: ImageManager,
    runtime: Runtime,
    json: bool,
    background: Vec<Background>,
}

impl Repl {
    /// Create a REPL driving `manager`.
    pub fn new(manager: ImageManager) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;

        Ok(Self {
            manager,
            runtime,
            json: false,
            background: Vec::new(),
        })
    }

    /// Create a REPL with a manager built from `config`.
    pub fn with_config(config: ManagerConfig) -> Result<Self> {
        let manager = ImageManager::new(config).context("Failed to create image manager")?;
        Self::new(manager)
    }

    /// Print results as JSON instead of tables.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn manager(&self) -> &ImageManager {
        &self.manager
    }

    /// Run one operation in the foreground and wait for its result.
    pub fn run_operation(&mut self, operation: &Operation) -> Result<JobResult> {
        let handle = self.runtime.block_on(self.manager.run(operation))?;
        Ok(self.runtime.block_on(handle))
    }

    /// Render a finished job in the current output mode.
    pub fn render(&self, kind: OperationKind, label: &str, result: &JobResult) -> Result<String> {
        if self.json {
            let value = format::job_result_json(kind, label, result);
            return serde_json::to_string_pretty(&value).context("Failed to encode result");
        }
        Ok(format::format_job_result(kind, label, result))
    }

    /// Render tool availability in the current output mode.
    pub fn tools(&self) -> Result<String> {
        let tools = self.manager.detect_tools();
        if self.json {
            return serde_json::to_string_pretty(&format::tools_json(&tools))
                .context("Failed to encode tools");
        }
        Ok(format::format_tools(&tools))
    }

    /// Process a single line of input.
    ///
    /// Returns Ok(None) for empty input, Ok(Some(output)) for output to
    /// display, or Err([`ExitRequested`]) when the REPL should exit.
    pub fn process_line(&mut self, line: &str) -> Result<Option<String>> {
        let trimmed = line.trim();

        if trimmed.starts_with('/') {
            return match self.handle_meta_command(trimmed) {
                MetaResult::Continue(output) => Ok(output),
                MetaResult::Exit => Err(ExitRequested.into()),
            };
        }

        // Skip empty lines and comments
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let (trimmed, background) = match trimmed.strip_suffix('&') {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };

        let words = split_words(trimmed)?;
        match Command::parse(&words)? {
            Command::Run(operation) if background => self.start_background(&operation).map(Some),
            Command::Run(operation) => {
                let result = self.run_operation(&operation)?;
                self.render(operation.kind(), &operation.label(), &result)
                    .map(Some)
            }
            _ if background => bail!("only image operations can run in the background"),
            Command::Tools => self.tools().map(Some),
            Command::Backend(None) => Ok(Some(format!("backend: {}", self.manager.mode()))),
            Command::Backend(Some(mode)) => {
                self.manager.set_mode(mode);
                Ok(Some(format!("backend: {}", mode)))
            }
            Command::Jobs => self.list_jobs().map(Some),
            Command::Wait => self.wait_background().map(Some),
        }
    }

    fn start_background(&mut self, operation: &Operation) -> Result<String> {
        let handle = self.runtime.block_on(self.manager.run(operation))?;
        let line = format!("[{}] started {}", handle.id(), handle.label());
        self.background.push(Background {
            kind: operation.kind(),
            handle,
        });
        Ok(line)
    }

    fn list_jobs(&self) -> Result<String> {
        let jobs = self.runtime.block_on(self.manager.jobs().list());
        if self.json {
            return serde_json::to_string_pretty(&format::jobs_json(&jobs))
                .context("Failed to encode jobs");
        }
        Ok(format::format_jobs(&jobs))
    }

    fn wait_background(&mut self) -> Result<String> {
        if self.background.is_empty() {
            return Ok("(no background jobs)".to_string());
        }

        let mut rendered = Vec::new();
        for job in std::mem::take(&mut self.background) {
            let id = job.handle.id();
            let label = job.handle.label().to_string();
            let result = self.runtime.block_on(job.handle);
            rendered.push(format!("[{}] {}", id, self.render(job.kind, &label, &result)?));
        }
        Ok(rendered.join("\n"))
    }

    /// Handle a meta-command (starts with /).
    fn handle_meta_command(&mut self, cmd: &str) -> MetaResult {
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        let command = parts.first().copied().unwrap_or("");

        match command {
            "/quit" | "/q" | "/exit" => MetaResult::Exit,
            "/help" | "/h" | "/?" => MetaResult::Continue(Some(HELP_TEXT.to_string())),
            _ => MetaResult::Continue(Some(format!(
                "Unknown command: {}\nType /help for available commands.",
                command
            ))),
        }
    }
}

const HELP_TEXT: &str = r#"wimm: WIM image manager

Commands:
  /help, /h, /?     Show this help
  /quit, /q, /exit  Exit the shell

Images:
  mount <image> <dir> [index]   Mount an image (index defaults to 1)
  unmount <dir> [--discard]     Unmount, committing changes unless --discard
  commit <dir>                  Unmount and save changes
  discard <dir>                 Unmount and throw changes away
  mounts                        List mounted images (dism only)
  indexes <image>               List the images inside a container

Session:
  tools                         Show which backends are installed
  backend [auto|dism|wimlib]    Show or change the backend
  jobs                          List jobs
  wait                          Wait for background jobs

Append & to run an image command in the background:
  commit "C:\mnt\win 10" &
"#;

/// Run the interactive shell.
pub fn run(mut repl: Repl) -> Result<()> {
    println!("wimm v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, /quit to exit.");

    let mut rl: Editor<(), DefaultHistory> =
        Editor::new().context("Failed to create editor")?;

    // Load history if it exists
    let history_path = directories::ProjectDirs::from("", "", "wimm")
        .map(|dirs| dirs.data_dir().join("history.txt"));
    if let Some(ref path) = history_path {
        if let Err(e) = rl.load_history(path) {
            // Missing history is expected on first run
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if !is_not_found {
                tracing::warn!("Failed to load history: {}", e);
            }
        }
    }

    println!("{}", repl.tools()?);
    println!();

    loop {
        let prompt = format!("wimm({})> ", repl.manager().mode());

        match rl.readline(&prompt) {
            Ok(line) => {
                if let Err(e) = rl.add_history_entry(line.as_str()) {
                    tracing::warn!("Failed to add history entry: {}", e);
                }

                match repl.process_line(&line) {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) if e.is::<ExitRequested>() => break,
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    save_history(&mut rl, &history_path);
    Ok(())
}

fn save_history(rl: &mut Editor<(), DefaultHistory>, history_path: &Option<PathBuf>) {
    let Some(path) = history_path else {
        return;
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create history directory: {}", e);
            return;
        }
    }
    if let Err(e) = rl.save_history(path) {
        tracing::warn!("Failed to save history: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        split_words(line).unwrap()
    }

    #[test]
    fn split_plain_and_quoted_words() {
        assert_eq!(words("mount a.wim /mnt"), vec!["mount", "a.wim", "/mnt"]);
        assert_eq!(
            words(r#"commit "C:\mnt\win 10""#),
            vec!["commit", r"C:\mnt\win 10"]
        );
        assert_eq!(words("indexes 'my image.wim'"), vec!["indexes", "my image.wim"]);
        assert_eq!(words(r#"mount a.wim /mnt """#), vec!["mount", "a.wim", "/mnt", ""]);
        assert!(words("   ").is_empty());
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(split_words(r#"mount "a.wim"#).is_err());
    }

    #[test]
    fn parse_image_commands() {
        assert_eq!(
            Command::parse(&words("mount a.wim /mnt")).unwrap(),
            Command::Run(Operation::mount("a.wim", "", "/mnt"))
        );
        assert_eq!(
            Command::parse(&words("mount a.wim /mnt 3")).unwrap(),
            Command::Run(Operation::mount("a.wim", "3", "/mnt"))
        );
        assert_eq!(
            Command::parse(&words("unmount /mnt")).unwrap(),
            Command::Run(Operation::unmount("/mnt", true))
        );
        assert_eq!(
            Command::parse(&words("unmount /mnt --discard")).unwrap(),
            Command::Run(Operation::unmount("/mnt", false))
        );
        assert_eq!(
            Command::parse(&words("discard /mnt")).unwrap(),
            Command::Run(Operation::unmount("/mnt", false))
        );
        assert_eq!(
            Command::parse(&words("mounts")).unwrap(),
            Command::Run(Operation::ListMounts)
        );
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(Command::parse(&words("backend")).unwrap(), Command::Backend(None));
        assert_eq!(
            Command::parse(&words("backend wimlib")).unwrap(),
            Command::Backend(Some(BackendMode::Explicit(wimm_kernel::types::Backend::Wimlib)))
        );
        assert!(Command::parse(&words("backend imagex")).is_err());
        assert!(Command::parse(&words("mount a.wim")).is_err());
        assert!(Command::parse(&words("frobnicate")).is_err());
    }

    #[test]
    fn exit_status_codes() {
        assert_eq!(exit_status(&JobResult::from_exit(0, "", &[740])), 0);
        assert_eq!(exit_status(&JobResult::from_exit(740, "", &[740])), 2);
        assert_eq!(exit_status(&JobResult::from_exit(5, "", &[740])), 1);
        assert_eq!(exit_status(&JobResult::launch_failure("nope")), 1);
    }
}
