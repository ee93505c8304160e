//! Execution Context
//!
//! The CI run the refresh step executes in: named inputs, outputs visible to
//! later steps, secret masking and log annotations.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::PersistError;

/// Environment variable naming the step output file.
pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Execution context interface.
pub trait ExecutionContext: Send + Sync {
    /// Read a named input. Blank values count as absent.
    fn input(&self, name: &str) -> Option<String>;

    /// Expose a value to later steps of the same run.
    fn set_output(&self, name: &str, value: &str) -> Result<(), PersistError>;

    /// Register a value so the CI log never prints it verbatim.
    fn mask(&self, value: &str);

    /// Emit a warning annotation.
    fn warning(&self, message: &str);

    /// Emit an error annotation.
    fn error(&self, message: &str);
}

/// GitHub Actions execution context.
///
/// Inputs come from `INPUT_<NAME>` variables, outputs are appended to the
/// `$GITHUB_OUTPUT` file, and masks/annotations are workflow commands written
/// to the command sink (stdout by default).
pub struct GitHubActionsContext {
    output_path: Option<PathBuf>,
    commands: Mutex<Box<dyn Write + Send>>,
}

impl GitHubActionsContext {
    /// Create a context from the runner environment.
    pub fn from_env() -> Self {
        Self {
            output_path: std::env::var_os(GITHUB_OUTPUT_ENV).map(PathBuf::from),
            commands: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Write outputs to a specific file.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Write workflow commands somewhere other than stdout.
    pub fn with_command_sink(mut self, sink: impl Write + Send + 'static) -> Self {
        self.commands = Mutex::new(Box::new(sink));
        self
    }

    fn input_var(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }

    fn command(&self, command: &str, message: &str) {
        let mut sink = self.commands.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(sink, "::{}::{}", command, escape_command_data(message))
            .and_then(|_| sink.flush())
        {
            tracing::warn!(command, error = %e, "Failed to write workflow command");
        }
    }
}

/// Escape workflow command data (`%`, CR, LF).
pub fn escape_command_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

impl ExecutionContext for GitHubActionsContext {
    fn input(&self, name: &str) -> Option<String> {
        std::env::var(Self::input_var(name))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn set_output(&self, name: &str, value: &str) -> Result<(), PersistError> {
        let path = self
            .output_path
            .as_ref()
            .ok_or_else(|| PersistError::LocalWrite {
                name: name.to_string(),
                message: format!("{} is not set", GITHUB_OUTPUT_ENV),
            })?;

        let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
        let entry = format!("{name}<<{delimiter}\n{value}\n{delimiter}\n");

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(entry.as_bytes()))
            .map_err(|e| PersistError::LocalWrite {
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    fn mask(&self, value: &str) {
        if !value.is_empty() {
            self.command("add-mask", value);
        }
    }

    fn warning(&self, message: &str) {
        self.command("warning", message);
    }

    fn error(&self, message: &str) {
        self.command("error", message);
    }
}

/// In-memory execution context, for tests and embedding.
#[derive(Default)]
pub struct InMemoryExecutionContext {
    inputs: HashMap<String, String>,
    outputs: Mutex<Vec<(String, String)>>,
    masked: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    fail_outputs: Mutex<bool>,
}

impl InMemoryExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an input value.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Make every `set_output` call fail.
    pub fn set_fail_outputs(&self, fail: bool) -> &Self {
        *self.fail_outputs.lock().unwrap_or_else(|e| e.into_inner()) = fail;
        self
    }

    /// Outputs in write order.
    pub fn get_outputs(&self) -> Vec<(String, String)> {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Latest value written for an output.
    pub fn output(&self, name: &str) -> Option<String> {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn get_masked(&self) -> Vec<String> {
        self.masked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn get_warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn get_errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ExecutionContext for InMemoryExecutionContext {
    fn input(&self, name: &str) -> Option<String> {
        self.inputs
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn set_output(&self, name: &str, value: &str) -> Result<(), PersistError> {
        if *self.fail_outputs.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(PersistError::LocalWrite {
                name: name.to_string(),
                message: "output sink unavailable".to_string(),
            });
        }
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn mask(&self, value: &str) {
        self.masked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(value.to_string());
    }

    fn warning(&self, message: &str) {
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}
