use crate::options::ToolchainOptions;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Output format requested from the toolchain binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `--format json`: stdout is parsed into structured data.
    Json,
    /// `--format text`: stdout is kept as lines under a `text` field.
    Text,
}

impl OutputFormat {
    fn flags(self) -> [&'static str; 2] {
        match self {
            OutputFormat::Json => ["--format", "json"],
            OutputFormat::Text => ["--format", "text"],
        }
    }
}

/// Structured outcome of one toolchain invocation.
///
/// Invariants: `status == false` implies a non-empty `reason`; `data` is
/// only meaningful when `status == true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub reason: String,
}

impl ExecutionResult {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            status: true,
            data,
            reason: String::new(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        debug_assert!(!reason.is_empty(), "failed results carry a reason");
        Self {
            status: false,
            data: None,
            reason,
        }
    }
}

/// Fatal failures of the execution layer itself.
///
/// Ordinary toolchain failures (non-zero exit, stderr output) are *not*
/// errors at this level; they come back as `ExecutionResult { status: false }`
/// so the caller can decide whether to prompt for reinstall. `ExecError`
/// covers the cases where no usable result exists at all.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The binary reported success but its structured output did not parse
    /// or did not match the expected shape.
    #[error("{operation}: malformed toolchain output: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Trait for spawning the external binary.
/// This allows us to mock `std::process::Command` in tests.
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    /// Runs `program` with `args` in `cwd`, blocking until it exits.
    ///
    /// The child inherits the caller's environment; stdin is closed.
    fn run(&self, program: &Path, args: &[String], cwd: &Path) -> std::io::Result<Output>;
}

/// Default implementation of [`CommandRunner`] using `std::process::Command`.
#[derive(Debug)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &Path, args: &[String], cwd: &Path) -> std::io::Result<Output> {
        Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
    }
}

/// Handle to one configured toolchain binary.
///
/// Construct it explicitly and inject it wherever toolchain access is
/// needed; there is no process-wide instance. The persistent run flags
/// (config file, logging, verbosity) are derived once from the options and
/// appended to every invocation.
#[derive(Debug)]
pub struct Toolchain {
    options: ToolchainOptions,
    run_arguments: Vec<String>,
    runner: Box<dyn CommandRunner>,
}

impl Toolchain {
    pub fn new(options: ToolchainOptions) -> Self {
        Self::with_runner(options, Box::new(ProcessRunner))
    }

    /// Creates a `Toolchain` with a custom runner (for testing).
    pub fn with_runner(options: ToolchainOptions, runner: Box<dyn CommandRunner>) -> Self {
        let run_arguments = options.run_arguments();
        debug!(
            "toolchain binary {:?}, run arguments {:?}",
            options.binary, run_arguments
        );
        Self {
            options,
            run_arguments,
            runner,
        }
    }

    pub fn options(&self) -> &ToolchainOptions {
        &self.options
    }

    /// Runs one toolchain subcommand and maps its output.
    ///
    /// Fails fast with `status: false` when no binary is resolved, without
    /// spawning anything. Blocks until the child exits; the working
    /// directory is the binary's own directory.
    pub fn execute(
        &self,
        operation: &str,
        args: &[&str],
        format: OutputFormat,
    ) -> Result<ExecutionResult, ExecError> {
        let Some(binary) = self.options.binary.clone() else {
            return Ok(ExecutionResult::failure("toolchain not configured"));
        };

        self.execute_at(&binary, operation, args, format)
    }

    /// Same as [`execute`](Self::execute) but against an explicit binary,
    /// used by the environment assessment to probe a release that is not
    /// the currently resolved one.
    pub(crate) fn execute_at(
        &self,
        binary: &Path,
        operation: &str,
        args: &[&str],
        format: OutputFormat,
    ) -> Result<ExecutionResult, ExecError> {
        let mut params: Vec<String> = Vec::with_capacity(args.len() + self.run_arguments.len() + 3);
        params.push(operation.to_string());
        params.extend(args.iter().filter(|a| !a.is_empty()).map(|a| a.to_string()));
        params.extend(self.run_arguments.iter().cloned());
        params.extend(format.flags().iter().map(|f| f.to_string()));

        debug!("{} {}", binary.display(), params.join(" "));

        let cwd = binary.parent().unwrap_or_else(|| Path::new("."));
        let output = self
            .runner
            .run(binary, &params, cwd)
            .map_err(|source| ExecError::Spawn {
                program: binary.display().to_string(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !stderr.is_empty() || !output.status.success() {
            error!("{} failed: {}", operation, stderr.trim_end());
            let reason = if stderr.is_empty() {
                match output.status.code() {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by signal".to_string(),
                }
            } else {
                stderr.into_owned()
            };
            return Ok(ExecutionResult::failure(reason));
        }

        let data = if stdout.is_empty() {
            None
        } else {
            Some(match format {
                OutputFormat::Json => {
                    serde_json::from_str(&stdout).map_err(|source| ExecError::Decode {
                        operation: operation.to_string(),
                        source,
                    })?
                }
                OutputFormat::Text => json!({ "text": stdout.lines().collect::<Vec<_>>() }),
            })
        };

        Ok(ExecutionResult::success(data))
    }

    /// Asks the given binary for its version string.
    ///
    /// Probe failures degrade to `None`; callers treat that the same as a
    /// version that does not match.
    pub(crate) fn version_of(&self, binary: &Path) -> Option<String> {
        match self.execute_at(binary, "version", &[], OutputFormat::Json) {
            Ok(result) if result.status => result
                .data
                .as_ref()
                .and_then(|d| d.get("VersionString"))
                .and_then(Value::as_str)
                .map(str::to_string),
            Ok(result) => {
                log::warn!("version probe failed: {}", result.reason);
                None
            }
            Err(err) => {
                log::warn!("version probe failed: {}", err);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockRunner;
    use super::*;
    use crate::options::ToolchainOptions;
    use std::path::PathBuf;

    fn toolchain(runner: MockRunner) -> Toolchain {
        let mut options = ToolchainOptions::new("/tmp/project");
        options.binary = Some(PathBuf::from("/opt/toolchain/0.9.0/boardctl"));
        Toolchain::with_runner(options, Box::new(runner))
    }

    #[test]
    fn test_execute_parses_json_stdout() {
        let runner = MockRunner::new(r#"[{"id":"acme:avr"}]"#, "", 0);
        let result = toolchain(runner)
            .execute("core", &["list"], OutputFormat::Json)
            .unwrap();

        assert!(result.status);
        assert!(result.reason.is_empty());
        assert_eq!(result.data.unwrap()[0]["id"], "acme:avr");
    }

    #[test]
    fn test_execute_text_format_splits_lines() {
        let runner = MockRunner::new("Updating index\r\nDone\n", "", 0);
        let result = toolchain(runner)
            .execute("core", &["update-index"], OutputFormat::Text)
            .unwrap();

        assert!(result.status);
        let lines = result.data.unwrap()["text"].clone();
        assert_eq!(lines, serde_json::json!(["Updating index", "Done"]));
    }

    #[test]
    fn test_execute_empty_stdout_has_no_data() {
        let runner = MockRunner::new("", "", 0);
        let result = toolchain(runner)
            .execute("version", &[], OutputFormat::Json)
            .unwrap();

        assert!(result.status);
        assert!(result.data.is_none());
    }

    #[test]
    fn test_stderr_means_failure() {
        let runner = MockRunner::new("", "index out of date\n", 0);
        let result = toolchain(runner)
            .execute("core", &["list"], OutputFormat::Json)
            .unwrap();

        assert!(!result.status);
        assert_eq!(result.reason, "index out of date\n");
        assert!(result.data.is_none());
    }

    #[test]
    fn test_nonzero_exit_with_silent_stderr_still_has_reason() {
        let runner = MockRunner::new("", "", 3);
        let result = toolchain(runner)
            .execute("core", &["list"], OutputFormat::Json)
            .unwrap();

        assert!(!result.status);
        assert_eq!(result.reason, "exited with status 3");
    }

    #[test]
    fn test_unconfigured_toolchain_fails_without_spawning() {
        let options = ToolchainOptions::new("/tmp/project");
        let runner = MockRunner::new("should never run", "", 0);
        let toolchain = Toolchain::with_runner(options, Box::new(runner));

        let result = toolchain
            .execute("core", &["list"], OutputFormat::Json)
            .unwrap();

        assert!(!result.status);
        assert_eq!(result.reason, "toolchain not configured");
    }

    #[test]
    fn test_malformed_json_is_a_decode_error() {
        let runner = MockRunner::new("{ not json", "", 0);
        let err = toolchain(runner)
            .execute("core", &["list"], OutputFormat::Json)
            .unwrap_err();

        assert!(matches!(err, ExecError::Decode { ref operation, .. } if operation == "core"));
    }

    #[test]
    fn test_argument_assembly_filters_empty_and_orders_flags() {
        let mut options = ToolchainOptions::new("/tmp/project");
        options.binary = Some(PathBuf::from("/opt/toolchain/0.9.0/boardctl"));
        options.verbose = true;
        let runner = std::sync::Arc::new(MockRunner::new("", "", 0));
        let toolchain = Toolchain::with_runner(options, Box::new(runner.clone()));

        toolchain
            .execute("core", &["list", "", "--all"], OutputFormat::Json)
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        let args = &calls[0];
        assert_eq!(args[0], "core");
        assert_eq!(args[1], "list");
        assert_eq!(args[2], "--all");
        let config_flag = args.iter().position(|a| a == "--config-file").unwrap();
        assert!(config_flag > 2);
        assert!(args.contains(&"--verbose".to_string()));
        assert_eq!(&args[args.len() - 2..], ["--format", "json"]);
    }
}
