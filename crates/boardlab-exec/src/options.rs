use crate::config::ProjectConfig;
use log::debug;
use std::path::{Path, PathBuf};

/// Hidden per-project directory holding the configuration document and the
/// command cache.
pub const PROJECT_DIR: &str = ".boardlab";

/// File name of the project configuration document inside [`PROJECT_DIR`].
pub const CONFIG_FILE: &str = "boardlab.json";

/// File name of the toolchain's own YAML configuration, kept beside the
/// project configuration and passed via `--config-file`.
pub const TOOLCHAIN_CONFIG_FILE: &str = "toolchain.yaml";

#[cfg(windows)]
const BINARY_NAME: &str = "boardctl.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "boardctl";

/// Resolved run options for one toolchain instance.
///
/// [`normalize`](Self::normalize) fills the derived paths, loads the project
/// configuration (falling back to the default when the file is missing), and
/// resolves the binary for the configured release.
#[derive(Debug, Clone)]
pub struct ToolchainOptions {
    pub workspace_root: PathBuf,
    /// Expected location of the project configuration document.
    pub config_file: PathBuf,
    /// Per-user directory holding one unpacked binary per release.
    pub toolchain_home: PathBuf,
    pub debug: bool,
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
    /// Resolved toolchain binary, `None` until a matching release is
    /// installed.
    pub binary: Option<PathBuf>,
    pub config: ProjectConfig,
}

impl ToolchainOptions {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let config_file = workspace_root.join(PROJECT_DIR).join(CONFIG_FILE);
        let toolchain_home = dirs::data_dir()
            .unwrap_or_else(|| workspace_root.join(PROJECT_DIR))
            .join("boardlab")
            .join("toolchain");

        Self {
            workspace_root,
            config_file,
            toolchain_home,
            debug: false,
            verbose: false,
            log_file: None,
            binary: None,
            config: ProjectConfig::default(),
        }
    }

    pub fn with_toolchain_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.toolchain_home = home.into();
        self
    }

    pub fn with_config_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.config_file = file.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_log_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(file.into());
        self
    }

    /// Fills derived values: the debug log path, the loaded project
    /// configuration, and the binary resolved for its declared release.
    pub fn normalize(mut self) -> Self {
        if self.debug && self.log_file.is_none() {
            let name = self
                .workspace_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string());
            self.log_file = Some(self.workspace_root.join(format!("toolchain-{}.log", name)));
        }

        self.config = ProjectConfig::load(&self.config_file).unwrap_or_default();

        if !self.config.cli_version.is_empty() {
            self.binary = self.find_executable(&self.config.cli_version);
        }
        debug!(
            "normalized options: config file {:?}, binary {:?}",
            self.config_file, self.binary
        );

        self
    }

    /// Locates the binary unpacked for `release` under the toolchain home.
    pub fn find_executable(&self, release: &str) -> Option<PathBuf> {
        let path = self.toolchain_home.join(release).join(BINARY_NAME);
        path.exists().then_some(path)
    }

    /// Path of the toolchain's own YAML configuration, beside the project
    /// configuration document.
    pub fn toolchain_config_file(&self) -> PathBuf {
        self.config_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(TOOLCHAIN_CONFIG_FILE)
    }

    /// Persistent flags appended to every invocation.
    pub fn run_arguments(&self) -> Vec<String> {
        let mut args = Vec::new();

        args.push("--config-file".to_string());
        args.push(self.toolchain_config_file().to_string_lossy().into_owned());

        if self.debug {
            if let Some(log_file) = &self.log_file {
                args.push("--log-file".to_string());
                args.push(log_file.to_string_lossy().into_owned());
                args.push("--log-level".to_string());
                args.push("debug".to_string());
            }
        }

        if self.verbose {
            args.push("--verbose".to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_derive_config_file_from_root() {
        let options = ToolchainOptions::new("/work/blink");
        assert_eq!(
            options.config_file,
            PathBuf::from("/work/blink/.boardlab/boardlab.json")
        );
        assert!(options.binary.is_none());
    }

    #[test]
    fn test_run_arguments_shape() {
        let options = ToolchainOptions::new("/work/blink")
            .with_debug(true)
            .with_log_file("/work/blink/run.log")
            .with_verbose(true);
        let args = options.run_arguments();

        assert_eq!(args[0], "--config-file");
        assert!(args[1].ends_with(TOOLCHAIN_CONFIG_FILE));
        assert_eq!(args[2], "--log-file");
        assert_eq!(args[4], "--log-level");
        assert_eq!(args[5], "debug");
        assert_eq!(args.last().unwrap(), "--verbose");
    }

    #[test]
    fn test_normalize_names_default_log_file_after_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("blink");
        fs::create_dir_all(&root).unwrap();

        let options = ToolchainOptions::new(&root).with_debug(true).normalize();
        let log_file = options.log_file.unwrap();
        assert!(log_file.to_string_lossy().ends_with("toolchain-blink.log"));
    }

    #[test]
    fn test_normalize_loads_config_and_resolves_binary() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("blink");
        let home = dir.path().join("home");
        fs::create_dir_all(root.join(PROJECT_DIR)).unwrap();
        fs::write(
            root.join(PROJECT_DIR).join(CONFIG_FILE),
            r#"{"schemaVersion":"0.0.1","cliVersion":"0.9.0","board":"acme:avr:nano","port":"/dev/ttyACM0"}"#,
        )
        .unwrap();
        fs::create_dir_all(home.join("0.9.0")).unwrap();
        fs::write(home.join("0.9.0").join(super::BINARY_NAME), "").unwrap();

        let options = ToolchainOptions::new(&root)
            .with_toolchain_home(&home)
            .normalize();

        assert_eq!(options.config.cli_version, "0.9.0");
        assert_eq!(
            options.binary.unwrap(),
            home.join("0.9.0").join(super::BINARY_NAME)
        );
    }

    #[test]
    fn test_normalize_missing_config_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let options = ToolchainOptions::new(dir.path()).normalize();
        assert_eq!(options.config, ProjectConfig::default());
        assert!(options.binary.is_none());
    }
}
