//! Environment assessment for the CLI-version/binary resolution flow.

use crate::executor::{OutputFormat, Toolchain};
use log::{info, warn};

/// Where the toolchain environment stands relative to a declared release.
///
/// There is no automatic retry between states: install actions happen
/// outside this core, and the caller re-assesses afterwards. The expected
/// walk is `Unconfigured` → `BinaryMissing` (configuration written) →
/// `Ready` (release installed), with `Ready` ↔ `VersionMismatch` whenever
/// the document pins a release other than the resolved binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentState {
    /// No configuration document exists at the expected path.
    Unconfigured,
    /// No binary is unpacked for the declared release.
    BinaryMissing { release: String },
    /// The resolved binary reports a version other than the declared one.
    /// `resolved` is empty when the binary would not report a version.
    VersionMismatch { declared: String, resolved: String },
    Ready,
}

impl Toolchain {
    /// Assesses the environment for a declared release.
    ///
    /// Reaching [`EnvironmentState::Ready`] also ensures the toolchain's
    /// own YAML configuration exists beside the project document,
    /// initializing it via `config init` when absent.
    pub fn assess_environment(&self, declared: &str) -> EnvironmentState {
        if !self.options().config_file.exists() {
            return EnvironmentState::Unconfigured;
        }

        let Some(binary) = self.options().find_executable(declared) else {
            return EnvironmentState::BinaryMissing {
                release: declared.to_string(),
            };
        };

        let resolved = self.version_of(&binary).unwrap_or_default();
        if resolved != declared {
            return EnvironmentState::VersionMismatch {
                declared: declared.to_string(),
                resolved,
            };
        }

        let toolchain_config = self.options().toolchain_config_file();
        if !toolchain_config.exists() {
            let dest = toolchain_config.to_string_lossy().into_owned();
            match self.execute_at(
                &binary,
                "config",
                &["init", "--dest-file", &dest],
                OutputFormat::Json,
            ) {
                Ok(result) if result.status => {
                    info!("initialized toolchain configuration at {}", dest)
                }
                Ok(result) => warn!("config init failed: {}", result.reason),
                Err(err) => warn!("config init failed: {}", err),
            }
        }

        EnvironmentState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockRunner;
    use crate::options::ToolchainOptions;
    use std::fs;
    use std::sync::Arc;

    fn version_payload(version: &str) -> String {
        format!(r#"{{"Application":"boardctl","VersionString":"{}"}}"#, version)
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        options: ToolchainOptions,
    }

    fn fixture(with_config: bool, installed_release: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        let home = dir.path().join("home");
        fs::create_dir_all(root.join(".boardlab")).unwrap();

        if with_config {
            fs::write(
                root.join(".boardlab").join("boardlab.json"),
                r#"{"schemaVersion":"0.0.1","cliVersion":"0.9.0","board":"acme:avr:nano","port":"COM3"}"#,
            )
            .unwrap();
        }
        if let Some(release) = installed_release {
            let release_dir = home.join(release);
            fs::create_dir_all(&release_dir).unwrap();
            #[cfg(windows)]
            fs::write(release_dir.join("boardctl.exe"), "").unwrap();
            #[cfg(not(windows))]
            fs::write(release_dir.join("boardctl"), "").unwrap();
        }

        let options = ToolchainOptions::new(&root)
            .with_toolchain_home(&home)
            .normalize();
        Fixture { _dir: dir, options }
    }

    #[test]
    fn test_missing_config_file_is_unconfigured() {
        let fixture = fixture(false, Some("0.9.0"));
        let runner = MockRunner::new(&version_payload("0.9.0"), "", 0);
        let toolchain = Toolchain::with_runner(fixture.options, Box::new(runner));

        assert_eq!(
            toolchain.assess_environment("0.9.0"),
            EnvironmentState::Unconfigured
        );
    }

    #[test]
    fn test_unresolved_binary_is_missing() {
        let fixture = fixture(true, None);
        let runner = MockRunner::new(&version_payload("0.9.0"), "", 0);
        let toolchain = Toolchain::with_runner(fixture.options, Box::new(runner));

        assert_eq!(
            toolchain.assess_environment("0.9.0"),
            EnvironmentState::BinaryMissing {
                release: "0.9.0".to_string()
            }
        );
    }

    #[test]
    fn test_version_disagreement_is_mismatch() {
        let fixture = fixture(true, Some("0.9.0"));
        let runner = MockRunner::new(&version_payload("0.8.1"), "", 0);
        let toolchain = Toolchain::with_runner(fixture.options, Box::new(runner));

        assert_eq!(
            toolchain.assess_environment("0.9.0"),
            EnvironmentState::VersionMismatch {
                declared: "0.9.0".to_string(),
                resolved: "0.8.1".to_string()
            }
        );
    }

    #[test]
    fn test_matching_version_is_ready_and_initializes_config() {
        let fixture = fixture(true, Some("0.9.0"));
        let runner = Arc::new(MockRunner::new(&version_payload("0.9.0"), "", 0));
        let toolchain = Toolchain::with_runner(fixture.options, Box::new(runner.clone()));

        assert_eq!(toolchain.assess_environment("0.9.0"), EnvironmentState::Ready);

        // version probe + config init
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1][0], "config");
        assert_eq!(calls[1][1], "init");
    }

    #[test]
    fn test_failed_version_probe_counts_as_mismatch() {
        let fixture = fixture(true, Some("0.9.0"));
        let runner = MockRunner::new("", "segfault\n", 1);
        let toolchain = Toolchain::with_runner(fixture.options, Box::new(runner));

        assert_eq!(
            toolchain.assess_environment("0.9.0"),
            EnvironmentState::VersionMismatch {
                declared: "0.9.0".to_string(),
                resolved: String::new()
            }
        );
    }
}
