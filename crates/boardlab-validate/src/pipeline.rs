//! The four-stage validation pipeline.

use crate::diagnostic::{dedup_and_sort, Diagnostic};
use crate::document::ConfigDocument;
use crate::schema;
use boardlab_exec::{split_fqbn, EnvironmentState, Platform};
use boardlab_registry::Release;
use log::debug;

/// Which slice of the platform catalog to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogScope {
    /// Every known platform (`core list --all`).
    All,
    /// Installed platforms only (`core list`).
    Installed,
}

/// Failure of a live data source, reported inside the pipeline as a
/// positioned `E099` diagnostic.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SourceError(pub String);

/// Ordered release registry, most-recent-first.
pub trait ReleaseIndex {
    fn releases(&self) -> Result<Vec<Release>, SourceError>;
}

/// Live platform/board catalog.
pub trait PlatformCatalog {
    fn platforms(&self, scope: CatalogScope) -> Result<Vec<Platform>, SourceError>;
}

/// Probe of the local toolchain installation for a declared release.
pub trait EnvironmentProbe {
    fn assess(&self, declared: &str) -> EnvironmentState;
}

/// Result of one validation run.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub diagnostics: Vec<Diagnostic>,
    /// Environment assessment for the declared release, when the release
    /// exists and a probe is wired. A mismatch is reported here for the
    /// caller's install flow, never as a diagnostic.
    pub environment: Option<EnvironmentState>,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// The release registry could not be consulted at all; the document
    /// cannot be judged against it, so the error propagates instead of
    /// being attached to a field.
    #[error("release registry unavailable: {0}")]
    Registry(String),
}

/// Runs the pipeline against injected data sources.
pub struct Validator<'a> {
    releases: &'a dyn ReleaseIndex,
    catalog: &'a dyn PlatformCatalog,
    environment: Option<&'a dyn EnvironmentProbe>,
    source: String,
}

impl<'a> Validator<'a> {
    pub fn new(
        releases: &'a dyn ReleaseIndex,
        catalog: &'a dyn PlatformCatalog,
        source: &str,
    ) -> Self {
        Self {
            releases,
            catalog,
            environment: None,
            source: source.to_string(),
        }
    }

    pub fn with_environment_probe(mut self, probe: &'a dyn EnvironmentProbe) -> Self {
        self.environment = Some(probe);
        self
    }

    /// Validates a parsed document.
    ///
    /// Stage 1 (schema) failing stops the pipeline. Stage 3 (port) runs
    /// whenever stage 1 passed; stage 4 (board) additionally requires the
    /// declared release to exist (stage 2).
    pub fn validate(&self, doc: &ConfigDocument) -> Result<ValidationOutcome, ValidateError> {
        let mut diagnostics = schema::check(doc, &self.source);
        if !diagnostics.is_empty() {
            debug!("schema stage failed, skipping semantic stages");
            return Ok(ValidationOutcome {
                diagnostics: dedup_and_sort(diagnostics),
                environment: None,
            });
        }

        let version_ok = self.check_cli_version(doc, &mut diagnostics)?;
        let environment = if version_ok {
            let declared = doc.field_str("cliVersion").unwrap_or_default();
            self.environment.map(|probe| probe.assess(declared))
        } else {
            None
        };

        self.check_port(doc, &mut diagnostics);
        if version_ok {
            self.check_board(doc, &mut diagnostics);
        }

        Ok(ValidationOutcome {
            diagnostics: dedup_and_sort(diagnostics),
            environment,
        })
    }

    /// Stage 2: the declared release must exist in the registry.
    fn check_cli_version(
        &self,
        doc: &ConfigDocument,
        out: &mut Vec<Diagnostic>,
    ) -> Result<bool, ValidateError> {
        let releases = self
            .releases
            .releases()
            .map_err(|err| ValidateError::Registry(err.to_string()))?;

        let declared = doc.field_str("cliVersion").unwrap_or_default();
        if releases.iter().any(|release| release.name == declared) {
            return Ok(true);
        }

        let latest = releases.first().map(|release| release.name.as_str());
        out.push(Diagnostic::invalid_cli_version(
            &self.source,
            doc.value_range_or_root("cliVersion"),
            latest,
        ));
        Ok(false)
    }

    /// Stage 3: the port must carry a recognized address prefix.
    fn check_port(&self, doc: &ConfigDocument, out: &mut Vec<Diagnostic>) {
        let Some(port) = doc.field_str("port") else {
            return;
        };
        let port = port.trim();
        if !recognized_port(port) {
            out.push(Diagnostic::invalid_port(
                &self.source,
                doc.value_range_or_root("port"),
                port,
            ));
        }
    }

    /// Stage 4: the fqbn must resolve against the live catalog.
    fn check_board(&self, doc: &ConfigDocument, out: &mut Vec<Diagnostic>) {
        let Some(fqbn) = doc.field_str("board") else {
            return;
        };
        let fqbn = fqbn.trim();
        let range = doc.value_range_or_root("board");

        let Some((platform_id, _)) = split_fqbn(fqbn) else {
            out.push(Diagnostic::invalid_board(
                &self.source,
                range,
                &format!("Malformed FQBN \"{}\".", fqbn),
            ));
            return;
        };

        let all = match self.catalog.platforms(CatalogScope::All) {
            Ok(platforms) => platforms,
            Err(err) => {
                out.push(Diagnostic::toolchain_failure(&self.source, range, &err.0));
                return;
            }
        };
        let Some(platform) = all.iter().find(|p| p.id == platform_id) else {
            out.push(Diagnostic::invalid_board(
                &self.source,
                range,
                &format!("No platform provides \"{}\".", platform_id),
            ));
            return;
        };

        let installed = match self.catalog.platforms(CatalogScope::Installed) {
            Ok(platforms) => platforms,
            Err(err) => {
                out.push(Diagnostic::toolchain_failure(&self.source, range, &err.0));
                return;
            }
        };
        // The installed-only record is the one that knows the installed
        // version; `platform` (from the full catalog) knows the latest.
        let target = installed
            .iter()
            .find(|p| p.id == platform_id)
            .filter(|p| p.is_installed());

        let Some(target) = target else {
            out.push(Diagnostic::platform_not_installed(
                &self.source,
                range,
                &platform_id,
            ));
            return;
        };

        if !platform.boards.iter().any(|board| board.fqbn == fqbn) {
            out.push(Diagnostic::invalid_board(
                &self.source,
                range,
                &format!("\"{}\" names no board in platform \"{}\".", fqbn, platform_id),
            ));
        } else if target.installed != platform.latest {
            out.push(Diagnostic::platform_not_latest(
                &self.source,
                range,
                &target.installed,
                &platform.latest,
            ));
        }
    }
}

#[cfg(windows)]
const PORT_PREFIXES: &[&str] = &["COM"];
#[cfg(not(windows))]
const PORT_PREFIXES: &[&str] = &["/dev/"];

/// True when the trimmed port value starts with a recognized serial
/// address prefix for the host platform (case-insensitive).
fn recognized_port(port: &str) -> bool {
    PORT_PREFIXES.iter().any(|prefix| {
        port.len() >= prefix.len()
            && port.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    })
}
