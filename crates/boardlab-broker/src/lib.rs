//! # BoardLab Broker
//!
//! The fixed named-operation surface callers use to reach the toolchain.
//!
//! ## Overview
//!
//! [`Broker`] owns the injected [`Toolchain`], the [`CommandCache`], and a
//! [`ReleaseSource`], and exposes one async method per named operation:
//! release listing, catalog queries, platform installation, index updates,
//! third-party URL management, and document validation.
//!
//! Every blocking step (child process, registry fetch, cache I/O) runs on
//! the blocking pool via `spawn_blocking`. An optional per-broker timeout
//! bounds how long a caller waits; it does **not** kill the child process,
//! which keeps running to completion on the blocking pool.
//!
//! ## Unwrap rule
//!
//! A toolchain result with `status: false` surfaces as
//! [`BrokerError::Toolchain`] carrying the reason; otherwise the operation
//! returns the data directly, decoded into typed records where a schema
//! exists.
//!
//! ## Sequencing
//!
//! The broker performs no serialization across calls: overlapping mutating
//! operations (say, two concurrent URL additions) are not mutually
//! excluded, and a caller that needs "update index fully before any
//! catalog read" must sequence its awaits itself.

use boardlab_cache::{CacheKey, CommandCache, MAX_AGE_DEFAULT};
use boardlab_exec::{
    decode_platforms, decode_ports, DetectedPort, EnvironmentState, ExecError, ExecutionResult,
    OutputFormat, Platform, Toolchain,
};
use boardlab_registry::{Release, ReleaseSource};
use boardlab_validate::{
    CatalogScope, ConfigDocument, DocumentError, EnvironmentProbe, PlatformCatalog, ReleaseIndex,
    SourceError, ValidateError, ValidationOutcome, Validator,
};
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub use boardlab_validate::{Diagnostic, DiagnosticCode, Severity};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The toolchain ran and reported failure; carries its stderr reason.
    #[error("{0}")]
    Toolchain(String),
    /// The execution layer itself failed (spawn or output decode).
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("release registry unavailable: {0}")]
    Registry(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<ValidateError> for BrokerError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::Registry(reason) => BrokerError::Registry(reason),
        }
    }
}

/// The request broker.
///
/// Cheaply cloneable; all state lives behind `Arc`.
#[derive(Debug, Clone)]
pub struct Broker {
    toolchain: Arc<Toolchain>,
    cache: Arc<CommandCache>,
    releases: Arc<dyn ReleaseSource>,
    timeout: Option<Duration>,
    max_age_days: u64,
}

impl Broker {
    pub fn new(
        toolchain: Toolchain,
        cache: CommandCache,
        releases: Arc<dyn ReleaseSource>,
    ) -> Self {
        Self {
            toolchain: Arc::new(toolchain),
            cache: Arc::new(cache),
            releases,
            timeout: None,
            max_age_days: MAX_AGE_DEFAULT,
        }
    }

    /// Bounds how long any one operation is awaited. The underlying child
    /// process is not killed on expiry; the caller only stops waiting.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the cache freshness window (days).
    pub fn with_max_age_days(mut self, days: u64) -> Self {
        self.max_age_days = days;
        self
    }

    async fn run_blocking<T, F>(&self, task: F) -> Result<T, BrokerError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, BrokerError> + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(task);
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined.map_err(|err| BrokerError::Task(err.to_string()))?,
                Err(_) => Err(BrokerError::Timeout(limit)),
            },
            None => handle
                .await
                .map_err(|err| BrokerError::Task(err.to_string()))?,
        }
    }

    /// Ordered release list, most-recent-first, served from cache inside
    /// the freshness window.
    pub async fn get_releases(&self) -> Result<Vec<Release>, BrokerError> {
        let cache = self.cache.clone();
        let releases = self.releases.clone();
        let max_age = self.max_age_days;
        self.run_blocking(move || fetch_releases(&cache, releases.as_ref(), max_age))
            .await
    }

    /// Platform catalog: `filter` is `"--all"` for the full catalog or
    /// `""` for installed platforms only. Cache-through.
    pub async fn core_list(&self, filter: &str) -> Result<Vec<Platform>, BrokerError> {
        let toolchain = self.toolchain.clone();
        let cache = self.cache.clone();
        let filter = filter.to_string();
        let max_age = self.max_age_days;
        self.run_blocking(move || {
            let result = core_list_cached(&toolchain, &cache, &filter, max_age)?;
            let data = unwrap_result(result)?;
            Ok(decode_platforms("core list", data.as_ref())?)
        })
        .await
    }

    /// Installs `platform_id@version`.
    pub async fn core_install(
        &self,
        platform_id: &str,
        version: &str,
    ) -> Result<Option<Value>, BrokerError> {
        let toolchain = self.toolchain.clone();
        let spec = format!("{}@{}", platform_id, version);
        self.run_blocking(move || {
            let result = toolchain.execute("core", &["install", &spec], OutputFormat::Text)?;
            unwrap_result(result)
        })
        .await
    }

    /// Refreshes the package index. Every cache entry is invalidated
    /// first: all index-derived results go stale the moment the index
    /// changes.
    pub async fn core_update_index(&self) -> Result<Option<Value>, BrokerError> {
        let toolchain = self.toolchain.clone();
        let cache = self.cache.clone();
        self.run_blocking(move || unwrap_result(update_index(&toolchain, &cache)?))
            .await
    }

    /// Registers a third-party package index URL, then refreshes the
    /// index (the new source changes the discoverable platform/board
    /// universe, so the chained update also clears the cache).
    pub async fn config_add_3rd_party_url(&self, url: &str) -> Result<Option<Value>, BrokerError> {
        let toolchain = self.toolchain.clone();
        let cache = self.cache.clone();
        let url = url.to_string();
        self.run_blocking(move || {
            let added = config_url(&toolchain, "add", &url)?;
            let data = unwrap_result(added)?;
            let updated = update_index(&toolchain, &cache)?;
            unwrap_result(updated)?;
            Ok(data)
        })
        .await
    }

    /// Unregisters a third-party package index URL.
    pub async fn config_remove_3rd_party_url(
        &self,
        url: &str,
    ) -> Result<Option<Value>, BrokerError> {
        let toolchain = self.toolchain.clone();
        let url = url.to_string();
        self.run_blocking(move || unwrap_result(config_url(&toolchain, "remove", &url)?))
            .await
    }

    /// Probes whether a URL serves a usable package index by adding it,
    /// refreshing the index, and removing it again. Returns the raw
    /// per-step results uninterpreted; the caller inspects each step.
    pub async fn validate_3rd_party_url(
        &self,
        url: &str,
    ) -> Result<Vec<ExecutionResult>, BrokerError> {
        let toolchain = self.toolchain.clone();
        let cache = self.cache.clone();
        let url = url.to_string();
        self.run_blocking(move || {
            let added = config_url(&toolchain, "add", &url)?;
            let updated = update_index(&toolchain, &cache)?;
            let removed = config_url(&toolchain, "remove", &url)?;
            Ok(vec![added, updated, removed])
        })
        .await
    }

    /// Detected serial ports. Cache-through.
    pub async fn board_list(&self) -> Result<Vec<DetectedPort>, BrokerError> {
        let toolchain = self.toolchain.clone();
        let cache = self.cache.clone();
        let max_age = self.max_age_days;
        self.run_blocking(move || {
            let key = CacheKey::new("board_list", &[]);
            let result = cached_execute(&toolchain, &cache, &key, max_age, |toolchain| {
                toolchain.execute("board", &["list"], OutputFormat::Json)
            })?;
            let data = unwrap_result(result)?;
            Ok(decode_ports("board list", data.as_ref())?)
        })
        .await
    }

    /// Parses and validates a configuration document against the live
    /// registry and catalog, with the environment probe wired in.
    pub async fn check_document(
        &self,
        text: &str,
        source: &str,
    ) -> Result<ValidationOutcome, BrokerError> {
        let toolchain = self.toolchain.clone();
        let cache = self.cache.clone();
        let releases = self.releases.clone();
        let max_age = self.max_age_days;
        let text = text.to_string();
        let source = source.to_string();
        self.run_blocking(move || {
            let document = ConfigDocument::parse(&text)?;
            let release_index = BrokerReleaseIndex {
                cache: &cache,
                source: releases.as_ref(),
                max_age,
            };
            let catalog = BrokerCatalog {
                toolchain: &toolchain,
                cache: &cache,
                max_age,
            };
            let probe = BrokerProbe {
                toolchain: &toolchain,
            };
            let validator = Validator::new(&release_index, &catalog, &source)
                .with_environment_probe(&probe);
            Ok(validator.validate(&document)?)
        })
        .await
    }

    /// Assesses the toolchain environment for a declared release; see
    /// [`EnvironmentState`] for the state machine.
    pub async fn assess_environment(&self, release: &str) -> Result<EnvironmentState, BrokerError> {
        let toolchain = self.toolchain.clone();
        let release = release.to_string();
        self.run_blocking(move || Ok(toolchain.assess_environment(&release)))
            .await
    }
}

fn unwrap_result(result: ExecutionResult) -> Result<Option<Value>, BrokerError> {
    if result.status {
        Ok(result.data)
    } else {
        Err(BrokerError::Toolchain(result.reason))
    }
}

/// Runs `execute` through the cache: a fresh entry short-circuits the
/// child process entirely; a successful fresh result is persisted.
fn cached_execute(
    toolchain: &Toolchain,
    cache: &CommandCache,
    key: &CacheKey,
    max_age: u64,
    execute: impl FnOnce(&Toolchain) -> Result<ExecutionResult, ExecError>,
) -> Result<ExecutionResult, BrokerError> {
    if let Some(value) = cache.load(key, max_age) {
        match serde_json::from_value::<ExecutionResult>(value) {
            Ok(result) => return Ok(result),
            Err(err) => warn!("discarding malformed cache entry: {}", err),
        }
    }

    let result = execute(toolchain)?;
    match serde_json::to_value(&result) {
        Ok(value) => cache.store(key, &value),
        Err(err) => warn!("failed to serialize result for cache: {}", err),
    }
    Ok(result)
}

fn core_list_cached(
    toolchain: &Toolchain,
    cache: &CommandCache,
    filter: &str,
    max_age: u64,
) -> Result<ExecutionResult, BrokerError> {
    let key = CacheKey::new("core_list", &[filter]);
    cached_execute(toolchain, cache, &key, max_age, |toolchain| {
        toolchain.execute("core", &["list", filter], OutputFormat::Json)
    })
}

fn update_index(
    toolchain: &Toolchain,
    cache: &CommandCache,
) -> Result<ExecutionResult, BrokerError> {
    cache.clear();
    Ok(toolchain.execute("core", &["update-index"], OutputFormat::Text)?)
}

fn config_url(
    toolchain: &Toolchain,
    action: &str,
    url: &str,
) -> Result<ExecutionResult, BrokerError> {
    Ok(toolchain.execute(
        "config",
        &[action, "board_manager.additional_urls", url],
        OutputFormat::Text,
    )?)
}

fn fetch_releases(
    cache: &CommandCache,
    source: &dyn ReleaseSource,
    max_age: u64,
) -> Result<Vec<Release>, BrokerError> {
    let key = CacheKey::new("get_releases", &[]);
    if let Some(value) = cache.load(&key, max_age) {
        match serde_json::from_value::<Vec<Release>>(value) {
            Ok(releases) => {
                debug!("serving releases from cache");
                return Ok(releases);
            }
            Err(err) => warn!("discarding malformed release cache entry: {}", err),
        }
    }

    let releases = source
        .releases()
        .map_err(|err| BrokerError::Registry(err.to_string()))?;
    match serde_json::to_value(&releases) {
        Ok(value) => cache.store(&key, &value),
        Err(err) => warn!("failed to serialize releases for cache: {}", err),
    }
    Ok(releases)
}

/// Pipeline adapters bridging the validator's seams to the cache-backed
/// toolchain.
struct BrokerReleaseIndex<'a> {
    cache: &'a CommandCache,
    source: &'a dyn ReleaseSource,
    max_age: u64,
}

impl ReleaseIndex for BrokerReleaseIndex<'_> {
    fn releases(&self) -> Result<Vec<Release>, SourceError> {
        fetch_releases(self.cache, self.source, self.max_age)
            .map_err(|err| SourceError(err.to_string()))
    }
}

struct BrokerCatalog<'a> {
    toolchain: &'a Toolchain,
    cache: &'a CommandCache,
    max_age: u64,
}

impl PlatformCatalog for BrokerCatalog<'_> {
    fn platforms(&self, scope: CatalogScope) -> Result<Vec<Platform>, SourceError> {
        let filter = match scope {
            CatalogScope::All => "--all",
            CatalogScope::Installed => "",
        };
        let result = core_list_cached(self.toolchain, self.cache, filter, self.max_age)
            .map_err(|err| SourceError(err.to_string()))?;
        if !result.status {
            return Err(SourceError(result.reason));
        }
        decode_platforms("core list", result.data.as_ref())
            .map_err(|err| SourceError(err.to_string()))
    }
}

struct BrokerProbe<'a> {
    toolchain: &'a Toolchain,
}

impl EnvironmentProbe for BrokerProbe<'_> {
    fn assess(&self, declared: &str) -> EnvironmentState {
        self.toolchain.assess_environment(declared)
    }
}
