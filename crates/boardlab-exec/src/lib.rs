//! # BoardLab Exec
//!
//! Command execution layer for the external hardware toolchain.
//!
//! ## Overview
//!
//! This crate wraps the `boardctl`-style command-line program that manages
//! hardware platforms, boards, and releases. Every interaction with the
//! external binary goes through [`Toolchain::execute`], which assembles the
//! argument list, spawns the process, and maps its output into a structured
//! [`ExecutionResult`].
//!
//! ## Architecture
//!
//! Process spawning sits behind the [`CommandRunner`] trait so that the
//! whole layer can be exercised without a toolchain installed:
//!
//! - **Production**: [`ProcessRunner`] uses `std::process::Command`
//! - **Testing**: a mock runner returns pre-configured output
//!
//! ```text
//! ┌───────────┐   execute(op, args, fmt)   ┌─────────────────┐
//! │ Toolchain │ ─────────────────────────► │ dyn CommandRunner │
//! └───────────┘ ◄───────────────────────── └─────────────────┘
//!        ExecutionResult / ExecError
//! ```
//!
//! Invocation is blocking for the duration of the child process; no timeout
//! is enforced here. Callers that need to bound the wait do so around this
//! layer (the request broker offers an async facade with an optional
//! timeout).
//!
//! ## Result mapping
//!
//! Non-empty stderr or a non-zero exit yields `status: false` with the
//! captured stderr as `reason`. On success, JSON-formatted stdout is parsed
//! into [`serde_json::Value`]; a parse failure is a distinguishable fatal
//! error ([`ExecError::Decode`]), never silently swallowed. Text-formatted
//! stdout is split into lines under a `text` field.

pub mod catalog;
pub mod config;
pub mod environment;
pub mod executor;
pub mod options;

pub use catalog::{decode_platforms, decode_ports, split_fqbn, Board, DetectedPort, Platform};
pub use config::ProjectConfig;
pub use environment::EnvironmentState;
pub use executor::{
    CommandRunner, ExecError, ExecutionResult, OutputFormat, ProcessRunner, Toolchain,
};
pub use options::ToolchainOptions;
