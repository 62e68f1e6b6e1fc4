//! # BoardLab Validate
//!
//! Validation pipeline for the project configuration document.
//!
//! ## Overview
//!
//! A document is checked in four ordered stages:
//!
//! 1. **Schema conformance** — required fields, types, and the
//!    closed property set, via a JSON schema.
//! 2. **CLI version existence** — the declared toolchain release must
//!    exist in the release registry; when it does, the toolchain
//!    environment is probed for a matching binary.
//! 3. **Port syntax** — the port must carry a recognized serial address
//!    prefix for the host platform.
//! 4. **Board/platform existence** — the fqbn must resolve against the
//!    live platform/board catalog, and the owning platform must be
//!    installed (and ideally at its latest version).
//!
//! A failed schema stage stops the pipeline; the port stage runs even when
//! the version stage flagged the release; the board stage requires stages
//! 1–2 to pass.
//!
//! Every violation becomes a [`Diagnostic`] positioned at the offending
//! field's source range, so an editor can highlight exactly the text the
//! user has to fix. Diagnostics are deduplicated per field and sorted by
//! source position for deterministic output.
//!
//! Live registry/catalog data reaches the pipeline through the
//! [`ReleaseIndex`], [`PlatformCatalog`], and [`EnvironmentProbe`] seams;
//! the request broker wires them to the cache-backed toolchain, tests wire
//! them to fixtures.

pub mod diagnostic;
pub mod document;
pub mod pipeline;
pub mod schema;

pub use diagnostic::{dedup_and_sort, Diagnostic, DiagnosticCode, Position, Range, Severity};
pub use document::{ConfigDocument, DocumentError, Span};
pub use pipeline::{
    CatalogScope, EnvironmentProbe, PlatformCatalog, ReleaseIndex, SourceError, ValidateError,
    ValidationOutcome, Validator,
};
