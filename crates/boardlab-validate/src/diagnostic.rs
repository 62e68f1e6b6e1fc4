use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// Zero-based line/character position in the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// Half-open source range, `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Self {
        Self {
            start: Position {
                line: start_line,
                character: start_character,
            },
            end: Position {
                line: end_line,
                character: end_character,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Information,
}

/// The fixed set of diagnostic codes the pipeline can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// E001: declared CLI version is absent from the release registry.
    InvalidCliVersion,
    /// E002: fqbn names no known board.
    InvalidBoard,
    /// E003: requested platform version does not exist.
    InvalidPlatformVersion,
    /// E004: port value carries no recognized address prefix.
    InvalidPort,
    /// E005: document violates the structural schema.
    InvalidContent,
    /// E031: the board's platform is known but not installed.
    PlatformNotInstalled,
    /// E099: the toolchain invocation itself failed.
    ToolchainFailure,
    /// I001: platform installed, but not at its latest version.
    PlatformNotLatest,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::InvalidCliVersion => "E001",
            DiagnosticCode::InvalidBoard => "E002",
            DiagnosticCode::InvalidPlatformVersion => "E003",
            DiagnosticCode::InvalidPort => "E004",
            DiagnosticCode::InvalidContent => "E005",
            DiagnosticCode::PlatformNotInstalled => "E031",
            DiagnosticCode::ToolchainFailure => "E099",
            DiagnosticCode::PlatformNotLatest => "I001",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            DiagnosticCode::PlatformNotLatest => Severity::Information,
            _ => Severity::Error,
        }
    }
}

impl Serialize for DiagnosticCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One positioned finding attached to the configuration document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// The document the finding belongs to.
    pub source: String,
    /// Auxiliary payload for caller-driven quick fixes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Diagnostic {
    fn new(
        code: DiagnosticCode,
        message: String,
        source: &str,
        range: Range,
        data: Option<Value>,
    ) -> Self {
        Self {
            range,
            severity: code.severity(),
            code,
            message,
            source: source.to_string(),
            data,
        }
    }

    /// E001, carrying the most recent known release name for a quick fix.
    pub fn invalid_cli_version(source: &str, range: Range, latest: Option<&str>) -> Self {
        Self::new(
            DiagnosticCode::InvalidCliVersion,
            "Invalid or unsupported toolchain version.".to_string(),
            source,
            range,
            latest.map(|name| json!(name)),
        )
    }

    pub fn invalid_board(source: &str, range: Range, reason: &str) -> Self {
        Self::new(
            DiagnosticCode::InvalidBoard,
            format!("Invalid board. {}", reason),
            source,
            range,
            None,
        )
    }

    /// E003, carrying the versions that do exist.
    pub fn invalid_platform_version(source: &str, range: Range, versions: &[String]) -> Self {
        Self::new(
            DiagnosticCode::InvalidPlatformVersion,
            "Invalid platform version.".to_string(),
            source,
            range,
            Some(json!(versions)),
        )
    }

    /// E004, carrying the trimmed port value.
    pub fn invalid_port(source: &str, range: Range, port: &str) -> Self {
        Self::new(
            DiagnosticCode::InvalidPort,
            format!("Unrecognized port address \"{}\".", port),
            source,
            range,
            Some(json!(port)),
        )
    }

    pub fn invalid_content(source: &str, range: Range, message: String) -> Self {
        Self::new(DiagnosticCode::InvalidContent, message, source, range, None)
    }

    pub fn platform_not_installed(source: &str, range: Range, platform_id: &str) -> Self {
        Self::new(
            DiagnosticCode::PlatformNotInstalled,
            format!("Platform \"{}\" is not installed.", platform_id),
            source,
            range,
            None,
        )
    }

    pub fn toolchain_failure(source: &str, range: Range, reason: &str) -> Self {
        Self::new(
            DiagnosticCode::ToolchainFailure,
            format!("Toolchain execution failed: {}", reason),
            source,
            range,
            None,
        )
    }

    /// I001, carrying both version strings.
    pub fn platform_not_latest(source: &str, range: Range, installed: &str, latest: &str) -> Self {
        Self::new(
            DiagnosticCode::PlatformNotLatest,
            format!("Installed: {} Latest: {}", installed, latest),
            source,
            range,
            Some(json!({ "installed": installed, "latest": latest })),
        )
    }
}

/// Deduplicates per (code, start position) and sorts by ascending source
/// position. Required for stable test assertions and editor-side
/// highlighting order.
pub fn dedup_and_sort(mut diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then_with(|| a.code.as_str().cmp(b.code.as_str()))
    });
    diagnostics.dedup_by(|a, b| a.code == b.code && a.range.start == b.range.start);
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_the_fixed_enumeration() {
        let all = [
            (DiagnosticCode::InvalidCliVersion, "E001"),
            (DiagnosticCode::InvalidBoard, "E002"),
            (DiagnosticCode::InvalidPlatformVersion, "E003"),
            (DiagnosticCode::InvalidPort, "E004"),
            (DiagnosticCode::InvalidContent, "E005"),
            (DiagnosticCode::PlatformNotInstalled, "E031"),
            (DiagnosticCode::ToolchainFailure, "E099"),
            (DiagnosticCode::PlatformNotLatest, "I001"),
        ];
        for (code, text) in all {
            assert_eq!(code.as_str(), text);
        }
        assert_eq!(
            DiagnosticCode::PlatformNotLatest.severity(),
            Severity::Information
        );
        assert_eq!(DiagnosticCode::InvalidPort.severity(), Severity::Error);
    }

    #[test]
    fn test_serializes_code_as_string() {
        let diag = Diagnostic::invalid_cli_version(
            "boardlab.json",
            Range::new(2, 17, 2, 24),
            Some("0.9.0"),
        );
        let value = serde_json::to_value(&diag).unwrap();

        assert_eq!(value["code"], "E001");
        assert_eq!(value["severity"], "Error");
        assert_eq!(value["data"], "0.9.0");
        assert_eq!(value["range"]["start"]["line"], 2);
    }

    #[test]
    fn test_dedup_and_sort_is_deterministic() {
        let source = "boardlab.json";
        let later = Diagnostic::invalid_port(source, Range::new(4, 10, 4, 16), "???");
        let earlier = Diagnostic::invalid_cli_version(source, Range::new(2, 17, 2, 24), None);
        let duplicate = Diagnostic::invalid_port(source, Range::new(4, 10, 4, 16), "???");

        let out = dedup_and_sort(vec![later.clone(), earlier.clone(), duplicate]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], earlier);
        assert_eq!(out[1], later);
    }
}
