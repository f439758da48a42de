use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ───────────────────────────────────────────────────────────────────────────
// 📸 Diagnostic artifacts
// Captured at failure and milestone points; written once, never mutated.
// ───────────────────────────────────────────────────────────────────────────

/// A captured screenshot and/or truncated page-text snapshot, tied to the
/// moment and cause of capture so a human can triage without re-running.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiagnosticArtifact {
    /// Causal label, e.g. `"login-popup-found"` or `"navigation-timeout"`.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    /// First `BODY_SAMPLE_MAX_CHARS` characters of `document.body.innerText`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_text_sample: Option<String>,
    pub captured_at: String,
}

// ───────────────────────────────────────────────────────────────────────────
// 🎯 Extraction results
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// Every declared field produced a value.
    Success,
    /// At least one field produced a value, but not all of them.
    Partial,
    /// No field produced a value; diagnostics were captured instead.
    Error,
}

impl ExtractionStatus {
    /// Classify a cascade outcome by how many of the declared fields matched.
    pub fn classify(found: usize, declared: usize) -> Self {
        if found == 0 {
            ExtractionStatus::Error
        } else if found < declared {
            ExtractionStatus::Partial
        } else {
            ExtractionStatus::Success
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Success => "success",
            ExtractionStatus::Partial => "partial",
            ExtractionStatus::Error => "error",
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, ExtractionStatus::Success | ExtractionStatus::Partial)
    }
}

/// The unit returned to callers for one page: field → extracted text, an
/// overall status, and (on `error`) the evidence bundle for manual triage.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtractionResult {
    pub fields: BTreeMap<String, String>,
    pub status: ExtractionStatus,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticArtifact>,
}

impl ExtractionResult {
    /// Build a result from a cascade that matched at least one field.
    pub fn with_fields(fields: BTreeMap<String, String>, declared: usize) -> Self {
        debug_assert!(!fields.is_empty(), "empty cascades go through Self::empty");
        let status = ExtractionStatus::classify(fields.len(), declared);
        ExtractionResult {
            fields,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            error: None,
            diagnostics: None,
        }
    }

    /// Build the `error`-status result for a cascade where nothing matched.
    /// Always carries the diagnostic bundle captured at the failure point.
    pub fn empty(error: impl Into<String>, diagnostics: DiagnosticArtifact) -> Self {
        ExtractionResult {
            fields: BTreeMap::new(),
            status: ExtractionStatus::Error,
            timestamp: chrono::Utc::now().to_rfc3339(),
            error: Some(error.into()),
            diagnostics: Some(diagnostics),
        }
    }
}

// ───────────────────────────────────────────────────────────────────────────
// 📦 Batch run records
// One report per requested symbol; the run record is what lands on disk.
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TargetReport {
    pub symbol: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TargetReport {
    /// Report for a target that reached extraction (any status).
    pub fn extracted(symbol: impl Into<String>, result: ExtractionResult, duration_ms: u64) -> Self {
        TargetReport {
            symbol: symbol.into(),
            success: result.status.is_usable(),
            data: Some(result),
            error: None,
            duration_ms,
        }
    }

    /// Report for a target that never reached extraction (navigation failed).
    pub fn failed(symbol: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        TargetReport {
            symbol: symbol.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunRecord {
    pub timestamp: String,
    pub symbols: Vec<String>,
    pub data: Vec<TargetReport>,
}

impl RunRecord {
    pub fn new(symbols: Vec<String>, data: Vec<TargetReport>) -> Self {
        RunRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            symbols,
            data,
        }
    }

    pub fn successful(&self) -> usize {
        self.data.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.data.len() - self.successful()
    }

    /// Exit-code rule: the run counts as a success if at least one target
    /// produced a usable (success or partial) extraction.
    pub fn any_usable(&self) -> bool {
        self.data.iter().any(|r| r.success)
    }
}
