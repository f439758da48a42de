//! On-demand screenshot and page-text capture.
//!
//! Every other stage calls into here at failure and milestone points. Capture
//! is best-effort by contract: a failed screenshot is logged and the artifact
//! is recorded without a file path, never surfaced as an error to the caller,
//! so a broken capture path cannot mask the failure being documented.

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::core::types::DiagnosticArtifact;

/// Cap on the body-text sample attached to extraction-failure bundles.
pub const BODY_SAMPLE_MAX_CHARS: usize = 1000;

/// Capture sink bound to one screenshot directory for the run.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    screenshot_dir: PathBuf,
}

impl Diagnostics {
    pub fn new(screenshot_dir: impl Into<PathBuf>) -> Self {
        Diagnostics {
            screenshot_dir: screenshot_dir.into(),
        }
    }

    /// Capture a labeled screenshot artifact.
    pub async fn capture(&self, page: &Page, label: &str) -> DiagnosticArtifact {
        let now = chrono::Utc::now();
        let screenshot_path = self
            .write_screenshot(page, label, now.timestamp_millis())
            .await;
        DiagnosticArtifact {
            label: label.to_string(),
            screenshot_path,
            page_text_sample: None,
            captured_at: now.to_rfc3339(),
        }
    }

    /// Capture the full evidence bundle: screenshot plus the first
    /// [`BODY_SAMPLE_MAX_CHARS`] characters of the rendered body text.
    pub async fn capture_bundle(&self, page: &Page, label: &str) -> DiagnosticArtifact {
        let mut artifact = self.capture(page, label).await;
        artifact.page_text_sample = body_text_sample(page, BODY_SAMPLE_MAX_CHARS).await;
        artifact
    }

    async fn write_screenshot(&self, page: &Page, label: &str, ts: i64) -> Option<String> {
        let bytes: Vec<u8> = match page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
        {
            Ok(b) => b,
            Err(e) => {
                warn!("screenshot capture failed ({}): {}", label, e);
                return None;
            }
        };

        if let Err(e) = std::fs::create_dir_all(&self.screenshot_dir) {
            warn!(
                "failed to create screenshot dir {:?}: {}",
                self.screenshot_dir, e
            );
            return None;
        }
        let file = self.screenshot_dir.join(artifact_file_name(ts, label));
        match std::fs::write(&file, &bytes) {
            Ok(()) => {
                debug!("📸 {} → {}", label, file.display());
                Some(file.to_string_lossy().to_string())
            }
            Err(e) => {
                warn!("failed to write screenshot {:?}: {}", file, e);
                None
            }
        }
    }
}

/// Screenshot file name: time-based identifier plus the causal label,
/// slugified so arbitrary rule names stay filesystem-safe.
pub fn artifact_file_name(timestamp_millis: i64, label: &str) -> String {
    let slug: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if slug.is_empty() {
        format!("gmgn_{}.png", timestamp_millis)
    } else {
        format!("gmgn_{}_{}.png", timestamp_millis, slug)
    }
}

/// First `max_chars` characters of `document.body.innerText`, if readable.
pub async fn body_text_sample(page: &Page, max_chars: usize) -> Option<String> {
    let text = page
        .evaluate("document.body ? document.body.innerText : ''")
        .await
        .ok()
        .and_then(|v| v.into_value::<String>().ok())?;
    Some(truncate_chars(&text, max_chars))
}

/// Character-boundary-safe truncation (the sample cap counts characters, not
/// bytes, so CJK market labels survive intact).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_carry_timestamp_and_label() {
        assert_eq!(
            artifact_file_name(1_700_000_000_000, "login-popup-found"),
            "gmgn_1700000000000_login-popup-found.png"
        );
        assert_eq!(artifact_file_name(42, ""), "gmgn_42.png");
    }

    #[test]
    fn artifact_names_slugify_unsafe_labels() {
        assert_eq!(
            artifact_file_name(42, "nav to /bsc/token?x=1"),
            "gmgn_42_nav-to--bsc-token-x-1.png"
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "24h成交量: $1.2M";
        assert_eq!(truncate_chars(text, 5), "24h成交");
        assert_eq!(truncate_chars(text, 500), text);
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn sample_cap_matches_the_bundle_contract() {
        assert_eq!(BODY_SAMPLE_MAX_CHARS, 1000);
        let long: String = "x".repeat(4000);
        assert_eq!(truncate_chars(&long, BODY_SAMPLE_MAX_CHARS).chars().count(), 1000);
    }
}
