//! Content-gated navigation.
//!
//! `goto` waits for the DOM to be parsed, then for a readiness signal (a
//! visibility condition on page content) rather than a fixed sleep. Load time
//! on these pages is network- and A/B-dependent, so time-based waits either
//! race the DOM or stall the whole batch. No retry happens here; that policy
//! belongs to the caller.

use chromiumoxide::Page;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::ScoutConfig;
use crate::core::types::DiagnosticArtifact;
use crate::scraping::diagnostics::Diagnostics;
use crate::scraping::extract::js_string;
use crate::scraping::session::BrowserSession;

pub(crate) const POLL_INTERVAL_MS: u64 = 250;

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("navigation to {url} failed: {reason}")]
    Unreachable {
        url: String,
        reason: String,
        artifact: DiagnosticArtifact,
    },
    #[error("readiness signal ({signal}) not observed at {url} within {timeout_ms}ms")]
    ReadinessTimeout {
        url: String,
        signal: String,
        timeout_ms: u64,
        artifact: DiagnosticArtifact,
    },
}

impl NavigationError {
    /// The evidence captured at the failure point.
    pub fn artifact(&self) -> &DiagnosticArtifact {
        match self {
            NavigationError::Unreachable { artifact, .. } => artifact,
            NavigationError::ReadinessTimeout { artifact, .. } => artifact,
        }
    }
}

/// Condition that marks the page as actually usable, checked after the DOM
/// parse completes.
#[derive(Debug, Clone)]
pub enum ReadinessSignal {
    /// Visible text anywhere in the rendered body.
    Text(String),
    /// An on-screen element matching a CSS selector.
    Selector(String),
}

impl ReadinessSignal {
    /// In-page probe, evaluating to a boolean.
    pub fn probe_script(&self) -> String {
        match self {
            ReadinessSignal::Text(text) => {
                let needle = js_string(text);
                format!(
                    "!!(document.body && document.body.innerText.includes({}))",
                    needle
                )
            }
            ReadinessSignal::Selector(css) => {
                let sel = js_string(css);
                format!(
                    "(() => {{ const el = document.querySelector({}); return !!(el && el.offsetParent !== null); }})()",
                    sel
                )
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ReadinessSignal::Text(text) => format!("visible text {:?}", text),
            ReadinessSignal::Selector(css) => format!("on-screen selector {:?}", css),
        }
    }
}

/// Drive the session's page to `url` and block until `readiness` holds.
///
/// Failure captures a labeled artifact and surfaces it inside the error; the
/// page is left as-is for the caller to tear down or retry at its own level.
pub async fn goto(
    session: &BrowserSession,
    url: &str,
    readiness: &ReadinessSignal,
    cfg: &ScoutConfig,
    diag: &Diagnostics,
) -> Result<(), NavigationError> {
    let page = session.page();
    info!("🌐 navigating to {}", url);

    if let Err(e) = page.goto(url).await {
        let artifact = diag.capture(page, "navigation-failed").await;
        return Err(NavigationError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
            artifact,
        });
    }

    // DOM-content-loaded gate: readyState leaves "loading" once the parse is done.
    let dom_gate = "['interactive','complete'].includes(document.readyState)";
    if !wait_for(page, dom_gate, cfg.navigation_timeout_ms).await {
        let artifact = diag.capture(page, "navigation-timeout").await;
        return Err(NavigationError::ReadinessTimeout {
            url: url.to_string(),
            signal: "document.readyState".to_string(),
            timeout_ms: cfg.navigation_timeout_ms,
            artifact,
        });
    }

    let probe = readiness.probe_script();
    if !wait_for(page, &probe, cfg.readiness_timeout_ms).await {
        let artifact = diag.capture(page, "readiness-timeout").await;
        return Err(NavigationError::ReadinessTimeout {
            url: url.to_string(),
            signal: readiness.describe(),
            timeout_ms: cfg.readiness_timeout_ms,
            artifact,
        });
    }

    debug!("page ready at {}", url);
    diag.capture(page, "page-ready").await;
    Ok(())
}

/// Poll a boolean in-page probe until it holds or `timeout_ms` elapses.
/// Evaluation errors count as "not yet"; they are transient while the DOM
/// swaps in.
pub(crate) async fn wait_for(page: &Page, probe_js: &str, timeout_ms: u64) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let hit = page
            .evaluate(probe_js)
            .await
            .ok()
            .and_then(|v| v.into_value::<bool>().ok())
            .unwrap_or(false);
        if hit {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_probe_escapes_its_needle() {
        let probe = ReadinessSignal::Text(r#"Log "In""#.to_string()).probe_script();
        assert!(probe.contains(r#""Log \"In\"""#));
        assert!(probe.contains("innerText.includes"));
    }

    #[test]
    fn selector_probe_requires_an_on_screen_match() {
        let probe = ReadinessSignal::Selector("header button#loginBtn".to_string()).probe_script();
        assert!(probe.contains(r#""header button#loginBtn""#));
        assert!(probe.contains("offsetParent"));
    }

    #[test]
    fn descriptions_name_the_signal_kind() {
        assert_eq!(
            ReadinessSignal::Text("Log In".into()).describe(),
            "visible text \"Log In\""
        );
        assert!(ReadinessSignal::Selector(".x".into())
            .describe()
            .starts_with("on-screen selector"));
    }

    #[test]
    fn errors_expose_their_evidence() {
        let artifact = DiagnosticArtifact {
            label: "navigation-timeout".into(),
            screenshot_path: None,
            page_text_sample: None,
            captured_at: chrono::Utc::now().to_rfc3339(),
        };
        let err = NavigationError::ReadinessTimeout {
            url: "https://gmgn.ai/bsc/token/0xdead".into(),
            signal: "visible text \"Log In\"".into(),
            timeout_ms: 5000,
            artifact,
        };
        assert_eq!(err.artifact().label, "navigation-timeout");
        assert!(err.to_string().contains("5000ms"));
    }
}
