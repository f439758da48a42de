//! Popup dismissal engine.
//!
//! Interstitials on these pages are probabilistic (A/B tests, session state,
//! geography), so absence is the common case and never an error. Each rule
//! runs its own detect → dismiss machine; no state is shared between rules and
//! no outcome aborts the sequence or the caller.

use chromiumoxide::Page;
use std::time::Duration;
use tracing::debug;

use crate::scraping::diagnostics::Diagnostics;
use crate::scraping::navigate::wait_for;
use crate::scraping::session::BrowserSession;

/// Per-rule machine states. `Unknown` → probe → `Present` or `AbsentOrFailed`;
/// `Present` → dismiss → `Dismissed` or `AbsentOrFailed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopupState {
    Unknown,
    Present,
    Dismissed,
    AbsentOrFailed,
}

fn log_state(rule: &str, state: PopupState) {
    debug!("popup_rule={} state={:?}", rule, state);
}

/// One self-contained detect-and-close routine.
///
/// `probe_js` evaluates to `true` while the popup is on screen. `dismiss_js`
/// performs the close interaction and evaluates to `true` once it clicked
/// something. Rules are read-only and independent of one another.
#[derive(Debug, Clone)]
pub struct DismissalRule {
    pub name: String,
    pub probe_js: String,
    pub dismiss_js: String,
    pub timeout: Duration,
}

impl DismissalRule {
    pub fn new(
        name: impl Into<String>,
        probe_js: impl Into<String>,
        dismiss_js: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        DismissalRule {
            name: name.into(),
            probe_js: probe_js.into(),
            dismiss_js: dismiss_js.into(),
            timeout,
        }
    }
}

/// Trail entry: where one rule's machine ended up.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule: String,
    pub state: PopupState,
}

/// Final state of one rule's machine given what the page did.
pub(crate) fn resolve(detected: bool, clicked: Option<bool>) -> PopupState {
    match (detected, clicked) {
        (false, _) => PopupState::AbsentOrFailed,
        (true, Some(true)) => PopupState::Dismissed,
        (true, _) => PopupState::AbsentOrFailed,
    }
}

/// Run every rule in declared order against the session's page.
///
/// Per rule: bounded detection, `found` snapshot, dismissal, `closed` snapshot;
/// a miss or a throwing action yields an `absent`/`failed` snapshot and the
/// sequence moves on. Always returns the full trail; this function cannot
/// fail.
pub async fn dismiss_all(
    session: &BrowserSession,
    rules: &[DismissalRule],
    diag: &Diagnostics,
) -> Vec<RuleOutcome> {
    let page = session.page();
    let mut trail = Vec::with_capacity(rules.len());

    for rule in rules {
        log_state(&rule.name, PopupState::Unknown);
        let timeout_ms = rule.timeout.as_millis() as u64;

        let detected = wait_for(page, &rule.probe_js, timeout_ms).await;
        if !detected {
            let state = resolve(false, None);
            log_state(&rule.name, state);
            diag.capture(page, &format!("{}-absent", rule.name)).await;
            trail.push(RuleOutcome {
                rule: rule.name.clone(),
                state,
            });
            continue;
        }

        log_state(&rule.name, PopupState::Present);
        diag.capture(page, &format!("{}-found", rule.name)).await;

        let clicked = run_dismiss(page, &rule.dismiss_js).await;
        let state = resolve(true, Some(clicked));
        log_state(&rule.name, state);

        let label = if clicked {
            format!("{}-closed", rule.name)
        } else {
            format!("{}-failed", rule.name)
        };
        diag.capture(page, &label).await;

        trail.push(RuleOutcome {
            rule: rule.name.clone(),
            state,
        });
    }

    trail
}

/// A throwing dismiss script counts as a failed click, nothing more.
async fn run_dismiss(page: &Page, dismiss_js: &str) -> bool {
    page.evaluate(dismiss_js)
        .await
        .ok()
        .and_then(|v| v.into_value::<bool>().ok())
        .unwrap_or(false)
}
