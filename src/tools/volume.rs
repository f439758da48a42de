//! Token market-data collection.
//!
//! The stock readiness signal, dismissal rules, and extractor catalog for
//! gmgn.ai token pages, plus the sequential batch runner that drives one
//! session across all requested targets.

use anyhow::{anyhow, Result};
use rand::distr::{Distribution, Uniform};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::core::config::ScoutConfig;
use crate::core::types::{ExtractionResult, RunRecord, TargetReport};
use crate::scraping::diagnostics::Diagnostics;
use crate::scraping::extract::{extract, FieldExtractor, SelectorStrategy};
use crate::scraping::navigate::{goto, NavigationError, ReadinessSignal};
use crate::scraping::popups::{dismiss_all, DismissalRule};
use crate::scraping::session::{BrowserSession, ProfileKind, SessionError};

// ── Targets ──────────────────────────────────────────────────────────────────

/// A validated `chain/token` target identifier, e.g. `bsc/0xe6df05ce…`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub chain: String,
    pub token: String,
}

impl Target {
    /// Parse `chain/token`. The separator is mandatory and both halves must be
    /// non-empty; anything else is rejected before a browser ever launches.
    pub fn parse(symbol: &str) -> Result<Target> {
        let mut parts = symbol.trim().splitn(2, '/');
        let chain = parts.next().unwrap_or_default().trim();
        let token = parts.next().unwrap_or_default().trim();
        if chain.is_empty() || token.is_empty() {
            return Err(anyhow!(
                "invalid target {:?}: expected chain/token (e.g. bsc/0xe6df05ce…)",
                symbol
            ));
        }
        Ok(Target {
            chain: chain.to_string(),
            token: token.to_string(),
        })
    }
}

/// Token-page URL for a target: `{base_url}{chain}/token/{token}`.
pub fn token_url(base_url: &str, target: &Target) -> Result<String> {
    let mut base = Url::parse(base_url)
        .map_err(|e| anyhow!("invalid base url {:?}: {}", base_url, e))?;
    // A non-slash-terminated path resolves joins against its parent, which
    // would drop the last segment of a path-bearing base.
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    let joined = base
        .join(&format!("{}/token/{}", target.chain, target.token))
        .map_err(|e| anyhow!("cannot build target url for {:?}: {}", target, e))?;
    Ok(joined.to_string())
}

// ── Stock page knowledge ─────────────────────────────────────────────────────

/// Site-shell readiness: the header "Log In" affordance renders on every page
/// once the app shell hydrates.
pub fn site_ready_signal() -> ReadinessSignal {
    ReadinessSignal::Text("Log In".to_string())
}

const LOGIN_POPUP_PROBE_JS: &str = r#"
(() => {
    const el = document.querySelector('input[placeholder="Enter Email"]');
    return !!(el && el.offsetParent !== null);
})()
"#;

// The close icon lives in the dialog header; svg needs a dispatched event.
const LOGIN_POPUP_DISMISS_JS: &str = r#"
(() => {
    const anchor = document.querySelector('input[placeholder="Enter Email"]');
    if (!anchor) return false;
    const dialog = anchor.closest('[role="dialog"]');
    if (!dialog) return false;
    const close = dialog.querySelector('header > div > svg');
    if (!close) return false;
    close.dispatchEvent(new MouseEvent('click', { bubbles: true }));
    return true;
})()
"#;

const INTRO_POPUP_PROBE_JS: &str = r#"
(() => {
    const spans = document.querySelectorAll('div.pi-modal span');
    for (const s of spans) {
        if ((s.textContent || '').includes('Next') && s.offsetParent !== null) return true;
    }
    return false;
})()
"#;

// Clicking the mask overlay closes the tour without walking its steps.
const INTRO_POPUP_DISMISS_JS: &str = r#"
(() => {
    const spans = document.querySelectorAll('div.pi-modal span');
    let anchor = null;
    for (const s of spans) {
        if ((s.textContent || '').includes('Next')) { anchor = s; break; }
    }
    if (!anchor) return false;
    const mask = anchor.closest('div[class*="pi-modal-mask"]');
    if (!mask) return false;
    mask.dispatchEvent(new MouseEvent('click', { bubbles: true }));
    return true;
})()
"#;

/// The interstitials seen on token pages, in the order they stack: the login
/// modal first, then the intro tour.
pub fn dismissal_rules(popup_timeout_ms: u64) -> Vec<DismissalRule> {
    let timeout = Duration::from_millis(popup_timeout_ms);
    vec![
        DismissalRule::new(
            "login-popup",
            LOGIN_POPUP_PROBE_JS,
            LOGIN_POPUP_DISMISS_JS,
            timeout,
        ),
        DismissalRule::new(
            "intro-popup",
            INTRO_POPUP_PROBE_JS,
            INTRO_POPUP_DISMISS_JS,
            timeout,
        ),
    ]
}

/// The stock extractor catalog. Declared order is binding: stable test ids
/// first, site classes next, attribute substrings, then the structural XPath
/// fallbacks (including the CJK labels the site ships for zh locales).
pub fn field_extractors() -> Vec<FieldExtractor> {
    vec![
        FieldExtractor::new(
            "24h_volume",
            vec![
                SelectorStrategy::css(r#"[data-testid="volume"]"#),
                SelectorStrategy::css(".volume"),
                SelectorStrategy::css(".trading-volume"),
                SelectorStrategy::attr_contains("class", "volume"),
                SelectorStrategy::xpath(r#"//div[contains(@class, "volume")]"#),
                SelectorStrategy::xpath(r#"//span[contains(text(), "24h成交量")]"#),
                SelectorStrategy::xpath(r#"//div[contains(text(), "24h成交量")]"#),
            ],
        ),
        FieldExtractor::new(
            "current_price",
            vec![
                SelectorStrategy::css(r#"[data-testid="price"]"#),
                SelectorStrategy::css(".price"),
                SelectorStrategy::css(".current-price"),
                SelectorStrategy::attr_contains("class", "price"),
                SelectorStrategy::xpath(r#"//div[contains(@class, "price")]"#),
            ],
        ),
        FieldExtractor::new(
            "24h_change",
            vec![
                SelectorStrategy::css(r#"[data-testid="change"]"#),
                SelectorStrategy::css(".change"),
                SelectorStrategy::css(".price-change"),
                SelectorStrategy::attr_contains("class", "change"),
                SelectorStrategy::xpath(r#"//div[contains(@class, "change")]"#),
            ],
        ),
    ]
}

// ── Collection ───────────────────────────────────────────────────────────────

/// Drive one target page end to end: navigate, clear interstitials, extract.
pub async fn collect_symbol(
    session: &BrowserSession,
    cfg: &ScoutConfig,
    diag: &Diagnostics,
    url: &str,
) -> Result<ExtractionResult, NavigationError> {
    goto(session, url, &site_ready_signal(), cfg, diag).await?;

    let trail = dismiss_all(session, &dismissal_rules(cfg.popup_timeout_ms), diag).await;
    for outcome in &trail {
        debug!("popup {} → {:?}", outcome.rule, outcome.state);
    }

    Ok(extract(session, &field_extractors(), cfg, diag).await)
}

/// Open one session, walk the targets sequentially with a polite delay, close
/// the session on every exit path, and return the run record.
///
/// A navigation failure marks its target failed and the batch moves on; only
/// session establishment can fail the whole run.
pub async fn collect_batch(cfg: &ScoutConfig, symbols: &[String]) -> Result<RunRecord, SessionError> {
    let start = Instant::now();
    info!("starting batch of {} target(s)", symbols.len());

    let session = BrowserSession::open(cfg).await?;
    match session.profile() {
        ProfileKind::Persistent(dir) => debug!("batch context: persistent ({})", dir.display()),
        ProfileKind::Ephemeral => debug!("batch context: ephemeral"),
    }
    let diag = Diagnostics::new(cfg.screenshot_dir.clone());

    let mut reports = Vec::with_capacity(symbols.len());
    for (i, symbol) in symbols.iter().enumerate() {
        if i > 0 {
            let delay = inter_request_delay(cfg.request_delay_ms);
            debug!("⏳ waiting {:?} before next target", delay);
            tokio::time::sleep(delay).await;
        }
        reports.push(collect_one(&session, cfg, &diag, symbol).await);
    }

    session.close().await;

    let record = RunRecord::new(symbols.to_vec(), reports);
    info!(
        "batch finished: {}/{} usable, {} failed, {}ms total",
        record.successful(),
        symbols.len(),
        record.failed(),
        start.elapsed().as_millis()
    );
    Ok(record)
}

async fn collect_one(
    session: &BrowserSession,
    cfg: &ScoutConfig,
    diag: &Diagnostics,
    symbol: &str,
) -> TargetReport {
    let started = Instant::now();
    info!("📊 collecting {}", symbol);

    let target = match Target::parse(symbol) {
        Ok(t) => t,
        Err(e) => {
            warn!("❌ {}: {}", symbol, e);
            return TargetReport::failed(symbol, e.to_string(), elapsed_ms(started));
        }
    };
    let url = match token_url(&cfg.base_url, &target) {
        Ok(u) => u,
        Err(e) => {
            warn!("❌ {}: {}", symbol, e);
            return TargetReport::failed(symbol, e.to_string(), elapsed_ms(started));
        }
    };

    match collect_symbol(session, cfg, diag, &url).await {
        Ok(result) => {
            info!(
                "✅ {} → status={} fields={}",
                symbol,
                result.status.as_str(),
                result.fields.len()
            );
            TargetReport::extracted(symbol, result, elapsed_ms(started))
        }
        Err(e) => {
            warn!("❌ {} navigation failed: {}", symbol, e);
            TargetReport::failed(symbol, e.to_string(), elapsed_ms(started))
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Base delay plus up to 500ms of jitter so batch targets never land with a
/// fixed cadence.
fn inter_request_delay(base_ms: u64) -> Duration {
    let jitter = {
        let mut rng = rand::rng();
        Uniform::new(0u64, 500).unwrap().sample(&mut rng)
    };
    Duration::from_millis(base_ms + jitter)
}

// ── Persistence ──────────────────────────────────────────────────────────────

/// Write the run record under the data dir as `gmgn_data_{YYYYMMDD_HHMMSS}.json`.
pub fn save_run_record(cfg: &ScoutConfig, record: &RunRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(&cfg.data_dir)
        .map_err(|e| anyhow!("cannot create data dir {:?}: {}", cfg.data_dir, e))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = cfg.data_dir.join(format!("gmgn_data_{}.json", stamp));
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(&path, json)
        .map_err(|e| anyhow!("cannot write run record to {:?}: {}", path, e))?;
    info!("💾 run record saved to {}", path.display());
    Ok(path)
}
