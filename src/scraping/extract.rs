//! Ordered selector-fallback extraction.
//!
//! Each logical field carries a list of selector strategies tried strictly in
//! declared order; the first non-empty trimmed text wins and later strategies
//! are never consulted. A field whose strategies all miss is simply absent.
//! Only a fully empty result is an error, and that error ships with a
//! screenshot + body-text bundle for triage.

use chromiumoxide::Page;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::core::config::ScoutConfig;
use crate::core::types::ExtractionResult;
use crate::scraping::diagnostics::Diagnostics;
use crate::scraping::navigate::POLL_INTERVAL_MS;
use crate::scraping::session::BrowserSession;

/// JSON-encode into a JS string literal. JSON strings are valid JS strings,
/// which also covers the CJK and quoted selectors in the stock catalog.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// One way of locating a field's element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorStrategy {
    /// Plain CSS selector.
    Css(String),
    /// Attribute-substring match, rendered as `[attr*="needle"]`.
    AttrContains { attr: String, needle: String },
    /// Structural XPath query, evaluated in-page via `document.evaluate`.
    XPath(String),
}

impl SelectorStrategy {
    pub fn css(sel: impl Into<String>) -> Self {
        SelectorStrategy::Css(sel.into())
    }

    pub fn attr_contains(attr: impl Into<String>, needle: impl Into<String>) -> Self {
        SelectorStrategy::AttrContains {
            attr: attr.into(),
            needle: needle.into(),
        }
    }

    pub fn xpath(xp: impl Into<String>) -> Self {
        SelectorStrategy::XPath(xp.into())
    }

    /// In-page probe returning the first match's trimmed text, or null.
    pub fn probe_script(&self) -> String {
        match self {
            SelectorStrategy::Css(sel) => css_probe(sel),
            SelectorStrategy::AttrContains { attr, needle } => {
                css_probe(&format!("[{}*=\"{}\"]", attr, needle))
            }
            SelectorStrategy::XPath(xp) => xpath_probe(xp),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SelectorStrategy::Css(sel) => format!("css {:?}", sel),
            SelectorStrategy::AttrContains { attr, needle } => {
                format!("attr [{}*={:?}]", attr, needle)
            }
            SelectorStrategy::XPath(xp) => format!("xpath {:?}", xp),
        }
    }
}

fn css_probe(sel: &str) -> String {
    let sel = js_string(sel);
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return null; \
         const t = (el.textContent || '').trim(); return t.length ? t : null; }})()",
        sel
    )
}

fn xpath_probe(xp: &str) -> String {
    let xp = js_string(xp);
    format!(
        "(() => {{ const r = document.evaluate({}, document, null, \
         XPathResult.FIRST_ORDERED_NODE_TYPE, null); const el = r.singleNodeValue; \
         if (!el) return null; const t = (el.textContent || '').trim(); \
         return t.length ? t : null; }})()",
        xp
    )
}

/// A named logical field plus its fallback cascade. Stateless; re-evaluated
/// per extraction call.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    pub field: String,
    pub strategies: Vec<SelectorStrategy>,
}

impl FieldExtractor {
    pub fn new(field: impl Into<String>, strategies: Vec<SelectorStrategy>) -> Self {
        FieldExtractor {
            field: field.into(),
            strategies,
        }
    }
}

/// Run every extractor against the session's page.
///
/// Reads only: calling this twice on an unchanged page yields the same
/// result. Status: every field matched → `success`; some → `partial`;
/// none → `error` with the evidence bundle attached.
pub async fn extract(
    session: &BrowserSession,
    extractors: &[FieldExtractor],
    cfg: &ScoutConfig,
    diag: &Diagnostics,
) -> ExtractionResult {
    let page = session.page();
    let mut fields = BTreeMap::new();

    for extractor in extractors {
        match first_match(page, extractor, cfg.strategy_timeout_ms).await {
            Some(text) => {
                debug!("field {} ← {:?}", extractor.field, text);
                fields.insert(extractor.field.clone(), text);
            }
            None => {
                debug!(
                    "field {}: all {} strategies missed",
                    extractor.field,
                    extractor.strategies.len()
                );
            }
        }
    }

    if fields.is_empty() {
        let bundle = diag.capture_bundle(page, "extraction-empty").await;
        return ExtractionResult::empty("no fields matched any selector strategy", bundle);
    }
    ExtractionResult::with_fields(fields, extractors.len())
}

/// First strategy, in declared order, yielding non-empty trimmed text.
/// No scoring, no voting: declared order is the tie-break.
async fn first_match(page: &Page, extractor: &FieldExtractor, timeout_ms: u64) -> Option<String> {
    for (idx, strategy) in extractor.strategies.iter().enumerate() {
        if let Some(text) = poll_text(page, &strategy.probe_script(), timeout_ms).await {
            debug!(
                "field {}: strategy #{} ({}) matched",
                extractor.field,
                idx + 1,
                strategy.describe()
            );
            return Some(text);
        }
    }
    None
}

/// Poll one probe until it yields text or the per-strategy timeout passes.
/// Empty text counts as "not yet" since hydrating pages fill nodes late.
async fn poll_text(page: &Page, probe_js: &str, timeout_ms: u64) -> Option<String> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let text = page
            .evaluate(probe_js)
            .await
            .ok()
            .and_then(|v| v.into_value::<Option<String>>().ok())
            .flatten()
            .filter(|t| !t.is_empty());
        if text.is_some() {
            return text;
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes_and_backslashes() {
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
        assert_eq!(js_string(r"a\b"), r#""a\\b""#);
        assert_eq!(js_string(""), "\"\"");
    }

    #[test]
    fn css_probe_embeds_the_selector_and_trims() {
        let probe = SelectorStrategy::css(r#"[data-testid="volume"]"#).probe_script();
        assert!(probe.contains(r#"[data-testid=\"volume\"]"#));
        assert!(probe.contains("querySelector"));
        assert!(probe.contains(".trim()"));
        assert!(probe.contains("t.length ? t : null"), "empty text must read as a miss");
    }

    #[test]
    fn attr_contains_renders_a_substring_selector() {
        let probe = SelectorStrategy::attr_contains("class", "volume").probe_script();
        assert!(probe.contains(r#"[class*=\"volume\"]"#));
    }

    #[test]
    fn xpath_probe_goes_through_document_evaluate() {
        let strategy = SelectorStrategy::xpath(r#"//span[contains(text(), "24h成交量")]"#);
        let probe = strategy.probe_script();
        assert!(probe.contains("document.evaluate"));
        assert!(probe.contains("FIRST_ORDERED_NODE_TYPE"));
        assert!(probe.contains("24h成交量"), "CJK selectors pass through unescaped");
        assert!(probe.contains(r#"\"24h成交量\""#), "inner quotes are JS-escaped");
    }

    #[test]
    fn describe_names_the_strategy_kind() {
        assert!(SelectorStrategy::css(".volume").describe().starts_with("css"));
        assert!(SelectorStrategy::attr_contains("class", "price")
            .describe()
            .starts_with("attr"));
        assert!(SelectorStrategy::xpath("//div").describe().starts_with("xpath"));
    }

    #[test]
    fn extractors_keep_their_declared_cascade() {
        let extractor = FieldExtractor::new(
            "24h_volume",
            vec![
                SelectorStrategy::css(r#"[data-testid="volume"]"#),
                SelectorStrategy::css(".volume"),
                SelectorStrategy::xpath(r#"//span[contains(text(), "24h")]"#),
            ],
        );
        assert_eq!(extractor.field, "24h_volume");
        assert_eq!(extractor.strategies.len(), 3);
        assert!(matches!(extractor.strategies[0], SelectorStrategy::Css(_)));
        assert!(matches!(extractor.strategies[2], SelectorStrategy::XPath(_)));
    }
}
