//! Stealth profile: launch flags, header set, and the page-init patch script.
//!
//! Pure asset provider; no I/O, no browser handles. The session layer feeds
//! these into the launch config and the CDP `AddScriptToEvaluateOnNewDocument`
//! hook so the patch runs before any site script.

use serde_json::json;

/// Process-launch flags that disable sandboxing, GPU compositing, and the
/// Blink automation beacons. Applied to both ephemeral and persistent launches.
pub const STEALTH_LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--disable-gpu",
    "--disable-web-security",
    "--disable-features=VizDisplayCompositor",
    "--disable-blink-features=AutomationControlled",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--disable-crash-reporter",
    "--disable-breakpad",
    "--no-default-browser-check",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Patch-script revision. Bump when the script body changes so saved
/// diagnostics can be matched to the stealth generation that produced them.
pub const STEALTH_SCRIPT_VERSION: &str = "v3";

/// Extra HTTP headers the session applies to every request.
pub fn extra_http_headers(accept_language: &str) -> serde_json::Value {
    json!({ "Accept-Language": accept_language })
}

/// Anti-automation patch, injected before any site script runs.
///
/// Treated as an opaque versioned asset: the session registers it verbatim
/// and nothing else in the crate inspects its contents.
pub fn stealth_init_script() -> &'static str {
    r#"
// ====== GMGN STEALTH PATCH v3 ======
// Runs before any site script (AddScriptToEvaluateOnNewDocument).

// 0. Navigator hardening: webdriver must read as absent, not false
(() => {
    try {
        Object.defineProperty(navigator, 'webdriver', {
            get: () => undefined,
            configurable: true,
        });
    } catch (e) {}
    try {
        Object.defineProperty(navigator, 'plugins', {
            get: () => [1, 2, 3, 4, 5],
            configurable: true,
        });
    } catch (e) {}
    try {
        Object.defineProperty(navigator, 'languages', {
            get: () => ['en-US', 'en', 'zh-CN'],
            configurable: true,
        });
    } catch (e) {}

    // Detectors walk the prototype chain for the original descriptor;
    // re-apply the override wherever it still surfaces.
    const repatch = () => {
        const proto = Object.getPrototypeOf(navigator);
        const desc = Object.getOwnPropertyDescriptor(proto, 'webdriver');
        if (desc) {
            Object.defineProperty(proto, 'webdriver', {
                get: () => undefined,
                configurable: true,
            });
        }
    };
    try { repatch(); } catch (e) {}
})();

// 1. Chrome runtime stub (presence check is all most detectors do)
if (!window.chrome) {
    window.chrome = {};
}
if (!window.chrome.runtime) {
    window.chrome.runtime = {
        connect: function() { return { onDisconnect: { addListener: function() {} } }; },
        sendMessage: function() {},
    };
}

// 2. Driver marker cleanup
delete window.__playwright;
delete window.__puppeteer;
delete window.__selenium;
delete window.callPhantom;
delete window._phantom;
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_args_disable_the_automation_beacons() {
        assert!(STEALTH_LAUNCH_ARGS.contains(&"--no-sandbox"));
        assert!(STEALTH_LAUNCH_ARGS.contains(&"--disable-gpu"));
        assert!(STEALTH_LAUNCH_ARGS.contains(&"--disable-blink-features=AutomationControlled"));
        // No duplicates: chromium tolerates them but the config should not drift.
        let mut sorted: Vec<&str> = STEALTH_LAUNCH_ARGS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), STEALTH_LAUNCH_ARGS.len());
    }

    #[test]
    fn init_script_covers_the_navigator_surface() {
        let script = stealth_init_script();
        assert!(script.contains("'webdriver'"));
        assert!(script.contains("[1, 2, 3, 4, 5]"));
        assert!(script.contains("'en-US', 'en', 'zh-CN'"));
        assert!(script.contains("getOwnPropertyDescriptor"), "prototype re-patch must stay");
        assert!(script.contains(STEALTH_SCRIPT_VERSION));
    }

    #[test]
    fn header_set_carries_accept_language() {
        let headers = extra_http_headers("en-US,en;q=0.9");
        assert_eq!(headers["Accept-Language"], "en-US,en;q=0.9");
    }
}
