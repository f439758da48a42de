//! Browser executable discovery and launch-config building.
//!
//! Single source of truth for:
//! * Finding a usable browser executable (Brave → Chrome → Chromium, cross-platform).
//! * Building the `BrowserConfig` for the two launch modes (ephemeral vs
//!   persistent profile), with the stealth flag set and the configured
//!   viewport/user-agent/proxy applied.
//!
//! Stealth model:
//! - This module covers *process-level* posture (flags, user-agent, proxy).
//! - JS-level patching happens at page setup (see `scraping/stealth.rs` and
//!   `scraping/session.rs`).

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use std::path::Path;

use crate::core::config::{chrome_executable_override, ScoutConfig};
use crate::scraping::stealth::STEALTH_LAUNCH_ARGS;

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan (finds package-manager installs on all platforms)
/// 3. OS-specific well-known install paths.
///
/// Installed Brave/Chrome are preferred over bare Chromium: a real consumer
/// channel carries a more convincing fingerprint for the persistent profile.
pub fn find_chrome_executable() -> Option<String> {
    // 1. Explicit env override
    if let Some(p) = chrome_executable_override() {
        return Some(p);
    }

    // 2. PATH scan (Linux / macOS / Windows package managers)
    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "brave-browser",
            "brave",
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    // 3. Platform-specific well-known paths
    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/brave-browser",
            "/usr/bin/brave",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Returns `true` when a usable browser binary is present on this machine.
pub fn native_browser_available() -> bool {
    find_chrome_executable().is_some()
}

// ── Launch config builders ───────────────────────────────────────────────────

/// Build a `BrowserConfig` from the run configuration.
///
/// `user_data_dir` selects the mode: `Some(dir)` binds the launch to a
/// persistent profile directory, `None` launches an ephemeral context. The
/// stealth flag set, viewport, user-agent, and proxy come from `cfg` either way.
pub fn build_browser_config(
    exe: &str,
    cfg: &ScoutConfig,
    user_data_dir: Option<&Path>,
) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width: cfg.viewport_width,
            height: cfg.viewport_height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(cfg.viewport_width, cfg.viewport_height);

    builder = if cfg.headless {
        // New headless, not the legacy default: legacy renders a detectably
        // different surface than a headed browser.
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    for arg in STEALTH_LAUNCH_ARGS {
        builder = builder.arg(*arg);
    }
    builder = builder.arg(format!("--user-agent={}", cfg.user_agent));

    if let Some(proxy) = cfg.proxy_server.as_deref() {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }

    if let Some(dir) = user_data_dir {
        builder = builder.user_data_dir(dir);
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}
