//! Browser session lifecycle.
//!
//! One `BrowserSession` owns one browser process, one context, and exactly one
//! page for the whole run. `open` applies the stealth profile before any site
//! script can run; `close` releases the process on every exit path. A failed
//! persistent-profile launch falls back to an ephemeral context and never
//! propagates past `open`.

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::{emulation, network};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::config::ScoutConfig;
use crate::scraping::{browser_manager, stealth};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no Chromium-family browser found; install Brave, Chrome, or Chromium, or set CHROME_EXECUTABLE")]
    NoBrowser,
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),
    #[error("page setup failed: {0}")]
    PageSetup(String),
}

/// Which context the session ended up bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileKind {
    Ephemeral,
    Persistent(PathBuf),
}

/// Exclusive owner of the browser process and its single page.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    profile: ProfileKind,
}

impl BrowserSession {
    /// Launch a browser per the run configuration and hand back a ready page.
    ///
    /// When `use_persistent_profile` is set, a persistent launch is attempted
    /// first (the profile directory is created if absent); any failure on that
    /// path is logged and downgraded to an ephemeral launch. Only an ephemeral
    /// launch failure is fatal.
    pub async fn open(cfg: &ScoutConfig) -> Result<BrowserSession, SessionError> {
        let exe = browser_manager::find_chrome_executable().ok_or(SessionError::NoBrowser)?;

        let (browser, handler, profile) = if cfg.use_persistent_profile {
            match launch_persistent(&exe, cfg).await {
                Ok((browser, handler)) => {
                    info!("🚀 persistent browser session launched ({})", exe);
                    (
                        browser,
                        handler,
                        ProfileKind::Persistent(cfg.profile_dir.clone()),
                    )
                }
                Err(e) => {
                    warn!(
                        "🔄 persistent profile launch failed ({}); falling back to ephemeral context",
                        e
                    );
                    let (browser, handler) = launch_ephemeral(&exe, cfg).await?;
                    (browser, handler, ProfileKind::Ephemeral)
                }
            }
        } else {
            let (browser, handler) = launch_ephemeral(&exe, cfg).await?;
            (browser, handler, ProfileKind::Ephemeral)
        };

        match setup_page(&browser, cfg).await {
            Ok(page) => Ok(BrowserSession {
                browser,
                page,
                handler,
                profile,
            }),
            Err(e) => {
                // The process must not outlive a failed setup.
                let mut browser = browser;
                if let Err(ce) = browser.close().await {
                    warn!("browser close error during failed setup (non-fatal): {}", ce);
                }
                handler.abort();
                Err(SessionError::PageSetup(e.to_string()))
            }
        }
    }

    /// The session's one page. No other component may create pages.
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn profile(&self) -> &ProfileKind {
        &self.profile
    }

    /// Tear the session down: page first, then the browser process, then the
    /// CDP event task.
    pub async fn close(self) {
        let BrowserSession {
            mut browser,
            page,
            handler,
            ..
        } = self;
        drop(page);
        if let Err(e) = browser.close().await {
            warn!("browser close error (non-fatal): {}", e);
        }
        handler.abort();
        info!("🛑 browser session closed");
    }
}

async fn launch_persistent(exe: &str, cfg: &ScoutConfig) -> Result<(Browser, JoinHandle<()>)> {
    std::fs::create_dir_all(&cfg.profile_dir)
        .map_err(|e| anyhow!("cannot create profile dir {:?}: {}", cfg.profile_dir, e))?;
    let config = browser_manager::build_browser_config(exe, cfg, Some(&cfg.profile_dir))?;
    launch(config).await
}

async fn launch_ephemeral(
    exe: &str,
    cfg: &ScoutConfig,
) -> Result<(Browser, JoinHandle<()>), SessionError> {
    let config = browser_manager::build_browser_config(exe, cfg, None)
        .map_err(|e| SessionError::LaunchFailed(e.to_string()))?;
    let (browser, handler) = launch(config)
        .await
        .map_err(|e| SessionError::LaunchFailed(e.to_string()))?;
    info!("🚀 ephemeral browser session launched ({})", exe);
    Ok((browser, handler))
}

async fn launch(config: BrowserConfig) -> Result<(Browser, JoinHandle<()>)> {
    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| anyhow!("browser launch failed: {}", e))?;

    let handle = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                error!("CDP handler error: {}", e);
            }
        }
    });

    Ok((browser, handle))
}

/// Create the session's page and arm it: stealth patch before any site script,
/// then the header/locale/timezone emulation overrides.
async fn setup_page(browser: &Browser, cfg: &ScoutConfig) -> Result<Page> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| anyhow!("Failed to create page: {}", e))?;

    info!(
        "💉 injecting stealth patch {} (pre-site-script)",
        stealth::STEALTH_SCRIPT_VERSION
    );
    page.execute(
        chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams::new(
            stealth::stealth_init_script(),
        ),
    )
    .await
    .map_err(|e| anyhow!("Failed to inject stealth script: {}", e))?;

    let headers = network::Headers::new(stealth::extra_http_headers(&cfg.accept_language));
    page.execute(network::SetExtraHttpHeadersParams::new(headers))
        .await
        .map_err(|e| anyhow!("Failed to set extra headers: {}", e))?;

    let ua_override = network::SetUserAgentOverrideParams::builder()
        .user_agent(&cfg.user_agent)
        .accept_language(&cfg.accept_language)
        .build()
        .map_err(|e| anyhow!("Failed to build UA override: {}", e))?;
    page.execute(ua_override)
        .await
        .map_err(|e| anyhow!("Failed to apply UA override: {}", e))?;

    page.execute(emulation::SetTimezoneOverrideParams::new(
        cfg.timezone.clone(),
    ))
    .await
    .map_err(|e| anyhow!("Failed to apply timezone override: {}", e))?;

    let locale_override = emulation::SetLocaleOverrideParams::builder()
        .locale(&cfg.locale)
        .build();
    page.execute(locale_override)
        .await
        .map_err(|e| anyhow!("Failed to apply locale override: {}", e))?;

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_read_well_in_logs() {
        let e = SessionError::NoBrowser;
        assert!(e.to_string().contains("CHROME_EXECUTABLE"));
        let e = SessionError::LaunchFailed("spawn: ENOENT".into());
        assert!(e.to_string().contains("spawn: ENOENT"));
    }

    #[test]
    fn profile_kind_remembers_where_the_context_lives() {
        let dir = PathBuf::from("/tmp/profile");
        assert_eq!(
            ProfileKind::Persistent(dir.clone()),
            ProfileKind::Persistent(dir)
        );
        assert_ne!(
            ProfileKind::Ephemeral,
            ProfileKind::Persistent(PathBuf::from("x"))
        );
    }
}
