use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (gmgn-scout.json) with env-var overrides
// ---------------------------------------------------------------------------

/// Default user agent: a recent desktop Chrome on macOS, matching the
/// fingerprint the stealth profile advertises elsewhere.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Default `Accept-Language` header, weighted en-US first with zh-CN fallback
/// so the site serves its English shell but keeps CJK market labels resolvable.
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7";

pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_CONFIG_PATH: &str = "GMGN_SCOUT_CONFIG";
pub const ENV_BASE_URL: &str = "GMGN_SCOUT_BASE_URL";
pub const ENV_PROXY: &str = "GMGN_SCOUT_PROXY";
pub const ENV_HEADLESS: &str = "GMGN_SCOUT_HEADLESS";
pub const ENV_PERSISTENT_PROFILE: &str = "GMGN_SCOUT_PERSISTENT_PROFILE";
pub const ENV_PROFILE_DIR: &str = "GMGN_SCOUT_PROFILE_DIR";
pub const ENV_DATA_DIR: &str = "GMGN_SCOUT_DATA_DIR";
pub const ENV_SCREENSHOT_DIR: &str = "GMGN_SCOUT_SCREENSHOT_DIR";

/// Resolved, immutable run configuration. Built once by [`ScoutConfig::load`]
/// (defaults → `gmgn-scout.json` → env vars); never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    /// Site root, e.g. `https://gmgn.ai/`. Target URLs are derived from it.
    pub base_url: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    pub timezone: String,
    pub user_agent: String,
    pub accept_language: String,
    /// Forwarded to the browser as `--proxy-server` when set.
    pub proxy_server: Option<String>,
    pub headless: bool,
    /// Attempt a persistent profile first; ephemeral fallback on any failure.
    pub use_persistent_profile: bool,
    pub profile_dir: PathBuf,
    pub data_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub navigation_timeout_ms: u64,
    pub readiness_timeout_ms: u64,
    pub popup_timeout_ms: u64,
    pub strategy_timeout_ms: u64,
    /// Pause between targets in a batch run (plus a little jitter).
    pub request_delay_ms: u64,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        ScoutConfig {
            base_url: "https://gmgn.ai/".to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            locale: "en-US".to_string(),
            timezone: "Asia/Shanghai".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            proxy_server: None,
            headless: false,
            use_persistent_profile: false,
            profile_dir: default_profile_dir(),
            data_dir: PathBuf::from("data"),
            screenshot_dir: PathBuf::from("screenshots"),
            navigation_timeout_ms: 30_000,
            readiness_timeout_ms: 5_000,
            popup_timeout_ms: 5_000,
            strategy_timeout_ms: 3_000,
            request_delay_ms: 2_000,
        }
    }
}

impl ScoutConfig {
    /// Defaults → `gmgn-scout.json` (if found) → env-var overrides.
    pub fn load() -> Self {
        let mut cfg = ScoutConfig::default();
        apply_file(&mut cfg, &load_file_config());
        apply_env(&mut cfg);
        cfg
    }
}

/// Stable default for the persistent browser profile when none is configured.
fn default_profile_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".gmgn-scout").join("profile"),
        None => PathBuf::from(".gmgn-scout-profile"),
    }
}

/// Raw shape of `gmgn-scout.json`. Every key optional; absent keys keep the
/// built-in defaults.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutFileConfig {
    pub base_url: Option<String>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    /// Explicit `""` disables the proxy even if the env var is set later.
    pub proxy_server: Option<String>,
    pub headless: Option<bool>,
    pub use_persistent_profile: Option<bool>,
    pub profile_dir: Option<String>,
    pub data_dir: Option<String>,
    pub screenshot_dir: Option<String>,
    pub navigation_timeout_ms: Option<u64>,
    pub readiness_timeout_ms: Option<u64>,
    pub popup_timeout_ms: Option<u64>,
    pub strategy_timeout_ms: Option<u64>,
    pub request_delay_ms: Option<u64>,
}

/// Load `gmgn-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `GMGN_SCOUT_CONFIG` env var path
/// 2. `./gmgn-scout.json`
/// 3. `../gmgn-scout.json`
///
/// Missing file → `ScoutFileConfig::default()` (silent).
/// Parse error → log a warning, return `ScoutFileConfig::default()`.
pub fn load_file_config() -> ScoutFileConfig {
    let candidates: Vec<PathBuf> = {
        let mut v = vec![
            PathBuf::from("gmgn-scout.json"),
            PathBuf::from("../gmgn-scout.json"),
        ];
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            v.insert(0, PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<ScoutFileConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("gmgn-scout.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "gmgn-scout.json parse error at {}: {}; using defaults",
                        path.display(),
                        e
                    );
                    return ScoutFileConfig::default();
                }
            },
            Err(_) => continue, // not found at this path, try the next
        }
    }

    ScoutFileConfig::default()
}

fn apply_file(cfg: &mut ScoutConfig, file: &ScoutFileConfig) {
    if let Some(v) = non_empty(&file.base_url) {
        cfg.base_url = v;
    }
    if let Some(v) = file.viewport_width {
        cfg.viewport_width = v;
    }
    if let Some(v) = file.viewport_height {
        cfg.viewport_height = v;
    }
    if let Some(v) = non_empty(&file.locale) {
        cfg.locale = v;
    }
    if let Some(v) = non_empty(&file.timezone) {
        cfg.timezone = v;
    }
    if let Some(v) = non_empty(&file.user_agent) {
        cfg.user_agent = v;
    }
    if let Some(v) = non_empty(&file.accept_language) {
        cfg.accept_language = v;
    }
    if let Some(v) = &file.proxy_server {
        // Present in JSON: empty string clears, anything else sets.
        cfg.proxy_server = Some(v.trim().to_string()).filter(|p| !p.is_empty());
    }
    if let Some(v) = file.headless {
        cfg.headless = v;
    }
    if let Some(v) = file.use_persistent_profile {
        cfg.use_persistent_profile = v;
    }
    if let Some(v) = non_empty(&file.profile_dir) {
        cfg.profile_dir = PathBuf::from(v);
    }
    if let Some(v) = non_empty(&file.data_dir) {
        cfg.data_dir = PathBuf::from(v);
    }
    if let Some(v) = non_empty(&file.screenshot_dir) {
        cfg.screenshot_dir = PathBuf::from(v);
    }
    if let Some(v) = file.navigation_timeout_ms {
        cfg.navigation_timeout_ms = v;
    }
    if let Some(v) = file.readiness_timeout_ms {
        cfg.readiness_timeout_ms = v;
    }
    if let Some(v) = file.popup_timeout_ms {
        cfg.popup_timeout_ms = v;
    }
    if let Some(v) = file.strategy_timeout_ms {
        cfg.strategy_timeout_ms = v;
    }
    if let Some(v) = file.request_delay_ms {
        cfg.request_delay_ms = v;
    }
}

fn apply_env(cfg: &mut ScoutConfig) {
    if let Some(v) = env_string(ENV_BASE_URL) {
        cfg.base_url = v;
    }
    if let Some(v) = env_string(ENV_PROXY) {
        cfg.proxy_server = Some(v);
    }
    if let Some(b) = env_flag(ENV_HEADLESS) {
        cfg.headless = b;
    }
    if let Some(b) = env_flag(ENV_PERSISTENT_PROFILE) {
        cfg.use_persistent_profile = b;
    }
    if let Some(v) = env_string(ENV_PROFILE_DIR) {
        cfg.profile_dir = PathBuf::from(v);
    }
    if let Some(v) = env_string(ENV_DATA_DIR) {
        cfg.data_dir = PathBuf::from(v);
    }
    if let Some(v) = env_string(ENV_SCREENSHOT_DIR) {
        cfg.screenshot_dir = PathBuf::from(v);
    }
}

fn non_empty(field: &Option<String>) -> Option<String> {
    field
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_flag(&v))
}

/// Tolerant boolean parsing for env toggles. Unrecognized values are ignored
/// rather than treated as `false`.
pub fn parse_flag(v: &str) -> Option<bool> {
    let v = v.trim().to_ascii_lowercase();
    if v.is_empty() {
        return None;
    }
    if matches!(v.as_str(), "1" | "true" | "yes" | "on") {
        return Some(true);
    }
    if matches!(v.as_str(), "0" | "false" | "no" | "off" | "disabled") {
        return Some(false);
    }
    None
}

/// Optional override for the Chromium-family browser executable.
///
/// Default behavior is **auto-discovery** (see `scraping::browser_manager::find_chrome_executable()`).
/// This function only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_profile() {
        let cfg = ScoutConfig::default();
        assert_eq!(cfg.base_url, "https://gmgn.ai/");
        assert_eq!((cfg.viewport_width, cfg.viewport_height), (1920, 1080));
        assert_eq!(cfg.locale, "en-US");
        assert_eq!(cfg.timezone, "Asia/Shanghai");
        assert!(cfg.user_agent.contains("Chrome/126"));
        assert!(cfg.accept_language.starts_with("en-US"));
        assert!(cfg.proxy_server.is_none());
        assert!(!cfg.headless);
        assert!(!cfg.use_persistent_profile);
        assert_eq!(cfg.strategy_timeout_ms, 3_000);
        assert_eq!(cfg.popup_timeout_ms, 5_000);
        assert_eq!(cfg.request_delay_ms, 2_000);
    }

    #[test]
    fn parse_flag_accepts_the_usual_spellings() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("disabled"), Some(false));
        assert_eq!(parse_flag(""), None);
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn file_values_override_defaults() {
        let file: ScoutFileConfig = serde_json::from_str(
            r#"{
                "base_url": "https://gmgn.ai/",
                "headless": true,
                "proxy_server": "http://localhost:7890",
                "viewport_width": 1366,
                "strategy_timeout_ms": 1500,
                "screenshot_dir": "shots"
            }"#,
        )
        .unwrap();
        let mut cfg = ScoutConfig::default();
        apply_file(&mut cfg, &file);
        assert!(cfg.headless);
        assert_eq!(cfg.proxy_server.as_deref(), Some("http://localhost:7890"));
        assert_eq!(cfg.viewport_width, 1366);
        assert_eq!(cfg.viewport_height, 1080, "unset keys keep defaults");
        assert_eq!(cfg.strategy_timeout_ms, 1500);
        assert_eq!(cfg.screenshot_dir, PathBuf::from("shots"));
    }

    #[test]
    fn empty_proxy_in_file_clears_it() {
        let mut cfg = ScoutConfig::default();
        cfg.proxy_server = Some("http://localhost:7890".into());
        let file: ScoutFileConfig = serde_json::from_str(r#"{"proxy_server": ""}"#).unwrap();
        apply_file(&mut cfg, &file);
        assert!(cfg.proxy_server.is_none());
    }

    #[test]
    fn blank_strings_in_file_do_not_erase_defaults() {
        let file: ScoutFileConfig =
            serde_json::from_str(r#"{"base_url": "  ", "locale": ""}"#).unwrap();
        let mut cfg = ScoutConfig::default();
        apply_file(&mut cfg, &file);
        assert_eq!(cfg.base_url, "https://gmgn.ai/");
        assert_eq!(cfg.locale, "en-US");
    }
}
