/// Live Site Tests: the real pipeline against real pages
/// Needs a local Chromium-family browser, so every test here is opt-in
use gmgn_scout::scraping::browser_manager::native_browser_available;
use gmgn_scout::scraping::diagnostics::Diagnostics;
use gmgn_scout::scraping::navigate::{goto, ReadinessSignal};
use gmgn_scout::scraping::popups::{dismiss_all, PopupState};
use gmgn_scout::scraping::session::{BrowserSession, ProfileKind};
use gmgn_scout::tools::volume;
use gmgn_scout::ScoutConfig;

// Initialize logging for tests
fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

// Headless run with all outputs redirected to a scratch dir
fn live_config() -> ScoutConfig {
    let mut cfg = ScoutConfig::load();
    cfg.headless = true;
    let scratch = std::env::temp_dir().join("gmgn-scout-live");
    cfg.data_dir = scratch.join("data");
    cfg.screenshot_dir = scratch.join("screenshots");
    cfg
}

#[tokio::test]
#[ignore] // Run with: cargo test --test live_site_test -- --ignored --nocapture
async fn live_1_session_opens_and_masks_automation() {
    init_logger();
    if !native_browser_available() {
        println!("⚠️  SKIP: no Chromium-family browser on this machine");
        return;
    }
    let cfg = live_config();

    println!("\n🎯 LIVE 1: Session Stealth");
    println!("Challenge: navigator must look human after the init patch");

    let session = match BrowserSession::open(&cfg).await {
        Ok(s) => s,
        Err(e) => panic!("❌ FAIL: session did not open: {}", e),
    };
    let diag = Diagnostics::new(cfg.screenshot_dir.clone());

    // The init script arms on navigation, so leave about:blank first.
    let ready = ReadinessSignal::Text("Example Domain".to_string());
    if let Err(e) = goto(&session, "https://example.com/", &ready, &cfg, &diag).await {
        session.close().await;
        panic!("❌ FAIL: could not reach example.com: {}", e);
    }

    let page = session.page();
    let webdriver = page
        .evaluate("typeof navigator.webdriver")
        .await
        .ok()
        .and_then(|v| v.into_value::<String>().ok())
        .unwrap_or_else(|| "probe-failed".to_string());
    let plugins = page
        .evaluate("navigator.plugins.length")
        .await
        .ok()
        .and_then(|v| v.into_value::<u32>().ok())
        .unwrap_or(0);
    let languages = page
        .evaluate("(navigator.languages || []).join(',')")
        .await
        .ok()
        .and_then(|v| v.into_value::<String>().ok())
        .unwrap_or_default();

    println!("🤖 typeof navigator.webdriver: {}", webdriver);
    println!("🔌 navigator.plugins.length: {}", plugins);
    println!("🌐 navigator.languages: {}", languages);

    session.close().await;

    assert_eq!(webdriver, "undefined", "❌ FAIL: webdriver still visible");
    assert!(plugins > 0, "❌ FAIL: plugin list is empty");
    assert!(languages.contains("en"), "❌ FAIL: languages not patched");
}

#[tokio::test]
#[ignore] // Run with: cargo test --test live_site_test -- --ignored --nocapture
async fn live_2_token_page_collection() {
    init_logger();
    if !native_browser_available() {
        println!("⚠️  SKIP: no Chromium-family browser on this machine");
        return;
    }
    let cfg = live_config();
    let symbols = vec!["bsc/0xe6df05ce8c8301223373cf5b969afcb1498c5528".to_string()];

    println!("\n🎯 LIVE 2: Token Page Collection");
    println!("Target: {}", symbols[0]);
    println!("Challenge: shell readiness, interstitials, then the field cascade");

    let record = match volume::collect_batch(&cfg, &symbols).await {
        Ok(r) => r,
        Err(e) => panic!("❌ FAIL: session could not be established: {}", e),
    };

    assert_eq!(record.data.len(), 1);
    assert_eq!(record.symbols, symbols);

    let report = &record.data[0];
    println!("⏱️  Duration: {}ms", report.duration_ms);
    match (&report.data, &report.error) {
        (Some(result), _) => {
            println!("📊 Status: {}", result.status.as_str());
            for (field, value) in &result.fields {
                println!("   {} = {}", field, value);
            }
            if result.status.is_usable() {
                println!("✅ PASS: {} field(s) extracted", result.fields.len());
            } else {
                // The site rotates its markup; an empty cascade must still
                // hand back triage evidence rather than bare failure.
                let diag = result.diagnostics.as_ref().expect("error result keeps evidence");
                println!("⚠️  EMPTY CASCADE: {}", result.error.as_deref().unwrap_or("?"));
                println!("   label: {}", diag.label);
                println!("   screenshot: {:?}", diag.screenshot_path);
            }
        }
        (None, Some(error)) => {
            println!("⚠️  NAVIGATION FAILED: {}", error);
            println!("   Expected occasionally: gmgn.ai throttles datacenter IPs");
        }
        (None, None) => panic!("❌ FAIL: report carries neither data nor error"),
    }

    let path = volume::save_run_record(&cfg, &record).expect("run record should save");
    println!("💾 Record: {}", path.display());
    assert!(path.is_file());
}

#[tokio::test]
#[ignore] // Run with: cargo test --test live_site_test -- --ignored --nocapture
async fn live_3_quiet_pages_leave_an_absent_trail() {
    init_logger();
    if !native_browser_available() {
        println!("⚠️  SKIP: no Chromium-family browser on this machine");
        return;
    }
    let cfg = live_config();

    println!("\n🎯 LIVE 3: Dismissal On A Quiet Page");
    println!("Challenge: rules must time out quietly when nothing is on screen");

    let session = match BrowserSession::open(&cfg).await {
        Ok(s) => s,
        Err(e) => panic!("❌ FAIL: session did not open: {}", e),
    };
    let diag = Diagnostics::new(cfg.screenshot_dir.clone());

    let ready = ReadinessSignal::Text("Example Domain".to_string());
    if let Err(e) = goto(&session, "https://example.com/", &ready, &cfg, &diag).await {
        session.close().await;
        panic!("❌ FAIL: could not reach example.com: {}", e);
    }

    // Short detection windows; example.com has neither interstitial.
    let trail = dismiss_all(&session, &volume::dismissal_rules(1500), &diag).await;
    session.close().await;

    for outcome in &trail {
        println!("🚪 {} → {:?}", outcome.rule, outcome.state);
    }
    assert_eq!(trail.len(), 2, "every rule reports exactly once");
    assert!(
        trail.iter().all(|o| o.state == PopupState::AbsentOrFailed),
        "❌ FAIL: phantom popup detected on example.com"
    );
}

#[tokio::test]
#[ignore] // Run with: cargo test --test live_site_test -- --ignored --nocapture
async fn live_4_bad_profile_dir_falls_back_to_ephemeral() {
    init_logger();
    if !native_browser_available() {
        println!("⚠️  SKIP: no Chromium-family browser on this machine");
        return;
    }
    let mut cfg = live_config();

    println!("\n🎯 LIVE 4: Persistent Profile Fallback");
    println!("Challenge: an unusable profile dir must degrade, not abort");

    // A regular file where the profile dir should go makes create_dir_all fail.
    let block = std::env::temp_dir().join("gmgn-scout-live-profile-block");
    std::fs::write(&block, b"not a directory").expect("scratch file");
    cfg.use_persistent_profile = true;
    cfg.profile_dir = block.join("profile");

    let session = match BrowserSession::open(&cfg).await {
        Ok(s) => s,
        Err(e) => panic!("❌ FAIL: fallback should have saved the session: {}", e),
    };

    let profile = session.profile().clone();
    println!("🗂️  Context: {:?}", profile);
    session.close().await;

    assert_eq!(profile, ProfileKind::Ephemeral);
}
