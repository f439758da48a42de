pub mod core;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use core::types;
pub use core::types::*;
pub use core::ScoutConfig;

// --- Convenience module paths ---
pub use scraping::{browser_manager, diagnostics, extract, navigate, popups, session, stealth};
pub use tools::volume;
