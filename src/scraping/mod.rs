pub mod browser_manager;
pub mod diagnostics;
pub mod extract;
pub mod navigate;
pub mod popups;
pub mod session;
pub mod stealth;

pub use extract::{FieldExtractor, SelectorStrategy};
pub use navigate::{NavigationError, ReadinessSignal};
pub use popups::{DismissalRule, PopupState};
pub use session::{BrowserSession, ProfileKind, SessionError};
