//! Command implementations.
//!
//! Each command returns the text to print so callers decide where it goes.

pub mod report;
pub mod research;
pub mod sessions;
pub mod status;
pub mod style_guides;

pub use self::report::execute_report;
pub use self::research::{execute_research, execute_resume};
pub use self::sessions::execute_sessions;
pub use self::status::execute_status;
pub use self::style_guides::execute_style_guides;

use crate::error::{CliError, Result};
use scrivener_domain::SessionId;

/// Parse a session id argument.
pub fn parse_session_id(raw: &str) -> Result<SessionId> {
    SessionId::from_string(raw.trim()).map_err(CliError::InvalidInput)
}
