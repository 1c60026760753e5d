//! Style guides command implementation.

use crate::error::Result;
use crate::output::Formatter;
use scrivener_research::style_guides;

/// Execute the style-guides command.
pub fn execute_style_guides(formatter: &Formatter) -> Result<String> {
    formatter.format_style_guides(&style_guides())
}
