//! Attachment description sanitization.
//!
//! Descriptions extracted from the portal feed directly into local and
//! remote filenames, so they are reduced to a filesystem-safe alphabet
//! before use.

use crate::constants::MAX_DESCRIPTION_LEN;

/// Sanitize an attachment description for use in filenames.
///
/// Keeps only ASCII letters, digits, `_`, `-`, `.` and space; everything
/// else is dropped. The result is capped at [`MAX_DESCRIPTION_LEN`]
/// characters.
///
/// # Arguments
/// * `raw` - Description text as extracted from the portal
///
/// # Returns
/// The sanitized description, possibly empty.
pub fn sanitize_description(raw: &str) -> String {
    raw.chars()
        .filter(|c| is_allowed(*c))
        .take(MAX_DESCRIPTION_LEN)
        .collect()
}

/// Whether a character is allowed in a sanitized description.
fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ')
}
