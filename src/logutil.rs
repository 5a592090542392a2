//! Logging utilities for sanitizing controller-supplied strings so logs stay single-line.
//! Node tags, descriptions and error bodies come straight off the wire and may
//! contain anything.

use std::fmt::Write;

/// Preview length used by [`escape_log`].
pub const DEFAULT_PREVIEW: usize = 300;

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control characters => `\xNN`
///
/// Truncates after [`DEFAULT_PREVIEW`] characters with an ellipsis.
pub fn escape_log(s: &str) -> String {
    escape_log_with_limit(s, DEFAULT_PREVIEW)
}

/// [`escape_log`] with an explicit preview length in characters.
pub fn escape_log_with_limit(s: &str, max_preview: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_preview) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_preview {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
