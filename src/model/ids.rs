//! Node id rendering and link id packing.
//!
//! Mesh addresses are displayed as `N` followed by at least six uppercase hex
//! digits. Older tooling printed them as `0x..`; that form is still accepted
//! on input but never produced by [`format_node_id`].

const LINK_FROM_MASK: u64 = 0x00FF_FFFF;
const LINK_TO_SHIFT: u32 = 24;

/// `255` -> `"N0000FF"`.
pub fn format_node_id(id: u32) -> String {
    format!("N{:06X}", id)
}

/// `255` -> `"0xFF"`.
pub fn format_legacy_node_id(id: u32) -> String {
    format!("0x{:X}", id)
}

/// Parse a node id in `N......`, `0x..` or decimal form.
pub fn parse_node_id(text: &str) -> Option<u32> {
    let text = text.trim();
    let hex = text
        .strip_prefix('N')
        .or_else(|| text.strip_prefix("0x"))
        .or_else(|| text.strip_prefix("0X"));
    match hex {
        Some(digits) => {
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            u32::from_str_radix(digits, 16).ok()
        }
        None => {
            if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            text.parse().ok()
        }
    }
}

/// Re-render a legacy `0x..` label in the `N......` form. Other labels are
/// returned as-is.
pub fn normalize_node_label(label: &str) -> String {
    let legacy = label.starts_with("0x") || label.starts_with("0X");
    match parse_node_id(label) {
        Some(id) if legacy => format_node_id(id),
        _ => label.to_string(),
    }
}

/// Numeric link id the controller derives from its endpoints.
pub fn pack_link_id(from: u32, to: u32) -> u64 {
    (u64::from(from) & LINK_FROM_MASK) + (u64::from(to) << LINK_TO_SHIFT)
}

/// Inverse of [`pack_link_id`]: `(from, to)`.
pub fn unpack_link_id(id: u64) -> (u32, u32) {
    let from = (id & LINK_FROM_MASK) as u32;
    let to = (id >> LINK_TO_SHIFT) as u32;
    (from, to)
}
