//! Base-name sanitization.

/// Longest base name kept. Leaves room for `_seg_NNNN.ext` and friends
/// under the 255-byte Linux name limit.
const BASE_MAX: usize = 200;

/// Maps every character outside `[A-Za-z0-9_-]` to `_` and truncates.
pub fn sanitize_base_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Output is ASCII, so any byte offset is a char boundary.
    out.truncate(BASE_MAX);
    out
}
