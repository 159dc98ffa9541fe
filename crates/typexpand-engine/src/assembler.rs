//! Joins expander output into one generated-code document.

/// Separator placed between fragments: one blank line.
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Drop blank fragments and join the rest with [`FRAGMENT_SEPARATOR`].
///
/// All-blank input yields an empty document, which callers treat as
/// "nothing to generate".
pub fn assemble<S: AsRef<str>>(fragments: &[S]) -> String {
    fragments
        .iter()
        .map(AsRef::as_ref)
        .filter(|fragment| !fragment.trim().is_empty())
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}
