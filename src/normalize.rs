//! Column-label normalization.

/// Normalize an arbitrary column label into a destination-safe identifier.
///
/// Rules, applied in order:
///
/// 1. drop every character that is not a letter, digit, or space
/// 2. replace spaces with underscores
/// 3. lowercase
///
/// Total and idempotent; the output alphabet is exactly `[a-z0-9_]`. An
/// empty or fully-symbolic label normalizes to the empty string, which is
/// accepted rather than treated as an error.
pub fn normalize_column(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}
