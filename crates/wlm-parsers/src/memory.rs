//! Memory parsing utilities for scheduler output.

/// Parse a Slurm memory string to megabytes.
///
/// Handles "4G", "1000M", "4096K", "1T" and plain numbers (megabytes).
/// sacct's per-node/per-core suffixes ("4Gn", "1000Mc") are accepted too.
///
/// Returns None for empty strings, `UNLIMITED` and other placeholders.
pub fn parse_memory_mb(s: &str) -> Option<u64> {
    let s = s.trim().trim_end_matches(['n', 'c']);
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits.parse().ok()?;

    match unit {
        "" | "M" => Some(value),
        "K" => Some(value / 1024),
        "G" => value.checked_mul(1024),
        "T" => value.checked_mul(1024 * 1024),
        _ => None,
    }
}
