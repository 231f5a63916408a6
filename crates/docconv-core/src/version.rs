//! Version string handling.
//!
//! Upstream tags and probe output use slightly different spellings of the
//! same version (`v0.13.1`, `0.13.1`, `typst 0.13.1 (8ace67d9)`). Everything
//! that compares versions goes through [`normalize_version`] first.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static VERSION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bv?(\d+(?:\.\d+)*)").unwrap());

/// Trim whitespace and strip a single leading `v`.
pub fn normalize_version(version: &str) -> String {
    let trimmed = version.trim();
    trimmed.strip_prefix('v').unwrap_or(trimmed).trim().to_string()
}

/// Whether `latest` differs from `current` once both are normalized.
///
/// Any difference counts as an update, including a downgrade published
/// upstream as the new latest release.
pub fn needs_update(current: &str, latest: &str) -> bool {
    normalize_version(current) != normalize_version(latest)
}

/// Compare two versions by their numeric dotted components.
///
/// Missing components count as zero, so `3.1` equals `3.1.0`. Non-numeric
/// components compare as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        normalize_version(v)
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    };
    let (left, right) = (parse(a), parse(b));
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Extract the first version token from a tool's `--version` output.
///
/// Only the first non-empty line is considered.
pub fn extract_version(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    VERSION_TOKEN
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Leading numeric component of a version, used to key static tables.
pub fn major_version(version: &str) -> Option<u64> {
    normalize_version(version)
        .split('.')
        .next()
        .and_then(|major| major.parse().ok())
}
