//! Collision-resistant name prefixes for parallel test runs.
//!
//! Scenarios share one cloud account, so every run tags its resources with
//! `<label>-<10 lowercase chars>`.

use uuid::Uuid;

/// Length of the random segment of a name prefix.
pub const RANDOM_ID_LENGTH: usize = 10;

const UNIQUE_ID_LENGTH: usize = 6;
const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A short random base-62 identifier.
pub fn unique_id() -> String {
    let mut n = Uuid::new_v4().as_u128();
    let mut id = String::with_capacity(UNIQUE_ID_LENGTH);
    for _ in 0..UNIQUE_ID_LENGTH {
        id.push(BASE62[(n % 62) as usize] as char);
        n /= 62;
    }
    id
}

/// Build a name prefix from an already sampled identifier.
///
/// The identifier is lower-cased, then truncated or right-padded with `'0'`
/// to exactly [`RANDOM_ID_LENGTH`] characters.
pub fn name_prefix_from_id(label: &str, id: &str) -> String {
    let mut segment: String = id.to_lowercase().chars().take(RANDOM_ID_LENGTH).collect();
    while segment.chars().count() < RANDOM_ID_LENGTH {
        segment.push('0');
    }
    format!("{}-{}", label, segment)
}

/// Fresh name prefix for `label`.
pub fn generate_name_prefix(label: &str) -> String {
    name_prefix_from_id(label, &unique_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use regex::Regex;

    #[test]
    fn test_short_id_is_padded() {
        assert_eq!(name_prefix_from_id("comp", "AbC12x"), "comp-abc12x0000");
    }

    #[test]
    fn test_long_id_is_truncated() {
        assert_eq!(
            name_prefix_from_id("def", "0123456789ABCDEF"),
            "def-0123456789"
        );
    }

    #[test]
    fn test_exact_length_id_is_kept() {
        assert_eq!(name_prefix_from_id("x", "QWERTYUIOP"), "x-qwertyuiop");
    }

    #[test]
    fn test_unique_id_alphabet() {
        let id = unique_id();
        assert_eq!(id.len(), UNIQUE_ID_LENGTH);
        assert!(id.bytes().all(|b| BASE62.contains(&b)));
    }

    #[test]
    fn test_generated_prefix_shape() {
        for label in ["comp", "def", "kms-alarms", "a"] {
            let prefix = generate_name_prefix(label);
            let pattern = Regex::new(&format!("^{}-[a-z0-9]{{10}}$", regex::escape(label))).unwrap();

            assert_eq!(prefix.len(), label.len() + 11);
            assert!(pattern.is_match(&prefix), "{} does not match", prefix);
        }
    }

    #[test]
    fn test_generated_prefixes_are_distinct() {
        let prefixes: HashSet<_> = (0..200).map(|_| generate_name_prefix("comp")).collect();
        assert_eq!(prefixes.len(), 200);
    }
}
