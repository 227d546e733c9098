//! Session identifier generation and validation.

use uuid::Uuid;

/// Length of a textual session identifier.
pub const KEY_LEN: usize = 36;

const DASH_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Mint a fresh random session identifier in the
/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` shape.
pub fn new_session_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Check that `key` has the exact shape of a session identifier.
///
/// Keys are used verbatim as file names by the disk storer, so anything
/// other than 36 characters of lowercase hex with dashes at 8, 13, 18 and 23
/// is rejected.
pub fn valid_key(key: &str) -> bool {
    if key.len() != KEY_LEN {
        return false;
    }

    key.bytes().enumerate().all(|(i, b)| {
        if DASH_POSITIONS.contains(&i) {
            b == b'-'
        } else {
            matches!(b, b'0'..=b'9' | b'a'..=b'f')
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_valid() {
        for _ in 0..1_000 {
            let id = new_session_id();
            assert!(valid_key(&id), "generated invalid id: {}", id);
        }
    }

    #[test]
    fn test_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let id = new_session_id();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {}", id);
        }
    }

    #[test]
    fn test_valid_key_accepts_canonical_shape() {
        assert!(valid_key("6ba7b810-9dad-11d1-80b4-00c04fd430c8"));
        assert!(valid_key("00000000-0000-0000-0000-000000000000"));
        assert!(valid_key("ffffffff-ffff-ffff-ffff-ffffffffffff"));
    }

    #[test]
    fn test_valid_key_wrong_length() {
        assert!(!valid_key(""));
        assert!(!valid_key("6ba7b810-9dad-11d1-80b4-00c04fd430c"));
        assert!(!valid_key("6ba7b810-9dad-11d1-80b4-00c04fd430c88"));
    }

    #[test]
    fn test_valid_key_wrong_dash_position() {
        assert!(!valid_key("6ba7b8109-dad-11d1-80b4-00c04fd430c8"));
        assert!(!valid_key("6ba7b810-9dad-11d180-b4-00c04fd430c8"));
        assert!(!valid_key("6ba7b810-9dad-11d1-80b400c04fd430c8-"));
    }

    #[test]
    fn test_valid_key_non_hex() {
        assert!(!valid_key("6ba7b810-9dad-11d1-80b4-00c04fd430cg"));
        assert!(!valid_key("6BA7B810-9DAD-11D1-80B4-00C04FD430C8"));
        assert!(!valid_key("../../../../etc/passwd-aaaaaaaaaaaaa"));
    }
}
