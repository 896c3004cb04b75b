//! Opaque token generation.
//!
//! Bearer credentials and session handles are both unguessable alphanumeric
//! tokens. Uniqueness is probabilistic: the token space is large enough that
//! no collision handling is needed anywhere (`constants::TOKEN_LEN`).

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::constants::TOKEN_LEN;

/// Generate a fresh random token from the OS CSPRNG.
pub fn generate() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Cheap shape check for tokens received over the wire: exact length,
/// alphanumeric only.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_well_formed() {
        for _ in 0..100 {
            let t = generate();
            assert!(is_well_formed(&t), "bad token: {t}");
        }
    }

    #[test]
    fn test_tokens_are_distinct() {
        let a = generate();
        let b = generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        let mut t = generate();
        t.replace_range(0..1, "!");
        assert!(!is_well_formed(&t));
    }
}
