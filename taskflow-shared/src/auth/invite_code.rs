//! Team invite codes
//!
//! Codes are 8 characters drawn from an alphabet without look-alike glyphs
//! (no `0`, `O`, `1`, `I`, `L`), so they survive being read aloud or typed
//! from a screenshot. Lookups are case-insensitive: user input is normalized
//! with [`normalize`] before it reaches the database.
//!
//! ```
//! use taskflow_shared::auth::invite_code::{generate_invite_code, is_valid_format, normalize};
//!
//! let code = generate_invite_code();
//! assert!(is_valid_format(&code));
//! assert_eq!(normalize("  abcd2345 "), "ABCD2345");
//! ```

use rand::Rng;

/// Invite code length
pub const INVITE_CODE_LENGTH: usize = 8;

/// Characters an invite code may contain
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generates a random invite code
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();

    (0..INVITE_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..INVITE_CODE_ALPHABET.len());
            INVITE_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Trims and upper-cases user-supplied invite code input
pub fn normalize(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Checks that a (normalized) code could have been produced by [`generate_invite_code`]
pub fn is_valid_format(code: &str) -> bool {
    code.len() == INVITE_CODE_LENGTH && code.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..100 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LENGTH);
            assert!(is_valid_format(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_alphabet_excludes_ambiguous_glyphs() {
        for ch in [b'0', b'O', b'1', b'I', b'L'] {
            assert!(!INVITE_CODE_ALPHABET.contains(&ch));
        }
    }

    #[test]
    fn test_codes_are_random() {
        let codes: HashSet<String> = (0..50).map(|_| generate_invite_code()).collect();
        assert!(codes.len() > 45);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("abcd2345"), "ABCD2345");
        assert_eq!(normalize("\tXyZw9876\n"), "XYZW9876");
    }

    #[test]
    fn test_is_valid_format() {
        assert!(is_valid_format("ABCD2345"));
        assert!(!is_valid_format("abcd2345"));
        assert!(!is_valid_format("ABCD234"));
        assert!(!is_valid_format("ABCD23450"));
        assert!(!is_valid_format("ABCD-345"));
    }
}
