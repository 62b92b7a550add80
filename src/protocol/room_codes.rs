use rand::RngExt;

/// Alphabet for room codes, avoiding confusing characters (0, O, I, 1).
/// Codes are meant to be read aloud or typed from a phone screen.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Room code length.
pub const CODE_LENGTH: usize = 6;

/// How many times the allocator samples the alphabet before giving up
/// with a `CodeExhaustion` error.
pub const CODE_ALLOCATION_ATTEMPTS: usize = 10;

/// Generate a random room code of [`CODE_LENGTH`] characters.
pub fn generate_room_code() -> String {
    generate_room_code_of_length(CODE_LENGTH)
}

/// Generate a room code of the requested length.
pub fn generate_room_code_of_length(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = CODE_ALPHABET[idx] as char;
            ch
        })
        .collect()
}

/// Canonical form used for case-insensitive lookups.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_expected_length_and_alphabet() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn alphabet_excludes_ambiguous_characters() {
        for b in [b'0', b'O', b'I', b'1'] {
            assert!(!CODE_ALPHABET.contains(&b));
        }
        assert_eq!(CODE_ALPHABET.len(), 32);
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_room_code(" abcd23 "), "ABCD23");
    }
}
