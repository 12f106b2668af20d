//! Short invite codes drawn uniformly from `[A-Z0-9]`.
//!
//! Six symbols out of 36 give about 31 bits, enough to make collisions rare; the invite store
//! still inserts with insert-if-absent and asks for another code on collision.

use rand::{Rng, rng};

/// Symbols in a code.
pub const CODE_LENGTH: usize = 6;
/// Symbols a code is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a fresh code from the thread-local generator.
pub fn generate() -> String {
    generate_with(&mut rng())
}

/// Generate a code from `rng`.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Canonical form of user input: surrounding blanks dropped, letters upper-cased.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Whether `code` is exactly [`CODE_LENGTH`] symbols of [`CODE_ALPHABET`].
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|byte| CODE_ALPHABET.contains(&byte))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn codes_are_six_alphabet_symbols() {
        for _ in 0..200 {
            let code = generate();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(is_well_formed(&code), "unexpected code {code}");
        }
    }

    #[test]
    fn codes_are_diverse_over_many_generations() {
        let mut rng = StdRng::seed_from_u64(7);
        let codes = (0..1_000)
            .map(|_| generate_with(&mut rng))
            .collect::<Vec<_>>();

        let unique = codes.iter().collect::<HashSet<_>>().len();
        let symbols = codes
            .iter()
            .flat_map(|code| code.chars())
            .collect::<HashSet<_>>()
            .len();

        assert!(unique as f64 / codes.len() as f64 > 0.9);
        assert!(symbols >= 15);
    }

    #[test]
    fn normalization_precedes_format_check() {
        assert_eq!(normalize("  abc123\n"), "ABC123");
        assert!(is_well_formed(&normalize(" abc123 ")));
        assert!(!is_well_formed("ABC12"));
        assert!(!is_well_formed("ABC1234"));
        assert!(!is_well_formed("ABC-12"));
        assert!(!is_well_formed("abc123"));
        assert!(!is_well_formed("ÀBC123"));
    }
}
