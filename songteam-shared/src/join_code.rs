/// Team join codes
///
/// A join code is the only thing a user needs to enter a team. Codes are
/// eight characters: the fixed prefix `TEAM` followed by four symbols drawn
/// uniformly from a 32-symbol alphabet that leaves out the look-alikes
/// `I`, `O`, `0` and `1`.
///
/// Codes are compared case-insensitively: user input is trimmed and
/// uppercased with [`normalize`] before lookup.
///
/// # Example
///
/// ```
/// use songteam_shared::join_code::{generate, is_well_formed, normalize};
///
/// let code = generate();
/// assert!(is_well_formed(&code));
/// assert_eq!(normalize("  teamabcd "), "TEAMABCD");
/// ```

use rand::Rng;

/// Fixed prefix of every join code
pub const PREFIX: &str = "TEAM";

/// Symbols used for the random suffix
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of random symbols after the prefix
pub const SUFFIX_LEN: usize = 4;

/// Total code length
pub const CODE_LEN: usize = PREFIX.len() + SUFFIX_LEN;

/// How many fresh codes team creation tries before giving up on collisions
pub const MAX_GENERATION_ATTEMPTS: usize = 5;

/// Generates a new join code using the thread-local RNG
pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

/// Generates a join code from the given RNG
///
/// Split out so tests can drive generation with a seeded RNG.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(CODE_LEN);
    code.push_str(PREFIX);
    for _ in 0..SUFFIX_LEN {
        let idx = rng.gen_range(0..ALPHABET.len());
        code.push(ALPHABET[idx] as char);
    }
    code
}

/// Canonical form used for storage and lookup
pub fn normalize(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Checks shape only; says nothing about whether a team uses the code
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LEN
        && code.starts_with(PREFIX)
        && code[PREFIX.len()..].bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_generated_codes_are_well_formed() {
        for _ in 0..1000 {
            let code = generate();
            assert_eq!(code.len(), 8);
            assert!(code.starts_with("TEAM"));
            assert!(is_well_formed(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_suffix_avoids_ambiguous_symbols() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let code = generate_with(&mut rng);
            let suffix = &code[PREFIX.len()..];
            for c in ['I', 'O', '0', '1'] {
                assert!(!suffix.contains(c), "{} contains {}", code, c);
            }
        }
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = generate_with(&mut StdRng::seed_from_u64(42));
        let b = generate_with(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_generation_covers_alphabet() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            seen.extend(generate_with(&mut rng)[PREFIX.len()..].bytes());
        }
        assert_eq!(seen.len(), ALPHABET.len());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("teamab23"), "TEAMAB23");
        assert_eq!(normalize("\tTEAMab23\n"), "TEAMAB23");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_is_well_formed_rejects() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("TEAM"));
        assert!(!is_well_formed("TEAMABC"));
        assert!(!is_well_formed("TEAMABCDE"));
        assert!(!is_well_formed("CREWABCD"));
        assert!(!is_well_formed("TEAMAB01"));
        assert!(!is_well_formed("teamabcd"));
        assert!(is_well_formed("TEAMAB23"));
    }
}
