// src/utils/invite.rs

use rand::Rng;

const CODE_LEN: usize = 8;

/// Alphabet without easily-confused characters (0/O, 1/I).
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generates a group invite code. Uniqueness is enforced by the caller
/// against the database, regenerating on the (unlikely) collision.
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_has_expected_shape() {
        let code = generate_invite_code();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn codes_are_not_constant() {
        let codes: std::collections::HashSet<String> =
            (0..32).map(|_| generate_invite_code()).collect();
        assert!(codes.len() > 1);
    }
}
