use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// 32 bytes = 256 bits, hex encoded to 64 characters.
pub const TOKEN_BYTES: usize = 32;

/// Random hex token used for CSRF tokens, session ids and remember-me tokens.
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Exact, constant-time comparison. An empty expected token never matches.
pub fn tokens_match(expected: &str, candidate: &str) -> bool {
    if expected.is_empty() || expected.len() != candidate.len() {
        return false;
    }
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}

pub fn looks_like_token(value: &str) -> bool {
    value.len() == TOKEN_BYTES * 2 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_256_bit_hex() {
        let token = random_token();
        assert_eq!(token.len(), 64);
        assert!(looks_like_token(&token));
        assert_ne!(token, random_token());
    }

    #[test]
    fn comparison_is_exact() {
        let token = random_token();
        assert!(tokens_match(&token, &token.clone()));
        assert!(!tokens_match(&token, &token.to_uppercase()));
        assert!(!tokens_match(&token, &token[..63]));
        assert!(!tokens_match(&token, ""));
        assert!(!tokens_match("", ""));
    }
}
