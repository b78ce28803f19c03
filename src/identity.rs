use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const PREFIX: &str = "user-";
const TOKEN_LEN: usize = 7;

/// Random per-client token that names this client's session on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let token: String = (0..TOKEN_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self(format!("{}{}", PREFIX, token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let identity = SessionIdentity::generate();
        let token = identity.as_str().strip_prefix("user-").unwrap();
        assert_eq!(token.len(), 7);
        assert!(token.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_generate_is_random() {
        // 36^7 possibilities; a collision here means the generator is broken.
        assert_ne!(SessionIdentity::generate(), SessionIdentity::generate());
    }
}
