//! Login credential checks and token generation
//!
//! Credentials are verified by an [`Authenticator`]. The stock implementation
//! compares SHA-256 password digests from the config file in constant time.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::UserConfig;
use crate::{Error, Result};

/// Session token length in bytes (hex-encoded to twice this)
pub const TOKEN_LENGTH: usize = 32;

/// Verifies login credentials
pub trait Authenticator: Send + Sync {
    /// Check `login`/`password`, returning the canonical user name
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` if the credentials are rejected
    fn authenticate(&self, login: &str, password: &str) -> Result<String>;
}

/// Checks passwords against configured SHA-256 digests
#[derive(Debug, Clone, Default)]
pub struct PasswordAuthenticator {
    users: Vec<UserConfig>,
}

impl PasswordAuthenticator {
    /// Create an authenticator over the configured accounts
    #[must_use]
    pub const fn new(users: Vec<UserConfig>) -> Self {
        Self { users }
    }

    /// Number of known accounts
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no accounts are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Authenticator for PasswordAuthenticator {
    fn authenticate(&self, login: &str, password: &str) -> Result<String> {
        let digest = hash_password(password);

        let user = self
            .users
            .iter()
            .find(|u| u.name == login)
            .ok_or_else(|| Error::Auth("invalid login or password".to_string()))?;

        if constant_time_eq(digest.as_bytes(), user.password_sha256.as_bytes()) {
            Ok(user.name.clone())
        } else {
            Err(Error::Auth("invalid login or password".to_string()))
        }
    }
}

/// Hex-encoded SHA-256 digest of a password
#[must_use]
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Generate a random session token
#[must_use]
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..TOKEN_LENGTH).map(|_| rng.r#gen()).collect();
    hex::encode(bytes)
}

/// Constant-time byte comparison to prevent timing attacks
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> PasswordAuthenticator {
        PasswordAuthenticator::new(vec![UserConfig {
            name: "admin".to_string(),
            password_sha256: hash_password("hunter2"),
        }])
    }

    #[test]
    fn accepts_correct_password() {
        let name = authenticator().authenticate("admin", "hunter2").unwrap();
        assert_eq!(name, "admin");
    }

    #[test]
    fn rejects_wrong_password() {
        let err = authenticator().authenticate("admin", "hunter3").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn rejects_unknown_user() {
        assert!(authenticator().authenticate("root", "hunter2").is_err());
    }

    #[test]
    fn hash_is_known_digest() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
    }
}
