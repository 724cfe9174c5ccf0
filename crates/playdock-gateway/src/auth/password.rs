//! Password hashing.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
        rand_core::OsRng,
    },
};
use playdock_core::HashingConfig;

use super::AuthError;

/// Capability to hash and check passwords.
///
/// Both operations are CPU-bound; callers on an async runtime should run
/// them on a blocking thread.
pub trait PasswordVerifier: Send + Sync {
    /// Hash a plaintext password with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns error if hashing fails.
    fn hash(&self, plaintext: &str) -> Result<String, AuthError>;

    /// Check a plaintext password against a stored hash in constant time.
    ///
    /// # Errors
    ///
    /// Returns error if the stored hash cannot be parsed.
    fn compare(&self, plaintext: &str, password_hash: &str) -> Result<bool, AuthError>;
}

/// Argon2id implementation of [`PasswordVerifier`].
#[derive(Debug, Clone, Default)]
pub struct Argon2Verifier {
    params: Params,
}

impl Argon2Verifier {
    /// Create a verifier with the given cost parameters.
    ///
    /// # Errors
    ///
    /// Returns error if the parameters are out of Argon2's accepted range.
    pub fn new(cost: &HashingConfig) -> Result<Self, AuthError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::Config(format!("Invalid hashing parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordVerifier for Argon2Verifier {
    fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Hashing(format!("Password hashing failed: {e}")))
    }

    fn compare(&self, plaintext: &str, password_hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| AuthError::Hashing(format!("Invalid stored hash: {e}")))?;

        // Cost parameters are read from the stored hash, so hashes made under
        // older settings keep verifying.
        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Hashing(format!("Password verification failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> Argon2Verifier {
        Argon2Verifier::new(&HashingConfig::minimal()).unwrap()
    }

    #[test]
    fn test_hash_and_compare() {
        let v = verifier();
        let hash = v.hash("pw1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(v.compare("pw1", &hash).unwrap());
        assert!(!v.compare("pw2", &hash).unwrap());
        assert!(!v.compare("", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salts() {
        let v = verifier();
        let first = v.hash("same-password").unwrap();
        let second = v.hash("same-password").unwrap();

        assert_ne!(first, second);
        assert!(v.compare("same-password", &first).unwrap());
        assert!(v.compare("same-password", &second).unwrap());
    }

    #[test]
    fn test_hash_from_other_cost_still_verifies() {
        let cheap = verifier();
        let hash = cheap.hash("portable").unwrap();

        let stronger = Argon2Verifier::new(&HashingConfig {
            memory_kib: 64,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(stronger.compare("portable", &hash).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        let v = verifier();
        assert!(matches!(
            v.compare("pw", "not-a-phc-string"),
            Err(AuthError::Hashing(_))
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = Argon2Verifier::new(&HashingConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        });
        assert!(matches!(result, Err(AuthError::Config(_))));
    }
}
