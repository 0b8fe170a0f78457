use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use anyhow::{Result, anyhow};
use rand_core::OsRng;

/// Something that can prove knowledge of a stored password hash, or mint a
/// new one.
///
/// Storage code only ever sees this trait, so gated writes can verify against
/// the row that is current inside the same transaction.
pub trait Credential {
    /// Produce the hash to persist for a newly created record.
    fn seal(&self) -> Result<String>;

    /// `Ok(false)` on mismatch. A malformed stored hash is an error.
    fn matches(&self, stored_hash: &str) -> Result<bool>;
}

/// Argon2id hasher with fixed cost parameters.
#[derive(Clone)]
pub struct Hasher {
    argon2: Argon2<'static>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl Hasher {
    pub const DEFAULT_MEMORY_KIB: u32 = Params::DEFAULT_M_COST;
    pub const DEFAULT_ITERATIONS: u32 = Params::DEFAULT_T_COST;

    /// Hasher with explicit memory (KiB) and iteration cost.
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| anyhow!("Invalid Argon2 parameters: {}", e))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, plain: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
        Ok(hash.to_string())
    }

    /// Verify `plain` against a PHC-encoded hash. The cost parameters are
    /// read from the hash itself, so hashes minted with other settings still
    /// verify.
    pub fn verify(&self, plain: &str, stored_hash: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(stored_hash).map_err(|e| anyhow!("Corrupt password hash: {}", e))?;

        match self.argon2.verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification failed: {}", e)),
        }
    }

    /// Borrow a plaintext password as a [`Credential`].
    pub fn secret<'a>(&'a self, plain: &'a str) -> Secret<'a> {
        Secret { hasher: self, plain }
    }
}

/// A plaintext password paired with the hasher that understands it.
pub struct Secret<'a> {
    hasher: &'a Hasher,
    plain: &'a str,
}

impl Credential for Secret<'_> {
    fn seal(&self) -> Result<String> {
        self.hasher.hash(self.plain)
    }

    fn matches(&self, stored_hash: &str) -> Result<bool> {
        self.hasher.verify(self.plain, stored_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Hasher {
        Hasher::new(64, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let hasher = cheap();
        let hash = hasher.hash("pw1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("pw1"));

        assert!(hasher.verify("pw1", &hash).unwrap());
        assert!(!hasher.verify("pw2", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = cheap();
        assert_ne!(hasher.hash("grace").unwrap(), hasher.hash("grace").unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_error_not_a_mismatch() {
        let hasher = cheap();
        assert!(hasher.verify("pw1", "not-a-phc-string").is_err());
    }

    #[test]
    fn verifies_hashes_minted_with_other_costs() {
        let hash = Hasher::new(128, 2).unwrap().hash("secret1").unwrap();
        assert!(cheap().verify("secret1", &hash).unwrap());
    }

    #[test]
    fn secret_acts_as_credential() {
        let hasher = cheap();
        let sealed = hasher.secret("pw1").seal().unwrap();
        assert!(hasher.secret("pw1").matches(&sealed).unwrap());
        assert!(!hasher.secret("nope").matches(&sealed).unwrap());
    }

    #[test]
    fn rejects_impossible_params() {
        assert!(Hasher::new(0, 0).is_err());
    }
}
