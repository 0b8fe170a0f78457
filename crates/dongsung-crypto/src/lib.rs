/// Dongsung Crypto Library
///
/// Password hashing for both account logins and the anonymous posts that are
/// protected by a per-post password instead of an account.

pub mod password;

pub use password::{Credential, Hasher, Secret};
