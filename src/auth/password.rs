//! Credential hashing with bcrypt.
//!
//! Stored values are standard `$2b$<cost>$...` strings, so the cost can be
//! raised later without invalidating existing users.

/// Cost factor for newly hashed passwords.
#[cfg(not(test))]
pub const PASSWORD_HASH_COST: u32 = bcrypt::DEFAULT_COST;

/// Cost factor for newly hashed passwords (minimum in unit tests).
#[cfg(test)]
pub const PASSWORD_HASH_COST: u32 = 4; // bcrypt::MIN_COST (private in bcrypt 0.15)

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, PASSWORD_HASH_COST)
}

/// Check `password` against a stored hash.
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
