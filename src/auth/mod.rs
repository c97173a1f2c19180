//! Credentials and session tokens.
//!
//! Identity is resolved once at the HTTP boundary from a verified token and
//! handed to the ledger as a plain login.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password, PASSWORD_HASH_COST};
pub use token::{TokenError, TokenSigner};
