//! Process-level helpers shared by the binary and the storage backends.

pub mod bootstrap;
pub mod retry;
