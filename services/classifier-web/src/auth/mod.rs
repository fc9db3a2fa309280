//! Password hashing and one-shot login sessions.

pub mod password;
pub mod session;

pub use password::PasswordHasher;
pub use session::{LoginState, SessionId, SessionStore};
