//! Player identity and connection lifecycle for QuizHive.
//!
//! Three pieces:
//!
//! - [`Authenticator`] — the pluggable seam turning `hello` credentials
//!   into an [`Identity`] ([`GuestAuthenticator`] ships for anonymous
//!   play).
//! - [`Session`] / [`SessionState`] — the record of one player's
//!   connection and its Connected → Disconnected → Expired lifecycle.
//! - [`SessionManager`] — the registry that resumes identities inside
//!   their reconnect grace period and remembers which lobby each player
//!   occupies.

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{Authenticator, Credentials, GuestAuthenticator, Identity};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
