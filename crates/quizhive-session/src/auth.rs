//! Authentication hook for resolving who a connection belongs to.
//!
//! QuizHive doesn't implement account storage itself. The
//! [`Authenticator`] trait turns the credentials from a client's `hello`
//! into an [`Identity`]; deployments plug in JWT validation, an auth
//! API, or the bundled [`GuestAuthenticator`] for anonymous play.
//!
//! Reconnection hangs off this seam: an authenticator that resolves the
//! same token to the same [`PlayerId`] lets a dropped client reclaim its
//! seat within the grace period. Guest identities are minted fresh per
//! connection, so guests can't reconnect — that's the intended trade.

use std::sync::atomic::{AtomicU64, Ordering};

use quizhive_protocol::PlayerId;

use crate::SessionError;

/// What a client presented in its `hello`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A bearer token for an existing account.
    Token(String),
    /// Anonymous play under a chosen display name.
    Guest { name: String },
}

/// A resolved player identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub player_id: PlayerId,
    pub username: String,
}

/// Resolves credentials into an identity.
///
/// `Send + Sync + 'static` because the authenticator is shared across
/// every connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use quizhive_session::{Authenticator, Credentials, Identity, SessionError};
/// use quizhive_protocol::PlayerId;
///
/// /// Accepts numeric tokens and uses them as the player id.
/// /// Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(
///         &self,
///         credentials: &Credentials,
///     ) -> Result<Identity, SessionError> {
///         let Credentials::Token(token) = credentials else {
///             return Err(SessionError::AuthFailed("token required".into()));
///         };
///         let id: u64 = token.parse().map_err(|_| {
///             SessionError::AuthFailed("token must be a number".into())
///         })?;
///         Ok(Identity {
///             player_id: PlayerId(id),
///             username: format!("user{id}"),
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the credentials and returns who this connection is.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] if the credentials are invalid.
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}

/// An [`Authenticator`] for anonymous guest play.
///
/// Validates the display name and mints a fresh [`PlayerId`] from an
/// atomic counter. Token credentials are rejected.
#[derive(Debug, Default)]
pub struct GuestAuthenticator {
    next_id: AtomicU64,
}

impl GuestAuthenticator {
    /// Display name length bounds, in characters.
    pub const MIN_NAME_LEN: usize = 2;
    pub const MAX_NAME_LEN: usize = 20;

    pub fn new() -> Self {
        Self::default()
    }

    fn validate_name(name: &str) -> Result<&str, SessionError> {
        let name = name.trim();
        let len = name.chars().count();
        if len < Self::MIN_NAME_LEN {
            return Err(SessionError::AuthFailed(format!(
                "name must be at least {} characters",
                Self::MIN_NAME_LEN
            )));
        }
        if len > Self::MAX_NAME_LEN {
            return Err(SessionError::AuthFailed(format!(
                "name must be at most {} characters",
                Self::MAX_NAME_LEN
            )));
        }
        Ok(name)
    }
}

impl Authenticator for GuestAuthenticator {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Identity, SessionError> {
        let Credentials::Guest { name } = credentials else {
            return Err(SessionError::AuthFailed(
                "guest server: token login not supported".into(),
            ));
        };
        let name = Self::validate_name(name)?;
        // fetch_add wraps on overflow, which would take 2^64 connections.
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Identity {
            player_id: PlayerId(id),
            username: name.to_string(),
        })
    }
}
