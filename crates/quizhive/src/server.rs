//! `QuizHiveServer` builder and server loop.
//!
//! This is the entry point for running a QuizHive server. It ties
//! together all the layers: transport → protocol → session → lobby →
//! game, plus the background tasks that keep the registry and session
//! table tidy.

use std::sync::Arc;
use std::time::Duration;

use quizhive_game::{HallOfFame, ProfileService, QuestionSource, Services};
use quizhive_lobby::{LobbyConfig, LobbyRegistry, RegistryEvent};
use quizhive_protocol::{Codec, JsonCodec};
use quizhive_session::{Authenticator, SessionConfig, SessionManager};
use quizhive_transport::{Transport, WebSocketTransport};
use tokio::sync::{mpsc, Mutex};

use crate::gateway::handle_connection;
use crate::QuizHiveError;

/// How often the maintenance task expires stale sessions.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
/// Interior mutability via `Mutex` where needed; lobby actors
/// themselves are lock-free from here (commands go over channels).
pub(crate) struct ServerState<A, C, Q, H, P> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) lobbies: Mutex<LobbyRegistry<Q, H, P>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a QuizHive server.
///
/// # Example
///
/// ```rust,ignore
/// use quizhive::prelude::*;
///
/// let server = QuizHiveServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(GuestAuthenticator::new(), services)
///     .await?;
/// server.run().await
/// ```
pub struct QuizHiveServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    lobby_config: LobbyConfig,
}

impl QuizHiveServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            lobby_config: LobbyConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the lobby configuration.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Builds the server with the given authenticator and game
    /// collaborators.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` as defaults.
    pub async fn build<A, Q, H, P>(
        self,
        auth: A,
        services: Services<Q, H, P>,
    ) -> Result<QuizHiveServer<A, JsonCodec, Q, H, P>, QuizHiveError>
    where
        A: Authenticator,
        Q: QuestionSource,
        H: HallOfFame,
        P: ProfileService,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let (registry, registry_events) =
            LobbyRegistry::new(Arc::new(services), self.lobby_config);

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.session_config)),
            lobbies: Mutex::new(registry),
            auth,
            codec: JsonCodec,
        });

        Ok(QuizHiveServer {
            transport,
            state,
            registry_events,
        })
    }
}

impl Default for QuizHiveServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running QuizHive server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct QuizHiveServer<A, C, Q, H, P> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C, Q, H, P>>,
    registry_events: mpsc::UnboundedReceiver<RegistryEvent>,
}

impl<A, C, Q, H, P> QuizHiveServer<A, C, Q, H, P>
where
    A: Authenticator,
    C: Codec,
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, QuizHiveError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each,
    /// plus background tasks for registry upkeep and session expiry.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), QuizHiveError> {
        tracing::info!("QuizHive server running");

        tokio::spawn(registry_event_task(
            Arc::clone(&self.state),
            self.registry_events,
        ));
        tokio::spawn(maintenance_task(Arc::clone(&self.state)));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Folds actor lifecycle events back into the registry and session
/// table. Runs for the lifetime of the server.
async fn registry_event_task<A, C, Q, H, P>(
    state: Arc<ServerState<A, C, Q, H, P>>,
    mut events: mpsc::UnboundedReceiver<RegistryEvent>,
) where
    A: Authenticator,
    C: Codec,
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    while let Some(event) = events.recv().await {
        if let RegistryEvent::SeatReleased(player_id) = &event {
            // The seat is gone; don't route a future reconnect there.
            let mut sessions = state.sessions.lock().await;
            let _ = sessions.set_lobby(*player_id, None);
        }
        state.lobbies.lock().await.apply_event(event);
    }
}

/// Periodically expires sessions whose reconnect grace elapsed and
/// releases any lobby seats they still hold. Covers handlers that never
/// got to report a disconnect (e.g. a panicked task).
async fn maintenance_task<A, C, Q, H, P>(
    state: Arc<ServerState<A, C, Q, H, P>>,
) where
    A: Authenticator,
    C: Codec,
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
    loop {
        interval.tick().await;

        let expired = {
            let mut sessions = state.sessions.lock().await;
            let expired = sessions.expire_stale();
            sessions.cleanup_expired();
            expired
        };

        for (player_id, lobby) in expired {
            let Some(code) = lobby else { continue };
            let handle = state.lobbies.lock().await.handle(&code);
            if let Some(handle) = handle {
                if let Err(e) = handle.disconnected(player_id).await {
                    tracing::debug!(
                        %player_id,
                        error = %e,
                        "lobby unreachable during session expiry"
                    );
                }
            }
        }
    }
}
