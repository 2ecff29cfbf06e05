//! Per-connection gateway: handshake, auth, and event routing.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive `hello` → authenticate credentials → Identity
//!   2. Register the session (possibly resuming a dropped one)
//!   3. Send `welcome`; if resuming into a lobby, reattach and send a
//!      snapshot
//!   4. Loop: receive client events → route to the registry or the
//!      player's lobby actor
//!
//! Outbound traffic takes a different path: lobby actors push
//! [`ServerEvent`]s into the player's channel, and a writer task owned
//! by this handler pumps that channel through the codec onto the
//! socket. The handler itself only ever reads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use quizhive_game::{HallOfFame, ProfileService, QuestionSource};
use quizhive_lobby::{EventSender, LobbyError, LobbyHandle, NewPlayer};
use quizhive_protocol::{
    ClientEvent, Codec, ErrorCode, LobbyCode, PlayerId, ProtocolError,
    ServerEvent,
};
use quizhive_session::{Authenticator, Credentials, Identity};
use quizhive_transport::{Connection, WebSocketConnection};

use crate::server::ServerState;
use crate::QuizHiveError;

/// How long a fresh connection gets to say `hello`.
const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that disconnects a player's session when the handler
/// exits.
///
/// This ensures the reconnect grace period starts even if the handler
/// panics. Since `Drop` is synchronous, we spawn a fire-and-forget task
/// for the async lock.
struct SessionGuard<
    A: Authenticator,
    C: Codec,
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
> {
    player_id: PlayerId,
    state: Arc<ServerState<A, C, Q, H, P>>,
}

impl<A, C, Q, H, P> Drop for SessionGuard<A, C, Q, H, P>
where
    A: Authenticator,
    C: Codec,
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut sessions = state.sessions.lock().await;
            let _ = sessions.disconnect(player_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C, Q, H, P>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C, Q, H, P>>,
) -> Result<(), QuizHiveError>
where
    A: Authenticator,
    C: Codec,
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: hello ---
    let (identity, resumed) = perform_hello(&conn, &state).await?;
    let player_id = identity.player_id;
    tracing::info!(%conn_id, %player_id, "player authenticated");

    let _guard = SessionGuard {
        player_id,
        state: Arc::clone(&state),
    };

    // --- Step 2: outbound pump ---
    // Lobby actors (and this handler) push events into `tx`; the writer
    // task serializes them onto the socket in order.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerEvent>();
    {
        let conn = Arc::clone(&conn);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let bytes = match state.codec.encode(&event) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode event");
                        continue;
                    }
                };
                if conn.send(&bytes).await.is_err() {
                    break;
                }
            }
        });
    }

    let _ = tx.send(ServerEvent::Welcome {
        player_id,
        username: identity.username.clone(),
        resumed,
    });

    // --- Step 3: reattach to a held lobby seat ---
    let mut lobby: Option<LobbyHandle> = None;
    if resumed {
        lobby = reattach_to_lobby(&state, player_id, &tx).await;
    }

    // --- Step 4: event loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };
        // Stamped before any decoding or lock waits, so queueing inside
        // the server doesn't eat into a player's answer time.
        let received_at = Instant::now();

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode event");
                send_error(&tx, ErrorCode::Validation, "malformed event");
                continue;
            }
        };

        dispatch_event(
            &state,
            &identity,
            &tx,
            &mut lobby,
            event,
            received_at,
        )
        .await;
    }

    // The seat is held for the grace period; a reconnect picks it back
    // up, the sweep releases it otherwise.
    if let Some(handle) = &lobby {
        if let Err(e) = handle.disconnected(player_id).await {
            tracing::debug!(%player_id, error = %e, "lobby unreachable on disconnect");
        }
    }

    // _guard drops here → session disconnect fires.
    Ok(())
}

/// Receives and validates the `hello` event, authenticates, and
/// registers the session. Returns the identity and whether a dropped
/// session was resumed.
async fn perform_hello<A, C, Q, H, P>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, C, Q, H, P>>,
) -> Result<(Identity, bool), QuizHiveError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(HELLO_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before hello".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(QuizHiveError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage(
                "hello timed out".into(),
            )
            .into());
        }
    };

    let event: ClientEvent = state.codec.decode(&data)?;
    let (token, guest_name) = match event {
        ClientEvent::Hello { token, guest_name } => (token, guest_name),
        _ => {
            send_error_direct(
                conn,
                &state.codec,
                ErrorCode::Unauthorized,
                "expected hello",
            )
            .await?;
            return Err(ProtocolError::InvalidMessage(
                "first event must be hello".into(),
            )
            .into());
        }
    };

    let credentials = match (token, guest_name) {
        (Some(token), _) => Credentials::Token(token),
        (None, Some(name)) => Credentials::Guest { name },
        (None, None) => {
            send_error_direct(
                conn,
                &state.codec,
                ErrorCode::Unauthorized,
                "hello carried no credentials",
            )
            .await?;
            return Err(ProtocolError::InvalidMessage(
                "hello carried no credentials".into(),
            )
            .into());
        }
    };

    let identity = match state.auth.authenticate(&credentials).await {
        Ok(identity) => identity,
        Err(e) => {
            send_error_direct(
                conn,
                &state.codec,
                ErrorCode::Unauthorized,
                &e.to_string(),
            )
            .await?;
            return Err(QuizHiveError::Session(e));
        }
    };

    let resumed = {
        let mut sessions = state.sessions.lock().await;
        match sessions.connect(&identity) {
            Ok(resumed) => resumed,
            Err(e) => {
                drop(sessions);
                send_error_direct(
                    conn,
                    &state.codec,
                    ErrorCode::BadState,
                    &e.to_string(),
                )
                .await?;
                return Err(QuizHiveError::Session(e));
            }
        }
    };

    Ok((identity, resumed))
}

/// Routes a resuming player back into the lobby their session points
/// at. Failures are reported to the client but never fatal — the player
/// simply lands outside any lobby.
async fn reattach_to_lobby<A, C, Q, H, P>(
    state: &Arc<ServerState<A, C, Q, H, P>>,
    player_id: PlayerId,
    tx: &EventSender,
) -> Option<LobbyHandle>
where
    A: Authenticator,
    C: Codec,
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    let code = state.sessions.lock().await.lobby_of(player_id)?;
    let result = {
        let mut lobbies = state.lobbies.lock().await;
        lobbies.reconnect(&code, player_id, tx.clone()).await
    };
    match result {
        Ok((handle, snapshot)) => {
            tracing::info!(%player_id, %code, "reattached to lobby");
            let _ = tx.send(ServerEvent::Snapshot { lobby: snapshot });
            Some(handle)
        }
        Err(e) => {
            tracing::debug!(%player_id, %code, error = %e, "reattach failed");
            let mut sessions = state.sessions.lock().await;
            let _ = sessions.set_lobby(player_id, None);
            send_lobby_error(tx, &e);
            None
        }
    }
}

/// Routes one client event. Failures surface as `error` events on the
/// player's channel; the connection itself stays up.
async fn dispatch_event<A, C, Q, H, P>(
    state: &Arc<ServerState<A, C, Q, H, P>>,
    identity: &Identity,
    tx: &EventSender,
    lobby: &mut Option<LobbyHandle>,
    event: ClientEvent,
    received_at: Instant,
) where
    A: Authenticator,
    C: Codec,
    Q: QuestionSource,
    H: HallOfFame,
    P: ProfileService,
{
    let player_id = identity.player_id;
    match event {
        ClientEvent::Hello { .. } => {
            send_error(tx, ErrorCode::BadState, "already greeted");
        }

        ClientEvent::CreateLobby {
            character,
            settings,
        } => {
            if lobby.is_some() {
                send_lobby_error(tx, &LobbyError::AlreadyInLobby(player_id));
                return;
            }
            let player = NewPlayer {
                id: player_id,
                username: identity.username.clone(),
                character,
            };
            let result = {
                let mut lobbies = state.lobbies.lock().await;
                lobbies.create_lobby(player, settings, tx.clone()).await
            };
            match result {
                Ok((handle, snapshot)) => {
                    let mut sessions = state.sessions.lock().await;
                    let _ = sessions
                        .set_lobby(player_id, Some(handle.code().clone()));
                    *lobby = Some(handle);
                    let _ =
                        tx.send(ServerEvent::LobbyCreated { lobby: snapshot });
                }
                Err(e) => send_lobby_error(tx, &e),
            }
        }

        ClientEvent::JoinLobby { code, character } => {
            if lobby.is_some() {
                send_lobby_error(tx, &LobbyError::AlreadyInLobby(player_id));
                return;
            }
            let Some(code) = LobbyCode::parse(&code) else {
                send_error(tx, ErrorCode::Validation, "malformed lobby code");
                return;
            };
            let player = NewPlayer {
                id: player_id,
                username: identity.username.clone(),
                character,
            };
            let result = {
                let mut lobbies = state.lobbies.lock().await;
                lobbies.join_lobby(&code, player, tx.clone()).await
            };
            match result {
                Ok((handle, snapshot)) => {
                    let mut sessions = state.sessions.lock().await;
                    let _ = sessions.set_lobby(player_id, Some(code));
                    *lobby = Some(handle);
                    let _ =
                        tx.send(ServerEvent::LobbyJoined { lobby: snapshot });
                }
                Err(e) => send_lobby_error(tx, &e),
            }
        }

        ClientEvent::LeaveLobby => {
            if lobby.is_none() {
                send_lobby_error(tx, &LobbyError::NotInLobby(player_id));
                return;
            }
            let result = {
                let mut lobbies = state.lobbies.lock().await;
                lobbies.leave(player_id).await
            };
            match result {
                Ok(()) => {
                    let mut sessions = state.sessions.lock().await;
                    let _ = sessions.set_lobby(player_id, None);
                    *lobby = None;
                }
                Err(e) => send_lobby_error(tx, &e),
            }
        }

        ClientEvent::Ready { ready } => {
            if let Some(handle) = require_lobby(lobby, tx, player_id) {
                if let Err(e) = handle.set_ready(player_id, ready).await {
                    send_lobby_error(tx, &e);
                }
            }
        }

        ClientEvent::StartGame => {
            if let Some(handle) = require_lobby(lobby, tx, player_id) {
                if let Err(e) = handle.start_game(player_id).await {
                    send_lobby_error(tx, &e);
                }
            }
        }

        ClientEvent::ReturnToLobby => {
            if let Some(handle) = require_lobby(lobby, tx, player_id) {
                if let Err(e) = handle.return_to_lobby(player_id).await {
                    send_lobby_error(tx, &e);
                }
            }
        }

        ClientEvent::Chat { message } => {
            if let Some(handle) = require_lobby(lobby, tx, player_id) {
                if let Err(e) = handle.chat(player_id, message).await {
                    send_lobby_error(tx, &e);
                }
            }
        }

        ClientEvent::Answer { answer_index } => {
            if let Some(handle) = require_lobby(lobby, tx, player_id) {
                if let Err(e) =
                    handle.answer(player_id, answer_index, received_at).await
                {
                    send_lobby_error(tx, &e);
                }
            }
        }
    }
}

/// Returns the player's lobby handle, or reports `not in a lobby`.
fn require_lobby<'a>(
    lobby: &'a Option<LobbyHandle>,
    tx: &EventSender,
    player_id: PlayerId,
) -> Option<&'a LobbyHandle> {
    match lobby {
        Some(handle) => Some(handle),
        None => {
            send_lobby_error(tx, &LobbyError::NotInLobby(player_id));
            None
        }
    }
}

fn send_error(tx: &EventSender, code: ErrorCode, message: &str) {
    let _ = tx.send(ServerEvent::Error {
        code,
        message: message.to_string(),
    });
}

fn send_lobby_error(tx: &EventSender, err: &LobbyError) {
    let _ = tx.send(ServerEvent::Error {
        code: err.code(),
        message: err.to_string(),
    });
}

/// Sends an `error` event straight down the socket, for failures before
/// the outbound pump exists.
async fn send_error_direct(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: ErrorCode,
    message: &str,
) -> Result<(), QuizHiveError> {
    let event = ServerEvent::Error {
        code,
        message: message.to_string(),
    };
    let bytes = codec.encode(&event)?;
    conn.send(&bytes).await.map_err(QuizHiveError::Transport)?;
    Ok(())
}
