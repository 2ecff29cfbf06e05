//! Integration tests for the QuizHive server: handshake, lobby flow, and
//! full games over real WebSocket connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use quizhive::prelude::*;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Test authenticator
// =========================================================================

/// Accepts any numeric token and derives a stable identity from it, so
/// reconnection can be exercised (guest identities are minted fresh per
/// connection and can never resume).
struct NumericTokenAuth;

impl Authenticator for NumericTokenAuth {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Identity, SessionError> {
        let Credentials::Token(token) = credentials else {
            return Err(SessionError::AuthFailed("token required".into()));
        };
        let id: u64 = token
            .parse()
            .map_err(|_| SessionError::AuthFailed("not a number".into()))?;
        Ok(Identity {
            player_id: PlayerId(id),
            username: format!("user{id}"),
        })
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn fixture_questions() -> Vec<Question> {
    (1..=3)
        .map(|i| Question {
            id: i,
            prompt: format!("Question {i}?"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 1,
        })
        .collect()
}

/// Starts a server on a random port and returns the address.
async fn start_server_with(auth: impl Authenticator) -> String {
    let services = Services {
        questions: StaticQuestionSource::new()
            .with_set("general", fixture_questions()),
        hall_of_fame: NullHallOfFame,
        profiles: NullProfileService,
    };
    let server = QuizHiveServerBuilder::new()
        .bind("127.0.0.1:0")
        .lobby_config(LobbyConfig {
            inter_question_pause: Duration::from_millis(100),
            disconnect_grace: Duration::from_secs(2),
            ..LobbyConfig::default()
        })
        .build(auth, services)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_server_with(GuestAuthenticator::new()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send event");
}

async fn recv_json(ws: &mut ClientWs) -> Value {
    let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for event")
        .expect("connection closed")
        .expect("websocket error");
    match msg {
        Message::Text(text) => {
            serde_json::from_str(&text).expect("server sent valid json")
        }
        other => panic!("expected text frame, got {other:?}"),
    }
}

/// Receives events until one matches `event`, discarding the rest.
async fn wait_for(ws: &mut ClientWs, event: &str) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining =
            deadline.saturating_duration_since(tokio::time::Instant::now());
        let msg = tokio::time::timeout(remaining, ws.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {event}"))
            .unwrap_or_else(|| panic!("connection closed waiting for {event}"))
            .expect("websocket error");
        if let Message::Text(text) = msg {
            let value: Value =
                serde_json::from_str(&text).expect("server sent valid json");
            if value["event"] == event {
                return value;
            }
        }
    }
}

/// Sends a guest `hello` and returns the `welcome` payload.
async fn hello_guest(ws: &mut ClientWs, name: &str) -> Value {
    send_json(ws, json!({"event": "hello", "guest_name": name})).await;
    let welcome = recv_json(ws).await;
    assert_eq!(welcome["event"], "welcome", "got {welcome}");
    welcome
}

async fn hello_token(ws: &mut ClientWs, token: &str) -> Value {
    send_json(ws, json!({"event": "hello", "token": token})).await;
    let welcome = recv_json(ws).await;
    assert_eq!(welcome["event"], "welcome", "got {welcome}");
    welcome
}

/// Creates a lobby and returns its invite code.
async fn create_lobby(ws: &mut ClientWs, settings: Option<Value>) -> String {
    send_json(
        ws,
        json!({
            "event": "lobby:create",
            "character": "wizard",
            "settings": settings,
        }),
    )
    .await;
    let created = recv_json(ws).await;
    assert_eq!(created["event"], "lobby:created", "got {created}");
    created["lobby"]["code"]
        .as_str()
        .expect("lobby code")
        .to_string()
}

fn one_question_settings() -> Value {
    json!({
        "question_count": 1,
        "time_limit_secs": 60,
        "question_set": "general",
    })
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_guest_hello_gets_welcome() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let welcome = hello_guest(&mut ws, "alice").await;
    assert_eq!(welcome["username"], "alice");
    assert_eq!(welcome["resumed"], false);
    assert!(welcome["player_id"].is_u64());
}

#[tokio::test]
async fn test_hello_without_credentials_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, json!({"event": "hello"})).await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["code"], "unauthorized");
}

#[tokio::test]
async fn test_hello_with_invalid_guest_name_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, json!({"event": "hello", "guest_name": "x"})).await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["code"], "unauthorized");
}

#[tokio::test]
async fn test_first_event_must_be_hello() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_json(
        &mut ws,
        json!({"event": "lobby:create", "character": "wizard"}),
    )
    .await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["code"], "unauthorized");
}

#[tokio::test]
async fn test_second_hello_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    hello_guest(&mut ws, "alice").await;

    send_json(&mut ws, json!({"event": "hello", "guest_name": "bob"})).await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["code"], "bad_state");
}

// =========================================================================
// Lobby flow
// =========================================================================

#[tokio::test]
async fn test_create_lobby_returns_snapshot() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    hello_guest(&mut ws, "alice").await;

    send_json(
        &mut ws,
        json!({"event": "lobby:create", "character": "wizard"}),
    )
    .await;
    let created = recv_json(&mut ws).await;
    assert_eq!(created["event"], "lobby:created");

    let lobby = &created["lobby"];
    assert_eq!(lobby["code"].as_str().expect("code").len(), 6);
    assert_eq!(lobby["status"], "waiting");
    assert_eq!(lobby["players"][0]["username"], "alice");
    assert_eq!(lobby["players"][0]["is_host"], true);
    assert!(lobby["game"].is_null());
}

#[tokio::test]
async fn test_join_lobby_by_code() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    hello_guest(&mut ws1, "alice").await;
    let code = create_lobby(&mut ws1, None).await;

    let mut ws2 = connect(&addr).await;
    hello_guest(&mut ws2, "bob").await;
    // Lowercase on purpose; codes are normalized server-side.
    send_json(
        &mut ws2,
        json!({
            "event": "lobby:join",
            "code": code.to_lowercase(),
            "character": "knight",
        }),
    )
    .await;

    let joined = recv_json(&mut ws2).await;
    assert_eq!(joined["event"], "lobby:joined");
    assert_eq!(joined["lobby"]["code"], code.as_str());
    assert_eq!(joined["lobby"]["players"].as_array().expect("players").len(), 2);

    let notified = wait_for(&mut ws1, "lobby:player_joined").await;
    assert_eq!(notified["player"]["username"], "bob");
    assert_eq!(notified["player"]["is_host"], false);
}

#[tokio::test]
async fn test_join_unknown_code_reports_not_found() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    hello_guest(&mut ws, "alice").await;

    send_json(
        &mut ws,
        json!({"event": "lobby:join", "code": "ZZZZ99", "character": "elf"}),
    )
    .await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["code"], "lobby_not_found");
}

#[tokio::test]
async fn test_join_malformed_code_reports_validation() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    hello_guest(&mut ws, "alice").await;

    send_json(
        &mut ws,
        json!({"event": "lobby:join", "code": "abc", "character": "elf"}),
    )
    .await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["code"], "validation");
}

#[tokio::test]
async fn test_leave_notifies_remaining_players() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    hello_guest(&mut ws1, "alice").await;
    let code = create_lobby(&mut ws1, None).await;

    let mut ws2 = connect(&addr).await;
    hello_guest(&mut ws2, "bob").await;
    send_json(
        &mut ws2,
        json!({"event": "lobby:join", "code": code, "character": "knight"}),
    )
    .await;
    recv_json(&mut ws2).await; // lobby:joined

    send_json(&mut ws2, json!({"event": "lobby:leave"})).await;

    let left = wait_for(&mut ws1, "lobby:player_left").await;
    assert_eq!(left["username"], "bob");
    assert!(left["new_host"].is_null());
}

#[tokio::test]
async fn test_chat_reaches_other_players() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    hello_guest(&mut ws1, "alice").await;
    let code = create_lobby(&mut ws1, None).await;

    let mut ws2 = connect(&addr).await;
    hello_guest(&mut ws2, "bob").await;
    send_json(
        &mut ws2,
        json!({"event": "lobby:join", "code": code, "character": "knight"}),
    )
    .await;
    recv_json(&mut ws2).await; // lobby:joined

    send_json(
        &mut ws2,
        json!({"event": "lobby:broadcast", "message": "hi all"}),
    )
    .await;

    let msg = wait_for(&mut ws1, "lobby:message").await;
    assert_eq!(msg["username"], "bob");
    assert_eq!(msg["message"], "hi all");
}

#[tokio::test]
async fn test_start_game_requires_host() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    hello_guest(&mut ws1, "alice").await;
    let code = create_lobby(&mut ws1, None).await;

    let mut ws2 = connect(&addr).await;
    hello_guest(&mut ws2, "bob").await;
    send_json(
        &mut ws2,
        json!({"event": "lobby:join", "code": code, "character": "knight"}),
    )
    .await;
    recv_json(&mut ws2).await; // lobby:joined

    send_json(&mut ws2, json!({"event": "lobby:start_game"})).await;
    let err = wait_for(&mut ws2, "error").await;
    assert_eq!(err["code"], "not_host");
}

#[tokio::test]
async fn test_answer_outside_lobby_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    hello_guest(&mut ws, "alice").await;

    send_json(&mut ws, json!({"event": "game:answer", "answer_index": 0}))
        .await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["code"], "bad_state");
}

#[tokio::test]
async fn test_malformed_event_keeps_connection_alive() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    hello_guest(&mut ws, "alice").await;

    ws.send(Message::text("not json at all"))
        .await
        .expect("send garbage");
    let err = recv_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["code"], "validation");

    // The connection survived; normal traffic still works.
    let code = create_lobby(&mut ws, None).await;
    assert_eq!(code.len(), 6);
}

// =========================================================================
// Full game flow
// =========================================================================

#[tokio::test]
async fn test_full_game_over_websockets() {
    let addr = start_server().await;

    let mut ws1 = connect(&addr).await;
    hello_guest(&mut ws1, "alice").await;
    let code = create_lobby(&mut ws1, Some(one_question_settings())).await;

    let mut ws2 = connect(&addr).await;
    hello_guest(&mut ws2, "bob").await;
    send_json(
        &mut ws2,
        json!({"event": "lobby:join", "code": code, "character": "knight"}),
    )
    .await;
    recv_json(&mut ws2).await; // lobby:joined

    send_json(&mut ws1, json!({"event": "lobby:ready", "ready": true})).await;
    send_json(&mut ws2, json!({"event": "lobby:ready", "ready": true})).await;
    // Both ready events are broadcast; don't start until bob's landed.
    loop {
        let ready = wait_for(&mut ws1, "lobby:player_ready").await;
        if ready["username"] == "bob" {
            break;
        }
    }

    send_json(&mut ws1, json!({"event": "lobby:start_game"})).await;

    let started1 = wait_for(&mut ws1, "lobby:game_started").await;
    let started2 = wait_for(&mut ws2, "lobby:game_started").await;
    assert_eq!(started1["question_number"], 1);
    assert_eq!(started1["total_questions"], 1);
    assert_eq!(started1["question"]["prompt"], started2["question"]["prompt"]);
    // The live question payload must never reveal the answer.
    assert!(started1["question"].get("correct_index").is_none());

    // Alice answers correctly, bob doesn't; all answered → early resolve.
    send_json(&mut ws1, json!({"event": "game:answer", "answer_index": 1}))
        .await;
    send_json(&mut ws2, json!({"event": "game:answer", "answer_index": 0}))
        .await;

    let result1 = wait_for(&mut ws1, "game:answer_result").await;
    assert_eq!(result1["is_correct"], true);
    assert_eq!(result1["correct_index"], 1);
    assert!(result1["points_awarded"].as_u64().expect("points") > 0);

    let result2 = wait_for(&mut ws2, "game:answer_result").await;
    assert_eq!(result2["is_correct"], false);
    assert_eq!(result2["score"], 0);

    let scores = wait_for(&mut ws1, "game:score_update").await;
    assert_eq!(scores["scoreboard"][0]["username"], "alice");

    let ended = wait_for(&mut ws1, "game:ended").await;
    let standings = ended["standings"].as_array().expect("standings");
    assert_eq!(standings.len(), 2);
    assert_eq!(standings[0]["username"], "alice");
    assert_eq!(standings[0]["rank"], 1);
    assert_eq!(standings[1]["username"], "bob");
    assert!(ended["level_ups"].as_array().expect("level_ups").is_empty());
}

// =========================================================================
// Reconnection
// =========================================================================

#[tokio::test]
async fn test_token_player_resumes_lobby_seat() {
    let addr = start_server_with(NumericTokenAuth).await;

    let mut ws1 = connect(&addr).await;
    let welcome = hello_token(&mut ws1, "1").await;
    assert_eq!(welcome["username"], "user1");
    let code = create_lobby(&mut ws1, None).await;

    let mut ws2 = connect(&addr).await;
    hello_token(&mut ws2, "2").await;
    send_json(
        &mut ws2,
        json!({"event": "lobby:join", "code": code, "character": "knight"}),
    )
    .await;
    recv_json(&mut ws2).await; // lobby:joined

    // Drop the host's connection without leaving the lobby.
    ws1.close(None).await.expect("close");
    drop(ws1);

    let dropped = wait_for(&mut ws2, "lobby:player_disconnected").await;
    assert_eq!(dropped["username"], "user1");

    // Same token within the grace period reclaims the seat.
    let mut ws1b = connect(&addr).await;
    let welcome = hello_token(&mut ws1b, "1").await;
    assert_eq!(welcome["resumed"], true);

    let snapshot = wait_for(&mut ws1b, "lobby:snapshot").await;
    assert_eq!(snapshot["lobby"]["code"], code.as_str());
    assert_eq!(
        snapshot["lobby"]["players"].as_array().expect("players").len(),
        2
    );

    let back = wait_for(&mut ws2, "lobby:player_reconnected").await;
    assert_eq!(back["username"], "user1");
}

#[tokio::test]
async fn test_reconnect_mid_question_resyncs_game_state() {
    let addr = start_server_with(NumericTokenAuth).await;

    let mut ws1 = connect(&addr).await;
    hello_token(&mut ws1, "1").await;
    let code = create_lobby(&mut ws1, Some(one_question_settings())).await;

    let mut ws2 = connect(&addr).await;
    hello_token(&mut ws2, "2").await;
    send_json(
        &mut ws2,
        json!({"event": "lobby:join", "code": code, "character": "knight"}),
    )
    .await;
    recv_json(&mut ws2).await; // lobby:joined

    send_json(&mut ws1, json!({"event": "lobby:ready", "ready": true})).await;
    send_json(&mut ws2, json!({"event": "lobby:ready", "ready": true})).await;
    loop {
        let ready = wait_for(&mut ws1, "lobby:player_ready").await;
        if ready["username"] == "user2" {
            break;
        }
    }

    send_json(&mut ws1, json!({"event": "lobby:start_game"})).await;
    let started = wait_for(&mut ws2, "lobby:game_started").await;
    let prompt = started["question"]["prompt"].clone();

    // user2 locks in an answer, then drops mid-question. The 60s limit
    // keeps the question live, so nothing resolves in the meantime.
    send_json(&mut ws2, json!({"event": "game:answer", "answer_index": 2}))
        .await;
    wait_for(&mut ws2, "game:answer_received").await;
    ws2.close(None).await.expect("close");
    drop(ws2);
    wait_for(&mut ws1, "lobby:player_disconnected").await;

    let mut ws2b = connect(&addr).await;
    let welcome = hello_token(&mut ws2b, "2").await;
    assert_eq!(welcome["resumed"], true);

    // The snapshot carries the in-progress game, this player's own
    // recorded answer, and still no correct_index.
    let snapshot = wait_for(&mut ws2b, "lobby:snapshot").await;
    let lobby = &snapshot["lobby"];
    assert_eq!(lobby["status"], "in_progress");
    let game = &lobby["game"];
    assert_eq!(game["phase"], "question_active");
    assert_eq!(game["question_number"], 1);
    assert_eq!(game["question"]["prompt"], prompt);
    assert!(game["question"].get("correct_index").is_none());
    assert_eq!(game["your_answer"], 2);
    assert!(game["time_remaining_ms"].as_u64().expect("time") > 0);
}
