use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use shared::auth::Principal;
use shared::models::QueueSession;

use crate::hub::{ConnectionHub, ConnectionId, HubMessage};
use crate::models::{
    ClientEnvelope, ReadyUpRequest, SearchRequest, ServerEvent, TerminateSearchRequest,
    ERROR_CODE_DUPLICATE_DEVICE, ERROR_CODE_UNAUTHORIZED,
};
use crate::services::errors::queue_service_errors::QueueServiceError;
use crate::state::AppState;

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

pub async fn coordinator_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = bearer_token(&headers);
    ws.on_upgrade(move |socket| handle_connection(state, socket, token))
}

fn bearer_token(headers: &HeaderMap) -> String {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or("missing")
        .to_string()
}

async fn handle_connection(state: AppState, socket: WebSocket, token: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let principal = match state.authenticator.verify(&token).await {
        Ok(principal) => principal,
        Err(err) => {
            info!("Coordinator connection rejected: {}", err);
            reject_unauthorized(&mut ws_tx).await;
            return;
        }
    };

    let canonical_topic = match &principal {
        Principal::Player { account_id } => format!("player.{}", account_id),
        Principal::Server(server) => format!("server.{}", server.id),
    };

    // A second device for the same principal displaces the first.
    let kicked = state.hub.kick_members(
        &canonical_topic,
        &ServerEvent::Error {
            code: ERROR_CODE_DUPLICATE_DEVICE,
            error: "Multiple devices connected to coordinator".to_string(),
        },
    );
    if kicked > 0 {
        info!(
            "Disconnected {} previous device(s) on {}",
            kicked, canonical_topic
        );
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection_id = state.hub.register(tx);
    state.hub.join(connection_id, &canonical_topic);

    match &principal {
        Principal::Player { account_id } => {
            info!("Coordinator connected: account {}", account_id);
        }
        Principal::Server(server) => {
            info!("Coordinator connected: game server {}", server.id);
            if let Err(e) = state.server_repository.set_ready(&server.id, true).await {
                error!("Failed to mark game server {} ready: {}", server.id, e);
            }
        }
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                HubMessage::Event(frame) => {
                    if ws_tx.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                HubMessage::Close => {
                    let _ = ws_tx.close().await;
                    break;
                }
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch_event(&state, connection_id, &principal, &text).await,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.hub.unregister(connection_id);
    writer.abort();
    handle_disconnect(&state, &principal).await;
}

async fn reject_unauthorized(ws_tx: &mut SplitSink<WebSocket, Message>) {
    let event = ServerEvent::Error {
        code: ERROR_CODE_UNAUTHORIZED,
        error: "Unauthorized".to_string(),
    };
    if let Ok(frame) = serde_json::to_string(&event) {
        let _ = ws_tx.send(Message::Text(frame)).await;
    }
    let _ = ws_tx.close().await;
}

async fn handle_disconnect(state: &AppState, principal: &Principal) {
    match principal {
        Principal::Player { account_id } => {
            info!("Coordinator disconnected: account {}", account_id);
            match state.queue_service.leave_by_account(account_id).await {
                Ok(Some(session)) => {
                    notify_session_terminated(&state.hub, &session);
                    info!(
                        "Terminated queue session {} after disconnect",
                        session.id
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    error!(
                        "Failed to clean up queue session for account {}: {}",
                        account_id, e
                    );
                }
            }
        }
        Principal::Server(server) => {
            info!("Coordinator disconnected: game server {}", server.id);
            if let Err(e) = state.server_repository.set_ready(&server.id, false).await {
                error!("Failed to mark game server {} not ready: {}", server.id, e);
            }
        }
    }
}

/// The owner's devices leave the dead session; party members get a
/// rejoin signal so their clients can resubscribe or clean up.
fn notify_session_terminated(hub: &ConnectionHub, session: &QueueSession) {
    hub.emit(
        &format!("player.{}", session.account_id),
        &ServerEvent::LeaveSession(session.id.clone()),
    );
    for member in &session.party_members {
        hub.emit(
            &format!("player.{}", member),
            &ServerEvent::JoinSession(session.id.clone()),
        );
    }
}

/// One inbound frame. Failures here are contained to the offending
/// connection: they are answered or dropped, never propagated.
async fn dispatch_event(
    state: &AppState,
    connection_id: ConnectionId,
    principal: &Principal,
    text: &str,
) {
    let envelope: ClientEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!("Dropping malformed coordinator frame: {}", err);
            return;
        }
    };

    match envelope.event.as_str() {
        "joinSession" => handle_join_session(state, connection_id, envelope.data),
        "leaveSession" => handle_leave_session(state, connection_id, envelope.data),
        "beginGameSessionSearch" => {
            handle_begin_search(state, connection_id, principal, envelope.data).await
        }
        "gameReadyUp" => handle_ready_up(state, principal, envelope.data).await,
        "terminateGameSessionSearch" => handle_terminate_search(state, envelope.data).await,
        other => debug!("Unhandled coordinator event: {}", other),
    }
}

fn handle_join_session(state: &AppState, connection_id: ConnectionId, data: Value) {
    if let Ok(session_id) = serde_json::from_value::<String>(data) {
        state
            .hub
            .join(connection_id, &format!("queueSession.{}", session_id));
    }
}

fn handle_leave_session(state: &AppState, connection_id: ConnectionId, data: Value) {
    if let Ok(session_id) = serde_json::from_value::<String>(data) {
        state
            .hub
            .leave(connection_id, &format!("queueSession.{}", session_id));
    }
}

async fn handle_begin_search(
    state: &AppState,
    connection_id: ConnectionId,
    principal: &Principal,
    data: Value,
) {
    // Game servers do not queue.
    let Principal::Player { account_id } = principal else {
        return;
    };

    let request: SearchRequest = match serde_json::from_value(data) {
        Ok(request) => request,
        Err(_) => {
            state.hub.emit_to(
                connection_id,
                &ServerEvent::GameSessionSearchResult {
                    success: false,
                    queue_id: None,
                    created_at: None,
                    error: Some("Invalid search parameters.".to_string()),
                },
            );
            return;
        }
    };

    let session = match state
        .queue_service
        .enqueue(
            account_id,
            request.region,
            request.game_type,
            request.party_members,
        )
        .await
    {
        Ok(session) => session,
        Err(QueueServiceError::ValidationError(_)) => {
            state.hub.emit_to(
                connection_id,
                &ServerEvent::GameSessionSearchResult {
                    success: false,
                    queue_id: None,
                    created_at: None,
                    error: Some("Invalid search parameters.".to_string()),
                },
            );
            return;
        }
        Err(err) => {
            error!(
                "Failed to create queue session for account {}: {}",
                account_id, err
            );
            state.hub.emit_to(
                connection_id,
                &ServerEvent::GameSessionSearchResult {
                    success: false,
                    queue_id: None,
                    created_at: None,
                    error: Some("Failed to queue matchmaking.".to_string()),
                },
            );
            return;
        }
    };

    // Party members subscribe to the session through their own devices.
    for member in &session.party_members {
        state.hub.emit(
            &format!("player.{}", member),
            &ServerEvent::JoinSession(session.id.clone()),
        );
    }

    state
        .hub
        .join(connection_id, &format!("queueSession.{}", session.id));
    state.hub.emit_to(
        connection_id,
        &ServerEvent::GameSessionSearchResult {
            success: true,
            queue_id: Some(session.id.clone()),
            created_at: Some(session.created_at),
            error: None,
        },
    );

    // Assembly must not block the enqueue acknowledgement above.
    let matchmaking_service = state.matchmaking_service.clone();
    let (game_type, region) = (session.game_type, session.region);
    tokio::spawn(async move {
        if let Err(e) = matchmaking_service.run_matchmaking(game_type, region).await {
            error!(
                "Matchmaking pass failed for pool {}#{}: {}",
                game_type, region, e
            );
        }
    });
}

async fn handle_ready_up(state: &AppState, principal: &Principal, data: Value) {
    let Principal::Player { account_id } = principal else {
        return;
    };

    let request: ReadyUpRequest = match serde_json::from_value(data) {
        Ok(request) => request,
        Err(err) => {
            debug!("Dropping malformed ready-up payload: {}", err);
            return;
        }
    };

    if let Err(e) = state
        .readyup_service
        .acknowledge(&request.key, request.timestamp, account_id)
        .await
    {
        error!("Ready-up failed for account {}: {}", account_id, e);
    }
}

async fn handle_terminate_search(state: &AppState, data: Value) {
    let request: TerminateSearchRequest = match serde_json::from_value(data) {
        Ok(request) => request,
        Err(err) => {
            debug!("Dropping malformed terminate payload: {}", err);
            return;
        }
    };

    match state
        .queue_service
        .leave_by_session(&request.queue_session_id)
        .await
    {
        Ok(Some(session)) => notify_session_terminated(&state.hub, &session),
        Ok(None) => {}
        Err(e) => {
            error!(
                "Failed to terminate queue session {}: {}",
                request.queue_session_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use shared::config::{GameType, Region};

    use super::*;
    use crate::services::{
        AllocationService, MatchmakingService, QueueService, ReadyUpService,
    };
    use crate::testing::{
        expect_event, game_server, queue_session, test_connection, MockGameRepository,
        MockGameServerRepository, MockPendingMatchRepository, MockQueueRepository,
    };

    fn test_state(
        queue_repository: Arc<MockQueueRepository>,
        server_repository: Arc<MockGameServerRepository>,
    ) -> AppState {
        let pending_repository = Arc::new(MockPendingMatchRepository::new());
        let game_repository = Arc::new(MockGameRepository::new());
        let hub = Arc::new(ConnectionHub::new());

        let queue_service = Arc::new(QueueService::new(queue_repository.clone()));
        let allocation_service = Arc::new(AllocationService::with_retry(
            server_repository.clone(),
            1,
            Duration::from_millis(0),
        ));
        let readyup_service = Arc::new(ReadyUpService::new(
            pending_repository,
            game_repository,
            queue_repository.clone(),
            hub.clone(),
        ));
        let matchmaking_service = Arc::new(MatchmakingService::new(
            queue_repository,
            allocation_service,
            readyup_service.clone(),
            hub.clone(),
        ));
        let authenticator = Arc::new(shared::auth::Authenticator::with_jwt_secret(
            server_repository.clone(),
            "test-secret".to_string(),
        ));

        AppState {
            hub,
            authenticator,
            queue_service,
            matchmaking_service,
            readyup_service,
            server_repository,
        }
    }

    fn player(account_id: &str) -> Principal {
        Principal::Player {
            account_id: account_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_begin_search_acknowledges_and_joins_session_topic() {
        let state = test_state(
            Arc::new(MockQueueRepository::new()),
            Arc::new(MockGameServerRepository::with_servers(vec![game_server(
                "srv-1",
                Region::Local,
            )])),
        );
        let (connection_id, mut rx) = test_connection(&state.hub);

        let data = serde_json::json!({ "region": "LOCAL", "gameType": "CUSTOM" });
        handle_begin_search(&state, connection_id, &player("acc-1"), data).await;

        let frame = expect_event(&mut rx);
        assert_eq!(frame["event"], "gameSessionSearchResult");
        assert_eq!(frame["data"]["success"], true);

        let queue_id = frame["data"]["queueId"].as_str().unwrap();
        assert_eq!(
            state.hub.member_count(&format!("queueSession.{}", queue_id)),
            1
        );
    }

    #[tokio::test]
    async fn test_begin_search_with_bad_payload_reports_invalid_parameters() {
        let state = test_state(
            Arc::new(MockQueueRepository::new()),
            Arc::new(MockGameServerRepository::new()),
        );
        let (connection_id, mut rx) = test_connection(&state.hub);

        let data = serde_json::json!({ "region": "MOON" });
        handle_begin_search(&state, connection_id, &player("acc-1"), data).await;

        let frame = expect_event(&mut rx);
        assert_eq!(frame["event"], "gameSessionSearchResult");
        assert_eq!(frame["data"]["success"], false);
        assert_eq!(frame["data"]["error"], "Invalid search parameters.");
    }

    #[tokio::test]
    async fn test_begin_search_ignores_game_servers() {
        let state = test_state(
            Arc::new(MockQueueRepository::new()),
            Arc::new(MockGameServerRepository::new()),
        );
        let (connection_id, mut rx) = test_connection(&state.hub);

        let data = serde_json::json!({ "region": "LOCAL", "gameType": "CUSTOM" });
        let server_principal = Principal::Server(game_server("srv-1", Region::Local));
        handle_begin_search(&state, connection_id, &server_principal, data).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_begin_search_notifies_party_members() {
        let state = test_state(
            Arc::new(MockQueueRepository::new()),
            Arc::new(MockGameServerRepository::with_servers(vec![game_server(
                "srv-1",
                Region::Local,
            )])),
        );
        let (owner, mut owner_rx) = test_connection(&state.hub);
        let (member, mut member_rx) = test_connection(&state.hub);
        state.hub.join(member, "player.acc-2");

        let data = serde_json::json!({
            "region": "LOCAL",
            "gameType": "CUSTOM",
            "partyMembers": ["acc-2"]
        });
        handle_begin_search(&state, owner, &player("acc-1"), data).await;

        let member_frame = expect_event(&mut member_rx);
        assert_eq!(member_frame["event"], "joinSession");

        let owner_frame = expect_event(&mut owner_rx);
        assert_eq!(owner_frame["event"], "gameSessionSearchResult");
        assert_eq!(
            member_frame["data"],
            owner_frame["data"]["queueId"]
        );
    }

    #[tokio::test]
    async fn test_disconnect_while_queued_cleans_up_and_notifies_party() {
        let session = queue_session("acc-1", GameType::Custom, Region::Local, &["acc-2"]);
        let queue_repository =
            Arc::new(MockQueueRepository::with_sessions(vec![session.clone()]));
        let state = test_state(queue_repository.clone(), Arc::new(MockGameServerRepository::new()));

        let (member, mut member_rx) = test_connection(&state.hub);
        state.hub.join(member, "player.acc-2");

        handle_disconnect(&state, &player("acc-1")).await;

        assert_eq!(queue_repository.session_count(), 0);
        let frame = expect_event(&mut member_rx);
        assert_eq!(frame["event"], "joinSession");
        assert_eq!(frame["data"], session.id.as_str());
    }

    #[tokio::test]
    async fn test_server_disconnect_marks_server_not_ready() {
        let server_repository = Arc::new(MockGameServerRepository::with_servers(vec![
            game_server("srv-1", Region::Local),
        ]));
        let state = test_state(Arc::new(MockQueueRepository::new()), server_repository.clone());

        handle_disconnect(&state, &Principal::Server(game_server("srv-1", Region::Local)))
            .await;

        assert!(!server_repository.servers.lock().unwrap()["srv-1"].ready);
    }

    #[tokio::test]
    async fn test_terminate_search_notifies_owner_and_party() {
        let session = queue_session("acc-1", GameType::Custom, Region::Local, &["acc-2"]);
        let queue_repository =
            Arc::new(MockQueueRepository::with_sessions(vec![session.clone()]));
        let state = test_state(queue_repository.clone(), Arc::new(MockGameServerRepository::new()));

        let (owner, mut owner_rx) = test_connection(&state.hub);
        state.hub.join(owner, "player.acc-1");

        let data = serde_json::json!({ "queueSessionId": session.id });
        handle_terminate_search(&state, data).await;

        assert_eq!(queue_repository.session_count(), 0);
        let frame = expect_event(&mut owner_rx);
        assert_eq!(frame["event"], "leaveSession");
        assert_eq!(frame["data"], session.id.as_str());
    }

    #[tokio::test]
    async fn test_join_and_leave_session_manage_topic_membership() {
        let state = test_state(
            Arc::new(MockQueueRepository::new()),
            Arc::new(MockGameServerRepository::new()),
        );
        let (connection_id, _rx) = test_connection(&state.hub);

        handle_join_session(&state, connection_id, serde_json::json!("sess-1"));
        assert_eq!(state.hub.member_count("queueSession.sess-1"), 1);

        handle_leave_session(&state, connection_id, serde_json::json!("sess-1"));
        assert_eq!(state.hub.member_count("queueSession.sess-1"), 0);
    }
}
