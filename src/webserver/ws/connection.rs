/// WebSocket connection handler
///
/// One task per socket:
/// - reserve a connection slot (close 4100 when full)
/// - send `pusher:connection_established`
/// - forward frames from the hub queue to the socket
/// - handle subscribe/unsubscribe/ping
/// - keepalive pings, idle and pong timeouts (close 4201)
/// - on exit, leave every channel and release the slot
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::FanoutError;
use crate::hub::{protocol, Connection, FanoutEngine, Frame, QueueConnection};
use crate::logger::{self, LogTag};
use crate::webserver::state::AppState;

use super::health::{ConnectionHealth, HealthConfig};
use super::message::{self, ClientCommand, ClientMessage};

type WsSender = SplitSink<WebSocket, Message>;

/// Drive a WebSocket for `app_id` until either side closes it
pub async fn handle_connection(socket: WebSocket, app_id: String, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let engine = Arc::clone(&state.engine);

    if !engine.accepts_app(&app_id) {
        logger::warning(
            LogTag::Websocket,
            &format!("rejecting socket for unknown application {}", app_id),
        );
        close_with(&mut ws_tx, protocol::ERROR_APPLICATION_UNKNOWN, "Application does not exist").await;
        return;
    }

    let (conn, mut hub_rx) = match engine.open_connection() {
        Ok(pair) => pair,
        Err(FanoutError::OverCapacity { .. }) => {
            close_with(&mut ws_tx, protocol::ERROR_OVER_CAPACITY, "Over capacity").await;
            return;
        }
        Err(e) => {
            logger::warning(LogTag::Websocket, &format!("socket refused: {}", e));
            close_with(&mut ws_tx, protocol::ERROR_GENERIC_RECONNECT, "Server unavailable").await;
            return;
        }
    };

    let socket_id = message::generate_socket_id();
    let conn_id = conn.id();

    let established = message::connection_established(
        &socket_id,
        state.websocket.activity_timeout_secs,
    );
    let greeted = match established {
        Ok(frame) => send_frame(&mut ws_tx, &frame).await.is_ok(),
        Err(e) => {
            logger::error(
                LogTag::Websocket,
                &format!("failed to encode connection_established: {}", e),
            );
            false
        }
    };
    if !greeted {
        engine.disconnect(&app_id, conn.as_ref());
        return;
    }

    logger::debug(
        LogTag::Websocket,
        &format!("connection {} ({}) opened for {}", conn_id, socket_id, app_id),
    );

    let mut health = ConnectionHealth::new(HealthConfig::from(state.websocket.as_ref()));
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            biased;

            // Hub gave up on this connection (failed write or shutdown)
            _ = conn.closed() => {
                logger::debug(
                    LogTag::Websocket,
                    &format!("connection {}: closed by hub", conn_id),
                );
                close_with(&mut ws_tx, protocol::ERROR_GENERIC_RECONNECT, "Connection dropped").await;
                break;
            }

            Some(frame) = hub_rx.recv() => {
                if let Err(e) = send_frame(&mut ws_tx, &frame).await {
                    logger::warning(
                        LogTag::Websocket,
                        &format!("connection {}: send failed: {}", conn_id, e),
                    );
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        health.record_activity();
                        let mut failed = false;
                        for reply in handle_client_text(&engine, &app_id, &conn, &text) {
                            if send_frame(&mut ws_tx, &reply).await.is_err() {
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        close_with(&mut ws_tx, protocol::ERROR_UNSUPPORTED_FRAME, "Binary frames are not supported").await;
                        break;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        health.record_activity();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        logger::debug(
                            LogTag::Websocket,
                            &format!("connection {}: client closed", conn_id),
                        );
                        break;
                    }
                    Some(Err(e)) => {
                        logger::warning(
                            LogTag::Websocket,
                            &format!("connection {}: websocket error: {}", conn_id, e),
                        );
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if health.is_idle() {
                    logger::debug(
                        LogTag::Websocket,
                        &format!(
                            "connection {}: idle for {}s",
                            conn_id,
                            health.seconds_since_activity()
                        ),
                    );
                    close_with(&mut ws_tx, protocol::ERROR_PONG_TIMEOUT, "Idle timeout").await;
                    break;
                }
                if health.is_pong_overdue() {
                    logger::debug(
                        LogTag::Websocket,
                        &format!("connection {}: pong timeout", conn_id),
                    );
                    close_with(&mut ws_tx, protocol::ERROR_PONG_TIMEOUT, "Pong reply not received").await;
                    break;
                }
                if health.needs_ping() {
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    health.record_ping();
                }
            }
        }
    }

    engine.disconnect(&app_id, conn.as_ref());
    logger::debug(
        LogTag::Websocket,
        &format!("connection {} ({}) closed", conn_id, socket_id),
    );
}

/// Apply one client text frame and return the frames to send back
pub(crate) fn handle_client_text(
    engine: &FanoutEngine,
    app_id: &str,
    conn: &Arc<QueueConnection>,
    text: &str,
) -> Vec<Frame> {
    let msg = match ClientMessage::parse(text) {
        Ok(msg) => msg,
        Err(e) => {
            logger::debug(
                LogTag::Websocket,
                &format!("connection {}: invalid message: {}", conn.id(), e),
            );
            return reply(message::error(protocol::ERROR_GENERIC_RECONNECT, "Invalid JSON"));
        }
    };

    match msg.command() {
        ClientCommand::Ping => reply(message::pong()),

        ClientCommand::Subscribe { channel } => {
            let subscriber: Arc<dyn Connection> = conn.clone();
            match engine.subscribe(app_id, &channel, subscriber) {
                Ok(_) => reply(message::subscription_succeeded(&channel)),
                Err(e) => {
                    logger::debug(
                        LogTag::Websocket,
                        &format!("connection {}: subscribe refused: {}", conn.id(), e),
                    );
                    let code = match e {
                        FanoutError::ChannelRejected { .. } => protocol::ERROR_SUBSCRIPTION_DENIED,
                        FanoutError::UnknownApplication { .. } => protocol::ERROR_APPLICATION_UNKNOWN,
                        _ => protocol::ERROR_GENERIC_RECONNECT,
                    };
                    reply(message::error(code, &e.to_string()))
                }
            }
        }

        ClientCommand::Unsubscribe { channel } => {
            engine.unsubscribe(app_id, &channel, conn.id());
            Vec::new()
        }

        ClientCommand::MissingChannel { event } => reply(message::error(
            protocol::ERROR_GENERIC_RECONNECT,
            &format!("{} requires a channel", event),
        )),

        ClientCommand::Unsupported { event } => {
            logger::verbose(
                LogTag::Websocket,
                &format!("connection {}: ignoring event {}", conn.id(), event),
            );
            Vec::new()
        }
    }
}

fn reply(frame: Result<Frame, serde_json::Error>) -> Vec<Frame> {
    match frame {
        Ok(frame) => vec![frame],
        Err(e) => {
            logger::error(
                LogTag::Websocket,
                &format!("failed to encode reply: {}", e),
            );
            Vec::new()
        }
    }
}

async fn send_frame(ws_tx: &mut WsSender, frame: &Frame) -> Result<(), axum::Error> {
    ws_tx.send(Message::Text(frame.as_str().to_string())).await
}

async fn close_with(ws_tx: &mut WsSender, code: u16, reason: &'static str) {
    let _ = ws_tx
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        })))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HubConfig, WebsocketConfig};
    use crate::webserver::routes;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    fn parse(frame: &Frame) -> serde_json::Value {
        serde_json::from_str(frame.as_str()).unwrap()
    }

    fn error_code(frame: &Frame) -> u64 {
        let value = parse(frame);
        let data: serde_json::Value =
            serde_json::from_str(value["data"].as_str().unwrap()).unwrap();
        data["code"].as_u64().unwrap()
    }

    #[test]
    fn test_subscribe_then_receive_publish() {
        let engine = FanoutEngine::new(HubConfig::default());
        let (conn, mut rx) = engine.open_connection().unwrap();

        let replies = handle_client_text(
            &engine,
            "app1",
            &conn,
            r#"{"event":"pusher:subscribe","data":{"channel":"room1"}}"#,
        );
        assert_eq!(replies.len(), 1);
        assert_eq!(
            parse(&replies[0])["event"],
            "pusher_internal:subscription_succeeded"
        );

        assert!(engine.publish("app1", "room1", "msg", "hello"));
        assert_eq!(
            rx.try_recv().unwrap().as_str(),
            r#"{"event":"msg","data":"hello"}"#
        );
    }

    #[test]
    fn test_private_channel_denied() {
        let engine = FanoutEngine::new(HubConfig::default());
        let (conn, _rx) = engine.open_connection().unwrap();

        let replies = handle_client_text(
            &engine,
            "app1",
            &conn,
            r#"{"event":"pusher:subscribe","data":{"channel":"private-user.1"}}"#,
        );
        assert_eq!(error_code(&replies[0]), 4009);
        assert_eq!(engine.registry().channel_count("app1"), 0);
    }

    #[test]
    fn test_invalid_json_and_ping() {
        let engine = FanoutEngine::new(HubConfig::default());
        let (conn, _rx) = engine.open_connection().unwrap();

        let replies = handle_client_text(&engine, "app1", &conn, "{not json");
        assert_eq!(error_code(&replies[0]), 4200);

        let replies = handle_client_text(&engine, "app1", &conn, r#"{"event":"pusher:ping","data":{}}"#);
        assert_eq!(parse(&replies[0])["event"], "pusher:pong");
    }

    // ------------------------------------------------------------------------
    // Socket loop, driven over a real listener
    // ------------------------------------------------------------------------

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;
    type ClientFrame = Option<Result<WsMessage, tungstenite::Error>>;

    async fn serve(hub: HubConfig, websocket: WebsocketConfig) -> (Arc<FanoutEngine>, String) {
        let engine = Arc::new(FanoutEngine::new(hub));
        let state = Arc::new(AppState::new(Arc::clone(&engine), websocket));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, routes::create_router(state)).await });
        (engine, format!("ws://{}/app", addr))
    }

    async fn connect(base: &str, app_id: &str) -> Client {
        let (client, _) = connect_async(format!("{}/{}", base, app_id)).await.unwrap();
        client
    }

    async fn next_message(client: &mut Client) -> ClientFrame {
        tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no frame within 5s")
    }

    async fn next_event(client: &mut Client) -> serde_json::Value {
        loop {
            match next_message(client).await {
                Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    }

    async fn close_code(client: &mut Client) -> u16 {
        loop {
            match next_message(client).await {
                Some(Ok(WsMessage::Close(Some(frame)))) => return u16::from(frame.code),
                Some(Ok(_)) => continue,
                other => panic!("expected a close frame, got {:?}", other),
            }
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached within 5s");
    }

    #[tokio::test]
    async fn test_socket_subscribe_and_receive() {
        let (engine, base) = serve(HubConfig::default(), WebsocketConfig::default()).await;
        let mut client = connect(&base, "app1").await;

        let established = next_event(&mut client).await;
        assert_eq!(established["event"], "pusher:connection_established");
        let data: serde_json::Value =
            serde_json::from_str(established["data"].as_str().unwrap()).unwrap();
        assert_eq!(data["activity_timeout"], 120);

        client
            .send(WsMessage::Text(
                r#"{"event":"pusher:subscribe","data":{"channel":"room1"}}"#.to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(
            next_event(&mut client).await["event"],
            "pusher_internal:subscription_succeeded"
        );

        assert!(engine.publish("app1", "room1", "msg", "hello"));
        let event = next_event(&mut client).await;
        assert_eq!(event["event"], "msg");
        assert_eq!(event["data"], "hello");
    }

    #[tokio::test]
    async fn test_socket_unknown_app_closed() {
        let hub = HubConfig {
            allowed_apps: vec!["app1".to_string()],
            ..HubConfig::default()
        };
        let (engine, base) = serve(hub, WebsocketConfig::default()).await;
        let mut client = connect(&base, "app2").await;

        assert_eq!(close_code(&mut client).await, protocol::ERROR_APPLICATION_UNKNOWN);
        assert_eq!(engine.metrics().total_connections, 0);
    }

    #[tokio::test]
    async fn test_socket_over_capacity_closed() {
        let hub = HubConfig {
            max_connections: 1,
            ..HubConfig::default()
        };
        let (engine, base) = serve(hub, WebsocketConfig::default()).await;

        let mut first = connect(&base, "app1").await;
        assert_eq!(
            next_event(&mut first).await["event"],
            "pusher:connection_established"
        );

        let mut second = connect(&base, "app1").await;
        assert_eq!(close_code(&mut second).await, protocol::ERROR_OVER_CAPACITY);
        assert_eq!(engine.metrics().rejected_connections, 1);
        assert_eq!(engine.metrics().active_connections, 1);
    }

    #[tokio::test]
    async fn test_socket_binary_frame_closed_and_cleaned_up() {
        let (engine, base) = serve(HubConfig::default(), WebsocketConfig::default()).await;
        let mut client = connect(&base, "app1").await;
        next_event(&mut client).await;

        client
            .send(WsMessage::Text(
                r#"{"event":"pusher:subscribe","data":{"channel":"room1"}}"#.to_string(),
            ))
            .await
            .unwrap();
        next_event(&mut client).await;
        assert_eq!(engine.registry().subscriber_count("app1", "room1"), 1);

        client.send(WsMessage::Binary(vec![1, 2, 3])).await.unwrap();
        assert_eq!(close_code(&mut client).await, protocol::ERROR_UNSUPPORTED_FRAME);

        wait_for(|| engine.metrics().active_connections == 0).await;
        assert_eq!(engine.registry().channel_count("app1"), 0);
    }

    #[tokio::test]
    async fn test_socket_closed_when_hub_drops_connection() {
        let (engine, base) = serve(HubConfig::default(), WebsocketConfig::default()).await;
        let mut client = connect(&base, "app1").await;
        next_event(&mut client).await;

        for channel in ["room1", "room2"] {
            client
                .send(WsMessage::Text(format!(
                    r#"{{"event":"pusher:subscribe","data":{{"channel":"{}"}}}}"#,
                    channel
                )))
                .await
                .unwrap();
            next_event(&mut client).await;
        }

        let subscriber = engine.registry().subscribers_of("app1", "room1").remove(0);
        let id = subscriber.id();
        assert_eq!(engine.registry().channels_of("app1", id).len(), 2);

        subscriber.close();
        assert_eq!(close_code(&mut client).await, protocol::ERROR_GENERIC_RECONNECT);

        wait_for(|| engine.registry().channels_of("app1", id).is_empty()).await;
        wait_for(|| engine.metrics().active_connections == 0).await;
        assert_eq!(engine.metrics().channels_vacated, 2);
    }

    #[tokio::test]
    async fn test_socket_idle_timeout() {
        let websocket = WebsocketConfig {
            activity_timeout_secs: 60,
            idle_timeout_secs: 1,
            pong_timeout_secs: 30,
        };
        let (engine, base) = serve(HubConfig::default(), websocket).await;
        let mut client = connect(&base, "app1").await;
        next_event(&mut client).await;

        assert_eq!(close_code(&mut client).await, protocol::ERROR_PONG_TIMEOUT);
        wait_for(|| engine.metrics().active_connections == 0).await;
    }

    #[test]
    fn test_unsubscribe_is_silent() {
        let engine = FanoutEngine::new(HubConfig::default());
        let (conn, _rx) = engine.open_connection().unwrap();

        handle_client_text(
            &engine,
            "app1",
            &conn,
            r#"{"event":"pusher:subscribe","data":{"channel":"room1"}}"#,
        );
        let replies = handle_client_text(
            &engine,
            "app1",
            &conn,
            r#"{"event":"pusher:unsubscribe","data":{"channel":"room1"}}"#,
        );
        assert!(replies.is_empty());
        assert!(!engine.registry().is_subscribed("app1", "room1", conn.id()));
    }
}
