//! HTTP pull endpoint and WebSocket push channel.
//!
//! - `GET /diagram`: one on-demand refresh, answered as a JSON array.
//! - `GET /ws`: catch-up snapshot on connect, then every broadcast `Push`.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{Json, Response};
use axum::routing::get;
use schemascope_core::Diagram;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{Broadcaster, Push};
use crate::refresh::Refresher;

#[derive(Clone)]
pub struct AppState {
    pub refresher: Arc<Refresher>,
    pub broadcaster: Arc<Broadcaster>,
    pub cancel: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/diagram", get(diagram))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Serve on a pre-bound listener until `cancel` fires.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let cancel = state.cancel.clone();
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn diagram(State(state): State<AppState>) -> Json<Vec<Diagram>> {
    tracing::debug!("diagram pull");
    Json(state.refresher.refresh().await)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_observer(socket, state))
}

fn encode(push: &Push) -> Option<Message> {
    match serde_json::to_string(push) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(error = %e, "push encoding failed");
            None
        }
    }
}

async fn send(socket: &mut WebSocket, push: &Push) -> bool {
    match encode(push) {
        Some(msg) => socket.send(msg).await.is_ok(),
        // Nothing to send; keep the observer.
        None => true,
    }
}

async fn handle_observer(mut socket: WebSocket, state: AppState) {
    let (snapshot, mut rx) = state.broadcaster.register(&state.refresher).await;
    tracing::debug!(
        observers = state.broadcaster.observer_count(),
        diagrams = snapshot.len(),
        "observer connected"
    );

    if !send(&mut socket, &Push::UpdateDiagram(snapshot)).await {
        tracing::debug!("observer dropped before catch-up");
        return;
    }

    loop {
        tokio::select! {
            push = rx.recv() => match push {
                Ok(push) => {
                    if !send(&mut socket, &push).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    // The next snapshot supersedes whatever was skipped.
                    tracing::warn!(missed, "observer lagging, messages dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            },
            _ = state.cancel.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    tracing::debug!("observer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeConnector, FakeSource, table};
    use futures_util::{SinkExt, StreamExt};
    use schemascope_core::{ChangeEvent, DiagramBuilder};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    struct TestServer {
        addr: SocketAddr,
        state: AppState,
        handle: Option<tokio::task::JoinHandle<std::io::Result<()>>>,
    }

    async fn start_test_server(connector: FakeConnector) -> TestServer {
        let state = AppState {
            refresher: Arc::new(Refresher::new(
                connector.configs(),
                Arc::new(connector),
                DiagramBuilder::default(),
                Duration::from_millis(200),
            )),
            broadcaster: Arc::new(Broadcaster::new()),
            cancel: CancellationToken::new(),
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(serve(listener, state.clone()));
        TestServer {
            addr,
            state,
            handle: Some(handle),
        }
    }

    impl TestServer {
        async fn connect(&self) -> Client {
            let url = format!("ws://{}/ws", self.addr);
            let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
            ws
        }

        async fn get(&self, path: &str) -> String {
            let mut stream = tokio::net::TcpStream::connect(self.addr).await.unwrap();
            let req = format!(
                "GET {path} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
                self.addr
            );
            stream.write_all(req.as_bytes()).await.unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).await.unwrap();
            buf
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.state.cancel.cancel();
        }
    }

    async fn recv_json(ws: &mut Client) -> serde_json::Value {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for push")
            .expect("stream ended")
            .expect("read error");
        let WsMessage::Text(text) = msg else {
            panic!("expected text frame, got {msg:?}");
        };
        serde_json::from_str(&text).unwrap()
    }

    fn shop() -> FakeConnector {
        FakeConnector::new().with(
            "Shop",
            FakeSource::entities(vec![table("orders", &["id", "total"])]),
        )
    }

    #[tokio::test]
    async fn http_pull_returns_diagram_array() {
        let server = start_test_server(shop()).await;
        let response = server.get("/diagram").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");

        let body = response.split("\r\n\r\n").nth(1).unwrap();
        let v: serde_json::Value = serde_json::from_str(body).unwrap();
        let arr = v.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["name"], "Shop/orders");
        assert_eq!(arr[0]["size"], "small");
        assert!(arr[0]["diagram"].as_str().unwrap().contains("orders (Shop)"));
    }

    #[tokio::test]
    async fn http_pull_does_not_broadcast() {
        let server = start_test_server(shop()).await;
        server.get("/diagram").await;
        assert_eq!(server.state.broadcaster.snapshots_published(), 0);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let server = start_test_server(shop()).await;
        let response = server.get("/static/index.html").await;
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    }

    #[tokio::test]
    async fn observer_gets_catch_up_snapshot_on_connect() {
        let server = start_test_server(shop()).await;
        let mut ws = server.connect().await;
        let v = recv_json(&mut ws).await;
        assert_eq!(v["type"], "update_diagram");
        assert_eq!(v["data"][0]["name"], "Shop/orders");
    }

    #[tokio::test]
    async fn catch_up_uses_latest_published_snapshot() {
        let server = start_test_server(FakeConnector::new()).await;
        let builder = DiagramBuilder::default();
        server
            .state
            .broadcaster
            .publish_snapshot(builder.build("S", &[table("old", &["id"])]))
            .await;
        server
            .state
            .broadcaster
            .publish_snapshot(builder.build("S", &[table("new", &["id"])]))
            .await;

        let mut ws = server.connect().await;
        let v = recv_json(&mut ws).await;
        assert_eq!(v["data"][0]["name"], "S/new");
    }

    #[tokio::test]
    async fn observers_receive_broadcasts_in_order() {
        let server = start_test_server(shop()).await;
        let mut a = server.connect().await;
        let mut b = server.connect().await;
        recv_json(&mut a).await;
        recv_json(&mut b).await;

        let broadcaster = &server.state.broadcaster;
        broadcaster
            .publish_snapshot(server.state.refresher.refresh().await)
            .await;
        broadcaster.publish_edge(ChangeEvent {
            name: "Shop/orders".into(),
            from: "Shop_orders".into(),
            to: "Shop_orders_total".into(),
        });

        for ws in [&mut a, &mut b] {
            assert_eq!(recv_json(ws).await["type"], "update_diagram");
            let edge = recv_json(ws).await;
            assert_eq!(edge["type"], "data_flow");
            assert_eq!(edge["data"]["to"], "Shop_orders_total");
        }
    }

    #[tokio::test]
    async fn disconnected_observer_does_not_affect_others() {
        let server = start_test_server(shop()).await;
        let mut gone = server.connect().await;
        let mut stays = server.connect().await;
        recv_json(&mut gone).await;
        recv_json(&mut stays).await;

        gone.close(None).await.unwrap();
        drop(gone);

        server
            .state
            .broadcaster
            .publish_snapshot(server.state.refresher.refresh().await)
            .await;
        assert_eq!(recv_json(&mut stays).await["type"], "update_diagram");
    }

    #[tokio::test]
    async fn client_messages_are_ignored() {
        let server = start_test_server(shop()).await;
        let mut ws = server.connect().await;
        recv_json(&mut ws).await;
        ws.send(WsMessage::Text("hello".into())).await.unwrap();

        server
            .state
            .broadcaster
            .publish_snapshot(Vec::new())
            .await;
        let v = recv_json(&mut ws).await;
        assert_eq!(v["type"], "update_diagram");
        assert_eq!(v["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn cancel_stops_server() {
        let mut server = start_test_server(shop()).await;
        let mut ws = server.connect().await;
        recv_json(&mut ws).await;

        let handle = server.handle.take().unwrap();
        server.state.cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .expect("join");
        assert!(result.is_ok());
    }
}
