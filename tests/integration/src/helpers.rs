//! Test helpers for integration tests
//!
//! Spawns an in-process gateway on an ephemeral port and drives it with real
//! WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chat_common::{CorsConfig, JwtService, RealtimeConfig};
use chat_core::{Snowflake, UserSummary};
use chat_gateway::{create_app, GatewayState};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::fixtures::{unique_user_id, InMemoryMessages, InMemoryUsers};

pub const TEST_SECRET: &str = "integration-test-secret-that-is-long-enough";

/// How long to wait for an expected event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to listen when asserting that an event does not arrive
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Typing TTL used by test servers
pub const TEST_TYPING_TTL: Duration = Duration::from_millis(400);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: GatewayState,
    pub users: Arc<InMemoryUsers>,
    pub messages: Arc<InMemoryMessages>,
    pub jwt: JwtService,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        let realtime = RealtimeConfig {
            typing_ttl_ms: TEST_TYPING_TTL.as_millis() as u64,
            ..RealtimeConfig::default()
        };
        Self::start_with_config(realtime).await
    }

    /// Start a test server with custom real-time settings
    pub async fn start_with_config(realtime: RealtimeConfig) -> Result<Self> {
        let users = Arc::new(InMemoryUsers::default());
        let messages = Arc::new(InMemoryMessages::default());
        let jwt = JwtService::new(TEST_SECRET, 900);

        let state = GatewayState::new(messages.clone(), users.clone(), jwt.clone(), realtime);
        let app = create_app(state.clone(), &CorsConfig::default(), false);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            users,
            messages,
            jwt,
            _handle: handle,
        })
    }

    /// Base URL for plain HTTP requests
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn gateway_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Create a user in the store
    pub fn add_user(&self, username: &str) -> UserSummary {
        let user = UserSummary::new(unique_user_id(), username);
        self.users.insert(user.clone());
        user
    }

    pub fn token_for(&self, user_id: Snowflake) -> Result<String> {
        self.jwt
            .issue_access_token(user_id)
            .map_err(|e| anyhow!("failed to issue token: {e}"))
    }

    /// Connect as `user` and wait until the gateway has announced them
    pub async fn connect(&self, user: &UserSummary) -> Result<TestClient> {
        let url = format!("{}?token={}", self.gateway_url(), self.token_for(user.id)?);
        let (stream, _) = connect_async(url).await.context("WebSocket connect failed")?;

        let mut client = TestClient {
            user: user.clone(),
            stream,
        };
        client.recv_event("online-users").await?;
        Ok(client)
    }

    /// Attempt a handshake and return the HTTP status of a rejected upgrade
    pub async fn rejected_status(&self, url: &str, bearer: Option<&str>) -> Result<StatusCode> {
        let mut request = url.into_client_request()?;
        if let Some(token) = bearer {
            request
                .headers_mut()
                .insert("Authorization", format!("Bearer {token}").parse()?);
        }

        match connect_async(request).await {
            Ok(_) => bail!("handshake unexpectedly succeeded"),
            Err(WsError::Http(response)) => Ok(response.status()),
            Err(e) => Err(e.into()),
        }
    }
}

/// WebSocket client speaking the gateway protocol
pub struct TestClient {
    pub user: UserSummary,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Send `{"event": name, "data": data}`
    pub async fn send(&mut self, event: &str, data: Value) -> Result<()> {
        let frame = json!({ "event": event, "data": data });
        self.stream.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, message: Message) -> Result<()> {
        self.stream.send(message).await?;
        Ok(())
    }

    /// Next event of any kind
    async fn next_event(&mut self) -> Result<Value> {
        loop {
            let frame = self
                .stream
                .next()
                .await
                .ok_or_else(|| anyhow!("connection closed"))??;

            match frame {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => bail!("connection closed: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Wait for the next event called `name`, skipping others. Returns its data.
    pub async fn recv_event(&mut self, name: &str) -> Result<Value> {
        tokio::time::timeout(EVENT_TIMEOUT, async {
            loop {
                let event = self.next_event().await?;
                if event["event"] == name {
                    return Ok(event.get("data").cloned().unwrap_or(Value::Null));
                }
            }
        })
        .await
        .map_err(|_| anyhow!("timed out waiting for {name}"))?
    }

    /// Collect every `name` event arriving within `period`
    pub async fn collect_events(&mut self, name: &str, period: Duration) -> Vec<Value> {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + period;

        while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, self.next_event()).await {
            if event["event"] == name {
                seen.push(event.get("data").cloned().unwrap_or(Value::Null));
            }
        }
        seen
    }

    /// Assert that no `name` event arrives during the quiet period
    pub async fn expect_no_event(&mut self, name: &str) -> Result<()> {
        let seen = self.collect_events(name, QUIET_PERIOD).await;
        if seen.is_empty() {
            Ok(())
        } else {
            bail!("unexpected {name}: {seen:?}")
        }
    }

    /// Wait for the server to close the socket and return its close frame
    pub async fn recv_close(&mut self) -> Result<Option<CloseFrame<'static>>> {
        tokio::time::timeout(EVENT_TIMEOUT, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Close(frame))) => return Ok(frame),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => bail!("stream ended without a close frame"),
                }
            }
        })
        .await
        .map_err(|_| anyhow!("timed out waiting for close"))?
    }

    /// Join a room and wait for the confirmation
    pub async fn join(&mut self, room: &str) -> Result<()> {
        self.send("join-room", json!({ "room": room })).await?;
        loop {
            let data = self.recv_event("user-joined").await?;
            if data["room"] == room && data["userId"] == self.user.id.to_string() {
                return Ok(());
            }
        }
    }

    /// Round trip a heartbeat, so every earlier frame has been handled
    pub async fn sync(&mut self) -> Result<()> {
        self.send_raw(Message::Text(r#"{"event":"heartbeat"}"#.to_string()))
            .await?;
        self.recv_event("heartbeat-ack").await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Wait until `check` holds, polling briefly
pub async fn eventually<F: Fn() -> bool>(check: F) -> Result<()> {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            bail!("condition not met in time");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}
