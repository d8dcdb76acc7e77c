//! Persistent, self-healing feed connections.
//!
//! A [`Connector`] owns one feed. It connects, hands every text frame to a
//! [`FrameHandler`] in arrival order, and on any [`FeedError`] waits out the
//! reconnect policy's backoff and connects again, forever, until shutdown.
//!
//! Delivery is best effort. Nothing is resumed across a reconnect: events the
//! exchange published while the connection was down are never seen, and an
//! upstream replay after reconnect is processed again.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::retry::ReconnectPolicy;
use super::state::{ConnectionState, ConnectionStats};
use super::FeedDescriptor;
use crate::error::FeedError;
use crate::shutdown::Shutdown;

/// Receives raw frames from a connector. Must not block.
pub trait FrameHandler: Send {
    fn on_frame(&mut self, frame: &str);
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn FrameStream>, FeedError>;
}

#[async_trait]
pub trait FrameStream: Send {
    /// `None` means the peer closed the connection.
    async fn next_frame(&mut self) -> Option<Result<String, FeedError>>;
}

#[async_trait]
impl<T: FrameSource + ?Sized> FrameSource for Arc<T> {
    async fn connect(&self, uri: &str) -> Result<Box<dyn FrameStream>, FeedError> {
        (**self).connect(uri).await
    }
}

/// Production websocket transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsSource;

struct WsFrames {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn connect(&self, uri: &str) -> Result<Box<dyn FrameStream>, FeedError> {
        let (ws, _) = connect_async(uri)
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        Ok(Box::new(WsFrames { ws }))
    }
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Option<Result<String, FeedError>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => continue,
                },
                Ok(Message::Close(_)) => return None,
                // ping/pong are answered by tungstenite
                Ok(_) => continue,
                Err(e) => return Some(Err(FeedError::Stream(e.to_string()))),
            }
        }
    }
}

pub struct Connector<S> {
    descriptor: FeedDescriptor,
    source: S,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    stats: Arc<ConnectionStats>,
}

impl<S: FrameSource> Connector<S> {
    pub fn new(descriptor: FeedDescriptor, source: S, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            descriptor,
            source,
            policy,
            state,
            stats: Arc::new(ConnectionStats::default()),
        }
    }

    pub fn descriptor(&self) -> &FeedDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.stats.clone()
    }

    fn transition(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        debug_assert!(
            prev.can_transition_to(next),
            "illegal transition {} -> {}",
            prev.as_str(),
            next.as_str()
        );
        debug!(feed = %self.descriptor.name, from = prev.as_str(), to = next.as_str(), "connection state");
    }

    /// Runs until `shutdown` fires. Never returns on feed errors.
    pub async fn run<H: FrameHandler>(&self, handler: &mut H, mut shutdown: Shutdown) {
        while !shutdown.is_triggered() {
            let err = tokio::select! {
                _ = shutdown.wait() => break,
                err = self.session(handler) => err,
            };

            self.stats.record_failure();
            self.transition(ConnectionState::Backoff);
            let delay = self.policy.delay_for(&err);
            warn!(
                feed = %self.descriptor.name,
                error = %err,
                attempts = self.stats.attempts(),
                delay_ms = delay.as_millis() as u64,
                "feed connection lost, reconnecting"
            );

            tokio::select! {
                _ = shutdown.wait() => break,
                _ = sleep(delay) => {}
            }
        }
        self.transition(ConnectionState::Disconnected);
        info!(feed = %self.descriptor.name, "connector stopped");
    }

    /// One connection epoch. Only returns on failure.
    async fn session<H: FrameHandler>(&self, handler: &mut H) -> FeedError {
        self.transition(ConnectionState::Connecting);
        self.stats.record_attempt();

        let connect = self.source.connect(&self.descriptor.uri);
        let mut stream = match timeout(self.policy.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return err,
            Err(_) => return FeedError::Connect("connect timed out".to_string()),
        };

        self.stats.record_connect();
        self.transition(ConnectionState::Connected);
        info!(feed = %self.descriptor.name, uri = %self.descriptor.uri, "feed connected");

        loop {
            match stream.next_frame().await {
                Some(Ok(frame)) => {
                    self.stats.record_frame();
                    handler.on_frame(&frame);
                }
                Some(Err(err)) => return err,
                None => return FeedError::Closed,
            }
        }
    }
}
