/*
[INPUT]:  Stream configuration (URL, subscriptions, credentials, timing)
[OUTPUT]: A live session whose topic data callers poll with fetch
[POS]:    WebSocket layer - connection lifecycle, heartbeat and reconnection
[UPDATE]: When changing connection states, liveness or restart policy
*/

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::Credentials;
use crate::http::client::timestamp_ms;
use crate::http::{BybitError, RequestSigner, Result};
use crate::types::{Market, PositionMode};
use crate::ws::message::{Frame, StreamProtocol, parse_frame};
use crate::ws::store::{StoreSettings, TopicStore};
use crate::ws::topic::{Subscription, validate_subscriptions};

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Subscribing,
    Streaming,
    Closing,
    /// Gave up; see the error callback or logs for the cause
    Errored,
}

/// Called once when a session enters [`ConnectionState::Errored`].
#[derive(Clone)]
pub struct ErrorCallback(Arc<dyn Fn(&BybitError) + Send + Sync>);

impl ErrorCallback {
    pub fn new(callback: impl Fn(&BybitError) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    fn call(&self, error: &BybitError) {
        (self.0)(error)
    }
}

impl fmt::Debug for ErrorCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorCallback")
    }
}

/// WebSocket session configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub protocol: StreamProtocol,
    pub subscriptions: Vec<Subscription>,
    pub credentials: Option<Credentials>,
    pub ping_interval: Duration,
    /// A ping without a pong inside this window marks the connection dead
    pub ping_timeout: Duration,
    pub connect_timeout: Duration,
    pub restart_on_error: bool,
    /// Consecutive failed reconnects before the session gives up
    pub max_reconnect_attempts: u32,
    /// First reconnect delay; doubles per failure up to 30 s
    pub reconnect_base_delay: Duration,
    pub store: StoreSettings,
    pub on_error: Option<ErrorCallback>,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocol: StreamProtocol::Futures,
            subscriptions: Vec::new(),
            credentials: None,
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            restart_on_error: true,
            max_reconnect_attempts: 10,
            reconnect_base_delay: Duration::from_secs(1),
            store: StoreSettings::default(),
            on_error: None,
        }
    }

    /// Configuration for the market's public or private stream endpoint.
    pub fn for_market(market: Market, private: bool, testnet: bool) -> Self {
        let protocol = match market {
            Market::Spot => StreamProtocol::Spot,
            _ => StreamProtocol::Futures,
        };
        Self::new(market.stream_url(private, testnet, None)).protocol(protocol)
    }

    pub fn protocol(mut self, protocol: StreamProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn subscribe(mut self, subscription: impl Into<Subscription>) -> Self {
        self.subscriptions.push(subscription.into());
        self
    }

    pub fn subscriptions<I, S>(mut self, subscriptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Subscription>,
    {
        self.subscriptions
            .extend(subscriptions.into_iter().map(Into::into));
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn restart_on_error(mut self, restart: bool) -> Self {
        self.restart_on_error = restart;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    pub fn max_data_length(mut self, length: usize) -> Self {
        self.store.max_data_length = length;
        self
    }

    pub fn position_mode(mut self, mode: PositionMode) -> Self {
        self.store.position.mode = mode;
        self
    }

    /// Field that separates the two legs of a hedge-mode position
    pub fn position_side_field(mut self, field: impl Into<String>) -> Self {
        self.store.position.side_field = field.into();
        self
    }

    /// Override whether `fetch` drains a topic (key or family name).
    pub fn consume_on_read(mut self, topic: impl Into<String>, consume: bool) -> Self {
        self.store.consume_on_read.insert(topic.into(), consume);
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&BybitError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(ErrorCallback::new(callback));
        self
    }

    /// Check descriptors against the protocol and the credentials.
    pub fn validate(&self) -> Result<()> {
        if self.ping_interval.is_zero() || self.ping_timeout.is_zero() {
            return Err(BybitError::Config(
                "ping interval and timeout must be non-zero".to_string(),
            ));
        }
        validate_subscriptions(&self.subscriptions, self.credentials.is_some())?;
        for subscription in &self.subscriptions {
            match (self.protocol, subscription) {
                (StreamProtocol::Futures, Subscription::Filter(_)) => {
                    return Err(BybitError::Config(format!(
                        "futures streams take topic strings, got {subscription}"
                    )));
                }
                (StreamProtocol::Spot, Subscription::Topic(_)) if !subscription.is_private() => {
                    return Err(BybitError::Config(format!(
                        "spot public streams take filter objects, got '{subscription}'"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Exponential reconnect delay for the given 1-based attempt, capped at 30 s.
pub fn backoff_duration(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1 << exponent).min(MAX_BACKOFF)
}

struct Connection {
    write: SplitSink<WsStream, WsMessage>,
    read: SplitStream<WsStream>,
}

impl Connection {
    async fn send(&mut self, frame: &Value) -> Result<()> {
        self.write
            .send(WsMessage::Text(frame.to_string().into()))
            .await
            .map_err(|e| BybitError::WebSocket(e.to_string()))
    }
}

/// Everything the background task owns.
struct Session {
    config: StreamConfig,
    signer: Option<RequestSigner>,
    keys: HashSet<String>,
    store: Arc<TopicStore>,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    parse_failures: AtomicUsize,
}

impl Session {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(url = %self.config.url, ?previous, ?state, "ws state changed");
        }
    }

    /// Connect, authenticate and subscribe.
    async fn establish(&self) -> Result<Connection> {
        self.set_state(ConnectionState::Connecting);
        let timeout = self.config.connect_timeout;
        let (stream, _response) =
            tokio::time::timeout(timeout, connect_async(self.config.url.as_str()))
                .await
                .map_err(|_| BybitError::Timeout {
                    duration: timeout.as_millis() as u64,
                })?
                .map_err(|e| BybitError::WebSocket(e.to_string()))?;
        info!(url = %self.config.url, "ws connected");

        let (write, read) = stream.split();
        let mut connection = Connection { write, read };

        if let Some(signer) = &self.signer {
            self.set_state(ConnectionState::Authenticating);
            self.authenticate(&mut connection, signer).await?;
        }

        self.set_state(ConnectionState::Subscribing);
        self.subscribe(&mut connection).await?;

        self.set_state(ConnectionState::Streaming);
        Ok(connection)
    }

    async fn authenticate(&self, connection: &mut Connection, signer: &RequestSigner) -> Result<()> {
        let expires = timestamp_ms() + 1000;
        connection.send(&signer.ws_auth_frame(expires)).await?;

        let deadline = Instant::now() + self.config.ping_timeout;
        loop {
            let message = tokio::time::timeout_at(deadline, connection.read.next())
                .await
                .map_err(|_| BybitError::Authentication {
                    message: "no acknowledgement before timeout".to_string(),
                })?;
            match message {
                None | Some(Ok(WsMessage::Close(_))) => {
                    return Err(BybitError::WebSocket(
                        "connection closed during authentication".to_string(),
                    ));
                }
                Some(Err(e)) => return Err(BybitError::WebSocket(e.to_string())),
                Some(Ok(message)) => match self.decode(message) {
                    Some(Frame::AuthAck { success: true, .. }) => {
                        info!(url = %self.config.url, "ws authenticated");
                        return Ok(());
                    }
                    Some(Frame::AuthAck { message, .. }) => {
                        return Err(BybitError::Authentication { message });
                    }
                    Some(Frame::Data(events)) => self.store.apply(events),
                    _ => {}
                },
            }
        }
    }

    async fn subscribe(&self, connection: &mut Connection) -> Result<()> {
        for subscription in &self.config.subscriptions {
            let frame = match subscription {
                // Spot private topics are pushed after auth without a request.
                Subscription::Topic(_) if self.config.protocol == StreamProtocol::Spot => continue,
                Subscription::Topic(topic) => json!({"op": "subscribe", "args": [topic]}),
                Subscription::Filter(filter) => filter.clone(),
            };
            connection.send(&frame).await?;
            debug!(topic = %subscription, "ws subscription sent");
        }
        Ok(())
    }

    fn ping_frame(&self) -> Value {
        match self.config.protocol {
            StreamProtocol::Futures => json!({"op": "ping"}),
            StreamProtocol::Spot => json!({"ping": timestamp_ms()}),
        }
    }

    /// Pump frames into the store until cancelled or the connection dies.
    async fn stream(&self, mut connection: Connection) -> Result<()> {
        let interval = self.config.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + interval, interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let deadline = pong_deadline.unwrap_or_else(|| Instant::now() + interval);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.set_state(ConnectionState::Closing);
                    let _ = connection.write.send(WsMessage::Close(None)).await;
                    return Ok(());
                }
                _ = ping.tick() => {
                    connection.send(&self.ping_frame()).await?;
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + self.config.ping_timeout);
                    }
                }
                _ = tokio::time::sleep_until(deadline), if pong_deadline.is_some() => {
                    return Err(BybitError::Timeout {
                        duration: self.config.ping_timeout.as_millis() as u64,
                    });
                }
                message = connection.read.next() => match message {
                    None => return Err(BybitError::WebSocket("connection closed".to_string())),
                    Some(Err(e)) => return Err(BybitError::WebSocket(e.to_string())),
                    Some(Ok(WsMessage::Close(frame))) => {
                        return Err(BybitError::WebSocket(format!("closed by server: {frame:?}")));
                    }
                    Some(Ok(message)) => match self.decode(message) {
                        Some(Frame::Pong) => pong_deadline = None,
                        Some(Frame::Ping(ts)) => connection.send(&json!({"pong": ts})).await?,
                        Some(Frame::Data(events)) => self.store.apply(events),
                        Some(Frame::SubscribeAck { success, topics, message }) => {
                            self.on_subscribe_ack(success, topics, &message);
                        }
                        Some(Frame::AuthAck { success: false, message }) => {
                            return Err(BybitError::Authentication { message });
                        }
                        Some(Frame::AuthAck { .. }) | Some(Frame::Other) | None => {}
                    },
                },
            }
        }
    }

    fn on_subscribe_ack(&self, success: bool, topics: Vec<String>, message: &str) {
        for topic in topics {
            if !self.keys.contains(&topic) {
                debug!(topic = %topic, "ack for unknown subscription");
                continue;
            }
            if success {
                self.store.register(&topic);
                info!(topic = %topic, "ws subscribed");
            } else {
                self.store.remove(&topic);
                error!(topic = %topic, message, "ws subscription rejected");
            }
        }
    }

    fn decode(&self, message: WsMessage) -> Option<Frame> {
        let text = match message {
            WsMessage::Text(text) => text.to_string(),
            WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok()?,
            WsMessage::Pong(_) => return Some(Frame::Pong),
            _ => return None,
        };
        match parse_frame(&text, self.config.protocol) {
            Ok(frame) => Some(frame),
            Err(err) => {
                self.log_parse_failure(&err, &text);
                None
            }
        }
    }

    fn log_parse_failure(&self, err: &serde_json::Error, raw: &str) {
        let count = self.parse_failures.fetch_add(1, Ordering::Relaxed);
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        if count < PARSE_FAIL_LOG_LIMIT {
            warn!(
                sample_index = count + 1,
                sample_limit = PARSE_FAIL_LOG_LIMIT,
                error = %err,
                message = %preview,
                "ws message parse failed"
            );
        } else {
            debug!(error = %err, bytes = raw.len(), "ws message parse failed");
        }
    }

    fn fail(&self, error: BybitError) {
        self.set_state(ConnectionState::Errored);
        error!(url = %self.config.url, error = %error, "ws session stopped");
        if let Some(callback) = &self.config.on_error {
            callback.call(&error);
        }
    }

    /// Serve `connection`, then reconnect with backoff until cancelled or
    /// out of attempts.
    async fn run(self, first: Connection) {
        let mut connection = Some(first);
        let mut failures: u32 = 0;
        let mut last_error = None;

        loop {
            if let Some(live) = connection.take() {
                match self.stream(live).await {
                    Ok(()) => break,
                    Err(error) => {
                        warn!(url = %self.config.url, error = %error, "ws stream interrupted");
                        self.store.clear();
                        if !self.config.restart_on_error {
                            self.fail(error);
                            return;
                        }
                        last_error = Some(error);
                    }
                }
            }

            failures += 1;
            if failures > self.config.max_reconnect_attempts {
                let error = last_error.take().unwrap_or_else(|| {
                    BybitError::WebSocket("reconnect attempts exhausted".to_string())
                });
                self.fail(error);
                return;
            }

            let delay = backoff_duration(self.config.reconnect_base_delay, failures);
            info!(attempt = failures, ?delay, "ws reconnecting");
            self.set_state(ConnectionState::Disconnected);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                attempt = self.establish() => attempt,
            };
            match attempt {
                Ok(live) => {
                    info!(url = %self.config.url, "ws reconnected");
                    failures = 0;
                    connection = Some(live);
                }
                Err(error) => {
                    warn!(attempt = failures, error = %error, "ws reconnect failed");
                    last_error = Some(error);
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}

/// Streaming session for one Bybit WebSocket endpoint.
///
/// A single background task owns the socket, answers heartbeats and merges
/// frames into the topic store in arrival order. Callers poll with
/// [`fetch`](Self::fetch).
#[derive(Debug)]
pub struct BybitWebSocket {
    url: String,
    subscriptions: Vec<Subscription>,
    store: Arc<TopicStore>,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BybitWebSocket {
    /// Validate `config`, open the connection and start streaming.
    ///
    /// Fails if the first connection cannot be established; later
    /// failures are handled by the restart policy.
    pub async fn connect(config: StreamConfig) -> Result<Self> {
        config.validate()?;

        let keys: HashSet<String> = config.subscriptions.iter().map(Subscription::key).collect();
        let store = Arc::new(TopicStore::new(config.store.clone(), keys.iter().cloned()));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let state = Arc::new(state);
        let cancel = CancellationToken::new();

        let session = Session {
            signer: config.credentials.clone().map(RequestSigner::new),
            keys,
            store: store.clone(),
            state: state.clone(),
            cancel: cancel.clone(),
            parse_failures: AtomicUsize::new(0),
            config,
        };

        let connection = match session.establish().await {
            Ok(connection) => connection,
            Err(error) => {
                session.set_state(ConnectionState::Errored);
                return Err(error);
            }
        };

        let url = session.config.url.clone();
        let subscriptions = session.config.subscriptions.clone();
        let task = tokio::spawn(session.run(connection));

        Ok(Self {
            url,
            subscriptions,
            store,
            state,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Copy of a topic's data set; drains consume-on-read topics.
    pub fn fetch(&self, topic: &str) -> Option<Vec<Value>> {
        self.store.fetch(topic)
    }

    /// Fetch by descriptor, for spot filter subscriptions.
    pub fn fetch_subscription(&self, subscription: &Subscription) -> Option<Vec<Value>> {
        self.store.fetch(&subscription.key())
    }

    /// Topics that currently hold a data set
    pub fn topics(&self) -> Vec<String> {
        self.store.topics()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Wait until the session reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> Result<()> {
        let mut receiver = self.state.subscribe();
        tokio::time::timeout(timeout, receiver.wait_for(|state| *state == target))
            .await
            .map_err(|_| BybitError::Timeout {
                duration: timeout.as_millis() as u64,
            })?
            .map(|_| ())
            .map_err(|e| BybitError::WebSocket(e.to_string()))
    }

    /// Stop the session: cancel and join the task, close the socket and drop
    /// all topic data.
    pub async fn exit(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            warn!(error = %err, "ws task ended abnormally");
        }
        self.store.reset();
        self.state.send_replace(ConnectionState::Disconnected);
        info!(url = %self.url, "ws session closed");
    }
}

impl Drop for BybitWebSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, Duration::from_secs(1))]
    #[case(2, Duration::from_secs(2))]
    #[case(4, Duration::from_secs(8))]
    #[case(6, Duration::from_secs(30))]
    #[case(40, Duration::from_secs(30))]
    fn test_backoff_duration(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(backoff_duration(Duration::from_secs(1), attempt), expected);
    }

    #[test]
    fn test_config_defaults() {
        let config = StreamConfig::for_market(Market::UsdtPerpetual, false, true);
        assert_eq!(config.url, "wss://stream-testnet.bybit.com/realtime_public");
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.ping_timeout, Duration::from_secs(10));
        assert!(config.restart_on_error);
        assert_eq!(config.store.max_data_length, 200);
        assert_eq!(
            StreamConfig::for_market(Market::Spot, false, false).protocol,
            StreamProtocol::Spot
        );
    }

    #[test]
    fn test_validate_protocol_shapes() {
        let futures = StreamConfig::new("wss://example")
            .subscribe(json!({"topic": "trade", "params": {"symbol": "BTCUSDT"}}));
        assert!(matches!(futures.validate(), Err(BybitError::Config(_))));

        let spot = StreamConfig::new("wss://example")
            .protocol(StreamProtocol::Spot)
            .subscribe("trade.BTCUSDT");
        assert!(matches!(spot.validate(), Err(BybitError::Config(_))));

        let spot_private = StreamConfig::new("wss://example")
            .protocol(StreamProtocol::Spot)
            .subscribe("executionReport")
            .credentials(Credentials::new("k", "s"));
        assert!(spot_private.validate().is_ok());
    }

    #[tokio::test]
    async fn test_private_topic_without_credentials_fails_fast() {
        let config = StreamConfig::new("ws://127.0.0.1:9").subscribe("position");
        let err = BybitWebSocket::connect(config).await.unwrap_err();
        assert!(matches!(err, BybitError::Config(_)));
    }
}
