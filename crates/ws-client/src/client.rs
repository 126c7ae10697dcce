use std::borrow::Cow;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use http::HeaderMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::cache::{NoopSignatureCache, SignatureCache};
use crate::error::ClientError;
use crate::filters::{self, FilterTables};
use crate::request::Request;
use crate::response::decode_notification;
use crate::subscription::{DecodedValue, DecoderFn, Subscription, SubscriptionEntry};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Time allowed for a single write to the peer.
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
/// Time allowed to read the next message from the peer.
const PONG_WAIT: Duration = Duration::from_secs(60);
/// Interval between outgoing pings, 9/10 of [`PONG_WAIT`]. Must stay below
/// the pong wait.
const PING_PERIOD: Duration = Duration::from_secs(54);
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(45);
/// Default per-subscription stream capacity.
const DEFAULT_STREAM_CAPACITY: usize = 100_000;

/// Connection options.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Upper bound for the websocket upgrade. Defaults to 45 seconds.
    pub handshake_timeout: Option<Duration>,
    /// Read-deadline extension per inbound message and the initial read
    /// deadline. Defaults to 60 seconds.
    pub pong_wait: Option<Duration>,
    /// Interval between outgoing pings; must be shorter than `pong_wait`.
    /// Defaults to 9/10 of `pong_wait`, which is also what an invalid value
    /// is clamped back to.
    pub ping_period: Option<Duration>,
    /// Extra headers for the upgrade request, e.g. authorization.
    pub http_headers: HeaderMap,
    /// Install the fast-path subscription-id filters.
    pub use_sub_id_retrievals: bool,
    /// Install the failed-transaction discarder for log notifications.
    pub discard_failed_txs: bool,
    /// Capacity of each subscription's result stream. A subscription whose
    /// stream is full at dispatch time is closed, never blocked on.
    pub stream_capacity: Option<NonZeroUsize>,
}

fn keepalive(options: &Options) -> (Duration, Duration) {
    let (pong_wait, derived) = match options.pong_wait.filter(|wait| !wait.is_zero()) {
        Some(wait) => (wait, wait * 9 / 10),
        None => (PONG_WAIT, PING_PERIOD),
    };
    let ping_period = match options.ping_period {
        None => derived,
        Some(period) if !period.is_zero() && period < pong_wait => period,
        Some(period) => {
            tracing::warn!(
                ?period,
                ?pong_wait,
                "Ping period must be shorter than pong wait, using the derived default"
            );
            derived
        }
    };
    (pong_wait, ping_period)
}

/// A websocket subscription client.
///
/// Cheap to clone; all clones share the same connection. There is no
/// reconnection: when the connection dies every live subscription receives
/// the transport error and the client is done.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Connects to `url` with default options and no signature cache.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        Self::connect_with_options(url, Options::default(), None).await
    }

    /// Connects to `url`.
    ///
    /// Providing a [`SignatureCache`] also installs the default signature
    /// retrieval filters, enabling de-duplication of notifications by
    /// transaction signature.
    pub async fn connect_with_options(
        url: &str,
        options: Options,
        cache: Option<Box<dyn SignatureCache>>,
    ) -> Result<Self, ClientError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| ClientError::Dial(Arc::new(e)))?;
        for (name, value) in options.http_headers.iter() {
            request.headers_mut().insert(name, value.clone());
        }

        let handshake_timeout = options
            .handshake_timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT);
        let (socket, _response) = tokio::time::timeout(handshake_timeout, connect_async(request))
            .await
            .map_err(|_| ClientError::HandshakeTimeout(handshake_timeout))?
            .map_err(|e| ClientError::Dial(Arc::new(e)))?;

        let (pong_wait, ping_period) = keepalive(&options);

        let mut tables = FilterTables::default();
        if options.use_sub_id_retrievals {
            tables.sub_id_retrievals = filters::default_sub_id_retrievals();
        }
        if options.discard_failed_txs {
            tables.tx_discarders = filters::default_tx_discarders();
        }
        let sig_cache: Box<dyn SignatureCache> = match cache {
            Some(cache) => {
                tables.signature_retrievals = filters::default_signature_retrievals();
                cache
            }
            None => Box::new(NoopSignatureCache),
        };

        let (sink, stream) = socket.split();
        let inner = Arc::new(ClientInner {
            state: RwLock::new(ClientState {
                sink,
                by_request_id: HashMap::new(),
                by_sub_id: HashMap::new(),
            }),
            filters: tables,
            sig_cache,
            stream_capacity: options
                .stream_capacity
                .map(NonZeroUsize::get)
                .unwrap_or(DEFAULT_STREAM_CAPACITY),
            pong_wait,
            ping_period,
            cancellation: CancellationToken::new(),
        });

        tokio::spawn(ping_loop(Arc::clone(&inner)));
        tokio::spawn(read_loop(stream, Arc::clone(&inner)));

        Ok(Self { inner })
    }

    /// Starts a subscription for an arbitrary `method`.
    ///
    /// `unsubscribe_method` is the paired call issued when the subscription
    /// is torn down. A non-empty `config` object is appended as the trailing
    /// params element. Notification payloads are decoded into `T` from the
    /// `params.result` field.
    pub async fn subscribe<T>(
        &self,
        params: Vec<Value>,
        config: Option<Map<String, Value>>,
        method: impl Into<String>,
        unsubscribe_method: impl Into<String>,
    ) -> Result<Subscription<T>, ClientError>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let decoder: DecoderFn = Arc::new(|message: &[u8]| {
            decode_notification::<T>(message).map(|value| Box::new(value) as DecodedValue)
        });
        self.inner
            .subscribe(params, config, method.into(), unsubscribe_method.into(), decoder)
            .await
    }

    /// Stops the ping ticker and the read loop, then closes the socket.
    ///
    /// Live subscriptions are not notified; use this only when the client is
    /// being discarded as a whole.
    pub async fn close(&self) {
        self.inner.cancellation.cancel();
        let mut state = self.inner.state.write().await;
        if let Err(error) = state.sink.close().await {
            tracing::debug!(%error, "Closing websocket failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<ClientInner> {
        &self.inner
    }
}

/// Socket write half and the two subscription indices, guarded by one lock:
/// exclusive for writes and registry mutation, shared for the hot dispatch
/// lookup.
struct ClientState {
    sink: WsSink,
    by_request_id: HashMap<u64, Arc<SubscriptionEntry>>,
    by_sub_id: HashMap<u64, Arc<SubscriptionEntry>>,
}

pub(crate) struct ClientInner {
    state: RwLock<ClientState>,
    filters: FilterTables,
    sig_cache: Box<dyn SignatureCache>,
    stream_capacity: usize,
    pong_wait: Duration,
    ping_period: Duration,
    cancellation: CancellationToken,
}

impl ClientInner {
    pub(crate) async fn subscribe<T: Send + 'static>(
        self: &Arc<Self>,
        params: Vec<Value>,
        config: Option<Map<String, Value>>,
        method: String,
        unsubscribe_method: String,
        decoder: DecoderFn,
    ) -> Result<Subscription<T>, ClientError> {
        let request = Request::new(params, method, config);
        let message = request
            .encode()
            .map_err(|e| ClientError::Encode(Arc::new(e)))?;

        let (stream_tx, stream_rx) = mpsc::channel(self.stream_capacity);
        let (error_tx, error_rx) = mpsc::channel(1);
        let sub_id = Arc::new(AtomicU64::new(0));
        let request_id = request.id;
        let entry = Arc::new(SubscriptionEntry {
            request,
            sub_id: Arc::clone(&sub_id),
            unsubscribe_method,
            decoder,
            stream: stream_tx,
            stream_capacity: self.stream_capacity,
            errors: error_tx,
        });

        let mut state = self.state.write().await;
        // Register before writing: on a fast loopback the ack can arrive
        // before the write call returns.
        state.by_request_id.insert(request_id, Arc::clone(&entry));
        tracing::debug!(
            request_id,
            count = state.by_request_id.len(),
            "Added subscription"
        );

        if let Err(error) = write_message(&mut state.sink, Message::Text(message)).await {
            state.by_request_id.remove(&request_id);
            return Err(error);
        }
        drop(state);

        Ok(Subscription {
            request_id,
            sub_id,
            stream: stream_rx,
            errors: error_rx,
            client: Arc::downgrade(self),
            _result: PhantomData,
        })
    }

    /// Classifies and routes one inbound frame.
    async fn dispatch(&self, message: &[u8]) {
        // A subscribe ack is a short `{id, result}` frame carrying the
        // server-assigned subscription id; it never exceeds 128 bytes.
        if message.len() < 128 {
            if let Ok(AckProbe { id, result }) = serde_json::from_slice::<AckProbe>(message) {
                if id != 0 && result != 0 {
                    self.promote(id, result).await;
                    return;
                }
            }
        }

        let method = match serde_json::from_slice::<MethodProbe<'_>>(message) {
            Ok(MethodProbe {
                method: Some(method),
            }) => method,
            _ => {
                tracing::warn!("Unable to parse websocket message method");
                return;
            }
        };

        if let Some(discard) = self.filters.tx_discarders.get(method.as_ref()) {
            if discard(message) {
                return;
            }
        }

        if let Some(retrieve) = self.filters.signature_retrievals.get(method.as_ref()) {
            if let Some(signature) = retrieve(message) {
                if self.sig_cache.has(&signature) {
                    return;
                }
                self.sig_cache.set(signature);
            }
        }

        let sub_id = self
            .filters
            .sub_id_retrievals
            .get(method.as_ref())
            .and_then(|retrieve| retrieve(message))
            .or_else(|| generic_sub_id(message))
            .unwrap_or(0);

        self.route(sub_id, message).await;
    }

    /// Turns a subscribe ack into an active subscription: the entry becomes
    /// reachable by its server-assigned id.
    async fn promote(&self, request_id: u64, sub_id: u64) {
        let mut state = self.state.write().await;
        let Some(entry) = state.by_request_id.get(&request_id) else {
            tracing::error!(
                request_id,
                subscription_id = sub_id,
                "Subscribe ack for an unknown request"
            );
            return;
        };
        let entry = Arc::clone(entry);
        entry.sub_id.store(sub_id, Ordering::Release);
        state.by_sub_id.insert(sub_id, entry);
        tracing::debug!(
            request_id,
            subscription_id = sub_id,
            count = state.by_sub_id.len(),
            "Registered websocket subscription"
        );
    }

    async fn route(&self, sub_id: u64, message: &[u8]) {
        let entry = {
            let state = self.state.read().await;
            match state.by_sub_id.get(&sub_id) {
                Some(entry) => Arc::clone(entry),
                None => {
                    tracing::warn!(
                        subscription_id = sub_id,
                        "No subscription for websocket message"
                    );
                    return;
                }
            }
        };

        let value = match (entry.decoder)(message) {
            Ok(value) => value,
            Err(error) => {
                self.close_subscription(entry.request.id, error).await;
                return;
            }
        };

        // The read loop must never block on a consumer.
        match entry.stream.try_send(value) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    request_id = entry.request.id,
                    "Subscription not consuming fast enough, closing"
                );
                self.close_subscription(
                    entry.request.id,
                    ClientError::ChannelFull(entry.stream_capacity),
                )
                .await;
            }
            Err(TrySendError::Closed(_)) => {
                // The handle was dropped without unsubscribing.
                self.close_subscription(entry.request.id, ClientError::Unsubscribed)
                    .await;
            }
        }
    }

    /// Removes one subscription from both indices, delivers `error` on its
    /// error channel and issues the network-level unsubscribe call.
    pub(crate) async fn close_subscription(&self, request_id: u64, error: ClientError) {
        let mut state = self.state.write().await;
        let Some(entry) = state.by_request_id.remove(&request_id) else {
            return;
        };
        // The single error slot may already be taken; the entry is being
        // discarded either way.
        let _ = entry.errors.try_send(error);
        let sub_id = entry.sub_id.load(Ordering::Acquire);
        state.by_sub_id.remove(&sub_id);
        if let Err(error) =
            unsubscribe_call(&mut state.sink, sub_id, &entry.unsubscribe_method).await
        {
            tracing::warn!(%error, "Unable to send rpc unsubscribe call");
        }
    }

    /// Drains the registry, delivering the same `error` to every live
    /// subscription. The socket is considered dead, so no network-level
    /// unsubscribe is attempted.
    async fn close_all_subscriptions(&self, error: ClientError) {
        let mut state = self.state.write().await;
        for entry in state.by_request_id.values() {
            let _ = entry.errors.try_send(error.clone());
        }
        state.by_request_id.clear();
        state.by_sub_id.clear();
    }

    #[cfg(test)]
    pub(crate) async fn index_sizes(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.by_request_id.len(), state.by_sub_id.len())
    }

    #[cfg(test)]
    pub(crate) async fn contains_sub_id(&self, sub_id: u64) -> bool {
        self.state.read().await.by_sub_id.contains_key(&sub_id)
    }
}

#[derive(Deserialize)]
struct AckProbe {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    result: u64,
}

#[derive(Deserialize)]
struct MethodProbe<'a> {
    #[serde(borrow, default)]
    method: Option<Cow<'a, str>>,
}

/// Generic `params.subscription` lookup, the fallback when no fast-path
/// filter matches.
fn generic_sub_id(message: &[u8]) -> Option<u64> {
    #[derive(Deserialize)]
    struct Params {
        #[serde(default)]
        subscription: Option<u64>,
    }
    #[derive(Deserialize)]
    struct Probe {
        #[serde(default)]
        params: Option<Params>,
    }
    serde_json::from_slice::<Probe>(message).ok()?.params?.subscription
}

async fn write_message(sink: &mut WsSink, message: Message) -> Result<(), ClientError> {
    match tokio::time::timeout(WRITE_DEADLINE, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(ClientError::Write(Arc::new(error))),
        Err(_elapsed) => Err(ClientError::WriteTimeout),
    }
}

async fn unsubscribe_call(
    sink: &mut WsSink,
    sub_id: u64,
    method: &str,
) -> Result<(), ClientError> {
    let request = Request::new(vec![Value::from(sub_id)], method, None);
    let message = request
        .encode()
        .map_err(|e| ClientError::Encode(Arc::new(e)))?;
    write_message(sink, Message::Text(message)).await
}

async fn ping_loop(inner: Arc<ClientInner>) {
    let start = tokio::time::Instant::now() + inner.ping_period;
    let mut ticker = tokio::time::interval_at(start, inner.ping_period);
    loop {
        tokio::select! {
            _ = inner.cancellation.cancelled() => return,
            _ = ticker.tick() => {
                let mut state = inner.state.write().await;
                // A failed ping needs no handling of its own; the read loop
                // observes the broken socket.
                if let Err(error) = write_message(&mut state.sink, Message::Ping(Vec::new())).await {
                    tracing::debug!(%error, "Ping failed");
                }
            }
        }
    }
}

async fn read_loop(mut stream: SplitStream<WsStream>, inner: Arc<ClientInner>) {
    loop {
        let next = tokio::select! {
            _ = inner.cancellation.cancelled() => return,
            next = tokio::time::timeout(inner.pong_wait, stream.next()) => next,
        };
        let message = match next {
            // No message within the pong wait: the peer is gone.
            Err(_elapsed) => {
                inner
                    .close_all_subscriptions(ClientError::ReadTimeout(inner.pong_wait))
                    .await;
                return;
            }
            Ok(None) => {
                inner
                    .close_all_subscriptions(ClientError::ConnectionClosed)
                    .await;
                return;
            }
            Ok(Some(Err(error))) => {
                inner
                    .close_all_subscriptions(ClientError::Transport(Arc::new(error)))
                    .await;
                return;
            }
            Ok(Some(Ok(message))) => message,
        };
        match message {
            Message::Text(text) => inner.dispatch(text.as_bytes()).await,
            Message::Binary(bytes) => inner.dispatch(&bytes).await,
            // Pongs extend the read deadline simply by arriving; pings are
            // answered by tungstenite itself.
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => {}
        }
    }
}
