//! Cross-thread bridge
//!
//! A [`Bridge`] is one side of the boundary. Sending is fire-and-forget
//! through a [`Transport`]; receiving happens when the host (or an
//! [`Inbox`] task) feeds raw envelopes into [`Bridge::dispatch`].
//!
//! # Pending calls
//!
//! [`Bridge::call`] has no implicit timeout. If the peer never answers,
//! the returned [`PendingCall`] never completes and its registry entry
//! stays alive until the last [`Bridge`] handle is dropped, at which point
//! every outstanding call resolves to [`CallError::Abandoned`]. Use
//! [`Bridge::call_with_deadline`] or [`Bridge::prune_expired`] to bound
//! the wait; [`Bridge::pending_count`] exposes the registry size.
//!
//! Inbox tasks only hold a weak reference to their bridge. A handler that
//! captures a clone of the bridge it is registered on keeps that bridge
//! alive for as long as the handler stays subscribed.

use crate::layer::Layer;
use crate::message::{EnvelopeError, MessageKind, ThreadMessage};
use crate::pending::PendingRegistry;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The peer can no longer receive messages
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transport closed")]
pub struct TransportError;

/// Host cross-context messaging primitive
///
/// `post` must not block; queuing and delivery belong to the host.
pub trait Transport: Send + Sync {
    /// Hand one serialized envelope to the host
    fn post(&self, envelope: String) -> Result<(), TransportError>;
}

impl Transport for mpsc::UnboundedSender<String> {
    fn post(&self, envelope: String) -> Result<(), TransportError> {
        self.send(envelope).map_err(|_| TransportError)
    }
}

/// Errors surfaced to callers
#[derive(Debug, Error)]
pub enum CallError {
    /// The transport refused the envelope
    #[error("peer disconnected")]
    Disconnected,

    /// Another call with the same id is still pending
    #[error("a call with id `{0}` is already pending")]
    DuplicateId(String),

    /// The envelope could not be serialized
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// No response before the deadline
    #[error("no response within {0:?}")]
    DeadlineExceeded(Duration),

    /// The registry entry was pruned or the last bridge handle dropped
    #[error("call abandoned before a response arrived")]
    Abandoned,

    /// Only `METHOD_CALL` envelopes take part in request/response matching
    #[error("{0:?} messages cannot be sent as requests")]
    NotARequest(MessageKind),
}

type Handler = Arc<dyn Fn(&ThreadMessage) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

struct Shared {
    layer: Layer,
    transport: Box<dyn Transport>,
    listeners: Mutex<Listeners>,
    pending: Mutex<PendingRegistry>,
    dropped: AtomicU64,
}

/// One side of the thread boundary
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

impl Bridge {
    /// Create a bridge living on `layer` that posts through `transport`
    pub fn new(layer: Layer, transport: impl Transport + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                layer,
                transport: Box::new(transport),
                listeners: Mutex::new(Listeners::default()),
                pending: Mutex::new(PendingRegistry::default()),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Layer this bridge runs on
    pub fn layer(&self) -> Layer {
        self.shared.layer
    }

    /// Post a message to the peer
    pub fn send(&self, message: &ThreadMessage) -> Result<(), CallError> {
        let envelope = message.to_wire()?;
        self.shared
            .transport
            .post(envelope)
            .map_err(|_| CallError::Disconnected)
    }

    /// Build and post a message addressed to the peer layer
    pub fn emit(&self, kind: MessageKind, payload: Value) -> Result<(), CallError> {
        self.send(&ThreadMessage::new(kind, payload, self.layer().peer()))
    }

    /// Reply to a received request, echoing its id
    pub fn respond(
        &self,
        request: &ThreadMessage,
        kind: MessageKind,
        payload: Value,
    ) -> Result<(), CallError> {
        self.send(&request.reply(kind, payload))
    }

    /// Register a handler for every received message
    ///
    /// Handlers run in registration order, once per message, in the order
    /// messages arrive. The handler stays registered until
    /// [`Subscription::unsubscribe`] is called.
    pub fn on_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ThreadMessage) + Send + Sync + 'static,
    {
        let mut listeners = self.shared.listeners.lock();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.handlers.push((id, Arc::new(handler)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Send a request with a fresh id and wait for the matching response
    ///
    /// `kind` must be [`MessageKind::MethodCall`]; other kinds are not
    /// request-shaped and fail with [`CallError::NotARequest`].
    pub fn call(&self, kind: MessageKind, payload: Value) -> Result<PendingCall, CallError> {
        let message = ThreadMessage::new(kind, payload, self.layer().peer());
        self.request(message, None)
    }

    /// Send a `METHOD_CALL` and wait for the matching response
    pub fn call_method(&self, method: &str, args: Value) -> Result<PendingCall, CallError> {
        let payload = serde_json::json!({ "method": method, "args": args });
        self.call(MessageKind::MethodCall, payload)
    }

    /// Like [`Bridge::call`], but give up after `timeout`
    ///
    /// On expiry the registry entry is removed before returning.
    pub async fn call_with_deadline(
        &self,
        kind: MessageKind,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, CallError> {
        let message = ThreadMessage::new(kind, payload, self.layer().peer());
        let pending = self.request(message, Some(Instant::now() + timeout))?;
        let id = pending.id().to_string();

        match tokio::time::timeout(timeout, pending).await {
            Ok(result) => result,
            Err(_) => {
                self.shared.pending.lock().cancel(&id);
                Err(CallError::DeadlineExceeded(timeout))
            }
        }
    }

    /// Send a prepared request and register for its response
    ///
    /// The registry entry exists before the envelope is posted, so a
    /// response can never arrive ahead of its listener.
    pub fn request(
        &self,
        message: ThreadMessage,
        deadline: Option<Instant>,
    ) -> Result<PendingCall, CallError> {
        if !message.kind.requires_id() {
            return Err(CallError::NotARequest(message.kind));
        }
        let id = match &message.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => return Err(EnvelopeError::MissingId(message.kind).into()),
        };

        let rx = {
            let mut pending = self.shared.pending.lock();
            pending.prune_expired(Instant::now());
            pending
                .register(&id, deadline)
                .ok_or_else(|| CallError::DuplicateId(id.clone()))?
        };

        if let Err(err) = self.send(&message) {
            self.shared.pending.lock().cancel(&id);
            return Err(err);
        }

        tracing::trace!(id = %id, kind = ?message.kind, layer = %self.layer(), "request sent");
        Ok(PendingCall { id, rx })
    }

    /// Deliver one raw envelope received from the peer
    ///
    /// Malformed envelopes are logged and dropped; this never panics or
    /// returns an error into the host's dispatch loop.
    pub fn dispatch(&self, raw: &str) {
        let message = match ThreadMessage::from_wire(raw) {
            Ok(message) => message,
            Err(err) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(layer = %self.layer(), error = %err, "dropping malformed envelope");
                return;
            }
        };
        self.deliver(&message);
    }

    /// Deliver an already-decoded message
    pub fn deliver(&self, message: &ThreadMessage) {
        if message.kind != MessageKind::MethodCall {
            if let Some(id) = &message.id {
                let waiter = self.shared.pending.lock().take(id);
                if let Some(reply) = waiter {
                    // The caller may have given up already.
                    let _ = reply.send(message.payload.clone());
                }
            }
        }

        let handlers: Vec<Handler> = self
            .shared
            .listeners
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(message);
        }
    }

    /// Drop pending calls whose deadline has passed
    pub fn prune_expired(&self) -> usize {
        let pruned = self.shared.pending.lock().prune_expired(Instant::now());
        if pruned > 0 {
            tracing::debug!(layer = %self.layer(), pruned, "pruned expired calls");
        }
        pruned
    }

    /// Number of calls still awaiting a response
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Number of subscribed handlers
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().handlers.len()
    }

    /// Number of malformed envelopes dropped so far
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Handle returned by [`Bridge::on_message`]
pub struct Subscription {
    id: u64,
    shared: std::sync::Weak<Shared>,
}

impl Subscription {
    /// Deregister exactly this handler
    pub fn unsubscribe(self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .listeners
                .lock()
                .handlers
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// A call awaiting its response
///
/// Resolves with the response payload. Dropping it abandons the wait but
/// leaves the registry entry until a response or a prune removes it.
pub struct PendingCall {
    id: String,
    rx: oneshot::Receiver<Value>,
}

impl PendingCall {
    /// Correlation id of the request
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PendingCall {
    type Output = Result<Value, CallError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| CallError::Abandoned))
    }
}

/// Receiving half of an in-process channel
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<String>,
}

impl Inbox {
    /// Feed every received envelope into `bridge`, in order
    ///
    /// Only a weak reference to `bridge` is kept. The loop ends when the
    /// peer's sending side is dropped or when every handle to `bridge` is
    /// gone, whichever is noticed first.
    pub async fn run(mut self, bridge: Bridge) {
        let layer = bridge.layer();
        let weak = Arc::downgrade(&bridge.shared);
        drop(bridge);

        while let Some(raw) = self.rx.recv().await {
            match weak.upgrade() {
                Some(shared) => Bridge { shared }.dispatch(&raw),
                None => break,
            }
        }
        tracing::debug!(layer = %layer, "inbox closed");
    }

    /// Dispatch whatever is already queued without waiting
    pub fn drain(&mut self, bridge: &Bridge) -> usize {
        let mut count = 0;
        while let Ok(raw) = self.rx.try_recv() {
            bridge.dispatch(&raw);
            count += 1;
        }
        count
    }
}

/// A bridge together with its inbox
pub struct Endpoint {
    /// Sending and dispatching side
    pub bridge: Bridge,
    /// Envelopes posted by the peer
    pub inbox: Inbox,
}

impl Endpoint {
    /// Spawn the inbox loop on the current tokio runtime
    ///
    /// The task exits once the returned bridge and all its clones are
    /// dropped, or once the peer goes away.
    pub fn spawn(self) -> Bridge {
        self.spawn_with_handle().0
    }

    /// Like [`Endpoint::spawn`], also returning the inbox task handle
    pub fn spawn_with_handle(self) -> (Bridge, JoinHandle<()>) {
        let bridge = self.bridge.clone();
        let handle = tokio::spawn(self.inbox.run(self.bridge));
        (bridge, handle)
    }
}

/// Connect a main-thread endpoint and a background endpoint in-process
///
/// Each direction is an unbounded FIFO channel of serialized envelopes.
pub fn pair() -> (Endpoint, Endpoint) {
    let (to_background, background_rx) = mpsc::unbounded_channel();
    let (to_main, main_rx) = mpsc::unbounded_channel();

    let main = Endpoint {
        bridge: Bridge::new(Layer::MainThread, to_background),
        inbox: Inbox { rx: main_rx },
    };
    let background = Endpoint {
        bridge: Bridge::new(Layer::Background, to_main),
        inbox: Inbox { rx: background_rx },
    };
    (main, background)
}
