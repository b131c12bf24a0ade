//! Two-channel RPC multiplexer over one byte stream.
//!
//! Each endpoint serves requests of its inbound protocol and issues calls of
//! its outbound protocol. Three tasks run per connection:
//!
//! - a reader that routes responses to waiting callers and requests to the
//!   dispatcher,
//! - a dispatcher that runs the handler for one request at a time, so
//!   requests are served in the order they were sent,
//! - a writer that drains a single outbound queue, so frames leave in the
//!   order they were queued.
//!
//! Both queues hold at most [`MuxConfig::queue_depth`] entries. A caller
//! facing a full outbound queue gets [`RpcError::Backlogged`]; a peer that
//! overfills the request queue is disconnected.
//!
//! When the stream ends every outstanding call fails with
//! [`RpcError::Shutdown`].

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

use crate::codec::{CodecError, CompressionConfig, decode_payload, encode_payload};
use crate::framing::{Channel, Frame, FrameConfig, FrameError, FrameKind, read_frame, write_frame};
use crate::messages::Protocol;
use crate::service::Handler;

/// Settings shared by both ends of a connection.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Frame size limits.
    pub frame: FrameConfig,
    /// When to compress payloads.
    pub compression: CompressionConfig,
    /// Capacity of the outbound frame queue and of the inbound request
    /// queue. Default: 1024.
    pub queue_depth: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            compression: CompressionConfig::default(),
            queue_depth: 1024,
        }
    }
}

/// Errors returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The connection is closed; the call was not or will not be answered.
    #[error("connection is shut down")]
    Shutdown,

    /// The outbound queue is full; the request was not sent.
    #[error("outbound queue is full")]
    Backlogged,

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] CodecError),
}

#[derive(Debug, thiserror::Error)]
enum ProtocolViolation {
    #[error("unexpected {kind:?} frame on {channel:?}")]
    Misrouted { channel: Channel, kind: FrameKind },
    #[error("request queue of {0} is full")]
    Flooded(usize),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

fn send_error<T>(err: TrySendError<T>) -> RpcError {
    match err {
        TrySendError::Full(_) => RpcError::Backlogged,
        TrySendError::Closed(_) => RpcError::Shutdown,
    }
}

/// Waiting callers by call id. `None` once the connection has closed.
type Pending<T> = Mutex<Option<HashMap<u64, oneshot::Sender<T>>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn until_closed(rx: &mut watch::Receiver<bool>) {
    // A dropped sender also ends the connection.
    let _ = rx.wait_for(|closed| *closed).await;
}

/// Calling half of a connection for protocol `P`.
///
/// Every method is synchronous or cancel-safe, so it can be used from
/// handler threads as well as from async tasks.
pub struct RpcClient<P: Protocol> {
    frames: mpsc::Sender<Frame>,
    pending: Arc<Pending<P::Response>>,
    next_call: AtomicU64,
    compression: CompressionConfig,
    closed: Arc<watch::Sender<bool>>,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: Protocol> RpcClient<P> {
    /// Send `request` and return a receiver for its response.
    pub fn start(&self, request: P::Request) -> Result<oneshot::Receiver<P::Response>, RpcError> {
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let payload = encode_payload(call_id, &request, &self.compression)?;
        let (tx, rx) = oneshot::channel();

        // Registering under the lock orders this call against the reader's
        // final drain: either the drain sees the entry or we see `None`.
        lock(&self.pending)
            .as_mut()
            .ok_or(RpcError::Shutdown)?
            .insert(call_id, tx);

        if let Err(e) = self.frames.try_send(Frame::request(P::CHANNEL, payload)) {
            if let Some(map) = lock(&self.pending).as_mut() {
                map.remove(&call_id);
            }
            return Err(send_error(e));
        }
        Ok(rx)
    }

    /// Send `request` and wait for the response.
    pub async fn call(&self, request: P::Request) -> Result<P::Response, RpcError> {
        self.start(request)?.await.map_err(|_| RpcError::Shutdown)
    }

    /// Send `request` and block the current thread until the response
    /// arrives. Must not be called from an async context.
    pub fn call_blocking(&self, request: P::Request) -> Result<P::Response, RpcError> {
        self.start(request)?
            .blocking_recv()
            .map_err(|_| RpcError::Shutdown)
    }

    /// Send `request` without waiting; the response is discarded.
    pub fn notify(&self, request: P::Request) -> Result<(), RpcError> {
        if self.is_closed() {
            return Err(RpcError::Shutdown);
        }
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let payload = encode_payload(call_id, &request, &self.compression)?;
        self.frames
            .try_send(Frame::request(P::CHANNEL, payload))
            .map_err(send_error)
    }

    /// Close the connection. Outstanding calls fail with [`RpcError::Shutdown`].
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Whether the connection has closed.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wait until the connection closes.
    pub async fn closed(&self) {
        until_closed(&mut self.closed.subscribe()).await;
    }
}

/// Start serving `stream`: requests of protocol `In` go to `handler`, and
/// the returned client issues calls of protocol `Out`.
pub fn spawn_connection<S, In, Out>(
    stream: S,
    handler: Arc<dyn Handler<In>>,
    config: MuxConfig,
) -> RpcClient<Out>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    In: Protocol,
    Out: Protocol,
{
    let (reader, writer) = tokio::io::split(stream);
    let depth = config.queue_depth.max(1);
    let (frames_tx, frames_rx) = mpsc::channel(depth);
    let (requests_tx, requests_rx) = mpsc::channel(depth);
    let closed = Arc::new(watch::Sender::new(false));
    let pending = Arc::new(Mutex::new(Some(HashMap::new())));

    tokio::spawn(write_loop(
        writer,
        frames_rx,
        closed.subscribe(),
        config.frame.clone(),
    ));
    tokio::spawn(dispatch_loop::<In>(
        requests_rx,
        handler,
        frames_tx.clone(),
        config.compression.clone(),
        Arc::clone(&closed),
    ));
    tokio::spawn(read_loop::<_, In, Out>(
        reader,
        requests_tx,
        Arc::clone(&pending),
        Arc::clone(&closed),
        config.frame,
    ));

    RpcClient {
        frames: frames_tx,
        pending,
        next_call: AtomicU64::new(1),
        compression: config.compression,
        closed,
        _protocol: PhantomData,
    }
}

async fn read_loop<R, In, Out>(
    mut reader: R,
    requests: mpsc::Sender<(u64, In::Request)>,
    pending: Arc<Pending<Out::Response>>,
    closed: Arc<watch::Sender<bool>>,
    config: FrameConfig,
) where
    R: AsyncRead + Unpin,
    In: Protocol,
    Out: Protocol,
{
    let mut closed_rx = closed.subscribe();
    loop {
        let result = tokio::select! {
            result = read_frame(&mut reader, &config) => result,
            () = until_closed(&mut closed_rx) => break,
        };
        match result {
            Ok(frame) => {
                if let Err(e) = route::<In, Out>(frame, &requests, &pending) {
                    tracing::warn!("Protocol violation, closing connection: {e}");
                    break;
                }
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(e) => {
                tracing::warn!("Read failed, closing connection: {e}");
                break;
            }
        }
    }

    closed.send_replace(true);
    // Dropping the senders wakes every waiting caller with an error.
    drop(lock(&pending).take());
}

fn route<In: Protocol, Out: Protocol>(
    frame: Frame,
    requests: &mpsc::Sender<(u64, In::Request)>,
    pending: &Pending<Out::Response>,
) -> Result<(), ProtocolViolation> {
    match frame.kind {
        FrameKind::Request if frame.channel == In::CHANNEL => {
            let (call_id, request) = decode_payload::<In::Request>(&frame.payload)?;
            // Never wait here: a handler may be blocked on a reply that only
            // this task can deliver. The dispatcher only goes away after a
            // handler failure, which closes the connection anyway.
            if let Err(TrySendError::Full(_)) = requests.try_send((call_id, request)) {
                return Err(ProtocolViolation::Flooded(requests.max_capacity()));
            }
        }
        FrameKind::Response if frame.channel == Out::CHANNEL => {
            let (call_id, response) = decode_payload::<Out::Response>(&frame.payload)?;
            let waiter = lock(pending).as_mut().and_then(|map| map.remove(&call_id));
            match waiter {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => tracing::trace!("Discarding reply to call {call_id}"),
            }
        }
        kind => {
            return Err(ProtocolViolation::Misrouted {
                channel: frame.channel,
                kind,
            });
        }
    }
    Ok(())
}

async fn dispatch_loop<P: Protocol>(
    mut requests: mpsc::Receiver<(u64, P::Request)>,
    handler: Arc<dyn Handler<P>>,
    frames: mpsc::Sender<Frame>,
    compression: CompressionConfig,
    closed: Arc<watch::Sender<bool>>,
) {
    while let Some((call_id, request)) = requests.recv().await {
        let handler = Arc::clone(&handler);
        let response = match tokio::task::spawn_blocking(move || handler.handle(request)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Handler for call {call_id} failed: {e}");
                closed.send_replace(true);
                break;
            }
        };
        let payload = match encode_payload(call_id, &response, &compression) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode reply to call {call_id}: {e}");
                closed.send_replace(true);
                break;
            }
        };
        if frames.send(Frame::response(P::CHANNEL, payload)).await.is_err() {
            break;
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut frames: mpsc::Receiver<Frame>,
    mut closed: watch::Receiver<bool>,
    config: FrameConfig,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = frames.recv() => frame,
            () = until_closed(&mut closed) => None,
        };
        let Some(frame) = frame else { break };
        if let Err(e) = write_frame(&mut writer, &frame, &config).await {
            tracing::debug!("Write failed: {e}");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
#[path = "mux_tests.rs"]
mod tests;
