//! [`RpcTransport`] over the daemon's Unix domain socket.
//!
//! One socket (a "link") carries every call. Writers take a short lock to
//! put their request on the wire; a background reader task parses the
//! daemon's concatenated JSON responses and hands each one to the caller
//! waiting on its id. When the link dies every waiter is failed and the next
//! call opens a fresh one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{RpcRequest, RpcResponse};
use super::{RpcCallError, RpcTransport, TransportError};
use crate::BoxFuture;

type Reply = Result<RpcResponse, TransportError>;

/// Callers waiting for a response, keyed by request id.
#[derive(Default)]
struct Waiters {
    /// Cleared by the reader when the link dies; no waiter may register after.
    open: bool,
    by_id: HashMap<u64, oneshot::Sender<Reply>>,
}

type SharedWaiters = Arc<Mutex<Waiters>>;

/// Why a link stopped.
enum LinkFailure {
    Closed,
    Protocol(String),
}

impl LinkFailure {
    fn to_error(&self) -> TransportError {
        match self {
            LinkFailure::Closed => TransportError::Closed,
            LinkFailure::Protocol(msg) => TransportError::Protocol(msg.clone()),
        }
    }
}

/// Fail every registered waiter and refuse new ones.
fn fail_all(waiters: &SharedWaiters, failure: &LinkFailure) {
    let drained: Vec<_> = match waiters.lock() {
        Ok(mut w) => {
            w.open = false;
            w.by_id.drain().collect()
        }
        Err(_) => return,
    };
    for (_, tx) in drained {
        let _ = tx.send(Err(failure.to_error()));
    }
}

/// One open socket plus its reader task.
struct Link {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    waiters: SharedWaiters,
    reader: JoinHandle<()>,
}

impl Link {
    fn is_open(&self) -> bool {
        self.waiters.lock().map(|w| w.open).unwrap_or(false)
    }

    /// Register interest in the response to `id`.
    fn register(&self, id: u64) -> Result<(WaiterGuard, oneshot::Receiver<Reply>), TransportError> {
        let (tx, rx) = oneshot::channel();
        let mut w = self
            .waiters
            .lock()
            .map_err(|_| TransportError::Closed)?;
        if !w.open {
            return Err(TransportError::Closed);
        }
        w.by_id.insert(id, tx);
        let guard = WaiterGuard {
            waiters: Arc::clone(&self.waiters),
            id,
        };
        Ok((guard, rx))
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
        fail_all(&self.waiters, &LinkFailure::Closed);
    }
}

/// Removes a waiter when its call finishes, times out, or is cancelled.
struct WaiterGuard {
    waiters: SharedWaiters,
    id: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if let Ok(mut w) = self.waiters.lock() {
            w.by_id.remove(&self.id);
        }
    }
}

/// JSON-RPC client for the daemon's Unix socket.
///
/// Safe to share across tasks. Calls are multiplexed over one socket and
/// correlated by id, so the daemon may answer in any order.
pub struct UnixSocketRpc {
    socket_path: PathBuf,
    timeout: Option<Duration>,
    next_id: AtomicU64,
    link: tokio::sync::Mutex<Option<Arc<Link>>>,
    closed: AtomicBool,
}

impl UnixSocketRpc {
    /// Create a client that connects on its first call.
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
            next_id: AtomicU64::new(1),
            link: tokio::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a client and open the socket immediately.
    pub async fn connect(
        socket_path: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let rpc = Self::new(socket_path, timeout);
        let link = rpc.open_link().await?;
        *rpc.link.lock().await = Some(link);
        info!(path = %rpc.socket_path.display(), "Connected to daemon RPC socket");
        Ok(rpc)
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn open_link(&self) -> Result<Arc<Link>, TransportError> {
        let stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|e| TransportError::Connect {
                    path: self.socket_path.clone(),
                    source: e,
                })?;
        let (read_half, write_half) = stream.into_split();

        let waiters: SharedWaiters = Arc::new(Mutex::new(Waiters {
            open: true,
            by_id: HashMap::new(),
        }));
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&waiters)));

        Ok(Arc::new(Link {
            writer: tokio::sync::Mutex::new(write_half),
            waiters,
            reader,
        }))
    }

    /// The live link, opening a new one if the last one died.
    ///
    /// The slot lock is never held across the connect.
    async fn current_link(&self) -> Result<Arc<Link>, TransportError> {
        if let Some(link) = self.live_link().await? {
            return Ok(link);
        }

        debug!(path = %self.socket_path.display(), "Opening daemon link");
        let fresh = self.open_link().await?;

        let mut slot = self.link.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        match slot.as_ref() {
            // Another caller reconnected first; ours is dropped.
            Some(link) if link.is_open() => Ok(Arc::clone(link)),
            _ => {
                *slot = Some(Arc::clone(&fresh));
                Ok(fresh)
            }
        }
    }

    async fn live_link(&self) -> Result<Option<Arc<Link>>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let slot = self.link.lock().await;
        Ok(slot.as_ref().filter(|link| link.is_open()).map(Arc::clone))
    }

    /// One call, bounded end to end by the configured timeout.
    async fn round_trip(&self, method: &str, params: Value) -> Result<Value, RpcCallError> {
        let deadline = self
            .timeout
            .map(|limit| (tokio::time::Instant::now() + limit, limit));

        let link = within(deadline, self.current_link()).await??;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut frame = serde_json::to_vec(&RpcRequest::new(id, method, &params))
            .map_err(|e| TransportError::Protocol(format!("failed to encode request: {e}")))?;
        frame.push(b'\n');

        // Registered before writing so a fast answer always finds its waiter.
        let (_guard, rx) = link.register(id)?;

        debug!(id, method, "RPC request");
        // The write runs on its own task so a cancelled caller can never
        // leave half a frame on the socket.
        let writer_link = Arc::clone(&link);
        let mut write = tokio::spawn(async move {
            let mut writer = writer_link.writer.lock().await;
            writer.write_all(&frame).await
        });
        let written = within(deadline, &mut write).await;
        match written {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                warn!(id, method, error = %e, "Failed to write RPC request");
                fail_all(&link.waiters, &LinkFailure::Closed);
                return Err(TransportError::Io(e).into());
            }
            Ok(Err(_)) => return Err(TransportError::Closed.into()),
            Err(timeout) => {
                // A daemon that stops reading wedges the writer; the frame may
                // be cut short, so the link cannot be reused.
                warn!(id, method, "RPC request write timed out");
                write.abort();
                fail_all(&link.waiters, &LinkFailure::Closed);
                return Err(timeout.into());
            }
        }

        let reply = within(deadline, rx).await?;
        let response = reply.map_err(|_| TransportError::Closed)??;
        response.into_result()
    }

    /// Stop the reader and shut the socket down.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let link = self.link.lock().await.take();
        if let Some(link) = link {
            let _ = link.writer.lock().await.shutdown().await;
            fail_all(&link.waiters, &LinkFailure::Closed);
            info!(path = %self.socket_path.display(), "Daemon RPC connection closed");
        }
    }
}

impl RpcTransport for UnixSocketRpc {
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, RpcCallError>> {
        Box::pin(self.round_trip(method, params))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.shutdown())
    }
}

/// Await `fut`, giving up at `deadline` if there is one.
async fn within<F: Future>(
    deadline: Option<(tokio::time::Instant, Duration)>,
    fut: F,
) -> Result<F::Output, TransportError> {
    match deadline {
        Some((at, limit)) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| TransportError::Timeout(limit)),
        None => Ok(fut.await),
    }
}

/// Read responses until the socket closes or the stream stops making sense.
async fn read_loop(mut reader: OwnedReadHalf, waiters: SharedWaiters) {
    let mut framer = ResponseFramer::default();
    let failure = loop {
        match reader.read_buf(&mut framer.buf).await {
            Ok(0) => break LinkFailure::Closed,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Daemon socket read failed");
                break LinkFailure::Closed;
            }
        }

        let responses = match framer.decode() {
            Ok(responses) => responses,
            Err(msg) => break LinkFailure::Protocol(msg),
        };
        if let Err(msg) = deliver(&waiters, responses) {
            break LinkFailure::Protocol(msg);
        }
    };

    match &failure {
        LinkFailure::Closed => debug!("Daemon link closed"),
        LinkFailure::Protocol(msg) => warn!(error = %msg, "Daemon link dropped"),
    }
    fail_all(&waiters, &failure);
}

/// Hand each response to its waiter.
fn deliver(waiters: &SharedWaiters, responses: Vec<RpcResponse>) -> Result<(), String> {
    for response in responses {
        let Some(id) = response.call_id() else {
            return Err(format!("response without a usable id: {:?}", response.id));
        };
        let tx = waiters
            .lock()
            .map_err(|_| "waiter map poisoned".to_string())?
            .by_id
            .remove(&id);
        match tx {
            Some(tx) => {
                let _ = tx.send(Ok(response));
            }
            None => debug!(id, "Discarding response nobody is waiting for"),
        }
    }
    Ok(())
}

/// Splits the daemon's byte stream into complete JSON responses.
///
/// Responses may be concatenated with or without whitespace between them.
/// Each byte is scanned once for object boundaries, and only complete
/// objects are handed to serde, so a large reply arriving in many chunks is
/// not re-parsed on every read. A trailing partial object stays buffered.
#[derive(Debug, Default)]
struct ResponseFramer {
    buf: Vec<u8>,
    /// Bytes of `buf` already scanned.
    scanned: usize,
    /// End of the last complete top-level value in `buf`.
    complete: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl ResponseFramer {
    #[cfg(test)]
    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn decode(&mut self) -> Result<Vec<RpcResponse>, String> {
        self.scan()?;
        if self.complete == 0 {
            return Ok(Vec::new());
        }

        let responses = serde_json::Deserializer::from_slice(&self.buf[..self.complete])
            .into_iter::<RpcResponse>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;

        self.buf.drain(..self.complete);
        self.scanned -= self.complete;
        self.complete = 0;
        Ok(responses)
    }

    fn scan(&mut self) -> Result<(), String> {
        for i in self.scanned..self.buf.len() {
            let byte = self.buf[i];
            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' if self.depth > 0 => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.complete = i + 1;
                    }
                }
                b' ' | b'\t' | b'\r' | b'\n' => {}
                _ if self.depth > 0 => {}
                other => {
                    return Err(format!(
                        "expected a JSON object, found byte 0x{other:02x} at offset {i}"
                    ));
                }
            }
        }
        self.scanned = self.buf.len();
        Ok(())
    }
}
