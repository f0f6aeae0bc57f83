//! A scripted stand-in for the Lightning daemon's RPC socket.
//!
//! [`FakeDaemon`] listens on a real Unix socket inside a temp directory and
//! answers JSON-RPC requests through a caller-supplied handler. Requests on
//! one connection are answered concurrently, so delayed replies can come
//! back out of order the way a busy daemon's would.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{JoinHandle, JoinSet};

/// What the fake daemon does with one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with `result`.
    Result(Value),
    /// Answer with a JSON-RPC error object.
    Error { code: i64, message: String },
    /// Wait, then send the inner reply.
    Delayed(Duration, Box<Reply>),
    /// Drop the connection without answering.
    HangUp,
    /// Never answer.
    Silent,
}

impl Reply {
    pub fn error(code: i64, message: &str) -> Self {
        Reply::Error {
            code,
            message: message.to_string(),
        }
    }

    pub fn after(self, delay: Duration) -> Self {
        Reply::Delayed(delay, Box::new(self))
    }
}

type Handler = Arc<dyn Fn(&str, &Value) -> Reply + Send + Sync>;

#[derive(Clone)]
struct Shared {
    handler: Handler,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    connections: Arc<AtomicUsize>,
}

/// A fake daemon bound to `<tempdir>/lightning-rpc`.
///
/// Must be started from inside a Tokio runtime. The socket and its
/// directory are removed when the value is dropped.
pub struct FakeDaemon {
    socket_path: PathBuf,
    shared: Shared,
    accept: Option<JoinHandle<()>>,
    _dir: TempDir,
}

impl FakeDaemon {
    /// Start listening, answering every request with `handler`.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let dir = TempDir::new().expect("failed to create temp dir");
        let socket_path = dir.path().join("lightning-rpc");
        let shared = Shared {
            handler: Arc::new(handler),
            requests: Arc::default(),
            connections: Arc::default(),
        };

        let mut daemon = Self {
            socket_path,
            shared,
            accept: None,
            _dir: dir,
        };
        daemon.listen();
        daemon
    }

    /// A daemon that answers every method with `{"method": <name>, "params": <params>}`.
    pub fn echo() -> Self {
        Self::start(|method, params| Reply::Result(json!({"method": method, "params": params})))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Every request received, as `(method, params)`.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.shared
            .requests
            .lock()
            .expect("fake daemon lock poisoned")
            .clone()
    }

    /// Number of connections accepted since start.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Close the listener and every open connection, and remove the socket.
    pub async fn stop(&mut self) {
        if let Some(accept) = self.accept.take() {
            accept.abort();
            let _ = accept.await;
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }

    /// Stop, then listen again on the same path with the same handler.
    pub async fn restart(&mut self) {
        self.stop().await;
        self.listen();
    }

    fn listen(&mut self) {
        let listener = UnixListener::bind(&self.socket_path).expect("failed to bind fake daemon");
        let shared = self.shared.clone();
        self.accept = Some(tokio::spawn(accept_loop(listener, shared)));
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        if let Some(accept) = self.accept.take() {
            accept.abort();
        }
    }
}

/// Connection tasks live in the accept task's `JoinSet`, so aborting the
/// accept task tears every connection down with it.
async fn accept_loop(listener: UnixListener, shared: Shared) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((stream, _)) = accepted else { return };
                shared.connections.fetch_add(1, Ordering::SeqCst);
                connections.spawn(serve_connection(stream, shared.clone()));
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn serve_connection(stream: UnixStream, shared: Shared) {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(tokio::sync::Mutex::new(writer));
    let mut in_flight = JoinSet::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let Ok(requests) = take_requests(&mut buf) else {
            return;
        };

        for request in requests {
            let id = request.get("id").cloned().unwrap_or(Value::Null);
            let method = request
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let params = request.get("params").cloned().unwrap_or(Value::Null);

            shared
                .requests
                .lock()
                .expect("fake daemon lock poisoned")
                .push((method.clone(), params.clone()));

            let reply = (shared.handler)(&method, &params);
            if matches!(reply, Reply::HangUp) {
                return;
            }
            in_flight.spawn(answer(Arc::clone(&writer), id, reply));
        }
    }
}

async fn answer(writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>, id: Value, mut reply: Reply) {
    while let Reply::Delayed(delay, inner) = reply {
        tokio::time::sleep(delay).await;
        reply = *inner;
    }
    let body = match reply {
        Reply::Result(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Reply::Error { code, message } => {
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
        }
        Reply::Silent | Reply::HangUp | Reply::Delayed(..) => return,
    };

    let mut frame = serde_json::to_vec(&body).expect("reply serializes");
    frame.extend_from_slice(b"\n\n");
    let _ = writer.lock().await.write_all(&frame).await;
}

/// Pull every complete JSON value off the front of `buf`.
fn take_requests(buf: &mut Vec<u8>) -> Result<Vec<Value>, serde_json::Error> {
    let mut requests = Vec::new();
    let mut consumed = 0;
    let mut stream = serde_json::Deserializer::from_slice(&buf[..]).into_iter::<Value>();
    loop {
        match stream.next() {
            Some(Ok(value)) => {
                requests.push(value);
                consumed = stream.byte_offset();
            }
            Some(Err(e)) if e.is_eof() => break,
            Some(Err(e)) => return Err(e),
            None => {
                consumed = stream.byte_offset();
                break;
            }
        }
    }
    buf.drain(..consumed);
    Ok(requests)
}
