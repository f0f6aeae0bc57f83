//! A recording, scripted [`RpcTransport`] for gateway tests.
//!
//! [`MockRpc`] records every call it receives and answers from a queue of
//! scripted replies. Once the queue is empty it answers `{}`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use lightning_rest_core::rpc::{RpcCallError, RpcError, RpcTransport, TransportError};
use lightning_rest_core::BoxFuture;
use serde_json::{Value, json};

/// One call as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
}

enum Scripted {
    Ok(Value),
    Rpc(RpcError),
    Unavailable,
}

/// In-memory transport that never touches a socket.
#[derive(Default)]
pub struct MockRpc {
    calls: Mutex<Vec<RecordedCall>>,
    replies: Mutex<VecDeque<Scripted>>,
    closed: AtomicBool,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result.
    pub fn reply_ok(&self, result: Value) -> &Self {
        self.push(Scripted::Ok(result))
    }

    /// Queue a daemon error object.
    pub fn reply_error(&self, code: i64, message: &str) -> &Self {
        self.push(Scripted::Rpc(RpcError::new(code, message)))
    }

    /// Queue a transport failure, as if the socket had gone away.
    pub fn reply_unavailable(&self) -> &Self {
        self.push(Scripted::Unavailable)
    }

    fn push(&self, reply: Scripted) -> &Self {
        self.replies
            .lock()
            .expect("mock replies lock poisoned")
            .push_back(reply);
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock calls lock poisoned").clone()
    }

    /// The most recent call. Panics if there was none.
    pub fn last_call(&self) -> RecordedCall {
        self.calls()
            .pop()
            .expect("expected at least one daemon call")
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock calls lock poisoned").len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RpcTransport for MockRpc {
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, RpcCallError>> {
        self.calls
            .lock()
            .expect("mock calls lock poisoned")
            .push(RecordedCall {
                method: method.to_string(),
                params,
            });
        let reply = self
            .replies
            .lock()
            .expect("mock replies lock poisoned")
            .pop_front();

        Box::pin(async move {
            match reply {
                None => Ok(json!({})),
                Some(Scripted::Ok(value)) => Ok(value),
                Some(Scripted::Rpc(err)) => Err(RpcCallError::Rpc(err)),
                Some(Scripted::Unavailable) => Err(TransportError::Closed.into()),
            }
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.closed.store(true, Ordering::SeqCst);
        Box::pin(async {})
    }
}
