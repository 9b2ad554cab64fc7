//! Remote call collaborator
//!
//! Components don't know how requests travel. They receive a [`Transport`] and
//! hand it a [`RemoteCall`] plus a completion callback; the transport calls the
//! completion exactly once with either the raw response body or a
//! [`TransportError`]. Nothing here retries.

use crate::error::TransportError;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub method: Method,
    pub url: String,
    pub params: BTreeMap<String, String>,
}

impl RemoteCall {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn post(url: impl Into<String>, params: BTreeMap<String, String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            params,
        }
    }
}

/// Completion callback, called once with the body or the failure
pub type Completion = Box<dyn FnOnce(Result<String, TransportError>)>;

pub type SharedTransport = Rc<dyn Transport>;

pub trait Transport {
    fn send(&self, call: RemoteCall, on_complete: Completion);
}

/// Transport that parks requests until the test (or harness) answers them
#[derive(Default)]
pub struct MemoryTransport {
    pending: RefCell<VecDeque<(RemoteCall, Completion)>>,
    sent: RefCell<Vec<RemoteCall>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request ever sent, oldest first
    pub fn sent(&self) -> Vec<RemoteCall> {
        self.sent.borrow().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Complete the oldest pending request with `body`
    pub fn respond(&self, body: &str) -> Option<RemoteCall> {
        self.complete(Ok(body.to_string()))
    }

    /// Fail the oldest pending request
    pub fn fail(&self, reason: &str) -> Option<RemoteCall> {
        let url = self.pending.borrow().front()?.0.url.clone();
        self.complete(Err(TransportError::Request {
            url,
            reason: reason.to_string(),
        }))
    }

    fn complete(&self, result: Result<String, TransportError>) -> Option<RemoteCall> {
        // Pop before calling: the completion may send a follow-up request
        let (call, on_complete) = self.pending.borrow_mut().pop_front()?;
        on_complete(result);
        Some(call)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, call: RemoteCall, on_complete: Completion) {
        tracing::debug!(url = %call.url, method = ?call.method, "request queued");
        self.sent.borrow_mut().push(call.clone());
        self.pending.borrow_mut().push_back((call, on_complete));
    }
}
