// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Promise — the one-shot completion handle handed to every exported method.
//
// A Promise settles at most once.  The Pending -> Resolved/Rejected
// transition is a single compare-and-swap, so two threads racing to settle
// the same handle produce exactly one delivery; the loser is logged and
// ignored.  Clones share the same state.  If the last clone is dropped while
// still pending, the caller receives E_UNEXPECTED_ERROR instead of waiting
// forever.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use modulwerk_core::error::codes;
use modulwerk_core::{BridgeError, CodedError, DynamicValue, Rejection, Settlement};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

const PENDING: u8 = 0;
const RESOLVED: u8 = 1;
const REJECTED: u8 = 2;

/// Observable state of a Promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Resolved,
    Rejected,
}

impl PromiseState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            RESOLVED => Self::Resolved,
            REJECTED => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

type Delivery = Box<dyn FnOnce(Settlement) + Send>;

struct PromiseInner {
    label: String,
    state: AtomicU8,
    delivery: Mutex<Option<Delivery>>,
}

impl Drop for PromiseInner {
    fn drop(&mut self) {
        if *self.state.get_mut() != PENDING {
            return;
        }
        warn!(promise = %self.label, "promise dropped without being settled");
        let delivery = self
            .delivery
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(deliver) = delivery {
            deliver(Settlement::Rejected(Rejection {
                code: codes::UNEXPECTED_ERROR.to_string(),
                message: format!("`{}` finished without settling its promise", self.label),
                cause: None,
            }));
        }
    }
}

/// One-shot completion handle for a bridged call.
#[derive(Clone)]
pub struct Promise {
    inner: Arc<PromiseInner>,
}

impl Promise {
    /// Create a promise that hands its settlement to `deliver`.
    ///
    /// `deliver` runs on whichever thread settles the promise.
    pub fn new(label: impl Into<String>, deliver: impl FnOnce(Settlement) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                label: label.into(),
                state: AtomicU8::new(PENDING),
                delivery: Mutex::new(Some(Box::new(deliver))),
            }),
        }
    }

    /// Create a promise paired with a future that yields its settlement.
    pub fn channel(label: impl Into<String>) -> (Promise, PendingCall) {
        let label = label.into();
        let (tx, rx) = oneshot::channel();
        let promise = Promise::new(label.clone(), move |settlement| {
            if tx.send(settlement).is_err() {
                debug!("caller stopped waiting before settlement");
            }
        });
        (
            promise,
            PendingCall {
                label,
                receiver: rx,
            },
        )
    }

    /// `Module.method` this promise belongs to.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn state(&self) -> PromiseState {
        PromiseState::from_raw(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_settled(&self) -> bool {
        self.state() != PromiseState::Pending
    }

    /// Resolve with a value. Returns `false` if the promise was already settled.
    pub fn resolve(&self, value: impl Into<DynamicValue>) -> bool {
        self.settle(
            RESOLVED,
            Settlement::Resolved {
                value: value.into(),
            },
        )
    }

    /// Resolve with any serializable value (structs become maps).
    ///
    /// A value that cannot be marshalled rejects with E_UNEXPECTED_ERROR.
    pub fn resolve_serialize<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        match DynamicValue::from_serialize(value) {
            Ok(value) => self.resolve(value),
            Err(err) => self.reject_with_cause(
                codes::UNEXPECTED_ERROR,
                "result could not be marshalled",
                err,
            ),
        }
    }

    pub fn reject(&self, code: impl Into<String>, message: impl Into<String>) -> bool {
        self.settle_rejection(Rejection {
            code: code.into(),
            message: message.into(),
            cause: None,
        })
    }

    pub fn reject_with_cause(
        &self,
        code: impl Into<String>,
        message: impl Into<String>,
        cause: impl fmt::Display,
    ) -> bool {
        self.settle_rejection(Rejection {
            code: code.into(),
            message: message.into(),
            cause: Some(cause.to_string()),
        })
    }

    /// Reject from an error value.
    ///
    /// `CodedError` and `BridgeError` keep their own codes; anything else is
    /// reported as E_UNKNOWN_ERROR with its message.
    pub fn reject_with<E: StdError + 'static>(&self, err: E) -> bool {
        self.settle_rejection(rejection_from_error(&err))
    }

    pub fn settle_rejection(&self, rejection: Rejection) -> bool {
        self.settle(REJECTED, Settlement::Rejected(rejection))
    }

    fn settle(&self, target: u8, settlement: Settlement) -> bool {
        match self
            .inner
            .state
            .compare_exchange(PENDING, target, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                let delivery = self
                    .inner
                    .delivery
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(deliver) = delivery {
                    deliver(settlement);
                }
                true
            }
            Err(current) => {
                warn!(
                    promise = %self.inner.label,
                    state = ?PromiseState::from_raw(current),
                    "ignoring second settlement"
                );
                false
            }
        }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Map any error to the rejection triple the script side sees.
pub fn rejection_from_error(err: &(dyn StdError + 'static)) -> Rejection {
    if let Some(coded) = err.downcast_ref::<CodedError>() {
        return Rejection {
            code: coded.code.clone(),
            message: coded.message.clone(),
            cause: coded.cause.clone(),
        };
    }
    if let Some(bridge) = err.downcast_ref::<BridgeError>() {
        return bridge.to_rejection();
    }
    Rejection {
        code: codes::UNKNOWN_ERROR.to_string(),
        message: err.to_string(),
        cause: err.source().map(|source| source.to_string()),
    }
}

/// Caller side of a [`Promise::channel`]: resolves to the settlement.
#[derive(Debug)]
pub struct PendingCall {
    label: String,
    receiver: oneshot::Receiver<Settlement>,
}

impl PendingCall {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Settlement if one has already been delivered.
    pub fn try_settlement(&mut self) -> Option<Settlement> {
        self.receiver.try_recv().ok()
    }

    /// Block the current thread until the call settles.
    ///
    /// Must not be called from inside an async runtime; await the
    /// `PendingCall` there instead.
    pub fn blocking_wait(self) -> Settlement {
        let label = self.label;
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| lost_settlement(&label))
    }
}

impl Future for PendingCall {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Settlement> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| lost_settlement(&self.label)))
    }
}

// The drop guard always delivers, so this only fires if a delivery
// closure itself was lost to a panic.
fn lost_settlement(label: &str) -> Settlement {
    Settlement::Rejected(Rejection {
        code: codes::UNEXPECTED_ERROR.to_string(),
        message: format!("`{label}` was abandoned before settling"),
        cause: None,
    })
}
