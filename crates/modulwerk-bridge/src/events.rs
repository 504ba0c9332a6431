// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// EventEmitter — the built-in internal module providers use to push events
// to the script side.

use chrono::{DateTime, Utc};
use modulwerk_core::{DynamicValue, ViewId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::registry::InternalModule;

/// One event travelling from native code to the script side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeEvent {
    pub name: String,
    /// Set when the event targets a mounted view rather than a module listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewId>,
    pub payload: DynamicValue,
    pub emitted_at: DateTime<Utc>,
}

/// Fan-out of bridge events to every subscriber.
///
/// Backed by a bounded broadcast channel; a subscriber that falls more than
/// `capacity` events behind observes `RecvError::Lagged` and skips ahead.
/// Emitting with no subscribers drops the event.
#[derive(Debug)]
pub struct EventEmitter {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventEmitter {
    /// Interface name the emitter is registered under.
    pub const INTERFACE: &'static str = "EventEmitter";

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Emit a module-level event. Returns the number of subscribers reached.
    pub fn emit(&self, name: &str, payload: impl Into<DynamicValue>) -> usize {
        self.send(BridgeEvent {
            name: name.to_string(),
            view: None,
            payload: payload.into(),
            emitted_at: Utc::now(),
        })
    }

    /// Emit an event on behalf of one mounted view.
    pub fn emit_to_view(&self, view: ViewId, name: &str, payload: impl Into<DynamicValue>) -> usize {
        self.send(BridgeEvent {
            name: name.to_string(),
            view: Some(view),
            payload: payload.into(),
            emitted_at: Utc::now(),
        })
    }

    fn send(&self, event: BridgeEvent) -> usize {
        match self.sender.send(event) {
            Ok(reached) => {
                trace!(reached, "event emitted");
                reached
            }
            Err(broadcast::error::SendError(event)) => {
                debug!(event = %event.name, "no subscribers, event dropped");
                0
            }
        }
    }
}

impl InternalModule for EventEmitter {
    fn exported_interfaces(&self) -> Vec<&'static str> {
        vec![Self::INTERFACE]
    }
}
