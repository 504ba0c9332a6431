// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host lifecycle fan-out (foreground, background, teardown).
//
// Listeners are held weakly: a provider that goes away without
// unregistering is pruned on the next broadcast.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use crate::registry::InternalModule;

/// Receives host lifecycle transitions.
pub trait LifecycleEventListener: Send + Sync {
    fn on_host_resume(&self) {}

    fn on_host_pause(&self) {}

    fn on_host_destroy(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Created,
    Resumed,
    Paused,
    Destroyed,
}

/// Built-in internal module that tracks the host state and notifies
/// registered listeners.
pub struct HostLifecycle {
    state: Mutex<HostState>,
    listeners: Mutex<Vec<Weak<dyn LifecycleEventListener>>>,
}

impl HostLifecycle {
    pub const INTERFACE: &'static str = "HostLifecycle";

    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState::Created),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> HostState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register<L: LifecycleEventListener + 'static>(&self, listener: &Arc<L>) {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn LifecycleEventListener> = weak;
        self.lock_listeners().push(weak);
    }

    pub fn unregister<L: LifecycleEventListener + 'static>(&self, listener: &Arc<L>) {
        let target = Arc::as_ptr(listener) as *const ();
        self.lock_listeners()
            .retain(|weak| weak.as_ptr() as *const () != target);
    }

    /// Number of listeners still alive.
    pub fn listener_count(&self) -> usize {
        self.lock_listeners()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn host_resumed(&self) {
        self.transition(HostState::Resumed, |l| l.on_host_resume());
    }

    pub fn host_paused(&self) {
        self.transition(HostState::Paused, |l| l.on_host_pause());
    }

    pub fn host_destroyed(&self) {
        self.transition(HostState::Destroyed, |l| l.on_host_destroy());
    }

    fn transition(&self, next: HostState, notify: impl Fn(&dyn LifecycleEventListener)) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == next || *state == HostState::Destroyed {
                debug!(from = ?*state, to = ?next, "ignoring host transition");
                return;
            }
            *state = next;
        }
        // Upgrade under the lock, notify outside it so listeners may
        // register or unregister from their callbacks.
        let live: Vec<Arc<dyn LifecycleEventListener>> = {
            let mut listeners = self.lock_listeners();
            listeners.retain(|weak| weak.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        debug!(state = ?next, listeners = live.len(), "host lifecycle transition");
        for listener in live {
            notify(listener.as_ref());
        }
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Weak<dyn LifecycleEventListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HostLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl InternalModule for HostLifecycle {
    fn exported_interfaces(&self) -> Vec<&'static str> {
        vec![Self::INTERFACE]
    }
}
