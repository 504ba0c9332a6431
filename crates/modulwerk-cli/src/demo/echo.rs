// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Echo — arithmetic and round-trip methods for exercising the dispatch path.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use modulwerk_bridge::{EventEmitter, MethodResult, MethodSet, Module, ModuleRegistry, Promise};
use modulwerk_core::{CodedError, DynamicValue};

#[derive(Default)]
pub struct Echo {
    events: Arc<OnceLock<Arc<EventEmitter>>>,
}

impl Module for Echo {
    fn name(&self) -> &str {
        "Echo"
    }

    fn methods(&self) -> Vec<MethodSet> {
        let events = Arc::clone(&self.events);
        vec![
            MethodSet::new("Echo")
                .method("add", |a: f64, b: f64, promise: Promise| -> MethodResult {
                    promise.resolve(a + b);
                    Ok(())
                })
                .method(
                    "addLater",
                    |a: f64, b: f64, delay_ms: Option<i64>, promise: Promise| -> MethodResult {
                        let delay = Duration::from_millis(delay_ms.unwrap_or(10).max(0) as u64);
                        std::thread::spawn(move || {
                            std::thread::sleep(delay);
                            promise.resolve(a + b);
                        });
                        Ok(())
                    },
                )
                .method("echo", |value: DynamicValue, promise: Promise| -> MethodResult {
                    promise.resolve(value);
                    Ok(())
                })
                .method("ping", move |payload: DynamicValue, promise: Promise| -> MethodResult {
                    let reached = events
                        .get()
                        .map(|events| events.emit("echoPing", payload))
                        .unwrap_or(0);
                    promise.resolve(reached);
                    Ok(())
                })
                .method("refuse", |reason: Option<String>, promise: Promise| -> MethodResult {
                    let err = CodedError::new("E_ECHO_REFUSED", "echo refused the call");
                    promise.reject_with(match reason {
                        Some(reason) => err.with_cause(reason),
                        None => err,
                    });
                    Ok(())
                }),
        ]
    }

    fn constants(&self) -> HashMap<String, DynamicValue> {
        HashMap::from([(
            "version".to_string(),
            DynamicValue::from(env!("CARGO_PKG_VERSION")),
        )])
    }

    fn on_create(&self, registry: &ModuleRegistry) {
        let _ = self.events.set(registry.event_emitter());
    }
}
