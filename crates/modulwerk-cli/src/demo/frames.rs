// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FrameSampler — a stream-processing module that analyses at most one frame
// at a time and drops frames that arrive while it is busy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use modulwerk_bridge::{
    BusyLatch, EventEmitter, LifecycleEventListener, MethodResult, MethodSet, Module,
    ModuleRegistry, Promise,
};
use modulwerk_core::{CodedError, DynamicValue};
use tracing::{debug, info};

const MAX_BURST: i32 = 1000;

struct SamplerState {
    latch: Arc<BusyLatch>,
    processed: AtomicU64,
    paused: AtomicBool,
    events: OnceLock<Arc<EventEmitter>>,
}

impl SamplerState {
    fn stats(&self) -> DynamicValue {
        DynamicValue::from(HashMap::from([
            ("processed".to_string(), self.processed.load(Ordering::Relaxed)),
            ("dropped".to_string(), self.latch.dropped_count()),
        ]))
    }

    /// Fake per-frame analysis: mean luminance of a synthetic gradient.
    fn analyse(&self, width: i32, height: i32, work: Duration) -> f64 {
        thread::sleep(work);
        let pixels = f64::from(width.max(1)) * f64::from(height.max(1));
        let luminance = (pixels.sqrt() % 256.0).floor();
        self.processed.fetch_add(1, Ordering::Relaxed);
        if let Some(events) = self.events.get() {
            events.emit(
                "frameProcessed",
                HashMap::from([
                    ("width".to_string(), DynamicValue::from(width)),
                    ("height".to_string(), DynamicValue::from(height)),
                    ("luminance".to_string(), DynamicValue::from(luminance)),
                ]),
            );
        }
        luminance
    }

    fn check_running(&self) -> Result<(), CodedError> {
        if self.paused.load(Ordering::Acquire) {
            return Err(CodedError::new(
                "E_FRAME_SAMPLER_PAUSED",
                "frame sampling is paused while the host is in the background",
            ));
        }
        Ok(())
    }
}

impl LifecycleEventListener for SamplerState {
    fn on_host_resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    fn on_host_pause(&self) {
        self.paused.store(true, Ordering::Release);
    }
}

pub struct FrameSampler {
    state: Arc<SamplerState>,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SamplerState {
                latch: Arc::new(BusyLatch::new("FrameSampler")),
                processed: AtomicU64::new(0),
                paused: AtomicBool::new(false),
                events: OnceLock::new(),
            }),
        }
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for FrameSampler {
    fn name(&self) -> &str {
        "FrameSampler"
    }

    fn methods(&self) -> Vec<MethodSet> {
        let submit = Arc::clone(&self.state);
        let burst = Arc::clone(&self.state);
        let stats = Arc::clone(&self.state);
        vec![
            MethodSet::new("FrameSampler")
                .method(
                    "submitFrame",
                    move |width: i32, height: i32, promise: Promise| -> MethodResult {
                        if let Err(err) = submit.check_running() {
                            promise.reject_with(err);
                            return Ok(());
                        }
                        let Some(guard) = submit.latch.try_acquire_owned() else {
                            promise.resolve(HashMap::from([(
                                "accepted".to_string(),
                                DynamicValue::from(false),
                            )]));
                            return Ok(());
                        };
                        let state = Arc::clone(&submit);
                        thread::spawn(move || {
                            let luminance = state.analyse(width, height, Duration::from_millis(1));
                            drop(guard);
                            promise.resolve(HashMap::from([
                                ("accepted".to_string(), DynamicValue::from(true)),
                                ("luminance".to_string(), DynamicValue::from(luminance)),
                            ]));
                        });
                        Ok(())
                    },
                )
                .method("submitBurst", move |count: i32, promise: Promise| -> MethodResult {
                    if let Err(err) = burst.check_running() {
                        promise.reject_with(err);
                        return Ok(());
                    }
                    let count = count.clamp(0, MAX_BURST);
                    let state = Arc::clone(&burst);
                    thread::spawn(move || {
                        let workers: Vec<_> = (0..count)
                            .filter_map(|i| {
                                let guard = state.latch.try_acquire_owned()?;
                                let state = Arc::clone(&state);
                                Some(thread::spawn(move || {
                                    state.analyse(64 + i, 48 + i, Duration::from_millis(2));
                                    drop(guard);
                                }))
                            })
                            .collect();
                        let accepted = workers.len();
                        for worker in workers {
                            let _ = worker.join();
                        }
                        debug!(submitted = count, accepted, "frame burst finished");
                        promise.resolve(state.stats());
                    });
                    Ok(())
                })
                .method("stats", move |promise: Promise| -> MethodResult {
                    promise.resolve(stats.stats());
                    Ok(())
                }),
        ]
    }

    fn constants(&self) -> HashMap<String, DynamicValue> {
        HashMap::from([("maxBurst".to_string(), DynamicValue::from(MAX_BURST))])
    }

    fn on_create(&self, registry: &ModuleRegistry) {
        let _ = self.state.events.set(registry.event_emitter());
        registry.host_lifecycle().register(&self.state);
    }

    fn on_destroy(&self) {
        info!(
            processed = self.state.processed.load(Ordering::Relaxed),
            dropped = self.state.latch.dropped_count(),
            "frame sampler stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modulwerk_bridge::BridgeProxy;
    use modulwerk_core::BridgeConfig;

    fn proxy() -> BridgeProxy {
        let mut registry = ModuleRegistry::new(BridgeConfig::default());
        registry.register_module(Arc::new(FrameSampler::new())).unwrap();
        BridgeProxy::new(Arc::new(registry))
    }

    #[test]
    fn single_frame_is_analysed() {
        let proxy = proxy();
        let settlement = proxy
            .call_method("FrameSampler", "submitFrame", vec![640.into(), 480.into()])
            .blocking_wait();
        let result = settlement.value().and_then(DynamicValue::as_map).unwrap();
        assert_eq!(result["accepted"], DynamicValue::Bool(true));
    }

    #[test]
    fn burst_counts_every_frame_once() {
        let proxy = proxy();
        let settlement = proxy
            .call_method("FrameSampler", "submitBurst", vec![50.into()])
            .blocking_wait();
        let stats = settlement.value().and_then(DynamicValue::as_map).unwrap();
        let processed = stats["processed"].as_f64().unwrap();
        let dropped = stats["dropped"].as_f64().unwrap();
        assert!(processed >= 1.0);
        assert_eq!(processed + dropped, 50.0);
    }

    #[test]
    fn paused_host_rejects_frames() {
        let proxy = proxy();
        proxy.registry().host_lifecycle().host_paused();
        let settlement = proxy
            .call_method("FrameSampler", "submitFrame", vec![1.into(), 1.into()])
            .blocking_wait();
        assert_eq!(settlement.code(), Some("E_FRAME_SAMPLER_PAUSED"));

        proxy.registry().host_lifecycle().host_resumed();
        let settlement = proxy
            .call_method("FrameSampler", "stats", vec![])
            .blocking_wait();
        assert!(settlement.is_resolved());
    }
}
