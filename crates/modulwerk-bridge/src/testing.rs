// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: the Echo module, the Canvas view manager and a package
// bundling both.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use modulwerk_core::{BridgeConfig, DynamicValue, Settlement};

use crate::arguments::ReadableArguments;
use crate::module::{MethodResult, MethodSet, Module};
use crate::promise::Promise;
use crate::proxy::BridgeProxy;
use crate::registry::{ModuleRegistry, ModuleRegistryProvider, Package};
use crate::view::{PropSet, ViewHandle, ViewInstance, ViewManager};

#[derive(Default)]
pub struct Echo {
    pub created: Arc<AtomicUsize>,
    pub destroyed: Arc<AtomicUsize>,
}

impl Module for Echo {
    fn name(&self) -> &str {
        "Echo"
    }

    fn methods(&self) -> Vec<MethodSet> {
        vec![
            MethodSet::new("Echo")
                .method("add", |a: f64, b: f64, p: Promise| -> MethodResult {
                    p.resolve(a + b);
                    Ok(())
                })
                .method("addLater", |a: f64, b: f64, p: Promise| -> MethodResult {
                    std::thread::spawn(move || {
                        p.resolve(a + b);
                    });
                    Ok(())
                })
                .method("sum", |values: Vec<i32>, p: Promise| -> MethodResult {
                    p.resolve(values.iter().sum::<i32>());
                    Ok(())
                })
                .method("greet", |options: ReadableArguments, p: Promise| -> MethodResult {
                    let name = options.get_string_or("name", "world");
                    let punctuation = options.get_string_or("punctuation", "!");
                    p.resolve(format!("hello, {name}{punctuation}"));
                    Ok(())
                })
                .method("describe", |p: Promise| -> MethodResult {
                    p.resolve("echo");
                    Ok(())
                })
                .method("fail", |_p: Promise| -> MethodResult { Err("echo refused".into()) })
                .method("explode", |_p: Promise| -> MethodResult { panic!("kaboom") })
                .method("forget", |_p: Promise| -> MethodResult { Ok(()) })
                .method("resolveThenFail", |p: Promise| -> MethodResult {
                    p.resolve(true);
                    Err("late failure".into())
                }),
            MethodSet::new("BaseModule")
                .method("describe", |p: Promise| -> MethodResult {
                    p.resolve("base");
                    Ok(())
                })
                .method("version", |p: Promise| -> MethodResult {
                    p.resolve("1.0");
                    Ok(())
                }),
        ]
    }

    fn constants(&self) -> HashMap<String, DynamicValue> {
        HashMap::from([("answer".to_string(), DynamicValue::from(42))])
    }

    fn on_create(&self, _registry: &ModuleRegistry) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    fn on_destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct CanvasView {
    color: Mutex<String>,
    stroke_width: AtomicI32,
    opacity: Mutex<f64>,
}

impl CanvasView {
    pub fn color(&self) -> String {
        self.color.lock().unwrap().clone()
    }

    pub fn stroke_width(&self) -> i32 {
        self.stroke_width.load(Ordering::SeqCst)
    }

    pub fn opacity(&self) -> f64 {
        *self.opacity.lock().unwrap()
    }
}

#[derive(Default)]
pub struct Canvas {
    pub dropped: Arc<AtomicUsize>,
}

impl ViewManager for Canvas {
    fn name(&self) -> &str {
        "Canvas"
    }

    fn create_view_instance(&self, _registry: &ModuleRegistry) -> ViewInstance {
        Arc::new(CanvasView::default())
    }

    fn props(&self) -> Vec<PropSet> {
        vec![
            PropSet::new("Canvas")
                .prop("color", |view: &CanvasView, color: String| {
                    *view.color.lock().unwrap() = color;
                })
                .prop("strokeWidth", |view: &CanvasView, width: i32| {
                    view.stroke_width.store(width, Ordering::SeqCst);
                }),
            PropSet::new("BaseView").prop("opacity", |view: &CanvasView, opacity: f64| {
                *view.opacity.lock().unwrap() = opacity;
            }),
        ]
    }

    fn exported_event_names(&self) -> Vec<String> {
        vec!["onStroke".to_string()]
    }

    fn on_drop_view_instance(&self, _view: &ViewHandle) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct TestPackage;

impl Package for TestPackage {
    fn create_exported_modules(&self) -> Vec<Arc<dyn Module>> {
        vec![Arc::new(Echo::default()) as Arc<dyn Module>]
    }

    fn create_view_managers(&self) -> Vec<Arc<dyn ViewManager>> {
        vec![Arc::new(Canvas::default()) as Arc<dyn ViewManager>]
    }
}

pub fn echo_proxy(config: BridgeConfig) -> BridgeProxy {
    let registry = ModuleRegistryProvider::new()
        .with_package(TestPackage)
        .build(config)
        .unwrap();
    BridgeProxy::new(Arc::new(registry))
}

/// Run `f` against a fresh promise and return what it settled to.
pub fn settle(f: impl FnOnce(&Promise)) -> Settlement {
    let (promise, pending) = Promise::channel("test");
    f(&promise);
    drop(promise);
    pending.blocking_wait()
}
