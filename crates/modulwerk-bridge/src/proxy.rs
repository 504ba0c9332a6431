// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// BridgeProxy — the script side's single entry point for method calls.
//
// Every call ends in exactly one settlement.  Dispatch failures (unknown
// module or method, wrong argument count, coercion failure, a method body
// that errors or panics) reject the call's promise with the matching wire
// code; otherwise the method body owns the promise and settles it, possibly
// later and from another thread.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use modulwerk_core::{BridgeError, DynamicValue};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::module::MethodInfo;
use crate::promise::{PendingCall, Promise};
use crate::registry::ModuleRegistry;

/// Everything the script side learns about the bridge at start-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeManifest {
    pub exported_methods: BTreeMap<String, Vec<MethodInfo>>,
    pub modules_constants: BTreeMap<String, HashMap<String, DynamicValue>>,
    pub view_managers_names: Vec<String>,
}

pub struct BridgeProxy {
    registry: Arc<ModuleRegistry>,
    manifest: BridgeManifest,
}

impl BridgeProxy {
    /// Initialize the registry (if nobody has yet) and publish its manifest.
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        registry.initialize();
        let manifest = build_manifest(&registry);
        debug!(
            modules = manifest.exported_methods.len(),
            view_managers = manifest.view_managers_names.len(),
            "bridge manifest published"
        );
        Self { registry, manifest }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Method tables, constants and view manager names, as published at
    /// construction.
    pub fn manifest(&self) -> &BridgeManifest {
        &self.manifest
    }

    /// Call `module.method` and return a future for its settlement.
    pub fn call_method(&self, module: &str, method: &str, args: Vec<DynamicValue>) -> PendingCall {
        let (promise, pending) = Promise::channel(format!("{module}.{method}"));
        self.call_method_with(module, method, args, promise);
        pending
    }

    /// Call `module.method`, settling the caller-supplied `promise`.
    #[instrument(skip(self, args, promise), fields(argc = args.len()))]
    pub fn call_method_with(&self, module: &str, method: &str, args: Vec<DynamicValue>, promise: Promise) {
        let outcome = match self.registry.get_exported_module(module) {
            Some(exported) => exported.invoke(
                method,
                args,
                &promise,
                self.registry.config().numeric_narrowing,
            ),
            None => Err(BridgeError::UndefinedModule(module.to_string())),
        };
        if let Err(err) = outcome {
            warn!(code = err.code(), error = %err, "call rejected");
            promise.settle_rejection(err.to_rejection());
        }
    }

    /// Tear the registry down. Returns `false` if it already was.
    pub fn shutdown(&self) -> bool {
        self.registry.on_destroy()
    }
}

fn build_manifest(registry: &ModuleRegistry) -> BridgeManifest {
    let mut exported_methods = BTreeMap::new();
    let mut modules_constants = BTreeMap::new();
    for name in registry.exported_module_names() {
        if let Some(module) = registry.get_exported_module(&name) {
            exported_methods.insert(name.clone(), module.method_infos());
            modules_constants.insert(name, module.constants());
        }
    }
    BridgeManifest {
        exported_methods,
        modules_constants,
        view_managers_names: registry
            .all_view_managers()
            .iter()
            .map(|m| m.name().to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Echo, echo_proxy};
    use modulwerk_core::{BridgeConfig, NarrowingMode, Settlement};
    use std::sync::atomic::Ordering;

    fn call(proxy: &BridgeProxy, method: &str, args: &str) -> Settlement {
        let args = match DynamicValue::from_json_str(args).unwrap() {
            DynamicValue::Array(items) => items,
            other => panic!("args must be a JSON array, got {other:?}"),
        };
        proxy.call_method("Echo", method, args).blocking_wait()
    }

    #[test]
    fn echo_add_resolves_with_the_sum() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = call(&proxy, "add", "[2, 3]");
        assert_eq!(settlement.value(), Some(&DynamicValue::Number(5.0)));
    }

    #[test]
    fn echo_unknown_method_is_undefined() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = call(&proxy, "subtract", "[2, 3]");
        assert_eq!(settlement.code(), Some("E_UNDEFINED_METHOD"));
    }

    #[test]
    fn echo_wrong_arity_is_invalid_args_count() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = call(&proxy, "add", "[2]");
        assert_eq!(settlement.code(), Some("E_INVALID_ARGS_COUNT"));
    }

    #[test]
    fn echo_wrong_type_is_args_types_mismatch() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = call(&proxy, "add", r#"["two", 3]"#);
        let rejection = settlement.rejection().unwrap();
        assert_eq!(rejection.code, "E_ARGS_TYPES_MISMATCH");
        assert!(rejection.message.contains("argument 0"));
        assert_eq!(rejection.cause.as_deref(), Some("expected double, received string"));
    }

    #[test]
    fn unknown_module_is_undefined() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = proxy.call_method("Nope", "add", vec![]).blocking_wait();
        assert_eq!(settlement.code(), Some("E_UNDEFINED_METHOD"));
    }

    #[test]
    fn method_errors_and_panics_are_unexpected() {
        let proxy = echo_proxy(BridgeConfig::default());
        let failed = call(&proxy, "fail", "[]");
        assert_eq!(failed.code(), Some("E_UNEXPECTED_ERROR"));
        assert_eq!(failed.rejection().unwrap().cause.as_deref(), Some("echo refused"));

        let panicked = call(&proxy, "explode", "[]");
        assert_eq!(panicked.code(), Some("E_UNEXPECTED_ERROR"));
    }

    #[test]
    fn unsettled_calls_are_rejected_when_the_method_returns() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = call(&proxy, "forget", "[]");
        assert_eq!(settlement.code(), Some("E_UNEXPECTED_ERROR"));
    }

    #[test]
    fn methods_may_settle_from_another_thread() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = call(&proxy, "addLater", "[1.5, 1]");
        assert_eq!(settlement.value(), Some(&DynamicValue::Number(2.5)));
    }

    #[test]
    fn error_after_resolve_keeps_the_resolution() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = call(&proxy, "resolveThenFail", "[]");
        assert!(settlement.is_resolved());
    }

    #[test]
    fn strict_narrowing_is_applied_to_calls() {
        let proxy = echo_proxy(BridgeConfig {
            numeric_narrowing: NarrowingMode::Strict,
            ..Default::default()
        });
        assert_eq!(call(&proxy, "sum", "[[1, 2.5]]").code(), Some("E_ARGS_TYPES_MISMATCH"));
        assert_eq!(
            call(&proxy, "sum", "[[1, 2]]").value(),
            Some(&DynamicValue::Number(3.0))
        );
    }

    #[test]
    fn truncating_narrowing_is_the_default() {
        let proxy = echo_proxy(BridgeConfig::default());
        assert_eq!(
            call(&proxy, "sum", "[[1.9, 2.9]]").value(),
            Some(&DynamicValue::Number(3.0))
        );
    }

    #[test]
    fn options_arguments_read_optional_keys() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = call(&proxy, "greet", r#"[{"name": "Ada"}]"#);
        assert_eq!(settlement.value().and_then(DynamicValue::as_str), Some("hello, Ada!"));
        let settlement = call(&proxy, "greet", r#"[{"name": "Ada", "punctuation": "?"}]"#);
        assert_eq!(settlement.value().and_then(DynamicValue::as_str), Some("hello, Ada?"));
    }

    #[test]
    fn manifest_lists_methods_constants_and_views() {
        let proxy = echo_proxy(BridgeConfig::default());
        let manifest = proxy.manifest();
        let add = manifest.exported_methods["Echo"]
            .iter()
            .find(|m| m.name == "add")
            .unwrap();
        assert_eq!(add.arguments_count, 2);
        assert_eq!(
            manifest.modules_constants["Echo"]["answer"],
            DynamicValue::Number(42.0)
        );
        assert_eq!(manifest.view_managers_names, vec!["Canvas"]);

        let json = serde_json::to_value(manifest).unwrap();
        assert!(json.get("exportedMethods").is_some());
        assert!(json["exportedMethods"]["Echo"][0].get("argumentsCount").is_some());
    }

    #[test]
    fn proxy_initializes_and_shuts_down_the_registry() {
        let echo = Echo::default();
        let created = Arc::clone(&echo.created);
        let destroyed = Arc::clone(&echo.destroyed);
        let mut registry = ModuleRegistry::new(BridgeConfig::default());
        registry.register_module(Arc::new(echo)).unwrap();
        let proxy = BridgeProxy::new(Arc::new(registry));

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(proxy.shutdown());
        assert!(!proxy.shutdown());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn calls_can_be_awaited() {
        let proxy = echo_proxy(BridgeConfig::default());
        let settlement = proxy
            .call_method("Echo", "add", vec![1.into(), 2.into()])
            .await;
        assert_eq!(settlement.value(), Some(&DynamicValue::Number(3.0)));
    }
}
