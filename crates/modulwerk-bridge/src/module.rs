// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Exported modules: declaration, method discovery and invocation.
//
// A module declares its methods as one or more `MethodSet` layers, ordered
// most-derived first.  Discovery merges the layers into a method table once,
// at registration: a name declared twice in one layer is a build-time error,
// and a name declared in several layers resolves to the most-derived one.
// Every declaration must end in a `Promise` parameter; the arguments before
// it are what the script side supplies.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use modulwerk_core::{BridgeError, DynamicValue, NarrowingMode, NativeValue, ParamType, Result};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::coerce::coerce;
use crate::convert::FromNative;
use crate::promise::Promise;
use crate::registry::ModuleRegistry;

/// Error a native method body may return instead of settling its promise.
pub type MethodError = Box<dyn std::error::Error + Send + Sync>;

pub type MethodResult = std::result::Result<(), MethodError>;

/// Type-erased method body: coerced arguments plus the completion handle.
pub type MethodHandler = Arc<dyn Fn(Vec<NativeValue>, Promise) -> MethodResult + Send + Sync>;

/// A native capability provider exposed to the script side by name.
pub trait Module: Send + Sync + 'static {
    /// Name the script side addresses this module by.
    fn name(&self) -> &str;

    /// Method declarations, most-derived layer first.
    fn methods(&self) -> Vec<MethodSet>;

    /// Static values published alongside the method table.
    fn constants(&self) -> HashMap<String, DynamicValue> {
        HashMap::new()
    }

    /// Called once when the registry is initialized.
    fn on_create(&self, _registry: &ModuleRegistry) {}

    /// Called once when the registry is torn down.
    fn on_destroy(&self) {}
}

/// A closure usable as an exported method.
///
/// Implemented for `Fn(A1, .., An, Promise) -> MethodResult` with up to six
/// typed arguments, each of which must implement [`FromNative`].
pub trait IntoMethod<Args>: Send + Sync + 'static {
    fn param_types() -> Vec<ParamType>;

    fn into_handler(self) -> MethodHandler;
}

macro_rules! impl_into_method {
    ($($arg:ident),*) => {
        impl<F, $($arg,)*> IntoMethod<($($arg,)*)> for F
        where
            F: Fn($($arg,)* Promise) -> MethodResult + Send + Sync + 'static,
            $($arg: FromNative + 'static,)*
        {
            fn param_types() -> Vec<ParamType> {
                vec![$($arg::param_type(),)* ParamType::Completion]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_handler(self) -> MethodHandler {
                Arc::new(move |args: Vec<NativeValue>, promise: Promise| -> MethodResult {
                    let mut args = args.into_iter();
                    $(
                        let $arg = args
                            .next()
                            .and_then($arg::from_native)
                            .ok_or("coerced argument does not match its declared type")?;
                    )*
                    (self)($($arg,)* promise)
                })
            }
        }
    };
}

impl_into_method!();
impl_into_method!(A1);
impl_into_method!(A1, A2);
impl_into_method!(A1, A2, A3);
impl_into_method!(A1, A2, A3, A4);
impl_into_method!(A1, A2, A3, A4, A5);
impl_into_method!(A1, A2, A3, A4, A5, A6);

/// One declared method: name, parameter list and body.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    params: Vec<ParamType>,
    handler: MethodHandler,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full declared parameter list, trailing `Completion` included.
    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Number of arguments the script side must supply.
    pub fn argument_count(&self) -> usize {
        self.params.len().saturating_sub(1)
    }

    fn validate(&self, owner: &str) -> Result<()> {
        let invalid = |reason: &str| BridgeError::InvalidDeclaration {
            owner: owner.to_string(),
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        match self.params.split_last() {
            None => Err(invalid("an exported method must take a promise")),
            Some((last, _)) if *last != ParamType::Completion => {
                Err(invalid("the last parameter must be a promise"))
            }
            Some((_, rest)) if rest.contains(&ParamType::Completion) => {
                Err(invalid("only the last parameter may be a promise"))
            }
            Some(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// One layer of method declarations, e.g. a provider's own methods or the
/// shared methods it inherits from a base provider.
pub struct MethodSet {
    owner: String,
    methods: Vec<MethodDescriptor>,
}

impl MethodSet {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            methods: Vec::new(),
        }
    }

    /// Declare a typed method. Parameter types come from the closure
    /// signature, so closure parameters must be annotated.
    pub fn method<Args, F: IntoMethod<Args>>(mut self, name: &str, body: F) -> Self {
        self.methods.push(MethodDescriptor {
            name: name.to_string(),
            params: F::param_types(),
            handler: body.into_handler(),
        });
        self
    }

    /// Declare a method from an explicit parameter list and an untyped body.
    pub fn raw(
        mut self,
        name: &str,
        params: Vec<ParamType>,
        body: impl Fn(Vec<NativeValue>, Promise) -> MethodResult + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(MethodDescriptor {
            name: name.to_string(),
            params,
            handler: Arc::new(body),
        });
        self
    }
}

/// Merge declaration layers (most-derived first) into one table.
///
/// `kind` names the declarations (`method`, `prop`) in duplicate errors.
pub(crate) fn merge_layers<D>(
    kind: &'static str,
    owner: &str,
    layers: Vec<(String, Vec<D>)>,
    name_of: impl Fn(&D) -> &str,
) -> Result<HashMap<String, D>> {
    let mut table = HashMap::new();
    for (layer, declarations) in layers {
        let mut seen = HashSet::new();
        for declaration in declarations {
            let name = name_of(&declaration).to_string();
            if !seen.insert(name.clone()) {
                let owner = if layer == owner {
                    owner.to_string()
                } else {
                    format!("{owner} ({layer})")
                };
                return Err(BridgeError::DuplicateExport { kind, owner, name });
            }
            if table.contains_key(&name) {
                debug!(owner, layer = %layer, name = %name, "declaration overridden by a derived layer");
                continue;
            }
            table.insert(name, declaration);
        }
    }
    Ok(table)
}

/// Script-visible description of one exported method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    pub name: String,
    pub arguments_count: usize,
}

/// A registered module together with its discovered method table.
pub struct ExportedModule {
    name: String,
    module: Arc<dyn Module>,
    methods: HashMap<String, MethodDescriptor>,
}

impl ExportedModule {
    /// Run method discovery for `module`.
    pub fn discover(module: Arc<dyn Module>) -> Result<Self> {
        let name = module.name().to_string();
        let mut layers = Vec::new();
        for set in module.methods() {
            for method in &set.methods {
                method.validate(&name)?;
            }
            layers.push((set.owner, set.methods));
        }
        let methods = merge_layers("method", &name, layers, |m| m.name.as_str())?;
        debug!(module = %name, methods = methods.len(), "discovered exported methods");
        Ok(Self {
            name,
            module,
            methods,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// Method table sorted by name.
    pub fn method_infos(&self) -> Vec<MethodInfo> {
        let mut infos: Vec<_> = self
            .methods
            .values()
            .map(|m| MethodInfo {
                name: m.name.clone(),
                arguments_count: m.argument_count(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn constants(&self) -> HashMap<String, DynamicValue> {
        self.module.constants()
    }

    /// Validate, coerce and invoke one call.
    ///
    /// Dispatch failures are returned without touching `promise`; the
    /// caller rejects it.  The method body receives a clone of `promise`.
    #[instrument(skip(self, args, promise, mode), fields(module = %self.name))]
    pub fn invoke(
        &self,
        method: &str,
        args: Vec<DynamicValue>,
        promise: &Promise,
        mode: NarrowingMode,
    ) -> Result<()> {
        let descriptor = self
            .methods
            .get(method)
            .ok_or_else(|| BridgeError::UndefinedMethod {
                module: self.name.clone(),
                method: method.to_string(),
            })?;

        let expected = descriptor.argument_count();
        if args.len() != expected {
            return Err(BridgeError::InvalidArgsCount {
                method: method.to_string(),
                expected,
                received: args.len(),
            });
        }

        let coerced = args
            .into_iter()
            .zip(&descriptor.params)
            .enumerate()
            .map(|(index, (arg, ty))| {
                coerce(arg, ty, mode).map_err(|source| BridgeError::ArgsTypesMismatch {
                    method: method.to_string(),
                    index,
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let handler = Arc::clone(&descriptor.handler);
        let context = format!("{}.{}", self.name, method);
        match panic::catch_unwind(AssertUnwindSafe(|| handler(coerced, promise.clone()))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(BridgeError::Unexpected {
                context,
                cause: err.to_string(),
            }),
            Err(payload) => Err(BridgeError::Unexpected {
                context,
                cause: format!("method panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }
}

impl std::fmt::Debug for ExportedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedModule")
            .field("name", &self.name)
            .field("methods", &self.methods.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Echo, settle};

    struct Broken;

    impl Module for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn methods(&self) -> Vec<MethodSet> {
            vec![MethodSet::new("Broken").raw("noPromise", vec![ParamType::Int], |_, _| Ok(()))]
        }
    }

    struct Twice;

    impl Module for Twice {
        fn name(&self) -> &str {
            "Twice"
        }

        fn methods(&self) -> Vec<MethodSet> {
            vec![
                MethodSet::new("Twice")
                    .method("ping", |p: Promise| -> MethodResult {
                        p.resolve(1);
                        Ok(())
                    })
                    .method("ping", |p: Promise| -> MethodResult {
                        p.resolve(2);
                        Ok(())
                    }),
            ]
        }
    }

    #[test]
    fn typed_closures_declare_their_parameters() {
        let set = MethodSet::new("Echo").method(
            "add",
            |a: f64, b: Option<i32>, p: Promise| -> MethodResult {
                p.resolve(a + f64::from(b.unwrap_or(0)));
                Ok(())
            },
        );
        let method = &set.methods[0];
        assert_eq!(
            method.params(),
            &[
                ParamType::Double,
                ParamType::nullable(ParamType::Int),
                ParamType::Completion
            ]
        );
        assert_eq!(method.argument_count(), 2);
    }

    #[test]
    fn methods_without_trailing_promise_are_rejected() {
        let err = ExportedModule::discover(Arc::new(Broken)).unwrap_err();
        assert_eq!(err.code(), "E_INVALID_DECLARATION");
        assert!(err.is_build_time());
    }

    #[test]
    fn duplicate_names_in_one_layer_are_rejected() {
        let err = ExportedModule::discover(Arc::new(Twice)).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateExport { ref name, .. } if name == "ping"));
        assert_eq!(err.to_string(), "duplicate exported method `ping` in `Twice`");
    }

    #[test]
    fn derived_layer_overrides_base_layer() {
        let module = ExportedModule::discover(Arc::new(Echo::default())).unwrap();
        // `describe` is declared by both Echo and its base layer.
        let settlement = settle(|p| {
            module
                .invoke("describe", vec![], p, NarrowingMode::Truncate)
                .unwrap()
        });
        assert_eq!(settlement.value().and_then(DynamicValue::as_str), Some("echo"));
        // Inherited methods remain callable.
        assert!(module.method("version").is_some());
    }

    #[test]
    fn method_infos_are_sorted_and_count_script_arguments() {
        let module = ExportedModule::discover(Arc::new(Echo::default())).unwrap();
        let infos = module.method_infos();
        let add = infos.iter().find(|m| m.name == "add").unwrap();
        assert_eq!(add.arguments_count, 2);
        let names: Vec<_> = infos.iter().map(|m| m.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn panics_become_unexpected_errors() {
        let module = ExportedModule::discover(Arc::new(Echo::default())).unwrap();
        let (promise, _pending) = Promise::channel("Echo.explode");
        let err = module
            .invoke("explode", vec![], &promise, NarrowingMode::Truncate)
            .unwrap_err();
        assert_eq!(err.code(), "E_UNEXPECTED_ERROR");
        assert!(err.to_string().contains("kaboom"));
    }
}
