// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Modulwerk bridge — module registry, method dispatch and view adaptation.
//
// Native providers register as exported modules (named method tables plus
// constants), view managers (view factories plus typed prop setters) or
// internal modules (native-only services looked up by interface).  The
// `BridgeProxy` turns script calls into coerced native invocations that end
// in exactly one settlement; the `ViewManagerAdapter` does the same for
// view props.

pub mod adapter;
pub mod arguments;
pub mod coerce;
pub mod convert;
pub mod events;
pub mod latch;
pub mod lifecycle;
pub mod module;
pub mod promise;
pub mod proxy;
pub mod registry;
pub mod view;

#[cfg(test)]
mod testing;

pub use adapter::{PropUpdateReport, ViewManagerAdapter};
pub use arguments::ReadableArguments;
pub use convert::FromNative;
pub use events::{BridgeEvent, EventEmitter};
pub use latch::BusyLatch;
pub use lifecycle::{HostLifecycle, LifecycleEventListener};
pub use module::{MethodError, MethodResult, MethodSet, Module};
pub use promise::{PendingCall, Promise};
pub use proxy::{BridgeManifest, BridgeProxy};
pub use registry::{InternalModule, ModuleRegistry, ModuleRegistryProvider, Package, SingletonModule};
pub use view::{PropSet, ViewHandle, ViewInstance, ViewManager};
