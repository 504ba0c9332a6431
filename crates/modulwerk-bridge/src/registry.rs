// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ModuleRegistry — the per-bridge table of every registered member.
//
// The registry is built once (`&mut self` registration), then frozen behind
// an `Arc` and shared with the dispatch proxy and view adapter.  Lifecycle
// is one-shot in both directions: `initialize` broadcasts `on_create` exactly
// once, `on_destroy` broadcasts teardown exactly once, and neither can run
// again afterwards.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use modulwerk_core::{BridgeConfig, BridgeError, DuplicatePolicy, Result};
use tracing::{debug, info, warn};

use crate::events::EventEmitter;
use crate::lifecycle::HostLifecycle;
use crate::module::{ExportedModule, Module};
use crate::view::{ViewManager, ViewManagerHolder};

/// Conversion of a shared trait object back into `Arc<dyn Any>`, used to
/// recover the concrete type of an internal or singleton module.
pub trait AsAnyArc: Send + Sync + 'static {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A native-only service other members look up by interface name.
pub trait InternalModule: AsAnyArc {
    /// Interface names this module is registered under.
    fn exported_interfaces(&self) -> Vec<&'static str>;

    fn on_create(&self, _registry: &ModuleRegistry) {}

    fn on_destroy(&self) {}
}

/// A process-wide service shared by every registry built by a provider.
pub trait SingletonModule: AsAnyArc {
    fn name(&self) -> &str;

    fn on_create(&self, _registry: &ModuleRegistry) {}

    fn on_destroy(&self) {}
}

/// A bundle of members contributed to a registry.
pub trait Package: Send + Sync {
    fn create_internal_modules(&self) -> Vec<Arc<dyn InternalModule>> {
        Vec::new()
    }

    fn create_exported_modules(&self) -> Vec<Arc<dyn Module>> {
        Vec::new()
    }

    fn create_view_managers(&self) -> Vec<Arc<dyn ViewManager>> {
        Vec::new()
    }

    fn create_singleton_modules(&self) -> Vec<Arc<dyn SingletonModule>> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistryState {
    Building,
    /// `on_create` broadcast in progress.
    Initializing,
    Initialized,
    /// Teardown broadcast in progress.
    Destroying,
    Destroyed,
}

impl RegistryState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Building,
            1 => Self::Initializing,
            2 => Self::Initialized,
            3 => Self::Destroying,
            _ => Self::Destroyed,
        }
    }
}

pub struct ModuleRegistry {
    config: BridgeConfig,
    modules: HashMap<String, Arc<ExportedModule>>,
    view_managers: HashMap<String, Arc<ViewManagerHolder>>,
    internal: HashMap<String, Arc<dyn InternalModule>>,
    singletons: HashMap<String, Arc<dyn SingletonModule>>,
    events: Arc<EventEmitter>,
    lifecycle: Arc<HostLifecycle>,
    state: AtomicU8,
    // Guards nothing but the wake-up of callers waiting out a broadcast.
    settling: Mutex<()>,
    settled: Condvar,
}

fn insert_with_policy<V>(
    table: &mut HashMap<String, V>,
    policy: DuplicatePolicy,
    kind: &'static str,
    name: String,
    value: V,
) -> Result<()> {
    if table.contains_key(&name) {
        match policy {
            DuplicatePolicy::Reject => {
                return Err(BridgeError::DuplicateRegistration { kind, name });
            }
            DuplicatePolicy::Override => {
                warn!(kind, name = %name, "replacing previously registered member");
            }
        }
    }
    table.insert(name, value);
    Ok(())
}

impl ModuleRegistry {
    /// Empty registry holding only the built-in internal modules.
    pub fn new(config: BridgeConfig) -> Self {
        let events = Arc::new(EventEmitter::new(config.event_capacity));
        let lifecycle = Arc::new(HostLifecycle::new());
        let mut internal: HashMap<String, Arc<dyn InternalModule>> = HashMap::new();
        internal.insert(EventEmitter::INTERFACE.to_string(), events.clone());
        internal.insert(HostLifecycle::INTERFACE.to_string(), lifecycle.clone());
        Self {
            config,
            modules: HashMap::new(),
            view_managers: HashMap::new(),
            internal,
            singletons: HashMap::new(),
            events,
            lifecycle,
            state: AtomicU8::new(RegistryState::Building as u8),
            settling: Mutex::new(()),
            settled: Condvar::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Discover and register an exported module.
    pub fn register_module(&mut self, module: Arc<dyn Module>) -> Result<()> {
        let exported = ExportedModule::discover(module)?;
        let name = exported.name().to_string();
        insert_with_policy(
            &mut self.modules,
            self.config.duplicate_registration,
            "module",
            name,
            Arc::new(exported),
        )
    }

    pub fn register_view_manager(&mut self, manager: Arc<dyn ViewManager>) -> Result<()> {
        let holder = ViewManagerHolder::discover(manager)?;
        let name = holder.name().to_string();
        insert_with_policy(
            &mut self.view_managers,
            self.config.duplicate_registration,
            "view manager",
            name,
            Arc::new(holder),
        )
    }

    /// Register an internal module under every interface it exports.
    ///
    /// Under the reject policy nothing is registered if any interface is taken.
    pub fn register_internal_module(&mut self, module: Arc<dyn InternalModule>) -> Result<()> {
        let interfaces = module.exported_interfaces();
        if self.config.duplicate_registration == DuplicatePolicy::Reject {
            if let Some(taken) = interfaces.iter().find(|i| self.internal.contains_key(**i)) {
                return Err(BridgeError::DuplicateRegistration {
                    kind: "internal module",
                    name: taken.to_string(),
                });
            }
        }
        for interface in interfaces {
            insert_with_policy(
                &mut self.internal,
                self.config.duplicate_registration,
                "internal module",
                interface.to_string(),
                Arc::clone(&module),
            )?;
        }
        Ok(())
    }

    pub fn register_singleton(&mut self, singleton: Arc<dyn SingletonModule>) -> Result<()> {
        let name = singleton.name().to_string();
        insert_with_policy(
            &mut self.singletons,
            self.config.duplicate_registration,
            "singleton",
            name,
            singleton,
        )
    }

    /// Register every member a package contributes.
    pub fn register_package(&mut self, package: &dyn Package) -> Result<()> {
        for module in package.create_internal_modules() {
            self.register_internal_module(module)?;
        }
        for module in package.create_exported_modules() {
            self.register_module(module)?;
        }
        for manager in package.create_view_managers() {
            self.register_view_manager(manager)?;
        }
        for singleton in package.create_singleton_modules() {
            self.register_singleton(singleton)?;
        }
        Ok(())
    }

    pub fn get_exported_module(&self, name: &str) -> Option<Arc<ExportedModule>> {
        self.modules.get(name).cloned()
    }

    /// Registered module names, sorted.
    pub fn exported_module_names(&self) -> Vec<String> {
        sorted_keys(&self.modules)
    }

    pub fn get_view_manager(&self, name: &str) -> Option<Arc<ViewManagerHolder>> {
        self.view_managers.get(name).cloned()
    }

    /// Every registered view manager, sorted by name.
    pub fn all_view_managers(&self) -> Vec<Arc<ViewManagerHolder>> {
        sorted_keys(&self.view_managers)
            .into_iter()
            .filter_map(|name| self.get_view_manager(&name))
            .collect()
    }

    /// Internal module registered under `interface`.
    pub fn get_module(&self, interface: &str) -> Option<Arc<dyn InternalModule>> {
        self.internal.get(interface).cloned()
    }

    /// Internal module registered under `interface`, as its concrete type.
    pub fn get_module_as<T: InternalModule>(&self, interface: &str) -> Option<Arc<T>> {
        self.get_module(interface)?.into_any_arc().downcast::<T>().ok()
    }

    pub fn get_singleton(&self, name: &str) -> Option<Arc<dyn SingletonModule>> {
        self.singletons.get(name).cloned()
    }

    pub fn get_singleton_as<T: SingletonModule>(&self, name: &str) -> Option<Arc<T>> {
        self.get_singleton(name)?.into_any_arc().downcast::<T>().ok()
    }

    pub fn event_emitter(&self) -> Arc<EventEmitter> {
        Arc::clone(&self.events)
    }

    pub fn host_lifecycle(&self) -> Arc<HostLifecycle> {
        Arc::clone(&self.lifecycle)
    }

    pub fn state(&self) -> RegistryState {
        RegistryState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Broadcast `on_create` to every member, once.
    ///
    /// Returns `true` for the call that performed the broadcast.  Concurrent
    /// callers wait until it has finished and return `false`.  Hooks run
    /// without any registry lock held, but must not call `initialize` or
    /// `on_destroy` themselves.
    pub fn initialize(&self) -> bool {
        if let Err(current) = self.advance(RegistryState::Building, RegistryState::Initializing) {
            if current == RegistryState::Initializing {
                self.wait_while(RegistryState::Initializing);
            }
            debug!(state = ?self.state(), "registry already initialized");
            return false;
        }
        for internal in self.internal_members() {
            internal.on_create(self);
        }
        for name in sorted_keys(&self.modules) {
            self.modules[&name].module().on_create(self);
        }
        for manager in self.all_view_managers() {
            manager.manager().on_create(self);
        }
        for name in sorted_keys(&self.singletons) {
            self.singletons[&name].on_create(self);
        }
        self.publish(RegistryState::Initialized);
        info!(
            modules = self.modules.len(),
            view_managers = self.view_managers.len(),
            internal = self.internal.len(),
            singletons = self.singletons.len(),
            "module registry initialized"
        );
        true
    }

    /// Broadcast teardown to every member, once, in reverse creation order.
    ///
    /// A registry that was never initialized is marked destroyed without
    /// broadcasting, since no member saw `on_create`.  A teardown requested
    /// while `initialize` is running waits for it first.
    pub fn on_destroy(&self) -> bool {
        loop {
            match self.state() {
                RegistryState::Building => {
                    if self
                        .advance(RegistryState::Building, RegistryState::Destroyed)
                        .is_ok()
                    {
                        self.publish(RegistryState::Destroyed);
                        return false;
                    }
                }
                RegistryState::Initializing => self.wait_while(RegistryState::Initializing),
                RegistryState::Initialized => {
                    if self
                        .advance(RegistryState::Initialized, RegistryState::Destroying)
                        .is_ok()
                    {
                        break;
                    }
                }
                RegistryState::Destroying | RegistryState::Destroyed => {
                    debug!("registry already destroyed");
                    return false;
                }
            }
        }
        for name in sorted_keys(&self.singletons).into_iter().rev() {
            self.singletons[&name].on_destroy();
        }
        for manager in self.all_view_managers().into_iter().rev() {
            manager.manager().on_destroy();
        }
        for name in sorted_keys(&self.modules).into_iter().rev() {
            self.modules[&name].module().on_destroy();
        }
        for internal in self.internal_members().into_iter().rev() {
            internal.on_destroy();
        }
        self.publish(RegistryState::Destroyed);
        info!("module registry destroyed");
        true
    }

    fn advance(
        &self,
        from: RegistryState,
        to: RegistryState,
    ) -> std::result::Result<(), RegistryState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(RegistryState::from_raw)
    }

    // Stored under `settling` so a waiter cannot miss the wake-up between
    // its state check and its wait.
    fn publish(&self, state: RegistryState) {
        let _guard = self.settling.lock().unwrap_or_else(PoisonError::into_inner);
        self.state.store(state as u8, Ordering::Release);
        self.settled.notify_all();
    }

    fn wait_while(&self, state: RegistryState) {
        let mut guard = self.settling.lock().unwrap_or_else(PoisonError::into_inner);
        while self.state() == state {
            guard = self
                .settled
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    // An internal module exporting several interfaces appears once here.
    fn internal_members(&self) -> Vec<Arc<dyn InternalModule>> {
        let mut members: Vec<Arc<dyn InternalModule>> = Vec::new();
        for interface in sorted_keys(&self.internal) {
            let module = &self.internal[&interface];
            if !members
                .iter()
                .any(|m| std::ptr::addr_eq(Arc::as_ptr(m), Arc::as_ptr(module)))
            {
                members.push(Arc::clone(module));
            }
        }
        members
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.exported_module_names())
            .field("view_managers", &sorted_keys(&self.view_managers))
            .field("internal", &sorted_keys(&self.internal))
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn sorted_keys<V>(table: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<_> = table.keys().cloned().collect();
    keys.sort();
    keys
}

/// Builds registries from a fixed list of packages.
#[derive(Default)]
pub struct ModuleRegistryProvider {
    packages: Vec<Arc<dyn Package>>,
    singletons: Vec<Arc<dyn SingletonModule>>,
}

impl ModuleRegistryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: impl Package + 'static) -> Self {
        self.packages.push(Arc::new(package));
        self
    }

    /// Singleton shared by every registry this provider builds.
    pub fn with_singleton(mut self, singleton: Arc<dyn SingletonModule>) -> Self {
        self.singletons.push(singleton);
        self
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Build a fresh registry. Exported modules and view managers are new
    /// instances per call; singletons are shared.
    pub fn build(&self, config: BridgeConfig) -> Result<ModuleRegistry> {
        config.validate()?;
        let mut registry = ModuleRegistry::new(config);
        for singleton in &self.singletons {
            registry.register_singleton(Arc::clone(singleton))?;
        }
        for package in &self.packages {
            registry.register_package(package.as_ref())?;
        }
        debug!(packages = self.packages.len(), "module registry built");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::MethodSet;
    use crate::testing::{Echo, TestPackage};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Describes the registry from inside its own `on_create`.
    struct Chatty {
        seen: Arc<Mutex<Option<String>>>,
    }

    impl Module for Chatty {
        fn name(&self) -> &str {
            "Chatty"
        }

        fn methods(&self) -> Vec<MethodSet> {
            Vec::new()
        }

        fn on_create(&self, registry: &ModuleRegistry) {
            *self.seen.lock().unwrap() = Some(format!("{registry:?}"));
        }
    }

    struct Clock;

    impl InternalModule for Clock {
        fn exported_interfaces(&self) -> Vec<&'static str> {
            vec!["Clock", "TimeSource"]
        }
    }

    struct Settings;

    impl SingletonModule for Settings {
        fn name(&self) -> &str {
            "Settings"
        }
    }

    #[test]
    fn built_in_internal_modules_are_present() {
        let registry = ModuleRegistry::new(BridgeConfig::default());
        assert!(registry.get_module("EventEmitter").is_some());
        let lifecycle = registry.get_module_as::<HostLifecycle>("HostLifecycle");
        assert!(lifecycle.is_some());
        assert!(registry.get_module_as::<EventEmitter>("HostLifecycle").is_none());
    }

    #[test]
    fn internal_modules_register_under_every_interface() {
        let mut registry = ModuleRegistry::new(BridgeConfig::default());
        registry.register_internal_module(Arc::new(Clock)).unwrap();
        let a = registry.get_module_as::<Clock>("Clock").unwrap();
        let b = registry.get_module_as::<Clock>("TimeSource").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn duplicate_names_are_rejected_by_default() {
        let mut registry = ModuleRegistry::new(BridgeConfig::default());
        registry.register_module(Arc::new(Echo::default())).unwrap();
        let err = registry.register_module(Arc::new(Echo::default())).unwrap_err();
        assert_eq!(err.code(), "E_DUPLICATE_REGISTRATION");

        let err = registry.register_internal_module(Arc::new(EventEmitter::new(1))).unwrap_err();
        assert_eq!(err.code(), "E_DUPLICATE_REGISTRATION");
    }

    #[test]
    fn override_policy_replaces_the_earlier_member() {
        let config = BridgeConfig {
            duplicate_registration: DuplicatePolicy::Override,
            ..Default::default()
        };
        let mut registry = ModuleRegistry::new(config);
        let first = Echo::default();
        let second = Echo::default();
        let second_created = Arc::clone(&second.created);
        registry.register_module(Arc::new(first)).unwrap();
        registry.register_module(Arc::new(second)).unwrap();
        registry.initialize();
        assert_eq!(second_created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.exported_module_names(), vec!["Echo"]);
    }

    #[test]
    fn initialize_and_destroy_broadcast_once() {
        let echo = Echo::default();
        let created = Arc::clone(&echo.created);
        let destroyed = Arc::clone(&echo.destroyed);
        let mut registry = ModuleRegistry::new(BridgeConfig::default());
        registry.register_module(Arc::new(echo)).unwrap();

        assert!(registry.initialize());
        assert!(!registry.initialize());
        assert_eq!(created.load(Ordering::SeqCst), 1);

        assert!(registry.on_destroy());
        assert!(!registry.on_destroy());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        assert!(!registry.initialize());
        assert_eq!(registry.state(), RegistryState::Destroyed);
    }

    #[test]
    fn concurrent_initialize_runs_once() {
        let echo = Echo::default();
        let created = Arc::clone(&echo.created);
        let mut registry = ModuleRegistry::new(BridgeConfig::default());
        registry.register_module(Arc::new(echo)).unwrap();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || (registry.initialize(), registry.state()))
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outcomes.iter().filter(|(done, _)| *done).count(), 1);
        assert!(outcomes
            .iter()
            .all(|(_, state)| *state == RegistryState::Initialized));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn members_may_inspect_the_registry_while_it_initializes() {
        let seen = Arc::new(Mutex::new(None));
        let mut registry = ModuleRegistry::new(BridgeConfig::default());
        registry
            .register_module(Arc::new(Chatty {
                seen: Arc::clone(&seen),
            }))
            .unwrap();
        let registry = Arc::new(registry);

        let (done_tx, done_rx) = mpsc::channel();
        let worker = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let performed = registry.initialize();
                let _ = done_tx.send(performed);
            })
        };
        let performed = done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("initialize did not finish");
        worker.join().unwrap();

        assert!(performed);
        let description = seen.lock().unwrap().clone().unwrap();
        assert!(description.contains("Chatty"));
        assert!(description.contains("Initializing"));
        assert_eq!(registry.state(), RegistryState::Initialized);
    }

    #[test]
    fn destroying_an_uninitialized_registry_skips_teardown() {
        let echo = Echo::default();
        let destroyed = Arc::clone(&echo.destroyed);
        let mut registry = ModuleRegistry::new(BridgeConfig::default());
        registry.register_module(Arc::new(echo)).unwrap();
        assert!(!registry.on_destroy());
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        assert_eq!(registry.state(), RegistryState::Destroyed);
    }

    #[test]
    fn provider_builds_fresh_registries_with_shared_singletons() {
        let provider = ModuleRegistryProvider::new()
            .with_package(TestPackage)
            .with_singleton(Arc::new(Settings));
        let a = provider.build(BridgeConfig::default()).unwrap();
        let b = provider.build(BridgeConfig::default()).unwrap();

        let echo_a = a.get_exported_module("Echo").unwrap();
        let echo_b = b.get_exported_module("Echo").unwrap();
        assert!(!std::ptr::addr_eq(
            Arc::as_ptr(echo_a.module()),
            Arc::as_ptr(echo_b.module())
        ));

        let settings_a = a.get_singleton_as::<Settings>("Settings").unwrap();
        let settings_b = b.get_singleton_as::<Settings>("Settings").unwrap();
        assert!(Arc::ptr_eq(&settings_a, &settings_b));
        assert!(a.get_view_manager("Canvas").is_some());
    }

    #[test]
    fn provider_rejects_invalid_config() {
        let provider = ModuleRegistryProvider::new();
        let config = BridgeConfig {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(provider.build(config).is_err());
    }
}
