// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// View managers: native view factories with named, typed prop setters.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use modulwerk_core::{BridgeError, DynamicValue, NarrowingMode, NativeValue, ParamType, Result, ViewId};
use tracing::debug;

use crate::coerce::coerce;
use crate::convert::FromNative;
use crate::module::{MethodResult, merge_layers, panic_message};
use crate::registry::ModuleRegistry;

/// Type-erased native view instance.
pub type ViewInstance = Arc<dyn Any + Send + Sync>;

/// Type-erased prop setter.
pub type PropSetter = Arc<dyn Fn(&ViewHandle, NativeValue) -> MethodResult + Send + Sync>;

/// A factory for one kind of native view plus the props it accepts.
pub trait ViewManager: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Build a new native view instance.
    fn create_view_instance(&self, registry: &ModuleRegistry) -> ViewInstance;

    /// Prop declarations, most-derived layer first.
    fn props(&self) -> Vec<PropSet>;

    /// Events instances of this view may emit to the script side.
    fn exported_event_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn on_drop_view_instance(&self, _view: &ViewHandle) {}

    fn on_create(&self, _registry: &ModuleRegistry) {}

    fn on_destroy(&self) {}
}

/// A mounted view: identity, owning manager and native instance.
#[derive(Clone)]
pub struct ViewHandle {
    id: ViewId,
    manager: String,
    instance: ViewInstance,
}

impl ViewHandle {
    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn manager(&self) -> &str {
        &self.manager
    }

    pub fn instance(&self) -> &ViewInstance {
        &self.instance
    }

    /// The native instance as its concrete type.
    pub fn instance_as<V: Any>(&self) -> Option<&V> {
        self.instance.downcast_ref::<V>()
    }
}

impl std::fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHandle")
            .field("id", &self.id)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

/// One declared prop: name, value type and setter.
#[derive(Clone)]
pub struct PropDescriptor {
    name: String,
    expected: ParamType,
    setter: PropSetter,
}

impl PropDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected(&self) -> &ParamType {
        &self.expected
    }
}

/// One layer of prop declarations.
pub struct PropSet {
    owner: String,
    props: Vec<PropDescriptor>,
}

impl PropSet {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            props: Vec::new(),
        }
    }

    /// Declare a prop applied to views of concrete type `V`.
    pub fn prop<V, T, F>(mut self, name: &str, apply: F) -> Self
    where
        V: Any + Send + Sync,
        T: FromNative + 'static,
        F: Fn(&V, T) + Send + Sync + 'static,
    {
        let setter: PropSetter = Arc::new(move |view: &ViewHandle, value: NativeValue| -> MethodResult {
            let instance = view.instance_as::<V>().ok_or_else(|| {
                format!("view {} is not a {}", view.id, std::any::type_name::<V>())
            })?;
            let value = T::from_native(value).ok_or("coerced prop does not match its declared type")?;
            apply(instance, value);
            Ok(())
        });
        self.props.push(PropDescriptor {
            name: name.to_string(),
            expected: T::param_type(),
            setter,
        });
        self
    }
}

/// A registered view manager with its discovered prop table.
pub struct ViewManagerHolder {
    name: String,
    manager: Arc<dyn ViewManager>,
    props: HashMap<String, PropDescriptor>,
}

impl ViewManagerHolder {
    pub fn discover(manager: Arc<dyn ViewManager>) -> Result<Self> {
        let name = manager.name().to_string();
        let layers = manager
            .props()
            .into_iter()
            .map(|set| (set.owner, set.props))
            .collect();
        let props = merge_layers("prop", &name, layers, |p| p.name.as_str())?;
        debug!(view_manager = %name, props = props.len(), "discovered prop setters");
        Ok(Self {
            name,
            manager,
            props,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &Arc<dyn ViewManager> {
        &self.manager
    }

    pub fn prop(&self, name: &str) -> Option<&PropDescriptor> {
        self.props.get(name)
    }

    /// Prop names sorted alphabetically.
    pub fn prop_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.props.keys().cloned().collect();
        names.sort();
        names
    }

    /// Event registration table in the shape script-side view layers expect:
    /// `{eventName: {"registrationName": eventName}}`.
    pub fn event_registrations(&self) -> HashMap<String, DynamicValue> {
        self.manager
            .exported_event_names()
            .into_iter()
            .map(|event| {
                let registration =
                    HashMap::from([("registrationName".to_string(), DynamicValue::from(event.as_str()))]);
                (event, DynamicValue::from(registration))
            })
            .collect()
    }

    pub fn create_view(&self, registry: &ModuleRegistry) -> ViewHandle {
        ViewHandle {
            id: ViewId::new(),
            manager: self.name.clone(),
            instance: self.manager.create_view_instance(registry),
        }
    }

    /// Coerce `value` and hand it to the named prop's setter.
    pub fn update_prop(
        &self,
        view: &ViewHandle,
        prop: &str,
        value: DynamicValue,
        mode: NarrowingMode,
    ) -> Result<()> {
        let descriptor = self.props.get(prop).ok_or_else(|| BridgeError::UndefinedProp {
            manager: self.name.clone(),
            prop: prop.to_string(),
        })?;
        let coerced = coerce(value, &descriptor.expected, mode).map_err(|source| {
            BridgeError::PropTypeMismatch {
                manager: self.name.clone(),
                prop: prop.to_string(),
                source,
            }
        })?;
        let setter = Arc::clone(&descriptor.setter);
        let context = format!("{}.{}", self.name, prop);
        match panic::catch_unwind(AssertUnwindSafe(|| setter(view, coerced))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(BridgeError::Unexpected {
                context,
                cause: err.to_string(),
            }),
            Err(payload) => Err(BridgeError::Unexpected {
                context,
                cause: format!("prop setter panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }
}

impl std::fmt::Debug for ViewManagerHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewManagerHolder")
            .field("name", &self.name)
            .field("props", &self.props.len())
            .finish_non_exhaustive()
    }
}
