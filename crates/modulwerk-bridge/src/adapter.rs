// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ViewManagerAdapter — the script side's entry point for native views.
//
// Prop updates are fire-and-forget from the script's point of view: an
// unknown prop or a mistyped value is logged and skipped, and never takes
// the other props of the same batch down with it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use modulwerk_core::{BridgeError, DynamicValue, Result, ViewId};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::registry::ModuleRegistry;
use crate::view::ViewHandle;

/// A prop that was not applied, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedProp {
    pub prop: String,
    pub code: String,
    pub message: String,
}

/// Outcome of a batched prop update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropUpdateReport {
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedProp>,
}

/// Script-visible description of one view manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewManagerInfo {
    pub props: Vec<String>,
    pub events: HashMap<String, DynamicValue>,
}

pub struct ViewManagerAdapter {
    registry: Arc<ModuleRegistry>,
    mounted: Mutex<HashMap<ViewId, ViewHandle>>,
}

impl ViewManagerAdapter {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            mounted: Mutex::new(HashMap::new()),
        }
    }

    /// Create and mount a view from the named manager.
    pub fn create_view(&self, manager: &str) -> Result<ViewHandle> {
        let holder = self
            .registry
            .get_view_manager(manager)
            .ok_or_else(|| BridgeError::UndefinedViewManager(manager.to_string()))?;
        let view = holder.create_view(&self.registry);
        self.lock_mounted().insert(view.id(), view.clone());
        debug!(view_manager = manager, view = %view.id(), "view created");
        Ok(view)
    }

    /// Apply one prop to a mounted view.
    ///
    /// Prop setters must not call back into the adapter.
    #[instrument(skip(self, view, value), fields(view = %view.id(), manager = view.manager()))]
    pub fn update_prop(&self, view: &ViewHandle, prop: &str, value: DynamicValue) -> Result<()> {
        let outcome = self.apply_prop(view, prop, value);
        if let Err(err) = &outcome {
            warn!(code = err.code(), error = %err, "prop update skipped");
        }
        outcome
    }

    /// Apply a batch of props in name order, skipping the ones that fail.
    pub fn update_props(
        &self,
        view: &ViewHandle,
        props: impl IntoIterator<Item = (String, DynamicValue)>,
    ) -> PropUpdateReport {
        let ordered: BTreeMap<_, _> = props.into_iter().collect();
        let mut report = PropUpdateReport::default();
        for (prop, value) in ordered {
            match self.update_prop(view, &prop, value) {
                Ok(()) => report.applied.push(prop),
                Err(err) => report.skipped.push(SkippedProp {
                    code: err.code().to_string(),
                    message: err.to_string(),
                    prop,
                }),
            }
        }
        report
    }

    /// Unmount a view. Only the first drop reaches the manager.
    pub fn drop_view(&self, view: &ViewHandle) -> bool {
        let removed = self.lock_mounted().remove(&view.id());
        let Some(mounted) = removed else {
            debug!(view = %view.id(), "view already dropped");
            return false;
        };
        if let Some(holder) = self.registry.get_view_manager(mounted.manager()) {
            holder.manager().on_drop_view_instance(&mounted);
        }
        debug!(view = %mounted.id(), "view dropped");
        true
    }

    pub fn is_mounted(&self, view: ViewId) -> bool {
        self.lock_mounted().contains_key(&view)
    }

    pub fn mounted_count(&self) -> usize {
        self.lock_mounted().len()
    }

    /// Props and event registrations per view manager.
    pub fn view_manager_constants(&self) -> BTreeMap<String, ViewManagerInfo> {
        self.registry
            .all_view_managers()
            .into_iter()
            .map(|holder| {
                (
                    holder.name().to_string(),
                    ViewManagerInfo {
                        props: holder.prop_names(),
                        events: holder.event_registrations(),
                    },
                )
            })
            .collect()
    }

    // The mounted table stays locked while the setter runs, so `drop_view`
    // cannot release a view halfway through an update.
    fn apply_prop(&self, view: &ViewHandle, prop: &str, value: DynamicValue) -> Result<()> {
        let holder = self
            .registry
            .get_view_manager(view.manager())
            .ok_or_else(|| BridgeError::UndefinedViewManager(view.manager().to_string()))?;
        let mounted = self.lock_mounted();
        let target = mounted
            .get(&view.id())
            .ok_or_else(|| BridgeError::ViewNotMounted(view.id().to_string()))?;
        holder.update_prop(target, prop, value, self.registry.config().numeric_narrowing)
    }

    fn lock_mounted(&self) -> MutexGuard<'_, HashMap<ViewId, ViewHandle>> {
        self.mounted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
