// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Swatch — a colour swatch view manager.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use modulwerk_bridge::{ModuleRegistry, PropSet, ViewHandle, ViewInstance, ViewManager};
use modulwerk_core::DynamicValue;
use tracing::debug;

/// Native state of one mounted swatch.
#[derive(Debug)]
pub struct SwatchView {
    color: Mutex<String>,
    opacity: Mutex<f64>,
    label: Mutex<Option<String>>,
}

impl SwatchView {
    fn new() -> Self {
        Self {
            color: Mutex::new("#000000".to_string()),
            opacity: Mutex::new(1.0),
            label: Mutex::new(None),
        }
    }

    /// Current state as a map, for printing.
    pub fn snapshot(&self) -> DynamicValue {
        let color = self.color.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let opacity = *self.opacity.lock().unwrap_or_else(PoisonError::into_inner);
        let label = self.label.lock().unwrap_or_else(PoisonError::into_inner).clone();
        DynamicValue::from(HashMap::from([
            ("color".to_string(), DynamicValue::from(color)),
            ("opacity".to_string(), DynamicValue::from(opacity)),
            ("label".to_string(), DynamicValue::from(label)),
        ]))
    }
}

pub struct SwatchManager;

impl ViewManager for SwatchManager {
    fn name(&self) -> &str {
        "Swatch"
    }

    fn create_view_instance(&self, _registry: &ModuleRegistry) -> ViewInstance {
        Arc::new(SwatchView::new())
    }

    fn props(&self) -> Vec<PropSet> {
        vec![
            PropSet::new("Swatch")
                .prop("color", |view: &SwatchView, color: String| {
                    *view.color.lock().unwrap_or_else(PoisonError::into_inner) = color;
                })
                .prop("label", |view: &SwatchView, label: Option<String>| {
                    *view.label.lock().unwrap_or_else(PoisonError::into_inner) = label;
                }),
            PropSet::new("View").prop("opacity", |view: &SwatchView, opacity: f64| {
                *view.opacity.lock().unwrap_or_else(PoisonError::into_inner) = opacity.clamp(0.0, 1.0);
            }),
        ]
    }

    fn exported_event_names(&self) -> Vec<String> {
        vec!["onPress".to_string(), "onColorChange".to_string()]
    }

    fn on_drop_view_instance(&self, view: &ViewHandle) {
        debug!(view = %view.id(), "swatch released");
    }
}
