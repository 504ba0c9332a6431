// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Demo provider package the CLI drives the bridge against.

pub mod echo;
pub mod frames;
pub mod swatch;

use std::sync::Arc;

use modulwerk_bridge::{Module, Package, ViewManager};

pub struct DemoPackage;

impl Package for DemoPackage {
    fn create_exported_modules(&self) -> Vec<Arc<dyn Module>> {
        vec![
            Arc::new(echo::Echo::default()) as Arc<dyn Module>,
            Arc::new(frames::FrameSampler::new()),
        ]
    }

    fn create_view_managers(&self) -> Vec<Arc<dyn ViewManager>> {
        vec![Arc::new(swatch::SwatchManager) as Arc<dyn ViewManager>]
    }
}
