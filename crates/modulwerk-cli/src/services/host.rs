// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// BridgeHost — owns one registry, its dispatch proxy and view adapter, and
// turns each CLI command into bridge calls with serializable reports.
//
// The host plays the script side: it awaits settlements (with the optional
// caller-side timeout from `CliConfig`) and collects events emitted while a
// call was in flight.

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use modulwerk_bridge::adapter::{PropUpdateReport, ViewManagerInfo};
use modulwerk_bridge::{
    BridgeEvent, BridgeManifest, BridgeProxy, ModuleRegistryProvider, ViewManagerAdapter,
};
use modulwerk_core::{BridgeError, DynamicValue, Rejection, Result, Settlement, ViewId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, instrument, warn};

use crate::config::CliConfig;
use crate::demo::DemoPackage;
use crate::demo::swatch::SwatchView;

/// How one call ended, from the caller's point of view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CallOutcome {
    Resolved { value: DynamicValue },
    Rejected(Rejection),
    #[serde(rename_all = "camelCase")]
    TimedOut { after_ms: u64 },
}

impl From<Settlement> for CallOutcome {
    fn from(settlement: Settlement) -> Self {
        match settlement {
            Settlement::Resolved { value } => Self::Resolved { value },
            Settlement::Rejected(rejection) => Self::Rejected(rejection),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReport {
    pub module: String,
    pub method: String,
    #[serde(flatten)]
    pub outcome: CallOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<BridgeEvent>,
}

impl CallReport {
    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, CallOutcome::Resolved { .. })
    }
}

/// One line of a replay file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayEntry {
    pub module: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<DynamicValue>,
}

/// Bridge manifest plus per-view-manager props and events.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostManifest {
    #[serde(flatten)]
    pub bridge: BridgeManifest,
    pub view_managers: BTreeMap<String, ViewManagerInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropsReport {
    pub manager: String,
    pub view: ViewId,
    #[serde(flatten)]
    pub report: PropUpdateReport,
    /// Native view state after the update, for managers that expose one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<DynamicValue>,
}

pub struct BridgeHost {
    proxy: BridgeProxy,
    views: ViewManagerAdapter,
    call_timeout: Option<Duration>,
}

impl BridgeHost {
    /// Build a registry from the demo package and bring the host to the
    /// foreground.
    pub fn start(config: &CliConfig) -> Result<Self> {
        let registry = ModuleRegistryProvider::new()
            .with_package(DemoPackage)
            .build(config.bridge.clone())?;
        let registry = Arc::new(registry);
        let proxy = BridgeProxy::new(Arc::clone(&registry));
        registry.host_lifecycle().host_resumed();
        info!(
            modules = proxy.manifest().exported_methods.len(),
            view_managers = proxy.manifest().view_managers_names.len(),
            "bridge host started"
        );
        Ok(Self {
            proxy,
            views: ViewManagerAdapter::new(registry),
            call_timeout: config.call_timeout_ms.map(Duration::from_millis),
        })
    }

    pub fn manifest(&self) -> HostManifest {
        HostManifest {
            bridge: self.proxy.manifest().clone(),
            view_managers: self.views.view_manager_constants(),
        }
    }

    /// Call one method and wait for its settlement.
    #[instrument(skip(self, args))]
    pub async fn call(&self, module: &str, method: &str, args: Vec<DynamicValue>) -> CallReport {
        let mut events = self.proxy.registry().event_emitter().subscribe();
        let pending = self.proxy.call_method(module, method, args);
        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(settlement) => settlement.into(),
                Err(_) => {
                    warn!(after_ms = limit.as_millis() as u64, "call timed out");
                    CallOutcome::TimedOut {
                        after_ms: limit.as_millis() as u64,
                    }
                }
            },
            None => pending.await.into(),
        };

        let mut emitted = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => emitted.push(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        CallReport {
            module: module.to_string(),
            method: method.to_string(),
            outcome,
            events: emitted,
        }
    }

    /// Run every call in a JSON-lines document, in order.
    ///
    /// Blank lines and lines starting with `#` are skipped; a line that does
    /// not parse is logged and skipped.
    pub async fn replay(&self, reader: impl BufRead) -> Result<Vec<CallReport>> {
        let mut reports = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<ReplayEntry>(trimmed) {
                Ok(entry) => {
                    reports.push(self.call(&entry.module, &entry.method, entry.args).await);
                }
                Err(err) => warn!(line = index + 1, error = %err, "skipping malformed replay line"),
            }
        }
        Ok(reports)
    }

    /// Mount a view, apply `props`, then unmount it.
    pub fn apply_props(&self, manager: &str, props: HashMap<String, DynamicValue>) -> Result<PropsReport> {
        let view = self.views.create_view(manager)?;
        let report = self.views.update_props(&view, props);
        let state = view.instance_as::<SwatchView>().map(SwatchView::snapshot);
        self.views.drop_view(&view);
        Ok(PropsReport {
            manager: manager.to_string(),
            view: view.id(),
            report,
            state,
        })
    }

    pub fn shutdown(&self) {
        self.proxy.registry().host_lifecycle().host_destroyed();
        self.proxy.shutdown();
        info!("bridge host stopped");
    }
}

/// Parse a positional argument list given as a JSON array.
pub fn parse_args(json: &str) -> Result<Vec<DynamicValue>> {
    match DynamicValue::from_json_str(json)? {
        DynamicValue::Array(items) => Ok(items),
        other => Err(BridgeError::Config(format!(
            "call arguments must be a JSON array, got {}",
            other.type_name()
        ))),
    }
}

/// Parse a prop batch given as a JSON object.
pub fn parse_props(json: &str) -> Result<HashMap<String, DynamicValue>> {
    match DynamicValue::from_json_str(json)? {
        DynamicValue::Map(entries) => Ok(entries),
        other => Err(BridgeError::Config(format!(
            "props must be a JSON object, got {}",
            other.type_name()
        ))),
    }
}
