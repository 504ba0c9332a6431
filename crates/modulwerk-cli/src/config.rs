// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CLI configuration: bridge settings plus caller-side options.

use std::path::Path;

use modulwerk_core::{BridgeConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub bridge: BridgeConfig,
    /// Give up waiting for a settlement after this many milliseconds.
    pub call_timeout_ms: Option<u64>,
}

impl CliConfig {
    /// Load from `path`. A missing file yields defaults with a warning; a
    /// file that exists but does not parse or validate is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.bridge.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}
