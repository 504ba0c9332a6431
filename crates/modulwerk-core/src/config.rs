// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// What the registry does when a second member registers under a taken name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the registration with `E_DUPLICATE_REGISTRATION`.
    #[default]
    Reject,
    /// Replace the earlier entry and log a warning.
    Override,
}

/// How a script number is narrowed into an integral parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrowingMode {
    /// Truncate toward zero with host cast semantics (`3.9` becomes `3`).
    #[default]
    Truncate,
    /// Reject fractional or out-of-range numbers as a type mismatch.
    Strict,
}

/// Settings applied to one registry and everything dispatched through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub duplicate_registration: DuplicatePolicy,
    pub numeric_narrowing: NarrowingMode,
    /// Capacity of the event broadcast channel; slow subscribers lag past it.
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            duplicate_registration: DuplicatePolicy::Reject,
            numeric_narrowing: NarrowingMode::Truncate,
            event_capacity: 64,
        }
    }
}

impl BridgeConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Persist this config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(BridgeError::Config(
                "event_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
