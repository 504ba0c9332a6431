// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Modulwerk — Core value model, types and error definitions shared by the
// bridge and every capability provider.

pub mod config;
pub mod error;
pub mod types;
pub mod value;

pub use config::{BridgeConfig, DuplicatePolicy, NarrowingMode};
pub use error::{BridgeError, CodedError, CoercionError, Result};
pub use types::*;
pub use value::DynamicValue;
