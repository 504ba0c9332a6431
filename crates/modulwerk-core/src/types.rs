// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the capability bridge: parameter descriptors, the
// coerced native value representation, view identities and settlements.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::DynamicValue;

/// Declared type of one native method or prop-setter parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    Bool,
    /// 8-bit signed integer.
    Byte,
    /// 16-bit signed integer.
    Short,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float, the script side's native number width.
    Double,
    String,
    /// Ordered sequence; elements are coerced when the element type is known.
    Array(Option<Box<ParamType>>),
    /// String-keyed map; values are coerced when the value type is known.
    Map(Option<Box<ParamType>>),
    /// Any value, passed through untouched (null included).
    Dynamic,
    /// The wrapped type, or null.
    Nullable(Box<ParamType>),
    /// The completion handle the bridge supplies as the final method parameter.
    Completion,
}

impl ParamType {
    pub fn array_of(element: ParamType) -> Self {
        Self::Array(Some(Box::new(element)))
    }

    pub fn map_of(value: ParamType) -> Self {
        Self::Map(Some(Box::new(value)))
    }

    pub fn nullable(inner: ParamType) -> Self {
        Self::Nullable(Box::new(inner))
    }

    /// Integral targets whose coercion narrows a 64-bit float.
    pub fn is_integral(&self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int | Self::Long)
    }

    /// Whether a null value is an acceptable argument for this type.
    pub fn accepts_null(&self) -> bool {
        matches!(self, Self::Nullable(_) | Self::Dynamic)
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => f.write_str("boolean"),
            Self::Byte => f.write_str("byte"),
            Self::Short => f.write_str("short"),
            Self::Int => f.write_str("int"),
            Self::Long => f.write_str("long"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::String => f.write_str("string"),
            Self::Array(None) => f.write_str("array"),
            Self::Array(Some(inner)) => write!(f, "array<{inner}>"),
            Self::Map(None) => f.write_str("map"),
            Self::Map(Some(inner)) => write!(f, "map<{inner}>"),
            Self::Dynamic => f.write_str("dynamic"),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            Self::Completion => f.write_str("promise"),
        }
    }
}

/// A value after coercion into its declared native type.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    List(Vec<NativeValue>),
    Map(HashMap<String, NativeValue>),
    /// Untyped value passed through from the script side.
    Dynamic(DynamicValue),
}

impl NativeValue {
    /// Native type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::List(_) => "array",
            Self::Map(_) => "map",
            Self::Dynamic(_) => "dynamic",
        }
    }

    /// Convert back to the wire representation (used when echoing coerced
    /// values or storing untyped map entries).
    pub fn into_dynamic(self) -> DynamicValue {
        match self {
            Self::Null => DynamicValue::Null,
            Self::Bool(b) => DynamicValue::Bool(b),
            Self::Byte(n) => DynamicValue::Number(n.into()),
            Self::Short(n) => DynamicValue::Number(n.into()),
            Self::Int(n) => DynamicValue::Number(n.into()),
            Self::Long(n) => DynamicValue::Number(n as f64),
            Self::Float(n) => DynamicValue::Number(n.into()),
            Self::Double(n) => DynamicValue::Number(n),
            Self::String(s) => DynamicValue::String(s),
            Self::List(items) => {
                DynamicValue::Array(items.into_iter().map(Self::into_dynamic).collect())
            }
            Self::Map(entries) => DynamicValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_dynamic()))
                    .collect(),
            ),
            Self::Dynamic(value) => value,
        }
    }
}

/// Identity of one mounted view instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(pub Uuid);

impl ViewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three-part error descriptor delivered by a rejected call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

/// Terminal outcome of one bridged call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Settlement {
    Resolved { value: DynamicValue },
    Rejected(Rejection),
}

impl Settlement {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    pub fn value(&self) -> Option<&DynamicValue> {
        match self {
            Self::Resolved { value } => Some(value),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Resolved { .. } => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }

    /// Wire code of a rejection, `None` when resolved.
    pub fn code(&self) -> Option<&str> {
        self.rejection().map(|r| r.code.as_str())
    }
}
