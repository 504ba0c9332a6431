// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed parameter extraction: the bridge between declared Rust parameter
// types and the runtime ParamType descriptors used for coercion.

use std::collections::HashMap;

use modulwerk_core::{DynamicValue, NativeValue, ParamType};

use crate::arguments::ReadableArguments;

/// A Rust type that can appear as an exported method or prop-setter
/// parameter.
///
/// `param_type` describes the type to the coercion layer; `from_native`
/// unwraps the value that layer produced.  After a successful coercion
/// against `param_type()`, `from_native` always returns `Some`.
pub trait FromNative: Sized {
    fn param_type() -> ParamType;

    fn from_native(value: NativeValue) -> Option<Self>;
}

macro_rules! scalar_from_native {
    ($ty:ty, $param:ident, $variant:ident) => {
        impl FromNative for $ty {
            fn param_type() -> ParamType {
                ParamType::$param
            }

            fn from_native(value: NativeValue) -> Option<Self> {
                match value {
                    NativeValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

scalar_from_native!(bool, Bool, Bool);
scalar_from_native!(i8, Byte, Byte);
scalar_from_native!(i16, Short, Short);
scalar_from_native!(i32, Int, Int);
scalar_from_native!(i64, Long, Long);
scalar_from_native!(f32, Float, Float);
scalar_from_native!(f64, Double, Double);
scalar_from_native!(String, String, String);

impl FromNative for DynamicValue {
    fn param_type() -> ParamType {
        ParamType::Dynamic
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        Some(value.into_dynamic())
    }
}

impl<T: FromNative> FromNative for Option<T> {
    fn param_type() -> ParamType {
        ParamType::nullable(T::param_type())
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Null => Some(None),
            other => T::from_native(other).map(Some),
        }
    }
}

impl<T: FromNative> FromNative for Vec<T> {
    fn param_type() -> ParamType {
        ParamType::array_of(T::param_type())
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::List(items) => items.into_iter().map(T::from_native).collect(),
            _ => None,
        }
    }
}

impl<T: FromNative> FromNative for HashMap<String, T> {
    fn param_type() -> ParamType {
        ParamType::map_of(T::param_type())
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_native(v).map(|v| (k, v)))
                .collect(),
            _ => None,
        }
    }
}

impl FromNative for ReadableArguments {
    fn param_type() -> ParamType {
        ParamType::Map(None)
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Map(entries) => Some(Self::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_dynamic()))
                    .collect(),
            )),
            _ => None,
        }
    }
}
