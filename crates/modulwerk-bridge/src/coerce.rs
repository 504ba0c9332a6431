// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Argument coercion: DynamicValue -> NativeValue for a declared ParamType.
//
// Coercion happens for every argument before a native method runs, so a
// method never observes a partially-converted argument list.  Numbers are
// always f64 on the script side; integral targets narrow with host cast
// semantics (truncate toward zero, saturate at the i32/i64 bounds, NaN to 0)
// unless the registry runs in strict narrowing mode.

use std::collections::HashMap;

use modulwerk_core::{CoercionError, DynamicValue, NarrowingMode, NativeValue, ParamType};

/// Coerce one dynamic value into the declared parameter type.
pub fn coerce(
    value: DynamicValue,
    expected: &ParamType,
    mode: NarrowingMode,
) -> Result<NativeValue, CoercionError> {
    match (expected, value) {
        (ParamType::Dynamic, value) => Ok(NativeValue::Dynamic(value)),
        (ParamType::Nullable(_), DynamicValue::Null) => Ok(NativeValue::Null),
        (ParamType::Nullable(inner), value) => coerce(value, inner, mode),
        (ParamType::Bool, DynamicValue::Bool(b)) => Ok(NativeValue::Bool(b)),
        (ParamType::String, DynamicValue::String(s)) => Ok(NativeValue::String(s)),
        (ParamType::Double, DynamicValue::Number(n)) => Ok(NativeValue::Double(n)),
        (ParamType::Float, DynamicValue::Number(n)) => narrow_float(n, mode),
        (ty, DynamicValue::Number(n)) if ty.is_integral() => narrow_integral(n, ty, mode),
        (ParamType::Array(element), DynamicValue::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match element {
                Some(element) => {
                    coerce(item, element, mode).map_err(|e| e.nested(&index.to_string()))
                }
                None => Ok(NativeValue::Dynamic(item)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(NativeValue::List),
        (ParamType::Map(value_type), DynamicValue::Map(entries)) => entries
            .into_iter()
            .map(|(key, item)| {
                let coerced = match value_type {
                    Some(value_type) => coerce(item, value_type, mode).map_err(|e| e.nested(&key)),
                    None => Ok(NativeValue::Dynamic(item)),
                };
                coerced.map(|native| (key, native))
            })
            .collect::<Result<HashMap<_, _>, _>>()
            .map(NativeValue::Map),
        (expected, value) => Err(mismatch(expected, &value)),
    }
}

fn mismatch(expected: &ParamType, value: &DynamicValue) -> CoercionError {
    CoercionError::new(expected.to_string(), value.type_name())
}

fn narrow_float(n: f64, mode: NarrowingMode) -> Result<NativeValue, CoercionError> {
    if mode == NarrowingMode::Strict && n.is_finite() && n.abs() > f64::from(f32::MAX) {
        return Err(CoercionError::new("float", format!("number {n} (out of range)")));
    }
    Ok(NativeValue::Float(n as f32))
}

fn narrow_integral(
    n: f64,
    target: &ParamType,
    mode: NarrowingMode,
) -> Result<NativeValue, CoercionError> {
    if mode == NarrowingMode::Strict {
        check_exact(n, target)?;
    }
    // `as` from f64 truncates toward zero, saturates and maps NaN to 0.
    // byte/short narrow from the truncated i32, wrapping like a host cast.
    let native = match target {
        ParamType::Byte => NativeValue::Byte((n as i32) as i8),
        ParamType::Short => NativeValue::Short((n as i32) as i16),
        ParamType::Int => NativeValue::Int(n as i32),
        _ => NativeValue::Long(n as i64),
    };
    Ok(native)
}

fn check_exact(n: f64, target: &ParamType) -> Result<(), CoercionError> {
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(CoercionError::new(
            target.to_string(),
            format!("number {n} (not an integer)"),
        ));
    }
    let (min, max_exclusive) = match target {
        ParamType::Byte => (f64::from(i8::MIN), f64::from(i8::MAX) + 1.0),
        ParamType::Short => (f64::from(i16::MIN), f64::from(i16::MAX) + 1.0),
        ParamType::Int => (f64::from(i32::MIN), f64::from(i32::MAX) + 1.0),
        // i64::MAX is not representable; 2^63 is the first value past it.
        _ => (i64::MIN as f64, 9_223_372_036_854_775_808.0),
    };
    if n < min || n >= max_exclusive {
        return Err(CoercionError::new(
            target.to_string(),
            format!("number {n} (out of range)"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truncate(value: impl Into<DynamicValue>, ty: &ParamType) -> Result<NativeValue, CoercionError> {
        coerce(value.into(), ty, NarrowingMode::Truncate)
    }

    #[test]
    fn numbers_truncate_toward_zero() {
        assert_eq!(truncate(3.9, &ParamType::Int).unwrap(), NativeValue::Int(3));
        assert_eq!(truncate(-3.9, &ParamType::Int).unwrap(), NativeValue::Int(-3));
        assert_eq!(truncate(7.0, &ParamType::Long).unwrap(), NativeValue::Long(7));
        assert_eq!(truncate(2.5, &ParamType::Double).unwrap(), NativeValue::Double(2.5));
    }

    #[test]
    fn out_of_range_numbers_follow_cast_semantics() {
        assert_eq!(truncate(1e12, &ParamType::Int).unwrap(), NativeValue::Int(i32::MAX));
        assert_eq!(truncate(f64::NAN, &ParamType::Long).unwrap(), NativeValue::Long(0));
        assert_eq!(truncate(300.0, &ParamType::Byte).unwrap(), NativeValue::Byte(44));
        assert_eq!(truncate(65_537.0, &ParamType::Short).unwrap(), NativeValue::Short(1));
    }

    #[test]
    fn strict_mode_rejects_lossy_narrowing() {
        let err = coerce(3.5.into(), &ParamType::Int, NarrowingMode::Strict).unwrap_err();
        assert_eq!(err.expected, "int");
        assert!(err.received.contains("not an integer"));

        assert!(coerce(128.0.into(), &ParamType::Byte, NarrowingMode::Strict).is_err());
        assert!(coerce(1e300.into(), &ParamType::Float, NarrowingMode::Strict).is_err());
        assert_eq!(
            coerce(127.0.into(), &ParamType::Byte, NarrowingMode::Strict).unwrap(),
            NativeValue::Byte(127)
        );
    }

    #[test]
    fn wrong_dynamic_type_is_a_mismatch() {
        let err = truncate("five", &ParamType::Double).unwrap_err();
        assert_eq!(err.expected, "double");
        assert_eq!(err.received, "string");
        assert!(truncate(1.0, &ParamType::Bool).is_err());
        assert!(truncate(true, &ParamType::String).is_err());
    }

    #[test]
    fn null_only_fills_nullable_and_dynamic() {
        assert!(truncate(DynamicValue::Null, &ParamType::String).is_err());
        assert!(truncate(DynamicValue::Null, &ParamType::Array(None)).is_err());
        assert_eq!(
            truncate(DynamicValue::Null, &ParamType::nullable(ParamType::Int)).unwrap(),
            NativeValue::Null
        );
        assert_eq!(
            truncate(DynamicValue::Null, &ParamType::Dynamic).unwrap(),
            NativeValue::Dynamic(DynamicValue::Null)
        );
        assert_eq!(
            truncate(4.2, &ParamType::nullable(ParamType::Int)).unwrap(),
            NativeValue::Int(4)
        );
    }

    #[test]
    fn typed_arrays_report_the_failing_index() {
        let value = DynamicValue::from_json_str(r#"[1, 2, "three"]"#).unwrap();
        let err = truncate(value, &ParamType::array_of(ParamType::Int)).unwrap_err();
        assert_eq!(err.path, "2");
        assert_eq!(err.received, "string");
    }

    #[test]
    fn nested_maps_report_the_full_path() {
        let value = DynamicValue::from_json_str(r#"{"rows": [[1], [2, false]]}"#).unwrap();
        let ty = ParamType::map_of(ParamType::array_of(ParamType::array_of(ParamType::Int)));
        let err = truncate(value, &ty).unwrap_err();
        assert_eq!(err.path, "rows.1.1");
    }

    #[test]
    fn untyped_containers_pass_elements_through() {
        let value = DynamicValue::from_json_str(r#"{"a": 1, "b": [true]}"#).unwrap();
        let NativeValue::Map(entries) = truncate(value, &ParamType::Map(None)).unwrap() else {
            panic!("expected a map");
        };
        assert_eq!(entries["a"], NativeValue::Dynamic(DynamicValue::Number(1.0)));
        assert!(matches!(entries["b"], NativeValue::Dynamic(DynamicValue::Array(_))));
    }

    #[test]
    fn completion_is_never_an_argument_type() {
        assert!(truncate(DynamicValue::Null, &ParamType::Completion).is_err());
    }
}
