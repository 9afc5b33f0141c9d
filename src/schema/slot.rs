//! Column slots: typed, addressable field targets for row scanning.

use crate::types::ScanError;
use crate::value::Value;

/// A field that can receive a driver-native column value.
///
/// Implementations coerce the incoming [`Value`] according to their own
/// semantic type. Plain fields reset to their default on `NULL`; `Option<T>`
/// records the null explicitly.
pub trait ColumnSlot {
    /// Writes `value` into the slot.
    fn scan(&mut self, value: &Value) -> Result<(), ScanError>;
}

/// Slot for columns that have no matching field. Values are read and dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ColumnSlot for Discard {
    fn scan(&mut self, _value: &Value) -> Result<(), ScanError> {
        Ok(())
    }
}

fn utf8<'a>(bytes: &'a [u8], expected: &'static str) -> Result<&'a str, ScanError> {
    std::str::from_utf8(bytes)
        .map_err(|err| ScanError::with_detail(expected, "bytes", err.to_string()))
}

/// Integral floats strictly inside the `i128` range, as `i128`.
fn float_to_integer(v: f64, expected: &'static str) -> Result<i128, ScanError> {
    // 2^127 is exactly representable; `i128::MAX as f64` rounds up to it.
    const BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(ScanError::with_detail(
            expected,
            "float",
            format!("{v} is not an integral value"),
        ));
    }
    if v < -BOUND || v >= BOUND {
        return Err(ScanError::with_detail(expected, "float", format!("{v} out of range")));
    }
    Ok(v as i128)
}

macro_rules! int_slot {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ColumnSlot for $ty {
                fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
                    const NAME: &str = stringify!($ty);
                    let out_of_range = |shown: &dyn std::fmt::Display| {
                        ScanError::with_detail(NAME, value.kind(), format!("{shown} out of range"))
                    };
                    *self = match value {
                        Value::Null => 0,
                        Value::Int(v) => <$ty>::try_from(*v).map_err(|_| out_of_range(v))?,
                        Value::Float(v) => {
                            let whole = float_to_integer(*v, NAME)?;
                            <$ty>::try_from(whole).map_err(|_| out_of_range(v))?
                        }
                        Value::Text(s) => s
                            .trim()
                            .parse::<$ty>()
                            .map_err(|err| ScanError::with_detail(NAME, "text", err.to_string()))?,
                        Value::Bytes(b) => utf8(b, NAME)?
                            .trim()
                            .parse::<$ty>()
                            .map_err(|err| ScanError::with_detail(NAME, "bytes", err.to_string()))?,
                        other => return Err(ScanError::mismatch(NAME, other.kind())),
                    };
                    Ok(())
                }
            }
        )*
    };
}

int_slot!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl ColumnSlot for f64 {
    fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
        *self = match value {
            Value::Null => 0.0,
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|err| ScanError::with_detail("f64", "text", err.to_string()))?,
            Value::Bytes(b) => utf8(b, "f64")?
                .trim()
                .parse::<f64>()
                .map_err(|err| ScanError::with_detail("f64", "bytes", err.to_string()))?,
            other => return Err(ScanError::mismatch("f64", other.kind())),
        };
        Ok(())
    }
}

/// Reads as `f64`, then rejects finite values beyond the `f32` range.
/// Precision loss within the range is accepted.
impl ColumnSlot for f32 {
    fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
        let mut wide = 0f64;
        wide.scan(value).map_err(|err| ScanError {
            expected: "f32",
            ..err
        })?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(ScanError::with_detail(
                "f32",
                value.kind(),
                format!("{wide} out of range"),
            ));
        }
        *self = wide as f32;
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

impl ColumnSlot for bool {
    fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
        *self = match value {
            Value::Null => false,
            Value::Bool(v) => *v,
            Value::Int(v) => *v != 0,
            Value::Text(s) => parse_bool(s)
                .ok_or_else(|| ScanError::with_detail("bool", "text", format!("invalid boolean {s:?}")))?,
            other => return Err(ScanError::mismatch("bool", other.kind())),
        };
        Ok(())
    }
}

impl ColumnSlot for String {
    fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
        match value {
            Value::Null => self.clear(),
            Value::Text(s) => s.clone_into(self),
            Value::Int(v) => *self = v.to_string(),
            Value::Float(v) => *self = v.to_string(),
            Value::Bool(v) => *self = v.to_string(),
            Value::Bytes(b) => *self = utf8(b, "String")?.to_owned(),
        }
        Ok(())
    }
}

impl ColumnSlot for Vec<u8> {
    fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
        match value {
            Value::Null => self.clear(),
            Value::Bytes(b) => b.clone_into(self),
            Value::Text(s) => *self = s.as_bytes().to_vec(),
            other => return Err(ScanError::mismatch("Vec<u8>", other.kind())),
        }
        Ok(())
    }
}

impl ColumnSlot for Value {
    fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
        value.clone_into(self);
        Ok(())
    }
}

impl ColumnSlot for serde_json::Value {
    fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
        *self = match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v),
            Value::Text(s) => serde_json::from_str(s)
                .map_err(|err| ScanError::with_detail("json", "text", err.to_string()))?,
            Value::Bytes(b) => serde_json::from_slice(b)
                .map_err(|err| ScanError::with_detail("json", "bytes", err.to_string()))?,
        };
        Ok(())
    }
}

impl<T: ColumnSlot + Default> ColumnSlot for Option<T> {
    fn scan(&mut self, value: &Value) -> Result<(), ScanError> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.scan(value)?;
        *self = Some(inner);
        Ok(())
    }
}
