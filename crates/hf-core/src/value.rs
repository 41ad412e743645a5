//! Declared data types and typed signal values.
//!
//! Coercion follows one rule: widening is always exact, narrowing is checked.
//! An 8-bit value feeding a 32-bit output is copied as-is; a 64-bit value
//! feeding an 8-bit output succeeds only when it fits, and reports
//! [`CoreError::OutOfRange`] otherwise. Nothing ever wraps around.

use core::fmt;
use core::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Value type a signal is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

impl FromStr for DataType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Self::Boolean,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "float" => Self::Float,
            "double" => Self::Double,
            "string" => Self::String,
            _ => {
                return Err(CoreError::UnknownDataType {
                    name: s.to_string(),
                });
            }
        };
        Ok(ty)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed signal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Boolean,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Uint8(_) => DataType::Uint8,
            Self::Uint16(_) => DataType::Uint16,
            Self::Uint32(_) => DataType::Uint32,
            Self::Uint64(_) => DataType::Uint64,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
        }
    }

    /// Integer payload widened to `i128`, if this is an integer value.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Int8(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::Int64(v) => Some(v.into()),
            Self::Uint8(v) => Some(v.into()),
            Self::Uint16(v) => Some(v.into()),
            Self::Uint32(v) => Some(v.into()),
            Self::Uint64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Numeric payload as `f64`, if this is a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v.into()),
            Self::Double(v) => Some(v),
            _ => self.as_i128().map(|n| n as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Convert this value to `to`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TypeMismatch`] between boolean, string and numeric kinds,
    ///   or when a floating value with a fractional part feeds an integer type
    /// - [`CoreError::OutOfRange`] when the value does not fit `to`
    /// - [`CoreError::Inexact`] when a whole number has no exact
    ///   representation in the target float type
    /// - [`CoreError::NonFinite`] when NaN or infinity feeds an integer type
    pub fn coerce_to(&self, to: DataType) -> CoreResult<Value> {
        let from = self.data_type();
        if from == to {
            return Ok(self.clone());
        }
        let mismatch = CoreError::TypeMismatch { from, to };

        if let Some(n) = self.as_i128() {
            return if to.is_integer() || to.is_floating() {
                integer_to(n, to)
            } else {
                Err(mismatch)
            };
        }

        if from.is_floating() {
            let x = self.as_f64().ok_or(mismatch.clone())?;
            return match to {
                DataType::Double => Ok(Value::Double(x)),
                DataType::Float => {
                    if x.is_finite() && x.abs() > f64::from(f32::MAX) {
                        Err(CoreError::OutOfRange {
                            value: x.to_string(),
                            to,
                        })
                    } else if x.fract() == 0.0 && f64::from(x as f32) != x {
                        Err(CoreError::Inexact {
                            value: x.to_string(),
                            to,
                        })
                    } else {
                        Ok(Value::Float(x as f32))
                    }
                }
                _ if to.is_integer() => {
                    if !x.is_finite() {
                        return Err(CoreError::NonFinite { to });
                    }
                    if x.fract() != 0.0 {
                        return Err(mismatch);
                    }
                    // `as` saturates; anything saturated is rejected by the range check
                    integer_to(x as i128, to)
                }
                _ => Err(mismatch),
            };
        }

        Err(mismatch)
    }

    /// Parse text into a value of the given type.
    pub fn parse_as(to: DataType, text: &str) -> CoreResult<Value> {
        let text = text.trim();
        let parse_err = || CoreError::Parse {
            text: text.to_string(),
            to,
        };
        match to {
            DataType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "off" => Ok(Value::Bool(false)),
                _ => Err(parse_err()),
            },
            DataType::String => Ok(Value::String(text.to_string())),
            DataType::Float | DataType::Double => {
                let x: f64 = text.parse().map_err(|_| parse_err())?;
                Value::Double(x).coerce_to(to)
            }
            _ => {
                let n: i128 = text.parse().map_err(|_| parse_err())?;
                integer_to(n, to)
            }
        }
    }
}

fn integer_to(n: i128, to: DataType) -> CoreResult<Value> {
    let out_of_range = || CoreError::OutOfRange {
        value: n.to_string(),
        to,
    };
    let value = match to {
        DataType::Int8 => Value::Int8(i8::try_from(n).map_err(|_| out_of_range())?),
        DataType::Int16 => Value::Int16(i16::try_from(n).map_err(|_| out_of_range())?),
        DataType::Int32 => Value::Int32(i32::try_from(n).map_err(|_| out_of_range())?),
        DataType::Int64 => Value::Int64(i64::try_from(n).map_err(|_| out_of_range())?),
        DataType::Uint8 => Value::Uint8(u8::try_from(n).map_err(|_| out_of_range())?),
        DataType::Uint16 => Value::Uint16(u16::try_from(n).map_err(|_| out_of_range())?),
        DataType::Uint32 => Value::Uint32(u32::try_from(n).map_err(|_| out_of_range())?),
        DataType::Uint64 => Value::Uint64(u64::try_from(n).map_err(|_| out_of_range())?),
        // whole numbers must survive the trip through the float type
        DataType::Float => {
            let x = n as f32;
            if x as i128 != n {
                return Err(inexact(n, to));
            }
            Value::Float(x)
        }
        DataType::Double => {
            let x = n as f64;
            if x as i128 != n {
                return Err(inexact(n, to));
            }
            Value::Double(x)
        }
        DataType::Boolean | DataType::String => {
            return Err(CoreError::TypeMismatch {
                from: DataType::Int64,
                to,
            });
        }
    };
    Ok(value)
}

fn inexact(n: i128, to: DataType) -> CoreError {
    CoreError::Inexact {
        value: n.to_string(),
        to,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Uint8(v) => write!(f, "{v}"),
            Self::Uint16(v) => write!(f, "{v}"),
            Self::Uint32(v) => write!(f, "{v}"),
            Self::Uint64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn signed_widening_is_lossless(n in any::<i8>()) {
            prop_assert_eq!(Value::Int8(n).coerce_to(DataType::Int32).unwrap(), Value::Int32(n.into()));
            prop_assert_eq!(Value::Int8(n).coerce_to(DataType::Int64).unwrap(), Value::Int64(n.into()));
            prop_assert_eq!(Value::Int8(n).coerce_to(DataType::Double).unwrap(), Value::Double(n.into()));
        }

        #[test]
        fn narrowing_never_wraps(n in any::<i32>()) {
            match Value::Int32(n).coerce_to(DataType::Int8) {
                Ok(Value::Int8(m)) => prop_assert_eq!(i32::from(m), n),
                Ok(other) => prop_assert!(false, "unexpected {:?}", other),
                Err(_) => prop_assert!(n < i32::from(i8::MIN) || n > i32::from(i8::MAX)),
            }
        }
    }
}
