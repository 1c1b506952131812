use crate::{Error, Result};
use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal,
};
use std::{any, fmt};
use time::{macros::format_description, Date, PrimitiveDateTime, Time};

/// A dynamically typed SQL value: what gets bound to a placeholder and what
/// a driver hands back for a result column.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(Date),
    Time(Time),
    DateTime(PrimitiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(..) => "BOOLEAN",
            Value::Int(..) => "INTEGER",
            Value::UInt(..) => "UNSIGNED INTEGER",
            Value::Float(..) => "FLOAT",
            Value::Decimal(..) => "DECIMAL",
            Value::Text(..) => "TEXT",
            Value::Bytes(..) => "BLOB",
            Value::Date(..) => "DATE",
            Value::Time(..) => "TIME",
            Value::DateTime(..) => "DATETIME",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{v}"),
        }
    }
}

/// Conversion of a Rust value into a bindable [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Coercion of a non-null [`Value`] into a Rust type.
///
/// NULL never reaches [`FromValue::from_value`]: callers first consult
/// [`FromValue::from_null`], which yields the absent value of nullable types
/// and `None` for primitives that cannot hold NULL.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;

    fn from_null() -> Option<Self> {
        None
    }
}

/// Coerces `value` into `T`, NULL included. `field` names the member or
/// column being filled for the `NullToPrimitive` diagnostic.
pub fn decode<T: FromValue>(field: &str, value: Value) -> Result<T> {
    if value.is_null() {
        T::from_null().ok_or_else(|| Error::NullToPrimitive {
            field: field.to_owned(),
            target: any::type_name::<T>(),
        })
    } else {
        T::from_value(value)
    }
}

pub(crate) fn coercion_error<T>(value: &Value) -> Error {
    Error::ScalarCoercion {
        value: format!("{} {}", value.kind(), value),
        target: any::type_name::<T>(),
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }

    fn from_null() -> Option<Self> {
        Some(Value::Null)
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        T::from_value(value).map(Some)
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }
}

fn integer_of(value: &Value) -> Option<i128> {
    match value {
        Value::Bool(v) => Some(*v as i128),
        Value::Int(v) => Some(*v as i128),
        Value::UInt(v) => Some(*v as i128),
        Value::Float(v) if v.fract() == 0.0 => Some(*v as i128),
        Value::Decimal(v) if v.fract().is_zero() => v.to_i128(),
        Value::Text(v) => v.trim().parse().ok(),
        _ => None,
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::$variant((*self).into())
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    integer_of(&value)
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| coercion_error::<$ty>(&value))
                }
            }
        )+
    };
}

impl_integer!(
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => UInt,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
);

impl ToValue for isize {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        Value::UInt(*self as u64)
    }
}

impl FromValue for usize {
    fn from_value(value: Value) -> Result<Self> {
        integer_of(&value)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| coercion_error::<usize>(&value))
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float((*self).into())
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Decimal(v) => v.to_f64(),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| coercion_error::<f64>(&value))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        let wide = f64::from_value(value.clone())?;
        let narrow = wide as f32;
        if narrow.is_finite() || !wide.is_finite() {
            Ok(narrow)
        } else {
            Err(coercion_error::<f32>(&value))
        }
    }
}

impl ToValue for Decimal {
    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Decimal(v) => Some(*v),
            Value::Int(v) => Some(Decimal::from(*v)),
            Value::UInt(v) => Some(Decimal::from(*v)),
            Value::Float(v) => Decimal::from_f64(*v),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| coercion_error::<Decimal>(&value))
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Bool(v) => Some(*v),
            Value::Int(0) | Value::UInt(0) => Some(false),
            Value::Int(1) | Value::UInt(1) => Some(true),
            Value::Text(v) => match v.trim() {
                "1" => Some(true),
                "0" => Some(false),
                v if v.eq_ignore_ascii_case("true") => Some(true),
                v if v.eq_ignore_ascii_case("false") => Some(false),
                _ => None,
            },
            _ => None,
        }
        .ok_or_else(|| coercion_error::<bool>(&value))
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_owned())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Bytes(v) => {
                String::from_utf8(v).map_err(|e| coercion_error::<String>(&Value::Bytes(e.into_bytes())))
            }
            Value::Null => Ok(String::new()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::UInt(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Decimal(v) => Ok(v.to_string()),
            Value::Date(v) => Ok(v.to_string()),
            Value::Time(v) => Ok(v.to_string()),
            Value::DateTime(v) => Ok(v.to_string()),
        }
    }

    fn from_null() -> Option<Self> {
        Some(String::new())
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Result<Self> {
        if let Value::Text(v) = &value {
            let mut chars = v.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(c);
            }
        }
        Err(coercion_error::<char>(&value))
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => Err(coercion_error::<Vec<u8>>(&other)),
        }
    }

    fn from_null() -> Option<Self> {
        Some(Vec::new())
    }
}

impl ToValue for Date {
    fn to_value(&self) -> Value {
        Value::Date(*self)
    }
}

impl FromValue for Date {
    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Date(v) => Some(*v),
            Value::DateTime(v) => Some(v.date()),
            Value::Text(v) => Date::parse(v.trim(), format_description!("[year]-[month]-[day]")).ok(),
            _ => None,
        }
        .ok_or_else(|| coercion_error::<Date>(&value))
    }
}

impl ToValue for Time {
    fn to_value(&self) -> Value {
        Value::Time(*self)
    }
}

impl FromValue for Time {
    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Time(v) => Some(*v),
            Value::DateTime(v) => Some(v.time()),
            Value::Text(v) => parse_time(v.trim()),
            _ => None,
        }
        .ok_or_else(|| coercion_error::<Time>(&value))
    }
}

impl ToValue for PrimitiveDateTime {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl FromValue for PrimitiveDateTime {
    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::DateTime(v) => Some(*v),
            Value::Date(v) => Some(v.midnight()),
            Value::Text(v) => parse_date_time(v.trim()),
            _ => None,
        }
        .ok_or_else(|| coercion_error::<PrimitiveDateTime>(&value))
    }
}

fn parse_time(text: &str) -> Option<Time> {
    Time::parse(
        text,
        format_description!("[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| Time::parse(text, format_description!("[hour]:[minute]:[second]")))
    .ok()
}

fn parse_date_time(text: &str) -> Option<PrimitiveDateTime> {
    let (date, time) = text.split_once(['T', ' '])?;
    let date = Date::parse(date, format_description!("[year]-[month]-[day]")).ok()?;
    Some(PrimitiveDateTime::new(date, parse_time(time)?))
}
