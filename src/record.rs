use crate::{Result, Value};

/// Read access to the named members of a record, used to bind an object's
/// fields to a statement's named placeholders.
///
/// Usually generated by [`record!`](crate::record).
pub trait Bindable {
    /// Name of the implementing type, for diagnostics.
    fn type_name() -> &'static str;
    /// Member names, in declaration order.
    fn field_names() -> &'static [&'static str];
    /// Current value of `field`, or `None` if there is no such member.
    fn get(&self, field: &str) -> Option<Value>;
}

/// A record that result rows can be mapped onto. Members absent from a row
/// keep their `Default` value.
pub trait Record: Bindable + Default + Send {
    /// Coerces `value` into the member called `field` and assigns it.
    fn set(&mut self, field: &str, value: Value) -> Result<()>;
}

/// Declares a plain struct together with its [`Bindable`], [`Record`],
/// [`FromRow`](crate::FromRow) and [`ReturnShape`](crate::ReturnShape)
/// implementations.
///
/// Every member type must implement [`ToValue`](crate::ToValue) and
/// [`FromValue`](crate::FromValue), and the struct must implement `Default`.
///
/// ```
/// sqlx_plus::record! {
///     #[derive(Debug, Default)]
///     pub struct Address {
///         pub address_id: Option<i64>,
///         pub street: Option<String>,
///         pub city: Option<String>,
///     }
/// }
///
/// use sqlx_plus::Bindable;
/// assert_eq!(Address::field_names(), &["address_id", "street", "city"]);
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field : $ty ),*
        }

        impl $crate::Bindable for $name {
            fn type_name() -> &'static str {
                stringify!($name)
            }

            fn field_names() -> &'static [&'static str] {
                &[$(stringify!($field)),*]
            }

            #[allow(unused_variables)]
            fn get(&self, field: &str) -> Option<$crate::Value> {
                $(
                    if field == stringify!($field) {
                        return Some($crate::ToValue::to_value(&self.$field));
                    }
                )*
                None
            }
        }

        impl $crate::Record for $name {
            #[allow(unused_variables)]
            fn set(&mut self, field: &str, value: $crate::Value) -> $crate::Result<()> {
                $(
                    if field == stringify!($field) {
                        self.$field = $crate::value::decode::<$ty>(field, value)?;
                        return Ok(());
                    }
                )*
                Err($crate::Error::UnknownMappedField {
                    column: field.to_owned(),
                    field: field.to_owned(),
                    target: stringify!($name),
                })
            }
        }

        impl $crate::FromRow for $name {
            fn row_shape() -> $crate::RowShape {
                $crate::RowShape::Record(stringify!($name))
            }

            fn from_row(row: $crate::Row, mapper: &$crate::ResultMapper) -> $crate::Result<Self> {
                mapper.map_record(row)
            }

            fn has_field(name: &str) -> bool {
                <Self as $crate::Bindable>::field_names().contains(&name)
            }

            fn key(&self, field: &str) -> Option<$crate::Value> {
                $crate::Bindable::get(self, field)
            }
        }

        impl $crate::ReturnShape for $name {
            type Element = Self;

            fn shape(_context: &$crate::ShapeContext) -> $crate::Result<$crate::RowShape> {
                Ok(<Self as $crate::FromRow>::row_shape())
            }

            fn from_assembled(assembled: $crate::Assembled<Self>) -> $crate::Result<Self> {
                assembled.into_unique()
            }
        }
    };
}

/// Declares an enum stored in SQL by its symbolic name.
///
/// A variant may be given an explicit SQL name with `Variant = "NAME"`;
/// otherwise its Rust name is used. Coercion from a column value matches the
/// name exactly, case-sensitively.
///
/// ```
/// sqlx_plus::sql_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq)]
///     pub enum PayType {
///         Hourly = "HOURLY",
///         Salary = "SALARY",
///     }
/// }
///
/// use sqlx_plus::{FromValue, ToValue, Value};
/// assert_eq!(PayType::Hourly.to_value(), Value::Text("HOURLY".into()));
/// assert_eq!(PayType::from_value(Value::Text("SALARY".into()))?, PayType::Salary);
/// assert!(PayType::from_value(Value::Text("salary".into())).is_err());
/// # Ok::<(), sqlx_plus::Error>(())
/// ```
#[macro_export]
macro_rules! sql_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$variant_meta:meta])* $variant:ident $(= $label:literal)? ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $( $(#[$variant_meta])* $variant ),+
        }

        impl $name {
            /// Name under which the variant is stored.
            pub fn sql_name(&self) -> &'static str {
                match self {
                    $( Self::$variant => $crate::__sql_label!($variant $(, $label)?), )+
                }
            }
        }

        impl $crate::ToValue for $name {
            fn to_value(&self) -> $crate::Value {
                $crate::Value::Text(self.sql_name().to_owned())
            }
        }

        impl $crate::FromValue for $name {
            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                let text = match value {
                    $crate::Value::Text(text) => text,
                    other => other.to_string(),
                };
                $(
                    if text == $crate::__sql_label!($variant $(, $label)?) {
                        return Ok(Self::$variant);
                    }
                )+
                Err($crate::Error::EnumCoercion {
                    value: text,
                    target: stringify!($name),
                })
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __sql_label {
    ($variant:ident) => {
        stringify!($variant)
    };
    ($variant:ident, $label:literal) => {
        $label
    };
}
