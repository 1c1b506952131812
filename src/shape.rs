use crate::{Error, FromValue, ResultMapper, Result, Row, Value};
use futures::{stream::BoxStream, TryStreamExt};
use rust_decimal::Decimal;
use std::{
    any,
    collections::{BTreeMap, HashMap},
    fmt,
    hash::Hash,
};
use time::{Date, PrimitiveDateTime, Time};

/// The structure a query's result is materialized into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowShape {
    /// The single column of the single row, coerced into the named type.
    Scalar(&'static str),
    /// Rows as returned by the driver, labels untranslated.
    GenericMap,
    /// A record type, one per row.
    Record(&'static str),
    /// Every row, in driver order.
    Collection(Box<RowShape>),
    /// Records keyed by one of their members. Later rows overwrite earlier
    /// ones with the same key.
    KeyedMap {
        key_field: String,
        element: Box<RowShape>,
    },
}

impl RowShape {
    /// Rejects shapes the interpreter cannot assemble.
    pub fn check(&self) -> Result<()> {
        let supported = match self {
            RowShape::Scalar(..) | RowShape::GenericMap | RowShape::Record(..) => true,
            RowShape::Collection(element) => matches!(
                **element,
                RowShape::Scalar(..) | RowShape::GenericMap | RowShape::Record(..)
            ),
            RowShape::KeyedMap { element, .. } => matches!(**element, RowShape::Record(..)),
        };
        if supported {
            Ok(())
        } else {
            Err(Error::UnsupportedReturnShape {
                shape: self.to_string(),
            })
        }
    }

    /// Whether at most one row may be consumed.
    pub fn is_unique(&self) -> bool {
        matches!(
            self,
            RowShape::Scalar(..) | RowShape::GenericMap | RowShape::Record(..)
        )
    }
}

impl fmt::Display for RowShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowShape::Scalar(name) => write!(f, "scalar {name}"),
            RowShape::GenericMap => f.write_str("row map"),
            RowShape::Record(name) => write!(f, "record {name}"),
            RowShape::Collection(element) => write!(f, "collection of {element}"),
            RowShape::KeyedMap { key_field, element } => {
                write!(f, "map of {element} keyed by '{key_field}'")
            }
        }
    }
}

/// Per-query information the interpreter needs besides the rows.
#[derive(Debug, Clone, Default)]
pub struct ShapeContext {
    /// SQL text, echoed in diagnostics.
    pub sql: String,
    /// Member used as key when loading records into a map.
    pub key_field: Option<String>,
}

/// What one row turns into.
pub trait FromRow: Sized + Send {
    fn row_shape() -> RowShape;

    fn from_row(row: Row, mapper: &ResultMapper) -> Result<Self>;

    /// Whether the element has a member called `name`.
    fn has_field(_name: &str) -> bool {
        false
    }

    /// Value of member `field`, used as key for keyed maps.
    fn key(&self, _field: &str) -> Option<Value> {
        None
    }
}

/// Elements collected by the interpreter, in the arrangement the shape asked
/// for.
#[derive(Debug)]
pub enum Assembled<E> {
    Unique(E),
    Sequence(Vec<E>),
    Keyed(Vec<(Value, E)>),
}

impl<E> Assembled<E> {
    pub fn into_unique(self) -> Result<E> {
        match self {
            Assembled::Unique(element) => Ok(element),
            _ => Err(Error::UnsupportedReturnShape {
                shape: format!("unique {}", any::type_name::<E>()),
            }),
        }
    }

    pub fn into_sequence(self) -> Result<Vec<E>> {
        match self {
            Assembled::Sequence(elements) => Ok(elements),
            _ => Err(Error::UnsupportedReturnShape {
                shape: format!("sequence of {}", any::type_name::<E>()),
            }),
        }
    }

    pub fn into_keyed(self) -> Result<Vec<(Value, E)>> {
        match self {
            Assembled::Keyed(entries) => Ok(entries),
            _ => Err(Error::UnsupportedReturnShape {
                shape: format!("keyed {}", any::type_name::<E>()),
            }),
        }
    }
}

/// A type a whole query result can be materialized into.
///
/// Implemented for records (via [`record!`](crate::record)), scalars and
/// [`Row`] (exactly one row), `Vec<T>` (every row) and `HashMap<K, T>` /
/// `BTreeMap<K, T>` (records keyed by a declared member).
pub trait ReturnShape: Sized {
    type Element: FromRow;

    /// Resolves the shape once per query.
    fn shape(context: &ShapeContext) -> Result<RowShape>;

    fn from_assembled(assembled: Assembled<Self::Element>) -> Result<Self>;
}

impl FromRow for Row {
    fn row_shape() -> RowShape {
        RowShape::GenericMap
    }

    fn from_row(row: Row, _mapper: &ResultMapper) -> Result<Self> {
        Ok(row)
    }
}

impl ReturnShape for Row {
    type Element = Self;

    fn shape(_context: &ShapeContext) -> Result<RowShape> {
        Ok(RowShape::GenericMap)
    }

    fn from_assembled(assembled: Assembled<Self>) -> Result<Self> {
        assembled.into_unique()
    }
}

macro_rules! impl_scalar_shape {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromRow for $ty {
                fn row_shape() -> RowShape {
                    RowShape::Scalar(any::type_name::<$ty>())
                }

                fn from_row(row: Row, mapper: &ResultMapper) -> Result<Self> {
                    mapper.map_scalar(row)
                }
            }

            impl ReturnShape for $ty {
                type Element = Self;

                fn shape(_context: &ShapeContext) -> Result<RowShape> {
                    Ok(<Self as FromRow>::row_shape())
                }

                fn from_assembled(assembled: Assembled<Self>) -> Result<Self> {
                    assembled.into_unique()
                }
            }
        )+
    };
}

impl_scalar_shape!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    char,
    String,
    Decimal,
    Date,
    Time,
    PrimitiveDateTime,
    Value,
);

impl<T: FromRow> ReturnShape for Vec<T> {
    type Element = T;

    fn shape(_context: &ShapeContext) -> Result<RowShape> {
        Ok(RowShape::Collection(Box::new(T::row_shape())))
    }

    fn from_assembled(assembled: Assembled<T>) -> Result<Self> {
        assembled.into_sequence()
    }
}

fn keyed_shape<T: FromRow>(context: &ShapeContext) -> Result<RowShape> {
    let key_field = context
        .key_field
        .clone()
        .ok_or_else(|| Error::MissingKeyFieldDeclaration {
            target: any::type_name::<T>(),
        })?;
    Ok(RowShape::KeyedMap {
        key_field,
        element: Box::new(T::row_shape()),
    })
}

impl<K, T> ReturnShape for HashMap<K, T>
where
    K: FromValue + Eq + Hash,
    T: FromRow,
{
    type Element = T;

    fn shape(context: &ShapeContext) -> Result<RowShape> {
        keyed_shape::<T>(context)
    }

    fn from_assembled(assembled: Assembled<T>) -> Result<Self> {
        assembled
            .into_keyed()?
            .into_iter()
            .map(|(key, element)| K::from_value(key).map(|key| (key, element)))
            .collect()
    }
}

impl<K, T> ReturnShape for BTreeMap<K, T>
where
    K: FromValue + Ord,
    T: FromRow,
{
    type Element = T;

    fn shape(context: &ShapeContext) -> Result<RowShape> {
        keyed_shape::<T>(context)
    }

    fn from_assembled(assembled: Assembled<T>) -> Result<Self> {
        assembled
            .into_keyed()?
            .into_iter()
            .map(|(key, element)| K::from_value(key).map(|key| (key, element)))
            .collect()
    }
}

/// Consumes `rows` in driver order and materializes them as `T`.
///
/// Unique shapes fail with `EmptyResult` on no row and `NonUniqueResult` as
/// soon as a second row arrives. Keyed maps fail with `NullMapKey` on the
/// first row whose key is NULL.
pub async fn interpret<T: ReturnShape>(
    mut rows: BoxStream<'_, Result<Row>>,
    mapper: &ResultMapper,
    context: &ShapeContext,
) -> Result<T> {
    let shape = T::shape(context)?;
    shape.check()?;
    log::trace!("Interpreting results of `{}` as {}", context.sql, shape);
    let assembled = match &shape {
        RowShape::Collection(..) => {
            let mut elements = Vec::new();
            while let Some(row) = rows.try_next().await? {
                elements.push(<T::Element as FromRow>::from_row(row, mapper)?);
            }
            Assembled::Sequence(elements)
        }
        RowShape::KeyedMap { key_field, .. } => {
            if !<T::Element as FromRow>::has_field(key_field) {
                return Err(Error::UnknownKeyField {
                    field: key_field.clone(),
                    target: any::type_name::<T::Element>(),
                });
            }
            let mut entries = Vec::new();
            let mut index = 0;
            while let Some(row) = rows.try_next().await? {
                let null_key = || Error::NullMapKey {
                    field: key_field.clone(),
                    row: index,
                    target: any::type_name::<T::Element>(),
                };
                // checked on the raw row: mapping may turn NULL into a value
                if mapper.member_value(&row, key_field).is_none_or(Value::is_null) {
                    return Err(null_key());
                }
                let element = <T::Element as FromRow>::from_row(row, mapper)?;
                let key = element.key(key_field).unwrap_or_default();
                if key.is_null() {
                    return Err(null_key());
                }
                entries.push((key, element));
                index += 1;
            }
            Assembled::Keyed(entries)
        }
        _ => Assembled::Unique(unique(rows, mapper, &context.sql).await?),
    };
    T::from_assembled(assembled)
}

/// Maps the only row of `rows`.
pub async fn unique<E: FromRow>(
    mut rows: BoxStream<'_, Result<Row>>,
    mapper: &ResultMapper,
    sql: &str,
) -> Result<E> {
    let Some(row) = rows.try_next().await? else {
        return Err(Error::EmptyResult {
            sql: sql.to_owned(),
        });
    };
    if rows.try_next().await?.is_some() {
        return Err(Error::NonUniqueResult {
            sql: sql.to_owned(),
        });
    }
    E::from_row(row, mapper)
}
