use crate::{value::decode, Error, FromValue, Record, Result, Row, Value};
use convert_case::{Boundary, Case, Converter};
use std::collections::HashMap;

/// Translates a result column label or placeholder name into the Rust member
/// name it designates.
///
/// Labels are split on `_`, `-`, spaces and lower-to-upper or digit-to-upper
/// case boundaries, and the lower-cased segments joined with `_`:
///
/// ```
/// use sqlx_plus::mapper::field_name;
///
/// assert_eq!(field_name("ADDRESS_ID"), "address_id");
/// assert_eq!(field_name("addressId"), "address_id");
/// assert_eq!(field_name("street"), "street");
/// ```
pub fn field_name(label: &str) -> String {
    Converter::new()
        .set_boundaries(&[
            Boundary::UNDERSCORE,
            Boundary::HYPHEN,
            Boundary::SPACE,
            Boundary::LOWER_UPPER,
            Boundary::DIGIT_UPPER,
        ])
        .to_case(Case::Snake)
        .convert(label)
}

/// Explicit column label to member name overrides. Listed labels bypass
/// [`field_name`] entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: HashMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, field: impl Into<String>) {
        self.entries.insert(column.into(), field.into());
    }

    /// Member registered for `column`; an exact label match wins over a
    /// case-insensitive one.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .get(column)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(label, _)| label.eq_ignore_ascii_case(column))
                    .map(|(_, field)| field)
            })
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, f)| (c.as_str(), f.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps result rows onto records and scalars.
#[derive(Debug, Clone, Default)]
pub struct ResultMapper {
    mapping: ColumnMapping,
}

impl ResultMapper {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut ColumnMapping {
        &mut self.mapping
    }

    /// Fails with `UnknownMappedField` if an override targets a member `T`
    /// does not have.
    pub fn check<T: Record>(&self) -> Result<()> {
        let fields = T::field_names();
        let mut unknown: Vec<_> = self
            .mapping
            .iter()
            .filter(|(_, field)| !fields.contains(field))
            .collect();
        unknown.sort();
        match unknown.first() {
            Some((column, field)) => Err(Error::UnknownMappedField {
                column: column.to_string(),
                field: field.to_string(),
                target: T::type_name(),
            }),
            None => Ok(()),
        }
    }

    /// Member name the column `label` maps onto.
    pub fn member(&self, label: &str) -> String {
        match self.mapping.get(label) {
            Some(field) => field.to_owned(),
            None => field_name(label),
        }
    }

    /// Raw value `row` carries for the member `field`. When several columns
    /// map onto it the last one wins, as in [`map_record`](Self::map_record).
    pub fn member_value<'r>(&self, row: &'r Row, field: &str) -> Option<&'r Value> {
        row.iter()
            .filter(|(label, _)| self.member(label) == field)
            .map(|(_, value)| value)
            .last()
    }

    /// Builds a `T` from `row`.
    ///
    /// Columns matching no member are ignored, members matching no column keep
    /// their default value.
    pub fn map_record<T: Record>(&self, row: Row) -> Result<T> {
        self.check::<T>()?;
        let fields = T::field_names();
        let mut record = T::default();
        for (label, value) in row {
            let field = self.member(&label);
            if fields.contains(&field.as_str()) {
                record.set(&field, value)?;
            }
        }
        Ok(record)
    }

    /// Coerces the first column of `row` into `T`.
    pub fn map_scalar<T: FromValue>(&self, row: Row) -> Result<T> {
        match row.into_iter().next() {
            Some((label, value)) => decode(&label, value),
            None => Err(Error::ScalarCoercion {
                value: "a row without columns".to_owned(),
                target: std::any::type_name::<T>(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) fn row_of<const N: usize>(columns: [(&str, crate::Value); N]) -> Row {
    columns.into_iter().collect()
}
