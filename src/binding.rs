use crate::{mapper::field_name, Bindable, Error, Result, Statement, ToValue, Value};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

/// The values bound to one statement's placeholders for one execution (or one
/// row of a batch).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sqlx_plus::{BindingSet, Statement, Value};
///
/// let statement = Arc::new(Statement::parse(
///     "SELECT * FROM users WHERE id = :id OR parent_id = :id AND name = ?",
/// )?);
/// let mut bindings = BindingSet::new(statement);
/// bindings.bind("id", 42)?.bind_index(3, "John")?;
/// assert_eq!(
///     bindings.into_values()?,
///     vec![Value::Int(42), Value::Int(42), Value::Text("John".into())],
/// );
/// # Ok::<(), sqlx_plus::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct BindingSet {
    statement: Arc<Statement>,
    values: BTreeMap<usize, Value>,
    names_seen: BTreeSet<String>,
    bind_calls: usize,
    require_bindings: bool,
}

impl BindingSet {
    pub fn new(statement: Arc<Statement>) -> Self {
        Self {
            statement,
            values: BTreeMap::new(),
            names_seen: BTreeSet::new(),
            bind_calls: 0,
            require_bindings: false,
        }
    }

    /// Makes [`validate`](Self::validate) fail with `NoParametersSet` when no
    /// binding call was made, even if the statement has no placeholders.
    pub fn requiring_bindings(mut self) -> Self {
        self.require_bindings = true;
        self
    }

    pub fn statement(&self) -> &Arc<Statement> {
        &self.statement
    }

    /// Binds `value` to every placeholder called `name`. A leading `:` is
    /// accepted and ignored.
    pub fn bind(&mut self, name: &str, value: impl ToValue) -> Result<&mut Self> {
        let name = name.strip_prefix(':').unwrap_or(name);
        if !self.statement.contains_name(name) {
            return Err(Error::UnknownParameter {
                name: name.to_owned(),
                sql: self.statement.sql().to_owned(),
            });
        }
        self.check_name_unbound(name)?;
        self.assign_name(name, value.to_value());
        self.bind_calls += 1;
        Ok(self)
    }

    /// Binds `value` at the 1-based `ordinal`. If that placeholder is named,
    /// every placeholder sharing the name receives the value.
    pub fn bind_index(&mut self, ordinal: usize, value: impl ToValue) -> Result<&mut Self> {
        let statement = Arc::clone(&self.statement);
        let placeholder =
            statement
                .placeholder(ordinal)
                .ok_or_else(|| Error::ParameterIndexOutOfRange {
                    index: ordinal,
                    max: statement.len(),
                })?;
        match &placeholder.name {
            Some(name) => {
                self.check_name_unbound(name)?;
                self.assign_name(name, value.to_value());
            }
            None => {
                if self.values.contains_key(&ordinal) {
                    return Err(self.duplicate(&placeholder.label()));
                }
                self.values.insert(ordinal, value.to_value());
            }
        }
        self.bind_calls += 1;
        Ok(self)
    }

    /// Binds every named placeholder from the member of `object` it names.
    ///
    /// Nothing is bound unless every name resolves to a member and none of
    /// them was already bound. Positional placeholders are left alone.
    pub fn bind_object<B: Bindable>(&mut self, object: &B) -> Result<&mut Self> {
        let statement = Arc::clone(&self.statement);
        let mut resolved = Vec::new();
        for name in statement.names() {
            let field = field_name(name);
            let value = object
                .get(&field)
                .or_else(|| object.get(name))
                .ok_or_else(|| Error::ReflectionBind {
                    parameter: name.to_owned(),
                    field,
                    target: B::type_name(),
                })?;
            resolved.push((name, value));
        }
        for (name, _) in &resolved {
            self.check_name_unbound(name)?;
        }
        for (name, value) in resolved {
            self.assign_name(name, value);
        }
        self.bind_calls += 1;
        Ok(self)
    }

    pub fn is_bound(&self, ordinal: usize) -> bool {
        self.values.contains_key(&ordinal)
    }

    /// Whether no binding call has been made yet.
    pub fn is_untouched(&self) -> bool {
        self.bind_calls == 0
    }

    /// Labels of the unbound placeholders in ascending ordinal order, each
    /// name listed once.
    pub fn missing(&self) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for placeholder in self.statement.placeholders() {
            if self.values.contains_key(&placeholder.ordinal) {
                continue;
            }
            let label = placeholder.label();
            if !missing.contains(&label) {
                missing.push(label);
            }
        }
        missing
    }

    /// Fails unless every placeholder has a value.
    ///
    /// A set no binding call was made on fails with `NoParametersSet` when the
    /// statement has placeholders or the set requires bindings; otherwise the
    /// unbound placeholders are reported with `MissingParameters`.
    pub fn validate(&self) -> Result<()> {
        if self.bind_calls == 0 && (self.require_bindings || !self.statement.is_empty()) {
            return Err(Error::NoParametersSet {
                sql: self.statement.sql().to_owned(),
            });
        }
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingParameters {
                missing,
                sql: self.statement.sql().to_owned(),
            })
        }
    }

    /// Validates the set and copies out the values in ordinal order.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.validate()?;
        Ok(self.values.values().cloned().collect())
    }

    /// Validates the set and returns the values in ordinal order.
    pub fn into_values(self) -> Result<Vec<Value>> {
        self.validate()?;
        Ok(self.values.into_values().collect())
    }

    fn check_name_unbound(&self, name: &str) -> Result<()> {
        if self.names_seen.contains(name) {
            Err(self.duplicate(name))
        } else {
            Ok(())
        }
    }

    fn assign_name(&mut self, name: &str, value: Value) {
        let ordinals: Vec<usize> = self.statement.ordinals_of(name).collect();
        for ordinal in ordinals {
            self.values.insert(ordinal, value.clone());
        }
        self.names_seen.insert(name.to_owned());
    }

    fn duplicate(&self, name: &str) -> Error {
        Error::DuplicateParameter {
            name: name.to_owned(),
            sql: self.statement.sql().to_owned(),
        }
    }
}
