use crate::{Error, Query, ToValue, Value};

/// Collects positional parameters for [`QueryBuilder`] and
/// [`SqlPlus`](crate::SqlPlus) shortcuts.
///
/// ```
/// use sqlx_plus::{params, Value};
///
/// assert_eq!(params![1, "Ann"], vec![Value::Int(1), Value::Text("Ann".into())]);
/// ```
#[macro_export]
macro_rules! params {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::ToValue::to_value(&$value)),*]
    };
}

/// Assembles SQL text from fragments, some of them conditional, together with
/// their positional parameters.
///
/// Fragments are joined with a single space and parameters are bound by
/// position in the order they were added.
///
/// # Examples
///
/// ```
/// use sqlx_plus::{params, QueryBuilder};
///
/// let city: Option<&str> = Some("Anytown");
/// let zip: Option<&str> = None;
/// let query = QueryBuilder::new()
///     .query("SELECT * FROM address WHERE 1 = 1", params![])
///     .query_if_some(city, "AND city = ?")
///     .query_if_some(zip, "AND zip = ?")
///     .query_if(true, "ORDER BY address_id LIMIT ?", params![10])
///     .build()?;
/// assert_eq!(
///     query.statement().sql(),
///     "SELECT * FROM address WHERE 1 = 1 AND city = ? ORDER BY address_id LIMIT ?"
/// );
/// # Ok::<(), sqlx_plus::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    fragments: Vec<String>,
    params: Vec<Value>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `sql` and its parameters.
    pub fn query(mut self, sql: &str, params: impl IntoIterator<Item = Value>) -> Self {
        self.fragments.push(sql.trim().to_owned());
        self.params.extend(params);
        self
    }

    /// Appends `sql` and its parameters only when `test` holds.
    pub fn query_if(self, test: bool, sql: &str, params: impl IntoIterator<Item = Value>) -> Self {
        if test {
            self.query(sql, params)
        } else {
            self
        }
    }

    /// Appends `sql` with `value` as its single parameter, only when `value`
    /// is present.
    pub fn query_if_some<T: ToValue>(self, value: Option<T>, sql: &str) -> Self {
        match value {
            Some(value) => self.query(sql, [value.to_value()]),
            None => self,
        }
    }

    /// Appends parameters without SQL text.
    pub fn add_parameters(mut self, params: impl IntoIterator<Item = Value>) -> Self {
        self.params.extend(params);
        self
    }

    /// Joined SQL text so far.
    pub fn sql(&self) -> String {
        self.fragments
            .iter()
            .filter(|f| !f.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parses the assembled text and binds the parameters by position.
    ///
    /// # Errors
    ///
    /// `MalformedQuery` when no text was added, and any error binding the
    /// parameters raises.
    pub fn build(self) -> crate::Result<Query> {
        let sql = self.sql();
        if sql.is_empty() {
            return Err(Error::MalformedQuery("empty SQL text".to_owned()));
        }
        Query::with_params(sql, &self.params)
    }
}
