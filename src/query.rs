use crate::{
    batch::{self, ChunkOutcome},
    value::decode,
    Bindable, BindingSet, Connection, Error, Executed, FromValue, ResultMapper, Result, Row, Session,
    Statement, ToValue, Value,
};
use futures::TryStreamExt;
use std::sync::Arc;

/// A statement together with the values bound for its next execution.
///
/// `Query` parses the SQL text once, validates every binding as it is made
/// and runs against whatever [`Session`] it is handed, so the same query can
/// take part in any unit of work.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_plus::{Query, SqlPlus};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let db = SqlPlus::new(MySqlPool::connect("mysql://localhost/test").await?);
/// let inserted = db
///     .transact(|session| {
///         Box::pin(async move {
///             let mut query =
///                 Query::new("INSERT INTO users (user_id, name) VALUES (:user_id, :name)")?;
///             query.bind("user_id", 42)?.bind("name", "John Doe")?;
///             query.execute_update(session).await
///         })
///     })
///     .await?;
/// println!("Inserted {inserted} rows");
/// # Ok(())
/// # }
/// ```
///
/// # Batches
///
/// [`finish_batch`](Query::finish_batch) closes the row being bound and
/// starts a new one. A query holding finished rows executes them as a batch;
/// a last row that was bound but not finished is finished automatically.
///
/// ```rust
/// use sqlx_plus::Query;
///
/// let mut query = Query::new("UPDATE users SET name = :name WHERE user_id = :user_id")?;
/// for (id, name) in [(1, "Ann"), (2, "Bob")] {
///     query.bind("user_id", id)?.bind("name", name)?;
///     query.finish_batch()?;
/// }
/// assert_eq!(query.batch_len(), 2);
/// # Ok::<(), sqlx_plus::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) statement: Arc<Statement>,
    pub(crate) bindings: BindingSet,
    batch: Vec<BindingSet>,
    pub(crate) mapper: ResultMapper,
    pub(crate) key_field: Option<String>,
    chunk_size: Option<usize>,
}

impl Query {
    /// Parses `sql` into a new query.
    ///
    /// # Errors
    ///
    /// Returns an error if the placeholder lexer cannot be built.
    pub fn new<T>(sql: T) -> crate::Result<Self>
    where
        T: Into<String>,
    {
        Ok(Self::from_statement(Arc::new(Statement::parse(sql)?)))
    }

    /// Builds a query around an already parsed statement.
    pub fn from_statement(statement: Arc<Statement>) -> Self {
        Self {
            bindings: BindingSet::new(statement.clone()),
            statement,
            batch: Vec::new(),
            mapper: ResultMapper::default(),
            key_field: None,
            chunk_size: None,
        }
    }

    /// Parses `sql` and binds `params` to its placeholders by position,
    /// starting at ordinal 1.
    pub fn with_params<T>(sql: T, params: &[Value]) -> crate::Result<Self>
    where
        T: Into<String>,
    {
        let mut query = Self::new(sql)?;
        for (i, value) in params.iter().enumerate() {
            query.bind_index(i + 1, value)?;
        }
        Ok(query)
    }

    pub fn statement(&self) -> &Arc<Statement> {
        &self.statement
    }

    /// Bindings of the row currently being bound.
    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    /// Binds `value` to every occurrence of the named placeholder. A leading
    /// `:` in `name` is ignored.
    pub fn bind(&mut self, name: &str, value: impl ToValue) -> Result<&mut Self> {
        self.bindings.bind(name, value)?;
        Ok(self)
    }

    /// Binds `value` to the placeholder at the 1-based `ordinal`.
    pub fn bind_index(&mut self, ordinal: usize, value: impl ToValue) -> Result<&mut Self> {
        self.bindings.bind_index(ordinal, value)?;
        Ok(self)
    }

    /// Binds every named placeholder to the matching member of `object`.
    pub fn bind_object<B: Bindable>(&mut self, object: &B) -> Result<&mut Self> {
        self.bindings.bind_object(object)?;
        Ok(self)
    }

    /// Maps result column `column` onto member `field` instead of the member
    /// its label translates to.
    pub fn add_column_mapping(
        &mut self,
        column: impl Into<String>,
        field: impl Into<String>,
    ) -> &mut Self {
        self.mapper.mapping_mut().insert(column, field);
        self
    }

    /// Declares the member used as key when results are loaded into a map.
    pub fn key_field(&mut self, field: impl Into<String>) -> &mut Self {
        self.key_field = Some(field.into());
        self
    }

    /// Rows per chunk for this query's batches, instead of the session's.
    pub fn chunk_size(&mut self, size: usize) -> &mut Self {
        self.chunk_size = Some(size);
        self
    }

    /// Closes the row being bound and starts a new, empty one.
    ///
    /// # Errors
    ///
    /// Fails, keeping the row open, if any of its placeholders is unbound.
    pub fn finish_batch(&mut self) -> Result<&mut Self> {
        self.bindings.validate()?;
        let next = BindingSet::new(self.statement.clone());
        self.batch.push(std::mem::replace(&mut self.bindings, next));
        Ok(self)
    }

    /// Number of finished batch rows waiting to be executed.
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    /// Executes the statement and returns the number of affected rows.
    ///
    /// Pending batch rows are executed in chunks and their counts summed.
    pub async fn execute_update<C: Connection>(
        &mut self,
        session: &mut Session<C>,
    ) -> Result<u64> {
        let executed = self.run_update(session).await?;
        Ok(executed.iter().map(|e| e.rows_affected).sum())
    }

    /// Executes the statement and returns the keys the database generated,
    /// one per inserted row.
    pub async fn execute_update_returning_keys<K, C>(
        &mut self,
        session: &mut Session<C>,
    ) -> Result<Vec<K>>
    where
        K: FromValue,
        C: Connection,
    {
        self.run_update(session)
            .await?
            .into_iter()
            .flat_map(|e| e.generated_keys)
            .map(|key| decode("generated key", key))
            .collect()
    }

    /// Fetches every row as a generic map, labels as reported by the driver.
    pub async fn fetch<C: Connection>(&self, session: &mut Session<C>) -> Result<Vec<Row>> {
        let params = self.bindings.values()?;
        self.log_execution(&params);
        session
            .connection()
            .fetch(self.statement.normalized(), &params)
            .try_collect()
            .await
    }

    async fn run_update<C: Connection>(
        &mut self,
        session: &mut Session<C>,
    ) -> Result<Vec<Executed>> {
        if self.batch.is_empty() {
            let params = self.bindings.values()?;
            self.log_execution(&params);
            let executed = session
                .connection()
                .execute(self.statement.normalized(), &params)
                .await?;
            return Ok(vec![executed]);
        }
        let chunk_size = self.chunk_size.unwrap_or(session.batch_chunk_size());
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize(chunk_size));
        }
        if !self.bindings.is_untouched() {
            self.finish_batch()?;
        }
        let rows = std::mem::take(&mut self.batch);
        let outcomes: Vec<ChunkOutcome> =
            batch::execute_batch(session, &self.statement, rows, chunk_size)?
                .try_collect()
                .await?;
        Ok(outcomes.into_iter().flat_map(|o| o.executed).collect())
    }

    pub(crate) fn log_execution(&self, params: &[Value]) {
        log::debug!(
            "Executing `{}` with {} parameter(s)",
            self.statement.normalized(),
            params.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        record,
        testing::{Event, ScriptedSource},
        Error,
    };

    record! {
        #[derive(Debug, Default, Clone)]
        pub struct User {
            pub user_id: i64,
            pub name: String,
        }
    }

    #[test]
    fn test_query_new() {
        let query = Query::new("SELECT * FROM users WHERE id = :id").unwrap();
        assert_eq!(query.statement().normalized(), "SELECT * FROM users WHERE id = ?");
    }

    #[test]
    fn test_query_repeated_placeholders() {
        let mut query =
            Query::new("SELECT * FROM users WHERE id = :id OR user_id = :id").unwrap();
        assert_eq!(
            query.statement().normalized(),
            "SELECT * FROM users WHERE id = ? OR user_id = ?"
        );
        query.bind(":id", 7).unwrap();
        assert_eq!(
            query.bindings().values().unwrap(),
            vec![Value::Int(7), Value::Int(7)]
        );
    }

    #[test]
    fn test_query_with_params() {
        let query = Query::with_params(
            "SELECT * FROM users WHERE id = ? AND name = ?",
            &[Value::Int(1), Value::Text("Ann".into())],
        )
        .unwrap();
        assert_eq!(query.bindings().missing(), Vec::<String>::new());
        let error = Query::with_params("SELECT ?", &[Value::Int(1), Value::Int(2)]).unwrap_err();
        assert!(matches!(
            error,
            Error::ParameterIndexOutOfRange { index: 2, max: 1 }
        ));
    }

    #[test]
    fn test_finish_batch_requires_complete_row() {
        let mut query = Query::new("UPDATE users SET name = :name WHERE user_id = :user_id")
            .unwrap();
        query.bind("name", "Ann").unwrap();
        assert!(matches!(
            query.finish_batch(),
            Err(Error::MissingParameters { .. })
        ));
        assert_eq!(query.batch_len(), 0);
        query.bind("user_id", 1).unwrap().finish_batch().unwrap();
        assert_eq!(query.batch_len(), 1);
        assert!(query.bindings().is_untouched());
    }

    #[tokio::test]
    async fn test_execute_update_single() {
        let source = ScriptedSource::new();
        let mut session = Session::new(source.connection());
        let mut query = Query::new("DELETE FROM users WHERE user_id = :user_id").unwrap();
        query.bind("user_id", 3).unwrap();
        assert_eq!(query.execute_update(&mut session).await.unwrap(), 1);
        assert_eq!(
            source.events(),
            vec![Event::Execute(
                "DELETE FROM users WHERE user_id = ?".into(),
                vec![Value::Int(3)]
            )]
        );
    }

    #[tokio::test]
    async fn test_unfinished_last_row_is_executed() {
        let source = ScriptedSource::new();
        let mut session = Session::new(source.connection());
        let mut query = Query::new("UPDATE users SET name = :name WHERE user_id = :user_id")
            .unwrap();
        for user in [
            User {
                user_id: 1,
                name: "Ann".into(),
            },
            User {
                user_id: 2,
                name: "Bob".into(),
            },
        ] {
            query.bind_object(&user).unwrap().finish_batch().unwrap();
        }
        query.bind("name", "Cid").unwrap().bind("user_id", 3).unwrap();
        query.chunk_size(2);
        assert_eq!(query.execute_update(&mut session).await.unwrap(), 3);
        assert_eq!(source.executed().len(), 3);
        assert_eq!(query.batch_len(), 0);
    }

    #[tokio::test]
    async fn test_batch_chunk_size_zero_is_rejected() {
        let source = ScriptedSource::new();
        let mut session = Session::new(source.connection());
        let mut query = Query::new("DELETE FROM users WHERE user_id = ?").unwrap();
        for id in 1..=3 {
            query.bind_index(1, id).unwrap().finish_batch().unwrap();
        }
        query.chunk_size(0);
        assert!(matches!(
            query.execute_update(&mut session).await,
            Err(Error::InvalidChunkSize(0))
        ));
        assert_eq!(query.batch_len(), 3);
        assert!(source.executed().is_empty());

        query.chunk_size(2);
        assert_eq!(query.execute_update(&mut session).await.unwrap(), 3);
        assert_eq!(source.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_returning_generated_keys() {
        let source = ScriptedSource::new();
        let mut session = Session::new(source.connection());
        let mut query = Query::new("INSERT INTO users (name) VALUES (:name)").unwrap();
        for name in ["Ann", "Bob"] {
            query.bind("name", name).unwrap().finish_batch().unwrap();
        }
        let keys: Vec<i64> = query
            .execute_update_returning_keys(&mut session)
            .await
            .unwrap();
        assert_eq!(keys, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fetch_generic_rows() {
        let row: Row = [("USER_ID", Value::Int(1)), ("NAME", Value::Text("Ann".into()))]
            .into_iter()
            .collect();
        let source = ScriptedSource::new().returning(vec![row.clone()]);
        let mut session = Session::new(source.connection());
        let rows = Query::new("SELECT * FROM users")
            .unwrap()
            .fetch(&mut session)
            .await
            .unwrap();
        assert_eq!(rows, vec![row]);
    }
}
