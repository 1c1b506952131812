use crate::{
    batch, config::DEFAULT_BATCH_CHUNK_SIZE, Bindable, BindingSet, Config, Connection,
    ConnectionSource, FromRow, FromValue, Query, Result, Row, Statement, Value,
};
use futures::{
    future::{self, BoxFuture},
    TryStreamExt,
};
use std::sync::Arc;

/// The live connection and transaction of one unit of work.
///
/// A session is passed explicitly into every statement that should take part
/// in the unit of work. Nested units of work receive the same session through
/// [`Session::transact`] and share its connection and transaction; only the
/// outermost [`SqlPlus::transact`] commits or rolls back.
pub struct Session<C> {
    connection: C,
    depth: usize,
    batch_chunk_size: usize,
}

impl<C: Connection> Session<C> {
    /// Wraps a connection whose transaction, if any, is managed by the caller.
    pub fn new(connection: C) -> Self {
        Self::with_chunk_size(connection, DEFAULT_BATCH_CHUNK_SIZE)
    }

    pub fn with_chunk_size(connection: C, batch_chunk_size: usize) -> Self {
        Self {
            connection,
            depth: 0,
            batch_chunk_size,
        }
    }

    pub fn connection(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Number of units of work currently running on this session.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether a unit of work is running on this session.
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    /// Chunk size for batches that do not set their own.
    pub fn batch_chunk_size(&self) -> usize {
        self.batch_chunk_size
    }

    /// Runs a nested unit of work on this session's connection and
    /// transaction. Nothing is committed or rolled back here; an error is
    /// handed back to the enclosing unit of work.
    pub async fn transact<T, F>(&mut self, work: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Session<C>) -> BoxFuture<'s, Result<T>>,
    {
        self.depth += 1;
        log::trace!("Entering unit of work at depth {}", self.depth);
        let result = work(&mut *self).await;
        self.depth -= 1;
        result
    }

    pub fn into_connection(self) -> C {
        self.connection
    }
}

/// Entry point: a connection source plus the settings every unit of work
/// started from it uses.
#[derive(Debug, Clone)]
pub struct SqlPlus<S> {
    source: S,
    config: Config,
}

impl<S: ConnectionSource> SqlPlus<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, Config::default())
    }

    pub fn with_config(source: S, config: Config) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs `work` as the outermost unit of work.
    ///
    /// A connection is acquired and a transaction begun; the transaction is
    /// committed if `work` succeeds and rolled back otherwise. The connection
    /// is closed on every path. When rolling back or closing fails while an
    /// error is already being returned, the failure is logged and the first
    /// error wins.
    ///
    /// ```rust,no_run
    /// use sqlx::MySqlPool;
    /// use sqlx_plus::{Query, SqlPlus};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = SqlPlus::new(MySqlPool::connect("mysql://localhost/test").await?);
    /// let updated = db
    ///     .transact(|session| {
    ///         Box::pin(async move {
    ///             let mut query = Query::new("UPDATE users SET name = :name WHERE id = :id")?;
    ///             query.bind("name", "Jane Doe")?.bind("id", 42)?;
    ///             query.execute_update(session).await
    ///         })
    ///     })
    ///     .await?;
    /// println!("Updated {updated} rows");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn transact<T, F>(&self, work: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Session<S::Connection>) -> BoxFuture<'s, Result<T>>,
    {
        let mut connection = self.source.acquire().await?;
        log::trace!("Beginning transaction");
        if let Err(error) = connection.begin().await {
            close_after_error(connection).await;
            return Err(error);
        }
        let mut session = Session::with_chunk_size(connection, self.config.batch_chunk_size);
        let result = match session.transact(work).await {
            Ok(value) => {
                log::trace!("Committing transaction");
                session.connection.commit().await.map(|()| value)
            }
            Err(error) => Err(error),
        };
        let mut connection = session.into_connection();
        match result {
            Ok(value) => {
                log::trace!("Closing connection");
                connection.close().await?;
                Ok(value)
            }
            Err(error) => {
                log::trace!("Rolling back transaction");
                if let Err(rollback) = connection.rollback().await {
                    log::warn!("Rollback failed while handling `{error}`: {rollback}");
                }
                close_after_error(connection).await;
                Err(error)
            }
        }
    }

    /// Checks that a connection can be acquired and a trivial query answered.
    pub async fn test_connection(&self) -> Result<()> {
        let query = Query::new("SELECT 1")?;
        self.transact(move |session| {
            Box::pin(async move { query.fetch_scalar::<i64, _>(session).await.map(|_| ()) })
        })
        .await
    }

    /// Executes `sql` with positional `params` in its own unit of work and
    /// returns the number of affected rows.
    pub async fn update(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut query = Query::with_params(sql, params)?;
        self.transact(move |session| Box::pin(async move { query.execute_update(session).await }))
            .await
    }

    /// Fetches every row of `sql` as a generic map.
    pub async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let query = Query::with_params(sql, params)?;
        self.transact(move |session| Box::pin(async move { query.fetch(session).await }))
            .await
    }

    /// Fetches every row of `sql` mapped onto `T`.
    pub async fn fetch_as<T>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>>
    where
        T: FromRow + 'static,
    {
        let query = Query::with_params(sql, params)?;
        self.transact(move |session| Box::pin(async move { query.fetch_as(session).await }))
            .await
    }

    /// Fetches the only row of `sql` mapped onto `T`.
    pub async fn find_unique<T>(&self, sql: &str, params: &[Value]) -> Result<T>
    where
        T: FromRow + 'static,
    {
        let query = Query::with_params(sql, params)?;
        self.transact(move |session| {
            Box::pin(async move { query.fetch_unique_as(session).await })
        })
        .await
    }

    /// Fetches the first column of the only row of `sql`.
    pub async fn query_scalar<T>(&self, sql: &str) -> Result<T>
    where
        T: FromValue + Send + 'static,
    {
        let query = Query::new(sql)?;
        self.transact(move |session| Box::pin(async move { query.fetch_scalar(session).await }))
            .await
    }

    /// Executes several parameterless statements in one unit of work,
    /// returning the affected row count of each.
    pub async fn batch_exec(&self, statements: &[&str]) -> Result<Vec<u64>> {
        let queries = statements
            .iter()
            .map(|sql| Query::new(*sql))
            .collect::<Result<Vec<_>>>()?;
        self.transact(move |session| {
            Box::pin(async move {
                let mut counts = Vec::with_capacity(queries.len());
                for mut query in queries {
                    counts.push(query.execute_update(session).await?);
                }
                Ok(counts)
            })
        })
        .await
    }

    /// Executes `sql` once per object, binding each object's members to the
    /// statement's named placeholders, in chunks of the configured size.
    ///
    /// Objects are drawn from `objects` one chunk at a time, so only the
    /// chunk being executed is held in memory. An object that cannot be bound
    /// fails its chunk with [`Error::BatchExecution`](crate::Error::BatchExecution).
    pub async fn batch_update<I>(&self, sql: &str, objects: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Bindable + Send,
        I::IntoIter: Send + 'static,
    {
        let statement = Arc::new(Statement::parse(sql)?);
        let objects = objects.into_iter();
        self.transact(move |session| {
            Box::pin(async move {
                let chunk_size = session.batch_chunk_size();
                let rows = objects.map(|object| -> Result<BindingSet> {
                    let mut bindings = BindingSet::new(statement.clone());
                    bindings.bind_object(&object)?;
                    Ok(bindings)
                });
                batch::try_execute_batch(session, &statement, rows, chunk_size)?
                    .try_fold(0, |total, outcome| {
                        future::ready(Ok(total + outcome.rows_affected()))
                    })
                    .await
            })
        })
        .await
    }
}

async fn close_after_error<C: Connection>(connection: C) {
    log::trace!("Closing connection");
    if let Err(error) = connection.close().await {
        log::warn!("Closing connection failed: {error}");
    }
}
