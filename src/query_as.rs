use crate::{
    batch::for_each_chunk,
    shape::{self, ShapeContext},
    Connection, Error, FromRow, FromValue, Query, Result, ReturnShape, Session,
};
use async_stream::try_stream;
use futures::{
    stream::{BoxStream, StreamExt},
    TryStreamExt,
};

/// Typed result retrieval.
///
/// Every method runs the query on `session` with the current bindings and
/// materializes rows through the query's column mapping. Rows reach the
/// mapper in the order the driver produced them.
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_plus::{record, Query, SqlPlus};
///
/// record! {
///     #[derive(Debug, Default)]
///     struct User {
///         id: i32,
///         name: String,
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let db = SqlPlus::new(MySqlPool::connect("mysql://localhost/test").await?);
/// let user: User = db
///     .transact(|session| {
///         Box::pin(async move {
///             let mut query = Query::new("SELECT id, name FROM users WHERE id = :id")?;
///             query.bind("id", 42)?;
///             query.fetch_unique_as(session).await
///         })
///     })
///     .await?;
/// println!("User: {} ({})", user.name, user.id);
/// # Ok(())
/// # }
/// ```
impl Query {
    fn shape_context(&self) -> ShapeContext {
        ShapeContext {
            sql: self.statement.sql().to_owned(),
            key_field: self.key_field.clone(),
        }
    }

    /// Materializes the result as `T`, the shape being chosen by `T`:
    /// a record, scalar or [`Row`](crate::Row) takes exactly one row, a `Vec`
    /// takes every row and a map keys records by the declared
    /// [`key_field`](Query::key_field).
    ///
    /// The shape is resolved before the statement runs, so a map without a
    /// declared key field fails without touching the database.
    pub async fn interpret<T, C>(&self, session: &mut Session<C>) -> Result<T>
    where
        T: ReturnShape,
        C: Connection,
    {
        let context = self.shape_context();
        T::shape(&context)?.check()?;
        let params = self.bindings.values()?;
        self.log_execution(&params);
        let rows = session
            .connection()
            .fetch(self.statement.normalized(), &params);
        shape::interpret(rows, &self.mapper, &context).await
    }

    /// Fetches every row mapped onto `T`.
    pub async fn fetch_as<T, C>(&self, session: &mut Session<C>) -> Result<Vec<T>>
    where
        T: FromRow,
        C: Connection,
    {
        self.interpret(session).await
    }

    /// Fetches the only row mapped onto `T`.
    ///
    /// # Errors
    ///
    /// `EmptyResult` when there is no row, `NonUniqueResult` when there is
    /// more than one.
    pub async fn fetch_unique_as<T, C>(&self, session: &mut Session<C>) -> Result<T>
    where
        T: FromRow,
        C: Connection,
    {
        let params = self.bindings.values()?;
        self.log_execution(&params);
        let rows = session
            .connection()
            .fetch(self.statement.normalized(), &params);
        shape::unique(rows, &self.mapper, self.statement.sql()).await
    }

    /// Like [`fetch_unique_as`](Query::fetch_unique_as) but returns `None`
    /// when there is no row.
    pub async fn fetch_optional_as<T, C>(&self, session: &mut Session<C>) -> Result<Option<T>>
    where
        T: FromRow,
        C: Connection,
    {
        match self.fetch_unique_as(session).await {
            Ok(found) => Ok(Some(found)),
            Err(Error::EmptyResult { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Fetches the first column of the only row, coerced into `T`.
    pub async fn fetch_scalar<T, C>(&self, session: &mut Session<C>) -> Result<T>
    where
        T: FromValue + Send,
        C: Connection,
    {
        let params = self.bindings.values()?;
        self.log_execution(&params);
        let mut rows = session
            .connection()
            .fetch(self.statement.normalized(), &params);
        let Some(row) = rows.try_next().await? else {
            return Err(Error::EmptyResult {
                sql: self.statement.sql().to_owned(),
            });
        };
        if rows.try_next().await?.is_some() {
            return Err(Error::NonUniqueResult {
                sql: self.statement.sql().to_owned(),
            });
        }
        self.mapper.map_scalar(row)
    }

    /// Streams rows mapped onto `T`, one at a time.
    pub fn stream_as<'a, T, C>(
        &'a self,
        session: &'a mut Session<C>,
    ) -> Result<BoxStream<'a, Result<T>>>
    where
        T: FromRow + 'a,
        C: Connection,
    {
        let params = self.bindings.values()?;
        self.log_execution(&params);
        Ok(try_stream! {
            let mut rows = session
                .connection()
                .fetch(self.statement.normalized(), &params);
            while let Some(row) = rows.try_next().await? {
                yield T::from_row(row, &self.mapper)?;
            }
        }
        .boxed())
    }

    /// Maps result rows onto `T` and hands them to `consumer` in chunks of
    /// `chunk_size`, the last chunk possibly shorter. At most one chunk is
    /// held at a time. Returns the number of rows processed.
    pub async fn batch_process<T, C, F>(
        &self,
        session: &mut Session<C>,
        chunk_size: usize,
        mut consumer: F,
    ) -> Result<usize>
    where
        T: FromRow,
        C: Connection,
        F: FnMut(Vec<T>) -> Result<()>,
    {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize(chunk_size));
        }
        let params = self.bindings.values()?;
        self.log_execution(&params);
        let mut rows = session
            .connection()
            .fetch(self.statement.normalized(), &params);
        let mut chunk = Vec::with_capacity(chunk_size);
        let mut count = 0;
        while let Some(row) = rows.try_next().await? {
            for_each_chunk(&mut chunk, chunk_size, T::from_row(row, &self.mapper)?, &mut consumer)?;
            count += 1;
        }
        if !chunk.is_empty() {
            consumer(chunk)?;
        }
        log::trace!("Processed {} row(s) in chunks of {}", count, chunk_size);
        Ok(count)
    }
}
