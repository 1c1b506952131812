use crate::{BindingSet, Connection, Error, Executed, Result, Session, Statement, Value};
use async_stream::try_stream;
use futures::Stream;

const CHUNK_SAVEPOINT: &str = "sqlx_plus_chunk";

/// Outcome of one executed batch chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    /// Zero-based position of the chunk in the batch.
    pub chunk: usize,
    /// Index of the chunk's first row in the whole input.
    pub first_row: usize,
    /// One entry per row of the chunk, in input order.
    pub executed: Vec<Executed>,
}

impl ChunkOutcome {
    pub fn len(&self) -> usize {
        self.executed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }

    pub fn rows_affected(&self) -> u64 {
        self.executed.iter().map(|e| e.rows_affected).sum()
    }

    pub fn generated_keys(&self) -> impl Iterator<Item = &Value> {
        self.executed.iter().flat_map(|e| e.generated_keys.iter())
    }
}

/// Executes `statement` once per binding set, `chunk_size` rows at a time.
///
/// Rows are pulled from `rows` only when the chunk they belong to is
/// assembled, and each chunk's outcome is yielded before the next chunk is
/// assembled. A row that fails validation or execution fails its whole chunk
/// with [`Error::BatchExecution`], carrying the row's index within the chunk;
/// no further chunks run. Each chunk runs between a savepoint and its release,
/// so the rows of a failed chunk are undone even if the caller goes on to
/// commit.
///
/// ```rust,no_run
/// use futures::TryStreamExt;
/// use sqlx::MySqlPool;
/// use sqlx_plus::{batch::execute_batch, BindingSet, Session, Statement};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let statement = Arc::new(Statement::parse("INSERT INTO log (line) VALUES (:line)")?);
/// let mut rows = Vec::new();
/// for i in 0..10_000 {
///     let mut row = BindingSet::new(statement.clone());
///     row.bind("line", i)?;
///     rows.push(row);
/// }
/// # let mut session = Session::new(sqlx_plus::ConnectionSource::acquire(&pool).await?);
/// let outcomes: Vec<_> = execute_batch(&mut session, &statement, rows, 500)?
///     .try_collect()
///     .await?;
/// assert_eq!(outcomes.len(), 20);
/// # Ok(())
/// # }
/// ```
pub fn execute_batch<'a, C, I>(
    session: &'a mut Session<C>,
    statement: &'a Statement,
    rows: I,
    chunk_size: usize,
) -> Result<impl Stream<Item = Result<ChunkOutcome>> + Send + 'a>
where
    C: Connection,
    I: IntoIterator<Item = BindingSet>,
    I::IntoIter: Send + 'a,
{
    try_execute_batch(session, statement, rows.into_iter().map(Ok), chunk_size)
}

/// Like [`execute_batch`], for rows whose binding can itself fail. A failed
/// row fails its chunk the same way an incomplete one does.
pub fn try_execute_batch<'a, C, I>(
    session: &'a mut Session<C>,
    statement: &'a Statement,
    rows: I,
    chunk_size: usize,
) -> Result<impl Stream<Item = Result<ChunkOutcome>> + Send + 'a>
where
    C: Connection,
    I: IntoIterator<Item = Result<BindingSet>>,
    I::IntoIter: Send + 'a,
{
    if chunk_size == 0 {
        return Err(Error::InvalidChunkSize(chunk_size));
    }
    let mut rows = rows.into_iter();
    Ok(try_stream! {
        let mut chunk = 0;
        let mut first_row = 0;
        loop {
            let mut params = Vec::with_capacity(chunk_size);
            for (row, bindings) in rows.by_ref().take(chunk_size).enumerate() {
                let values = bindings
                    .and_then(BindingSet::into_values)
                    .map_err(|error| failed(chunk, row, error))?;
                params.push(values);
            }
            if params.is_empty() {
                break;
            }
            log::debug!(
                "Executing batch chunk {} of {} row(s): {}",
                chunk,
                params.len(),
                statement.normalized()
            );
            let connection = session.connection();
            connection.savepoint(CHUNK_SAVEPOINT).await?;
            let executed = match connection.execute_batch(statement.normalized(), &params).await {
                Ok(executed) => {
                    connection.release_savepoint(CHUNK_SAVEPOINT).await?;
                    Ok(executed)
                }
                Err(failure) => {
                    if let Err(error) = connection.rollback_to_savepoint(CHUNK_SAVEPOINT).await {
                        log::warn!("Undoing batch chunk {} failed: {}", chunk, error);
                    }
                    Err(failed(chunk, failure.row, failure.error))
                }
            }?;
            let len = params.len();
            yield ChunkOutcome { chunk, first_row, executed };
            chunk += 1;
            first_row += len;
        }
        log::trace!("Batch finished after {} chunk(s)", chunk);
    })
}

fn failed(chunk: usize, row: usize, error: Error) -> Error {
    Error::BatchExecution {
        chunk,
        row,
        source: Box::new(error),
    }
}

/// Adds `item` to `chunk`, handing the chunk to `consumer` once it holds
/// `chunk_size` items.
pub(crate) fn for_each_chunk<T, E>(
    chunk: &mut Vec<T>,
    chunk_size: usize,
    item: T,
    consumer: &mut impl FnMut(Vec<T>) -> std::result::Result<(), E>,
) -> std::result::Result<(), E> {
    chunk.push(item);
    if chunk.len() >= chunk_size {
        consumer(std::mem::replace(chunk, Vec::with_capacity(chunk_size)))?;
    }
    Ok(())
}
