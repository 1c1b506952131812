use crate::{Error, Result, Row, Value};
use futures::stream::BoxStream;
use std::future::Future;

/// Outcome of one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Executed {
    pub rows_affected: u64,
    /// Keys generated by the database for inserted rows, if any.
    pub generated_keys: Vec<Value>,
}

/// A failed row of a driver-level batch, `row` counted from zero.
#[derive(Debug)]
pub struct RowFailure {
    pub row: usize,
    pub error: Error,
}

/// Hands out live connections.
pub trait ConnectionSource: Send + Sync {
    type Connection: Connection;

    fn acquire(&self) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// One live connection, driven by a [`Session`](crate::Session).
///
/// Statements receive the normalized SQL text (every placeholder replaced by
/// `?`) together with one value per placeholder, in ordinal order.
pub trait Connection: Send {
    fn begin(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Rows in driver order, columns labelled as the driver reports them.
    fn fetch<'a>(&'a mut self, sql: &'a str, params: &'a [Value]) -> BoxStream<'a, Result<Row>>;

    fn execute(&mut self, sql: &str, params: &[Value])
        -> impl Future<Output = Result<Executed>> + Send;

    /// Runs `sql` once per parameter row, stopping at the first failure.
    fn execute_batch(
        &mut self,
        sql: &str,
        rows: &[Vec<Value>],
    ) -> impl Future<Output = std::result::Result<Vec<Executed>, RowFailure>> + Send {
        async move {
            let mut outcomes = Vec::with_capacity(rows.len());
            for (row, params) in rows.iter().enumerate() {
                match self.execute(sql, params).await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(error) => return Err(RowFailure { row, error }),
                }
            }
            Ok(outcomes)
        }
    }

    /// Marks a point inside the open transaction that
    /// [`rollback_to_savepoint`](Connection::rollback_to_savepoint) can undo
    /// back to. Batch chunks are bracketed this way.
    fn savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn rollback_to_savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn release_savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Releases the connection back to where it came from.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}
